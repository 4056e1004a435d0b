use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::middleware::AuthUser;
use crate::models::{Gender, Occupancy, SeatRequest, ShowKey};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies/{movie}/seats", get(get_seats))
        .route("/bookings", post(confirm_booking))
}

/* ---------- SEATS ---------- */

// GET /api/movies/{movie}/seats?theatre=&city=&date=&time=
#[derive(Debug, Deserialize)]
struct SeatsQuery {
    #[serde(default)]
    theatre: String,
    city: Option<String>,
    date: Option<String>,
    time: Option<String>,
}

#[derive(Debug, Serialize)]
struct SeatsResponse {
    #[serde(flatten)]
    show: ShowKey,
    booked_seats: Occupancy,
    total_seats: Option<u32>,
    screening: Option<bool>,
    poster: Option<String>,
    available_dates: Vec<String>,
    timings: Vec<String>,
}

async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(movie): Path<String>,
    Query(params): Query<SeatsQuery>,
) -> Result<impl IntoResponse, LedgerError> {
    // Same defaults the booking page always opened with
    let date = params
        .date
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| state.catalog.default_date().to_string());
    let time = params
        .time
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| state.catalog.default_time().to_string());

    let show = ShowKey::new(movie, params.theatre, params.city, date, time);
    let booked_seats = state.ledger.get_occupancy(&show).await?;

    let city = Some(show.city.as_str()).filter(|c| !c.is_empty());
    let theatre = state.catalog.theatre(city, &show.theatre);
    let total_seats = theatre.map(|t| t.total_seats);
    let screening = theatre.map(|t| t.screens(&show.movie));
    let poster = state.catalog.poster(&show.movie).map(str::to_string);

    Ok(Json(SeatsResponse {
        show,
        booked_seats,
        total_seats,
        screening,
        poster,
        available_dates: state.catalog.show_dates.clone(),
        timings: state.catalog.timings.clone(),
    }))
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize)]
struct ConfirmBookingRequest {
    #[serde(default)]
    movie: String,
    #[serde(default)]
    theatre: String,
    city: Option<String>,
    #[serde(default)]
    date: String,
    #[serde(default)]
    time: String,
    #[serde(default)]
    seats: Vec<SeatRequest>,
}

#[derive(Debug, Serialize)]
struct BookedSeat {
    booking_id: Uuid,
    seat_id: String,
    gender: Gender,
}

#[derive(Debug, Serialize)]
struct ConfirmBookingResponse {
    status: &'static str,
    show: ShowKey,
    bookings: Vec<BookedSeat>,
}

async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ConfirmBookingRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let show = ShowKey::new(req.movie, req.theatre, req.city, req.date, req.time);

    let assignments = state
        .ledger
        .confirm_booking(&show, &req.seats, Some(&user.0))
        .await?;

    let bookings = assignments
        .into_iter()
        .map(|a| BookedSeat {
            booking_id: a.booking_id,
            seat_id: a.seat_id,
            gender: a.gender,
        })
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(ConfirmBookingResponse {
            status: "success",
            show,
            bookings,
        }),
    ))
}
