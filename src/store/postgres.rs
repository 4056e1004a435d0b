use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{BookingStore, UserStore};
use crate::error::StoreError;
use crate::models::{SeatAssignment, ShowKey, User};

/// Relational backend. Seat uniqueness is the `bookings_show_seat_unique`
/// constraint; a batch runs in one transaction and is rolled back if any row
/// hits it.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    booking_id: Uuid,
    seat_id: String,
    gender: String,
    user_email: Option<String>,
    booked_at: DateTime<Utc>,
}

impl AssignmentRow {
    fn into_assignment(self, show: &ShowKey) -> Result<SeatAssignment, StoreError> {
        let gender = self
            .gender
            .parse()
            .map_err(|e: String| StoreError::Corrupt(format!("booking {}: {}", self.booking_id, e)))?;
        Ok(SeatAssignment {
            show: show.clone(),
            seat_id: self.seat_id,
            gender,
            booking_id: self.booking_id,
            user_email: self.user_email,
            booked_at: self.booked_at,
        })
    }
}

impl PostgresStore {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn occupancy(&self, show: &ShowKey) -> Result<Vec<SeatAssignment>, StoreError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT booking_id, seat_id, gender, user_email, booked_at
            FROM bookings
            WHERE movie = $1 AND theatre = $2 AND city = $3
              AND show_date = $4 AND show_time = $5
            "#,
        )
        .bind(&show.movie)
        .bind(&show.theatre)
        .bind(&show.city)
        .bind(&show.date)
        .bind(&show.time)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|row| row.into_assignment(show)).collect()
    }

    async fn insert_assignments(
        &self,
        show: &ShowKey,
        assignments: &[SeatAssignment],
    ) -> Result<(), StoreError> {
        let booking_ids: Vec<Uuid> = assignments.iter().map(|a| a.booking_id).collect();
        let seat_ids: Vec<String> = assignments.iter().map(|a| a.seat_id.clone()).collect();
        let genders: Vec<String> = assignments.iter().map(|a| a.gender.to_string()).collect();
        let user_emails: Vec<Option<String>> = assignments.iter().map(|a| a.user_email.clone()).collect();
        let booked_at: Vec<DateTime<Utc>> = assignments.iter().map(|a| a.booked_at).collect();

        let mut tx = self.pool.begin().await?;

        // Rows that collide with a committed seat are skipped, not raised, so
        // the whole set of conflicts can be reported at once.
        let inserted: Vec<String> = sqlx::query_scalar(
            r#"
            INSERT INTO bookings
                (booking_id, movie, theatre, city, show_date, show_time,
                 seat_id, gender, user_email, booked_at)
            SELECT s.booking_id, $1, $2, $3, $4, $5,
                   s.seat_id, s.gender, s.user_email, s.booked_at
            FROM UNNEST($6::uuid[], $7::text[], $8::text[], $9::text[], $10::timestamptz[])
                AS s(booking_id, seat_id, gender, user_email, booked_at)
            ON CONFLICT ON CONSTRAINT bookings_show_seat_unique DO NOTHING
            RETURNING seat_id
            "#,
        )
        .bind(&show.movie)
        .bind(&show.theatre)
        .bind(&show.city)
        .bind(&show.date)
        .bind(&show.time)
        .bind(&booking_ids)
        .bind(&seat_ids)
        .bind(&genders)
        .bind(&user_emails)
        .bind(&booked_at)
        .fetch_all(&mut *tx)
        .await?;

        if inserted.len() != assignments.len() {
            let inserted: HashSet<&str> = inserted.iter().map(String::as_str).collect();
            let taken: Vec<String> = seat_ids
                .into_iter()
                .filter(|id| !inserted.contains(id.as_str()))
                .collect();
            tx.rollback().await?;
            debug!("Rejected booking for {}: {} seat(s) taken", show, taken.len());
            return Err(StoreError::SeatsTaken(taken));
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT email, name, password_hash, registered_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (email, name, password_hash, registered_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.registered_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateEmail);
        }
        Ok(())
    }
}
