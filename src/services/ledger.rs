//! ledger.rs
//!
//! The booking ledger: which seats of a show are taken, and recording new
//! seat assignments without ever handing the same seat out twice.
//!
//! Storage and notification are injected as trait objects so the same rules
//! apply whichever backend the configuration selects. Every storage call is
//! bounded by a timeout and a timeout is reported as a transient failure.

use chrono::Utc;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{LedgerError, StoreError};
use crate::models::{Identity, Occupancy, Registration, SeatAssignment, SeatRequest, ShowKey, User};
use crate::services::notification::{self, DisabledNotifier, Notifier};
use crate::services::password::{self, MAX_PASSWORD_BYTES};
use crate::store::{BookingStore, MemoryStore, UserStore};

pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

#[derive(Clone)]
pub struct BookingLedger {
    bookings: Arc<dyn BookingStore>,
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    storage_timeout: Duration,
    bcrypt_cost: u32,
    // Compared against when the email is unknown, so both failure paths do a bcrypt verify.
    decoy_hash: Arc<OnceCell<String>>,
}

impl BookingLedger {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        users: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            bookings,
            users,
            notifier,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Ledger over a fresh [`MemoryStore`] with notifications disabled.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store, Arc::new(DisabledNotifier))
    }

    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Seats already taken for `show`. A snapshot, not a reservation.
    pub async fn get_occupancy(&self, show: &ShowKey) -> Result<Occupancy, LedgerError> {
        validate_show(show)?;

        let assignments = self
            .with_timeout("occupancy", self.bookings.occupancy(show))
            .await?;

        debug!("{} seat(s) occupied for {}", assignments.len(), show);
        Ok(assignments
            .into_iter()
            .map(|a| (a.seat_id, a.gender))
            .collect())
    }

    /// Records every requested seat for `show`, or none of them.
    ///
    /// Each seat gets its own booking id. If any seat is already taken the
    /// call fails with [`LedgerError::SeatsTaken`] naming all such seats.
    pub async fn confirm_booking(
        &self,
        show: &ShowKey,
        seats: &[SeatRequest],
        user: Option<&Identity>,
    ) -> Result<Vec<SeatAssignment>, LedgerError> {
        validate_show(show)?;
        validate_seats(seats)?;

        let booked_at = Utc::now();
        let assignments: Vec<SeatAssignment> = seats
            .iter()
            .map(|seat| SeatAssignment {
                show: show.clone(),
                seat_id: seat.seat_id.clone(),
                gender: seat.gender,
                booking_id: Uuid::new_v4(),
                user_email: user.map(|u| u.email.clone()),
                booked_at,
            })
            .collect();

        let result = self
            .with_timeout("insert_assignments", self.bookings.insert_assignments(show, &assignments))
            .await;

        match &result {
            Err(LedgerError::SeatsTaken { seats }) => {
                info!("Booking for {} rejected, already taken: {}", show, seats.join(", "));
            }
            Err(e) => error!("Booking for {} failed: {}", show, e),
            Ok(()) => {}
        }
        result?;

        let seat_list = seats
            .iter()
            .map(|s| s.seat_id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        info!("Booked {} seat(s) for {}: {}", assignments.len(), show, seat_list);

        let who = user.map(|u| u.name.as_str()).unwrap_or("Guest");
        notification::dispatch(
            &self.notifier,
            "Booking Confirmed!",
            format!(
                "User {} booked tickets.\nMovie: {}\nTheatre: {}\nDate: {} {}\nSeats: {}",
                who, show.movie, show.theatre, show.date, show.time, seat_list
            ),
        );

        Ok(assignments)
    }

    pub async fn register_user(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<Identity, LedgerError> {
        let registration = Registration {
            email: email.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        };
        registration.validate()?;
        if name.trim().is_empty() {
            return Err(LedgerError::validation("name must not be empty"));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(LedgerError::validation(format!(
                "password must be at most {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }

        // Cheap early exit; the conditional insert below is what actually guarantees uniqueness.
        if self.with_timeout("find_user", self.users.find_user(email)).await?.is_some() {
            return Err(LedgerError::DuplicateEmail);
        }

        let user = User {
            password_hash: password::hash_password(&registration.password, self.bcrypt_cost).await?,
            email: registration.email,
            name: registration.name,
            registered_at: Utc::now(),
        };
        self.with_timeout("insert_user", self.users.insert_user(&user)).await?;

        info!("Registered user {}", user.email);
        notification::dispatch(&self.notifier, "New Signup", format!("User {} joined.", user.name));
        Ok(user.identity())
    }

    /// Checks credentials. Unknown email and wrong password fail identically.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, LedgerError> {
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| password::hash_password("decoy-password", self.bcrypt_cost))
            .await?;

        // bcrypt only compares the first 72 bytes
        if password.len() > MAX_PASSWORD_BYTES {
            let _ = password::verify_password(password, decoy).await?;
            return Err(LedgerError::InvalidCredentials);
        }

        let user = self.with_timeout("find_user", self.users.find_user(email)).await?;

        match user {
            Some(user) => {
                if password::verify_password(password, &user.password_hash).await? {
                    Ok(user.identity())
                } else {
                    Err(LedgerError::InvalidCredentials)
                }
            }
            None => {
                let _ = password::verify_password(password, decoy).await?;
                Err(LedgerError::InvalidCredentials)
            }
        }
    }

    /// [`authenticate`](Self::authenticate) plus the login notification.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, LedgerError> {
        let identity = self.authenticate(email, password).await?;
        notification::dispatch(
            &self.notifier,
            "User Login",
            format!("User {} logged in.", identity.name),
        );
        Ok(identity)
    }

    async fn with_timeout<T, F>(&self, operation: &'static str, call: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.storage_timeout, call).await {
            Ok(result) => result.map_err(LedgerError::from),
            Err(_) => {
                warn!("Storage call {} timed out after {:?}", operation, self.storage_timeout);
                Err(LedgerError::Unavailable(format!("{} timed out", operation)))
            }
        }
    }
}

fn validate_show(show: &ShowKey) -> Result<(), LedgerError> {
    match show.missing_field() {
        Some(field) => Err(LedgerError::validation(format!("{} is required", field))),
        None => Ok(()),
    }
}

fn validate_seats(seats: &[SeatRequest]) -> Result<(), LedgerError> {
    if seats.is_empty() {
        return Err(LedgerError::validation("select at least one seat"));
    }

    let mut seen = HashSet::with_capacity(seats.len());
    for seat in seats {
        if seat.seat_id.is_empty() {
            return Err(LedgerError::validation("seat id must not be empty"));
        }
        if !seen.insert(seat.seat_id.as_str()) {
            return Err(LedgerError::validation(format!(
                "seat {} requested more than once",
                seat.seat_id
            )));
        }
    }
    Ok(())
}
