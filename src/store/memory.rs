use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{BookingStore, UserStore};
use crate::error::StoreError;
use crate::models::{SeatAssignment, ShowKey, User};

/// Process-local store. Each show's seats live under one write lock, so a
/// batch is checked and written without interleaving.
#[derive(Default)]
pub struct MemoryStore {
    shows: RwLock<HashMap<ShowKey, HashMap<String, SeatAssignment>>>,
    users: RwLock<HashMap<String, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn occupancy(&self, show: &ShowKey) -> Result<Vec<SeatAssignment>, StoreError> {
        let shows = self.shows.read().await;
        Ok(shows
            .get(show)
            .map(|seats| seats.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_assignments(
        &self,
        show: &ShowKey,
        assignments: &[SeatAssignment],
    ) -> Result<(), StoreError> {
        let mut shows = self.shows.write().await;
        let seats = shows.entry(show.clone()).or_default();

        let taken: Vec<String> = assignments
            .iter()
            .filter(|a| seats.contains_key(&a.seat_id))
            .map(|a| a.seat_id.clone())
            .collect();
        if !taken.is_empty() {
            return Err(StoreError::SeatsTaken(taken));
        }

        for assignment in assignments {
            seats.insert(assignment.seat_id.clone(), assignment.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }
}
