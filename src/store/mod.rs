//! Storage collaborators behind the booking ledger.
//!
//! Every backend must make [`BookingStore::insert_assignments`] all-or-nothing:
//! either every seat in the batch is written, or none is and the conflicting
//! seats are reported through [`StoreError::SeatsTaken`].

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{SeatAssignment, ShowKey, User};

pub mod memory;
pub mod postgres;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::postgres::PostgresStore;
pub use self::redis::RedisStore;

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Every assignment whose show key equals `show` field by field.
    async fn occupancy(&self, show: &ShowKey) -> Result<Vec<SeatAssignment>, StoreError>;

    /// Writes the batch atomically, rejecting it if any seat is already taken.
    async fn insert_assignments(
        &self,
        show: &ShowKey,
        assignments: &[SeatAssignment],
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Inserts only if no user with this email exists.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
}
