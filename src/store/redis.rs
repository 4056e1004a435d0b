use ::redis::{aio::MultiplexedConnection, AsyncCommands, Client, Script};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::{BookingStore, UserStore};
use crate::error::StoreError;
use crate::models::{SeatAssignment, ShowKey, User};

// KEYS[1] = show hash, ARGV = seat, json, seat, json, ...
// Returns the seats that were already present; writes nothing unless that list is empty.
static CLAIM_SEATS: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        local taken = {}
        for i = 1, #ARGV, 2 do
            if redis.call('HEXISTS', KEYS[1], ARGV[i]) == 1 then
                table.insert(taken, ARGV[i])
            end
        end
        if #taken > 0 then
            return taken
        end
        for i = 1, #ARGV, 2 do
            redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
        end
        return taken
        "#,
    )
});

/// Key-value backend. One hash per show maps seat id to the JSON assignment;
/// users live under `user:<email>`.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> ::redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    fn show_key(show: &ShowKey) -> Result<String, StoreError> {
        // A JSON array keeps field boundaries unambiguous whatever the names contain.
        let parts = [&show.movie, &show.theatre, &show.city, &show.date, &show.time];
        let encoded = serde_json::to_string(&parts).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(format!("occupancy:{}", encoded))
    }

    fn user_key(email: &str) -> String {
        format!("user:{}", email)
    }
}

#[async_trait]
impl BookingStore for RedisStore {
    async fn occupancy(&self, show: &ShowKey) -> Result<Vec<SeatAssignment>, StoreError> {
        let key = Self::show_key(show)?;
        let mut conn = self.conn.clone();
        let seats: HashMap<String, String> = conn.hgetall(&key).await?;

        seats
            .into_iter()
            .map(|(seat_id, data)| {
                serde_json::from_str::<SeatAssignment>(&data)
                    .map_err(|e| StoreError::Corrupt(format!("{} seat {}: {}", key, seat_id, e)))
            })
            .collect()
    }

    async fn insert_assignments(
        &self,
        show: &ShowKey,
        assignments: &[SeatAssignment],
    ) -> Result<(), StoreError> {
        let key = Self::show_key(show)?;
        let mut invocation = CLAIM_SEATS.key(&key);
        for assignment in assignments {
            let data = serde_json::to_string(assignment).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            invocation.arg(&assignment.seat_id).arg(data);
        }

        let mut conn = self.conn.clone();
        let taken: Vec<String> = invocation.invoke_async(&mut conn).await?;
        if !taken.is_empty() {
            return Err(StoreError::SeatsTaken(taken));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for RedisStore {
    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(Self::user_key(email)).await?;
        data.map(|json| serde_json::from_str(&json).map_err(|e| StoreError::Corrupt(e.to_string())))
            .transpose()
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let data = serde_json::to_string(user).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let mut conn = self.conn.clone();

        // SET NX replies nil when the key already exists
        let created: Option<String> = ::redis::cmd("SET")
            .arg(Self::user_key(&user.email))
            .arg(data)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        match created {
            Some(_) => Ok(()),
            None => Err(StoreError::DuplicateEmail),
        }
    }
}
