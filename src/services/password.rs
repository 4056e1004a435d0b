use bcrypt::{hash, verify};

use crate::error::LedgerError;

/// bcrypt only looks at the first 72 bytes; longer passwords are refused.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hashes on the blocking pool so request tasks are not stalled.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, LedgerError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(password, cost))
        .await
        .map_err(|e| LedgerError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| LedgerError::Internal(format!("password hashing failed: {}", e)))
}

pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, LedgerError> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| LedgerError::Internal(format!("verification task failed: {}", e)))?
        .map_err(|e| LedgerError::Internal(format!("password verification failed: {}", e)))
}
