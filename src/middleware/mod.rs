use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

use crate::error::LedgerError;
use crate::models::Identity;

/// Request-scoped identity taken from HTTP Basic credentials.
///
/// Handlers pass `user.0` (or `&user.0`) into ledger operations explicitly;
/// nothing about the caller is kept between requests.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

fn basic_credentials(parts: &Parts) -> Option<(String, String)> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    let encoded = auth_header.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // email:password, the password may itself contain ':'
    let (email, password) = credentials.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}

impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = LedgerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (email, password) = basic_credentials(parts).ok_or(LedgerError::InvalidCredentials)?;
        let identity = state.ledger.authenticate(&email, &password).await?;
        Ok(AuthUser(identity))
    }
}
