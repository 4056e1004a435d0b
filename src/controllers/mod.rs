pub mod bookings;
pub mod catalog;
pub mod users;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(catalog::routes())
        .merge(users::routes())
        .merge(bookings::routes())
}
