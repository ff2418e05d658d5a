//! HTTP route definitions.

mod documents;
mod health;
mod realtime;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(realtime::routes())
        .merge(documents::routes())
}
