//! Realtime subscription route.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::handle_websocket_connection;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/users/{user_id}/realtime", get(realtime_handler))
}

/// GET /v1/users/{user_id}/realtime - upgrade to a WebSocket.
async fn realtime_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response> {
    auth.authorize(&user_id)?;
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let pool = state.pool.clone();
    let conn_manager = state.conn_manager.clone();
    Ok(ws.on_upgrade(move |socket| {
        handle_websocket_connection(socket, pool, conn_manager, user_id)
    }))
}
