//! Document routes.
//!
//! | Method | Path                                    |                       |
//! |--------|-----------------------------------------|-----------------------|
//! | GET    | `/v1/users/{userId}/{collection}`       | list                  |
//! | GET    | `/v1/users/{userId}/{collection}/{id}`  | read                  |
//! | PUT    | `/v1/users/{userId}/{collection}/{id}`  | create or replace     |
//! | PATCH  | `/v1/users/{userId}/{collection}/{id}`  | merge, 404 if missing |
//! | DELETE | `/v1/users/{userId}/{collection}/{id}`  | idempotent, 204       |

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use dompet_engine::EntityType;

use crate::auth::AuthUser;
use crate::db::StoredDocument;
use crate::error::Result;
use crate::handlers::{
    handle_delete, handle_get, handle_list, handle_patch, handle_put, DocumentPath,
};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/users/{user_id}/{collection}", get(list_handler))
        .route(
            "/v1/users/{user_id}/{collection}/{doc_id}",
            get(get_handler)
                .put(put_handler)
                .patch(patch_handler)
                .delete(delete_handler),
        )
}

fn authorized_path(
    auth: &AuthUser,
    (user_id, collection, doc_id): (String, String, String),
) -> Result<DocumentPath> {
    auth.authorize(&user_id)?;
    DocumentPath::parse(user_id, &collection, doc_id)
}

async fn list_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, collection)): Path<(String, String)>,
) -> Result<Json<Vec<StoredDocument>>> {
    auth.authorize(&user_id)?;
    let entity_type = EntityType::from_collection(&collection)?;
    let documents = handle_list(&state.pool, &user_id, entity_type).await?;
    Ok(Json(documents))
}

async fn get_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(path): Path<(String, String, String)>,
) -> Result<Json<StoredDocument>> {
    let path = authorized_path(&auth, path)?;
    Ok(Json(handle_get(&state.pool, &path).await?))
}

async fn put_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(path): Path<(String, String, String)>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<StoredDocument>> {
    let path = authorized_path(&auth, path)?;
    let document = handle_put(
        &state.pool,
        &state.schema,
        &state.conn_manager,
        &path,
        payload,
    )
    .await?;
    Ok(Json(document))
}

async fn patch_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(path): Path<(String, String, String)>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<StoredDocument>> {
    let path = authorized_path(&auth, path)?;
    let document = handle_patch(
        &state.pool,
        &state.schema,
        &state.conn_manager,
        &path,
        patch,
    )
    .await?;
    Ok(Json(document))
}

async fn delete_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(path): Path<(String, String, String)>,
) -> Result<StatusCode> {
    let path = authorized_path(&auth, path)?;
    handle_delete(&state.pool, &state.conn_manager, &path).await?;
    Ok(StatusCode::NO_CONTENT)
}
