//! HTTP façade over the user store.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, info};

use crate::db::entities::users;
use crate::db::repo::Repo;
use crate::error::AppResult;

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "User not found"),
            ApiError::Internal(e) => {
                error!("API request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

pub fn create_router(repo: Arc<Repo>) -> Router {
    Router::new()
        .route("/api/user/{id}", get(get_user))
        .route("/api/user/agree/{id}", post(agree))
        .with_state(repo)
}

/// GET /api/user/{id}
pub async fn get_user(
    State(repo): State<Arc<Repo>>,
    Path(id): Path<i64>,
) -> Result<Json<users::Model>, ApiError> {
    repo.get_user(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// POST /api/user/agree/{id}
pub async fn agree(
    State(repo): State<Arc<Repo>>,
    Path(id): Path<i64>,
) -> Result<Json<users::Model>, ApiError> {
    let user = repo.set_agreed(id).await?.ok_or(ApiError::NotFound)?;
    info!("User {} accepted the terms via HTTP", id);
    Ok(Json(user))
}

pub async fn serve(bind: SocketAddr, repo: Arc<Repo>) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("🌐 HTTP API listening on {}", bind);
    axum::serve(listener, create_router(repo)).await?;
    Ok(())
}
