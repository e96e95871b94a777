use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::profiles::NewProfile;
use crate::error::AppError;
use crate::models::profile::{Profile, UserRole};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profiles", post(create_profile))
        .route("/profiles/:id", get(get_profile))
        .route("/profiles/:id/role", patch(switch_role))
}

#[derive(Deserialize)]
pub struct SwitchRoleRequest {
    pub role: UserRole,
}

async fn create_profile(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewProfile>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.coordinator.create_profile(payload).await?))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.coordinator.get_profile(id).await?))
}

async fn switch_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SwitchRoleRequest>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.coordinator.switch_role(id, payload.role).await?))
}
