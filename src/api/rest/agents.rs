use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post, put};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::agents::{NearbyAgent, NewAgent, NewReview};
use crate::error::AppError;
use crate::models::agent::{AgentStatus, DeliveryAgent, Location, ReportKind};
use crate::models::order::Order;
use crate::state::AppState;
use crate::store::AgentFilter;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agents", post(create_agent).get(list_agents))
        .route("/agents/nearby", get(nearby_agents))
        .route("/agents/:id", get(get_agent))
        .route("/agents/:id/orders", get(agent_orders))
        .route("/agents/:id/status", patch(update_agent_status))
        .route("/agents/:id/location", patch(update_agent_location))
        .route("/agents/:id/documents/:file_name", put(upload_document))
        .route("/agents/:id/verification", post(review_verification))
        .route("/agents/:id/reviews", post(add_review))
        .route("/agents/:id/reports", post(report_agent))
}

#[derive(Deserialize)]
pub struct ListAgentsQuery {
    pub status: Option<AgentStatus>,
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub max_km: f64,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AgentStatus,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: Location,
}

#[derive(Deserialize)]
pub struct VerificationRequest {
    pub approved: bool,
}

#[derive(Deserialize)]
pub struct ReportRequest {
    pub kind: ReportKind,
}

async fn create_agent(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewAgent>,
) -> Result<Json<DeliveryAgent>, AppError> {
    Ok(Json(state.coordinator.create_agent(payload).await?))
}

async fn list_agents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAgentsQuery>,
) -> Result<Json<Vec<DeliveryAgent>>, AppError> {
    let filter = query.status.map_or(AgentFilter::All, AgentFilter::Status);
    Ok(Json(state.coordinator.list_agents(filter).await?))
}

async fn nearby_agents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyAgent>>, AppError> {
    let origin = Location {
        lat: query.lat,
        lng: query.lng,
    };
    Ok(Json(
        state.coordinator.nearby_agents(origin, query.max_km).await?,
    ))
}

async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryAgent>, AppError> {
    Ok(Json(state.coordinator.get_agent(id).await?))
}

async fn agent_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.coordinator.agent_orders(id).await?))
}

async fn update_agent_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DeliveryAgent>, AppError> {
    let agent = state
        .coordinator
        .update_agent_status(id, payload.status)
        .await?;
    Ok(Json(agent))
}

async fn update_agent_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<DeliveryAgent>, AppError> {
    let agent = state
        .coordinator
        .update_agent_location(id, payload.location)
        .await?;
    Ok(Json(agent))
}

async fn upload_document(
    State(state): State<Arc<AppState>>,
    Path((id, file_name)): Path<(Uuid, String)>,
    body: Bytes,
) -> Result<Json<DeliveryAgent>, AppError> {
    let agent = state
        .coordinator
        .submit_verification_document(id, &file_name, body)
        .await?;
    Ok(Json(agent))
}

async fn review_verification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerificationRequest>,
) -> Result<Json<DeliveryAgent>, AppError> {
    let agent = state
        .coordinator
        .review_verification(id, payload.approved)
        .await?;
    Ok(Json(agent))
}

async fn add_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewReview>,
) -> Result<Json<DeliveryAgent>, AppError> {
    Ok(Json(state.coordinator.add_review(id, payload).await?))
}

async fn report_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportRequest>,
) -> Result<Json<DeliveryAgent>, AppError> {
    Ok(Json(state.coordinator.report_agent(id, payload.kind).await?))
}
