use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::coordinator::NewOrder;
use crate::error::AppError;
use crate::models::assignment::{Assignment, Candidate};
use crate::models::order::{Order, OrderStatus, PaymentStatus};
use crate::state::AppState;
use crate::store::OrderFilter;

const DEFAULT_SEARCH_RADIUS_KM: f64 = 10.0;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/orders/:id/payment", patch(update_payment_status))
        .route("/orders/:id/assign", post(assign_order))
        .route("/orders/:id/candidates", get(list_candidates))
        .route("/buyers/:id/orders", get(buyer_orders))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub agent_id: Uuid,
}

#[derive(Deserialize)]
pub struct RadiusQuery {
    pub max_km: Option<f64>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewOrder>,
) -> Result<Json<Order>, AppError> {
    let order = state.coordinator.create_order(payload).await?;
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.coordinator.get_order(id).await?))
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .coordinator
        .update_order_status(id, payload.status)
        .await?;
    Ok(Json(order))
}

async fn update_payment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .coordinator
        .update_payment_status(id, payload.payment_status)
        .await?;
    Ok(Json(order))
}

async fn assign_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = state.coordinator.assign(id, payload.agent_id).await?;
    Ok(Json(assignment))
}

async fn list_candidates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<RadiusQuery>,
) -> Result<Json<Vec<Candidate>>, AppError> {
    let max_km = query.max_km.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);
    Ok(Json(state.coordinator.candidates(id, max_km).await?))
}

async fn buyer_orders(
    State(state): State<Arc<AppState>>,
    Path(buyer_id): Path<Uuid>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state.coordinator.orders(OrderFilter::Buyer(buyer_id)).await?;
    Ok(Json(orders))
}
