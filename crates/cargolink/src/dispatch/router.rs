//! HTTP surface for the dispatch engine. Handlers stay thin: decode, call
//! the service with the current time, map the error to a status code.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::capacity::{VehiclePreferences, VehicleRegistration};
use super::domain::{ShipmentDraft, ShipmentId, VehicleId};
use super::notify::DispatchNotifier;
use super::routing::RouteEstimator;
use super::service::{DispatchError, DispatchService};

pub fn dispatch_router<E, N>(service: Arc<DispatchService<E, N>>) -> Router
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    Router::new()
        .route("/api/v1/shipments", post(create_shipment::<E, N>))
        .route("/api/v1/shipments/:shipment_id", get(shipment_status::<E, N>))
        .route(
            "/api/v1/shipments/:shipment_id/matches",
            get(list_matches::<E, N>),
        )
        .route(
            "/api/v1/shipments/:shipment_id/accept",
            post(accept_match::<E, N>),
        )
        .route(
            "/api/v1/shipments/:shipment_id/pickup",
            post(confirm_pickup::<E, N>),
        )
        .route(
            "/api/v1/shipments/:shipment_id/transit",
            post(mark_in_transit::<E, N>),
        )
        .route(
            "/api/v1/shipments/:shipment_id/deliver",
            post(confirm_delivery::<E, N>),
        )
        .route(
            "/api/v1/shipments/:shipment_id/cancel",
            post(cancel_shipment::<E, N>),
        )
        .route("/api/v1/vehicles", post(register_vehicle::<E, N>))
        .route("/api/v1/vehicles/:vehicle_id", get(vehicle_snapshot::<E, N>))
        .route(
            "/api/v1/vehicles/:vehicle_id/capacity",
            put(update_preferences::<E, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct AcceptBody {
    pub vehicle_id: VehicleId,
    pub operator_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PickupBody {
    pub code: String,
    pub operator_id: String,
    #[serde(default)]
    pub proof_photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitBody {
    pub operator_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeliverBody {
    pub code: String,
    pub operator_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub actor: String,
}

async fn create_shipment<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Json(draft): Json<ShipmentDraft>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.create_shipment(draft, Utc::now()) {
        Ok(shipment) => (StatusCode::CREATED, Json(shipment.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

async fn shipment_status<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Path(shipment_id): Path<String>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.shipment(&ShipmentId(shipment_id)) {
        Ok(shipment) => Json(shipment.status_view()).into_response(),
        Err(error) => error_response(error),
    }
}

async fn list_matches<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Path(shipment_id): Path<String>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.find_matches(&ShipmentId(shipment_id), Utc::now()) {
        Ok(candidates) => Json(candidates).into_response(),
        Err(error) => error_response(error),
    }
}

async fn accept_match<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Path(shipment_id): Path<String>,
    Json(body): Json<AcceptBody>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.accept(
        &ShipmentId(shipment_id),
        &body.vehicle_id,
        &body.operator_id,
        Utc::now(),
    ) {
        Ok(shipment) => {
            let payload = json!({
                "shipment_id": shipment.shipment_id,
                "status": shipment.state.label(),
                "vehicle_id": shipment.assigned_vehicle_id,
                "pickup_code": shipment.pickup_code,
                "quote": shipment.quote,
            });
            Json(payload).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn confirm_pickup<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Path(shipment_id): Path<String>,
    Json(body): Json<PickupBody>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.pickup(
        &ShipmentId(shipment_id),
        &body.code,
        &body.operator_id,
        body.proof_photo,
        Utc::now(),
    ) {
        Ok(shipment) => {
            let payload = json!({
                "shipment_id": shipment.shipment_id,
                "status": shipment.state.label(),
                "delivery_code": shipment.delivery_code,
            });
            Json(payload).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn mark_in_transit<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Path(shipment_id): Path<String>,
    Json(body): Json<TransitBody>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.mark_in_transit(&ShipmentId(shipment_id), &body.operator_id, Utc::now()) {
        Ok(shipment) => Json(shipment.status_view()).into_response(),
        Err(error) => error_response(error),
    }
}

async fn confirm_delivery<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Path(shipment_id): Path<String>,
    Json(body): Json<DeliverBody>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.deliver(
        &ShipmentId(shipment_id),
        &body.code,
        &body.operator_id,
        Utc::now(),
    ) {
        Ok(shipment) => {
            let payload = json!({
                "shipment_id": shipment.shipment_id,
                "status": shipment.state.label(),
                "fare": shipment.settlement,
            });
            Json(payload).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn cancel_shipment<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Path(shipment_id): Path<String>,
    Json(body): Json<CancelBody>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.cancel(&ShipmentId(shipment_id), &body.actor, Utc::now()) {
        Ok(shipment) => Json(shipment.status_view()).into_response(),
        Err(error) => error_response(error),
    }
}

async fn register_vehicle<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Json(registration): Json<VehicleRegistration>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.register_vehicle(registration) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn vehicle_snapshot<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Path(vehicle_id): Path<String>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.vehicle(&VehicleId(vehicle_id)) {
        Ok(record) => Json(record).into_response(),
        Err(error) => error_response(error),
    }
}

async fn update_preferences<E, N>(
    State(service): State<Arc<DispatchService<E, N>>>,
    Path(vehicle_id): Path<String>,
    Json(preferences): Json<VehiclePreferences>,
) -> Response
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    match service.update_preferences(&VehicleId(vehicle_id), preferences) {
        Ok(record) => Json(record).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: DispatchError) -> Response {
    let status = match &error {
        DispatchError::ShipmentNotFound | DispatchError::VehicleNotFound => StatusCode::NOT_FOUND,
        DispatchError::DuplicateVehicle
        | DispatchError::VehicleNotAccepting
        | DispatchError::StateConflict { .. }
        | DispatchError::InsufficientCapacity { .. } => StatusCode::CONFLICT,
        DispatchError::InvalidCode
        | DispatchError::IllegalTransition { .. }
        | DispatchError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DispatchError::Expired => StatusCode::GONE,
        DispatchError::QuoteUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
