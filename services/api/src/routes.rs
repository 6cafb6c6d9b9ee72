use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use cargolink::dispatch::fare::{km_to_decimal, kg_to_decimal, quote};
use cargolink::dispatch::{
    dispatch_router, import_roster, CapacityRegistry, DemandSchedule, DispatchNotifier,
    DispatchService, FareBreakdown, FareInputs, FarePolicy, RouteEstimator, VehicleClass,
};
use cargolink::error::AppError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct FareEstimateRequest {
    pub(crate) distance_km: f64,
    pub(crate) weight_kg: f64,
    pub(crate) vehicle_class: VehicleClass,
    /// Quote time; defaults to now. Drives the night and demand components.
    #[serde(default)]
    pub(crate) at: Option<DateTime<Utc>>,
    /// Override the schedule-derived demand multiplier.
    #[serde(default)]
    pub(crate) demand_multiplier: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FareEstimateResponse {
    pub(crate) vehicle_class: VehicleClass,
    pub(crate) estimated_at: DateTime<Utc>,
    pub(crate) is_night: bool,
    pub(crate) demand_multiplier: Decimal,
    pub(crate) fare: FareBreakdown,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FleetImportRequest {
    /// Roster CSV, same columns as the ops export consumed by `--fleet-csv`.
    pub(crate) roster_csv: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct FleetImportResponse {
    pub(crate) imported: usize,
}

pub(crate) fn with_dispatch_routes<E, N>(service: Arc<DispatchService<E, N>>) -> axum::Router
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    dispatch_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/fare/estimate",
            axum::routing::post(fare_estimate_endpoint),
        )
        .route(
            "/api/v1/fleet/import",
            axum::routing::post(fleet_import_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Bulk onboarding: register every row of an operations roster CSV. The
/// import is not transactional; rows registered before a failing row stay
/// registered.
pub(crate) async fn fleet_import_endpoint(
    Extension(registry): Extension<Arc<CapacityRegistry>>,
    Json(payload): Json<FleetImportRequest>,
) -> Result<Json<FleetImportResponse>, AppError> {
    let reader = Cursor::new(payload.roster_csv.into_bytes());
    let imported = import_roster(reader, &registry)?;
    Ok(Json(FleetImportResponse { imported }))
}

pub(crate) async fn fare_estimate_endpoint(
    Json(payload): Json<FareEstimateRequest>,
) -> Response {
    match build_estimate(&payload) {
        Ok(estimate) => Json(estimate).into_response(),
        Err(reason) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": reason })),
        )
            .into_response(),
    }
}

/// Stateless preview of the fare a shipment would be quoted. The binding
/// quote is still computed and frozen at acceptance time.
pub(crate) fn build_estimate(
    payload: &FareEstimateRequest,
) -> Result<FareEstimateResponse, String> {
    if !payload.distance_km.is_finite() || payload.distance_km < 0.0 {
        return Err("distance_km must be a non-negative number".to_string());
    }
    if !payload.weight_kg.is_finite() || payload.weight_kg < 0.0 {
        return Err("weight_kg must be a non-negative number".to_string());
    }

    let policy = FarePolicy::default();
    let schedule = DemandSchedule::default();
    let at = payload.at.unwrap_or_else(Utc::now);
    let rate = payload.vehicle_class.default_rate();
    let inputs = FareInputs {
        distance_km: km_to_decimal(payload.distance_km),
        weight_kg: kg_to_decimal(payload.weight_kg),
        per_km: rate.per_km,
        per_kg: rate.per_kg,
        is_night: policy.is_night(at),
        demand_multiplier: payload
            .demand_multiplier
            .unwrap_or_else(|| schedule.multiplier_at(at)),
        quoted_at: at,
    };
    let fare = quote(&policy, &inputs);

    Ok(FareEstimateResponse {
        vehicle_class: payload.vehicle_class,
        estimated_at: at,
        is_night: inputs.is_night,
        demand_multiplier: inputs.demand_multiplier,
        fare,
    })
}
