//! Candidate matching. Read-only over registry snapshots: safe to call
//! repeatedly and concurrently, with staleness corrected by the atomic
//! reserve at acceptance.

mod config;
mod rules;

pub use config::MatchingConfig;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::capacity::VehicleCapacity;
use super::demand::DemandSchedule;
use super::domain::{ShipmentId, VehicleClass, VehicleId};
use super::fare::{self, FareInputs, FarePolicy};
use super::routing::RouteEstimator;
use super::store::ShipmentRequest;

/// A scored, ephemeral pairing. Never persisted; acceptance copies only the
/// vehicle id and the frozen quote onto the shipment.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub shipment_id: ShipmentId,
    pub vehicle_id: VehicleId,
    pub vehicle_class: VehicleClass,
    pub score: f64,
    pub parts: Vec<ScorePart>,
    pub pickup_eta_min: f64,
    pub delivery_eta_min: f64,
    pub quoted_total: Decimal,
    pub rating: f32,
    #[serde(skip)]
    pub registered_seq: u64,
}

/// One factor's contribution to a candidate score, kept for transparent
/// ranking audits.
#[derive(Debug, Clone, Serialize)]
pub struct ScorePart {
    pub factor: MatchFactor,
    pub score: f64,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFactor {
    Detour,
    PickupEta,
    PriceFit,
}

/// Ranks vehicles with spare capacity against a pending shipment.
pub struct MatchingEngine<E> {
    config: MatchingConfig,
    estimator: Arc<E>,
    fare_policy: FarePolicy,
    demand: DemandSchedule,
}

impl<E> MatchingEngine<E>
where
    E: RouteEstimator + 'static,
{
    pub fn new(
        config: MatchingConfig,
        estimator: Arc<E>,
        fare_policy: FarePolicy,
        demand: DemandSchedule,
    ) -> Self {
        Self {
            config,
            estimator,
            fare_policy,
            demand,
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Filter, score, and order the candidates. Ties break on rating, then on
    /// earliest registration, so the ranking is reproducible.
    pub fn rank(
        &self,
        shipment: &ShipmentRequest,
        vehicles: Vec<VehicleCapacity>,
        now: DateTime<Utc>,
    ) -> Vec<MatchCandidate> {
        let mut candidates = Vec::new();
        for (vehicle, geometry) in
            rules::filter_candidates(shipment, vehicles, &self.config, self.estimator.as_ref())
        {
            let inputs = self.candidate_inputs(shipment, &vehicle, now);
            let quoted = fare::quote(&self.fare_policy, &inputs);
            let (parts, score) = rules::score_candidate(
                &geometry,
                shipment.offered_price,
                quoted.total,
                &self.config,
            );
            candidates.push(MatchCandidate {
                shipment_id: shipment.shipment_id.clone(),
                vehicle_id: vehicle.vehicle_id.clone(),
                vehicle_class: vehicle.vehicle_class,
                score,
                parts,
                pickup_eta_min: geometry.pickup_eta_min,
                delivery_eta_min: geometry.delivery_eta_min,
                quoted_total: quoted.total,
                rating: vehicle.rating,
                registered_seq: vehicle.registered_seq,
            });
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.rating.total_cmp(&a.rating))
                .then(a.registered_seq.cmp(&b.registered_seq))
        });
        candidates.truncate(self.config.top_k);
        candidates
    }

    /// The rate-derived inputs a quote for this pairing freezes. Acceptance
    /// calls this with its own `now` so the stored quote matches what the
    /// operator saw modulo the hour the acceptance lands in.
    pub fn candidate_inputs(
        &self,
        shipment: &ShipmentRequest,
        vehicle: &VehicleCapacity,
        now: DateTime<Utc>,
    ) -> FareInputs {
        let leg = self
            .estimator
            .estimate(shipment.pickup.location, shipment.dropoff.location);
        FareInputs {
            distance_km: fare::km_to_decimal(leg.distance_km),
            weight_kg: fare::kg_to_decimal(shipment.weight_kg),
            per_km: vehicle.rate.per_km,
            per_kg: vehicle.rate.per_kg,
            is_night: self.fare_policy.is_night(now),
            demand_multiplier: self.demand.multiplier_at(now),
            quoted_at: now,
        }
    }
}
