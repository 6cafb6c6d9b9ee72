//! Lifecycle controller. Owns every state transition, composes the capacity
//! registry, shipment store, matching engine, and notification hook, and
//! keeps the audit trail of applied and refused transitions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::audit::{EventLog, LifecycleEvent, TransitionOutcome};
use super::capacity::{
    CapacityError, CapacityRegistry, VehicleCapacity, VehiclePreferences, VehicleRegistration,
};
use super::domain::{ShipmentDraft, ShipmentId, ShipmentState, VehicleId};
use super::fare;
use super::matching::{MatchCandidate, MatchingEngine};
use super::notify::{DispatchNotifier, ShipmentUpdate};
use super::routing::RouteEstimator;
use super::store::{ShipmentRequest, ShipmentStore, StoreError};
use super::DispatchConfig;

/// How long an unaccepted request may sit in `placed`/`matching` before the
/// sweep expires it.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub expiry_minutes: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { expiry_minutes: 15 }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("shipment not found")]
    ShipmentNotFound,
    #[error("vehicle not found")]
    VehicleNotFound,
    #[error("vehicle already registered")]
    DuplicateVehicle,
    #[error("vehicle is not accepting requests")]
    VehicleNotAccepting,
    #[error(
        "insufficient spare capacity: requested {requested_weight_kg} kg / {requested_volume_l} L, \
         free {free_weight_kg} kg / {free_volume_l} L"
    )]
    InsufficientCapacity {
        requested_weight_kg: f64,
        requested_volume_l: f64,
        free_weight_kg: f64,
        free_volume_l: f64,
    },
    #[error("shipment is {}, expected {}", .actual.label(), .expected.label())]
    StateConflict {
        expected: ShipmentState,
        actual: ShipmentState,
    },
    #[error("one-time code does not match")]
    InvalidCode,
    #[error("cannot {action} a shipment in state '{}'", .state.label())]
    IllegalTransition {
        action: &'static str,
        state: ShipmentState,
    },
    #[error("shipment expired before the acceptance could land")]
    Expired,
    #[error("shipment has no frozen quote to settle against")]
    QuoteUnavailable,
    #[error("invalid shipment: {0}")]
    Validation(&'static str),
}

impl From<CapacityError> for DispatchError {
    fn from(err: CapacityError) -> Self {
        match err {
            CapacityError::DuplicateVehicle => Self::DuplicateVehicle,
            CapacityError::NotFound => Self::VehicleNotFound,
            CapacityError::InsufficientCapacity {
                requested_weight_kg,
                requested_volume_l,
                free_weight_kg,
                free_volume_l,
            } => Self::InsufficientCapacity {
                requested_weight_kg,
                requested_volume_l,
                free_weight_kg,
                free_volume_l,
            },
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::ShipmentNotFound,
            StoreError::StateConflict { expected, actual } => {
                Self::StateConflict { expected, actual }
            }
        }
    }
}

static SHIPMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_shipment_id() -> ShipmentId {
    let id = SHIPMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ShipmentId(format!("shp-{id:06}"))
}

fn next_code() -> String {
    let code: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("{code:04}")
}

/// The dispatch engine's front door. One instance serves every caller;
/// interior locking lives in the registry and the store.
pub struct DispatchService<E, N> {
    registry: Arc<CapacityRegistry>,
    store: Arc<ShipmentStore>,
    notifier: Arc<N>,
    matching: MatchingEngine<E>,
    config: DispatchConfig,
    events: EventLog,
}

impl<E, N> DispatchService<E, N>
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    pub fn new(
        registry: Arc<CapacityRegistry>,
        store: Arc<ShipmentStore>,
        estimator: Arc<E>,
        notifier: Arc<N>,
        config: DispatchConfig,
    ) -> Self {
        let matching = MatchingEngine::new(
            config.matching.clone(),
            estimator,
            config.fare.clone(),
            config.demand.clone(),
        );
        Self {
            registry,
            store,
            notifier,
            matching,
            config,
            events: EventLog::new(),
        }
    }

    // ---- vehicle side ----

    pub fn register_vehicle(
        &self,
        registration: VehicleRegistration,
    ) -> Result<VehicleCapacity, DispatchError> {
        let record = self.registry.register(registration)?;
        info!(
            vehicle_id = %record.vehicle_id,
            class = record.vehicle_class.label(),
            "vehicle registered"
        );
        Ok(record)
    }

    pub fn update_preferences(
        &self,
        vehicle_id: &VehicleId,
        preferences: VehiclePreferences,
    ) -> Result<VehicleCapacity, DispatchError> {
        Ok(self.registry.set_preferences(vehicle_id, preferences)?)
    }

    pub fn vehicle(&self, vehicle_id: &VehicleId) -> Result<VehicleCapacity, DispatchError> {
        Ok(self.registry.snapshot(vehicle_id)?)
    }

    // ---- requester side ----

    pub fn create_shipment(
        &self,
        draft: ShipmentDraft,
        now: DateTime<Utc>,
    ) -> Result<ShipmentRequest, DispatchError> {
        validate_draft(&draft)?;
        let shipment = ShipmentRequest::from_draft(next_shipment_id(), draft, now);
        let stored = self.store.insert(shipment);
        debug!(shipment_id = %stored.shipment_id, "shipment placed");
        Ok(stored)
    }

    pub fn shipment(&self, shipment_id: &ShipmentId) -> Result<ShipmentRequest, DispatchError> {
        Ok(self.store.fetch(shipment_id)?)
    }

    pub fn events_for(&self, shipment_id: &ShipmentId) -> Vec<LifecycleEvent> {
        self.events.for_shipment(shipment_id)
    }

    // ---- matching ----

    /// Rank candidate vehicles for a pending shipment. Read-only apart from
    /// flipping `placed` to `matching` the first time candidates come back
    /// non-empty. An empty result is a valid outcome, not an error.
    pub fn find_matches(
        &self,
        shipment_id: &ShipmentId,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchCandidate>, DispatchError> {
        let shipment = self.store.fetch(shipment_id)?;
        match shipment.state {
            ShipmentState::Placed | ShipmentState::Matching => {}
            state => {
                return Err(DispatchError::IllegalTransition {
                    action: "match",
                    state,
                })
            }
        }

        let candidates = self
            .matching
            .rank(&shipment, self.registry.snapshot_all(), now);

        if shipment.state == ShipmentState::Placed && !candidates.is_empty() {
            match self
                .store
                .transition(shipment_id, ShipmentState::Placed, ShipmentState::Matching)
            {
                Ok(_) => {
                    self.record(
                        shipment_id,
                        "matching-engine",
                        ShipmentState::Placed,
                        ShipmentState::Matching,
                        TransitionOutcome::Applied,
                        None,
                        now,
                    );
                    let mut details = BTreeMap::new();
                    details.insert("candidates".to_string(), candidates.len().to_string());
                    self.notify("match_found", shipment_id, ShipmentState::Matching, details);
                }
                // a concurrent query already flipped it; this ranking stands
                Err(StoreError::StateConflict {
                    actual: ShipmentState::Matching,
                    ..
                }) => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(candidates)
    }

    // ---- operator side ----

    /// Accept a candidate on behalf of a vehicle operator. Capacity is
    /// reserved before the state CAS; losing the CAS releases the
    /// reservation, so no partial effect survives either way.
    pub fn accept(
        &self,
        shipment_id: &ShipmentId,
        vehicle_id: &VehicleId,
        operator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ShipmentRequest, DispatchError> {
        let shipment = self.store.fetch(shipment_id)?;
        match shipment.state {
            ShipmentState::Matching => {}
            // not yet matched, or another operator already holds it: the
            // caller should re-query for fresh candidates
            state @ (ShipmentState::Placed
            | ShipmentState::DriverAccepted
            | ShipmentState::PickedUp
            | ShipmentState::InTransit) => {
                let error = DispatchError::StateConflict {
                    expected: ShipmentState::Matching,
                    actual: state,
                };
                self.refuse(shipment_id, operator_id, state, ShipmentState::DriverAccepted, &error, None, now);
                return Err(error);
            }
            state => {
                let error = DispatchError::IllegalTransition {
                    action: "accept",
                    state,
                };
                self.refuse(shipment_id, operator_id, state, ShipmentState::DriverAccepted, &error, None, now);
                return Err(error);
            }
        }

        let vehicle = self.registry.snapshot(vehicle_id)?;
        if !vehicle.accepting_requests {
            let error = DispatchError::VehicleNotAccepting;
            self.refuse(shipment_id, operator_id, ShipmentState::Matching, ShipmentState::DriverAccepted, &error, None, now);
            return Err(error);
        }

        // route estimate and fare inputs are resolved before any lock is
        // taken; the lock sections below are pure compare-and-swap
        let inputs = self.matching.candidate_inputs(&shipment, &vehicle, now);
        let quote = fare::quote(&self.config.fare, &inputs);

        if let Err(err) = self
            .registry
            .reserve(vehicle_id, shipment.weight_kg, shipment.volume_l)
        {
            let error = DispatchError::from(err);
            self.refuse(shipment_id, operator_id, ShipmentState::Matching, ShipmentState::DriverAccepted, &error, None, now);
            return Err(error);
        }

        let pickup_code = next_code();
        let accepted = self.store.transition_with(
            shipment_id,
            ShipmentState::Matching,
            ShipmentState::DriverAccepted,
            |record| {
                record.assigned_vehicle_id = Some(vehicle_id.clone());
                record.quote = Some(quote.clone());
                record.fare_inputs = Some(inputs.clone());
                record.pickup_code = Some(pickup_code);
            },
        );

        let accepted = match accepted {
            Ok(record) => record,
            Err(err) => {
                // the reservation must not outlive a lost CAS
                if let Err(release_err) =
                    self.registry
                        .release(vehicle_id, shipment.weight_kg, shipment.volume_l)
                {
                    warn!(%vehicle_id, error = %release_err, "rollback release failed");
                }
                let error = match err {
                    StoreError::StateConflict {
                        actual: ShipmentState::Expired,
                        ..
                    } => DispatchError::Expired,
                    other => DispatchError::from(other),
                };
                self.refuse(shipment_id, operator_id, ShipmentState::Matching, ShipmentState::DriverAccepted, &error, None, now);
                return Err(error);
            }
        };

        self.record(
            shipment_id,
            operator_id,
            ShipmentState::Matching,
            ShipmentState::DriverAccepted,
            TransitionOutcome::Applied,
            None,
            now,
        );
        let mut details = BTreeMap::new();
        details.insert("vehicle_id".to_string(), vehicle_id.0.clone());
        details.insert("quoted_total".to_string(), quote.total.to_string());
        self.notify(
            "match_accepted",
            shipment_id,
            ShipmentState::DriverAccepted,
            details,
        );
        info!(%shipment_id, %vehicle_id, total = %quote.total, "shipment accepted");
        Ok(accepted)
    }

    /// Pickup is gated by the one-time code issued at acceptance. A correct
    /// code consumes itself and issues the delivery code; a wrong code
    /// refuses the transition and may be retried.
    pub fn pickup(
        &self,
        shipment_id: &ShipmentId,
        presented_code: &str,
        operator_id: &str,
        proof_photo: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ShipmentRequest, DispatchError> {
        let shipment = self.store.fetch(shipment_id)?;
        if shipment.state != ShipmentState::DriverAccepted {
            let error = DispatchError::IllegalTransition {
                action: "pickup",
                state: shipment.state,
            };
            self.refuse(shipment_id, operator_id, shipment.state, ShipmentState::PickedUp, &error, Some(presented_code), now);
            return Err(error);
        }
        if shipment.pickup_code.as_deref() != Some(presented_code) {
            let error = DispatchError::InvalidCode;
            self.refuse(shipment_id, operator_id, shipment.state, ShipmentState::PickedUp, &error, Some(presented_code), now);
            return Err(error);
        }

        let delivery_code = next_code();
        let updated = self.store.transition_with(
            shipment_id,
            ShipmentState::DriverAccepted,
            ShipmentState::PickedUp,
            |record| {
                record.pickup_code = None;
                record.delivery_code = Some(delivery_code);
                record.proof_of_pickup = proof_photo;
            },
        );
        let updated = match updated {
            Ok(record) => record,
            Err(err) => {
                let error = DispatchError::from(err);
                self.refuse(shipment_id, operator_id, ShipmentState::DriverAccepted, ShipmentState::PickedUp, &error, Some(presented_code), now);
                return Err(error);
            }
        };

        self.record(
            shipment_id,
            operator_id,
            ShipmentState::DriverAccepted,
            ShipmentState::PickedUp,
            TransitionOutcome::Applied,
            Some(presented_code),
            now,
        );
        self.notify("picked_up", shipment_id, ShipmentState::PickedUp, BTreeMap::new());
        info!(%shipment_id, "cargo picked up");
        Ok(updated)
    }

    /// Optional waypoint between pickup and delivery.
    pub fn mark_in_transit(
        &self,
        shipment_id: &ShipmentId,
        operator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ShipmentRequest, DispatchError> {
        let shipment = self.store.fetch(shipment_id)?;
        if shipment.state != ShipmentState::PickedUp {
            let error = DispatchError::IllegalTransition {
                action: "mark in transit",
                state: shipment.state,
            };
            self.refuse(shipment_id, operator_id, shipment.state, ShipmentState::InTransit, &error, None, now);
            return Err(error);
        }

        let updated = match self.store.transition(
            shipment_id,
            ShipmentState::PickedUp,
            ShipmentState::InTransit,
        ) {
            Ok(record) => record,
            Err(err) => {
                let error = DispatchError::from(err);
                self.refuse(shipment_id, operator_id, ShipmentState::PickedUp, ShipmentState::InTransit, &error, None, now);
                return Err(error);
            }
        };

        self.record(
            shipment_id,
            operator_id,
            ShipmentState::PickedUp,
            ShipmentState::InTransit,
            TransitionOutcome::Applied,
            None,
            now,
        );
        self.notify("in_transit", shipment_id, ShipmentState::InTransit, BTreeMap::new());
        Ok(updated)
    }

    /// Delivery settles the fare from the inputs frozen at acceptance. The
    /// quote is binding: live demand changes since acceptance do not move the
    /// settlement.
    pub fn deliver(
        &self,
        shipment_id: &ShipmentId,
        presented_code: &str,
        operator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ShipmentRequest, DispatchError> {
        let shipment = self.store.fetch(shipment_id)?;
        let from = shipment.state;
        if !matches!(from, ShipmentState::PickedUp | ShipmentState::InTransit) {
            let error = DispatchError::IllegalTransition {
                action: "deliver",
                state: from,
            };
            self.refuse(shipment_id, operator_id, from, ShipmentState::Delivered, &error, Some(presented_code), now);
            return Err(error);
        }
        if shipment.delivery_code.as_deref() != Some(presented_code) {
            let error = DispatchError::InvalidCode;
            self.refuse(shipment_id, operator_id, from, ShipmentState::Delivered, &error, Some(presented_code), now);
            return Err(error);
        }

        let (inputs, quoted) = match (&shipment.fare_inputs, &shipment.quote) {
            (Some(inputs), Some(quoted)) => (inputs.clone(), quoted.clone()),
            _ => {
                let error = DispatchError::QuoteUnavailable;
                self.refuse(shipment_id, operator_id, from, ShipmentState::Delivered, &error, Some(presented_code), now);
                return Err(error);
            }
        };

        let settlement = fare::quote(&self.config.fare, &inputs);
        if settlement.total != quoted.total {
            warn!(
                %shipment_id,
                quoted = %quoted.total,
                settled = %settlement.total,
                "fare drift between quote and settlement"
            );
        }

        let updated = match self.store.transition_with(
            shipment_id,
            from,
            ShipmentState::Delivered,
            |record| {
                record.delivery_code = None;
                record.settlement = Some(settlement.clone());
            },
        ) {
            Ok(record) => record,
            Err(err) => {
                let error = DispatchError::from(err);
                self.refuse(shipment_id, operator_id, from, ShipmentState::Delivered, &error, Some(presented_code), now);
                return Err(error);
            }
        };

        // capacity goes back only once the terminal state holds
        if let Some(vehicle_id) = &updated.assigned_vehicle_id {
            if let Err(err) =
                self.registry
                    .release(vehicle_id, updated.weight_kg, updated.volume_l)
            {
                warn!(%shipment_id, %vehicle_id, error = %err, "capacity release failed after delivery");
            }
        }

        self.record(
            shipment_id,
            operator_id,
            from,
            ShipmentState::Delivered,
            TransitionOutcome::Applied,
            Some(presented_code),
            now,
        );
        let mut details = BTreeMap::new();
        details.insert("settled_total".to_string(), settlement.total.to_string());
        self.notify("delivered", shipment_id, ShipmentState::Delivered, details);
        info!(%shipment_id, total = %settlement.total, "shipment delivered");
        Ok(updated)
    }

    /// Cooperative cancellation, permitted to either party before pickup.
    /// After custody transfers there is nothing to abort, only state to
    /// refuse.
    pub fn cancel(
        &self,
        shipment_id: &ShipmentId,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ShipmentRequest, DispatchError> {
        let shipment = self.store.fetch(shipment_id)?;
        let from = shipment.state;
        if !matches!(
            from,
            ShipmentState::Placed | ShipmentState::Matching | ShipmentState::DriverAccepted
        ) {
            let error = DispatchError::IllegalTransition {
                action: "cancel",
                state: from,
            };
            self.refuse(shipment_id, actor, from, ShipmentState::Cancelled, &error, None, now);
            return Err(error);
        }

        let updated = match self.store.transition_with(
            shipment_id,
            from,
            ShipmentState::Cancelled,
            |record| {
                record.pickup_code = None;
                record.delivery_code = None;
            },
        ) {
            Ok(record) => record,
            Err(err) => {
                let error = DispatchError::from(err);
                self.refuse(shipment_id, actor, from, ShipmentState::Cancelled, &error, None, now);
                return Err(error);
            }
        };

        if from == ShipmentState::DriverAccepted {
            if let Some(vehicle_id) = &updated.assigned_vehicle_id {
                if let Err(err) =
                    self.registry
                        .release(vehicle_id, updated.weight_kg, updated.volume_l)
                {
                    warn!(%shipment_id, %vehicle_id, error = %err, "capacity release failed after cancellation");
                }
            }
        }

        self.record(
            shipment_id,
            actor,
            from,
            ShipmentState::Cancelled,
            TransitionOutcome::Applied,
            None,
            now,
        );
        self.notify("cancelled", shipment_id, ShipmentState::Cancelled, BTreeMap::new());
        info!(%shipment_id, from = from.label(), "shipment cancelled");
        Ok(updated)
    }

    // ---- background ----

    /// Expire `placed`/`matching` requests older than the configured window.
    /// Shares the CAS with acceptance and cancellation, so whichever lands
    /// first wins; CAS losses here are silently skipped.
    pub fn expire_stale(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::minutes(self.config.lifecycle.expiry_minutes);
        let mut expired = 0;
        for state in [ShipmentState::Placed, ShipmentState::Matching] {
            for shipment in self.store.list_by_state(state) {
                if shipment.created_at > cutoff {
                    continue;
                }
                match self.store.transition_with(
                    &shipment.shipment_id,
                    state,
                    ShipmentState::Expired,
                    |record| {
                        record.pickup_code = None;
                        record.delivery_code = None;
                    },
                ) {
                    Ok(_) => {
                        expired += 1;
                        self.record(
                            &shipment.shipment_id,
                            "expiry-sweep",
                            state,
                            ShipmentState::Expired,
                            TransitionOutcome::Applied,
                            None,
                            now,
                        );
                        self.notify(
                            "expired",
                            &shipment.shipment_id,
                            ShipmentState::Expired,
                            BTreeMap::new(),
                        );
                    }
                    Err(StoreError::StateConflict { .. }) | Err(StoreError::NotFound) => {}
                }
            }
        }
        if expired > 0 {
            info!(expired, "expired stale shipment requests");
        }
        expired
    }

    // ---- internals ----

    fn notify(
        &self,
        template: &str,
        shipment_id: &ShipmentId,
        state: ShipmentState,
        details: BTreeMap<String, String>,
    ) {
        let update = ShipmentUpdate {
            template: template.to_string(),
            shipment_id: shipment_id.clone(),
            state,
            details,
        };
        if let Err(err) = self.notifier.publish(update) {
            warn!(%shipment_id, template, error = %err, "notification dropped");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        shipment_id: &ShipmentId,
        actor: &str,
        from: ShipmentState,
        to: ShipmentState,
        outcome: TransitionOutcome,
        presented_code: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.events.record(LifecycleEvent {
            shipment_id: shipment_id.clone(),
            actor: actor.to_string(),
            from,
            to,
            outcome,
            presented_code: presented_code.map(str::to_string),
            recorded_at: now,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn refuse(
        &self,
        shipment_id: &ShipmentId,
        actor: &str,
        from: ShipmentState,
        to: ShipmentState,
        error: &DispatchError,
        presented_code: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.record(
            shipment_id,
            actor,
            from,
            to,
            TransitionOutcome::Refused {
                reason: error.to_string(),
            },
            presented_code,
            now,
        );
    }
}

fn validate_draft(draft: &ShipmentDraft) -> Result<(), DispatchError> {
    if !(draft.weight_kg > 0.0 && draft.weight_kg.is_finite()) {
        return Err(DispatchError::Validation("weight_kg must be positive"));
    }
    if !(draft.volume_l >= 0.0 && draft.volume_l.is_finite()) {
        return Err(DispatchError::Validation("volume_l must be non-negative"));
    }
    for point in [draft.pickup.location, draft.dropoff.location] {
        if !point.lat.is_finite() || !(-90.0..=90.0).contains(&point.lat) {
            return Err(DispatchError::Validation("latitude out of range"));
        }
        if !point.lng.is_finite() || !(-180.0..=180.0).contains(&point.lng) {
            return Err(DispatchError::Validation("longitude out of range"));
        }
    }
    Ok(())
}
