//! Capacity-constrained cargo dispatch: vehicle capacity ledger, shipment
//! lifecycle, candidate matching, and deterministic fares.

pub mod audit;
pub mod capacity;
pub mod demand;
pub mod domain;
pub mod fare;
pub mod fleet;
pub mod matching;
pub mod notify;
pub mod router;
pub mod routing;
pub mod service;
pub mod store;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use audit::{EventLog, LifecycleEvent, TransitionOutcome};
pub use capacity::{
    CapacityError, CapacityRegistry, SpareCapacity, VehicleCapacity, VehiclePreferences,
    VehicleRegistration,
};
pub use demand::{DemandSchedule, HourWindow};
pub use domain::{
    GeoPoint, ItemType, RatePlan, ShipmentDraft, ShipmentId, ShipmentState, VehicleClass,
    VehicleId, Waypoint,
};
pub use fare::{FareBreakdown, FareInputs, FarePolicy};
pub use fleet::{import_roster, import_roster_from_path, FleetImportError};
pub use matching::{MatchCandidate, MatchFactor, MatchingConfig, MatchingEngine, ScorePart};
pub use notify::{DispatchNotifier, NotifyError, ShipmentUpdate};
pub use router::dispatch_router;
pub use routing::{HaversineEstimator, RouteEstimate, RouteEstimator, RoutingConfig};
pub use service::{DispatchError, DispatchService, LifecycleConfig};
pub use store::{ShipmentRequest, ShipmentStore, ShipmentView, StoreError};
pub use sweep::run_expiry_sweep;

/// Engine dials handed to [`DispatchService::new`] as one bundle.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    pub matching: MatchingConfig,
    pub fare: FarePolicy,
    pub demand: DemandSchedule,
    pub lifecycle: LifecycleConfig,
}
