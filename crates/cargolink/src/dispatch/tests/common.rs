use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::dispatch::capacity::{CapacityRegistry, VehiclePreferences, VehicleRegistration};
use crate::dispatch::domain::{
    GeoPoint, ItemType, ShipmentDraft, ShipmentId, VehicleClass, VehicleId, Waypoint,
};
use crate::dispatch::notify::{DispatchNotifier, NotifyError, ShipmentUpdate};
use crate::dispatch::routing::HaversineEstimator;
use crate::dispatch::service::DispatchService;
use crate::dispatch::store::ShipmentStore;
use crate::dispatch::DispatchConfig;

/// Notifier that records every update it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub updates: Mutex<Vec<ShipmentUpdate>>,
}

impl RecordingNotifier {
    pub fn templates(&self) -> Vec<String> {
        self.updates
            .lock()
            .expect("notifier mutex poisoned")
            .iter()
            .map(|update| update.template.clone())
            .collect()
    }
}

impl DispatchNotifier for RecordingNotifier {
    fn publish(&self, update: ShipmentUpdate) -> Result<(), NotifyError> {
        self.updates
            .lock()
            .expect("notifier mutex poisoned")
            .push(update);
        Ok(())
    }
}

/// Notifier whose transport is permanently down.
pub struct FailingNotifier;

impl DispatchNotifier for FailingNotifier {
    fn publish(&self, _update: ShipmentUpdate) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("push gateway offline".to_string()))
    }
}

pub struct Harness {
    pub service: Arc<DispatchService<HaversineEstimator, RecordingNotifier>>,
    pub registry: Arc<CapacityRegistry>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn register_truck(&self, id: &str) -> VehicleId {
        register_truck(self.service.as_ref(), id)
    }

    /// A placed-and-matched parcel shipment, ready for acceptance.
    pub fn matched_shipment(&self) -> (ShipmentId, VehicleId) {
        let vehicle_id = self.register_truck("veh-001");
        let shipment = self
            .service
            .create_shipment(parcel_draft(30.0, 100.0), noon())
            .expect("create shipment");
        let candidates = self
            .service
            .find_matches(&shipment.shipment_id, noon())
            .expect("find matches");
        assert!(!candidates.is_empty(), "fixture must produce candidates");
        (shipment.shipment_id, vehicle_id)
    }
}

pub fn harness() -> Harness {
    harness_with(DispatchConfig::default())
}

pub fn harness_with(config: DispatchConfig) -> Harness {
    let registry = Arc::new(CapacityRegistry::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = Arc::new(DispatchService::new(
        registry.clone(),
        Arc::new(ShipmentStore::new()),
        Arc::new(HaversineEstimator::default()),
        notifier.clone(),
        config,
    ));
    Harness {
        service,
        registry,
        notifier,
    }
}

pub fn register_truck<N>(
    service: &DispatchService<HaversineEstimator, N>,
    id: &str,
) -> VehicleId
where
    N: DispatchNotifier + 'static,
{
    let vehicle_id = VehicleId(id.to_string());
    service
        .register_vehicle(VehicleRegistration {
            vehicle_id: vehicle_id.clone(),
            vehicle_class: VehicleClass::LightTruck,
            max_weight_kg: 500.0,
            max_volume_l: 2000.0,
        })
        .expect("register vehicle");
    service
        .update_preferences(
            &vehicle_id,
            VehiclePreferences {
                route: Some(truck_route()),
                rating: Some(4.2),
                ..VehiclePreferences::default()
            },
        )
        .expect("set route");
    vehicle_id
}

/// Mid-afternoon, far from the demand peaks and the night window.
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
}

// Des Moines area fixtures; the truck route runs Drake through downtown to
// the East Village.

pub fn downtown() -> GeoPoint {
    GeoPoint {
        lat: 41.5868,
        lng: -93.6250,
    }
}

pub fn east_village() -> GeoPoint {
    GeoPoint {
        lat: 41.5910,
        lng: -93.6046,
    }
}

pub fn drake() -> GeoPoint {
    GeoPoint {
        lat: 41.6033,
        lng: -93.6571,
    }
}

/// Roughly six kilometres south-west of downtown, outside the tolerance band
/// of [`truck_route`].
pub fn airport() -> GeoPoint {
    GeoPoint {
        lat: 41.5340,
        lng: -93.6631,
    }
}

pub fn truck_route() -> Vec<GeoPoint> {
    vec![drake(), downtown(), east_village()]
}

pub fn parcel_draft(weight_kg: f64, volume_l: f64) -> ShipmentDraft {
    ShipmentDraft {
        requester_id: "req-jordan".to_string(),
        item_type: ItemType::Parcel,
        weight_kg,
        volume_l,
        pickup: Waypoint {
            label: "Downtown depot".to_string(),
            location: downtown(),
        },
        dropoff: Waypoint {
            label: "East Village walk-up".to_string(),
            location: east_village(),
        },
        offered_price: None,
    }
}
