//! Vehicle capacity ledger. Every reservation and release goes through the
//! registry so `reserved <= max` holds on both dimensions at all times.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::domain::{GeoPoint, ItemType, RatePlan, VehicleClass, VehicleId};

/// One capacity record per vehicle. `reserved_*` moves only through
/// [`CapacityRegistry::reserve`] and [`CapacityRegistry::release`].
#[derive(Debug, Clone, Serialize)]
pub struct VehicleCapacity {
    pub vehicle_id: VehicleId,
    pub vehicle_class: VehicleClass,
    pub max_weight_kg: f64,
    pub max_volume_l: f64,
    pub reserved_weight_kg: f64,
    pub reserved_volume_l: f64,
    pub accepting_requests: bool,
    pub accepted_item_types: BTreeSet<ItemType>,
    pub rate: RatePlan,
    pub rating: f32,
    pub route: Vec<GeoPoint>,
    pub registered_seq: u64,
}

impl VehicleCapacity {
    /// Point-in-time `(max - reserved)` on both dimensions.
    pub fn spare(&self) -> SpareCapacity {
        SpareCapacity {
            weight_kg: (self.max_weight_kg - self.reserved_weight_kg).max(0.0),
            volume_l: (self.max_volume_l - self.reserved_volume_l).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpareCapacity {
    pub weight_kg: f64,
    pub volume_l: f64,
}

impl SpareCapacity {
    pub fn covers(&self, weight_kg: f64, volume_l: f64) -> bool {
        self.weight_kg >= weight_kg && self.volume_l >= volume_l
    }
}

/// Onboarding payload. Preferences start permissive: accepting requests,
/// every item type, the class rate card, no declared route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRegistration {
    pub vehicle_id: VehicleId,
    pub vehicle_class: VehicleClass,
    pub max_weight_kg: f64,
    pub max_volume_l: f64,
}

/// Operator-controlled partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehiclePreferences {
    #[serde(default)]
    pub accepting_requests: Option<bool>,
    #[serde(default)]
    pub accepted_item_types: Option<BTreeSet<ItemType>>,
    #[serde(default)]
    pub rate: Option<RatePlan>,
    #[serde(default)]
    pub route: Option<Vec<GeoPoint>>,
    #[serde(default)]
    pub rating: Option<f32>,
}

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("vehicle already registered")]
    DuplicateVehicle,
    #[error("vehicle not found")]
    NotFound,
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
}

/// In-memory registry. Each record sits behind its own mutex so reservations
/// on unrelated vehicles never serialize on each other; the outer map lock is
/// held only long enough to clone a handle.
#[derive(Default)]
pub struct CapacityRegistry {
    vehicles: RwLock<HashMap<VehicleId, Arc<Mutex<VehicleCapacity>>>>,
    registration_seq: AtomicU64,
}

impl CapacityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        registration: VehicleRegistration,
    ) -> Result<VehicleCapacity, CapacityError> {
        let mut vehicles = self.vehicles.write().expect("registry lock poisoned");
        if vehicles.contains_key(&registration.vehicle_id) {
            return Err(CapacityError::DuplicateVehicle);
        }

        let record = VehicleCapacity {
            vehicle_id: registration.vehicle_id.clone(),
            vehicle_class: registration.vehicle_class,
            max_weight_kg: registration.max_weight_kg.max(0.0),
            max_volume_l: registration.max_volume_l.max(0.0),
            reserved_weight_kg: 0.0,
            reserved_volume_l: 0.0,
            accepting_requests: true,
            accepted_item_types: ItemType::ALL.into_iter().collect(),
            rate: registration.vehicle_class.default_rate(),
            rating: 0.0,
            route: Vec::new(),
            registered_seq: self.registration_seq.fetch_add(1, Ordering::Relaxed),
        };
        vehicles.insert(
            registration.vehicle_id,
            Arc::new(Mutex::new(record.clone())),
        );
        Ok(record)
    }

    pub fn set_preferences(
        &self,
        vehicle_id: &VehicleId,
        preferences: VehiclePreferences,
    ) -> Result<VehicleCapacity, CapacityError> {
        let handle = self.handle(vehicle_id)?;
        let mut record = handle.lock().expect("vehicle mutex poisoned");
        if let Some(accepting) = preferences.accepting_requests {
            record.accepting_requests = accepting;
        }
        if let Some(item_types) = preferences.accepted_item_types {
            record.accepted_item_types = item_types;
        }
        if let Some(rate) = preferences.rate {
            record.rate = rate;
        }
        if let Some(route) = preferences.route {
            record.route = route;
        }
        if let Some(rating) = preferences.rating {
            record.rating = rating.clamp(0.0, 5.0);
        }
        Ok(record.clone())
    }

    /// Check-and-reserve on both dimensions under the record lock. Either
    /// both reservations land or neither does.
    pub fn reserve(
        &self,
        vehicle_id: &VehicleId,
        weight_kg: f64,
        volume_l: f64,
    ) -> Result<(), CapacityError> {
        let handle = self.handle(vehicle_id)?;
        let mut record = handle.lock().expect("vehicle mutex poisoned");
        let spare = record.spare();
        if !spare.covers(weight_kg, volume_l) {
            return Err(CapacityError::InsufficientCapacity {
                requested_weight_kg: weight_kg,
                requested_volume_l: volume_l,
                free_weight_kg: spare.weight_kg,
                free_volume_l: spare.volume_l,
            });
        }
        record.reserved_weight_kg += weight_kg;
        record.reserved_volume_l += volume_l;
        Ok(())
    }

    /// Return previously reserved capacity, clamped so `reserved` never goes
    /// negative.
    pub fn release(
        &self,
        vehicle_id: &VehicleId,
        weight_kg: f64,
        volume_l: f64,
    ) -> Result<(), CapacityError> {
        let handle = self.handle(vehicle_id)?;
        let mut record = handle.lock().expect("vehicle mutex poisoned");
        record.reserved_weight_kg = (record.reserved_weight_kg - weight_kg).max(0.0);
        record.reserved_volume_l = (record.reserved_volume_l - volume_l).max(0.0);
        Ok(())
    }

    pub fn available(&self, vehicle_id: &VehicleId) -> Result<SpareCapacity, CapacityError> {
        Ok(self.snapshot(vehicle_id)?.spare())
    }

    pub fn snapshot(&self, vehicle_id: &VehicleId) -> Result<VehicleCapacity, CapacityError> {
        let handle = self.handle(vehicle_id)?;
        let record = handle.lock().expect("vehicle mutex poisoned");
        Ok(record.clone())
    }

    /// Snapshot of every record, in registration order. Snapshots may be
    /// stale by the time scoring finishes; the reserve at acceptance is the
    /// authority.
    pub fn snapshot_all(&self) -> Vec<VehicleCapacity> {
        let vehicles = self.vehicles.read().expect("registry lock poisoned");
        let mut records: Vec<VehicleCapacity> = vehicles
            .values()
            .map(|handle| handle.lock().expect("vehicle mutex poisoned").clone())
            .collect();
        records.sort_by_key(|record| record.registered_seq);
        records
    }

    fn handle(&self, vehicle_id: &VehicleId) -> Result<Arc<Mutex<VehicleCapacity>>, CapacityError> {
        let vehicles = self.vehicles.read().expect("registry lock poisoned");
        vehicles
            .get(vehicle_id)
            .cloned()
            .ok_or(CapacityError::NotFound)
    }
}
