//! Shipment request store. Transitions are compare-and-swap on the expected
//! state under a per-record mutex, which is what makes acceptance, delivery,
//! cancellation, and the expiry sweep safe to race against each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::domain::{ItemType, ShipmentDraft, ShipmentId, ShipmentState, VehicleId, Waypoint};
use super::fare::{FareBreakdown, FareInputs};

/// A shipment request and everything the lifecycle pins to it. The quote and
/// its inputs are frozen at acceptance and never recomputed from live data.
#[derive(Debug, Clone, Serialize)]
pub struct ShipmentRequest {
    pub shipment_id: ShipmentId,
    pub requester_id: String,
    pub item_type: ItemType,
    pub weight_kg: f64,
    pub volume_l: f64,
    pub pickup: Waypoint,
    pub dropoff: Waypoint,
    pub offered_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub state: ShipmentState,
    pub assigned_vehicle_id: Option<VehicleId>,
    pub quote: Option<FareBreakdown>,
    pub fare_inputs: Option<FareInputs>,
    pub settlement: Option<FareBreakdown>,
    pub pickup_code: Option<String>,
    pub delivery_code: Option<String>,
    pub proof_of_pickup: Option<String>,
}

impl ShipmentRequest {
    pub fn from_draft(
        shipment_id: ShipmentId,
        draft: ShipmentDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            shipment_id,
            requester_id: draft.requester_id,
            item_type: draft.item_type,
            weight_kg: draft.weight_kg,
            volume_l: draft.volume_l,
            pickup: draft.pickup,
            dropoff: draft.dropoff,
            offered_price: draft.offered_price,
            created_at,
            state: ShipmentState::Placed,
            assigned_vehicle_id: None,
            quote: None,
            fare_inputs: None,
            settlement: None,
            pickup_code: None,
            delivery_code: None,
            proof_of_pickup: None,
        }
    }

    /// Snapshot for status endpoints. One-time codes never appear here; they
    /// travel only in the direct responses to the party that owns them.
    pub fn status_view(&self) -> ShipmentView {
        ShipmentView {
            shipment_id: self.shipment_id.clone(),
            status: self.state.label(),
            item_type: self.item_type,
            weight_kg: self.weight_kg,
            volume_l: self.volume_l,
            pickup: self.pickup.label.clone(),
            dropoff: self.dropoff.label.clone(),
            created_at: self.created_at,
            assigned_vehicle_id: self.assigned_vehicle_id.clone(),
            quoted_total: self.quote.as_ref().map(|quote| quote.total),
            settled_total: self.settlement.as_ref().map(|fare| fare.total),
        }
    }
}

/// Code-free view of a shipment, safe to show either party.
#[derive(Debug, Clone, Serialize)]
pub struct ShipmentView {
    pub shipment_id: ShipmentId,
    pub status: &'static str,
    pub item_type: ItemType,
    pub weight_kg: f64,
    pub volume_l: f64,
    pub pickup: String,
    pub dropoff: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_vehicle_id: Option<VehicleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_total: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_total: Option<Decimal>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("shipment not found")]
    NotFound,
    #[error("shipment is {}, expected {}", .actual.label(), .expected.label())]
    StateConflict {
        expected: ShipmentState,
        actual: ShipmentState,
    },
}

/// In-memory store with one mutex per shipment record.
#[derive(Default)]
pub struct ShipmentStore {
    shipments: RwLock<HashMap<ShipmentId, Arc<Mutex<ShipmentRequest>>>>,
}

impl ShipmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers are issued by the service, so inserts never collide.
    pub fn insert(&self, shipment: ShipmentRequest) -> ShipmentRequest {
        let mut shipments = self.shipments.write().expect("store lock poisoned");
        shipments.insert(
            shipment.shipment_id.clone(),
            Arc::new(Mutex::new(shipment.clone())),
        );
        shipment
    }

    pub fn fetch(&self, shipment_id: &ShipmentId) -> Result<ShipmentRequest, StoreError> {
        let handle = self.handle(shipment_id)?;
        let record = handle.lock().expect("shipment mutex poisoned");
        Ok(record.clone())
    }

    pub fn list_by_state(&self, state: ShipmentState) -> Vec<ShipmentRequest> {
        let shipments = self.shipments.read().expect("store lock poisoned");
        let mut found: Vec<ShipmentRequest> = shipments
            .values()
            .filter_map(|handle| {
                let record = handle.lock().expect("shipment mutex poisoned");
                (record.state == state).then(|| record.clone())
            })
            .collect();
        found.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.shipment_id.0.cmp(&b.shipment_id.0))
        });
        found
    }

    /// Compare-and-swap on the state. `apply` runs while the record lock is
    /// held, so artifacts such as codes and the frozen quote land atomically
    /// with the state change.
    pub fn transition_with<F>(
        &self,
        shipment_id: &ShipmentId,
        expected: ShipmentState,
        next: ShipmentState,
        apply: F,
    ) -> Result<ShipmentRequest, StoreError>
    where
        F: FnOnce(&mut ShipmentRequest),
    {
        let handle = self.handle(shipment_id)?;
        let mut record = handle.lock().expect("shipment mutex poisoned");
        if record.state != expected {
            return Err(StoreError::StateConflict {
                expected,
                actual: record.state,
            });
        }
        record.state = next;
        apply(&mut record);
        Ok(record.clone())
    }

    pub fn transition(
        &self,
        shipment_id: &ShipmentId,
        expected: ShipmentState,
        next: ShipmentState,
    ) -> Result<ShipmentRequest, StoreError> {
        self.transition_with(shipment_id, expected, next, |_| {})
    }

    fn handle(&self, shipment_id: &ShipmentId) -> Result<Arc<Mutex<ShipmentRequest>>, StoreError> {
        let shipments = self.shipments.read().expect("store lock poisoned");
        shipments
            .get(shipment_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}
