use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{ShipmentId, ShipmentState};

/// One attempted transition, applied or refused, kept for dispute
/// resolution around pickup and delivery.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    pub shipment_id: ShipmentId,
    pub actor: String,
    pub from: ShipmentState,
    pub to: ShipmentState,
    pub outcome: TransitionOutcome,
    /// One-time codes stay out of log output; the audit trail is the only
    /// place a presented code is retained.
    pub presented_code: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied,
    Refused { reason: String },
}

/// Append-only, in-memory event log.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("event log mutex poisoned")
            .push(event);
    }

    pub fn for_shipment(&self, shipment_id: &ShipmentId) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("event log mutex poisoned")
            .iter()
            .filter(|event| &event.shipment_id == shipment_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("event log mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
