use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::domain::{ShipmentId, ShipmentState};

/// Payload handed to the notification collaborator on state transitions.
/// Delivery is fire-and-forget; a failed publish never blocks or reverses a
/// transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentUpdate {
    pub template: String,
    pub shipment_id: ShipmentId,
    pub state: ShipmentState,
    pub details: BTreeMap<String, String>,
}

/// Outbound notification seam; push and SMS adapters implement this in
/// deployment.
pub trait DispatchNotifier: Send + Sync {
    fn publish(&self, update: ShipmentUpdate) -> Result<(), NotifyError>;
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
