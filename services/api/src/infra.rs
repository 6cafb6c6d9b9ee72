use cargolink::config::DispatchSettings;
use cargolink::dispatch::{
    DispatchConfig, DispatchNotifier, ItemType, LifecycleConfig, MatchingConfig, NotifyError,
    ShipmentUpdate, VehicleClass,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Buffers shipment updates in memory. Stands in for the push gateway in the
/// demo and in single-node deployments.
#[derive(Default, Clone)]
pub(crate) struct InMemoryUpdatePublisher {
    updates: Arc<Mutex<Vec<ShipmentUpdate>>>,
}

impl DispatchNotifier for InMemoryUpdatePublisher {
    fn publish(&self, update: ShipmentUpdate) -> Result<(), NotifyError> {
        let mut guard = self.updates.lock().expect("update mutex poisoned");
        guard.push(update);
        Ok(())
    }
}

impl InMemoryUpdatePublisher {
    pub(crate) fn updates(&self) -> Vec<ShipmentUpdate> {
        self.updates.lock().expect("update mutex poisoned").clone()
    }
}

/// Fold the environment dials into the engine configuration; everything not
/// exposed through the environment keeps its default.
pub(crate) fn dispatch_config(settings: &DispatchSettings) -> DispatchConfig {
    DispatchConfig {
        matching: MatchingConfig {
            tolerance_km: settings.match_tolerance_km,
            top_k: settings.match_top_k,
            ..MatchingConfig::default()
        },
        lifecycle: LifecycleConfig {
            expiry_minutes: settings.expiry_minutes,
        },
        ..DispatchConfig::default()
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

pub(crate) fn parse_vehicle_class(raw: &str) -> Result<VehicleClass, String> {
    let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    VehicleClass::ALL
        .into_iter()
        .find(|class| class.label() == normalized)
        .ok_or_else(|| {
            let known: Vec<&str> = VehicleClass::ALL.iter().map(|class| class.label()).collect();
            format!("unknown vehicle class '{raw}' (expected one of {})", known.join(", "))
        })
}

pub(crate) fn parse_item_type(raw: &str) -> Result<ItemType, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    ItemType::ALL
        .into_iter()
        .find(|item| item.label() == normalized)
        .ok_or_else(|| {
            let known: Vec<&str> = ItemType::ALL.iter().map(|item| item.label()).collect();
            format!("unknown item type '{raw}' (expected one of {})", known.join(", "))
        })
}
