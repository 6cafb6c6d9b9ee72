use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for shipment requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShipmentId(pub String);

impl fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for vehicles, issued by the onboarding collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A coordinate with the human-readable label shown on dispatch paperwork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub label: String,
    pub location: GeoPoint,
}

/// Cargo categories a vehicle can declare itself willing to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Parcel,
    Document,
    Grocery,
    Furniture,
    Appliance,
    Fragile,
}

impl ItemType {
    pub const ALL: [ItemType; 6] = [
        ItemType::Parcel,
        ItemType::Document,
        ItemType::Grocery,
        ItemType::Furniture,
        ItemType::Appliance,
        ItemType::Fragile,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ItemType::Parcel => "parcel",
            ItemType::Document => "document",
            ItemType::Grocery => "grocery",
            ItemType::Furniture => "furniture",
            ItemType::Appliance => "appliance",
            ItemType::Fragile => "fragile",
        }
    }
}

/// Vehicle classes, each with a stock rate card applied at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    TwoWheeler,
    ThreeWheeler,
    LightTruck,
    MediumTruck,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::TwoWheeler,
        VehicleClass::ThreeWheeler,
        VehicleClass::LightTruck,
        VehicleClass::MediumTruck,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            VehicleClass::TwoWheeler => "two_wheeler",
            VehicleClass::ThreeWheeler => "three_wheeler",
            VehicleClass::LightTruck => "light_truck",
            VehicleClass::MediumTruck => "medium_truck",
        }
    }

    /// Stock rates until the operator sets their own.
    pub fn default_rate(self) -> RatePlan {
        match self {
            VehicleClass::TwoWheeler => RatePlan {
                per_km: dec!(8),
                per_kg: dec!(2),
            },
            VehicleClass::ThreeWheeler => RatePlan {
                per_km: dec!(10),
                per_kg: dec!(3),
            },
            VehicleClass::LightTruck => RatePlan {
                per_km: dec!(14),
                per_kg: dec!(4),
            },
            VehicleClass::MediumTruck => RatePlan {
                per_km: dec!(18),
                per_kg: dec!(5),
            },
        }
    }
}

/// Operator pricing: a distance rate and a billable-weight rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePlan {
    pub per_km: Decimal,
    pub per_kg: Decimal,
}

/// Shipment lifecycle states. Transitions are owned exclusively by the
/// dispatch service; see [`crate::dispatch::service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentState {
    Placed,
    Matching,
    DriverAccepted,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
    Expired,
}

impl ShipmentState {
    pub const fn label(self) -> &'static str {
        match self {
            ShipmentState::Placed => "placed",
            ShipmentState::Matching => "matching",
            ShipmentState::DriverAccepted => "driver_accepted",
            ShipmentState::PickedUp => "picked_up",
            ShipmentState::InTransit => "in_transit",
            ShipmentState::Delivered => "delivered",
            ShipmentState::Cancelled => "cancelled",
            ShipmentState::Expired => "expired",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ShipmentState::Delivered | ShipmentState::Cancelled | ShipmentState::Expired
        )
    }
}

/// Requester-supplied payload for creating a shipment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentDraft {
    pub requester_id: String,
    pub item_type: ItemType,
    pub weight_kg: f64,
    pub volume_l: f64,
    pub pickup: Waypoint,
    pub dropoff: Waypoint,
    #[serde(default)]
    pub offered_price: Option<Decimal>,
}
