//! Fleet roster import. Seeds the capacity registry from the operations
//! team's CSV export: one row per vehicle, human-readable headers, optional
//! columns for preferences. The import is not transactional; rows registered
//! before a failing row stay registered.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::capacity::{CapacityError, CapacityRegistry, VehiclePreferences, VehicleRegistration};
use super::domain::{GeoPoint, ItemType, RatePlan, VehicleClass, VehicleId};

#[derive(Debug)]
pub enum FleetImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Record { row: usize, reason: String },
    Registry(CapacityError),
}

impl fmt::Display for FleetImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FleetImportError::Io(err) => write!(f, "failed to read fleet roster: {err}"),
            FleetImportError::Csv(err) => write!(f, "malformed fleet roster: {err}"),
            FleetImportError::Record { row, reason } => {
                write!(f, "fleet roster row {row}: {reason}")
            }
            FleetImportError::Registry(err) => write!(f, "fleet registration failed: {err}"),
        }
    }
}

impl std::error::Error for FleetImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FleetImportError::Io(err) => Some(err),
            FleetImportError::Csv(err) => Some(err),
            FleetImportError::Record { .. } => None,
            FleetImportError::Registry(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for FleetImportError {
    fn from(err: std::io::Error) -> Self {
        FleetImportError::Io(err)
    }
}

impl From<csv::Error> for FleetImportError {
    fn from(err: csv::Error) -> Self {
        FleetImportError::Csv(err)
    }
}

impl From<CapacityError> for FleetImportError {
    fn from(err: CapacityError) -> Self {
        FleetImportError::Registry(err)
    }
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "Vehicle ID")]
    vehicle_id: String,
    #[serde(rename = "Class")]
    class: String,
    #[serde(rename = "Max Weight Kg")]
    max_weight_kg: f64,
    #[serde(rename = "Max Volume L")]
    max_volume_l: f64,
    #[serde(rename = "Rate Per Km", default)]
    rate_per_km: Option<Decimal>,
    #[serde(rename = "Rate Per Kg", default)]
    rate_per_kg: Option<Decimal>,
    #[serde(rename = "Item Types", default)]
    item_types: Option<String>,
    #[serde(rename = "Rating", default)]
    rating: Option<f32>,
    #[serde(rename = "Route", default)]
    route: Option<String>,
}

pub fn import_roster_from_path<P: AsRef<Path>>(
    path: P,
    registry: &CapacityRegistry,
) -> Result<usize, FleetImportError> {
    let file = File::open(path)?;
    import_roster(file, registry)
}

/// Register every roster row, applying any preference columns present.
/// Returns the number of vehicles imported.
pub fn import_roster<R: Read>(
    reader: R,
    registry: &CapacityRegistry,
) -> Result<usize, FleetImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut imported = 0;
    for (index, row) in csv_reader.deserialize::<RosterRow>().enumerate() {
        // header occupies line 1
        let line = index + 2;
        let row = row?;

        if row.vehicle_id.is_empty() {
            return Err(FleetImportError::Record {
                row: line,
                reason: "vehicle id is empty".to_string(),
            });
        }
        let vehicle_id = VehicleId(row.vehicle_id);
        let vehicle_class = parse_class(&row.class, line)?;

        registry.register(VehicleRegistration {
            vehicle_id: vehicle_id.clone(),
            vehicle_class,
            max_weight_kg: row.max_weight_kg,
            max_volume_l: row.max_volume_l,
        })?;

        let rate = match (row.rate_per_km, row.rate_per_kg) {
            (Some(per_km), Some(per_kg)) => Some(RatePlan { per_km, per_kg }),
            (None, None) => None,
            _ => {
                return Err(FleetImportError::Record {
                    row: line,
                    reason: "Rate Per Km and Rate Per Kg must be provided together".to_string(),
                })
            }
        };
        let preferences = VehiclePreferences {
            accepting_requests: None,
            accepted_item_types: row
                .item_types
                .as_deref()
                .map(|raw| parse_item_types(raw, line))
                .transpose()?,
            rate,
            route: row
                .route
                .as_deref()
                .map(|raw| parse_route(raw, line))
                .transpose()?,
            rating: row.rating,
        };
        registry.set_preferences(&vehicle_id, preferences)?;
        imported += 1;
    }
    Ok(imported)
}

fn parse_class(raw: &str, row: usize) -> Result<VehicleClass, FleetImportError> {
    let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    VehicleClass::ALL
        .into_iter()
        .find(|class| class.label() == normalized)
        .ok_or_else(|| FleetImportError::Record {
            row,
            reason: format!("unknown vehicle class '{raw}'"),
        })
}

/// Pipe-separated item type labels, e.g. `parcel|grocery|fragile`.
fn parse_item_types(raw: &str, row: usize) -> Result<BTreeSet<ItemType>, FleetImportError> {
    let mut items = BTreeSet::new();
    for token in raw.split('|') {
        let normalized = token.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            continue;
        }
        let item = ItemType::ALL
            .into_iter()
            .find(|item| item.label() == normalized)
            .ok_or_else(|| FleetImportError::Record {
                row,
                reason: format!("unknown item type '{}'", token.trim()),
            })?;
        items.insert(item);
    }
    if items.is_empty() {
        return Err(FleetImportError::Record {
            row,
            reason: "no recognisable item types".to_string(),
        });
    }
    Ok(items)
}

/// Pipe-separated `lat lng` pairs, e.g. `41.58 -93.62|41.60 -93.58`.
fn parse_route(raw: &str, row: usize) -> Result<Vec<GeoPoint>, FleetImportError> {
    let mut route = Vec::new();
    for token in raw.split('|') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let coords: Vec<&str> = token.split_whitespace().collect();
        if coords.len() != 2 {
            return Err(FleetImportError::Record {
                row,
                reason: format!("route stop '{token}' must be 'lat lng'"),
            });
        }
        let lat = coords[0].parse::<f64>().map_err(|_| FleetImportError::Record {
            row,
            reason: format!("bad latitude '{}'", coords[0]),
        })?;
        let lng = coords[1].parse::<f64>().map_err(|_| FleetImportError::Record {
            row,
            reason: format!("bad longitude '{}'", coords[1]),
        })?;
        route.push(GeoPoint { lat, lng });
    }
    Ok(route)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const ROSTER: &str = "\
Vehicle ID,Class,Max Weight Kg,Max Volume L,Rate Per Km,Rate Per Kg,Item Types,Rating,Route
veh-100,light_truck,500,2000,12,3.5,parcel|furniture,4.5,41.58 -93.62|41.60 -93.58
veh-101,two_wheeler,12,40,,,,,
";

    #[test]
    fn imports_rows_with_and_without_preferences() {
        let registry = CapacityRegistry::new();
        let imported = import_roster(ROSTER.as_bytes(), &registry).unwrap();
        assert_eq!(imported, 2);

        let truck = registry.snapshot(&VehicleId("veh-100".to_string())).unwrap();
        assert_eq!(truck.vehicle_class, VehicleClass::LightTruck);
        assert_eq!(truck.rate.per_km, dec!(12));
        assert_eq!(truck.route.len(), 2);
        assert!(truck.accepted_item_types.contains(&ItemType::Furniture));
        assert!(!truck.accepted_item_types.contains(&ItemType::Grocery));

        let scooter = registry
            .snapshot(&VehicleId("veh-101".to_string()))
            .unwrap();
        assert_eq!(scooter.rate, VehicleClass::TwoWheeler.default_rate());
        assert!(scooter.route.is_empty());
        assert_eq!(scooter.accepted_item_types.len(), ItemType::ALL.len());
    }

    #[test]
    fn rejects_unknown_vehicle_class() {
        let roster = "\
Vehicle ID,Class,Max Weight Kg,Max Volume L
veh-1,hovercraft,100,100
";
        let registry = CapacityRegistry::new();
        let err = import_roster(roster.as_bytes(), &registry).unwrap_err();
        match err {
            FleetImportError::Record { row, reason } => {
                assert_eq!(row, 2);
                assert!(reason.contains("hovercraft"), "unexpected reason {reason}");
            }
            other => panic!("expected record error, got {other}"),
        }
    }

    #[test]
    fn rejects_one_sided_rate_overrides() {
        let roster = "\
Vehicle ID,Class,Max Weight Kg,Max Volume L,Rate Per Km,Rate Per Kg
veh-1,light_truck,100,100,12,
";
        let registry = CapacityRegistry::new();
        let err = import_roster(roster.as_bytes(), &registry).unwrap_err();
        assert!(matches!(err, FleetImportError::Record { row: 2, .. }));
    }

    #[test]
    fn duplicate_rows_surface_the_registry_error() {
        let roster = "\
Vehicle ID,Class,Max Weight Kg,Max Volume L
veh-1,light_truck,100,100
veh-1,light_truck,100,100
";
        let registry = CapacityRegistry::new();
        let err = import_roster(roster.as_bytes(), &registry).unwrap_err();
        assert!(matches!(
            err,
            FleetImportError::Registry(CapacityError::DuplicateVehicle)
        ));
    }
}
