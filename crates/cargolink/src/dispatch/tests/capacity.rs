use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use rust_decimal_macros::dec;

use crate::dispatch::capacity::{
    CapacityError, CapacityRegistry, VehiclePreferences, VehicleRegistration,
};
use crate::dispatch::domain::{ItemType, RatePlan, VehicleClass, VehicleId};

fn registration(id: &str, max_weight_kg: f64, max_volume_l: f64) -> VehicleRegistration {
    VehicleRegistration {
        vehicle_id: VehicleId(id.to_string()),
        vehicle_class: VehicleClass::LightTruck,
        max_weight_kg,
        max_volume_l,
    }
}

#[test]
fn registration_starts_permissive() {
    let registry = CapacityRegistry::new();
    let record = registry.register(registration("veh-1", 500.0, 2000.0)).unwrap();

    assert!(record.accepting_requests);
    assert_eq!(record.accepted_item_types.len(), ItemType::ALL.len());
    assert_eq!(record.rate, VehicleClass::LightTruck.default_rate());
    assert!(record.route.is_empty());
    assert_eq!(record.reserved_weight_kg, 0.0);

    let second = registry.register(registration("veh-2", 10.0, 40.0)).unwrap();
    assert!(second.registered_seq > record.registered_seq);
}

#[test]
fn duplicate_registration_is_refused() {
    let registry = CapacityRegistry::new();
    registry.register(registration("veh-1", 500.0, 2000.0)).unwrap();
    let err = registry
        .register(registration("veh-1", 100.0, 100.0))
        .unwrap_err();
    assert!(matches!(err, CapacityError::DuplicateVehicle));
}

#[test]
fn reserve_rejects_then_accepts_a_smaller_load() {
    let registry = CapacityRegistry::new();
    let id = VehicleId("veh-1".to_string());
    registry.register(registration("veh-1", 100.0, 1000.0)).unwrap();
    registry.reserve(&id, 80.0, 100.0).unwrap();

    let err = registry.reserve(&id, 30.0, 10.0).unwrap_err();
    match err {
        CapacityError::InsufficientCapacity {
            requested_weight_kg,
            free_weight_kg,
            ..
        } => {
            assert_eq!(requested_weight_kg, 30.0);
            assert_eq!(free_weight_kg, 20.0);
        }
        other => panic!("expected insufficient capacity, got {other}"),
    }
    // the failed reserve left nothing behind
    assert_eq!(registry.available(&id).unwrap().weight_kg, 20.0);

    registry.reserve(&id, 15.0, 10.0).unwrap();
    let spare = registry.available(&id).unwrap();
    assert_eq!(spare.weight_kg, 5.0);
    assert_eq!(registry.snapshot(&id).unwrap().reserved_weight_kg, 95.0);
}

#[test]
fn reserve_checks_both_dimensions_atomically() {
    let registry = CapacityRegistry::new();
    let id = VehicleId("veh-1".to_string());
    registry.register(registration("veh-1", 100.0, 50.0)).unwrap();

    // weight fits, volume does not; neither dimension may move
    let err = registry.reserve(&id, 10.0, 60.0).unwrap_err();
    assert!(matches!(err, CapacityError::InsufficientCapacity { .. }));
    let record = registry.snapshot(&id).unwrap();
    assert_eq!(record.reserved_weight_kg, 0.0);
    assert_eq!(record.reserved_volume_l, 0.0);
}

#[test]
fn release_clamps_at_zero() {
    let registry = CapacityRegistry::new();
    let id = VehicleId("veh-1".to_string());
    registry.register(registration("veh-1", 100.0, 100.0)).unwrap();
    registry.reserve(&id, 40.0, 40.0).unwrap();
    registry.release(&id, 70.0, 70.0).unwrap();

    let record = registry.snapshot(&id).unwrap();
    assert_eq!(record.reserved_weight_kg, 0.0);
    assert_eq!(record.reserved_volume_l, 0.0);
}

#[test]
fn preferences_update_only_the_given_fields() {
    let registry = CapacityRegistry::new();
    let id = VehicleId("veh-1".to_string());
    registry.register(registration("veh-1", 500.0, 2000.0)).unwrap();

    let mut only_parcels = BTreeSet::new();
    only_parcels.insert(ItemType::Parcel);
    let record = registry
        .set_preferences(
            &id,
            VehiclePreferences {
                accepting_requests: Some(false),
                accepted_item_types: Some(only_parcels),
                ..VehiclePreferences::default()
            },
        )
        .unwrap();

    assert!(!record.accepting_requests);
    assert_eq!(record.accepted_item_types.len(), 1);
    // untouched fields keep their registration values
    assert_eq!(record.rate, VehicleClass::LightTruck.default_rate());
    assert_eq!(record.max_weight_kg, 500.0);

    let record = registry
        .set_preferences(
            &id,
            VehiclePreferences {
                rate: Some(RatePlan {
                    per_km: dec!(11),
                    per_kg: dec!(2.5),
                }),
                ..VehiclePreferences::default()
            },
        )
        .unwrap();
    assert_eq!(record.rate.per_km, dec!(11));
    assert!(!record.accepting_requests);
}

#[test]
fn unknown_vehicle_is_not_found() {
    let registry = CapacityRegistry::new();
    let missing = VehicleId("veh-404".to_string());
    assert!(matches!(
        registry.available(&missing).unwrap_err(),
        CapacityError::NotFound
    ));
    assert!(matches!(
        registry.reserve(&missing, 1.0, 1.0).unwrap_err(),
        CapacityError::NotFound
    ));
}

#[test]
fn concurrent_reserves_never_oversubscribe() {
    let registry = Arc::new(CapacityRegistry::new());
    let id = VehicleId("veh-1".to_string());
    registry.register(registration("veh-1", 100.0, 1000.0)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let id = id.clone();
            thread::spawn(move || registry.reserve(&id, 20.0, 20.0).is_ok())
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|handle| handle.join().expect("reserver thread panicked"))
        .filter(|reserved| *reserved)
        .count();

    assert_eq!(successes, 5);
    let record = registry.snapshot(&id).unwrap();
    assert_eq!(record.reserved_weight_kg, 100.0);
}
