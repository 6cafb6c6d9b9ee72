use std::collections::BTreeSet;

use rust_decimal_macros::dec;

use crate::dispatch::capacity::VehiclePreferences;
use crate::dispatch::domain::{ItemType, ShipmentState, Waypoint};
use crate::dispatch::matching::{MatchFactor, MatchingConfig};
use crate::dispatch::DispatchConfig;

use super::common::{airport, harness, harness_with, noon, parcel_draft};

#[test]
fn ranks_an_eligible_vehicle_with_score_parts() {
    let fixture = harness();
    let vehicle_id = fixture.register_truck("veh-001");
    let shipment = fixture
        .service
        .create_shipment(parcel_draft(30.0, 100.0), noon())
        .unwrap();

    let candidates = fixture
        .service
        .find_matches(&shipment.shipment_id, noon())
        .unwrap();

    assert_eq!(candidates.len(), 1);
    let candidate = &candidates[0];
    assert_eq!(candidate.vehicle_id, vehicle_id);
    assert!(candidate.score > 0.0);
    assert!(candidate.quoted_total > dec!(0));
    assert!(candidate.pickup_eta_min >= 0.0);
    assert!(candidate.delivery_eta_min > candidate.pickup_eta_min);

    let factors: Vec<MatchFactor> = candidate.parts.iter().map(|part| part.factor).collect();
    assert_eq!(
        factors,
        vec![
            MatchFactor::Detour,
            MatchFactor::PickupEta,
            MatchFactor::PriceFit
        ]
    );
}

#[test]
fn first_non_empty_ranking_moves_placed_to_matching() {
    let fixture = harness();
    fixture.register_truck("veh-001");
    let shipment = fixture
        .service
        .create_shipment(parcel_draft(30.0, 100.0), noon())
        .unwrap();
    assert_eq!(shipment.state, ShipmentState::Placed);

    fixture
        .service
        .find_matches(&shipment.shipment_id, noon())
        .unwrap();
    let refreshed = fixture.service.shipment(&shipment.shipment_id).unwrap();
    assert_eq!(refreshed.state, ShipmentState::Matching);
}

#[test]
fn empty_candidate_set_is_a_valid_outcome() {
    let fixture = harness();
    // no vehicles registered at all
    let shipment = fixture
        .service
        .create_shipment(parcel_draft(30.0, 100.0), noon())
        .unwrap();
    let candidates = fixture
        .service
        .find_matches(&shipment.shipment_id, noon())
        .unwrap();

    assert!(candidates.is_empty());
    // the request stays pending for a later retry
    let refreshed = fixture.service.shipment(&shipment.shipment_id).unwrap();
    assert_eq!(refreshed.state, ShipmentState::Placed);
}

#[test]
fn filters_respect_operator_preferences() {
    let fixture = harness();
    let vehicle_id = fixture.register_truck("veh-001");
    let shipment = fixture
        .service
        .create_shipment(parcel_draft(30.0, 100.0), noon())
        .unwrap();

    // toggled off the market
    fixture
        .service
        .update_preferences(
            &vehicle_id,
            VehiclePreferences {
                accepting_requests: Some(false),
                ..VehiclePreferences::default()
            },
        )
        .unwrap();
    assert!(fixture
        .service
        .find_matches(&shipment.shipment_id, noon())
        .unwrap()
        .is_empty());

    // back on, but furniture only
    let mut furniture_only = BTreeSet::new();
    furniture_only.insert(ItemType::Furniture);
    fixture
        .service
        .update_preferences(
            &vehicle_id,
            VehiclePreferences {
                accepting_requests: Some(true),
                accepted_item_types: Some(furniture_only),
                ..VehiclePreferences::default()
            },
        )
        .unwrap();
    assert!(fixture
        .service
        .find_matches(&shipment.shipment_id, noon())
        .unwrap()
        .is_empty());
}

#[test]
fn filters_exclude_overweight_and_off_route_shipments() {
    let fixture = harness();
    fixture.register_truck("veh-001");

    // heavier than the truck's 500 kg ceiling
    let heavy = fixture
        .service
        .create_shipment(parcel_draft(900.0, 100.0), noon())
        .unwrap();
    assert!(fixture
        .service
        .find_matches(&heavy.shipment_id, noon())
        .unwrap()
        .is_empty());

    // pickup well outside the tolerance band of the declared route
    let mut off_route = parcel_draft(30.0, 100.0);
    off_route.pickup = Waypoint {
        label: "Airport cargo bay".to_string(),
        location: airport(),
    };
    let far = fixture.service.create_shipment(off_route, noon()).unwrap();
    assert!(fixture
        .service
        .find_matches(&far.shipment_id, noon())
        .unwrap()
        .is_empty());
}

#[test]
fn ranking_is_reproducible_and_breaks_ties_on_rating_then_seniority() {
    let fixture = harness();
    // identical geometry; only rating and registration order differ
    let veteran = fixture.register_truck("veh-veteran");
    let rookie = fixture.register_truck("veh-rookie");
    let star = fixture.register_truck("veh-star");
    fixture
        .service
        .update_preferences(
            &star,
            VehiclePreferences {
                rating: Some(4.9),
                ..VehiclePreferences::default()
            },
        )
        .unwrap();

    let shipment = fixture
        .service
        .create_shipment(parcel_draft(30.0, 100.0), noon())
        .unwrap();

    let first = fixture
        .service
        .find_matches(&shipment.shipment_id, noon())
        .unwrap();
    let second = fixture
        .service
        .find_matches(&shipment.shipment_id, noon())
        .unwrap();

    let order: Vec<_> = first.iter().map(|c| c.vehicle_id.clone()).collect();
    assert_eq!(
        order,
        second
            .iter()
            .map(|c| c.vehicle_id.clone())
            .collect::<Vec<_>>()
    );
    // highest rating first, then earlier registration among equals
    assert_eq!(order, vec![star, veteran, rookie]);
}

#[test]
fn ranking_truncates_to_top_k() {
    let fixture = harness_with(DispatchConfig {
        matching: MatchingConfig {
            top_k: 2,
            ..MatchingConfig::default()
        },
        ..DispatchConfig::default()
    });
    for index in 0..4 {
        fixture.register_truck(&format!("veh-{index:03}"));
    }
    let shipment = fixture
        .service
        .create_shipment(parcel_draft(30.0, 100.0), noon())
        .unwrap();

    let candidates = fixture
        .service
        .find_matches(&shipment.shipment_id, noon())
        .unwrap();
    assert_eq!(candidates.len(), 2);
}

#[test]
fn close_offers_score_better_than_distant_ones() {
    let fixture = harness();
    fixture.register_truck("veh-001");

    let quoted = {
        let shipment = fixture
            .service
            .create_shipment(parcel_draft(30.0, 100.0), noon())
            .unwrap();
        fixture
            .service
            .find_matches(&shipment.shipment_id, noon())
            .unwrap()[0]
            .quoted_total
    };

    let mut fair_offer = parcel_draft(30.0, 100.0);
    fair_offer.offered_price = Some(quoted);
    let mut lowball = parcel_draft(30.0, 100.0);
    lowball.offered_price = Some(quoted / dec!(4));

    let fair = fixture
        .service
        .create_shipment(fair_offer, noon())
        .unwrap();
    let low = fixture.service.create_shipment(lowball, noon()).unwrap();

    let fair_score = fixture
        .service
        .find_matches(&fair.shipment_id, noon())
        .unwrap()[0]
        .score;
    let low_score = fixture
        .service
        .find_matches(&low.shipment_id, noon())
        .unwrap()[0]
        .score;
    assert!(
        fair_score > low_score,
        "expected {fair_score} > {low_score}"
    );
}
