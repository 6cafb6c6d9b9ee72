use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::super::capacity::VehicleCapacity;
use super::super::routing::RouteEstimator;
use super::super::store::ShipmentRequest;
use super::config::MatchingConfig;
use super::{MatchFactor, ScorePart};

pub(crate) struct CandidateGeometry {
    pub(crate) pickup_deviation_km: f64,
    pub(crate) dropoff_deviation_km: f64,
    pub(crate) pickup_eta_min: f64,
    pub(crate) delivery_eta_min: f64,
}

/// Hard filter: preferences, item type, spare capacity on both dimensions,
/// and the route-tolerance band for pickup and dropoff. Survivors carry their
/// geometry so scoring never re-queries the estimator.
pub(crate) fn filter_candidates<E>(
    shipment: &ShipmentRequest,
    vehicles: Vec<VehicleCapacity>,
    config: &MatchingConfig,
    estimator: &E,
) -> Vec<(VehicleCapacity, CandidateGeometry)>
where
    E: RouteEstimator + ?Sized,
{
    let mut survivors = Vec::new();
    for vehicle in vehicles {
        if !vehicle.accepting_requests {
            continue;
        }
        if !vehicle.accepted_item_types.contains(&shipment.item_type) {
            continue;
        }
        if !vehicle
            .spare()
            .covers(shipment.weight_kg, shipment.volume_l)
        {
            continue;
        }
        // a vehicle with no declared route cannot be matched
        if vehicle.route.is_empty() {
            continue;
        }

        let pickup_deviation_km = estimator.deviation_km(&vehicle.route, shipment.pickup.location);
        if pickup_deviation_km > config.tolerance_km {
            continue;
        }
        let dropoff_deviation_km =
            estimator.deviation_km(&vehicle.route, shipment.dropoff.location);
        if dropoff_deviation_km > config.tolerance_km {
            continue;
        }

        let to_pickup = estimator.estimate(vehicle.route[0], shipment.pickup.location);
        let leg = estimator.estimate(shipment.pickup.location, shipment.dropoff.location);
        survivors.push((
            vehicle,
            CandidateGeometry {
                pickup_deviation_km,
                dropoff_deviation_km,
                pickup_eta_min: to_pickup.eta_min,
                delivery_eta_min: to_pickup.eta_min + leg.eta_min,
            },
        ));
    }
    survivors
}

/// Weighted score with explainable parts. Every factor decays from its full
/// weight toward zero, so the total stays within the sum of the weights.
pub(crate) fn score_candidate(
    geometry: &CandidateGeometry,
    offered_price: Option<Decimal>,
    quoted_total: Decimal,
    config: &MatchingConfig,
) -> (Vec<ScorePart>, f64) {
    let mut parts = Vec::with_capacity(3);
    let mut total = 0.0;

    let detour_km = geometry.pickup_deviation_km + geometry.dropoff_deviation_km;
    let detour_score = config.detour_weight / (1.0 + detour_km);
    parts.push(ScorePart {
        factor: MatchFactor::Detour,
        score: detour_score,
        notes: format!("{detour_km:.2} km combined deviation from the declared route"),
    });
    total += detour_score;

    let eta_score = config.eta_weight / (1.0 + geometry.pickup_eta_min / config.eta_scale_min);
    parts.push(ScorePart {
        factor: MatchFactor::PickupEta,
        score: eta_score,
        notes: format!("{:.0} min to pickup", geometry.pickup_eta_min),
    });
    total += eta_score;

    let (price_score, price_note) = match offered_price {
        Some(offered) if offered > Decimal::ZERO => {
            let offered_value = offered.to_f64().unwrap_or(0.0);
            let quoted_value = quoted_total.to_f64().unwrap_or(0.0);
            let gap = (quoted_value - offered_value).abs() / offered_value;
            (
                config.price_weight / (1.0 + gap),
                format!("offered {offered} against quote {quoted_total}"),
            )
        }
        _ => (
            config.price_weight * 0.5,
            "no offered price, neutral fit".to_string(),
        ),
    };
    parts.push(ScorePart {
        factor: MatchFactor::PriceFit,
        score: price_score,
        notes: price_note,
    });
    total += price_score;

    (parts, total)
}
