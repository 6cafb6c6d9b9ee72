use crate::infra::{
    dispatch_config, parse_item_type, parse_timestamp, parse_vehicle_class,
    InMemoryUpdatePublisher,
};
use crate::routes::{build_estimate, FareEstimateRequest};
use cargolink::config::DispatchSettings;
use cargolink::dispatch::{
    import_roster_from_path, CapacityRegistry, DispatchService, FareBreakdown, GeoPoint,
    HaversineEstimator, ItemType, ShipmentDraft, ShipmentStore, TransitionOutcome, VehicleClass,
    VehicleId, VehiclePreferences, VehicleRegistration, Waypoint,
};
use cargolink::error::AppError;
use chrono::{DateTime, Utc};
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Optional fleet roster CSV to seed the capacity registry.
    #[arg(long)]
    pub(crate) fleet_csv: Option<PathBuf>,
    /// Shipment weight in kilograms.
    #[arg(long, default_value_t = 30.0)]
    pub(crate) weight_kg: f64,
    /// Shipment volume in litres.
    #[arg(long, default_value_t = 100.0)]
    pub(crate) volume_l: f64,
    /// Item type carried (parcel, document, grocery, furniture, appliance, fragile).
    #[arg(long, value_parser = parse_item_type)]
    pub(crate) item_type: Option<ItemType>,
    /// Price the requester offered up front, if any.
    #[arg(long)]
    pub(crate) offered_price: Option<Decimal>,
    /// Pin the demo clock (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) at: Option<DateTime<Utc>>,
    /// Stop after acceptance, skipping the pickup/delivery custody chain.
    #[arg(long)]
    pub(crate) skip_custody: bool,
}

#[derive(Args, Debug)]
pub(crate) struct FareQuoteArgs {
    /// Trip distance in kilometres.
    #[arg(long)]
    pub(crate) distance_km: f64,
    /// Cargo weight in kilograms.
    #[arg(long)]
    pub(crate) weight_kg: f64,
    /// Vehicle class whose rate card applies.
    #[arg(long, value_parser = parse_vehicle_class)]
    pub(crate) vehicle_class: VehicleClass,
    /// Quote time (RFC 3339); drives night and demand pricing. Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) at: Option<DateTime<Utc>>,
    /// Override the schedule-derived demand multiplier.
    #[arg(long)]
    pub(crate) demand_multiplier: Option<Decimal>,
}

pub(crate) fn run_fare_quote(args: FareQuoteArgs) -> Result<(), AppError> {
    let FareQuoteArgs {
        distance_km,
        weight_kg,
        vehicle_class,
        at,
        demand_multiplier,
    } = args;

    let estimate = match build_estimate(&FareEstimateRequest {
        distance_km,
        weight_kg,
        vehicle_class,
        at,
        demand_multiplier,
    }) {
        Ok(estimate) => estimate,
        Err(reason) => {
            println!("Quote unavailable: {reason}");
            return Ok(());
        }
    };

    println!(
        "Fare quote for a {} carrying {:.1} kg over {:.1} km",
        vehicle_class.label(),
        weight_kg,
        distance_km
    );
    println!(
        "Quoted at {} | night window: {} | demand multiplier: {}",
        estimate.estimated_at,
        if estimate.is_night { "yes" } else { "no" },
        estimate.demand_multiplier
    );
    render_fare_breakdown(&estimate.fare);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        fleet_csv,
        weight_kg,
        volume_l,
        item_type,
        offered_price,
        at,
        skip_custody,
    } = args;

    let now = at.unwrap_or_else(Utc::now);
    let item_type = item_type.unwrap_or(ItemType::Parcel);

    println!("CargoLink dispatch demo (evaluated {now})");

    let registry = Arc::new(CapacityRegistry::new());
    let notifier = Arc::new(InMemoryUpdatePublisher::default());
    let service = Arc::new(DispatchService::new(
        registry.clone(),
        Arc::new(ShipmentStore::new()),
        Arc::new(HaversineEstimator::default()),
        notifier.clone(),
        dispatch_config(&DispatchSettings::default()),
    ));

    match fleet_csv {
        Some(path) => {
            let imported = import_roster_from_path(&path, &registry)?;
            println!("Imported {} vehicles from {}", imported, path.display());
        }
        None => {
            register_demo_fleet(&service)?;
            println!("Registered the built-in demo fleet");
        }
    }

    println!("\nFleet roster");
    for record in registry.snapshot_all() {
        let spare = record.spare();
        println!(
            "- {} ({}) | spare {:.0} kg / {:.0} L | rating {:.1} | {} route stops",
            record.vehicle_id,
            record.vehicle_class.label(),
            spare.weight_kg,
            spare.volume_l,
            record.rating,
            record.route.len()
        );
    }

    println!("\nShipment intake");
    let draft = ShipmentDraft {
        requester_id: "req-demo".to_string(),
        item_type,
        weight_kg,
        volume_l,
        pickup: Waypoint {
            label: "Downtown depot".to_string(),
            location: DOWNTOWN,
        },
        dropoff: Waypoint {
            label: "East Village walk-up".to_string(),
            location: EAST_VILLAGE,
        },
        offered_price,
    };
    let shipment = match service.create_shipment(draft, now) {
        Ok(shipment) => shipment,
        Err(err) => {
            println!("  Shipment rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- Placed {} | {} | {:.1} kg / {:.1} L | {} -> {}",
        shipment.shipment_id,
        item_type.label(),
        weight_kg,
        volume_l,
        shipment.pickup.label,
        shipment.dropoff.label
    );

    let candidates = match service.find_matches(&shipment.shipment_id, now) {
        Ok(candidates) => candidates,
        Err(err) => {
            println!("  Matching unavailable: {err}");
            return Ok(());
        }
    };
    if candidates.is_empty() {
        println!("  No vehicle on a compatible route has spare capacity");
        return Ok(());
    }

    println!("\nRanked candidates");
    for (rank, candidate) in candidates.iter().enumerate() {
        println!(
            "{}. {} ({}) | score {:.3} | pickup ETA {:.0} min | quoted {}",
            rank + 1,
            candidate.vehicle_id,
            candidate.vehicle_class.label(),
            candidate.score,
            candidate.pickup_eta_min,
            candidate.quoted_total
        );
        for part in &candidate.parts {
            println!("   - {:?}: {:.3} ({})", part.factor, part.score, part.notes);
        }
    }

    let chosen = &candidates[0];
    let accepted = match service.accept(&shipment.shipment_id, &chosen.vehicle_id, "op-demo", now) {
        Ok(accepted) => accepted,
        Err(err) => {
            println!("  Acceptance failed: {err}");
            return Ok(());
        }
    };
    let pickup_code = accepted.pickup_code.clone().unwrap_or_default();
    println!(
        "\nAccepted by {} | pickup code issued to the requester: {}",
        chosen.vehicle_id, pickup_code
    );
    if let Some(quote) = &accepted.quote {
        println!("Binding quote");
        render_fare_breakdown(quote);
    }

    if skip_custody {
        render_status_payload(&service, &accepted);
        return Ok(());
    }

    println!("\nCustody chain");
    if let Err(err) = service.pickup(&shipment.shipment_id, "not-the-code", "op-demo", None, now) {
        println!("- Pickup with a bad code refused: {err}");
    }
    let picked = match service.pickup(&shipment.shipment_id, &pickup_code, "op-demo", None, now) {
        Ok(picked) => picked,
        Err(err) => {
            println!("- Pickup failed: {err}");
            return Ok(());
        }
    };
    let delivery_code = picked.delivery_code.clone().unwrap_or_default();
    println!("- Picked up | delivery code issued to the recipient: {delivery_code}");

    if let Err(err) = service.mark_in_transit(&shipment.shipment_id, "op-demo", now) {
        println!("- In-transit update failed: {err}");
    } else {
        println!("- In transit");
    }

    let delivered = match service.deliver(&shipment.shipment_id, &delivery_code, "op-demo", now) {
        Ok(delivered) => delivered,
        Err(err) => {
            println!("- Delivery failed: {err}");
            return Ok(());
        }
    };
    println!("- Delivered; capacity released back to the vehicle");
    if let Some(settlement) = &delivered.settlement {
        println!("\nSettled fare (replays the frozen quote inputs)");
        render_fare_breakdown(settlement);
        if delivered.quote.as_ref().map(|quote| quote.total) == Some(settlement.total) {
            println!("Settlement matches the binding quote");
        }
    }

    render_status_payload(&service, &delivered);

    let updates = notifier.updates();
    if updates.is_empty() {
        println!("\nShipment updates: none dispatched");
    } else {
        println!("\nShipment updates");
        for update in updates {
            println!("- template={} -> {}", update.template, update.shipment_id);
        }
    }

    println!("\nLifecycle audit trail");
    for event in service.events_for(&shipment.shipment_id) {
        let outcome = match &event.outcome {
            TransitionOutcome::Applied => "applied".to_string(),
            TransitionOutcome::Refused { reason } => format!("refused: {reason}"),
        };
        println!(
            "- {} -> {} by {} ({})",
            event.from.label(),
            event.to.label(),
            event.actor,
            outcome
        );
    }

    Ok(())
}

const DOWNTOWN: GeoPoint = GeoPoint {
    lat: 41.5868,
    lng: -93.6250,
};
const EAST_VILLAGE: GeoPoint = GeoPoint {
    lat: 41.5910,
    lng: -93.6046,
};
const DRAKE: GeoPoint = GeoPoint {
    lat: 41.6033,
    lng: -93.6571,
};
const AIRPORT: GeoPoint = GeoPoint {
    lat: 41.5340,
    lng: -93.6631,
};

fn register_demo_fleet(
    service: &DispatchService<HaversineEstimator, InMemoryUpdatePublisher>,
) -> Result<(), AppError> {
    let fleet = [
        (
            "veh-scout",
            VehicleClass::TwoWheeler,
            12.0,
            40.0,
            4.8,
            vec![DRAKE, DOWNTOWN],
        ),
        (
            "veh-runner",
            VehicleClass::LightTruck,
            500.0,
            2000.0,
            4.4,
            vec![DRAKE, DOWNTOWN, EAST_VILLAGE],
        ),
        (
            "veh-hauler",
            VehicleClass::MediumTruck,
            1200.0,
            6000.0,
            4.1,
            vec![AIRPORT, DOWNTOWN, EAST_VILLAGE],
        ),
    ];

    for (id, class, max_weight_kg, max_volume_l, rating, route) in fleet {
        let vehicle_id = VehicleId(id.to_string());
        if let Err(err) = service.register_vehicle(VehicleRegistration {
            vehicle_id: vehicle_id.clone(),
            vehicle_class: class,
            max_weight_kg,
            max_volume_l,
        }) {
            println!("  Skipped {vehicle_id}: {err}");
            continue;
        }
        if let Err(err) = service.update_preferences(
            &vehicle_id,
            VehiclePreferences {
                route: Some(route),
                rating: Some(rating),
                ..VehiclePreferences::default()
            },
        ) {
            println!("  Preferences for {vehicle_id} not applied: {err}");
        }
    }
    Ok(())
}

fn render_fare_breakdown(fare: &FareBreakdown) {
    println!("  base fare          {}", fare.base);
    println!("  distance component {}", fare.distance_component);
    println!("  weight component   {}", fare.weight_component);
    println!("  surge multiplier   {}", fare.surge_multiplier);
    println!("  night surcharge    {}", fare.night_surcharge);
    println!("  platform fee       {}", fare.platform_fee);
    println!("  total              {}", fare.total);
}

fn render_status_payload(
    service: &DispatchService<HaversineEstimator, InMemoryUpdatePublisher>,
    shipment: &cargolink::dispatch::ShipmentRequest,
) {
    match service.shipment(&shipment.shipment_id) {
        Ok(current) => match serde_json::to_string_pretty(&current.status_view()) {
            Ok(json) => println!("\nPublic status payload (codes withheld):\n{json}"),
            Err(err) => println!("\nPublic status payload unavailable: {err}"),
        },
        Err(err) => println!("\nShipment lookup failed: {err}"),
    }
}
