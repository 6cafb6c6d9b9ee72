//! Deterministic fare computation. Quoting and settlement both run through
//! [`quote`] with the same frozen [`FareInputs`], so a binding quote always
//! reproduces at delivery.

use chrono::{DateTime, Timelike, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Platform-wide pricing dials. Per-vehicle rates live on the vehicle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarePolicy {
    pub base_fare: Decimal,
    pub free_weight_allowance_kg: Decimal,
    pub surge_cap: Decimal,
    pub night_surcharge_pct: Decimal,
    pub platform_fee_pct: Decimal,
    pub night_start_hour: u32,
    pub night_end_hour: u32,
}

impl Default for FarePolicy {
    fn default() -> Self {
        Self {
            base_fare: dec!(50),
            free_weight_allowance_kg: dec!(3),
            surge_cap: dec!(2.0),
            night_surcharge_pct: dec!(0.10),
            platform_fee_pct: dec!(0.05),
            night_start_hour: 22,
            night_end_hour: 6,
        }
    }
}

impl FarePolicy {
    /// Night window on the UTC hour, end exclusive; wraps midnight when
    /// `start > end`.
    pub fn is_night(&self, at: DateTime<Utc>) -> bool {
        let hour = at.hour();
        if self.night_start_hour <= self.night_end_hour {
            hour >= self.night_start_hour && hour < self.night_end_hour
        } else {
            hour >= self.night_start_hour || hour < self.night_end_hour
        }
    }
}

/// The inputs a quote was computed from, frozen onto the shipment at
/// acceptance. Settlement replays these exact values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareInputs {
    pub distance_km: Decimal,
    pub weight_kg: Decimal,
    pub per_km: Decimal,
    pub per_kg: Decimal,
    pub is_night: bool,
    pub demand_multiplier: Decimal,
    pub quoted_at: DateTime<Utc>,
}

/// Line-item fare decomposition shown to both parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub base: Decimal,
    pub distance_component: Decimal,
    pub weight_component: Decimal,
    pub surge_multiplier: Decimal,
    pub night_surcharge: Decimal,
    pub platform_fee: Decimal,
    pub total: Decimal,
}

/// Pure fare computation: identical inputs always produce an identical
/// breakdown. The total never drops below the base fare.
pub fn quote(policy: &FarePolicy, inputs: &FareInputs) -> FareBreakdown {
    let distance_component = round_money(inputs.distance_km * inputs.per_km);
    let billable_weight =
        (inputs.weight_kg - policy.free_weight_allowance_kg).max(Decimal::ZERO);
    let weight_component = round_money(billable_weight * inputs.per_kg);

    let surge_multiplier = inputs.demand_multiplier.clamp(Decimal::ONE, policy.surge_cap);
    let surged =
        round_money((policy.base_fare + distance_component + weight_component) * surge_multiplier);

    let night_surcharge = if inputs.is_night {
        round_money(surged * policy.night_surcharge_pct)
    } else {
        Decimal::ZERO
    };

    let platform_fee = round_money((surged + night_surcharge) * policy.platform_fee_pct);
    let total = (surged + night_surcharge + platform_fee).max(policy.base_fare);

    FareBreakdown {
        base: policy.base_fare,
        distance_component,
        weight_component,
        surge_multiplier,
        night_surcharge,
        platform_fee,
        total: round_money(total),
    }
}

/// Kilometers from the routing collaborator, fixed to metre precision so the
/// stored inputs stay reproducible.
pub fn km_to_decimal(distance_km: f64) -> Decimal {
    Decimal::new((distance_km * 1000.0).round() as i64, 3)
}

/// Weights arrive as floats from intake; grams are ample for billing.
pub fn kg_to_decimal(weight_kg: f64) -> Decimal {
    Decimal::new((weight_kg * 1000.0).round() as i64, 3)
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
