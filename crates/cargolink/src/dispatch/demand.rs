use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Inclusive hour-of-day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl HourWindow {
    pub const fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour <= self.end_hour
    }
}

/// Hour-of-day demand signal. Commuter peaks pay the peak multiplier,
/// everything else the off-peak one; the fare policy's surge cap still binds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSchedule {
    pub peak_windows: Vec<HourWindow>,
    pub peak_multiplier: Decimal,
    pub off_peak_multiplier: Decimal,
}

impl Default for DemandSchedule {
    fn default() -> Self {
        Self {
            peak_windows: vec![
                HourWindow {
                    start_hour: 7,
                    end_hour: 9,
                },
                HourWindow {
                    start_hour: 17,
                    end_hour: 19,
                },
            ],
            peak_multiplier: dec!(1.5),
            off_peak_multiplier: dec!(1.0),
        }
    }
}

impl DemandSchedule {
    pub fn multiplier_at(&self, at: DateTime<Utc>) -> Decimal {
        let hour = at.hour();
        if self
            .peak_windows
            .iter()
            .any(|window| window.contains(hour))
        {
            self.peak_multiplier
        } else {
            self.off_peak_multiplier
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 15, 0).unwrap()
    }

    #[test]
    fn commuter_peaks_raise_the_multiplier() {
        let schedule = DemandSchedule::default();
        assert_eq!(schedule.multiplier_at(at_hour(7)), dec!(1.5));
        assert_eq!(schedule.multiplier_at(at_hour(9)), dec!(1.5));
        assert_eq!(schedule.multiplier_at(at_hour(18)), dec!(1.5));
    }

    #[test]
    fn off_peak_hours_stay_flat() {
        let schedule = DemandSchedule::default();
        assert_eq!(schedule.multiplier_at(at_hour(12)), dec!(1.0));
        assert_eq!(schedule.multiplier_at(at_hour(23)), dec!(1.0));
    }
}
