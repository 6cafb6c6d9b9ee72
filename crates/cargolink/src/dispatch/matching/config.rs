/// Ranking dials. Weights decide how much each factor contributes to a
/// candidate's score; the tolerance band and list size are tunables, not
/// constants.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    /// Maximum distance-to-path, in km, for pickup and dropoff.
    pub tolerance_km: f64,
    /// How many ranked candidates a match query returns.
    pub top_k: usize,
    pub detour_weight: f64,
    pub eta_weight: f64,
    pub price_weight: f64,
    /// Pickup ETA that halves the ETA factor.
    pub eta_scale_min: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance_km: 3.0,
            top_k: 5,
            detour_weight: 0.5,
            eta_weight: 0.3,
            price_weight: 0.2,
            eta_scale_min: 30.0,
        }
    }
}
