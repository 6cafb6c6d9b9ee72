//! CargoLink: capacity-constrained cargo dispatch and fulfillment engine.
//!
//! The `dispatch` module owns the domain: vehicle capacity tracking, shipment
//! lifecycle, matching, and fares. `config`, `telemetry`, and `error` carry the
//! service plumbing shared with the API binary.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod telemetry;
