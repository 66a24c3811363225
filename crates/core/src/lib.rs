//! Domain core of the environment monitor.
//!
//! - [`thresholds`] -- static threshold policy and movement magnitude.
//! - [`alert`] -- alert decision and message composition.
//! - [`reading`] -- sensor reading, inbound payload and statistics types.
//! - [`sinks`] -- storage / notification / forwarding collaborator traits.
//! - [`env`] -- configuration lookup helpers.
//! - [`telemetry`] -- tracing setup and shutdown signals for the binaries.

pub mod alert;
pub mod env;
pub mod error;
pub mod reading;
pub mod sinks;
pub mod telemetry;
pub mod thresholds;
pub mod types;
