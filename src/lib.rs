//! Yield, energy-flow and amortization engine for small plug-in PV systems.
//!
//! A [`scenario::ScenarioRequest`] names a site, one or more arrays, catalog
//! hardware, a household load and economic assumptions. The
//! [`scenario::ScenarioRunner`] resolves irradiance for the site, converts it
//! to AC power, allocates that power against the load (with optional
//! storage) for a representative year, and projects the year over the
//! investment horizon.

pub mod catalog;
pub mod config;
pub mod domain;
pub mod economics;
pub mod error;
pub mod flow;
pub mod irradiance;
pub mod load;
pub mod production;
pub mod scenario;
pub mod telemetry;

pub use error::{SimResult, SimulationError};
