//! Scenario orchestration: request validation, catalog resolution, and the
//! resolve → convert → simulate → project pipeline, singly or in batches.

pub mod request;
pub mod result;
pub mod runner;

pub use request::{ArrayRequest, LoadSpec, RequestFile, Scenario, ScenarioRequest};
pub use result::{BatchEntry, ScenarioResult, ScenarioSummary};
pub use runner::{ScenarioHandle, ScenarioRunner};
