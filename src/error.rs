use thiserror::Error;

/// Errors produced while resolving, simulating or projecting a scenario.
///
/// A scenario is all-or-nothing: any of these aborts it without a partial
/// result. In a batch every scenario carries its own outcome.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Irradiance data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Scenario configuration error: {0}")]
    ScenarioConfig(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Scenario evaluation cancelled")]
    Cancelled,
}

impl SimulationError {
    /// Short machine-readable kind, used in logs and serialized batch output
    pub fn kind(&self) -> &'static str {
        match self {
            SimulationError::Validation(_) => "ValidationError",
            SimulationError::DataUnavailable(_) => "DataUnavailable",
            SimulationError::ScenarioConfig(_) => "ScenarioConfigError",
            SimulationError::Catalog(_) => "CatalogError",
            SimulationError::Cancelled => "Cancelled",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        SimulationError::Validation(msg.into())
    }

    pub fn data_unavailable(msg: impl Into<String>) -> Self {
        SimulationError::DataUnavailable(msg.into())
    }

    pub fn scenario_config(msg: impl Into<String>) -> Self {
        SimulationError::ScenarioConfig(msg.into())
    }
}

impl From<validator::ValidationErrors> for SimulationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        SimulationError::Validation(errors.to_string())
    }
}

pub type SimResult<T> = Result<T, SimulationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(SimulationError::validation("x").kind(), "ValidationError");
        assert_eq!(SimulationError::data_unavailable("x").kind(), "DataUnavailable");
        assert_eq!(SimulationError::scenario_config("x").kind(), "ScenarioConfigError");
        assert_eq!(SimulationError::Cancelled.kind(), "Cancelled");
    }

    #[test]
    fn test_error_display() {
        let err = SimulationError::data_unavailable("gap of 48 hours");
        assert_eq!(err.to_string(), "Irradiance data unavailable: gap of 48 hours");
    }
}
