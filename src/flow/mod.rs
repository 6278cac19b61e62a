pub mod simulator;
pub mod totals;

pub use simulator::{simulate, simulate_with_strategy, EnergyFlowInterval, FlowInputs, FlowOutcome, StorageStrategy};
pub use totals::{monthly_totals, EnergyTotals, MonthlyTotals};
