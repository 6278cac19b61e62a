pub mod battery;
pub mod inverter;
pub mod types;

pub use battery::*;
pub use inverter::*;
pub use types::*;
