//! Card-to-customer assignment state machine.

pub mod cooldown;
pub mod error;
pub mod machine;
pub mod state;

pub use cooldown::CooldownTicker;
pub use machine::AssignmentMachine;
pub use state::{AssignmentState, CompletedAssignment};
