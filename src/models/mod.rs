pub mod context;
pub mod outcome;
pub mod step;

pub use context::RunContext;
pub use outcome::{Failure, StepOutcome};
pub use step::{Criticality, StepStatus};
