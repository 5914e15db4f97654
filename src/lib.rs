pub mod error;
pub mod executor;
pub mod inject;
pub mod observability;
pub mod orchestrator;
pub mod params;
pub mod plan;
pub mod resolver;
pub mod storage;
pub mod tracker;
pub mod validation;

pub use error::{FailureKind, StepFailure};
pub use orchestrator::{Orchestrator, RunOutcome, RunReport, StepOutcome};
pub use params::ParameterSet;
pub use plan::{Plan, StepSpec};
pub use tracker::{RunContext, RunId, RunTracker};
