pub mod event;
pub mod report;

pub use event::{EngineEvent, EngineStep};
pub use report::{DispatchReport, StepOutcome, StepStatus};
