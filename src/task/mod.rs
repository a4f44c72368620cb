/// supervised fire-and-forget tasks.
///
/// `Supervisor::spawn` runs a future in the background, keeps it in a retained-set
/// until it finishes and turns any error or panic into a single log report.
///
pub mod handle;
pub mod supervisor;

pub use handle::{FailureKind, TaskFailure, TaskHandle, TaskId};
pub use supervisor::{FailureHook, Supervisor};
