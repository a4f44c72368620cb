#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod locks;
pub mod logging;
pub mod status;
pub mod task;
pub mod task_logger;

pub use config::{Config, LockCacheConfig, SupervisorConfig};
pub use error::{Error, Result};
pub use locks::{run_with_lock, LockCache, ResourceLock};
pub use task::{Supervisor, TaskFailure, TaskHandle};
pub use task_logger::{LogCrateSink, LogLevel, LogRecord, LogSink, TaskLogger};

/// the current app version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
