/// scoped task logging; binds a resource id, task type and run id and forwards
/// each record to a caller supplied sink.
///
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain_keys::keys::RouteKey;
use log::*;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Level {
        match level {
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warning => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }
}

/// one record as delivered to a sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord<R> {
    pub resource_id: R,
    pub task_type: String,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Destination for task log records. Writing is best effort: a sink that cannot
/// store a record deals with that itself.
///
/// Any `Fn(LogRecord<R>) -> impl Future<Output = ()>` closure is a sink.
#[async_trait]
pub trait LogSink<R>: Send + Sync {
    async fn write(&self, record: LogRecord<R>);
}

#[async_trait]
impl<R, F, Fut> LogSink<R> for F
where
    R: Send + 'static,
    F: Fn(LogRecord<R>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn write(&self, record: LogRecord<R>) {
        (self)(record).await
    }
}

/// forwards records to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateSink;

#[async_trait]
impl<R: Display + Send + 'static> LogSink<R> for LogCrateSink {
    async fn write(&self, record: LogRecord<R>) {
        log!(
            Level::from(record.level),
            "[{}] resource: {}, type: {}, run: {}, {}",
            record.timestamp.to_rfc3339(),
            record.resource_id,
            record.task_type,
            record.run_id,
            record.message
        );
    }
}

/// A logger bound to one task invocation.
pub struct TaskLogger<R> {
    resource_id: R,
    task_type: String,
    run_id: String,
    sink: Arc<dyn LogSink<R>>,
}

impl<R: Clone + Send + 'static> TaskLogger<R> {
    pub fn new(
        resource_id: R,
        task_type: impl Into<String>,
        run_id: impl Into<String>,
        sink: Arc<dyn LogSink<R>>,
    ) -> TaskLogger<R> {
        TaskLogger {
            resource_id,
            task_type: task_type.into(),
            run_id: run_id.into(),
            sink,
        }
    }

    /// bind to a freshly generated run id
    pub fn with_generated_run_id(
        resource_id: R,
        task_type: impl Into<String>,
        sink: Arc<dyn LogSink<R>>,
    ) -> TaskLogger<R> {
        TaskLogger::new(resource_id, task_type, RouteKey::create(), sink)
    }

    pub fn resource_id(&self) -> &R {
        &self.resource_id
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub async fn log(&self, message: impl Into<String>, level: LogLevel) {
        // stamp before the sink gets a chance to delay us
        let timestamp = Utc::now();

        let record = LogRecord {
            resource_id: self.resource_id.clone(),
            task_type: self.task_type.clone(),
            run_id: self.run_id.clone(),
            timestamp,
            level,
            message: message.into(),
        };

        self.sink.write(record).await;
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.log(message, LogLevel::Info).await
    }

    pub async fn warning(&self, message: impl Into<String>) {
        self.log(message, LogLevel::Warning).await
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.log(message, LogLevel::Error).await
    }
}

impl<R: Debug> Debug for TaskLogger<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskLogger")
            .field("resource_id", &self.resource_id)
            .field("task_type", &self.task_type)
            .field("run_id", &self.run_id)
            .finish()
    }
}
