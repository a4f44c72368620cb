use async_std::task::JoinHandle;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;

pub type TaskId = u64;

/// why a background task failed
#[derive(Error, Debug)]
pub enum FailureKind {
    #[error("error: {0:#}")]
    Error(anyhow::Error),

    #[error("panic: {0}")]
    Panic(String),
}

/// A failed background task: its id, its name and what went wrong.
#[derive(Error, Debug)]
#[error("task {name} (id {id}) failed, {kind}")]
pub struct TaskFailure {
    pub id: TaskId,
    pub name: String,
    pub kind: FailureKind,
}

impl TaskFailure {
    pub(crate) fn error(id: TaskId, name: &str, error: anyhow::Error) -> TaskFailure {
        TaskFailure {
            id,
            name: name.to_string(),
            kind: FailureKind::Error(error),
        }
    }

    pub(crate) fn panic(id: TaskId, name: &str, payload: Box<dyn Any + Send>) -> TaskFailure {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };

        TaskFailure {
            id,
            name: name.to_string(),
            kind: FailureKind::Panic(message),
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self.kind, FailureKind::Panic(_))
    }
}

/// Handle to a spawned task.
///
/// Awaiting it yields the task's value or its [`TaskFailure`]; the failure has
/// already been reported by the supervisor either way. Dropping the handle
/// leaves the task running.
pub struct TaskHandle<T> {
    id: TaskId,
    name: String,
    done: Arc<AtomicBool>,
    join: Pin<Box<JoinHandle<Result<T, TaskFailure>>>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(
        id: TaskId,
        name: String,
        done: Arc<AtomicBool>,
        join: JoinHandle<Result<T, TaskFailure>>,
    ) -> TaskHandle<T> {
        TaskHandle {
            id,
            name,
            done,
            join: Box::pin(join),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// true once the task has finished and its completion hook has run
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("done", &self.is_done())
            .finish()
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskFailure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.join.as_mut().poll(cx)
    }
}
