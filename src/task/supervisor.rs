use async_channel::Receiver;
use async_std::task;
use futures::FutureExt;
use hashbrown::HashMap;
use log::*;
use service_uptime::Uptime;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::handle::{TaskFailure, TaskHandle, TaskId};
use crate::config::SupervisorConfig;
use crate::error::{Error, Result};
use crate::status::{JsonString, SupervisorStatus};

/// called once for every failed task, after the failure has been logged
pub type FailureHook = Arc<dyn Fn(&TaskFailure) + Send + Sync>;

// a spawned task that has not finished yet; the receiver closes when it does
struct Retained {
    name: String,
    done: Receiver<()>,
}

struct Inner {
    config: SupervisorConfig,
    uptime: Uptime,
    tasks: Mutex<HashMap<TaskId, Retained>>,
    next_id: AtomicU64,
    failed: AtomicU64,
    hook: Option<FailureHook>,
}

impl Inner {
    fn tasks(&self) -> MutexGuard<'_, HashMap<TaskId, Retained>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, failure: &TaskFailure) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        error!("{}: {}", self.config.name, failure);

        if let Some(hook) = &self.hook {
            if panic::catch_unwind(AssertUnwindSafe(|| hook(failure))).is_err() {
                error!(
                    "{}: failure hook panicked while reporting task {}",
                    self.config.name, failure.name
                );
            }
        }
    }
}

/// Runs detached background tasks and makes sure none of them fail silently.
///
/// Every spawned task stays in the supervisor's retained-set until it finishes.
/// When a task returns an error or panics the supervisor logs it once (and calls
/// the failure hook, if any); the failure never reaches the spawning caller
/// unless that caller chooses to await the returned [`TaskHandle`].
///
/// Clones share the same retained-set; separate `Supervisor::new` calls do not.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new() -> Supervisor {
        Supervisor::from_config(SupervisorConfig::default())
    }

    pub fn from_config(config: SupervisorConfig) -> Supervisor {
        Supervisor::build(config, None)
    }

    /// create a supervisor that also hands each task failure to `hook`
    pub fn with_failure_hook<F>(config: SupervisorConfig, hook: F) -> Supervisor
    where
        F: Fn(&TaskFailure) + Send + Sync + 'static,
    {
        Supervisor::build(config, Some(Arc::new(hook)))
    }

    fn build(config: SupervisorConfig, hook: Option<FailureHook>) -> Supervisor {
        info!("starting supervisor: {}", config.name);

        let inner = Inner {
            config,
            uptime: Uptime::new(),
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            hook,
        };

        Supervisor {
            inner: Arc::new(inner),
        }
    }

    /// Schedule `work` in the background and return immediately.
    pub fn spawn<F, T, E>(&self, name: impl Into<String>, work: F) -> TaskHandle<T>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let id = self.next_id();
        self.launch(id, name.into(), work)
    }

    /// like `spawn`, named `task-<id>`
    pub fn spawn_unnamed<F, T, E>(&self, work: F) -> TaskHandle<T>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let id = self.next_id();
        self.launch(id, format!("task-{}", id), work)
    }

    fn next_id(&self) -> TaskId {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn launch<F, T, E>(&self, id: TaskId, name: String, work: F) -> TaskHandle<T>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        // retain before scheduling so a fast task cannot finish before it is tracked
        let (done_tx, done_rx) = async_channel::bounded::<()>(1);
        let retained = Retained {
            name: name.clone(),
            done: done_rx,
        };
        self.inner.tasks().insert(id, retained);

        let done = Arc::new(AtomicBool::new(false));
        let task_done = done.clone();
        let inner = self.inner.clone();
        let task_name = name.clone();

        debug!("{}: spawn task {} (id {})", self.inner.config.name, name, id);

        let join = task::spawn(async move {
            let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(TaskFailure::error(id, &task_name, e.into())),
                Err(payload) => Err(TaskFailure::panic(id, &task_name, payload)),
            };

            match &outcome {
                Ok(_) => debug!("{}: task {} (id {}) done", inner.config.name, task_name, id),
                Err(failure) => inner.report(failure),
            }

            inner.tasks().remove(&id);
            task_done.store(true, Ordering::Release);
            drop(done_tx);

            outcome
        });

        TaskHandle::new(id, name, done, join)
    }

    /// the number of tasks that have not finished
    pub fn active(&self) -> usize {
        self.inner.tasks().len()
    }

    pub fn active_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .tasks()
            .values()
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        names
    }

    /// wait until every task spawned so far, and any spawned meanwhile, has finished
    pub async fn wait_idle(&self) {
        loop {
            let pending: Vec<Receiver<()>> =
                self.inner.tasks().values().map(|r| r.done.clone()).collect();

            if pending.is_empty() {
                break;
            }

            for rx in pending {
                // closes, never sends
                let _ = rx.recv().await;
            }
        }
    }

    /// wait for in-flight tasks up to the configured grace period
    pub async fn shutdown(&self) -> Result<()> {
        let name = &self.inner.config.name;
        let grace = self.inner.config.grace();
        info!("{}: shutdown requested, active: {}", name, self.active());

        match async_std::future::timeout(grace, self.wait_idle()).await {
            Ok(()) => {
                info!("{}: all tasks stopped within {:?}", name, grace);
                Ok(())
            }
            Err(_) => {
                let stuck = self.active_names();
                warn!("{}: shutdown grace {:?} exceeded, stuck: {:?}", name, grace, stuck);
                Err(Error::GraceExceeded { grace, stuck })
            }
        }
    }

    pub fn status(&self) -> SupervisorStatus {
        SupervisorStatus::new(
            self.inner.config.name.clone(),
            self.inner.uptime.to_string(),
            self.active(),
            self.inner.next_id.load(Ordering::Relaxed),
            self.inner.failed.load(Ordering::Relaxed),
        )
    }

    pub fn status_json(&self) -> JsonString {
        let msg = self.status().to_json();
        info!("status response: {}", msg);
        msg
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Supervisor::new()
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("name", &self.inner.config.name)
            .field("active", &self.active())
            .finish()
    }
}
