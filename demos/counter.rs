/// racy versus locked counter increments.
///
/// every task reads the counter, sleeps, then writes counter + 1. without a lock
/// concurrent tasks read the same value and updates are lost; with
/// `run_with_lock` on a single resource id they queue up and none are lost.
///
use anyhow::Result;
use async_channel::Sender;
use async_std::task;
use log::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use task_locks::logging;
use task_locks::{
    run_with_lock, Config, LockCache, LogCrateSink, LogSink, Supervisor, TaskLogger,
};

const TASKS: u64 = 5;
const COUNTER_ID: u64 = 1;

#[derive(Debug)]
struct Increment {
    kind: &'static str,
    task: u64,
    read: u64,
    wrote: u64,
}

async fn increment(
    kind: &'static str,
    task_id: u64,
    counter: &AtomicU64,
    tx: &Sender<Increment>,
) -> Result<()> {
    let read = counter.load(Ordering::SeqCst);
    task::sleep(Duration::from_millis(100 + fastrand::u64(0..50))).await;
    let wrote = read + 1;
    counter.store(wrote, Ordering::SeqCst);

    tx.send(Increment {
        kind,
        task: task_id,
        read,
        wrote,
    })
    .await?;

    Ok(())
}

#[async_std::main]
async fn main() -> Result<()> {
    logging::init_console(LevelFilter::Info)?;

    let json = r#"{"lock_cache":{"max_size":500},"supervisor":{"name":"counter-demo"}}"#;
    let config = Config::from_json(json)?;
    let locks = Arc::new(LockCache::from_config(&config.lock_cache)?);
    let supervisor = Supervisor::from_config(config.supervisor);
    let sink: Arc<dyn LogSink<u64>> = Arc::new(LogCrateSink);

    let unsafe_counter = Arc::new(AtomicU64::new(0));
    let safe_counter = Arc::new(AtomicU64::new(0));
    let (tx, rx) = async_channel::unbounded();

    for task_id in 1..=TASKS {
        let counter = unsafe_counter.clone();
        let unsafe_tx = tx.clone();
        supervisor.spawn(format!("unsafe-{}", task_id), async move {
            increment("unsafe", task_id, &counter, &unsafe_tx).await
        });

        let counter = safe_counter.clone();
        let tx = tx.clone();
        let locks = locks.clone();
        let logger =
            TaskLogger::with_generated_run_id(COUNTER_ID, "safe_increment", sink.clone());
        supervisor.spawn(format!("safe-{}", task_id), async move {
            logger.info(format!("task {} waiting for the counter lock", task_id)).await;
            run_with_lock(&locks, COUNTER_ID, || increment("safe", task_id, &counter, &tx)).await?;
            logger.info(format!("task {} done", task_id)).await;
            Ok::<_, anyhow::Error>(())
        });
    }

    // a task that fails is logged by the supervisor, the rest carry on
    supervisor.spawn("doomed", async {
        task::sleep(Duration::from_millis(10)).await;
        Err::<(), _>(anyhow::anyhow!("this task always fails"))
    });

    drop(tx);
    supervisor.shutdown().await?;

    while let Ok(inc) = rx.recv().await {
        info!("{} task {}: read {}, wrote {}", inc.kind, inc.task, inc.read, inc.wrote);
    }

    info!(
        "unsafe: expected {}, actual {}",
        TASKS,
        unsafe_counter.load(Ordering::SeqCst)
    );
    info!(
        "safe: expected {}, actual {}",
        TASKS,
        safe_counter.load(Ordering::SeqCst)
    );
    info!("{}", supervisor.status_json());

    Ok(())
}
