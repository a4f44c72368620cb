/// integration tests for lock serialization across spawned tasks
///
use async_std::task;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use task_locks::{
    run_with_lock, LockCache, LockCacheConfig, LogLevel, LogRecord, LogSink, Supervisor, TaskLogger,
};

// read, yield, write: loses updates unless serialized
async fn increment(counter: Arc<AtomicU64>) {
    let current = counter.load(Ordering::SeqCst);
    task::sleep(Duration::from_millis(2)).await;
    counter.store(current + 1, Ordering::SeqCst);
}

#[test]
fn locked_increments_are_not_lost() {
    task::block_on(async move {
        let locks = Arc::new(LockCache::from_config(&LockCacheConfig::default()).unwrap());
        let supervisor = Supervisor::new();
        let counter = Arc::new(AtomicU64::new(0));

        for n in 0..20 {
            let locks = locks.clone();
            let counter = counter.clone();
            supervisor.spawn(format!("safe-{}", n), async move {
                run_with_lock(&locks, 1u64, || increment(counter)).await;
                Ok::<_, anyhow::Error>(())
            });
        }

        supervisor.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(supervisor.status().failed, 0);
    });
}

#[test]
fn serialization_survives_a_tiny_cache() {
    task::block_on(async move {
        // capacity 1 with many ids in flight: in-use locks must not be evicted
        let locks = Arc::new(LockCache::new(1).unwrap());
        let supervisor = Supervisor::new();
        let counters: Vec<Arc<AtomicU64>> = (0..4).map(|_| Arc::new(AtomicU64::new(0))).collect();

        for n in 0..40u64 {
            let locks = locks.clone();
            let counter = counters[(n % 4) as usize].clone();
            supervisor.spawn_unnamed(async move {
                locks.run(n % 4, || increment(counter)).await;
                Ok::<_, anyhow::Error>(())
            });
        }

        supervisor.wait_idle().await;
        for counter in counters.iter() {
            assert_eq!(counter.load(Ordering::SeqCst), 10);
        }

        // everything is idle again, so one more lookup brings the cache back to capacity
        locks.get_or_create(99);
        assert_eq!(locks.len(), 1);
    });
}

#[test]
fn logger_inside_locked_task() {
    task::block_on(async move {
        let records = Arc::new(async_std::sync::Mutex::new(Vec::<LogRecord<u64>>::new()));
        let store = records.clone();
        let sink: Arc<dyn LogSink<u64>> = Arc::new(move |record: LogRecord<u64>| {
            let store = store.clone();
            async move {
                store.lock().await.push(record);
            }
        });

        let locks = Arc::new(LockCache::new(10).unwrap());
        let supervisor = Supervisor::new();

        for n in 0..3 {
            let locks = locks.clone();
            let logger = TaskLogger::new(42u64, "increment", format!("run-{}", n), sink.clone());
            supervisor.spawn(format!("logged-{}", n), async move {
                locks
                    .run(42u64, || async {
                        logger.log("start", LogLevel::Info).await;
                        logger.log("end", LogLevel::Info).await;
                    })
                    .await;
                Ok::<_, anyhow::Error>(())
            });
        }

        supervisor.wait_idle().await;

        let records = records.lock().await;
        assert_eq!(records.len(), 6);
        // start/end pairs from the same run are adjacent
        for pair in records.chunks(2) {
            assert_eq!(pair[0].run_id, pair[1].run_id);
            assert_eq!(pair[0].message, "start");
            assert_eq!(pair[1].message, "end");
        }
    });
}
