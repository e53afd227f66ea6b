//! Process-wide worker pool.
//!
//! The pool is created once at process start by its single owner and torn
//! down once with [`WorkerPool::release`]. Components receive a cloneable
//! [`WorkerHandle`] instead of reaching for a global.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskgate_config::WorkerPoolConfig;
use taskgate_domain::{SchedulerError, SchedulerResult};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct WorkerPool {
    runtime: Runtime,
    handle: WorkerHandle,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    pub fn acquire(config: &WorkerPoolConfig) -> SchedulerResult<Self> {
        let started = Instant::now();
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()
            .map_err(|e| SchedulerError::Internal(format!("Failed to create worker pool: {e}")))?;

        let handle = WorkerHandle {
            runtime: runtime.handle().clone(),
            closed: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        };

        info!(
            "Worker pool initialized with {} threads in {:?}",
            config.worker_threads,
            started.elapsed()
        );

        Ok(Self {
            runtime,
            handle,
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_seconds),
        })
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Drives a future to completion on the pool runtime from a synchronous
    /// caller, e.g. the process main loop.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Stops accepting work, waits up to the configured timeout for in-flight
    /// units to finish, then shuts the runtime down.
    ///
    /// Must be called from a synchronous context.
    pub fn release(self) {
        self.handle.closed.store(true, Ordering::SeqCst);
        let in_flight = Arc::clone(&self.handle.in_flight);
        let timeout = self.shutdown_timeout;
        let started = Instant::now();

        let drained = self.runtime.block_on(async move {
            tokio::time::timeout(timeout, async {
                while in_flight.load(Ordering::SeqCst) > 0 {
                    tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
                }
            })
            .await
            .is_ok()
        });

        if drained {
            debug!("All in-flight work finished in {:?}", started.elapsed());
        } else {
            warn!(
                "Worker pool released with {} units still running",
                self.handle.in_flight()
            );
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        self.runtime.shutdown_timeout(remaining);
        info!("Worker pool released");
    }
}

/// Cheap cloneable handle used to submit work to the pool.
#[derive(Clone)]
pub struct WorkerHandle {
    runtime: Handle,
    closed: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerHandle {
    /// Hands a unit of work to the pool and returns immediately.
    pub fn submit<F>(&self, work: F) -> SchedulerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(work).map(|_| ())
    }

    pub fn spawn<F>(&self, work: F) -> SchedulerResult<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        // Count the unit before checking `closed` so `release` cannot drain
        // past it.
        let guard = InFlightGuard::enter(Arc::clone(&self.in_flight));
        if self.is_closed() {
            drop(guard);
            debug!("Rejected work unit, worker pool is closed");
            return Err(SchedulerError::PoolClosed);
        }
        Ok(self.runtime.spawn(async move {
            let _guard = guard;
            work.await
        }))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn test_config() -> WorkerPoolConfig {
        WorkerPoolConfig {
            worker_threads: 2,
            thread_name: "pool-test".to_string(),
            shutdown_timeout_seconds: 5,
        }
    }

    #[test]
    fn test_submit_runs_off_calling_thread() {
        let pool = WorkerPool::acquire(&test_config()).unwrap();
        let (tx, rx) = mpsc::channel();
        let caller = std::thread::current().id();

        pool.handle()
            .submit(async move {
                let _ = tx.send(std::thread::current().id());
            })
            .unwrap();

        let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(worker, caller);
        pool.release();
    }

    #[test]
    fn test_release_waits_for_in_flight_work() {
        let pool = WorkerPool::acquire(&test_config()).unwrap();
        let handle = pool.handle();
        let (tx, rx) = mpsc::channel();

        handle
            .submit(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let _ = tx.send(());
            })
            .unwrap();
        assert_eq!(handle.in_flight(), 1);

        pool.release();
        assert!(rx.try_recv().is_ok());
        assert_eq!(handle.in_flight(), 0);
    }

    #[test]
    fn test_submit_after_release_fails() {
        let pool = WorkerPool::acquire(&test_config()).unwrap();
        let handle = pool.handle();
        pool.release();

        assert!(handle.is_closed());
        assert!(matches!(
            handle.submit(async {}),
            Err(SchedulerError::PoolClosed)
        ));
        assert_eq!(handle.in_flight(), 0);
    }

    #[test]
    fn test_accepted_work_runs_when_release_races_submitters() {
        let pool = WorkerPool::acquire(&test_config()).unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let submitters: Vec<_> = (0..4)
            .map(|_| {
                let handle = pool.handle();
                let accepted = Arc::clone(&accepted);
                let completed = Arc::clone(&completed);
                std::thread::spawn(move || loop {
                    let completed = Arc::clone(&completed);
                    let result = handle.submit(async move {
                        completed.fetch_add(1, Ordering::SeqCst);
                    });
                    match result {
                        Ok(()) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => {
                            assert!(matches!(e, SchedulerError::PoolClosed));
                            return handle;
                        }
                    }
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(20));
        pool.release();

        for submitter in submitters {
            let handle = submitter.join().unwrap();
            assert_eq!(handle.in_flight(), 0);
        }
        assert!(accepted.load(Ordering::SeqCst) > 0);
        assert_eq!(
            completed.load(Ordering::SeqCst),
            accepted.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn test_block_on_returns_value() {
        let pool = WorkerPool::acquire(&test_config()).unwrap();
        let handle = pool.handle();
        let value = pool.block_on(async move { handle.spawn(async { 21 * 2 }).unwrap().await.unwrap() });
        assert_eq!(value, 42);
        pool.release();
    }
}
