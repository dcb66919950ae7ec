//! Periodic task runner for time-triggered agent work (e.g. scheduled
//! analytics reports).

use crate::error::SchedulerError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

type JobFuture = Pin<Box<dyn Future<Output = Result<(), SchedulerError>> + Send>>;
type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Default resolution of the scheduler's tick loop.
pub const DEFAULT_TICK_RESOLUTION: Duration = Duration::from_secs(30);

struct Job {
    name: String,
    interval: Duration,
    last_run: Option<Instant>,
    run: JobFn,
}

/// Runs named jobs at configured intervals on a single tick loop.
///
/// Jobs run sequentially within one tick — a slow job delays the rest
/// of that tick's due jobs but never overlaps with itself. Exceptions
/// are logged and the job is retried at its next due time (the
/// scheduler does not retry immediately).
pub struct Scheduler {
    tick_resolution: Duration,
    jobs: Arc<Mutex<Vec<Job>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(tick_resolution: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            tick_resolution,
            jobs: Arc::new(Mutex::new(Vec::new())),
            task: Mutex::new(None),
            shutdown,
        }
    }

    /// Register a job. Returns `DuplicateJob` if `name` is already
    /// registered.
    pub async fn add_job<F, Fut>(&self, name: impl Into<String>, interval: Duration, job: F) -> Result<(), SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SchedulerError>> + Send + 'static,
    {
        let name = name.into();
        let mut jobs = self.jobs.lock().await;
        if jobs.iter().any(|j| j.name == name) {
            return Err(SchedulerError::DuplicateJob(name));
        }
        jobs.push(Job {
            name,
            interval,
            last_run: None,
            run: Arc::new(move || Box::pin(job())),
        });
        Ok(())
    }

    /// Idempotent. Starts the tick loop.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }
        let jobs = self.jobs.clone();
        let tick_resolution = self.tick_resolution;
        let mut shutdown_rx = self.shutdown.subscribe();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_resolution);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tick(&jobs).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        }));
    }

    /// Idempotent. The current tick (if any) is not interrupted; the
    /// next tick honors the stop flag instead.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
    }
}

async fn tick(jobs: &Arc<Mutex<Vec<Job>>>) {
    let mut jobs = jobs.lock().await;
    let now = Instant::now();
    for job in jobs.iter_mut() {
        let due = job
            .last_run
            .map(|last| now.duration_since(last) >= job.interval)
            .unwrap_or(true);
        if !due {
            continue;
        }
        if let Err(err) = (job.run)().await {
            tracing::warn!(job = %job.name, error = %err, "scheduled job failed, will retry next due time");
        }
        job.last_run = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn job_fires_roughly_every_interval() {
        let scheduler = Scheduler::new(Duration::from_millis(50));
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        scheduler
            .add_job("test", Duration::from_millis(100), move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(260)).await;
        scheduler.stop().await;
        let fires = count.load(Ordering::SeqCst);
        assert!((1..=3).contains(&fires), "expected 1-3 fires, got {fires}");
    }

    #[tokio::test]
    async fn duplicate_job_name_is_rejected() {
        let scheduler = Scheduler::new(Duration::from_millis(50));
        scheduler.add_job("dup", Duration::from_secs(1), || async { Ok(()) }).await.unwrap();
        let result = scheduler.add_job("dup", Duration::from_secs(1), || async { Ok(()) }).await;
        assert!(matches!(result, Err(SchedulerError::DuplicateJob(_))));
    }

    #[tokio::test]
    async fn failing_job_does_not_stop_scheduler() {
        let scheduler = Scheduler::new(Duration::from_millis(30));
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        scheduler
            .add_job("flaky", Duration::from_millis(40), move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(SchedulerError::Other("boom".into()))
                }
            })
            .await
            .unwrap();
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop().await;
        assert!(count.load(Ordering::SeqCst) >= 2);
    }
}
