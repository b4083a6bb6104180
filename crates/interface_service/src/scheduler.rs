//! Periodic cycle driver
//!
//! The first cycle starts immediately. A cycle always runs to completion
//! before the next tick is awaited, and ticks missed while a cycle ran are
//! skipped, so at most one cycle is ever in flight.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub struct Scheduler {
    period: Duration,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runs `job` every period until `shutdown` resolves; returns the number
    /// of completed runs
    pub async fn run<F, Fut, S>(&self, mut job: F, shutdown: S) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
        S: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(period_secs = self.period.as_secs(), "Scheduler started");
        let mut runs = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(runs, "Scheduler stopped");
                    break;
                }
                _ = interval.tick() => {
                    job().await;
                    runs += 1;
                }
            }
        }

        runs
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping scheduler");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping scheduler");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_first_run_is_immediate_and_shutdown_stops_the_loop() {
        let scheduler = Scheduler::new(Duration::from_millis(20));
        let count = Arc::new(AtomicU64::new(0));
        let done = Arc::new(Notify::new());

        let job_count = Arc::clone(&count);
        let job_done = Arc::clone(&done);
        let job = move || {
            let count = Arc::clone(&job_count);
            let done = Arc::clone(&job_done);
            async move {
                if count.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    done.notify_one();
                }
            }
        };

        let runs = scheduler.run(job, async move { done.notified().await }).await;

        assert_eq!(runs, 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_run_after_shutdown_already_requested() {
        let scheduler = Scheduler::new(Duration::from_secs(3600));
        let runs = scheduler.run(|| async {}, async {}).await;
        assert_eq!(runs, 0);
    }
}
