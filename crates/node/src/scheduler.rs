//! Fixed-interval loops.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Runs a tick body on a fixed period until shutdown.
///
/// The body is awaited inside the loop, so ticks never overlap; ticks missed
/// while a slow body runs are skipped. Shutdown is only observed between
/// ticks, so a tick in flight always completes.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
}

impl PeriodicTask {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self { name, period }
    }

    /// Runs the loop. A failed tick is logged and the loop continues.
    pub async fn run<F, Fut, T, E>(self, mut shutdown: broadcast::Receiver<()>, mut tick: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        tracing::info!(task = self.name, period = ?self.period, "periodic task started");

        let mut interval = interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let start = Instant::now();
                    if let Err(e) = tick().await {
                        metrics::counter!("tick_failures_total", "task" => self.name).increment(1);
                        tracing::error!(task = self.name, error = %e, "tick failed");
                    }
                    metrics::histogram!("tick_duration_seconds", "task" => self.name)
                        .record(start.elapsed().as_secs_f64());
                }
                _ = shutdown.recv() => {
                    tracing::info!(task = self.name, "periodic task shutting down");
                    break;
                }
            }
        }
    }

    /// Spawns the loop on the runtime.
    pub fn spawn<F, Fut, T, E>(self, shutdown: broadcast::Receiver<()>, tick: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        tokio::spawn(self.run(shutdown, tick))
    }
}
