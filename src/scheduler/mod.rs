//! Poll scheduler: two independently controlled interval loops.
//!
//! Each tick spawns its job without waiting for the previous one, so slow
//! responses can overlap. Stopping a loop prevents future ticks only; a job
//! already in flight still runs to completion.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// A named repeating job with start/stop control.
pub struct PollLoop {
    name: &'static str,
    stop_tx: Mutex<Option<broadcast::Sender<()>>>,
}

impl PollLoop {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stop_tx: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.lock().map(|tx| tx.is_some()).unwrap_or(false)
    }

    /// Start firing `job` every `period`, first tick immediately.
    ///
    /// Returns false if the loop was already running.
    pub fn start<F, Fut>(&self, period: Duration, job: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Ok(mut slot) = self.stop_tx.lock() else {
            return false;
        };
        if slot.is_some() {
            return false;
        }

        let (stop_tx, stop_rx) = broadcast::channel(1);
        *slot = Some(stop_tx);
        drop(slot);

        tracing::info!("Scheduler: starting {} loop every {:?}", self.name, period);
        tokio::spawn(run_loop(self.name, period, Arc::new(job), stop_rx));
        true
    }

    /// Stop future ticks. Returns false if the loop was not running.
    pub fn stop(&self) -> bool {
        let stop_tx = match self.stop_tx.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };

        match stop_tx {
            Some(tx) => {
                let _ = tx.send(());
                tracing::info!("Scheduler: stopped {} loop", self.name);
                true
            }
            None => false,
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    job: Arc<F>,
    mut stop_rx: broadcast::Receiver<()>,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                tokio::spawn(job());
            }
        }
    }

    tracing::debug!("Scheduler: {} loop exited", name);
}

/// The telemetry and log loops.
pub struct PollScheduler {
    pub telemetry: PollLoop,
    pub logs: PollLoop,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self {
            telemetry: PollLoop::new("telemetry"),
            logs: PollLoop::new("logs"),
        }
    }
}

impl PollScheduler {
    /// Stop both loops.
    pub fn shutdown(&self) {
        self.telemetry.stop();
        self.logs.stop();
    }
}
