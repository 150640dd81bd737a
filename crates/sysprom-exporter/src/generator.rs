//! Synthetic request traffic for demos and dashboards without real load.

use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    config::{DEFAULT_GENERATOR_INTERVAL, MIN_GENERATOR_INTERVAL},
    metrics::TrafficRecorder,
};

pub const CANDIDATE_PATHS: [&str; 3] = ["/api/users", "/api/orders", "/health"];
pub const CANDIDATE_METHODS: [&str; 2] = ["GET", "POST"];

const MIN_DURATION_SECS: f64 = 0.1;
const MAX_DURATION_SECS: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub interval: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_GENERATOR_INTERVAL,
        }
    }
}

pub struct TrafficGenerator;

impl TrafficGenerator {
    /// Spawns the generator; the first observation lands one interval after start.
    ///
    /// Intervals shorter than [`MIN_GENERATOR_INTERVAL`] are raised to it.
    pub fn start(recorder: Arc<TrafficRecorder>, config: GeneratorConfig) -> GeneratorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval = if config.interval < MIN_GENERATOR_INTERVAL {
            warn!(
                requested_ms = config.interval.as_millis() as u64,
                minimum_ms = MIN_GENERATOR_INTERVAL.as_millis() as u64,
                "generator interval too short, using minimum"
            );
            MIN_GENERATOR_INTERVAL
        } else {
            config.interval
        };
        let task = tokio::spawn(run(recorder, interval, shutdown_rx));

        info!(interval_ms = interval.as_millis() as u64, "traffic generator started");
        GeneratorHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

async fn run(
    recorder: Arc<TrafficRecorder>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (path, method, duration) = synthesize();
                debug!(
                    path,
                    method,
                    duration_ms = duration.as_millis() as u64,
                    "synthetic request"
                );
                recorder.record(path, method, duration);
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

fn synthesize() -> (&'static str, &'static str, Duration) {
    let mut rng = rand::rng();
    let path = CANDIDATE_PATHS[rng.random_range(0..CANDIDATE_PATHS.len())];
    let method = CANDIDATE_METHODS[rng.random_range(0..CANDIDATE_METHODS.len())];
    let seconds = rng.random_range(MIN_DURATION_SECS..MAX_DURATION_SECS);
    (path, method, Duration::from_secs_f64(seconds))
}

/// Owns the running generator task. Dropping the handle aborts the task.
pub struct GeneratorHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl GeneratorHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signals the task and waits for it to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(error = %err, "traffic generator exited abnormally");
        }
        info!("traffic generator stopped");
    }
}

impl Drop for GeneratorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
