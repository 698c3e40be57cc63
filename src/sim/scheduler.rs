// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Background task that ticks one [`Simulation`] on a fixed interval.
//!
//! The task owns its simulation exclusively. Each tick runs on the blocking
//! pool, so a slow tick never stalls the runtime's timers. The task stops
//! when the handle signals shutdown (or is dropped) and hands the
//! simulation back to [`SchedulerHandle::stop`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Simulation;
use crate::error::{Error, Result};
use crate::sink::MetricSink;

pub struct Scheduler;

impl Scheduler {
    /// Start ticking `sim` with an OS-seeded RNG.
    pub fn spawn<S: Simulation>(
        sim: S,
        sink: Arc<dyn MetricSink>,
        interval: Duration,
    ) -> SchedulerHandle<S> {
        let rng = StdRng::from_rng(&mut rand::rng());
        Self::spawn_with_rng(sim, sink, interval, rng)
    }

    /// Start ticking `sim` with a caller-provided RNG.
    pub fn spawn_with_rng<S: Simulation>(
        sim: S,
        sink: Arc<dyn MetricSink>,
        interval: Duration,
        rng: StdRng,
    ) -> SchedulerHandle<S> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let name = sim.name();
        let handle = tokio::spawn(run_loop(sim, sink, interval, rng, shutdown_rx));
        tracing::info!(task = name, ?interval, "scheduler started");

        SchedulerHandle {
            name,
            shutdown_tx,
            handle,
        }
    }
}

/// Handle to a running scheduler task.
pub struct SchedulerHandle<S> {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<S>>,
}

impl<S> SchedulerHandle<S> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal shutdown and wait up to `grace` for the task to exit.
    ///
    /// A tick in flight when the grace period ends is abandoned: the task
    /// is aborted and its simulation dropped once the tick returns.
    pub async fn stop(self, grace: Duration) -> Result<S> {
        let _ = self.shutdown_tx.send(true);
        let mut handle = self.handle;

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(Ok(sim))) => {
                tracing::info!(task = self.name, "scheduler stopped");
                Ok(sim)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(source)) => Err(Error::TaskJoin {
                task: self.name,
                source,
            }),
            Err(_) => {
                handle.abort();
                tracing::warn!(task = self.name, ?grace, "scheduler aborted");
                Err(Error::ShutdownTimeout {
                    task: self.name,
                    grace,
                })
            }
        }
    }
}

async fn run_loop<S: Simulation>(
    mut sim: S,
    sink: Arc<dyn MetricSink>,
    interval: Duration,
    mut rng: StdRng,
    mut shutdown: watch::Receiver<bool>,
) -> Result<S> {
    let name = sim.name();
    let mut ticker = tokio::time::interval(interval);
    // A slow tick delays the next one instead of triggering a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let started = Instant::now();
                let tick_sink = Arc::clone(&sink);
                let tick = tokio::task::spawn_blocking(move || {
                    sim.tick(&mut rng, tick_sink.as_ref());
                    (sim, rng)
                });
                (sim, rng) = tick
                    .await
                    .map_err(|source| Error::TaskJoin { task: name, source })?;
                ticks += 1;
                tracing::debug!(
                    task = name,
                    tick = ticks,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tick complete"
                );
            }
            _ = shutdown.changed() => {
                tracing::debug!(task = name, ticks, "scheduler shutting down");
                break;
            }
        }
    }

    Ok(sim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{Registry, SinkError};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingSim {
        ticks: Arc<AtomicU64>,
        seen: u64,
    }

    impl Simulation for CountingSim {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn describe(&self, registry: &Registry) -> std::result::Result<(), SinkError> {
            registry.register_gauge("ticks", "Ticks seen", &[])
        }

        fn tick(&mut self, _rng: &mut StdRng, sink: &dyn MetricSink) {
            self.seen += 1;
            self.ticks.fetch_add(1, Ordering::SeqCst);
            let _ = sink.set_gauge("ticks", &[], self.seen as f64);
        }
    }

    #[tokio::test]
    async fn test_scheduler_ticks_until_stopped() {
        let registry = Arc::new(Registry::new());
        let ticks = Arc::new(AtomicU64::new(0));
        let sim = CountingSim {
            ticks: Arc::clone(&ticks),
            seen: 0,
        };
        sim.describe(&registry).unwrap();

        let handle = Scheduler::spawn_with_rng(
            sim,
            registry.clone(),
            Duration::from_millis(10),
            StdRng::seed_from_u64(1),
        );
        assert_eq!(handle.name(), "counting");
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!handle.is_finished());

        let sim = handle.stop(Duration::from_secs(1)).await.unwrap();
        assert!(sim.seen >= 2, "expected several ticks, saw {}", sim.seen);
        assert_eq!(registry.value("ticks", &[]), Some(sim.seen as f64));

        // No ticks after stop returns.
        let after_stop = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_first_tick_runs_immediately() {
        let registry = Arc::new(Registry::new());
        let ticks = Arc::new(AtomicU64::new(0));
        let sim = CountingSim {
            ticks: Arc::clone(&ticks),
            seen: 0,
        };
        sim.describe(&registry).unwrap();

        let handle = Scheduler::spawn(sim, registry, Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let sim = handle.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(sim.seen, 1);
    }

    #[derive(Debug)]
    struct SlowSim {
        delay: Duration,
        ticks: u64,
    }

    impl Simulation for SlowSim {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn describe(&self, _registry: &Registry) -> std::result::Result<(), SinkError> {
            Ok(())
        }

        fn tick(&mut self, _rng: &mut StdRng, _sink: &dyn MetricSink) {
            std::thread::sleep(self.delay);
            self.ticks += 1;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_times_out_when_tick_outlasts_grace() {
        let sim = SlowSim {
            delay: Duration::from_millis(400),
            ticks: 0,
        };
        let handle = Scheduler::spawn_with_rng(
            sim,
            Arc::new(Registry::new()),
            Duration::from_millis(10),
            StdRng::seed_from_u64(2),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let err = handle.stop(Duration::from_millis(50)).await.unwrap_err();
        assert!(
            matches!(err, Error::ShutdownTimeout { task: "slow", .. }),
            "unexpected error: {err}"
        );
        assert!(started.elapsed() < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_tick_within_grace() {
        let sim = SlowSim {
            delay: Duration::from_millis(100),
            ticks: 0,
        };
        let handle = Scheduler::spawn_with_rng(
            sim,
            Arc::new(Registry::new()),
            Duration::from_secs(3600),
            StdRng::seed_from_u64(3),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;

        let sim = handle.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(sim.ticks, 1);
    }
}
