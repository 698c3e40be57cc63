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

//! Simulated entities and the periodic loop that drives them.
//!
//! Each domain (GPU fleet, ML workload, demo-service GPUs) implements
//! [`Simulation`]. The [`scheduler`] owns one simulation per background
//! task and calls [`Simulation::tick`] on a fixed interval.

pub mod constants;
pub mod demo;
pub mod gpu;
pub mod inference;
pub mod ml;
pub mod rules;
pub mod scheduler;
pub mod training;

use rand::rngs::StdRng;
use thiserror::Error;

use crate::sink::MetricSink;

pub use demo::DemoGpuLoad;
pub use gpu::{GpuFleet, GpuPolicy, GpuState};
pub use ml::{MlPolicy, MlWorkload};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use training::{TrainingJobState, TrainingTick};

/// Failure while computing one entity's next state.
#[derive(Debug, Error, PartialEq)]
pub enum UpdateError {
    #[error("field '{field}' evaluated to non-finite value {value}")]
    NonFinite { field: &'static str, value: f64 },
}

/// A domain of simulated entities advanced once per tick.
pub trait Simulation: Send + 'static {
    /// Short name used in logs and task errors.
    fn name(&self) -> &'static str;

    /// Register every metric family this simulation writes.
    fn describe(&self, registry: &crate::sink::Registry) -> Result<(), crate::sink::SinkError>;

    /// Advance every entity once and publish the results.
    fn tick(&mut self, rng: &mut StdRng, sink: &dyn MetricSink);
}
