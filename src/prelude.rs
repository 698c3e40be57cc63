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

//! The infra-sim prelude.
//!
//! Re-exports the types needed to drive a simulation by hand:
//!
//! ```rust
//! use infra_sim::prelude::*;
//! use rand::SeedableRng;
//!
//! let registry = Registry::new();
//! let mut fleet = GpuFleet::new(&GpuSimConfig::default(), &mut rand::rng());
//! fleet.describe(&registry).unwrap();
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! fleet.tick(&mut rng, &registry);
//! assert!(registry.render().contains("gpu_utilization_percent"));
//! ```

pub use crate::common::config::{AppSimConfig, GpuSimConfig, LoadGenConfig, MlSimConfig};
pub use crate::error::{Error, Result};
pub use crate::sim::{
    DemoGpuLoad, GpuFleet, GpuPolicy, GpuState, MlPolicy, MlWorkload, Scheduler,
    SchedulerHandle, Simulation, TrainingJobState, TrainingTick, UpdateError,
};
pub use crate::sink::{MetricSample, MetricSink, Registry, SampleValue, SinkError};
