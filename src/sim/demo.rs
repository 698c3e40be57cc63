//! Fixed-profile GPU gauges for the demo HTTP service

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

use rand::rngs::StdRng;
use rand::Rng;

use super::constants::APP_GPU_COUNT;
use super::Simulation;
use crate::sink::{MetricSink, Publisher, Registry, SinkError};

pub const DEMO_GPU_MEMORY_USAGE: &str = "gpu_memory_usage_bytes";
pub const DEMO_GPU_UTILIZATION: &str = "gpu_utilization_percent";
pub const DEMO_GPU_TEMPERATURE: &str = "gpu_temperature_celsius";

/// Load band for one demo GPU.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GpuProfile {
    pub utilization: (u32, u32),
    pub memory_bytes: (u64, u64),
    pub base_temperature: f64,
    pub temperature_per_util: f64,
}

pub const HEAVY: GpuProfile = GpuProfile {
    utilization: (85, 99),
    memory_bytes: (14_000_000_000, 16_000_000_000),
    base_temperature: 65.0,
    temperature_per_util: 0.3,
};

pub const MEDIUM: GpuProfile = GpuProfile {
    utilization: (40, 70),
    memory_bytes: (2_000_000_000, 8_000_000_000),
    base_temperature: 50.0,
    temperature_per_util: 0.2,
};

pub const LIGHT: GpuProfile = GpuProfile {
    utilization: (5, 25),
    memory_bytes: (2_000_000_000, 8_000_000_000),
    base_temperature: 40.0,
    temperature_per_util: 0.15,
};

/// `gpu_0` is busy, `gpu_1` moderate, the rest mostly idle.
pub fn profile_for(index: usize) -> GpuProfile {
    match index {
        0 => HEAVY,
        1 => MEDIUM,
        _ => LIGHT,
    }
}

pub fn demo_gpu_label(index: usize) -> String {
    format!("gpu_{index}")
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DemoGpuReading {
    pub utilization: f64,
    pub memory_bytes: f64,
    pub temperature_celsius: f64,
}

impl GpuProfile {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DemoGpuReading {
        let utilization = rng.random_range(self.utilization.0..=self.utilization.1);
        let memory_bytes = rng.random_range(self.memory_bytes.0..=self.memory_bytes.1);
        // Temperature follows its own utilization draw.
        let heat_util = rng.random_range(self.utilization.0..=self.utilization.1);
        let temperature_celsius = self.base_temperature
            + heat_util as f64 * self.temperature_per_util
            + rng.random_range(-3..=3) as f64;

        DemoGpuReading {
            utilization: utilization as f64,
            memory_bytes: memory_bytes as f64,
            temperature_celsius,
        }
    }
}

/// Background gauge updater for the demo service's GPUs.
#[derive(Debug, Clone)]
pub struct DemoGpuLoad {
    pub gpu_count: usize,
}

impl Default for DemoGpuLoad {
    fn default() -> Self {
        Self {
            gpu_count: APP_GPU_COUNT,
        }
    }
}

impl Simulation for DemoGpuLoad {
    fn name(&self) -> &'static str {
        "demo-gpus"
    }

    fn describe(&self, registry: &Registry) -> Result<(), SinkError> {
        registry.register_gauge(
            DEMO_GPU_MEMORY_USAGE,
            "Simulated GPU memory usage in bytes",
            &["gpu_id"],
        )?;
        registry.register_gauge(
            DEMO_GPU_UTILIZATION,
            "Simulated GPU utilization percentage",
            &["gpu_id"],
        )?;
        registry.register_gauge(
            DEMO_GPU_TEMPERATURE,
            "GPU temperature in Celsius",
            &["gpu_id"],
        )
    }

    fn tick(&mut self, rng: &mut StdRng, sink: &dyn MetricSink) {
        let publisher = Publisher::new(sink, "demo-gpus");
        for index in 0..self.gpu_count {
            let reading = profile_for(index).sample(rng);
            let gpu_id = demo_gpu_label(index);
            let labels = [("gpu_id", gpu_id.as_str())];
            publisher.gauge(DEMO_GPU_UTILIZATION, &labels, reading.utilization);
            publisher.gauge(DEMO_GPU_MEMORY_USAGE, &labels, reading.memory_bytes);
            publisher.gauge(DEMO_GPU_TEMPERATURE, &labels, reading.temperature_celsius);
        }
    }
}
