//! Simulated GPU fleet

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

use super::constants::*;
use super::rules::{apply_rules, FieldRule, Noise};
use super::{Simulation, UpdateError};
use crate::common::config::GpuSimConfig;
use crate::common::error_handling::ErrorHandler;
use crate::sink::{MetricSink, Publisher, Registry, SinkError};

pub const GPU_UTILIZATION: &str = "gpu_utilization_percent";
pub const GPU_MEMORY_USED: &str = "gpu_memory_used_bytes";
pub const GPU_MEMORY_TOTAL: &str = "gpu_memory_total_bytes";
pub const GPU_TEMPERATURE: &str = "gpu_temperature_celsius";
pub const GPU_POWER_DRAW: &str = "gpu_power_draw_watts";
pub const GPU_SM_CLOCK: &str = "gpu_sm_clock_mhz";
pub const GPU_PCIE_RX: &str = "gpu_pcie_throughput_rx_bytes";
pub const GPU_PCIE_TX: &str = "gpu_pcie_throughput_tx_bytes";
pub const GPU_ECC_ERRORS: &str = "gpu_ecc_errors_total";

/// Failure, recovery and ECC probabilities applied every tick.
#[derive(Clone, Debug, PartialEq)]
pub struct GpuPolicy {
    pub fail_probability: f64,
    pub recover_probability: f64,
    pub ecc_probability: f64,
}

impl Default for GpuPolicy {
    fn default() -> Self {
        Self {
            fail_probability: DEFAULT_GPU_FAILURE_RATE,
            recover_probability: DEFAULT_GPU_RECOVERY_RATE,
            ecc_probability: ECC_ERROR_PROBABILITY,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GpuState {
    pub index: usize,
    pub gpu_id: String,
    pub model: String,
    pub utilization: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub temperature_celsius: f64,
    pub power_watts: f64,
    pub sm_clock_mhz: f64,
    pub pcie_rx_bytes: f64,
    pub pcie_tx_bytes: f64,
    pub failed: bool,
    /// Random-walk position; survives failures so load resumes on recovery.
    pub load: f64,
    pub base_temperature: f64,
}

/// Outcome of one GPU update.
#[derive(Clone, Debug)]
pub struct GpuStep {
    pub state: GpuState,
    pub ecc_error: bool,
}

/// Healthy-state update policy, evaluated top to bottom.
pub const GPU_RULES: &[FieldRule<GpuState>] = &[
    FieldRule {
        field: "utilization",
        formula: |s| s.load,
        noise: Noise::Integer(-10, 10),
        floor: 0.0,
        ceiling: 100.0,
        store: |s, v| {
            s.load = v;
            s.utilization = v;
        },
    },
    FieldRule {
        field: "memory_used_bytes",
        formula: |s| s.memory_total_bytes as f64 * (s.utilization / 100.0),
        noise: Noise::Scale(0.8, 1.2),
        floor: 0.0,
        ceiling: f64::INFINITY,
        store: |s, v| s.memory_used_bytes = (v as u64).min(s.memory_total_bytes),
    },
    FieldRule {
        field: "temperature_celsius",
        formula: |s| s.base_temperature + s.utilization * 0.5,
        noise: Noise::Integer(-3, 3),
        floor: 0.0,
        ceiling: f64::INFINITY,
        store: |s, v| s.temperature_celsius = v,
    },
    FieldRule {
        field: "power_watts",
        formula: |s| 100.0 + s.utilization * 3.0,
        noise: Noise::Integer(-20, 20),
        floor: 0.0,
        ceiling: f64::INFINITY,
        store: |s, v| s.power_watts = v,
    },
    FieldRule {
        field: "sm_clock_mhz",
        formula: |s| throttled_clock(s.temperature_celsius),
        noise: Noise::None,
        floor: 0.0,
        ceiling: BASE_SM_CLOCK_MHZ,
        store: |s, v| s.sm_clock_mhz = v,
    },
    FieldRule {
        field: "pcie_rx_bytes",
        formula: |s| s.utilization * 1_000_000.0,
        noise: Noise::Scale(0.5, 1.5),
        floor: 0.0,
        ceiling: f64::INFINITY,
        store: |s, v| s.pcie_rx_bytes = v,
    },
    FieldRule {
        field: "pcie_tx_bytes",
        formula: |s| s.utilization * 800_000.0,
        noise: Noise::Scale(0.5, 1.5),
        floor: 0.0,
        ceiling: f64::INFINITY,
        store: |s, v| s.pcie_tx_bytes = v,
    },
];

/// SM clock after thermal throttling.
pub fn throttled_clock(temperature_celsius: f64) -> f64 {
    if temperature_celsius > THROTTLE_THRESHOLD_CELSIUS {
        BASE_SM_CLOCK_MHZ
            - (temperature_celsius - THROTTLE_THRESHOLD_CELSIUS) * THROTTLE_MHZ_PER_DEGREE
    } else {
        BASE_SM_CLOCK_MHZ
    }
}

impl GpuState {
    /// Create a GPU with a random load and idle temperature.
    pub fn new<R: Rng + ?Sized>(index: usize, model: &str, rng: &mut R) -> Self {
        let load = rng.random_range(30..=70) as f64;
        let base_temperature = rng.random_range(35..=45) as f64;
        Self::with_baseline(index, model, load, base_temperature)
    }

    pub fn with_baseline(index: usize, model: &str, load: f64, base_temperature: f64) -> Self {
        Self {
            index,
            gpu_id: format!("gpu{index}"),
            model: model.to_string(),
            utilization: load,
            memory_used_bytes: 0,
            memory_total_bytes: GPU_MEMORY_TOTAL_BYTES,
            temperature_celsius: base_temperature,
            power_watts: 0.0,
            sm_clock_mhz: BASE_SM_CLOCK_MHZ,
            pcie_rx_bytes: 0.0,
            pcie_tx_bytes: 0.0,
            failed: false,
            load,
            base_temperature,
        }
    }

    /// Compute the next state.
    ///
    /// Failure and recovery are decided against the state at the start of
    /// the tick: a GPU that fails this tick cannot also recover this tick.
    pub fn advance<R: Rng + ?Sized>(
        &self,
        policy: &GpuPolicy,
        rng: &mut R,
    ) -> Result<GpuStep, UpdateError> {
        let mut next = self.clone();

        if self.failed {
            if rng.random_bool(policy.recover_probability) {
                next.failed = false;
            }
        } else if rng.random_bool(policy.fail_probability) {
            next.failed = true;
        }

        if next.failed {
            next.zero_readings();
            return Ok(GpuStep {
                state: next,
                ecc_error: false,
            });
        }

        apply_rules(GPU_RULES, &mut next, rng)?;
        let ecc_error = rng.random_bool(policy.ecc_probability);
        Ok(GpuStep {
            state: next,
            ecc_error,
        })
    }

    fn zero_readings(&mut self) {
        self.utilization = 0.0;
        self.memory_used_bytes = 0;
        self.temperature_celsius = 0.0;
        self.power_watts = 0.0;
        self.sm_clock_mhz = 0.0;
        self.pcie_rx_bytes = 0.0;
        self.pcie_tx_bytes = 0.0;
    }

    fn publish(&self, publisher: &Publisher<'_>) {
        let labels = [("gpu_id", self.gpu_id.as_str()), ("gpu_model", self.model.as_str())];
        publisher.gauge(GPU_UTILIZATION, &labels, self.utilization);
        publisher.gauge(GPU_MEMORY_USED, &labels, self.memory_used_bytes as f64);
        publisher.gauge(GPU_MEMORY_TOTAL, &labels, self.memory_total_bytes as f64);
        publisher.gauge(GPU_TEMPERATURE, &labels, self.temperature_celsius);
        publisher.gauge(GPU_POWER_DRAW, &labels, self.power_watts);
        publisher.gauge(GPU_SM_CLOCK, &labels, self.sm_clock_mhz);
        publisher.gauge(GPU_PCIE_RX, &labels, self.pcie_rx_bytes);
        publisher.gauge(GPU_PCIE_TX, &labels, self.pcie_tx_bytes);
    }
}

/// Fixed set of GPUs created at startup.
pub struct GpuFleet {
    pub gpus: Vec<GpuState>,
    pub policy: GpuPolicy,
}

impl GpuFleet {
    pub fn new<R: Rng + ?Sized>(config: &GpuSimConfig, rng: &mut R) -> Self {
        let gpus = (0..config.gpu_count)
            .map(|i| GpuState::new(i, &config.gpu_model, rng))
            .collect();
        Self {
            gpus,
            policy: GpuPolicy {
                fail_probability: config.failure_rate,
                recover_probability: config.recovery_rate,
                ..Default::default()
            },
        }
    }

    pub fn with_gpus(gpus: Vec<GpuState>, policy: GpuPolicy) -> Self {
        Self { gpus, policy }
    }

    pub fn failed_count(&self) -> usize {
        self.gpus.iter().filter(|g| g.failed).count()
    }
}

impl Simulation for GpuFleet {
    fn name(&self) -> &'static str {
        "gpu-fleet"
    }

    fn describe(&self, registry: &Registry) -> Result<(), SinkError> {
        let labels = &["gpu_id", "gpu_model"];
        registry.register_gauge(GPU_UTILIZATION, "GPU utilization percentage", labels)?;
        registry.register_gauge(GPU_MEMORY_USED, "GPU memory used in bytes", labels)?;
        registry.register_gauge(GPU_MEMORY_TOTAL, "GPU memory total in bytes", labels)?;
        registry.register_gauge(GPU_TEMPERATURE, "GPU temperature in Celsius", labels)?;
        registry.register_gauge(GPU_POWER_DRAW, "GPU power draw in watts", labels)?;
        registry.register_gauge(GPU_SM_CLOCK, "GPU SM clock speed in MHz", labels)?;
        registry.register_gauge(GPU_PCIE_RX, "PCIe RX throughput", labels)?;
        registry.register_gauge(GPU_PCIE_TX, "PCIe TX throughput", labels)?;
        registry.register_counter(
            GPU_ECC_ERRORS,
            "Total ECC errors",
            &["gpu_id", "gpu_model", "error_type"],
        )
    }

    fn tick(&mut self, rng: &mut StdRng, sink: &dyn MetricSink) {
        let publisher = Publisher::new(sink, "gpu-fleet");

        for gpu in &mut self.gpus {
            match gpu.advance(&self.policy, rng) {
                Ok(step) => {
                    if step.state.failed && !gpu.failed {
                        tracing::warn!(gpu_id = %gpu.gpu_id, "GPU failed");
                    } else if !step.state.failed && gpu.failed {
                        tracing::info!(gpu_id = %gpu.gpu_id, "GPU recovered");
                    }
                    *gpu = step.state;
                    if step.ecc_error {
                        publisher.counter(
                            GPU_ECC_ERRORS,
                            &[
                                ("gpu_id", gpu.gpu_id.as_str()),
                                ("gpu_model", gpu.model.as_str()),
                                ("error_type", "correctable"),
                            ],
                            1.0,
                        );
                    }
                }
                Err(e) => ErrorHandler::log_and_continue(e, &gpu.gpu_id),
            }
            gpu.publish(&publisher);
        }
    }
}
