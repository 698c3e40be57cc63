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

use clap::{Parser, Subcommand};

use crate::common::config::{
    parse_targets, AppConfig, AppSimConfig, GpuSimConfig, LoadGenConfig, MlSimConfig,
};
use crate::sim::constants::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Simulate a GPU fleet and expose its telemetry on /metrics.
    Gpu(GpuArgs),
    /// Simulate training jobs and inference traffic.
    Ml(MlArgs),
    /// Run the demo HTTP service with its own GPU gauges.
    App(AppArgs),
    /// Poll a list of URLs on a jittered interval.
    Load(LoadArgs),
}

#[derive(Parser, Clone, Debug)]
pub struct GpuArgs {
    /// The port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_GPU_PORT)]
    pub port: u16,
    /// Seconds between simulation ticks.
    #[arg(short, long, env = "UPDATE_INTERVAL", default_value_t = DEFAULT_UPDATE_INTERVAL_SECS)]
    pub interval: u64,
    /// Number of simulated GPUs.
    #[arg(long, env = "NUM_GPUS", default_value_t = NUM_GPUS)]
    pub gpu_count: usize,
    /// Model name reported in the gpu_model label.
    #[arg(long, env = "GPU_MODEL", default_value = DEFAULT_GPU_MODEL)]
    pub gpu_model: String,
    /// Per-tick probability that a healthy GPU fails.
    #[arg(long, env = "GPU_FAILURE_RATE", default_value_t = DEFAULT_GPU_FAILURE_RATE)]
    pub failure_rate: f64,
    /// Per-tick probability that a failed GPU recovers.
    #[arg(long, env = "GPU_RECOVERY_RATE", default_value_t = DEFAULT_GPU_RECOVERY_RATE)]
    pub recovery_rate: f64,
}

impl GpuArgs {
    pub fn to_config(&self) -> GpuSimConfig {
        GpuSimConfig {
            port: self.port,
            interval_secs: self.interval,
            gpu_count: self.gpu_count,
            gpu_model: self.gpu_model.clone(),
            failure_rate: self.failure_rate,
            recovery_rate: self.recovery_rate,
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct MlArgs {
    /// The port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_ML_PORT)]
    pub port: u16,
    /// Seconds between simulation ticks.
    #[arg(short, long, env = "UPDATE_INTERVAL", default_value_t = DEFAULT_UPDATE_INTERVAL_SECS)]
    pub interval: u64,
    /// Upper bound on concurrently running training jobs.
    #[arg(long, env = "MAX_CONCURRENT_JOBS", default_value_t = MAX_CONCURRENT_JOBS)]
    pub max_jobs: usize,
    /// Per-tick probability of admitting a new job when below the cap.
    #[arg(long, env = "JOB_ADMISSION_PROBABILITY", default_value_t = JOB_ADMISSION_PROBABILITY)]
    pub admission_probability: f64,
}

impl MlArgs {
    pub fn to_config(&self) -> MlSimConfig {
        MlSimConfig {
            port: self.port,
            interval_secs: self.interval,
            max_jobs: self.max_jobs,
            admission_probability: self.admission_probability,
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct AppArgs {
    /// The port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_APP_PORT)]
    pub port: u16,
    /// Seconds between GPU gauge updates.
    #[arg(short, long, env = "UPDATE_INTERVAL", default_value_t = DEFAULT_UPDATE_INTERVAL_SECS)]
    pub interval: u64,
}

impl AppArgs {
    pub fn to_config(&self) -> AppSimConfig {
        AppSimConfig {
            port: self.port,
            interval_secs: self.interval,
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct LoadArgs {
    /// Comma-separated list of URLs to poll.
    #[arg(long, env = "TARGET_URLS", default_value = AppConfig::DEFAULT_TARGET_URLS)]
    pub targets: String,
    /// Base seconds between polling rounds (jittered by one second).
    #[arg(short, long, env = "REQUEST_INTERVAL", default_value_t = AppConfig::DEFAULT_REQUEST_INTERVAL_SECS)]
    pub interval: u64,
    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = AppConfig::CONNECTION_TIMEOUT_SECS)]
    pub timeout: u64,
}

impl LoadArgs {
    pub fn to_config(&self) -> LoadGenConfig {
        LoadGenConfig {
            targets: parse_targets(&self.targets),
            interval_secs: self.interval,
            timeout_secs: self.timeout,
        }
    }
}
