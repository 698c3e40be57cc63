//! Constants used throughout the simulators

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

// General configuration constants
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

// GPU fleet
pub const DEFAULT_GPU_PORT: u16 = 9400;
pub const DEFAULT_GPU_MODEL: &str = "NVIDIA-A100-40GB";
pub const NUM_GPUS: usize = 8;
pub const GPU_MEMORY_TOTAL_BYTES: u64 = 40 * 1024 * 1024 * 1024;
pub const DEFAULT_GPU_FAILURE_RATE: f64 = 0.001;
pub const DEFAULT_GPU_RECOVERY_RATE: f64 = 0.1;
pub const ECC_ERROR_PROBABILITY: f64 = 0.01;
pub const BASE_SM_CLOCK_MHZ: f64 = 1410.0;
pub const THROTTLE_THRESHOLD_CELSIUS: f64 = 70.0;
pub const THROTTLE_MHZ_PER_DEGREE: f64 = 10.0;

// ML workload
pub const DEFAULT_ML_PORT: u16 = 9500;
pub const MAX_CONCURRENT_JOBS: usize = 4;
pub const JOB_ADMISSION_PROBABILITY: f64 = 0.1;
pub const TRAINING_MODELS: &[&str] = &["transformer", "cnn", "rnn", "gan"];
pub const INFERENCE_MODELS: &[&str] = &["bert-base", "gpt-3", "resnet50", "yolov5"];
pub const MIN_TRAINING_LOSS: f64 = 0.01;
pub const MAX_TRAINING_ACCURACY: f64 = 99.0;
pub const LOSS_NOISE: f64 = 0.1;
pub const CHECKPOINT_EVERY_EPOCHS: u32 = 10;
pub const INFERENCE_BURST_PROBABILITY: f64 = 0.7;
pub const INFERENCE_SUCCESS_RATE: f64 = 0.95;
pub const MAX_INFERENCE_QUEUE_DEPTH: u32 = 50;

// Demo service
pub const DEFAULT_APP_PORT: u16 = 8000;
pub const APP_GPU_COUNT: usize = 4;
