//! Synthetic inference traffic

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

use rand::Rng;

use super::constants::{INFERENCE_BURST_PROBABILITY, INFERENCE_SUCCESS_RATE};
use super::rules::draw;

#[derive(Clone, Debug, PartialEq)]
pub struct InferencePolicy {
    pub burst_probability: f64,
    pub success_rate: f64,
    pub min_requests: u32,
    pub max_requests: u32,
    pub min_latency_secs: f64,
    pub max_latency_secs: f64,
}

impl Default for InferencePolicy {
    fn default() -> Self {
        Self {
            burst_probability: INFERENCE_BURST_PROBABILITY,
            success_rate: INFERENCE_SUCCESS_RATE,
            min_requests: 10,
            max_requests: 100,
            min_latency_secs: 0.01,
            max_latency_secs: 0.5,
        }
    }
}

/// Requests served by one model during one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InferenceBurst {
    pub model_name: String,
    pub successes: u32,
    pub errors: u32,
    /// One latency sample per successful request.
    pub latencies: Vec<f64>,
}

impl InferenceBurst {
    pub fn total(&self) -> u32 {
        self.successes + self.errors
    }
}

/// Draw this tick's traffic. Models that receive no requests are omitted.
pub fn simulate_bursts<R: Rng + ?Sized>(
    models: &[&str],
    policy: &InferencePolicy,
    rng: &mut R,
) -> Vec<InferenceBurst> {
    let mut bursts = Vec::new();

    for model in models {
        if !rng.random_bool(policy.burst_probability) {
            continue;
        }
        let requests = rng.random_range(policy.min_requests..=policy.max_requests.max(policy.min_requests));
        let mut burst = InferenceBurst {
            model_name: model.to_string(),
            ..Default::default()
        };
        for _ in 0..requests {
            if rng.random_bool(policy.success_rate) {
                burst.successes += 1;
                burst
                    .latencies
                    .push(draw(rng, policy.min_latency_secs, policy.max_latency_secs));
            } else {
                burst.errors += 1;
            }
        }
        bursts.push(burst);
    }

    bursts
}
