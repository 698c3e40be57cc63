//! ML workload simulator: training jobs, inference traffic and queue depth

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
use super::inference::{simulate_bursts, InferencePolicy};
use super::training::TrainingJobState;
use super::Simulation;
use crate::common::config::MlSimConfig;
use crate::common::error_handling::ErrorHandler;
use crate::sink::{MetricSink, Publisher, Registry, SinkError, DEFAULT_BUCKETS};

pub const TRAINING_LOSS: &str = "training_loss";
pub const TRAINING_ACCURACY: &str = "training_accuracy";
pub const TRAINING_EPOCH: &str = "training_epoch";
pub const TRAINING_THROUGHPUT: &str = "training_throughput_samples_per_second";
pub const BATCH_PROCESSING_TIME: &str = "batch_processing_time_seconds";
pub const INFERENCE_REQUESTS: &str = "inference_requests_total";
pub const INFERENCE_LATENCY: &str = "inference_latency_seconds";
pub const JOB_QUEUE_DEPTH: &str = "ml_job_queue_depth";
pub const CHECKPOINT_SAVES: &str = "checkpoint_saves_total";
pub const GPU_MEMORY_ALLOCATED: &str = "ml_gpu_memory_allocated_gb";

#[derive(Clone, Debug, PartialEq)]
pub struct MlPolicy {
    pub max_jobs: usize,
    pub admission_probability: f64,
    pub inference: InferencePolicy,
}

impl Default for MlPolicy {
    fn default() -> Self {
        Self {
            max_jobs: MAX_CONCURRENT_JOBS,
            admission_probability: JOB_ADMISSION_PROBABILITY,
            inference: InferencePolicy::default(),
        }
    }
}

impl From<&MlSimConfig> for MlPolicy {
    fn from(config: &MlSimConfig) -> Self {
        Self {
            max_jobs: config.max_jobs,
            admission_probability: config.admission_probability,
            ..Default::default()
        }
    }
}

pub struct MlWorkload {
    pub jobs: Vec<TrainingJobState>,
    pub policy: MlPolicy,
    pub completed_jobs: u64,
    next_job_id: u64,
}

impl MlWorkload {
    pub fn new(policy: MlPolicy) -> Self {
        Self {
            jobs: Vec::new(),
            policy,
            completed_jobs: 0,
            next_job_id: 0,
        }
    }

    /// Start with pre-seeded jobs, regardless of the admission cap.
    pub fn with_jobs(policy: MlPolicy, jobs: Vec<TrainingJobState>) -> Self {
        let next_job_id = jobs.len() as u64;
        Self {
            jobs,
            policy,
            completed_jobs: 0,
            next_job_id,
        }
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    fn update_jobs(&mut self, rng: &mut StdRng, publisher: &Publisher<'_>) {
        let mut finished = Vec::new();

        for (i, job) in self.jobs.iter_mut().enumerate() {
            let (next, events) = match job.advance(rng) {
                Ok(step) => step,
                Err(e) => {
                    ErrorHandler::log_and_continue(e, &job.job_id);
                    continue;
                }
            };
            *job = next;

            let job_labels = [
                ("model_name", job.model_name.as_str()),
                ("job_id", job.job_id.as_str()),
            ];
            let model_labels = [("model_name", job.model_name.as_str())];
            publisher.gauge(TRAINING_LOSS, &job_labels, job.current_loss);
            publisher.gauge(TRAINING_ACCURACY, &job_labels, job.current_accuracy);
            publisher.gauge(TRAINING_EPOCH, &job_labels, job.epoch as f64);
            publisher.gauge(TRAINING_THROUGHPUT, &model_labels, job.throughput);
            publisher.observe(BATCH_PROCESSING_TIME, &model_labels, job.batch_seconds);
            publisher.gauge(
                GPU_MEMORY_ALLOCATED,
                &[("job_id", job.job_id.as_str())],
                job.gpu_memory_allocated_gb,
            );

            if events.checkpoint {
                tracing::debug!(job_id = %job.job_id, epoch = job.epoch, "checkpoint saved");
                publisher.counter(CHECKPOINT_SAVES, &model_labels, 1.0);
            }
            if events.completed {
                finished.push(i);
            }
        }

        for i in finished.into_iter().rev() {
            let job = self.jobs.remove(i);
            self.completed_jobs += 1;
            retire_job_series(&job, publisher);
            tracing::info!(
                job_id = %job.job_id,
                model = %job.model_name,
                epochs = job.epoch,
                final_loss = job.current_loss,
                "training job completed"
            );
        }
    }

    fn admit_job(&mut self, rng: &mut StdRng) {
        if self.jobs.len() >= self.policy.max_jobs
            || !rng.random_bool(self.policy.admission_probability)
        {
            return;
        }
        let model = TRAINING_MODELS[rng.random_range(0..TRAINING_MODELS.len())];
        let job_id = format!("job_{}", self.next_job_id);
        self.next_job_id += 1;

        let job = TrainingJobState::new(job_id, model.to_string(), rng);
        tracing::info!(
            job_id = %job.job_id,
            model = %job.model_name,
            max_epochs = job.max_epochs,
            "training job admitted"
        );
        self.jobs.push(job);
    }

    fn publish_inference(&self, rng: &mut StdRng, publisher: &Publisher<'_>) {
        for burst in simulate_bursts(INFERENCE_MODELS, &self.policy.inference, rng) {
            let model = burst.model_name.as_str();
            if burst.successes > 0 {
                publisher.counter(
                    INFERENCE_REQUESTS,
                    &[("model_name", model), ("status", "success")],
                    burst.successes as f64,
                );
            }
            if burst.errors > 0 {
                publisher.counter(
                    INFERENCE_REQUESTS,
                    &[("model_name", model), ("status", "error")],
                    burst.errors as f64,
                );
            }
            for latency in &burst.latencies {
                publisher.observe(INFERENCE_LATENCY, &[("model_name", model)], *latency);
            }
        }
    }
}

/// Drop the per-job series so finished jobs leave the exposition.
fn retire_job_series(job: &TrainingJobState, publisher: &Publisher<'_>) {
    let job_labels = [
        ("model_name", job.model_name.as_str()),
        ("job_id", job.job_id.as_str()),
    ];
    for name in [TRAINING_LOSS, TRAINING_ACCURACY, TRAINING_EPOCH] {
        publisher.remove(name, &job_labels);
    }
    publisher.remove(GPU_MEMORY_ALLOCATED, &[("job_id", job.job_id.as_str())]);
}

impl Simulation for MlWorkload {
    fn name(&self) -> &'static str {
        "ml-workload"
    }

    fn describe(&self, registry: &Registry) -> Result<(), SinkError> {
        let job_labels = &["model_name", "job_id"];
        registry.register_gauge(TRAINING_LOSS, "Current training loss", job_labels)?;
        registry.register_gauge(TRAINING_ACCURACY, "Current training accuracy", job_labels)?;
        registry.register_gauge(TRAINING_EPOCH, "Current epoch number", job_labels)?;
        registry.register_gauge(TRAINING_THROUGHPUT, "Training throughput", &["model_name"])?;
        registry.register_histogram(
            BATCH_PROCESSING_TIME,
            "Time to process a batch",
            &["model_name"],
            DEFAULT_BUCKETS,
        )?;
        registry.register_counter(
            INFERENCE_REQUESTS,
            "Total inference requests",
            &["model_name", "status"],
        )?;
        registry.register_histogram(
            INFERENCE_LATENCY,
            "Inference latency",
            &["model_name"],
            DEFAULT_BUCKETS,
        )?;
        registry.register_gauge(JOB_QUEUE_DEPTH, "Number of jobs in queue", &["queue_type"])?;
        registry.register_counter(CHECKPOINT_SAVES, "Total checkpoint saves", &["model_name"])?;
        registry.register_gauge(
            GPU_MEMORY_ALLOCATED,
            "GPU memory allocated for ML",
            &["job_id"],
        )
    }

    fn tick(&mut self, rng: &mut StdRng, sink: &dyn MetricSink) {
        let publisher = Publisher::new(sink, "ml-workload");

        self.update_jobs(rng, &publisher);
        self.admit_job(rng);

        publisher.gauge(
            JOB_QUEUE_DEPTH,
            &[("queue_type", "training")],
            self.jobs.len() as f64,
        );
        let backlog = rng.random_range(0..=MAX_INFERENCE_QUEUE_DEPTH);
        publisher.gauge(JOB_QUEUE_DEPTH, &[("queue_type", "inference")], backlog as f64);

        self.publish_inference(rng, &publisher);
    }
}
