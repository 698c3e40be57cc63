//! Simulated training jobs

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

use super::constants::*;
use super::rules::{apply_rules, draw, FieldRule, Noise};
use super::UpdateError;

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingJobState {
    pub job_id: String,
    pub model_name: String,
    pub epoch: u32,
    pub max_epochs: u32,
    pub initial_loss: f64,
    pub convergence_rate: f64,
    pub current_loss: f64,
    pub current_accuracy: f64,
    pub throughput: f64,
    pub batch_seconds: f64,
    pub gpu_memory_allocated_gb: f64,
}

/// Events raised by one training-job update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainingTick {
    pub checkpoint: bool,
    pub completed: bool,
}

pub const TRAINING_RULES: &[FieldRule<TrainingJobState>] = &[
    FieldRule {
        field: "current_loss",
        formula: |s| s.initial_loss * (-s.convergence_rate * s.epoch as f64).exp(),
        noise: Noise::Uniform(-LOSS_NOISE, LOSS_NOISE),
        floor: MIN_TRAINING_LOSS,
        ceiling: f64::INFINITY,
        store: |s, v| s.current_loss = v,
    },
    FieldRule {
        field: "current_accuracy",
        formula: |s| (1.0 - s.current_loss / s.initial_loss) * 100.0,
        noise: Noise::None,
        floor: 0.0,
        ceiling: MAX_TRAINING_ACCURACY,
        store: |s, v| s.current_accuracy = v,
    },
    // Independent draws, not derived from loss.
    FieldRule {
        field: "throughput",
        formula: |_| 0.0,
        noise: Noise::Uniform(1000.0, 5000.0),
        floor: 0.0,
        ceiling: f64::INFINITY,
        store: |s, v| s.throughput = v,
    },
    FieldRule {
        field: "batch_seconds",
        formula: |_| 0.0,
        noise: Noise::Uniform(0.5, 2.0),
        floor: 0.0,
        ceiling: f64::INFINITY,
        store: |s, v| s.batch_seconds = v,
    },
    FieldRule {
        field: "gpu_memory_allocated_gb",
        formula: |_| 0.0,
        noise: Noise::Uniform(10.0, 35.0),
        floor: 0.0,
        ceiling: f64::INFINITY,
        store: |s, v| s.gpu_memory_allocated_gb = v,
    },
];

impl TrainingJobState {
    /// Create a job with random loss curve and length.
    pub fn new<R: Rng + ?Sized>(job_id: String, model_name: String, rng: &mut R) -> Self {
        let initial_loss = draw(rng, 2.0, 4.0);
        let convergence_rate = draw(rng, 0.01, 0.05);
        let max_epochs = rng.random_range(50..=200);
        Self::with_curve(job_id, model_name, initial_loss, convergence_rate, max_epochs)
    }

    pub fn with_curve(
        job_id: String,
        model_name: String,
        initial_loss: f64,
        convergence_rate: f64,
        max_epochs: u32,
    ) -> Self {
        Self {
            job_id,
            model_name,
            epoch: 0,
            max_epochs,
            initial_loss,
            convergence_rate,
            current_loss: initial_loss,
            current_accuracy: 0.0,
            throughput: 0.0,
            batch_seconds: 0.0,
            gpu_memory_allocated_gb: 0.0,
        }
    }

    /// Advance one epoch. The caller keeps `self` unchanged on error.
    pub fn advance<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<(TrainingJobState, TrainingTick), UpdateError> {
        let mut next = self.clone();
        next.epoch += 1;
        apply_rules(TRAINING_RULES, &mut next, rng)?;

        let events = TrainingTick {
            checkpoint: next.epoch % CHECKPOINT_EVERY_EPOCHS == 0,
            completed: next.epoch >= next.max_epochs,
        };
        Ok((next, events))
    }

    /// Noise-free loss at the current epoch.
    pub fn expected_loss(&self) -> f64 {
        self.initial_loss * (-self.convergence_rate * self.epoch as f64).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn job(max_epochs: u32) -> TrainingJobState {
        TrainingJobState::with_curve("job_0".into(), "cnn".into(), 3.0, 0.05, max_epochs)
    }

    #[test]
    fn test_random_job_parameters() {
        let mut rng = StdRng::seed_from_u64(8);
        for i in 0..100 {
            let job = TrainingJobState::new(format!("job_{i}"), "gan".into(), &mut rng);
            assert!((2.0..4.0).contains(&job.initial_loss));
            assert!((0.01..0.05).contains(&job.convergence_rate));
            assert!((50..=200).contains(&job.max_epochs));
            assert_eq!(job.epoch, 0);
        }
    }

    #[test]
    fn test_epoch_loss_and_accuracy_invariants() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut state = TrainingJobState::with_curve("job_1".into(), "rnn".into(), 2.0, 0.05, 500);
        for expected_epoch in 1..=500 {
            let (next, events) = state.advance(&mut rng).unwrap();
            assert_eq!(next.epoch, expected_epoch);
            assert!(next.current_loss >= MIN_TRAINING_LOSS);
            let deviation = (next.current_loss - next.expected_loss()).abs();
            assert!(deviation <= LOSS_NOISE + 1e-9 || next.current_loss == MIN_TRAINING_LOSS);
            assert!((0.0..=MAX_TRAINING_ACCURACY).contains(&next.current_accuracy));
            assert!((1000.0..5000.0).contains(&next.throughput));
            assert!((0.5..2.0).contains(&next.batch_seconds));
            assert!((10.0..35.0).contains(&next.gpu_memory_allocated_gb));
            assert_eq!(events.checkpoint, expected_epoch % 10 == 0);
            assert_eq!(events.completed, expected_epoch >= 500);
            state = next;
        }
    }

    #[test]
    fn test_completion_signalled_at_max_epochs() {
        let mut rng = StdRng::seed_from_u64(2);
        let (first, events) = job(2).advance(&mut rng).unwrap();
        assert_eq!(first.epoch, 1);
        assert!(!events.completed);

        let (second, events) = first.advance(&mut rng).unwrap();
        assert_eq!(second.epoch, 2);
        assert!(events.completed);
    }

    #[test]
    fn test_accuracy_derives_from_loss() {
        let mut rng = StdRng::seed_from_u64(13);
        let (next, _) = job(100).advance(&mut rng).unwrap();
        let expected = ((1.0 - next.current_loss / 3.0) * 100.0).clamp(0.0, 99.0);
        assert!((next.current_accuracy - expected).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_curve_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let broken =
            TrainingJobState::with_curve("job_9".into(), "cnn".into(), 3.0, f64::NAN, 10);
        let err = broken.advance(&mut rng).unwrap_err();
        assert!(matches!(err, UpdateError::NonFinite { field: "current_loss", .. }));
    }
}
