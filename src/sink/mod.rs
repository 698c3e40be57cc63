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

//! Labeled time-series store shared between simulators and scrape handlers.
//!
//! Simulators only see the [`MetricSink`] trait. The concrete
//! [`Registry`] also knows how to render itself in the Prometheus text
//! exposition format for `GET /metrics`.

pub mod exposition;
pub mod publisher;
pub mod registry;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use exposition::MetricBuilder;
pub use publisher::Publisher;
pub use registry::{Registry, DEFAULT_BUCKETS};

/// Label pairs as passed to the sink, e.g. `&[("gpu_id", "gpu0")]`.
pub type Labels<'a> = &'a [(&'a str, &'a str)];

/// The kind of a metric family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
    Histogram,
}

impl MetricKind {
    /// Name used on the `# TYPE` line.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Errors surfaced by a sink write.
#[derive(Debug, Error, PartialEq)]
pub enum SinkError {
    #[error("metric '{0}' is not registered")]
    UnknownMetric(String),

    #[error("metric '{0}' is already registered")]
    DuplicateMetric(String),

    #[error("invalid metric or label name '{0}'")]
    InvalidName(String),

    #[error("metric '{name}' is a {actual}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("metric '{name}' expects labels [{expected}]")]
    LabelMismatch { name: String, expected: String },

    #[error("counter '{name}' cannot be incremented by {delta}")]
    NegativeIncrement { name: String, delta: f64 },

    #[error("metric '{name}' received non-finite value {value}")]
    NonFiniteValue { name: String, value: f64 },

    #[error("metric registry lock poisoned")]
    Poisoned,
}

/// Write side of the metrics store.
///
/// Every call updates exactly one (name, label-set) key. Implementations
/// must be safe to call from a background task while handlers read.
pub trait MetricSink: Send + Sync {
    /// Overwrite the current value of a gauge series.
    fn set_gauge(&self, name: &str, labels: Labels<'_>, value: f64) -> Result<(), SinkError>;

    /// Add a non-negative delta to a counter series.
    fn increment_counter(&self, name: &str, labels: Labels<'_>, delta: f64)
        -> Result<(), SinkError>;

    /// Record one observation in a histogram series.
    fn observe_histogram(&self, name: &str, labels: Labels<'_>, value: f64)
        -> Result<(), SinkError>;

    /// Drop one series. Returns whether it existed.
    fn remove_series(&self, name: &str, labels: Labels<'_>) -> Result<bool, SinkError>;
}

/// Value part of a [`MetricSample`].
#[derive(Clone, Debug, PartialEq)]
pub enum SampleValue {
    Gauge(f64),
    Counter(f64),
    Histogram { count: u64, sum: f64 },
}

/// One series as read back from the registry.
#[derive(Clone, Debug)]
pub struct MetricSample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: SampleValue,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    /// Look up a label value by name.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
