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

//! In-process metric registry.
//!
//! Families must be registered (name, help text, label names) before they
//! are written. The write lock is taken once per key update; a scrape takes
//! the read lock for the duration of one render.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::exposition::MetricBuilder;
use super::{Labels, MetricKind, MetricSample, MetricSink, SampleValue, SinkError};

/// Default histogram buckets, matching the Prometheus client libraries.
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

#[derive(Debug)]
struct Family {
    help: String,
    kind: MetricKind,
    label_names: Vec<String>,
    buckets: Vec<f64>,
    // Keyed by label values in `label_names` order.
    series: BTreeMap<Vec<String>, Series>,
}

#[derive(Debug)]
struct Series {
    value: SeriesValue,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
enum SeriesValue {
    Scalar(f64),
    Histogram {
        // Per-bucket (non-cumulative) counts; the last slot is +Inf.
        counts: Vec<u64>,
        sum: f64,
        count: u64,
    },
}

/// Thread-safe metric store implementing [`MetricSink`].
#[derive(Debug, Default)]
pub struct Registry {
    families: RwLock<BTreeMap<String, Family>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gauge family.
    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<(), SinkError> {
        self.register(name, help, MetricKind::Gauge, label_names, Vec::new())
    }

    /// Register a counter family. The name should end in `_total`.
    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<(), SinkError> {
        self.register(name, help, MetricKind::Counter, label_names, Vec::new())
    }

    /// Register a histogram family with the given upper bounds.
    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<(), SinkError> {
        let mut bounds: Vec<f64> = buckets.iter().copied().filter(|b| b.is_finite()).collect();
        bounds.sort_by(f64::total_cmp);
        bounds.dedup();
        self.register(name, help, MetricKind::Histogram, label_names, bounds)
    }

    fn register(
        &self,
        name: &str,
        help: &str,
        kind: MetricKind,
        label_names: &[&str],
        buckets: Vec<f64>,
    ) -> Result<(), SinkError> {
        if !is_valid_metric_name(name) {
            return Err(SinkError::InvalidName(name.to_string()));
        }
        if let Some(bad) = label_names
            .iter()
            .find(|l| !is_valid_label_name(l) || (kind == MetricKind::Histogram && **l == "le"))
        {
            return Err(SinkError::InvalidName((*bad).to_string()));
        }

        let mut families = self.families.write().map_err(|_| SinkError::Poisoned)?;
        if families.contains_key(name) {
            return Err(SinkError::DuplicateMetric(name.to_string()));
        }
        families.insert(
            name.to_string(),
            Family {
                help: help.to_string(),
                kind,
                label_names: label_names.iter().map(|l| l.to_string()).collect(),
                buckets,
                series: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Add a signed delta to a gauge series (e.g. in-flight request count).
    pub fn add_gauge(&self, name: &str, labels: Labels<'_>, delta: f64) -> Result<(), SinkError> {
        check_finite(name, delta)?;
        self.update(name, labels, MetricKind::Gauge, |value| {
            if let SeriesValue::Scalar(v) = value {
                *v += delta;
            }
        })
    }

    /// Current value of a gauge or counter series.
    pub fn value(&self, name: &str, labels: Labels<'_>) -> Option<f64> {
        let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
        let family = families.get(name)?;
        let key = resolve_labels(name, family, labels).ok()?;
        match family.series.get(&key)?.value {
            SeriesValue::Scalar(v) => Some(v),
            SeriesValue::Histogram { .. } => None,
        }
    }

    /// Observation count of a histogram series.
    pub fn histogram_count(&self, name: &str, labels: Labels<'_>) -> Option<u64> {
        let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
        let family = families.get(name)?;
        let key = resolve_labels(name, family, labels).ok()?;
        match family.series.get(&key)?.value {
            SeriesValue::Histogram { count, .. } => Some(count),
            SeriesValue::Scalar(_) => None,
        }
    }

    /// All series currently held, one sample per (name, label-set).
    pub fn snapshot(&self) -> Vec<MetricSample> {
        let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
        let mut samples = Vec::new();
        for (name, family) in families.iter() {
            for (values, series) in &family.series {
                let value = match (&series.value, family.kind) {
                    (SeriesValue::Scalar(v), MetricKind::Counter) => SampleValue::Counter(*v),
                    (SeriesValue::Scalar(v), _) => SampleValue::Gauge(*v),
                    (SeriesValue::Histogram { sum, count, .. }, _) => SampleValue::Histogram {
                        count: *count,
                        sum: *sum,
                    },
                };
                samples.push(MetricSample {
                    name: name.clone(),
                    labels: family
                        .label_names
                        .iter()
                        .cloned()
                        .zip(values.iter().cloned())
                        .collect(),
                    value,
                    timestamp: series.updated_at,
                });
            }
        }
        samples
    }

    /// Render every registered family in the Prometheus text format.
    pub fn render(&self) -> String {
        let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
        let mut builder = MetricBuilder::new();

        for (name, family) in families.iter() {
            builder.help(name, &family.help).type_(name, family.kind.as_str());

            for (values, series) in &family.series {
                let labels: Vec<(&str, &str)> = family
                    .label_names
                    .iter()
                    .map(String::as_str)
                    .zip(values.iter().map(String::as_str))
                    .collect();

                match &series.value {
                    SeriesValue::Scalar(v) => {
                        builder.metric(name, &labels, *v);
                    }
                    SeriesValue::Histogram { counts, sum, count } => {
                        let bucket_name = format!("{name}_bucket");
                        let mut cumulative = 0u64;
                        for (i, bucket_count) in counts.iter().enumerate() {
                            cumulative += bucket_count;
                            let le = family
                                .buckets
                                .get(i)
                                .map(|b| b.to_string())
                                .unwrap_or_else(|| "+Inf".to_string());
                            let mut bucket_labels = labels.clone();
                            bucket_labels.push(("le", le.as_str()));
                            builder.metric(&bucket_name, &bucket_labels, cumulative as f64);
                        }
                        builder.metric(&format!("{name}_sum"), &labels, *sum);
                        builder.metric(&format!("{name}_count"), &labels, *count as f64);
                    }
                }
            }
        }

        builder.build()
    }

    fn update<F>(
        &self,
        name: &str,
        labels: Labels<'_>,
        expected: MetricKind,
        apply: F,
    ) -> Result<(), SinkError>
    where
        F: FnOnce(&mut SeriesValue),
    {
        let mut families = self.families.write().map_err(|_| SinkError::Poisoned)?;
        let family = families
            .get_mut(name)
            .ok_or_else(|| SinkError::UnknownMetric(name.to_string()))?;
        if family.kind != expected {
            return Err(SinkError::KindMismatch {
                name: name.to_string(),
                expected: expected.as_str(),
                actual: family.kind.as_str(),
            });
        }
        let key = resolve_labels(name, family, labels)?;
        let bucket_slots = family.buckets.len() + 1;

        let series = family.series.entry(key).or_insert_with(|| Series {
            value: match expected {
                MetricKind::Histogram => SeriesValue::Histogram {
                    counts: vec![0; bucket_slots],
                    sum: 0.0,
                    count: 0,
                },
                _ => SeriesValue::Scalar(0.0),
            },
            updated_at: Utc::now(),
        });
        apply(&mut series.value);
        series.updated_at = Utc::now();
        Ok(())
    }
}

impl MetricSink for Registry {
    fn set_gauge(&self, name: &str, labels: Labels<'_>, value: f64) -> Result<(), SinkError> {
        check_finite(name, value)?;
        self.update(name, labels, MetricKind::Gauge, |series| {
            *series = SeriesValue::Scalar(value);
        })
    }

    fn increment_counter(
        &self,
        name: &str,
        labels: Labels<'_>,
        delta: f64,
    ) -> Result<(), SinkError> {
        check_finite(name, delta)?;
        if delta < 0.0 {
            return Err(SinkError::NegativeIncrement {
                name: name.to_string(),
                delta,
            });
        }
        self.update(name, labels, MetricKind::Counter, |series| {
            if let SeriesValue::Scalar(v) = series {
                *v += delta;
            }
        })
    }

    fn observe_histogram(
        &self,
        name: &str,
        labels: Labels<'_>,
        value: f64,
    ) -> Result<(), SinkError> {
        check_finite(name, value)?;
        let bounds = {
            let families = self.families.read().map_err(|_| SinkError::Poisoned)?;
            families
                .get(name)
                .map(|f| f.buckets.clone())
                .unwrap_or_default()
        };
        let slot = bounds
            .iter()
            .position(|upper| value <= *upper)
            .unwrap_or(bounds.len());

        self.update(name, labels, MetricKind::Histogram, |series| {
            if let SeriesValue::Histogram { counts, sum, count } = series {
                if let Some(c) = counts.get_mut(slot) {
                    *c += 1;
                }
                *sum += value;
                *count += 1;
            }
        })
    }

    fn remove_series(&self, name: &str, labels: Labels<'_>) -> Result<bool, SinkError> {
        let mut families = self.families.write().map_err(|_| SinkError::Poisoned)?;
        let family = families
            .get_mut(name)
            .ok_or_else(|| SinkError::UnknownMetric(name.to_string()))?;
        let key = resolve_labels(name, family, labels)?;
        Ok(family.series.remove(&key).is_some())
    }
}

fn check_finite(name: &str, value: f64) -> Result<(), SinkError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SinkError::NonFiniteValue {
            name: name.to_string(),
            value,
        })
    }
}

/// Order label values by the family's registered label names.
fn resolve_labels(name: &str, family: &Family, labels: Labels<'_>) -> Result<Vec<String>, SinkError> {
    let mismatch = || SinkError::LabelMismatch {
        name: name.to_string(),
        expected: family.label_names.join(", "),
    };
    if labels.len() != family.label_names.len() {
        return Err(mismatch());
    }
    family
        .label_names
        .iter()
        .map(|wanted| {
            labels
                .iter()
                .find(|(k, _)| k == wanted)
                .map(|(_, v)| v.to_string())
                .ok_or_else(mismatch)
        })
        .collect()
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu_registry() -> Registry {
        let registry = Registry::new();
        registry
            .register_gauge(
                "gpu_utilization_percent",
                "GPU utilization percentage",
                &["gpu_id", "gpu_model"],
            )
            .unwrap();
        registry
            .register_counter(
                "gpu_ecc_errors_total",
                "Total ECC errors",
                &["gpu_id", "gpu_model", "error_type"],
            )
            .unwrap();
        registry
            .register_histogram(
                "inference_latency_seconds",
                "Inference latency",
                &["model_name"],
                DEFAULT_BUCKETS,
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_gauge_overwrites_latest_value() {
        let registry = gpu_registry();
        let labels = [("gpu_id", "gpu0"), ("gpu_model", "A100")];
        registry.set_gauge("gpu_utilization_percent", &labels, 10.0).unwrap();
        registry.set_gauge("gpu_utilization_percent", &labels, 55.0).unwrap();
        assert_eq!(registry.value("gpu_utilization_percent", &labels), Some(55.0));
    }

    #[test]
    fn test_label_order_does_not_matter() {
        let registry = gpu_registry();
        registry
            .set_gauge(
                "gpu_utilization_percent",
                &[("gpu_model", "A100"), ("gpu_id", "gpu1")],
                33.0,
            )
            .unwrap();
        assert_eq!(
            registry.value(
                "gpu_utilization_percent",
                &[("gpu_id", "gpu1"), ("gpu_model", "A100")]
            ),
            Some(33.0)
        );
    }

    #[test]
    fn test_counter_accumulates() {
        let registry = gpu_registry();
        let labels = [
            ("gpu_id", "gpu0"),
            ("gpu_model", "A100"),
            ("error_type", "correctable"),
        ];
        registry.increment_counter("gpu_ecc_errors_total", &labels, 1.0).unwrap();
        registry.increment_counter("gpu_ecc_errors_total", &labels, 2.0).unwrap();
        assert_eq!(registry.value("gpu_ecc_errors_total", &labels), Some(3.0));
    }

    #[test]
    fn test_counter_rejects_negative_delta() {
        let registry = gpu_registry();
        let labels = [
            ("gpu_id", "gpu0"),
            ("gpu_model", "A100"),
            ("error_type", "correctable"),
        ];
        let err = registry
            .increment_counter("gpu_ecc_errors_total", &labels, -1.0)
            .unwrap_err();
        assert!(matches!(err, SinkError::NegativeIncrement { .. }));
    }

    #[test]
    fn test_write_errors() {
        let registry = gpu_registry();
        assert_eq!(
            registry.set_gauge("missing", &[], 1.0),
            Err(SinkError::UnknownMetric("missing".to_string()))
        );
        assert!(matches!(
            registry.set_gauge("gpu_utilization_percent", &[("gpu_id", "gpu0")], 1.0),
            Err(SinkError::LabelMismatch { .. })
        ));
        assert!(matches!(
            registry.set_gauge(
                "gpu_ecc_errors_total",
                &[("gpu_id", "0"), ("gpu_model", "m"), ("error_type", "x")],
                1.0
            ),
            Err(SinkError::KindMismatch { .. })
        ));
        assert!(matches!(
            registry.set_gauge(
                "gpu_utilization_percent",
                &[("gpu_id", "gpu0"), ("gpu_model", "A100")],
                f64::NAN
            ),
            Err(SinkError::NonFiniteValue { .. })
        ));
    }

    #[test]
    fn test_registration_errors() {
        let registry = gpu_registry();
        assert_eq!(
            registry.register_gauge("gpu_utilization_percent", "dup", &[]),
            Err(SinkError::DuplicateMetric("gpu_utilization_percent".to_string()))
        );
        assert!(matches!(
            registry.register_gauge("9bad", "bad", &[]),
            Err(SinkError::InvalidName(_))
        ));
        assert!(matches!(
            registry.register_histogram("latency", "bad", &["le"], DEFAULT_BUCKETS),
            Err(SinkError::InvalidName(_))
        ));
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let registry = gpu_registry();
        let labels = [("model_name", "bert-base")];
        registry.observe_histogram("inference_latency_seconds", &labels, 0.02).unwrap();
        registry.observe_histogram("inference_latency_seconds", &labels, 0.3).unwrap();
        registry.observe_histogram("inference_latency_seconds", &labels, 42.0).unwrap();

        assert_eq!(
            registry.histogram_count("inference_latency_seconds", &labels),
            Some(3)
        );

        let output = registry.render();
        assert!(output.contains("# TYPE inference_latency_seconds histogram"));
        assert!(output.contains(
            "inference_latency_seconds_bucket{model_name=\"bert-base\",le=\"0.01\"} 0\n"
        ));
        assert!(output.contains(
            "inference_latency_seconds_bucket{model_name=\"bert-base\",le=\"0.025\"} 1\n"
        ));
        assert!(output.contains(
            "inference_latency_seconds_bucket{model_name=\"bert-base\",le=\"0.5\"} 2\n"
        ));
        assert!(output.contains(
            "inference_latency_seconds_bucket{model_name=\"bert-base\",le=\"+Inf\"} 3\n"
        ));
        assert!(output.contains("inference_latency_seconds_count{model_name=\"bert-base\"} 3\n"));
    }

    #[test]
    fn test_render_declares_every_family() {
        let registry = gpu_registry();
        let output = registry.render();
        assert!(output.contains("# HELP gpu_utilization_percent GPU utilization percentage"));
        assert!(output.contains("# TYPE gpu_utilization_percent gauge"));
        assert!(output.contains("# TYPE gpu_ecc_errors_total counter"));
    }

    #[test]
    fn test_snapshot_reports_one_sample_per_series() {
        let registry = gpu_registry();
        for gpu in ["gpu0", "gpu1"] {
            registry
                .set_gauge(
                    "gpu_utilization_percent",
                    &[("gpu_id", gpu), ("gpu_model", "A100")],
                    50.0,
                )
                .unwrap();
        }
        registry
            .set_gauge(
                "gpu_utilization_percent",
                &[("gpu_id", "gpu0"), ("gpu_model", "A100")],
                60.0,
            )
            .unwrap();

        let samples = registry.snapshot();
        assert_eq!(samples.len(), 2);
        let gpu0 = samples
            .iter()
            .find(|s| s.label("gpu_id") == Some("gpu0"))
            .unwrap();
        assert_eq!(gpu0.value, SampleValue::Gauge(60.0));
    }

    #[test]
    fn test_add_gauge() {
        let registry = Registry::new();
        registry
            .register_gauge("app_active_connections", "Number of active connections", &[])
            .unwrap();
        registry.add_gauge("app_active_connections", &[], 1.0).unwrap();
        registry.add_gauge("app_active_connections", &[], 1.0).unwrap();
        registry.add_gauge("app_active_connections", &[], -1.0).unwrap();
        assert_eq!(registry.value("app_active_connections", &[]), Some(1.0));
    }

    #[test]
    fn test_remove_series_drops_only_that_key() {
        let registry = gpu_registry();
        let gpu0 = [("gpu_id", "gpu0"), ("gpu_model", "A100")];
        let gpu1 = [("gpu_id", "gpu1"), ("gpu_model", "A100")];
        registry.set_gauge("gpu_utilization_percent", &gpu0, 10.0).unwrap();
        registry.set_gauge("gpu_utilization_percent", &gpu1, 20.0).unwrap();

        assert!(registry.remove_series("gpu_utilization_percent", &gpu0).unwrap());
        assert!(!registry.remove_series("gpu_utilization_percent", &gpu0).unwrap());
        assert_eq!(registry.value("gpu_utilization_percent", &gpu0), None);
        assert_eq!(registry.value("gpu_utilization_percent", &gpu1), Some(20.0));

        let body = registry.render();
        assert!(!body.contains("gpu_id=\"gpu0\""));
        assert!(body.contains("# TYPE gpu_utilization_percent gauge"));
        assert!(matches!(
            registry.remove_series("missing", &[]),
            Err(SinkError::UnknownMetric(_))
        ));
    }
}
