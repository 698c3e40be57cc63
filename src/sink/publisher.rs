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

use super::{Labels, MetricSink};
use crate::common::error_handling::ErrorHandler;

/// Sink wrapper that logs failed writes instead of returning them.
///
/// A tick publishes dozens of independent keys; one rejected write must
/// not stop the rest.
pub struct Publisher<'a> {
    sink: &'a dyn MetricSink,
    domain: &'static str,
}

impl<'a> Publisher<'a> {
    pub fn new(sink: &'a dyn MetricSink, domain: &'static str) -> Self {
        Self { sink, domain }
    }

    pub fn gauge(&self, name: &str, labels: Labels<'_>, value: f64) {
        if let Err(e) = self.sink.set_gauge(name, labels, value) {
            ErrorHandler::log_and_continue(e, self.domain);
        }
    }

    pub fn counter(&self, name: &str, labels: Labels<'_>, delta: f64) {
        if let Err(e) = self.sink.increment_counter(name, labels, delta) {
            ErrorHandler::log_and_continue(e, self.domain);
        }
    }

    pub fn observe(&self, name: &str, labels: Labels<'_>, value: f64) {
        if let Err(e) = self.sink.observe_histogram(name, labels, value) {
            ErrorHandler::log_and_continue(e, self.domain);
        }
    }

    pub fn remove(&self, name: &str, labels: Labels<'_>) {
        if let Err(e) = self.sink.remove_series(name, labels) {
            ErrorHandler::log_and_continue(e, self.domain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Registry;

    #[test]
    fn test_failed_write_does_not_block_later_writes() {
        let registry = Registry::new();
        registry.register_gauge("known", "Known gauge", &[]).unwrap();

        let publisher = Publisher::new(&registry, "test");
        publisher.gauge("unknown", &[], 1.0);
        publisher.counter("known", &[], 1.0);
        publisher.gauge("known", &[], 2.0);

        assert_eq!(registry.value("known", &[]), Some(2.0));
        assert_eq!(registry.value("unknown", &[]), None);
    }
}
