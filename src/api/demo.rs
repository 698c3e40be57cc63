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

//! Demo HTTP service with fabricated latency, failures and queue depth.
//!
//! Every number here is flavor for dashboards and alert rules; none of it
//! reflects real work.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Timelike;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sysinfo::System;

use crate::api::handlers::metrics_handler;
use crate::api::server::with_layers;
use crate::common::error_handling::ErrorHandler;
use crate::sim::demo::{
    demo_gpu_label, DEMO_GPU_MEMORY_USAGE, DEMO_GPU_TEMPERATURE, DEMO_GPU_UTILIZATION,
};
use crate::sim::rules::draw;
use crate::sink::{MetricSink, Publisher, Registry, SinkError, DEFAULT_BUCKETS};

pub const APP_REQUESTS_TOTAL: &str = "app_requests_total";
pub const APP_REQUEST_DURATION: &str = "app_request_duration_seconds";
pub const APP_ACTIVE_CONNECTIONS: &str = "app_active_connections";
pub const MODEL_INFERENCE_DURATION: &str = "model_inference_duration_seconds";
pub const JOB_QUEUE_SIZE: &str = "job_queue_size";

pub const DEMO_INFERENCE_MODELS: &[&str] = &["gpt-3", "stable-diffusion", "bert"];

const CRITICAL_TEMPERATURE_CELSIUS: f64 = 85.0;
const QUEUE_OVERLOAD_DEPTH: f64 = 75.0;
const DEGRADED_USAGE_PERCENT: f64 = 80.0;

/// Failure injection knobs for `/api/test`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DemoPolicy {
    /// Chance per request that `gpu_3` drops to zero.
    pub gpu_drop_probability: f64,
    pub error_rate: f64,
    /// Multiplier on every artificial delay; 0 disables sleeping.
    pub time_scale: f64,
}

impl Default for DemoPolicy {
    fn default() -> Self {
        Self {
            gpu_drop_probability: 0.05,
            error_rate: 0.2,
            time_scale: 1.0,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub active_connections: f64,
    pub alerts: Vec<String>,
}

#[derive(Clone)]
pub struct DemoState {
    registry: Arc<Registry>,
    system: Arc<Mutex<System>>,
    policy: DemoPolicy,
}

impl FromRef<DemoState> for Arc<Registry> {
    fn from_ref(state: &DemoState) -> Self {
        state.registry.clone()
    }
}

impl DemoState {
    /// Register the request and inference families on `registry`.
    ///
    /// The GPU gauges belong to [`crate::sim::DemoGpuLoad`] and must be
    /// registered separately.
    pub fn new(registry: Arc<Registry>, policy: DemoPolicy) -> Result<Self, SinkError> {
        registry.register_counter(
            APP_REQUESTS_TOTAL,
            "Total number of requests",
            &["method", "endpoint", "status"],
        )?;
        registry.register_histogram(
            APP_REQUEST_DURATION,
            "Request duration in seconds",
            &["method", "endpoint"],
            DEFAULT_BUCKETS,
        )?;
        registry.register_gauge(APP_ACTIVE_CONNECTIONS, "Number of active connections", &[])?;
        registry.register_histogram(
            MODEL_INFERENCE_DURATION,
            "Time taken for model inference",
            &["model_name"],
            DEFAULT_BUCKETS,
        )?;
        registry.register_gauge(JOB_QUEUE_SIZE, "Number of jobs in queue", &["queue_type"])?;
        registry.set_gauge(APP_ACTIVE_CONNECTIONS, &[], 0.0)?;

        Ok(Self {
            registry,
            system: Arc::new(Mutex::new(System::new())),
            policy,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    async fn pause(&self, secs: f64) {
        let scaled = secs * self.policy.time_scale;
        if scaled > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(scaled)).await;
        }
    }

    /// Host CPU and memory usage in percent.
    fn host_usage(&self) -> (f64, f64) {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpu_percent = system.global_cpu_usage() as f64;
        let total = system.total_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            system.used_memory() as f64 / total as f64 * 100.0
        };
        (cpu_percent, memory_percent)
    }
}

/// Tracks one in-flight request.
///
/// Counts the connection while alive; on drop it releases the connection
/// and records the request duration, whichever way the handler exits.
struct RequestTracker {
    registry: Arc<Registry>,
    method: &'static str,
    endpoint: &'static str,
    started: Instant,
}

impl RequestTracker {
    fn start(registry: &Arc<Registry>, method: &'static str, endpoint: &'static str) -> Self {
        if let Err(e) = registry.add_gauge(APP_ACTIVE_CONNECTIONS, &[], 1.0) {
            ErrorHandler::log_and_continue(e, endpoint);
        }
        Self {
            registry: registry.clone(),
            method,
            endpoint,
            started: Instant::now(),
        }
    }

    fn record(&self, status: StatusCode) {
        Publisher::new(self.registry.as_ref(), "demo-app").counter(
            APP_REQUESTS_TOTAL,
            &[
                ("method", self.method),
                ("endpoint", self.endpoint),
                ("status", status.as_str()),
            ],
            1.0,
        );
    }
}

impl Drop for RequestTracker {
    fn drop(&mut self) {
        if let Err(e) = self.registry.add_gauge(APP_ACTIVE_CONNECTIONS, &[], -1.0) {
            ErrorHandler::log_and_continue(e, self.endpoint);
        }
        Publisher::new(self.registry.as_ref(), "demo-app").observe(
            APP_REQUEST_DURATION,
            &[("method", self.method), ("endpoint", self.endpoint)],
            self.started.elapsed().as_secs_f64(),
        );
    }
}

/// Inference and training queue depth for a local wall-clock time.
///
/// Business hours are busiest, with a spike in the first ten minutes of
/// each hour; evenings are moderate; nights carry only batch work.
pub fn queue_depths<R: Rng + ?Sized>(hour: u32, minute: u32, rng: &mut R) -> (u32, u32) {
    match hour {
        9..=16 if minute < 10 => (rng.random_range(50..=100), rng.random_range(20..=40)),
        9..=16 => (rng.random_range(30..=70), rng.random_range(10..=30)),
        17..=20 => (rng.random_range(15..=40), rng.random_range(5..=20)),
        _ => (rng.random_range(0..=15), rng.random_range(0..=5)),
    }
}

/// Alert messages derived from the current gauge values.
pub fn collect_alerts(registry: &Registry, gpu_count: usize) -> Vec<String> {
    let mut alerts = Vec::new();

    let gpu_0 = demo_gpu_label(0);
    let temperature = registry
        .value(DEMO_GPU_TEMPERATURE, &[("gpu_id", gpu_0.as_str())])
        .unwrap_or(0.0);
    if temperature > CRITICAL_TEMPERATURE_CELSIUS {
        alerts.push(format!("GPU_0 CRITICAL TEMP: {temperature}°C"));
    }

    for index in 0..gpu_count {
        let gpu_id = demo_gpu_label(index);
        let utilization = registry
            .value(DEMO_GPU_UTILIZATION, &[("gpu_id", gpu_id.as_str())])
            .unwrap_or(0.0);
        if utilization == 0.0 {
            alerts.push(format!("GPU_{index} OFFLINE"));
        }
    }

    let inference_queue = registry
        .value(JOB_QUEUE_SIZE, &[("queue_type", "inference")])
        .unwrap_or(0.0);
    if inference_queue > QUEUE_OVERLOAD_DEPTH {
        alerts.push(format!("QUEUE OVERLOAD: {inference_queue} jobs waiting"));
    }

    alerts
}

pub fn health_status(alerts: &[String], cpu_percent: f64, memory_percent: f64) -> &'static str {
    if !alerts.is_empty() {
        "critical"
    } else if cpu_percent > DEGRADED_USAGE_PERCENT || memory_percent > DEGRADED_USAGE_PERCENT {
        "degraded"
    } else {
        "healthy"
    }
}

pub fn router(state: DemoState) -> Router {
    with_layers(
        Router::new()
            .route("/", get(home))
            .route("/api/test", get(api_test))
            .route("/api/inference", post(inference))
            .route("/health", get(health))
            .route("/metrics", get(metrics_handler))
            .with_state(state),
    )
}

async fn home(State(state): State<DemoState>) -> Json<Value> {
    let tracker = RequestTracker::start(&state.registry, "GET", "/");
    let delay = draw(&mut rand::rng(), 0.01, 0.1);
    state.pause(delay).await;

    tracker.record(StatusCode::OK);
    Json(json!({
        "status": "healthy",
        "service": "python-api",
        "version": "1.0.0",
    }))
}

async fn api_test(State(state): State<DemoState>) -> (StatusCode, Json<Value>) {
    let tracker = RequestTracker::start(&state.registry, "GET", "/api/test");
    let processing_time = draw(&mut rand::rng(), 0.05, 0.5);
    state.pause(processing_time).await;

    let (gpu_drops, fails) = {
        let mut rng = rand::rng();
        (
            rng.random_bool(state.policy.gpu_drop_probability),
            rng.random_bool(state.policy.error_rate),
        )
    };

    if gpu_drops {
        let gpu_3 = demo_gpu_label(3);
        let labels = [("gpu_id", gpu_3.as_str())];
        let publisher = Publisher::new(state.registry.as_ref(), "demo-app");
        publisher.gauge(DEMO_GPU_UTILIZATION, &labels, 0.0);
        publisher.gauge(DEMO_GPU_MEMORY_USAGE, &labels, 0.0);
        tracing::warn!(gpu_id = %gpu_3, "simulated GPU dropout");
    }

    if fails {
        tracker.record(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "GPU memory overflow!" })),
        );
    }

    tracker.record(StatusCode::OK);
    (
        StatusCode::OK,
        Json(json!({
            "result": "success",
            "processing_time": processing_time,
        })),
    )
}

async fn inference(State(state): State<DemoState>) -> Json<Value> {
    let tracker = RequestTracker::start(&state.registry, "POST", "/api/inference");
    let (model_name, inference_time) = {
        let mut rng = rand::rng();
        let model = DEMO_INFERENCE_MODELS[rng.random_range(0..DEMO_INFERENCE_MODELS.len())];
        (model, draw(&mut rng, 0.1, 2.0))
    };

    let started = Instant::now();
    state.pause(inference_time).await;
    let publisher = Publisher::new(state.registry.as_ref(), "demo-app");
    publisher.observe(
        MODEL_INFERENCE_DURATION,
        &[("model_name", model_name)],
        started.elapsed().as_secs_f64(),
    );

    let now = chrono::Local::now();
    let (inference_queue, training_queue) =
        queue_depths(now.hour(), now.minute(), &mut rand::rng());
    publisher.gauge(JOB_QUEUE_SIZE, &[("queue_type", "inference")], inference_queue as f64);
    publisher.gauge(JOB_QUEUE_SIZE, &[("queue_type", "training")], training_queue as f64);

    tracker.record(StatusCode::OK);
    Json(json!({
        "model": model_name,
        "inference_time": inference_time,
        "result": "completed",
        "queue_depth": inference_queue,
    }))
}

async fn health(State(state): State<DemoState>) -> Json<HealthReport> {
    let (cpu_percent, memory_percent) = state.host_usage();
    let alerts = collect_alerts(&state.registry, crate::sim::constants::APP_GPU_COUNT);
    let status = health_status(&alerts, cpu_percent, memory_percent);
    let active_connections = state
        .registry
        .value(APP_ACTIVE_CONNECTIONS, &[])
        .unwrap_or(0.0);

    Json(HealthReport {
        status: status.to_string(),
        cpu_percent,
        memory_percent,
        active_connections,
        alerts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::{bind, serve};
    use crate::sim::{DemoGpuLoad, Simulation};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::sync::oneshot;

    struct TestApp {
        base: String,
        registry: Arc<Registry>,
        shutdown: oneshot::Sender<()>,
    }

    async fn start(policy: DemoPolicy) -> TestApp {
        let registry = Arc::new(Registry::new());
        DemoGpuLoad::default().describe(&registry).unwrap();
        let state = DemoState::new(registry.clone(), policy).unwrap();

        let listener = bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (shutdown, rx) = oneshot::channel::<()>();
        tokio::spawn(serve(listener, router(state), async move {
            let _ = rx.await;
        }));

        TestApp {
            base: format!("http://127.0.0.1:{port}"),
            registry,
            shutdown,
        }
    }

    fn instant(error_rate: f64) -> DemoPolicy {
        DemoPolicy {
            gpu_drop_probability: 0.0,
            error_rate,
            time_scale: 0.0,
        }
    }

    #[tokio::test]
    async fn test_home_records_request() {
        let app = start(instant(0.0)).await;
        let body: Value = reqwest::get(format!("{}/", app.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "python-api");

        let labels = [("method", "GET"), ("endpoint", "/"), ("status", "200")];
        assert_eq!(app.registry.value(APP_REQUESTS_TOTAL, &labels), Some(1.0));
        assert_eq!(
            app.registry
                .histogram_count(APP_REQUEST_DURATION, &[("method", "GET"), ("endpoint", "/")]),
            Some(1)
        );
        assert_eq!(app.registry.value(APP_ACTIVE_CONNECTIONS, &[]), Some(0.0));
        let _ = app.shutdown.send(());
    }

    #[tokio::test]
    async fn test_api_test_failure_path() {
        let app = start(instant(1.0)).await;
        let response = reqwest::get(format!("{}/api/test", app.base)).await.unwrap();
        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "GPU memory overflow!");

        let labels = [("method", "GET"), ("endpoint", "/api/test"), ("status", "500")];
        assert_eq!(app.registry.value(APP_REQUESTS_TOTAL, &labels), Some(1.0));
        let _ = app.shutdown.send(());
    }

    #[tokio::test]
    async fn test_api_test_success_path() {
        let app = start(instant(0.0)).await;
        let response = reqwest::get(format!("{}/api/test", app.base)).await.unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["result"], "success");
        let processing_time = body["processing_time"].as_f64().unwrap();
        assert!((0.05..0.5).contains(&processing_time));
        let _ = app.shutdown.send(());
    }

    #[tokio::test]
    async fn test_inference_sets_queue_gauges() {
        let app = start(instant(0.0)).await;
        let body: Value = reqwest::Client::new()
            .post(format!("{}/api/inference", app.base))
            .json(&json!({}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let model = body["model"].as_str().unwrap();
        assert!(DEMO_INFERENCE_MODELS.contains(&model));
        assert_eq!(body["result"], "completed");
        let depth = body["queue_depth"].as_f64().unwrap();
        assert_eq!(
            app.registry
                .value(JOB_QUEUE_SIZE, &[("queue_type", "inference")]),
            Some(depth)
        );
        assert!(app
            .registry
            .value(JOB_QUEUE_SIZE, &[("queue_type", "training")])
            .is_some());
        assert_eq!(
            app.registry
                .histogram_count(MODEL_INFERENCE_DURATION, &[("model_name", model)]),
            Some(1)
        );
        let _ = app.shutdown.send(());
    }

    #[tokio::test]
    async fn test_health_reports_alerts() {
        let app = start(instant(0.0)).await;

        // Before the first GPU tick every GPU reads as offline.
        let report: HealthReport = reqwest::get(format!("{}/health", app.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report.status, "critical");
        assert!(report.alerts.iter().any(|a| a == "GPU_3 OFFLINE"));

        let mut rng = StdRng::seed_from_u64(3);
        DemoGpuLoad::default().tick(&mut rng, app.registry.as_ref());
        let report: HealthReport = reqwest::get(format!("{}/health", app.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(report.alerts.iter().all(|a| !a.ends_with("OFFLINE")));
        assert!(report
            .alerts
            .iter()
            .any(|a| a.starts_with("GPU_0 CRITICAL TEMP")));
        assert_eq!(report.status, "critical");
        assert_eq!(report.active_connections, 0.0);
        assert!(report.memory_percent >= 0.0);
        let _ = app.shutdown.send(());
    }

    #[tokio::test]
    async fn test_metrics_route_renders_demo_families() {
        let app = start(instant(0.0)).await;
        reqwest::get(format!("{}/", app.base)).await.unwrap();
        let body = reqwest::get(format!("{}/metrics", app.base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("# TYPE app_requests_total counter"));
        assert!(body.contains(
            "app_request_duration_seconds_bucket{method=\"GET\",endpoint=\"/\",le=\"+Inf\"} 1"
        ));
        assert!(body.contains("app_active_connections 0"));
        let _ = app.shutdown.send(());
    }

    #[test]
    fn test_queue_depth_bands() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let (inference, training) = queue_depths(10, 5, &mut rng);
            assert!((50..=100).contains(&inference) && (20..=40).contains(&training));
            let (inference, training) = queue_depths(10, 30, &mut rng);
            assert!((30..=70).contains(&inference) && (10..=30).contains(&training));
            let (inference, training) = queue_depths(18, 0, &mut rng);
            assert!((15..=40).contains(&inference) && (5..=20).contains(&training));
            let (inference, training) = queue_depths(3, 0, &mut rng);
            assert!(inference <= 15 && training <= 5);
            let (inference, _) = queue_depths(21, 0, &mut rng);
            assert!(inference <= 15);
        }
    }

    #[test]
    fn test_health_status_precedence() {
        let alerts = vec!["GPU_1 OFFLINE".to_string()];
        assert_eq!(health_status(&alerts, 10.0, 10.0), "critical");
        assert_eq!(health_status(&[], 81.0, 10.0), "degraded");
        assert_eq!(health_status(&[], 10.0, 95.0), "degraded");
        assert_eq!(health_status(&[], 80.0, 80.0), "healthy");
    }

    #[test]
    fn test_queue_overload_alert() {
        let registry = Arc::new(Registry::new());
        let state = DemoState::new(registry.clone(), instant(0.0)).unwrap();
        state
            .registry()
            .set_gauge(JOB_QUEUE_SIZE, &[("queue_type", "inference")], 90.0)
            .unwrap();
        let alerts = collect_alerts(&registry, 0);
        assert_eq!(alerts, vec!["QUEUE OVERLOAD: 90 jobs waiting".to_string()]);
    }
}
