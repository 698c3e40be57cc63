use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;
use rand::Rng;

use crate::common::config::{AppConfig, LoadGenConfig};
use crate::error::Result;

/// Result of one HTTP request issued by the load generator.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub url: String,
    pub method: &'static str,
    /// Response status, or the transport error message.
    pub result: std::result::Result<u16, String>,
}

impl RequestOutcome {
    fn log(&self) {
        match &self.result {
            Ok(status) => tracing::info!(url = %self.url, method = self.method, status, "request"),
            Err(e) => tracing::warn!(url = %self.url, method = self.method, error = %e, "request failed"),
        }
    }
}

/// Polls a fixed list of URLs forever with jittered pauses.
pub struct LoadGenerator {
    client: reqwest::Client,
    targets: Vec<String>,
    interval: Duration,
    post_probability: f64,
}

impl LoadGenerator {
    pub fn new(config: &LoadGenConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(AppConfig::POOL_IDLE_TIMEOUT_SECS))
            .tcp_keepalive(Duration::from_secs(AppConfig::TCP_KEEPALIVE_SECS))
            .build()?;

        Ok(Self {
            client,
            targets: config.targets.clone(),
            interval: Duration::from_secs(config.interval_secs),
            post_probability: AppConfig::INFERENCE_POST_PROBABILITY,
        })
    }

    /// Override the chance of a follow-up POST to inference URLs.
    pub fn with_post_probability(mut self, probability: f64) -> Self {
        self.post_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Hit every target once, concurrently. Never fails; errors are
    /// reported in the outcomes.
    pub async fn poll_once(&self) -> Vec<RequestOutcome> {
        let polls = self.targets.iter().map(|url| {
            let post = url.contains("inference") && rand::rng().random_bool(self.post_probability);
            self.poll_target(url, post)
        });

        join_all(polls).await.into_iter().flatten().collect()
    }

    async fn poll_target(&self, url: &str, post: bool) -> Vec<RequestOutcome> {
        let mut outcomes = Vec::with_capacity(2);

        let get = self
            .client
            .get(url)
            .send()
            .await
            .map(|r| r.status().as_u16())
            .map_err(|e| e.to_string());
        // A target that is down gets no follow-up POST.
        let reachable = get.is_ok();
        outcomes.push(RequestOutcome {
            url: url.to_string(),
            method: "GET",
            result: get,
        });

        if post && reachable {
            let response = self
                .client
                .post(url)
                .json(&serde_json::json!({}))
                .send()
                .await;
            outcomes.push(RequestOutcome {
                url: url.to_string(),
                method: "POST",
                result: response
                    .map(|r| r.status().as_u16())
                    .map_err(|e| e.to_string()),
            });
        }

        outcomes
    }

    /// Poll until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!(targets = ?self.targets, "Starting load generator");
        tokio::pin!(shutdown);

        loop {
            for outcome in self.poll_once().await {
                outcome.log();
            }

            let delay = jittered_delay(self.interval, &mut rand::rng());
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => break,
            }
        }
        tracing::info!("Load generator stopped");
    }
}

/// `interval` shifted by up to ±1 s, never negative.
pub fn jittered_delay<R: Rng + ?Sized>(interval: Duration, rng: &mut R) -> Duration {
    let jitter = rng.random_range(-AppConfig::REQUEST_JITTER_SECS..=AppConfig::REQUEST_JITTER_SECS);
    Duration::from_secs_f64((interval.as_secs_f64() + jitter).max(0.0))
}
