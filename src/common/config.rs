use std::time::Duration;

use crate::error::{Error, Result};
use crate::sim::constants::*;

/// Application configuration constants
pub struct AppConfig;

impl AppConfig {
    // Network Configuration
    pub const LISTEN_HOST: &'static str = "0.0.0.0";
    pub const CONNECTION_TIMEOUT_SECS: u64 = 5;
    pub const POOL_IDLE_TIMEOUT_SECS: u64 = 60;
    pub const TCP_KEEPALIVE_SECS: u64 = 30;

    // Load generator
    pub const DEFAULT_TARGET_URLS: &'static str = "http://nginx";
    pub const DEFAULT_REQUEST_INTERVAL_SECS: u64 = 5;
    pub const REQUEST_JITTER_SECS: f64 = 1.0;
    pub const INFERENCE_POST_PROBABILITY: f64 = 0.3;

    // Logging
    pub const DEFAULT_LOG_FILTER: &'static str = "infra_sim=info,tower_http=info";
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

fn check_interval(interval_secs: u64) -> Result<()> {
    if interval_secs == 0 {
        return Err(Error::InvalidConfig(
            "update interval must be at least 1 second".to_string(),
        ));
    }
    Ok(())
}

/// Knobs for the GPU fleet simulator, read once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct GpuSimConfig {
    pub port: u16,
    pub interval_secs: u64,
    pub gpu_count: usize,
    pub gpu_model: String,
    pub failure_rate: f64,
    pub recovery_rate: f64,
}

impl Default for GpuSimConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_GPU_PORT,
            interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            gpu_count: NUM_GPUS,
            gpu_model: DEFAULT_GPU_MODEL.to_string(),
            failure_rate: DEFAULT_GPU_FAILURE_RATE,
            recovery_rate: DEFAULT_GPU_RECOVERY_RATE,
        }
    }
}

impl GpuSimConfig {
    pub fn validate(&self) -> Result<()> {
        check_interval(self.interval_secs)?;
        if self.gpu_count == 0 {
            return Err(Error::InvalidConfig(
                "gpu count must be at least 1".to_string(),
            ));
        }
        if self.gpu_model.trim().is_empty() {
            return Err(Error::InvalidConfig("gpu model must not be empty".to_string()));
        }
        check_probability("failure rate", self.failure_rate)?;
        check_probability("recovery rate", self.recovery_rate)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Knobs for the ML workload simulator.
#[derive(Clone, Debug, PartialEq)]
pub struct MlSimConfig {
    pub port: u16,
    pub interval_secs: u64,
    pub max_jobs: usize,
    pub admission_probability: f64,
}

impl Default for MlSimConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_ML_PORT,
            interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            max_jobs: MAX_CONCURRENT_JOBS,
            admission_probability: JOB_ADMISSION_PROBABILITY,
        }
    }
}

impl MlSimConfig {
    pub fn validate(&self) -> Result<()> {
        check_interval(self.interval_secs)?;
        check_probability("admission probability", self.admission_probability)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Knobs for the demo HTTP service.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSimConfig {
    pub port: u16,
    pub interval_secs: u64,
}

impl Default for AppSimConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_APP_PORT,
            interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
        }
    }
}

impl AppSimConfig {
    pub fn validate(&self) -> Result<()> {
        check_interval(self.interval_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Knobs for the load generator.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadGenConfig {
    pub targets: Vec<String>,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for LoadGenConfig {
    fn default() -> Self {
        Self {
            targets: parse_targets(AppConfig::DEFAULT_TARGET_URLS),
            interval_secs: AppConfig::DEFAULT_REQUEST_INTERVAL_SECS,
            timeout_secs: AppConfig::CONNECTION_TIMEOUT_SECS,
        }
    }
}

impl LoadGenConfig {
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one target URL is required".to_string(),
            ));
        }
        if let Some(bad) = self
            .targets
            .iter()
            .find(|t| !(t.starts_with("http://") || t.starts_with("https://")))
        {
            return Err(Error::InvalidConfig(format!(
                "target '{bad}' must start with http:// or https://"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Split a comma-separated URL list, dropping blanks.
pub fn parse_targets(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GpuSimConfig::default().validate().is_ok());
        assert!(MlSimConfig::default().validate().is_ok());
        assert!(AppSimConfig::default().validate().is_ok());
        assert!(LoadGenConfig::default().validate().is_ok());
    }

    #[test]
    fn test_gpu_config_rejects_bad_values() {
        let config = GpuSimConfig {
            gpu_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = GpuSimConfig {
            failure_rate: 1.5,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: failure rate must be within [0, 1], got 1.5"
        );

        let config = GpuSimConfig {
            interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GpuSimConfig {
            recovery_rate: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ml_config_allows_zero_jobs_and_zero_admission() {
        let config = MlSimConfig {
            max_jobs: 0,
            admission_probability: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = MlSimConfig {
            admission_probability: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_targets() {
        assert_eq!(
            parse_targets("http://a:8000, http://b:9500/metrics,,"),
            vec!["http://a:8000", "http://b:9500/metrics"]
        );
        assert!(parse_targets(" , ").is_empty());
    }

    #[test]
    fn test_load_config_rejects_bad_targets() {
        let config = LoadGenConfig {
            targets: vec!["nginx".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LoadGenConfig {
            targets: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
