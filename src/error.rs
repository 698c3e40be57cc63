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

//! Unified error types for the infra-sim library.
//!
//! Errors raised here are the ones that can stop a service: invalid
//! startup configuration, a listener that cannot bind, or a background
//! task that does not shut down in time. Everything that happens inside a
//! running tick is logged and tolerated instead (see
//! [`crate::sink::SinkError`] and [`crate::sim::UpdateError`]).
//!
//! # Example
//!
//! ```rust
//! use infra_sim::{Error, Result};
//! use infra_sim::common::config::GpuSimConfig;
//!
//! fn load() -> Result<GpuSimConfig> {
//!     let config = GpuSimConfig::default();
//!     config.validate()?;
//!     Ok(config)
//! }
//! # load().unwrap();
//! ```

use std::time::Duration;

use thiserror::Error;

/// The main error type for infra-sim operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is out of range.
    ///
    /// Raised once at startup, before any task is spawned.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP listener could not bind to its address.
    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A background task did not stop within its grace period.
    #[error("Task '{task}' did not stop within {grace:?}")]
    ShutdownTimeout { task: &'static str, grace: Duration },

    /// A background task panicked or was cancelled.
    #[error("Task '{task}' failed: {source}")]
    TaskJoin {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },

    /// An outbound HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for infra-sim operations.
pub type Result<T> = std::result::Result<T, Error>;
