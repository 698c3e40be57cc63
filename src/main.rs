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

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

use infra_sim::api::{self, bind, init_tracing, metrics_router, serve, shutdown_signal};
use infra_sim::cli::{Cli, Commands};
use infra_sim::common::config::{AppSimConfig, GpuSimConfig, LoadGenConfig, MlSimConfig};
use infra_sim::network::LoadGenerator;
use infra_sim::sim::constants::DEFAULT_SHUTDOWN_GRACE_SECS;
use infra_sim::sim::{
    DemoGpuLoad, GpuFleet, MlPolicy, MlWorkload, Scheduler, SchedulerHandle, Simulation,
};
use infra_sim::sink::Registry;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Gpu(args) => run_gpu(args.to_config()).await,
        Commands::Ml(args) => run_ml(args.to_config()).await,
        Commands::App(args) => run_app(args.to_config()).await,
        Commands::Load(args) => run_load(args.to_config()).await,
    }
}

async fn run_gpu(config: GpuSimConfig) -> Result<()> {
    config.validate()?;

    let registry = Arc::new(Registry::new());
    let fleet = GpuFleet::new(&config, &mut rand::rng());
    fleet
        .describe(&registry)
        .context("registering GPU metrics")?;
    let listener = bind(config.port).await?;

    tracing::info!(
        gpus = config.gpu_count,
        model = %config.gpu_model,
        failure_rate = config.failure_rate,
        "Starting GPU fleet simulator"
    );
    let scheduler = Scheduler::spawn(fleet, registry.clone(), config.interval());
    serve_then_stop(listener, metrics_router(registry), scheduler).await
}

async fn run_ml(config: MlSimConfig) -> Result<()> {
    config.validate()?;

    let registry = Arc::new(Registry::new());
    let workload = MlWorkload::new(MlPolicy::from(&config));
    workload
        .describe(&registry)
        .context("registering ML metrics")?;
    let listener = bind(config.port).await?;

    tracing::info!(
        max_jobs = config.max_jobs,
        admission_probability = config.admission_probability,
        "Starting ML workload simulator"
    );
    let scheduler = Scheduler::spawn(workload, registry.clone(), config.interval());
    serve_then_stop(listener, metrics_router(registry), scheduler).await
}

async fn run_app(config: AppSimConfig) -> Result<()> {
    config.validate()?;

    let registry = Arc::new(Registry::new());
    let gpus = DemoGpuLoad::default();
    gpus.describe(&registry)
        .context("registering demo GPU metrics")?;
    let state = api::DemoState::new(registry.clone(), api::DemoPolicy::default())
        .context("registering demo service metrics")?;
    let listener = bind(config.port).await?;

    tracing::info!(gpus = gpus.gpu_count, "Starting demo service");
    let scheduler = Scheduler::spawn(gpus, registry, config.interval());
    serve_then_stop(listener, api::demo::router(state), scheduler).await
}

async fn run_load(config: LoadGenConfig) -> Result<()> {
    config.validate()?;
    let generator = LoadGenerator::new(&config).context("building HTTP client")?;
    generator.run(shutdown_signal()).await;
    Ok(())
}

/// Serve until a shutdown signal, then stop the simulation task.
async fn serve_then_stop<S>(
    listener: TcpListener,
    app: Router,
    scheduler: SchedulerHandle<S>,
) -> Result<()> {
    let served = serve(listener, app, shutdown_signal()).await;
    let stopped = scheduler
        .stop(Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS))
        .await;

    served.context("HTTP server failed")?;
    stopped?;
    Ok(())
}
