// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Silent-emergency alarm broker.
//!
//! A device-facing trigger endpoint creates durable alarm records, a worker
//! fans notifications out over heterogeneous channels and schedules
//! escalations, and a small operator API plus a single-use acknowledgment
//! page take alarms off the queue.

pub mod alarm;
pub mod channels;
pub mod clock;
pub mod config;
pub mod error;
pub mod escalation;
pub mod ipnet;
pub mod kv;
pub mod metrics;
pub mod notify;
pub mod queue;
pub mod seed;
pub mod state;
pub mod store;
pub mod test_support;
pub mod transport;
pub mod trigger;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::channels::Channels;
use crate::clock::SystemClock;
use crate::config::BrokerConfig;
use crate::kv::RedisKv;
use crate::queue::{RedisQueue, Worker};
use crate::state::AppState;
use crate::store::PgStore;
use crate::transport::build_router;

/// Connect the production backends and assemble shared state.
async fn build_state(
    config: BrokerConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<Arc<AppState>> {
    let store = PgStore::connect(&config.database_url).await?;
    let kv = RedisKv::connect(&config.redis_url).await?;
    let queue = RedisQueue::connect(&config.redis_url).await?;

    let channels = if config.simulation_enabled {
        tracing::warn!("simulation mode: channel adapters are in-memory mocks");
        Channels::simulated(&config)
    } else {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Channels::from_config(&config, client)
    };

    Ok(Arc::new(AppState::new(
        config,
        Arc::new(SystemClock),
        Arc::new(store),
        Arc::new(kv),
        Arc::new(queue),
        channels,
        shutdown,
    )))
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        }
    });
}

/// Run the HTTP front-end until shutdown.
pub async fn run_server(config: BrokerConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let state = build_state(config, shutdown.clone()).await?;
    let addr = state.config.bind_addr();
    let router = build_router(state);

    tracing::info!("alarm broker listening on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await?;
    Ok(())
}

/// Run the worker pool until shutdown, draining in-flight jobs.
pub async fn run_worker(config: BrokerConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let state = build_state(config, shutdown.clone()).await?;
    tracing::info!("alarm broker worker started");
    Worker::new(state).run(shutdown).await;
    Ok(())
}
