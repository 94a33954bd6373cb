// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::channels::Channels;
use crate::clock::Clock;
use crate::config::BrokerConfig;
use crate::ipnet::CidrList;
use crate::kv::Kv;
use crate::metrics::Metrics;
use crate::queue::Queue;
use crate::store::Store;

/// Shared broker state: one narrow struct holding the collaborator handles
/// every request and job works against.
pub struct AppState {
    pub config: BrokerConfig,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn Store>,
    pub kv: Arc<dyn Kv>,
    pub queue: Arc<dyn Queue>,
    pub channels: Channels,
    pub metrics: Metrics,
    pub shutdown: CancellationToken,
    pub started_at: Instant,
    /// Parsed once at startup. `None` disables the check.
    pub device_allowlist: Option<CidrList>,
    pub trusted_proxies: Option<CidrList>,
}

impl AppState {
    pub fn new(
        config: BrokerConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn Store>,
        kv: Arc<dyn Kv>,
        queue: Arc<dyn Queue>,
        channels: Channels,
        shutdown: CancellationToken,
    ) -> Self {
        let device_allowlist = CidrList::parse(&config.device_ip_allowlist);
        let trusted_proxies = CidrList::parse_lenient(&config.trusted_proxy_cidrs);
        Self {
            config,
            clock,
            store,
            kv,
            queue,
            channels,
            metrics: Metrics::default(),
            shutdown,
            started_at: Instant::now(),
            device_allowlist,
            trusted_proxies,
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
