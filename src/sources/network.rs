//! Per-interface throughput and drops, optionally with the connection table.

use super::{HostPaths, SourceSettings};
use crate::collectors::{physical_interfaces, read_netdev_stats};
use crate::connections::{ConnectionTable, ConnectionTableBuilder};
use crate::error::SourceError;
use crate::rate::{bytes_to_megabytes, RateSample, RateState};
use crate::session::MetricSource;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::task;
use tracing::{debug, warn};

const RX_BYTES: &str = "rx_bytes";
const TX_BYTES: &str = "tx_bytes";
const RX_DROPPED: &str = "rx_dropped";
const TX_DROPPED: &str = "tx_dropped";

/// Throughput in MB/s; drops are packets dropped since the previous tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterfaceStats {
    pub rx_mbps: f64,
    pub tx_mbps: f64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    pub stats: BTreeMap<String, InterfaceStats>,
    pub connections: ConnectionTable,
}

pub struct NetworkSource {
    paths: HostPaths,
    rates: RateState,
    connections: Option<ConnectionTableBuilder>,
}

impl NetworkSource {
    pub fn new(settings: &SourceSettings) -> Self {
        let connections = settings
            .network_connections
            .then(|| ConnectionTableBuilder::new(settings.paths.proc_root.clone()));
        Self {
            paths: settings.paths.clone(),
            rates: RateState::unsmoothed(),
            connections,
        }
    }
}

#[async_trait]
impl MetricSource for NetworkSource {
    type Snapshot = NetworkSnapshot;

    fn name(&self) -> &'static str {
        "network"
    }

    async fn snapshot(&mut self) -> Result<NetworkSnapshot, SourceError> {
        let paths = self.paths.clone();
        let builder = self.connections.clone();
        let (interfaces, counters, taken_at, connections) = task::spawn_blocking(move || {
            let interfaces = physical_interfaces(&paths.sys_root);
            let counters = read_netdev_stats(&paths.proc_root);
            let taken_at = Instant::now();
            let connections = builder.map(|b| b.build()).unwrap_or_default();
            (interfaces, counters, taken_at, connections)
        })
        .await?;

        let counters = counters.unwrap_or_else(|e| {
            warn!("Interface counters unavailable: {}", e);
            Default::default()
        });

        self.rates.set_entities(interfaces.iter().cloned());

        let mut samples = Vec::with_capacity(interfaces.len());
        for iface in &interfaces {
            match counters.get(iface) {
                Some(c) => samples.push(
                    RateSample::new(iface.clone(), taken_at)
                        .with_counter(RX_BYTES, c.receive_bytes)
                        .with_counter(TX_BYTES, c.transmit_bytes)
                        .with_counter(RX_DROPPED, c.receive_drop)
                        .with_counter(TX_DROPPED, c.transmit_drop),
                ),
                None => debug!("No net/dev entry for {}", iface),
            }
        }

        let stats = self
            .rates
            .observe(samples)
            .into_iter()
            .map(|(iface, tick)| {
                let stats = InterfaceStats {
                    rx_mbps: tick.rate(RX_BYTES, bytes_to_megabytes),
                    tx_mbps: tick.rate(TX_BYTES, bytes_to_megabytes),
                    rx_dropped: tick.delta(RX_DROPPED),
                    tx_dropped: tick.delta(TX_DROPPED),
                };
                (iface, stats)
            })
            .collect();

        Ok(NetworkSnapshot { stats, connections })
    }
}
