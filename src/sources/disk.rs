//! Disk list and smoothed per-disk throughput.

use super::{HostPaths, SourceSettings};
use crate::collectors::{list_disks, read_diskstats, DiskInfo};
use crate::error::SourceError;
use crate::rate::{sectors_to_megabytes, RateSample, RateState};
use crate::session::MetricSource;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::task;
use tracing::{debug, warn};

pub const DEFAULT_DISK_SMOOTHING: f64 = 0.4;

const SECTORS_READ: &str = "sectors_read";
const SECTORS_WRITTEN: &str = "sectors_written";

/// Throughput of one disk in MB/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiskSpeed {
    pub read_speed: f64,
    pub write_speed: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskSnapshot {
    pub disks: Vec<DiskInfo>,
    pub disks_speeds: BTreeMap<String, DiskSpeed>,
}

pub struct DiskSource {
    paths: HostPaths,
    rates: RateState,
}

impl DiskSource {
    pub fn new(settings: &SourceSettings) -> Self {
        let rates = match settings.disk_smoothing {
            Some(factor) => RateState::smoothed(factor),
            None => RateState::unsmoothed(),
        };
        Self {
            paths: settings.paths.clone(),
            rates,
        }
    }
}

#[async_trait]
impl MetricSource for DiskSource {
    type Snapshot = DiskSnapshot;

    fn name(&self) -> &'static str {
        "disks"
    }

    async fn snapshot(&mut self) -> Result<DiskSnapshot, SourceError> {
        let paths = self.paths.clone();
        let (disks, counters, taken_at) = task::spawn_blocking(move || {
            let disks = list_disks(&paths.sys_root);
            let counters = read_diskstats(&paths.proc_root);
            (disks, counters, Instant::now())
        })
        .await?;

        let counters = counters.unwrap_or_else(|e| {
            warn!("Disk counters unavailable: {}", e);
            Default::default()
        });

        self.rates.set_entities(disks.iter().map(|d| d.name.clone()));

        let mut samples = Vec::with_capacity(disks.len());
        for disk in &disks {
            match counters.get(&disk.name) {
                Some(c) => samples.push(
                    RateSample::new(disk.name.clone(), taken_at)
                        .with_counter(SECTORS_READ, c.sectors_read)
                        .with_counter(SECTORS_WRITTEN, c.sectors_written),
                ),
                None => debug!("No diskstats entry for {}", disk.name),
            }
        }

        let mut disks_speeds = BTreeMap::new();
        for (name, tick) in self.rates.observe(samples) {
            let read_raw = tick.rate(SECTORS_READ, sectors_to_megabytes);
            let write_raw = tick.rate(SECTORS_WRITTEN, sectors_to_megabytes);
            let speed = DiskSpeed {
                read_speed: self.rates.smooth(&name, SECTORS_READ, read_raw),
                write_speed: self.rates.smooth(&name, SECTORS_WRITTEN, write_raw),
            };
            disks_speeds.insert(name, speed);
        }

        Ok(DiskSnapshot {
            disks,
            disks_speeds,
        })
    }
}
