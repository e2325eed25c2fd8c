use super::SourceSettings;
use crate::connections::{ConnectionTable, ConnectionTableBuilder};
use crate::error::SourceError;
use crate::session::MetricSource;
use async_trait::async_trait;
use serde::Serialize;
use tokio::task;

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionsSnapshot {
    pub metrics: ConnectionTable,
}

/// Rebuilds the full connection table on every tick.
pub struct ConnectionsSource {
    builder: ConnectionTableBuilder,
}

impl ConnectionsSource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            builder: ConnectionTableBuilder::new(settings.paths.proc_root.clone()),
        }
    }
}

#[async_trait]
impl MetricSource for ConnectionsSource {
    type Snapshot = ConnectionsSnapshot;

    fn name(&self) -> &'static str {
        "connections"
    }

    async fn snapshot(&mut self) -> Result<ConnectionsSnapshot, SourceError> {
        let builder = self.builder.clone();
        let metrics = task::spawn_blocking(move || builder.build()).await?;
        Ok(ConnectionsSnapshot { metrics })
    }
}
