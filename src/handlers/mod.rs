//! HTTP endpoint handlers for the live monitor.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page listing the enabled streams
//! - `/health`: Session statistics (plain text)
//! - `/ws/{stream}`: WebSocket upgrade into a polling session
//! - `/api/snapshot/{stream}`: One JSON snapshot without a session

pub mod health;
pub mod root;
pub mod snapshot;
pub mod ws;

// Re-export handlers
pub use health::health_handler;
pub use root::root_handler;
pub use snapshot::snapshot_handler;
pub use ws::ws_handler;
