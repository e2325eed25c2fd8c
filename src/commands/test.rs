//! Test command implementation.
//!
//! Runs one stream locally through a polling session and prints the
//! snapshots it pushes.

use herakles_live_monitor::{run_stream, ChannelSink, SessionContext, StreamKind};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Samples `stream` for `iterations` ticks and prints each payload.
pub async fn command_test(
    stream: StreamKind,
    iterations: usize,
    pretty: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 Herakles Live Monitor - Test Mode");
    println!("====================================");
    println!(
        "   📡 Stream: {} (interval {} ms)",
        stream,
        config.interval().as_millis()
    );
    if stream.is_rate_based() {
        println!("   ℹ️  Rates appear from the second snapshot on");
    }

    let settings = config.source_settings();
    let (sink, mut rx) = ChannelSink::channel(1);
    let cancel = CancellationToken::new();
    let session = tokio::spawn({
        let cancel = cancel.clone();
        let interval = config.interval();
        async move {
            run_stream(
                stream,
                &settings,
                sink,
                interval,
                cancel,
                SessionContext::default(),
            )
            .await
        }
    });

    let mut received = 0;
    let mut last = Instant::now();
    while received < iterations {
        let Some(payload) = rx.recv().await else {
            break;
        };
        received += 1;
        println!(
            "\n🔄 Iteration {}/{} ({:.0}ms, {} bytes):",
            received,
            iterations,
            last.elapsed().as_secs_f64() * 1000.0,
            payload.len()
        );
        last = Instant::now();

        if pretty {
            let value: serde_json::Value = serde_json::from_str(&payload)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{}", payload);
        }
    }

    cancel.cancel();
    drop(rx);
    let outcome = session.await?;

    if received < iterations {
        println!("\n❌ Session ended early after {} snapshot(s): {:?}", received, outcome);
        return Err(format!("stream {} ended with {:?}", stream, outcome).into());
    }

    println!("\n✅ Test completed successfully");
    Ok(())
}
