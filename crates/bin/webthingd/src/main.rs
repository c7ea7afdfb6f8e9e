//! # webthingd: Web Thing daemon
//!
//! Composition root that wires the virtual devices to the engine and runs
//! them until interrupted.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Install `tracing` with the configured filter
//! - Build the virtual Things
//! - Attach a log sink subscriber to every Thing
//! - Drive the sensor simulation on an interval
//! - Shut every Thing down on ctrl-c
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no protocol logic belongs here.

mod config;

use std::sync::Arc;

use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webthing_adapter_virtual::VirtualIntegration;
use webthing_app::channel_subscriber::ChannelSubscriber;

const LOG_SINK_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    let integration =
        VirtualIntegration::with_lamp(&config.thing.id, &config.thing.title, &config.options)?;

    // The hub only keeps weak references, so the sinks must outlive the loop.
    let mut sinks = Vec::new();
    for thing in integration.things() {
        let (subscriber, mut stream) = ChannelSubscriber::with_stream(LOG_SINK_CAPACITY);
        let subscriber = Arc::new(subscriber);
        thing.subscribe(&subscriber);
        sinks.push(subscriber);

        let thing_id = thing.id().to_string();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                info!(thing = %thing_id, message = %String::from_utf8_lossy(&message), "notification");
            }
        });
    }
    info!(
        lamp = %config.thing.id,
        interval_ms = config.thing.report_interval_ms,
        "webthingd started"
    );

    let mut interval = tokio::time::interval(config.report_interval());
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = integration.tick() {
                    warn!(%err, "simulation step failed");
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    integration.shutdown();
    drop(sinks);
    info!("webthingd stopped");
    Ok(())
}
