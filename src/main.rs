//! aircursor service binary: tracking in, input actions out.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use aircursor::config;
use aircursor::net::server::{self, ServerContext};
use aircursor::net::{CallbackRegistry, ConnectionRegistry};
use aircursor::queue::ActionQueue;
use aircursor::service::{run_sensor_loop, Service};
use aircursor::tracking::synthetic::SyntheticProvider;
use aircursor::tracking::{IdleProvider, TrackingProvider};

#[derive(Parser, Debug)]
#[command(name = "aircursor", about = "Touchless pointing service")]
struct Cli {
    /// Address for the client WebSocket listener
    #[arg(long, default_value = "127.0.0.1:9739")]
    bind: String,

    /// Tracking source: none, or synthetic (canned demo hand)
    #[arg(long, default_value = "none")]
    tracking: String,

    /// Sensor pipeline rate in Hz
    #[arg(long, default_value_t = 90)]
    sensor_hz: u32,

    /// Client dispatch rate in Hz
    #[arg(long, default_value_t = 60)]
    dispatch_hz: u32,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn make_provider(kind: &str, sensor_hz: u32) -> Box<dyn TrackingProvider> {
    let tick_us = i64::from(1_000_000 / sensor_hz.max(1));
    match kind {
        "synthetic" => Box::new(SyntheticProvider::demo(tick_us)),
        "none" => Box::new(IdleProvider::new(tick_us)),
        other => {
            eprintln!("Unknown tracking source: {other}. Use: none or synthetic");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("aircursor {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aircursor=info".into()),
        )
        .init();

    info!("aircursor v{} starting", env!("CARGO_PKG_VERSION"));
    info!(tracking = %cli.tracking, sensor_hz = cli.sensor_hz, dispatch_hz = cli.dispatch_hz, "pipeline configuration");

    let shared_config = config::shared_default();
    let queue = Arc::new(ActionQueue::default());
    let registry = Arc::new(ConnectionRegistry::new());
    let callbacks = Arc::new(CallbackRegistry::new());
    let tracking_connected = Arc::new(AtomicBool::new(false));

    let ctx = Arc::new(ServerContext {
        config: shared_config.clone(),
        queue: queue.clone(),
        registry: registry.clone(),
        callbacks: callbacks.clone(),
        tracking: server::spawn_tracking_task(callbacks),
        tracking_connected: tracking_connected.clone(),
    });

    let provider = make_provider(&cli.tracking, cli.sensor_hz);
    let service = Service::new(
        provider,
        shared_config,
        queue,
        registry,
        tracking_connected,
    );
    tokio::spawn(run_sensor_loop(service, cli.sensor_hz));

    tokio::select! {
        result = server::run(&cli.bind, cli.dispatch_hz, ctx) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
