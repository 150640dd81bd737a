use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use sysprom_exporter::{
    ExporterConfig, ExporterState, GeneratorConfig, TrafficGenerator,
    config::{DEFAULT_GENERATOR_INTERVAL, DEFAULT_PORT},
    exporter_router,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sysprom", about = "Host and application metrics exporter")]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Mount point whose usage is reported.
    #[arg(long, default_value = "/")]
    disk_path: PathBuf,

    #[arg(long, default_value_t = 1000)]
    cpu_window_ms: u64,

    #[arg(long, default_value_t = 2)]
    generator_interval_secs: u64,

    /// Disable synthetic request traffic.
    #[arg(long, default_value_t = false)]
    no_generator: bool,

    /// Record requests served by this process as traffic.
    #[arg(long, default_value_t = false)]
    track_requests: bool,
}

impl Cli {
    fn into_config(self) -> ExporterConfig {
        let host = env_override("SYSPROM_HOST").unwrap_or(self.host);
        let port = match env_override("SYSPROM_PORT") {
            Some(value) => value.parse().unwrap_or_else(|_| {
                warn!(%value, "ignoring invalid SYSPROM_PORT");
                self.port
            }),
            None => self.port,
        };
        let generator_interval = if self.generator_interval_secs == 0 {
            warn!(
                fallback_secs = DEFAULT_GENERATOR_INTERVAL.as_secs(),
                "--generator-interval-secs must be positive, using default"
            );
            DEFAULT_GENERATOR_INTERVAL
        } else {
            Duration::from_secs(self.generator_interval_secs)
        };

        ExporterConfig {
            host,
            port,
            disk_path: self.disk_path,
            cpu_window: Duration::from_millis(self.cpu_window_ms),
            generator_enabled: !self.no_generator,
            generator_interval,
            track_requests: self.track_requests,
        }
    }
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("sysprom=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Cli::parse().into_config();
    let addr = config.listen_addr();
    let state = Arc::new(ExporterState::new(config)?);

    let generator = state.generator_interval().map(|interval| {
        TrafficGenerator::start(Arc::clone(&state.recorder), GeneratorConfig { interval })
    });

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%addr, error = %err, "failed to bind listener");
            return Err(err.into());
        }
    };
    info!("sysprom exporter listening on {addr}");

    let app = exporter_router(Arc::clone(&state));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(generator) = generator {
        generator.stop().await;
    }
    info!("sysprom exporter stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
