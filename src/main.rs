//! CLI for geopub
//!
//! Subcommands:
//! - `run` (default): connect to the broker and publish the synthetic track
//! - `config`: print the effective configuration and exit

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use geopub::config::{DEFAULT_CONFIG_PATH, PublisherConfig, load_config_from};
use geopub::link::MqttLink;
use geopub::publisher::Publisher;
use geopub::sensor::{SyntheticSensor, sample_ticker};
use geopub::utils::Result;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "geopub", version, about = "Resilient geolocation telemetry publisher")]
struct Cli {
    /// Log level: error, warn, info, debug or trace
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Settings file to read before the environment (extension optional)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Connect and publish samples until interrupted
    Run,
    /// Print the effective configuration and exit
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    geopub::utils::logging::init(&cli.log_level);

    let config = match load_config_from(&cli.config)
        .and_then(|settings| PublisherConfig::try_from(&settings))
    {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Config => {
            println!("{config}");
            Ok(())
        }
        Command::Run => run(config).await,
    };

    match result {
        Err(e) if e.is_fatal() => {
            error!("{e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            warn!("Shutdown incomplete: {e}");
            ExitCode::SUCCESS
        }
        Ok(()) => ExitCode::SUCCESS,
    }
}

async fn run(config: PublisherConfig) -> Result<()> {
    let (link, events) = MqttLink::start(&config);
    let link = Arc::new(link);
    let mut publisher = Publisher::new(&config, link.clone());
    let drainer = tokio::spawn(publisher.drainer().run(events));

    info!(
        client_id = %publisher.session().client_id(),
        session_id = %publisher.session().current_id(),
        topic = %publisher.topic(),
        "Publisher started"
    );

    let mut sensor = SyntheticSensor::default();
    let mut ticker = sample_ticker(config.publish_interval);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received. Exiting gracefully.");
                break;
            }
            _ = ticker.tick() => {
                let Some(sample) = sensor.next() else { break };
                publisher.publish_point(sample).await;
            }
        }
    }

    let queued = publisher.queue().len();
    if queued > 0 {
        warn!(queued, "Discarding queued messages on shutdown");
    }

    drop(publisher);
    drainer.abort();
    let _ = drainer.await;

    match Arc::try_unwrap(link) {
        Ok(link) => link.close().await?,
        Err(_) => warn!("MQTT link still in use, skipping graceful close"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
