mod request;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flightscout_core::{
    load_config, load_config_from_env, metrics, validate_config, ChannelObserver, Config,
    FlightScout, SanitizedConfig, SearchEvent,
};

use request::SearchRequest;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn usage() -> String {
    "usage: flightscout <request.toml> [output.json]".to_string()
}

fn load_configuration() -> Result<Config> {
    let explicit = std::env::var("FLIGHTSCOUT_CONFIG").ok().map(PathBuf::from);
    let config_path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = if explicit.is_some() || config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        info!("No config.toml found, using defaults and environment");
        load_config_from_env().context("Failed to load config from environment")?
    };

    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let request_path = args.next().map(PathBuf::from).context(usage())?;
    let output_path = args.next().map(PathBuf::from);

    info!("flightscout {}", VERSION);
    let config = load_configuration()?;
    info!(
        "Configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let request = SearchRequest::load(&request_path)?;
    let scout = FlightScout::from_config(&config).context("Failed to create search engine")?;

    // Cancel on Ctrl-C; workers stop at their next checkpoint.
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight requests");
            ctrl_c_cancel.cancel();
        }
    });

    let (observer, mut events) = ChannelObserver::channel();
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SearchEvent::Deal(deal) => info!(
                    "Deal: {} ({}) {:.2} EUR, {} {} -> {} {}",
                    deal.city,
                    deal.country,
                    deal.price,
                    deal.departure_date,
                    deal.flight_time,
                    deal.return_date,
                    deal.return_time
                ),
                SearchEvent::Progress { completed, total } => {
                    info!("Progress: {}/{} trips", completed, total)
                }
                // Already logged by the engine.
                SearchEvent::Status(_) => {}
            }
        }
    });

    let observer = Arc::new(observer);
    let deals = match &request {
        SearchRequest::Discovery(r) => scout.run(r, &cancel, observer).await?,
        SearchRequest::Cities(r) => scout.run_city_search(r, &cancel, observer).await?,
    };
    let _ = reporter.await;

    info!("Found {} deals", deals.len());
    match metrics::render_metrics() {
        Ok(text) => debug!("Metrics:\n{}", text),
        Err(e) => warn!("Failed to render metrics: {}", e),
    }
    let json = serde_json::to_string_pretty(&deals).context("Failed to serialize deals")?;
    match output_path {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write results to {:?}", path))?;
            info!("Results written to {:?}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}
