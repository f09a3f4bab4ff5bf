// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Blob scraper binary.
//!
//! Polls the blob explorer API and exports the latest blob record as Prometheus gauges.

use std::{env, net::SocketAddr, path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context as _;
use blob_scraper::{
    BlobPoller,
    ConfigOverrides,
    GaugeSet,
    HttpBlobSource,
    MetricsServer,
    ScraperConfig,
    ScraperMetrics,
};
use clap::Parser;
use scraper_utils::metrics::Registry;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{
    EnvFilter,
    Layer as _,
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "blob-scraper")]
#[command(
    about = "Exports the latest blob records of a blob explorer as Prometheus metrics",
    version
)]
struct Args {
    /// Path to the configuration file (YAML format).
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// The blob explorer endpoint returning the list of blobs (overrides config file).
    #[arg(long, env = "API_URL")]
    api_url: Option<Url>,

    /// Seconds between two polls of the API (overrides config file).
    #[arg(long, env = "FETCH_INTERVAL", value_name = "SECONDS")]
    fetch_interval: Option<u64>,

    /// Socket address on which the Prometheus metrics are served (overrides config file).
    #[arg(short = 'a', long)]
    metrics_address: Option<SocketAddr>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_url: self.api_url.clone(),
            fetch_interval: self.fetch_interval.map(Duration::from_secs),
            metrics_address: self.metrics_address,
        }
    }
}

fn init_logging() {
    // Use INFO level by default.
    let directive = format!(
        "info,{}",
        env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default()
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(EnvFilter::new(directive)),
        )
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<ScraperConfig> {
    let config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            ScraperConfig::load(path)?
        }
        None => {
            tracing::info!("no config file provided, using defaults");
            ScraperConfig::default()
        }
    };
    let config = args.overrides().apply(config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn scraper(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    tracing::info!(
        api_url = %config.api_url,
        fetch_interval = ?config.fetch_interval,
        metrics_address = %config.metrics_address,
        gauges = ?config.gauges,
        "starting the blob scraper"
    );

    let registry = Registry::default();
    let gauges = GaugeSet::new(&registry, config.gauges.iter().copied())
        .context("failed to register the blob gauges")?;
    let metrics = ScraperMetrics::new(&registry);
    let source = HttpBlobSource::new(config.api_url.clone(), config.request_timeout)?;

    let listener = TcpListener::bind(config.metrics_address)
        .await
        .with_context(|| {
            format!(
                "failed to bind the metrics server to {}",
                config.metrics_address
            )
        })?;

    let cancel = CancellationToken::new();
    let server = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let result = MetricsServer::new(registry)
                .run(listener, cancel.clone())
                .await;
            // Without a server there is nothing left to scrape the gauges.
            cancel.cancel();
            result
        }
    });
    let poller = tokio::spawn(
        BlobPoller::new(source, gauges, metrics, config.fetch_interval).run(cancel.clone()),
    );
    tokio::spawn(shutdown_signal(cancel));

    poller.await.context("the poll loop panicked")?;
    server
        .await
        .context("the metrics server panicked")?
        .context("the metrics server failed")?;

    tracing::info!("blob scraper shutdown complete");
    Ok(())
}

/// Cancels `cancel` on Ctrl-C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(?error, "failed to install the Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::warn!(?error, "failed to install the SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel.cancelled() => return,
    }

    tracing::info!("signal received, starting graceful shutdown");
    cancel.cancel();
}

/// The CLI entrypoint.
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    if let Err(err) = scraper(args).await {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use std::{ffi::OsStr, io::Write as _};

    use clap::CommandFactory as _;

    use super::*;

    fn config_file() -> anyhow::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            "\
api_url: http://localhost:3000/api/trpc/blobs.getBlobs
fetch_interval_secs: 15
"
        )?;
        Ok(file)
    }

    #[test]
    fn command_line_overrides_the_config_file() -> anyhow::Result<()> {
        let file = config_file()?;
        let args = Args::try_parse_from([
            OsStr::new("blob-scraper"),
            OsStr::new("--config"),
            file.path().as_os_str(),
            OsStr::new("--fetch-interval"),
            OsStr::new("5"),
        ])?;

        let config = load_config(&args)?;

        assert_eq!(
            config.api_url.as_str(),
            "http://localhost:3000/api/trpc/blobs.getBlobs"
        );
        assert_eq!(config.fetch_interval, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn zero_fetch_interval_is_rejected() -> anyhow::Result<()> {
        let file = config_file()?;
        let args = Args::try_parse_from([
            OsStr::new("blob-scraper"),
            OsStr::new("--config"),
            file.path().as_os_str(),
            OsStr::new("--fetch-interval"),
            OsStr::new("0"),
        ])?;

        let error = load_config(&args).unwrap_err();

        assert_eq!(
            error.downcast_ref::<blob_scraper::ConfigError>(),
            Some(&blob_scraper::ConfigError::ZeroFetchInterval)
        );
        Ok(())
    }

    #[test]
    fn overrides_are_read_from_the_environment() {
        let command = Args::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(ToOwned::to_owned)
        };

        assert_eq!(env_of("api_url"), Some("API_URL".into()));
        assert_eq!(env_of("fetch_interval"), Some("FETCH_INTERVAL".into()));
    }
}
