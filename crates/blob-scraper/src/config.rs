// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Configuration of the blob scraper.

use std::{net::SocketAddr, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use url::Url;

use crate::gauges::GaugeField;

/// Configuration of the blob scraper.
#[serde_as]
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScraperConfig {
    /// The blob explorer endpoint returning the list of blobs.
    pub api_url: Url,
    /// The time between two polls of the API.
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "fetch_interval_secs")]
    pub fetch_interval: Duration,
    /// The time after which a request to the API is abandoned.
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "request_timeout_secs")]
    pub request_timeout: Duration,
    /// Socket address on which the Prometheus metrics are served.
    pub metrics_address: SocketAddr,
    /// The record fields exported as gauges.
    pub gauges: Vec<GaugeField>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::api_url(),
            fetch_interval: defaults::fetch_interval(),
            request_timeout: defaults::request_timeout(),
            metrics_address: defaults::metrics_address(),
            gauges: GaugeField::DEFAULT_SET.to_vec(),
        }
    }
}

impl ScraperConfig {
    /// Loads the configuration from a YAML file, using defaults for absent entries.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        scraper_utils::load_from_yaml(path)
    }

    /// Checks that the configuration can be used to run the scraper.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_interval.is_zero() {
            return Err(ConfigError::ZeroFetchInterval);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        if self.gauges.is_empty() {
            return Err(ConfigError::NoGauges);
        }
        Ok(())
    }
}

/// Errors returned by [`ScraperConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The fetch interval is zero.
    #[error("the fetch interval must be at least one second")]
    ZeroFetchInterval,
    /// The request timeout is zero.
    #[error("the request timeout must be at least one second")]
    ZeroRequestTimeout,
    /// No gauge is configured.
    #[error("at least one gauge must be configured")]
    NoGauges,
}

/// Values taken from the environment or the command line, which take precedence over the
/// configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Overrides [`ScraperConfig::api_url`].
    pub api_url: Option<Url>,
    /// Overrides [`ScraperConfig::fetch_interval`].
    pub fetch_interval: Option<Duration>,
    /// Overrides [`ScraperConfig::metrics_address`].
    pub metrics_address: Option<SocketAddr>,
}

impl ConfigOverrides {
    /// Replaces the values of `config` that are set on `self`.
    pub fn apply(self, mut config: ScraperConfig) -> ScraperConfig {
        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }
        if let Some(fetch_interval) = self.fetch_interval {
            config.fetch_interval = fetch_interval;
        }
        if let Some(metrics_address) = self.metrics_address {
            config.metrics_address = metrics_address;
        }
        config
    }
}

/// Default values for the scraper configuration.
pub mod defaults {
    use std::{
        net::{Ipv4Addr, SocketAddr},
        time::Duration,
    };

    use url::Url;

    /// The default blob explorer endpoint.
    pub const API_URL: &str = "https://blobs-goerli.eigenda.xyz/api/trpc/blobs.getBlobs";
    /// The default port of the metrics server.
    pub const METRICS_PORT: u16 = 9600;

    /// Returns [`API_URL`].
    pub fn api_url() -> Url {
        Url::parse(API_URL).expect("the default api url is valid")
    }

    /// Polls the API every minute.
    pub fn fetch_interval() -> Duration {
        Duration::from_secs(60)
    }

    /// Abandons requests after 30 seconds.
    pub fn request_timeout() -> Duration {
        Duration::from_secs(30)
    }

    /// Serves metrics on all interfaces at [`METRICS_PORT`].
    pub fn metrics_address() -> SocketAddr {
        (Ipv4Addr::UNSPECIFIED, METRICS_PORT).into()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() -> anyhow::Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        std::fs::write(file.path(), "{}")?;

        assert_eq!(ScraperConfig::load(file.path())?, ScraperConfig::default());
        Ok(())
    }

    #[test]
    fn loads_all_entries() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            "\
api_url: http://localhost:3000/api/trpc/blobs.getBlobs
fetch_interval_secs: 15
request_timeout_secs: 5
metrics_address: 127.0.0.1:9700
gauges:
  - batch_id
  - time_difference_hours
"
        )?;

        let config = ScraperConfig::load(file.path())?;

        assert_eq!(
            config,
            ScraperConfig {
                api_url: Url::parse("http://localhost:3000/api/trpc/blobs.getBlobs")?,
                fetch_interval: Duration::from_secs(15),
                request_timeout: Duration::from_secs(5),
                metrics_address: "127.0.0.1:9700".parse()?,
                gauges: vec![GaugeField::BatchId, GaugeField::TimeDifferenceHours],
            }
        );
        config.validate()?;
        Ok(())
    }

    #[test]
    fn default_config_is_valid() {
        let config = ScraperConfig::default();
        assert_eq!(config.api_url.as_str(), defaults::API_URL);
        assert_eq!(config.metrics_address.port(), 9600);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_unusable_values() {
        let config = ScraperConfig {
            fetch_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroFetchInterval));

        let config = ScraperConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroRequestTimeout));

        let config = ScraperConfig {
            gauges: vec![],
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoGauges));
    }

    #[test]
    fn overrides_take_precedence() -> anyhow::Result<()> {
        let overrides = ConfigOverrides {
            api_url: Some(Url::parse("http://127.0.0.1:8080/blobs")?),
            fetch_interval: Some(Duration::from_secs(5)),
            metrics_address: None,
        };

        let config = overrides.apply(ScraperConfig::default());

        assert_eq!(config.api_url.as_str(), "http://127.0.0.1:8080/blobs");
        assert_eq!(config.fetch_interval, Duration::from_secs(5));
        assert_eq!(config.metrics_address, defaults::metrics_address());
        Ok(())
    }
}
