// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Prometheus exporter for the blob records published by a data-availability blob explorer.
//!
//! A [`BlobPoller`] periodically fetches the list of recently submitted blobs from a
//! [`BlobSource`], writes every record newer than its [`Watermark`] into a [`GaugeSet`], and a
//! [`MetricsServer`] serves the resulting gauges to Prometheus.

pub mod client;
pub mod config;
pub mod gauges;
pub mod metrics;
pub mod poller;
pub mod record;
pub mod server;
pub mod watermark;

pub use client::{BlobSource, FetchError, HttpBlobSource};
pub use config::{ConfigError, ConfigOverrides, ScraperConfig};
pub use gauges::{GaugeField, GaugeSet};
pub use metrics::ScraperMetrics;
pub use poller::{BlobPoller, PollError};
pub use record::BlobRecord;
pub use server::MetricsServer;
pub use watermark::{UpdateError, Watermark, WatermarkUpdate};
