// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for the blob scraper: configuration loading and a Prometheus registry that
//! tolerates repeated registrations.

#[cfg(feature = "config")]
mod config;
#[cfg(feature = "config")]
pub use config::load_from_yaml;

#[cfg(feature = "metrics")]
pub mod metrics;
