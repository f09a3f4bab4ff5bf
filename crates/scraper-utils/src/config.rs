// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;

/// Loads a configuration of type `T` from the YAML file at `path`.
pub fn load_from_yaml<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> anyhow::Result<T> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading configuration from yaml");

    let reader = std::fs::File::open(path)
        .with_context(|| format!("unable to open config file {}", path.display()))?;

    serde_yaml::from_reader(reader)
        .with_context(|| format!("unable to parse config file {}", path.display()))
}
