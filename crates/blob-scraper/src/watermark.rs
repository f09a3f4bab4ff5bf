// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Incremental refresh of the gauge set from a payload of blob records.
//!
//! The watermark is the largest `requested_at` timestamp seen in the last successfully processed
//! payload. Only records strictly newer than the watermark are written to the gauges, in
//! ascending order of `requested_at`, so the gauges end up holding the newest record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    gauges::GaugeSet,
    record::{BlobRecord, extract_records},
};

/// The `requested_at` timestamp up to which records have been processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(u64);

impl Watermark {
    /// The watermark before any record has been processed.
    pub const ZERO: Self = Self(0);

    /// Creates a watermark at the given Unix timestamp.
    pub const fn new(requested_at: u64) -> Self {
        Self(requested_at)
    }

    /// The Unix timestamp of the watermark.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns true if `record` was not covered by this watermark.
    fn admits(self, record: &BlobRecord) -> bool {
        record.requested_at > self.0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Errors returned by [`update`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    /// The payload does not contain any blob record.
    #[error("no data to process")]
    NoDataToProcess,
}

/// The outcome of a successful [`update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkUpdate {
    /// The watermark to use for the next update.
    pub watermark: Watermark,
    /// The number of records written to the gauges.
    pub processed: usize,
    /// The number of records at or below the previous watermark.
    pub skipped: usize,
}

/// Writes the records of `payload` newer than `watermark` to `gauges`.
///
/// See [`update_at`].
pub fn update(
    gauges: &GaugeSet,
    payload: &Value,
    watermark: Watermark,
) -> Result<WatermarkUpdate, UpdateError> {
    update_at(gauges, payload, watermark, Utc::now())
}

/// Writes the records of `payload` newer than `watermark` to `gauges`, using `now` for values
/// derived from the time of processing.
///
/// Records are visited in ascending `requested_at` order, ties keeping their order in the
/// payload. The returned watermark is the largest `requested_at` in the payload, whether or not
/// that record was newly processed; it may therefore be lower than `watermark`.
///
/// Fails with [`UpdateError::NoDataToProcess`], leaving the gauges untouched, if the payload has
/// no records.
pub fn update_at(
    gauges: &GaugeSet,
    payload: &Value,
    watermark: Watermark,
    now: DateTime<Utc>,
) -> Result<WatermarkUpdate, UpdateError> {
    let mut records = extract_records(payload);
    records.sort_by_key(|record| record.requested_at);

    let latest = records
        .last()
        .map(|record| Watermark(record.requested_at))
        .ok_or(UpdateError::NoDataToProcess)?;

    let mut processed = 0;
    for record in records.iter().filter(|record| watermark.admits(record)) {
        gauges.observe(record, now);
        processed += 1;
    }
    let skipped = records.len() - processed;

    if latest < watermark {
        tracing::warn!(
            previous = %watermark,
            latest = %latest,
            "latest record in the payload is older than the watermark, moving the watermark back"
        );
    }
    tracing::debug!(
        %latest,
        processed,
        skipped,
        "processed blob records"
    );

    Ok(WatermarkUpdate {
        watermark: latest,
        processed,
        skipped,
    })
}
