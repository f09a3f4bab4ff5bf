// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! The set of gauges mirroring the fields of the latest processed blob record.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use prometheus::Gauge;
use scraper_utils::metrics::{RegistrationError, Registry};
use serde::{Deserialize, Serialize};

use crate::record::BlobRecord;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// A value exported as a gauge for each processed blob record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeField {
    /// The blob's position within its batch.
    BlobIndex,
    /// The chain height referenced by the blob.
    ReferenceBlockNumber,
    /// The batch the blob belongs to.
    BatchId,
    /// The chain height at which the blob's batch was confirmed.
    ConfirmationBlockNumber,
    /// The submission timestamp of the blob.
    RequestedAt,
    /// Hours elapsed between the blob's submission and its processing.
    TimeDifferenceHours,
}

impl GaugeField {
    /// The fields exported when none are configured.
    pub const DEFAULT_SET: [GaugeField; 5] = [
        GaugeField::BlobIndex,
        GaugeField::ReferenceBlockNumber,
        GaugeField::BatchId,
        GaugeField::ConfirmationBlockNumber,
        GaugeField::RequestedAt,
    ];

    /// The name of the Prometheus metric for this field.
    pub fn metric_name(self) -> &'static str {
        match self {
            GaugeField::BlobIndex => "blob_index",
            GaugeField::ReferenceBlockNumber => "reference_block_number",
            GaugeField::BatchId => "batch_id",
            GaugeField::ConfirmationBlockNumber => "confirmation_block_number",
            GaugeField::RequestedAt => "requested_at",
            GaugeField::TimeDifferenceHours => "time_difference_hours",
        }
    }

    /// The help text of the Prometheus metric for this field.
    pub fn help(self) -> &'static str {
        match self {
            GaugeField::BlobIndex => "Index of the blob",
            GaugeField::ReferenceBlockNumber => "Reference block number",
            GaugeField::BatchId => "Batch ID",
            GaugeField::ConfirmationBlockNumber => "Confirmation block number",
            GaugeField::RequestedAt => "Time when the blob was requested",
            GaugeField::TimeDifferenceHours => "Hours between the blob request and its processing",
        }
    }

    /// Projects `record` onto this field, `now` being the time of processing.
    pub fn value(self, record: &BlobRecord, now: DateTime<Utc>) -> f64 {
        match self {
            GaugeField::BlobIndex => record.blob_index as f64,
            GaugeField::ReferenceBlockNumber => record.reference_block_number as f64,
            GaugeField::BatchId => record.batch_id as f64,
            GaugeField::ConfirmationBlockNumber => record.confirmation_block_number as f64,
            GaugeField::RequestedAt => record.requested_at as f64,
            GaugeField::TimeDifferenceHours => {
                (now.timestamp() as f64 - record.requested_at as f64) / SECONDS_PER_HOUR
            }
        }
    }
}

impl fmt::Display for GaugeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric_name())
    }
}

/// One gauge per configured [`GaugeField`], holding the value of the last record written.
#[derive(Debug, Clone)]
pub struct GaugeSet {
    gauges: BTreeMap<GaugeField, Gauge>,
}

impl GaugeSet {
    /// Creates the gauges for `fields` and registers them on `registry`.
    ///
    /// Fields listed more than once share a single gauge. Gauges already present on the registry
    /// are reused.
    pub fn new(
        registry: &Registry,
        fields: impl IntoIterator<Item = GaugeField>,
    ) -> Result<Self, RegistrationError> {
        let mut gauges = BTreeMap::new();
        for field in fields {
            if gauges.contains_key(&field) {
                continue;
            }
            let gauge = Gauge::new(field.metric_name(), field.help())
                .map_err(RegistrationError::Prometheus)?;
            gauges.insert(field, registry.get_or_register(gauge)?);
        }
        Ok(Self { gauges })
    }

    /// Writes every configured field of `record` into its gauge.
    pub fn observe(&self, record: &BlobRecord, now: DateTime<Utc>) {
        for (field, gauge) in &self.gauges {
            gauge.set(field.value(record, now));
        }
    }

    /// The current value of the gauge for `field`, if it is configured.
    pub fn get(&self, field: GaugeField) -> Option<f64> {
        self.gauges.get(&field).map(Gauge::get)
    }

    /// The configured fields, in a stable order.
    pub fn fields(&self) -> impl Iterator<Item = GaugeField> + '_ {
        self.gauges.keys().copied()
    }

    /// The number of gauges in the set.
    pub fn len(&self) -> usize {
        self.gauges.len()
    }

    /// Returns true if no gauge is configured.
    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }
}
