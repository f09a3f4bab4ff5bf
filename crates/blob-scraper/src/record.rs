// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Decoding of blob records from the blob explorer's tRPC response.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// JSON pointer to the record list within a `blobs.getBlobs` response.
pub const RECORDS_POINTER: &str = "/result/data/json/data";

/// A blob submission as reported by the blob explorer API.
///
/// Each field is zero if it is absent from the entry, `null`, or not a non-negative number (or a
/// string holding one). Integral parts of floating point values are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BlobRecord {
    /// Position of the blob within its batch.
    #[serde(deserialize_with = "lenient_u64")]
    pub blob_index: u64,
    /// Chain block height referenced by the blob.
    #[serde(deserialize_with = "lenient_u64")]
    pub reference_block_number: u64,
    /// Identifier of the batch the blob belongs to.
    #[serde(deserialize_with = "lenient_u64")]
    pub batch_id: u64,
    /// Chain block height at which the batch was confirmed.
    #[serde(deserialize_with = "lenient_u64")]
    pub confirmation_block_number: u64,
    /// Unix timestamp, in seconds, at which the blob was submitted.
    #[serde(deserialize_with = "lenient_u64")]
    pub requested_at: u64,
}

impl BlobRecord {
    /// Decodes a single entry of the record list.
    ///
    /// Returns `None` if the entry is not a JSON object.
    pub fn from_json(entry: &Value) -> Option<Self> {
        if !entry.is_object() {
            return None;
        }
        Self::deserialize(entry)
            .inspect_err(|error| tracing::debug!(?error, "unable to decode blob record"))
            .ok()
    }
}

/// Extracts the blob records from a response payload.
///
/// A payload without a record list at [`RECORDS_POINTER`], or with a node of the wrong type along
/// the way, yields no records. Entries that are not objects are dropped.
pub fn extract_records(payload: &Value) -> Vec<BlobRecord> {
    let Some(entries) = payload.pointer(RECORDS_POINTER).and_then(Value::as_array) else {
        tracing::debug!("payload does not contain a record list");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let record = BlobRecord::from_json(entry);
            if record.is_none() {
                tracing::debug!(%entry, "skipping malformed record entry");
            }
            record
        })
        .collect()
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(numeric_or_zero(&Value::deserialize(deserializer)?))
}

/// 2^64, the smallest float that does not fit in a `u64`.
const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn numeric_or_zero(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number.as_u64().unwrap_or_else(|| {
            number
                .as_f64()
                // Values beyond `u64::MAX` would saturate and pin the watermark.
                .filter(|float| float.is_finite() && *float >= 0.0 && *float < U64_LIMIT)
                .map_or(0, |float| float as u64)
        }),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
