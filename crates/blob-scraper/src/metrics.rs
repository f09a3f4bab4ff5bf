// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Metrics describing the scraper itself.

use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge};
use scraper_utils::metrics::define_metric_set;

/// Label value of `polls_total` for polls that updated the watermark.
pub const STATUS_SUCCESS: &str = "success";
/// Label value of `polls_total` for polls whose fetch failed.
pub const STATUS_FETCH_ERROR: &str = "fetch_error";
/// Label value of `polls_total` for polls that returned no records.
pub const STATUS_NO_DATA: &str = "no_data";

define_metric_set! {
    #[namespace = "blob_scraper"]
    /// Metrics exported by the blob scraper about its poll loop.
    pub struct ScraperMetrics {
        #[help = "Whether the poll loop is running"]
        up: IntGauge[],
        #[help = "The requested_at timestamp up to which blob records have been processed"]
        watermark: IntGauge[],
        #[help = "The number of polls, by outcome"]
        polls_total: IntCounterVec["status"],
        #[help = "The number of blob records written to the gauges"]
        records_processed_total: IntCounter[],
        #[help = "The number of blob records skipped as already processed"]
        records_skipped_total: IntCounter[],
        #[help = "The time taken to fetch the list of blobs"]
        fetch_duration_seconds: Histogram{
            buckets: vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        },
    }
}
