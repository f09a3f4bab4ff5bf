// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! The poll loop: fetch the blob list, refresh the gauges, wait for the next interval.

use std::time::Duration;

use scraper_utils::with_label;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    client::{BlobSource, FetchError},
    gauges::GaugeSet,
    metrics::{STATUS_FETCH_ERROR, STATUS_NO_DATA, STATUS_SUCCESS, ScraperMetrics},
    watermark::{self, UpdateError, Watermark, WatermarkUpdate},
};

/// Errors of a single poll. None of them stops the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The blob list could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The fetched payload could not be applied to the gauges.
    #[error(transparent)]
    Update(#[from] UpdateError),
}

impl PollError {
    fn status_label(&self) -> &'static str {
        match self {
            PollError::Fetch(_) => STATUS_FETCH_ERROR,
            PollError::Update(UpdateError::NoDataToProcess) => STATUS_NO_DATA,
        }
    }
}

/// Periodically refreshes a [`GaugeSet`] from a [`BlobSource`].
#[derive(Debug)]
pub struct BlobPoller<S> {
    source: S,
    gauges: GaugeSet,
    metrics: ScraperMetrics,
    interval: Duration,
    watermark: Watermark,
}

impl<S: BlobSource> BlobPoller<S> {
    /// Creates a poller starting from [`Watermark::ZERO`].
    pub fn new(source: S, gauges: GaugeSet, metrics: ScraperMetrics, interval: Duration) -> Self {
        Self {
            source,
            gauges,
            metrics,
            interval,
            watermark: Watermark::ZERO,
        }
    }

    /// The current watermark.
    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// The gauges refreshed by the poller.
    pub fn gauges(&self) -> &GaugeSet {
        &self.gauges
    }

    /// Fetches the blob list once and applies it to the gauges.
    ///
    /// The watermark is only replaced if the poll succeeds.
    pub async fn poll_once(&mut self) -> Result<WatermarkUpdate, PollError> {
        let result = self.fetch_and_update().await;

        match &result {
            Ok(update) => {
                self.watermark = update.watermark;
                self.metrics
                    .watermark
                    .set(i64::try_from(update.watermark.get()).unwrap_or(i64::MAX));
                self.metrics
                    .records_processed_total
                    .inc_by(update.processed as u64);
                self.metrics
                    .records_skipped_total
                    .inc_by(update.skipped as u64);
                with_label!(self.metrics.polls_total, STATUS_SUCCESS).inc();
            }
            Err(error) => with_label!(self.metrics.polls_total, error.status_label()).inc(),
        }

        result
    }

    async fn fetch_and_update(&self) -> Result<WatermarkUpdate, PollError> {
        let timer = self.metrics.fetch_duration_seconds.start_timer();
        let payload = self.source.fetch().await;
        timer.observe_duration();

        Ok(watermark::update(&self.gauges, &payload?, self.watermark)?)
    }

    /// Polls at every interval, starting immediately, until `cancel` is triggered.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(interval = ?self.interval, "starting the blob poll loop");
        self.metrics.up.set(1);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.poll_once() => result,
            };

            match result {
                Ok(update) => tracing::info!(
                    watermark = %update.watermark,
                    processed = update.processed,
                    skipped = update.skipped,
                    "metrics updated"
                ),
                Err(PollError::Update(UpdateError::NoDataToProcess)) => {
                    tracing::info!(watermark = %self.watermark, "no blob records to process")
                }
                Err(error) => tracing::warn!(
                    ?error,
                    watermark = %self.watermark,
                    "error fetching data or updating metrics"
                ),
            }
        }

        self.metrics.up.set(0);
        tracing::info!("received cancellation request, stopped the blob poll loop");
    }
}
