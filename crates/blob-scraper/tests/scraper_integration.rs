// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Scrapes an in-process fake of the blob explorer API and reads the resulting metrics over HTTP.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use blob_scraper::{
    BlobPoller,
    FetchError,
    GaugeField,
    GaugeSet,
    HttpBlobSource,
    MetricsServer,
    PollError,
    ScraperMetrics,
    Watermark,
};
use scraper_utils::metrics::Registry;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url::Url;

const BLOBS_PATH: &str = "/api/trpc/blobs.getBlobs";

/// A blob explorer whose next response can be changed by the test.
#[derive(Debug, Clone)]
struct FakeApi {
    response: Arc<Mutex<(StatusCode, String)>>,
}

impl FakeApi {
    fn new() -> Self {
        Self {
            response: Arc::new(Mutex::new((StatusCode::OK, blobs(json!([])).to_string()))),
        }
    }

    fn respond(&self, status: StatusCode, body: impl Into<String>) {
        *self.response.lock().unwrap() = (status, body.into());
    }

    async fn start(&self) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new()
            .route(BLOBS_PATH, get(serve_blobs))
            .with_state(self.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        Url::parse(&format!("http://{address}{BLOBS_PATH}")).unwrap()
    }
}

async fn serve_blobs(State(api): State<FakeApi>) -> Response {
    let (status, body) = api.response.lock().unwrap().clone();
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn blobs(records: Value) -> Value {
    json!({ "result": { "data": { "json": { "data": records } } } })
}

fn poller(url: Url, registry: &Registry) -> BlobPoller<HttpBlobSource> {
    let source = HttpBlobSource::new(url, Duration::from_secs(5)).unwrap();
    let gauges = GaugeSet::new(registry, GaugeField::DEFAULT_SET).unwrap();
    let metrics = ScraperMetrics::new(registry);
    BlobPoller::new(source, gauges, metrics, Duration::from_secs(60))
}

async fn start_metrics_server(registry: Registry, cancel: CancellationToken) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(MetricsServer::new(registry).run(listener, cancel));
    Url::parse(&format!("http://{address}/metrics")).unwrap()
}

#[tokio::test]
async fn exports_the_newest_record_and_survives_api_failures() {
    let api = FakeApi::new();
    let url = api.start().await;
    let registry = Registry::default();
    let mut poller = poller(url, &registry);

    api.respond(
        StatusCode::OK,
        blobs(json!([
            { "requested_at": 200, "batch_id": 2, "blob_index": 5 },
            { "requested_at": 100, "batch_id": 1, "reference_block_number": 9 },
        ]))
        .to_string(),
    );
    let update = poller.poll_once().await.unwrap();
    assert_eq!(update.watermark, Watermark::new(200));
    assert_eq!(update.processed, 2);

    api.respond(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    let error = poller.poll_once().await.unwrap_err();
    assert!(
        matches!(
            &error,
            PollError::Fetch(FetchError::UnexpectedStatus { status, body })
                if *status == StatusCode::INTERNAL_SERVER_ERROR && body == "database unavailable"
        ),
        "unexpected error: {error:?}"
    );
    assert_eq!(poller.watermark(), Watermark::new(200));

    let cancel = CancellationToken::new();
    let metrics_url = start_metrics_server(registry, cancel.clone()).await;
    let response = reqwest::get(metrics_url).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();

    assert!(body.contains("batch_id 2"), "{body}");
    assert!(body.contains("blob_index 5"), "{body}");
    assert!(body.contains("reference_block_number 0"), "{body}");
    assert!(body.contains("requested_at 200"), "{body}");
    assert!(body.contains("blob_scraper_watermark 200"), "{body}");
    assert!(
        body.contains(r#"blob_scraper_polls_total{status="fetch_error"} 1"#),
        "{body}"
    );
    assert!(
        body.contains(r#"blob_scraper_polls_total{status="success"} 1"#),
        "{body}"
    );

    cancel.cancel();
}

#[tokio::test]
async fn invalid_json_is_a_decode_error() {
    let api = FakeApi::new();
    let url = api.start().await;
    let registry = Registry::default();
    let mut poller = poller(url, &registry);

    api.respond(StatusCode::OK, "<html>maintenance</html>");

    let error = poller.poll_once().await.unwrap_err();
    assert!(
        matches!(error, PollError::Fetch(FetchError::Decode(_))),
        "unexpected error: {error:?}"
    );
    assert_eq!(poller.watermark(), Watermark::ZERO);
}

#[tokio::test]
async fn unexpected_payload_shape_is_no_data() {
    let api = FakeApi::new();
    let url = api.start().await;
    let registry = Registry::default();
    let mut poller = poller(url, &registry);

    api.respond(StatusCode::OK, json!({ "result": { "data": [] } }).to_string());

    let error = poller.poll_once().await.unwrap_err();
    assert!(
        matches!(error, PollError::Update(_)),
        "unexpected error: {error:?}"
    );
}

#[tokio::test]
async fn metrics_are_served_on_any_path() {
    let registry = Registry::default();
    let _gauges = GaugeSet::new(&registry, [GaugeField::BatchId]).unwrap();
    let cancel = CancellationToken::new();
    let metrics_url = start_metrics_server(registry, cancel.clone()).await;

    let root = metrics_url.join("/").unwrap();
    let body = reqwest::get(root).await.unwrap().text().await.unwrap();

    assert!(body.contains("# TYPE batch_id gauge"), "{body}");
    cancel.cancel();
}
