//! Shared helpers for the crate's tests.

use crate::{
    upstream::{Upstream, UpstreamRequest, UpstreamResponse},
    Result,
};
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    Router,
};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::sleep;

pub(crate) async fn serve_router(router: Router) -> (String, tokio::task::JoinHandle<()>) {
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let actual_addr = listener.local_addr().unwrap();
    let base_url = format!("http://{actual_addr}");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });

    sleep(Duration::from_millis(50)).await;
    (base_url, handle)
}

/// Replies with a canned response and remembers every request it saw.
#[derive(Clone)]
pub(crate) struct RecordingUpstream {
    response: UpstreamResponse,
    seen: Arc<Mutex<Vec<UpstreamRequest>>>,
}

impl RecordingUpstream {
    pub(crate) fn new(status: StatusCode, headers: &[(&str, &str)], body: &str) -> Self {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        Self {
            response: UpstreamResponse {
                status,
                headers: map,
                body: Bytes::copy_from_slice(body.as_bytes()),
            },
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn html(body: &str) -> Self {
        Self::new(StatusCode::OK, &[("content-type", "text/html")], body)
    }

    pub(crate) fn requests(&self) -> Vec<UpstreamRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Upstream for RecordingUpstream {
    fn send(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse>> {
        self.seen.lock().unwrap().push(request);
        let response = self.response.clone();
        Box::pin(async move { Ok(response) })
    }
}

/// Fails the test if anything reaches upstream.
pub(crate) struct PanicUpstream;

impl Upstream for PanicUpstream {
    fn send(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse>> {
        panic!("upstream must not be contacted, got {} {}", request.method, request.url);
    }
}
