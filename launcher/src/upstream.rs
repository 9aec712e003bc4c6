//! Outbound HTTP to proxied origins.

use crate::{Error, Result};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::{cookie::Jar, redirect};
use std::{sync::Arc, time::Duration};

/// A fully resolved request to an upstream origin.
#[derive(Clone, Debug)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

#[derive(Clone, Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Anything that can carry a proxied request to its origin.
pub trait Upstream: Send + Sync {
    fn send(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse>>;
}

/// Upstream over reqwest with one cookie jar shared by all proxied traffic.
///
/// Redirects are handed back to the caller so their `Location` can be routed
/// through the proxy.
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::new(Jar::default()))
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(Error::Client)?;
        Ok(Self { client })
    }

    async fn execute(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|err| Error::BadProxyRequest(err.to_string()))?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(unavailable)?;
        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|err| Error::UpstreamUnavailable(err.to_string()))?;
        let mut headers = HeaderMap::with_capacity(response.headers().len());
        for (name, value) in response.headers() {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) else {
                continue;
            };
            headers.append(name, value);
        }
        let body = response.bytes().await.map_err(unavailable)?;
        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

impl Upstream for HttpUpstream {
    fn send(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse>> {
        Box::pin(self.execute(request))
    }
}

// reqwest's top-level message hides the cause ("error sending request"), so
// keep the whole chain for the 502 page.
fn unavailable(err: reqwest::Error) -> Error {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    Error::UpstreamUnavailable(message)
}
