//! Dispatches `/p/<token>/<path>` requests to their upstream origin.

use crate::{
    headers::{client_response_headers, upstream_request_headers},
    rewrite::{rewrite_body, RewriteContext},
    upstream::{Upstream, UpstreamRequest},
    Error, InjectionBundle, Result,
};
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bonanza_types::token::{self, PROXY_ROOT};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// An inbound request under the proxy root.
#[derive(Clone, Debug)]
pub struct ProxyRequest {
    pub method: Method,
    /// Raw request path, starting with `/p/`.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Split a proxy path into its token and the upstream path after it.
///
/// The remainder has no leading slash and may be empty.
pub fn parse_path(path: &str) -> Result<(&str, &str)> {
    let rest = path
        .strip_prefix(PROXY_ROOT)
        .ok_or_else(|| Error::BadProxyRequest(format!("not a proxy path: {path}")))?;
    let (token, remainder) = rest.split_once('/').unwrap_or((rest, ""));
    if token.is_empty() {
        return Err(Error::BadProxyRequest(format!("missing origin token: {path}")));
    }
    Ok((token, remainder))
}

/// Upstream URL for a decoded origin, a path remainder and an optional query.
pub fn upstream_url(origin: &str, remainder: &str, query: Option<&str>) -> String {
    let mut url = format!("{}/{remainder}", origin.trim_end_matches('/'));
    if let Some(query) = query.filter(|query| !query.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

pub struct Dispatcher {
    upstream: Arc<dyn Upstream>,
    bundle: InjectionBundle,
}

impl Dispatcher {
    pub fn new(upstream: Arc<dyn Upstream>, bundle: InjectionBundle) -> Self {
        Self { upstream, bundle }
    }

    /// Forward one request upstream and shape the reply for the browser.
    ///
    /// A token that does not decode is rejected before anything is sent.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        let (token, remainder) = parse_path(&request.path)?;
        let origin = token::decode(token)?;
        let url = upstream_url(&origin, remainder, request.query.as_deref());

        let forward_body = request.method != Method::GET && request.method != Method::HEAD;
        let outbound = UpstreamRequest {
            method: request.method.clone(),
            url: url.clone(),
            headers: upstream_request_headers(&request.headers, &origin),
            body: forward_body.then_some(request.body),
        };
        let response = match self.upstream.send(outbound).await {
            Ok(response) => response,
            Err(err) => {
                warn!(method = %request.method, url = %url, error = %err, "upstream request failed");
                return Err(err);
            }
        };

        let mut headers = client_response_headers(&response.headers, &url);
        let content_type = response
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let context = RewriteContext::new(token, &origin);
        let body = match rewrite_body(&response.body, content_type, &context, &self.bundle) {
            Some(rewritten) => {
                debug!(
                    url = %url,
                    kind = ?rewritten.kind,
                    upstream_bytes = response.body.len(),
                    rewritten_bytes = rewritten.body.len(),
                    "rewrote body"
                );
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(rewritten.content_type()),
                );
                Bytes::from(rewritten.body)
            }
            None => response.body,
        };
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

        Ok(ProxyResponse {
            status: response.status,
            headers,
            body: if request.method == Method::HEAD {
                Bytes::new()
            } else {
                body
            },
        })
    }
}
