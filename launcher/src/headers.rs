//! Which headers cross the proxy, in each direction.

use axum::http::{
    header::{self, HeaderName},
    HeaderMap, HeaderValue,
};
use bonanza_types::token;
use url::Url;

/// Request headers copied from the browser; everything else is dropped.
static FORWARDED_REQUEST_HEADERS: [HeaderName; 4] = [
    header::CONTENT_TYPE,
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
    header::USER_AGENT,
];

/// Response headers never passed back to the browser.
static STRIPPED_RESPONSE_HEADERS: [HeaderName; 8] = [
    header::CONTENT_SECURITY_POLICY,
    header::CONTENT_SECURITY_POLICY_REPORT_ONLY,
    header::X_FRAME_OPTIONS,
    header::STRICT_TRANSPORT_SECURITY,
    // Cookies stay in the server-side jar.
    header::SET_COOKIE,
    // Recomputed for the body actually sent.
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
];

/// Headers for the outbound request to `origin`.
///
/// The request presents itself as same-origin traffic and asks for an
/// uncompressed body so it can be rewritten.
pub fn upstream_request_headers(inbound: &HeaderMap, origin: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in FORWARDED_REQUEST_HEADERS.iter() {
        for value in inbound.get_all(name) {
            if !value.is_empty() {
                headers.append(name.clone(), value.clone());
            }
        }
    }
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let origin = origin.trim_end_matches('/');
    if let Ok(value) = HeaderValue::from_bytes(origin.as_bytes()) {
        headers.insert(header::ORIGIN, value);
    }
    if let Ok(value) = HeaderValue::from_bytes(format!("{origin}/").as_bytes()) {
        headers.insert(header::REFERER, value);
    }
    headers
}

/// Headers for the response to the browser, before the body is settled.
///
/// `Location` is routed back through the proxy relative to `upstream_url`.
pub fn client_response_headers(upstream: &HeaderMap, upstream_url: &str) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if STRIPPED_RESPONSE_HEADERS.contains(name) {
            continue;
        }
        if *name == header::LOCATION {
            let value = value
                .to_str()
                .ok()
                .and_then(|location| {
                    HeaderValue::from_str(&rewrite_location(location, upstream_url)).ok()
                })
                .unwrap_or_else(|| value.clone());
            headers.append(name.clone(), value);
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Map a redirect target onto the proxy, including cross-origin targets.
///
/// Targets that do not resolve to an http(s) URL are returned unchanged.
pub fn rewrite_location(location: &str, upstream_url: &str) -> String {
    let resolved = Url::parse(upstream_url).and_then(|base| base.join(location.trim()));
    match resolved {
        Ok(url) if matches!(url.scheme(), "http" | "https") => token::proxy_path_for(&url),
        _ => location.to_string(),
    }
}
