//! Origin tokens and proxy paths.
//!
//! An upstream origin (`scheme://host[:port]`) is carried through the local
//! server as a single path segment: the unpadded base64url encoding of its
//! UTF-8 bytes. Everything for that origin lives under `/p/<token>`.

use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    Engine as _,
};
use thiserror::Error;
use url::Url;

/// Path root under which every proxied origin is mounted.
pub const PROXY_ROOT: &str = "/p/";

/// Path root of the local JSON endpoints; never routed upstream.
pub const API_ROOT: &str = "/api/";

// Tokens are emitted without padding but padded input is tolerated.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("token does not decode to UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encode an origin into a path-safe token.
pub fn encode(origin: &str) -> String {
    TOKEN_ENGINE.encode(origin.as_bytes())
}

/// Recover the origin from a token.
///
/// Only the encoding is checked; whether the result is a usable origin is
/// left to whoever connects to it.
pub fn decode(token: &str) -> Result<String, TokenError> {
    let bytes = TOKEN_ENGINE.decode(token.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

/// `/p/<token>`, without a trailing slash.
pub fn proxy_prefix(token: &str) -> String {
    format!("{}{token}", PROXY_ROOT)
}

/// `host[:port]` of a URL, with the port only when it is not the scheme default.
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// `scheme://host[:port]` of a URL.
pub fn origin_of(url: &Url) -> String {
    match authority(url) {
        Some(authority) => format!("{}://{authority}", url.scheme()),
        None => format!("{}://", url.scheme()),
    }
}

/// Local path that reaches `url` through the proxy.
pub fn proxy_path_for(url: &Url) -> String {
    let token = encode(&origin_of(url));
    let mut path = proxy_prefix(&token);
    let upstream_path = url.path();
    if !upstream_path.starts_with('/') {
        path.push('/');
    }
    path.push_str(upstream_path);
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    path
}

/// Parse an absolute upstream URL and return its proxied local path.
pub fn proxy_path(upstream_url: &str) -> Result<String, url::ParseError> {
    Ok(proxy_path_for(&Url::parse(upstream_url)?))
}
