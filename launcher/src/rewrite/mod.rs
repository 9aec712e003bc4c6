//! Keeps proxied pages talking to the local origin.
//!
//! HTML and CSS bodies have their URL references moved under the proxy
//! prefix; everything else passes through untouched.

use crate::InjectionBundle;
use bonanza_types::token::{self, API_ROOT, PROXY_ROOT};
use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use std::sync::OnceLock;

pub mod css;
pub mod html;
pub mod shim;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
pub const CSS_CONTENT_TYPE: &str = "text/css; charset=utf-8";

/// URL schemes (and fragments) that never name a fetchable resource.
const INERT_PREFIXES: [&str; 5] = ["data:", "blob:", "mailto:", "javascript:", "#"];

/// The proxied origin a body belongs to.
#[derive(Clone, Debug)]
pub struct RewriteContext {
    origin: String,
    authority: Option<String>,
    prefix: String,
}

impl RewriteContext {
    pub fn new(token: &str, origin: &str) -> Self {
        let origin = origin.trim_end_matches('/').to_string();
        let authority = origin
            .split_once("://")
            .map(|(_, rest)| rest.split('/').next().unwrap_or(rest).to_string())
            .filter(|authority| !authority.is_empty());
        Self {
            prefix: token::proxy_prefix(token),
            origin,
            authority,
        }
    }

    /// Upstream origin, without a trailing slash.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// `/p/<token>`, without a trailing slash.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Route a single URL reference through the proxy.
    ///
    /// Absolute and protocol-relative references to the upstream origin, and
    /// root-relative paths, gain the prefix. Paths already under the proxy or
    /// API roots, relative paths and other origins are left alone.
    pub fn rewrite_url(&self, value: &str) -> String {
        let url = value.trim();
        if url.is_empty() || is_inert(url) {
            return url.to_string();
        }
        if let Some(rest) = url
            .strip_prefix(self.origin.as_str())
            .filter(|rest| rest.starts_with('/'))
        {
            return format!("{}{rest}", self.prefix);
        }
        if let Some(authority) = &self.authority {
            if let Some(rest) = url
                .strip_prefix("//")
                .and_then(|url| url.strip_prefix(authority.as_str()))
                .filter(|rest| rest.starts_with('/'))
            {
                return format!("{}{rest}", self.prefix);
            }
        }
        if is_root_relative(url) {
            return format!("{}{url}", self.prefix);
        }
        url.to_string()
    }
}

fn is_inert(url: &str) -> bool {
    INERT_PREFIXES.iter().any(|prefix| {
        url.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// `/path` that is neither protocol-relative nor already proxied.
pub(crate) fn is_root_relative(url: &str) -> bool {
    url.starts_with('/')
        && !url.starts_with("//")
        && !url.starts_with(PROXY_ROOT)
        && !url.starts_with(API_ROOT)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Other,
}

impl ContentKind {
    pub fn from_content_type(content_type: &str) -> Self {
        let lower = content_type.to_ascii_lowercase();
        if lower.contains("text/html") || lower.contains("application/xhtml+xml") {
            Self::Html
        } else if lower.contains("text/css") {
            Self::Css
        } else {
            Self::Other
        }
    }
}

/// The `charset=` label of a content type, if any.
pub fn charset(content_type: &str) -> Option<&str> {
    charset_regex()
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|label| label.as_str())
}

fn charset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)charset=([A-Za-z0-9_\-]+)").expect("charset regex"))
}

/// Decode a body with its declared charset, falling back to UTF-8.
///
/// Undecodable bytes become U+FFFD rather than failing the request.
pub fn decode_body(body: &[u8], content_type: &str) -> String {
    let encoding = charset(content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

/// A rewritten body, always UTF-8.
#[derive(Debug)]
pub struct Rewritten {
    pub kind: ContentKind,
    pub body: String,
}

impl Rewritten {
    pub fn content_type(&self) -> &'static str {
        match self.kind {
            ContentKind::Css => CSS_CONTENT_TYPE,
            _ => HTML_CONTENT_TYPE,
        }
    }
}

/// Rewrite a response body if its content type calls for it.
pub fn rewrite_body(
    body: &[u8],
    content_type: &str,
    context: &RewriteContext,
    bundle: &InjectionBundle,
) -> Option<Rewritten> {
    let kind = ContentKind::from_content_type(content_type);
    let body = match kind {
        ContentKind::Html => html::rewrite(&decode_body(body, content_type), context, bundle),
        ContentKind::Css => css::rewrite(&decode_body(body, content_type), context),
        ContentKind::Other => return None,
    };
    Some(Rewritten { kind, body })
}
