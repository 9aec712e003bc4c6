//! The launcher page: a wallet header above the game iframe.
//!
//! The page script mirrors [`bonanza_types::reconcile`]: it treats the first
//! balance the game reports as a baseline and pushes every later delta into
//! the server wallet.

use bonanza_types::{
    reconcile::{
        BALANCE_UPDATE_EVENT, BALANCE_UPDATE_NAME, BROADCAST_INTERVAL, BROADCAST_TYPE,
        MINOR_UNITS_PER_MAJOR,
    },
    token,
};
use serde_json::Value;
use tracing::warn;

const PAGE_TEMPLATE: &str = include_str!("page.html");

/// Values substituted into the launcher page.
#[derive(Clone, Debug)]
pub struct LauncherPage<'a> {
    pub game_name: &'a str,
    pub game_id: u64,
    pub frame_src: &'a str,
    pub wallet_balance: f64,
}

impl LauncherPage<'_> {
    pub fn render(&self) -> String {
        let balance = if self.wallet_balance.is_finite() {
            self.wallet_balance
        } else {
            0.0
        };
        PAGE_TEMPLATE
            .replace("__GAME_NAME__", &escape_html(self.game_name))
            .replace("__GAME_ID__", &self.game_id.to_string())
            .replace("__FRAME_SRC__", &escape_html(self.frame_src))
            .replace("__BALANCE_UPDATE_NAME__", &js_string(BALANCE_UPDATE_NAME))
            .replace("__BALANCE_UPDATE_EVENT__", &js_string(BALANCE_UPDATE_EVENT))
            .replace("__BROADCAST_TYPE__", &js_string(BROADCAST_TYPE))
            .replace("__MINOR_UNITS_PER_MAJOR__", &MINOR_UNITS_PER_MAJOR.to_string())
            .replace(
                "__BROADCAST_INTERVAL_MS__",
                &BROADCAST_INTERVAL.as_millis().to_string(),
            )
            .replace("__WALLET_BALANCE__", &balance.to_string())
    }
}

/// Where the iframe points: the demo link itself, or its proxy path.
pub fn frame_src(demo_link: &str, proxied: bool) -> String {
    if !proxied {
        return demo_link.to_string();
    }
    match token::proxy_path(demo_link) {
        Ok(path) => path,
        Err(err) => {
            warn!(link = %demo_link, error = %err, "demo link is not a url; loading it directly");
            demo_link.to_string()
        }
    }
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

// JSON string literal that is also safe inside a <script> element.
pub(crate) fn js_string(value: &str) -> String {
    Value::String(value.to_string())
        .to_string()
        .replace('<', "\\u003c")
}
