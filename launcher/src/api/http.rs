use axum::{
    body::Bytes,
    extract::{RawQuery, State as AxumState},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use bonanza_types::{token::PROXY_ROOT, BalanceResponse, SyncRequest, SyncResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::page::{self, LauncherPage};
use crate::proxy::ProxyRequest;
use crate::{Error, Launcher, Result};

/// Whether the launcher page should frame the game through the proxy.
///
/// Only the first `proxy` parameter counts.
fn proxy_flag(query: Option<&str>) -> bool {
    let Some(query) = query else {
        return false;
    };
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "proxy")
        .map(|(_, value)| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

async fn render_page(launcher: &Launcher, query: Option<&str>) -> Response {
    let link = match launcher.demo_link().await {
        Ok(link) => link,
        Err(err) => {
            warn!(error = %err, "cannot render launcher page");
            return err.into_response();
        }
    };
    let frame_src = page::frame_src(&link, proxy_flag(query));
    let html = LauncherPage {
        game_name: &launcher.config.game_name,
        game_id: launcher.config.game_id,
        frame_src: &frame_src,
        wallet_balance: launcher.wallet().get(),
    }
    .render();
    Html(html).into_response()
}

pub(super) async fn launcher_page(
    AxumState(launcher): AxumState<Arc<Launcher>>,
    RawQuery(query): RawQuery,
) -> Response {
    render_page(&launcher, query.as_deref()).await
}

pub(super) async fn balance(AxumState(launcher): AxumState<Arc<Launcher>>) -> Response {
    Json(BalanceResponse::new(launcher.wallet().get())).into_response()
}

fn parse_sync(body: &[u8]) -> Result<f64> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| Error::WalletSyncParseError(err.to_string()))?;
    if !value.is_object() {
        return Err(Error::WalletSyncParseError(
            "expected a JSON object".to_string(),
        ));
    }
    let request: SyncRequest = serde_json::from_value(value)
        .map_err(|err| Error::WalletSyncParseError(err.to_string()))?;
    request.balance.to_finite().ok_or_else(|| {
        Error::WalletSyncParseError("balance must be a finite number".to_string())
    })
}

pub(super) async fn sync(
    AxumState(launcher): AxumState<Arc<Launcher>>,
    body: Bytes,
) -> Response {
    match parse_sync(&body) {
        Ok(requested) => {
            let balance = launcher.wallet().set(requested);
            info!(requested, balance, "wallet synced");
            Json(SyncResponse::ok(balance)).into_response()
        }
        Err(err) => {
            warn!(error = %err, "rejected wallet sync");
            err.into_response()
        }
    }
}

pub(super) async fn proxy(
    AxumState(launcher): AxumState<Arc<Launcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = ProxyRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };
    match launcher.dispatcher().handle(request).await {
        Ok(response) => response.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn fallback(
    state: AxumState<Arc<Launcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path();
    if path.starts_with(PROXY_ROOT) {
        return proxy(state, method, uri, headers, body).await;
    }
    if method == Method::GET || method == Method::HEAD {
        if path.starts_with("/game") {
            return render_page(&state.0, uri.query()).await;
        }
        return (StatusCode::NOT_FOUND, Html("<h1>Not Found</h1>")).into_response();
    }
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}
