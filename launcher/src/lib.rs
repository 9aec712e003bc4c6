use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bonanza_types::{SyncResponse, TokenError};
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;

mod api;
pub use api::Api;

pub mod config;
pub use config::{LauncherConfig, RetryPolicy};
pub mod demo;
use demo::{DemoLinkClient, DemoLinks};
pub mod headers;
pub mod inject;
pub use inject::InjectionBundle;
pub mod page;
pub mod proxy;
use proxy::Dispatcher;
pub mod rewrite;
pub mod upstream;
use upstream::{HttpUpstream, Upstream};
pub mod wallet;
use wallet::Wallet;

#[cfg(test)]
mod testing;

/// Errors produced while serving a request or assembling the launcher.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid proxy token: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("bad proxy request: {0}")]
    BadProxyRequest(String),
    #[error("{0}")]
    UpstreamUnavailable(String),
    #[error("failed to get demo link: {0}")]
    DemoLinkUnavailable(String),
    #[error("invalid wallet sync body: {0}")]
    WalletSyncParseError(String),
    #[error("inject script not found: {}", path.display())]
    InjectScriptMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidToken(_) | Error::BadProxyRequest(_) | Error::WalletSyncParseError(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Error::DemoLinkUnavailable(_)
            | Error::InjectScriptMissing { .. }
            | Error::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Error::WalletSyncParseError(reason) => {
                return (status, Json(SyncResponse::err(reason.clone()))).into_response();
            }
            Error::BadProxyRequest(_) => "<h1>Bad proxy request</h1>".to_string(),
            Error::InvalidToken(err) => format!(
                "<h1>Bad proxy token</h1><pre>{}</pre>",
                page::escape_html(&err.to_string())
            ),
            Error::UpstreamUnavailable(reason) => format!(
                "<h1>Upstream error</h1><pre>{}</pre>",
                page::escape_html(reason)
            ),
            Error::DemoLinkUnavailable(_) => format!(
                "<h1>Failed to get game URL</h1><pre>{}</pre>",
                page::escape_html(&self.to_string())
            ),
            Error::InjectScriptMissing { .. } | Error::Client(_) => format!(
                "<h1>Internal error</h1><pre>{}</pre>",
                page::escape_html(&self.to_string())
            ),
        };
        (
            status,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

/// Process-wide state shared by every request handler.
pub struct Launcher {
    pub config: LauncherConfig,
    wallet: Wallet,
    demo: DemoLinks,
    dispatcher: Dispatcher,
}

impl Launcher {
    /// Build a launcher that proxies through a real HTTP client.
    pub fn new(config: LauncherConfig, bundle: InjectionBundle) -> Result<Self> {
        let upstream = HttpUpstream::new(config.proxy_timeout)?;
        Ok(Self::with_upstream(config, bundle, Arc::new(upstream)))
    }

    /// Build a launcher around any [`Upstream`] implementation.
    pub fn with_upstream(
        config: LauncherConfig,
        bundle: InjectionBundle,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            wallet: Wallet::new(config.initial_balance),
            demo: DemoLinks::new(DemoLinkClient::new(&config)),
            dispatcher: Dispatcher::new(upstream, bundle),
            config,
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The playable demo URL, fetched on first use and cached for the process lifetime.
    pub async fn demo_link(&self) -> Result<String> {
        self.demo.get().await
    }
}
