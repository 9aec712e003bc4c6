//! Resolving the playable demo URL from the casino site.

use crate::{config::RetryPolicy, Error, LauncherConfig, Result};
use bonanza_types::token;
use reqwest::{
    cookie::Jar,
    header::{ACCEPT, ACCEPT_LANGUAGE, REFERER},
    Url,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::{sync::Mutex, time::sleep};
use tracing::{debug, info, warn};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";
const GAME_URL_PATH: &str = "/web-api/tpgamesopening/getgameurl";

/// Asks the casino site for a demo launch link.
///
/// Each lookup runs in its own cookie session, seeded by visiting the slots
/// lobby first; it shares nothing with the proxy's cookie jar.
#[derive(Clone, Debug)]
pub struct DemoLinkClient {
    site: String,
    lang: String,
    game_id: u64,
    launch_domain: String,
    retry: RetryPolicy,
}

impl DemoLinkClient {
    pub fn new(config: &LauncherConfig) -> Self {
        let site = config.site_url.trim_end_matches('/').to_string();
        let launch_domain = Url::parse(&site)
            .ok()
            .and_then(|url| token::authority(&url))
            .unwrap_or_default();
        Self {
            site,
            lang: config.lang.clone(),
            game_id: config.game_id,
            launch_domain: format!("{launch_domain}/"),
            retry: config.retry,
        }
    }

    pub fn slots_url(&self) -> String {
        format!("{}/{}/slots", self.site, self.lang)
    }

    pub fn api_url(&self) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}{GAME_URL_PATH}", self.site),
            &[
                ("demo", "true".to_string()),
                ("id", self.game_id.to_string()),
                ("withGameInfo", "true".to_string()),
                ("sectionId", "1".to_string()),
                ("launchDomain", self.launch_domain.clone()),
            ],
        )
        .map_err(|err| Error::DemoLinkUnavailable(format!("invalid site url {}: {err}", self.site)))
    }

    /// Fetch a fresh link, retrying per the configured policy.
    pub async fn fetch(&self) -> Result<String> {
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::new(Jar::default()))
            .user_agent(USER_AGENT)
            .timeout(self.retry.attempt_timeout)
            .build()
            .map_err(Error::Client)?;
        let api_url = self.api_url()?;
        self.warm_up(&client).await;

        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 0..attempts {
            match self.attempt(&client, api_url.clone()).await {
                Ok(link) => return Ok(link),
                Err(reason) => last_error = reason,
            }
            if attempt + 1 < attempts {
                let backoff = self.retry.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %last_error,
                    "demo link lookup failed; retrying"
                );
                sleep(backoff).await;
            }
        }
        Err(Error::DemoLinkUnavailable(last_error))
    }

    // Best effort: the lobby pages only seed session cookies.
    async fn warm_up(&self, client: &reqwest::Client) {
        let lobby = self.slots_url();
        let game = format!("{lobby}?game={}", self.game_id);
        for url in [lobby, game] {
            match client.get(&url).send().await {
                Ok(response) => {
                    let _ = response.bytes().await;
                }
                Err(err) => debug!(url = %url, error = %err, "warm-up request failed"),
            }
        }
    }

    async fn attempt(&self, client: &reqwest::Client, api_url: Url) -> std::result::Result<String, String> {
        let response = client
            .get(api_url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(
                ACCEPT_LANGUAGE,
                format!("{lang},{lang};q=0.9,en;q=0.8", lang = self.lang),
            )
            .header(REFERER, self.slots_url())
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .map_err(|err| err.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("unexpected status {status}"));
        }
        let body: Value = response.json().await.map_err(|err| err.to_string())?;
        body.get("link")
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
            .map(str::to_string)
            .ok_or_else(|| "demo link not found in response".to_string())
    }
}

/// Process-wide demo link cache.
///
/// The first successful lookup is kept for the life of the process. The lock
/// is held across the lookup, so concurrent page loads share one fetch.
pub struct DemoLinks {
    client: DemoLinkClient,
    cached: Mutex<Option<String>>,
}

impl DemoLinks {
    pub fn new(client: DemoLinkClient) -> Self {
        Self {
            client,
            cached: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(link) = cached.as_ref() {
            return Ok(link.clone());
        }
        let link = self.client.fetch().await?;
        info!(link = %link, "resolved demo link");
        *cached = Some(link.clone());
        Ok(link)
    }
}
