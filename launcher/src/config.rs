use std::time::Duration;

pub const DEFAULT_INITIAL_BALANCE: f64 = 1000.0;
pub const DEFAULT_GAME_ID: u64 = 95426;
pub const DEFAULT_GAME_NAME: &str = "Sweet Bonanza 1000";
pub const DEFAULT_SITE_URL: &str = "https://melbet-tn.com";
pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_INJECT_SCRIPT: &str = "injectors/pragmatic.js";

/// Retry schedule for the demo-link lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Timeout applied to each attempt on its own.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(750),
            max_backoff: Duration::from_secs(12),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given zero-based failed attempt.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Clone, Debug)]
pub struct LauncherConfig {
    pub initial_balance: f64,
    pub game_id: u64,
    pub game_name: String,
    /// Casino site the demo link is requested from.
    pub site_url: String,
    pub lang: String,
    /// Off in `--direct` mode: no inject scripts, and the banner links to the plain page.
    pub use_proxy: bool,
    pub proxy_timeout: Duration,
    pub max_body_bytes: usize,
    pub retry: RetryPolicy,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            initial_balance: DEFAULT_INITIAL_BALANCE,
            game_id: DEFAULT_GAME_ID,
            game_name: DEFAULT_GAME_NAME.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            lang: DEFAULT_LANG.to_string(),
            use_proxy: true,
            proxy_timeout: DEFAULT_PROXY_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (0..6).map(|attempt| policy.backoff(attempt)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(750),
                Duration::from_millis(1500),
                Duration::from_millis(3000),
                Duration::from_millis(6000),
                Duration::from_secs(12),
                Duration::from_secs(12),
            ]
        );
        assert_eq!(policy.backoff(200), Duration::from_secs(12));
    }

    #[test]
    fn test_zero_backoff_stays_zero() {
        let policy = RetryPolicy {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(3), Duration::ZERO);
    }
}
