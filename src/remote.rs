//! Remote fetch protocol.
//!
//! [`fetch`] requests a preferences document over HTTP and parses it into a
//! Remote [`Source`]. The caller drives retries through [`FetchHooks`]: the
//! engine only supplies the transport, the parse step and the loop.
//!
//! ```text
//! Idle -> Requesting -> Succeeded
//!             |  ^
//!             v  |
//!           Retrying -> Failed
//! ```
//!
//! The only suspension points are the HTTP request and the backoff sleep.
//! There is no cancellation primitive: a caller that wants to stop returns
//! [`RetryDecision::stop`] from [`FetchHooks::on_retry`].

use crate::config::RemoteSettings;
use crate::error::{PrefsError, PrefsResult};
use crate::source::{Source, SourceKind};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch state, as reported to [`FetchHooks::on_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Requesting,
    Retrying,
    Succeeded,
    Failed,
}

impl std::fmt::Display for FetchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchState::Idle => write!(f, "idle"),
            FetchState::Requesting => write!(f, "requesting"),
            FetchState::Retrying => write!(f, "retrying"),
            FetchState::Succeeded => write!(f, "succeeded"),
            FetchState::Failed => write!(f, "failed"),
        }
    }
}

/// Per-attempt request parameters, adjustable in [`FetchHooks::on_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
        }
    }
}

/// Answer of [`FetchHooks::on_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Option<Duration>,
}

impl RetryDecision {
    pub fn stop() -> Self {
        Self {
            retry: false,
            delay: None,
        }
    }

    pub fn now() -> Self {
        Self {
            retry: true,
            delay: None,
        }
    }

    pub fn after(delay: Duration) -> Self {
        Self {
            retry: true,
            delay: Some(delay),
        }
    }
}

/// Lifecycle callbacks of a fetch. Every method has a no-op default; the
/// default `on_retry` declines.
pub trait FetchHooks {
    /// Called once, before the first request.
    fn on_started(&mut self, _uri: &str) {}

    /// Called before every request.
    fn on_request(&mut self, _attempt: u32, _options: &mut RequestOptions) {}

    /// Called after a failed attempt. `attempt` starts at 1.
    fn on_retry(&mut self, _attempt: u32, _error: &PrefsError) -> RetryDecision {
        RetryDecision::stop()
    }

    fn on_succeeded(&mut self, _source: &Source) {}

    fn on_failed(&mut self, _error: &PrefsError) {}

    fn on_transition(&mut self, _from: FetchState, _to: FetchState) {}
}

/// Hooks that never retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl FetchHooks for NoRetry {}

/// Bounded retries with exponential backoff.
///
/// The delay before attempt `n + 1` is `base_delay * 2^(n - 1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RemoteSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.backoff_ms),
            max_delay: Duration::from_millis(settings.max_backoff_ms),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    /// Backoff after failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl FetchHooks for RetryPolicy {
    fn on_request(&mut self, _attempt: u32, options: &mut RequestOptions) {
        options.timeout = self.timeout;
    }

    fn on_retry(&mut self, attempt: u32, _error: &PrefsError) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::stop();
        }
        RetryDecision::after(self.delay_for(attempt))
    }
}

/// Fetch `uri` into `source`.
///
/// An empty URI fails before any hook fires. Otherwise the loop runs until
/// a response parses (`on_succeeded`, `Ok`) or `on_retry` declines
/// (`on_failed`, `Err` with the last error). Parse failures carry
/// [`ErrorCode::ParseError`](crate::error::ErrorCode::ParseError) and are
/// retried like transport failures.
pub async fn fetch<H>(
    source: &mut Source,
    uri: &str,
    client: &reqwest::Client,
    hooks: &mut H,
) -> PrefsResult<()>
where
    H: FetchHooks + ?Sized,
{
    if uri.trim().is_empty() {
        return Err(PrefsError::missing_location("remote fetch"));
    }
    if source.kind() != SourceKind::Remote {
        warn!(kind = %source.kind(), "Fetching remote preferences into a non-remote source");
    }

    let mut state = FetchState::Idle;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if attempt == 1 {
            hooks.on_started(uri);
        }
        transition(hooks, &mut state, FetchState::Requesting);

        let mut options = RequestOptions::default();
        hooks.on_request(attempt, &mut options);
        debug!(uri = %uri, attempt, timeout_ms = options.timeout.as_millis() as u64, "Requesting remote preferences");

        let error = match request(client, uri, &options).await {
            Ok(body) => {
                source.set_location(uri);
                if source.parse(&body) {
                    transition(hooks, &mut state, FetchState::Succeeded);
                    info!(uri = %uri, attempt, keys = source.document().len(), "Fetched remote preferences");
                    hooks.on_succeeded(source);
                    return Ok(());
                }
                PrefsError::parse(uri, source.error_message().unwrap_or("unknown error"))
            }
            Err(err) => err,
        };

        warn!(uri = %uri, attempt, error = %error, "Remote fetch attempt failed");
        let decision = hooks.on_retry(attempt, &error);
        if !decision.retry {
            transition(hooks, &mut state, FetchState::Failed);
            hooks.on_failed(&error);
            return Err(error);
        }

        transition(hooks, &mut state, FetchState::Retrying);
        if let Some(delay) = decision.delay
            && !delay.is_zero()
        {
            tokio::time::sleep(delay).await;
        }
    }
}

fn transition<H: FetchHooks + ?Sized>(hooks: &mut H, state: &mut FetchState, next: FetchState) {
    let from = std::mem::replace(state, next);
    hooks.on_transition(from, next);
}

async fn request(client: &reqwest::Client, uri: &str, options: &RequestOptions) -> PrefsResult<String> {
    let mut builder = client.get(uri).timeout(options.timeout);
    for (name, value) in &options.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder
        .send()
        .await
        .map_err(|e| PrefsError::transport(uri, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(PrefsError::http_status(uri, status.as_u16()));
    }
    response
        .text()
        .await
        .map_err(|e| PrefsError::transport(uri, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[derive(Default)]
    struct Counting {
        started: u32,
        failed: u32,
    }

    impl FetchHooks for Counting {
        fn on_started(&mut self, _uri: &str) {
            self.started += 1;
        }

        fn on_failed(&mut self, _error: &PrefsError) {
            self.failed += 1;
        }
    }

    #[tokio::test]
    async fn test_empty_uri_fires_no_hooks() {
        let mut source = Source::new(SourceKind::Remote, "");
        let mut hooks = Counting::default();
        let client = reqwest::Client::new();

        let err = fetch(&mut source, "  ", &client, &mut hooks).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingLocation);
        assert_eq!(hooks.started, 0);
        assert_eq!(hooks.failed, 0);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            timeout: DEFAULT_TIMEOUT,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_policy_stops_at_max_attempts() {
        let mut policy = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        };
        let err = PrefsError::transport("http://x", "refused");
        assert!(policy.on_retry(1, &err).retry);
        assert!(!policy.on_retry(2, &err).retry);
    }

    #[test]
    fn test_policy_from_settings() {
        let settings = RemoteSettings {
            max_attempts: 0,
            ..RemoteSettings::default()
        };
        let policy = RetryPolicy::from_settings(&settings);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.timeout, Duration::from_secs(settings.timeout_secs));

        let mut options = RequestOptions::default();
        let mut policy = policy;
        policy.timeout = Duration::from_secs(3);
        policy.on_request(1, &mut options);
        assert_eq!(options.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_default_hooks_decline() {
        let err = PrefsError::transport("http://x", "refused");
        assert_eq!(NoRetry.on_retry(1, &err), RetryDecision::stop());
    }
}
