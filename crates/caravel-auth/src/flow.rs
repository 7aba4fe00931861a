//! Login flow orchestration
//!
//! Composes the callback server, authorization URL, and browser opener into
//! one awaitable flow: bind the listener, send the browser to the web UI,
//! then race the callback against the configured deadline and external
//! cancellation. Whatever the outcome, the listener is shut down and its
//! task joined before the flow returns.

use crate::auth_url::build_authorization_url;
use crate::browser::{SystemUrlOpener, UrlOpener};
use crate::callback_server::{CallbackServer, ServerHandle};
use caravel_types::{AuthError, AuthResult, Credentials};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time the user gets to finish authenticating in the browser
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Grace period for the callback server to finish in-flight responses
/// before its task is aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Hook invoked with the authorization URL before the browser opens
pub type BrowserOpenHook = Box<dyn Fn(&str) + Send + Sync>;

/// Hook invoked once the flow starts waiting for the callback
pub type WaitingHook = Box<dyn Fn() + Send + Sync>;

/// Configuration for one login flow. Immutable once the flow starts.
pub struct LoginOptions {
    api_origin: String,
    timeout: Duration,
    on_browser_open: Option<BrowserOpenHook>,
    on_waiting: Option<WaitingHook>,
    opener: Arc<dyn UrlOpener>,
}

impl LoginOptions {
    /// Options for authenticating against `api_origin`.
    ///
    /// Defaults: five-minute timeout, system browser opener, and hooks that
    /// log through `tracing`.
    pub fn new(api_origin: impl Into<String>) -> Self {
        Self {
            api_origin: api_origin.into(),
            timeout: DEFAULT_LOGIN_TIMEOUT,
            on_browser_open: None,
            on_waiting: None,
            opener: Arc::new(SystemUrlOpener),
        }
    }

    /// Override the time budget for the whole flow
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Observe the authorization URL just before the browser opens.
    ///
    /// The CLI uses this to print the URL so the user can follow it by hand
    /// when no browser appears.
    pub fn on_browser_open(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_browser_open = Some(Box::new(hook));
        self
    }

    /// Observe the transition into waiting for the callback
    pub fn on_waiting(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_waiting = Some(Box::new(hook));
        self
    }

    /// Substitute the URL opener; tests use [`crate::MockUrlOpener`]
    pub fn with_opener(mut self, opener: Arc<dyn UrlOpener>) -> Self {
        self.opener = opener;
        self
    }
}

// Manual Debug implementation since the hooks are closures
impl std::fmt::Debug for LoginOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginOptions")
            .field("api_origin", &self.api_origin)
            .field("timeout", &self.timeout)
            .field("on_browser_open", &self.on_browser_open.is_some())
            .field("on_waiting", &self.on_waiting.is_some())
            .finish()
    }
}

/// Run a browser login to completion
pub async fn login(options: LoginOptions) -> AuthResult<Credentials> {
    login_with_cancellation(options, CancellationToken::new()).await
}

/// Run a browser login, resolving early with [`AuthError::Canceled`] if
/// `cancel` fires.
///
/// The callback listener is always shut down and its serving task joined
/// before this function returns, whatever the outcome. Nothing is retried;
/// rerunning a failed flow is the caller's decision.
pub async fn login_with_cancellation(
    options: LoginOptions,
    cancel: CancellationToken,
) -> AuthResult<Credentials> {
    let server = CallbackServer::bind().await?;
    let callback_url = server.callback_url();
    let auth_url = build_authorization_url(&options.api_origin, &callback_url)?;

    info!(
        "Starting browser login against {} (callback on port {})",
        options.api_origin,
        server.port()
    );

    let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
    let handle = server.serve(outcome_tx);

    match &options.on_browser_open {
        Some(hook) => hook(&auth_url),
        None => info!("Opening {} in your browser", auth_url),
    }

    if let Err(e) = options.opener.open(&auth_url) {
        // Non-fatal: the user can still follow the URL by hand.
        warn!("Could not launch a browser ({}); open {} manually", e, auth_url);
    }

    match &options.on_waiting {
        Some(hook) => hook(),
        None => info!("Waiting for authentication to finish in the browser"),
    }

    let outcome = tokio::select! {
        received = outcome_rx.recv() => match received {
            Some(outcome) => outcome,
            // The serving task owns the sender, so the channel can only
            // close if that task died; surface it as a canceled flow.
            None => Err(AuthError::Canceled),
        },
        _ = tokio::time::sleep(options.timeout) => Err(AuthError::TimedOut(options.timeout)),
        _ = cancel.cancelled() => Err(AuthError::Canceled),
    };

    shutdown(handle).await;

    let result = outcome?;
    if !is_valid_api_key(&result.api_key) {
        return Err(AuthError::InvalidCredentialFormat);
    }

    info!("Browser login completed");
    Ok(Credentials {
        api_key: result.api_key,
        org_id: result.org_id,
        org_name: result.org_name,
    })
}

/// Stop the callback server deterministically: signal graceful shutdown,
/// abort the task if the grace period elapses, and always join it so no
/// handler can run after the flow returns.
async fn shutdown(handle: ServerHandle) {
    let ServerHandle { shutdown_tx, mut task } = handle;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
        Ok(joined) => {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    warn!("Callback server task failed during shutdown: {}", e);
                }
            }
            debug!("Callback server shut down cleanly");
        }
        Err(_) => {
            warn!("Callback server ignored graceful shutdown; aborting");
            task.abort();
            let _ = (&mut task).await;
        }
    }
}

/// Shape check for keys delivered through the callback.
///
/// The web UI issues URL-safe token strings; anything else indicates a
/// mangled redirect rather than a real credential.
fn is_valid_api_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_shape_check() {
        assert!(is_valid_api_key("caravel_k3y-2024.a"));
        assert!(is_valid_api_key("XYZ"));

        assert!(!is_valid_api_key(""));
        assert!(!is_valid_api_key("has space"));
        assert!(!is_valid_api_key("newline\n"));
        assert!(!is_valid_api_key("key/with/slashes"));
    }

    #[test]
    fn options_default_to_five_minute_timeout() {
        let options = LoginOptions::new("https://api.caravel.sh");
        assert_eq!(options.timeout, DEFAULT_LOGIN_TIMEOUT);
        assert!(options.on_browser_open.is_none());
        assert!(options.on_waiting.is_none());
    }

    #[test]
    fn builder_overrides_apply() {
        let options = LoginOptions::new("https://api.caravel.sh")
            .with_timeout(Duration::from_secs(30))
            .on_browser_open(|_| {})
            .on_waiting(|| {});
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert!(options.on_browser_open.is_some());
        assert!(options.on_waiting.is_some());
    }
}
