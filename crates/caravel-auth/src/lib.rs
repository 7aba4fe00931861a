//! Browser-delegated authentication for the Caravel CLI
//!
//! Obtains an API key without a standing server: the flow binds an ephemeral
//! loopback listener, sends the user's browser to the Caravel web UI with a
//! callback URL, and waits for the UI to redirect the browser back with the
//! issued key.
//!
//! # Features
//! - Ephemeral loopback callback server, torn down before the flow returns
//! - API-origin to web-origin mapping and authorization URL construction
//! - Best-effort browser launch with a manual-URL fallback
//! - Timeout and external cancellation as distinct outcomes
//!
//! # Usage
//! ```no_run
//! use caravel_auth::LoginOptions;
//!
//! # async fn run() -> caravel_auth::AuthResult<()> {
//! let options = LoginOptions::new("https://api.caravel.sh");
//! let credentials = caravel_auth::login(options).await?;
//! // Hand credentials.api_key to the credential store.
//! # Ok(())
//! # }
//! ```

mod auth_url;
mod browser;
mod callback_server;
mod flow;

pub use auth_url::{build_authorization_url, web_origin};
pub use browser::{MockUrlOpener, SystemUrlOpener, UrlOpener};
pub use callback_server::{CallbackResult, CallbackServer};
pub use flow::{login, login_with_cancellation, LoginOptions, DEFAULT_LOGIN_TIMEOUT};

// Re-export the shared types so callers need only this crate.
pub use caravel_types::{AuthError, AuthResult, Credentials};
