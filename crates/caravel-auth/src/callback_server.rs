//! Local callback server for browser logins
//!
//! Binds an ephemeral loopback port and serves the single `/callback` route
//! the web UI redirects the browser to. Each invocation of the handler
//! attempts exactly one write into a one-slot outcome channel; the first
//! write wins and the waiting flow resolves.

use axum::{
    extract::{ConnectInfo, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use caravel_types::{AuthError, AuthResult};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Query parameters delivered by the web UI's redirect
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    api_key: Option<String>,
    org_id: Option<String>,
    org_name: Option<String>,
}

/// Values extracted from a valid callback request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    /// API key as delivered; format validation is the flow's job
    pub api_key: String,
    /// Empty when the callback omitted `org_id`
    pub org_id: String,
    /// Empty when the callback omitted `org_name`
    pub org_name: String,
}

/// Sending half of the one-slot outcome channel (capacity 1, first write
/// wins)
pub(crate) type OutcomeSender = mpsc::Sender<AuthResult<CallbackResult>>;

/// Static page shown in the browser after a successful callback
const CONFIRMATION_PAGE: &str = r#"<html>
    <head><title>Login Successful</title></head>
    <body style="font-family: sans-serif; text-align: center; padding: 50px;">
        <h1>Login Successful</h1>
        <p>You are now authenticated with Caravel.</p>
        <p>You can close this window and return to your terminal.</p>
        <script>
            setTimeout(function() { window.close(); }, 3000);
        </script>
    </body>
</html>
"#;

/// An ephemeral loopback listener scoped to one login flow
pub struct CallbackServer {
    listener: TcpListener,
    port: u16,
}

/// Handle to the serving task, used by the flow for deterministic teardown
pub(crate) struct ServerHandle {
    pub(crate) shutdown_tx: oneshot::Sender<()>,
    pub(crate) task: JoinHandle<()>,
}

impl CallbackServer {
    /// Bind an OS-assigned ephemeral port on the loopback interface
    pub async fn bind() -> AuthResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(AuthError::Bind)?;
        let port = listener.local_addr().map_err(AuthError::Bind)?.port();
        debug!("Bound callback listener on 127.0.0.1:{}", port);
        Ok(Self { listener, port })
    }

    /// Port the listener is bound to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL the web UI redirects the browser to once the user approves
    pub fn callback_url(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.port)
    }

    /// Consume the listener and start serving `/callback` in a spawned task.
    ///
    /// The task runs until the returned handle's shutdown signal fires (or
    /// is dropped).
    pub(crate) fn serve(self, outcome_tx: OutcomeSender) -> ServerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(outcome_tx);

        let port = self.port;
        let task = tokio::spawn(async move {
            let server = axum::serve(
                self.listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                debug!("Callback server on port {} shutting down", port);
            });

            if let Err(e) = server.await {
                warn!("Callback server error on port {}: {}", port, e);
            }
        });

        ServerHandle { shutdown_tx, task }
    }
}

/// Handle one callback request.
///
/// Validates the peer address and required parameters, emits exactly one
/// outcome into the slot, and answers the browser. Later invocations still
/// get an HTTP response but their outcome is dropped.
async fn handle_callback(
    State(outcome_tx): State<OutcomeSender>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if !is_loopback_addr(&peer) {
        warn!("Rejecting callback from non-local address {}", peer);
        emit(&outcome_tx, Err(AuthError::Forbidden(peer.ip())));
        return (
            StatusCode::FORBIDDEN,
            "Forbidden: callback must originate from this machine\n",
        )
            .into_response();
    }

    let api_key = match query.api_key {
        Some(key) => key,
        None => {
            warn!("Callback is missing the api_key parameter");
            emit(&outcome_tx, Err(AuthError::MissingCredential));
            return (
                StatusCode::BAD_REQUEST,
                "Bad request: missing api_key parameter\n",
            )
                .into_response();
        }
    };

    info!("Received login callback from {}", peer);
    emit(
        &outcome_tx,
        Ok(CallbackResult {
            api_key,
            org_id: query.org_id.unwrap_or_default(),
            org_name: query.org_name.unwrap_or_default(),
        }),
    );

    (StatusCode::OK, Html(CONFIRMATION_PAGE)).into_response()
}

/// First write wins; a full slot means the flow is already resolving.
fn emit(tx: &OutcomeSender, outcome: AuthResult<CallbackResult>) {
    if tx.try_send(outcome).is_err() {
        debug!("Dropping callback outcome, flow already resolved");
    }
}

/// Whether `addr` is confined to the local machine.
///
/// Accepts 127.0.0.0/8, `::1`, and IPv4-mapped loopback addresses such as
/// `::ffff:127.0.0.1`.
fn is_loopback_addr(addr: &SocketAddr) -> bool {
    match addr.ip() {
        IpAddr::V4(ip) => ip.is_loopback(),
        IpAddr::V6(ip) => {
            ip.is_loopback()
                || ip
                    .to_ipv4_mapped()
                    .map(|v4| v4.is_loopback())
                    .unwrap_or(false)
        }
    }
}
