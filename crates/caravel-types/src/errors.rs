//! Error types and conversions

use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("browser authentication timed out after {0:?}")]
    TimedOut(Duration),

    #[error("browser authentication canceled")]
    Canceled,

    #[error("callback did not include an api_key parameter")]
    MissingCredential,

    #[error("received an API key with an unexpected format")]
    InvalidCredentialFormat,

    #[error("rejected authentication callback from non-local address {0}")]
    Forbidden(IpAddr),

    #[error("invalid API origin {origin:?}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to bind local callback listener")]
    Bind(#[source] std::io::Error),

    #[error("failed to launch browser")]
    BrowserLaunch(#[source] std::io::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;
