//! Authorization URL construction
//!
//! Maps the API origin the CLI is configured against to the web-UI origin
//! the user authenticates on, and assembles the browser-facing authorization
//! URL. Everything here is pure; identical inputs produce identical URLs.

use caravel_types::{AuthError, AuthResult};
use url::Url;

/// Path on the web UI that handles CLI authorization requests
const CLI_AUTH_PATH: &str = "/cli-auth";

/// Derive the web-UI origin for an API origin.
///
/// Hosts following the recognized naming convention are rewritten: an `api`
/// leading label maps to `app`, and environment-qualified hosts such as
/// `api-staging.caravel.sh` map to `app-staging.caravel.sh`. Any other
/// origin (localhost, custom domains) is returned unchanged. The scheme and
/// an explicit port survive; any path or query on the input is discarded.
pub fn web_origin(api_origin: &str) -> AuthResult<String> {
    let url = Url::parse(api_origin).map_err(|source| AuthError::InvalidOrigin {
        origin: api_origin.to_string(),
        source,
    })?;

    let host = url.host_str().ok_or_else(|| AuthError::InvalidOrigin {
        origin: api_origin.to_string(),
        source: url::ParseError::EmptyHost,
    })?;

    let mut origin = format!("{}://{}", url.scheme(), map_host(host));
    if let Some(port) = url.port() {
        origin.push_str(&format!(":{}", port));
    }
    Ok(origin)
}

/// Rewrite a leading `api` host label to `app`, preserving an environment
/// qualifier (`api-staging` becomes `app-staging`). Unrecognized hosts pass
/// through unchanged.
fn map_host(host: &str) -> String {
    let (first, rest) = match host.split_once('.') {
        Some((first, rest)) => (first, Some(rest)),
        None => (host, None),
    };

    let mapped = if first == "api" {
        "app".to_string()
    } else if let Some(env) = first.strip_prefix("api-") {
        format!("app-{}", env)
    } else {
        return host.to_string();
    };

    match rest {
        Some(rest) => format!("{}.{}", mapped, rest),
        None => mapped,
    }
}

/// Build the browser-facing authorization URL for an API origin.
///
/// The callback URL travels in a single URL-encoded `callback` query
/// parameter: `<web-origin>/cli-auth?callback=<encoded>`.
pub fn build_authorization_url(api_origin: &str, callback_url: &str) -> AuthResult<String> {
    let origin = web_origin(api_origin)?;
    Ok(format!(
        "{}{}?callback={}",
        origin,
        CLI_AUTH_PATH,
        urlencoding::encode(callback_url)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_host_maps_to_app() {
        assert_eq!(
            web_origin("https://api.example.io").unwrap(),
            "https://app.example.io"
        );
    }

    #[test]
    fn environment_qualified_host_keeps_qualifier() {
        assert_eq!(
            web_origin("https://api-staging.example.io").unwrap(),
            "https://app-staging.example.io"
        );
    }

    #[test]
    fn unrecognized_hosts_pass_through() {
        assert_eq!(
            web_origin("http://localhost:3000").unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            web_origin("https://caravel.internal.corp").unwrap(),
            "https://caravel.internal.corp"
        );
        // Only an exact `api` label or an `api-` prefix is recognized.
        assert_eq!(
            web_origin("https://api2.example.io").unwrap(),
            "https://api2.example.io"
        );
        assert_eq!(
            web_origin("https://apigateway.example.io").unwrap(),
            "https://apigateway.example.io"
        );
    }

    #[test]
    fn explicit_port_survives_mapping() {
        assert_eq!(
            web_origin("https://api.example.io:8443").unwrap(),
            "https://app.example.io:8443"
        );
    }

    #[test]
    fn path_and_query_are_discarded() {
        assert_eq!(
            web_origin("https://api.example.io/v1?x=1").unwrap(),
            "https://app.example.io"
        );
    }

    #[test]
    fn malformed_origin_is_a_parse_error() {
        let err = web_origin("not a url").unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrigin { .. }));

        let err = build_authorization_url("::::", "http://127.0.0.1:9999/callback").unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrigin { .. }));
    }

    #[test]
    fn authorization_url_encodes_callback_parameter() {
        let url =
            build_authorization_url("https://api.example.io", "http://127.0.0.1:9999/callback")
                .unwrap();
        assert_eq!(
            url,
            "https://app.example.io/cli-auth?callback=http%3A%2F%2F127.0.0.1%3A9999%2Fcallback"
        );
    }

    #[test]
    fn building_is_pure() {
        let a = build_authorization_url("https://api.example.io", "http://127.0.0.1:4242/callback")
            .unwrap();
        let b = build_authorization_url("https://api.example.io", "http://127.0.0.1:4242/callback")
            .unwrap();
        assert_eq!(a, b);
    }
}
