//! Browser launching
//!
//! Provides a trait-based interface for opening URLs, allowing for the real
//! (platform opener subprocess) and mock (recording) implementations.
//! Opening the browser is a convenience, never a requirement: when the
//! opener fails the flow keeps waiting and the user follows the logged URL
//! by hand.

use caravel_types::{AuthError, AuthResult};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use tracing::debug;

/// Strategy for opening a URL in the user's browser
pub trait UrlOpener: Send + Sync {
    /// Open `url`, returning once the opener has been spawned
    fn open(&self, url: &str) -> AuthResult<()>;
}

/// Opens URLs with the operating system's native mechanism.
///
/// The opener runs as a detached subprocess and is never awaited; whether a
/// browser window actually appears is outside this program's control.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemUrlOpener;

impl UrlOpener for SystemUrlOpener {
    fn open(&self, url: &str) -> AuthResult<()> {
        debug!("Launching system URL opener for {}", url);
        spawn_opener(url).map_err(AuthError::BrowserLaunch)?;
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn spawn_opener(url: &str) -> std::io::Result<()> {
    Command::new("open")
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

#[cfg(target_os = "windows")]
fn spawn_opener(url: &str) -> std::io::Result<()> {
    // The empty argument keeps `start` from treating the URL as a window
    // title.
    Command::new("cmd")
        .args(["/C", "start", ""])
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn spawn_opener(url: &str) -> std::io::Result<()> {
    Command::new("xdg-open")
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

/// Mock opener recording every URL it was asked to open.
///
/// Keeps tests from spawning real browser processes.
#[derive(Debug, Default)]
pub struct MockUrlOpener {
    opened: Mutex<Vec<String>>,
    fail: bool,
}

impl MockUrlOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose `open` always fails, for exercising the degraded path
    pub fn failing() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// URLs passed to `open`, in call order
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl UrlOpener for MockUrlOpener {
    fn open(&self, url: &str) -> AuthResult<()> {
        self.opened.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(AuthError::BrowserLaunch(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "mock opener failure",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_records_urls_in_order() {
        let opener = MockUrlOpener::new();
        opener.open("https://one.example").unwrap();
        opener.open("https://two.example").unwrap();
        assert_eq!(
            opener.opened(),
            vec!["https://one.example", "https://two.example"]
        );
    }

    #[test]
    fn failing_mock_still_records() {
        let opener = MockUrlOpener::failing();
        let err = opener.open("https://three.example").unwrap_err();
        assert!(matches!(err, AuthError::BrowserLaunch(_)));
        assert_eq!(opener.opened(), vec!["https://three.example"]);
    }
}
