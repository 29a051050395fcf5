//! Opening the verification page for the user.

use super::error::AuthError;

/// Host capability for showing a URL to the user.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), AuthError>;
}

/// Opens URLs in the system default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), AuthError> {
        open::that(url)?;
        Ok(())
    }
}

/// Does nothing; for headless hosts that only display the URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBrowser;

impl BrowserLauncher for NoopBrowser {
    fn open(&self, _url: &str) -> Result<(), AuthError> {
        Ok(())
    }
}
