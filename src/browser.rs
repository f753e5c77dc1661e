//! Page loading behind a small session interface, so the listing scraper can run against the
//! live site or canned documents.
//!
//! [`ChromeBrowser`] renders pages in headless Chrome and is what listings built by client-side
//! JavaScript need. [`HttpBrowser`] is a plain GET for server-rendered listings.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser as Chrome, LaunchOptions, Tab};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("failed to start browser session: {0}")]
    Launch(String),

    #[error("failed to load {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("blocked at {url}: HTTP {status}")]
    Blocked { url: String, status: u16 },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("browser failed on {url}: {message}")]
    Driver { url: String, message: String },
}

/// Something that can open page-loading sessions.
pub trait Browser {
    type Session: PageSession;

    fn launch(&self) -> Result<Self::Session, NavigationError>;
}

/// An open session. Dropping it releases everything it holds.
pub trait PageSession {
    /// Navigates to `url` and returns the document once it has been fully received.
    fn load(&mut self, url: &str) -> Result<String, NavigationError>;
}

const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Loads pages over plain HTTP with a cookie jar scoped to the session.
pub struct HttpBrowser {
    timeout: Duration,
}

impl HttpBrowser {
    pub fn new(timeout: Duration) -> Self {
        HttpBrowser { timeout }
    }
}

impl Browser for HttpBrowser {
    type Session = HttpSession;

    fn launch(&self) -> Result<HttpSession, NavigationError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(launch_error)?;

        let user_agent = random_user_agent();

        info!("Browser session started");
        Ok(HttpSession {
            client,
            user_agent,
            pages_loaded: 0,
        })
    }
}

pub struct HttpSession {
    client: Client,
    user_agent: &'static str,
    pages_loaded: usize,
}

impl PageSession for HttpSession {
    fn load(&mut self, url: &str) -> Result<String, NavigationError> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent)
            .send()
            .map_err(|source| NavigationError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            warn!("Blocked at {}: {}", url, status);
            return Err(NavigationError::Blocked {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(NavigationError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().map_err(|source| NavigationError::Request {
            url: url.to_string(),
            source,
        })?;
        self.pages_loaded += 1;
        debug!("Loaded {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        info!("Browser session closed after {} pages", self.pages_loaded);
    }
}

/// Renders each page in a headless Chrome tab and returns the DOM as it stands after
/// navigation, optionally once a selector has appeared.
pub struct ChromeBrowser {
    timeout: Duration,
    wait_for: Option<String>,
}

impl ChromeBrowser {
    pub fn new(timeout: Duration) -> Self {
        ChromeBrowser {
            timeout,
            wait_for: None,
        }
    }

    /// Waits up to the load timeout for `selector` after each navigation. If it never shows up
    /// the page is returned as rendered, so an empty listing still reads as empty.
    pub fn wait_for(mut self, selector: impl Into<String>) -> Self {
        self.wait_for = Some(selector.into());
        self
    }
}

impl Browser for ChromeBrowser {
    type Session = ChromeSession;

    fn launch(&self) -> Result<ChromeSession, NavigationError> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .map_err(launch_error)?;
        let chrome = Chrome::new(options).map_err(launch_error)?;
        let tab = chrome.new_tab().map_err(launch_error)?;
        tab.set_default_timeout(self.timeout);
        tab.set_user_agent(random_user_agent(), Some("en-US,en;q=0.9"), None)
            .map_err(launch_error)?;

        info!("Browser session started (headless Chrome)");
        Ok(ChromeSession {
            tab,
            _chrome: chrome,
            wait_for: self.wait_for.clone(),
            timeout: self.timeout,
            pages_loaded: 0,
        })
    }
}

pub struct ChromeSession {
    tab: Arc<Tab>,
    // Dropped after the tab is closed; shuts the Chrome process down.
    _chrome: Chrome,
    wait_for: Option<String>,
    timeout: Duration,
    pages_loaded: usize,
}

impl PageSession for ChromeSession {
    fn load(&mut self, url: &str) -> Result<String, NavigationError> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| driver_error(url, e))?;

        if let Some(selector) = &self.wait_for {
            if let Err(e) = self.tab.wait_for_element_with_custom_timeout(selector, self.timeout) {
                debug!("'{}' did not appear on {}: {}", selector, url, e);
            }
        }

        let body = self.tab.get_content().map_err(|e| driver_error(url, e))?;
        self.pages_loaded += 1;
        debug!("Rendered {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            warn!("Failed to close browser tab: {}", e);
        }
        info!("Browser session closed after {} pages", self.pages_loaded);
    }
}

fn launch_error(e: impl Display) -> NavigationError {
    NavigationError::Launch(e.to_string())
}

fn driver_error(url: &str, e: impl Display) -> NavigationError {
    NavigationError::Driver {
        url: url.to_string(),
        message: e.to_string(),
    }
}

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn building_a_chrome_browser_starts_nothing() {
        let browser = ChromeBrowser::new(Duration::from_secs(5)).wait_for("div.search-job-card");
        assert_eq!(browser.wait_for.as_deref(), Some("div.search-job-card"));
        assert_eq!(browser.timeout, Duration::from_secs(5));
    }

    #[test]
    fn user_agent_comes_from_the_pool() {
        for _ in 0..10 {
            assert!(USER_AGENTS.contains(&random_user_agent()));
        }
    }

    #[test]
    fn driver_errors_name_the_page() {
        let err = driver_error("https://jobs.test/list?page=2", "navigation timed out");
        assert_eq!(
            err.to_string(),
            "browser failed on https://jobs.test/list?page=2: navigation timed out"
        );
    }
}
