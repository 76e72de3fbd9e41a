//! Page fetchers
//!
//! A [`PageFetcher`] turns a URL into page HTML. Each pool slot owns one
//! fetcher, created by a [`FetcherFactory`] when the pool starts and shut
//! down when the pool is torn down.
//!
//! Two backends exist:
//! - [`HttpFetcher`]: a plain reqwest client, the default
//! - `BrowserFetcher` (feature `browser`): one headless Chromium per slot,
//!   for pages that only render their tables with JavaScript

use crate::config::FetcherConfig;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while creating or using a fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Timed out fetching {0}")]
    Timeout(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Failed to launch fetcher for slot {slot}: {reason}")]
    Launch { slot: usize, reason: String },
}

/// An exclusive, stateful page loader
pub trait PageFetcher: Send + 'static {
    /// Loads `url` and returns the page HTML
    fn fetch(&mut self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Releases whatever the fetcher holds; called once at pool teardown
    fn shutdown(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

/// Creates the fetcher for one pool slot
pub trait FetcherFactory: Send + Sync {
    type Fetcher: PageFetcher;

    fn launch(&self, slot: usize) -> impl Future<Output = Result<Self::Fetcher, FetchError>> + Send;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages with a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    async fn shutdown(self) {}
}

/// Hands every slot a handle to the same connection pool
#[derive(Debug, Clone)]
pub struct HttpFetcherFactory {
    client: Client,
}

impl HttpFetcherFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &FetcherConfig) -> Result<Self, FetchError> {
        Ok(Self::new(build_http_client(config)?))
    }
}

impl FetcherFactory for HttpFetcherFactory {
    type Fetcher = HttpFetcher;

    async fn launch(&self, _slot: usize) -> Result<HttpFetcher, FetchError> {
        Ok(HttpFetcher::new(self.client.clone()))
    }
}

#[cfg(feature = "browser")]
pub use browser::{BrowserFetcher, BrowserFetcherFactory};

#[cfg(feature = "browser")]
mod browser {
    use super::{FetchError, FetcherFactory, PageFetcher};
    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;
    use std::fmt::Display;
    use std::future::Future;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    /// One headless Chromium process
    pub struct BrowserFetcher {
        browser: Browser,
        handler: JoinHandle<()>,
        timeout: Duration,
    }

    impl BrowserFetcher {
        pub async fn launch(timeout: Duration) -> Result<Self, FetchError> {
            let config = BrowserConfig::builder()
                .no_sandbox()
                .arg("--headless=new")
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .arg("--disable-extensions")
                .arg("--no-first-run")
                .build()
                .map_err(FetchError::Browser)?;

            let (browser, mut events) = Browser::launch(config)
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?;

            // The CDP connection only makes progress while its handler is polled
            let handler = tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    if let Err(e) = event {
                        tracing::warn!(error = %e, "Browser handler error");
                        break;
                    }
                }
            });

            Ok(Self {
                browser,
                handler,
                timeout,
            })
        }
    }

    /// Runs `render` under `limit`, then closes the page whatever the outcome
    async fn render_and_close<T, E, C>(
        url: &str,
        limit: Duration,
        render: impl Future<Output = Result<T, FetchError>>,
        close: impl FnOnce() -> C,
    ) -> Result<T, FetchError>
    where
        E: Display,
        C: Future<Output = Result<(), E>>,
    {
        let result = match tokio::time::timeout(limit, render).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(url.to_string())),
        };
        if let Err(e) = close().await {
            tracing::warn!(url, error = %e, "Failed to close browser tab");
        }
        result
    }

    impl PageFetcher for BrowserFetcher {
        async fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
            let page = match tokio::time::timeout(self.timeout, self.browser.new_page("about:blank")).await {
                Ok(Ok(page)) => page,
                Ok(Err(e)) => return Err(FetchError::Browser(format!("open tab: {}", e))),
                Err(_) => return Err(FetchError::Timeout(url.to_string())),
            };
            let closer = page.clone();

            let render = async {
                page.goto(url)
                    .await
                    .map_err(|e| FetchError::Browser(format!("navigate to {}: {}", url, e)))?;
                page.find_element("body")
                    .await
                    .map_err(|e| FetchError::Browser(format!("page did not render: {}", e)))?;
                page.content()
                    .await
                    .map_err(|e| FetchError::Browser(format!("read content: {}", e)))
            };

            render_and_close(url, self.timeout, render, move || closer.close()).await
        }

        async fn shutdown(mut self) {
            if let Err(e) = self.browser.close().await {
                tracing::warn!(error = %e, "Failed to close browser");
            }
            let _ = self.browser.wait().await;
            self.handler.abort();
        }
    }

    /// Launches a separate browser for each slot
    #[derive(Debug, Clone)]
    pub struct BrowserFetcherFactory {
        timeout: Duration,
    }

    impl BrowserFetcherFactory {
        pub fn new(timeout: Duration) -> Self {
            Self { timeout }
        }
    }

    impl FetcherFactory for BrowserFetcherFactory {
        type Fetcher = BrowserFetcher;

        async fn launch(&self, slot: usize) -> Result<BrowserFetcher, FetchError> {
            BrowserFetcher::launch(self.timeout)
                .await
                .map_err(|e| FetchError::Launch {
                    slot,
                    reason: e.to_string(),
                })
        }
    }

}
