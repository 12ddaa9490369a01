use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::config::HttpSettings;
use crate::error::ResolverError;

/// Which `User-Agent` a request goes out with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentProfile {
    Default,
    Browser,
}

/// Every remote call the pipeline makes goes through this seam.
pub trait RemoteClient: Send + Sync {
    fn fetch_page(&self, url: &str, agent: AgentProfile) -> Result<String, ResolverError>;

    /// Streams the body of `url` into `destination`, returning the number of bytes written.
    /// A 404 is reported as [`ResolverError::NotFound`].
    fn download(&self, url: &str, destination: &Path) -> Result<u64, ResolverError>;
}

#[derive(Clone)]
pub struct HttpRemoteClient {
    client: Client,
    browser_user_agent: HeaderValue,
    max_retries: usize,
}

impl HttpRemoteClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, ResolverError> {
        let mut headers = HeaderMap::new();
        let agent = settings
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("kira-gr/{}", env!("CARGO_PKG_VERSION")));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&agent).map_err(|err| ResolverError::Http(err.to_string()))?,
        );

        if let Ok(api_key) = std::env::var("NCBI_API_KEY") {
            if !api_key.trim().is_empty() {
                headers.insert(
                    "api-key",
                    HeaderValue::from_str(api_key.trim())
                        .map_err(|err| ResolverError::Http(err.to_string()))?,
                );
            }
        }

        let browser_user_agent = HeaderValue::from_str(&settings.browser_user_agent)
            .map_err(|err| ResolverError::Http(err.to_string()))?;

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| ResolverError::Http(err.to_string()))?;

        Ok(Self {
            client,
            browser_user_agent,
            max_retries: settings.max_retries,
        })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, ResolverError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, attempt, "retrying request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(error = %err, attempt, "retrying request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(ResolverError::Http(err.to_string()));
                }
            }
        }
    }

    fn check_status(
        response: reqwest::blocking::Response,
        url: &str,
    ) -> Result<reqwest::blocking::Response, ResolverError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ResolverError::NotFound(url.to_string()));
        }
        Err(ResolverError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

impl RemoteClient for HttpRemoteClient {
    fn fetch_page(&self, url: &str, agent: AgentProfile) -> Result<String, ResolverError> {
        let response = self.send_with_retries(|| {
            let request = self.client.get(url);
            match agent {
                AgentProfile::Default => request,
                AgentProfile::Browser => request.header(USER_AGENT, self.browser_user_agent.clone()),
            }
        })?;
        let response = Self::check_status(response, url)?;
        response
            .text()
            .map_err(|err| ResolverError::Http(err.to_string()))
    }

    fn download(&self, url: &str, destination: &Path) -> Result<u64, ResolverError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        let mut response = Self::check_status(response, url)?;
        let mut file = File::create(destination).map_err(ResolverError::fs)?;
        std::io::copy(&mut response, &mut file).map_err(|err| ResolverError::Http(err.to_string()))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
