//! Remote archive transport.

use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ETAG;
use tracing::{debug, warn};

use crate::error::{Result, StatusError};

/// Response to an archive request: validation metadata plus a body stream.
pub struct FetchResponse {
    /// Server `ETag`, if reported.
    pub etag: Option<String>,
    /// `Content-Length`, if reported.
    pub content_length: Option<u64>,
    /// Body, read to completion by the cache.
    pub body: Box<dyn Read + Send>,
}

/// Something that can fetch an archive by URL.
pub trait ArchiveSource {
    fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

/// HTTP(S) source backed by a blocking `reqwest` client.
///
/// When a request fails during the TLS handshake it is retried once with
/// certificate verification disabled.
pub struct HttpSource {
    client: Client,
    insecure: OnceLock<Client>,
    user_agent: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Self::builder(user_agent, timeout)
            .build()
            .map_err(|e| download_error("<client>", &e))?;
        Ok(Self {
            client,
            insecure: OnceLock::new(),
            user_agent: user_agent.to_string(),
            timeout,
        })
    }

    fn builder(user_agent: &str, timeout: Duration) -> reqwest::blocking::ClientBuilder {
        Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
    }

    fn insecure_client(&self) -> Result<&Client> {
        if let Some(client) = self.insecure.get() {
            return Ok(client);
        }
        let client = Self::builder(&self.user_agent, self.timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| download_error("<client>", &e))?;
        Ok(self.insecure.get_or_init(|| client))
    }
}

impl ArchiveSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<FetchResponse> {
        debug!(url = url, "Requesting archive");
        let response = match self.client.get(url).send() {
            Ok(r) => r,
            Err(e) if is_tls_failure(&e) => {
                warn!(url = url, error = %e, "TLS failure, retrying without certificate verification");
                self.insecure_client()?
                    .get(url)
                    .send()
                    .map_err(|e| download_error(url, &e))?
            }
            Err(e) => return Err(download_error(url, &e)),
        };

        let response = response
            .error_for_status()
            .map_err(|e| download_error(url, &e))?;

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();

        Ok(FetchResponse {
            etag,
            content_length,
            body: Box::new(response),
        })
    }
}

fn download_error(url: &str, e: &reqwest::Error) -> StatusError {
    StatusError::Download {
        url: url.to_string(),
        reason: error_chain(e),
    }
}

/// `e` and its sources joined with `: `.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

/// Whether a connection failed while establishing TLS.
fn is_tls_failure(e: &reqwest::Error) -> bool {
    if !e.is_connect() {
        return false;
    }
    let chain = error_chain(e).to_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|needle| chain.contains(needle))
}
