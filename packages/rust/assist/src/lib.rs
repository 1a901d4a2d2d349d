//! HTTP client for the assist.org transfer API.
//!
//! Two endpoints are used:
//! - `GET {base}/institutions`: the sending-institution directory
//! - `GET {base}/articulation/Agreements?Key=<year>/<from>/to/<to>/Department/<dept>`
//!   returns one raw agreement payload (still double-encoded; see `articulate-decoder`)
//!
//! Retries, authentication and rate limiting are deliberately absent: a failed
//! request is reported once and the caller moves on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use articulate_shared::{AgreementKey, ArticulateError, AssistConfig, Institution, Result};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// Maximum response size we consider valid (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("Articulate/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Fetch seam
// ---------------------------------------------------------------------------

/// Source of raw agreement payloads.
///
/// The pipeline only depends on this trait, so tests can substitute canned
/// payloads for the network.
#[async_trait]
pub trait AgreementFetcher: Send + Sync {
    /// Fetch the raw payload for one agreement.
    async fn fetch_agreement(&self, key: &AgreementKey) -> Result<String>;
}

// ---------------------------------------------------------------------------
// AssistClient
// ---------------------------------------------------------------------------

/// Client for the assist.org API.
#[derive(Debug, Clone)]
pub struct AssistClient {
    client: Client,
    base_url: Url,
}

impl AssistClient {
    /// Create a client rooted at `base_url` (e.g. `https://assist.org/api`).
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| ArticulateError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Create a client from the `[assist]` config section.
    pub fn from_config(config: &AssistConfig) -> Result<Self> {
        Self::new(config.base_url()?, Duration::from_secs(config.timeout_secs))
    }

    /// URL of the agreement identified by `key`.
    pub fn agreement_url(&self, key: &AgreementKey) -> Result<Url> {
        let mut url = self.endpoint(&["articulation", "Agreements"])?;
        // Slashes stay literal in the key, as the API expects.
        url.set_query(Some(&format!("Key={key}")));
        Ok(url)
    }

    /// List all institutions known to the API.
    ///
    /// Entries without any name are skipped.
    #[instrument(skip_all)]
    pub async fn institutions(&self) -> Result<Vec<Institution>> {
        #[derive(Deserialize)]
        struct RawInstitution {
            id: u32,
            #[serde(default)]
            names: Vec<RawName>,
        }

        #[derive(Deserialize)]
        struct RawName {
            name: String,
        }

        let url = self.endpoint(&["institutions"])?;
        let body = self.get_text(&url).await?;

        let raw: Vec<RawInstitution> = serde_json::from_str(&body).map_err(|e| {
            ArticulateError::validation(format!("{url}: unexpected institutions payload: {e}"))
        })?;

        let institutions: Vec<Institution> = raw
            .into_iter()
            .filter_map(|inst| match inst.names.into_iter().next() {
                Some(first) => Some(Institution {
                    id: inst.id,
                    name: first.name,
                }),
                None => {
                    warn!(id = inst.id, "institution has no name, skipping");
                    None
                }
            })
            .collect();

        debug!(count = institutions.len(), "institutions loaded");
        Ok(institutions)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ArticulateError::config(format!("{} cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ArticulateError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArticulateError::Network(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(ArticulateError::validation(format!(
                    "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| ArticulateError::Network(format!("{url}: failed to read body: {e}")))?;

        if body.trim().is_empty() {
            return Err(ArticulateError::Network(format!("{url}: empty response body")));
        }

        Ok(body)
    }
}

#[async_trait]
impl AgreementFetcher for AssistClient {
    #[instrument(skip_all, fields(key = %key))]
    async fn fetch_agreement(&self, key: &AgreementKey) -> Result<String> {
        let url = self.agreement_url(key)?;
        let body = self.get_text(&url).await?;
        debug!(bytes = body.len(), "agreement fetched");
        Ok(body)
    }
}
