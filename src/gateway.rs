//! Probe a content gateway for a root

use ipld_core::cid::Cid;
use reqwest::Url;
use std::time::{Duration, Instant};

/// Time budget for one probe: 25 seconds
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid gateway url {url:?}: {reason}")]
    BadUrl { url: String, reason: String },
    #[error("Gateway request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// What a probe observed
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub url: Url,
    pub status: u16,
    pub bytes: usize,
    pub elapsed: Duration,
}

/// One-shot gateway fetches. No retries.
#[derive(Debug, Clone)]
pub struct GatewayProbe {
    client: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl GatewayProbe {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let mut url = Url::parse(base).map_err(|e| GatewayError::BadUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        // so that joining keeps any path the base already has
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base: url,
            timeout,
        })
    }

    /// `{base}/ipfs/{root}`
    pub fn url_for(&self, root: &Cid) -> Result<Url, GatewayError> {
        self.base
            .join(&format!("ipfs/{root}"))
            .map_err(|e| GatewayError::BadUrl {
                url: self.base.to_string(),
                reason: e.to_string(),
            })
    }

    /// Fetch the root through the gateway, body included, within the timeout
    ///
    /// Any HTTP status is an outcome; only transport failures are errors.
    pub async fn probe(&self, root: &Cid) -> Result<ProbeOutcome, GatewayError> {
        let url = self.url_for(root)?;
        log::debug!("probing {url}");

        let start = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let elapsed = start.elapsed();

        log::info!("gateway answered {status} for {root} in {elapsed:?}");
        Ok(ProbeOutcome {
            url,
            status,
            bytes: body.len(),
            elapsed,
        })
    }

    fn classify(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Request(e)
        }
    }
}
