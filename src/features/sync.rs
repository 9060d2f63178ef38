//! Client for the backend ingestion call (`POST {base}/v1/sync`).
//!
//! The backend treats `(user, contact name)` as create-or-skip, so resending
//! after a retry or a repeated scan is safe.

use crate::core::config::SyncSection;
use crate::types::SyncPayload;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("invalid sync endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("sync rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("sync transport failure: {0}")]
    Transport(String),
}

/// Account identity sent with every sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncIdentity {
    pub name: String,
    pub phone: String,
}

pub struct IngestionClient {
    http: reqwest::Client,
    endpoint: Url,
    max_elapsed: Duration,
}

impl IngestionClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, SyncError> {
        let mut base = Url::parse(base_url.trim())
            .map_err(|_| SyncError::InvalidEndpoint(base_url.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("v1/sync")
            .map_err(|_| SyncError::InvalidEndpoint(base_url.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            max_elapsed: Duration::from_secs(20),
        })
    }

    /// Client plus identity from config; every field is required.
    pub fn from_config(
        http: reqwest::Client,
        cfg: &SyncSection,
    ) -> Result<(Self, SyncIdentity), SyncError> {
        let base = cfg
            .resolve_base_url()
            .ok_or(SyncError::NotConfigured("sync.base_url"))?;
        let name = cfg
            .resolve_user_name()
            .ok_or(SyncError::NotConfigured("sync.user_name"))?;
        let phone = cfg
            .resolve_phone()
            .ok_or(SyncError::NotConfigured("sync.phone"))?;
        Ok((Self::new(http, &base)?, SyncIdentity { name, phone }))
    }

    /// Cap on total time spent retrying.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Post the payload. Transport errors, 429 and 5xx are retried with
    /// exponential backoff; any other non-2xx status fails immediately.
    pub async fn sync(&self, payload: &SyncPayload) -> Result<(), SyncError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(300))
            .with_max_interval(Duration::from_secs(4))
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build();

        retry(policy, || async {
            let response = self
                .http
                .post(self.endpoint.clone())
                .json(payload)
                .send()
                .await
                .map_err(|e| {
                    warn!("sync: request to {} failed: {}", self.endpoint, e);
                    backoff::Error::transient(SyncError::Transport(e.to_string()))
                })?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let body = response.text().await.unwrap_or_default();
            let err = SyncError::Rejected {
                status: status.as_u16(),
                body,
            };
            if status.is_server_error() || status.as_u16() == 429 {
                warn!("sync: backend answered {}, retrying", status);
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            }
        })
        .await?;

        info!(
            "sync: {} contacts delivered to {}",
            payload.contacts.len(),
            self.endpoint
        );
        Ok(())
    }
}
