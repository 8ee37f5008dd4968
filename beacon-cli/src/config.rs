//! Configuration module
//!
//! The CLI reuses the sync engine's configuration so polling bounds and page
//! size come from the same `BEACON_*` environment variables.

use anyhow::{Context, Result};
use beacon_client::ControllerClient;
use beacon_sync::SyncConfig;
use std::sync::Arc;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub sync: SyncConfig,
}

impl Config {
    /// Loads settings from the environment; `controller_url` overrides the URL
    pub fn load(controller_url: Option<String>) -> Result<Self> {
        let mut sync = SyncConfig::from_env().context("Invalid BEACON_* configuration")?;
        if let Some(url) = controller_url {
            sync = sync.with_controller_url(url);
            sync.validate()?;
        }
        Ok(Self { sync })
    }

    /// HTTP client honoring the configured request timeout
    pub fn client(&self) -> Result<Arc<ControllerClient>> {
        let client =
            ControllerClient::with_timeout(&self.sync.controller_url, self.sync.request_timeout)
                .context("Failed to build HTTP client")?;
        Ok(Arc::new(client))
    }
}
