//! Adapter configuration.
//!
//! Loading is the embedding application's business; this module only
//! defines the serde value and its validation.

use crate::error::{Error, Result};
use crate::handler::{DEFAULT_BLOCK_SIZE, DEFAULT_READ_AHEAD, HandlerOptions};
use crate::timeouts::Timeouts;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub account_name: String,

    /// Pins handlers built from this config to one filesystem
    #[serde(default)]
    pub filesystem: Option<String>,

    /// Overrides `https://{account_name}.dfs.core.windows.net`
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_block_size")]
    pub block_size: usize,

    #[serde(default = "default_read_ahead")]
    pub read_ahead: usize,

    #[serde(default)]
    pub page_size: Option<usize>,

    #[serde(default)]
    pub timeouts: Timeouts,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_read_ahead() -> usize {
    DEFAULT_READ_AHEAD
}

impl AdapterConfig {
    #[must_use]
    pub fn new<S: Into<String>>(account_name: S) -> Self {
        Self {
            account_name: account_name.into(),
            filesystem: None,
            endpoint: None,
            block_size: DEFAULT_BLOCK_SIZE,
            read_ahead: DEFAULT_READ_AHEAD,
            page_size: None,
            timeouts: Timeouts::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.account_name.trim().is_empty() {
            return Err(Error::invalid_argument("account_name", "cannot be empty"));
        }
        if self.filesystem.as_deref().is_some_and(|f| f.trim().is_empty()) {
            return Err(Error::invalid_argument("filesystem", "cannot be empty"));
        }
        if self.block_size == 0 {
            return Err(Error::invalid_argument("block_size", "must be greater than 0"));
        }
        if self.read_ahead == 0 {
            return Err(Error::invalid_argument("read_ahead", "must be greater than 0"));
        }
        if self.page_size == Some(0) {
            return Err(Error::invalid_argument("page_size", "must be greater than 0"));
        }
        _ = self.endpoint_url()?;
        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url> {
        let raw = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.dfs.core.windows.net/", self.account_name),
        };
        let url = Url::parse(&raw)
            .map_err(|e| Error::invalid_argument("endpoint", format!("{raw}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_argument(
                "endpoint",
                format!("{raw}: expected an http or https URL"),
            ));
        }
        Ok(url)
    }

    #[must_use]
    pub fn handler_options(&self) -> HandlerOptions {
        HandlerOptions {
            block_size: self.block_size,
            read_ahead: self.read_ahead,
            page_size: self.page_size,
        }
    }
}
