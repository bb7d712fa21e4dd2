//! TOML configuration.
//!
//! ```toml
//! [zendesk]
//! subdomain = "obscura"
//! user_email = "sync-bot@example.com"
//! api_token = "..."
//!
//! [transifex]
//! project_url = "https://www.transifex.com/obscura/help-center/"
//! username = "txrobot"
//! password = "..."
//!
//! [sync]
//! per_page = 10
//! html_resources = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::SyncError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Zendesk Help Center credentials
    pub zendesk: ZendeskConfig,

    /// Transifex project credentials
    pub transifex: TransifexConfig,

    /// Sync behavior knobs
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZendeskConfig {
    /// Instance subdomain: `{subdomain}.zendesk.com`
    pub subdomain: String,
    pub user_email: String,
    pub api_token: String,
}

impl ZendeskConfig {
    pub fn base_url(&self) -> String {
        format!("https://{}.zendesk.com", self.subdomain)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransifexConfig {
    /// Dashboard URL (`https://www.transifex.com/{org}/{project}/`) or the
    /// api/2 project root; both are accepted.
    pub project_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    /// Upload article bodies as HTML resources instead of key/value JSON.
    #[serde(default = "default_html_resources")]
    pub html_resources: bool,
    /// How many times a 401 on stats or translation fetches is retried.
    #[serde(default = "default_max_auth_retries")]
    pub max_auth_retries: u32,
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            sort_by: default_sort_by(),
            sort_order: default_sort_order(),
            html_resources: default_html_resources(),
            max_auth_retries: default_max_auth_retries(),
            watch_interval_secs: default_watch_interval(),
        }
    }
}

fn default_per_page() -> u32 {
    10
}

fn default_sort_by() -> String {
    "title".to_string()
}

fn default_sort_order() -> String {
    "asc".to_string()
}

fn default_html_resources() -> bool {
    true
}

fn default_max_auth_retries() -> u32 {
    2
}

fn default_watch_interval() -> u64 {
    300
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| SyncError::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        info!(
            subdomain = %config.zendesk.subdomain,
            project_url = %config.transifex.project_url,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Reject configs that cannot possibly reach either API.
    pub fn validate(&self) -> Result<(), SyncError> {
        let required = [
            ("zendesk.subdomain", &self.zendesk.subdomain),
            ("zendesk.user_email", &self.zendesk.user_email),
            ("zendesk.api_token", &self.zendesk.api_token),
            ("transifex.project_url", &self.transifex.project_url),
            ("transifex.username", &self.transifex.username),
            ("transifex.password", &self.transifex.password),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::Config(format!("{field} must not be empty")));
            }
        }
        if self.sync.per_page == 0 {
            return Err(SyncError::Config("sync.per_page must be at least 1".to_string()));
        }
        if self.sync.sort_order != "asc" && self.sync.sort_order != "desc" {
            return Err(SyncError::Config(format!(
                "sync.sort_order must be asc or desc, got {}",
                self.sync.sort_order
            )));
        }
        if self.sync.watch_interval_secs == 0 {
            return Err(SyncError::Config(
                "sync.watch_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
