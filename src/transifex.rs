//! Transifex API client (api/2 surface).
//!
//! Talks to one project: project details, per-resource language stats,
//! translation content, and resource upload. Accepts either the project
//! dashboard URL or the api/2 project root in config and normalizes to
//! the latter.

use std::collections::HashMap;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TransifexConfig;
use crate::error::SyncError;
use crate::limiter::RateLimiter;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REQUESTS_PER_SECOND: u32 = 2;

/// Caller identification the service already allowlists.
const SOURCE_HEADER: &str = "X-Source-Zendesk";
const SOURCE_HEADER_VALUE: &str = concat!("ZendeskApp/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRef {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Project details (`?details=true` response).
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    pub source_language_code: String,
    #[serde(default)]
    pub resources: Vec<ResourceRef>,
    #[serde(default)]
    pub teams: Vec<String>,
}

impl Project {
    pub fn resource_slugs(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.slug.clone()).collect()
    }

    pub fn source_locale(&self) -> &str {
        &self.source_language_code
    }

    /// Language codes with a translation team on the project.
    pub fn team_languages(&self) -> &[String] {
        &self.teams
    }
}

/// Per-language completion stats for one resource.
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageStats {
    pub completed: String,
}

impl LanguageStats {
    /// The integer percentage, read from strings like `"80%"`.
    /// Garbage parses as 0 rather than poisoning an aggregate.
    pub fn completed_percent(&self) -> u32 {
        let digits: String = self
            .completed
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.completed_percent() == 100
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationContent {
    pub content: String,
    #[serde(default)]
    pub mimetype: Option<String>,
}

/// Body for `POST resources/`.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceUpload {
    pub slug: String,
    pub name: String,
    pub i18n_type: String,
    pub content: String,
}

/// Body for `PUT resource/{slug}/content/`.
#[derive(Debug, Clone, Serialize)]
pub struct ContentUpdate {
    pub content: String,
    pub i18n_type: String,
}

/// Convert a dashboard URL (`https://www.transifex.com/{org}/{project}/...`)
/// into the api/2 project root.
pub fn api_root_from_dashboard(url: &str) -> Result<String, SyncError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| SyncError::InvalidProjectUrl(url.to_string()))?;

    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let host = segments
        .next()
        .filter(|h| h.contains('.'))
        .ok_or_else(|| SyncError::InvalidProjectUrl(url.to_string()))?;
    let org = segments
        .next()
        .ok_or_else(|| SyncError::InvalidProjectUrl(url.to_string()))?;
    // An "api" organization is a mangled api/2 path, not a dashboard URL;
    // converting it would silently target project "2".
    if org == "api" {
        return Err(SyncError::InvalidProjectUrl(url.to_string()));
    }
    let project = segments
        .next()
        .ok_or_else(|| SyncError::InvalidProjectUrl(url.to_string()))?;

    Ok(format!("https://{}/api/2/project/{}/", host, project))
}

/// Whether `url` already has the api/2 project-root shape.
pub fn is_valid_api_url(url: &str) -> bool {
    let rest = match url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return false,
    };
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    matches!(segments.as_slice(), [host, "api", "2", "project", slug]
        if host.contains('.') && !slug.is_empty())
}

/// Normalize a configured project URL to the api/2 root, trailing slash
/// included.
pub fn normalize_project_url(url: &str) -> Result<String, SyncError> {
    let trimmed = url.trim().trim_end_matches('/');
    if is_valid_api_url(trimmed) {
        return Ok(format!("{}/", trimmed));
    }
    api_root_from_dashboard(trimmed)
}

pub struct TransifexClient {
    client: Client,
    api_root: String,
    auth_header: String,
    limiter: RateLimiter,
}

impl TransifexClient {
    pub fn new(config: &TransifexConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("txbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let credential = format!("{}:{}", config.username, config.password);
        Ok(Self {
            client,
            api_root: normalize_project_url(&config.project_url)?,
            auth_header: format!("Basic {}", STANDARD.encode(credential)),
            limiter: RateLimiter::new(MAX_REQUESTS_PER_SECOND, Duration::from_secs(1)),
        })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Project details, resources and teams included.
    pub async fn project(&self) -> Result<Project, SyncError> {
        let url = format!("{}?details=true", self.api_root);
        self.execute(self.client.get(&url), "project").await
    }

    pub async fn resource_stats(
        &self,
        slug: &str,
    ) -> Result<HashMap<String, LanguageStats>, SyncError> {
        let endpoint = format!("resource/{}/stats/", slug);
        let url = format!("{}{}", self.api_root, endpoint);
        self.execute(self.client.get(&url), &endpoint).await
    }

    pub async fn translation(
        &self,
        slug: &str,
        language: &str,
    ) -> Result<TranslationContent, SyncError> {
        let endpoint = format!("resource/{}/translation/{}/", slug, language);
        let url = format!("{}{}", self.api_root, endpoint);
        self.execute(self.client.get(&url), &endpoint).await
    }

    pub async fn create_resource(&self, upload: &ResourceUpload) -> Result<(), SyncError> {
        let url = format!("{}resources/", self.api_root);
        debug!(slug = %upload.slug, i18n_type = %upload.i18n_type, "creating resource");
        self.execute_expecting_any(self.client.post(&url).json(upload), "resources/")
            .await
    }

    pub async fn update_resource(
        &self,
        slug: &str,
        update: &ContentUpdate,
    ) -> Result<(), SyncError> {
        let endpoint = format!("resource/{}/content/", slug);
        let url = format!("{}{}", self.api_root, endpoint);
        debug!(slug = %slug, i18n_type = %update.i18n_type, "updating resource content");
        self.execute_expecting_any(self.client.put(&url).json(update), &endpoint)
            .await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<T, SyncError> {
        let body = self.send(request, endpoint).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// For writes where the response body shape is uninteresting.
    async fn execute_expecting_any(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<(), SyncError> {
        self.send(request, endpoint).await.map(|_| ())
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<String, SyncError> {
        self.limiter.acquire().await;
        let response = request
            .header("Authorization", &self.auth_header)
            .header(SOURCE_HEADER, SOURCE_HEADER_VALUE)
            .header("Content-Type", "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::from_status(
                status.as_u16(),
                endpoint,
                body.trim().chars().take(200).collect(),
            ));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client() -> TransifexClient {
        TransifexClient::new(&TransifexConfig {
            project_url: "https://www.transifex.com/obscura/help-center/".to_string(),
            username: "txrobot".to_string(),
            password: "tx-pass".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_api_root_from_dashboard() {
        let root = api_root_from_dashboard("https://www.transifex.com/obscura/help-center/").unwrap();
        assert_eq!(root, "https://www.transifex.com/api/2/project/help-center/");
    }

    #[test]
    fn test_api_root_from_dashboard_with_extra_path() {
        let root =
            api_root_from_dashboard("https://www.transifex.com/obscura/help-center/dashboard/")
                .unwrap();
        assert_eq!(root, "https://www.transifex.com/api/2/project/help-center/");
    }

    #[test]
    fn test_api_root_rejects_missing_project() {
        assert!(api_root_from_dashboard("https://www.transifex.com/obscura/").is_err());
        assert!(api_root_from_dashboard("https://www.transifex.com/").is_err());
        assert!(api_root_from_dashboard("www.transifex.com/a/b/").is_err());
    }

    #[test]
    fn test_api_root_rejects_api_shaped_paths() {
        // Extra segments break the strict api/2 check; the dashboard branch
        // must not read org = "api", project = "2" out of them.
        assert!(api_root_from_dashboard(
            "https://www.transifex.com/api/2/project/help-center/dashboard/"
        )
        .is_err());
        assert!(normalize_project_url(
            "https://www.transifex.com/api/2/project/help-center/dashboard"
        )
        .is_err());
        assert!(normalize_project_url("https://www.transifex.com/api/2/project/").is_err());
    }

    #[test]
    fn test_is_valid_api_url() {
        assert!(is_valid_api_url(
            "https://www.transifex.com/api/2/project/help-center"
        ));
        assert!(is_valid_api_url(
            "https://www.transifex.com/api/2/project/help-center/"
        ));
        assert!(!is_valid_api_url("https://www.transifex.com/obscura/help-center/"));
        assert!(!is_valid_api_url("https://www.transifex.com/api/2/project/"));
        assert!(!is_valid_api_url("ftp://www.transifex.com/api/2/project/x/"));
    }

    #[test]
    fn test_normalize_project_url_accepts_both_forms() {
        let from_dashboard =
            normalize_project_url("https://www.transifex.com/obscura/help-center/").unwrap();
        let from_api =
            normalize_project_url("https://www.transifex.com/api/2/project/help-center").unwrap();
        assert_eq!(from_dashboard, from_api);
        assert!(from_api.ends_with('/'));
    }

    #[test]
    fn test_client_api_root() {
        let client = create_test_client();
        assert_eq!(
            client.api_root(),
            "https://www.transifex.com/api/2/project/help-center/"
        );
        let expected = STANDARD.encode("txrobot:tx-pass");
        assert_eq!(client.auth_header, format!("Basic {}", expected));
    }

    #[test]
    fn test_completed_percent() {
        let stats = LanguageStats { completed: "80%".to_string() };
        assert_eq!(stats.completed_percent(), 80);
        assert!(!stats.is_complete());

        let done = LanguageStats { completed: "100%".to_string() };
        assert_eq!(done.completed_percent(), 100);
        assert!(done.is_complete());
    }

    #[test]
    fn test_completed_percent_garbage() {
        let stats = LanguageStats { completed: "n/a".to_string() };
        assert_eq!(stats.completed_percent(), 0);
        let stats = LanguageStats { completed: String::new() };
        assert_eq!(stats.completed_percent(), 0);
    }

    #[test]
    fn test_project_helpers() {
        let json = r#"{
            "slug": "help-center",
            "name": "Help Center",
            "source_language_code": "en",
            "resources": [
                {"slug": "articles-1", "name": "Getting started"},
                {"slug": "HTML-articles-2"}
            ],
            "teams": ["fr", "pt_BR"]
        }"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.resource_slugs(), vec!["articles-1", "HTML-articles-2"]);
        assert_eq!(project.source_locale(), "en");
        assert_eq!(project.team_languages(), &["fr", "pt_BR"]);
    }

    #[test]
    fn test_project_without_details_fields() {
        let json = r#"{"slug": "help-center", "source_language_code": "en"}"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert!(project.resources.is_empty());
        assert!(project.teams.is_empty());
    }

    #[test]
    fn test_stats_map_deserialization() {
        let json = r#"{
            "fr": {"completed": "100%", "translated_entities": 7},
            "pt_BR": {"completed": "43%"}
        }"#;
        let stats: HashMap<String, LanguageStats> = serde_json::from_str(json).unwrap();
        assert!(stats["fr"].is_complete());
        assert_eq!(stats["pt_BR"].completed_percent(), 43);
    }

    #[test]
    fn test_resource_upload_serialization() {
        let upload = ResourceUpload {
            slug: "articles-9".to_string(),
            name: "FAQ".to_string(),
            i18n_type: "HTML".to_string(),
            content: "<div>x</div>".to_string(),
        };
        let json = serde_json::to_value(&upload).unwrap();
        assert_eq!(json["slug"], "articles-9");
        assert_eq!(json["i18n_type"], "HTML");
    }
}
