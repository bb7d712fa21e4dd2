//! Zendesk Help Center API client.
//!
//! Covers the slice of the Help Center REST API the sync needs: article
//! listing and fetch, per-entity translations, and the instance locale
//! inventory. All calls are paced through a shared [`RateLimiter`] and
//! authenticated with an API-token basic credential.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ZendeskConfig;
use crate::error::SyncError;
use crate::limiter::RateLimiter;
use crate::locale::normalize;
use crate::resources::ResourceKind;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REQUESTS_PER_SECOND: u32 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub locale: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of an article listing, with Zendesk's paging envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticlesPage {
    pub articles: Vec<Article>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub count: u64,
}

impl ArticlesPage {
    pub fn has_multiple_pages(&self) -> bool {
        self.page_count > 1
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        (1..=self.page_count).collect()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_count > self.page
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Translation {
    pub id: u64,
    pub locale: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub outdated: bool,
}

/// Fields sent when creating or updating a translation.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationPayload {
    pub locale: String,
    pub title: String,
    pub body: String,
    pub draft: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZendeskLocale {
    pub id: u64,
    pub locale: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "default", default)]
    pub is_default: bool,
}

/// Listing parameters, rendered into the query string.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: u32,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: None,
            per_page: 10,
            sort_by: None,
            sort_order: None,
        }
    }
}

impl ListQuery {
    /// `?per_page=N` first, then `&page=`, `&sort_by=`, `&sort_order=`
    /// in that order when set.
    pub fn query_string(&self) -> String {
        let mut qs = format!("?per_page={}", self.per_page);
        if let Some(page) = self.page {
            qs.push_str(&format!("&page={}", page));
        }
        if let Some(sort_by) = &self.sort_by {
            qs.push_str(&format!("&sort_by={}", sort_by));
        }
        if let Some(sort_order) = &self.sort_order {
            qs.push_str(&format!("&sort_order={}", sort_order));
        }
        qs
    }
}

/// Whether an upsert created a new record or touched an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Candidates with no translation among `existing` yet. Both sides are
/// folded to the Zendesk spelling; candidate order is kept.
pub fn missing_locales(existing: &[Translation], candidates: &[String]) -> Vec<String> {
    let existing: Vec<String> = existing.iter().map(|t| normalize(&t.locale)).collect();
    candidates
        .iter()
        .map(|c| normalize(c))
        .filter(|c| !existing.contains(c))
        .collect()
}

#[derive(Deserialize)]
struct ArticleEnvelope {
    article: Article,
}

#[derive(Deserialize)]
struct TranslationsEnvelope {
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct TranslationEnvelope {
    translation: Translation,
}

#[derive(Serialize)]
struct TranslationPayloadEnvelope<'a> {
    translation: &'a TranslationPayload,
}

#[derive(Deserialize)]
struct LocalesEnvelope {
    locales: Vec<ZendeskLocale>,
}

pub struct ZendeskClient {
    client: Client,
    base_url: String,
    auth_header: String,
    limiter: RateLimiter,
}

impl ZendeskClient {
    pub fn new(config: &ZendeskConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("txbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        // Token auth: the username is the agent email with a /token suffix.
        let credential = format!("{}/token:{}", config.user_email, config.api_token);
        Ok(Self {
            client,
            base_url: config.base_url(),
            auth_header: format!("Basic {}", STANDARD.encode(credential)),
            limiter: RateLimiter::new(MAX_REQUESTS_PER_SECOND, Duration::from_secs(1)),
        })
    }

    pub async fn list_articles(
        &self,
        locale: &str,
        query: &ListQuery,
    ) -> Result<ArticlesPage, SyncError> {
        let endpoint = format!(
            "/api/v2/help_center/{}/articles.json{}",
            normalize(locale),
            query.query_string()
        );
        self.get(&endpoint).await
    }

    pub async fn article(&self, id: u64) -> Result<Article, SyncError> {
        let endpoint = format!("/api/v2/help_center/articles/{}.json", id);
        let envelope: ArticleEnvelope = self.get(&endpoint).await?;
        Ok(envelope.article)
    }

    /// Translations of one entity. The same endpoint shape serves
    /// articles, sections, and categories.
    pub async fn translations(
        &self,
        kind: ResourceKind,
        id: u64,
    ) -> Result<Vec<Translation>, SyncError> {
        let endpoint = format!(
            "/api/v2/help_center/{}/{}/translations.json",
            kind.as_segment(),
            id
        );
        let envelope: TranslationsEnvelope = self.get(&endpoint).await?;
        Ok(envelope.translations)
    }

    /// Candidate locales with no translation yet on the entity.
    pub async fn missing_translation_locales(
        &self,
        kind: ResourceKind,
        id: u64,
        candidates: &[String],
    ) -> Result<Vec<String>, SyncError> {
        let existing = self.translations(kind, id).await?;
        Ok(missing_locales(&existing, candidates))
    }

    pub async fn create_translation(
        &self,
        kind: ResourceKind,
        id: u64,
        payload: &TranslationPayload,
    ) -> Result<Translation, SyncError> {
        let endpoint = format!(
            "/api/v2/help_center/{}/{}/translations.json",
            kind.as_segment(),
            id
        );
        let url = format!("{}{}", self.base_url, endpoint);
        let body = TranslationPayloadEnvelope { translation: payload };
        debug!(kind = %kind, id, locale = %payload.locale, "creating translation");
        let envelope: TranslationEnvelope = self
            .execute(self.client.post(&url).json(&body), &endpoint)
            .await?;
        Ok(envelope.translation)
    }

    pub async fn update_translation(
        &self,
        kind: ResourceKind,
        id: u64,
        locale: &str,
        payload: &TranslationPayload,
    ) -> Result<Translation, SyncError> {
        let endpoint = format!(
            "/api/v2/help_center/{}/{}/translations/{}.json",
            kind.as_segment(),
            id,
            normalize(locale)
        );
        let url = format!("{}{}", self.base_url, endpoint);
        let body = TranslationPayloadEnvelope { translation: payload };
        debug!(kind = %kind, id, locale = %locale, "updating translation");
        let envelope: TranslationEnvelope = self
            .execute(self.client.put(&url).json(&body), &endpoint)
            .await?;
        Ok(envelope.translation)
    }

    /// Update when the entity already carries the payload's locale,
    /// otherwise create.
    pub async fn upsert_translation(
        &self,
        kind: ResourceKind,
        id: u64,
        payload: &TranslationPayload,
    ) -> Result<UpsertOutcome, SyncError> {
        let locale = normalize(&payload.locale);
        let existing = self.translations(kind, id).await?;
        if existing.iter().any(|t| normalize(&t.locale) == locale) {
            self.update_translation(kind, id, &locale, payload).await?;
            Ok(UpsertOutcome::Updated)
        } else {
            self.create_translation(kind, id, payload).await?;
            Ok(UpsertOutcome::Created)
        }
    }

    /// The instance's locale inventory.
    pub async fn list_locales(&self) -> Result<Vec<ZendeskLocale>, SyncError> {
        let envelope: LocalesEnvelope = self.get("/api/v2/locales.json").await?;
        Ok(envelope.locales)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, SyncError> {
        let url = format!("{}{}", self.base_url, endpoint);
        self.execute(self.client.get(&url), endpoint).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<T, SyncError> {
        self.limiter.acquire().await;
        let response = request
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::from_status(
                status.as_u16(),
                endpoint,
                error_detail(&body),
            ));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pull a human-readable message out of a Zendesk error body.
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ZendeskError {
        #[serde(default)]
        error: Option<serde_json::Value>,
        #[serde(default)]
        description: Option<String>,
    }

    if let Ok(err) = serde_json::from_str::<ZendeskError>(body) {
        if let Some(description) = err.description {
            return description;
        }
        if let Some(error) = err.error {
            return error.to_string();
        }
    }
    body.trim().chars().take(200).collect()
}
