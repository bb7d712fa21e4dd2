//! Sync orchestration.
//!
//! `SyncAgent` owns both API clients and the run's bookkeeping. Push
//! direction turns Zendesk articles into Transifex resources; pull
//! direction turns completed Transifex translations into Zendesk article
//! translations. Per-item failures are tallied and logged, never fatal
//! to the surrounding pass.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::SyncError;
use crate::locale::{normalize, LocaleDirectory, LocaleEntry};
use crate::resources::{
    decode_content, encode_content, i18n_type, parse_slug, resource_slug, ResourceKind,
};
use crate::state::SyncState;
use crate::transifex::{
    ContentUpdate, LanguageStats, ResourceUpload, TransifexClient, TranslationContent,
};
use crate::zendesk::{Article, ListQuery, TranslationPayload, UpsertOutcome, ZendeskClient};

/// The project fetch gets exactly one second chance on a 401.
const PROJECT_AUTH_RETRIES: u32 = 1;

/// How a push landed on Transifex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushOutcome {
    Created,
    Updated,
}

/// Aggregate result of one push pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub page: u32,
    pub page_count: u32,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl SyncReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            page: 0,
            page_count: 0,
            created: 0,
            updated: 0,
            failed: 0,
        }
    }
}

/// Aggregate result of pulling one article's translations.
#[derive(Debug, Clone, Serialize)]
pub struct PullReport {
    pub run_id: String,
    pub article_id: u64,
    pub slug: String,
    /// Transifex language codes that read 100% complete.
    pub languages: Vec<String>,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PullReport {
    fn new(run_id: Uuid, article_id: u64, slug: String) -> Self {
        Self {
            run_id: run_id.to_string(),
            article_id,
            slug,
            languages: Vec::new(),
            created: 0,
            updated: 0,
            failed: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// One row of the `status` listing.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleSyncStatus {
    pub id: u64,
    pub title: String,
    pub slug: String,
    /// Whether the resource already exists on the project.
    pub tracked: bool,
    pub completion_percent: u8,
    /// Zendesk locales whose translation reads 100% complete.
    pub completed_locales: Vec<String>,
}

/// Transifex language codes that are fully translated and map onto a
/// non-default Zendesk locale. The source language never qualifies, so
/// a pull cannot overwrite the original content. Sorted for stable
/// output.
pub fn completed_languages(
    stats: &HashMap<String, LanguageStats>,
    locales: &LocaleDirectory,
) -> Vec<String> {
    let mut out: Vec<String> = stats
        .iter()
        .filter(|(lang, stat)| {
            stat.is_complete()
                && locales
                    .resolve_tx(lang)
                    .map(|zd| !locales.is_default(&zd))
                    .unwrap_or(false)
        })
        .map(|(lang, _)| lang.clone())
        .collect();
    out.sort();
    out
}

/// Ceiling of the mean completion over languages that map onto a
/// non-default Zendesk locale; 0 when none do.
pub fn completion_percentage(
    stats: &HashMap<String, LanguageStats>,
    locales: &LocaleDirectory,
) -> u8 {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for (lang, stat) in stats {
        if let Some(zd) = locales.resolve_tx(lang) {
            if !locales.is_default(&zd) {
                sum += u64::from(stat.completed_percent());
                count += 1;
            }
        }
    }
    if count == 0 {
        return 0;
    }
    sum.div_ceil(count).min(100) as u8
}

pub struct SyncAgent {
    config: Config,
    zendesk: ZendeskClient,
    transifex: TransifexClient,
    state: SyncState,
    locales: LocaleDirectory,
    run_id: Uuid,
}

impl SyncAgent {
    /// Build clients from config. Validates shapes only; no I/O.
    pub fn new(config: Config) -> Result<Self, SyncError> {
        config.validate()?;
        let zendesk = ZendeskClient::new(&config.zendesk)?;
        let transifex = TransifexClient::new(&config.transifex)?;
        Ok(Self {
            config,
            zendesk,
            transifex,
            state: SyncState::new(),
            locales: LocaleDirectory::default(),
            run_id: Uuid::new_v4(),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn locales(&self) -> &LocaleDirectory {
        &self.locales
    }

    /// Listing parameters from the configured sort/paging defaults.
    pub fn query_from_config(&self) -> ListQuery {
        ListQuery {
            page: None,
            per_page: self.config.sync.per_page,
            sort_by: Some(self.config.sync.sort_by.clone()),
            sort_order: Some(self.config.sync.sort_order.clone()),
        }
    }

    /// Load the help-center locale directory and the Transifex project,
    /// then make sure the two sides agree on the source language.
    pub async fn bootstrap(&mut self) -> Result<(), SyncError> {
        info!(run_id = %self.run_id, "bootstrapping");

        self.state.tracker.begin("zd_locales");
        let locales = self.zendesk.list_locales().await;
        self.state.tracker.finish("zd_locales");
        let locales = locales?;

        let default_code = locales
            .iter()
            .find(|l| l.is_default)
            .map(|l| l.locale.clone())
            .unwrap_or_else(|| "en-us".to_string());
        let entries: Vec<LocaleEntry> = locales
            .into_iter()
            .map(|l| LocaleEntry { id: l.id, code: l.locale })
            .collect();
        self.locales = LocaleDirectory::new(entries, &default_code);
        info!(
            locales = self.locales.len(),
            default = %self.locales.default_code(),
            "help center locales loaded"
        );

        let transifex = &self.transifex;
        let project = retry_on_auth(&mut self.state, "tx_project", PROJECT_AUTH_RETRIES, || {
            transifex.project()
        })
        .await?;

        // Compare language parts only: a pt project can serve a pt-br
        // help center, but an fr project cannot serve an en one.
        let tx_source = normalize(project.source_locale());
        let zd_default = self.locales.default_code().to_string();
        if language_part(&tx_source) != language_part(&zd_default) {
            return Err(SyncError::SourceLocaleMismatch {
                tx: project.source_locale().to_string(),
                zd: zd_default,
            });
        }

        self.state.inventory.replace(project.resource_slugs());
        info!(
            project = %project.slug,
            resources = self.state.inventory.len(),
            teams = project.team_languages().len(),
            "transifex project loaded"
        );
        Ok(())
    }

    /// Upload one article as a Transifex resource. The inventory decides
    /// between create and update; a successful create joins it.
    pub async fn push_article(&mut self, article: &Article) -> Result<PushOutcome, SyncError> {
        let html = self.config.sync.html_resources;
        let slug = resource_slug(ResourceKind::Article, article.id, html);
        let content = encode_content(&article.title, article.body.as_deref().unwrap_or(""), html);
        let tracker_key = format!("{}:upsert", slug);

        self.state.ops.begin(&slug);
        self.state.tracker.begin(&tracker_key);
        let outcome = self.upsert_resource(&slug, &article.title, content).await;
        self.state.tracker.finish(&tracker_key);

        match outcome {
            Ok(outcome) => {
                self.state.ops.succeed(&slug);
                if outcome == PushOutcome::Created {
                    self.state.inventory.record(&slug);
                }
                info!(slug = %slug, outcome = ?outcome, "article pushed");
                Ok(outcome)
            }
            Err(e) => {
                self.state.ops.fail(&slug);
                warn!(slug = %slug, error = %e, "article push failed");
                Err(e)
            }
        }
    }

    async fn upsert_resource(
        &self,
        slug: &str,
        name: &str,
        content: String,
    ) -> Result<PushOutcome, SyncError> {
        let i18n = i18n_type(self.config.sync.html_resources).to_string();
        if self.state.inventory.contains(slug) {
            let update = ContentUpdate { content, i18n_type: i18n };
            self.transifex.update_resource(slug, &update).await?;
            Ok(PushOutcome::Updated)
        } else {
            let upload = ResourceUpload {
                slug: slug.to_string(),
                name: name.to_string(),
                i18n_type: i18n,
                content,
            };
            self.transifex.create_resource(&upload).await?;
            Ok(PushOutcome::Created)
        }
    }

    /// Fetch one article from Zendesk and push it.
    pub async fn push_article_by_id(&mut self, article_id: u64) -> Result<PushOutcome, SyncError> {
        self.require_bootstrap()?;
        let article = self.zendesk.article(article_id).await?;
        self.push_article(&article).await
    }

    /// List one page of source articles and push each of them.
    pub async fn push_page(&mut self, query: &ListQuery) -> Result<SyncReport, SyncError> {
        self.require_bootstrap()?;
        let locale = self.locales.default_code().to_string();
        let page = self.zendesk.list_articles(&locale, query).await?;

        let mut report = SyncReport::new(self.run_id);
        report.page = page.page;
        report.page_count = page.page_count;
        for article in &page.articles {
            match self.push_article(article).await {
                Ok(PushOutcome::Created) => report.created += 1,
                Ok(PushOutcome::Updated) => report.updated += 1,
                Err(_) => report.failed += 1,
            }
        }
        report.finished_at = Some(Utc::now());
        info!(
            run_id = %report.run_id,
            page = report.page,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "push pass complete"
        );
        Ok(report)
    }

    /// Download every completed translation of one article and upsert it
    /// into Zendesk.
    pub async fn pull_article(&mut self, article_id: u64) -> Result<PullReport, SyncError> {
        self.require_bootstrap()?;
        let html = self.config.sync.html_resources;
        let slug = resource_slug(ResourceKind::Article, article_id, html);
        let article = self.zendesk.article(article_id).await?;

        let stats = self.fetch_stats_bounded(&slug).await?;
        let languages = completed_languages(&stats, &self.locales);

        let mut report = PullReport::new(self.run_id, article_id, slug.clone());
        report.languages = languages.clone();
        for language in &languages {
            match self.pull_language(&slug, &article, language).await {
                Ok(UpsertOutcome::Created) => report.created += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(slug = %slug, language = %language, error = %e, "pull failed");
                }
            }
        }
        report.finished_at = Some(Utc::now());
        info!(
            slug = %slug,
            languages = report.languages.len(),
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "pull complete"
        );
        Ok(report)
    }

    async fn pull_language(
        &mut self,
        slug: &str,
        article: &Article,
        tx_language: &str,
    ) -> Result<UpsertOutcome, SyncError> {
        let zd_locale = self
            .locales
            .resolve_tx(tx_language)
            .ok_or_else(|| SyncError::UnknownLocale(tx_language.to_string()))?;

        let content = self.fetch_translation_bounded(slug, tx_language).await?;
        let decoded = decode_content(&content.content, self.config.sync.html_resources);
        let payload = TranslationPayload {
            locale: zd_locale,
            title: decoded.title.unwrap_or_else(|| article.title.clone()),
            body: decoded.body,
            draft: article.draft,
        };
        self.zendesk
            .upsert_translation(ResourceKind::Article, article.id, &payload)
            .await
    }

    async fn fetch_stats_bounded(
        &mut self,
        slug: &str,
    ) -> Result<HashMap<String, LanguageStats>, SyncError> {
        let key = format!("stats:{}", slug);
        let budget = self.config.sync.max_auth_retries;
        let transifex = &self.transifex;
        retry_on_auth(&mut self.state, &key, budget, || {
            transifex.resource_stats(slug)
        })
        .await
    }

    async fn fetch_translation_bounded(
        &mut self,
        slug: &str,
        language: &str,
    ) -> Result<TranslationContent, SyncError> {
        let key = format!("translation:{}:{}", slug, language);
        let budget = self.config.sync.max_auth_retries;
        let transifex = &self.transifex;
        retry_on_auth(&mut self.state, &key, budget, || {
            transifex.translation(slug, language)
        })
        .await
    }

    /// Per-article sync standing for one listing page.
    pub async fn status_page(
        &mut self,
        query: &ListQuery,
    ) -> Result<Vec<ArticleSyncStatus>, SyncError> {
        self.require_bootstrap()?;
        let locale = self.locales.default_code().to_string();
        let page = self.zendesk.list_articles(&locale, query).await?;
        let html = self.config.sync.html_resources;

        let mut rows = Vec::with_capacity(page.articles.len());
        for article in &page.articles {
            let slug = resource_slug(ResourceKind::Article, article.id, html);
            let tracked = self.state.inventory.contains(&slug);
            let (completion_percent, completed_locales) = if tracked {
                match self.fetch_stats_bounded(&slug).await {
                    Ok(stats) => {
                        let percent = completion_percentage(&stats, &self.locales);
                        let locales = completed_languages(&stats, &self.locales)
                            .iter()
                            .filter_map(|lang| self.locales.resolve_tx(lang))
                            .collect();
                        (percent, locales)
                    }
                    Err(e) => {
                        warn!(slug = %slug, error = %e, "stats unavailable");
                        (0, Vec::new())
                    }
                }
            } else {
                (0, Vec::new())
            };
            rows.push(ArticleSyncStatus {
                id: article.id,
                title: article.title.clone(),
                slug,
                tracked,
                completion_percent,
                completed_locales,
            });
        }
        Ok(rows)
    }

    /// Daemon loop: push the first listing page, then pull every tracked
    /// article, on every tick until ctrl-c. A zero interval would panic
    /// the ticker, so it is rejected up front.
    pub async fn watch(&mut self, interval: Duration) -> Result<(), SyncError> {
        if interval.is_zero() {
            return Err(SyncError::Config(
                "watch interval must be at least 1 second".to_string(),
            ));
        }
        self.require_bootstrap()?;
        info!(interval_secs = interval.as_secs(), "watch loop started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.watch_pass().await {
                        error!(error = %e, "watch pass failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn watch_pass(&mut self) -> Result<(), SyncError> {
        self.state.ops.reset_all();
        let query = self.query_from_config();
        self.push_page(&query).await?;

        let html = self.config.sync.html_resources;
        let slugs: Vec<String> = self.state.inventory.slugs().to_vec();
        for slug in slugs {
            let parsed = match parse_slug(&slug) {
                Some(parsed) => parsed,
                None => continue,
            };
            if parsed.kind != ResourceKind::Article || parsed.html != html {
                continue;
            }
            if let Err(e) = self.pull_article(parsed.id).await {
                warn!(slug = %slug, error = %e, "pull failed");
            }
        }

        let summary = self.state.ops.summary();
        info!(
            success = summary.success,
            failed = summary.failed,
            "watch pass complete"
        );
        Ok(())
    }

    fn require_bootstrap(&self) -> Result<(), SyncError> {
        if self.locales.is_empty() {
            return Err(SyncError::Config(
                "run bootstrap before sync operations".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run `op`, retrying while it fails with a 401 and the retry budget for
/// `key` is not spent. The tracker holds `key` for the whole exchange and
/// the retry counter is reset up front, so every call starts with a fresh
/// budget. Non-auth errors fail fast.
async fn retry_on_auth<T, F, Fut>(
    state: &mut SyncState,
    key: &str,
    budget: u32,
    mut op: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    state.retries.reset(key);
    state.tracker.begin(key);
    let result = loop {
        match op().await {
            Err(e) if e.is_auth() && state.retries.count(key) < budget => {
                let attempt = state.retries.record(key);
                warn!(key = %key, attempt, "unauthorized, retrying");
            }
            other => break other,
        }
    };
    state.tracker.finish(key);
    result
}

fn language_part(locale: &str) -> &str {
    locale.split('-').next().unwrap_or(locale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SyncConfig, TransifexConfig, ZendeskConfig};
    use std::cell::Cell;

    fn create_test_config() -> Config {
        Config {
            zendesk: ZendeskConfig {
                subdomain: "obscura".to_string(),
                user_email: "bot@example.com".to_string(),
                api_token: "zd-token".to_string(),
            },
            transifex: TransifexConfig {
                project_url: "https://www.transifex.com/obscura/help-center/".to_string(),
                username: "txrobot".to_string(),
                password: "tx-pass".to_string(),
            },
            sync: SyncConfig::default(),
        }
    }

    fn directory() -> LocaleDirectory {
        LocaleDirectory::new(
            vec![
                LocaleEntry { id: 1, code: "en-us".to_string() },
                LocaleEntry { id: 8, code: "pt-br".to_string() },
                LocaleEntry { id: 16, code: "de".to_string() },
            ],
            "en-us",
        )
    }

    fn stat(completed: &str) -> LanguageStats {
        LanguageStats { completed: completed.to_string() }
    }

    #[test]
    fn test_agent_new() {
        let agent = SyncAgent::new(create_test_config()).unwrap();
        assert!(!agent.run_id().is_nil());
        assert!(agent.state().inventory.is_empty());
        assert!(agent.locales().is_empty());
    }

    #[test]
    fn test_agent_new_rejects_bad_project_url() {
        let mut config = create_test_config();
        config.transifex.project_url = "https://www.transifex.com/".to_string();
        assert!(matches!(
            SyncAgent::new(config),
            Err(SyncError::InvalidProjectUrl(_))
        ));
    }

    #[test]
    fn test_agent_new_rejects_blank_credentials() {
        let mut config = create_test_config();
        config.zendesk.api_token = String::new();
        assert!(matches!(SyncAgent::new(config), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_query_from_config() {
        let agent = SyncAgent::new(create_test_config()).unwrap();
        let query = agent.query_from_config();
        assert_eq!(query.per_page, 10);
        assert_eq!(query.sort_by.as_deref(), Some("title"));
        assert_eq!(query.sort_order.as_deref(), Some("asc"));
        assert_eq!(query.page, None);
    }

    #[tokio::test]
    async fn test_operations_require_bootstrap() {
        let mut agent = SyncAgent::new(create_test_config()).unwrap();
        let err = agent.pull_article(1).await.unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        let err = agent.push_page(&ListQuery::default()).await.unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[tokio::test]
    async fn test_watch_rejects_zero_interval() {
        // Duration::ZERO would panic the tokio interval ticker.
        let mut agent = SyncAgent::new(create_test_config()).unwrap();
        let err = agent.watch(Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[tokio::test]
    async fn test_retry_on_auth_spends_budget_then_fails() {
        let mut state = SyncState::new();
        let attempts = Cell::new(0u32);

        let result: Result<(), SyncError> =
            retry_on_auth(&mut state, "stats:articles-1", 2, || {
                attempts.set(attempts.get() + 1);
                std::future::ready(Err(SyncError::Unauthorized {
                    endpoint: "stats".to_string(),
                }))
            })
            .await;

        // One initial try plus the whole budget.
        assert_eq!(attempts.get(), 3);
        assert!(matches!(result, Err(SyncError::Unauthorized { .. })));
        assert_eq!(state.retries.count("stats:articles-1"), 2);
        assert!(!state.tracker.is_busy());
    }

    #[tokio::test]
    async fn test_retry_on_auth_recovers_within_budget() {
        let mut state = SyncState::new();
        let attempts = Cell::new(0u32);

        let result = retry_on_auth(&mut state, "tx_project", PROJECT_AUTH_RETRIES, || {
            let n = attempts.get() + 1;
            attempts.set(n);
            std::future::ready(if n == 1 {
                Err(SyncError::Unauthorized { endpoint: "project".to_string() })
            } else {
                Ok(7u32)
            })
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.get(), 2);
        assert!(!state.tracker.is_busy());
    }

    #[tokio::test]
    async fn test_retry_on_auth_fails_fast_on_other_errors() {
        let mut state = SyncState::new();
        let attempts = Cell::new(0u32);

        let result: Result<(), SyncError> = retry_on_auth(&mut state, "stats:articles-1", 2, || {
            attempts.set(attempts.get() + 1);
            std::future::ready(Err(SyncError::NotFound {
                endpoint: "stats".to_string(),
            }))
        })
        .await;

        assert_eq!(attempts.get(), 1);
        assert!(matches!(result, Err(SyncError::NotFound { .. })));
        assert!(!state.tracker.is_busy());
    }

    #[tokio::test]
    async fn test_retry_on_auth_resets_previous_budget() {
        let mut state = SyncState::new();
        state.retries.record("tx_project");

        let result = retry_on_auth(&mut state, "tx_project", PROJECT_AUTH_RETRIES, || {
            std::future::ready(Ok::<_, SyncError>("project"))
        })
        .await;

        assert_eq!(result.unwrap(), "project");
        assert_eq!(state.retries.count("tx_project"), 0);
    }

    #[test]
    fn test_completed_languages_filters_and_sorts() {
        let dir = directory();
        let mut stats = HashMap::new();
        stats.insert("pt_BR".to_string(), stat("100%"));
        stats.insert("de".to_string(), stat("100%"));
        stats.insert("fr".to_string(), stat("100%")); // not in the directory
        stats.insert("en_US".to_string(), stat("100%")); // default locale
        stats.insert("es".to_string(), stat("90%")); // incomplete

        let langs = completed_languages(&stats, &dir);
        assert_eq!(langs, vec!["de", "pt_BR"]);
    }

    #[test]
    fn test_completed_languages_empty_stats() {
        assert!(completed_languages(&HashMap::new(), &directory()).is_empty());
    }

    #[test]
    fn test_completion_percentage_ceiling_mean() {
        let dir = directory();
        let mut stats = HashMap::new();
        stats.insert("pt_BR".to_string(), stat("50%"));
        stats.insert("de".to_string(), stat("51%"));
        // mean 50.5, ceiling 51
        assert_eq!(completion_percentage(&stats, &dir), 51);
    }

    #[test]
    fn test_completion_percentage_ignores_default_and_unmapped() {
        let dir = directory();
        let mut stats = HashMap::new();
        stats.insert("en_US".to_string(), stat("100%"));
        stats.insert("ja".to_string(), stat("100%"));
        stats.insert("de".to_string(), stat("40%"));
        assert_eq!(completion_percentage(&stats, &dir), 40);
    }

    #[test]
    fn test_completion_percentage_no_qualifying_entries() {
        let dir = directory();
        assert_eq!(completion_percentage(&HashMap::new(), &dir), 0);

        let mut stats = HashMap::new();
        stats.insert("ja".to_string(), stat("100%"));
        assert_eq!(completion_percentage(&stats, &dir), 0);
    }

    #[test]
    fn test_language_part() {
        assert_eq!(language_part("pt-br"), "pt");
        assert_eq!(language_part("en"), "en");
    }

    #[test]
    fn test_sync_report_serializes() {
        let mut report = SyncReport::new(Uuid::new_v4());
        report.created = 2;
        report.finished_at = Some(Utc::now());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["created"], 2);
        assert!(json["run_id"].is_string());
    }
}
