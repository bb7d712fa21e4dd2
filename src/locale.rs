//! Locale vocabulary reconciliation between Zendesk and Transifex.
//!
//! Zendesk spells locales lowercase with hyphens (`pt-br`), Transifex uses
//! language + uppercase region with underscores (`pt_BR`). Every mapping in
//! the agent funnels through these helpers so the two vocabularies never
//! leak into one another.

use serde::{Deserialize, Serialize};

/// Fold any locale spelling into the Zendesk canonical form.
pub fn normalize(code: &str) -> String {
    code.trim().to_lowercase().replace('_', "-")
}

/// Map a Transifex language code onto one of the given Zendesk locales.
///
/// Exact match (after folding) wins; otherwise the bare language part is
/// tried so `de_AT` still lands on a help center that only carries `de`.
/// Returns `None` when neither form is known.
pub fn tx_to_zd(tx_code: &str, zd_codes: &[String]) -> Option<String> {
    let folded = normalize(tx_code);
    if zd_codes.iter().any(|c| c == &folded) {
        return Some(folded);
    }
    let language = folded.split('-').next().unwrap_or(&folded).to_string();
    if zd_codes.iter().any(|c| c == &language) {
        return Some(language);
    }
    None
}

/// Render a Zendesk locale in Transifex spelling: `pt-br` → `pt_BR`.
pub fn zd_to_tx(zd_locale: &str) -> String {
    let folded = normalize(zd_locale);
    let mut parts = folded.split('-');
    let language = parts.next().unwrap_or_default().to_string();
    match parts.next() {
        Some(region) if !region.is_empty() => {
            format!("{}_{}", language, region.to_uppercase())
        }
        _ => language,
    }
}

/// One Zendesk locale as the directory stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleEntry {
    pub id: u64,
    pub code: String,
}

/// The help center's locale inventory plus its default locale.
///
/// Codes are lowercased on ingest; all lookups are case-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocaleDirectory {
    entries: Vec<LocaleEntry>,
    default_code: String,
}

impl LocaleDirectory {
    pub fn new(entries: Vec<LocaleEntry>, default_code: &str) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| LocaleEntry {
                id: e.id,
                code: normalize(&e.code),
            })
            .collect();
        Self {
            entries,
            default_code: normalize(default_code),
        }
    }

    pub fn codes(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.code.clone()).collect()
    }

    pub fn default_code(&self) -> &str {
        &self.default_code
    }

    pub fn is_default(&self, code: &str) -> bool {
        normalize(code) == self.default_code
    }

    pub fn code_for_id(&self, id: u64) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.code.as_str())
    }

    pub fn id_for_code(&self, code: &str) -> Option<u64> {
        let folded = normalize(code);
        self.entries.iter().find(|e| e.code == folded).map(|e| e.id)
    }

    /// Resolve a Transifex language code against this directory.
    pub fn resolve_tx(&self, tx_code: &str) -> Option<String> {
        tx_to_zd(tx_code, &self.codes())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
