//! Resource naming and content packaging.
//!
//! Each Help Center entity maps to one Transifex resource whose slug
//! encodes the entity kind and id (`articles-203`, `HTML-sections-7`).
//! Content travels either as an HTML envelope carrying title and body in
//! class-tagged divs, or as a two-key JSON document.

use serde::{Deserialize, Serialize};

pub const HTML_PREFIX: &str = "HTML-";

const TITLE_OPEN: &str = "<div class=\"title\">";
const BODY_OPEN: &str = "<div class=\"body\">";
const DIV_CLOSE: &str = "</div>";

/// The Help Center entity kinds that become Transifex resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Article,
    Section,
    Category,
    DynamicContent,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Article,
        ResourceKind::Section,
        ResourceKind::Category,
        ResourceKind::DynamicContent,
    ];

    /// URL path segment and slug prefix for this kind.
    pub fn as_segment(&self) -> &'static str {
        match self {
            ResourceKind::Article => "articles",
            ResourceKind::Section => "sections",
            ResourceKind::Category => "categories",
            ResourceKind::DynamicContent => "dynamic-content",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_segment())
    }
}

/// Build the Transifex resource slug for an entity.
pub fn resource_slug(kind: ResourceKind, id: u64, html: bool) -> String {
    if html {
        format!("{}{}-{}", HTML_PREFIX, kind.as_segment(), id)
    } else {
        format!("{}-{}", kind.as_segment(), id)
    }
}

/// A slug broken back into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedSlug {
    pub kind: ResourceKind,
    pub id: u64,
    pub html: bool,
}

/// Parse a resource slug. Returns `None` for slugs this agent did not
/// mint (unknown kind, missing or non-numeric id).
pub fn parse_slug(slug: &str) -> Option<ParsedSlug> {
    let (html, rest) = match slug.strip_prefix(HTML_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, slug),
    };
    // No kind segment is a prefix of another, so first match wins even
    // for the hyphenated "dynamic-content".
    for kind in ResourceKind::ALL {
        if let Some(tail) = rest.strip_prefix(kind.as_segment()) {
            if let Some(id) = tail.strip_prefix('-') {
                if let Ok(id) = id.parse::<u64>() {
                    return Some(ParsedSlug { kind, id, html });
                }
            }
        }
    }
    None
}

/// Transifex i18n_type for the chosen packaging.
pub fn i18n_type(html: bool) -> &'static str {
    if html {
        "HTML"
    } else {
        "KEYVALUEJSON"
    }
}

/// Pack title and body for upload.
pub fn encode_content(title: &str, body: &str, html: bool) -> String {
    if html {
        format!(
            "{}{}{}\n{}{}{}",
            TITLE_OPEN, title, DIV_CLOSE, BODY_OPEN, body, DIV_CLOSE
        )
    } else {
        serde_json::json!({ "title": title, "body": body }).to_string()
    }
}

/// Title and body recovered from a downloaded translation.
///
/// `title` is `None` when the payload did not carry one; callers fall
/// back to the source title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedContent {
    pub title: Option<String>,
    pub body: String,
}

/// Unpack a downloaded translation.
///
/// A payload that does not match the expected envelope is kept whole as
/// the body rather than dropped, so a hand-edited resource still lands
/// somewhere visible.
pub fn decode_content(content: &str, html: bool) -> DecodedContent {
    let decoded = if html {
        decode_html(content)
    } else {
        decode_json(content)
    };
    decoded.unwrap_or_else(|| DecodedContent {
        title: None,
        body: content.to_string(),
    })
}

fn decode_html(content: &str) -> Option<DecodedContent> {
    let title_open = content.find(TITLE_OPEN)? + TITLE_OPEN.len();
    let title_len = content[title_open..].find(DIV_CLOSE)?;
    let title = &content[title_open..title_open + title_len];

    let after_title = title_open + title_len + DIV_CLOSE.len();
    let body_open = content[after_title..].find(BODY_OPEN)? + after_title + BODY_OPEN.len();
    // The envelope's own close tag is the last one in the document, so
    // nested divs inside the body survive.
    let body_end = content.rfind(DIV_CLOSE)?;
    if body_end < body_open {
        return None;
    }
    Some(DecodedContent {
        title: Some(title.to_string()),
        body: content[body_open..body_end].to_string(),
    })
}

fn decode_json(content: &str) -> Option<DecodedContent> {
    #[derive(Deserialize)]
    struct KeyValuePayload {
        #[serde(default)]
        title: Option<String>,
        body: String,
    }

    let payload: KeyValuePayload = serde_json::from_str(content).ok()?;
    Some(DecodedContent {
        title: payload.title,
        body: payload.body,
    })
}
