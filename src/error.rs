/// Errors surfaced by the sync agent and both API clients.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authentication rejected by {endpoint}")]
    Unauthorized { endpoint: String },
    #[error("not found: {endpoint}")]
    NotFound { endpoint: String },
    #[error("unexpected status {status} from {endpoint}: {detail}")]
    Api {
        status: u16,
        endpoint: String,
        detail: String,
    },
    #[error("project source locale '{tx}' does not match help center default '{zd}'")]
    SourceLocaleMismatch { tx: String, zd: String },
    #[error("invalid project url: {0}")]
    InvalidProjectUrl(String),
    #[error("unknown locale: {0}")]
    UnknownLocale(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether this failure is a credentials rejection worth a bounded retry.
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Unauthorized { .. })
    }

    /// Map a non-success HTTP status onto the matching variant.
    pub fn from_status(status: u16, endpoint: &str, detail: String) -> Self {
        match status {
            401 => SyncError::Unauthorized {
                endpoint: endpoint.to_string(),
            },
            404 => SyncError::NotFound {
                endpoint: endpoint.to_string(),
            },
            _ => SyncError::Api {
                status,
                endpoint: endpoint.to_string(),
                detail,
            },
        }
    }
}
