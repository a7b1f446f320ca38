use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::Config;
use crate::jobs::JobStore;
use crate::middleware::ClientRateLimiter;
use crate::render::AssetIntegrity;
use crate::sessions::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub jobs: Arc<JobStore>,
    pub sessions: SessionStore,
    pub assets: Arc<AssetIntegrity>,
    pub rate_limiter: Arc<ClientRateLimiter>,
}

/// The search currently applied to a session's job list.
///
/// Replaced wholesale on every submission. An empty query places no text
/// constraint and an empty tag set places no tag constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Filter {
    pub query: String,
    pub tags: BTreeSet<String>,
}

impl Filter {
    /// Build a filter from raw submitted values, dropping blank tags.
    pub fn new<I, S>(query: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags
            .into_iter()
            .map(|t| {
                let t: String = t.into();
                t.trim().to_string()
            })
            .filter(|t| !t.is_empty())
            .collect();

        Self {
            query: query.into(),
            tags,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.tags.is_empty()
    }
}

/// Body of a `results` push event.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResultsPayload {
    pub html: String,
    pub count: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub jobs: usize,
    pub sessions: usize,
}
