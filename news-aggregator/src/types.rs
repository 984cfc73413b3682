use interfaces::{DefinitionError, Source};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub use interfaces::{
    Article, ArticleQuery, Category, DateRange, EnumOption, FeedScope, Labelled, Metadata,
    NormalizedArticle, Page, ProviderQuery, SettingsUpdate, UserId, UserPreference,
    DEFAULT_ARTICLES_PER_PAGE, DEFAULT_COUNTRY, DEFAULT_LANGUAGE,
};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "News-Aggregator/1.0".to_string(),
            timeout_seconds: 15,
            max_retries: 2,
            retry_delay_seconds: 1,
            max_redirects: 5,
        }
    }
}

/// API keys per provider. A provider without a key is not wired.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub news_api: Option<String>,
    pub guardian: Option<String>,
    pub new_york_times: Option<String>,
    pub mediastack: Option<String>,
}

impl ProviderKeys {
    pub fn key_for(&self, source: Source) -> Option<&str> {
        let key = match source {
            Source::NewsApi => &self.news_api,
            Source::TheGuardian => &self.guardian,
            Source::NewYorkTimes => &self.new_york_times,
            Source::MediaStack => &self.mediastack,
        };
        key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Upper bound for a single provider call, retries included.
    pub provider_timeout: Duration,
    /// Upper bound for a whole ingest cycle; unfinished providers are dropped.
    pub cycle_timeout: Duration,
    /// Items requested per provider during an ingest cycle.
    pub page_size: u32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(20),
            cycle_timeout: Duration::from_secs(60),
            page_size: 50,
        }
    }
}

/// Outcome of one ingest cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    /// Candidates returned by all providers, including ones already stored.
    pub candidates: usize,
    /// Rows that did not exist before this cycle.
    pub inserted: usize,
    pub per_source: BTreeMap<Source, usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{provider} provider error: {message}")]
    Provider { provider: Source, message: String },

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("General error: {0}")]
    General(String),
}

impl From<DefinitionError> for AggregatorError {
    fn from(err: DefinitionError) -> Self {
        AggregatorError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
