pub mod types;
pub mod traits;
pub mod fetcher;
pub mod parser;
pub mod sources;
pub mod db;
pub mod article_store;
pub mod preference_store;
pub mod memory;
pub mod aggregator;
pub mod personalization;
pub mod preferences;

pub use types::*;
pub use traits::{ArticleStore, NewsProvider, PreferenceStore};
pub use fetcher::{Fetcher, HttpResponse, HttpTransport};
pub use sources::build_providers;
pub use article_store::PgArticleStore;
pub use preference_store::PgPreferenceStore;
pub use memory::{MemoryArticleStore, MemoryPreferenceStore};
pub use aggregator::{NewsAggregator, SearchRequest};
pub use personalization::PersonalizationEngine;
pub use preferences::{PreferenceService, PreferenceSnapshot, PreferenceUpdate};
