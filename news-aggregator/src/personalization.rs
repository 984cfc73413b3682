use crate::traits::{ArticleStore, PreferenceStore};
use crate::types::{AggregatorError, Article, FeedScope, Page, Result, UserId};
use std::sync::Arc;
use tracing::debug;

pub const MAX_FEED_PAGE_SIZE: u32 = 100;

/// Builds a user's feed from their active sources and categories.
pub struct PersonalizationEngine {
    articles: Arc<dyn ArticleStore>,
    preferences: Arc<dyn PreferenceStore>,
}

impl PersonalizationEngine {
    pub fn new(articles: Arc<dyn ArticleStore>, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self {
            articles,
            preferences,
        }
    }

    /// Sources and categories are combined as a union. A user without any
    /// active switch gets the unfiltered latest feed.
    pub async fn scope_for(&self, user: UserId) -> Result<FeedScope> {
        let sources = self.preferences.active_sources(user).await?;
        let categories = self.preferences.active_categories(user).await?;

        let scope = match (sources.is_empty(), categories.is_empty()) {
            (true, true) => FeedScope::All,
            (false, true) => FeedScope::Sources(sources),
            (true, false) => FeedScope::Categories(categories),
            (false, false) => FeedScope::SourcesOrCategories {
                sources,
                categories,
            },
        };
        Ok(scope)
    }

    /// `per_page = None` falls back to the user's `articles_per_page` setting.
    pub async fn feed(&self, user: UserId, per_page: Option<u32>, page: u32) -> Result<Page<Article>> {
        let per_page = match per_page {
            Some(n) if (1..=MAX_FEED_PAGE_SIZE).contains(&n) => n,
            Some(n) => {
                return Err(AggregatorError::Validation(format!(
                    "per page must be between 1 and {}, got {}",
                    MAX_FEED_PAGE_SIZE, n
                )))
            }
            None => self.preferences.get_or_create_preference(user).await?.articles_per_page,
        };

        let scope = self.scope_for(user).await?;
        debug!("Feed for user {} uses scope {:?}", user, scope);

        self.articles.feed(scope, per_page, page).await
    }
}
