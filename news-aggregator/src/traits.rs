use crate::types::{
    Article, ArticleQuery, Category, FeedScope, NormalizedArticle, Page, ProviderQuery, Result,
    SettingsUpdate, UserId, UserPreference,
};
use async_trait::async_trait;
use interfaces::Source;

/// One external news API: fetches raw items and folds them into the canonical
/// schema. Implementations never fail; transport and parse problems are logged
/// and reduce to an empty result.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    fn source(&self) -> Source;

    /// Whether a live search for `query` can be answered faithfully. Providers
    /// that cannot filter on the requested category are left out.
    fn supports_search(&self, _query: &ProviderQuery) -> bool {
        true
    }

    async fn fetch(&self, query: &ProviderQuery) -> Vec<NormalizedArticle>;

    async fn search(
        &self,
        keyword: &str,
        category: Option<Category>,
        page_size: u32,
    ) -> Vec<NormalizedArticle> {
        self.fetch(&ProviderQuery::search(keyword, category, page_size))
            .await
    }
}

/// Persistence boundary for articles. `external_id` uniqueness is enforced by
/// the store itself, so concurrent ingests cannot create duplicate rows.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Inserts candidates whose `external_id` is not stored yet and leaves
    /// existing rows untouched. Returns the number of rows inserted.
    async fn upsert_batch(&self, candidates: &[NormalizedArticle]) -> Result<usize>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Article>>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Article>>;

    /// Ordered by `published_at` descending, then by `id` ascending.
    async fn query(&self, query: &ArticleQuery) -> Result<Page<Article>>;

    async fn count(&self) -> Result<u64>;

    async fn latest(&self, limit: u32) -> Result<Vec<Article>> {
        Ok(self.query(&ArticleQuery::latest(limit)).await?.items)
    }

    async fn by_source(&self, source: Source, per_page: u32, page: u32) -> Result<Page<Article>> {
        self.query(&ArticleQuery::latest(per_page).with_source(source).on_page(page))
            .await
    }

    async fn by_category(
        &self,
        category: Category,
        per_page: u32,
        page: u32,
    ) -> Result<Page<Article>> {
        self.query(
            &ArticleQuery::latest(per_page)
                .with_category(category)
                .on_page(page),
        )
        .await
    }

    async fn feed(&self, scope: FeedScope, per_page: u32, page: u32) -> Result<Page<Article>> {
        self.query(&ArticleQuery::latest(per_page).with_scope(scope).on_page(page))
            .await
    }
}

/// Per-user source/category switches and display settings.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_or_create_preference(&self, user: UserId) -> Result<UserPreference>;

    async fn update_preference(&self, user: UserId, update: &SettingsUpdate) -> Result<UserPreference>;

    async fn active_sources(&self, user: UserId) -> Result<Vec<Source>>;

    async fn active_categories(&self, user: UserId) -> Result<Vec<Category>>;

    /// Replaces every source row of the user, inactive ones included.
    async fn set_sources(&self, user: UserId, sources: &[Source]) -> Result<()>;

    /// Replaces every category row of the user, inactive ones included.
    async fn set_categories(&self, user: UserId, categories: &[Category]) -> Result<()>;

    /// Creates an active row when absent, otherwise flips it. Returns the new state.
    async fn toggle_source(&self, user: UserId, source: Source) -> Result<bool>;

    async fn toggle_category(&self, user: UserId, category: Category) -> Result<bool>;
}
