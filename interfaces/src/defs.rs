use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::taxonomy::{serialize_labelled, Category, Source};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Unknown news category: {0}")]
    UnknownCategory(String),

    #[error("Unknown news source: {0}")]
    UnknownSource(String),

    #[error("End date must be after or equal to start date")]
    InvertedDateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider-specific extras kept next to the canonical fields.
pub type Metadata = Map<String, Value>;

/// A provider item folded into the canonical schema, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedArticle {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    #[serde(serialize_with = "serialize_labelled")]
    pub source: Source,
    #[serde(serialize_with = "serialize_labelled")]
    pub category: Category,
    pub published_at: DateTime<Utc>,
    pub external_id: String,
    pub metadata: Metadata,
}

/// A stored article row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    #[serde(serialize_with = "serialize_labelled")]
    pub source: Source,
    #[serde(serialize_with = "serialize_labelled")]
    pub category: Category,
    pub published_at: DateTime<Utc>,
    pub external_id: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn from_normalized(id: i64, candidate: NormalizedArticle, stored_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: candidate.title,
            description: candidate.description,
            content: candidate.content,
            url: candidate.url,
            image_url: candidate.image_url,
            author: candidate.author,
            source: candidate.source,
            category: candidate.category,
            published_at: candidate.published_at,
            external_id: candidate.external_id,
            metadata: candidate.metadata,
            created_at: stored_at,
            updated_at: stored_at,
        }
    }

    /// Case-insensitive substring match against title, description or content.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&needle));
        hit(Some(&self.title)) || hit(self.description.as_deref()) || hit(self.content.as_deref())
    }
}

/// Filter handed to a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderQuery {
    pub keyword: Option<String>,
    pub category: Option<Category>,
    pub page_size: u32,
}

impl ProviderQuery {
    pub fn latest(page_size: u32) -> Self {
        Self {
            keyword: None,
            category: None,
            page_size,
        }
    }

    /// A blank keyword means no keyword filter.
    pub fn search(keyword: impl Into<String>, category: Option<Category>, page_size: u32) -> Self {
        let keyword = keyword.into().trim().to_string();
        Self {
            keyword: (!keyword.is_empty()).then_some(keyword),
            category,
            page_size,
        }
    }
}

/// Inclusive publication window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DefinitionError> {
        if end < start {
            return Err(DefinitionError::InvertedDateRange);
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && *at <= self.end
    }
}

/// Source/category restriction of a stored-article query.
///
/// The list variants compose disjunctively with each other, which is what a
/// personalized feed needs: a user following a source and a category sees
/// everything from either.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedScope {
    #[default]
    All,
    Sources(Vec<Source>),
    Categories(Vec<Category>),
    SourcesOrCategories {
        sources: Vec<Source>,
        categories: Vec<Category>,
    },
}

impl FeedScope {
    pub fn admits(&self, source: Source, category: Category) -> bool {
        match self {
            FeedScope::All => true,
            FeedScope::Sources(sources) => sources.contains(&source),
            FeedScope::Categories(categories) => categories.contains(&category),
            FeedScope::SourcesOrCategories { sources, categories } => {
                sources.contains(&source) || categories.contains(&category)
            }
        }
    }
}

/// Conjunctive filter over stored articles, ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleQuery {
    pub keyword: Option<String>,
    pub source: Option<Source>,
    pub category: Option<Category>,
    pub date_range: Option<DateRange>,
    pub scope: FeedScope,
    pub page: u32,
    pub per_page: u32,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            keyword: None,
            source: None,
            category: None,
            date_range: None,
            scope: FeedScope::All,
            page: 1,
            per_page: 20,
        }
    }
}

impl ArticleQuery {
    pub fn latest(per_page: u32) -> Self {
        Self {
            per_page,
            ..Self::default()
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_scope(mut self, scope: FeedScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn on_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }

    pub fn matches(&self, article: &Article) -> bool {
        if let Some(keyword) = &self.keyword {
            if !article.matches_keyword(keyword) {
                return false;
            }
        }
        if self.source.is_some_and(|s| s != article.source) {
            return false;
        }
        if self.category.is_some_and(|c| c != article.category) {
            return false;
        }
        if let Some(range) = &self.date_range {
            if !range.contains(&article.published_at) {
                return false;
            }
        }
        self.scope.admits(article.source, article.category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, per_page: u32) -> Self {
        let last_page = if per_page == 0 {
            1
        } else {
            total.div_ceil(u64::from(per_page)).max(1) as u32
        };
        Self {
            items,
            total,
            page,
            per_page,
            last_page,
        }
    }

    pub fn empty(per_page: u32) -> Self {
        Self::new(Vec::new(), 0, 1, per_page)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }
}

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_COUNTRY: &str = "us";
pub const DEFAULT_ARTICLES_PER_PAGE: u32 = 20;

/// Per-user display settings, created lazily with fixed defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPreference {
    pub user_id: UserId,
    pub language: String,
    pub country: String,
    pub articles_per_page: u32,
    pub notifications_enabled: bool,
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserPreference {
    pub fn defaults_for(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            language: DEFAULT_LANGUAGE.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            articles_per_page: DEFAULT_ARTICLES_PER_PAGE,
            notifications_enabled: true,
            settings: Value::Object(Map::new()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: &SettingsUpdate, now: DateTime<Utc>) {
        if let Some(language) = &update.language {
            self.language = language.clone();
        }
        if let Some(country) = &update.country {
            self.country = country.clone();
        }
        if let Some(per_page) = update.articles_per_page {
            self.articles_per_page = per_page;
        }
        if let Some(enabled) = update.notifications_enabled {
            self.notifications_enabled = enabled;
        }
        if let Some(settings) = &update.settings {
            self.settings = settings.clone();
        }
        self.updated_at = now;
    }
}

/// Partial update of `UserPreference`; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    pub language: Option<String>,
    pub country: Option<String>,
    pub articles_per_page: Option<u32>,
    pub notifications_enabled: Option<bool>,
    pub settings: Option<Value>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.country.is_none()
            && self.articles_per_page.is_none()
            && self.notifications_enabled.is_none()
            && self.settings.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn blank_search_keyword_is_no_keyword() {
        assert_eq!(ProviderQuery::search("  ", None, 10).keyword, None);
        assert_eq!(
            ProviderQuery::search(" rust ", Some(Category::Science), 10).keyword.as_deref(),
            Some("rust")
        );
    }

    fn article(source: Source, category: Category) -> Article {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Article {
            id: 1,
            title: "Rust 2024 ships".to_string(),
            description: Some("A release".to_string()),
            content: None,
            url: "https://example.com/rust".to_string(),
            image_url: None,
            author: None,
            source,
            category,
            published_at: at,
            external_id: "abc".to_string(),
            metadata: Metadata::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn union_scope_admits_either_side() {
        let scope = FeedScope::SourcesOrCategories {
            sources: vec![Source::TheGuardian],
            categories: vec![Category::Technology],
        };
        assert!(scope.admits(Source::TheGuardian, Category::Sports));
        assert!(scope.admits(Source::MediaStack, Category::Technology));
        assert!(!scope.admits(Source::MediaStack, Category::Sports));
    }

    #[test]
    fn keyword_matching_ignores_case_and_skips_missing_fields() {
        let a = article(Source::NewsApi, Category::Technology);
        assert!(a.matches_keyword("RUST"));
        assert!(a.matches_keyword("release"));
        assert!(!a.matches_keyword("python"));
    }

    #[test]
    fn inverted_date_range_is_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(DateRange::new(start, end), Err(DefinitionError::InvertedDateRange));
        assert!(DateRange::new(end, start).unwrap().contains(&end));
    }

    #[test]
    fn page_computes_last_page() {
        let page = Page::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(page.last_page, 3);
        assert_eq!(Page::<u8>::empty(20).last_page, 1);
    }

    #[test]
    fn article_projection_labels_enums() {
        let json = serde_json::to_value(article(Source::TheGuardian, Category::Sports)).unwrap();
        assert_eq!(json["source"]["value"], "the_guardian");
        assert_eq!(json["source"]["display_name"], "The Guardian");
        assert_eq!(json["category"]["display_name"], "Sports");
        assert_eq!(json["published_at"], "2024-01-01T00:00:00Z");
    }
}
