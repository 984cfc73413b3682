use crate::fetcher::HttpTransport;
use crate::parser::{deduplicate, fingerprint, items_at, parse_published_at, text_at};
use crate::sources::{param, request_json, Params};
use crate::traits::NewsProvider;
use crate::types::{Category, Metadata, NormalizedArticle, ProviderQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::Source;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const CATEGORIES: &[(&str, Category)] = &[
    ("business", Category::Business),
    ("technology", Category::Technology),
    ("sports", Category::Sports),
    ("entertainment", Category::Entertainment),
    ("health", Category::Health),
    ("science", Category::Science),
    ("politics", Category::Politics),
    ("world", Category::World),
    ("national", Category::National),
    ("local", Category::Local),
    ("opinion", Category::Opinion),
    ("arts", Category::Arts),
    ("food", Category::Food),
    ("travel", Category::Travel),
    ("education", Category::Education),
    ("general", Category::World),
];

/// MediaStack only filters on a handful of categories; the rest go to
/// `general`.
pub fn provider_category(category: Category) -> &'static str {
    match category {
        Category::Business => "business",
        Category::Technology => "technology",
        Category::Sports => "sports",
        Category::Entertainment => "entertainment",
        Category::Health => "health",
        Category::Science => "science",
        _ => "general",
    }
}

pub fn canonical_category(value: &str) -> Category {
    let value = value.trim().to_lowercase();
    CATEGORIES
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, category)| *category)
        .unwrap_or(Category::FALLBACK)
}

pub struct MediaStackSource {
    transport: Arc<dyn HttpTransport>,
    access_key: String,
    base_url: String,
}

impl MediaStackSource {
    pub fn new(transport: Arc<dyn HttpTransport>, access_key: String) -> Self {
        Self {
            transport,
            access_key,
            base_url: Source::MediaStack.api_endpoint().to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn params(&self, query: &ProviderQuery) -> Params {
        let mut params = vec![
            param("access_key", &self.access_key),
            param("limit", query.page_size),
            param("sort", "published_desc"),
        ];
        if let Some(keyword) = &query.keyword {
            params.push(param("keywords", keyword));
        }
        if let Some(category) = query.category {
            params.push(param("categories", provider_category(category)));
        }
        params
    }

    /// MediaStack URLs are unique per story, so the fingerprint is taken over
    /// the URL alone.
    pub fn normalize(&self, item: &Value, fetched_at: DateTime<Utc>) -> Option<NormalizedArticle> {
        let title = text_at(item, "/title")?;
        let url = text_at(item, "/url")?;
        let published_raw = text_at(item, "/published_at");
        let category = text_at(item, "/category").unwrap_or_else(|| "general".to_string());

        let mut metadata = Metadata::new();
        metadata.insert("source_name".into(), json!(text_at(item, "/source")));
        metadata.insert("language".into(), json!(text_at(item, "/language")));
        metadata.insert("country".into(), json!(text_at(item, "/country")));
        metadata.insert("api_source".into(), json!("mediastack"));

        Some(NormalizedArticle {
            external_id: fingerprint(&[&url]),
            published_at: parse_published_at(published_raw.as_deref(), fetched_at),
            title,
            description: text_at(item, "/description"),
            content: text_at(item, "/content"),
            url,
            image_url: text_at(item, "/image"),
            author: text_at(item, "/author"),
            source: Source::MediaStack,
            category: canonical_category(&category),
            metadata,
        })
    }

    pub fn normalize_all(&self, items: &[Value]) -> Vec<NormalizedArticle> {
        let fetched_at = Utc::now();
        let mut articles = Vec::with_capacity(items.len());
        for item in items {
            match self.normalize(item, fetched_at) {
                Some(article) => articles.push(article),
                None => warn!(source = %Source::MediaStack, "Skipping item without title or url"),
            }
        }
        deduplicate(articles)
    }
}

#[async_trait]
impl NewsProvider for MediaStackSource {
    fn source(&self) -> Source {
        Source::MediaStack
    }

    fn supports_search(&self, query: &ProviderQuery) -> bool {
        query
            .category
            .map_or(true, |category| provider_category(category) != "general")
    }

    async fn fetch(&self, query: &ProviderQuery) -> Vec<NormalizedArticle> {
        let url = format!("{}/news", self.base_url);
        let Some(body) =
            request_json(self.transport.as_ref(), self.source(), &url, &self.params(query)).await
        else {
            return Vec::new();
        };

        let articles = self.normalize_all(items_at(&body, "/data"));
        info!("Fetched {} articles from MediaStack", articles.len());
        articles
    }
}
