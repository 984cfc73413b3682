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

const LANGUAGE: &str = "en";
const COUNTRY: &str = "us";

const CATEGORIES: &[(&str, Category)] = &[
    ("business", Category::Business),
    ("technology", Category::Technology),
    ("sports", Category::Sports),
    ("entertainment", Category::Entertainment),
    ("health", Category::Health),
    ("science", Category::Science),
    ("general", Category::World),
];

/// `top-headlines` knows seven categories; everything else is `general`.
pub fn provider_category(category: Category) -> &'static str {
    match category {
        Category::Business => "business",
        Category::Technology => "technology",
        Category::Sports => "sports",
        Category::Entertainment | Category::Arts => "entertainment",
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
        .or_else(|| Category::from_value(&value))
        .unwrap_or(Category::FALLBACK)
}

/// NewsAPI adapter. Latest headlines and keyword-less searches come from
/// `/top-headlines`, keyword searches from `/everything`, which has no
/// category filter.
pub struct NewsApiSource {
    transport: Arc<dyn HttpTransport>,
    api_key: String,
    base_url: String,
}

impl NewsApiSource {
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: String) -> Self {
        Self {
            transport,
            api_key,
            base_url: Source::NewsApi.api_endpoint().to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn params(&self, query: &ProviderQuery, headlines: bool) -> Params {
        let mut params = vec![
            param("apiKey", &self.api_key),
            param("pageSize", query.page_size),
            param("language", LANGUAGE),
            param("sortBy", "publishedAt"),
        ];
        if let Some(keyword) = &query.keyword {
            params.push(param("q", keyword));
        }
        // `/everything` rejects the headline-only filters
        if headlines {
            params.push(param("country", COUNTRY));
            if let Some(category) = query.category {
                params.push(param("category", provider_category(category)));
            }
        }
        params
    }

    /// Items rarely carry a category, so the requested one (if any) is used
    /// before falling back to `general`.
    pub fn normalize(
        &self,
        item: &Value,
        requested: Option<Category>,
        fetched_at: DateTime<Utc>,
    ) -> Option<NormalizedArticle> {
        let title = text_at(item, "/title")?;
        let url = text_at(item, "/url")?;
        let published_raw = text_at(item, "/publishedAt").unwrap_or_default();

        let category = match (text_at(item, "/category"), requested) {
            (Some(value), _) => canonical_category(&value),
            (None, Some(requested)) => requested,
            (None, None) => canonical_category("general"),
        };

        let mut metadata = Metadata::new();
        metadata.insert("source_name".into(), json!(text_at(item, "/source/name")));
        metadata.insert("source_id".into(), json!(text_at(item, "/source/id")));

        Some(NormalizedArticle {
            external_id: fingerprint(&[&url, &published_raw]),
            published_at: parse_published_at(Some(&published_raw), fetched_at),
            title,
            description: text_at(item, "/description"),
            content: text_at(item, "/content"),
            url,
            image_url: text_at(item, "/urlToImage"),
            author: text_at(item, "/author"),
            source: Source::NewsApi,
            category,
            metadata,
        })
    }

    pub fn normalize_all(&self, items: &[Value], requested: Option<Category>) -> Vec<NormalizedArticle> {
        let fetched_at = Utc::now();
        let mut articles = Vec::with_capacity(items.len());
        for item in items {
            match self.normalize(item, requested, fetched_at) {
                Some(article) => articles.push(article),
                None => warn!(source = %Source::NewsApi, "Skipping item without title or url"),
            }
        }
        deduplicate(articles)
    }

    async fn request(&self, endpoint: &str, query: &ProviderQuery) -> Vec<NormalizedArticle> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let headlines = endpoint == "top-headlines";
        let Some(body) = request_json(
            self.transport.as_ref(),
            self.source(),
            &url,
            &self.params(query, headlines),
        )
        .await
        else {
            return Vec::new();
        };

        let requested = if headlines { query.category } else { None };
        let articles = self.normalize_all(items_at(&body, "/articles"), requested);
        info!("Fetched {} articles from News API ({})", articles.len(), endpoint);
        articles
    }
}

#[async_trait]
impl NewsProvider for NewsApiSource {
    fn source(&self) -> Source {
        Source::NewsApi
    }

    fn supports_search(&self, query: &ProviderQuery) -> bool {
        query.keyword.is_none() || query.category.is_none()
    }

    async fn fetch(&self, query: &ProviderQuery) -> Vec<NormalizedArticle> {
        self.request("top-headlines", query).await
    }

    async fn search(
        &self,
        keyword: &str,
        category: Option<Category>,
        page_size: u32,
    ) -> Vec<NormalizedArticle> {
        let query = ProviderQuery::search(keyword, category, page_size);
        let endpoint = if query.keyword.is_some() { "everything" } else { "top-headlines" };
        self.request(endpoint, &query).await
    }
}
