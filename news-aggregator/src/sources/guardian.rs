use crate::fetcher::HttpTransport;
use crate::parser::{deduplicate, fingerprint, items_at, parse_published_at, text_at};
use crate::sources::{param, request_json, Params};
use crate::traits::NewsProvider;
use crate::types::{Category, Metadata, NormalizedArticle, ProviderQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::Source;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const SHOW_FIELDS: &str = "headline,trailText,bodyText,thumbnail,byline,lastModified";
const SHOW_TAGS: &str = "contributor,series";

/// Guardian section ids (and the odd display name) to canonical categories.
const SECTIONS: &[(&str, Category)] = &[
    ("business", Category::Business),
    ("money", Category::Business),
    ("technology", Category::Technology),
    ("sport", Category::Sports),
    ("football", Category::Sports),
    ("culture", Category::Entertainment),
    ("film", Category::Entertainment),
    ("music", Category::Entertainment),
    ("tv-and-radio", Category::Entertainment),
    ("society", Category::Health),
    ("science", Category::Science),
    ("politics", Category::Politics),
    ("world", Category::World),
    ("uk-news", Category::National),
    ("uk news", Category::National),
    ("us-news", Category::National),
    ("commentisfree", Category::Opinion),
    ("opinion", Category::Opinion),
    ("artanddesign", Category::Arts),
    ("books", Category::Arts),
    ("stage", Category::Arts),
    ("lifeandstyle", Category::Food),
    ("food", Category::Food),
    ("travel", Category::Travel),
    ("education", Category::Education),
];

/// Guardian section requested for a canonical category.
pub fn section_for(category: Category) -> &'static str {
    match category {
        Category::Business => "business",
        Category::Technology => "technology",
        Category::Sports => "sport",
        Category::Entertainment => "culture",
        Category::Health => "society",
        Category::Science => "science",
        Category::Politics => "politics",
        Category::World => "world",
        Category::National | Category::Local => "uk-news",
        Category::Opinion => "commentisfree",
        Category::Arts => "culture",
        Category::Food => "lifeandstyle",
        Category::Travel => "travel",
        Category::Education => "education",
    }
}

/// Canonical category for a Guardian section. Unknown sections map to
/// `Category::FALLBACK`.
pub fn category_for_section(section: &str) -> Category {
    let section = section.trim().to_lowercase();
    SECTIONS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, category)| *category)
        .unwrap_or(Category::FALLBACK)
}

/// One entry of the Guardian `/sections` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardianSection {
    pub id: String,
    pub title: String,
    pub category: Category,
}

pub struct GuardianSource {
    transport: Arc<dyn HttpTransport>,
    api_key: String,
    base_url: String,
}

impl GuardianSource {
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: String) -> Self {
        Self {
            transport,
            api_key,
            base_url: Source::TheGuardian.api_endpoint().to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn params(&self, query: &ProviderQuery) -> Params {
        let mut params = vec![
            param("api-key", &self.api_key),
            param("page-size", query.page_size),
            param("show-fields", SHOW_FIELDS),
            param("show-tags", SHOW_TAGS),
            param("order-by", "newest"),
        ];
        if let Some(keyword) = &query.keyword {
            params.push(param("q", keyword));
        }
        if let Some(category) = query.category {
            params.push(param("section", section_for(category)));
        }
        params
    }

    /// Folds one item of `response.results`. Items without `webTitle` or
    /// `webUrl` yield `None`.
    pub fn normalize(&self, item: &Value, fetched_at: DateTime<Utc>) -> Option<NormalizedArticle> {
        let title = text_at(item, "/webTitle")?;
        let url = text_at(item, "/webUrl")?;
        let published_raw = text_at(item, "/webPublicationDate").unwrap_or_default();

        let section = text_at(item, "/sectionId")
            .or_else(|| text_at(item, "/sectionName"))
            .unwrap_or_else(|| "news".to_string());

        let mut metadata = Metadata::new();
        metadata.insert("section_name".into(), json!(text_at(item, "/sectionName")));
        metadata.insert("section_id".into(), json!(text_at(item, "/sectionId")));
        metadata.insert("pillar_name".into(), json!(text_at(item, "/pillarName")));

        Some(NormalizedArticle {
            external_id: fingerprint(&[&url, &published_raw]),
            published_at: parse_published_at(Some(&published_raw), fetched_at),
            title,
            description: text_at(item, "/fields/trailText"),
            content: text_at(item, "/fields/bodyText"),
            url,
            image_url: text_at(item, "/fields/thumbnail"),
            author: text_at(item, "/fields/byline"),
            source: Source::TheGuardian,
            category: category_for_section(&section),
            metadata,
        })
    }

    pub fn normalize_all(&self, items: &[Value]) -> Vec<NormalizedArticle> {
        let fetched_at = Utc::now();
        let mut articles = Vec::with_capacity(items.len());
        for item in items {
            match self.normalize(item, fetched_at) {
                Some(article) => articles.push(article),
                None => warn!(source = %Source::TheGuardian, "Skipping item without title or url"),
            }
        }
        deduplicate(articles)
    }

    /// Sections the Guardian currently publishes, with the category each one
    /// maps to. Failures reduce to an empty list.
    pub async fn sections(&self) -> Vec<GuardianSection> {
        let url = format!("{}/sections", self.base_url);
        let params = [param("api-key", &self.api_key)];
        let Some(body) = request_json(self.transport.as_ref(), Source::TheGuardian, &url, &params).await
        else {
            return Vec::new();
        };

        items_at(&body, "/response/results")
            .iter()
            .filter_map(|item| {
                let id = text_at(item, "/id")?;
                let title = text_at(item, "/webTitle").unwrap_or_else(|| id.clone());
                Some(GuardianSection {
                    category: category_for_section(&id),
                    id,
                    title,
                })
            })
            .collect()
    }
}

#[async_trait]
impl NewsProvider for GuardianSource {
    fn source(&self) -> Source {
        Source::TheGuardian
    }

    async fn fetch(&self, query: &ProviderQuery) -> Vec<NormalizedArticle> {
        let url = format!("{}/search", self.base_url);
        let Some(body) =
            request_json(self.transport.as_ref(), self.source(), &url, &self.params(query)).await
        else {
            return Vec::new();
        };

        let articles = self.normalize_all(items_at(&body, "/response/results"));
        info!("Fetched {} articles from The Guardian", articles.len());
        articles
    }
}
