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

const FIELD_LIST: &str =
    "headline,abstract,web_url,multimedia,byline,pub_date,section_name,subsection_name,news_desk,document_type";
const IMAGE_HOST: &str = "https://www.nytimes.com/";

const NEWS_DESKS: &[(&str, Category)] = &[
    ("business", Category::Business),
    ("technology", Category::Technology),
    ("sports", Category::Sports),
    ("arts", Category::Entertainment),
    ("culture", Category::Entertainment),
    ("health", Category::Health),
    ("science", Category::Science),
    ("politics", Category::Politics),
    ("washington", Category::Politics),
    ("foreign", Category::World),
    ("national", Category::National),
    ("metro", Category::Local),
    ("opinion", Category::Opinion),
    ("op-ed", Category::Opinion),
    ("bookreview", Category::Arts),
    ("food", Category::Food),
    ("dining", Category::Food),
    ("travel", Category::Travel),
    ("education", Category::Education),
];

pub fn news_desk_for(category: Category) -> &'static str {
    match category {
        Category::Business => "Business",
        Category::Technology => "Technology",
        Category::Sports => "Sports",
        Category::Entertainment | Category::Arts => "Arts",
        Category::Health => "Health",
        Category::Science => "Science",
        Category::Politics => "Politics",
        Category::World => "Foreign",
        Category::National => "National",
        Category::Local => "Metro",
        Category::Opinion => "Opinion",
        Category::Food => "Food",
        Category::Travel => "Travel",
        Category::Education => "Education",
    }
}

pub fn category_for_news_desk(desk: &str) -> Category {
    let desk = desk.trim().to_lowercase();
    NEWS_DESKS
        .iter()
        .find(|(name, _)| *name == desk)
        .map(|(_, category)| *category)
        .unwrap_or(Category::FALLBACK)
}

/// New York Times Article Search adapter.
pub struct NyTimesSource {
    transport: Arc<dyn HttpTransport>,
    api_key: String,
    base_url: String,
}

impl NyTimesSource {
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: String) -> Self {
        Self {
            transport,
            api_key,
            base_url: Source::NewYorkTimes.api_endpoint().to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn params(&self, query: &ProviderQuery) -> Params {
        let mut params = vec![
            param("api-key", &self.api_key),
            param("fl", FIELD_LIST),
            param("sort", "newest"),
        ];
        if let Some(keyword) = &query.keyword {
            params.push(param("q", keyword));
        }
        if let Some(category) = query.category {
            params.push(param("fq", format!("news_desk:(\"{}\")", news_desk_for(category))));
        }
        params
    }

    pub fn normalize(&self, item: &Value, fetched_at: DateTime<Utc>) -> Option<NormalizedArticle> {
        // headline is either a plain string or an object with a `main` entry
        let title = text_at(item, "/headline/main").or_else(|| text_at(item, "/headline"))?;
        let url = text_at(item, "/web_url")?;
        let published_raw = text_at(item, "/pub_date").unwrap_or_default();
        let desk = text_at(item, "/news_desk").unwrap_or_else(|| "News".to_string());

        let author = text_at(item, "/byline/original").or_else(|| text_at(item, "/byline"));

        let mut metadata = Metadata::new();
        metadata.insert("section_name".into(), json!(text_at(item, "/section_name")));
        metadata.insert("subsection_name".into(), json!(text_at(item, "/subsection_name")));
        metadata.insert("news_desk".into(), json!(text_at(item, "/news_desk")));
        metadata.insert("document_type".into(), json!(text_at(item, "/document_type")));

        Some(NormalizedArticle {
            external_id: fingerprint(&[&url, &published_raw]),
            published_at: parse_published_at(Some(&published_raw), fetched_at),
            title,
            description: text_at(item, "/abstract"),
            content: None,
            url,
            image_url: photo_url(item),
            author,
            source: Source::NewYorkTimes,
            category: category_for_news_desk(&desk),
            metadata,
        })
    }

    pub fn normalize_all(&self, items: &[Value]) -> Vec<NormalizedArticle> {
        let fetched_at = Utc::now();
        let articles = items
            .iter()
            .filter_map(|item| {
                let article = self.normalize(item, fetched_at);
                if article.is_none() {
                    warn!(source = %Source::NewYorkTimes, "Skipping item without headline or web_url");
                }
                article
            })
            .collect();
        deduplicate(articles)
    }

    /// Folds one item of the Top Stories feed, which has its own flat shape.
    pub fn normalize_top_story(&self, item: &Value, fetched_at: DateTime<Utc>) -> Option<NormalizedArticle> {
        let title = text_at(item, "/title")?;
        let url = text_at(item, "/url")?;
        let published_raw = text_at(item, "/published_date").unwrap_or_default();
        let section = text_at(item, "/section").unwrap_or_default();
        let category = Category::from_value(&section.to_lowercase())
            .unwrap_or_else(|| category_for_news_desk(&section));

        let mut metadata = Metadata::new();
        metadata.insert("section_name".into(), json!(text_at(item, "/section")));
        metadata.insert("subsection_name".into(), json!(text_at(item, "/subsection")));
        metadata.insert("document_type".into(), json!(text_at(item, "/item_type")));

        Some(NormalizedArticle {
            external_id: fingerprint(&[&url, &published_raw]),
            published_at: parse_published_at(Some(&published_raw), fetched_at),
            title,
            description: text_at(item, "/abstract"),
            content: None,
            url,
            image_url: photo_url(item),
            author: text_at(item, "/byline"),
            source: Source::NewYorkTimes,
            category,
            metadata,
        })
    }

    /// Current top stories of one section, `home` when none is given. Live
    /// pass-through like `search`; failures reduce to an empty result.
    pub async fn top_stories(&self, section: Option<&str>) -> Vec<NormalizedArticle> {
        let section = section.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("home");
        let url = format!("{}/topstories/v2/{}.json", self.base_url, section);
        let params = [param("api-key", &self.api_key)];
        let Some(body) = request_json(self.transport.as_ref(), Source::NewYorkTimes, &url, &params).await
        else {
            return Vec::new();
        };

        let fetched_at = Utc::now();
        let articles = items_at(&body, "/results")
            .iter()
            .filter_map(|item| self.normalize_top_story(item, fetched_at))
            .collect();
        let articles = deduplicate(articles);
        info!("Fetched {} top stories from New York Times ({})", articles.len(), section);
        articles
    }
}

/// First `image`/`photo` multimedia entry, made absolute.
fn photo_url(item: &Value) -> Option<String> {
    let media = item.get("multimedia")?.as_array()?;
    media.iter().find_map(|m| {
        let is_photo = m.get("type").and_then(Value::as_str) == Some("image")
            && m.get("subtype").and_then(Value::as_str) == Some("photo");
        if !is_photo {
            return None;
        }
        let url = text_at(m, "/url")?;
        if url.starts_with("http://") || url.starts_with("https://") {
            Some(url)
        } else {
            Some(format!("{}{}", IMAGE_HOST, url.trim_start_matches('/')))
        }
    })
}

#[async_trait]
impl NewsProvider for NyTimesSource {
    fn source(&self) -> Source {
        Source::NewYorkTimes
    }

    async fn fetch(&self, query: &ProviderQuery) -> Vec<NormalizedArticle> {
        let url = format!("{}/search/v2/articlesearch.json", self.base_url);
        let Some(body) =
            request_json(self.transport.as_ref(), self.source(), &url, &self.params(query)).await
        else {
            return Vec::new();
        };

        // the API pages at a fixed size, so the requested size is applied here
        let mut articles = self.normalize_all(items_at(&body, "/response/docs"));
        articles.truncate(query.page_size as usize);
        info!("Fetched {} articles from New York Times", articles.len());
        articles
    }
}
