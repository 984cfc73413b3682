#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use news_aggregator::types::{Category, Metadata, NormalizedArticle, ProviderQuery, Result};
use news_aggregator::{AggregatorError, HttpResponse, HttpTransport, NewsProvider};
use interfaces::Source;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Serves canned bodies keyed by URL (query string excluded) and records
/// every request it sees.
#[derive(Default)]
pub struct StaticTransport {
    responses: HashMap<String, (u16, String)>,
    pub requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.responses.insert(url.to_string(), (status, body.into()));
        self
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn last_query(&self) -> Vec<(String, String)> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|(_, q)| q.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpTransport for StaticTransport {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), query.to_vec()));

        match self.responses.get(url) {
            Some((status, body)) => Ok(HttpResponse {
                status: *status,
                body: body.clone(),
            }),
            None => Err(AggregatorError::General(format!("connection refused: {}", url))),
        }
    }
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

pub fn candidate(
    external_id: &str,
    source: Source,
    category: Category,
    published_at: DateTime<Utc>,
) -> NormalizedArticle {
    NormalizedArticle {
        title: format!("Story {}", external_id),
        description: Some(format!("About {}", external_id)),
        content: None,
        url: format!("https://news.test/{}", external_id),
        image_url: None,
        author: None,
        source,
        category,
        published_at,
        external_id: external_id.to_string(),
        metadata: Metadata::new(),
    }
}

/// Provider double returning a fixed batch, optionally after a delay.
/// `completed` counts calls that ran to the end.
pub struct StaticProvider {
    pub source: Source,
    pub articles: Vec<NormalizedArticle>,
    pub delay: Duration,
    pub completed: Arc<AtomicUsize>,
}

impl StaticProvider {
    pub fn new(source: Source, articles: Vec<NormalizedArticle>) -> Self {
        Self {
            source,
            articles,
            delay: Duration::ZERO,
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl NewsProvider for StaticProvider {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, _query: &ProviderQuery) -> Vec<NormalizedArticle> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.articles.clone()
    }
}

/// Provider double whose task dies mid-fetch.
pub struct PanickingProvider(pub Source);

#[async_trait]
impl NewsProvider for PanickingProvider {
    fn source(&self) -> Source {
        self.0
    }

    async fn fetch(&self, _query: &ProviderQuery) -> Vec<NormalizedArticle> {
        panic!("provider blew up")
    }
}
