use crate::traits::{ArticleStore, NewsProvider};
use crate::types::{
    AggregatorConfig, AggregatorError, Category, EnumOption, FetchSummary, NormalizedArticle,
    ProviderQuery, Result,
};
use chrono::{DateTime, Utc};
use interfaces::Source;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const MAX_SEARCH_PAGE_SIZE: u32 = 100;
pub const MAX_KEYWORD_CHARS: usize = 255;

/// Live provider search. Results are passed through, not stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub keyword: String,
    pub source: Option<Source>,
    pub category: Option<Category>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub page_size: u32,
}

impl SearchRequest {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            source: None,
            category: None,
            start: None,
            end: None,
            page_size: 20,
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn between(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// A blank keyword is allowed as long as some other filter is set.
    pub fn has_criteria(&self) -> bool {
        !self.keyword.trim().is_empty()
            || self.source.is_some()
            || self.category.is_some()
            || self.start.is_some()
            || self.end.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.keyword.trim().chars().count() > MAX_KEYWORD_CHARS {
            return Err(AggregatorError::Validation(format!(
                "keyword must be at most {} characters",
                MAX_KEYWORD_CHARS
            )));
        }
        if !(1..=MAX_SEARCH_PAGE_SIZE).contains(&self.page_size) {
            return Err(AggregatorError::Validation(format!(
                "page size must be between 1 and {}",
                MAX_SEARCH_PAGE_SIZE
            )));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                return Err(AggregatorError::Validation(
                    "end date must be after or equal to start date".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn in_window(&self, published_at: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| *published_at >= start)
            && self.end.map_or(true, |end| *published_at <= end)
    }
}

#[derive(Debug, Clone)]
enum ProviderCall {
    Fetch(ProviderQuery),
    Search(ProviderQuery),
}

impl ProviderCall {
    async fn run(&self, provider: &dyn NewsProvider) -> Vec<NormalizedArticle> {
        match self {
            ProviderCall::Fetch(query) => provider.fetch(query).await,
            ProviderCall::Search(query) => {
                let keyword = query.keyword.as_deref().unwrap_or_default();
                provider.search(keyword, query.category, query.page_size).await
            }
        }
    }
}

/// Provider tasks of one fan-out. Dropping it aborts whatever is still
/// running, so a caller giving up on `fetch_all` or `search` does not leave
/// detached requests behind.
struct ProviderTasks(Vec<(Source, JoinHandle<Option<Vec<NormalizedArticle>>>)>);

impl Drop for ProviderTasks {
    fn drop(&mut self) {
        for (_, handle) in &self.0 {
            handle.abort();
        }
    }
}

/// Fans requests out to every configured provider and writes ingest cycles
/// into the article store.
pub struct NewsAggregator {
    providers: Vec<Arc<dyn NewsProvider>>,
    store: Arc<dyn ArticleStore>,
    config: AggregatorConfig,
}

impl NewsAggregator {
    /// `providers` are merged in the order given here.
    pub fn new(
        providers: Vec<Arc<dyn NewsProvider>>,
        store: Arc<dyn ArticleStore>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            providers,
            store,
            config,
        }
    }

    pub fn sources(&self) -> Vec<Source> {
        self.providers.iter().map(|p| p.source()).collect()
    }

    /// Runs one ingest cycle. Provider failures only shrink the result; a
    /// failing store is reported as an error.
    pub async fn fetch_all(&self) -> Result<FetchSummary> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("fetch_cycle", cycle_id = %cycle_id);

        self.run_cycle().instrument(span).await
    }

    async fn run_cycle(&self) -> Result<FetchSummary> {
        if self.providers.is_empty() {
            warn!("No news providers configured, nothing to fetch");
            return Ok(FetchSummary::default());
        }

        info!("Fetching latest articles from {} providers", self.providers.len());
        let call = ProviderCall::Fetch(ProviderQuery::latest(self.config.page_size));
        let results = self.fan_out(&self.providers, call).await;

        let mut summary = FetchSummary::default();
        let mut batch = Vec::new();
        for (source, articles) in results {
            *summary.per_source.entry(source).or_default() += articles.len();
            batch.extend(articles);
        }
        summary.candidates = batch.len();
        summary.inserted = self.store.upsert_batch(&batch).await?;

        info!(
            "Fetch cycle finished: {} candidates, {} new articles",
            summary.candidates, summary.inserted
        );
        Ok(summary)
    }

    /// Live search against one provider, or all of them when no source is given.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<NormalizedArticle>> {
        request.validate()?;
        if !request.has_criteria() {
            info!("No search criteria provided");
            return Ok(Vec::new());
        }

        let query = ProviderQuery::search(request.keyword.as_str(), request.category, request.page_size);
        let candidates: Vec<Arc<dyn NewsProvider>> = match request.source {
            Some(source) => {
                let matching: Vec<_> = self
                    .providers
                    .iter()
                    .filter(|p| p.source() == source)
                    .cloned()
                    .collect();
                if matching.is_empty() {
                    warn!("No provider configured for {}, search returns nothing", source);
                    return Ok(Vec::new());
                }
                matching
            }
            None => self.providers.clone(),
        };

        let (targets, skipped): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|provider| provider.supports_search(&query));
        for provider in &skipped {
            debug!(source = %provider.source(), "Provider cannot filter this search, skipping");
        }

        let call = ProviderCall::Search(query);
        let articles: Vec<NormalizedArticle> = self
            .fan_out(&targets, call)
            .await
            .into_iter()
            .flat_map(|(_, articles)| articles)
            .filter(|article| request.in_window(&article.published_at))
            .collect();

        info!("Search for {:?} returned {} articles", request.keyword, articles.len());
        Ok(articles)
    }

    pub fn list_categories() -> Vec<EnumOption> {
        Category::options()
    }

    pub fn list_sources() -> Vec<EnumOption> {
        Source::options()
    }

    /// One task per provider, each bounded by the provider timeout. Results
    /// come back in `providers` order regardless of completion order; tasks
    /// still running at the cycle deadline are aborted and count as empty.
    async fn fan_out(
        &self,
        providers: &[Arc<dyn NewsProvider>],
        call: ProviderCall,
    ) -> Vec<(Source, Vec<NormalizedArticle>)> {
        let provider_timeout = self.config.provider_timeout;
        let deadline = Instant::now() + self.config.cycle_timeout;

        let mut tasks = ProviderTasks(
            providers
                .iter()
                .map(|provider| {
                    let provider = provider.clone();
                    let call = call.clone();
                    let source = provider.source();
                    let handle = tokio::spawn(async move {
                        timeout(provider_timeout, call.run(provider.as_ref())).await.ok()
                    });
                    (source, handle)
                })
                .collect(),
        );

        let mut results = Vec::with_capacity(tasks.0.len());
        for (source, handle) in tasks.0.iter_mut() {
            let articles = match timeout_at(deadline, &mut *handle).await {
                Ok(Ok(Some(articles))) => {
                    debug!(source = %source, "Provider returned {} articles", articles.len());
                    articles
                }
                Ok(Ok(None)) => {
                    warn!(
                        source = %source,
                        "Provider timed out after {}s",
                        provider_timeout.as_secs()
                    );
                    Vec::new()
                }
                Ok(Err(e)) => {
                    error!(source = %source, error = %e, "Provider task failed");
                    Vec::new()
                }
                Err(_) => {
                    handle.abort();
                    warn!(source = %source, "Cycle deadline reached, abandoning provider");
                    Vec::new()
                }
            };
            results.push((*source, articles));
        }

        results
    }
}
