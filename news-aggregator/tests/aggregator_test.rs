mod common;

use common::{at, candidate, init_tracing, PanickingProvider, StaticProvider, StaticTransport};
use interfaces::Source;
use news_aggregator::sources::{GuardianSource, NewsApiSource};
use news_aggregator::types::{AggregatorConfig, AggregatorError, ArticleQuery, Category};
use news_aggregator::{ArticleStore, MemoryArticleStore, NewsAggregator, NewsProvider, SearchRequest};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const GUARDIAN: &str = "http://guardian.test/search";
const NEWSAPI_HEADLINES: &str = "http://newsapi.test/top-headlines";
const NEWSAPI_EVERYTHING: &str = "http://newsapi.test/everything";

fn engine(providers: Vec<Arc<dyn NewsProvider>>, store: Arc<MemoryArticleStore>) -> NewsAggregator {
    NewsAggregator::new(providers, store, AggregatorConfig::default())
}

#[tokio::test]
async fn failing_provider_does_not_affect_the_others() -> news_aggregator::Result<()> {
    init_tracing();

    let store = Arc::new(MemoryArticleStore::new());
    let guardian = StaticProvider::new(
        Source::TheGuardian,
        vec![
            candidate("g1", Source::TheGuardian, Category::Sports, at(1, 10)),
            candidate("g2", Source::TheGuardian, Category::World, at(1, 9)),
        ],
    );
    let mediastack = StaticProvider::new(
        Source::MediaStack,
        vec![candidate("m1", Source::MediaStack, Category::Science, at(1, 8))],
    );

    let providers: Vec<Arc<dyn NewsProvider>> = vec![
        Arc::new(PanickingProvider(Source::NewsApi)),
        Arc::new(guardian),
        // transport failure inside a real adapter
        Arc::new(GuardianSource::new(Arc::new(StaticTransport::new()), "k".to_string())),
        Arc::new(mediastack),
    ];
    let aggregator = engine(providers, store.clone());

    let summary = aggregator.fetch_all().await?;

    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.per_source[&Source::NewsApi], 0);
    assert_eq!(summary.per_source[&Source::MediaStack], 1);
    assert_eq!(store.count().await?, 3);
    Ok(())
}

#[tokio::test]
async fn repeated_cycles_are_idempotent() -> news_aggregator::Result<()> {
    init_tracing();

    let store = Arc::new(MemoryArticleStore::new());
    let provider = StaticProvider::new(
        Source::TheGuardian,
        vec![
            candidate("a", Source::TheGuardian, Category::Politics, at(2, 1)),
            candidate("b", Source::TheGuardian, Category::Politics, at(2, 2)),
        ],
    );
    let aggregator = engine(vec![Arc::new(provider) as Arc<dyn NewsProvider>], store.clone());

    let first = aggregator.fetch_all().await?;
    let second = aggregator.fetch_all().await?;

    assert_eq!(first.inserted, 2);
    // candidates seen, not rows created
    assert_eq!(second.candidates, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(store.count().await?, 2);
    Ok(())
}

#[tokio::test]
async fn overlapping_cycles_do_not_duplicate_rows() -> news_aggregator::Result<()> {
    init_tracing();

    let store = Arc::new(MemoryArticleStore::new());
    let morning = StaticProvider::new(
        Source::TheGuardian,
        vec![
            candidate("shared-1", Source::TheGuardian, Category::World, at(8, 1)),
            candidate("shared-2", Source::TheGuardian, Category::World, at(8, 2)),
        ],
    );
    let evening = StaticProvider::new(
        Source::TheGuardian,
        vec![
            candidate("shared-2", Source::TheGuardian, Category::World, at(8, 2)),
            candidate("shared-3", Source::TheGuardian, Category::World, at(8, 3)),
        ],
    );
    let first = engine(vec![Arc::new(morning) as Arc<dyn NewsProvider>], store.clone());
    let second = engine(vec![Arc::new(evening) as Arc<dyn NewsProvider>], store.clone());

    let (a, b) = tokio::join!(first.fetch_all(), second.fetch_all());
    let (a, b) = (a?, b?);

    assert_eq!(store.count().await?, 3);
    assert_eq!(a.inserted + b.inserted, 3);
    Ok(())
}

#[tokio::test]
async fn abandoned_cycle_aborts_provider_tasks() -> news_aggregator::Result<()> {
    let store = Arc::new(MemoryArticleStore::new());
    let slow = StaticProvider::new(
        Source::MediaStack,
        vec![candidate("late", Source::MediaStack, Category::World, at(9, 0))],
    )
    .delayed(Duration::from_millis(200));
    let completed = slow.completed.clone();
    let aggregator = engine(vec![Arc::new(slow) as Arc<dyn NewsProvider>], store.clone());

    let gave_up = tokio::time::timeout(Duration::from_millis(20), aggregator.fetch_all()).await;
    assert!(gave_up.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert_eq!(store.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn first_write_wins_on_reingest() -> news_aggregator::Result<()> {
    let store = MemoryArticleStore::new();
    let original = candidate("same", Source::MediaStack, Category::Health, at(3, 1));
    let mut changed = original.clone();
    changed.title = "Rewritten title".to_string();

    assert_eq!(store.upsert_batch(&[original.clone()]).await?, 1);
    assert_eq!(store.upsert_batch(&[changed, original]).await?, 0);

    let stored = store.find_by_external_id("same").await?.expect("stored row");
    assert_eq!(stored.title, "Story same");
    assert_eq!(store.find_by_id(stored.id).await?.map(|a| a.external_id), Some("same".to_string()));
    assert!(store.find_by_external_id("missing").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn merge_follows_provider_order_not_completion_order() -> news_aggregator::Result<()> {
    let store = Arc::new(MemoryArticleStore::new());
    // identical timestamps, so the stored order falls back to insertion order
    let slow = StaticProvider::new(
        Source::NewsApi,
        vec![candidate("slow", Source::NewsApi, Category::World, at(4, 0))],
    )
    .delayed(Duration::from_millis(100));
    let fast = StaticProvider::new(
        Source::TheGuardian,
        vec![candidate("fast", Source::TheGuardian, Category::World, at(4, 0))],
    );
    let providers: Vec<Arc<dyn NewsProvider>> = vec![Arc::new(slow), Arc::new(fast)];
    let aggregator = engine(providers, store.clone());

    aggregator.fetch_all().await?;

    let latest = store.latest(10).await?;
    let order: Vec<_> = latest.iter().map(|a| a.external_id.as_str()).collect();
    assert_eq!(order, vec!["slow", "fast"]);
    Ok(())
}

#[tokio::test]
async fn slow_provider_times_out_without_losing_the_rest() -> news_aggregator::Result<()> {
    init_tracing();

    let store = Arc::new(MemoryArticleStore::new());
    let stuck = StaticProvider::new(
        Source::NewYorkTimes,
        vec![candidate("late", Source::NewYorkTimes, Category::Arts, at(5, 0))],
    )
    .delayed(Duration::from_secs(30));
    let quick = StaticProvider::new(
        Source::MediaStack,
        vec![candidate("quick", Source::MediaStack, Category::Arts, at(5, 1))],
    );

    let config = AggregatorConfig {
        provider_timeout: Duration::from_millis(50),
        cycle_timeout: Duration::from_secs(5),
        page_size: 10,
    };
    let providers: Vec<Arc<dyn NewsProvider>> = vec![Arc::new(stuck), Arc::new(quick)];
    let aggregator = NewsAggregator::new(providers, store.clone(), config);

    let summary = aggregator.fetch_all().await?;

    assert_eq!(summary.candidates, 1);
    assert_eq!(summary.per_source[&Source::NewYorkTimes], 0);
    assert!(store.find_by_external_id("quick").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn cycle_deadline_keeps_partial_results() -> news_aggregator::Result<()> {
    let store = Arc::new(MemoryArticleStore::new());
    let stuck = StaticProvider::new(
        Source::NewsApi,
        vec![candidate("never", Source::NewsApi, Category::World, at(6, 0))],
    )
    .delayed(Duration::from_secs(30));
    let quick = StaticProvider::new(
        Source::TheGuardian,
        vec![candidate("kept", Source::TheGuardian, Category::World, at(6, 1))],
    );

    let config = AggregatorConfig {
        provider_timeout: Duration::from_secs(60),
        cycle_timeout: Duration::from_millis(100),
        page_size: 10,
    };
    let providers: Vec<Arc<dyn NewsProvider>> = vec![Arc::new(stuck), Arc::new(quick)];
    let aggregator = NewsAggregator::new(providers, store.clone(), config);

    let summary = aggregator.fetch_all().await?;

    assert_eq!(summary.candidates, 1);
    assert_eq!(store.count().await?, 1);
    assert!(store.find_by_external_id("kept").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn search_targets_one_source_and_filters_dates() -> news_aggregator::Result<()> {
    let store = Arc::new(MemoryArticleStore::new());
    let guardian = StaticProvider::new(
        Source::TheGuardian,
        vec![
            candidate("old", Source::TheGuardian, Category::World, at(1, 0)),
            candidate("new", Source::TheGuardian, Category::World, at(20, 0)),
        ],
    );
    let mediastack = StaticProvider::new(
        Source::MediaStack,
        vec![candidate("other", Source::MediaStack, Category::World, at(20, 0))],
    );
    let providers: Vec<Arc<dyn NewsProvider>> = vec![Arc::new(guardian), Arc::new(mediastack)];
    let aggregator = engine(providers, store.clone());

    let everywhere = aggregator.search(&SearchRequest::new("story")).await?;
    assert_eq!(everywhere.len(), 3);

    let request = SearchRequest::new("story")
        .with_source(Source::TheGuardian)
        .between(Some(at(10, 0)), None);
    let found = aggregator.search(&request).await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].external_id, "new");

    let unconfigured = SearchRequest::new("story").with_source(Source::NewYorkTimes);
    assert!(aggregator.search(&unconfigured).await?.is_empty());

    // search results are not persisted
    assert_eq!(store.count().await?, 0);
    Ok(())
}

fn search_providers() -> (Arc<StaticTransport>, Arc<StaticTransport>, NewsAggregator) {
    let newsapi_body = json!({"status": "ok", "articles": [{
        "title": "Celebrity gossip",
        "url": "https://newsapi.test/gossip",
        "publishedAt": "2024-01-10T12:00:00Z"
    }]});
    let guardian_body = json!({"response": {"results": [{
        "webTitle": "Match",
        "webUrl": "https://guardian.test/match",
        "webPublicationDate": "2024-01-10T11:00:00Z",
        "sectionId": "sport"
    }]}});
    let newsapi = Arc::new(
        StaticTransport::new()
            .with(NEWSAPI_HEADLINES, 200, newsapi_body.to_string())
            .with(NEWSAPI_EVERYTHING, 200, newsapi_body.to_string()),
    );
    let guardian = Arc::new(StaticTransport::new().with(GUARDIAN, 200, guardian_body.to_string()));

    let providers: Vec<Arc<dyn NewsProvider>> = vec![
        Arc::new(NewsApiSource::new(newsapi.clone(), "a-key".to_string()).with_base_url("http://newsapi.test")),
        Arc::new(GuardianSource::new(guardian.clone(), "g-key".to_string()).with_base_url("http://guardian.test")),
    ];
    let aggregator = engine(providers, Arc::new(MemoryArticleStore::new()));
    (newsapi, guardian, aggregator)
}

#[tokio::test]
async fn category_search_leaves_out_providers_that_cannot_filter() -> news_aggregator::Result<()> {
    init_tracing();

    let (newsapi, _guardian, aggregator) = search_providers();

    let sports = aggregator
        .search(&SearchRequest::new("match").with_category(Category::Sports))
        .await?;
    assert_eq!(sports.len(), 1);
    assert!(sports.iter().all(|a| a.category == Category::Sports));
    assert!(newsapi.requested_urls().is_empty());

    let anything = aggregator.search(&SearchRequest::new("match")).await?;
    assert_eq!(anything.len(), 2);
    assert_eq!(anything[0].source, Source::NewsApi);
    assert_eq!(newsapi.requested_urls(), vec![NEWSAPI_EVERYTHING.to_string()]);
    Ok(())
}

#[tokio::test]
async fn keyword_is_optional_when_another_filter_is_set() -> news_aggregator::Result<()> {
    init_tracing();

    let (newsapi, guardian, aggregator) = search_providers();

    let sports = aggregator
        .search(&SearchRequest::new("").with_category(Category::Sports))
        .await?;
    assert_eq!(sports.len(), 2);
    assert!(sports.iter().all(|a| a.category == Category::Sports));
    // without a keyword NewsAPI can serve the category from its headlines
    assert_eq!(newsapi.requested_urls(), vec![NEWSAPI_HEADLINES.to_string()]);
    assert!(!newsapi.last_query().iter().any(|(k, _)| k == "q"));
    assert!(!guardian.last_query().iter().any(|(k, _)| k == "q"));

    let nothing = aggregator.search(&SearchRequest::new("   ")).await?;
    assert!(nothing.is_empty());
    assert_eq!(guardian.requested_urls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_search_is_rejected() {
    let aggregator = engine(Vec::new(), Arc::new(MemoryArticleStore::new()));

    let inverted = SearchRequest::new("rust").between(Some(at(5, 0)), Some(at(4, 0)));
    assert!(matches!(
        aggregator.search(&inverted).await,
        Err(AggregatorError::Validation(_))
    ));
    assert!(matches!(
        aggregator.search(&SearchRequest::new("rust").with_page_size(500)).await,
        Err(AggregatorError::Validation(_))
    ));
}

#[tokio::test]
async fn store_queries_compose_filters() -> news_aggregator::Result<()> {
    let store = MemoryArticleStore::new();
    let mut tagged = candidate("rust", Source::TheGuardian, Category::Technology, at(7, 0));
    tagged.content = Some("The RUST compiler".to_string());
    store
        .upsert_batch(&[
            tagged,
            candidate("t2", Source::MediaStack, Category::Technology, at(8, 0)),
            candidate("t3", Source::TheGuardian, Category::Sports, at(9, 0)),
        ])
        .await?;

    let by_keyword = store.query(&ArticleQuery::latest(10).with_keyword("rust")).await?;
    assert_eq!(by_keyword.total, 1);

    let by_source = store.by_source(Source::TheGuardian, 10, 1).await?;
    assert_eq!(by_source.total, 2);
    assert_eq!(by_source.items[0].external_id, "t3");

    let by_category = store.by_category(Category::Technology, 1, 2).await?;
    assert_eq!(by_category.total, 2);
    assert_eq!(by_category.last_page, 2);
    assert_eq!(by_category.items.len(), 1);
    assert_eq!(by_category.items[0].external_id, "rust");
    Ok(())
}

#[test]
fn listings_expose_value_and_display_name() {
    let sources = serde_json::to_value(NewsAggregator::list_sources()).unwrap();
    assert_eq!(sources[1], json!({"value": "the_guardian", "display_name": "The Guardian"}));
    assert_eq!(NewsAggregator::list_categories().len(), 15);
}
