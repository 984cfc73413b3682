use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use interfaces::{Category, Source};
use news_aggregator::sources::{GuardianSource, NyTimesSource};
use news_aggregator::{
    build_providers, db, AggregatorConfig, ArticleStore, FetchConfig, Fetcher,
    MemoryArticleStore, MemoryPreferenceStore, NewsAggregator, PersonalizationEngine,
    PgArticleStore, PgPreferenceStore, PreferenceService, PreferenceStore, ProviderKeys,
    SearchRequest, UserId,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Aggregates news from several providers into one store", long_about = None)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Keep everything in memory instead of PostgreSQL
    #[arg(long)]
    memory: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, env = "NEWSAPI_KEY", hide_env_values = true)]
    newsapi_key: Option<String>,

    #[arg(long, env = "GUARDIAN_API_KEY", hide_env_values = true)]
    guardian_key: Option<String>,

    #[arg(long, env = "NYTIMES_API_KEY", hide_env_values = true)]
    nytimes_key: Option<String>,

    #[arg(long, env = "MEDIASTACK_API_KEY", hide_env_values = true)]
    mediastack_key: Option<String>,

    #[arg(long, default_value_t = 20)]
    provider_timeout_secs: u64,

    #[arg(long, default_value_t = 60)]
    cycle_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingest cycle against every configured provider
    Fetch,
    /// Live search across providers
    Search {
        /// Optional when another filter is given
        keyword: Option<String>,
        #[arg(long)]
        source: Option<Source>,
        #[arg(long)]
        category: Option<Category>,
        /// RFC 3339 timestamp
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// RFC 3339 timestamp
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Personalized feed for a user
    Feed {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        per_page: Option<u32>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Categories,
    Sources,
    /// List the sections The Guardian publishes
    GuardianSections,
    /// Live New York Times top stories for one section
    TopStories {
        #[arg(long)]
        section: Option<String>,
    },
    ToggleSource {
        #[arg(long)]
        user: i64,
        source: String,
    },
    ToggleCategory {
        #[arg(long)]
        user: i64,
        category: String,
    },
    /// Print one stored article
    Show { id: i64 },
}

impl Cli {
    fn provider_keys(&self) -> ProviderKeys {
        ProviderKeys {
            news_api: self.newsapi_key.clone(),
            guardian: self.guardian_key.clone(),
            new_york_times: self.nytimes_key.clone(),
            mediastack: self.mediastack_key.clone(),
        }
    }

    fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
            cycle_timeout: Duration::from_secs(self.cycle_timeout_secs),
            ..AggregatorConfig::default()
        }
    }
}

async fn open_stores(cli: &Cli) -> anyhow::Result<(Arc<dyn ArticleStore>, Arc<dyn PreferenceStore>)> {
    if cli.memory {
        info!("Using in-memory stores");
        return Ok((
            Arc::new(MemoryArticleStore::new()),
            Arc::new(MemoryPreferenceStore::new()),
        ));
    }

    let Some(database_url) = cli.database_url.as_deref() else {
        bail!("either --database-url (or DATABASE_URL) or --memory is required");
    };

    let pool = db::connect(database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    db::migrate(&pool).await.context("failed to run migrations")?;
    info!("Connected to PostgreSQL");

    Ok((
        Arc::new(PgArticleStore::new(pool.clone())),
        Arc::new(PgPreferenceStore::new(pool)),
    ))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Categories => return print_json(&NewsAggregator::list_categories()),
        Command::Sources => return print_json(&NewsAggregator::list_sources()),
        Command::GuardianSections => {
            let Some(key) = cli.guardian_key.clone() else {
                bail!("--guardian-key (or GUARDIAN_API_KEY) is required");
            };
            let transport = Arc::new(Fetcher::new(FetchConfig::default())?);
            return print_json(&GuardianSource::new(transport, key).sections().await);
        }
        Command::TopStories { section } => {
            let Some(key) = cli.nytimes_key.clone() else {
                bail!("--nytimes-key (or NYTIMES_API_KEY) is required");
            };
            let transport = Arc::new(Fetcher::new(FetchConfig::default())?);
            let stories = NyTimesSource::new(transport, key)
                .top_stories(section.as_deref())
                .await;
            return print_json(&stories);
        }
        _ => {}
    }

    let (articles, preferences) = open_stores(&cli).await?;

    match &cli.command {
        Command::Fetch | Command::Search { .. } => {
            let transport = Arc::new(Fetcher::new(FetchConfig::default())?);
            let providers = build_providers(&cli.provider_keys(), transport);
            let aggregator = NewsAggregator::new(providers, articles, cli.aggregator_config());

            if let Command::Search {
                keyword,
                source,
                category,
                start,
                end,
                per_page,
            } = &cli.command
            {
                let mut request = SearchRequest::new(keyword.clone().unwrap_or_default())
                    .between(*start, *end)
                    .with_page_size(*per_page);
                if let Some(source) = source {
                    request = request.with_source(*source);
                }
                if let Some(category) = category {
                    request = request.with_category(*category);
                }
                print_json(&aggregator.search(&request).await?)
            } else {
                print_json(&aggregator.fetch_all().await?)
            }
        }
        Command::Feed {
            user,
            per_page,
            page,
        } => {
            let engine = PersonalizationEngine::new(articles, preferences);
            print_json(&engine.feed(UserId(*user), *per_page, *page).await?)
        }
        Command::ToggleSource { user, source } => {
            let service = PreferenceService::new(preferences);
            let active = service.toggle_source(UserId(*user), source).await?;
            print_json(&serde_json::json!({ "source": source, "is_active": active }))
        }
        Command::ToggleCategory { user, category } => {
            let service = PreferenceService::new(preferences);
            let active = service.toggle_category(UserId(*user), category).await?;
            print_json(&serde_json::json!({ "category": category, "is_active": active }))
        }
        Command::Show { id } => match articles.find_by_id(*id).await? {
            Some(article) => print_json(&article),
            None => bail!("article {} not found", id),
        },
        Command::Categories
        | Command::Sources
        | Command::GuardianSections
        | Command::TopStories { .. } => Ok(()),
    }
}
