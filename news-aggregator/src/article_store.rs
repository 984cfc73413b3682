use crate::traits::ArticleStore;
use crate::types::{
    Article, ArticleQuery, Category, FeedScope, Labelled, Metadata, NormalizedArticle, Page,
    Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::Source;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};

const COLUMNS: &str = "id, title, description, content, url, image_url, author, source, category, \
                       published_at, external_id, metadata, created_at, updated_at";

/// PostgreSQL-backed article persistence.
pub struct PgArticleStore {
    db: PgPool,
}

impl PgArticleStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn upsert_batch(&self, candidates: &[NormalizedArticle]) -> Result<usize> {
        let mut tx = self.db.begin().await?;
        let mut inserted = 0;

        for article in candidates {
            let result = sqlx::query(
                r#"
                INSERT INTO articles (title, description, content, url, image_url, author, source,
                                      category, published_at, external_id, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (external_id) DO NOTHING
                "#,
            )
            .bind(&article.title)
            .bind(&article.description)
            .bind(&article.content)
            .bind(&article.url)
            .bind(&article.image_url)
            .bind(&article.author)
            .bind(article.source.value())
            .bind(article.category.value())
            .bind(article.published_at)
            .bind(&article.external_id)
            .bind(Value::Object(article.metadata.clone()))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        tx.commit().await?;

        info!("Stored {} new articles out of {} candidates", inserted, candidates.len());
        Ok(inserted)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Article>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM articles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(article_from_row).transpose()
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Article>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM articles WHERE external_id = $1"))
            .bind(external_id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(article_from_row).transpose()
    }

    async fn query(&self, query: &ArticleQuery) -> Result<Page<Article>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM articles WHERE TRUE");
        push_filters(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM articles WHERE TRUE"));
        push_filters(&mut select, query);
        select.push(" ORDER BY published_at DESC, id ASC LIMIT ");
        select.push_bind(i64::from(query.per_page));
        select.push(" OFFSET ");
        select.push_bind(query.offset() as i64);

        let rows = select.build().fetch_all(&self.db).await?;
        let items = rows.iter().map(article_from_row).collect::<Result<Vec<_>>>()?;

        debug!("Article query matched {} rows, returning {}", total, items.len());
        Ok(Page::new(items, total.max(0) as u64, query.page.max(1), query.per_page))
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.db)
            .await?;
        Ok(count.max(0) as u64)
    }
}

/// Appends `AND ...` clauses for every filter set on `query`.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ArticleQuery) {
    if let Some(keyword) = &query.keyword {
        let pattern = format!("%{}%", escape_like(keyword));
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR content ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(source) = query.source {
        builder.push(" AND source = ");
        builder.push_bind(source.value());
    }
    if let Some(category) = query.category {
        builder.push(" AND category = ");
        builder.push_bind(category.value());
    }
    if let Some(range) = &query.date_range {
        builder.push(" AND published_at BETWEEN ");
        builder.push_bind(range.start);
        builder.push(" AND ");
        builder.push_bind(range.end);
    }

    match &query.scope {
        FeedScope::All => {}
        FeedScope::Sources(sources) => {
            builder.push(" AND source = ANY(");
            builder.push_bind(source_values(sources));
            builder.push(")");
        }
        FeedScope::Categories(categories) => {
            builder.push(" AND category = ANY(");
            builder.push_bind(category_values(categories));
            builder.push(")");
        }
        FeedScope::SourcesOrCategories { sources, categories } => {
            builder.push(" AND (source = ANY(");
            builder.push_bind(source_values(sources));
            builder.push(") OR category = ANY(");
            builder.push_bind(category_values(categories));
            builder.push("))");
        }
    }
}

fn source_values(sources: &[Source]) -> Vec<String> {
    sources.iter().map(|s| s.value().to_string()).collect()
}

fn category_values(categories: &[Category]) -> Vec<String> {
    categories.iter().map(|c| c.value().to_string()).collect()
}

/// Escapes `ILIKE` wildcards so the keyword is matched literally.
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn article_from_row(row: &PgRow) -> Result<Article> {
    let metadata = match row.try_get::<Value, _>("metadata")? {
        Value::Object(map) => map,
        _ => Metadata::new(),
    };

    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        content: row.try_get("content")?,
        url: row.try_get("url")?,
        image_url: row.try_get("image_url")?,
        author: row.try_get("author")?,
        source: row.try_get::<String, _>("source")?.parse()?,
        category: row.try_get::<String, _>("category")?.parse()?,
        published_at: row.try_get::<DateTime<Utc>, _>("published_at")?,
        external_id: row.try_get("external_id")?,
        metadata,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
