//! In-process stores with the same contracts as the PostgreSQL ones. Used by
//! the test suites and by the CLI's `--memory` mode.

use crate::traits::{ArticleStore, PreferenceStore};
use crate::types::{
    Article, ArticleQuery, Category, NormalizedArticle, Page, Result, SettingsUpdate, UserId,
    UserPreference,
};
use async_trait::async_trait;
use chrono::Utc;
use interfaces::Source;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
struct ArticleTable {
    next_id: i64,
    rows: Vec<Article>,
    by_external_id: HashMap<String, usize>,
}

#[derive(Clone, Default)]
pub struct MemoryArticleStore {
    table: Arc<RwLock<ArticleTable>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn upsert_batch(&self, candidates: &[NormalizedArticle]) -> Result<usize> {
        let mut table = self.table.write().await;
        let now = Utc::now();
        let mut inserted = 0;

        for candidate in candidates {
            if table.by_external_id.contains_key(&candidate.external_id) {
                continue;
            }
            table.next_id += 1;
            let id = table.next_id;
            let index = table.rows.len();
            table.rows.push(Article::from_normalized(id, candidate.clone(), now));
            table.by_external_id.insert(candidate.external_id.clone(), index);
            inserted += 1;
        }

        info!("Stored {} new articles out of {} candidates", inserted, candidates.len());
        Ok(inserted)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Article>> {
        let table = self.table.read().await;
        Ok(table.rows.iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Article>> {
        let table = self.table.read().await;
        Ok(table
            .by_external_id
            .get(external_id)
            .and_then(|&index| table.rows.get(index))
            .cloned())
    }

    async fn query(&self, query: &ArticleQuery) -> Result<Page<Article>> {
        let table = self.table.read().await;
        let mut matched: Vec<&Article> = table.rows.iter().filter(|a| query.matches(a)).collect();
        matched.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(a.id.cmp(&b.id)));

        let total = matched.len() as u64;
        let items: Vec<Article> = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .cloned()
            .collect();

        debug!("Article query matched {} rows, returning {}", total, items.len());
        Ok(Page::new(items, total, query.page.max(1), query.per_page))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.table.read().await.rows.len() as u64)
    }
}

/// Switch rows in creation order, mirroring `ORDER BY id`.
type Switches<T> = HashMap<UserId, Vec<(T, bool)>>;

#[derive(Default)]
struct PreferenceTables {
    settings: HashMap<UserId, UserPreference>,
    sources: Switches<Source>,
    categories: Switches<Category>,
}

#[derive(Clone, Default)]
pub struct MemoryPreferenceStore {
    tables: Arc<RwLock<PreferenceTables>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn active<T: Copy>(switches: &Switches<T>, user: UserId) -> Vec<T> {
    switches
        .get(&user)
        .map(|rows| rows.iter().filter(|(_, on)| *on).map(|(v, _)| *v).collect())
        .unwrap_or_default()
}

fn replace<T: Copy + PartialEq>(switches: &mut Switches<T>, user: UserId, values: &[T]) {
    let mut rows: Vec<(T, bool)> = Vec::with_capacity(values.len());
    for value in values {
        if !rows.iter().any(|(v, _)| v == value) {
            rows.push((*value, true));
        }
    }
    switches.insert(user, rows);
}

fn toggle<T: Copy + PartialEq>(switches: &mut Switches<T>, user: UserId, value: T) -> bool {
    let rows = switches.entry(user).or_default();
    match rows.iter_mut().find(|(v, _)| *v == value) {
        Some((_, on)) => {
            *on = !*on;
            *on
        }
        None => {
            rows.push((value, true));
            true
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get_or_create_preference(&self, user: UserId) -> Result<UserPreference> {
        let mut tables = self.tables.write().await;
        let preference = tables
            .settings
            .entry(user)
            .or_insert_with(|| UserPreference::defaults_for(user, Utc::now()));
        Ok(preference.clone())
    }

    async fn update_preference(&self, user: UserId, update: &SettingsUpdate) -> Result<UserPreference> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let preference = tables
            .settings
            .entry(user)
            .or_insert_with(|| UserPreference::defaults_for(user, now));
        if !update.is_empty() {
            preference.apply(update, now);
        }
        Ok(preference.clone())
    }

    async fn active_sources(&self, user: UserId) -> Result<Vec<Source>> {
        Ok(active(&self.tables.read().await.sources, user))
    }

    async fn active_categories(&self, user: UserId) -> Result<Vec<Category>> {
        Ok(active(&self.tables.read().await.categories, user))
    }

    async fn set_sources(&self, user: UserId, sources: &[Source]) -> Result<()> {
        replace(&mut self.tables.write().await.sources, user, sources);
        Ok(())
    }

    async fn set_categories(&self, user: UserId, categories: &[Category]) -> Result<()> {
        replace(&mut self.tables.write().await.categories, user, categories);
        Ok(())
    }

    async fn toggle_source(&self, user: UserId, source: Source) -> Result<bool> {
        Ok(toggle(&mut self.tables.write().await.sources, user, source))
    }

    async fn toggle_category(&self, user: UserId, category: Category) -> Result<bool> {
        Ok(toggle(&mut self.tables.write().await.categories, user, category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_creates_then_flips() {
        let mut switches: Switches<Source> = HashMap::new();
        let user = UserId(1);
        assert!(toggle(&mut switches, user, Source::TheGuardian));
        assert!(!toggle(&mut switches, user, Source::TheGuardian));
        assert!(toggle(&mut switches, user, Source::TheGuardian));
        assert_eq!(active(&switches, user), vec![Source::TheGuardian]);
    }

    #[test]
    fn replace_drops_inactive_rows_and_duplicates() {
        let mut switches: Switches<Category> = HashMap::new();
        let user = UserId(7);
        toggle(&mut switches, user, Category::Arts);
        toggle(&mut switches, user, Category::Arts);
        replace(&mut switches, user, &[Category::Science, Category::Science, Category::Food]);
        assert_eq!(switches[&user].len(), 2);
        assert_eq!(active(&switches, user), vec![Category::Science, Category::Food]);
    }
}
