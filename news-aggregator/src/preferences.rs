use crate::traits::PreferenceStore;
use crate::types::{
    AggregatorError, Category, EnumOption, Labelled, Result, SettingsUpdate, UserId,
    UserPreference,
};
use interfaces::Source;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub const MIN_ARTICLES_PER_PAGE: u32 = 5;
pub const MAX_ARTICLES_PER_PAGE: u32 = 100;

/// Raw preference changes as they arrive from the web layer. Nothing is
/// written unless every field validates.
#[derive(Debug, Clone, Default)]
pub struct PreferenceUpdate {
    pub language: Option<String>,
    pub country: Option<String>,
    pub articles_per_page: Option<u32>,
    pub notifications_enabled: Option<bool>,
    pub settings: Option<Value>,
    pub sources: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceSnapshot {
    pub preference: UserPreference,
    pub sources: Vec<EnumOption>,
    pub categories: Vec<EnumOption>,
}

pub struct PreferenceService {
    store: Arc<dyn PreferenceStore>,
}

impl PreferenceService {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub async fn snapshot(&self, user: UserId) -> Result<PreferenceSnapshot> {
        let preference = self.store.get_or_create_preference(user).await?;
        let sources = self.store.active_sources(user).await?;
        let categories = self.store.active_categories(user).await?;

        Ok(PreferenceSnapshot {
            preference,
            sources: sources.iter().map(Labelled::option).collect(),
            categories: categories.iter().map(Labelled::option).collect(),
        })
    }

    pub async fn update(&self, user: UserId, update: PreferenceUpdate) -> Result<PreferenceSnapshot> {
        let settings = SettingsUpdate {
            language: update.language.as_deref().map(|l| country_or_language("language", l)).transpose()?,
            country: update.country.as_deref().map(|c| country_or_language("country", c)).transpose()?,
            articles_per_page: update.articles_per_page.map(articles_per_page).transpose()?,
            notifications_enabled: update.notifications_enabled,
            settings: update.settings,
        };
        let sources = update.sources.as_deref().map(parse_sources).transpose()?;
        let categories = update.categories.as_deref().map(parse_categories).transpose()?;

        self.store.update_preference(user, &settings).await?;
        if let Some(sources) = sources {
            self.store.set_sources(user, &sources).await?;
        }
        if let Some(categories) = categories {
            self.store.set_categories(user, &categories).await?;
        }

        info!("Preferences updated for user {}", user);
        self.snapshot(user).await
    }

    pub async fn set_sources(&self, user: UserId, raw: &[String]) -> Result<()> {
        let sources = parse_sources(raw)?;
        self.store.set_sources(user, &sources).await
    }

    pub async fn set_categories(&self, user: UserId, raw: &[String]) -> Result<()> {
        let categories = parse_categories(raw)?;
        self.store.set_categories(user, &categories).await
    }

    pub async fn toggle_source(&self, user: UserId, raw: &str) -> Result<bool> {
        let source: Source = raw.trim().parse()?;
        let active = self.store.toggle_source(user, source).await?;
        info!("User {} turned {} {}", user, source, if active { "on" } else { "off" });
        Ok(active)
    }

    pub async fn toggle_category(&self, user: UserId, raw: &str) -> Result<bool> {
        let category: Category = raw.trim().parse()?;
        let active = self.store.toggle_category(user, category).await?;
        info!("User {} turned {} {}", user, category, if active { "on" } else { "off" });
        Ok(active)
    }
}

fn parse_sources(raw: &[String]) -> Result<Vec<Source>> {
    raw.iter()
        .map(|s| s.trim().parse::<Source>().map_err(AggregatorError::from))
        .collect()
}

fn parse_categories(raw: &[String]) -> Result<Vec<Category>> {
    raw.iter()
        .map(|c| c.trim().parse::<Category>().map_err(AggregatorError::from))
        .collect()
}

/// Two ASCII letters, stored lowercase.
fn country_or_language(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(value.to_ascii_lowercase())
    } else {
        Err(AggregatorError::Validation(format!(
            "{} must be a two-letter code, got {:?}",
            field, value
        )))
    }
}

fn articles_per_page(value: u32) -> Result<u32> {
    if (MIN_ARTICLES_PER_PAGE..=MAX_ARTICLES_PER_PAGE).contains(&value) {
        Ok(value)
    } else {
        Err(AggregatorError::Validation(format!(
            "articles per page must be between {} and {}",
            MIN_ARTICLES_PER_PAGE, MAX_ARTICLES_PER_PAGE
        )))
    }
}
