use crate::traits::PreferenceStore;
use crate::types::{
    Category, Labelled, Result, SettingsUpdate, UserId, UserPreference, DEFAULT_ARTICLES_PER_PAGE,
    DEFAULT_COUNTRY, DEFAULT_LANGUAGE,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::Source;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::{debug, info};

/// Switch tables share one layout: `(user_id, <column>, is_active)` unique on
/// `(user_id, <column>)`.
struct SwitchTable {
    table: &'static str,
    column: &'static str,
}

const SOURCES: SwitchTable = SwitchTable {
    table: "user_sources",
    column: "source",
};

const CATEGORIES: SwitchTable = SwitchTable {
    table: "user_categories",
    column: "category",
};

/// PostgreSQL-backed user preferences.
pub struct PgPreferenceStore {
    db: PgPool,
}

impl PgPreferenceStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn active_values<T>(&self, switches: &SwitchTable, user: UserId) -> Result<Vec<T>>
    where
        T: FromStr,
        crate::types::AggregatorError: From<T::Err>,
    {
        let values: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT {column} FROM {table} WHERE user_id = $1 AND is_active ORDER BY id",
            column = switches.column,
            table = switches.table,
        ))
        .bind(user.0)
        .fetch_all(&self.db)
        .await?;

        values
            .iter()
            .map(|v| v.parse::<T>().map_err(Into::into))
            .collect()
    }

    async fn replace_values(&self, switches: &SwitchTable, user: UserId, values: &[&'static str]) -> Result<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(&format!("DELETE FROM {} WHERE user_id = $1", switches.table))
            .bind(user.0)
            .execute(&mut *tx)
            .await?;

        let insert = format!(
            "INSERT INTO {table} (user_id, {column}, is_active) VALUES ($1, $2, TRUE) \
             ON CONFLICT (user_id, {column}) DO NOTHING",
            table = switches.table,
            column = switches.column,
        );
        for value in values {
            sqlx::query(&insert)
                .bind(user.0)
                .bind(*value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!("Replaced {} for user {} with {} entries", switches.table, user, values.len());
        Ok(())
    }

    async fn toggle_value(&self, switches: &SwitchTable, user: UserId, value: &'static str) -> Result<bool> {
        let active: bool = sqlx::query_scalar(&format!(
            "INSERT INTO {table} (user_id, {column}, is_active) VALUES ($1, $2, TRUE) \
             ON CONFLICT (user_id, {column}) \
             DO UPDATE SET is_active = NOT {table}.is_active, updated_at = NOW() \
             RETURNING is_active",
            table = switches.table,
            column = switches.column,
        ))
        .bind(user.0)
        .bind(value)
        .fetch_one(&self.db)
        .await?;

        debug!("Toggled {} {} for user {} to {}", switches.column, value, user, active);
        Ok(active)
    }

    async fn save_preference(&self, preference: &UserPreference) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE user_preferences
            SET language = $2, country = $3, articles_per_page = $4, notifications_enabled = $5,
                settings = $6, updated_at = $7
            WHERE user_id = $1
            "#,
        )
        .bind(preference.user_id.0)
        .bind(&preference.language)
        .bind(&preference.country)
        .bind(preference.articles_per_page as i32)
        .bind(preference.notifications_enabled)
        .bind(&preference.settings)
        .bind(preference.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn get_or_create_preference(&self, user: UserId) -> Result<UserPreference> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, language, country, articles_per_page,
                                          notifications_enabled, settings)
            VALUES ($1, $2, $3, $4, TRUE, $5)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user.0)
        .bind(DEFAULT_LANGUAGE)
        .bind(DEFAULT_COUNTRY)
        .bind(DEFAULT_ARTICLES_PER_PAGE as i32)
        .bind(Value::Object(Map::new()))
        .execute(&self.db)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT user_id, language, country, articles_per_page, notifications_enabled, settings,
                   created_at, updated_at
            FROM user_preferences WHERE user_id = $1
            "#,
        )
        .bind(user.0)
        .fetch_one(&self.db)
        .await?;

        preference_from_row(&row)
    }

    async fn update_preference(&self, user: UserId, update: &SettingsUpdate) -> Result<UserPreference> {
        let mut preference = self.get_or_create_preference(user).await?;
        if update.is_empty() {
            return Ok(preference);
        }

        preference.apply(update, Utc::now());
        self.save_preference(&preference).await?;
        info!("Updated preferences for user {}", user);
        Ok(preference)
    }

    async fn active_sources(&self, user: UserId) -> Result<Vec<Source>> {
        self.active_values(&SOURCES, user).await
    }

    async fn active_categories(&self, user: UserId) -> Result<Vec<Category>> {
        self.active_values(&CATEGORIES, user).await
    }

    async fn set_sources(&self, user: UserId, sources: &[Source]) -> Result<()> {
        let values: Vec<&'static str> = sources.iter().map(|s| s.value()).collect();
        self.replace_values(&SOURCES, user, &values).await
    }

    async fn set_categories(&self, user: UserId, categories: &[Category]) -> Result<()> {
        let values: Vec<&'static str> = categories.iter().map(|c| c.value()).collect();
        self.replace_values(&CATEGORIES, user, &values).await
    }

    async fn toggle_source(&self, user: UserId, source: Source) -> Result<bool> {
        self.toggle_value(&SOURCES, user, source.value()).await
    }

    async fn toggle_category(&self, user: UserId, category: Category) -> Result<bool> {
        self.toggle_value(&CATEGORIES, user, category.value()).await
    }
}

fn preference_from_row(row: &PgRow) -> Result<UserPreference> {
    Ok(UserPreference {
        user_id: UserId(row.try_get("user_id")?),
        language: row.try_get("language")?,
        country: row.try_get("country")?,
        articles_per_page: row.try_get::<i32, _>("articles_per_page")?.max(0) as u32,
        notifications_enabled: row.try_get("notifications_enabled")?,
        settings: row.try_get("settings")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
