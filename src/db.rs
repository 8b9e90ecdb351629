use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::collaborators::{ProfileStore, UserStore};
use crate::localization::Language;
use crate::profile::{ActivityLevel, MainGoal, ProfileDraft, Sex};

/// Represents a bot user
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub chat_id: i64,
    pub language_code: String,
    pub paid_account: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Stored language, English when the stored code is no longer supported
    pub fn language(&self) -> Language {
        Language::from_code(&self.language_code).unwrap_or_default()
    }
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            chat_id BIGINT PRIMARY KEY,
            language_code VARCHAR(10) NOT NULL DEFAULT 'en',
            paid_account BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS physical_profiles (
            chat_id BIGINT PRIMARY KEY REFERENCES users(chat_id) ON DELETE CASCADE,
            sex VARCHAR(16),
            height_cm DOUBLE PRECISION,
            weight_kg DOUBLE PRECISION,
            age_years INTEGER,
            body_fat_percent DOUBLE PRECISION,
            activity_level VARCHAR(32),
            main_goal VARCHAR(32),
            version INTEGER NOT NULL DEFAULT 1,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create physical_profiles table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        chat_id: row.try_get("chat_id")?,
        language_code: row.try_get("language_code")?,
        paid_account: row.try_get("paid_account")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Get or create a user; an existing user keeps their stored language
pub async fn get_or_create_user(pool: &PgPool, chat_id: i64, language: Language) -> Result<User> {
    sqlx::query("INSERT INTO users (chat_id, language_code) VALUES ($1, $2) ON CONFLICT (chat_id) DO NOTHING")
        .bind(chat_id)
        .bind(language.code())
        .execute(pool)
        .await
        .context("Failed to insert user")?;

    let row = sqlx::query("SELECT chat_id, language_code, paid_account, created_at FROM users WHERE chat_id = $1")
        .bind(chat_id)
        .fetch_one(pool)
        .await
        .context("Failed to fetch user")?;

    user_from_row(&row)
}

pub async fn get_user(pool: &PgPool, chat_id: i64) -> Result<Option<User>> {
    let row = sqlx::query("SELECT chat_id, language_code, paid_account, created_at FROM users WHERE chat_id = $1")
        .bind(chat_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user")?;

    row.as_ref().map(user_from_row).transpose()
}

/// Update the user's preferred language; returns whether a user was updated
pub async fn update_user_language(pool: &PgPool, chat_id: i64, language: Language) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET language_code = $1 WHERE chat_id = $2")
        .bind(language.code())
        .bind(chat_id)
        .execute(pool)
        .await
        .context("Failed to update user language")?;

    debug!(user_id = %chat_id, language = language.code(), "User language updated");
    Ok(result.rows_affected() > 0)
}

/// Load the stored profile, `None` when the user never saved one
pub async fn load_profile(pool: &PgPool, chat_id: i64) -> Result<Option<ProfileDraft>> {
    let row = sqlx::query(
        "SELECT sex, height_cm, weight_kg, age_years, body_fat_percent, activity_level, main_goal
         FROM physical_profiles WHERE chat_id = $1",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await
    .context("Failed to load profile")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let sex: Option<String> = row.try_get("sex")?;
    let age_years: Option<i32> = row.try_get("age_years")?;
    let activity_level: Option<String> = row.try_get("activity_level")?;
    let main_goal: Option<String> = row.try_get("main_goal")?;

    // Unknown stored names are treated as unset rather than failing the load
    Ok(Some(ProfileDraft {
        sex: sex.as_deref().and_then(Sex::from_key),
        height_cm: row.try_get("height_cm")?,
        weight_kg: row.try_get("weight_kg")?,
        age_years: age_years.and_then(|age| u32::try_from(age).ok()),
        body_fat_percent: row.try_get("body_fat_percent")?,
        activity_level: activity_level.as_deref().and_then(ActivityLevel::from_key),
        main_goal: main_goal.as_deref().and_then(MainGoal::from_key),
    }))
}

/// Insert or overwrite the whole stored profile
pub async fn save_profile(pool: &PgPool, chat_id: i64, profile: &ProfileDraft) -> Result<()> {
    let age_years = profile
        .age_years
        .map(i32::try_from)
        .transpose()
        .context("Age does not fit the database column")?;

    sqlx::query(
        "INSERT INTO physical_profiles
            (chat_id, sex, height_cm, weight_kg, age_years, body_fat_percent, activity_level, main_goal)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (chat_id) DO UPDATE SET
            sex = EXCLUDED.sex,
            height_cm = EXCLUDED.height_cm,
            weight_kg = EXCLUDED.weight_kg,
            age_years = EXCLUDED.age_years,
            body_fat_percent = EXCLUDED.body_fat_percent,
            activity_level = EXCLUDED.activity_level,
            main_goal = EXCLUDED.main_goal,
            version = physical_profiles.version + 1,
            updated_at = NOW()",
    )
    .bind(chat_id)
    .bind(profile.sex.map(|sex| sex.key()))
    .bind(profile.height_cm)
    .bind(profile.weight_kg)
    .bind(age_years)
    .bind(profile.body_fat_percent)
    .bind(profile.activity_level.map(|level| level.key()))
    .bind(profile.main_goal.map(|goal| goal.key()))
    .execute(pool)
    .await
    .context("Failed to save profile")?;

    debug!(user_id = %chat_id, "Profile saved");
    Ok(())
}

/// [`ProfileStore`] backed by the PostgreSQL pool
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn load_profile(&self, chat_id: i64) -> Result<Option<ProfileDraft>> {
        load_profile(&self.pool, chat_id).await
    }

    async fn save_profile(&self, chat_id: i64, profile: &ProfileDraft) -> Result<()> {
        save_profile(&self.pool, chat_id, profile).await
    }

    async fn is_entitled(&self, chat_id: i64) -> Result<bool> {
        Ok(get_user(&self.pool, chat_id)
            .await?
            .is_some_and(|user| user.paid_account))
    }
}

#[async_trait]
impl UserStore for PgProfileStore {
    async fn update_language(&self, chat_id: i64, language: Language) -> Result<bool> {
        update_user_language(&self.pool, chat_id, language).await
    }
}
