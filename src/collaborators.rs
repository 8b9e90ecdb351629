//! Collaborator interfaces the flow engine talks to.
//!
//! The Telegram, PostgreSQL and HTTP implementations live in [`crate::bot`],
//! [`crate::db`] and [`crate::recommendation`]; tests substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;

use crate::formulas::CalorieReport;
use crate::localization::Language;
use crate::profile::{PhysicalProfile, ProfileDraft};
use crate::recommendation::RecommendationPeriod;

/// One button of a selection prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectableOption {
    pub label: String,
    pub signal: String,
}

impl SelectableOption {
    pub fn new(label: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            signal: signal.into(),
        }
    }
}

/// Outbound chat transport
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: String) -> Result<()>;

    /// Send `text` with one button per option; a press comes back as a selection event
    async fn send_selection_prompt(
        &self,
        chat_id: i64,
        text: String,
        options: Vec<SelectableOption>,
    ) -> Result<()>;
}

/// Persistent profile storage and account entitlement
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_profile(&self, chat_id: i64) -> Result<Option<ProfileDraft>>;

    async fn save_profile(&self, chat_id: i64, profile: &ProfileDraft) -> Result<()>;

    /// Whether the account may edit its stored profile
    async fn is_entitled(&self, chat_id: i64) -> Result<bool>;
}

/// Generates nutrition advice for a complete profile
#[async_trait]
pub trait RecommendationProvider: Send + Sync {
    async fn recommend(
        &self,
        profile: &PhysicalProfile,
        report: &CalorieReport,
        period: RecommendationPeriod,
        language: Language,
    ) -> Result<String>;
}

/// Per-account settings outside the profile
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Store the preferred language; returns whether an account was updated
    async fn update_language(&self, chat_id: i64, language: Language) -> Result<bool>;
}
