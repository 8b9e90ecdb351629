//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: commands, main menu buttons and free text
//! - `callback_handler`: inline keyboard callback queries
//! - `ui_builder`: keyboards, command lists and the Telegram [`Messenger`]

use sqlx::postgres::PgPool;
use std::sync::Arc;

use crate::collaborators::{Messenger, ProfileStore, UserStore};
use crate::flow_engine::FlowEngine;
use crate::localization::Localizer;
use crate::recommendation::RecommendationService;

pub mod callback_handler;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;
pub use ui_builder::TelegramMessenger;

/// Shared state injected into every handler
pub struct BotState {
    pub pool: PgPool,
    pub profiles: Arc<dyn ProfileStore>,
    pub users: Arc<dyn UserStore>,
    pub engine: FlowEngine,
    pub localizer: Arc<dyn Localizer>,
    pub recommender: Arc<RecommendationService>,
    pub messenger: Arc<dyn Messenger>,
}
