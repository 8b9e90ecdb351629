use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use calorizer::bot::{self, BotState, TelegramMessenger};
use calorizer::collaborators::{Messenger, ProfileStore, RecommendationProvider, UserStore};
use calorizer::config::BotConfig;
use calorizer::db::{self, PgProfileStore};
use calorizer::flow_engine::FlowEngine;
use calorizer::localization::{LocalizationManager, Localizer};
use calorizer::recommendation::{GeminiClient, RecommendationService};
use calorizer::session_store::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Calorizer Telegram Bot");

    let config = BotConfig::from_env().context("Invalid configuration")?;

    info!(max_connections = config.database_max_connections, "Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    db::init_database_schema(&pool).await?;

    let localizer: Arc<dyn Localizer> = Arc::new(
        LocalizationManager::new(&config.locales_dir).context("Failed to load localization resources")?,
    );

    let (provider, cooldown) = match config.ai.clone() {
        Some(ai) => {
            let cooldown = Duration::from_secs(ai.cooldown_secs);
            let client: Arc<dyn RecommendationProvider> = Arc::new(GeminiClient::new(ai, Arc::clone(&localizer))?);
            (Some(client), cooldown)
        }
        None => {
            warn!("AI_API_URL or AI_API_KEY not set, AI recommendations disabled");
            (None, Duration::ZERO)
        }
    };
    let recommender = Arc::new(RecommendationService::new(provider, cooldown));

    // Initialize the bot
    let bot = Bot::new(&config.telegram_bot_token);

    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot.clone()));
    let pg_store = Arc::new(PgProfileStore::new(pool.clone()));
    let profiles: Arc<dyn ProfileStore> = pg_store.clone();
    let users: Arc<dyn UserStore> = pg_store;
    let engine = FlowEngine::new(
        Arc::new(SessionStore::new()),
        Arc::clone(&profiles),
        Arc::clone(&messenger),
        Arc::clone(&localizer),
    );

    let state = Arc::new(BotState {
        pool,
        profiles,
        users,
        engine,
        localizer,
        recommender,
        messenger,
    });

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
