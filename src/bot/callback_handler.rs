//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, error, info, warn};

use crate::collaborators::UserStore;
use crate::db::get_or_create_user;
use crate::dialogue::FlowMode;
use crate::flow_engine::StepOutcome;
use crate::localization::{detect_language, Language, Localizer};
use crate::recommendation::{RecommendationError, RecommendationPeriod};

use super::ui_builder::{main_menu_keyboard, profile_update_mode_keyboard, set_chat_commands};
use super::BotState;

/// Where a callback's data is routed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackRoute {
    Language(Language),
    AgreeCalculate,
    DisagreeCalculate,
    ProfileUpdateYes,
    ProfileUpdateNo,
    ProfileUpdateAll,
    ProfileUpdateOneByOne,
    AiRecommendation(RecommendationPeriod),
    /// Anything else belongs to the user's active flow
    Flow(String),
}

impl CallbackRoute {
    pub fn parse(data: &str) -> Self {
        match data {
            "AGREE_CALCULATE" => CallbackRoute::AgreeCalculate,
            "DISAGREE_CALCULATE" => CallbackRoute::DisagreeCalculate,
            "PROFILE_DATA_UPDATE_YES" => CallbackRoute::ProfileUpdateYes,
            "PROFILE_DATA_UPDATE_NO" => CallbackRoute::ProfileUpdateNo,
            "PROFILE_UPDATE_ALL" => CallbackRoute::ProfileUpdateAll,
            "PROFILE_UPDATE_ONE_BY_ONE" => CallbackRoute::ProfileUpdateOneByOne,
            _ => {
                if let Some(language) = data.strip_prefix("LANG_").and_then(Language::from_code) {
                    CallbackRoute::Language(language)
                } else if let Some(period) = RecommendationPeriod::from_signal(data) {
                    CallbackRoute::AiRecommendation(period)
                } else {
                    CallbackRoute::Flow(data.to_string())
                }
            }
        }
    }
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> Result<()> {
    // Answer the callback query to remove the loading state
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let chat_id = q
        .message
        .as_ref()
        .map(|message| message.chat().id)
        .unwrap_or(ChatId(q.from.id.0 as i64));
    debug!(user_id = %chat_id, data, "Received callback query from user");

    let telegram_language = detect_language(q.from.language_code.as_deref());
    let language = match get_or_create_user(&state.pool, chat_id.0, telegram_language).await {
        Ok(user) => user.language(),
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to load user");
            telegram_language
        }
    };

    let localizer = state.localizer.as_ref();
    match CallbackRoute::parse(data) {
        CallbackRoute::Language(new_language) => {
            match store_language(state.users.as_ref(), chat_id.0, language, new_language, localizer).await {
                Ok(()) => {
                    if let Err(e) = set_chat_commands(&bot, chat_id, new_language, localizer).await {
                        error!(user_id = %chat_id, error = %e, "Failed to set chat commands");
                    }
                    bot.send_message(chat_id, localizer.message("language-changed", new_language))
                        .reply_markup(main_menu_keyboard(new_language, localizer))
                        .await?;
                }
                Err(text) => {
                    bot.send_message(chat_id, text).await?;
                }
            }
        }
        CallbackRoute::AgreeCalculate => {
            state.engine.start_calculation(chat_id.0, language).await;
        }
        CallbackRoute::DisagreeCalculate => {
            bot.send_message(chat_id, localizer.message("calculation-declined", language))
                .await?;
        }
        CallbackRoute::ProfileUpdateYes => {
            bot.send_message(chat_id, localizer.message("profile-update-mode", language))
                .reply_markup(profile_update_mode_keyboard(language, localizer))
                .await?;
        }
        CallbackRoute::ProfileUpdateNo => {
            bot.send_message(chat_id, localizer.message("profile-update-declined", language))
                .await?;
        }
        CallbackRoute::ProfileUpdateAll => {
            state
                .engine
                .start_profile_update(chat_id.0, FlowMode::SequentialAll, language)
                .await;
        }
        CallbackRoute::ProfileUpdateOneByOne => {
            state
                .engine
                .start_profile_update(chat_id.0, FlowMode::SingleAttribute, language)
                .await;
        }
        CallbackRoute::AiRecommendation(period) => {
            spawn_ai_recommendation(Arc::clone(&state), chat_id.0, period, language);
        }
        CallbackRoute::Flow(signal) => match state.engine.handle_selection(chat_id.0, &signal).await {
            StepOutcome::NoSession => {
                debug!(user_id = %chat_id, signal = %signal, "Selection without active flow");
                bot.send_message(chat_id, localizer.message("error-no-active-flow", language))
                    .await?;
            }
            outcome => {
                debug!(user_id = %chat_id, outcome = ?outcome, "Flow selection handled");
            }
        },
    }

    Ok(())
}

/// Persist the chosen language; on failure returns the error text in the current language
pub async fn store_language(
    users: &dyn UserStore,
    chat_id: i64,
    current: Language,
    chosen: Language,
    localizer: &dyn Localizer,
) -> Result<(), String> {
    match users.update_language(chat_id, chosen).await {
        Ok(updated) => {
            if !updated {
                warn!(user_id = %chat_id, "Language change for unknown account");
            }
            info!(user_id = %chat_id, language = chosen.code(), "User changed language");
            Ok(())
        }
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to store language");
            Err(localizer.message("error-generic", current))
        }
    }
}

/// Run the AI request off the dispatcher so other updates keep flowing
fn spawn_ai_recommendation(state: Arc<BotState>, chat_id: i64, period: RecommendationPeriod, language: Language) {
    tokio::spawn(async move {
        let localizer = state.localizer.as_ref();
        let draft = match state.profiles.load_profile(chat_id).await {
            Ok(draft) => draft.unwrap_or_default(),
            Err(e) => {
                error!(user_id = %chat_id, error = %e, "Failed to load profile for AI recommendation");
                send_or_log(&state, chat_id, localizer.message("error-generic", language)).await;
                return;
            }
        };

        send_or_log(&state, chat_id, localizer.message("ai-generating", language)).await;
        let text = match state.recommender.recommend(chat_id, &draft, period, language).await {
            Ok(text) => text,
            Err(e) => {
                warn!(user_id = %chat_id, error = %e, "AI recommendation not delivered");
                recommendation_error_message(&e, language, localizer)
            }
        };
        send_or_log(&state, chat_id, text).await;
    });
}

/// Localized text for a failed recommendation request
pub fn recommendation_error_message(err: &RecommendationError, language: Language, localizer: &dyn Localizer) -> String {
    match err {
        RecommendationError::CoolingDown { remaining_secs } => {
            localizer.message_with_count(err.message_key(), language, *remaining_secs)
        }
        _ => localizer.message(err.message_key(), language),
    }
}

async fn send_or_log(state: &BotState, chat_id: i64, text: String) {
    if let Err(e) = state.messenger.send_text(chat_id, text).await {
        error!(user_id = %chat_id, error = %e, "Failed to send message");
    }
}
