//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, error, info};

use crate::collaborators::ProfileStore;
use crate::db::get_or_create_user;
use crate::flow_engine::StepOutcome;
use crate::localization::{detect_language, Language, Localizer};
use crate::recommendation::static_recommendation;
use crate::report::format_profile;

use super::ui_builder::{
    ai_period_keyboard, calculation_terms_keyboard, language_keyboard, main_menu_keyboard,
    profile_update_keyboard, set_chat_commands,
};
use super::BotState;

/// Commands reachable by slash command or main menu button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Profile,
    ChangeLanguage,
    CalculateCalories,
    StaticRecommendation,
    AiRecommendation,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Start,
        Command::Profile,
        Command::ChangeLanguage,
        Command::CalculateCalories,
        Command::StaticRecommendation,
        Command::AiRecommendation,
    ];

    /// Slash command name without the leading slash
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Profile => "profile",
            Command::ChangeLanguage => "changelanguage",
            Command::CalculateCalories => "calculatecalorieforday",
            Command::StaticRecommendation => "recommendation_static",
            Command::AiRecommendation => "recommendation_ai",
        }
    }

    pub fn description_key(&self) -> &'static str {
        match self {
            Command::Start => "command-start",
            Command::Profile => "command-profile",
            Command::ChangeLanguage => "command-change-language",
            Command::CalculateCalories => "command-calculate",
            Command::StaticRecommendation => "command-recommendation-static",
            Command::AiRecommendation => "command-recommendation-ai",
        }
    }

    /// Localization key of the main menu button
    pub fn button_key(&self) -> &'static str {
        match self {
            Command::Start => "button-start",
            Command::Profile => "button-profile",
            Command::ChangeLanguage => "button-change-language",
            Command::CalculateCalories => "button-calculate",
            Command::StaticRecommendation => "button-recommendation-static",
            Command::AiRecommendation => "button-recommendation-ai",
        }
    }

    /// Parse `/name` or `/name@botname`
    pub fn from_slash(text: &str) -> Option<Self> {
        let name = text.trim().strip_prefix('/')?;
        let name = name.split_whitespace().next()?;
        let name = name.split('@').next()?;
        Self::ALL.into_iter().find(|command| command.name() == name)
    }

    /// Match a main menu button label in any supported language
    pub fn from_button(text: &str, localizer: &dyn Localizer) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|command| {
            Language::ALL
                .into_iter()
                .any(|language| localizer.message(command.button_key(), language) == text)
        })
    }

    pub fn parse(text: &str, localizer: &dyn Localizer) -> Option<Self> {
        Self::from_slash(text).or_else(|| Self::from_button(text, localizer))
    }
}

/// List of commands sent for text nothing else claims
pub fn unknown_command_message(language: Language, localizer: &dyn Localizer) -> String {
    let mut lines = vec![localizer.message("unknown-command", language)];
    lines.extend(
        Command::ALL
            .into_iter()
            .map(|command| format!("/{} - {}", command.name(), localizer.message(command.description_key(), language))),
    );
    lines.join("\n")
}

/// Reply to `/profile`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileReply {
    pub text: String,
    /// Attach the update question keyboard
    pub offer_update: bool,
}

/// Stored profile overview; paid accounts are offered an update
pub async fn profile_reply(
    store: &dyn ProfileStore,
    chat_id: i64,
    language: Language,
    paid_account: bool,
    localizer: &dyn Localizer,
) -> ProfileReply {
    let stored = match store.load_profile(chat_id).await {
        Ok(stored) => stored,
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to load profile");
            return ProfileReply {
                text: localizer.message("error-generic", language),
                offer_update: false,
            };
        }
    };

    let mut text = match &stored {
        Some(draft) => format_profile(draft, language, localizer),
        None => format!(
            "{}\n\n{}",
            localizer.message("profile-empty", language),
            format_profile(&Default::default(), language, localizer)
        ),
    };
    text.push_str("\n\n");
    if paid_account {
        text.push_str(&localizer.message("profile-update-question", language));
    } else {
        text.push_str(&localizer.message("profile-access-paid-only", language));
    }
    ProfileReply {
        text,
        offer_update: paid_account,
    }
}

/// Goal-based advice for the stored profile
pub async fn static_recommendation_reply(
    store: &dyn ProfileStore,
    chat_id: i64,
    language: Language,
    localizer: &dyn Localizer,
) -> String {
    let draft = match store.load_profile(chat_id).await {
        Ok(draft) => draft.unwrap_or_default(),
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to load profile for static recommendation");
            return localizer.message("error-generic", language);
        }
    };
    match static_recommendation(&draft, language, localizer) {
        Ok(advice) => advice,
        Err(e) => {
            debug!(user_id = %chat_id, error = %e, "Static recommendation needs a goal");
            localizer.message("error-profile-not-complete", language)
        }
    }
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    command: Command,
    language: Language,
    paid_account: bool,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let localizer = state.localizer.as_ref();
    info!(user_id = %chat_id, command = command.name(), "Handling command");

    match command {
        Command::Start => {
            if let Err(e) = set_chat_commands(bot, chat_id, language, localizer).await {
                error!(user_id = %chat_id, error = %e, "Failed to set chat commands");
            }
            bot.send_message(chat_id, localizer.message("welcome-message", language))
                .reply_markup(main_menu_keyboard(language, localizer))
                .await?;
        }
        Command::Profile => {
            let reply = profile_reply(state.profiles.as_ref(), chat_id.0, language, paid_account, localizer).await;
            if reply.offer_update {
                bot.send_message(chat_id, reply.text)
                    .reply_markup(profile_update_keyboard(language, localizer))
                    .await?;
            } else {
                bot.send_message(chat_id, reply.text).await?;
            }
        }
        Command::ChangeLanguage => {
            bot.send_message(chat_id, localizer.message("language-choose", language))
                .reply_markup(language_keyboard())
                .await?;
        }
        Command::CalculateCalories => {
            bot.send_message(chat_id, localizer.message("calculation-terms", language))
                .reply_markup(calculation_terms_keyboard(language, localizer))
                .await?;
        }
        Command::StaticRecommendation => {
            let text = static_recommendation_reply(state.profiles.as_ref(), chat_id.0, language, localizer).await;
            bot.send_message(chat_id, text).await?;
        }
        Command::AiRecommendation => {
            if !state.recommender.is_enabled() {
                bot.send_message(chat_id, localizer.message("error-ai-disabled", language))
                    .await?;
            } else {
                bot.send_message(chat_id, localizer.message("ai-choose-period", language))
                    .reply_markup(ai_period_keyboard(language, localizer))
                    .await?;
            }
        }
    }
    Ok(())
}

async fn handle_text_message(bot: &Bot, msg: &Message, state: &BotState, text: &str) -> Result<()> {
    let chat_id = msg.chat.id;
    debug!(user_id = %chat_id, message_length = text.len(), "Received text message from user");

    // Extract user's language code from Telegram
    let telegram_language = detect_language(
        msg.from
            .as_ref()
            .and_then(|user| user.language_code.as_deref()),
    );

    let (language, paid_account) = match get_or_create_user(&state.pool, chat_id.0, telegram_language).await {
        Ok(user) => (user.language(), user.paid_account),
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to load user");
            bot.send_message(chat_id, state.localizer.message("error-generic", telegram_language))
                .await?;
            return Ok(());
        }
    };

    if let Some(command) = Command::parse(text, state.localizer.as_ref()) {
        // Any command abandons an unfinished questionnaire
        if state.engine.cancel(chat_id.0).await {
            debug!(user_id = %chat_id, command = command.name(), "Command interrupted active flow");
        }
        return handle_command(bot, msg, state, command, language, paid_account).await;
    }

    match state.engine.handle_text(chat_id.0, text).await {
        StepOutcome::NoSession => {
            bot.send_message(chat_id, unknown_command_message(language, state.localizer.as_ref()))
                .await?;
        }
        outcome => {
            debug!(user_id = %chat_id, outcome = ?outcome, "Flow step handled");
        }
    }
    Ok(())
}

pub async fn message_handler(bot: Bot, msg: Message, state: Arc<BotState>) -> Result<()> {
    match msg.text() {
        Some(text) => handle_text_message(&bot, &msg, &state, text).await?,
        None => {
            debug!(user_id = %msg.chat.id, "Received unsupported message type from user");
            let language = detect_language(
                msg.from
                    .as_ref()
                    .and_then(|user| user.language_code.as_deref()),
            );
            bot.send_message(msg.chat.id, state.localizer.message("unsupported-message", language))
                .await?;
        }
    }
    Ok(())
}
