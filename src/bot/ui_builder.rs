//! UI Builder module for creating keyboards, command lists and sending messages

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, BotCommandScope, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton,
    KeyboardMarkup, Recipient,
};
use tracing::debug;

use crate::collaborators::{Messenger, SelectableOption};
use crate::localization::{Language, Localizer};
use crate::recommendation::RecommendationPeriod;

use super::message_handler::Command;

/// Telegram's limit for the text of one message, in characters
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Split `text` into chunks of at most `max_chars` characters
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// One inline button per row
pub fn selection_keyboard(options: &[SelectableOption]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        options
            .iter()
            .map(|option| vec![InlineKeyboardButton::callback(option.label.clone(), option.signal.clone())]),
    )
}

/// Persistent reply keyboard with the localized command buttons
pub fn main_menu_keyboard(language: Language, localizer: &dyn Localizer) -> KeyboardMarkup {
    let label = |command: Command| KeyboardButton::new(localizer.message(command.button_key(), language));
    KeyboardMarkup::new(vec![
        vec![label(Command::CalculateCalories)],
        vec![label(Command::Profile), label(Command::ChangeLanguage)],
        vec![label(Command::StaticRecommendation), label(Command::AiRecommendation)],
    ])
    .resize_keyboard()
}

/// One button per supported language, labelled in that language
pub fn language_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![Language::ALL
        .into_iter()
        .map(|language| {
            InlineKeyboardButton::callback(language.native_name(), format!("LANG_{}", language.code()))
        })
        .collect::<Vec<_>>()])
}

pub fn calculation_terms_keyboard(language: Language, localizer: &dyn Localizer) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            format!("✅ {}", localizer.message("button-agree", language)),
            "AGREE_CALCULATE",
        ),
        InlineKeyboardButton::callback(
            format!("❌ {}", localizer.message("button-disagree", language)),
            "DISAGREE_CALCULATE",
        ),
    ]])
}

pub fn profile_update_keyboard(language: Language, localizer: &dyn Localizer) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(localizer.message("button-yes", language), "PROFILE_DATA_UPDATE_YES"),
        InlineKeyboardButton::callback(localizer.message("button-no", language), "PROFILE_DATA_UPDATE_NO"),
    ]])
}

pub fn profile_update_mode_keyboard(language: Language, localizer: &dyn Localizer) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            localizer.message("button-update-all", language),
            "PROFILE_UPDATE_ALL",
        )],
        vec![InlineKeyboardButton::callback(
            localizer.message("button-update-one-by-one", language),
            "PROFILE_UPDATE_ONE_BY_ONE",
        )],
    ])
}

pub fn ai_period_keyboard(language: Language, localizer: &dyn Localizer) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![RecommendationPeriod::ALL
        .into_iter()
        .map(|period| {
            InlineKeyboardButton::callback(
                localizer.message(&format!("button-ai-{}", period.key()), language),
                period.signal(),
            )
        })
        .collect::<Vec<_>>()])
}

/// Replace the chat's command list with descriptions in `language`
pub async fn set_chat_commands(
    bot: &Bot,
    chat_id: ChatId,
    language: Language,
    localizer: &dyn Localizer,
) -> Result<()> {
    let commands: Vec<BotCommand> = Command::ALL
        .into_iter()
        .map(|command| {
            BotCommand::new(
                command.name(),
                localizer.message(command.description_key(), language),
            )
        })
        .collect();

    bot.set_my_commands(commands)
        .scope(BotCommandScope::Chat {
            chat_id: Recipient::Id(chat_id),
        })
        .await?;
    debug!(user_id = %chat_id, language = language.code(), "Chat commands updated");
    Ok(())
}

/// [`Messenger`] sending through the Telegram Bot API
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: i64, text: String) -> Result<()> {
        for chunk in split_message(&text, MAX_MESSAGE_LENGTH) {
            self.bot.send_message(ChatId(chat_id), chunk).await?;
        }
        Ok(())
    }

    async fn send_selection_prompt(
        &self,
        chat_id: i64,
        text: String,
        options: Vec<SelectableOption>,
    ) -> Result<()> {
        let mut chunks = split_message(&text, MAX_MESSAGE_LENGTH);
        // The keyboard goes on the last chunk
        let last = chunks.pop().unwrap_or_default();
        for chunk in chunks {
            self.bot.send_message(ChatId(chat_id), chunk).await?;
        }
        self.bot
            .send_message(ChatId(chat_id), last)
            .reply_markup(selection_keyboard(&options))
            .await?;
        Ok(())
    }
}
