//! Bot initialization and command definitions
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command list registration in the Telegram UI

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::conversation::Intent;
use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Я умею:")]
pub enum Command {
    #[command(description = "главное меню")]
    Start,
    #[command(description = "справка по командам")]
    Help,
    #[command(description = "проверить пароль на утечки", aliases = ["check_password"])]
    Password,
    #[command(description = "тренировка распознавания фишинга")]
    Phishing,
    #[command(description = "тест по кибербезопасности", aliases = ["test"])]
    Quiz,
    #[command(description = "проверить файл на вирусы")]
    Upload,
    #[command(description = "мой прогресс")]
    Progress,
    #[command(description = "отменить текущее действие")]
    Cancel,
}

impl From<Command> for Intent {
    fn from(command: Command) -> Self {
        match command {
            Command::Start => Intent::Start,
            Command::Help => Intent::Help,
            Command::Password => Intent::Password,
            Command::Phishing => Intent::Phishing,
            Command::Quiz => Intent::Quiz,
            Command::Upload => Intent::Upload,
            Command::Progress => Intent::Progress,
            Command::Cancel => Intent::Cancel,
        }
    }
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (invalid URL, bad client config)
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    // Local Bot API server, if configured
    let bot = match std::env::var("BOT_API_URL") {
        Ok(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        Err(_) => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
///
/// # Returns
/// * `Ok(())` - Commands set successfully
/// * `Err(RequestError)` - Failed to set commands
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "главное меню"),
        BotCommand::new("help", "справка по командам"),
        BotCommand::new("password", "проверить пароль на утечки"),
        BotCommand::new("phishing", "тренировка распознавания фишинга"),
        BotCommand::new("quiz", "тест по кибербезопасности"),
        BotCommand::new("upload", "проверить файл на вирусы"),
        BotCommand::new("progress", "мой прогресс"),
        BotCommand::new("cancel", "отменить текущее действие"),
    ])
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_descriptions() {
        let command_list = format!("{}", Command::descriptions());

        assert!(command_list.contains("Я умею"));
        assert!(command_list.contains("password"));
        assert!(command_list.contains("upload"));
        assert!(command_list.contains("cancel"));
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/quiz", "cybertutor_bot").ok(), Some(Command::Quiz));
        assert_eq!(Command::parse("/progress", "cybertutor_bot").ok(), Some(Command::Progress));
        assert!(Command::parse("/download", "cybertutor_bot").is_err());
    }

    #[test]
    fn test_legacy_command_names() {
        assert_eq!(Command::parse("/test", "cybertutor_bot").ok(), Some(Command::Quiz));
        assert_eq!(
            Command::parse("/check_password", "cybertutor_bot").ok(),
            Some(Command::Password)
        );
    }

    #[test]
    fn test_command_maps_to_intent() {
        assert_eq!(Intent::from(Command::Cancel), Intent::Cancel);
        assert_eq!(Intent::from(Command::Upload), Intent::Upload);
    }
}
