//! [`ChatTransport`] backed by the Telegram Bot API.

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use teloxide::RequestError;

use crate::conversation::transport::{ChatTransport, Keyboard, MessageRef, Reply, TransportError};

impl From<RequestError> for TransportError {
    fn from(e: RequestError) -> Self {
        let text = e.to_string();
        if text.contains("message is not modified") {
            TransportError::NotModified
        } else {
            TransportError::Request(text)
        }
    }
}

fn to_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send(&self, chat_id: i64, reply: Reply) -> Result<MessageRef, TransportError> {
        let mut request = self.bot.send_message(ChatId(chat_id), reply.text);
        if let Some(keyboard) = &reply.keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        let sent = request.await?;
        Ok(MessageRef {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0,
        })
    }

    async fn edit(&self, message: MessageRef, reply: Reply) -> Result<(), TransportError> {
        let mut request =
            self.bot
                .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), reply.text);
        if let Some(keyboard) = &reply.keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        request.await?;
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<(), TransportError> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<String>) -> Result<(), TransportError> {
        let mut request = self.bot.answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(text) = text {
            request = request.text(text);
        }
        request.await?;
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let file = self.bot.get_file(FileId(file_id.to_string())).await?;
        log::debug!("Downloading file {} ({} bytes)", file.path, file.size);

        let mut buffer = Vec::with_capacity(file.size as usize);
        self.bot
            .download_file(&file.path, &mut buffer)
            .await
            .map_err(|e| TransportError::Download(e.to_string()))?;
        Ok(buffer)
    }
}
