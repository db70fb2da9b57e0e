//! Dispatcher schema: turns Telegram updates into conversation events.

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};

use crate::conversation::transport::MessageRef;
use crate::conversation::{self, Event, EventKind, FlowDeps, IncomingFile};
use crate::telegram::bot::Command;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Creates the dispatcher schema for the bot.
///
/// Commands go first, then any other message, then inline button presses.
/// Handler failures are logged and swallowed so one bad update never stops
/// the dispatcher.
pub fn schema(deps: FlowDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

fn command_handler(deps: FlowDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(move |msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                let kind = EventKind::Command {
                    intent: cmd.into(),
                    message: message_ref(&msg),
                };
                run(&deps, event_from_message(&msg, kind)).await;
                Ok(())
            }
        })
}

fn message_handler(deps: FlowDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(move |msg: Message| {
        let deps = deps.clone();
        async move {
            run(&deps, event_from_message(&msg, message_kind(&msg))).await;
            Ok(())
        }
    })
}

fn callback_handler(deps: FlowDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            run(&deps, event_from_callback(&q)).await;
            Ok(())
        }
    })
}

async fn run(deps: &FlowDeps, event: Event) {
    let user_id = event.user_id;
    if let Err(e) = conversation::dispatch(deps, event).await {
        log::error!("Failed to handle update from user {}: {}", user_id, e);
    }
}

fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
    }
}

/// Classifies a non-command message.
pub fn message_kind(msg: &Message) -> EventKind {
    let message = message_ref(msg);
    if let Some(doc) = msg.document() {
        return EventKind::File(IncomingFile {
            file_id: doc.file.id.0.clone(),
            file_name: doc.file_name.clone(),
            size: u64::from(doc.file.size),
            message,
        });
    }
    match msg.text() {
        Some(text) => EventKind::Text {
            text: text.to_string(),
            message,
        },
        None => EventKind::Other { message },
    }
}

pub fn event_from_message(msg: &Message, kind: EventKind) -> Event {
    let from = msg.from.as_ref();
    Event {
        user_id: from.and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(msg.chat.id.0),
        chat_id: msg.chat.id.0,
        username: from.and_then(|u| u.username.clone()),
        language_code: from.and_then(|u| u.language_code.clone()),
        kind,
    }
}

pub fn event_from_callback(q: &CallbackQuery) -> Event {
    let message = q.message.as_ref().map(|m| MessageRef {
        chat_id: m.chat().id.0,
        message_id: m.id().0,
    });
    let user_id = i64::try_from(q.from.id.0).unwrap_or(0);
    Event {
        user_id,
        // Private chat ids equal the user id
        chat_id: message.map(|m| m.chat_id).unwrap_or(user_id),
        username: q.from.username.clone(),
        language_code: q.from.language_code.clone(),
        kind: EventKind::Callback {
            id: q.id.0.clone(),
            data: q.data.clone().unwrap_or_default(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(extra: serde_json::Value) -> Message {
        let mut value = json!({
            "message_id": 42,
            "date": 1_700_000_000,
            "chat": {"id": 1001, "type": "private", "first_name": "Ann"},
            "from": {"id": 1001, "is_bot": false, "first_name": "Ann", "username": "ann", "language_code": "en"}
        });
        if let (Some(target), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                target.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_message_event() {
        let msg = message(json!({"text": "hunter2"}));
        let event = event_from_message(&msg, message_kind(&msg));

        assert_eq!(event.user_id, 1001);
        assert_eq!(event.chat_id, 1001);
        assert_eq!(event.username.as_deref(), Some("ann"));
        assert_eq!(event.language_code.as_deref(), Some("en"));
        assert_eq!(
            event.kind,
            EventKind::Text {
                text: "hunter2".to_string(),
                message: MessageRef {
                    chat_id: 1001,
                    message_id: 42
                },
            }
        );
    }

    #[test]
    fn test_document_message_event() {
        let msg = message(json!({
            "document": {"file_id": "BQAD", "file_unique_id": "u1", "file_size": 2048, "file_name": "invoice.exe"}
        }));

        match message_kind(&msg) {
            EventKind::File(file) => {
                assert_eq!(file.file_id, "BQAD");
                assert_eq!(file.file_name.as_deref(), Some("invoice.exe"));
                assert_eq!(file.size, 2048);
            }
            other => panic!("expected file, got {:?}", other),
        }
    }
}
