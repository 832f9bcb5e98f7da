pub mod commands;
pub mod transport;

use crate::flow::engine::FlowEngine;
use crate::flow::event::{CallbackAction, InboundEvent, Sender};
use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{BotCommandScope, User};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

pub use commands::Command;

/// Handler return type
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub async fn run(bot: Bot, engine: Arc<FlowEngine>) -> Result<()> {
    info!("Starting Telegram Bot...");

    setup_commands(&bot).await;

    Dispatcher::builder(bot, build_handler_tree())
        .dependencies(dptree::deps![engine])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn build_handler_tree() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    // Conversations only happen in private chats
    let private = dptree::filter(|msg: Message| msg.chat.is_private());

    let command_handler = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let message_handler = Update::filter_message()
        .chain(private)
        .branch(command_handler)
        .branch(dptree::endpoint(handle_message));

    let callback_handler = Update::filter_callback_query().endpoint(handle_callback);

    dptree::entry()
        .branch(message_handler)
        .branch(callback_handler)
}

fn sender_of(user: &User, chat_id: ChatId) -> Sender {
    Sender {
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
        ..Sender::new(user.id.0 as i64, chat_id.0)
    }
}

/// Map a non-command message to an event. Photos use the largest size.
fn message_event(msg: &Message) -> InboundEvent {
    if let Some(contact) = msg.contact() {
        return InboundEvent::Contact {
            phone_number: contact.phone_number.clone(),
        };
    }
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return InboundEvent::Photo {
            file_id: photo.file.id.0.clone(),
        };
    }
    if let Some(document) = msg.document() {
        return InboundEvent::Document {
            file_id: document.file.id.0.clone(),
            file_name: document.file_name.clone(),
        };
    }
    match msg.text() {
        Some(text) => InboundEvent::Text(text.to_string()),
        None => InboundEvent::Unsupported,
    }
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    engine: Arc<FlowEngine>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    match cmd {
        Command::Start => {
            engine
                .handle(&sender_of(user, msg.chat.id), Some(msg.id.0), InboundEvent::Start)
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
    }
    Ok(())
}

async fn handle_message(msg: Message, engine: Arc<FlowEngine>) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    engine
        .handle(&sender_of(user, msg.chat.id), Some(msg.id.0), message_event(&msg))
        .await?;
    Ok(())
}

async fn handle_callback(q: CallbackQuery, engine: Arc<FlowEngine>) -> HandlerResult {
    let (chat_id, message_id) = match &q.message {
        Some(msg) => (msg.chat().id, Some(msg.id().0)),
        // Private chat id equals user id
        None => (ChatId(q.from.id.0 as i64), None),
    };

    let action = CallbackAction::parse(q.data.as_deref().unwrap_or_default());
    if action.is_operator_action() {
        info!("Operator action {} from chat {} by {}", action, chat_id, q.from.id);
    }
    let event = InboundEvent::Callback {
        callback_id: q.id.0.clone(),
        action,
        message_id,
    };

    engine
        .handle(&sender_of(&q.from, chat_id), None, event)
        .await?;
    Ok(())
}

async fn setup_commands(bot: &Bot) {
    if let Err(e) = bot
        .set_my_commands(Command::bot_commands())
        .scope(BotCommandScope::Default)
        .await
    {
        warn!("Failed to set default commands: {:#}", e);
    } else {
        info!("✅ Set default commands for all users");
    }
}
