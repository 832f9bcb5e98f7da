use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::adaptors::throttle::{Limits, Throttle};
use teloxide::prelude::*;
use teloxide::types::{
    ButtonRequest, CallbackQueryId, FileId, InlineKeyboardButton, InlineKeyboardMarkup,
    InputFile, InputMedia, InputMediaPhoto, KeyboardButton, KeyboardMarkup, KeyboardRemove,
    MessageId, ReplyMarkup,
};
use tracing::debug;
use url::Url;

/// Telegram caps a media group at 10 items
pub const MAX_PHOTOS_PER_GROUP: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    Callback { label: String, data: String },
    Url { label: String, url: Url },
}

impl Button {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Callback {
            label: label.into(),
            data: data.into(),
        }
    }

    pub fn url(label: impl Into<String>, url: Url) -> Self {
        Self::Url {
            label: label.into(),
            url,
        }
    }
}

/// Keyboard attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    /// Rows of inline buttons
    Inline(Vec<Vec<Button>>),
    /// One-time reply keyboard asking the user to share their contact
    RequestContact(String),
    /// Remove any reply keyboard
    Remove,
}

impl Markup {
    pub fn single(button: Button) -> Self {
        Self::Inline(vec![vec![button]])
    }

    fn into_reply_markup(self) -> ReplyMarkup {
        match self {
            Markup::Inline(rows) => ReplyMarkup::InlineKeyboard(inline_keyboard(rows)),
            Markup::RequestContact(label) => ReplyMarkup::Keyboard(
                KeyboardMarkup::new(vec![vec![
                    KeyboardButton::new(label).request(ButtonRequest::Contact)
                ]])
                .resize_keyboard()
                .one_time_keyboard(),
            ),
            Markup::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
        }
    }
}

fn inline_keyboard(rows: Vec<Vec<Button>>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.into_iter().map(|row| {
        row.into_iter()
            .map(|button| match button {
                Button::Callback { label, data } => InlineKeyboardButton::callback(label, data),
                Button::Url { label, url } => InlineKeyboardButton::url(label, url),
            })
            .collect::<Vec<_>>()
    }))
}

/// Outbound side of the messaging platform.
///
/// Chat ids and message ids are plain integers so the conversation logic and
/// its tests never touch teloxide types.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str, markup: Option<Markup>) -> Result<i32>;

    /// Only inline markup survives an edit.
    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<()>;

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()>;

    async fn send_document(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<i32>;

    /// Sends photos as media groups of at most [`MAX_PHOTOS_PER_GROUP`];
    /// the caption goes on the first photo.
    async fn send_photos(
        &self,
        chat_id: i64,
        file_ids: &[String],
        caption: Option<&str>,
    ) -> Result<Vec<i32>>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, alert: bool)
        -> Result<()>;
}

pub type ThrottledBot = Throttle<Bot>;

/// [`Transport`] over the Bot API, throttled to Telegram's rate limits.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: ThrottledBot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot: bot.throttle(Limits::default()),
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, text: &str, markup: Option<Markup>) -> Result<i32> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(markup) = markup {
            request = request.reply_markup(markup.into_reply_markup());
        }

        let message = request.await.context("Failed to send Telegram message")?;
        Ok(message.id.0)
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<()> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text);
        if let Some(Markup::Inline(rows)) = markup {
            request = request.reply_markup(inline_keyboard(rows));
        }

        request.await.context("Failed to edit message")?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .context("Failed to delete message")?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<i32> {
        let input_file = InputFile::file_id(FileId(file_id.to_string()));
        let mut request = self.bot.send_document(ChatId(chat_id), input_file);
        if let Some(cap) = caption {
            request = request.caption(cap);
        }

        let message = request.await.context("Failed to send document")?;
        Ok(message.id.0)
    }

    async fn send_photos(
        &self,
        chat_id: i64,
        file_ids: &[String],
        caption: Option<&str>,
    ) -> Result<Vec<i32>> {
        let mut sent = Vec::with_capacity(file_ids.len());

        for (batch_idx, chunk) in file_ids.chunks(MAX_PHOTOS_PER_GROUP).enumerate() {
            let media: Vec<InputMedia> = chunk
                .iter()
                .enumerate()
                .map(|(idx, file_id)| {
                    let mut photo =
                        InputMediaPhoto::new(InputFile::file_id(FileId(file_id.clone())));
                    if batch_idx == 0 && idx == 0 {
                        if let Some(cap) = caption {
                            photo = photo.caption(cap);
                        }
                    }
                    InputMedia::Photo(photo)
                })
                .collect();

            let messages = self
                .bot
                .send_media_group(ChatId(chat_id), media)
                .await
                .context("Failed to send media group")?;
            sent.extend(messages.iter().map(|m| m.id.0));
        }

        debug!("Sent {} photo(s) to chat {}", sent.len(), chat_id);
        Ok(sent)
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<()> {
        let mut request = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(text) = text {
            request = request.text(text);
        }
        if alert {
            request = request.show_alert(true);
        }

        request.await.context("Failed to answer callback query")?;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Text {
            chat_id: i64,
            message_id: i32,
            text: String,
            markup: Option<Markup>,
        },
        Edit {
            chat_id: i64,
            message_id: i32,
            text: String,
        },
        Delete {
            chat_id: i64,
            message_id: i32,
        },
        Document {
            chat_id: i64,
            file_id: String,
            caption: Option<String>,
        },
        Photos {
            chat_id: i64,
            file_ids: Vec<String>,
            caption: Option<String>,
        },
        Answer {
            callback_id: String,
            text: Option<String>,
            alert: bool,
        },
    }

    /// Transport fake that records every call and hands out increasing ids.
    pub struct RecordingTransport {
        calls: Mutex<Vec<Call>>,
        next_id: AtomicI32,
        fail_deletes: AtomicBool,
        fail_chat: Mutex<Option<i64>>,
    }

    impl Default for RecordingTransport {
        fn default() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                next_id: AtomicI32::new(1000),
                fail_deletes: AtomicBool::new(false),
                fail_chat: Mutex::new(None),
            }
        }
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_deletes(&self) {
            self.fail_deletes.store(true, Ordering::SeqCst);
        }

        /// Every send to `chat_id` fails from now on.
        pub fn fail_chat(&self, chat_id: i64) {
            *self.fail_chat.lock().unwrap() = Some(chat_id);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }

        pub fn texts_to(&self, chat: i64) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Text { chat_id, text, .. } if chat_id == chat => Some(text),
                    _ => None,
                })
                .collect()
        }

        pub fn last_text_to(&self, chat: i64) -> Option<(String, Option<Markup>)> {
            self.calls().into_iter().rev().find_map(|c| match c {
                Call::Text {
                    chat_id,
                    text,
                    markup,
                    ..
                } if chat_id == chat => Some((text, markup)),
                _ => None,
            })
        }

        pub fn edits(&self) -> Vec<(i64, i32, String)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Edit {
                        chat_id,
                        message_id,
                        text,
                    } => Some((chat_id, message_id, text)),
                    _ => None,
                })
                .collect()
        }

        pub fn deleted(&self) -> Vec<i32> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Delete { message_id, .. } => Some(message_id),
                    _ => None,
                })
                .collect()
        }

        pub fn answers(&self) -> Vec<(Option<String>, bool)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Answer { text, alert, .. } => Some((text, alert)),
                    _ => None,
                })
                .collect()
        }

        fn push(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn next_id(&self) -> i32 {
            self.next_id.fetch_add(1, Ordering::SeqCst)
        }

        fn check_chat(&self, chat_id: i64) -> Result<()> {
            if *self.fail_chat.lock().unwrap() == Some(chat_id) {
                anyhow::bail!("chat {} unreachable", chat_id);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_text(
            &self,
            chat_id: i64,
            text: &str,
            markup: Option<Markup>,
        ) -> Result<i32> {
            self.check_chat(chat_id)?;
            let message_id = self.next_id();
            self.push(Call::Text {
                chat_id,
                message_id,
                text: text.to_string(),
                markup,
            });
            Ok(message_id)
        }

        async fn edit_text(
            &self,
            chat_id: i64,
            message_id: i32,
            text: &str,
            _markup: Option<Markup>,
        ) -> Result<()> {
            self.push(Call::Edit {
                chat_id,
                message_id,
                text: text.to_string(),
            });
            Ok(())
        }

        async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
            self.push(Call::Delete {
                chat_id,
                message_id,
            });
            if self.fail_deletes.load(Ordering::SeqCst) {
                anyhow::bail!("message can't be deleted");
            }
            Ok(())
        }

        async fn send_document(
            &self,
            chat_id: i64,
            file_id: &str,
            caption: Option<&str>,
        ) -> Result<i32> {
            self.check_chat(chat_id)?;
            self.push(Call::Document {
                chat_id,
                file_id: file_id.to_string(),
                caption: caption.map(str::to_string),
            });
            Ok(self.next_id())
        }

        async fn send_photos(
            &self,
            chat_id: i64,
            file_ids: &[String],
            caption: Option<&str>,
        ) -> Result<Vec<i32>> {
            self.check_chat(chat_id)?;
            self.push(Call::Photos {
                chat_id,
                file_ids: file_ids.to_vec(),
                caption: caption.map(str::to_string),
            });
            Ok(file_ids.iter().map(|_| self.next_id()).collect())
        }

        async fn answer_callback(
            &self,
            callback_id: &str,
            text: Option<&str>,
            alert: bool,
        ) -> Result<()> {
            self.push(Call::Answer {
                callback_id: callback_id.to_string(),
                text: text.map(str::to_string),
                alert,
            });
            Ok(())
        }
    }
}
