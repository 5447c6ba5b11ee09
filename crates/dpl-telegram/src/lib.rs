//! Telegram adapter (teloxide).
//!
//! This crate implements the `dpl-core` MessagingPort over the Telegram Bot API.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{AllowedUpdate, InputFile, ParseMode, UpdateKind},
};

use tokio::time::sleep;

use dpl_core::{
    domain::{ChatId, Destination, MessageId, MessageRef, ThreadId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{DocumentUpload, IncomingMessage},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        Self::new(Bot::new(token))
    }

    /// `@username` of the bot; also validates the token.
    pub async fn username(&self) -> Result<String> {
        let me = self.with_retry(|| self.bot.get_me()).await?;
        Ok(me.username().to_string())
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transmit(e.to_string())
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        // Only flood-control waits are retried; everything else is a single attempt.
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

fn to_incoming(update: Update) -> Option<IncomingMessage> {
    let update_id = i64::from(update.id);
    let UpdateKind::Message(msg) = update.kind else {
        return None;
    };
    Some(IncomingMessage {
        update_id,
        chat_id: ChatId(msg.chat.id.0),
        thread_id: msg.thread_id.map(ThreadId),
        username: msg
            .from()
            .map(|u| u.username.clone().unwrap_or_else(|| u.full_name())),
        text: msg.text().map(str::to_string),
    })
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, dest: Destination, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let mut req = self.bot.send_message(Self::tg_chat(dest.chat_id), text.to_string());
                if let Some(t) = dest.thread_id {
                    req = req.message_thread_id(t.0);
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id: dest.chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_document(&self, dest: Destination, doc: DocumentUpload<'_>) -> Result<MessageRef> {
        let path = doc.path.to_path_buf();
        let msg = self
            .with_retry(|| {
                let file = InputFile::file(path.clone()).file_name(doc.file_name.to_string());
                let mut req = self
                    .bot
                    .send_document(Self::tg_chat(dest.chat_id), file)
                    .caption(doc.caption.to_string())
                    .parse_mode(ParseMode::MarkdownV2);
                if let Some(t) = dest.thread_id {
                    req = req.message_thread_id(t.0);
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id: dest.chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn poll_messages(&self, offset: i64, timeout: Duration) -> Result<Vec<IncomingMessage>> {
        let offset = i32::try_from(offset).unwrap_or(i32::MAX);
        let timeout_secs = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);
        let updates = self
            .with_retry(|| {
                self.bot
                    .get_updates()
                    .offset(offset)
                    .timeout(timeout_secs)
                    .allowed_updates(vec![AllowedUpdate::Message])
            })
            .await?;

        Ok(updates.into_iter().filter_map(to_incoming).collect())
    }
}
