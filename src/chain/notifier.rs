//! src/chain/notifier.rs - Notifier capability
//!
//! Everything user-visible (trade reports, sign-of-life summaries, failures)
//! goes through this seam. Delivery failures are logged and swallowed: a dead
//! Telegram relay must never stall the trading loop.

use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::Arc;
use strum_macros::Display;
use teloxide::prelude::Requester;
use teloxide::types::ChatId;
use teloxide::Bot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Severity {
    Info,
    Warning,
    Alert,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str, severity: Severity);
}

/// Fallback sink writing through the process logger.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str, severity: Severity) {
        match severity {
            Severity::Info => info!("📣 {}", text),
            Severity::Warning => warn!("📣 {}", text),
            Severity::Alert => error!("📣 {}", text),
        }
    }
}

pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: i64) -> Self {
        TelegramNotifier {
            bot: Bot::new(token),
            chat_id: ChatId(chat_id),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, severity: Severity) {
        let message = format!("[{}] {}", severity, text);
        if let Err(e) = self.bot.send_message(self.chat_id, message).await {
            warn!("Telegram notification failed: {:?}", e);
        }
    }
}

/// Fans one notification out to every configured sink.
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        FanoutNotifier { sinks }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn send(&self, text: &str, severity: Severity) {
        for sink in &self.sinks {
            sink.send(text, severity).await;
        }
    }
}
