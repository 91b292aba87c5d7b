//! Telegram-backed implementations of the transport seams.

use crate::models::JoinRequest;
use crate::transport::{Membership, Transport, TransportError};
use crate::utils::{split_message, MAX_MESSAGE_LEN};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatMemberStatus, InlineKeyboardButton, InlineKeyboardMarkup, Recipient, UserId,
};

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, user_id: i64, text: &str) -> Result<(), TransportError> {
        for part in split_message(text, MAX_MESSAGE_LEN) {
            self.bot
                .send_message(ChatId(user_id), part)
                .await
                .map_err(|e| TransportError::Delivery(e.to_string()))?;
        }
        Ok(())
    }

    async fn send_join_request(
        &self,
        admin_id: i64,
        request: &JoinRequest,
    ) -> Result<(), TransportError> {
        let username = request
            .username
            .as_deref()
            .map_or_else(|| "-".to_string(), |u| format!("@{u}"));
        let text = format!(
            "📥 New join request\n\n👤 Name: {}\n🔖 Username: {}\n🆔 ID: {}\n📅 Date: {}",
            request.first_name,
            username,
            request.user_id,
            request.date.format("%Y-%m-%d %H:%M"),
        );
        let keyboard = InlineKeyboardMarkup::new(vec![
            vec![
                InlineKeyboardButton::callback("✅ Accept", format!("accept_{}", request.user_id)),
                InlineKeyboardButton::callback("❌ Reject", format!("reject_{}", request.user_id)),
            ],
            vec![InlineKeyboardButton::callback(
                "📋 All requests",
                "view_requests".to_string(),
            )],
        ]);
        self.bot
            .send_message(ChatId(admin_id), text)
            .reply_markup(keyboard)
            .await
            .map_err(|e| TransportError::Delivery(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Membership for TelegramTransport {
    async fn is_member(&self, channel: &str, user_id: i64) -> Result<bool, TransportError> {
        let recipient = if channel.starts_with('@') {
            Recipient::ChannelUsername(channel.to_string())
        } else if let Ok(id) = channel.parse::<i64>() {
            Recipient::Id(ChatId(id))
        } else {
            Recipient::ChannelUsername(format!("@{channel}"))
        };
        let member = self
            .bot
            .get_chat_member(recipient, UserId(user_id as u64))
            .await
            .map_err(|e| TransportError::Membership(e.to_string()))?;
        // Restricted members lost full access; the gate treats them as
        // outside the channel.
        Ok(!matches!(
            member.status(),
            ChatMemberStatus::Left | ChatMemberStatus::Banned | ChatMemberStatus::Restricted
        ))
    }
}
