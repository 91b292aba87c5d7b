//! Persisted entity types.
//!
//! The serde shapes here mirror the on-disk documents exactly
//! (`users.json`, `content.json`, `settings.json`, `requests.json`,
//! `admins.json`), so a store written by an earlier deployment reads back
//! unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A chat that has contacted the bot. Keyed by chat id in [`UsersDoc`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub username: Option<String>,
    pub first_name: String,
    pub join_date: DateTime<Utc>,
    pub approved: bool,
}

/// Pending join request. Exists iff the matching user exists and is not
/// yet approved; deleted on approve and reject alike.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinRequest {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Photo,
    Video,
    Document,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub created_date: DateTime<Utc>,
}

/// One library item. `text_content` is set iff `content_type` is
/// [`ContentKind::Text`]; `file_id` (an opaque transport file reference)
/// is set for every other kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: u64,
    pub title: String,
    pub content_type: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    pub created_date: DateTime<Utc>,
}

/// The `content.json` document: categories plus the flat item list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogDoc {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub content: Vec<ContentItem>,
}

/// `users.json`. Integer keys serialize as JSON object keys, matching the
/// original string-keyed map.
pub type UsersDoc = BTreeMap<i64, UserRecord>;

/// `requests.json`.
pub type RequestsDoc = Vec<JoinRequest>;

/// `admins.json`.
pub type AdminsDoc = BTreeSet<i64>;

/// Typed settings document. Every level defaults independently, so a
/// document missing any subtree (or the whole file) reads back as the
/// defaults below rather than failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BotSettings {
    #[serde(default)]
    pub subscription: SubscriptionSettings,
    #[serde(default)]
    pub responses: ResponseSettings,
    #[serde(default)]
    pub forwarding: ForwardingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_subscription_message")]
    pub message: String,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            channels: Vec::new(),
            message: default_subscription_message(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseSettings {
    #[serde(default = "default_welcome")]
    pub welcome: String,
    #[serde(default = "default_rejected")]
    pub rejected: String,
    #[serde(default = "default_help")]
    pub help: String,
    #[serde(default = "default_subscribe_success")]
    pub subscribe_success: String,
    #[serde(default = "default_subscribe_failed")]
    pub subscribe_failed: String,
}

impl Default for ResponseSettings {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            rejected: default_rejected(),
            help: default_help(),
            subscribe_success: default_subscribe_success(),
            subscribe_failed: default_subscribe_failed(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ForwardingSettings {
    #[serde(default)]
    pub enabled: bool,
}

fn default_subscription_message() -> String {
    "📢 You need to join our channel before using the bot.".to_string()
}

fn default_welcome() -> String {
    "🎉 Welcome! Your request has been approved.\nYou can now use the bot."
        .to_string()
}

fn default_rejected() -> String {
    "❌ Your request was declined.\nContact the administrator for help.".to_string()
}

fn default_help() -> String {
    "ℹ️ For help, contact the bot administrator.".to_string()
}

fn default_subscribe_success() -> String {
    "✅ Subscription verified, thank you!".to_string()
}

fn default_subscribe_failed() -> String {
    "❌ Subscription not verified yet.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults_survive_missing_subtrees() {
        let parsed: BotSettings = serde_json::from_str(r#"{"subscription":{"enabled":true}}"#)
            .expect("valid json");
        assert!(parsed.subscription.enabled);
        assert_eq!(parsed.subscription.message, default_subscription_message());
        assert_eq!(parsed.responses.welcome, default_welcome());
        assert!(!parsed.forwarding.enabled);

        let empty: BotSettings = serde_json::from_str("{}").expect("valid json");
        assert_eq!(empty, BotSettings::default());
    }

    #[test]
    fn content_kind_wire_names() {
        let kind: ContentKind = serde_json::from_str(r#""photo""#).expect("valid json");
        assert_eq!(kind, ContentKind::Photo);
        assert_eq!(
            serde_json::to_string(&ContentKind::Document).expect("serializes"),
            r#""document""#
        );
    }

    #[test]
    fn users_doc_round_trips_integer_keys() {
        let mut users = UsersDoc::new();
        users.insert(
            42,
            UserRecord {
                username: Some("someone".into()),
                first_name: "Some".into(),
                join_date: Utc::now(),
                approved: false,
            },
        );
        let json = serde_json::to_string(&users).expect("serializes");
        assert!(json.contains(r#""42""#));
        let back: UsersDoc = serde_json::from_str(&json).expect("parses");
        assert_eq!(back, users);
    }
}
