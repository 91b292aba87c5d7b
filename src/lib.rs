//! A Telegram bot that keeps a content library behind admin approval
//! and an optional channel-subscription check.

/// Backup snapshots and restore
pub mod backup;
/// Telegram-facing layer: handlers, keyboards, transport
pub mod bot;
/// Fan-out to approved users
pub mod broadcast;
/// Categories and content items
pub mod catalog;
/// Environment-backed configuration
pub mod config;
/// Domain documents and settings
pub mod models;
/// User lifecycle and the subscription gate
pub mod moderation;
/// Per-chat admin dialogs
pub mod session;
/// The JSON document store
pub mod storage;
/// Seams between engines and Telegram
pub mod transport;
/// Text helpers
pub mod utils;
