//! Command, message and callback routing.
//!
//! Handlers classify each update into a [`SessionInput`] or a direct
//! view, call the engines, and render the resulting [`Reply`] back to
//! the chat. All texts live here; the engines never format anything.

use crate::backup::Backup;
use crate::bot::App;
use crate::models::{ContentItem, ContentKind};
use crate::moderation::{Gate, Registration};
use crate::session::{
    InvalidReason, Prompt, Reply, ResponseKey, SessionInput, Trigger,
};
use crate::utils::{split_message, MAX_MESSAGE_LEN};
use anyhow::Result;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton, KeyboardMarkup,
};
use teloxide::utils::command::BotCommands;
use tracing::warn;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "Start the bot.")]
    Start,
    #[command(description = "Show help.")]
    Help,
}

/// Reply-keyboard button labels. Routing matches on these, so they
/// must stay in sync with the keyboards below.
pub mod labels {
    pub const HOME: &str = "🏠 Home";
    pub const FINISH: &str = "✅ Finish and save";

    pub const ADD_CONTENT: &str = "➕ Add content";
    pub const DELETE_CONTENT: &str = "🗑 Delete content";
    pub const ADD_CATEGORY: &str = "📁 Add category";
    pub const DELETE_CATEGORY: &str = "🗂 Delete category";
    pub const REQUESTS: &str = "📋 Join requests";
    pub const USERS: &str = "👥 Users";
    pub const STATS: &str = "📊 Stats";
    pub const BROADCAST: &str = "📣 Broadcast";
    pub const DIRECT: &str = "✉️ Direct message";
    pub const DELETE_USER: &str = "🚷 Delete user";
    pub const SETTINGS: &str = "⚙️ Settings";

    pub const TOGGLE_SUBSCRIPTION: &str = "📢 Toggle subscription check";
    pub const TOGGLE_FORWARDING: &str = "🔁 Toggle forwarding";
    pub const CHECK_SUBSCRIPTION: &str = "✅ Check subscription";
    pub const ADD_CHANNEL: &str = "➕ Add channel";
    pub const DELETE_CHANNEL: &str = "➖ Remove channel";
    pub const EDIT_SUB_MESSAGE: &str = "📝 Subscription message";
    pub const EDIT_WELCOME: &str = "👋 Welcome message";
    pub const EDIT_REJECTED: &str = "🚫 Rejection message";
    pub const EDIT_HELP: &str = "❓ Help message";
    pub const BACKUP: &str = "💾 Download backup";
    pub const RESTORE: &str = "📥 Restore backup";

    pub const LIBRARY: &str = "📚 Library";
    pub const RECENT: &str = "📰 Recent posts";
    pub const HELP: &str = "ℹ️ Help";

    pub const KIND_TEXT: &str = "📝 Text";
    pub const KIND_PHOTO: &str = "🖼 Photo";
    pub const KIND_VIDEO: &str = "🎬 Video";
    pub const KIND_DOCUMENT: &str = "📄 Document";
}

pub fn admin_keyboard() -> KeyboardMarkup {
    let keyboard = vec![
        vec![
            KeyboardButton::new(labels::ADD_CONTENT),
            KeyboardButton::new(labels::DELETE_CONTENT),
        ],
        vec![
            KeyboardButton::new(labels::ADD_CATEGORY),
            KeyboardButton::new(labels::DELETE_CATEGORY),
        ],
        vec![
            KeyboardButton::new(labels::REQUESTS),
            KeyboardButton::new(labels::USERS),
        ],
        vec![
            KeyboardButton::new(labels::BROADCAST),
            KeyboardButton::new(labels::DIRECT),
        ],
        vec![
            KeyboardButton::new(labels::STATS),
            KeyboardButton::new(labels::DELETE_USER),
        ],
        vec![KeyboardButton::new(labels::SETTINGS)],
    ];
    KeyboardMarkup::new(keyboard).resize_keyboard()
}

pub fn settings_keyboard() -> KeyboardMarkup {
    let keyboard = vec![
        vec![
            KeyboardButton::new(labels::TOGGLE_SUBSCRIPTION),
            KeyboardButton::new(labels::EDIT_SUB_MESSAGE),
        ],
        vec![
            KeyboardButton::new(labels::ADD_CHANNEL),
            KeyboardButton::new(labels::DELETE_CHANNEL),
        ],
        vec![
            KeyboardButton::new(labels::EDIT_WELCOME),
            KeyboardButton::new(labels::EDIT_REJECTED),
        ],
        vec![
            KeyboardButton::new(labels::EDIT_HELP),
            KeyboardButton::new(labels::TOGGLE_FORWARDING),
        ],
        vec![
            KeyboardButton::new(labels::BACKUP),
            KeyboardButton::new(labels::RESTORE),
        ],
        vec![KeyboardButton::new(labels::HOME)],
    ];
    KeyboardMarkup::new(keyboard).resize_keyboard()
}

pub fn user_keyboard() -> KeyboardMarkup {
    let keyboard = vec![
        vec![
            KeyboardButton::new(labels::LIBRARY),
            KeyboardButton::new(labels::RECENT),
        ],
        vec![KeyboardButton::new(labels::HELP)],
    ];
    KeyboardMarkup::new(keyboard).resize_keyboard()
}

fn kind_keyboard() -> KeyboardMarkup {
    let keyboard = vec![
        vec![
            KeyboardButton::new(labels::KIND_TEXT),
            KeyboardButton::new(labels::KIND_PHOTO),
        ],
        vec![
            KeyboardButton::new(labels::KIND_VIDEO),
            KeyboardButton::new(labels::KIND_DOCUMENT),
        ],
        vec![KeyboardButton::new(labels::HOME)],
    ];
    KeyboardMarkup::new(keyboard).resize_keyboard()
}

fn collecting_keyboard() -> KeyboardMarkup {
    let keyboard = vec![
        vec![KeyboardButton::new(labels::FINISH)],
        vec![KeyboardButton::new(labels::HOME)],
    ];
    KeyboardMarkup::new(keyboard).resize_keyboard()
}

fn home_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(labels::HOME)]]).resize_keyboard()
}

pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0 as i64)
}

fn trigger_for(text: &str) -> Option<Trigger> {
    match text {
        labels::ADD_CATEGORY => Some(Trigger::AddCategory),
        labels::DELETE_CATEGORY => Some(Trigger::DeleteCategory),
        labels::ADD_CONTENT => Some(Trigger::AddContent),
        labels::DELETE_CONTENT => Some(Trigger::DeleteContent),
        labels::DELETE_USER => Some(Trigger::DeleteUser),
        labels::EDIT_WELCOME => Some(Trigger::EditResponse(ResponseKey::Welcome)),
        labels::EDIT_REJECTED => Some(Trigger::EditResponse(ResponseKey::Rejected)),
        labels::EDIT_HELP => Some(Trigger::EditResponse(ResponseKey::Help)),
        labels::EDIT_SUB_MESSAGE => Some(Trigger::EditSubscriptionMessage),
        labels::ADD_CHANNEL => Some(Trigger::AddChannel),
        labels::DELETE_CHANNEL => Some(Trigger::DeleteChannel),
        labels::BROADCAST => Some(Trigger::Broadcast),
        labels::DIRECT => Some(Trigger::DirectMessage),
        labels::RESTORE => Some(Trigger::RestoreBackup),
        _ => None,
    }
}

fn kind_for(text: &str) -> Option<ContentKind> {
    match text {
        labels::KIND_TEXT => Some(ContentKind::Text),
        labels::KIND_PHOTO => Some(ContentKind::Photo),
        labels::KIND_VIDEO => Some(ContentKind::Video),
        labels::KIND_DOCUMENT => Some(ContentKind::Document),
        _ => None,
    }
}

pub async fn start(bot: Bot, msg: Message, app: Arc<App>) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;

    // First responder becomes the admin when none is configured.
    if app.moderation.bootstrap_admin(user_id).await? {
        bot.send_message(
            msg.chat.id,
            "🔑 No admin was configured; you are now the admin.",
        )
        .reply_markup(admin_keyboard())
        .await?;
        return Ok(());
    }

    if app.moderation.is_admin(user_id).await {
        bot.send_message(msg.chat.id, "🛠 Admin panel:")
            .reply_markup(admin_keyboard())
            .await?;
        return Ok(());
    }

    match app
        .moderation
        .register(user_id, &user.first_name, user.username.as_deref())
        .await?
    {
        Registration::Created => {
            bot.send_message(
                msg.chat.id,
                "📨 Your join request was sent to the admins. You will be notified once it is reviewed.",
            )
            .await?;
        }
        Registration::AlreadyKnown => {
            if app.moderation.is_approved(user_id).await {
                greet_approved_user(&bot, msg.chat.id, &app, user_id).await?;
            } else {
                bot.send_message(msg.chat.id, "⏳ Your request is still being reviewed.")
                    .await?;
            }
        }
    }
    Ok(())
}

pub async fn help(bot: Bot, msg: Message, app: Arc<App>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    if app.moderation.is_admin(user_id).await {
        bot.send_message(msg.chat.id, Command::descriptions().to_string())
            .reply_markup(admin_keyboard())
            .await?;
        return Ok(());
    }
    if !app.moderation.is_approved(user_id).await {
        bot.send_message(msg.chat.id, "⏳ Your request is still being reviewed.")
            .await?;
        return Ok(());
    }
    if let Gate::Denied = app.moderation.check_subscription_gate(user_id).await {
        return send_gate_notice(&bot, msg.chat.id, &app).await;
    }
    let help_text = app.storage.settings().await.responses.help;
    bot.send_message(msg.chat.id, help_text)
        .reply_markup(user_keyboard())
        .await?;
    Ok(())
}

/// Non-command messages: admin labels and dialog input on one side,
/// library access on the other.
pub async fn route_message(bot: Bot, msg: Message, app: Arc<App>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    if user_id == 0 {
        return Ok(());
    }
    if app.moderation.is_admin(user_id).await {
        route_admin_message(bot, msg, app, user_id).await
    } else {
        route_user_message(bot, msg, app, user_id).await
    }
}

async fn route_admin_message(bot: Bot, msg: Message, app: Arc<App>, user_id: i64) -> Result<()> {
    let chat_id = msg.chat.id;

    if let Some(input) = upload_input(&bot, &msg, &app, user_id).await? {
        let reply = app.sessions.handle(user_id, input).await?;
        return send_reply(&bot, chat_id, reply).await;
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    match text {
        labels::HOME => {
            let reply = app.sessions.handle(user_id, SessionInput::Home).await?;
            let note = if reply == Reply::Cancelled {
                "❎ Cancelled."
            } else {
                "🛠 Admin panel:"
            };
            bot.send_message(chat_id, note)
                .reply_markup(admin_keyboard())
                .await?;
            Ok(())
        }
        labels::STATS => send_stats(&bot, chat_id, &app).await,
        labels::USERS => send_users_view(&bot, chat_id, &app).await,
        labels::REQUESTS => send_requests_view(&bot, chat_id, &app).await,
        labels::SETTINGS => send_settings_panel(&bot, chat_id, &app).await,
        labels::TOGGLE_SUBSCRIPTION => toggle_subscription(&bot, chat_id, &app).await,
        labels::TOGGLE_FORWARDING => toggle_forwarding(&bot, chat_id, &app).await,
        labels::BACKUP => send_backup(&bot, chat_id, &app).await,
        _ => {
            if let Some(trigger) = trigger_for(text) {
                let reply = app
                    .sessions
                    .handle(user_id, SessionInput::Trigger(trigger))
                    .await?;
                return send_reply(&bot, chat_id, reply).await;
            }
            if app.sessions.is_active(user_id).await {
                let input = if text == labels::FINISH {
                    SessionInput::Finish
                } else if let Some(kind) = kind_for(text) {
                    SessionInput::Kind(kind)
                } else {
                    SessionInput::Text(text.to_string())
                };
                let reply = app.sessions.handle(user_id, input).await?;
                return send_reply(&bot, chat_id, reply).await;
            }
            bot.send_message(chat_id, "Pick an action from the keyboard.")
                .reply_markup(admin_keyboard())
                .await?;
            Ok(())
        }
    }
}

async fn route_user_message(bot: Bot, msg: Message, app: Arc<App>, user_id: i64) -> Result<()> {
    let chat_id = msg.chat.id;

    if !app.moderation.is_approved(user_id).await {
        // Unknown chats get registered exactly like /start.
        if let Some(user) = msg.from.clone() {
            if app
                .moderation
                .register(user_id, &user.first_name, user.username.as_deref())
                .await?
                == Registration::Created
            {
                bot.send_message(
                    chat_id,
                    "📨 Your join request was sent to the admins. You will be notified once it is reviewed.",
                )
                .await?;
                return Ok(());
            }
        }
        bot.send_message(chat_id, "⏳ Your request is still being reviewed.")
            .await?;
        return Ok(());
    }

    // The re-check button gets its own confirmation texts.
    if msg.text() == Some(labels::CHECK_SUBSCRIPTION) {
        return match app.moderation.check_subscription_gate(user_id).await {
            Gate::Allowed => {
                let text = app.storage.settings().await.responses.subscribe_success;
                bot.send_message(chat_id, text)
                    .reply_markup(user_keyboard())
                    .await?;
                Ok(())
            }
            Gate::Denied => {
                let text = app.storage.settings().await.responses.subscribe_failed;
                bot.send_message(chat_id, text).await?;
                send_gate_notice(&bot, chat_id, &app).await
            }
        };
    }

    if let Gate::Denied = app.moderation.check_subscription_gate(user_id).await {
        return send_gate_notice(&bot, chat_id, &app).await;
    }

    match msg.text() {
        Some(labels::LIBRARY) => send_category_menu(&bot, chat_id, &app).await,
        Some(labels::RECENT) => send_recent_menu(&bot, chat_id, &app).await,
        Some(labels::HELP) => {
            let help_text = app.storage.settings().await.responses.help;
            bot.send_message(chat_id, help_text)
                .reply_markup(user_keyboard())
                .await?;
            Ok(())
        }
        _ => {
            bot.send_message(chat_id, "Pick an action from the keyboard.")
                .reply_markup(user_keyboard())
                .await?;
            Ok(())
        }
    }
}

/// Classifies an admin upload into a [`SessionInput`]; `None` for plain
/// text messages. Only the restore dialog consumes the raw bytes of a
/// document; everywhere else a document is media content referenced by
/// its file id, exactly like a photo or video.
async fn upload_input(
    bot: &Bot,
    msg: &Message,
    app: &App,
    user_id: i64,
) -> Result<Option<SessionInput>> {
    if let Some(doc) = msg.document() {
        if app.sessions.expects_backup_file(user_id).await {
            let file = bot.get_file(doc.file.id.clone()).await?;
            let mut buf = Vec::new();
            bot.download_file(&file.path, &mut buf).await?;
            return Ok(Some(SessionInput::Document(buf)));
        }
        return Ok(Some(SessionInput::Media {
            kind: ContentKind::Document,
            file_ref: doc.file.id.0.clone(),
        }));
    }
    if let Some(photo) = msg.photo().and_then(<[_]>::last) {
        return Ok(Some(SessionInput::Media {
            kind: ContentKind::Photo,
            file_ref: photo.file.id.0.clone(),
        }));
    }
    if let Some(video) = msg.video() {
        return Ok(Some(SessionInput::Media {
            kind: ContentKind::Video,
            file_ref: video.file.id.0.clone(),
        }));
    }
    Ok(None)
}

pub async fn route_callback(bot: Bot, q: CallbackQuery, app: Arc<App>) -> Result<()> {
    bot.answer_callback_query(q.id.clone()).await?;
    let Some(data) = q.data else {
        return Ok(());
    };
    let from_id = q.from.id.0 as i64;
    // All dialogs happen in private chats, so the chat id matches the
    // user id.
    let chat_id = ChatId(from_id);

    if let Some(raw) = data.strip_prefix("accept_") {
        return moderation_decision(&bot, chat_id, &app, from_id, raw, true).await;
    }
    if let Some(raw) = data.strip_prefix("reject_") {
        return moderation_decision(&bot, chat_id, &app, from_id, raw, false).await;
    }
    if data == "view_requests" {
        if app.moderation.is_admin(from_id).await {
            return send_requests_view(&bot, chat_id, &app).await;
        }
        return Ok(());
    }

    // Catalog browsing is gated the same way as any user command.
    if !app.moderation.is_approved(from_id).await && !app.moderation.is_admin(from_id).await {
        return Ok(());
    }
    if !app.moderation.is_admin(from_id).await {
        if let Gate::Denied = app.moderation.check_subscription_gate(from_id).await {
            return send_gate_notice(&bot, chat_id, &app).await;
        }
    }

    if data == "back_to_categories" {
        return send_category_menu(&bot, chat_id, &app).await;
    }
    if let Some(raw) = data.strip_prefix("category_") {
        if let Ok(category_id) = raw.parse::<u64>() {
            return send_content_menu(&bot, chat_id, &app, category_id).await;
        }
        return Ok(());
    }
    if let Some(raw) = data.strip_prefix("content_") {
        if let Ok(content_id) = raw.parse::<u64>() {
            match app.catalog.get_by_id(content_id).await {
                Some(item) => return deliver_content(&bot, chat_id, &item).await,
                None => {
                    bot.send_message(chat_id, "❌ This content no longer exists.")
                        .await?;
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

async fn moderation_decision(
    bot: &Bot,
    chat_id: ChatId,
    app: &App,
    from_id: i64,
    raw_user: &str,
    accept: bool,
) -> Result<()> {
    if !app.moderation.is_admin(from_id).await {
        return Ok(());
    }
    let Ok(target) = raw_user.parse::<i64>() else {
        return Ok(());
    };
    let outcome = if accept {
        app.moderation.approve(target).await
    } else {
        app.moderation.reject(target).await
    };
    let text = match outcome {
        Ok(user) => {
            if accept {
                format!("✅ {} ({target}) approved.", user.first_name)
            } else {
                format!("🚫 {} ({target}) rejected and removed.", user.first_name)
            }
        }
        Err(_) => format!("❌ User {target} not found; the request may already be handled."),
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}

async fn greet_approved_user(bot: &Bot, chat_id: ChatId, app: &App, user_id: i64) -> Result<()> {
    if let Gate::Denied = app.moderation.check_subscription_gate(user_id).await {
        return send_gate_notice(bot, chat_id, app).await;
    }
    let welcome = app.storage.settings().await.responses.welcome;
    bot.send_message(chat_id, welcome)
        .reply_markup(user_keyboard())
        .await?;
    Ok(())
}

async fn send_gate_notice(bot: &Bot, chat_id: ChatId, app: &App) -> Result<()> {
    let subscription = app.storage.settings().await.subscription;
    let mut text = subscription.message;
    if !subscription.channels.is_empty() {
        text.push_str("\n\n");
        for channel in &subscription.channels {
            text.push_str(&format!("👉 {channel}\n"));
        }
    }
    bot.send_message(chat_id, text)
        .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new(
            labels::CHECK_SUBSCRIPTION,
        )]])
        .resize_keyboard())
        .await?;
    Ok(())
}

async fn send_category_menu(bot: &Bot, chat_id: ChatId, app: &App) -> Result<()> {
    let categories = app.catalog.categories().await;
    if categories.is_empty() {
        bot.send_message(chat_id, "📭 The library is empty for now.")
            .await?;
        return Ok(());
    }
    let mut rows = Vec::new();
    for category in &categories {
        let count = app.catalog.content_count_for(category.id).await;
        rows.push(vec![InlineKeyboardButton::callback(
            format!("{} ({count})", category.name),
            format!("category_{}", category.id),
        )]);
    }
    bot.send_message(chat_id, "📚 Choose a category:")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

async fn send_content_menu(bot: &Bot, chat_id: ChatId, app: &App, category_id: u64) -> Result<()> {
    let items = app.catalog.list_by_category(category_id).await;
    if items.is_empty() {
        bot.send_message(chat_id, "📭 Nothing in this category yet.")
            .reply_markup(InlineKeyboardMarkup::new(vec![vec![
                InlineKeyboardButton::callback("⬅️ Back", "back_to_categories".to_string()),
            ]]))
            .await?;
        return Ok(());
    }
    let mut rows: Vec<Vec<InlineKeyboardButton>> = items
        .iter()
        .map(|item| {
            vec![InlineKeyboardButton::callback(
                item.title.clone(),
                format!("content_{}", item.id),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "⬅️ Back",
        "back_to_categories".to_string(),
    )]);
    bot.send_message(chat_id, "📄 Choose an item:")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

/// Up to five newest text posts.
async fn send_recent_menu(bot: &Bot, chat_id: ChatId, app: &App) -> Result<()> {
    let recent = app.catalog.list_recent_text(5).await;
    if recent.is_empty() {
        bot.send_message(chat_id, "📭 No recent text posts.").await?;
        return Ok(());
    }
    let mut rows: Vec<Vec<InlineKeyboardButton>> = recent
        .iter()
        .map(|item| {
            vec![InlineKeyboardButton::callback(
                short_title(&item.title),
                format!("content_{}", item.id),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "⬅️ Back",
        "back_to_categories".to_string(),
    )]);
    bot.send_message(chat_id, "📰 Latest text posts:")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

fn short_title(title: &str) -> String {
    if title.chars().count() > 30 {
        let cut: String = title.chars().take(27).collect();
        format!("{cut}...")
    } else {
        title.to_string()
    }
}

async fn deliver_content(bot: &Bot, chat_id: ChatId, item: &ContentItem) -> Result<()> {
    match item.content_type {
        ContentKind::Text => {
            let body = item.text_content.as_deref().unwrap_or_default();
            let text = format!("📌 {}\n\n{}", item.title, body);
            for part in split_message(&text, MAX_MESSAGE_LEN) {
                bot.send_message(chat_id, part).await?;
            }
        }
        ContentKind::Photo | ContentKind::Video | ContentKind::Document => {
            let Some(file_ref) = item.file_id.clone() else {
                warn!("content {} has no stored file id", item.id);
                bot.send_message(chat_id, "❌ This content is unavailable.")
                    .await?;
                return Ok(());
            };
            let file = InputFile::file_id(FileId(file_ref));
            match item.content_type {
                ContentKind::Photo => {
                    bot.send_photo(chat_id, file).caption(item.title.clone()).await?;
                }
                ContentKind::Video => {
                    bot.send_video(chat_id, file).caption(item.title.clone()).await?;
                }
                _ => {
                    bot.send_document(chat_id, file)
                        .caption(item.title.clone())
                        .await?;
                }
            }
        }
    }
    Ok(())
}

async fn send_stats(bot: &Bot, chat_id: ChatId, app: &App) -> Result<()> {
    let users = app.storage.users().await;
    let approved = users.values().filter(|u| u.approved).count();
    let pending = app.moderation.pending_requests().await.len();
    let catalog = app.storage.catalog().await;
    let subscription = app.storage.settings().await.subscription;
    let text = format!(
        "📊 Stats\n\n👥 Users: {} ({} approved)\n📨 Pending requests: {}\n📁 Categories: {}\n📄 Content items: {}\n📢 Subscription check: {}",
        users.len(),
        approved,
        pending,
        catalog.categories.len(),
        catalog.content.len(),
        if subscription.enabled { "on" } else { "off" },
    );
    bot.send_message(chat_id, text)
        .reply_markup(admin_keyboard())
        .await?;
    Ok(())
}

async fn send_users_view(bot: &Bot, chat_id: ChatId, app: &App) -> Result<()> {
    let users = app.storage.users().await;
    if users.is_empty() {
        bot.send_message(chat_id, "👥 No users yet.")
            .reply_markup(admin_keyboard())
            .await?;
        return Ok(());
    }
    let mut text = String::from("👥 Users:\n\n");
    for (id, user) in &users {
        let status = if user.approved { "✅" } else { "⏳" };
        let username = user
            .username
            .as_deref()
            .map_or_else(String::new, |u| format!(" (@{u})"));
        text.push_str(&format!("{status} {id}: {}{username}\n", user.first_name));
    }
    for part in split_message(&text, MAX_MESSAGE_LEN) {
        bot.send_message(chat_id, part).await?;
    }
    Ok(())
}

async fn send_requests_view(bot: &Bot, chat_id: ChatId, app: &App) -> Result<()> {
    let requests = app.moderation.pending_requests().await;
    if requests.is_empty() {
        bot.send_message(chat_id, "📋 No pending requests.")
            .reply_markup(admin_keyboard())
            .await?;
        return Ok(());
    }
    for request in requests {
        let username = request
            .username
            .as_deref()
            .map_or_else(|| "-".to_string(), |u| format!("@{u}"));
        let text = format!(
            "👤 {} ({})\n🔖 {}\n📅 {}",
            request.first_name,
            request.user_id,
            username,
            request.date.format("%Y-%m-%d %H:%M"),
        );
        let keyboard = InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback("✅ Accept", format!("accept_{}", request.user_id)),
            InlineKeyboardButton::callback("❌ Reject", format!("reject_{}", request.user_id)),
        ]]);
        bot.send_message(chat_id, text).reply_markup(keyboard).await?;
    }
    Ok(())
}

async fn send_settings_panel(bot: &Bot, chat_id: ChatId, app: &App) -> Result<()> {
    let settings = app.storage.settings().await;
    let subscription = settings.subscription;
    let channels = if subscription.channels.is_empty() {
        "none".to_string()
    } else {
        subscription.channels.join(", ")
    };
    let text = format!(
        "⚙️ Settings\n\n📢 Subscription check: {}\n📡 Channels: {channels}\n🔁 Forwarding: {}",
        if subscription.enabled { "on" } else { "off" },
        if settings.forwarding.enabled { "on" } else { "off" },
    );
    bot.send_message(chat_id, text)
        .reply_markup(settings_keyboard())
        .await?;
    Ok(())
}

async fn toggle_subscription(bot: &Bot, chat_id: ChatId, app: &App) -> Result<()> {
    let enabled = app
        .storage
        .modify_settings(|settings| {
            settings.subscription.enabled = !settings.subscription.enabled;
            settings.subscription.enabled
        })
        .await?;
    let text = if enabled {
        "📢 Subscription check is now ON."
    } else {
        "📢 Subscription check is now OFF."
    };
    bot.send_message(chat_id, text)
        .reply_markup(settings_keyboard())
        .await?;
    Ok(())
}

async fn toggle_forwarding(bot: &Bot, chat_id: ChatId, app: &App) -> Result<()> {
    let enabled = app
        .storage
        .modify_settings(|settings| {
            settings.forwarding.enabled = !settings.forwarding.enabled;
            settings.forwarding.enabled
        })
        .await?;
    let text = if enabled {
        "🔁 Forwarding is now ON."
    } else {
        "🔁 Forwarding is now OFF."
    };
    bot.send_message(chat_id, text)
        .reply_markup(settings_keyboard())
        .await?;
    Ok(())
}

async fn send_backup(bot: &Bot, chat_id: ChatId, app: &App) -> Result<()> {
    let snapshot = app.backup.snapshot().await;
    let bytes = Backup::to_bytes(&snapshot)?;
    let name = Backup::file_name(&snapshot);
    bot.send_document(chat_id, InputFile::memory(bytes).file_name(name))
        .caption("💾 Current backup")
        .await?;
    Ok(())
}

/// Renders one session [`Reply`] into a message plus keyboard.
async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<()> {
    let keyboard = reply_keyboard(&reply);
    let Some(text) = reply_text(reply) else {
        return Ok(());
    };
    for part in split_message(&text, MAX_MESSAGE_LEN) {
        bot.send_message(chat_id, part)
            .reply_markup(keyboard.clone())
            .await?;
    }
    Ok(())
}

fn reply_keyboard(reply: &Reply) -> KeyboardMarkup {
    match reply {
        Reply::Prompt(prompt) | Reply::Invalid { prompt, .. } => prompt_keyboard(prompt),
        Reply::FragmentAdded { .. } => collecting_keyboard(),
        Reply::NoChannels
        | Reply::SubscriptionMessageUpdated
        | Reply::ChannelAdded(_)
        | Reply::ChannelAlreadyListed(_)
        | Reply::ChannelRemoved(_) => settings_keyboard(),
        _ => admin_keyboard(),
    }
}

/// `None` means nothing should be sent at all.
fn reply_text(reply: Reply) -> Option<String> {
    let text = match reply {
        Reply::Ignored => return None,
        Reply::Prompt(prompt) => prompt_text(&prompt),
        Reply::Invalid { reason, prompt } => {
            format!("{}\n\n{}", reason_text(reason), prompt_text(&prompt))
        }
        Reply::CategoryAdded(category) => {
            format!("✅ Category \"{}\" added (id {}).", category.name, category.id)
        }
        Reply::CategoryDeleted(category) => format!(
            "🗑 Category \"{}\" deleted along with its content.",
            category.name
        ),
        Reply::ContentAdded(item) => format!("✅ \"{}\" saved (id {}).", item.title, item.id),
        Reply::ContentDeleted(item) => format!("🗑 \"{}\" deleted.", item.title),
        Reply::UserDeleted(id) => format!("🗑 User {id} deleted."),
        Reply::FragmentAdded { parts, chars } => {
            format!("📝 Saved part {parts} ({chars} characters so far). Send more or finish.")
        }
        Reply::NoCategories => "📭 There are no categories yet. Create one first.".to_string(),
        Reply::NoContent => "📭 There is no content yet.".to_string(),
        Reply::NoChannels => "📡 No channels are configured.".to_string(),
        Reply::NotFound => "❌ Nothing with that id was found.".to_string(),
        Reply::ResponseUpdated(key) => {
            let name = match key {
                ResponseKey::Welcome => "welcome",
                ResponseKey::Rejected => "rejection",
                ResponseKey::Help => "help",
            };
            format!("✅ The {name} message was updated.")
        }
        Reply::SubscriptionMessageUpdated => "✅ The subscription message was updated.".to_string(),
        Reply::ChannelAdded(channel) => format!("✅ Channel {channel} added."),
        Reply::ChannelAlreadyListed(channel) => {
            format!("ℹ️ Channel {channel} is already on the list.")
        }
        Reply::ChannelRemoved(channel) => format!("🗑 Channel {channel} removed."),
        Reply::BroadcastFinished(outcome) => format!(
            "📣 Broadcast finished: {} delivered, {} failed.",
            outcome.sent, outcome.failed
        ),
        Reply::DirectSent(id) => format!("✅ Message delivered to {id}."),
        Reply::DirectFailed(id) => format!("❌ Could not deliver the message to {id}."),
        Reply::Restored { snapshot } => format!(
            "✅ Backup from {} restored: {} users, {} categories, {} content items.",
            snapshot.backup_date.format("%Y-%m-%d %H:%M"),
            snapshot.users.len(),
            snapshot.content.categories.len(),
            snapshot.content.content.len(),
        ),
        Reply::RestoreRejected(reason) => {
            format!("❌ Backup rejected: {reason}. The store was not changed.")
        }
        Reply::Cancelled => "❎ Cancelled.".to_string(),
    };
    Some(text)
}

fn prompt_keyboard(prompt: &Prompt) -> KeyboardMarkup {
    match prompt {
        Prompt::TextBody => collecting_keyboard(),
        Prompt::ContentKind => kind_keyboard(),
        _ => home_keyboard(),
    }
}

fn reason_text(reason: InvalidReason) -> &'static str {
    match reason {
        InvalidReason::EmptyName => "⚠️ The name cannot be empty.",
        InvalidReason::EmptyBody => "⚠️ Nothing to save yet. Send at least one message first.",
        InvalidReason::NotANumber => "⚠️ That is not a number.",
        InvalidReason::BadIndex => "⚠️ There is no entry with that number.",
        InvalidReason::WrongUpload => "⚠️ That is not what this step expects.",
        InvalidReason::WrongKind => "⚠️ Pick one of the type buttons.",
    }
}

fn prompt_text(prompt: &Prompt) -> String {
    match prompt {
        Prompt::CategoryName => "📁 Send the name of the new category:".to_string(),
        Prompt::ContentTitle => "📝 Send the title for the new content:".to_string(),
        Prompt::ContentKind => "📦 Choose the content type:".to_string(),
        Prompt::TextBody => {
            "📝 Send the text. You can send several messages; press the finish button when done."
                .to_string()
        }
        Prompt::MediaUpload(kind) => match kind {
            ContentKind::Photo => "🖼 Send the photo now:".to_string(),
            ContentKind::Video => "🎬 Send the video now:".to_string(),
            _ => "📄 Send the file now:".to_string(),
        },
        Prompt::TargetCategory(categories) => {
            let mut text = String::from("📁 Send the id of the target category:\n\n");
            for category in categories {
                text.push_str(&format!("{} · {}\n", category.id, category.name));
            }
            text
        }
        Prompt::DeleteCategoryId(categories) => {
            let mut text = String::from(
                "🗂 Send the id of the category to delete. Its content will be deleted too.\n\n",
            );
            for category in categories {
                text.push_str(&format!("{} · {}\n", category.id, category.name));
            }
            text
        }
        Prompt::DeleteContentId(items) => {
            let mut text = String::from("🗑 Send the id of the content to delete:\n\n");
            for item in items {
                text.push_str(&format!("{} · {}\n", item.id, item.title));
            }
            text
        }
        Prompt::DeleteUserId => "🚷 Send the id of the user to delete:".to_string(),
        Prompt::ResponseText { key, current } => {
            let name = match key {
                ResponseKey::Welcome => "welcome",
                ResponseKey::Rejected => "rejection",
                ResponseKey::Help => "help",
            };
            format!("Current {name} message:\n\n{current}\n\n✏️ Send the new text:")
        }
        Prompt::SubscriptionMessage { current } => {
            format!("Current subscription message:\n\n{current}\n\n✏️ Send the new text:")
        }
        Prompt::ChannelId => {
            "📡 Send the channel username (for example @channel) or its numeric id:".to_string()
        }
        Prompt::ChannelIndex(channels) => {
            let mut text = String::from("➖ Send the number of the channel to remove:\n\n");
            for (i, channel) in channels.iter().enumerate() {
                text.push_str(&format!("{}. {channel}\n", i + 1));
            }
            text
        }
        Prompt::BroadcastBody => {
            "📣 Send the message to broadcast to all approved users:".to_string()
        }
        Prompt::DirectTargetId => "✉️ Send the id of the user to message:".to_string(),
        Prompt::DirectBody(id) => format!("✉️ Send the message for user {id}:"),
        Prompt::BackupFile => "📥 Upload the backup JSON file:".to_string(),
    }
}
