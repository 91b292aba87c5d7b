//! Session State Machine: the per-chat multi-step admin dialogs.
//!
//! Every dialog is a variant of [`Dialog`] carrying its partially-built
//! draft, advanced by explicit [`SessionInput`] values; the bot layer
//! maps button labels and uploads onto inputs and renders the returned
//! [`Reply`]. One session exists per chat; `Home` cancels from any state
//! and a fresh trigger silently discards whatever draft was active.
//! Sessions are process-local and lost on restart.

use crate::backup::{Backup, RestoreError, Snapshot};
use crate::broadcast::{BroadcastError, BroadcastOutcome, Broadcaster};
use crate::catalog::{Catalog, CatalogError, ContentDraft};
use crate::models::{Category, ContentItem, ContentKind};
use crate::moderation::{Moderation, ModerationError};
use crate::storage::Storage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Fragments collected by the text dialog are joined with a blank line.
const FRAGMENT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKey {
    Welcome,
    Rejected,
    Help,
}

/// Stateless commands that open a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    AddCategory,
    DeleteCategory,
    AddContent,
    DeleteContent,
    DeleteUser,
    EditResponse(ResponseKey),
    EditSubscriptionMessage,
    AddChannel,
    DeleteChannel,
    Broadcast,
    DirectMessage,
    RestoreBackup,
}

/// One event fed into a session, already classified by the bot layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Trigger(Trigger),
    Text(String),
    Kind(ContentKind),
    Media { kind: ContentKind, file_ref: String },
    Document(Vec<u8>),
    Finish,
    Home,
}

/// Active dialog state, draft included. Absence from the session map is
/// `Idle`.
#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    Idle,
    EnteringCategoryName,
    EnteringContentTitle,
    SelectingContentKind { title: String },
    CollectingTextBody { title: String, parts: Vec<String> },
    AwaitingMediaUpload { title: String, kind: ContentKind },
    SelectingTargetCategory { draft: ContentDraft },
    EnteringDeleteCategoryId,
    EnteringDeleteContentId,
    EnteringDeleteUserId,
    EditingResponse { key: ResponseKey },
    EditingSubscriptionMessage,
    EnteringChannel,
    EnteringDeleteChannelIndex,
    AwaitingBroadcastBody,
    EnteringDirectTargetId,
    AwaitingDirectBody { target: i64 },
    AwaitingBackupFile,
}

/// What the bot should ask for next. Listing prompts carry the data the
/// original screens displayed alongside the question.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    CategoryName,
    ContentTitle,
    ContentKind,
    TextBody,
    MediaUpload(ContentKind),
    TargetCategory(Vec<Category>),
    DeleteCategoryId(Vec<Category>),
    DeleteContentId(Vec<ContentItem>),
    DeleteUserId,
    ResponseText { key: ResponseKey, current: String },
    SubscriptionMessage { current: String },
    ChannelId,
    ChannelIndex(Vec<String>),
    BroadcastBody,
    DirectTargetId,
    DirectBody(i64),
    BackupFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    EmptyName,
    EmptyBody,
    NotANumber,
    BadIndex,
    WrongUpload,
    WrongKind,
}

/// Outcome of one session step, rendered by the bot layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Prompt(Prompt),
    /// Input rejected; the dialog stays where it was.
    Invalid {
        reason: InvalidReason,
        prompt: Prompt,
    },
    CategoryAdded(Category),
    CategoryDeleted(Category),
    ContentAdded(ContentItem),
    ContentDeleted(ContentItem),
    UserDeleted(i64),
    FragmentAdded {
        parts: usize,
        chars: usize,
    },
    NoCategories,
    NoContent,
    NoChannels,
    NotFound,
    ResponseUpdated(ResponseKey),
    SubscriptionMessageUpdated,
    ChannelAdded(String),
    ChannelAlreadyListed(String),
    ChannelRemoved(String),
    BroadcastFinished(BroadcastOutcome),
    DirectSent(i64),
    DirectFailed(i64),
    Restored {
        snapshot: Box<Snapshot>,
    },
    RestoreRejected(String),
    Cancelled,
    /// No active dialog and the input opened none.
    Ignored,
}

type Step = (Dialog, Reply);

pub struct Sessions {
    storage: Arc<Storage>,
    catalog: Arc<Catalog>,
    moderation: Arc<Moderation>,
    broadcaster: Arc<Broadcaster>,
    backup: Arc<Backup>,
    active: Mutex<HashMap<i64, Dialog>>,
}

impl Sessions {
    pub fn new(
        storage: Arc<Storage>,
        catalog: Arc<Catalog>,
        moderation: Arc<Moderation>,
        broadcaster: Arc<Broadcaster>,
        backup: Arc<Backup>,
    ) -> Self {
        Self {
            storage,
            catalog,
            moderation,
            broadcaster,
            backup,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub async fn is_active(&self, chat_id: i64) -> bool {
        self.active.lock().await.contains_key(&chat_id)
    }

    /// True when the chat's active dialog is waiting for the raw bytes
    /// of an uploaded backup file. Every other dialog takes a document
    /// upload as media referenced by file id.
    pub async fn expects_backup_file(&self, chat_id: i64) -> bool {
        matches!(
            self.active.lock().await.get(&chat_id),
            Some(Dialog::AwaitingBackupFile)
        )
    }

    /// Advance the chat's session by one input.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures (storage writes) propagate; every
    /// domain-level rejection comes back as a [`Reply`].
    pub async fn handle(&self, chat_id: i64, input: SessionInput) -> anyhow::Result<Reply> {
        let current = self
            .active
            .lock()
            .await
            .remove(&chat_id)
            .unwrap_or(Dialog::Idle);
        let (next, reply) = self.step(current, input).await?;
        if next != Dialog::Idle {
            self.active.lock().await.insert(chat_id, next);
        }
        Ok(reply)
    }

    async fn step(&self, state: Dialog, input: SessionInput) -> anyhow::Result<Step> {
        // Global signals first: Home cancels anything, a trigger
        // discards the active draft and starts over.
        match input {
            SessionInput::Home => {
                return Ok(if state == Dialog::Idle {
                    (Dialog::Idle, Reply::Ignored)
                } else {
                    (Dialog::Idle, Reply::Cancelled)
                });
            }
            SessionInput::Trigger(trigger) => return self.start(trigger).await,
            _ => {}
        }

        match state {
            Dialog::Idle => Ok((Dialog::Idle, Reply::Ignored)),
            Dialog::EnteringCategoryName => self.on_category_name(input).await,
            Dialog::EnteringContentTitle => Ok(self.on_content_title(input)),
            Dialog::SelectingContentKind { title } => Ok(self.on_kind_selection(title, input)),
            Dialog::CollectingTextBody { title, parts } => {
                self.on_text_fragment(title, parts, input).await
            }
            Dialog::AwaitingMediaUpload { title, kind } => {
                self.on_media_upload(title, kind, input).await
            }
            Dialog::SelectingTargetCategory { draft } => {
                self.on_target_category(draft, input).await
            }
            Dialog::EnteringDeleteCategoryId => self.on_delete_category(input).await,
            Dialog::EnteringDeleteContentId => self.on_delete_content(input).await,
            Dialog::EnteringDeleteUserId => self.on_delete_user(input).await,
            Dialog::EditingResponse { key } => self.on_response_edit(key, input).await,
            Dialog::EditingSubscriptionMessage => self.on_subscription_message(input).await,
            Dialog::EnteringChannel => self.on_channel_add(input).await,
            Dialog::EnteringDeleteChannelIndex => self.on_channel_delete(input).await,
            Dialog::AwaitingBroadcastBody => self.on_broadcast_body(input).await,
            Dialog::EnteringDirectTargetId => Ok(self.on_direct_target(input)),
            Dialog::AwaitingDirectBody { target } => self.on_direct_body(target, input).await,
            Dialog::AwaitingBackupFile => self.on_backup_file(input).await,
        }
    }

    async fn on_category_name(&self, input: SessionInput) -> anyhow::Result<Step> {
        match input {
            SessionInput::Text(name) => match self.catalog.add_category(&name).await {
                Ok(category) => Ok((Dialog::Idle, Reply::CategoryAdded(category))),
                Err(CatalogError::InvalidInput(_)) => Ok(invalid(
                    Dialog::EnteringCategoryName,
                    InvalidReason::EmptyName,
                    Prompt::CategoryName,
                )),
                Err(e) => Err(e.into()),
            },
            _ => Ok(invalid(
                Dialog::EnteringCategoryName,
                InvalidReason::WrongUpload,
                Prompt::CategoryName,
            )),
        }
    }

    fn on_content_title(&self, input: SessionInput) -> Step {
        match input {
            SessionInput::Text(title) if !title.trim().is_empty() => {
                let title = title.trim().to_string();
                (
                    Dialog::SelectingContentKind { title },
                    Reply::Prompt(Prompt::ContentKind),
                )
            }
            _ => invalid(
                Dialog::EnteringContentTitle,
                InvalidReason::EmptyName,
                Prompt::ContentTitle,
            ),
        }
    }

    fn on_kind_selection(&self, title: String, input: SessionInput) -> Step {
        match input {
            SessionInput::Kind(ContentKind::Text) => (
                Dialog::CollectingTextBody {
                    title,
                    parts: Vec::new(),
                },
                Reply::Prompt(Prompt::TextBody),
            ),
            SessionInput::Kind(kind) => (
                Dialog::AwaitingMediaUpload { title, kind },
                Reply::Prompt(Prompt::MediaUpload(kind)),
            ),
            _ => invalid(
                Dialog::SelectingContentKind { title },
                InvalidReason::WrongKind,
                Prompt::ContentKind,
            ),
        }
    }

    async fn on_text_fragment(
        &self,
        title: String,
        mut parts: Vec<String>,
        input: SessionInput,
    ) -> anyhow::Result<Step> {
        match input {
            SessionInput::Text(fragment) => {
                parts.push(fragment);
                let chars = parts.join(FRAGMENT_SEPARATOR).chars().count();
                let count = parts.len();
                Ok((
                    Dialog::CollectingTextBody { title, parts },
                    Reply::FragmentAdded {
                        parts: count,
                        chars,
                    },
                ))
            }
            SessionInput::Finish => {
                let body = parts.join(FRAGMENT_SEPARATOR);
                if body.trim().is_empty() {
                    return Ok(invalid(
                        Dialog::CollectingTextBody { title, parts },
                        InvalidReason::EmptyBody,
                        Prompt::TextBody,
                    ));
                }
                let draft = ContentDraft {
                    title,
                    kind: ContentKind::Text,
                    body: Some(body),
                    media_ref: None,
                };
                self.to_category_selection(draft).await
            }
            _ => Ok(invalid(
                Dialog::CollectingTextBody { title, parts },
                InvalidReason::WrongUpload,
                Prompt::TextBody,
            )),
        }
    }

    async fn on_media_upload(
        &self,
        title: String,
        kind: ContentKind,
        input: SessionInput,
    ) -> anyhow::Result<Step> {
        match input {
            SessionInput::Media {
                kind: uploaded,
                file_ref,
            } if uploaded == kind => {
                let draft = ContentDraft {
                    title,
                    kind,
                    body: None,
                    media_ref: Some(file_ref),
                };
                self.to_category_selection(draft).await
            }
            _ => Ok(invalid(
                Dialog::AwaitingMediaUpload { title, kind },
                InvalidReason::WrongUpload,
                Prompt::MediaUpload(kind),
            )),
        }
    }

    async fn on_target_category(
        &self,
        draft: ContentDraft,
        input: SessionInput,
    ) -> anyhow::Result<Step> {
        match input {
            SessionInput::Text(text) => match text.trim().parse::<u64>() {
                Ok(category_id) => {
                    match self.catalog.add_content(draft, Some(category_id)).await {
                        Ok(item) => Ok((Dialog::Idle, Reply::ContentAdded(item))),
                        Err(CatalogError::NotFound) => Ok((Dialog::Idle, Reply::NotFound)),
                        Err(e) => Err(e.into()),
                    }
                }
                Err(_) => {
                    let categories = self.catalog.categories().await;
                    Ok(invalid(
                        Dialog::SelectingTargetCategory { draft },
                        InvalidReason::NotANumber,
                        Prompt::TargetCategory(categories),
                    ))
                }
            },
            _ => {
                let categories = self.catalog.categories().await;
                Ok(invalid(
                    Dialog::SelectingTargetCategory { draft },
                    InvalidReason::WrongUpload,
                    Prompt::TargetCategory(categories),
                ))
            }
        }
    }

    async fn on_delete_category(&self, input: SessionInput) -> anyhow::Result<Step> {
        match numeric(&input) {
            Some(id) => match self.catalog.delete_category(id).await {
                Ok(category) => Ok((Dialog::Idle, Reply::CategoryDeleted(category))),
                Err(CatalogError::NotFound) => Ok((Dialog::Idle, Reply::NotFound)),
                Err(e) => Err(e.into()),
            },
            None => {
                let categories = self.catalog.categories().await;
                Ok(invalid(
                    Dialog::EnteringDeleteCategoryId,
                    InvalidReason::NotANumber,
                    Prompt::DeleteCategoryId(categories),
                ))
            }
        }
    }

    async fn on_delete_content(&self, input: SessionInput) -> anyhow::Result<Step> {
        match numeric(&input) {
            Some(id) => match self.catalog.delete_content(id).await {
                Ok(item) => Ok((Dialog::Idle, Reply::ContentDeleted(item))),
                Err(CatalogError::NotFound) => Ok((Dialog::Idle, Reply::NotFound)),
                Err(e) => Err(e.into()),
            },
            None => {
                let items = self.storage.catalog().await.content;
                Ok(invalid(
                    Dialog::EnteringDeleteContentId,
                    InvalidReason::NotANumber,
                    Prompt::DeleteContentId(items),
                ))
            }
        }
    }

    async fn on_delete_user(&self, input: SessionInput) -> anyhow::Result<Step> {
        match numeric_id(&input) {
            Some(id) => match self.moderation.remove_user(id).await {
                Ok(_) => Ok((Dialog::Idle, Reply::UserDeleted(id))),
                Err(ModerationError::NotFound) => Ok((Dialog::Idle, Reply::NotFound)),
                Err(e) => Err(e.into()),
            },
            None => Ok(invalid(
                Dialog::EnteringDeleteUserId,
                InvalidReason::NotANumber,
                Prompt::DeleteUserId,
            )),
        }
    }

    async fn on_response_edit(
        &self,
        key: ResponseKey,
        input: SessionInput,
    ) -> anyhow::Result<Step> {
        match input {
            SessionInput::Text(text) => {
                self.storage
                    .modify_settings(move |settings| match key {
                        ResponseKey::Welcome => settings.responses.welcome = text,
                        ResponseKey::Rejected => settings.responses.rejected = text,
                        ResponseKey::Help => settings.responses.help = text,
                    })
                    .await?;
                Ok((Dialog::Idle, Reply::ResponseUpdated(key)))
            }
            _ => {
                let current = self.response_text(key).await;
                Ok(invalid(
                    Dialog::EditingResponse { key },
                    InvalidReason::WrongUpload,
                    Prompt::ResponseText { key, current },
                ))
            }
        }
    }

    async fn on_subscription_message(&self, input: SessionInput) -> anyhow::Result<Step> {
        match input {
            SessionInput::Text(text) => {
                self.storage
                    .modify_settings(move |settings| settings.subscription.message = text)
                    .await?;
                Ok((Dialog::Idle, Reply::SubscriptionMessageUpdated))
            }
            _ => {
                let current = self.storage.settings().await.subscription.message;
                Ok(invalid(
                    Dialog::EditingSubscriptionMessage,
                    InvalidReason::WrongUpload,
                    Prompt::SubscriptionMessage { current },
                ))
            }
        }
    }

    async fn on_channel_add(&self, input: SessionInput) -> anyhow::Result<Step> {
        match input {
            SessionInput::Text(channel) => {
                let channel = channel.trim().to_string();
                if channel.is_empty() {
                    return Ok(invalid(
                        Dialog::EnteringChannel,
                        InvalidReason::EmptyName,
                        Prompt::ChannelId,
                    ));
                }
                let added = self
                    .storage
                    .modify_settings({
                        let channel = channel.clone();
                        move |settings| {
                            if settings.subscription.channels.contains(&channel) {
                                false
                            } else {
                                settings.subscription.channels.push(channel);
                                true
                            }
                        }
                    })
                    .await?;
                Ok((
                    Dialog::Idle,
                    if added {
                        Reply::ChannelAdded(channel)
                    } else {
                        Reply::ChannelAlreadyListed(channel)
                    },
                ))
            }
            _ => Ok(invalid(
                Dialog::EnteringChannel,
                InvalidReason::WrongUpload,
                Prompt::ChannelId,
            )),
        }
    }

    async fn on_channel_delete(&self, input: SessionInput) -> anyhow::Result<Step> {
        let channels = self.storage.settings().await.subscription.channels;
        match numeric(&input) {
            Some(index) if index >= 1 && (index as usize) <= channels.len() => {
                let position = index as usize - 1;
                let removed = self
                    .storage
                    .modify_settings(move |settings| {
                        if position < settings.subscription.channels.len() {
                            Some(settings.subscription.channels.remove(position))
                        } else {
                            None
                        }
                    })
                    .await?;
                match removed {
                    Some(channel) => Ok((Dialog::Idle, Reply::ChannelRemoved(channel))),
                    None => Ok(invalid(
                        Dialog::EnteringDeleteChannelIndex,
                        InvalidReason::BadIndex,
                        Prompt::ChannelIndex(channels),
                    )),
                }
            }
            Some(_) => Ok(invalid(
                Dialog::EnteringDeleteChannelIndex,
                InvalidReason::BadIndex,
                Prompt::ChannelIndex(channels),
            )),
            None => Ok(invalid(
                Dialog::EnteringDeleteChannelIndex,
                InvalidReason::NotANumber,
                Prompt::ChannelIndex(channels),
            )),
        }
    }

    async fn on_broadcast_body(&self, input: SessionInput) -> anyhow::Result<Step> {
        match input {
            SessionInput::Text(text) => {
                let outcome = self.broadcaster.broadcast_all(&text).await;
                Ok((Dialog::Idle, Reply::BroadcastFinished(outcome)))
            }
            _ => Ok(invalid(
                Dialog::AwaitingBroadcastBody,
                InvalidReason::WrongUpload,
                Prompt::BroadcastBody,
            )),
        }
    }

    fn on_direct_target(&self, input: SessionInput) -> Step {
        match numeric_id(&input) {
            Some(target) => (
                Dialog::AwaitingDirectBody { target },
                Reply::Prompt(Prompt::DirectBody(target)),
            ),
            None => invalid(
                Dialog::EnteringDirectTargetId,
                InvalidReason::NotANumber,
                Prompt::DirectTargetId,
            ),
        }
    }

    async fn on_direct_body(&self, target: i64, input: SessionInput) -> anyhow::Result<Step> {
        match input {
            SessionInput::Text(text) => {
                match self.broadcaster.send_to_one(target, &text).await {
                    Ok(()) => Ok((Dialog::Idle, Reply::DirectSent(target))),
                    Err(BroadcastError::NotFound) => Ok((Dialog::Idle, Reply::NotFound)),
                    Err(BroadcastError::Delivery(_)) => {
                        Ok((Dialog::Idle, Reply::DirectFailed(target)))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            _ => Ok(invalid(
                Dialog::AwaitingDirectBody { target },
                InvalidReason::WrongUpload,
                Prompt::DirectBody(target),
            )),
        }
    }

    async fn on_backup_file(&self, input: SessionInput) -> anyhow::Result<Step> {
        match input {
            SessionInput::Document(bytes) => match self.backup.restore(&bytes).await {
                Ok(snapshot) => Ok((
                    Dialog::Idle,
                    Reply::Restored {
                        snapshot: Box::new(snapshot),
                    },
                )),
                Err(e @ (RestoreError::Malformed(_) | RestoreError::MissingSection(_))) => {
                    Ok((Dialog::Idle, Reply::RestoreRejected(e.to_string())))
                }
                Err(e) => Err(e.into()),
            },
            _ => Ok(invalid(
                Dialog::AwaitingBackupFile,
                InvalidReason::WrongUpload,
                Prompt::BackupFile,
            )),
        }
    }

    async fn start(&self, trigger: Trigger) -> anyhow::Result<Step> {
        Ok(match trigger {
            Trigger::AddCategory => (
                Dialog::EnteringCategoryName,
                Reply::Prompt(Prompt::CategoryName),
            ),
            Trigger::DeleteCategory => {
                let categories = self.catalog.categories().await;
                if categories.is_empty() {
                    (Dialog::Idle, Reply::NoCategories)
                } else {
                    (
                        Dialog::EnteringDeleteCategoryId,
                        Reply::Prompt(Prompt::DeleteCategoryId(categories)),
                    )
                }
            }
            Trigger::AddContent => (
                Dialog::EnteringContentTitle,
                Reply::Prompt(Prompt::ContentTitle),
            ),
            Trigger::DeleteContent => {
                let items = self.storage.catalog().await.content;
                if items.is_empty() {
                    (Dialog::Idle, Reply::NoContent)
                } else {
                    (
                        Dialog::EnteringDeleteContentId,
                        Reply::Prompt(Prompt::DeleteContentId(items)),
                    )
                }
            }
            Trigger::DeleteUser => (
                Dialog::EnteringDeleteUserId,
                Reply::Prompt(Prompt::DeleteUserId),
            ),
            Trigger::EditResponse(key) => {
                let current = self.response_text(key).await;
                (
                    Dialog::EditingResponse { key },
                    Reply::Prompt(Prompt::ResponseText { key, current }),
                )
            }
            Trigger::EditSubscriptionMessage => {
                let current = self.storage.settings().await.subscription.message;
                (
                    Dialog::EditingSubscriptionMessage,
                    Reply::Prompt(Prompt::SubscriptionMessage { current }),
                )
            }
            Trigger::AddChannel => (Dialog::EnteringChannel, Reply::Prompt(Prompt::ChannelId)),
            Trigger::DeleteChannel => {
                let channels = self.storage.settings().await.subscription.channels;
                if channels.is_empty() {
                    (Dialog::Idle, Reply::NoChannels)
                } else {
                    (
                        Dialog::EnteringDeleteChannelIndex,
                        Reply::Prompt(Prompt::ChannelIndex(channels)),
                    )
                }
            }
            Trigger::Broadcast => (
                Dialog::AwaitingBroadcastBody,
                Reply::Prompt(Prompt::BroadcastBody),
            ),
            Trigger::DirectMessage => (
                Dialog::EnteringDirectTargetId,
                Reply::Prompt(Prompt::DirectTargetId),
            ),
            Trigger::RestoreBackup => (
                Dialog::AwaitingBackupFile,
                Reply::Prompt(Prompt::BackupFile),
            ),
        })
    }

    async fn to_category_selection(&self, draft: ContentDraft) -> anyhow::Result<Step> {
        let categories = self.catalog.categories().await;
        if categories.is_empty() {
            return Ok((Dialog::Idle, Reply::NoCategories));
        }
        Ok((
            Dialog::SelectingTargetCategory { draft },
            Reply::Prompt(Prompt::TargetCategory(categories)),
        ))
    }

    async fn response_text(&self, key: ResponseKey) -> String {
        let responses = self.storage.settings().await.responses;
        match key {
            ResponseKey::Welcome => responses.welcome,
            ResponseKey::Rejected => responses.rejected,
            ResponseKey::Help => responses.help,
        }
    }
}

fn invalid(stay: Dialog, reason: InvalidReason, prompt: Prompt) -> (Dialog, Reply) {
    (stay, Reply::Invalid { reason, prompt })
}

fn numeric(input: &SessionInput) -> Option<u64> {
    match input {
        SessionInput::Text(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Identifiers typed by an admin (user ids, direct-message targets) are
/// parsed as `i64` so an out-of-range value is rejected instead of
/// wrapping.
fn numeric_id(input: &SessionInput) -> Option<i64> {
    match input {
        SessionInput::Text(text) => text.trim().parse().ok(),
        _ => None,
    }
}
