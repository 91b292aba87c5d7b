//! Backup/Restore: whole-store snapshots as a single JSON document.

use crate::models::{BotSettings, CatalogDoc, UsersDoc};
use crate::storage::{Storage, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("backup document is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("backup document is missing the `{0}` section")]
    MissingSection(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Aggregated store state plus provenance, as written to the downloaded
/// backup file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub users: UsersDoc,
    pub content: CatalogDoc,
    pub settings: BotSettings,
    pub backup_date: DateTime<Utc>,
    pub backup_info: String,
}

pub struct Backup {
    storage: Arc<Storage>,
}

impl Backup {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Aggregate the current documents. Pure read, no locking across
    /// collections: a write racing the snapshot lands in the next one.
    pub async fn snapshot(&self) -> Snapshot {
        Snapshot {
            users: self.storage.users().await,
            content: self.storage.catalog().await,
            settings: self.storage.settings().await,
            backup_date: Utc::now(),
            backup_info: "Created by the gatekeeper bot".to_string(),
        }
    }

    /// Serialize a snapshot for the admin download.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(snapshot)
    }

    pub fn file_name(snapshot: &Snapshot) -> String {
        format!(
            "bot_backup_{}.json",
            snapshot.backup_date.format("%Y%m%d_%H%M%S")
        )
    }

    /// Validate and restore an uploaded backup. The three mandatory
    /// sections must all parse before anything is written; the store is
    /// then overwritten wholesale.
    ///
    /// # Errors
    ///
    /// `Malformed`/`MissingSection` when the document fails validation
    /// (store untouched), `Storage` if a write fails.
    pub async fn restore(&self, bytes: &[u8]) -> Result<Snapshot, RestoreError> {
        let doc: serde_json::Value = serde_json::from_slice(bytes)?;

        let users = section(&doc, "users")?;
        let content = section(&doc, "content")?;
        let settings = section(&doc, "settings")?;

        let users: UsersDoc = serde_json::from_value(users)?;
        let content: CatalogDoc = serde_json::from_value(content)?;
        let settings: BotSettings = serde_json::from_value(settings)?;

        self.storage
            .modify_users({
                let users = users.clone();
                move |doc| *doc = users
            })
            .await?;
        self.storage
            .modify_catalog({
                let content = content.clone();
                move |doc| *doc = content
            })
            .await?;
        self.storage
            .modify_settings({
                let settings = settings.clone();
                move |doc| *doc = settings
            })
            .await?;

        let backup_date = doc
            .get("backup_date")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_else(Utc::now);
        let backup_info = doc
            .get("backup_info")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(Snapshot {
            users,
            content,
            settings,
            backup_date,
            backup_info,
        })
    }
}

fn section(doc: &serde_json::Value, key: &'static str) -> Result<serde_json::Value, RestoreError> {
    doc.get(key)
        .cloned()
        .ok_or(RestoreError::MissingSection(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, ContentDraft};
    use crate::models::{ContentKind, UserRecord};
    use crate::storage::test_support::TempStore;
    use chrono::Utc;

    async fn populated() -> (TempStore, Backup) {
        let store = TempStore::new().await;
        store
            .storage
            .modify_users(|users| {
                users.insert(
                    1,
                    UserRecord {
                        username: Some("one".into()),
                        first_name: "One".into(),
                        join_date: Utc::now(),
                        approved: true,
                    },
                );
            })
            .await
            .expect("seed users");
        let catalog = Catalog::new(store.storage.clone());
        let cat = catalog.add_category("Stories").await.expect("category");
        catalog
            .add_content(
                ContentDraft {
                    title: "tale".into(),
                    kind: ContentKind::Text,
                    body: Some("once upon a time".into()),
                    media_ref: None,
                },
                Some(cat.id),
            )
            .await
            .expect("content");
        store
            .storage
            .modify_settings(|s| s.subscription.enabled = true)
            .await
            .expect("seed settings");
        let backup = Backup::new(store.storage.clone());
        (store, backup)
    }

    #[tokio::test]
    async fn snapshot_restore_round_trips_exactly() {
        let (store, backup) = populated().await;
        let snapshot = backup.snapshot().await;
        let bytes = Backup::to_bytes(&snapshot).expect("serialize");

        // Wipe the store, then restore.
        store
            .storage
            .modify_users(|users| users.clear())
            .await
            .expect("wipe");
        store
            .storage
            .modify_catalog(|doc| *doc = Default::default())
            .await
            .expect("wipe");
        store
            .storage
            .modify_settings(|s| *s = Default::default())
            .await
            .expect("wipe");

        backup.restore(&bytes).await.expect("restore");

        assert_eq!(store.storage.users().await, snapshot.users);
        assert_eq!(store.storage.catalog().await, snapshot.content);
        assert_eq!(store.storage.settings().await, snapshot.settings);
    }

    #[tokio::test]
    async fn restore_rejects_missing_section_without_writing() {
        let (store, backup) = populated().await;
        let before_users = store.storage.users().await;
        let before_catalog = store.storage.catalog().await;

        let snapshot = backup.snapshot().await;
        let mut doc: serde_json::Value =
            serde_json::from_slice(&Backup::to_bytes(&snapshot).expect("serialize"))
                .expect("parse");
        doc.as_object_mut().expect("object").remove("content");
        let bytes = serde_json::to_vec(&doc).expect("serialize");

        let err = backup.restore(&bytes).await.expect_err("must fail");
        assert!(matches!(err, RestoreError::MissingSection("content")));
        assert_eq!(store.storage.users().await, before_users);
        assert_eq!(store.storage.catalog().await, before_catalog);
    }

    #[tokio::test]
    async fn restore_rejects_garbage() {
        let (_store, backup) = populated().await;
        assert!(matches!(
            backup.restore(b"{oops").await,
            Err(RestoreError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn backup_file_name_carries_the_timestamp() {
        let (_store, backup) = populated().await;
        let snapshot = backup.snapshot().await;
        let name = Backup::file_name(&snapshot);
        assert!(name.starts_with("bot_backup_"));
        assert!(name.ends_with(".json"));
    }
}
