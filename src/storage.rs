//! Repository layer: one JSON document per collection on local disk.
//!
//! Every mutation is read-entire-document / modify-in-memory /
//! write-entire-document, serialized per collection by a `tokio` mutex so
//! two handlers touching the same collection cannot silently overwrite
//! each other. A missing or unreadable document is absorbed into the
//! collection's typed empty default and logged; it is never an error to
//! the caller.

use crate::models::{AdminsDoc, BotSettings, CatalogDoc, RequestsDoc, UsersDoc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

pub const USERS_FILE: &str = "users.json";
pub const CONTENT_FILE: &str = "content.json";
pub const SETTINGS_FILE: &str = "settings.json";
pub const REQUESTS_FILE: &str = "requests.json";
pub const ADMINS_FILE: &str = "admins.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct Storage {
    dir: PathBuf,
    users_lock: Mutex<()>,
    catalog_lock: Mutex<()>,
    settings_lock: Mutex<()>,
    requests_lock: Mutex<()>,
    admins_lock: Mutex<()>,
}

impl Storage {
    /// Open the store, creating the data directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            users_lock: Mutex::new(()),
            catalog_lock: Mutex::new(()),
            settings_lock: Mutex::new(()),
            requests_lock: Mutex::new(()),
            admins_lock: Mutex::new(()),
        })
    }

    async fn read_doc<T: DeserializeOwned + Default>(&self, file: &str) -> T {
        let path = self.dir.join(file);
        match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("corrupt document {file}, using defaults: {e}");
                    T::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
            Err(e) => {
                warn!("unreadable document {file}, using defaults: {e}");
                T::default()
            }
        }
    }

    /// Temp-file + rename, so a crashed write never tears a document.
    async fn write_doc<T: Serialize>(&self, file: &str, doc: &T) -> Result<(), StorageError> {
        let body = serde_json::to_vec_pretty(doc)?;
        let tmp = self.dir.join(format!("{file}.tmp"));
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, self.dir.join(file)).await?;
        Ok(())
    }

    // --- Typed collection access ---

    pub async fn users(&self) -> UsersDoc {
        self.read_doc(USERS_FILE).await
    }

    /// Read-modify-write of the users document under its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the document back fails.
    pub async fn modify_users<F, R>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut UsersDoc) -> R,
    {
        let _guard = self.users_lock.lock().await;
        let mut doc = self.read_doc(USERS_FILE).await;
        let out = f(&mut doc);
        self.write_doc(USERS_FILE, &doc).await?;
        Ok(out)
    }

    pub async fn catalog(&self) -> CatalogDoc {
        self.read_doc(CONTENT_FILE).await
    }

    /// Read-modify-write of the catalog document under its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the document back fails.
    pub async fn modify_catalog<F, R>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut CatalogDoc) -> R,
    {
        let _guard = self.catalog_lock.lock().await;
        let mut doc = self.read_doc(CONTENT_FILE).await;
        let out = f(&mut doc);
        self.write_doc(CONTENT_FILE, &doc).await?;
        Ok(out)
    }

    pub async fn settings(&self) -> BotSettings {
        self.read_doc(SETTINGS_FILE).await
    }

    /// Read-modify-write of the settings document under its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the document back fails.
    pub async fn modify_settings<F, R>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut BotSettings) -> R,
    {
        let _guard = self.settings_lock.lock().await;
        let mut doc = self.read_doc(SETTINGS_FILE).await;
        let out = f(&mut doc);
        self.write_doc(SETTINGS_FILE, &doc).await?;
        Ok(out)
    }

    pub async fn requests(&self) -> RequestsDoc {
        self.read_doc(REQUESTS_FILE).await
    }

    /// Read-modify-write of the requests document under its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the document back fails.
    pub async fn modify_requests<F, R>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut RequestsDoc) -> R,
    {
        let _guard = self.requests_lock.lock().await;
        let mut doc = self.read_doc(REQUESTS_FILE).await;
        let out = f(&mut doc);
        self.write_doc(REQUESTS_FILE, &doc).await?;
        Ok(out)
    }

    pub async fn admins(&self) -> AdminsDoc {
        self.read_doc(ADMINS_FILE).await
    }

    /// Read-modify-write of the admins document under its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the document back fails.
    pub async fn modify_admins<F, R>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut AdminsDoc) -> R,
    {
        let _guard = self.admins_lock.lock().await;
        let mut doc = self.read_doc(ADMINS_FILE).await;
        let out = f(&mut doc);
        self.write_doc(ADMINS_FILE, &doc).await?;
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Storage;
    use std::path::PathBuf;
    use std::sync::Arc;

    /// A store in a unique temp directory, removed on drop.
    pub struct TempStore {
        pub storage: Arc<Storage>,
        pub dir: PathBuf,
    }

    impl TempStore {
        pub async fn new() -> Self {
            let dir =
                std::env::temp_dir().join(format!("gatekeeper-test-{}", uuid::Uuid::new_v4()));
            let storage = Arc::new(Storage::open(&dir).await.expect("temp store"));
            Self { storage, dir }
        }
    }

    impl Drop for TempStore {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::TempStore;
    use crate::models::UserRecord;
    use chrono::Utc;

    #[tokio::test]
    async fn missing_documents_read_as_typed_defaults() {
        let store = TempStore::new().await;
        assert!(store.storage.users().await.is_empty());
        assert!(store.storage.requests().await.is_empty());
        assert!(store.storage.admins().await.is_empty());
        let catalog = store.storage.catalog().await;
        assert!(catalog.categories.is_empty());
        assert!(catalog.content.is_empty());
    }

    #[tokio::test]
    async fn corrupt_document_is_absorbed_not_raised() {
        let store = TempStore::new().await;
        tokio::fs::write(store.dir.join(super::USERS_FILE), b"{not json")
            .await
            .expect("write garbage");
        assert!(store.storage.users().await.is_empty());

        // A later write replaces the corrupt file with a valid one.
        store
            .storage
            .modify_users(|users| {
                users.insert(
                    7,
                    UserRecord {
                        username: None,
                        first_name: "Seven".into(),
                        join_date: Utc::now(),
                        approved: true,
                    },
                );
            })
            .await
            .expect("modify");
        let users = store.storage.users().await;
        assert_eq!(users.len(), 1);
        assert!(users[&7].approved);
    }

    #[tokio::test]
    async fn modify_round_trips_whole_document() {
        let store = TempStore::new().await;
        store
            .storage
            .modify_admins(|admins| {
                admins.insert(1);
                admins.insert(2);
            })
            .await
            .expect("modify");
        store
            .storage
            .modify_admins(|admins| {
                admins.remove(&1);
            })
            .await
            .expect("modify");
        let admins = store.storage.admins().await;
        assert_eq!(admins.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn writes_leave_no_temp_files_behind() {
        let store = TempStore::new().await;
        store
            .storage
            .modify_settings(|settings| settings.subscription.enabled = true)
            .await
            .expect("modify");
        let mut entries = tokio::fs::read_dir(&store.dir).await.expect("read dir");
        while let Some(entry) = entries.next_entry().await.expect("entry") {
            let name = entry.file_name();
            assert!(
                !name.to_string_lossy().ends_with(".tmp"),
                "leftover temp file: {name:?}"
            );
        }
        assert!(store.storage.settings().await.subscription.enabled);
    }
}
