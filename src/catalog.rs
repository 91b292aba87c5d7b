//! Content Catalog: category/content CRUD over the repository.
//!
//! Categories get sequential ids (`max + 1`, monotone for the life of the
//! collection). Content items get a human-shareable 6-digit id drawn at
//! random with a bounded uniqueness-retry loop. Deleting a category
//! cascades to every item referencing it within the same document write.

use crate::models::{CatalogDoc, Category, ContentItem, ContentKind};
use crate::storage::{Storage, StorageError};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;

/// Draw space for content ids.
const CONTENT_ID_MIN: u64 = 100_000;
const CONTENT_ID_MAX: u64 = 999_999;
/// Retry bound for the uniqueness loop. With a 900k id space this fails
/// only when the catalog is pathologically full.
const CONTENT_ID_ATTEMPTS: usize = 64;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found")]
    NotFound,
    #[error("content id space exhausted after {CONTENT_ID_ATTEMPTS} attempts")]
    IdSpaceExhausted,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Validated inputs for a new content item, built up by the add-content
/// dialog before commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentDraft {
    pub title: String,
    pub kind: ContentKind,
    pub body: Option<String>,
    pub media_ref: Option<String>,
}

pub struct Catalog {
    storage: Arc<Storage>,
}

impl Catalog {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Create a category with the next sequential id.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty or whitespace-only name.
    pub async fn add_category(&self, name: &str) -> Result<Category, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidInput("category name is empty".into()));
        }
        let name = name.to_string();
        let category = self
            .storage
            .modify_catalog(move |doc| {
                let id = doc.categories.iter().map(|c| c.id).max().unwrap_or(0) + 1;
                let category = Category {
                    id,
                    name,
                    created_date: Utc::now(),
                };
                doc.categories.push(category.clone());
                category
            })
            .await?;
        Ok(category)
    }

    /// Delete a category and every item referencing it, in one write.
    ///
    /// # Errors
    ///
    /// `NotFound` if no category has this id; nothing changes.
    pub async fn delete_category(&self, id: u64) -> Result<Category, CatalogError> {
        let removed = self
            .storage
            .modify_catalog(move |doc| {
                let pos = doc.categories.iter().position(|c| c.id == id)?;
                let removed = doc.categories.remove(pos);
                doc.content.retain(|item| item.category_id != Some(id));
                Some(removed)
            })
            .await?;
        removed.ok_or(CatalogError::NotFound)
    }

    /// Commit a content item into a category.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the body/media pairing does not match the kind
    /// or the title is blank; `NotFound` for a missing target category.
    pub async fn add_content(
        &self,
        draft: ContentDraft,
        category_id: Option<u64>,
    ) -> Result<ContentItem, CatalogError> {
        if draft.title.trim().is_empty() {
            return Err(CatalogError::InvalidInput("title is empty".into()));
        }
        match draft.kind {
            ContentKind::Text => {
                if draft.body.as_deref().map_or(true, |b| b.trim().is_empty()) {
                    return Err(CatalogError::InvalidInput("text body is empty".into()));
                }
                if draft.media_ref.is_some() {
                    return Err(CatalogError::InvalidInput(
                        "text content cannot carry a media reference".into(),
                    ));
                }
            }
            _ => {
                if draft.media_ref.is_none() {
                    return Err(CatalogError::InvalidInput(
                        "media content requires a file reference".into(),
                    ));
                }
                if draft.body.is_some() {
                    return Err(CatalogError::InvalidInput(
                        "media content cannot carry a text body".into(),
                    ));
                }
            }
        }

        let item = self
            .storage
            .modify_catalog(move |doc| {
                if let Some(cat) = category_id {
                    if !doc.categories.iter().any(|c| c.id == cat) {
                        return Err(CatalogError::NotFound);
                    }
                }
                let id = draw_content_id(doc)?;
                let item = ContentItem {
                    id,
                    title: draft.title,
                    content_type: draft.kind,
                    text_content: draft.body,
                    file_id: draft.media_ref,
                    category_id,
                    created_date: Utc::now(),
                };
                doc.content.push(item.clone());
                Ok(item)
            })
            .await??;
        Ok(item)
    }

    /// Delete one item by id.
    ///
    /// # Errors
    ///
    /// `NotFound` if no item has this id.
    pub async fn delete_content(&self, id: u64) -> Result<ContentItem, CatalogError> {
        let removed = self
            .storage
            .modify_catalog(move |doc| {
                let pos = doc.content.iter().position(|item| item.id == id)?;
                Some(doc.content.remove(pos))
            })
            .await?;
        removed.ok_or(CatalogError::NotFound)
    }

    pub async fn get_by_id(&self, id: u64) -> Option<ContentItem> {
        self.storage
            .catalog()
            .await
            .content
            .into_iter()
            .find(|item| item.id == id)
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.storage.catalog().await.categories
    }

    pub async fn list_by_category(&self, category_id: u64) -> Vec<ContentItem> {
        self.storage
            .catalog()
            .await
            .content
            .into_iter()
            .filter(|item| item.category_id == Some(category_id))
            .collect()
    }

    /// Most recent text items, newest first, ties kept in insertion order.
    pub async fn list_recent_text(&self, limit: usize) -> Vec<ContentItem> {
        let mut items: Vec<ContentItem> = self
            .storage
            .catalog()
            .await
            .content
            .into_iter()
            .filter(|item| item.content_type == ContentKind::Text)
            .collect();
        items.sort_by(|a, b| b.created_date.cmp(&a.created_date));
        items.truncate(limit);
        items
    }

    pub async fn content_count_for(&self, category_id: u64) -> usize {
        self.list_by_category(category_id).await.len()
    }
}

fn draw_content_id(doc: &CatalogDoc) -> Result<u64, CatalogError> {
    let mut rng = rand::thread_rng();
    for _ in 0..CONTENT_ID_ATTEMPTS {
        let candidate = rng.gen_range(CONTENT_ID_MIN..=CONTENT_ID_MAX);
        if !doc.content.iter().any(|item| item.id == candidate) {
            return Ok(candidate);
        }
    }
    Err(CatalogError::IdSpaceExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::TempStore;

    async fn catalog() -> (TempStore, Catalog) {
        let store = TempStore::new().await;
        let catalog = Catalog::new(store.storage.clone());
        (store, catalog)
    }

    fn text_draft(title: &str, body: &str) -> ContentDraft {
        ContentDraft {
            title: title.into(),
            kind: ContentKind::Text,
            body: Some(body.into()),
            media_ref: None,
        }
    }

    #[tokio::test]
    async fn category_ids_increase_and_never_repeat() {
        let (_store, catalog) = catalog().await;
        let a = catalog.add_category("Stories").await.expect("add");
        let b = catalog.add_category("Videos").await.expect("add");
        assert!(b.id > a.id);

        // Deleting the highest id must not free it for reuse.
        catalog.delete_category(b.id).await.expect("delete");
        let c = catalog.add_category("Photos").await.expect("add");
        assert!(c.id >= b.id, "id {} reused after {}", c.id, b.id);
    }

    #[tokio::test]
    async fn blank_category_name_is_invalid() {
        let (_store, catalog) = catalog().await;
        assert!(matches!(
            catalog.add_category("   ").await,
            Err(CatalogError::InvalidInput(_))
        ));
        assert!(catalog.categories().await.is_empty());
    }

    #[tokio::test]
    async fn cascade_delete_removes_exactly_the_members() {
        let (_store, catalog) = catalog().await;
        let keep = catalog.add_category("Keep").await.expect("add");
        let doomed = catalog.add_category("Doomed").await.expect("add");

        let kept_item = catalog
            .add_content(text_draft("stays", "body"), Some(keep.id))
            .await
            .expect("add");
        catalog
            .add_content(text_draft("goes", "body"), Some(doomed.id))
            .await
            .expect("add");
        catalog
            .add_content(text_draft("also goes", "body"), Some(doomed.id))
            .await
            .expect("add");

        catalog.delete_category(doomed.id).await.expect("delete");

        let remaining = catalog.list_by_category(keep.id).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept_item.id);
        assert!(catalog.list_by_category(doomed.id).await.is_empty());
        assert_eq!(catalog.categories().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_category_is_not_found() {
        let (_store, catalog) = catalog().await;
        assert!(matches!(
            catalog.delete_category(999).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn content_validation_pairs_body_with_kind() {
        let (_store, catalog) = catalog().await;
        let cat = catalog.add_category("Misc").await.expect("add");

        let no_body = ContentDraft {
            title: "t".into(),
            kind: ContentKind::Text,
            body: None,
            media_ref: None,
        };
        assert!(matches!(
            catalog.add_content(no_body, Some(cat.id)).await,
            Err(CatalogError::InvalidInput(_))
        ));

        let no_media = ContentDraft {
            title: "t".into(),
            kind: ContentKind::Photo,
            body: None,
            media_ref: None,
        };
        assert!(matches!(
            catalog.add_content(no_media, Some(cat.id)).await,
            Err(CatalogError::InvalidInput(_))
        ));

        let with_media = ContentDraft {
            title: "pic".into(),
            kind: ContentKind::Photo,
            body: None,
            media_ref: Some("file-ref".into()),
        };
        let item = catalog
            .add_content(with_media, Some(cat.id))
            .await
            .expect("add");
        assert_eq!(item.file_id.as_deref(), Some("file-ref"));
        assert!((CONTENT_ID_MIN..=CONTENT_ID_MAX).contains(&item.id));
    }

    #[tokio::test]
    async fn content_into_missing_category_is_not_found() {
        let (_store, catalog) = catalog().await;
        assert!(matches!(
            catalog.add_content(text_draft("t", "b"), Some(404)).await,
            Err(CatalogError::NotFound)
        ));
        assert!(catalog.storage.catalog().await.content.is_empty());
    }

    #[tokio::test]
    async fn recent_text_sorts_newest_first_ties_in_insertion_order() {
        let (store, catalog) = catalog().await;
        let cat = catalog.add_category("Posts").await.expect("add");
        for title in ["first", "second", "third"] {
            catalog
                .add_content(text_draft(title, "body"), Some(cat.id))
                .await
                .expect("add");
        }
        // Force identical timestamps so the tie-break is observable.
        let stamp = Utc::now();
        store
            .storage
            .modify_catalog(|doc| {
                for item in &mut doc.content {
                    item.created_date = stamp;
                }
            })
            .await
            .expect("modify");

        let recent = catalog.list_recent_text(2).await;
        let titles: Vec<&str> = recent.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn media_items_are_excluded_from_recent_text() {
        let (_store, catalog) = catalog().await;
        let cat = catalog.add_category("Mixed").await.expect("add");
        catalog
            .add_content(text_draft("note", "body"), Some(cat.id))
            .await
            .expect("add");
        catalog
            .add_content(
                ContentDraft {
                    title: "clip".into(),
                    kind: ContentKind::Video,
                    body: None,
                    media_ref: Some("vid".into()),
                },
                Some(cat.id),
            )
            .await
            .expect("add");

        let recent = catalog.list_recent_text(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "note");
    }
}
