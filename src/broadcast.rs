//! Broadcast Engine: sequential fan-out to approved users.

use crate::storage::{Storage, StorageError};
use crate::transport::{Transport, TransportError};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("recipient not found")]
    NotFound,
    #[error(transparent)]
    Delivery(#[from] TransportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Tally of one fan-out, reported to the admin verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub sent: usize,
    pub failed: usize,
}

pub struct Broadcaster {
    storage: Arc<Storage>,
    transport: Arc<dyn Transport>,
}

impl Broadcaster {
    pub fn new(storage: Arc<Storage>, transport: Arc<dyn Transport>) -> Self {
        Self { storage, transport }
    }

    /// Deliver `text` to every approved user, in order. A failed send is
    /// logged and counted; it never aborts the remaining deliveries.
    pub async fn broadcast_all(&self, text: &str) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome { sent: 0, failed: 0 };
        for (user_id, user) in self.storage.users().await {
            if !user.approved {
                continue;
            }
            match self.transport.send_text(user_id, text).await {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    warn!("broadcast to {user_id} failed: {e}");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }

    /// Single-recipient send.
    ///
    /// # Errors
    ///
    /// `NotFound` if the target is not a known user; `Delivery` if the
    /// transport rejects the send.
    pub async fn send_to_one(&self, user_id: i64, text: &str) -> Result<(), BroadcastError> {
        if !self.storage.users().await.contains_key(&user_id) {
            return Err(BroadcastError::NotFound);
        }
        self.transport.send_text(user_id, text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRecord;
    use crate::storage::test_support::TempStore;
    use crate::transport::doubles::RecordingTransport;
    use chrono::Utc;

    async fn seeded(approved: &[i64], pending: &[i64]) -> (TempStore, Arc<RecordingTransport>, Broadcaster) {
        let store = TempStore::new().await;
        let record = |approved| UserRecord {
            username: None,
            first_name: "u".into(),
            join_date: Utc::now(),
            approved,
        };
        store
            .storage
            .modify_users(|users| {
                for id in approved {
                    users.insert(*id, record(true));
                }
                for id in pending {
                    users.insert(*id, record(false));
                }
            })
            .await
            .expect("seed");
        let transport = Arc::new(RecordingTransport::default());
        let broadcaster = Broadcaster::new(store.storage.clone(), transport.clone());
        (store, transport, broadcaster)
    }

    #[tokio::test]
    async fn tally_counts_failures_without_aborting() {
        let (_store, transport, broadcaster) = seeded(&[1, 2, 3, 4], &[]).await;
        transport.fail_for(2);
        transport.fail_for(4);

        let outcome = broadcaster.broadcast_all("hello").await;
        assert_eq!(outcome, BroadcastOutcome { sent: 2, failed: 2 });

        // Every approved user was attempted; the survivors got the text.
        assert_eq!(transport.sent_to(1), vec!["hello".to_string()]);
        assert_eq!(transport.sent_to(3), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn pending_users_are_skipped() {
        let (_store, transport, broadcaster) = seeded(&[1], &[2]).await;
        let outcome = broadcaster.broadcast_all("ping").await;
        assert_eq!(outcome, BroadcastOutcome { sent: 1, failed: 0 });
        assert!(transport.sent_to(2).is_empty());
    }

    #[tokio::test]
    async fn send_to_unknown_recipient_is_not_found() {
        let (_store, transport, broadcaster) = seeded(&[1], &[]).await;
        assert!(matches!(
            broadcaster.send_to_one(99, "hi").await,
            Err(BroadcastError::NotFound)
        ));
        assert!(transport.sent_to(99).is_empty());

        broadcaster.send_to_one(1, "hi").await.expect("send");
        assert_eq!(transport.sent_to(1), vec!["hi".to_string()]);
    }
}
