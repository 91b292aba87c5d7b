//! Moderation Engine: user lifecycle and the subscription gate.
//!
//! Lifecycle: first contact creates a pending user plus a join request
//! and notifies every admin; an admin decision either approves the user
//! (request deleted, welcome sent) or rejects them (record deleted
//! entirely). The subscription gate is re-evaluated on every
//! authenticated command and fails closed when the oracle errors.

use crate::models::{JoinRequest, UserRecord};
use crate::storage::{Storage, StorageError};
use crate::transport::{Membership, Transport};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allowed,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// New pending user created, admins notified.
    Created,
    /// The chat was already known; nothing changed.
    AlreadyKnown,
}

pub struct Moderation {
    storage: Arc<Storage>,
    transport: Arc<dyn Transport>,
    membership: Arc<dyn Membership>,
}

impl Moderation {
    pub fn new(
        storage: Arc<Storage>,
        transport: Arc<dyn Transport>,
        membership: Arc<dyn Membership>,
    ) -> Self {
        Self {
            storage,
            transport,
            membership,
        }
    }

    /// Merge statically configured admin ids into the persisted set.
    ///
    /// # Errors
    ///
    /// Returns an error if the admin document cannot be written.
    pub async fn seed_admins(
        &self,
        ids: impl IntoIterator<Item = i64>,
    ) -> Result<(), StorageError> {
        let ids: Vec<i64> = ids.into_iter().collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.storage
            .modify_admins(move |admins| admins.extend(ids))
            .await
    }

    /// First-responder bootstrap: if no admin exists yet, `user_id`
    /// becomes one. Returns whether the caller was promoted.
    ///
    /// # Errors
    ///
    /// Returns an error if the admin document cannot be written.
    pub async fn bootstrap_admin(&self, user_id: i64) -> Result<bool, StorageError> {
        self.storage
            .modify_admins(move |admins| {
                if admins.is_empty() {
                    admins.insert(user_id);
                    true
                } else {
                    false
                }
            })
            .await
    }

    pub async fn is_admin(&self, user_id: i64) -> bool {
        self.storage.admins().await.contains(&user_id)
    }

    pub async fn is_approved(&self, user_id: i64) -> bool {
        self.storage
            .users()
            .await
            .get(&user_id)
            .map_or(false, |u| u.approved)
    }

    pub async fn user(&self, user_id: i64) -> Option<UserRecord> {
        self.storage.users().await.get(&user_id).cloned()
    }

    pub async fn pending_requests(&self) -> Vec<JoinRequest> {
        self.storage.requests().await
    }

    pub async fn approved_users(&self) -> Vec<i64> {
        self.storage
            .users()
            .await
            .into_iter()
            .filter(|(_, u)| u.approved)
            .map(|(id, _)| id)
            .collect()
    }

    /// Register a first contact: pending user + join request, then one
    /// notification per admin. Per-admin delivery failure is logged and
    /// does not fail the registration.
    ///
    /// # Errors
    ///
    /// Returns an error if either document write fails.
    pub async fn register(
        &self,
        user_id: i64,
        first_name: &str,
        username: Option<&str>,
    ) -> Result<Registration, StorageError> {
        let known = self
            .storage
            .modify_users(|users| {
                if users.contains_key(&user_id) {
                    true
                } else {
                    users.insert(
                        user_id,
                        UserRecord {
                            username: username.map(str::to_string),
                            first_name: first_name.to_string(),
                            join_date: Utc::now(),
                            approved: false,
                        },
                    );
                    false
                }
            })
            .await?;
        if known {
            return Ok(Registration::AlreadyKnown);
        }

        let request = JoinRequest {
            user_id,
            username: username.map(str::to_string),
            first_name: first_name.to_string(),
            date: Utc::now(),
        };
        self.storage
            .modify_requests({
                let request = request.clone();
                move |requests| requests.push(request)
            })
            .await?;

        for admin_id in self.storage.admins().await {
            if let Err(e) = self.transport.send_join_request(admin_id, &request).await {
                error!("failed to notify admin {admin_id}: {e}");
            }
        }
        Ok(Registration::Created)
    }

    /// Approve a pending user and send the configured welcome.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user id; nothing changes.
    pub async fn approve(&self, user_id: i64) -> Result<UserRecord, ModerationError> {
        let approved = self
            .storage
            .modify_users(|users| {
                users.get_mut(&user_id).map(|user| {
                    user.approved = true;
                    user.clone()
                })
            })
            .await?
            .ok_or(ModerationError::NotFound)?;
        self.storage
            .modify_requests(|requests| requests.retain(|r| r.user_id != user_id))
            .await?;

        let welcome = self.storage.settings().await.responses.welcome;
        if let Err(e) = self.transport.send_text(user_id, &welcome).await {
            warn!("welcome message to {user_id} failed: {e}");
        }
        Ok(approved)
    }

    /// Reject a user: notify them, then delete the record and its
    /// request entirely.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user id; nothing changes.
    pub async fn reject(&self, user_id: i64) -> Result<UserRecord, ModerationError> {
        let existing = self
            .user(user_id)
            .await
            .ok_or(ModerationError::NotFound)?;

        let rejected = self.storage.settings().await.responses.rejected;
        if let Err(e) = self.transport.send_text(user_id, &rejected).await {
            warn!("rejection message to {user_id} failed: {e}");
        }

        self.remove_user(user_id).await?;
        Ok(existing)
    }

    /// Delete a user and its join request without any notification
    /// (the admin-driven delete flow).
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user id.
    pub async fn remove_user(&self, user_id: i64) -> Result<UserRecord, ModerationError> {
        let removed = self
            .storage
            .modify_users(|users| users.remove(&user_id))
            .await?
            .ok_or(ModerationError::NotFound)?;
        self.storage
            .modify_requests(|requests| requests.retain(|r| r.user_id != user_id))
            .await?;
        Ok(removed)
    }

    /// Evaluate the subscription gate for one request. Disabled gate or
    /// empty channel list allow unconditionally; the first channel the
    /// oracle reports the user outside of denies; oracle errors deny
    /// (fail closed).
    pub async fn check_subscription_gate(&self, user_id: i64) -> Gate {
        let subscription = self.storage.settings().await.subscription;
        if !subscription.enabled || subscription.channels.is_empty() {
            return Gate::Allowed;
        }
        for channel in &subscription.channels {
            match self.membership.is_member(channel, user_id).await {
                Ok(true) => {}
                Ok(false) => return Gate::Denied,
                Err(e) => {
                    warn!("membership check for {user_id} on {channel} failed: {e}");
                    return Gate::Denied;
                }
            }
        }
        Gate::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::TempStore;
    use crate::transport::doubles::{RecordingTransport, ScriptedMembership};

    struct Fixture {
        _store: TempStore,
        storage: Arc<Storage>,
        transport: Arc<RecordingTransport>,
        membership: Arc<ScriptedMembership>,
        moderation: Moderation,
    }

    async fn fixture() -> Fixture {
        let store = TempStore::new().await;
        let storage = store.storage.clone();
        let transport = Arc::new(RecordingTransport::default());
        let membership = Arc::new(ScriptedMembership::default());
        let moderation = Moderation::new(storage.clone(), transport.clone(), membership.clone());
        Fixture {
            _store: store,
            storage,
            transport,
            membership,
            moderation,
        }
    }

    #[tokio::test]
    async fn first_responder_becomes_admin_without_touching_users() {
        let fx = fixture().await;
        assert!(fx.moderation.bootstrap_admin(100).await.expect("bootstrap"));
        assert!(fx.moderation.is_admin(100).await);
        assert!(fx.storage.users().await.is_empty());
        assert!(fx.storage.requests().await.is_empty());

        // Second responder is not promoted.
        assert!(!fx.moderation.bootstrap_admin(200).await.expect("bootstrap"));
        assert!(!fx.moderation.is_admin(200).await);
    }

    #[tokio::test]
    async fn register_creates_pending_user_and_notifies_every_admin() {
        let fx = fixture().await;
        fx.moderation.seed_admins([1, 2]).await.expect("seed");

        let outcome = fx
            .moderation
            .register(555, "Newcomer", Some("newbie"))
            .await
            .expect("register");
        assert_eq!(outcome, Registration::Created);

        let users = fx.storage.users().await;
        assert!(!users[&555].approved);
        let requests = fx.storage.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user_id, 555);

        let prompts = fx.transport.join_prompts.lock().expect("lock");
        let notified: Vec<i64> = prompts.iter().map(|(admin, _)| *admin).collect();
        assert_eq!(notified, vec![1, 2]);
    }

    #[tokio::test]
    async fn register_is_idempotent_for_known_chats() {
        let fx = fixture().await;
        fx.moderation.seed_admins([1]).await.expect("seed");
        fx.moderation
            .register(555, "Newcomer", None)
            .await
            .expect("register");
        let again = fx
            .moderation
            .register(555, "Newcomer", None)
            .await
            .expect("register");
        assert_eq!(again, Registration::AlreadyKnown);
        assert_eq!(fx.storage.requests().await.len(), 1);
        assert_eq!(fx.transport.join_prompts.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn admin_notify_failure_does_not_fail_registration() {
        let fx = fixture().await;
        fx.moderation.seed_admins([1, 2]).await.expect("seed");
        fx.transport.fail_for(1);

        let outcome = fx
            .moderation
            .register(555, "Newcomer", None)
            .await
            .expect("register");
        assert_eq!(outcome, Registration::Created);
        assert_eq!(fx.transport.join_prompts.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn approve_removes_exactly_that_request_and_sends_welcome() {
        let fx = fixture().await;
        fx.moderation.seed_admins([1]).await.expect("seed");
        fx.moderation.register(10, "A", None).await.expect("register");
        fx.moderation.register(20, "B", None).await.expect("register");

        fx.moderation.approve(10).await.expect("approve");

        assert!(fx.moderation.is_approved(10).await);
        assert!(!fx.moderation.is_approved(20).await);
        let remaining = fx.storage.requests().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, 20);
        assert_eq!(fx.transport.sent_to(10).len(), 1);
    }

    #[tokio::test]
    async fn approve_survives_welcome_delivery_failure() {
        let fx = fixture().await;
        fx.moderation.register(10, "A", None).await.expect("register");
        fx.transport.fail_for(10);
        fx.moderation.approve(10).await.expect("approve");
        assert!(fx.moderation.is_approved(10).await);
    }

    #[tokio::test]
    async fn reject_deletes_user_and_request_leaving_others() {
        let fx = fixture().await;
        fx.moderation.register(10, "A", None).await.expect("register");
        fx.moderation.register(20, "B", None).await.expect("register");

        fx.moderation.reject(10).await.expect("reject");

        let users = fx.storage.users().await;
        assert!(!users.contains_key(&10));
        assert!(users.contains_key(&20));
        assert_eq!(fx.storage.requests().await.len(), 1);
        // Rejection notice went out before the delete.
        assert_eq!(fx.transport.sent_to(10).len(), 1);
    }

    #[tokio::test]
    async fn decisions_on_unknown_users_are_not_found() {
        let fx = fixture().await;
        assert!(matches!(
            fx.moderation.approve(404).await,
            Err(ModerationError::NotFound)
        ));
        assert!(matches!(
            fx.moderation.reject(404).await,
            Err(ModerationError::NotFound)
        ));
        assert!(matches!(
            fx.moderation.remove_user(404).await,
            Err(ModerationError::NotFound)
        ));
        assert!(fx.storage.users().await.is_empty());
    }

    #[tokio::test]
    async fn gate_disabled_or_channelless_allows() {
        let fx = fixture().await;
        assert_eq!(fx.moderation.check_subscription_gate(1).await, Gate::Allowed);

        fx.storage
            .modify_settings(|s| s.subscription.enabled = true)
            .await
            .expect("modify");
        // Enabled but no channels configured.
        assert_eq!(fx.moderation.check_subscription_gate(1).await, Gate::Allowed);
    }

    #[tokio::test]
    async fn gate_denies_when_one_channel_reports_left() {
        let fx = fixture().await;
        fx.storage
            .modify_settings(|s| {
                s.subscription.enabled = true;
                s.subscription.channels = vec!["@one".into(), "@two".into()];
            })
            .await
            .expect("modify");
        fx.membership.set("@one", 7, true);
        fx.membership.set("@two", 7, false);

        assert_eq!(fx.moderation.check_subscription_gate(7).await, Gate::Denied);

        fx.membership.set("@two", 7, true);
        assert_eq!(fx.moderation.check_subscription_gate(7).await, Gate::Allowed);
    }

    #[tokio::test]
    async fn gate_fails_closed_on_oracle_error() {
        let fx = fixture().await;
        fx.storage
            .modify_settings(|s| {
                s.subscription.enabled = true;
                s.subscription.channels = vec!["@flaky".into()];
            })
            .await
            .expect("modify");
        fx.membership.error_on("@flaky");
        assert_eq!(fx.moderation.check_subscription_gate(7).await, Gate::Denied);
    }
}
