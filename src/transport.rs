//! Seams to the chat transport.
//!
//! The engines never talk to Telegram directly; they go through these
//! traits so the core stays testable with in-memory doubles. The
//! teloxide-backed implementations live in [`crate::bot`].

use crate::models::JoinRequest;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("membership lookup failed: {0}")]
    Membership(String),
}

/// Outbound message delivery.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a plain text message to a chat.
    async fn send_text(&self, user_id: i64, text: &str) -> Result<(), TransportError>;

    /// Notify an admin of a new join request, with approve/reject
    /// affordances attached.
    async fn send_join_request(
        &self,
        admin_id: i64,
        request: &JoinRequest,
    ) -> Result<(), TransportError>;
}

/// The membership oracle behind the subscription gate.
#[async_trait]
pub trait Membership: Send + Sync {
    /// Whether `user_id` is currently a member of `channel`.
    async fn is_member(&self, channel: &str, user_id: i64) -> Result<bool, TransportError>;
}

#[cfg(test)]
pub(crate) mod doubles {
    use super::{Membership, Transport, TransportError};
    use crate::models::JoinRequest;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// Records every send; recipients in `failing` error out instead.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Mutex<Vec<(i64, String)>>,
        pub join_prompts: Mutex<Vec<(i64, JoinRequest)>>,
        pub failing: Mutex<HashSet<i64>>,
    }

    impl RecordingTransport {
        pub fn fail_for(&self, user_id: i64) {
            self.failing.lock().expect("lock").insert(user_id);
        }

        pub fn sent_to(&self, user_id: i64) -> Vec<String> {
            self.sent
                .lock()
                .expect("lock")
                .iter()
                .filter(|(id, _)| *id == user_id)
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_text(&self, user_id: i64, text: &str) -> Result<(), TransportError> {
            if self.failing.lock().expect("lock").contains(&user_id) {
                return Err(TransportError::Delivery(format!("blocked by {user_id}")));
            }
            self.sent
                .lock()
                .expect("lock")
                .push((user_id, text.to_string()));
            Ok(())
        }

        async fn send_join_request(
            &self,
            admin_id: i64,
            request: &JoinRequest,
        ) -> Result<(), TransportError> {
            if self.failing.lock().expect("lock").contains(&admin_id) {
                return Err(TransportError::Delivery(format!("blocked by {admin_id}")));
            }
            self.join_prompts
                .lock()
                .expect("lock")
                .push((admin_id, request.clone()));
            Ok(())
        }
    }

    /// Scripted oracle: membership per (channel, user), with optional
    /// per-channel errors.
    #[derive(Default)]
    pub struct ScriptedMembership {
        pub members: Mutex<HashMap<(String, i64), bool>>,
        pub erroring: Mutex<HashSet<String>>,
    }

    impl ScriptedMembership {
        pub fn set(&self, channel: &str, user_id: i64, member: bool) {
            self.members
                .lock()
                .expect("lock")
                .insert((channel.to_string(), user_id), member);
        }

        pub fn error_on(&self, channel: &str) {
            self.erroring
                .lock()
                .expect("lock")
                .insert(channel.to_string());
        }
    }

    #[async_trait]
    impl Membership for ScriptedMembership {
        async fn is_member(&self, channel: &str, user_id: i64) -> Result<bool, TransportError> {
            if self.erroring.lock().expect("lock").contains(channel) {
                return Err(TransportError::Membership(format!(
                    "oracle unavailable for {channel}"
                )));
            }
            Ok(*self
                .members
                .lock()
                .expect("lock")
                .get(&(channel.to_string(), user_id))
                .unwrap_or(&false))
        }
    }
}
