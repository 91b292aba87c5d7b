/// Command, message and callback handlers
pub mod handlers;
/// teloxide-backed transport and membership oracle
pub mod telegram;

use crate::backup::Backup;
use crate::broadcast::Broadcaster;
use crate::catalog::Catalog;
use crate::config::Settings;
use crate::moderation::Moderation;
use crate::session::Sessions;
use crate::storage::Storage;
use std::sync::Arc;

/// Engine wiring shared by every handler through dptree.
pub struct App {
    pub settings: Arc<Settings>,
    pub storage: Arc<Storage>,
    pub catalog: Arc<Catalog>,
    pub moderation: Arc<Moderation>,
    pub broadcaster: Arc<Broadcaster>,
    pub backup: Arc<Backup>,
    pub sessions: Sessions,
}
