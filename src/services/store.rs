use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TrackerError;
use crate::models::subscription::{UserId, UserPrefs};
use crate::services::database::DatabaseService;
use crate::services::file_store::JsonFileStore;

/// Per-user CRN sets and notification preferences.
///
/// `set_crns` and `set_prefs` are durable when they return `Ok`.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserId>, TrackerError>;

    async fn get_crns(&self, user_id: UserId) -> Result<BTreeSet<String>, TrackerError>;

    async fn set_crns(&self, user_id: UserId, crns: &BTreeSet<String>) -> Result<(), TrackerError>;

    async fn get_prefs(&self, user_id: UserId) -> Result<UserPrefs, TrackerError>;

    async fn set_prefs(&self, user_id: UserId, prefs: UserPrefs) -> Result<(), TrackerError>;

    /// Empties every user's CRN set, keeping the users themselves.
    async fn clear_all_crns(&self) -> Result<usize, TrackerError>;
}

/// Opens the store named by `database_url`.
///
/// `memory://` and `file://<path>` use SurrealDB, `json://<path>` a plain
/// JSON document.
pub async fn connect(database_url: &str) -> Result<Arc<dyn SubscriptionStore>, TrackerError> {
    if let Some(path) = database_url.strip_prefix("json://") {
        let store = JsonFileStore::open(path).await?;
        Ok(Arc::new(store))
    } else {
        let store = DatabaseService::new(database_url).await?;
        Ok(Arc::new(store))
    }
}
