use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::TrackerError;
use crate::models::subscription::{UserId, UserPrefs};
use crate::services::store::SubscriptionStore;

/// On-disk document: `{ "subscriptions": { "<user>": [crn, ...] }, "prefs": { ... } }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    subscriptions: BTreeMap<UserId, BTreeSet<String>>,
    #[serde(default)]
    prefs: BTreeMap<UserId, UserPrefs>,
}

/// Subscription store kept in a single JSON file.
///
/// Every mutation rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written document behind.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreFile>,
}

impl JsonFileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref().to_path_buf();

        let state = match fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                TrackerError::Store(format!("{} is not a valid store file: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No store file at {}, starting empty", path.display());
                StoreFile::default()
            }
            Err(e) => {
                return Err(TrackerError::Store(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &StoreFile) -> Result<(), TrackerError> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| TrackerError::Store(format!("Failed to serialize store: {}", e)))?;

        let tmp = self.path.with_extension("tmp");
        let write_err =
            |e: std::io::Error| TrackerError::Store(format!("Failed to write {}: {}", tmp.display(), e));

        let mut file = fs::File::create(&tmp).await.map_err(write_err)?;
        file.write_all(json.as_bytes()).await.map_err(write_err)?;
        // Contents must be on disk before the rename publishes them.
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        fs::rename(&tmp, &self.path).await.map_err(|e| {
            TrackerError::Store(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        Ok(())
    }

    /// Applies `change` to a copy and commits it only once it is on disk.
    async fn update<F, T>(&self, change: F) -> Result<T, TrackerError>
    where
        F: FnOnce(&mut StoreFile) -> T,
    {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let result = change(&mut next);
        self.persist(&next).await?;
        *state = next;
        Ok(result)
    }
}

#[async_trait]
impl SubscriptionStore for JsonFileStore {
    async fn list_users(&self) -> Result<Vec<UserId>, TrackerError> {
        let state = self.state.lock().await;
        Ok(state.subscriptions.keys().copied().collect())
    }

    async fn get_crns(&self, user_id: UserId) -> Result<BTreeSet<String>, TrackerError> {
        let state = self.state.lock().await;
        Ok(state.subscriptions.get(&user_id).cloned().unwrap_or_default())
    }

    async fn set_crns(&self, user_id: UserId, crns: &BTreeSet<String>) -> Result<(), TrackerError> {
        let crns = crns.clone();
        self.update(move |state| {
            state.subscriptions.insert(user_id, crns);
        })
        .await
    }

    async fn get_prefs(&self, user_id: UserId) -> Result<UserPrefs, TrackerError> {
        let state = self.state.lock().await;
        Ok(state.prefs.get(&user_id).copied().unwrap_or_default())
    }

    async fn set_prefs(&self, user_id: UserId, prefs: UserPrefs) -> Result<(), TrackerError> {
        self.update(move |state| {
            state.prefs.insert(user_id, prefs);
        })
        .await
    }

    async fn clear_all_crns(&self) -> Result<usize, TrackerError> {
        self.update(|state| {
            state.subscriptions.values_mut().for_each(BTreeSet::clear);
            state.subscriptions.len()
        })
        .await
    }
}
