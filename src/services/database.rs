use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::{Surreal, engine::local::{Db, Mem, SurrealKv}};

use crate::error::TrackerError;
use crate::models::subscription::{Subscription, UserId, UserPrefs};
use crate::services::store::SubscriptionStore;

const SUBSCRIPTIONS: &str = "user_subscriptions";
const PREFS: &str = "user_prefs";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrefsRow {
    user_id: UserId,
    mute_all: bool,
    mute_waitlist: bool,
}

#[derive(Clone)]
pub struct DatabaseService {
    db: Surreal<Db>,
}

impl DatabaseService {
    pub async fn new(database_url: &str) -> Result<Self, TrackerError> {
        let db = if database_url.starts_with("memory://") {
            Surreal::new::<Mem>(()).await?
        } else if let Some(path) = database_url.strip_prefix("file://") {
            Surreal::new::<SurrealKv>(path).await?
        } else {
            return Err(TrackerError::Config(format!(
                "Unsupported database URL: {}",
                database_url
            )));
        };

        db.use_ns("course_tracker").use_db("main").await?;

        let service = Self { db };
        service.health_check().await?;
        service.initialize_schema().await?;

        Ok(service)
    }

    async fn initialize_schema(&self) -> Result<(), TrackerError> {
        self.db
            .query(
                "
            DEFINE TABLE IF NOT EXISTS user_subscriptions SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS user_id ON user_subscriptions TYPE int;
            DEFINE FIELD IF NOT EXISTS crns ON user_subscriptions TYPE array<string>;

            DEFINE TABLE IF NOT EXISTS user_prefs SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS user_id ON user_prefs TYPE int;
            DEFINE FIELD IF NOT EXISTS mute_all ON user_prefs TYPE bool DEFAULT false;
            DEFINE FIELD IF NOT EXISTS mute_waitlist ON user_prefs TYPE bool DEFAULT false;
        ",
            )
            .await?
            .check()?;

        log::info!("Database schema initialized successfully");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), TrackerError> {
        self.db.health().await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for DatabaseService {
    async fn list_users(&self) -> Result<Vec<UserId>, TrackerError> {
        let rows: Vec<Subscription> = self.db.select(SUBSCRIPTIONS).await?;
        Ok(rows.into_iter().map(|row| row.user_id).collect())
    }

    async fn get_crns(&self, user_id: UserId) -> Result<BTreeSet<String>, TrackerError> {
        let row: Option<Subscription> =
            self.db.select((SUBSCRIPTIONS, user_id.to_string())).await?;
        Ok(row.map(|row| row.crns).unwrap_or_default())
    }

    async fn set_crns(&self, user_id: UserId, crns: &BTreeSet<String>) -> Result<(), TrackerError> {
        let row = Subscription {
            user_id,
            crns: crns.clone(),
        };
        let updated: Option<Subscription> = self
            .db
            .upsert((SUBSCRIPTIONS, user_id.to_string()))
            .content(row)
            .await?;

        updated
            .map(|_| ())
            .ok_or_else(|| TrackerError::Store(format!("Failed to save CRNs for {}", user_id)))
    }

    async fn get_prefs(&self, user_id: UserId) -> Result<UserPrefs, TrackerError> {
        let row: Option<PrefsRow> = self.db.select((PREFS, user_id.to_string())).await?;
        Ok(row
            .map(|row| UserPrefs {
                mute_all: row.mute_all,
                mute_waitlist: row.mute_waitlist,
            })
            .unwrap_or_default())
    }

    async fn set_prefs(&self, user_id: UserId, prefs: UserPrefs) -> Result<(), TrackerError> {
        let row = PrefsRow {
            user_id,
            mute_all: prefs.mute_all,
            mute_waitlist: prefs.mute_waitlist,
        };
        let updated: Option<PrefsRow> = self
            .db
            .upsert((PREFS, user_id.to_string()))
            .content(row)
            .await?;

        updated
            .map(|_| ())
            .ok_or_else(|| TrackerError::Store(format!("Failed to save preferences for {}", user_id)))
    }

    async fn clear_all_crns(&self) -> Result<usize, TrackerError> {
        let cleared: Vec<Subscription> = self
            .db
            .query("UPDATE user_subscriptions SET crns = []")
            .await?
            .take(0)?;
        Ok(cleared.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crns(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_subscription_operations() {
        let db = DatabaseService::new("memory://").await.unwrap();

        assert!(db.get_crns(7).await.unwrap().is_empty());

        db.set_crns(7, &crns(&["111", "222"])).await.unwrap();
        db.set_crns(-1001, &crns(&["333"])).await.unwrap();

        assert_eq!(db.get_crns(7).await.unwrap(), crns(&["111", "222"]));

        let mut users = db.list_users().await.unwrap();
        users.sort();
        assert_eq!(users, vec![-1001, 7]);

        db.set_crns(7, &crns(&["222"])).await.unwrap();
        assert_eq!(db.get_crns(7).await.unwrap(), crns(&["222"]));
    }

    #[tokio::test]
    async fn test_prefs_default_and_update() {
        let db = DatabaseService::new("memory://").await.unwrap();

        assert_eq!(db.get_prefs(7).await.unwrap(), UserPrefs::default());

        let prefs = UserPrefs { mute_all: false, mute_waitlist: true };
        db.set_prefs(7, prefs).await.unwrap();
        assert_eq!(db.get_prefs(7).await.unwrap(), prefs);
    }

    #[tokio::test]
    async fn test_clear_all_crns_keeps_users() {
        let db = DatabaseService::new("memory://").await.unwrap();
        db.set_crns(1, &crns(&["111"])).await.unwrap();
        db.set_crns(2, &crns(&["222", "333"])).await.unwrap();

        assert_eq!(db.clear_all_crns().await.unwrap(), 2);
        assert!(db.get_crns(1).await.unwrap().is_empty());
        assert!(db.get_crns(2).await.unwrap().is_empty());
        assert_eq!(db.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_url() {
        assert!(DatabaseService::new("postgres://localhost").await.is_err());
    }
}
