use std::sync::Arc;

use crate::error::TrackerError;
use crate::services::store::SubscriptionStore;
use crate::services::telegram::NotificationChannel;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
}

/// One-shot operator commands run from the command line.
pub struct MaintenanceService {
    store: Arc<dyn SubscriptionStore>,
}

impl MaintenanceService {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Sends `message` to every known user. A user that cannot be reached is
    /// counted and skipped.
    pub async fn broadcast(
        &self,
        channel: &dyn NotificationChannel,
        message: &str,
    ) -> Result<BroadcastReport, TrackerError> {
        if message.trim().is_empty() {
            return Err(TrackerError::Config("broadcast message is empty".to_string()));
        }

        let mut report = BroadcastReport::default();
        for user_id in self.store.list_users().await? {
            match channel.notify(user_id, message, &[]).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    log::warn!("Broadcast to {} failed: {}", user_id, e);
                }
            }
        }

        log::info!("📣 Broadcast sent to {} user(s), {} failed", report.sent, report.failed);
        Ok(report)
    }

    /// Empties every user's CRN set. Returns how many users were touched.
    pub async fn clear_all_crns(&self) -> Result<usize, TrackerError> {
        let cleared = self.store.clear_all_crns().await?;
        log::info!("🧹 Cleared tracked CRNs for {} user(s)", cleared);
        Ok(cleared)
    }
}
