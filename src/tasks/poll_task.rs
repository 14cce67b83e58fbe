use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::time::{sleep, timeout};

use crate::error::TrackerError;
use crate::models::availability::Availability;
use crate::models::course::CourseSnapshot;
use crate::models::notification::{Action, NotificationEvent, NotificationKind};
use crate::models::subscription::{UserId, UserPrefs};
use crate::services::oscar::CourseFetcher;
use crate::services::store::SubscriptionStore;
use crate::services::subscription::SharedTransitions;
use crate::services::telegram::NotificationChannel;

/// Counters for one pass over every tracked CRN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub users: usize,
    pub checked: usize,
    pub failed: usize,
    pub notified: usize,
    pub muted: usize,
    pub undelivered: usize,
}

/// Polls every tracked CRN and notifies users on closed-to-open edges.
pub struct PollingEngine {
    term: String,
    registration_url: String,
    request_timeout: Duration,
    store: Arc<dyn SubscriptionStore>,
    fetcher: Arc<dyn CourseFetcher>,
    channel: Arc<dyn NotificationChannel>,
    transitions: SharedTransitions,
}

impl PollingEngine {
    pub fn new(
        term: String,
        registration_url: String,
        request_timeout: Duration,
        store: Arc<dyn SubscriptionStore>,
        fetcher: Arc<dyn CourseFetcher>,
        channel: Arc<dyn NotificationChannel>,
        transitions: SharedTransitions,
    ) -> Self {
        Self {
            term,
            registration_url,
            request_timeout,
            store,
            fetcher,
            channel,
            transitions,
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, TrackerError> {
        let mut report = CycleReport::default();

        // Removals that land during the reads below stay tombstoned.
        self.transitions.lock().await.begin_cycle();

        let users = self.store.list_users().await?;
        let mut subscriptions: HashMap<UserId, BTreeSet<String>> = HashMap::new();
        let mut unreadable: HashSet<UserId> = HashSet::new();

        for user_id in users {
            match self.store.get_crns(user_id).await {
                Ok(crns) => {
                    subscriptions.insert(user_id, crns);
                }
                Err(e) => {
                    log::warn!("Skipping user {} this cycle: {}", user_id, e);
                    unreadable.insert(user_id);
                }
            }
        }
        report.users = subscriptions.len();

        {
            let mut state = self.transitions.lock().await;
            let pruned = state.retain_subscribed(|user_id, crn| {
                unreadable.contains(&user_id)
                    || subscriptions
                        .get(&user_id)
                        .map_or(false, |crns| crns.contains(crn))
            });
            if pruned > 0 {
                log::debug!("Dropped {} stale transition entries", pruned);
            }
        }

        let distinct: BTreeSet<&str> = subscriptions
            .values()
            .flat_map(|crns| crns.iter().map(String::as_str))
            .collect();

        let fetched = join_all(distinct.iter().map(|crn| self.fetch_bounded(crn))).await;
        let mut observations: HashMap<&str, CourseSnapshot> = HashMap::new();
        for (crn, result) in distinct.iter().zip(fetched) {
            report.checked += 1;
            match result {
                Ok(snapshot) => {
                    observations.insert(*crn, snapshot);
                }
                Err(TrackerError::NotFound(_)) => {
                    report.failed += 1;
                    log::warn!("CRN {} is invalid or unavailable, skipping", crn);
                }
                Err(e) => {
                    report.failed += 1;
                    log::warn!("{}", e);
                }
            }
        }

        for (user_id, crns) in &subscriptions {
            let prefs = self.prefs_for(*user_id).await;

            for crn in crns {
                let Some(snapshot) = observations.get(crn.as_str()) else {
                    continue;
                };

                let kinds = {
                    let mut state = self.transitions.lock().await;
                    state.apply(*user_id, crn, Availability::observe(snapshot))
                };

                for kind in kinds {
                    if is_muted(&prefs, kind) {
                        report.muted += 1;
                        continue;
                    }
                    let event = NotificationEvent {
                        user_id: *user_id,
                        crn: crn.clone(),
                        kind,
                        course: snapshot.describe(),
                    };
                    match self.deliver(&event).await {
                        Ok(()) => report.notified += 1,
                        Err(e) => {
                            report.undelivered += 1;
                            log::error!("Could not notify user {} about CRN {}: {}", user_id, crn, e);
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    async fn fetch_bounded(&self, crn: &str) -> Result<CourseSnapshot, TrackerError> {
        match timeout(self.request_timeout, self.fetcher.fetch(&self.term, crn)).await {
            Ok(result) => result,
            Err(_) => Err(TrackerError::fetch(crn, "timed out")),
        }
    }

    async fn prefs_for(&self, user_id: UserId) -> UserPrefs {
        match self.store.get_prefs(user_id).await {
            Ok(prefs) => prefs,
            Err(e) => {
                log::warn!("Using default preferences for user {}: {}", user_id, e);
                UserPrefs::default()
            }
        }
    }

    /// Sends the alert, then the bare CRN on its own for easy copying.
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), TrackerError> {
        let text = event.message(&self.registration_url);
        self.notify_bounded(event.user_id, &text, &[Action::remove(&event.crn)])
            .await?;
        self.notify_bounded(event.user_id, &event.crn, &[]).await
    }

    async fn notify_bounded(&self, user_id: UserId, text: &str, actions: &[Action]) -> Result<(), TrackerError> {
        match timeout(self.request_timeout, self.channel.notify(user_id, text, actions)).await {
            Ok(result) => result,
            Err(_) => Err(TrackerError::Channel(format!("sending to {} timed out", user_id))),
        }
    }
}

fn is_muted(prefs: &UserPrefs, kind: NotificationKind) -> bool {
    prefs.mute_all || (kind == NotificationKind::WaitlistOpen && prefs.mute_waitlist)
}

/// Runs poll cycles forever, `interval` apart. A failed cycle is logged and
/// the next one runs on schedule.
pub async fn start_poll_task(engine: Arc<PollingEngine>, interval: Duration) {
    log::info!("🔁 Polling tracked CRNs every {}s", interval.as_secs());

    loop {
        let started = Instant::now();
        match engine.run_cycle().await {
            Ok(report) => log::info!(
                "Cycle done in {:?}: users={} checked={} failed={} notified={} muted={} undelivered={}",
                started.elapsed(),
                report.users,
                report.checked,
                report.failed,
                report.notified,
                report.muted,
                report.undelivered,
            ),
            Err(e) => log::error!("❌ Poll cycle failed: {}", e),
        }
        sleep(interval).await;
    }
}
