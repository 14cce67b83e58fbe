//! In-memory collaborators for engine and handler tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::TrackerError;
use crate::models::course::CourseSnapshot;
use crate::models::notification::Action;
use crate::models::subscription::{UserId, UserPrefs};
use crate::services::oscar::CourseFetcher;
use crate::services::store::SubscriptionStore;
use crate::services::telegram::NotificationChannel;

#[derive(Default)]
pub struct FakeStore {
    crns: Mutex<HashMap<UserId, BTreeSet<String>>>,
    prefs: Mutex<HashMap<UserId, UserPrefs>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, user_id: UserId, crns: &[&str]) {
        self.crns
            .lock()
            .unwrap()
            .insert(user_id, crns.iter().map(|s| s.to_string()).collect());
    }

    pub fn seed_prefs(&self, user_id: UserId, prefs: UserPrefs) {
        self.prefs.lock().unwrap().insert(user_id, prefs);
    }

    pub fn crns_of(&self, user_id: UserId) -> BTreeSet<String> {
        self.crns.lock().unwrap().get(&user_id).cloned().unwrap_or_default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), TrackerError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TrackerError::Store("store unreachable".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), TrackerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TrackerError::Store("store unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for FakeStore {
    async fn list_users(&self) -> Result<Vec<UserId>, TrackerError> {
        self.check_read()?;
        let mut users: Vec<UserId> = self.crns.lock().unwrap().keys().copied().collect();
        users.sort();
        Ok(users)
    }

    async fn get_crns(&self, user_id: UserId) -> Result<BTreeSet<String>, TrackerError> {
        self.check_read()?;
        Ok(self.crns_of(user_id))
    }

    async fn set_crns(&self, user_id: UserId, crns: &BTreeSet<String>) -> Result<(), TrackerError> {
        self.check_write()?;
        self.crns.lock().unwrap().insert(user_id, crns.clone());
        Ok(())
    }

    async fn get_prefs(&self, user_id: UserId) -> Result<UserPrefs, TrackerError> {
        self.check_read()?;
        Ok(self.prefs.lock().unwrap().get(&user_id).copied().unwrap_or_default())
    }

    async fn set_prefs(&self, user_id: UserId, prefs: UserPrefs) -> Result<(), TrackerError> {
        self.check_write()?;
        self.prefs.lock().unwrap().insert(user_id, prefs);
        Ok(())
    }

    async fn clear_all_crns(&self) -> Result<usize, TrackerError> {
        self.check_write()?;
        let mut crns = self.crns.lock().unwrap();
        crns.values_mut().for_each(BTreeSet::clear);
        Ok(crns.len())
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Seats { remaining: u32, waitlist: u32 },
    Missing,
    Failing,
    Hanging,
}

/// Fetcher whose answer per CRN is set by the test.
#[derive(Default)]
pub struct ScriptedFetcher {
    answers: Mutex<HashMap<String, Scripted>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seats(&self, crn: &str, remaining: u32, waitlist: u32) {
        self.set(crn, Scripted::Seats { remaining, waitlist });
    }

    pub fn missing(&self, crn: &str) {
        self.set(crn, Scripted::Missing);
    }

    pub fn failing(&self, crn: &str) {
        self.set(crn, Scripted::Failing);
    }

    pub fn hanging(&self, crn: &str) {
        self.set(crn, Scripted::Hanging);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set(&self, crn: &str, answer: Scripted) {
        self.answers.lock().unwrap().insert(crn.to_string(), answer);
    }
}

pub fn snapshot(crn: &str, remaining: u32, waitlist: u32) -> CourseSnapshot {
    CourseSnapshot {
        crn: crn.to_string(),
        title: "Intro to Testing".to_string(),
        course: format!("CS {}", crn),
        section: "A".to_string(),
        capacity: 50,
        enrolled: 50 - remaining.min(50),
        remaining_seats: remaining,
        waitlist_capacity: 10,
        waitlist_enrolled: 10 - waitlist.min(10),
        waitlist_count: waitlist,
        fetched_at: Utc::now(),
    }
}

#[async_trait]
impl CourseFetcher for ScriptedFetcher {
    async fn fetch(&self, _term: &str, crn: &str) -> Result<CourseSnapshot, TrackerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answers.lock().unwrap().get(crn).cloned();

        match answer {
            Some(Scripted::Seats { remaining, waitlist }) => Ok(snapshot(crn, remaining, waitlist)),
            Some(Scripted::Failing) => Err(TrackerError::fetch(crn, "connection reset")),
            Some(Scripted::Hanging) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TrackerError::fetch(crn, "hung"))
            }
            Some(Scripted::Missing) | None => Err(TrackerError::NotFound(crn.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub user_id: UserId,
    pub text: String,
    pub actions: Vec<Action>,
}

/// Channel that records every message instead of sending it.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<Sent>>,
    unreachable: Mutex<HashSet<UserId>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, user_id: UserId) -> Vec<Sent> {
        self.sent().into_iter().filter(|s| s.user_id == user_id).collect()
    }

    pub fn unreachable(&self, user_id: UserId) {
        self.unreachable.lock().unwrap().insert(user_id);
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn notify(&self, user_id: UserId, text: &str, actions: &[Action]) -> Result<(), TrackerError> {
        if self.unreachable.lock().unwrap().contains(&user_id) {
            return Err(TrackerError::Channel(format!("chat {} not found", user_id)));
        }
        self.sent.lock().unwrap().push(Sent {
            user_id,
            text: text.to_string(),
            actions: actions.to_vec(),
        });
        Ok(())
    }
}
