use std::collections::{HashMap, HashSet};

use crate::models::course::CourseSnapshot;
use crate::models::notification::NotificationKind;
use crate::models::subscription::UserId;

/// Last observed open/closed state of one course for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Availability {
    pub seats_open: bool,
    pub waitlist_open: bool,
}

impl Availability {
    pub fn observe(snapshot: &CourseSnapshot) -> Self {
        Self {
            seats_open: snapshot.seats_open(),
            waitlist_open: snapshot.waitlist_open(),
        }
    }
}

/// Converts a level observation into edges.
///
/// A kind fires only when it is open now and was closed (or never seen)
/// before. The returned state is always the new observation.
pub fn transition(
    previous: Option<Availability>,
    observed: Availability,
) -> (Availability, Vec<NotificationKind>) {
    let previous = previous.unwrap_or_default();
    let mut events = Vec::new();

    if observed.seats_open && !previous.seats_open {
        events.push(NotificationKind::SeatOpen);
    }
    if observed.waitlist_open && !previous.waitlist_open {
        events.push(NotificationKind::WaitlistOpen);
    }

    (observed, events)
}

type Key = (UserId, String);

/// In-memory edge state, shared by the poll loop and the command loop.
#[derive(Debug, Default)]
pub struct TransitionState {
    entries: HashMap<Key, Availability>,
    // Pairs cleared since the current cycle began; late observations for
    // them are dropped.
    cleared: HashSet<Key>,
}

impl TransitionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: UserId, crn: &str) -> Option<Availability> {
        self.entries.get(&(user_id, crn.to_string())).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks the start of a poll cycle.
    pub fn begin_cycle(&mut self) {
        self.cleared.clear();
    }

    /// Records an observation and returns the edges it produced.
    pub fn apply(
        &mut self,
        user_id: UserId,
        crn: &str,
        observed: Availability,
    ) -> Vec<NotificationKind> {
        let key = (user_id, crn.to_string());
        if self.cleared.contains(&key) {
            return Vec::new();
        }

        let (next, events) = transition(self.entries.get(&key).copied(), observed);
        self.entries.insert(key, next);
        events
    }

    /// Drops the entry so a later subscription starts from a closed baseline.
    pub fn clear(&mut self, user_id: UserId, crn: &str) {
        let key = (user_id, crn.to_string());
        self.entries.remove(&key);
        self.cleared.insert(key);
    }

    /// Keeps only entries for pairs that are still subscribed.
    pub fn retain_subscribed<F>(&mut self, mut subscribed: F) -> usize
    where
        F: FnMut(UserId, &str) -> bool,
    {
        let before = self.entries.len();
        self.entries
            .retain(|(user_id, crn), _| subscribed(*user_id, crn));
        before - self.entries.len()
    }
}
