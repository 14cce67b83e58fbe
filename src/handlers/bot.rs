use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::timeout;

use crate::error::TrackerError;
use crate::handlers::commands::{help_text, Callback, Command};
use crate::models::course::CourseSnapshot;
use crate::models::notification::Action;
use crate::models::subscription::{CrnOutcome, UserId, UserPrefs};
use crate::services::oscar::CourseFetcher;
use crate::services::subscription::SubscriptionService;

const STORE_UNAVAILABLE: &str = "Something went wrong while saving your settings. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub actions: Vec<Action>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_actions(text: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            text: text.into(),
            actions,
        }
    }
}

/// Turns user commands and button presses into replies.
pub struct CommandHandler {
    term: String,
    request_timeout: Duration,
    subscriptions: SubscriptionService,
    fetcher: Arc<dyn CourseFetcher>,
}

impl CommandHandler {
    pub fn new(
        term: String,
        request_timeout: Duration,
        subscriptions: SubscriptionService,
        fetcher: Arc<dyn CourseFetcher>,
    ) -> Self {
        Self {
            term,
            request_timeout,
            subscriptions,
            fetcher,
        }
    }

    /// `None` when the message needs no answer.
    pub async fn handle_text(&self, user_id: UserId, text: &str) -> Option<Reply> {
        let command = Command::parse(text)?;
        log::debug!("User {} sent {:?}", user_id, command);

        let reply = match command {
            Command::Start | Command::Help => Reply::text(help_text()),
            Command::List => self.list(user_id).await,
            Command::Add(crns) if crns.is_empty() => {
                Reply::text("Invalid format. Use /add <CRN>[, <CRN>...].")
            }
            Command::Remove(crns) if crns.is_empty() => {
                Reply::text("Invalid format. Use /rem <CRN>[, <CRN>...].")
            }
            Command::Add(crns) => outcome_reply(self.subscriptions.add(user_id, &crns).await),
            Command::Remove(crns) => {
                outcome_reply(self.subscriptions.remove(user_id, &crns).await)
            }
            Command::MuteAll => {
                self.set_pref(user_id, |p| p.mute_all = true, "All notifications are now muted.")
                    .await
            }
            Command::UnmuteAll => {
                self.set_pref(user_id, |p| p.mute_all = false, "All notifications are now unmuted.")
                    .await
            }
            Command::MuteWaitlist => {
                self.set_pref(
                    user_id,
                    |p| p.mute_waitlist = true,
                    "Waitlist notifications are now muted.",
                )
                .await
            }
            Command::UnmuteWaitlist => {
                self.set_pref(
                    user_id,
                    |p| p.mute_waitlist = false,
                    "Waitlist notifications are now unmuted.",
                )
                .await
            }
            Command::Unknown(name) => Reply::text(format!(
                "Unknown command {}. Send /help to see what I can do.",
                name
            )),
        };

        Some(reply)
    }

    pub async fn handle_callback(&self, user_id: UserId, data: &str) -> Option<Reply> {
        let callback = match Callback::parse(data) {
            Some(callback) => callback,
            None => {
                log::debug!("Ignoring unknown callback '{}' from {}", data, user_id);
                return None;
            }
        };

        let reply = match callback {
            Callback::BackToList => self.list(user_id).await,
            Callback::Course(crn) => self.course_details(&crn).await,
            Callback::Remove(crn) => outcome_reply(self.subscriptions.remove(user_id, &[crn]).await),
        };
        Some(reply)
    }

    async fn list(&self, user_id: UserId) -> Reply {
        let crns = match self.subscriptions.tracked(user_id).await {
            Ok(crns) => crns,
            Err(e) => {
                log::error!("Failed to load CRNs for user {}: {}", user_id, e);
                return Reply::text(STORE_UNAVAILABLE);
            }
        };

        if crns.is_empty() {
            return Reply::text("No CRNs are being tracked.");
        }

        let lookups = join_all(crns.iter().map(|crn| self.lookup(crn))).await;
        let actions = crns
            .iter()
            .zip(lookups)
            .map(|(crn, lookup)| match lookup {
                Ok(snapshot) => Action::course(format!("{} - {}", snapshot.describe(), crn), crn),
                Err(_) => Action::course(format!("CRN {} (Invalid or Unavailable)", crn), crn),
            })
            .collect();

        Reply::with_actions("Click on a course to view details:", actions)
    }

    async fn course_details(&self, crn: &str) -> Reply {
        let back = Action::new("Back to List", "back_to_list");

        match self.lookup(crn).await {
            Ok(snapshot) => Reply::with_actions(
                snapshot.details(),
                vec![back, Action::new("Remove from List", format!("remove_{}", crn))],
            ),
            Err(e) => {
                log::warn!("Course details unavailable: {}", e);
                Reply::with_actions(format!("CRN {} (Invalid or Unavailable)", crn), vec![back])
            }
        }
    }

    async fn lookup(&self, crn: &str) -> Result<CourseSnapshot, TrackerError> {
        match timeout(self.request_timeout, self.fetcher.fetch(&self.term, crn)).await {
            Ok(result) => result,
            Err(_) => Err(TrackerError::fetch(crn, "timed out")),
        }
    }

    async fn set_pref<F>(&self, user_id: UserId, change: F, confirmation: &str) -> Reply
    where
        F: FnOnce(&mut UserPrefs),
    {
        match self.subscriptions.update_prefs(user_id, change).await {
            Ok(_) => Reply::text(confirmation),
            Err(e) => {
                log::error!("Failed to update preferences for user {}: {}", user_id, e);
                Reply::text(STORE_UNAVAILABLE)
            }
        }
    }
}

fn outcome_reply(result: Result<Vec<CrnOutcome>, TrackerError>) -> Reply {
    match result {
        Ok(outcomes) => Reply::text(
            outcomes
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Err(e) => {
            log::error!("Subscription change failed: {}", e);
            Reply::text(STORE_UNAVAILABLE)
        }
    }
}
