use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::TrackerError;
use crate::models::availability::TransitionState;
use crate::models::subscription::{is_valid_crn, CrnOutcome, UserId, UserPrefs};
use crate::services::store::SubscriptionStore;

pub type SharedTransitions = Arc<Mutex<TransitionState>>;

/// Add/remove operations over a user's tracked CRNs.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    transitions: SharedTransitions,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn SubscriptionStore>, transitions: SharedTransitions) -> Self {
        Self { store, transitions }
    }

    pub async fn tracked(&self, user_id: UserId) -> Result<BTreeSet<String>, TrackerError> {
        self.store.get_crns(user_id).await
    }

    /// Adds each CRN independently. The updated set is saved once; if saving
    /// fails every would-be addition is reported as not saved.
    pub async fn add(&self, user_id: UserId, crns: &[String]) -> Result<Vec<CrnOutcome>, TrackerError> {
        let mut current = self.store.get_crns(user_id).await?;

        let outcomes: Vec<CrnOutcome> = crns
            .iter()
            .map(|crn| {
                if !is_valid_crn(crn) {
                    CrnOutcome::Invalid(crn.clone())
                } else if current.insert(crn.clone()) {
                    CrnOutcome::Added(crn.clone())
                } else {
                    CrnOutcome::AlreadyTracked(crn.clone())
                }
            })
            .collect();

        if !outcomes.iter().any(CrnOutcome::changed) {
            return Ok(outcomes);
        }

        if let Err(e) = self.store.set_crns(user_id, &current).await {
            log::error!("Failed to save CRNs for user {}: {}", user_id, e);
            return Ok(not_saved(outcomes));
        }

        log::info!("User {} now tracks {} CRN(s)", user_id, current.len());
        Ok(outcomes)
    }

    /// Removes each CRN independently and clears its edge state once the
    /// new set is saved.
    pub async fn remove(&self, user_id: UserId, crns: &[String]) -> Result<Vec<CrnOutcome>, TrackerError> {
        let mut current = self.store.get_crns(user_id).await?;

        let outcomes: Vec<CrnOutcome> = crns
            .iter()
            .map(|crn| {
                if current.remove(crn) {
                    CrnOutcome::Removed(crn.clone())
                } else if is_valid_crn(crn) {
                    CrnOutcome::NotTracked(crn.clone())
                } else {
                    CrnOutcome::Invalid(crn.clone())
                }
            })
            .collect();

        if !outcomes.iter().any(CrnOutcome::changed) {
            return Ok(outcomes);
        }

        if let Err(e) = self.store.set_crns(user_id, &current).await {
            log::error!("Failed to save CRNs for user {}: {}", user_id, e);
            return Ok(not_saved(outcomes));
        }

        let mut transitions = self.transitions.lock().await;
        for outcome in outcomes.iter().filter(|o| o.changed()) {
            transitions.clear(user_id, outcome.crn());
        }
        drop(transitions);

        log::info!("User {} now tracks {} CRN(s)", user_id, current.len());
        Ok(outcomes)
    }

    pub async fn prefs(&self, user_id: UserId) -> Result<UserPrefs, TrackerError> {
        self.store.get_prefs(user_id).await
    }

    pub async fn update_prefs<F>(&self, user_id: UserId, change: F) -> Result<UserPrefs, TrackerError>
    where
        F: FnOnce(&mut UserPrefs),
    {
        let mut prefs = self.store.get_prefs(user_id).await?;
        change(&mut prefs);
        self.store.set_prefs(user_id, prefs).await?;
        Ok(prefs)
    }
}

fn not_saved(outcomes: Vec<CrnOutcome>) -> Vec<CrnOutcome> {
    outcomes
        .into_iter()
        .map(|outcome| match outcome {
            CrnOutcome::Added(crn) | CrnOutcome::Removed(crn) => CrnOutcome::NotSaved(crn),
            other => other,
        })
        .collect()
}
