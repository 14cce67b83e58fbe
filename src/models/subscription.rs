use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Chat identifier on the messaging platform.
pub type UserId = i64;

/// A user's tracked CRNs as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub user_id: UserId,
    pub crns: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct UserPrefs {
    pub mute_all: bool,
    pub mute_waitlist: bool,
}

/// Result of applying one CRN from an add/remove batch.
#[derive(Debug, Clone, PartialEq)]
pub enum CrnOutcome {
    Added(String),
    AlreadyTracked(String),
    Removed(String),
    NotTracked(String),
    Invalid(String),
    /// The batch could not be persisted; nothing was committed.
    NotSaved(String),
}

impl CrnOutcome {
    pub fn crn(&self) -> &str {
        match self {
            CrnOutcome::Added(crn)
            | CrnOutcome::AlreadyTracked(crn)
            | CrnOutcome::Removed(crn)
            | CrnOutcome::NotTracked(crn)
            | CrnOutcome::Invalid(crn)
            | CrnOutcome::NotSaved(crn) => crn,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, CrnOutcome::Added(_) | CrnOutcome::Removed(_))
    }
}

impl fmt::Display for CrnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrnOutcome::Added(crn) => write!(f, "CRN {} added to tracking.", crn),
            CrnOutcome::AlreadyTracked(crn) => write!(f, "CRN {} is already tracked.", crn),
            CrnOutcome::Removed(crn) => write!(f, "CRN {} removed from tracking.", crn),
            CrnOutcome::NotTracked(crn) => write!(f, "CRN {} is not tracked.", crn),
            CrnOutcome::Invalid(crn) => write!(f, "'{}' is not a valid CRN.", crn),
            CrnOutcome::NotSaved(crn) => {
                write!(f, "CRN {} could not be saved, please try again.", crn)
            }
        }
    }
}

/// CRNs are purely numeric on the registration site.
pub fn is_valid_crn(crn: &str) -> bool {
    !crn.is_empty() && crn.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crn_validation() {
        assert!(is_valid_crn("12345"));
        assert!(is_valid_crn("111"));
        assert!(!is_valid_crn(""));
        assert!(!is_valid_crn("12a45"));
        assert!(!is_valid_crn("-1"));
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            CrnOutcome::AlreadyTracked("111".to_string()).to_string(),
            "CRN 111 is already tracked."
        );
        assert_eq!(
            CrnOutcome::Added("222".to_string()).to_string(),
            "CRN 222 added to tracking."
        );
        assert!(CrnOutcome::Removed("1".to_string()).changed());
        assert!(!CrnOutcome::NotTracked("1".to_string()).changed());
    }
}
