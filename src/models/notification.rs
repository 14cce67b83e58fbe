use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::subscription::UserId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    SeatOpen,
    WaitlistOpen,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::SeatOpen => write!(f, "OPEN"),
            NotificationKind::WaitlistOpen => write!(f, "WAITLIST"),
        }
    }
}

/// A button attached to an outgoing message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub label: String,
    pub action_id: String,
}

impl Action {
    pub fn new(label: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action_id: action_id.into(),
        }
    }

    pub fn remove(crn: &str) -> Self {
        Self::new(format!("Remove {}", crn), format!("remove_{}", crn))
    }

    pub fn course(label: impl Into<String>, crn: &str) -> Self {
        Self::new(label, format!("course_{}", crn))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub user_id: UserId,
    pub crn: String,
    pub kind: NotificationKind,
    pub course: String,
}

impl NotificationEvent {
    pub fn message(&self, registration_url: &str) -> String {
        format!("{} SEAT AVAILABLE: {}\n\n{}", self.kind, self.course, registration_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_message() {
        let event = NotificationEvent {
            user_id: 42,
            crn: "12345".to_string(),
            kind: NotificationKind::WaitlistOpen,
            course: "CS 1332 (A)".to_string(),
        };
        assert_eq!(
            event.message("https://reg.example.edu"),
            "WAITLIST SEAT AVAILABLE: CS 1332 (A)\n\nhttps://reg.example.edu"
        );
    }

    #[test]
    fn test_remove_action() {
        let action = Action::remove("12345");
        assert_eq!(action.label, "Remove 12345");
        assert_eq!(action.action_id, "remove_12345");
    }
}
