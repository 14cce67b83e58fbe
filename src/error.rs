use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Network failure, timeout or non-success status from the registration site.
    #[error("failed to fetch CRN {crn}: {reason}")]
    Fetch { crn: String, reason: String },

    /// The CRN has no course page, or the page could not be read.
    #[error("CRN {0} is invalid or unavailable")]
    NotFound(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("message delivery failed: {0}")]
    Channel(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<surrealdb::Error> for TrackerError {
    fn from(err: surrealdb::Error) -> Self {
        TrackerError::Store(err.to_string())
    }
}

impl TrackerError {
    pub fn fetch(crn: &str, reason: impl ToString) -> Self {
        TrackerError::Fetch {
            crn: crn.to_string(),
            reason: reason.to_string(),
        }
    }
}
