use chrono::{DateTime, Utc};
use serde::Serialize;

/// A submission to one assignment, with the submitting student's name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionEntry {
    pub uid: String,
    pub first_name: String,
    pub last_name: String,
    pub time: DateTime<Utc>,
    pub score: u32,
}
