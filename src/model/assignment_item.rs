use chrono::{DateTime, Utc};
use serde::Serialize;

/// One assignment of a class as its instructor lists it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentItem {
    pub name: String,
    pub category: String,
    pub due: DateTime<Utc>,
    pub submissions: usize,
}

/// One assignment of a class as an enrolled student sees it. `score` is `None` until the
/// student submits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAssignment {
    pub name: String,
    pub category: String,
    pub due: DateTime<Utc>,
    pub score: Option<u32>,
}
