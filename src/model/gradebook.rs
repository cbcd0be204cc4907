use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub class_id: i32,
    pub student: String,
    /// Letter grade, or the ungraded sentinel.
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCategory {
    pub category_id: i32,
    pub class_id: i32,
    pub name: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: i32,
    pub category_id: i32,
    pub name: String,
    pub max_points: u32,
    pub due: DateTime<Utc>,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub category_id: i32,
    pub name: String,
    pub max_points: u32,
    pub due: DateTime<Utc>,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub assignment_id: i32,
    pub student: String,
    pub score: u32,
    pub contents: String,
    pub time: DateTime<Utc>,
}
