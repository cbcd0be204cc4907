use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    course::ClassKey,
    semester::{Season, Semester},
};

/// Body accepted by every JSON endpoint. Each endpoint destructures the fields it needs.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientRequest {
    // Class identity
    pub subject: Option<String>,
    pub number: Option<i32>,
    pub season: Option<Season>,
    pub year: Option<i32>,

    // New class
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
    pub instructor: Option<String>,

    // Categories and assignments
    pub category: Option<String>,
    pub weight: Option<u32>,
    pub assignment_name: Option<String>,
    pub max_points: Option<u32>,
    pub due: Option<DateTime<Utc>>,
    pub contents: Option<String>,

    // Students and grading
    pub uid: Option<String>,
    pub score: Option<u32>,
}

impl ClientRequest {
    /// Returns the class named by (subject, number, season, year)
    pub fn class_key(&self) -> Option<ClassKey> {
        if let (Some(subject), Some(number), Some(season), Some(year)) =
            (self.subject.clone(), self.number, self.season, self.year)
        {
            Some(ClassKey {
                subject,
                number,
                semester: Semester::new(season, year),
            })
        } else {
            None
        }
    }
}
