use serde::Serialize;

use crate::model::semester::Season;

/// One row of a student's class list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassItem {
    pub subject: String,
    pub number: i32,
    pub name: String,
    pub season: Season,
    pub year: i32,
    pub grade: String,
}
