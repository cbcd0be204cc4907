use serde::{Deserialize, Serialize};

use crate::model::{semester::Semester, time_slot::TimeSlot};

/// A scheduled section of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassOffering {
    pub class_id: i32,
    pub course_id: i32,
    pub semester: Semester,
    pub slot: TimeSlot,
    pub location: String,
    pub instructor: String,
}

/// A section an administrator wants to schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOffering {
    pub subject: String,
    pub number: i32,
    pub semester: Semester,
    pub slot: TimeSlot,
    pub location: String,
    pub instructor: String,
}
