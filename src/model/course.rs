use serde::{Deserialize, Serialize};

use crate::model::semester::Semester;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: i32,
    pub subject: String,
    pub number: i32,
    pub name: String,
}

/// How clients name a class: a catalog listing plus the semester it is offered in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassKey {
    pub subject: String,
    pub number: i32,
    pub semester: Semester,
}

impl std::fmt::Display for ClassKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.number, self.semester)
    }
}
