use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub uid: String,
    pub first_name: String,
    pub last_name: String,
    pub grade: String,
}
