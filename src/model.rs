pub mod assignment_item;
pub mod class_item;
pub mod class_offering;
pub mod course;
pub mod gradebook;
pub mod letter_grade;
pub mod request;
pub mod roster_entry;
pub mod semester;
pub mod submission_entry;
pub mod time_slot;
