//! Data access for the scheduling validator and the grading engine.
//!
//! Everything goes through a [`Transaction`] obtained from a [`Store`]. Work is only
//! persisted by [`Transaction::commit`]; dropping a transaction discards it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, postgres::PgPoolOptions};

use crate::{
    config::DatabaseConfig,
    error::EngineResult,
    model::{
        class_item::ClassItem,
        class_offering::{ClassOffering, NewOffering},
        course::{ClassKey, Course},
        gradebook::{Assignment, AssignmentCategory, Enrollment, NewAssignment, Submission},
        letter_grade::Grade,
        roster_entry::RosterEntry,
        semester::Semester,
        submission_entry::SubmissionEntry,
    },
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a serializable unit of work.
    async fn begin(&self) -> EngineResult<Box<dyn Transaction>>;
}

#[async_trait]
pub trait Transaction: Send {
    // Catalog and users
    async fn find_course(&mut self, subject: &str, number: i32) -> EngineResult<Option<Course>>;
    async fn professor_exists(&mut self, uid: &str) -> EngineResult<bool>;
    async fn student_exists(&mut self, uid: &str) -> EngineResult<bool>;

    // Offerings
    async fn find_offering(
        &mut self,
        course_id: i32,
        semester: Semester,
    ) -> EngineResult<Option<ClassOffering>>;
    async fn find_class(&mut self, key: &ClassKey) -> EngineResult<Option<ClassOffering>>;
    async fn offerings_at_location(
        &mut self,
        semester: Semester,
        location: &str,
    ) -> EngineResult<Vec<ClassOffering>>;
    async fn offerings_taught_by(
        &mut self,
        semester: Semester,
        instructor: &str,
    ) -> EngineResult<Vec<ClassOffering>>;
    async fn insert_offering(
        &mut self,
        course_id: i32,
        offering: &NewOffering,
    ) -> EngineResult<ClassOffering>;

    // Enrollments
    async fn find_enrollment(
        &mut self,
        class_id: i32,
        student: &str,
    ) -> EngineResult<Option<Enrollment>>;
    /// Like `find_enrollment`, but holds the row until the transaction ends so concurrent
    /// grade writes for the same student and class queue up behind each other.
    async fn lock_enrollment(
        &mut self,
        class_id: i32,
        student: &str,
    ) -> EngineResult<Option<Enrollment>>;
    async fn insert_enrollment(
        &mut self,
        class_id: i32,
        student: &str,
        grade: Grade,
    ) -> EngineResult<()>;
    async fn enrollments_for_class(&mut self, class_id: i32) -> EngineResult<Vec<Enrollment>>;
    async fn enrollments_for_student(&mut self, student: &str) -> EngineResult<Vec<Enrollment>>;
    async fn set_grade(&mut self, class_id: i32, student: &str, grade: Grade) -> EngineResult<()>;

    // Categories and assignments
    async fn categories_for_class(&mut self, class_id: i32)
    -> EngineResult<Vec<AssignmentCategory>>;
    async fn find_category(
        &mut self,
        class_id: i32,
        name: &str,
    ) -> EngineResult<Option<AssignmentCategory>>;
    async fn insert_category(
        &mut self,
        class_id: i32,
        name: &str,
        weight: u32,
    ) -> EngineResult<AssignmentCategory>;
    async fn assignments_for_category(&mut self, category_id: i32)
    -> EngineResult<Vec<Assignment>>;
    async fn find_assignment(
        &mut self,
        category_id: i32,
        name: &str,
    ) -> EngineResult<Option<Assignment>>;
    async fn insert_assignment(&mut self, assignment: &NewAssignment) -> EngineResult<Assignment>;

    // Submissions
    async fn find_submission(
        &mut self,
        assignment_id: i32,
        student: &str,
    ) -> EngineResult<Option<Submission>>;
    async fn insert_submission(&mut self, submission: &Submission) -> EngineResult<()>;
    async fn update_submission_contents(
        &mut self,
        assignment_id: i32,
        student: &str,
        contents: &str,
        time: DateTime<Utc>,
    ) -> EngineResult<()>;
    async fn set_score(&mut self, assignment_id: i32, student: &str, score: u32)
    -> EngineResult<()>;
    /// Every submission to an assignment, oldest first.
    async fn submissions_for_assignment(
        &mut self,
        assignment_id: i32,
    ) -> EngineResult<Vec<SubmissionEntry>>;

    // Listings
    async fn student_classes(&mut self, student: &str) -> EngineResult<Vec<ClassItem>>;
    async fn class_roster(&mut self, class_id: i32) -> EngineResult<Vec<RosterEntry>>;

    async fn commit(self: Box<Self>) -> EngineResult<()>;
}

const SCHEMA: &str = "lms";

pub async fn init_database(config: &DatabaseConfig) -> Result<Pool<Postgres>, String> {
    let pool = match PgPoolOptions::new()
        .max_connections(config.max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET search_path TO {SCHEMA};"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect_with(config.connect_options())
        .await
    {
        Ok(p) => p,
        Err(e) => {
            return Err(format!("Could not connect to {}: {e}", config.host));
        }
    };

    // Initiate schema
    let mut transaction = match pool.begin().await {
        Ok(t) => t,
        Err(e) => return Err(format!("Could not begin schema transaction: {e}")),
    };

    // `after_connect` already pointed this connection at the schema, which may not exist yet.
    if let Err(e) = sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {SCHEMA};"))
        .execute(&mut *transaction)
        .await
    {
        return Err(format!("Could not create schema '{SCHEMA}': {e}"));
    }

    let tables = [
        (
            "departments",
            "CREATE TABLE IF NOT EXISTS departments(
            subject TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );",
        ),
        (
            "courses",
            "CREATE TABLE IF NOT EXISTS courses(
            course_id INTEGER PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
            subject TEXT NOT NULL REFERENCES departments (subject) ON UPDATE CASCADE,
            number INTEGER NOT NULL,
            name TEXT NOT NULL,
            CONSTRAINT course_listing UNIQUE (subject, number)
        );",
        ),
        (
            "professors",
            "CREATE TABLE IF NOT EXISTS professors(
            uid TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            works_in TEXT REFERENCES departments (subject)
        );",
        ),
        (
            "students",
            "CREATE TABLE IF NOT EXISTS students(
            uid TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            major TEXT REFERENCES departments (subject)
        );",
        ),
        (
            "classes",
            "CREATE TABLE IF NOT EXISTS classes(
            class_id INTEGER PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
            course_id INTEGER NOT NULL REFERENCES courses (course_id) ON DELETE CASCADE,
            season TEXT NOT NULL,
            year INTEGER NOT NULL,
            location TEXT NOT NULL,
            start_time TIME NOT NULL,
            end_time TIME NOT NULL,
            instructor TEXT NOT NULL REFERENCES professors (uid),
            CONSTRAINT one_offering_per_semester UNIQUE (course_id, season, year),
            CONSTRAINT class_time_ordered CHECK (start_time < end_time)
        );",
        ),
        (
            "enrolled",
            "CREATE TABLE IF NOT EXISTS enrolled(
            class_id INTEGER REFERENCES classes (class_id) ON DELETE CASCADE,
            student TEXT REFERENCES students (uid) ON DELETE CASCADE,
            grade TEXT NOT NULL DEFAULT '--',
            CONSTRAINT enrolled_pkey PRIMARY KEY (class_id, student)
        );",
        ),
        (
            "assignment_categories",
            "CREATE TABLE IF NOT EXISTS assignment_categories(
            category_id INTEGER PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
            class_id INTEGER NOT NULL REFERENCES classes (class_id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            weight INTEGER NOT NULL CHECK (weight >= 0),
            CONSTRAINT category_name UNIQUE (class_id, name)
        );",
        ),
        (
            "assignments",
            "CREATE TABLE IF NOT EXISTS assignments(
            assignment_id INTEGER PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
            category_id INTEGER NOT NULL REFERENCES assignment_categories (category_id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            max_points INTEGER NOT NULL CHECK (max_points > 0),
            due TIMESTAMPTZ NOT NULL,
            contents TEXT NOT NULL DEFAULT '',
            CONSTRAINT assignment_name UNIQUE (category_id, name)
        );",
        ),
        (
            "submissions",
            "CREATE TABLE IF NOT EXISTS submissions(
            assignment_id INTEGER REFERENCES assignments (assignment_id) ON DELETE CASCADE,
            student TEXT REFERENCES students (uid) ON DELETE CASCADE,
            score INTEGER NOT NULL DEFAULT 0 CHECK (score >= 0),
            contents TEXT NOT NULL DEFAULT '',
            time TIMESTAMPTZ NOT NULL,
            CONSTRAINT submission_pkey PRIMARY KEY (assignment_id, student)
        );",
        ),
    ];

    for (name, ddl) in tables {
        if let Err(e) = sqlx::query(ddl).execute(&mut *transaction).await {
            return Err(format!("Could not create table {name}: {e}"));
        }
    }

    // Conflict lookups filter on these
    let indexes = [
        "CREATE INDEX IF NOT EXISTS classes_by_room ON classes (season, year, location);",
        "CREATE INDEX IF NOT EXISTS classes_by_instructor ON classes (season, year, instructor);",
    ];

    for ddl in indexes {
        if let Err(e) = sqlx::query(ddl).execute(&mut *transaction).await {
            return Err(format!("Could not create index: {e}"));
        }
    }

    if let Err(e) = transaction.commit().await {
        return Err(format!("Could not commit table-creation transaction: {e}"));
    };

    Ok(pool)
}
