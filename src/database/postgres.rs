use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::{
    database::{Store, Transaction},
    error::{EngineError, EngineResult},
    model::{
        class_item::ClassItem,
        class_offering::{ClassOffering, NewOffering},
        course::{ClassKey, Course},
        gradebook::{Assignment, AssignmentCategory, Enrollment, NewAssignment, Submission},
        letter_grade::Grade,
        roster_entry::RosterEntry,
        semester::{Season, Semester},
        submission_entry::SubmissionEntry,
        time_slot::TimeSlot,
    },
};

const OFFERING_COLUMNS: &str =
    "class_id, course_id, season, year, location, start_time, end_time, instructor";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> EngineResult<Box<dyn Transaction>> {
        let mut transaction = self.pool.begin().await?;

        // Check-then-insert is only safe against interleaved writers at this level.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE;")
            .execute(&mut *transaction)
            .await?;

        Ok(Box::new(PgTransaction { transaction }))
    }
}

pub struct PgTransaction {
    transaction: sqlx::Transaction<'static, Postgres>,
}

fn to_u32(value: i32, column: &str) -> EngineResult<u32> {
    u32::try_from(value).map_err(|_| EngineError::Storage(format!("negative {column}: {value}")))
}

fn offering_from_row(row: &PgRow) -> EngineResult<ClassOffering> {
    let season: String = row.try_get("season")?;
    let season = season.parse::<Season>().map_err(EngineError::Storage)?;
    let start: NaiveTime = row.try_get("start_time")?;
    let end: NaiveTime = row.try_get("end_time")?;

    Ok(ClassOffering {
        class_id: row.try_get("class_id")?,
        course_id: row.try_get("course_id")?,
        semester: Semester::new(season, row.try_get("year")?),
        slot: TimeSlot::new(start, end)?,
        location: row.try_get("location")?,
        instructor: row.try_get("instructor")?,
    })
}

fn enrollment_from_row(row: &PgRow) -> EngineResult<Enrollment> {
    Ok(Enrollment {
        class_id: row.try_get("class_id")?,
        student: row.try_get("student")?,
        grade: row.try_get("grade")?,
    })
}

fn category_from_row(row: &PgRow) -> EngineResult<AssignmentCategory> {
    Ok(AssignmentCategory {
        category_id: row.try_get("category_id")?,
        class_id: row.try_get("class_id")?,
        name: row.try_get("name")?,
        weight: to_u32(row.try_get("weight")?, "weight")?,
    })
}

fn assignment_from_row(row: &PgRow) -> EngineResult<Assignment> {
    Ok(Assignment {
        assignment_id: row.try_get("assignment_id")?,
        category_id: row.try_get("category_id")?,
        name: row.try_get("name")?,
        max_points: to_u32(row.try_get("max_points")?, "max_points")?,
        due: row.try_get("due")?,
        contents: row.try_get("contents")?,
    })
}

fn submission_from_row(row: &PgRow) -> EngineResult<Submission> {
    Ok(Submission {
        assignment_id: row.try_get("assignment_id")?,
        student: row.try_get("student")?,
        score: to_u32(row.try_get("score")?, "score")?,
        contents: row.try_get("contents")?,
        time: row.try_get("time")?,
    })
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn find_course(&mut self, subject: &str, number: i32) -> EngineResult<Option<Course>> {
        let row = sqlx::query(
            "SELECT course_id, subject, number, name FROM courses
            WHERE subject = $1 AND number = $2;",
        )
        .bind(subject)
        .bind(number)
        .fetch_optional(&mut *self.transaction)
        .await?;

        row.map(|r| -> EngineResult<Course> {
            Ok(Course {
                course_id: r.try_get("course_id")?,
                subject: r.try_get("subject")?,
                number: r.try_get("number")?,
                name: r.try_get("name")?,
            })
        })
        .transpose()
    }

    async fn professor_exists(&mut self, uid: &str) -> EngineResult<bool> {
        let row = sqlx::query("SELECT 1 FROM professors WHERE uid = $1;")
            .bind(uid)
            .fetch_optional(&mut *self.transaction)
            .await?;
        Ok(row.is_some())
    }

    async fn student_exists(&mut self, uid: &str) -> EngineResult<bool> {
        let row = sqlx::query("SELECT 1 FROM students WHERE uid = $1;")
            .bind(uid)
            .fetch_optional(&mut *self.transaction)
            .await?;
        Ok(row.is_some())
    }

    async fn find_offering(
        &mut self,
        course_id: i32,
        semester: Semester,
    ) -> EngineResult<Option<ClassOffering>> {
        let row = sqlx::query(&format!(
            "SELECT {OFFERING_COLUMNS} FROM classes
            WHERE course_id = $1 AND season = $2 AND year = $3;"
        ))
        .bind(course_id)
        .bind(semester.season.as_str())
        .bind(semester.year)
        .fetch_optional(&mut *self.transaction)
        .await?;

        row.as_ref().map(offering_from_row).transpose()
    }

    async fn find_class(&mut self, key: &ClassKey) -> EngineResult<Option<ClassOffering>> {
        let row = sqlx::query(
            "SELECT c.class_id, c.course_id, c.season, c.year, c.location,
                c.start_time, c.end_time, c.instructor
            FROM classes c
            JOIN courses co ON co.course_id = c.course_id
            WHERE co.subject = $1 AND co.number = $2 AND c.season = $3 AND c.year = $4;",
        )
        .bind(&key.subject)
        .bind(key.number)
        .bind(key.semester.season.as_str())
        .bind(key.semester.year)
        .fetch_optional(&mut *self.transaction)
        .await?;

        row.as_ref().map(offering_from_row).transpose()
    }

    async fn offerings_at_location(
        &mut self,
        semester: Semester,
        location: &str,
    ) -> EngineResult<Vec<ClassOffering>> {
        let rows = sqlx::query(&format!(
            "SELECT {OFFERING_COLUMNS} FROM classes
            WHERE season = $1 AND year = $2 AND location = $3;"
        ))
        .bind(semester.season.as_str())
        .bind(semester.year)
        .bind(location)
        .fetch_all(&mut *self.transaction)
        .await?;

        rows.iter().map(offering_from_row).collect()
    }

    async fn offerings_taught_by(
        &mut self,
        semester: Semester,
        instructor: &str,
    ) -> EngineResult<Vec<ClassOffering>> {
        let rows = sqlx::query(&format!(
            "SELECT {OFFERING_COLUMNS} FROM classes
            WHERE season = $1 AND year = $2 AND instructor = $3;"
        ))
        .bind(semester.season.as_str())
        .bind(semester.year)
        .bind(instructor)
        .fetch_all(&mut *self.transaction)
        .await?;

        rows.iter().map(offering_from_row).collect()
    }

    async fn insert_offering(
        &mut self,
        course_id: i32,
        offering: &NewOffering,
    ) -> EngineResult<ClassOffering> {
        let row = sqlx::query(&format!(
            "INSERT INTO classes (course_id, season, year, location, start_time, end_time, instructor)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {OFFERING_COLUMNS};"
        ))
        .bind(course_id)
        .bind(offering.semester.season.as_str())
        .bind(offering.semester.year)
        .bind(&offering.location)
        .bind(offering.slot.start())
        .bind(offering.slot.end())
        .bind(&offering.instructor)
        .fetch_one(&mut *self.transaction)
        .await?;

        offering_from_row(&row)
    }

    async fn find_enrollment(
        &mut self,
        class_id: i32,
        student: &str,
    ) -> EngineResult<Option<Enrollment>> {
        let row = sqlx::query(
            "SELECT class_id, student, grade FROM enrolled
            WHERE class_id = $1 AND student = $2;",
        )
        .bind(class_id)
        .bind(student)
        .fetch_optional(&mut *self.transaction)
        .await?;

        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn lock_enrollment(
        &mut self,
        class_id: i32,
        student: &str,
    ) -> EngineResult<Option<Enrollment>> {
        let row = sqlx::query(
            "SELECT class_id, student, grade FROM enrolled
            WHERE class_id = $1 AND student = $2
            FOR UPDATE;",
        )
        .bind(class_id)
        .bind(student)
        .fetch_optional(&mut *self.transaction)
        .await?;

        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn insert_enrollment(
        &mut self,
        class_id: i32,
        student: &str,
        grade: Grade,
    ) -> EngineResult<()> {
        sqlx::query("INSERT INTO enrolled (class_id, student, grade) VALUES ($1, $2, $3);")
            .bind(class_id)
            .bind(student)
            .bind(grade.to_string())
            .execute(&mut *self.transaction)
            .await?;
        Ok(())
    }

    async fn enrollments_for_class(&mut self, class_id: i32) -> EngineResult<Vec<Enrollment>> {
        let rows = sqlx::query(
            "SELECT class_id, student, grade FROM enrolled
            WHERE class_id = $1
            ORDER BY student ASC;",
        )
        .bind(class_id)
        .fetch_all(&mut *self.transaction)
        .await?;

        rows.iter().map(enrollment_from_row).collect()
    }

    async fn enrollments_for_student(&mut self, student: &str) -> EngineResult<Vec<Enrollment>> {
        let rows = sqlx::query(
            "SELECT class_id, student, grade FROM enrolled
            WHERE student = $1
            ORDER BY class_id ASC;",
        )
        .bind(student)
        .fetch_all(&mut *self.transaction)
        .await?;

        rows.iter().map(enrollment_from_row).collect()
    }

    async fn set_grade(&mut self, class_id: i32, student: &str, grade: Grade) -> EngineResult<()> {
        sqlx::query("UPDATE enrolled SET grade = $1 WHERE class_id = $2 AND student = $3;")
            .bind(grade.to_string())
            .bind(class_id)
            .bind(student)
            .execute(&mut *self.transaction)
            .await?;
        Ok(())
    }

    async fn categories_for_class(
        &mut self,
        class_id: i32,
    ) -> EngineResult<Vec<AssignmentCategory>> {
        let rows = sqlx::query(
            "SELECT category_id, class_id, name, weight FROM assignment_categories
            WHERE class_id = $1
            ORDER BY category_id ASC;",
        )
        .bind(class_id)
        .fetch_all(&mut *self.transaction)
        .await?;

        rows.iter().map(category_from_row).collect()
    }

    async fn find_category(
        &mut self,
        class_id: i32,
        name: &str,
    ) -> EngineResult<Option<AssignmentCategory>> {
        let row = sqlx::query(
            "SELECT category_id, class_id, name, weight FROM assignment_categories
            WHERE class_id = $1 AND name = $2;",
        )
        .bind(class_id)
        .bind(name)
        .fetch_optional(&mut *self.transaction)
        .await?;

        row.as_ref().map(category_from_row).transpose()
    }

    async fn insert_category(
        &mut self,
        class_id: i32,
        name: &str,
        weight: u32,
    ) -> EngineResult<AssignmentCategory> {
        let weight = i32::try_from(weight)
            .map_err(|_| EngineError::invalid(format!("category weight {weight} is too large")))?;

        let row = sqlx::query(
            "INSERT INTO assignment_categories (class_id, name, weight)
            VALUES ($1, $2, $3)
            RETURNING category_id, class_id, name, weight;",
        )
        .bind(class_id)
        .bind(name)
        .bind(weight)
        .fetch_one(&mut *self.transaction)
        .await?;

        category_from_row(&row)
    }

    async fn assignments_for_category(
        &mut self,
        category_id: i32,
    ) -> EngineResult<Vec<Assignment>> {
        let rows = sqlx::query(
            "SELECT assignment_id, category_id, name, max_points, due, contents FROM assignments
            WHERE category_id = $1
            ORDER BY assignment_id ASC;",
        )
        .bind(category_id)
        .fetch_all(&mut *self.transaction)
        .await?;

        rows.iter().map(assignment_from_row).collect()
    }

    async fn find_assignment(
        &mut self,
        category_id: i32,
        name: &str,
    ) -> EngineResult<Option<Assignment>> {
        let row = sqlx::query(
            "SELECT assignment_id, category_id, name, max_points, due, contents FROM assignments
            WHERE category_id = $1 AND name = $2;",
        )
        .bind(category_id)
        .bind(name)
        .fetch_optional(&mut *self.transaction)
        .await?;

        row.as_ref().map(assignment_from_row).transpose()
    }

    async fn insert_assignment(&mut self, assignment: &NewAssignment) -> EngineResult<Assignment> {
        let max_points = i32::try_from(assignment.max_points).map_err(|_| {
            EngineError::invalid(format!("max points {} is too large", assignment.max_points))
        })?;

        let row = sqlx::query(
            "INSERT INTO assignments (category_id, name, max_points, due, contents)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING assignment_id, category_id, name, max_points, due, contents;",
        )
        .bind(assignment.category_id)
        .bind(&assignment.name)
        .bind(max_points)
        .bind(assignment.due)
        .bind(&assignment.contents)
        .fetch_one(&mut *self.transaction)
        .await?;

        assignment_from_row(&row)
    }

    async fn find_submission(
        &mut self,
        assignment_id: i32,
        student: &str,
    ) -> EngineResult<Option<Submission>> {
        let row = sqlx::query(
            "SELECT assignment_id, student, score, contents, time FROM submissions
            WHERE assignment_id = $1 AND student = $2;",
        )
        .bind(assignment_id)
        .bind(student)
        .fetch_optional(&mut *self.transaction)
        .await?;

        row.as_ref().map(submission_from_row).transpose()
    }

    async fn insert_submission(&mut self, submission: &Submission) -> EngineResult<()> {
        let score = i32::try_from(submission.score)
            .map_err(|_| EngineError::invalid(format!("score {} is too large", submission.score)))?;

        sqlx::query(
            "INSERT INTO submissions (assignment_id, student, score, contents, time)
            VALUES ($1, $2, $3, $4, $5);",
        )
        .bind(submission.assignment_id)
        .bind(&submission.student)
        .bind(score)
        .bind(&submission.contents)
        .bind(submission.time)
        .execute(&mut *self.transaction)
        .await?;
        Ok(())
    }

    async fn update_submission_contents(
        &mut self,
        assignment_id: i32,
        student: &str,
        contents: &str,
        time: DateTime<Utc>,
    ) -> EngineResult<()> {
        sqlx::query(
            "UPDATE submissions SET contents = $1, time = $2
            WHERE assignment_id = $3 AND student = $4;",
        )
        .bind(contents)
        .bind(time)
        .bind(assignment_id)
        .bind(student)
        .execute(&mut *self.transaction)
        .await?;
        Ok(())
    }

    async fn set_score(
        &mut self,
        assignment_id: i32,
        student: &str,
        score: u32,
    ) -> EngineResult<()> {
        let score = i32::try_from(score)
            .map_err(|_| EngineError::invalid(format!("score {score} is too large")))?;

        sqlx::query("UPDATE submissions SET score = $1 WHERE assignment_id = $2 AND student = $3;")
            .bind(score)
            .bind(assignment_id)
            .bind(student)
            .execute(&mut *self.transaction)
            .await?;
        Ok(())
    }

    async fn submissions_for_assignment(
        &mut self,
        assignment_id: i32,
    ) -> EngineResult<Vec<SubmissionEntry>> {
        let rows = sqlx::query(
            "SELECT st.uid, st.first_name, st.last_name, s.time, s.score
            FROM submissions s
            JOIN students st ON st.uid = s.student
            WHERE s.assignment_id = $1
            ORDER BY s.time ASC;",
        )
        .bind(assignment_id)
        .fetch_all(&mut *self.transaction)
        .await?;

        rows.iter()
            .map(|row| -> EngineResult<SubmissionEntry> {
                Ok(SubmissionEntry {
                    uid: row.try_get("uid")?,
                    first_name: row.try_get("first_name")?,
                    last_name: row.try_get("last_name")?,
                    time: row.try_get("time")?,
                    score: to_u32(row.try_get("score")?, "score")?,
                })
            })
            .collect()
    }

    async fn student_classes(&mut self, student: &str) -> EngineResult<Vec<ClassItem>> {
        let rows = sqlx::query(
            "SELECT co.subject, co.number, co.name, c.season, c.year, e.grade
            FROM enrolled e
            JOIN classes c ON c.class_id = e.class_id
            JOIN courses co ON co.course_id = c.course_id
            WHERE e.student = $1
            ORDER BY c.year ASC, c.season ASC, co.subject ASC, co.number ASC;",
        )
        .bind(student)
        .fetch_all(&mut *self.transaction)
        .await?;

        rows.iter()
            .map(|row| -> EngineResult<ClassItem> {
                let season: String = row.try_get("season")?;
                Ok(ClassItem {
                    subject: row.try_get("subject")?,
                    number: row.try_get("number")?,
                    name: row.try_get("name")?,
                    season: season.parse().map_err(EngineError::Storage)?,
                    year: row.try_get("year")?,
                    grade: row.try_get("grade")?,
                })
            })
            .collect()
    }

    async fn class_roster(&mut self, class_id: i32) -> EngineResult<Vec<RosterEntry>> {
        let rows = sqlx::query(
            "SELECT s.uid, s.first_name, s.last_name, e.grade
            FROM enrolled e
            JOIN students s ON s.uid = e.student
            WHERE e.class_id = $1
            ORDER BY s.last_name ASC, s.first_name ASC;",
        )
        .bind(class_id)
        .fetch_all(&mut *self.transaction)
        .await?;

        rows.iter()
            .map(|row| -> EngineResult<RosterEntry> {
                Ok(RosterEntry {
                    uid: row.try_get("uid")?,
                    first_name: row.try_get("first_name")?,
                    last_name: row.try_get("last_name")?,
                    grade: row.try_get("grade")?,
                })
            })
            .collect()
    }

    async fn commit(self: Box<Self>) -> EngineResult<()> {
        self.transaction.commit().await?;
        Ok(())
    }
}
