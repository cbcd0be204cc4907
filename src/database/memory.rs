//! In-process store used by the unit tests.
//!
//! A transaction holds the only lock on the state for its whole lifetime and works on a copy,
//! so transactions are trivially serializable and an uncommitted one leaves no trace.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

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
        semester::Semester,
        submission_entry::SubmissionEntry,
    },
};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    next_id: i32,
    courses: Vec<Course>,
    professors: Vec<String>,
    /// uid -> (first name, last name)
    students: HashMap<String, (String, String)>,
    offerings: Vec<ClassOffering>,
    enrollments: Vec<Enrollment>,
    categories: Vec<AssignmentCategory>,
    assignments: Vec<Assignment>,
    submissions: Vec<Submission>,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn with_course(mut self, subject: &str, number: i32, name: &str) -> Self {
        let course_id = self.next_id();
        self.courses.push(Course {
            course_id,
            subject: subject.into(),
            number,
            name: name.into(),
        });
        self
    }

    pub fn with_professor(mut self, uid: &str) -> Self {
        self.professors.push(uid.into());
        self
    }

    pub fn with_student(mut self, uid: &str, first_name: &str, last_name: &str) -> Self {
        self.students
            .insert(uid.into(), (first_name.into(), last_name.into()));
        self
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    failing_commits: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            failing_commits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes the next `n` commits fail as if a concurrent writer had won.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    pub async fn grade_of(&self, class_id: i32, student: &str) -> Option<String> {
        let state = self.state.lock().await;
        state
            .enrollments
            .iter()
            .find(|e| e.class_id == class_id && e.student == student)
            .map(|e| e.grade.clone())
    }

    pub async fn offering_count(&self) -> usize {
        self.state.lock().await.offerings.len()
    }

    /// Overwrites a stored grade without going through the engine.
    pub async fn force_grade(&self, class_id: i32, student: &str, grade: &str) {
        let mut state = self.state.lock().await;
        if let Some(e) = state
            .enrollments
            .iter_mut()
            .find(|e| e.class_id == class_id && e.student == student)
        {
            e.grade = grade.into();
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> EngineResult<Box<dyn Transaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            failing_commits: self.failing_commits.clone(),
        }))
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failing_commits: Arc<AtomicUsize>,
}

impl MemoryTransaction {
    fn course(&self, course_id: i32) -> Option<&Course> {
        self.working.courses.iter().find(|c| c.course_id == course_id)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn find_course(&mut self, subject: &str, number: i32) -> EngineResult<Option<Course>> {
        Ok(self
            .working
            .courses
            .iter()
            .find(|c| c.subject == subject && c.number == number)
            .cloned())
    }

    async fn professor_exists(&mut self, uid: &str) -> EngineResult<bool> {
        Ok(self.working.professors.iter().any(|p| p == uid))
    }

    async fn student_exists(&mut self, uid: &str) -> EngineResult<bool> {
        Ok(self.working.students.contains_key(uid))
    }

    async fn find_offering(
        &mut self,
        course_id: i32,
        semester: Semester,
    ) -> EngineResult<Option<ClassOffering>> {
        Ok(self
            .working
            .offerings
            .iter()
            .find(|o| o.course_id == course_id && o.semester == semester)
            .cloned())
    }

    async fn find_class(&mut self, key: &ClassKey) -> EngineResult<Option<ClassOffering>> {
        let Some(course) = self
            .working
            .courses
            .iter()
            .find(|c| c.subject == key.subject && c.number == key.number)
        else {
            return Ok(None);
        };
        let course_id = course.course_id;
        self.find_offering(course_id, key.semester).await
    }

    async fn offerings_at_location(
        &mut self,
        semester: Semester,
        location: &str,
    ) -> EngineResult<Vec<ClassOffering>> {
        Ok(self
            .working
            .offerings
            .iter()
            .filter(|o| o.semester == semester && o.location == location)
            .cloned()
            .collect())
    }

    async fn offerings_taught_by(
        &mut self,
        semester: Semester,
        instructor: &str,
    ) -> EngineResult<Vec<ClassOffering>> {
        Ok(self
            .working
            .offerings
            .iter()
            .filter(|o| o.semester == semester && o.instructor == instructor)
            .cloned()
            .collect())
    }

    async fn insert_offering(
        &mut self,
        course_id: i32,
        offering: &NewOffering,
    ) -> EngineResult<ClassOffering> {
        if self
            .working
            .offerings
            .iter()
            .any(|o| o.course_id == course_id && o.semester == offering.semester)
        {
            return Err(EngineError::Contention("one_offering_per_semester".into()));
        }

        let class_offering = ClassOffering {
            class_id: self.working.next_id(),
            course_id,
            semester: offering.semester,
            slot: offering.slot,
            location: offering.location.clone(),
            instructor: offering.instructor.clone(),
        };
        self.working.offerings.push(class_offering.clone());
        Ok(class_offering)
    }

    async fn find_enrollment(
        &mut self,
        class_id: i32,
        student: &str,
    ) -> EngineResult<Option<Enrollment>> {
        Ok(self
            .working
            .enrollments
            .iter()
            .find(|e| e.class_id == class_id && e.student == student)
            .cloned())
    }

    async fn lock_enrollment(
        &mut self,
        class_id: i32,
        student: &str,
    ) -> EngineResult<Option<Enrollment>> {
        // The whole state is already locked.
        self.find_enrollment(class_id, student).await
    }

    async fn insert_enrollment(
        &mut self,
        class_id: i32,
        student: &str,
        grade: Grade,
    ) -> EngineResult<()> {
        if self.find_enrollment(class_id, student).await?.is_some() {
            return Err(EngineError::Contention("enrolled_pkey".into()));
        }
        self.working.enrollments.push(Enrollment {
            class_id,
            student: student.into(),
            grade: grade.to_string(),
        });
        Ok(())
    }

    async fn enrollments_for_class(&mut self, class_id: i32) -> EngineResult<Vec<Enrollment>> {
        Ok(self
            .working
            .enrollments
            .iter()
            .filter(|e| e.class_id == class_id)
            .cloned()
            .collect())
    }

    async fn enrollments_for_student(&mut self, student: &str) -> EngineResult<Vec<Enrollment>> {
        Ok(self
            .working
            .enrollments
            .iter()
            .filter(|e| e.student == student)
            .cloned()
            .collect())
    }

    async fn set_grade(&mut self, class_id: i32, student: &str, grade: Grade) -> EngineResult<()> {
        if let Some(e) = self
            .working
            .enrollments
            .iter_mut()
            .find(|e| e.class_id == class_id && e.student == student)
        {
            e.grade = grade.to_string();
        }
        Ok(())
    }

    async fn categories_for_class(
        &mut self,
        class_id: i32,
    ) -> EngineResult<Vec<AssignmentCategory>> {
        Ok(self
            .working
            .categories
            .iter()
            .filter(|c| c.class_id == class_id)
            .cloned()
            .collect())
    }

    async fn find_category(
        &mut self,
        class_id: i32,
        name: &str,
    ) -> EngineResult<Option<AssignmentCategory>> {
        Ok(self
            .working
            .categories
            .iter()
            .find(|c| c.class_id == class_id && c.name == name)
            .cloned())
    }

    async fn insert_category(
        &mut self,
        class_id: i32,
        name: &str,
        weight: u32,
    ) -> EngineResult<AssignmentCategory> {
        if self.find_category(class_id, name).await?.is_some() {
            return Err(EngineError::Contention("category_name".into()));
        }
        let category = AssignmentCategory {
            category_id: self.working.next_id(),
            class_id,
            name: name.into(),
            weight,
        };
        self.working.categories.push(category.clone());
        Ok(category)
    }

    async fn assignments_for_category(
        &mut self,
        category_id: i32,
    ) -> EngineResult<Vec<Assignment>> {
        Ok(self
            .working
            .assignments
            .iter()
            .filter(|a| a.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn find_assignment(
        &mut self,
        category_id: i32,
        name: &str,
    ) -> EngineResult<Option<Assignment>> {
        Ok(self
            .working
            .assignments
            .iter()
            .find(|a| a.category_id == category_id && a.name == name)
            .cloned())
    }

    async fn insert_assignment(&mut self, assignment: &NewAssignment) -> EngineResult<Assignment> {
        if self
            .find_assignment(assignment.category_id, &assignment.name)
            .await?
            .is_some()
        {
            return Err(EngineError::Contention("assignment_name".into()));
        }
        let stored = Assignment {
            assignment_id: self.working.next_id(),
            category_id: assignment.category_id,
            name: assignment.name.clone(),
            max_points: assignment.max_points,
            due: assignment.due,
            contents: assignment.contents.clone(),
        };
        self.working.assignments.push(stored.clone());
        Ok(stored)
    }

    async fn find_submission(
        &mut self,
        assignment_id: i32,
        student: &str,
    ) -> EngineResult<Option<Submission>> {
        Ok(self
            .working
            .submissions
            .iter()
            .find(|s| s.assignment_id == assignment_id && s.student == student)
            .cloned())
    }

    async fn insert_submission(&mut self, submission: &Submission) -> EngineResult<()> {
        if self
            .find_submission(submission.assignment_id, &submission.student)
            .await?
            .is_some()
        {
            return Err(EngineError::Contention("submission_pkey".into()));
        }
        self.working.submissions.push(submission.clone());
        Ok(())
    }

    async fn update_submission_contents(
        &mut self,
        assignment_id: i32,
        student: &str,
        contents: &str,
        time: DateTime<Utc>,
    ) -> EngineResult<()> {
        if let Some(s) = self
            .working
            .submissions
            .iter_mut()
            .find(|s| s.assignment_id == assignment_id && s.student == student)
        {
            s.contents = contents.into();
            s.time = time;
        }
        Ok(())
    }

    async fn set_score(
        &mut self,
        assignment_id: i32,
        student: &str,
        score: u32,
    ) -> EngineResult<()> {
        if let Some(s) = self
            .working
            .submissions
            .iter_mut()
            .find(|s| s.assignment_id == assignment_id && s.student == student)
        {
            s.score = score;
        }
        Ok(())
    }

    async fn submissions_for_assignment(
        &mut self,
        assignment_id: i32,
    ) -> EngineResult<Vec<SubmissionEntry>> {
        let mut entries = self
            .working
            .submissions
            .iter()
            .filter(|s| s.assignment_id == assignment_id)
            .filter_map(|s| {
                let (first_name, last_name) = self.working.students.get(&s.student)?;
                Some(SubmissionEntry {
                    uid: s.student.clone(),
                    first_name: first_name.clone(),
                    last_name: last_name.clone(),
                    time: s.time,
                    score: s.score,
                })
            })
            .collect::<Vec<SubmissionEntry>>();
        entries.sort_by_key(|e| e.time);
        Ok(entries)
    }

    async fn student_classes(&mut self, student: &str) -> EngineResult<Vec<ClassItem>> {
        let mut items = vec![];
        for enrollment in self.working.enrollments.iter().filter(|e| e.student == student) {
            let Some(offering) = self
                .working
                .offerings
                .iter()
                .find(|o| o.class_id == enrollment.class_id)
            else {
                continue;
            };
            let Some(course) = self.course(offering.course_id) else {
                continue;
            };
            items.push(ClassItem {
                subject: course.subject.clone(),
                number: course.number,
                name: course.name.clone(),
                season: offering.semester.season,
                year: offering.semester.year,
                grade: enrollment.grade.clone(),
            });
        }
        Ok(items)
    }

    async fn class_roster(&mut self, class_id: i32) -> EngineResult<Vec<RosterEntry>> {
        let mut roster = self
            .working
            .enrollments
            .iter()
            .filter(|e| e.class_id == class_id)
            .filter_map(|e| {
                let (first_name, last_name) = self.working.students.get(&e.student)?;
                Some(RosterEntry {
                    uid: e.student.clone(),
                    first_name: first_name.clone(),
                    last_name: last_name.clone(),
                    grade: e.grade.clone(),
                })
            })
            .collect::<Vec<RosterEntry>>();
        roster.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(roster)
    }

    async fn commit(self: Box<Self>) -> EngineResult<()> {
        let MemoryTransaction {
            mut guard,
            working,
            failing_commits,
        } = *self;

        let should_fail = failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(EngineError::Contention("simulated serialization failure".into()));
        }

        *guard = working;
        Ok(())
    }
}
