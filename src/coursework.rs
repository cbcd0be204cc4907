//! Enrollments, assignment categories, assignments and submissions, and the grade
//! recomputations they trigger.

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::{
    database::{Store, Transaction},
    error::{EngineError, EngineResult, retry_once},
    grading,
    model::{
        assignment_item::{AssignmentItem, StudentAssignment},
        class_item::ClassItem,
        class_offering::ClassOffering,
        course::ClassKey,
        gradebook::{Assignment, AssignmentCategory, NewAssignment, Submission},
        letter_grade::Grade,
        roster_entry::RosterEntry,
        submission_entry::SubmissionEntry,
    },
};

/// An assignment an instructor wants to add to one of a class's categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentDraft {
    pub category: String,
    pub name: String,
    pub max_points: u32,
    pub due: DateTime<Utc>,
    pub contents: String,
}

/// Names one assignment of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRef<'a> {
    pub class: &'a ClassKey,
    pub category: &'a str,
    pub name: &'a str,
}

async fn resolve_class(
    transaction: &mut dyn Transaction,
    key: &ClassKey,
) -> EngineResult<ClassOffering> {
    transaction
        .find_class(key)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("class {key}")))
}

async fn resolve_category(
    transaction: &mut dyn Transaction,
    key: &ClassKey,
    name: &str,
) -> EngineResult<(ClassOffering, AssignmentCategory)> {
    let class = resolve_class(transaction, key).await?;
    let category = transaction
        .find_category(class.class_id, name)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("category '{name}' in {key}")))?;
    Ok((class, category))
}

async fn resolve_assignment(
    transaction: &mut dyn Transaction,
    assignment: &AssignmentRef<'_>,
) -> EngineResult<(ClassOffering, Assignment)> {
    let (class, category) =
        resolve_category(transaction, assignment.class, assignment.category).await?;
    let found = transaction
        .find_assignment(category.category_id, assignment.name)
        .await?
        .ok_or_else(|| {
            EngineError::not_found(format!(
                "assignment '{}' in {} {}",
                assignment.name, assignment.category, assignment.class
            ))
        })?;
    Ok((class, found))
}

async fn enroll_once(store: &dyn Store, key: &ClassKey, student: &str) -> EngineResult<()> {
    let mut transaction = store.begin().await?;

    let class = resolve_class(&mut *transaction, key).await?;
    if !transaction.student_exists(student).await? {
        return Err(EngineError::not_found(format!("student {student}")));
    }
    if transaction
        .find_enrollment(class.class_id, student)
        .await?
        .is_some()
    {
        return Err(EngineError::conflict(format!(
            "{student} is already enrolled in {key}"
        )));
    }

    transaction
        .insert_enrollment(class.class_id, student, Grade::Ungraded)
        .await?;
    transaction.commit().await
}

/// Enrolls a student in a class. The enrollment starts out ungraded.
pub async fn enroll(store: &dyn Store, key: &ClassKey, student: &str) -> EngineResult<()> {
    retry_once("enroll", move || enroll_once(store, key, student)).await?;
    info!("Enrolled {student} in {key}");
    Ok(())
}

async fn create_category_once(
    store: &dyn Store,
    key: &ClassKey,
    name: &str,
    weight: u32,
) -> EngineResult<AssignmentCategory> {
    let mut transaction = store.begin().await?;

    let class = resolve_class(&mut *transaction, key).await?;
    if transaction
        .find_category(class.class_id, name)
        .await?
        .is_some()
    {
        return Err(EngineError::conflict(format!(
            "{key} already has a category named '{name}'"
        )));
    }

    let category = transaction
        .insert_category(class.class_id, name, weight)
        .await?;
    transaction.commit().await?;
    Ok(category)
}

pub async fn create_category(
    store: &dyn Store,
    key: &ClassKey,
    name: &str,
    weight: u32,
) -> EngineResult<AssignmentCategory> {
    retry_once("create category", move || {
        create_category_once(store, key, name, weight)
    })
    .await
}

async fn create_assignment_once(
    store: &dyn Store,
    key: &ClassKey,
    draft: &AssignmentDraft,
) -> EngineResult<(ClassOffering, Assignment)> {
    let mut transaction = store.begin().await?;

    let (class, category) = resolve_category(&mut *transaction, key, &draft.category).await?;
    if transaction
        .find_assignment(category.category_id, &draft.name)
        .await?
        .is_some()
    {
        return Err(EngineError::conflict(format!(
            "'{}' already exists in {} {key}",
            draft.name, draft.category
        )));
    }

    let assignment = transaction
        .insert_assignment(&NewAssignment {
            category_id: category.category_id,
            name: draft.name.clone(),
            max_points: draft.max_points,
            due: draft.due,
            contents: draft.contents.clone(),
        })
        .await?;
    transaction.commit().await?;

    Ok((class, assignment))
}

/// Adds an assignment, then recomputes the grade of every student in the class.
pub async fn create_assignment(
    store: &dyn Store,
    key: &ClassKey,
    draft: &AssignmentDraft,
    parallelism: usize,
) -> EngineResult<Assignment> {
    if draft.max_points == 0 {
        return Err(EngineError::invalid("an assignment must be worth at least one point"));
    }

    let (class, assignment) =
        retry_once("create assignment", move || create_assignment_once(store, key, draft)).await?;
    info!(
        "Created '{}' ({} points) in {} {key}",
        assignment.name, assignment.max_points, draft.category
    );

    if let Err(e) = grading::recompute_class(store, class.class_id, parallelism).await {
        error!("Grades in {key} are stale after adding '{}': {e}", assignment.name);
        return Err(e);
    }

    Ok(assignment)
}

async fn submit_once(
    store: &dyn Store,
    assignment: &AssignmentRef<'_>,
    student: &str,
    contents: &str,
) -> EngineResult<()> {
    let mut transaction = store.begin().await?;

    let (class, found) = resolve_assignment(&mut *transaction, assignment).await?;
    if transaction
        .find_enrollment(class.class_id, student)
        .await?
        .is_none()
    {
        return Err(EngineError::not_found(format!(
            "enrollment of {student} in {}",
            assignment.class
        )));
    }

    let now = Utc::now();
    match transaction
        .find_submission(found.assignment_id, student)
        .await?
    {
        Some(_) => {
            transaction
                .update_submission_contents(found.assignment_id, student, contents, now)
                .await?
        }
        None => {
            transaction
                .insert_submission(&Submission {
                    assignment_id: found.assignment_id,
                    student: student.into(),
                    score: 0,
                    contents: contents.into(),
                    time: now,
                })
                .await?
        }
    }

    transaction.commit().await
}

/// Records a student's submission. A resubmission replaces the contents and time but keeps
/// whatever score was already given.
pub async fn submit(
    store: &dyn Store,
    assignment: &AssignmentRef<'_>,
    student: &str,
    contents: &str,
) -> EngineResult<()> {
    retry_once("submit", move || submit_once(store, assignment, student, contents)).await
}

async fn grade_once(
    store: &dyn Store,
    assignment: &AssignmentRef<'_>,
    student: &str,
    score: u32,
) -> EngineResult<Grade> {
    let mut transaction = store.begin().await?;

    let (class, found) = resolve_assignment(&mut *transaction, assignment).await?;
    if transaction
        .find_submission(found.assignment_id, student)
        .await?
        .is_none()
    {
        return Err(EngineError::not_found(format!(
            "submission of '{}' by {student}",
            assignment.name
        )));
    }

    // Taken before the score changes so grade writes for this student queue up here.
    if transaction
        .lock_enrollment(class.class_id, student)
        .await?
        .is_none()
    {
        return Err(EngineError::not_found(format!(
            "enrollment of {student} in {}",
            assignment.class
        )));
    }

    transaction
        .set_score(found.assignment_id, student, score)
        .await?;
    let grade = grading::regrade(&mut *transaction, class.class_id, student)
        .await?
        .ok_or_else(|| {
            EngineError::not_found(format!("enrollment of {student} in {}", assignment.class))
        })?;
    transaction.commit().await?;

    Ok(grade)
}

/// Scores a submission and recomputes that student's grade in the class. The score and the
/// grade are written together or not at all.
pub async fn grade_submission(
    store: &dyn Store,
    assignment: &AssignmentRef<'_>,
    student: &str,
    score: u32,
) -> EngineResult<Grade> {
    let grade =
        retry_once("grade submission", move || grade_once(store, assignment, student, score))
            .await?;
    info!(
        "Scored '{}' for {student} in {}: {score} points, grade now {grade}",
        assignment.name, assignment.class
    );
    Ok(grade)
}

pub async fn student_classes(store: &dyn Store, student: &str) -> EngineResult<Vec<ClassItem>> {
    let mut transaction = store.begin().await?;
    let classes = transaction.student_classes(student).await?;
    transaction.commit().await?;
    Ok(classes)
}

pub async fn class_roster(store: &dyn Store, key: &ClassKey) -> EngineResult<Vec<RosterEntry>> {
    let mut transaction = store.begin().await?;
    let class = resolve_class(&mut *transaction, key).await?;
    let roster = transaction.class_roster(class.class_id).await?;
    transaction.commit().await?;
    Ok(roster)
}

pub async fn class_categories(
    store: &dyn Store,
    key: &ClassKey,
) -> EngineResult<Vec<AssignmentCategory>> {
    let mut transaction = store.begin().await?;
    let class = resolve_class(&mut *transaction, key).await?;
    let categories = transaction.categories_for_class(class.class_id).await?;
    transaction.commit().await?;
    Ok(categories)
}

/// Assignments of a class with their submission counts, from one category or, with `None`,
/// from all of them.
pub async fn class_assignments(
    store: &dyn Store,
    key: &ClassKey,
    category: Option<&str>,
) -> EngineResult<Vec<AssignmentItem>> {
    let mut transaction = store.begin().await?;

    let categories = match category {
        Some(name) => vec![resolve_category(&mut *transaction, key, name).await?.1],
        None => {
            let class = resolve_class(&mut *transaction, key).await?;
            transaction.categories_for_class(class.class_id).await?
        }
    };

    let mut items = vec![];
    for category in categories {
        for assignment in transaction
            .assignments_for_category(category.category_id)
            .await?
        {
            let submissions = transaction
                .submissions_for_assignment(assignment.assignment_id)
                .await?
                .len();
            items.push(AssignmentItem {
                name: assignment.name,
                category: category.name.clone(),
                due: assignment.due,
                submissions,
            });
        }
    }

    transaction.commit().await?;
    Ok(items)
}

/// Every assignment of a class with the student's score on it.
pub async fn student_assignments(
    store: &dyn Store,
    key: &ClassKey,
    student: &str,
) -> EngineResult<Vec<StudentAssignment>> {
    let mut transaction = store.begin().await?;

    let class = resolve_class(&mut *transaction, key).await?;
    if transaction
        .find_enrollment(class.class_id, student)
        .await?
        .is_none()
    {
        return Err(EngineError::not_found(format!(
            "enrollment of {student} in {key}"
        )));
    }

    let mut items = vec![];
    for category in transaction.categories_for_class(class.class_id).await? {
        for assignment in transaction
            .assignments_for_category(category.category_id)
            .await?
        {
            let score = transaction
                .find_submission(assignment.assignment_id, student)
                .await?
                .map(|s| s.score);
            items.push(StudentAssignment {
                name: assignment.name,
                category: category.name.clone(),
                due: assignment.due,
                score,
            });
        }
    }

    transaction.commit().await?;
    Ok(items)
}

pub async fn assignment_submissions(
    store: &dyn Store,
    assignment: &AssignmentRef<'_>,
) -> EngineResult<Vec<SubmissionEntry>> {
    let mut transaction = store.begin().await?;
    let (_, found) = resolve_assignment(&mut *transaction, assignment).await?;
    let entries = transaction
        .submissions_for_assignment(found.assignment_id)
        .await?;
    transaction.commit().await?;
    Ok(entries)
}

pub async fn assignment_contents(
    store: &dyn Store,
    assignment: &AssignmentRef<'_>,
) -> EngineResult<String> {
    let mut transaction = store.begin().await?;
    let (_, found) = resolve_assignment(&mut *transaction, assignment).await?;
    transaction.commit().await?;
    Ok(found.contents)
}

/// What a student handed in, or an empty string if they have not submitted.
pub async fn submission_text(
    store: &dyn Store,
    assignment: &AssignmentRef<'_>,
    student: &str,
) -> EngineResult<String> {
    let mut transaction = store.begin().await?;
    let (_, found) = resolve_assignment(&mut *transaction, assignment).await?;
    let submission = transaction
        .find_submission(found.assignment_id, student)
        .await?;
    transaction.commit().await?;
    Ok(submission.map(|s| s.contents).unwrap_or_default())
}
