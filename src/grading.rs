//! Letter grades from weighted category scores, and GPAs from letter grades.
//!
//! A student's grade in a class is always recomputed from scratch out of a [`Gradebook`]
//! snapshot; the previously stored grade is never consulted.

use futures::{StreamExt, stream};
use tracing::debug;

use crate::{
    database::{Store, Transaction},
    error::{EngineResult, retry_once},
    model::letter_grade::{Grade, LetterGrade, UNGRADED},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAssignment {
    pub max_points: u32,
    /// `None` when the student never submitted.
    pub score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySheet {
    pub weight: u32,
    pub assignments: Vec<ScoredAssignment>,
}

/// Everything one student's grade in one class depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gradebook {
    pub categories: Vec<CategorySheet>,
}

pub fn compute_grade(book: &Gradebook) -> Grade {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    // A category without assignments contributes neither score nor weight.
    for category in book.categories.iter().filter(|c| !c.assignments.is_empty()) {
        let earned: u64 = category
            .assignments
            .iter()
            .map(|a| u64::from(a.score.unwrap_or(0)))
            .sum();
        let possible: u64 = category
            .assignments
            .iter()
            .map(|a| u64::from(a.max_points))
            .sum();

        let percentage = if possible > 0 {
            earned as f64 / possible as f64
        } else {
            0.0
        };

        let weight = f64::from(category.weight);
        weighted_sum += percentage * weight;
        weight_total += weight;
    }

    if weight_total == 0.0 {
        return Grade::Ungraded;
    }

    Grade::Letter(LetterGrade::from_percentage(weighted_sum / weight_total * 100.0))
}

pub async fn load_gradebook(
    transaction: &mut dyn Transaction,
    class_id: i32,
    student: &str,
) -> EngineResult<Gradebook> {
    let mut categories = vec![];

    for category in transaction.categories_for_class(class_id).await? {
        let mut assignments = vec![];
        for assignment in transaction
            .assignments_for_category(category.category_id)
            .await?
        {
            let score = transaction
                .find_submission(assignment.assignment_id, student)
                .await?
                .map(|s| s.score);
            assignments.push(ScoredAssignment {
                max_points: assignment.max_points,
                score,
            });
        }
        categories.push(CategorySheet {
            weight: category.weight,
            assignments,
        });
    }

    Ok(Gradebook { categories })
}

/// Recomputes a student's grade inside `transaction` and stores it. The enrollment row is
/// locked first, so a later trigger for the same student waits and then sees every score this
/// one saw. Returns `None` if the student is not enrolled.
pub async fn regrade(
    transaction: &mut dyn Transaction,
    class_id: i32,
    student: &str,
) -> EngineResult<Option<Grade>> {
    if transaction.lock_enrollment(class_id, student).await?.is_none() {
        return Ok(None);
    }

    let book = load_gradebook(transaction, class_id, student).await?;
    let grade = compute_grade(&book);
    transaction.set_grade(class_id, student, grade).await?;

    Ok(Some(grade))
}

async fn recompute_once(
    store: &dyn Store,
    class_id: i32,
    student: &str,
) -> EngineResult<Option<Grade>> {
    let mut transaction = store.begin().await?;
    let grade = regrade(&mut *transaction, class_id, student).await?;
    transaction.commit().await?;

    if let Some(grade) = grade {
        debug!("Class {class_id}: {student} now has {grade}");
    }
    Ok(grade)
}

/// Recomputes and stores one student's grade in a class. Returns `None` if the student is
/// not enrolled.
pub async fn recompute_student(
    store: &dyn Store,
    class_id: i32,
    student: &str,
) -> EngineResult<Option<Grade>> {
    retry_once("recompute grade", move || {
        recompute_once(store, class_id, student)
    })
    .await
}

/// Recomputes the grade of every student enrolled in a class, at most `parallelism` at a time.
/// Every student is attempted; the first failure, if any, is returned afterwards.
pub async fn recompute_class(
    store: &dyn Store,
    class_id: i32,
    parallelism: usize,
) -> EngineResult<usize> {
    let enrollments = {
        let mut transaction = store.begin().await?;
        let enrollments = transaction.enrollments_for_class(class_id).await?;
        transaction.commit().await?;
        enrollments
    };

    let results = stream::iter(enrollments)
        .map(|e| async move { recompute_student(store, class_id, &e.student).await })
        .buffer_unordered(parallelism.max(1))
        .collect::<Vec<EngineResult<Option<Grade>>>>()
        .await;

    let mut recomputed = 0;
    for result in results {
        if result?.is_some() {
            recomputed += 1;
        }
    }

    debug!("Class {class_id}: recomputed {recomputed} grades");
    Ok(recomputed)
}

/// Mean grade-point value of the letter grades given. The ungraded sentinel and anything not
/// in the grade-point table are skipped; with nothing left the average is 0.0.
pub fn grade_point_average<'a>(grades: impl IntoIterator<Item = &'a str>) -> f64 {
    let points = grades
        .into_iter()
        .filter(|g| *g != UNGRADED)
        .filter_map(|g| g.parse::<LetterGrade>().ok())
        .map(LetterGrade::grade_points)
        .collect::<Vec<f64>>();

    if points.is_empty() {
        return 0.0;
    }

    points.iter().sum::<f64>() / points.len() as f64
}

pub async fn student_gpa(store: &dyn Store, student: &str) -> EngineResult<f64> {
    let mut transaction = store.begin().await?;
    let enrollments = transaction.enrollments_for_student(student).await?;
    transaction.commit().await?;

    Ok(grade_point_average(
        enrollments.iter().map(|e| e.grade.as_str()),
    ))
}
