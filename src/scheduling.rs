//! Admission of new class sections.
//!
//! A section is admitted only if its course exists, the course has no other section that
//! semester, no section in the same room overlaps it, its instructor exists, and no section
//! with the same instructor overlaps it. Checks run in that order and the first failure is
//! reported. The checks and the insert share one serializable transaction.

use tracing::info;

use crate::{
    database::Store,
    error::{EngineError, EngineResult, retry_once},
    model::{
        class_offering::{ClassOffering, NewOffering},
        time_slot::TimeSlot,
    },
};

/// First existing section whose meeting time intersects `slot`.
pub fn first_overlap<'a>(
    slot: &TimeSlot,
    existing: &'a [ClassOffering],
) -> Option<&'a ClassOffering> {
    existing.iter().find(|o| o.slot.overlaps(slot))
}

async fn admit_once(store: &dyn Store, proposal: &NewOffering) -> EngineResult<ClassOffering> {
    let semester = proposal.semester;
    let mut transaction = store.begin().await?;

    let Some(course) = transaction
        .find_course(&proposal.subject, proposal.number)
        .await?
    else {
        return Err(EngineError::not_found(format!(
            "course {} {}",
            proposal.subject, proposal.number
        )));
    };

    if let Some(existing) = transaction.find_offering(course.course_id, semester).await? {
        return Err(EngineError::conflict(format!(
            "{} {} is already offered in {semester} (class {})",
            course.subject, course.number, existing.class_id
        )));
    }

    let same_room = transaction
        .offerings_at_location(semester, &proposal.location)
        .await?;
    if let Some(clash) = first_overlap(&proposal.slot, &same_room) {
        return Err(EngineError::conflict(format!(
            "location {} is occupied {} in {semester} by class {}",
            proposal.location, clash.slot, clash.class_id
        )));
    }

    if !transaction.professor_exists(&proposal.instructor).await? {
        return Err(EngineError::not_found(format!(
            "instructor {}",
            proposal.instructor
        )));
    }

    let same_instructor = transaction
        .offerings_taught_by(semester, &proposal.instructor)
        .await?;
    if let Some(clash) = first_overlap(&proposal.slot, &same_instructor) {
        return Err(EngineError::conflict(format!(
            "instructor {} already teaches {} in {semester} (class {})",
            proposal.instructor, clash.slot, clash.class_id
        )));
    }

    let offering = transaction.insert_offering(course.course_id, proposal).await?;
    transaction.commit().await?;

    Ok(offering)
}

/// Validates `proposal` against every existing section and, if it passes, stores it.
pub async fn create_class(
    store: &dyn Store,
    proposal: &NewOffering,
) -> EngineResult<ClassOffering> {
    let result = retry_once("create class", move || admit_once(store, proposal)).await;

    match &result {
        Ok(offering) => info!(
            "Admitted {} {} {} as class {} ({} in {}, taught by {})",
            proposal.subject,
            proposal.number,
            proposal.semester,
            offering.class_id,
            offering.slot,
            offering.location,
            offering.instructor
        ),
        Err(e @ (EngineError::NotFound(_) | EngineError::Conflict(_))) => info!(
            "Rejected {} {} {}: {e}",
            proposal.subject, proposal.number, proposal.semester
        ),
        Err(_) => {}
    }

    result
}
