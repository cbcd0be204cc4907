//! Reads open to both instructors and students.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};

use crate::{
    coursework::{self, AssignmentRef},
    endpoints::{AppState, AssignmentPath, PathParams, class_key},
    error::EngineError,
    model::semester::Season,
};

/// The assignment's instructions, as plain text.
pub async fn assignment_contents(
    State(state): State<AppState>,
    PathParams((subject, number, season, year, category, name)): PathParams<AssignmentPath>,
) -> Result<Response, EngineError> {
    let key = class_key(subject, number, season, year);
    let assignment = AssignmentRef {
        class: &key,
        category: &category,
        name: &name,
    };
    let contents = coursework::assignment_contents(state.store.as_ref(), &assignment).await?;
    Ok(contents.into_response())
}

/// A student's submission text, empty when there is none.
pub async fn submission_text(
    State(state): State<AppState>,
    PathParams((subject, number, season, year, category, name, uid)): PathParams<(
        String,
        i32,
        Season,
        i32,
        String,
        String,
        String,
    )>,
) -> Result<Response, EngineError> {
    let key = class_key(subject, number, season, year);
    let assignment = AssignmentRef {
        class: &key,
        category: &category,
        name: &name,
    };
    let text = coursework::submission_text(state.store.as_ref(), &assignment, &uid).await?;
    Ok(text.into_response())
}
