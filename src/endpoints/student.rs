use axum::{extract::State, response::Response};
use serde_json::json as json_value;

use crate::{
    coursework::{self, AssignmentRef},
    endpoints::{AppState, JsonBody, PathParams, class_key, json, ok},
    error::EngineError,
    grading,
    model::{request::ClientRequest, semester::Season},
};

pub async fn enroll(
    State(state): State<AppState>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response, EngineError> {
    let (Some(key), Some(uid)) = (client_req.class_key(), client_req.uid) else {
        return Err(EngineError::invalid("expected subject, number, season, year and uid"));
    };

    coursework::enroll(state.store.as_ref(), &key, &uid).await?;
    Ok(ok())
}

pub async fn submit(
    State(state): State<AppState>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response, EngineError> {
    let Some(key) = client_req.class_key() else {
        return Err(EngineError::invalid("expected subject, number, season and year"));
    };
    let ClientRequest {
        category: Some(category),
        assignment_name: Some(name),
        uid: Some(uid),
        contents,
        ..
    } = client_req
    else {
        return Err(EngineError::invalid("expected category, assignment_name and uid"));
    };

    let assignment = AssignmentRef {
        class: &key,
        category: &category,
        name: &name,
    };
    coursework::submit(
        state.store.as_ref(),
        &assignment,
        &uid,
        &contents.unwrap_or_default(),
    )
    .await?;

    Ok(ok())
}

pub async fn get_classes(
    State(state): State<AppState>,
    PathParams(uid): PathParams<String>,
) -> Result<Response, EngineError> {
    let classes = coursework::student_classes(state.store.as_ref(), &uid).await?;
    Ok(json(classes))
}

pub async fn get_gpa(
    State(state): State<AppState>,
    PathParams(uid): PathParams<String>,
) -> Result<Response, EngineError> {
    let gpa = grading::student_gpa(state.store.as_ref(), &uid).await?;
    Ok(json(json_value!({ "gpa": gpa })))
}

pub async fn class_assignments(
    State(state): State<AppState>,
    PathParams((uid, subject, number, season, year)): PathParams<(String, String, i32, Season, i32)>,
) -> Result<Response, EngineError> {
    let key = class_key(subject, number, season, year);
    let assignments = coursework::student_assignments(state.store.as_ref(), &key, &uid).await?;
    Ok(json(assignments))
}
