//! HTTP surface. Handlers are grouped by the role that calls them, in the `admin`,
//! `instructor` and `student` submodules.
//!
//! Every handler returns `Result<Response, EngineError>`; failures become a JSON body with
//! the error kind and a matching status code.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts},
    http::{Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{
    database::Store,
    error::EngineError,
    model::{
        course::ClassKey,
        semester::{Season, Semester},
    },
};

pub mod admin;
pub mod common;
pub mod instructor;
pub mod student;

pub const OK_JSON: &str = r#"{ "message": "OK" }"#;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Upper bound on concurrent per-student grade recomputations.
    pub parallelism: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, parallelism: usize) -> Self {
        Self {
            store,
            parallelism: parallelism.max(1),
        }
    }
}

/// `Json` whose rejections come back as an `invalid_input` error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(EngineError))]
pub struct JsonBody<T>(pub T);

/// `Path` whose rejections come back as an `invalid_input` error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(EngineError))]
pub struct PathParams<T>(pub T);

/// `{subject}/{number}/{season}/{year}`
pub type ClassPath = (String, i32, Season, i32);

/// `{subject}/{number}/{season}/{year}/{category}/{assignment}`
pub type AssignmentPath = (String, i32, Season, i32, String, String);

fn class_key(subject: String, number: i32, season: Season, year: i32) -> ClassKey {
    ClassKey {
        subject,
        number,
        semester: Semester::new(season, year),
    }
}

fn ok() -> Response {
    (StatusCode::OK, [(CONTENT_TYPE, "application/json")], OK_JSON).into_response()
}

fn json<T: Serialize>(value: T) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

pub fn create_router(state: AppState) -> Router {
    // Allow GET, POST, PUT, and OPTIONS from any origin
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(AllowOrigin::any());

    Router::new()
        .route("/api/admin/create_class", post(admin::create_class))
        .route(
            "/api/instructor/create_category",
            post(instructor::create_category),
        )
        .route(
            "/api/instructor/create_assignment",
            post(instructor::create_assignment),
        )
        .route(
            "/api/instructor/grade_submission",
            put(instructor::grade_submission),
        )
        .route(
            "/api/instructor/{subject}/{number}/{season}/{year}/roster",
            get(instructor::class_roster),
        )
        .route(
            "/api/instructor/{subject}/{number}/{season}/{year}/categories",
            get(instructor::class_categories),
        )
        .route(
            "/api/instructor/{subject}/{number}/{season}/{year}/assignments",
            get(instructor::class_assignments),
        )
        .route(
            "/api/instructor/{subject}/{number}/{season}/{year}/{category}/{assignment}/submissions",
            get(instructor::assignment_submissions),
        )
        .route("/api/student/enroll", put(student::enroll))
        .route("/api/student/submit", post(student::submit))
        .route("/api/student/{uid}/classes", get(student::get_classes))
        .route("/api/student/{uid}/gpa", get(student::get_gpa))
        .route(
            "/api/student/{uid}/{subject}/{number}/{season}/{year}/assignments",
            get(student::class_assignments),
        )
        .route(
            "/api/common/{subject}/{number}/{season}/{year}/{category}/{assignment}/contents",
            get(common::assignment_contents),
        )
        .route(
            "/api/common/{subject}/{number}/{season}/{year}/{category}/{assignment}/{uid}/submission",
            get(common::submission_text),
        )
        .layer(cors)
        .with_state(state)
}
