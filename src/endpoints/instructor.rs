use axum::{
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use serde_json::json as json_value;

use crate::{
    coursework::{self, AssignmentDraft, AssignmentRef},
    endpoints::{AppState, AssignmentPath, ClassPath, JsonBody, PathParams, class_key, json},
    error::EngineError,
    model::request::ClientRequest,
};

#[derive(Debug, Default, Deserialize)]
pub struct CategoryFilter {
    pub category: Option<String>,
}

pub async fn create_category(
    State(state): State<AppState>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response, EngineError> {
    let Some(key) = client_req.class_key() else {
        return Err(EngineError::invalid("expected subject, number, season and year"));
    };
    let ClientRequest {
        category: Some(category),
        weight: Some(weight),
        ..
    } = client_req
    else {
        return Err(EngineError::invalid("expected category and weight"));
    };

    let category = coursework::create_category(state.store.as_ref(), &key, &category, weight).await?;
    Ok(json(category))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response, EngineError> {
    let Some(key) = client_req.class_key() else {
        return Err(EngineError::invalid("expected subject, number, season and year"));
    };
    let ClientRequest {
        category: Some(category),
        assignment_name: Some(name),
        max_points: Some(max_points),
        due: Some(due),
        contents,
        ..
    } = client_req
    else {
        return Err(EngineError::invalid(
            "expected category, assignment_name, max_points and due",
        ));
    };

    let draft = AssignmentDraft {
        category,
        name,
        max_points,
        due,
        contents: contents.unwrap_or_default(),
    };

    let assignment =
        coursework::create_assignment(state.store.as_ref(), &key, &draft, state.parallelism)
            .await?;
    Ok(json(assignment))
}

pub async fn grade_submission(
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
        score: Some(score),
        ..
    } = client_req
    else {
        return Err(EngineError::invalid(
            "expected category, assignment_name, uid and score",
        ));
    };

    let assignment = AssignmentRef {
        class: &key,
        category: &category,
        name: &name,
    };
    let grade = coursework::grade_submission(state.store.as_ref(), &assignment, &uid, score).await?;

    Ok(json(json_value!({ "uid": uid, "grade": grade })))
}

pub async fn class_roster(
    State(state): State<AppState>,
    PathParams((subject, number, season, year)): PathParams<ClassPath>,
) -> Result<Response, EngineError> {
    let key = class_key(subject, number, season, year);
    let roster = coursework::class_roster(state.store.as_ref(), &key).await?;
    Ok(json(roster))
}

pub async fn class_categories(
    State(state): State<AppState>,
    PathParams((subject, number, season, year)): PathParams<ClassPath>,
) -> Result<Response, EngineError> {
    let key = class_key(subject, number, season, year);
    let categories = coursework::class_categories(state.store.as_ref(), &key).await?;
    Ok(json(categories))
}

/// `?category=` narrows the listing to one category.
pub async fn class_assignments(
    State(state): State<AppState>,
    PathParams((subject, number, season, year)): PathParams<ClassPath>,
    Query(filter): Query<CategoryFilter>,
) -> Result<Response, EngineError> {
    let key = class_key(subject, number, season, year);
    let assignments =
        coursework::class_assignments(state.store.as_ref(), &key, filter.category.as_deref())
            .await?;
    Ok(json(assignments))
}

pub async fn assignment_submissions(
    State(state): State<AppState>,
    PathParams((subject, number, season, year, category, name)): PathParams<AssignmentPath>,
) -> Result<Response, EngineError> {
    let key = class_key(subject, number, season, year);
    let assignment = AssignmentRef {
        class: &key,
        category: &category,
        name: &name,
    };
    let submissions = coursework::assignment_submissions(state.store.as_ref(), &assignment).await?;
    Ok(json(submissions))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::Value;

    use super::*;
    use crate::{
        endpoints::{
            admin, student,
            test_support::{body_json, send, state},
        },
        model::semester::Season,
    };

    fn request(body: Value) -> JsonBody<ClientRequest> {
        JsonBody(serde_json::from_value(body).unwrap())
    }

    fn with_class(mut body: Value) -> JsonBody<ClientRequest> {
        body["subject"] = "CS".into();
        body["number"] = 5530.into();
        body["season"] = "Fall".into();
        body["year"] = 2024.into();
        request(body)
    }

    async fn class_with_alice() -> AppState {
        let state = state();
        admin::create_class(
            State(state.clone()),
            with_class(json_value!({
                "start": "09:00", "end": "10:20", "location": "WEB 2230",
                "instructor": "u0000001"
            })),
        )
        .await
        .unwrap();
        student::enroll(State(state.clone()), with_class(json_value!({ "uid": "u0000100" })))
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn grading_a_submission_returns_the_new_grade() {
        let state = class_with_alice().await;

        create_category(
            State(state.clone()),
            with_class(json_value!({ "category": "Exams", "weight": 100 })),
        )
        .await
        .unwrap();
        create_assignment(
            State(state.clone()),
            with_class(json_value!({
                "category": "Exams", "assignment_name": "Final", "max_points": 50,
                "due": "2024-12-12T17:00:00Z"
            })),
        )
        .await
        .unwrap();
        student::submit(
            State(state.clone()),
            with_class(json_value!({
                "category": "Exams", "assignment_name": "Final", "uid": "u0000100",
                "contents": "42"
            })),
        )
        .await
        .unwrap();

        let response = grade_submission(
            State(state.clone()),
            with_class(json_value!({
                "category": "Exams", "assignment_name": "Final", "uid": "u0000100",
                "score": 44
            })),
        )
        .await
        .unwrap();

        // 44 / 50 = 88%
        let body = body_json(response).await;
        assert_eq!(body["grade"], "B+");
    }

    #[tokio::test]
    async fn roster_by_path() {
        let state = class_with_alice().await;

        let response = class_roster(
            State(state.clone()),
            PathParams(("CS".into(), 5530, Season::Fall, 2024)),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["uid"], "u0000100");
        assert_eq!(body[0]["grade"], "--");

        let response = send(&state, Method::GET, "/api/instructor/CS/5530/fall/2024/roster", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await[0]["last_name"], "Zimmer");

        let err = class_roster(State(state), PathParams(("CS".into(), 6016, Season::Fall, 2024)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    async fn class_with_homework() -> AppState {
        let state = class_with_alice().await;
        create_category(
            State(state.clone()),
            with_class(json_value!({ "category": "Homework", "weight": 30 })),
        )
        .await
        .unwrap();
        create_category(
            State(state.clone()),
            with_class(json_value!({ "category": "Exams", "weight": 70 })),
        )
        .await
        .unwrap();
        for name in ["HW1", "HW2"] {
            create_assignment(
                State(state.clone()),
                with_class(json_value!({
                    "category": "Homework", "assignment_name": name, "max_points": 10,
                    "due": "2024-09-20T23:59:00Z", "contents": "Normalize the schema."
                })),
            )
            .await
            .unwrap();
        }
        student::submit(
            State(state.clone()),
            with_class(json_value!({
                "category": "Homework", "assignment_name": "HW1", "uid": "u0000100",
                "contents": "BCNF"
            })),
        )
        .await
        .unwrap();
        state
    }

    #[tokio::test]
    async fn categories_and_assignments_are_listed() {
        let state = class_with_homework().await;

        let response = send(&state, Method::GET, "/api/instructor/CS/5530/Fall/2024/categories", None).await;
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["name"], "Homework");
        assert_eq!(body[1]["weight"], 70);

        let response = send(&state, Method::GET, "/api/instructor/CS/5530/Fall/2024/assignments", None).await;
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["name"], "HW1");
        assert_eq!(body[0]["category"], "Homework");
        assert_eq!(body[0]["submissions"], 1);
        assert_eq!(body[1]["submissions"], 0);

        let response = send(
            &state,
            Method::GET,
            "/api/instructor/CS/5530/Fall/2024/assignments?category=Exams",
            None,
        )
        .await;
        assert_eq!(body_json(response).await, json_value!([]));

        let response = send(
            &state,
            Method::GET,
            "/api/instructor/CS/5530/Fall/2024/assignments?category=Labs",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn submissions_to_an_assignment_are_listed() {
        let state = class_with_homework().await;

        let response = send(
            &state,
            Method::GET,
            "/api/instructor/CS/5530/Fall/2024/Homework/HW1/submissions",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["uid"], "u0000100");
        assert_eq!(body[0]["first_name"], "Alice");
        assert_eq!(body[0]["last_name"], "Zimmer");
        assert_eq!(body[0]["score"], 0);

        let response = send(
            &state,
            Method::GET,
            "/api/instructor/CS/5530/Fall/2024/Homework/HW9/submissions",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn category_needs_a_weight() {
        let state = class_with_alice().await;
        let err = create_category(State(state), with_class(json_value!({ "category": "Labs" })))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
