use axum::{extract::State, response::Response};

use crate::{
    endpoints::{AppState, JsonBody, json},
    error::EngineError,
    model::{
        class_offering::NewOffering, request::ClientRequest, semester::Semester,
        time_slot::TimeSlot,
    },
    scheduling,
};

pub async fn create_class(
    State(state): State<AppState>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response, EngineError> {
    let ClientRequest {
        subject: Some(subject),
        number: Some(number),
        season: Some(season),
        year: Some(year),
        start: Some(start),
        end: Some(end),
        location: Some(location),
        instructor: Some(instructor),
        ..
    } = client_req
    else {
        return Err(EngineError::invalid(
            "expected subject, number, season, year, start, end, location and instructor",
        ));
    };

    let proposal = NewOffering {
        subject,
        number,
        semester: Semester::new(season, year),
        slot: TimeSlot::parse(&start, &end)?,
        location,
        instructor,
    };

    let offering = scheduling::create_class(state.store.as_ref(), &proposal).await?;
    Ok(json(offering))
}
