use super::AppState;
use crate::domain::jobs::{JobId, JobSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::{stream, Stream};
use std::convert::Infallible;

fn parse_id(raw: &str) -> Result<JobId, (StatusCode, String)> {
    raw.parse()
        .map_err(|_| (StatusCode::NOT_FOUND, "Job not found".to_string()))
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<JobSnapshot>, (StatusCode, String)> {
    let id = parse_id(&raw_id)?;
    state
        .registry
        .status(id, state.status_log_tail)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Job not found".to_string()))
}

/// One event per published change, closed after the terminal state.
pub async fn job_events(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let id = parse_id(&raw_id)?;
    let receiver = state
        .registry
        .subscribe(id)
        .await
        .ok_or((StatusCode::NOT_FOUND, "Job not found".to_string()))?;
    let tail = state.status_log_tail;

    let events = stream::unfold(Some((receiver, true)), move |cursor| async move {
        let (mut receiver, first) = cursor?;
        // A closed channel after a non-terminal snapshot means the worker is gone
        if !first && receiver.changed().await.is_err() {
            return None;
        }
        let snapshot = receiver.borrow_and_update().snapshot(tail);
        let event = Event::default()
            .event(snapshot.state.label())
            .json_data(&snapshot)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        let next = (!snapshot.state.is_terminal()).then_some((receiver, false));
        Some((Ok::<_, Infallible>(event), next))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
