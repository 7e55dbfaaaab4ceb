use askama::Template;
use axum::{
    extract::{rejection::FormRejection, Form, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::HttpError;
use crate::model::{is_reserved, AttendeeForm, EventForm, EventStore, Identifier, StoreError};
use crate::view::EventPage;

/// Attempts per append before giving up on a contended record
const APPEND_ATTEMPTS: usize = 3;

/// Shared handler state, injected at router construction
#[derive(Clone)]
pub struct AppState {
    /// Document store for event records
    pub store: Arc<dyn EventStore>,
}

/// Build the application router around the injected store.
///
/// The dispatch table, by path depth and method:
/// depth 1 GET redirects (`/events` to `/`, anything else to its
/// canonical event URL), depth 1 POST creates on `/events` only,
/// depth 2 GET shows an event, depth 3 POST appends an attendee when the
/// third segment is the `attendees` literal, depth 3 GET is the
/// unimplemented attendee listing. Unlisted methods on matched paths get
/// 405 from the method routers; everything else falls through to 404.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(events_collection_redirect).post(create_event))
        .route("/events/{id}", get(show_event))
        .route(
            "/events/{id}/attendees",
            get(list_attendees).post(add_attendee),
        )
        .route("/{id}", get(event_shorthand_redirect))
        .fallback(not_found)
        .with_state(state)
}

/// A 302 response; axum's `Redirect` only offers 303/307/308
fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// GET /events — the collection has no listing page
async fn events_collection_redirect() -> Response {
    found("/".to_string())
}

/// GET /{id} — shorthand for an event's canonical URL
async fn event_shorthand_redirect(Path(id): Path<String>) -> Response {
    found(format!("/events/{id}"))
}

/// POST /events — create an event from form fields
async fn create_event(
    State(state): State<AppState>,
    form: Result<Form<EventForm>, FormRejection>,
) -> Result<Redirect, HttpError> {
    let Form(form) =
        form.map_err(|e| HttpError::Internal(format!("failed to parse creation form: {e}")))?;

    // validate before touching the store: an id may not shadow a route
    // segment, and every descriptive field must be present
    if is_reserved(&form.id) {
        return Err(HttpError::Conflict("reserved id"));
    }
    let missing = form.missing_fields();
    if !missing.is_empty() {
        return Err(HttpError::Validation(missing.join(", ")));
    }

    // a caller-chosen id must not overwrite an existing record
    if !form.id.is_empty() && state.store.get(&form.id).await?.is_some() {
        return Err(HttpError::Conflict("id already taken"));
    }

    let event = form.into_event();
    let location = if event.id.is_empty() {
        // no caller id: store under a generated key and hand back its
        // encoded form; the record body keeps an empty id
        let key = Uuid::new_v4();
        state.store.put(&key.to_string(), &event).await?;
        format!("/events/{}", Identifier::encode(&key))
    } else {
        state.store.put(&event.id, &event).await?;
        format!("/events/{}", event.id)
    };

    info!("created event, redirecting to {}", location);
    Ok(Redirect::to(&location))
}

/// GET /events/{id} — render one event
async fn show_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, HttpError> {
    let ident = Identifier::parse(&id);

    let Some(stored) = state.store.get(&ident.store_key()).await? else {
        return Err(HttpError::NotFound);
    };

    let mut event = stored.event;
    if event.id.is_empty() {
        // generated-key records never had an id written into the body
        event.id = id;
    }

    let page = EventPage { event };
    let html = page
        .render()
        .map_err(|e| HttpError::Internal(format!("template render failed: {e}")))?;
    Ok(Html(html))
}

/// GET /events/{id}/attendees — listing is not implemented
async fn list_attendees() -> HttpError {
    HttpError::NotImplemented
}

/// POST /events/{id}/attendees — append a name to the attendee list
async fn add_attendee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: Result<Form<AttendeeForm>, FormRejection>,
) -> Result<Redirect, HttpError> {
    let Form(form) =
        form.map_err(|e| HttpError::Internal(format!("failed to parse attendee form: {e}")))?;

    let ident = Identifier::parse(&id);
    let key = ident.store_key();

    // read-modify-write under the store's version guard; a lost race
    // re-reads so the append lands on the winner's list
    for _ in 0..APPEND_ATTEMPTS {
        let Some(stored) = state.store.get(&key).await? else {
            return Err(HttpError::NotFound);
        };

        let mut event = stored.event;
        event.attendees.push(form.attendee.clone());
        if event.id.is_empty() {
            event.id = id.clone();
        }

        match state.store.put_versioned(&key, &event, stored.version).await {
            Ok(()) => {
                info!("added attendee to event {}", key);
                return Ok(Redirect::to(&format!("/events/{id}")));
            }
            Err(StoreError::VersionConflict) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(HttpError::Internal(format!(
        "append kept conflicting for event {key}"
    )))
}

/// Fallback for every path the table does not enumerate
async fn not_found() -> HttpError {
    HttpError::NotFound
}
