use askama::Template;

use crate::model::Event;

/// The single HTML view: one event with its attendee list and the
/// sign-up form
#[derive(Template)]
#[template(path = "event.html")]
pub struct EventPage {
    pub event: Event,
}
