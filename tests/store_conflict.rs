//! Append behavior under write contention, driven through mock stores
//! that inject version conflicts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use kutsu::handlers::{router, AppState};
use kutsu::model::{Event, EventStore, InMemoryStore, StoreError, StoredEvent};

/// Store whose first conditional write loses a race: a competing append
/// commits in between the caller's read and write.
#[derive(Default)]
struct ContendedStore {
    inner: InMemoryStore,
    raced: AtomicBool,
}

#[async_trait]
impl EventStore for ContendedStore {
    async fn get(&self, key: &str) -> Result<Option<StoredEvent>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, event: &Event) -> Result<(), StoreError> {
        self.inner.put(key, event).await
    }

    async fn put_versioned(
        &self,
        key: &str,
        event: &Event,
        expected: u64,
    ) -> Result<(), StoreError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let stored = self.inner.get(key).await?.expect("record exists");
            let mut competing = stored.event;
            competing.attendees.push("Zara".to_string());
            self.inner
                .put_versioned(key, &competing, stored.version)
                .await?;
        }
        self.inner.put_versioned(key, event, expected).await
    }
}

/// Store where every conditional write conflicts
#[derive(Default)]
struct AlwaysConflictingStore {
    inner: InMemoryStore,
}

#[async_trait]
impl EventStore for AlwaysConflictingStore {
    async fn get(&self, key: &str) -> Result<Option<StoredEvent>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, event: &Event) -> Result<(), StoreError> {
        self.inner.put(key, event).await
    }

    async fn put_versioned(
        &self,
        _key: &str,
        _event: &Event,
        _expected: u64,
    ) -> Result<(), StoreError> {
        Err(StoreError::VersionConflict)
    }
}

fn seed_event() -> Event {
    Event {
        id: "picnic".to_string(),
        title: "Picnic".to_string(),
        description: "In the park".to_string(),
        location: "Kaivopuisto".to_string(),
        start: "2025-06-01T12:00".to_string(),
        end: "2025-06-01T15:00".to_string(),
        poc: "Maija".to_string(),
        attendees: Vec::new(),
    }
}

fn append_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/events/picnic/attendees")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("attendee=Alice"))
        .unwrap()
}

#[tokio::test]
async fn lost_race_retries_and_lands_on_the_winner() {
    let store = Arc::new(ContendedStore::default());
    store.put("picnic", &seed_event()).await.unwrap();

    let app = router(AppState {
        store: store.clone(),
    });

    let response = app.oneshot(append_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // the competing append is preserved and ours follows it
    let stored = store.get("picnic").await.unwrap().unwrap();
    assert_eq!(stored.event.attendees, vec!["Zara", "Alice"]);
    assert_eq!(stored.version, 3);
}

#[tokio::test]
async fn persistent_contention_gives_up_with_an_internal_error() {
    let store = Arc::new(AlwaysConflictingStore::default());
    store.put("picnic", &seed_event()).await.unwrap();

    let app = router(AppState { store });

    let response = app.oneshot(append_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "Internal Server Error");
}
