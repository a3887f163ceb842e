#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use hotbar_core::bookmark_store::{BookmarkStore, Destination, MemoryBookmarkStore};
use hotbar_core::error::StoreError;
use hotbar_core::metadata_store::{MemoryMetadataStore, MetadataKey, MetadataRecord, MetadataStore};
use hotbar_core::model::{BookmarkItem, Candidate};
use hotbar_core::orchestrator::SwapOrchestrator;

/// Memory bookmark store that counts calls and can fail or stall moves.
#[derive(Default)]
pub struct RecordingBookmarks {
    pub inner: MemoryBookmarkStore,
    calls: AtomicUsize,
    moves: AtomicUsize,
    attempted_moves: AtomicUsize,
    fail_on_move: Mutex<Option<usize>>,
    yield_on_move: AtomicBool,
    fail_create: AtomicBool,
    slow_move: Mutex<Option<Duration>>,
}

impl RecordingBookmarks {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn moves(&self) -> usize {
        self.moves.load(Ordering::SeqCst)
    }

    /// Fails the move attempt with this zero-based index (counted from now on).
    pub fn fail_on_move(&self, attempt: usize) {
        let base = self.attempted_moves.load(Ordering::SeqCst);
        *self.fail_on_move.lock().unwrap() = Some(base + attempt);
    }

    pub fn yield_on_move(&self) {
        self.yield_on_move.store(true, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn slow_moves(&self, delay: Duration) {
        *self.slow_move.lock().unwrap() = Some(delay);
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl BookmarkStore for RecordingBookmarks {
    async fn list_sets(&self) -> Result<Vec<Candidate>, StoreError> {
        self.touch();
        self.inner.list_sets().await
    }

    async fn list_slot_items(&self) -> Result<Vec<BookmarkItem>, StoreError> {
        self.touch();
        self.inner.list_slot_items().await
    }

    async fn list_set_items(&self, set_id: &str) -> Result<Vec<BookmarkItem>, StoreError> {
        self.touch();
        self.inner.list_set_items(set_id).await
    }

    async fn move_item(&self, item_id: &str, destination: &Destination) -> Result<(), StoreError> {
        self.touch();
        let attempt = self.attempted_moves.fetch_add(1, Ordering::SeqCst);
        let should_fail = *self.fail_on_move.lock().unwrap() == Some(attempt);
        let delay = *self.slow_move.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.yield_on_move.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        if should_fail {
            return Err(StoreError::Unavailable("injected move failure".to_string()));
        }
        self.inner.move_item(item_id, destination).await?;
        self.moves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_set(&self, title: &str) -> Result<Candidate, StoreError> {
        self.touch();
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected create failure".to_string()));
        }
        self.inner.create_set(title).await
    }

    async fn get_set(&self, id: &str) -> Result<Candidate, StoreError> {
        self.touch();
        self.inner.get_set(id).await
    }
}

/// Memory metadata store that counts writes and can refuse reads or writes.
#[derive(Default)]
pub struct RecordingMetadata {
    pub inner: MemoryMetadataStore,
    sets: AtomicUsize,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
}

impl RecordingMetadata {
    pub fn with_record(record: MetadataRecord) -> Self {
        Self {
            inner: MemoryMetadataStore::with_record(record),
            ..Self::default()
        }
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetadataRecord {
        self.inner.snapshot().unwrap()
    }
}

impl MetadataStore for RecordingMetadata {
    async fn get(&self, keys: &[MetadataKey]) -> Result<MetadataRecord, StoreError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        self.inner.get(keys).await
    }

    async fn set(&self, record: MetadataRecord) -> Result<(), StoreError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(record).await
    }
}

pub type TestOrchestrator = SwapOrchestrator<RecordingBookmarks, RecordingMetadata>;

pub fn orchestrator() -> TestOrchestrator {
    SwapOrchestrator::new(
        RecordingBookmarks::default(),
        RecordingMetadata::default(),
        Default::default(),
    )
}

pub struct Seeded {
    pub work: String,
    pub home: String,
}

/// Two sets with two items each, one item already in the slot, and the slot
/// named "Current".
pub async fn seeded_orchestrator() -> (TestOrchestrator, Seeded) {
    let orchestrator = orchestrator();
    let store = &orchestrator.bookmarks().inner;
    let work = store.add_set("Work").unwrap();
    let home = store.add_set("Home").unwrap();
    for title in ["Tracker", "Wiki"] {
        store
            .add_item(&Destination::Set(work.clone()), title, Some("https://work.example"))
            .unwrap();
    }
    for title in ["Recipes", "Bank"] {
        store
            .add_item(&Destination::Set(home.clone()), title, Some("https://home.example"))
            .unwrap();
    }
    store
        .add_item(&Destination::Slot, "Inbox", Some("https://mail.example"))
        .unwrap();
    orchestrator.initialize_active_title("Current").await.unwrap();
    (orchestrator, Seeded { work, home })
}

pub fn slot_titles(orchestrator: &TestOrchestrator) -> Vec<String> {
    orchestrator
        .bookmarks()
        .inner
        .titles_in(&Destination::Slot)
        .unwrap()
}

pub fn set_titles(orchestrator: &TestOrchestrator, id: &str) -> Vec<String> {
    orchestrator
        .bookmarks()
        .inner
        .titles_in(&Destination::Set(id.to_string()))
        .unwrap()
}
