//! Keeps exactly one stored set in the slot.
//!
//! A swap is a strict pipeline: the slot's contents go back to the set that
//! owned them, the target's contents move into the slot, then the new owner and
//! its access time are persisted. Swaps are serialized through the same lock
//! that guards the in-memory mirror of the persisted state, so a second request
//! waits for the first to finish instead of interleaving moves with it.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use crate::bookmark_store::{BookmarkStore, Destination};
use crate::config::Config;
use crate::error::{StoreError, SwapError, SwapStep};
use crate::metadata_store::{MetadataKey, MetadataRecord, MetadataStore};
use crate::model::{ActiveState, Candidate};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The target already occupies the slot; nothing moved, nothing was written.
    AlreadyActive,
    Swapped {
        previous: Option<String>,
        active: Candidate,
        saved_back: usize,
        loaded: usize,
    },
}

pub struct SwapOrchestrator<B, M> {
    bookmarks: B,
    metadata: M,
    state: Mutex<ActiveState>,
    store_timeout: Duration,
}

impl<B, M> SwapOrchestrator<B, M>
where
    B: BookmarkStore,
    M: MetadataStore,
{
    /// `state` seeds the in-memory mirror; every operation refreshes it from
    /// the metadata store before acting.
    pub fn new(bookmarks: B, metadata: M, state: ActiveState) -> Self {
        Self {
            bookmarks,
            metadata,
            state: Mutex::new(state),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_config(bookmarks: B, metadata: M, cfg: &Config) -> Self {
        Self::new(bookmarks, metadata, ActiveState::default()).with_store_timeout(cfg.store_timeout())
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn bookmarks(&self) -> &B {
        &self.bookmarks
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    /// Last state this orchestrator read or wrote successfully.
    pub async fn state(&self) -> ActiveState {
        self.state.lock().await.clone()
    }

    pub async fn load(&self) -> Result<ActiveState, SwapError> {
        let mut mirror = self.state.lock().await;
        let state = self.read_state().await?;
        *mirror = state.clone();
        Ok(state)
    }

    pub async fn swap(&self, target_id: &str) -> Result<SwapOutcome, SwapError> {
        let mut mirror = self.state.lock().await;
        let state = self.read_state().await?;

        if state.is_active(target_id) {
            tracing::info!("set {target_id} is already active; nothing to swap");
            *mirror = state;
            return Ok(SwapOutcome::AlreadyActive);
        }

        if !state.has_initial_name() {
            tracing::warn!("swap to {target_id} blocked until the current slot is named");
            *mirror = state;
            return Err(SwapError::MissingInitialName {
                pending: target_id.to_string(),
            });
        }

        let target = self
            .bounded("get_set", self.bookmarks.get_set(target_id))
            .await
            .map_err(|error| match error {
                StoreError::NotFound(_) => SwapError::SetNotFound(target_id.to_string()),
                source => SwapError::StoreUnavailable {
                    step: SwapStep::LoadIn,
                    source,
                },
            })?;

        let owner = match state.active_id.as_deref() {
            Some(previous) => Some(self.resolve_owner(&state, previous).await?),
            None => None,
        };

        let mut moves = MoveProgress::default();
        let saved_back = match owner.as_deref() {
            Some(owner) => {
                let items = self
                    .bounded("list_slot_items", self.bookmarks.list_slot_items())
                    .await
                    .map_err(|source| moves.failure(SwapStep::SaveBack, 0, source))?;
                let destination = Destination::Set(owner.to_string());
                self.move_all(&items, &destination, SwapStep::SaveBack, &mut moves)
                    .await?
            }
            None => 0,
        };

        let items = self
            .bounded("list_set_items", self.bookmarks.list_set_items(target_id))
            .await
            .map_err(|source| moves.failure(SwapStep::LoadIn, 0, source))?;
        let loaded = self
            .move_all(&items, &Destination::Slot, SwapStep::LoadIn, &mut moves)
            .await?;

        let stamp = next_access_stamp(&state);
        let mut next = state.clone();
        if let (Some(previous), Some(owner)) = (state.active_id.as_deref(), owner.as_deref()) {
            if previous != owner {
                if let Some(last) = next.access_times.remove(previous) {
                    next.access_times.insert(owner.to_string(), last);
                }
            }
        }
        next.active_id = Some(target_id.to_string());
        next.active_title = Some(target.title.clone());
        next.access_times.insert(target_id.to_string(), stamp);

        self.bounded("set", self.metadata.set(MetadataRecord::from(&next)))
            .await
            .map_err(|source| {
                tracing::error!(
                    "moved {} item(s) into the slot for {target_id} but failed to persist: {source}",
                    moves.moved
                );
                SwapError::StoreUnavailable {
                    step: SwapStep::Persist,
                    source,
                }
            })?;

        tracing::info!(
            "slot now holds '{}' ({target_id}); saved back {saved_back}, loaded {loaded}",
            target.title
        );
        *mirror = next;

        Ok(SwapOutcome::Swapped {
            previous: owner,
            active: target.with_last_accessed(stamp),
            saved_back,
            loaded,
        })
    }

    /// Stored sets plus, when the active set is not among them, a virtual
    /// entry for it. The active set comes first, the rest by most recent
    /// access, never-accessed sets last in store order.
    pub async fn list_candidates(&self) -> Result<Vec<Candidate>, SwapError> {
        let mut mirror = self.state.lock().await;
        let state = self.read_state().await?;
        let sets = self.list_sets().await?;

        let mut candidates: Vec<Candidate> = sets
            .into_iter()
            .map(|set| {
                let last_accessed = state.access_time(&set.id);
                set.with_last_accessed(last_accessed)
            })
            .collect();

        if let (Some(active_id), Some(active_title)) = (&state.active_id, &state.active_title) {
            if !candidates.iter().any(|candidate| &candidate.id == active_id) {
                candidates.push(
                    Candidate::virtual_active(active_id, active_title)
                        .with_last_accessed(state.access_time(active_id)),
                );
            }
        }

        sort_candidates(&mut candidates, state.active_id.as_deref());
        *mirror = state;
        Ok(candidates)
    }

    /// Names whatever currently occupies the slot so swaps can start.
    ///
    /// Without a recorded owner a new set called `name` is created to own the
    /// slot's contents; they stay in the slot and are saved back into it on the
    /// next swap.
    pub async fn initialize_active_title(&self, name: &str) -> Result<Candidate, SwapError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SwapError::InvalidName);
        }

        let mut mirror = self.state.lock().await;
        let state = self.read_state().await?;
        if state.has_initial_name() {
            *mirror = state;
            return Err(SwapError::AlreadyInitialized);
        }

        let owner = match state.active_id.as_deref() {
            Some(active_id) => Candidate::new(active_id, name),
            None => self
                .bounded("create_set", self.bookmarks.create_set(name))
                .await
                .map_err(|source| SwapError::StoreUnavailable {
                    step: SwapStep::CreateSet,
                    source,
                })?,
        };

        let stamp = next_access_stamp(&state);
        let mut next = state;
        next.active_id = Some(owner.id.clone());
        next.active_title = Some(name.to_string());
        next.access_times.insert(owner.id.clone(), stamp);

        self.bounded("set", self.metadata.set(MetadataRecord::from(&next)))
            .await
            .map_err(|source| SwapError::StoreUnavailable {
                step: SwapStep::Persist,
                source,
            })?;

        tracing::info!("named the current slot '{name}' ({})", owner.id);
        *mirror = next;
        Ok(owner.with_last_accessed(stamp))
    }

    /// Creates an empty stored set; it becomes selectable on the next listing.
    pub async fn create_set(&self, title: &str) -> Result<Candidate, SwapError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SwapError::InvalidName);
        }

        let _guard = self.state.lock().await;
        let created = self
            .bounded("create_set", self.bookmarks.create_set(title))
            .await
            .map_err(|source| SwapError::StoreUnavailable {
                step: SwapStep::CreateSet,
                source,
            })?;
        tracing::info!("created set '{title}' ({})", created.id);
        Ok(created)
    }

    /// Gives every stored set without an access time an entry of 0. Returns
    /// how many entries were added.
    pub async fn record_access_for_all_known_sets(&self) -> Result<usize, SwapError> {
        let mut mirror = self.state.lock().await;
        let state = self.read_state().await?;
        let sets = self.list_sets().await?;

        let mut access_times = state.access_times.clone();
        let mut added = 0;
        for set in &sets {
            if !access_times.contains_key(&set.id) {
                access_times.insert(set.id.clone(), 0);
                added += 1;
            }
        }

        if added > 0 {
            self.write_access_times(&access_times).await?;
            tracing::info!("recorded default access times for {added} set(s)");
        }

        *mirror = ActiveState {
            access_times,
            ..state
        };
        Ok(added)
    }

    /// Drops access times of sets that no longer exist. The active set's entry
    /// is kept even when it is not enumerable. Returns how many were removed.
    pub async fn prune_access_times(&self) -> Result<usize, SwapError> {
        let mut mirror = self.state.lock().await;
        let state = self.read_state().await?;
        let sets = self.list_sets().await?;

        let mut access_times = state.access_times.clone();
        let before = access_times.len();
        access_times.retain(|id, _| {
            state.is_active(id) || sets.iter().any(|set| &set.id == id)
        });
        let removed = before - access_times.len();

        if removed > 0 {
            self.write_access_times(&access_times).await?;
            tracing::info!("pruned {removed} stale access time(s)");
        }

        *mirror = ActiveState {
            access_times,
            ..state
        };
        Ok(removed)
    }

    /// Id of the set the slot's contents go back to. When the recorded owner
    /// was deleted from the store, a new set with the recorded title takes
    /// its place so the slot's contents are not stranded.
    async fn resolve_owner(&self, state: &ActiveState, previous: &str) -> Result<String, SwapError> {
        match self.bounded("get_set", self.bookmarks.get_set(previous)).await {
            Ok(owner) => Ok(owner.id),
            Err(StoreError::NotFound(_)) => {
                let title = state.active_title.as_deref().unwrap_or_default();
                let owner = self
                    .bounded("create_set", self.bookmarks.create_set(title))
                    .await
                    .map_err(|source| SwapError::StoreUnavailable {
                        step: SwapStep::CreateSet,
                        source,
                    })?;
                tracing::warn!(
                    "set {previous} owning the slot is gone; recreated '{title}' as {}",
                    owner.id
                );
                Ok(owner.id)
            }
            Err(source) => Err(SwapError::StoreUnavailable {
                step: SwapStep::SaveBack,
                source,
            }),
        }
    }

    async fn read_state(&self) -> Result<ActiveState, SwapError> {
        self.bounded("get", self.metadata.get(&MetadataKey::ALL))
            .await
            .map(MetadataRecord::into_state)
            .map_err(|source| {
                tracing::error!("failed to read active state: {source}");
                SwapError::StoreUnavailable {
                    step: SwapStep::ReadState,
                    source,
                }
            })
    }

    async fn list_sets(&self) -> Result<Vec<Candidate>, SwapError> {
        self.bounded("list_sets", self.bookmarks.list_sets())
            .await
            .map_err(|source| {
                tracing::error!("failed to list sets: {source}");
                SwapError::StoreUnavailable {
                    step: SwapStep::ListSets,
                    source,
                }
            })
    }

    async fn write_access_times(
        &self,
        access_times: &std::collections::BTreeMap<String, i64>,
    ) -> Result<(), SwapError> {
        let record = MetadataRecord {
            access_times: Some(access_times.clone()),
            ..MetadataRecord::default()
        };
        self.bounded("set", self.metadata.set(record))
            .await
            .map_err(|source| SwapError::StoreUnavailable {
                step: SwapStep::Persist,
                source,
            })
    }

    async fn move_all(
        &self,
        items: &[crate::model::BookmarkItem],
        destination: &Destination,
        step: SwapStep,
        moves: &mut MoveProgress,
    ) -> Result<usize, SwapError> {
        for (index, item) in items.iter().enumerate() {
            self.bounded("move_item", self.bookmarks.move_item(&item.id, destination))
                .await
                .map_err(|source| {
                    let error = moves.failure(step, items.len() - index, source);
                    tracing::error!("{error}");
                    error
                })?;
            moves.moved += 1;
        }
        Ok(items.len())
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(operation)),
        }
    }
}

/// Items relocated so far by the swap in flight.
#[derive(Debug, Default)]
struct MoveProgress {
    moved: usize,
}

impl MoveProgress {
    fn failure(&self, step: SwapStep, remaining: usize, source: StoreError) -> SwapError {
        if self.moved == 0 {
            SwapError::StoreUnavailable { step, source }
        } else {
            SwapError::PartialMove {
                step,
                moved: self.moved,
                remaining,
                source,
            }
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Wall-clock millis, nudged past every stamp already recorded so the newest
/// swap always sorts first even within one millisecond or after a clock step.
fn next_access_stamp(state: &ActiveState) -> i64 {
    now_millis().max(state.latest_access() + 1)
}

pub fn sort_candidates(candidates: &mut [Candidate], active_id: Option<&str>) {
    candidates.sort_by(|a, b| {
        let a_active = active_id == Some(a.id.as_str());
        let b_active = active_id == Some(b.id.as_str());
        b_active
            .cmp(&a_active)
            .then_with(|| b.last_accessed.cmp(&a.last_accessed))
    });
}
