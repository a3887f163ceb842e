use crate::bookmark_store::BookmarkStore;
use crate::config::Config;
use crate::error::SwapError;
use crate::fuzzy::{highlight, Highlighted, MatchResult};
use crate::metadata_store::MetadataStore;
use crate::model::Candidate;
use crate::orchestrator::{SwapOrchestrator, SwapOutcome};
use crate::search::{create_offer, rank_and_filter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub candidate: Candidate,
    pub is_active: bool,
    pub result: MatchResult,
}

impl ListEntry {
    pub fn pieces(&self) -> Vec<Highlighted<'_>> {
        highlight(&self.candidate.title, &self.result.spans)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchView {
    pub entries: Vec<ListEntry>,
    /// Set when a query was typed and no candidate matched it.
    pub create_offer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Swapped { active: Candidate },
    AlreadyActive,
    /// The slot has no name yet; call `provide_initial_name` to finish.
    NeedsInitialName { pending: String },
    /// The slot was named and no swap was waiting.
    Named { owner: Candidate },
}

/// Drives matching and swapping from discrete user actions: a keystroke asks
/// for a `search`, a pick asks for a `select`.
pub struct Switcher<B, M> {
    orchestrator: SwapOrchestrator<B, M>,
    candidates: Vec<Candidate>,
    active_id: Option<String>,
    pending: Option<String>,
    max_results: usize,
}

impl<B, M> Switcher<B, M>
where
    B: BookmarkStore,
    M: MetadataStore,
{
    pub fn new(orchestrator: SwapOrchestrator<B, M>) -> Self {
        Self {
            orchestrator,
            candidates: Vec::new(),
            active_id: None,
            pending: None,
            max_results: usize::from(Config::default().max_results),
        }
    }

    pub fn with_config(orchestrator: SwapOrchestrator<B, M>, cfg: &Config) -> Self {
        Self::new(orchestrator).with_max_results(usize::from(cfg.max_results))
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn orchestrator(&self) -> &SwapOrchestrator<B, M> {
        &self.orchestrator
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Runs access-time maintenance, then lists. Maintenance failures are
    /// logged and do not block listing.
    pub async fn open(&mut self) -> Result<&[Candidate], SwapError> {
        if let Err(error) = self.orchestrator.record_access_for_all_known_sets().await {
            tracing::warn!("access time backfill skipped: {error}");
        }
        if let Err(error) = self.orchestrator.prune_access_times().await {
            tracing::warn!("access time cleanup skipped: {error}");
        }
        self.refresh().await
    }

    pub async fn refresh(&mut self) -> Result<&[Candidate], SwapError> {
        self.candidates = self.orchestrator.list_candidates().await?;
        self.active_id = self.orchestrator.state().await.active_id;
        Ok(&self.candidates)
    }

    pub fn search(&self, query: &str) -> SearchView {
        let ranked = rank_and_filter(&self.candidates, query);
        let create_offer = create_offer(query, &ranked);
        let entries = ranked
            .into_iter()
            .take(self.max_results)
            .map(|ranked| ListEntry {
                is_active: self.active_id.as_deref() == Some(ranked.candidate.id.as_str()),
                candidate: ranked.candidate,
                result: ranked.result,
            })
            .collect();
        SearchView {
            entries,
            create_offer,
        }
    }

    pub async fn select(&mut self, id: &str) -> Result<Selection, SwapError> {
        match self.orchestrator.swap(id).await {
            Ok(SwapOutcome::AlreadyActive) => {
                self.pending = None;
                Ok(Selection::AlreadyActive)
            }
            Ok(SwapOutcome::Swapped { active, .. }) => {
                self.pending = None;
                self.refresh().await?;
                Ok(Selection::Swapped { active })
            }
            Err(SwapError::MissingInitialName { pending }) => {
                self.pending = Some(pending.clone());
                Ok(Selection::NeedsInitialName { pending })
            }
            Err(error) => {
                if error.needs_resync() {
                    if let Err(refresh_error) = self.refresh().await {
                        tracing::warn!("re-listing after failed swap also failed: {refresh_error}");
                    }
                }
                Err(error)
            }
        }
    }

    /// Names the current slot, then completes the swap that was waiting for it.
    pub async fn provide_initial_name(&mut self, name: &str) -> Result<Selection, SwapError> {
        let owner = match self.orchestrator.initialize_active_title(name).await {
            Ok(owner) => owner,
            Err(SwapError::AlreadyInitialized) => {
                self.pending = None;
                return Err(SwapError::AlreadyInitialized);
            }
            Err(error) => return Err(error),
        };
        match self.pending.take() {
            Some(pending) => self.select(&pending).await,
            None => {
                self.refresh().await?;
                Ok(Selection::Named { owner })
            }
        }
    }

    /// Creates a set called `name` and swaps it into the slot.
    pub async fn create_set(&mut self, name: &str) -> Result<Selection, SwapError> {
        let created = self.orchestrator.create_set(name).await?;
        self.select(&created.id).await
    }
}
