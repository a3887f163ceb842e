/// Failure reported by a bookmark or metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Unavailable(String),
    NotFound(String),
    Timeout(&'static str),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(error) => write!(f, "store unavailable: {error}"),
            Self::NotFound(id) => write!(f, "not found: {id}"),
            Self::Timeout(operation) => write!(f, "store call timed out: {operation}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Unavailable(format!("metadata encoding: {value}"))
    }
}

/// Stage of a swap at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStep {
    ReadState,
    ListSets,
    CreateSet,
    SaveBack,
    LoadIn,
    Persist,
}

impl SwapStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadState => "read_state",
            Self::ListSets => "list_sets",
            Self::CreateSet => "create_set",
            Self::SaveBack => "save_back",
            Self::LoadIn => "load_in",
            Self::Persist => "persist",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    /// A store call failed before any item moved during this swap.
    StoreUnavailable { step: SwapStep, source: StoreError },
    /// Some items moved before a store call failed; nothing was rolled back.
    PartialMove {
        step: SwapStep,
        moved: usize,
        remaining: usize,
        source: StoreError,
    },
    /// No name is known yet for whatever occupies the slot.
    MissingInitialName { pending: String },
    SetNotFound(String),
    AlreadyInitialized,
    InvalidName,
}

impl SwapError {
    /// True when the real store may now disagree with the persisted metadata
    /// and the caller should re-list before trusting either.
    pub fn needs_resync(&self) -> bool {
        matches!(
            self,
            Self::PartialMove { .. }
                | Self::StoreUnavailable {
                    step: SwapStep::Persist,
                    ..
                }
        )
    }
}

impl std::fmt::Display for SwapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreUnavailable { step, source } => {
                write!(f, "swap failed at {}: {source}", step.as_str())
            }
            Self::PartialMove {
                step,
                moved,
                remaining,
                source,
            } => write!(
                f,
                "swap interrupted at {} after moving {moved} item(s), {remaining} left: {source}",
                step.as_str()
            ),
            Self::MissingInitialName { pending } => {
                write!(f, "the current slot needs a name before switching to {pending}")
            }
            Self::SetNotFound(id) => write!(f, "set not found: {id}"),
            Self::AlreadyInitialized => write!(f, "the current slot already has a name"),
            Self::InvalidName => write!(f, "set name must not be empty"),
        }
    }
}

impl std::error::Error for SwapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StoreUnavailable { source, .. } | Self::PartialMove { source, .. } => Some(source),
            _ => None,
        }
    }
}
