use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::ActiveState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKey {
    ActiveId,
    ActiveTitle,
    AccessTimes,
}

impl MetadataKey {
    pub const ALL: [MetadataKey; 3] = [Self::ActiveId, Self::ActiveTitle, Self::AccessTimes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActiveId => "activeId",
            Self::ActiveTitle => "activeTitle",
            Self::AccessTimes => "accessTimes",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == raw)
    }
}

/// A partial view of the persisted keys; `None` means absent or untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_times: Option<BTreeMap<String, i64>>,
}

impl MetadataRecord {
    pub fn is_empty(&self) -> bool {
        self.active_id.is_none() && self.active_title.is_none() && self.access_times.is_none()
    }

    pub fn keys(&self) -> Vec<MetadataKey> {
        let mut keys = Vec::with_capacity(3);
        if self.active_id.is_some() {
            keys.push(MetadataKey::ActiveId);
        }
        if self.active_title.is_some() {
            keys.push(MetadataKey::ActiveTitle);
        }
        if self.access_times.is_some() {
            keys.push(MetadataKey::AccessTimes);
        }
        keys
    }

    /// Keeps only the requested keys.
    pub fn restricted_to(mut self, keys: &[MetadataKey]) -> Self {
        if !keys.contains(&MetadataKey::ActiveId) {
            self.active_id = None;
        }
        if !keys.contains(&MetadataKey::ActiveTitle) {
            self.active_title = None;
        }
        if !keys.contains(&MetadataKey::AccessTimes) {
            self.access_times = None;
        }
        self
    }

    /// Writes every present key of `update` over `self`.
    pub fn merge(&mut self, update: MetadataRecord) {
        if update.active_id.is_some() {
            self.active_id = update.active_id;
        }
        if update.active_title.is_some() {
            self.active_title = update.active_title;
        }
        if update.access_times.is_some() {
            self.access_times = update.access_times;
        }
    }

    pub fn into_state(self) -> ActiveState {
        ActiveState {
            active_id: self.active_id,
            active_title: self.active_title,
            access_times: self.access_times.unwrap_or_default(),
        }
    }
}

impl From<&ActiveState> for MetadataRecord {
    fn from(value: &ActiveState) -> Self {
        Self {
            active_id: value.active_id.clone(),
            active_title: value.active_title.clone(),
            access_times: Some(value.access_times.clone()),
        }
    }
}

/// Persisted key/value storage for the active-slot bookkeeping.
pub trait MetadataStore {
    fn get(
        &self,
        keys: &[MetadataKey],
    ) -> impl Future<Output = Result<MetadataRecord, StoreError>> + Send;

    fn set(&self, record: MetadataRecord) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    record: Mutex<MetadataRecord>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: MetadataRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }

    pub fn snapshot(&self) -> Result<MetadataRecord, StoreError> {
        self.record
            .lock()
            .map(|record| record.clone())
            .map_err(|_| StoreError::Unavailable("metadata lock poisoned".to_string()))
    }
}

impl MetadataStore for MemoryMetadataStore {
    async fn get(&self, keys: &[MetadataKey]) -> Result<MetadataRecord, StoreError> {
        Ok(self.snapshot()?.restricted_to(keys))
    }

    async fn set(&self, record: MetadataRecord) -> Result<(), StoreError> {
        let mut current = self
            .record
            .lock()
            .map_err(|_| StoreError::Unavailable("metadata lock poisoned".to_string()))?;
        current.merge(record);
        Ok(())
    }
}
