use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::model::{BookmarkItem, Candidate};

/// Where an item can be moved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Slot,
    Set(String),
}

/// Storage of named sets and of the single slot their contents are swapped into.
///
/// `list_sets` never includes the slot container itself.
pub trait BookmarkStore {
    fn list_sets(&self) -> impl Future<Output = Result<Vec<Candidate>, StoreError>> + Send;

    fn list_slot_items(&self) -> impl Future<Output = Result<Vec<BookmarkItem>, StoreError>> + Send;

    fn list_set_items(
        &self,
        set_id: &str,
    ) -> impl Future<Output = Result<Vec<BookmarkItem>, StoreError>> + Send;

    fn move_item(
        &self,
        item_id: &str,
        destination: &Destination,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn create_set(&self, title: &str) -> impl Future<Output = Result<Candidate, StoreError>> + Send;

    fn get_set(&self, id: &str) -> impl Future<Output = Result<Candidate, StoreError>> + Send;
}

#[derive(Debug, Default)]
struct MemoryTree {
    sets: Vec<Candidate>,
    contents: HashMap<String, Vec<BookmarkItem>>,
    slot: Vec<BookmarkItem>,
    next_id: u64,
}

impl MemoryTree {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn container_mut(&mut self, destination: &Destination) -> Result<&mut Vec<BookmarkItem>, StoreError> {
        match destination {
            Destination::Slot => Ok(&mut self.slot),
            Destination::Set(id) => self
                .contents
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone())),
        }
    }

    fn take_item(&mut self, item_id: &str) -> Option<BookmarkItem> {
        if let Some(position) = self.slot.iter().position(|item| item.id == item_id) {
            return Some(self.slot.remove(position));
        }
        self.contents.values_mut().find_map(|items| {
            items
                .iter()
                .position(|item| item.id == item_id)
                .map(|position| items.remove(position))
        })
    }
}

/// In-process store, used by tests and by embedders without a real backend.
#[derive(Debug, Default)]
pub struct MemoryBookmarkStore {
    tree: Mutex<MemoryTree>,
}

impl MemoryBookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryTree>, StoreError> {
        self.tree
            .lock()
            .map_err(|_| StoreError::Unavailable("bookmark tree lock poisoned".to_string()))
    }

    pub fn add_set(&self, title: &str) -> Result<String, StoreError> {
        let mut tree = self.lock()?;
        let id = tree.allocate_id();
        tree.sets.push(Candidate::new(&id, title));
        tree.contents.insert(id.clone(), Vec::new());
        Ok(id)
    }

    pub fn add_item(
        &self,
        destination: &Destination,
        title: &str,
        url: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut tree = self.lock()?;
        let id = tree.allocate_id();
        let item = BookmarkItem::new(&id, title, url);
        tree.container_mut(destination)?.push(item);
        Ok(id)
    }

    /// Drops a set from the enumerable list along with its contents.
    pub fn remove_set(&self, id: &str) -> Result<(), StoreError> {
        let mut tree = self.lock()?;
        let before = tree.sets.len();
        tree.sets.retain(|set| set.id != id);
        if tree.sets.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tree.contents.remove(id);
        Ok(())
    }

    pub fn titles_in(&self, destination: &Destination) -> Result<Vec<String>, StoreError> {
        let mut tree = self.lock()?;
        let items = tree.container_mut(destination)?;
        Ok(items.iter().map(|item| item.title.clone()).collect())
    }
}

impl BookmarkStore for MemoryBookmarkStore {
    async fn list_sets(&self) -> Result<Vec<Candidate>, StoreError> {
        Ok(self.lock()?.sets.clone())
    }

    async fn list_slot_items(&self) -> Result<Vec<BookmarkItem>, StoreError> {
        Ok(self.lock()?.slot.clone())
    }

    async fn list_set_items(&self, set_id: &str) -> Result<Vec<BookmarkItem>, StoreError> {
        self.lock()?
            .contents
            .get(set_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(set_id.to_string()))
    }

    async fn move_item(&self, item_id: &str, destination: &Destination) -> Result<(), StoreError> {
        let mut tree = self.lock()?;
        tree.container_mut(destination)?;
        let item = tree
            .take_item(item_id)
            .ok_or_else(|| StoreError::NotFound(item_id.to_string()))?;
        tree.container_mut(destination)?.push(item);
        Ok(())
    }

    async fn create_set(&self, title: &str) -> Result<Candidate, StoreError> {
        let id = self.add_set(title)?;
        Ok(Candidate::new(&id, title))
    }

    async fn get_set(&self, id: &str) -> Result<Candidate, StoreError> {
        self.lock()?
            .sets
            .iter()
            .find(|set| set.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
