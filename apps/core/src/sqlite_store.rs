use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::bookmark_store::{BookmarkStore, Destination};
use crate::config::Config;
use crate::error::StoreError;
use crate::metadata_store::{MetadataKey, MetadataRecord, MetadataStore};
use crate::model::{BookmarkItem, Candidate};

fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::Unavailable(format!("failed to create store dir: {e}")))?;
    }
    Ok(Connection::open(path)?)
}

fn lock(db: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    db.lock()
        .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
}

/// Metadata keys stored as JSON values in a single key/value table.
pub struct SqliteMetadataStore {
    db: Mutex<Connection>,
}

impl SqliteMetadataStore {
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    pub fn open_file(path: &Path) -> Result<Self, StoreError> {
        Self::with_connection(open_connection(path)?)
    }

    pub fn open_from_config(cfg: &Config) -> Result<Self, StoreError> {
        Self::open_file(&cfg.metadata_db_path)
    }

    fn with_connection(db: Connection) -> Result<Self, StoreError> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn read_value(db: &Connection, key: MetadataKey) -> Result<Option<String>, StoreError> {
        let value = db
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_value(db: &Connection, key: MetadataKey, value: &str) -> Result<(), StoreError> {
        db.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key.as_str(), value],
        )?;
        Ok(())
    }
}

impl MetadataStore for SqliteMetadataStore {
    async fn get(&self, keys: &[MetadataKey]) -> Result<MetadataRecord, StoreError> {
        let db = lock(&self.db)?;
        let mut record = MetadataRecord::default();
        for key in keys {
            let Some(raw) = Self::read_value(&db, *key)? else {
                continue;
            };
            match key {
                MetadataKey::ActiveId => record.active_id = Some(serde_json::from_str(&raw)?),
                MetadataKey::ActiveTitle => record.active_title = Some(serde_json::from_str(&raw)?),
                MetadataKey::AccessTimes => {
                    record.access_times =
                        Some(serde_json::from_str::<BTreeMap<String, i64>>(&raw)?)
                }
            }
        }
        Ok(record)
    }

    async fn set(&self, record: MetadataRecord) -> Result<(), StoreError> {
        let mut db = lock(&self.db)?;
        let tx = db.transaction()?;
        if let Some(active_id) = &record.active_id {
            Self::write_value(&tx, MetadataKey::ActiveId, &serde_json::to_string(active_id)?)?;
        }
        if let Some(active_title) = &record.active_title {
            Self::write_value(
                &tx,
                MetadataKey::ActiveTitle,
                &serde_json::to_string(active_title)?,
            )?;
        }
        if let Some(access_times) = &record.access_times {
            Self::write_value(
                &tx,
                MetadataKey::AccessTimes,
                &serde_json::to_string(access_times)?,
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// Bookmark tree in a single `node` table.
///
/// Two root containers hold everything: the slot and the folder whose child
/// folders are the stored sets. Items are nodes with a url, sets are nodes
/// without one.
pub struct SqliteBookmarkStore {
    db: Mutex<Connection>,
    slot_id: i64,
    sets_root_id: i64,
}

impl SqliteBookmarkStore {
    pub fn open_memory(slot_title: &str, sets_root_title: &str) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, slot_title, sets_root_title)
    }

    pub fn open_file(path: &Path, slot_title: &str, sets_root_title: &str) -> Result<Self, StoreError> {
        Self::with_connection(open_connection(path)?, slot_title, sets_root_title)
    }

    pub fn open_from_config(cfg: &Config) -> Result<Self, StoreError> {
        Self::open_file(&cfg.bookmarks_db_path, &cfg.slot_title, &cfg.sets_root_title)
    }

    fn with_connection(
        db: Connection,
        slot_title: &str,
        sets_root_title: &str,
    ) -> Result<Self, StoreError> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS node (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                parent_id INTEGER,
                title TEXT NOT NULL,
                url TEXT,
                position INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_node_parent ON node(parent_id, position)",
            [],
        )?;
        let slot_id = ensure_root(&db, slot_title)?;
        let sets_root_id = ensure_root(&db, sets_root_title)?;
        Ok(Self {
            db: Mutex::new(db),
            slot_id,
            sets_root_id,
        })
    }

    pub fn slot_id(&self) -> String {
        self.slot_id.to_string()
    }

    /// Appends a bookmark to the slot or to a set; returns its id.
    pub fn insert_item(
        &self,
        destination: &Destination,
        title: &str,
        url: &str,
    ) -> Result<String, StoreError> {
        let db = lock(&self.db)?;
        let parent = self.resolve_destination(&db, destination)?;
        let position = next_position(&db, parent)?;
        db.execute(
            "INSERT INTO node (parent_id, title, url, position) VALUES (?1, ?2, ?3, ?4)",
            params![parent, title, url, position],
        )?;
        Ok(db.last_insert_rowid().to_string())
    }

    fn resolve_destination(&self, db: &Connection, destination: &Destination) -> Result<i64, StoreError> {
        match destination {
            Destination::Slot => Ok(self.slot_id),
            Destination::Set(id) => self.folder_id(db, id),
        }
    }

    /// A non-root folder; it need not live directly under the sets root.
    fn folder_id(&self, db: &Connection, id: &str) -> Result<i64, StoreError> {
        let not_found = || StoreError::NotFound(id.to_string());
        let parsed: i64 = id.parse().map_err(|_| not_found())?;
        let exists = db
            .query_row(
                "SELECT 1 FROM node WHERE id = ?1 AND url IS NULL AND parent_id IS NOT NULL",
                params![parsed],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() || parsed == self.slot_id {
            return Err(not_found());
        }
        Ok(parsed)
    }

    fn children(&self, parent: i64) -> Result<Vec<BookmarkItem>, StoreError> {
        let db = lock(&self.db)?;
        let mut stmt = db.prepare(
            "SELECT id, title, url FROM node WHERE parent_id = ?1 ORDER BY position, id",
        )?;
        let rows = stmt.query_map(params![parent], |row| {
            Ok(BookmarkItem {
                id: row.get::<_, i64>(0)?.to_string(),
                title: row.get(1)?,
                url: row.get(2)?,
            })
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

fn ensure_root(db: &Connection, title: &str) -> Result<i64, StoreError> {
    let existing = db
        .query_row(
            "SELECT id FROM node WHERE parent_id IS NULL AND lower(title) = lower(?1) ORDER BY id",
            params![title],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    db.execute(
        "INSERT INTO node (parent_id, title, url, position) VALUES (NULL, ?1, NULL, 0)",
        params![title],
    )?;
    Ok(db.last_insert_rowid())
}

fn next_position(db: &Connection, parent: i64) -> Result<i64, StoreError> {
    let position = db.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM node WHERE parent_id = ?1",
        params![parent],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(position)
}

impl BookmarkStore for SqliteBookmarkStore {
    async fn list_sets(&self) -> Result<Vec<Candidate>, StoreError> {
        let db = lock(&self.db)?;
        let mut stmt = db.prepare(
            "SELECT id, title FROM node WHERE parent_id = ?1 AND url IS NULL ORDER BY position, id",
        )?;
        let rows = stmt.query_map(params![self.sets_root_id], |row| {
            Ok(Candidate::new(
                &row.get::<_, i64>(0)?.to_string(),
                &row.get::<_, String>(1)?,
            ))
        })?;
        let mut sets = Vec::new();
        for row in rows {
            sets.push(row?);
        }
        Ok(sets)
    }

    async fn list_slot_items(&self) -> Result<Vec<BookmarkItem>, StoreError> {
        self.children(self.slot_id)
    }

    async fn list_set_items(&self, set_id: &str) -> Result<Vec<BookmarkItem>, StoreError> {
        let folder = {
            let db = lock(&self.db)?;
            self.folder_id(&db, set_id)?
        };
        self.children(folder)
    }

    async fn move_item(&self, item_id: &str, destination: &Destination) -> Result<(), StoreError> {
        let db = lock(&self.db)?;
        let parent = self.resolve_destination(&db, destination)?;
        let item: i64 = item_id
            .parse()
            .map_err(|_| StoreError::NotFound(item_id.to_string()))?;
        if item == parent || item == self.slot_id || item == self.sets_root_id {
            return Err(StoreError::Unavailable(format!(
                "cannot move {item_id} into {parent}"
            )));
        }
        let position = next_position(&db, parent)?;
        let changed = db.execute(
            "UPDATE node SET parent_id = ?1, position = ?2 WHERE id = ?3 AND parent_id IS NOT NULL",
            params![parent, position, item],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(item_id.to_string()));
        }
        Ok(())
    }

    async fn create_set(&self, title: &str) -> Result<Candidate, StoreError> {
        let db = lock(&self.db)?;
        let position = next_position(&db, self.sets_root_id)?;
        db.execute(
            "INSERT INTO node (parent_id, title, url, position) VALUES (?1, ?2, NULL, ?3)",
            params![self.sets_root_id, title, position],
        )?;
        Ok(Candidate::new(&db.last_insert_rowid().to_string(), title))
    }

    async fn get_set(&self, id: &str) -> Result<Candidate, StoreError> {
        let db = lock(&self.db)?;
        let folder = self.folder_id(&db, id)?;
        let title = db.query_row(
            "SELECT title FROM node WHERE id = ?1",
            params![folder],
            |row| row.get::<_, String>(0),
        )?;
        Ok(Candidate::new(id, &title))
    }
}
