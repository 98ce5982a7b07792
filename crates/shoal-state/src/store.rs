//! StateStore: redb-backed application snapshots.
//!
//! The scheduler writes a full snapshot of an application after every
//! accepted mutation, before any work is dispatched to the executor. All
//! values are JSON-serialized into redb's `&[u8]` value columns. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::APPLICATIONS;
use crate::types::Application;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe snapshot store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or replace the snapshot of an application.
    pub fn put_application(&self, app: &Application) -> StateResult<()> {
        let value = serde_json::to_vec(app).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
            table
                .insert(app.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(app = %app.id, status = %app.op_status, "snapshot stored");
        Ok(())
    }

    pub fn get_application(&self, id: &str) -> StateResult<Option<Application>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let app: Application =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(app))
            }
            None => Ok(None),
        }
    }

    /// List every stored snapshot.
    pub fn list_applications(&self) -> StateResult<Vec<Application>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let app: Application =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(app);
        }
        Ok(results)
    }

    /// Remove a snapshot and return the last state it recorded.
    ///
    /// The read and the delete share one write transaction, so the
    /// returned snapshot is exactly the one that was dropped even when a
    /// concurrent writer raced the removal.
    pub fn take_application(&self, id: &str) -> StateResult<Option<Application>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let taken = {
            let mut table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
            let removed = table.remove(id).map_err(map_err!(Write))?;
            match removed {
                Some(guard) => Some(
                    serde_json::from_slice::<Application>(guard.value())
                        .map_err(map_err!(Deserialize))?,
                ),
                None => None,
            }
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(app = %id, found = taken.is_some(), "snapshot taken");
        Ok(taken)
    }
}
