//! A persistent adapter using `sled`.

use std::marker::PhantomData;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::instrument;

use crate::{
    Error, Event, Metadata, Result, StoredEvent, StreamName,
    adapter::{Adapter, AppendCondition, select},
};

/// A persistent, thread-safe adapter using `sled`.
///
/// Every stream lives in its own `sled::Tree`. Keys are ids from
/// `sled::Db::generate_id` in big-endian form, so iterating a tree yields
/// events in append order. Batches are written with `apply_batch`, which is
/// atomic. Reading a stream that was never written leaves the database
/// unchanged.
pub struct SledAdapter<E: Event> {
    db: sled::Db,
    // sled has no transactional scans, so condition check and write are
    // serialized in-process.
    write_lock: Mutex<()>,
    _phantom: PhantomData<E>,
}

impl<E: Event> SledAdapter<E> {
    /// Creates a new `SledAdapter`.
    pub fn new(db: sled::Db) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
            _phantom: PhantomData,
        }
    }

    fn tree_name(stream: &StreamName) -> String {
        format!("stream/{stream}")
    }

    fn tree(&self, stream: &StreamName) -> Result<sled::Tree> {
        self.db
            .open_tree(Self::tree_name(stream))
            .map_err(|e| Error::Store(e.to_string()))
    }

    /// Opens the tree of `stream` only if it was written before, since
    /// `open_tree` would create it.
    fn existing_tree(&self, stream: &StreamName) -> Result<Option<sled::Tree>> {
        let name = Self::tree_name(stream);
        if !self
            .db
            .tree_names()
            .iter()
            .any(|existing| &existing[..] == name.as_bytes())
        {
            return Ok(None);
        }
        self.tree(stream).map(Some)
    }

    fn load_all(tree: &sled::Tree) -> Result<Vec<StoredEvent<E>>> {
        tree.iter()
            .map(|res| {
                let (_, v) = res.map_err(|e| Error::Store(e.to_string()))?;
                serde_json::from_slice(&v).map_err(|e| Error::Store(e.to_string()))
            })
            .collect()
    }

    fn write(&self, tree: &sled::Tree, events: &[StoredEvent<E>]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for event in events {
            let key = self
                .db
                .generate_id()
                .map_err(|e| Error::Store(e.to_string()))?;
            let value = serde_json::to_vec(event).map_err(|e| Error::Store(e.to_string()))?;
            batch.insert(key.to_be_bytes().to_vec(), value);
        }
        tree.apply_batch(batch)
            .map_err(|e| Error::Store(e.to_string()))?;
        tree.flush().map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl<E: Event> Adapter<E> for SledAdapter<E> {
    #[instrument(skip(self, events), fields(stream = %stream, count = events.len()))]
    async fn create(&self, stream: &StreamName, events: Vec<StoredEvent<E>>) -> Result<()> {
        let _guard = self.write_lock.lock();
        let tree = self.tree(stream)?;
        if !tree.is_empty() {
            return Err(Error::StreamAlreadyExists(stream.to_string()));
        }
        self.write(&tree, &events)
    }

    #[instrument(skip(self, events, condition), fields(stream = %stream, count = events.len()))]
    async fn append(
        &self,
        stream: &StreamName,
        events: Vec<StoredEvent<E>>,
        condition: &AppendCondition,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();
        let tree = self.tree(stream)?;
        condition.check(Self::load_all(&tree)?.iter())?;
        self.write(&tree, &events)
    }

    #[instrument(skip(self, filter), fields(stream = %stream))]
    async fn read_by_metadata(
        &self,
        stream: &StreamName,
        filter: &Metadata,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<E>>> {
        match self.existing_tree(stream)? {
            Some(tree) => Ok(select(&Self::load_all(&tree)?, filter, min_version)),
            None => Ok(Vec::new()),
        }
    }
}
