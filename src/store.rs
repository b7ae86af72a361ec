//! Registry of immutable sorted batches

/* std use */

/* crate use */

/* project use */
use crate::batch::{Batch, BatchId, Record};
use crate::kmer::KmerRepr;

/// Lock a mutex, a poisoned lock is still usable because registry update are atomic
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Receive records of a batch before registration.
///
/// Records must be pushed in strictly increasing kmer order. A sink dropped without
/// [BatchSink::seal] leaves nothing in store.
pub trait BatchSink<K>: Send
where
    K: KmerRepr,
{
    /// Append a record to batch
    fn push(&mut self, record: &Record<K>) -> std::io::Result<()>;

    /// Make batch immutable and register it
    fn seal(self) -> std::io::Result<BatchId>;
}

/// Append-only registry of batches, readable in registration order
pub trait BatchStore<K>: Send + Sync
where
    K: KmerRepr,
{
    /// Sink type
    type Sink: BatchSink<K>;

    /// Read cursor type
    type Cursor: Iterator<Item = std::io::Result<Record<K>>> + Send;

    /// Start a new batch
    fn create(&self) -> std::io::Result<Self::Sink>;

    /// Write and register a batch
    fn register(&self, batch: &Batch<K>) -> std::io::Result<BatchId> {
        let mut sink = self.create()?;
        for record in batch.records() {
            sink.push(record)?;
        }

        sink.seal()
    }

    /// Identifiers of registered batches, in registration order
    fn batches(&self) -> Vec<BatchId>;

    /// Open a cursor on a batch
    fn open(&self, batch: BatchId) -> std::io::Result<Self::Cursor>;

    /// Remove a batch
    fn delete(&self, batch: BatchId) -> std::io::Result<()>;

    /// Kmer size batches are encoded with, none if store keeps kmer as is
    fn kmer_size(&self) -> Option<usize> {
        None
    }

    /// Number of registered batches
    fn len(&self) -> usize {
        self.batches().len()
    }

    /// Return true if store contains no batch
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all batches, every deletion is tried even if one fails
    fn purge(&self) -> std::io::Result<()> {
        let mut result = Ok(());
        for batch in self.batches() {
            if let Err(e) = self.delete(batch) {
                log::warn!("Remove batch {} failed: {}", batch, e);
                result = Err(e);
            }
        }

        result
    }
}

struct Registry<K> {
    next: u64,
    batches: std::collections::BTreeMap<BatchId, std::sync::Arc<Vec<Record<K>>>>,
}

/// Store batches in memory
pub struct MemoryStore<K> {
    registry: std::sync::Arc<std::sync::Mutex<Registry<K>>>,
}

impl<K> MemoryStore<K> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            registry: std::sync::Arc::new(std::sync::Mutex::new(Registry {
                next: 0,
                batches: std::collections::BTreeMap::new(),
            })),
        }
    }
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink of [MemoryStore]
pub struct MemorySink<K> {
    records: Vec<Record<K>>,
    registry: std::sync::Arc<std::sync::Mutex<Registry<K>>>,
}

impl<K> BatchSink<K> for MemorySink<K>
where
    K: KmerRepr,
{
    fn push(&mut self, record: &Record<K>) -> std::io::Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn seal(self) -> std::io::Result<BatchId> {
        let mut registry = lock(&self.registry);

        let id = BatchId(registry.next);
        registry.next += 1;
        registry
            .batches
            .insert(id, std::sync::Arc::new(self.records));

        Ok(id)
    }
}

/// Cursor of [MemoryStore]
pub struct MemoryCursor<K> {
    records: std::sync::Arc<Vec<Record<K>>>,
    position: usize,
}

impl<K> Iterator for MemoryCursor<K>
where
    K: Clone,
{
    type Item = std::io::Result<Record<K>>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.get(self.position)?.clone();
        self.position += 1;

        Some(Ok(record))
    }
}

impl<K> BatchStore<K> for MemoryStore<K>
where
    K: KmerRepr,
{
    type Sink = MemorySink<K>;
    type Cursor = MemoryCursor<K>;

    fn create(&self) -> std::io::Result<Self::Sink> {
        Ok(MemorySink {
            records: Vec::new(),
            registry: self.registry.clone(),
        })
    }

    fn batches(&self) -> Vec<BatchId> {
        lock(&self.registry).batches.keys().copied().collect()
    }

    fn open(&self, batch: BatchId) -> std::io::Result<Self::Cursor> {
        let records = lock(&self.registry)
            .batches
            .get(&batch)
            .cloned()
            .ok_or_else(|| missing(batch))?;

        Ok(MemoryCursor {
            records,
            position: 0,
        })
    }

    fn delete(&self, batch: BatchId) -> std::io::Result<()> {
        lock(&self.registry)
            .batches
            .remove(&batch)
            .map(|_| ())
            .ok_or_else(|| missing(batch))
    }
}

/// Error return when a batch isn't in store
pub(crate) fn missing(batch: BatchId) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("batch {} isn't in store", batch),
    )
}
