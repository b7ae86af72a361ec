//! Sorted batch of kmer records and writer that produce them

/* std use */

/* crate use */

/* project use */
use crate::error;
use crate::kmer::KmerRepr;
use crate::store::BatchStore;

/// Identifier of a batch in a store, identifiers grow with registration order
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct BatchId(pub u64);

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A kmer and its number of occurrence
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Record<K> {
    /// Kmer
    pub kmer: K,
    /// Number of occurrence, always greater than zero
    pub count: u64,
}

impl<K> Record<K> {
    /// Create a new record
    pub fn new(kmer: K, count: u64) -> Self {
        Self { kmer, count }
    }
}

/// Records strictly sorted by kmer
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Batch<K> {
    records: Vec<Record<K>>,
}

impl<K> Batch<K>
where
    K: KmerRepr,
{
    /// Sort kmers and merge equal ones in records, `kmers` is left empty
    pub fn from_unsorted(kmers: &mut Vec<K>) -> Self {
        kmers.sort_unstable();

        let mut records: Vec<Record<K>> = Vec::new();
        for kmer in kmers.drain(..) {
            match records.last_mut() {
                Some(last) if last.kmer == kmer => last.count += 1,
                _ => records.push(Record::new(kmer, 1)),
            }
        }

        Self { records }
    }

    /// Get records
    pub fn records(&self) -> &[Record<K>] {
        &self.records
    }

    /// Sum of record count
    pub fn total(&self) -> u64 {
        self.records.iter().map(|r| r.count).sum()
    }
}

/// Buffer kmer of one worker and flush them as batch in store
pub struct BatchWriter<'a, K, S> {
    store: &'a S,
    buffer: Vec<K>,
    capacity: usize,
    max_retries: usize,
    batches: Vec<BatchId>,
}

impl<'a, K, S> BatchWriter<'a, K, S>
where
    K: KmerRepr,
    S: BatchStore<K>,
{
    /// Create a writer that flush each `capacity` kmer, a failed flush is retried `max_retries` times
    pub fn new(store: &'a S, capacity: usize, max_retries: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            store,
            buffer: Vec::with_capacity(capacity.min(1 << 16)),
            capacity,
            max_retries,
            batches: Vec::new(),
        }
    }

    /// Buffer a kmer, flush if buffer is full
    pub fn add(&mut self, kmer: K) -> error::JobResult<()> {
        self.buffer.push(kmer);

        if self.buffer.len() >= self.capacity {
            self.flush()?;
        }

        Ok(())
    }

    /// Sort buffered kmers, aggregate them and write a batch in store, do nothing if buffer is empty
    pub fn flush(&mut self) -> error::JobResult<Option<BatchId>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let batch = Batch::from_unsorted(&mut self.buffer);

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.store.register(&batch) {
                Ok(id) => {
                    log::debug!(
                        "Flush batch {} with {} records ({} kmers)",
                        id,
                        batch.records().len(),
                        batch.total()
                    );
                    self.batches.push(id);
                    return Ok(Some(id));
                }
                Err(e) if attempts <= self.max_retries => {
                    log::warn!("Flush attempt {} failed: {}, retry", attempts, e);
                }
                Err(source) => return Err(error::Error::BatchWrite { attempts, source }),
            }
        }
    }

    /// Get batches write by this writer, buffered kmers are dropped
    pub fn into_batches(self) -> Vec<BatchId> {
        self.batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::testing::FlakyStore;
    use crate::store::MemoryStore;
    use crate::Kmer;

    fn kmers(raw: &[&[u8]]) -> Vec<Kmer> {
        raw.iter().map(|k| k.to_vec()).collect()
    }

    fn read<S>(store: &S, id: BatchId) -> Vec<Record<Kmer>>
    where
        S: BatchStore<Kmer>,
    {
        store
            .open(id)
            .unwrap()
            .collect::<std::io::Result<Vec<Record<Kmer>>>>()
            .unwrap()
    }

    #[test]
    fn from_unsorted() {
        let mut buffer = kmers(&[b"CGT", b"ACG", b"TAC", b"CGT", b"ACG", b"GTA"]);

        let batch = Batch::from_unsorted(&mut buffer);

        assert!(buffer.is_empty());
        assert_eq!(
            batch.records(),
            &[
                Record::new(b"ACG".to_vec(), 2),
                Record::new(b"CGT".to_vec(), 2),
                Record::new(b"GTA".to_vec(), 1),
                Record::new(b"TAC".to_vec(), 1),
            ]
        );
        assert_eq!(batch.total(), 6);
    }

    #[test]
    fn auto_flush() -> error::Result<()> {
        let store: MemoryStore<Kmer> = MemoryStore::new();
        let mut writer = BatchWriter::new(&store, 3, 0);

        for kmer in kmers(&[b"TTT", b"AAA", b"TTT", b"CCC", b"AAA"]) {
            writer.add(kmer)?;
        }

        assert_eq!(store.batches(), vec![BatchId(0)]);

        assert_eq!(writer.flush()?, Some(BatchId(1)));
        assert_eq!(writer.flush()?, None);

        let batches = writer.into_batches();
        assert_eq!(batches, vec![BatchId(0), BatchId(1)]);

        assert_eq!(
            read(&store, batches[0]),
            vec![
                Record::new(b"AAA".to_vec(), 1),
                Record::new(b"TTT".to_vec(), 2)
            ]
        );
        assert_eq!(
            read(&store, batches[1]),
            vec![
                Record::new(b"AAA".to_vec(), 1),
                Record::new(b"CCC".to_vec(), 1)
            ]
        );

        Ok(())
    }

    #[test]
    fn retry() -> error::Result<()> {
        let store = FlakyStore::new(MemoryStore::<Kmer>::new(), 0, 2);
        let mut writer = BatchWriter::new(&store, 10, 2);

        writer.add(b"ACG".to_vec())?;
        assert_eq!(writer.flush()?, Some(BatchId(0)));
        assert_eq!(BatchStore::<Kmer>::len(&store), 1);

        Ok(())
    }

    #[test]
    fn retry_exhausted() {
        let store = FlakyStore::new(MemoryStore::<Kmer>::new(), 0, 3);
        let mut writer = BatchWriter::new(&store, 10, 2);

        writer.add(b"ACG".to_vec()).unwrap();
        match writer.flush() {
            Err(error::Error::BatchWrite { attempts: 3, .. }) => (),
            _ => panic!("BatchWriter::flush should generate an error::Error::BatchWrite"),
        }
        assert!(BatchStore::<Kmer>::is_empty(&store));
    }
}
