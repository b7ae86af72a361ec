//! Store batches in files of a temporary directory.
//!
//! A batch file contains:
//! - magic `KMB1`
//! - batch identifier, u64 little endian
//! - number of records, u64 little endian
//! - records: encoded kmer followed by count as u64 little endian
//!
//! Directory and remaining batches are removed when store is dropped.

/* std use */
use std::io::Seek as _;
use std::io::Write as _;

/* crate use */
use atomic_counter::AtomicCounter as _;

/* project use */
use crate::batch::{BatchId, Record};
use crate::kmer::KmerRepr;
use crate::store::{lock, missing, BatchSink, BatchStore};

const MAGIC: &[u8; 4] = b"KMB1";

struct Registry {
    next: u64,
    batches: std::collections::BTreeMap<BatchId, std::path::PathBuf>,
}

struct Shared {
    dir: tempfile::TempDir,
    kmer_size: usize,
    pending: atomic_counter::RelaxedCounter,
    registry: std::sync::Mutex<Registry>,
}

/// Batch store backed by files
pub struct FileStore<K> {
    shared: std::sync::Arc<Shared>,
    _kmer: std::marker::PhantomData<fn() -> K>,
}

impl<K> FileStore<K>
where
    K: KmerRepr,
{
    /// Create a store in system temporary directory
    pub fn new(kmer_size: usize) -> std::io::Result<Self> {
        Self::with_dir(tempfile::Builder::new().prefix("kmanBatch").tempdir()?, kmer_size)
    }

    /// Create a store in a temporary directory under `parent`
    pub fn in_dir<P>(parent: P, kmer_size: usize) -> std::io::Result<Self>
    where
        P: AsRef<std::path::Path>,
    {
        Self::with_dir(
            tempfile::Builder::new()
                .prefix("kmanBatch")
                .tempdir_in(parent)?,
            kmer_size,
        )
    }

    fn with_dir(dir: tempfile::TempDir, kmer_size: usize) -> std::io::Result<Self> {
        log::debug!("Batch directory {}", dir.path().display());

        Ok(Self {
            shared: std::sync::Arc::new(Shared {
                dir,
                kmer_size,
                pending: atomic_counter::RelaxedCounter::new(0),
                registry: std::sync::Mutex::new(Registry {
                    next: 0,
                    batches: std::collections::BTreeMap::new(),
                }),
            }),
            _kmer: std::marker::PhantomData,
        })
    }

    /// Directory where batches are written
    pub fn path(&self) -> &std::path::Path {
        self.shared.dir.path()
    }
}

/// Sink of [FileStore]
pub struct FileSink<K> {
    shared: std::sync::Arc<Shared>,
    writer: Option<std::io::BufWriter<std::fs::File>>,
    path: std::path::PathBuf,
    records: u64,
    _kmer: std::marker::PhantomData<fn() -> K>,
}

impl<K> BatchSink<K> for FileSink<K>
where
    K: KmerRepr,
{
    fn push(&mut self, record: &Record<K>) -> std::io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "batch is already sealed")
        })?;

        record.kmer.encode(self.shared.kmer_size, writer)?;
        writer.write_all(&record.count.to_le_bytes())?;
        self.records += 1;

        Ok(())
    }

    fn seal(mut self) -> std::io::Result<BatchId> {
        let writer = self.writer.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "batch is already sealed")
        })?;
        let mut file = writer.into_inner().map_err(|e| e.into_error())?;

        let id = {
            let mut registry = lock(&self.shared.registry);
            registry.next += 1;
            BatchId(registry.next - 1)
        };

        file.seek(std::io::SeekFrom::Start(MAGIC.len() as u64))?;
        file.write_all(&id.0.to_le_bytes())?;
        file.write_all(&self.records.to_le_bytes())?;
        file.flush()?;
        drop(file);

        let path = self.shared.dir.path().join(format!("batch_{}.bin", id.0));
        std::fs::rename(&self.path, &path)?;

        // registry is ordered by identifier, a late insert keep its rank
        lock(&self.shared.registry).batches.insert(id, path);

        Ok(id)
    }
}

impl<K> Drop for FileSink<K> {
    fn drop(&mut self) {
        // unsealed batch, or seal failed before rename
        if self.path.exists() {
            self.writer.take();
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::warn!("Remove partial batch {} failed: {}", self.path.display(), e);
            }
        }
    }
}

/// Cursor of [FileStore]
pub struct FileCursor<K> {
    reader: std::io::BufReader<std::fs::File>,
    kmer_size: usize,
    remaining: u64,
    _kmer: std::marker::PhantomData<fn() -> K>,
}

impl<K> FileCursor<K> {
    fn read_u64(&mut self) -> std::io::Result<u64> {
        let mut buffer = [0; 8];
        std::io::Read::read_exact(&mut self.reader, &mut buffer)?;

        Ok(u64::from_le_bytes(buffer))
    }
}

impl<K> Iterator for FileCursor<K>
where
    K: KmerRepr,
{
    type Item = std::io::Result<Record<K>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let record = K::decode(self.kmer_size, &mut self.reader)
            .and_then(|kmer| Ok(Record::new(kmer, self.read_u64()?)));

        if record.is_err() {
            self.remaining = 0;
        }

        Some(record)
    }
}

impl<K> BatchStore<K> for FileStore<K>
where
    K: KmerRepr,
{
    type Sink = FileSink<K>;
    type Cursor = FileCursor<K>;

    fn create(&self) -> std::io::Result<Self::Sink> {
        let path = self
            .shared
            .dir
            .path()
            .join(format!("pending_{}.tmp", self.shared.pending.inc()));

        let mut sink = FileSink {
            shared: self.shared.clone(),
            writer: Some(std::io::BufWriter::new(std::fs::File::create(&path)?)),
            path,
            records: 0,
            _kmer: std::marker::PhantomData,
        };

        if let Some(writer) = sink.writer.as_mut() {
            // placeholder of identifier and number of records
            writer.write_all(MAGIC)?;
            writer.write_all(&[0; 16])?;
        }

        Ok(sink)
    }

    fn batches(&self) -> Vec<BatchId> {
        lock(&self.shared.registry)
            .batches
            .keys()
            .copied()
            .collect()
    }

    fn open(&self, batch: BatchId) -> std::io::Result<Self::Cursor> {
        let path = lock(&self.shared.registry)
            .batches
            .get(&batch)
            .cloned()
            .ok_or_else(|| missing(batch))?;

        let mut cursor = FileCursor {
            reader: std::io::BufReader::new(std::fs::File::open(path)?),
            kmer_size: self.shared.kmer_size,
            remaining: 0,
            _kmer: std::marker::PhantomData,
        };

        let mut magic = [0; 4];
        std::io::Read::read_exact(&mut cursor.reader, &mut magic)?;
        if &magic != MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("batch {} has a bad magic number", batch),
            ));
        }

        if cursor.read_u64()? != batch.0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("batch {} file contains another batch", batch),
            ));
        }

        cursor.remaining = cursor.read_u64()?;

        Ok(cursor)
    }

    fn kmer_size(&self) -> Option<usize> {
        Some(self.shared.kmer_size)
    }

    fn delete(&self, batch: BatchId) -> std::io::Result<()> {
        let path = lock(&self.shared.registry)
            .batches
            .remove(&batch)
            .ok_or_else(|| missing(batch))?;

        std::fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::batch::Batch;
    use crate::kmer::PackedKmer;
    use crate::Kmer;

    fn records<K, S>(store: &S, batch: BatchId) -> std::io::Result<Vec<Record<K>>>
    where
        K: KmerRepr,
        S: BatchStore<K>,
    {
        store.open(batch)?.collect()
    }

    #[test]
    fn register_read_delete() -> std::io::Result<()> {
        let store: FileStore<Kmer> = FileStore::new(3)?;

        let mut kmers = vec![b"TAC".to_vec(), b"ACG".to_vec(), b"ACG".to_vec()];
        let batch = Batch::from_unsorted(&mut kmers);

        let id = store.register(&batch)?;
        assert_eq!(id, BatchId(0));
        assert!(store.path().join("batch_0.bin").exists());

        assert_eq!(records(&store, id)?, batch.records().to_vec());

        store.delete(id)?;
        assert!(!store.path().join("batch_0.bin").exists());
        assert!(store.is_empty());
        assert!(store.open(id).is_err());

        Ok(())
    }

    #[test]
    fn packed() -> std::io::Result<()> {
        let store: FileStore<PackedKmer> = FileStore::new(5)?;

        let mut kmers = vec![
            PackedKmer::from_window(b"GATTA"),
            PackedKmer::from_window(b"ACGTA"),
        ];
        let batch = Batch::from_unsorted(&mut kmers);
        let id = store.register(&batch)?;

        assert_eq!(records(&store, id)?, batch.records().to_vec());

        Ok(())
    }

    #[test]
    fn registration_order() -> std::io::Result<()> {
        let store: FileStore<Kmer> = FileStore::new(2)?;

        let first = store.create()?;
        let mut second = store.create()?;
        second.push(&Record::new(b"AC".to_vec(), 4))?;

        assert_eq!(second.seal()?, BatchId(0));
        assert_eq!(first.seal()?, BatchId(1));
        assert_eq!(store.batches(), vec![BatchId(0), BatchId(1)]);
        assert_eq!(records(&store, BatchId(1))?, vec![]);

        Ok(())
    }

    #[test]
    fn concurrent_seal() -> std::io::Result<()> {
        let store: FileStore<Kmer> = FileStore::new(2)?;

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        let mut sink = store.create().unwrap();
                        sink.push(&Record::new(b"AC".to_vec(), 1)).unwrap();
                        sink.seal().unwrap();
                    }
                });
            }
        });

        assert_eq!(store.batches(), (0..40).map(BatchId).collect::<Vec<BatchId>>());
        for id in store.batches() {
            assert_eq!(records(&store, id)?, vec![Record::new(b"AC".to_vec(), 1)]);
        }

        Ok(())
    }

    #[test]
    fn dropped_sink_leave_no_file() -> std::io::Result<()> {
        let store: FileStore<Kmer> = FileStore::new(2)?;

        let mut sink = store.create()?;
        sink.push(&Record::new(b"AC".to_vec(), 1))?;
        drop(sink);

        assert!(store.is_empty());
        assert_eq!(std::fs::read_dir(store.path())?.count(), 0);

        Ok(())
    }

    #[test]
    fn push_kmer_of_other_size() -> std::io::Result<()> {
        let store: FileStore<Kmer> = FileStore::new(2)?;
        assert_eq!(store.kmer_size(), Some(2));

        let mut sink = store.create()?;
        let result = sink.push(&Record::new(b"ACG".to_vec(), 1));
        assert_eq!(
            result.map_err(|e| e.kind()),
            Err(std::io::ErrorKind::InvalidInput)
        );
        drop(sink);

        assert!(store.is_empty());
        assert_eq!(std::fs::read_dir(store.path())?.count(), 0);

        Ok(())
    }

    #[test]
    fn truncated_batch() -> std::io::Result<()> {
        let store: FileStore<Kmer> = FileStore::new(2)?;

        let mut sink = store.create()?;
        sink.push(&Record::new(b"AC".to_vec(), 1))?;
        sink.push(&Record::new(b"GT".to_vec(), 1))?;
        let id = sink.seal()?;

        let path = store.path().join("batch_0.bin");
        let length = std::fs::metadata(&path)?.len();
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)?
            .set_len(length - 4)?;

        let result = records(&store, id);
        assert!(result.is_err());

        Ok(())
    }

    #[test]
    fn remove_directory_on_drop() -> std::io::Result<()> {
        let parent = tempfile::tempdir()?;

        let store: FileStore<Kmer> = FileStore::in_dir(parent.path(), 2)?;
        let path = store.path().to_path_buf();
        let mut sink = store.create()?;
        sink.push(&Record::new(b"AC".to_vec(), 1))?;
        sink.seal()?;

        assert!(path.exists());
        drop(store);
        assert!(!path.exists());

        Ok(())
    }
}
