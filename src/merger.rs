//! K-way merge of sorted batches

/* std use */
use std::cmp::Reverse;

/* crate use */

/* project use */
use crate::batch::{BatchId, Record};
use crate::config::Mode;
use crate::error;
use crate::kmer::KmerRepr;
use crate::store::{BatchSink as _, BatchStore};

/// Error number of "too many open files"
const EMFILE: i32 = 24;

/// Number of merged records between two deadline checks
const CHECK_INTERVAL: u64 = 4096;

/// Opening an input batch or creating an intermediate batch can hit the open files limit
fn too_many_open_files(error: &error::Error) -> bool {
    match error {
        error::Error::BatchRead { source, .. } | error::Error::BatchWrite { source, .. } => {
            source.raw_os_error() == Some(EMFILE)
        }
        _ => false,
    }
}

fn expired(deadline: Option<std::time::Instant>) -> error::JobResult<()> {
    match deadline {
        Some(deadline) if std::time::Instant::now() >= deadline => {
            Err(error::Error::DeadlineExceeded)
        }
        _ => Ok(()),
    }
}

struct Source<C> {
    batch: BatchId,
    cursor: C,
    read: u64,
}

/// Merge sorted batches, records with equal kmer are aggregated
struct KWayMerge<K, C> {
    sources: Vec<Source<C>>,
    heap: std::collections::BinaryHeap<Reverse<(K, usize, u64)>>,
    failed: bool,
}

impl<K, C> KWayMerge<K, C>
where
    K: KmerRepr,
    C: Iterator<Item = std::io::Result<Record<K>>>,
{
    fn open<S>(store: &S, batches: &[BatchId]) -> error::JobResult<Self>
    where
        S: BatchStore<K, Cursor = C>,
    {
        let mut merge = Self {
            sources: Vec::with_capacity(batches.len()),
            heap: std::collections::BinaryHeap::with_capacity(batches.len()),
            failed: false,
        };

        for batch in batches {
            let cursor = store
                .open(*batch)
                .map_err(|source| error::Error::BatchRead {
                    batch: *batch,
                    source,
                })?;

            merge.sources.push(Source {
                batch: *batch,
                cursor,
                read: 0,
            });
            merge.pull(merge.sources.len() - 1, None)?;
        }

        Ok(merge)
    }

    /// Read next record of a source, it must be greater than `previous`
    fn pull(&mut self, index: usize, previous: Option<&K>) -> error::JobResult<()> {
        let source = &mut self.sources[index];

        match source.cursor.next() {
            None => Ok(()),
            Some(Err(e)) => Err(error::Error::BatchRead {
                batch: source.batch,
                source: e,
            }),
            Some(Ok(record)) => {
                if previous.map_or(false, |previous| record.kmer <= *previous) {
                    return Err(error::Error::MergeCorruption {
                        batch: source.batch,
                        record: source.read,
                    });
                }

                source.read += 1;
                self.heap.push(Reverse((record.kmer, index, record.count)));

                Ok(())
            }
        }
    }

    fn merge_next(&mut self) -> error::JobResult<Option<Record<K>>> {
        let Some(Reverse((kmer, index, mut count))) = self.heap.pop() else {
            return Ok(None);
        };
        self.pull(index, Some(&kmer))?;

        while self
            .heap
            .peek()
            .map_or(false, |Reverse((next, _, _))| *next == kmer)
        {
            if let Some(Reverse((_, index, other))) = self.heap.pop() {
                count += other;
                self.pull(index, Some(&kmer))?;
            }
        }

        Ok(Some(Record::new(kmer, count)))
    }

    /// Release all cursors
    fn close(&mut self) {
        self.sources.clear();
        self.heap.clear();
    }
}

impl<K, C> Iterator for KWayMerge<K, C>
where
    K: KmerRepr,
    C: Iterator<Item = std::io::Result<Record<K>>>,
{
    type Item = error::JobResult<Record<K>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = self.merge_next();
        if result.is_err() {
            self.failed = true;
        }

        result.transpose()
    }
}

/// Merge all batches of a store in one sorted stream of distinct kmer.
///
/// When store contains more batches than fan-in, groups of batches are merged in intermediate batches
/// until a single pass is possible. Merger is the only owner of batches: they are all removed at end,
/// on success or failure.
pub struct Merger<'a, K, S> {
    store: &'a S,
    fan_in: usize,
    mode: Mode,
    deadline: Option<std::time::Instant>,
    _kmer: std::marker::PhantomData<fn() -> K>,
}

impl<'a, K, S> Merger<'a, K, S>
where
    K: KmerRepr,
    S: BatchStore<K>,
{
    /// Create a new merger, fan-in is the maximal number of batches open at same time
    pub fn new(store: &'a S, fan_in: usize, mode: Mode) -> Self {
        Self {
            store,
            fan_in: fan_in.max(2),
            mode,
            deadline: None,
            _kmer: std::marker::PhantomData,
        }
    }

    /// Abort merge after `deadline`
    pub fn with_deadline(mut self, deadline: Option<std::time::Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run reduction passes and open final stream
    pub fn merge(self) -> error::JobResult<MergeStream<'a, K, S>> {
        match self.prepare() {
            Ok(stream) => Ok(stream),
            Err(e) => {
                log::info!("Merge failed: {}", e);
                if let Err(purge) = self.store.purge() {
                    log::warn!("Cleanup of batches failed: {}", purge);
                }
                Err(e)
            }
        }
    }

    fn prepare(&self) -> error::JobResult<MergeStream<'a, K, S>> {
        let mut fan_in = self.fan_in;
        let mut passes = 0;

        loop {
            expired(self.deadline)?;

            let batches = self.store.batches();
            let outcome = if batches.len() > fan_in {
                self.reduce(&batches, fan_in).map(|_| None)
            } else {
                KWayMerge::open(self.store, &batches).map(Some)
            };

            match outcome {
                Ok(Some(merge)) => {
                    log::info!(
                        "Merge {} batches after {} reduction passes",
                        batches.len(),
                        passes
                    );

                    return Ok(MergeStream {
                        store: self.store,
                        merge,
                        batches,
                        mode: self.mode,
                        deadline: self.deadline,
                        merged: 0,
                        emitted: 0,
                        done: false,
                    });
                }
                Ok(None) => passes += 1,
                Err(e) if too_many_open_files(&e) => {
                    if fan_in / 2 < 2 {
                        return Err(error::Error::ResourceExhaustion {
                            batches: batches.len(),
                            fan_in,
                        });
                    }

                    log::warn!(
                        "Too many open files with fan-in {}, retry with {}",
                        fan_in,
                        fan_in / 2
                    );
                    fan_in /= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Merge groups of `fan_in` batches in intermediate batches
    fn reduce(&self, batches: &[BatchId], fan_in: usize) -> error::JobResult<()> {
        log::debug!(
            "Reduction pass over {} batches with fan-in {}",
            batches.len(),
            fan_in
        );

        for group in batches.chunks(fan_in).filter(|group| group.len() > 1) {
            expired(self.deadline)?;

            let merge = KWayMerge::open(self.store, group)?;
            let mut sink = self
                .store
                .create()
                .map_err(|source| error::Error::BatchWrite {
                    attempts: 1,
                    source,
                })?;

            for record in merge {
                sink.push(&record?)
                    .map_err(|source| error::Error::BatchWrite {
                        attempts: 1,
                        source,
                    })?;
            }

            let id = sink.seal().map_err(|source| error::Error::BatchWrite {
                attempts: 1,
                source,
            })?;
            log::debug!("Batches {:?} merged in batch {}", group, id);

            for batch in group {
                self.store
                    .delete(*batch)
                    .map_err(|source| error::Error::BatchDelete {
                        batch: *batch,
                        source,
                    })?;
            }
        }

        Ok(())
    }
}

/// Lazy stream of merged records, filtered by mode.
///
/// Consumed batches are deleted when stream is exhausted, fail or is dropped. Stream fuses after
/// first error.
pub struct MergeStream<'a, K, S>
where
    K: KmerRepr,
    S: BatchStore<K>,
{
    store: &'a S,
    merge: KWayMerge<K, S::Cursor>,
    batches: Vec<BatchId>,
    mode: Mode,
    deadline: Option<std::time::Instant>,
    merged: u64,
    emitted: u64,
    done: bool,
}

impl<'a, K, S> MergeStream<'a, K, S>
where
    K: KmerRepr,
    S: BatchStore<K>,
{
    /// Delete consumed batches, return first deletion error
    fn cleanup(&mut self) -> error::JobResult<()> {
        self.done = true;
        self.merge.close();

        let mut result = Ok(());
        for batch in self.batches.drain(..) {
            if let Err(source) = self.store.delete(batch) {
                log::warn!("Remove batch {} failed: {}", batch, source);
                if result.is_ok() {
                    result = Err(error::Error::BatchDelete { batch, source });
                }
            }
        }

        result
    }

    fn fail(&mut self, error: error::Error) -> Option<error::JobResult<Record<K>>> {
        log::info!("Merge failed: {}", error);
        let _ = self.cleanup();

        Some(Err(error))
    }
}

impl<'a, K, S> Iterator for MergeStream<'a, K, S>
where
    K: KmerRepr,
    S: BatchStore<K>,
{
    type Item = error::JobResult<Record<K>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.merged % CHECK_INTERVAL == 0 {
                if let Err(e) = expired(self.deadline) {
                    return self.fail(e);
                }
            }

            match self.merge.next() {
                None => {
                    log::info!(
                        "End merge: {} distinct kmers, {} emitted",
                        self.merged,
                        self.emitted
                    );
                    return self.cleanup().err().map(Err);
                }
                Some(Err(e)) => return self.fail(e),
                Some(Ok(record)) => {
                    self.merged += 1;

                    if self.mode == Mode::Uniq && record.count != 1 {
                        continue;
                    }

                    self.emitted += 1;
                    return Some(Ok(record));
                }
            }
        }
    }
}

impl<'a, K, S> Drop for MergeStream<'a, K, S>
where
    K: KmerRepr,
    S: BatchStore<K>,
{
    fn drop(&mut self) {
        if !self.done {
            log::debug!("Merge stream dropped before end");
            let _ = self.cleanup();
        }
    }
}
