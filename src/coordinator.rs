//! Dispatch tokenization of tasks to workers and wait them

/* std use */

/* crate use */

/* project use */
use crate::batch::{BatchId, BatchWriter};
use crate::config::Config;
use crate::error;
use crate::kmer::KmerRepr;
use crate::pool::WorkerPool;
use crate::store::BatchStore;
use crate::task::{SeqRecord, Task};
use crate::tokenizer::Tokenizer;

/// Number of kmer produced between two cancellation checks
const CHECK_INTERVAL: u64 = 4096;

/// Time feeder wait on a full task queue before it checks cancellation
const FEED_POLL: std::time::Duration = std::time::Duration::from_millis(10);

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const EXPIRED: u8 = 2;

/// Cancellation flag shared by feeder and workers, raised by first failure or by deadline
#[derive(Debug)]
pub struct Cancel {
    state: std::sync::atomic::AtomicU8,
    deadline: Option<std::time::Instant>,
}

impl Cancel {
    /// Create a flag, raised automatically after `timeout` if any
    pub fn new(timeout: Option<std::time::Duration>) -> Self {
        Self {
            state: std::sync::atomic::AtomicU8::new(RUNNING),
            deadline: timeout.map(|t| std::time::Instant::now() + t),
        }
    }

    /// Raise flag
    pub fn cancel(&self) {
        let _ = self.state.compare_exchange(
            RUNNING,
            CANCELLED,
            std::sync::atomic::Ordering::SeqCst,
            std::sync::atomic::Ordering::SeqCst,
        );
    }

    /// Instant after which job is cancelled
    pub fn deadline(&self) -> Option<std::time::Instant> {
        self.deadline
    }

    /// Return an error if job is cancelled or deadline is exceeded
    pub fn check(&self) -> error::JobResult<()> {
        if let Some(deadline) = self.deadline {
            if std::time::Instant::now() >= deadline {
                let _ = self.state.compare_exchange(
                    RUNNING,
                    EXPIRED,
                    std::sync::atomic::Ordering::SeqCst,
                    std::sync::atomic::Ordering::SeqCst,
                );
            }
        }

        match self.state.load(std::sync::atomic::Ordering::SeqCst) {
            RUNNING => Ok(()),
            EXPIRED => Err(error::Error::DeadlineExceeded),
            _ => Err(error::Error::Cancelled),
        }
    }
}

/// What a worker did, send back to coordinator at worker end
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Manifest {
    /// Worker identifier
    pub worker: usize,
    /// Number of tasks processed
    pub tasks: usize,
    /// Number of kmer produced
    pub windows: u64,
    /// Number of windows skipped because they contain an invalid symbol
    pub skipped: u64,
    /// Batches flushed, in flush order
    pub batches: Vec<BatchId>,
}

/// Summary of extraction phase
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExtractionReport {
    /// Number of tasks processed
    pub tasks: usize,
    /// Number of kmer produced
    pub windows: u64,
    /// Number of windows skipped
    pub skipped: u64,
    /// Every batch produced by job
    pub batches: Vec<BatchId>,
    /// Manifest of each worker, ordered by worker identifier
    pub manifests: Vec<Manifest>,
}

impl ExtractionReport {
    fn from_manifests(mut manifests: Vec<Manifest>) -> Self {
        manifests.sort_by_key(|m| m.worker);

        let mut batches = manifests
            .iter()
            .flat_map(|m| m.batches.iter().copied())
            .collect::<Vec<BatchId>>();
        batches.sort();

        Self {
            tasks: manifests.iter().map(|m| m.tasks).sum(),
            windows: manifests.iter().map(|m| m.windows).sum(),
            skipped: manifests.iter().map(|m| m.skipped).sum(),
            batches,
            manifests,
        }
    }
}

/// Run extraction phase of a job: records are split in tasks, each worker tokenize tasks and write
/// batches with its own [BatchWriter].
///
/// Fail fast: first failure cancel other workers, and every batch of job is removed from store.
pub struct Coordinator<'a, P> {
    config: &'a Config,
    pool: &'a P,
}

impl<'a, P> Coordinator<'a, P>
where
    P: WorkerPool,
{
    /// Create a new coordinator
    pub fn new(config: &'a Config, pool: &'a P) -> Self {
        Self { config, pool }
    }

    /// Tokenize all records and flush all kmers in store.
    ///
    /// Return only when every worker is finished.
    pub fn run<K, S, I>(
        &self,
        store: &S,
        records: I,
        cancel: &Cancel,
    ) -> error::JobResult<ExtractionReport>
    where
        K: KmerRepr,
        S: BatchStore<K>,
        I: IntoIterator<Item = std::io::Result<SeqRecord>>,
    {
        let workers = self.config.workers();

        let (task_sender, task_receiver) = crossbeam_channel::bounded::<Task>(2 * workers);
        let (outcome_sender, outcome_receiver) =
            crossbeam_channel::unbounded::<error::JobResult<Manifest>>();

        let mut feed_outcome = Ok(());

        log::info!("Start extraction with {} workers", workers);
        self.pool.run(
            workers,
            |worker| {
                let outcome = self.work::<K, S>(worker, store, task_receiver.clone(), cancel);

                if outcome.is_err() {
                    cancel.cancel();
                }

                let _ = outcome_sender.send(outcome);
            },
            || {
                feed_outcome = self.feed(records, task_sender, cancel);
                if feed_outcome.is_err() {
                    cancel.cancel();
                }
            },
        );
        drop(outcome_sender);

        let mut manifests = Vec::with_capacity(workers);
        let mut failure: Option<error::Error> = None;
        for outcome in outcome_receiver {
            match outcome {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => failure = Some(prevail(failure, e)),
            }
        }
        if let Err(e) = feed_outcome {
            failure = Some(prevail(failure, e));
        }

        if let Some(e) = failure {
            log::info!("Extraction failed: {}", e);
            if let Err(purge) = store.purge() {
                log::warn!("Cleanup of batches failed: {}", purge);
            }
            return Err(e);
        }

        let report = ExtractionReport::from_manifests(manifests);
        log::info!(
            "End extraction: {} tasks, {} kmers, {} skipped windows, {} batches",
            report.tasks,
            report.windows,
            report.skipped,
            report.batches.len()
        );

        Ok(report)
    }

    fn feed<I>(
        &self,
        records: I,
        tasks: crossbeam_channel::Sender<Task>,
        cancel: &Cancel,
    ) -> error::JobResult<()>
    where
        I: IntoIterator<Item = std::io::Result<SeqRecord>>,
    {
        let mut next_id = 0;

        for record in records {
            cancel.check()?;
            let record = record.map_err(error::Error::Source)?;

            for mut task in Task::shards(
                record,
                self.config.kmer_size(),
                self.config.shard_size(),
                next_id,
            ) {
                next_id += 1;

                loop {
                    match tasks.send_timeout(task, FEED_POLL) {
                        Ok(()) => break,
                        Err(crossbeam_channel::SendTimeoutError::Timeout(back)) => {
                            cancel.check()?;
                            task = back;
                        }
                        Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                            return Err(error::Error::Cancelled)
                        }
                    }
                }
            }
        }

        log::debug!("{} tasks dispatched", next_id);

        Ok(())
    }

    fn work<K, S>(
        &self,
        worker: usize,
        store: &S,
        tasks: crossbeam_channel::Receiver<Task>,
        cancel: &Cancel,
    ) -> error::JobResult<Manifest>
    where
        K: KmerRepr,
        S: BatchStore<K>,
    {
        let mut writer = BatchWriter::new(
            store,
            self.config
                .batch_size()
                .records::<K>(self.config.kmer_size()),
            self.config.max_retries(),
        );
        let mut manifest = Manifest {
            worker,
            ..Default::default()
        };

        loop {
            cancel.check()?;

            // queue is closed and empty
            let Ok(task) = tasks.recv() else { break };

            self.tokenize(&task, &mut writer, &mut manifest, cancel)
                .map_err(|e| failure(worker, Some(task.id), e))?;
        }

        cancel.check()?;
        writer.flush().map_err(|e| failure(worker, None, e))?;
        manifest.batches = writer.into_batches();

        log::debug!(
            "Worker {} end: {} tasks, {} batches",
            worker,
            manifest.tasks,
            manifest.batches.len()
        );

        Ok(manifest)
    }

    fn tokenize<K, S>(
        &self,
        task: &Task,
        writer: &mut BatchWriter<K, S>,
        manifest: &mut Manifest,
        cancel: &Cancel,
    ) -> error::JobResult<()>
    where
        K: KmerRepr,
        S: BatchStore<K>,
    {
        let mut tokenizer = Tokenizer::<K>::new(
            &task.sequence,
            self.config.kmer_size(),
            self.config.canonical(),
            self.config.alphabet(),
            self.config.policy(),
        )
        .map_err(|e| match e {
            error::Error::InvalidSequence { position, symbol } => error::Error::InvalidSequence {
                position: position + task.offset,
                symbol,
            },
            e => e,
        })?;

        let mut produced: u64 = 0;
        for kmer in tokenizer.by_ref() {
            writer.add(kmer)?;

            produced += 1;
            if produced % CHECK_INTERVAL == 0 {
                cancel.check()?;
            }
        }

        manifest.tasks += 1;
        manifest.windows += tokenizer.valid();
        manifest.skipped += tokenizer.skipped();

        log::trace!(
            "Task {} ({} at {}) produce {} kmers",
            task.id,
            task.name,
            task.offset,
            tokenizer.valid()
        );

        Ok(())
    }
}

/// Keep first real failure, cancellation is only a consequence of another failure
fn prevail(current: Option<error::Error>, new: error::Error) -> error::Error {
    match current {
        None | Some(error::Error::Cancelled) => new,
        Some(current) => current,
    }
}

/// Wrap error of a worker, cancellation isn't a worker failure
fn failure(worker: usize, task: Option<usize>, error: error::Error) -> error::Error {
    match error {
        error::Error::Cancelled | error::Error::DeadlineExceeded => error,
        source => error::Error::WorkerFailure {
            worker,
            task,
            source: Box::new(source),
        },
    }
}
