//! Error struct of project kman

/* std use */

/* crate use */
use anyhow;
use thiserror;

/* project use */
use crate::batch::BatchId;

/// Enum to manage error
#[derive(std::fmt::Debug, thiserror::Error)]
pub enum Error {
    /// Sequence contains a symbol outside of configured alphabet
    #[error("Invalid symbol '{}' at position {position}", char::from(*symbol))]
    InvalidSequence {
        /// Position of the symbol in the task sequence
        position: usize,
        /// Offending symbol
        symbol: u8,
    },

    /// Persist a batch failed
    #[error("Write batch failed after {attempts} attempt(s): {source}")]
    BatchWrite {
        /// Number of flush attempts
        attempts: usize,
        /// Last io error
        source: std::io::Error,
    },

    /// Read a batch failed
    #[error("Read batch {batch} failed: {source}")]
    BatchRead {
        /// Batch identifier
        batch: BatchId,
        /// Io error
        source: std::io::Error,
    },

    /// Delete a batch failed
    #[error("Delete batch {batch} failed: {source}")]
    BatchDelete {
        /// Batch identifier
        batch: BatchId,
        /// Io error
        source: std::io::Error,
    },

    /// A worker failed irrecoverably
    #[error("Worker {worker} failed on task {}: {source}", task.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()))]
    WorkerFailure {
        /// Worker identifier
        worker: usize,
        /// Task processed when failure occur, none if failure occur outside of a task
        task: Option<usize>,
        /// Original error
        source: Box<Error>,
    },

    /// A batch isn't strictly sorted
    #[error("Batch {batch} isn't strictly sorted, record {record} is not greater than previous one")]
    MergeCorruption {
        /// Batch identifier
        batch: BatchId,
        /// Index of the faulty record in batch
        record: u64,
    },

    /// Merge can't open enough batches, even after fan-in reduction
    #[error("Can't merge {batches} batches, open batch limit fall to {fan_in}")]
    ResourceExhaustion {
        /// Number of batches to merge
        batches: usize,
        /// Last fan-in tried
        fan_in: usize,
    },

    /// Job was cancelled by another failure
    #[error("Job cancelled")]
    Cancelled,

    /// Job didn't finish before deadline
    #[error("Job deadline exceeded")]
    DeadlineExceeded,

    /// Sequence source failed
    #[error("Read input sequence failed: {0}")]
    Source(#[source] std::io::Error),

    /// Configuration is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Kmer representation can't handle configuration
    #[error("Kmer encoding {encoding} can't represent kmer of size {kmer_size} with alphabet {alphabet}")]
    UnsupportedEncoding {
        /// Name of kmer representation
        encoding: &'static str,
        /// Kmer size
        kmer_size: usize,
        /// Alphabet name
        alphabet: crate::kmer::Alphabet,
    },

    /// A non-zero abundance would be overwritten
    #[error("Abundance of {reference}:{strand} at position {position} is already set")]
    AbundanceOverwrite {
        /// Reference name
        reference: String,
        /// Reference strand
        strand: crate::abundance::Strand,
        /// Position on reference strand
        position: usize,
    },

    /// Two references share a name
    #[error("Reference {0} is present twice")]
    DuplicateReference(String),

    /// Worker thread pool can't be build
    #[error(transparent)]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// Input stream isn't fasta or fastq format
    #[error("Input stream isn't in fasta or fastq format")]
    NotFastaOrFastq,

    /// Error in logging system configuration
    #[error(transparent)]
    Log(#[from] log::SetLoggerError),
}

impl Error {
    /// Get the error at the origin of a worker failure
    pub fn root(&self) -> &Error {
        match self {
            Error::WorkerFailure { source, .. } => source.root(),
            e => e,
        }
    }
}

/// Alias of result
pub type Result<T> = anyhow::Result<T>;

/// Alias of result with typed error, used by engine
pub type JobResult<T> = std::result::Result<T, Error>;
