//! Count or deduplicate kmer of sequence sets larger than memory.
//!
//! Workers tokenize sequences and write sorted batches of kmer in a [store::BatchStore], then a
//! k-way merge produce a single sorted stream of distinct kmer with their count.
//!
//! ```no_run
//! use kman::store::MemoryStore;
//! use kman::{Alphabet, AlphabetPolicy, Config, Job, Kmer};
//!
//! # fn main() -> kman::error::Result<()> {
//! let job = Job::new(Config::new(3, false, Alphabet::Acgt, AlphabetPolicy::Skip))?;
//! let store: MemoryStore<Kmer> = MemoryStore::new();
//!
//! for record in job.run_sequences(&store, [b"ACGTACGT"])?.into_table()? {
//!     println!("{},{}", String::from_utf8_lossy(&record.kmer), record.count);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/* std use */

/* crate use */

/* project use */

/* mod declaration */
pub mod abundance;
pub mod batch;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod file_store;
pub mod format;
pub mod io;
pub mod job;
pub mod kmer;
pub mod merger;
pub mod pool;
pub mod sink;
pub mod store;
pub mod task;
pub mod tokenizer;

/* pub use */
pub use config::{BatchSize, Config, Mode};
pub use job::Job;
pub use kmer::{Alphabet, KmerRepr, PackedKmer};
pub use tokenizer::AlphabetPolicy;

/// Alias for define Kmer
pub type Kmer = Vec<u8>;
