//! Count or deduplicate kmer of large sequence set with an external sort

#![warn(missing_docs)]

/* std use */

/* crate use */
use anyhow::Context as _;
use clap::Parser as _;

/* project use */
use kman::abundance::AbundanceVector;
use kman::cli;
use kman::error;
use kman::file_store::FileStore;
use kman::io;
use kman::job::Job;
use kman::pool::RayonPool;
use kman::store::{BatchStore, MemoryStore};
use kman::{Kmer, KmerRepr, PackedKmer};

fn main() -> error::Result<()> {
    // parse cli
    let params = cli::Command::parse();

    // Setup logger
    stderrlog::new()
        .module(module_path!())
        .quiet(params.quiet())
        .verbosity(params.verbosity())
        .timestamp(params.timestamp())
        .init()
        .context("stderrlog already create a logger")?;

    let mut output = io::Output::new(params.output())?;

    match params.encoding() {
        cli::Encoding::Packed => count::<PackedKmer>(&params, &mut output)?,
        _ => count::<Kmer>(&params, &mut output)?,
    }

    output.commit()?;

    Ok(())
}

fn count<K>(params: &cli::Command, output: &mut io::Output) -> error::Result<()>
where
    K: KmerRepr,
{
    let job = Job::new(params.config())?;

    if params.in_memory() {
        let store = MemoryStore::<K>::new();
        run(params, &job, &store, output)
    } else {
        let store = match params.tmp_dir() {
            Some(dir) => FileStore::<K>::in_dir(dir, params.kmer_size()),
            None => FileStore::<K>::new(params.kmer_size()),
        }
        .context("Can't create batches directory")?;
        log::info!("Batches are written in {}", store.path().display());
        run(params, &job, &store, output)
    }
}

fn run<K, S>(
    params: &cli::Command,
    job: &Job<RayonPool>,
    store: &S,
    output: &mut io::Output,
) -> error::Result<()>
where
    K: KmerRepr,
    S: BatchStore<K>,
{
    log::info!("Start extraction and merge");
    let sink = io::read_records(params.input()?, |records| job.run(store, records))??;
    let report = sink.report().clone();
    let kmer_size = sink.kmer_size();

    // abundance need counts after stream is consumed
    let mut counts = ahash::AHashMap::new();
    let keep = params.abundance().is_some();
    let written = io::write_records(
        sink.into_stream().inspect(|record| {
            if let (true, Ok(record)) = (keep, record) {
                counts.insert(record.kmer.clone(), record.count);
            }
        }),
        kmer_size,
        job.config().mode(),
        output.writer(),
    )?;
    log::info!(
        "End job: {} tasks, {} kmers, {} skipped windows, {} batches, {} records written",
        report.tasks,
        report.windows,
        report.skipped,
        report.batches.len(),
        written
    );

    if let Some(path) = params.abundance() {
        let mut vectors = AbundanceVector::new(kmer_size);
        io::read_records(params.input()?, |records| -> error::Result<()> {
            for record in records {
                vectors.add_record(&record?, &counts, job.config())?;
            }

            Ok(())
        })??;

        vectors.write_to(path)?;
    }

    Ok(())
}
