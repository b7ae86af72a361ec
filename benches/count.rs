//! Benchmark counting job

/* std use */

/* crate use */
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

/* project use */
use kman::file_store::FileStore;
use kman::store::MemoryStore;
use kman::{Alphabet, AlphabetPolicy, BatchSize, Config, Job, Kmer, PackedKmer};

fn sequences(number: usize, length: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);

    (0..number)
        .map(|_| {
            (0..length)
                .map(|_| *b"ACGT".choose(&mut rng).unwrap())
                .collect::<Vec<u8>>()
        })
        .collect()
}

fn config(workers: usize, batch_size: usize) -> Config {
    Config::new(31, true, Alphabet::Acgt, AlphabetPolicy::Skip)
        .with_workers(workers)
        .with_batch_size(BatchSize::Records(batch_size))
}

fn batch_size(c: &mut Criterion) {
    let mut g = c.benchmark_group("batch_size");

    g.sample_size(20);
    g.warm_up_time(std::time::Duration::from_secs(1));

    let seqs = sequences(4096, 150);

    for pow in 12..21 {
        let batch_size = 2usize.pow(pow);
        let job = Job::new(config(4, batch_size)).unwrap();

        g.bench_with_input(BenchmarkId::from_parameter(batch_size), &seqs, |b, seqs| {
            b.iter(|| {
                let store: FileStore<PackedKmer> = FileStore::new(31).unwrap();
                let records = job.run_sequences(&store, seqs).unwrap().into_stream().count();
                black_box(records)
            })
        });
    }
}

fn number_of_workers(c: &mut Criterion) {
    let mut g = c.benchmark_group("number_of_workers");

    g.sample_size(20);
    g.warm_up_time(std::time::Duration::from_secs(1));

    let seqs = sequences(4096, 150);

    for workers in 1..9 {
        let job = Job::new(config(workers, 65536)).unwrap();

        g.bench_with_input(BenchmarkId::from_parameter(workers), &seqs, |b, seqs| {
            b.iter(|| {
                let store: MemoryStore<PackedKmer> = MemoryStore::new();
                let records = job.run_sequences(&store, seqs).unwrap().into_stream().count();
                black_box(records)
            })
        });
    }
}

fn encoding(c: &mut Criterion) {
    let mut g = c.benchmark_group("encoding");

    g.sample_size(20);
    g.warm_up_time(std::time::Duration::from_secs(1));

    let seqs = sequences(2048, 150);
    let job = Job::new(config(4, 65536)).unwrap();

    g.bench_with_input(BenchmarkId::from_parameter("text"), &seqs, |b, seqs| {
        b.iter(|| {
            let store: FileStore<Kmer> = FileStore::new(31).unwrap();
            let records = job.run_sequences(&store, seqs).unwrap().into_stream().count();
            black_box(records)
        })
    });

    g.bench_with_input(BenchmarkId::from_parameter("packed"), &seqs, |b, seqs| {
        b.iter(|| {
            let store: FileStore<PackedKmer> = FileStore::new(31).unwrap();
            let records = job.run_sequences(&store, seqs).unwrap().into_stream().count();
            black_box(records)
        })
    });
}

fn count(c: &mut Criterion) {
    batch_size(c);
    number_of_workers(c);
    encoding(c);
}

criterion_group!(benches, count);

criterion_main!(benches);
