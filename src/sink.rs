//! Expose result of a job to caller

/* std use */

/* crate use */

/* project use */
use crate::batch::Record;
use crate::coordinator::ExtractionReport;
use crate::error;
use crate::kmer::KmerRepr;
use crate::merger::MergeStream;
use crate::store::BatchStore;

/// Result of a successful extraction, merge is run when result is consumed.
///
/// Result can be consumed only once, batches are deleted by consumption.
pub struct ResultSink<'a, K, S>
where
    K: KmerRepr,
    S: BatchStore<K>,
{
    report: ExtractionReport,
    kmer_size: usize,
    stream: MergeStream<'a, K, S>,
}

impl<'a, K, S> ResultSink<'a, K, S>
where
    K: KmerRepr,
    S: BatchStore<K>,
{
    /// Create a new sink
    pub fn new(report: ExtractionReport, kmer_size: usize, stream: MergeStream<'a, K, S>) -> Self {
        Self {
            report,
            kmer_size,
            stream,
        }
    }

    /// Summary of extraction phase
    pub fn report(&self) -> &ExtractionReport {
        &self.report
    }

    /// Kmer size of records
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Get lazy stream of records, sorted by kmer
    pub fn into_stream(self) -> MergeStream<'a, K, S> {
        self.stream
    }

    /// Get all records, sorted by kmer
    pub fn into_table(self) -> error::JobResult<Vec<Record<K>>> {
        self.stream.collect()
    }

    /// Get a map that associate each kmer to its count
    pub fn into_map(self) -> error::JobResult<ahash::AHashMap<K, u64>> {
        let mut map = ahash::AHashMap::new();
        for record in self.stream {
            let record = record?;
            map.insert(record.kmer, record.count);
        }

        Ok(map)
    }
}
