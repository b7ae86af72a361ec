//! Unit of work send to workers

/* std use */

/* crate use */

/* project use */

/// A sequence provide by sequence source
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SeqRecord {
    /// Sequence identifier
    pub name: String,
    /// Sequence symbols
    pub sequence: Vec<u8>,
}

impl SeqRecord {
    /// Create a new record
    pub fn new<N, S>(name: N, sequence: S) -> Self
    where
        N: Into<String>,
        S: Into<Vec<u8>>,
    {
        Self {
            name: name.into(),
            sequence: sequence.into(),
        }
    }
}

/// A sequence, or a shard of a sequence, to tokenize
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Task {
    /// Task identifier, unique in a job
    pub id: usize,
    /// Name of sequence record
    pub name: std::sync::Arc<str>,
    /// Position of first symbol in sequence record
    pub offset: usize,
    /// Symbols to tokenize
    pub sequence: Vec<u8>,
}

impl Task {
    /// Split a record in tasks.
    ///
    /// Each shard contains at most `shard_size` windows and overlap the next one by `kmer_size - 1`
    /// symbols, so shards produce exactly the windows of record. With a `shard_size` of 0 record
    /// isn't split. Task identifiers start at `first_id`.
    pub fn shards(record: SeqRecord, kmer_size: usize, shard_size: usize, first_id: usize) -> Vec<Task> {
        let name: std::sync::Arc<str> = record.name.into();
        let windows = (record.sequence.len() + 1).saturating_sub(kmer_size);

        if shard_size == 0 || windows <= shard_size {
            return vec![Task {
                id: first_id,
                name,
                offset: 0,
                sequence: record.sequence,
            }];
        }

        (0..windows)
            .step_by(shard_size)
            .enumerate()
            .map(|(index, start)| {
                let end = (start + shard_size + kmer_size - 1).min(record.sequence.len());
                Task {
                    id: first_id + index,
                    name: name.clone(),
                    offset: start,
                    sequence: record.sequence[start..end].to_vec(),
                }
            })
            .collect()
    }
}
