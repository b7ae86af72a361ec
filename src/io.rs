//! Read sequences and write kmer tables

/* std use */
use std::io::Write as _;

/* crate use */
use anyhow::Context as _;

/* project use */
use crate::batch::Record;
use crate::config::Mode;
use crate::error;
use crate::format;
use crate::kmer::KmerRepr;
use crate::task::SeqRecord;

macro_rules! seq_record {
    ($name:ident, $record_ty:ty) => {
        /// Convert a noodles record in a sequence record
        fn $name(record: $record_ty) -> SeqRecord {
            let name: &[u8] = record.name().as_ref();
            let sequence: &[u8] = record.sequence().as_ref();

            SeqRecord::new(String::from_utf8_lossy(name), sequence)
        }
    };
}

seq_record!(fasta_record, noodles::fasta::Record);
seq_record!(fastq_record, noodles::fastq::Record);

/// Detect format of input and give an iterator over its records to `consume`, an empty input has no record
pub fn read_records<R, F, T>(mut input: R, consume: F) -> error::Result<T>
where
    R: std::io::BufRead,
    F: FnOnce(&mut dyn Iterator<Item = std::io::Result<SeqRecord>>) -> T,
{
    match format::ReadsFormat::detect(&mut input)? {
        Some(format::ReadsFormat::Fasta) => {
            log::debug!("Input is in fasta format");
            let mut reader = noodles::fasta::Reader::new(input);
            let mut records = reader.records().map(|r| r.map(fasta_record));

            Ok(consume(&mut records))
        }
        Some(format::ReadsFormat::Fastq) => {
            log::debug!("Input is in fastq format");
            let mut reader = noodles::fastq::Reader::new(input);
            let mut records = reader.records().map(|r| r.map(fastq_record));

            Ok(consume(&mut records))
        }
        None => {
            log::warn!("Input is empty");
            Ok(consume(&mut std::iter::empty::<std::io::Result<SeqRecord>>()))
        }
    }
}

/// Write records in csv, `kmer,count` in count mode and `kmer` in uniq mode, return number of records
pub fn write_records<K, I, W>(
    records: I,
    kmer_size: usize,
    mode: Mode,
    mut output: W,
) -> error::Result<u64>
where
    K: KmerRepr,
    I: IntoIterator<Item = error::JobResult<Record<K>>>,
    W: std::io::Write,
{
    match mode {
        Mode::Count => output.write_all(b"kmer,count\n")?,
        Mode::Uniq => output.write_all(b"kmer\n")?,
    }

    let mut written = 0;
    for record in records {
        let record = record?;

        output.write_all(&record.kmer.to_text(kmer_size))?;
        match mode {
            Mode::Count => writeln!(output, ",{}", record.count)?,
            Mode::Uniq => output.write_all(b"\n")?,
        }

        written += 1;
    }
    output.flush()?;

    Ok(written)
}

/// Output spooled in a temporary file, published only by [Output::commit]
pub struct Output {
    target: Option<std::path::PathBuf>,
    spool: tempfile::NamedTempFile,
}

impl Output {
    /// Prepare output, `None` target is standard output
    pub fn new(target: Option<std::path::PathBuf>) -> error::Result<Self> {
        let spool = match &target {
            Some(path) => {
                let dir = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent,
                    _ => std::path::Path::new("."),
                };
                tempfile::NamedTempFile::new_in(dir)
                    .with_context(|| format!("Can't create output in {}", dir.display()))?
            }
            None => tempfile::NamedTempFile::new()?,
        };

        Ok(Self { target, spool })
    }

    /// Get a writer on spool
    pub fn writer(&mut self) -> std::io::BufWriter<&mut std::fs::File> {
        std::io::BufWriter::new(self.spool.as_file_mut())
    }

    /// Move spool to target, or copy it on standard output
    pub fn commit(self) -> error::Result<()> {
        match self.target {
            Some(path) => {
                self.spool
                    .persist(&path)
                    .with_context(|| format!("Can't write output {}", path.display()))?;
            }
            None => {
                let mut spool = self.spool.reopen()?;
                let mut stdout = std::io::stdout().lock();
                std::io::copy(&mut spool, &mut stdout)?;
                stdout.flush()?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::kmer::PackedKmer;
    use crate::Kmer;

    const FASTA: &[u8] = b">random_seq 0
AGAAGGCCCCGACTTTCGGGGTGGG
>random_seq 1
aagGGCTGCTCTCCAGCTAATACC
";

    const FASTQ: &[u8] = b"@random_seq 0
CCATACGAAAGTTCGAGG
+
XmaM3IM.kloVw92/SA
@random_seq 1
TAAGCTGACTGGTCGTAA
+
'@Y]WtoA%)u307)ZMC
";

    fn collect(input: &[u8]) -> error::Result<Vec<SeqRecord>> {
        read_records(input, |records| records.collect::<std::io::Result<Vec<SeqRecord>>>())?
            .map_err(anyhow::Error::from)
    }

    #[test]
    fn read_fasta() -> error::Result<()> {
        assert_eq!(
            collect(FASTA)?,
            vec![
                SeqRecord::new("random_seq", b"AGAAGGCCCCGACTTTCGGGGTGGG".to_vec()),
                SeqRecord::new("random_seq", b"aagGGCTGCTCTCCAGCTAATACC".to_vec()),
            ]
        );

        Ok(())
    }

    #[test]
    fn read_fastq() -> error::Result<()> {
        assert_eq!(
            collect(FASTQ)?,
            vec![
                SeqRecord::new("random_seq", b"CCATACGAAAGTTCGAGG".to_vec()),
                SeqRecord::new("random_seq", b"TAAGCTGACTGGTCGTAA".to_vec()),
            ]
        );

        Ok(())
    }

    #[test]
    fn read_empty() -> error::Result<()> {
        assert_eq!(collect(b"")?, vec![]);

        Ok(())
    }

    #[test]
    fn read_other() {
        match collect(b"ACGT") {
            Err(ref e) if e.is::<error::Error>() => match e.downcast_ref::<error::Error>() {
                Some(error::Error::NotFastaOrFastq) => (),
                _ => panic!("read_records should generate an error::Error::NotFastaOrFastq"),
            },
            _ => panic!("read_records should generate an error::Error::NotFastaOrFastq"),
        }
    }

    #[test]
    fn write_count() -> error::Result<()> {
        let records: Vec<error::JobResult<Record<Kmer>>> = vec![
            Ok(Record::new(b"ACG".to_vec(), 2)),
            Ok(Record::new(b"GTA".to_vec(), 1)),
        ];

        let mut output = Vec::new();
        assert_eq!(write_records(records, 3, Mode::Count, &mut output)?, 2);
        assert_eq!(output, b"kmer,count\nACG,2\nGTA,1\n".to_vec());

        Ok(())
    }

    #[test]
    fn write_uniq() -> error::Result<()> {
        let records: Vec<error::JobResult<Record<PackedKmer>>> = vec![
            Ok(Record::new(PackedKmer::from_window(b"GTA"), 1)),
            Ok(Record::new(PackedKmer::from_window(b"TAC"), 1)),
        ];

        let mut output = Vec::new();
        write_records(records, 3, Mode::Uniq, &mut output)?;
        assert_eq!(output, b"kmer\nGTA\nTAC\n".to_vec());

        Ok(())
    }

    #[test]
    fn write_failure() {
        let records: Vec<error::JobResult<Record<Kmer>>> = vec![
            Ok(Record::new(b"ACG".to_vec(), 2)),
            Err(error::Error::Cancelled),
        ];

        let mut output = Vec::new();
        let result = write_records(records, 3, Mode::Count, &mut output);

        assert!(matches!(
            result.as_ref().map_err(|e| e.downcast_ref::<error::Error>()),
            Err(Some(error::Error::Cancelled))
        ));
    }

    #[test]
    fn output_commit() -> error::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kmers.csv");

        let mut output = Output::new(Some(path.clone()))?;
        output.writer().write_all(b"kmer\nACG\n")?;
        assert!(!path.exists());

        output.commit()?;
        assert_eq!(std::fs::read(&path)?, b"kmer\nACG\n".to_vec());

        Ok(())
    }

    #[test]
    fn output_abort() -> error::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kmers.csv");

        let mut output = Output::new(Some(path.clone()))?;
        output.writer().write_all(b"kmer\nACG\n")?;
        drop(output);

        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);

        Ok(())
    }
}
