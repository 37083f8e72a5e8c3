//! # Alignment Source
//!
//! Coverage is built from one contig of a coordinate-sorted, indexed BAM or
//! CRAM file. Everything that touches alignments goes through the
//! [`BamReader`] trait so the coverage build can run against
//! [`HtslibBamReader`] in production and against an in-memory
//! `MockBamReader` in unit tests.
//!
//! ```ignore
//! let mut reader = HtslibBamReader::from_path("sample.bam")?;
//! let coverage = load_chromosome(&mut reader, "chr1", 0)?;
//! ```
use crate::errors::Result;
use rust_htslib::bam::{FetchDefinition, HeaderView, IndexedReader, Read, Record};
use rust_htslib::errors::Error as HtsError;
use std::path::Path;

/// Indexed access to the alignments of a sequencing run.
///
/// `fetch` selects what `records` yields next; the header is used to map
/// contig names to ids and lengths.
pub trait BamReader {
    type RecordsIter<'a>: Iterator<Item = std::result::Result<Record, HtsError>>
    where
        Self: 'a;

    fn header(&self) -> &HeaderView;

    fn fetch<'a, T: Into<FetchDefinition<'a>>>(
        &mut self,
        definition: T,
    ) -> std::result::Result<(), HtsError>;

    fn records(&mut self) -> Self::RecordsIter<'_>;

    /// Reference FASTA used to decode CRAM input.
    fn set_reference<P: AsRef<Path>>(&mut self, reference: P)
        -> std::result::Result<(), HtsError>;
}

/// `BamReader` backed by `rust_htslib::bam::IndexedReader`.
pub struct HtslibBamReader {
    inner: IndexedReader,
}

impl HtslibBamReader {
    /// Opens an indexed BAM/CRAM; the index must sit next to the file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            inner: IndexedReader::from_path(path)?,
        })
    }
}

impl BamReader for HtslibBamReader {
    type RecordsIter<'a> = rust_htslib::bam::Records<'a, IndexedReader>;

    fn header(&self) -> &HeaderView {
        self.inner.header()
    }

    fn fetch<'a, T: Into<FetchDefinition<'a>>>(
        &mut self,
        definition: T,
    ) -> std::result::Result<(), HtsError> {
        self.inner.fetch(definition)
    }

    fn records(&mut self) -> Self::RecordsIter<'_> {
        self.inner.records()
    }

    fn set_reference<P: AsRef<Path>>(
        &mut self,
        reference: P,
    ) -> std::result::Result<(), HtsError> {
        self.inner.set_reference(reference)
    }
}

/// In-memory `BamReader` for unit tests.
///
/// Without explicit header lines the header lists `chr1`, `chr2` and `chr3`,
/// 5000 bases each. A contig fetch restricts `records` to that contig; a
/// ranged fetch additionally requires the record to start inside the range.
#[cfg(test)]
pub struct MockBamReader {
    records: Vec<Record>,
    header: HeaderView,
    selection: Option<(i32, i64, i64)>,
}

#[cfg(test)]
impl MockBamReader {
    pub fn new(
        records: Vec<Record>,
        header_records: Option<&[rust_htslib::bam::header::HeaderRecord]>,
    ) -> Self {
        use rust_htslib::bam::header::HeaderRecord;

        let mut header = rust_htslib::bam::Header::new();
        if let Some(lines) = header_records {
            for line in lines {
                header.push_record(line);
            }
        } else {
            for contig in ["chr1", "chr2", "chr3"] {
                let line = format!("SQ\tSN:{contig}\tLN:5000");
                header.push_record(&HeaderRecord::new(line.as_bytes()));
            }
        }
        Self {
            records,
            header: HeaderView::from_header(&header),
            selection: None,
        }
    }

    fn tid_of(&self, name: &[u8]) -> std::result::Result<i32, HtsError> {
        self.header
            .tid(name)
            .map(|tid| tid as i32)
            .ok_or(HtsError::Fetch)
    }
}

#[cfg(test)]
impl BamReader for MockBamReader {
    type RecordsIter<'a> = std::vec::IntoIter<std::result::Result<Record, HtsError>>;

    fn header(&self) -> &HeaderView {
        &self.header
    }

    fn fetch<'a, T: Into<FetchDefinition<'a>>>(
        &mut self,
        definition: T,
    ) -> std::result::Result<(), HtsError> {
        self.selection = match definition.into() {
            FetchDefinition::All => None,
            FetchDefinition::CompleteTid(tid) => Some((tid, 0, i64::MAX)),
            FetchDefinition::String(name) => Some((self.tid_of(name)?, 0, i64::MAX)),
            FetchDefinition::Region(tid, beg, end) => Some((tid, beg, end)),
            FetchDefinition::RegionString(name, beg, end) => Some((self.tid_of(name)?, beg, end)),
            FetchDefinition::Unmapped => Some((-1, 0, i64::MAX)),
        };
        Ok(())
    }

    fn records(&mut self) -> Self::RecordsIter<'_> {
        let selected: Vec<_> = self
            .records
            .iter()
            .filter(|r| match self.selection {
                None => true,
                Some((tid, beg, end)) => r.tid() == tid && (beg..end).contains(&r.pos()),
            })
            .cloned()
            .map(Ok)
            .collect();
        selected.into_iter()
    }

    fn set_reference<P: AsRef<Path>>(
        &mut self,
        _reference: P,
    ) -> std::result::Result<(), HtsError> {
        Ok(())
    }
}

/// Mapped read with a 100M alignment and MAPQ 60.
#[cfg(test)]
pub(crate) fn create_mock_record(tid: i32, pos: i64, qname: &str) -> Record {
    use rust_htslib::bam::record::{Cigar, CigarString};

    let mut record = Record::new();
    record.set_qname(qname.as_bytes());
    record.set_cigar(Some(&CigarString(vec![Cigar::Match(100)])));
    record.set_tid(tid);
    record.set_pos(pos);
    record.set_mapq(60);
    record.unset_unmapped();
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_htslib::bam::record::{Cigar, CigarString};
    use rust_htslib::bam::{self, header::HeaderRecord};
    use tempfile::TempDir;

    #[test]
    fn mock_default_header() {
        let reader = MockBamReader::new(vec![], None);
        let header = reader.header();
        assert_eq!(header.target_count(), 3);
        assert_eq!(header.tid(b"chr2"), Some(1));
        assert_eq!(header.target_len(2), Some(5000));
    }

    #[test]
    fn mock_custom_header() {
        let lines = [HeaderRecord::new(b"SQ\tSN:2\tLN:1200")];
        let reader = MockBamReader::new(vec![], Some(&lines));
        assert_eq!(reader.header().tid(b"2"), Some(0));
        assert_eq!(reader.header().target_len(0), Some(1200));
    }

    #[test]
    fn mock_fetch_selects_records() {
        let records = vec![
            create_mock_record(0, 100, "a"),
            create_mock_record(1, 100, "b"),
            create_mock_record(1, 400, "c"),
        ];
        let mut reader = MockBamReader::new(records, None);
        assert_eq!(reader.records().count(), 3);

        reader.fetch(FetchDefinition::CompleteTid(1)).unwrap();
        assert_eq!(reader.records().count(), 2);

        reader.fetch("chr1").unwrap();
        let names: Vec<Vec<u8>> = reader
            .records()
            .map(|r| r.unwrap().qname().to_vec())
            .collect();
        assert_eq!(names, vec![b"a".to_vec()]);

        reader.fetch(FetchDefinition::Region(1, 300, 500)).unwrap();
        assert_eq!(reader.records().count(), 1);

        assert!(reader.fetch("chrX").is_err());
        assert!(reader.set_reference("ref.fa").is_ok());
    }

    #[test]
    fn mock_record_spans_100_bases() {
        let record = create_mock_record(0, 250, "read1");
        assert!(!record.is_unmapped());
        assert_eq!(record.mapq(), 60);
        assert_eq!(record.qname(), b"read1");
        assert_eq!(record.cigar().end_pos(), 350);
    }

    #[test]
    fn htslib_reader_reads_indexed_bam() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reads.bam");
        {
            let mut header = bam::Header::new();
            header.push_record(&HeaderRecord::new(b"SQ\tSN:chr1\tLN:1000"));
            let mut writer = bam::Writer::from_path(&path, &header, bam::Format::Bam).unwrap();
            for (i, pos) in [10i64, 20, 30].into_iter().enumerate() {
                let mut record = Record::new();
                let qname = format!("read{i}");
                let cigar = CigarString(vec![Cigar::Match(50)]);
                record.set(qname.as_bytes(), Some(&cigar), &[b'A'; 50], &[30; 50]);
                record.set_tid(0);
                record.set_pos(pos);
                record.set_mtid(-1);
                record.set_mpos(-1);
                record.set_mapq(60);
                record.unset_unmapped();
                writer.write(&record).unwrap();
            }
        }
        bam::index::build(&path, None, bam::index::Type::Bai, 1).unwrap();

        let mut reader = HtslibBamReader::from_path(&path).unwrap();
        assert_eq!(reader.header().target_len(0), Some(1000));
        reader.fetch("chr1").unwrap();
        assert_eq!(reader.records().count(), 3);
    }

    #[test]
    fn htslib_reader_missing_file() {
        assert!(HtslibBamReader::from_path("nonexistent.bam").is_err());
    }
}
