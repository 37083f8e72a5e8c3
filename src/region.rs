//! # Region Module
//!
//! Candidate regions to refine, and loading them from BED or GFF files.
//!
//! ## Structs
//!
//! - `CandidateRegion`: a 1-based inclusive interval on the chromosome being analysed.
//!
//! ## Functions
//!
//! - `load_candidates`: reads the rows of a BED or GFF file that belong to one contig.
//!
//! BED rows are 0-based half-open and are converted on load; GFF rows are
//! already 1-based inclusive.
use crate::errors::{Error, Result};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// A candidate structural-variant interval, 1-based inclusive.
///
/// Regions order by `(start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CandidateRegion {
    pub start: i64,
    pub end: i64,
}

impl CandidateRegion {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn is_degenerate(&self) -> bool {
        self.start > self.end
    }
}

impl fmt::Display for CandidateRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureFormat {
    Bed,
    Gff,
}

impl FeatureFormat {
    /// GFF for `.gff`, `.gff3` and `.gtf` files, BED for anything else.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("gff") | Some("gff3") | Some("gtf") => FeatureFormat::Gff,
            _ => FeatureFormat::Bed,
        }
    }

    /// Column indices of contig, start and end.
    fn columns(&self) -> (usize, usize, usize) {
        match self {
            FeatureFormat::Bed => (0, 1, 2),
            FeatureFormat::Gff => (0, 3, 4),
        }
    }
}

/// Loads the candidate regions on `contig` from a BED or GFF stream.
///
/// Blank lines, `#` comments and `track`/`browser` lines are skipped.
pub fn load_candidates<R: Read>(
    reader: R,
    contig: &str,
    format: FeatureFormat,
) -> Result<Vec<CandidateRegion>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_reader(reader);

    let (contig_col, start_col, end_col) = format.columns();
    let mut result = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let first = row.get(0).unwrap_or("").trim();
        if first.is_empty() || first == "track" || first == "browser" {
            continue;
        }
        if row.len() <= end_col {
            return Err(Error::InvalidRecord {
                msg: format!(
                    "Incorrect number of columns detected, expected >= {} found {} (line = {})",
                    end_col + 1,
                    row.len(),
                    line
                ),
            });
        }
        if row[contig_col].trim() != contig {
            continue;
        }
        let parse = |col: usize, what: &str| {
            row[col].trim().parse::<i64>().map_err(|_| Error::InvalidRecord {
                msg: format!(
                    "{what} column is not an integer: is {} (line = {line})",
                    &row[col]
                ),
            })
        };
        let beg = parse(start_col, "Start")?;
        let end = parse(end_col, "End")?;
        let start = match format {
            FeatureFormat::Bed => beg + 1,
            FeatureFormat::Gff => beg,
        };
        result.push(CandidateRegion::new(start, end));
    }
    Ok(result)
}
