//! # Coverage Module
//!
//! Per-base read depth for one chromosome. The array is filled by a single
//! pass over position-sorted alignments and is read-only afterwards; every
//! refinement query runs against the finished array.
//!
//! Positions are 1-based. Index 0 of the backing vector is never written and
//! is rejected by every accessor except the raw [`GenomeCoverageArray::coverage_at`].
use crate::bam::{BamReader, HtslibBamReader};
use crate::errors::{Error, Result};
use crate::reads::{ReadPositionIndex, ReadSpan};
use log::{debug, info, warn};
use rust_htslib::bam::FetchDefinition;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Debug)]
pub struct GenomeCoverageArray {
    chromosome: String,
    depth: Vec<u16>,
    max_coverage: u16,
}

impl GenomeCoverageArray {
    /// Allocate a zeroed array covering positions `1..=genome_size`.
    pub fn new(chromosome: &str, genome_size: u64) -> Self {
        Self {
            chromosome: chromosome.to_owned(),
            depth: vec![0; genome_size as usize + 1],
            max_coverage: 0,
        }
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn genome_size(&self) -> i64 {
        (self.depth.len() - 1) as i64
    }

    pub fn max_coverage(&self) -> u16 {
        self.max_coverage
    }

    fn index(&self, pos: i64) -> Result<usize> {
        if pos < 1 || pos > self.genome_size() {
            return Err(Error::InvalidPosition {
                pos,
                genome_size: self.genome_size(),
            });
        }
        Ok(pos as usize)
    }

    /// Add one read covering `[start, end]`.
    ///
    /// A counter that would pass `u16::MAX` is fatal: the array can no longer
    /// be trusted.
    pub fn add_interval(&mut self, start: i64, end: i64) -> Result<()> {
        let beg = self.index(start)?;
        let fin = self.index(end)?;
        if beg > fin {
            return Err(Error::DegenerateRegion { start, end });
        }
        for pos in beg..=fin {
            let depth = self.depth[pos]
                .checked_add(1)
                .ok_or(Error::CoverageOverflow { pos: pos as i64 })?;
            self.depth[pos] = depth;
            self.max_coverage = self.max_coverage.max(depth);
        }
        Ok(())
    }

    /// Depth at `pos`, or `None` for the sentinel 0 and positions past the end.
    pub fn get(&self, pos: i64) -> Option<u16> {
        if pos < 1 {
            return None;
        }
        self.depth.get(pos as usize).copied()
    }

    /// Depth at `pos`.
    ///
    /// # Panics
    /// Panics if `pos` is negative or beyond the genome size.
    pub fn coverage_at(&self, pos: i64) -> u16 {
        self.depth[pos as usize]
    }

    /// Mean depth over `[front, back]`; the bounds may be given in either order.
    pub fn average_coverage(&self, front: i64, back: i64) -> Result<f64> {
        let (front, back) = if front > back {
            (back, front)
        } else {
            (front, back)
        };
        let beg = self.index(front)?;
        let end = self.index(back)?;
        let total: u64 = self.depth[beg..=end].iter().map(|&d| d as u64).sum();
        Ok(total as f64 / (end - beg + 1) as f64)
    }

    /// Number of positions at each depth `0..=max_coverage`.
    ///
    /// Depths at or above `upper_bound` are folded into one final bucket, so
    /// the result never has more than `upper_bound + 1` entries.
    pub fn distribution_histogram(&self, upper_bound: usize) -> Vec<u64> {
        let mut counts = vec![0u64; self.max_coverage as usize + 1];
        for &d in &self.depth[1..] {
            counts[d as usize] += 1;
        }
        if upper_bound < counts.len() {
            let tail: u64 = counts[upper_bound..].iter().sum();
            counts.truncate(upper_bound);
            counts.push(tail);
        }
        counts
    }
}

/// Write a depth histogram as `D\t<depth>\t<count>` lines.
pub fn write_histogram<W: Write>(histogram: &[u64], mut dest: W) -> Result<()> {
    for (depth, count) in histogram.iter().enumerate() {
        writeln!(dest, "D\t{depth}\t{count}")?;
    }
    Ok(())
}

/// Everything built from one chromosome's alignments.
#[derive(Debug)]
pub struct ChromosomeCoverage {
    pub array: GenomeCoverageArray,
    pub reads: ReadPositionIndex,
}

impl ChromosomeCoverage {
    pub fn new(chromosome: &str, genome_size: u64) -> Self {
        Self {
            array: GenomeCoverageArray::new(chromosome, genome_size),
            reads: ReadPositionIndex::new(),
        }
    }

    /// Build from spans sorted by start position.
    pub fn build<I>(chromosome: &str, genome_size: u64, spans: I) -> Result<Self>
    where
        I: IntoIterator<Item = ReadSpan>,
    {
        let mut coverage = Self::new(chromosome, genome_size);
        for span in spans {
            coverage.add_read(span)?;
        }
        Ok(coverage)
    }

    pub fn add_read(&mut self, span: ReadSpan) -> Result<()> {
        self.reads.add_read(span.start, span.end)?;
        self.array.add_interval(span.start, span.end)
    }
}

/// Build the coverage of `contig` from a coordinate-sorted BAM/CRAM.
///
/// The contig length in the header is used as the genome size. Unmapped
/// reads and reads with mapping quality below `min_mapq` are ignored;
/// alignments that fall outside the contig are reported and skipped.
pub fn load_chromosome<T: BamReader>(
    bam_reader: &mut T,
    contig: &str,
    min_mapq: u8,
) -> Result<ChromosomeCoverage> {
    let header = bam_reader.header();
    let tid = header
        .tid(contig.as_bytes())
        .ok_or_else(|| Error::ContigNotFound(contig.to_owned()))?;
    let genome_size = header
        .target_len(tid)
        .ok_or_else(|| Error::ContigNotFound(contig.to_owned()))?;
    debug!("{contig}: genome size {genome_size}");

    let mut coverage = ChromosomeCoverage::new(contig, genome_size);
    bam_reader.fetch(FetchDefinition::CompleteTid(tid as i32))?;

    let mut n_skipped = 0u64;
    for result in bam_reader.records() {
        let record = result?;
        if record.is_unmapped() || record.mapq() < min_mapq {
            continue;
        }
        let start = record.pos() + 1;
        let end = record.cigar().end_pos();
        if start < 1 || start > end || end > genome_size as i64 {
            warn!("Skipping alignment at {contig}:{start}-{end}: outside 1..={genome_size}");
            n_skipped += 1;
            continue;
        }
        coverage.add_read(ReadSpan::new(start, end))?;
    }

    if n_skipped > 0 {
        warn!("{contig}: {n_skipped} alignments skipped");
    }
    info!(
        "{contig}: {} reads loaded, max coverage {}, average density {:.4}, mean read length {:.1}",
        coverage.reads.len(),
        coverage.array.max_coverage(),
        coverage.reads.average_density().unwrap_or(0.0),
        coverage.reads.average_read_length().unwrap_or(0.0)
    );
    Ok(coverage)
}

/// Inputs of the `depth` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthArgs {
    pub bam_path: PathBuf,
    pub contig: String,
    pub reference: Option<PathBuf>,
    pub min_mapq: u8,
    pub upper_bound: usize,
    pub output: Option<PathBuf>,
}

/// Write the depth histogram of one contig.
pub fn run_depth(args: &DepthArgs) -> Result<()> {
    let mut bam_reader = HtslibBamReader::from_path(&args.bam_path)?;
    if let Some(reference) = &args.reference {
        bam_reader.set_reference(reference)?;
    }
    let coverage = load_chromosome(&mut bam_reader, &args.contig, args.min_mapq)?;
    let histogram = coverage.array.distribution_histogram(args.upper_bound);

    let mut dest: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    write_histogram(&histogram, &mut dest)?;
    dest.flush()?;
    Ok(())
}
