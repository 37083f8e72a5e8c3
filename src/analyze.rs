//! # Analyze Module
//!
//! Drives refinement over a chromosome's candidate regions and writes the
//! result lines.
//!
//! For every region, in `(start, end)` order:
//!
//! 1. regions with zero mean depth carry no evidence and are only echoed in
//!    BED output;
//! 2. regions whose mean depth is above the refinement threshold are treated
//!    as reliable and reported unchanged;
//! 3. everything else goes through the configured [`RegionRefiner`] strategy.
//!
//! Verbose output is one `V` line per region:
//!
//! ```text
//! V	<index>	<mean depth>	[<start>,<end+1>)	<open>-<close> <open>-<close> ...
//! ```
//!
//! BED output converts the original and refined bounds to 0-based half-open
//! coordinates and puts the refined bounds in the thick-start/thick-end
//! columns.
use crate::bam::{BamReader, HtslibBamReader};
use crate::config::{OutputFormat, RefineConfig};
use crate::coverage::{load_chromosome, ChromosomeCoverage};
use crate::errors::{Error, Result};
use crate::reads::ReadCursor;
use crate::refine::{RefinedRegion, Refinement, RegionRefiner};
use crate::region::{load_candidates, CandidateRegion, FeatureFormat};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Per-run counts, logged once all regions are written.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub regions: usize,
    pub zero_coverage: usize,
    pub reliable: usize,
    pub refined: usize,
    pub degenerate: usize,
}

pub struct RegionAnalyzer<'a> {
    coverage: &'a ChromosomeCoverage,
    config: &'a RefineConfig,
}

impl<'a> RegionAnalyzer<'a> {
    pub fn new(coverage: &'a ChromosomeCoverage, config: &'a RefineConfig) -> Self {
        Self { coverage, config }
    }

    /// Analyze regions already sorted by `(start, end)`.
    pub fn analyze<W: Write>(
        &self,
        regions: &[CandidateRegion],
        dest: &mut W,
    ) -> Result<AnalysisSummary> {
        if let Some(pair) = regions.windows(2).find(|pair| pair[0] > pair[1]) {
            return Err(Error::OutOfOrderInput {
                msg: format!("candidate region {} follows {}", pair[1], pair[0]),
            });
        }

        let refiner = RegionRefiner::new(&self.coverage.array, self.config);
        let mut cursor = regions
            .first()
            .map(|r| self.coverage.reads.seek(r.start))
            .unwrap_or_default();
        let mut summary = AnalysisSummary::default();
        for (no, region) in regions.iter().enumerate() {
            self.analyze_region(no, region, &refiner, &mut cursor, dest, &mut summary)?;
        }
        Ok(summary)
    }

    fn analyze_region<W: Write>(
        &self,
        no: usize,
        region: &CandidateRegion,
        refiner: &RegionRefiner,
        cursor: &mut ReadCursor,
        dest: &mut W,
        summary: &mut AnalysisSummary,
    ) -> Result<()> {
        let (start, end) = (region.start, region.end);
        summary.regions += 1;
        let avg = self.coverage.array.average_coverage(start, end)?;

        if region.is_degenerate() {
            warn!("Degenerate region: {start}>{end}, left unrefined");
            summary.degenerate += 1;
            let refinement = Refinement {
                region: RefinedRegion::unrefined(start, end),
                samples: Vec::new(),
            };
            return self.write_result(no, region, avg, &refinement, dest);
        }

        let n_reads = self.coverage.reads.count_in_range(start, end, cursor);
        debug!("{region}: mean depth {avg}, {n_reads} reads start inside");

        if avg == 0.0 {
            summary.zero_coverage += 1;
            if self.config.output_format == OutputFormat::Bed {
                write_bed(dest, self.coverage.array.chromosome(), start, end, start, end)?;
            }
            return Ok(());
        }

        let threshold = self.config.refinement_threshold;
        let refinement = if threshold > 0.0 && avg > threshold {
            info!("Skipping {region}: threshold={threshold}, coverage={avg}");
            summary.reliable += 1;
            Refinement {
                region: RefinedRegion::unrefined(start, end),
                samples: Vec::new(),
            }
        } else {
            summary.refined += 1;
            refiner.refine(start, end)?
        };
        self.write_result(no, region, avg, &refinement, dest)
    }

    fn write_result<W: Write>(
        &self,
        no: usize,
        region: &CandidateRegion,
        avg: f64,
        refinement: &Refinement,
        dest: &mut W,
    ) -> Result<()> {
        for sample in &refinement.samples {
            if sample.distribution.is_some() {
                writeln!(dest, "{sample}")?;
            }
        }
        let (start, end) = (region.start, region.end);
        match self.config.output_format {
            OutputFormat::Verbose => {
                writeln!(
                    dest,
                    "V\t{no}\t{}\t[{start},{})\t{}",
                    six_significant(avg),
                    end + 1,
                    refinement.region
                )?;
            }
            OutputFormat::Bed => {
                let (refined_start, refined_end) = refinement
                    .region
                    .envelope()
                    .map(|iv| (iv.open, iv.close))
                    .unwrap_or((start, end));
                write_bed(
                    dest,
                    self.coverage.array.chromosome(),
                    start,
                    end,
                    refined_start,
                    refined_end,
                )?;
            }
        }
        Ok(())
    }
}

/// `value` rounded to six significant digits with trailing zeros dropped,
/// switching to exponent form outside `1e-4..1e6`.
fn six_significant(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }
    let sci = format!("{value:.5e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return value.to_string();
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return value.to_string();
    };
    let trim = |s: &str| {
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_owned()
        } else {
            s.to_owned()
        }
    };
    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim(mantissa), exp.abs())
    } else {
        trim(&format!("{:.*}", (5 - exp) as usize, value))
    }
}

/// Contig label for BED output: `chr` is prepended unless already present.
fn bed_contig(chromosome: &str) -> String {
    if chromosome.starts_with("chr") {
        chromosome.to_owned()
    } else {
        format!("chr{chromosome}")
    }
}

fn write_bed<W: Write>(
    dest: &mut W,
    chromosome: &str,
    start: i64,
    end: i64,
    refined_start: i64,
    refined_end: i64,
) -> Result<()> {
    writeln!(
        dest,
        "{}\t{}\t{}\trefined\t1\t+\t{}\t{}",
        bed_contig(chromosome),
        start - 1,
        end,
        refined_start - 1,
        refined_end
    )?;
    Ok(())
}

/// Sort the candidates and analyze them.
pub fn refine_regions<W: Write>(
    coverage: &ChromosomeCoverage,
    config: &RefineConfig,
    mut regions: Vec<CandidateRegion>,
    dest: &mut W,
) -> Result<AnalysisSummary> {
    let chromosome = coverage.array.chromosome();
    if regions.is_empty() {
        warn!("{chromosome}: no candidate regions");
    }
    regions.sort();
    let summary = RegionAnalyzer::new(coverage, config).analyze(&regions, dest)?;
    info!(
        "{chromosome}: {} regions, {} refined, {} reliable, {} with zero coverage, {} degenerate",
        summary.regions, summary.refined, summary.reliable, summary.zero_coverage, summary.degenerate
    );
    Ok(summary)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub bam_path: PathBuf,
    pub candidates_path: PathBuf,
    pub contig: String,
    pub reference: Option<PathBuf>,
    pub min_mapq: u8,
    pub output: Option<PathBuf>,
    pub config: RefineConfig,
}

pub fn run(args: &RunArgs) -> Result<AnalysisSummary> {
    let config = &args.config;
    config.validate()?;
    info!(
        "strategy={}, output format={:?}, coverage threshold={}, max chop length={}, coverage window={}",
        config.strategy,
        config.output_format,
        config.coverage_threshold,
        config.max_chop_length,
        config.coverage_window
    );

    let file = File::open(&args.candidates_path)?;
    let format = FeatureFormat::from_path(&args.candidates_path);
    let regions = load_candidates(BufReader::new(file), &args.contig, format)?;
    debug!("{} candidate regions on {}", regions.len(), args.contig);

    let mut bam_reader = HtslibBamReader::from_path(&args.bam_path)?;
    if let Some(reference) = &args.reference {
        bam_reader.set_reference(reference)?;
    }
    let coverage = load_chromosome(&mut bam_reader, &args.contig, args.min_mapq)?;

    let mut dest: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let summary = refine_regions(&coverage, config, regions, &mut dest)?;
    dest.flush()?;
    Ok(summary)
}
