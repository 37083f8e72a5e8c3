use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use covrefine::analyze::{self, RunArgs};
use covrefine::config::{OutputFormat, RefineConfig, Strategy};
use covrefine::coverage::{self, DepthArgs as DepthRunArgs};
use covrefine::distribution::CoverageWindow;
use env_logger::Env;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version = env!("GIT_VERSION"))]
pub struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    /// every below-threshold run inside the region
    Coverage,
    /// walk inward from both edges
    Edge,
    /// edge walk that rejects thin coverage fragments
    FragmentedEdge,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Coverage => Strategy::ThresholdSplit,
            StrategyArg::Edge => Strategy::EdgeTrim,
            StrategyArg::FragmentedEdge => Strategy::FragmentedEdge,
        }
    }
}

#[derive(Args, Debug)]
pub struct RefineArgs {
    /// Depth below which a base is considered low coverage
    #[arg(short = 't', long, default_value_t = 1)]
    coverage_threshold: u32,

    /// Regions with a mean depth above this are reported unchanged; zero or
    /// less refines every region
    #[arg(short = 'r', long, default_value_t = -1.0, allow_negative_numbers = true)]
    refinement_threshold: f64,

    /// Flank width used to derive a local coverage threshold
    #[arg(short = 'm', long, default_value_t = 0)]
    margin_size: u64,

    /// Multiplier applied to the mean depth of the flank
    #[arg(short = 'p', long, default_value_t = 0.0)]
    margin_parameter: f64,

    /// Fraction of the threshold a coverage fragment must reach to stop a walk
    #[arg(short = 'f', long, default_value_t = 0.0)]
    fragment_threshold: f64,

    /// Largest trim accepted on either side of a region; zero disables the
    /// limit
    #[arg(long, default_value_t = 200)]
    max_chop_length: u64,

    /// Fragment depth diagnostics as <window size>:<scale factor>:<index limit>
    #[arg(short = 'w', long, default_value = "0:100:100")]
    coverage_window: CoverageWindow,

    /// Output format, `bed` or verbose when omitted
    #[arg(long)]
    output_format: Option<OutputFormat>,

    #[arg(short, long, value_enum, default_value_t = StrategyArg::FragmentedEdge)]
    strategy: StrategyArg,

    /// mapping quality threshold
    #[arg(short = 'Q', long = "min-MQ", default_value_t = 0)]
    min_mapq: u8,

    /// Reference sequence FASTA file. Used when input is CRAM format.
    #[arg(short = 'T', long = "reference")]
    reference: Option<PathBuf>,

    /// Write output to file (default standard output)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Chromosome to analyse; must be in the BAM header
    #[arg(short, long)]
    contig: String,

    /// BED or GFF file of candidate regions
    candidates: PathBuf,

    bam_path: PathBuf,
}

impl RefineArgs {
    fn into_run_args(self) -> RunArgs {
        RunArgs {
            bam_path: self.bam_path,
            candidates_path: self.candidates,
            contig: self.contig,
            reference: self.reference,
            min_mapq: self.min_mapq,
            output: self.output,
            config: RefineConfig {
                coverage_threshold: self.coverage_threshold,
                refinement_threshold: self.refinement_threshold,
                margin_size: self.margin_size,
                margin_parameter: self.margin_parameter,
                fragment_threshold: self.fragment_threshold,
                max_chop_length: self.max_chop_length,
                coverage_window: self.coverage_window,
                output_format: self.output_format.unwrap_or_default(),
                strategy: self.strategy.into(),
            },
        }
    }
}

#[derive(Args, Debug)]
pub struct DepthArgs {
    /// Depths at or above this are counted in the last bucket
    #[arg(short = 'u', long, default_value_t = 500)]
    upper_bound: usize,

    /// mapping quality threshold
    #[arg(short = 'Q', long = "min-MQ", default_value_t = 0)]
    min_mapq: u8,

    /// Reference sequence FASTA file. Used when input is CRAM format.
    #[arg(short = 'T', long = "reference")]
    reference: Option<PathBuf>,

    /// Write output to file (default standard output)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long)]
    contig: String,

    bam_path: PathBuf,
}

impl DepthArgs {
    fn into_run_args(self) -> DepthRunArgs {
        DepthRunArgs {
            bam_path: self.bam_path,
            contig: self.contig,
            reference: self.reference,
            min_mapq: self.min_mapq,
            upper_bound: self.upper_bound,
            output: self.output,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Narrow candidate regions to their low-coverage core
    #[command(arg_required_else_help = true)]
    Refine(RefineArgs),
    /// Histogram of per-base depth on one chromosome
    #[command(arg_required_else_help = true)]
    Depth(DepthArgs),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = App::parse();
    match args.command {
        Commands::Refine(args) => {
            let run_args = args.into_run_args();
            analyze::run(&run_args).with_context(|| {
                format!(
                    "Failed to refine {} against {}",
                    run_args.candidates_path.display(),
                    run_args.bam_path.display()
                )
            })?;
        }
        Commands::Depth(args) => {
            let run_args = args.into_run_args();
            coverage::run_depth(&run_args).with_context(|| {
                format!("Failed to compute depth of {}", run_args.bam_path.display())
            })?;
        }
    };
    Ok(())
}
