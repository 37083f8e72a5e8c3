use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {msg}")]
    Configuration { msg: String },

    #[error("coverage overflow at position {pos}: depth cannot exceed {max}", max = u16::MAX)]
    CoverageOverflow { pos: i64 },

    #[error("degenerate region: start {start} > end {end}")]
    DegenerateRegion { start: i64, end: i64 },

    #[error("input is not sorted: {msg}")]
    OutOfOrderInput { msg: String },

    #[error("position {pos} is outside the chromosome (valid range 1..={genome_size})")]
    InvalidPosition { pos: i64, genome_size: i64 },

    #[error("Chromosome {0} not found in BAM header")]
    ContigNotFound(String),

    #[error("invalid candidate record: {msg}")]
    InvalidRecord { msg: String },

    #[error("internal error: {msg}")]
    Internal { msg: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTSlib error: {0}")]
    Hts(#[from] rust_htslib::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
