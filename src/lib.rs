pub mod errors;
pub use errors::Result;
pub mod analyze;
pub mod bam;
pub mod config;
pub mod coverage;
pub mod distribution;
pub mod reads;
pub mod refine;
pub mod region;
