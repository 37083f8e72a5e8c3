use rust_htslib::bam::{
    self,
    header::HeaderRecord,
    record::{Cigar, CigarString},
    Record,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Writes and indexes a BAM with one 100 base contig and 10 base reads at
/// the given 0-based positions.
fn write_indexed_bam(dir: &Path, positions: &[i64]) -> PathBuf {
    let path = dir.join("reads.bam");
    {
        let mut header = bam::Header::new();
        header.push_record(&HeaderRecord::new(b"HD\tVN:1.6\tSO:coordinate"));
        header.push_record(&HeaderRecord::new(b"SQ\tSN:chr1\tLN:100"));
        let mut writer = bam::Writer::from_path(&path, &header, bam::Format::Bam).unwrap();
        for (i, &pos) in positions.iter().enumerate() {
            let mut record = Record::new();
            let qname = format!("read{i}");
            let cigar = CigarString(vec![Cigar::Match(10)]);
            record.set(qname.as_bytes(), Some(&cigar), b"ACGTACGTAC", &[30; 10]);
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
    path
}

/// Depth 2 on 1..=10, depth 1 on 41..=50, nothing elsewhere.
fn fixture(dir: &TempDir) -> (PathBuf, PathBuf) {
    let bam_path = write_indexed_bam(dir.path(), &[0, 0, 40]);
    let bed_path = dir.path().join("candidates.bed");
    fs::write(
        &bed_path,
        "track name=candidates\nchr1\t70\t80\tdel2\nchr2\t0\t50\tother\nchr1\t0\t60\tdel1\n",
    )
    .unwrap();
    (bam_path, bed_path)
}

fn covrefine(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_covrefine"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn assert_success(output: &Output) -> String {
    assert!(
        output.status.success(),
        "Command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn test_cli_refine_threshold_split() {
    let temp_dir = TempDir::new().unwrap();
    let (bam_path, bed_path) = fixture(&temp_dir);
    let output = covrefine(&[
        "refine",
        "--strategy",
        "coverage",
        "--contig",
        "chr1",
        bed_path.to_str().unwrap(),
        bam_path.to_str().unwrap(),
    ]);
    let stdout = assert_success(&output);
    assert_eq!(stdout, "V\t0\t0.5\t[1,61)\t11-41 51-61\n");
}

#[test]
fn test_cli_refine_edge_bed() {
    let temp_dir = TempDir::new().unwrap();
    let (bam_path, bed_path) = fixture(&temp_dir);
    let output_path = temp_dir.path().join("refined.bed");
    let output = covrefine(&[
        "refine",
        "--fragment-threshold",
        "0.5",
        "--output-format",
        "bed",
        "--contig",
        "chr1",
        "--output",
        output_path.to_str().unwrap(),
        bed_path.to_str().unwrap(),
        bam_path.to_str().unwrap(),
    ]);
    let stdout = assert_success(&output);
    assert!(stdout.is_empty());

    let expected = "\
chr1\t0\t60\trefined\t1\t+\t10\t40
chr1\t70\t80\trefined\t1\t+\t70\t80
";
    let contents = fs::read_to_string(output_path).unwrap();
    assert_eq!(contents, expected);
}

#[test]
fn test_cli_refine_skips_reliable_regions() {
    let temp_dir = TempDir::new().unwrap();
    let (bam_path, bed_path) = fixture(&temp_dir);
    let output = covrefine(&[
        "refine",
        "--refinement-threshold",
        "0.25",
        "--contig",
        "chr1",
        bed_path.to_str().unwrap(),
        bam_path.to_str().unwrap(),
    ]);
    let stdout = assert_success(&output);
    assert_eq!(stdout, "V\t0\t0.5\t[1,61)\t1-60\n");
}

#[test]
fn test_cli_refine_unknown_contig() {
    let temp_dir = TempDir::new().unwrap();
    let (bam_path, bed_path) = fixture(&temp_dir);
    let output = covrefine(&[
        "refine",
        "--contig",
        "chrX",
        bed_path.to_str().unwrap(),
        bam_path.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Chromosome chrX not found in BAM header"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn test_cli_depth() {
    let temp_dir = TempDir::new().unwrap();
    let (bam_path, _) = fixture(&temp_dir);
    let output = covrefine(&["depth", "--contig", "chr1", bam_path.to_str().unwrap()]);
    let stdout = assert_success(&output);
    assert_eq!(stdout, "D\t0\t80\nD\t1\t10\nD\t2\t10\n");

    let output = covrefine(&[
        "depth",
        "--upper-bound",
        "1",
        "--contig",
        "chr1",
        bam_path.to_str().unwrap(),
    ]);
    let stdout = assert_success(&output);
    assert_eq!(stdout, "D\t0\t80\nD\t1\t20\n");
}
