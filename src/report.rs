use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::models::{FileFailure, ScanResult};

/// Report produced after a batch scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// When the scan finished
    pub timestamp: DateTime<Utc>,

    /// Scan statistics
    pub stats: ScanStats,

    /// Per-file failures
    pub failures: Vec<FileFailure>,
}

/// Statistics about the scanning process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStats {
    /// Total number of files processed
    pub total_files: usize,
    /// Number of files parsed successfully
    pub successful_files: usize,
    /// Number of files that failed to parse
    pub failed_files: usize,
    /// Total number of classes found
    pub classes_found: usize,
    /// Time taken to complete the scan (in milliseconds)
    pub scan_time_ms: u64,
}

impl ScanReport {
    pub fn from_result(result: &ScanResult) -> Self {
        Self {
            timestamp: Utc::now(),
            stats: ScanStats {
                total_files: result.files_scanned,
                successful_files: result.files_scanned - result.files_with_errors,
                failed_files: result.files_with_errors,
                classes_found: result.classes_found,
                scan_time_ms: result.scan_time_ms.unwrap_or(0),
            },
            failures: result.failures.clone(),
        }
    }
}

/// Generate reports for the scan results
pub fn generate_report(output_dir: &Path, report: &ScanReport) -> io::Result<()> {
    fs::create_dir_all(output_dir)?;

    let json_path = output_dir.join("report.json");
    save_json_report(report, &json_path)?;
    info!("JSON report saved to: {}", json_path.display());

    let summary_path = output_dir.join("summary.txt");
    write_summary_report(report, &summary_path)?;
    info!("Summary report saved to: {}", summary_path.display());

    Ok(())
}

/// Save the report in JSON format
fn save_json_report(report: &ScanReport, path: &Path) -> io::Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    fs::write(path, json)?;
    debug!("JSON report saved to: {}", path.display());
    Ok(())
}

/// Write a human-readable summary report
fn write_summary_report(report: &ScanReport, path: &Path) -> io::Result<()> {
    let mut file = File::create(path)?;

    writeln!(file, "Config Scanner Summary Report")?;
    writeln!(file, "Generated at: {}", report.timestamp)?;
    writeln!(file, "{}", "-".repeat(80))?;
    writeln!(file)?;

    writeln!(file, "Processing Summary")?;
    writeln!(file, "  Total files: {}", report.stats.total_files)?;
    writeln!(file, "  Successful: {}", report.stats.successful_files)?;
    writeln!(file, "  Failed: {}", report.stats.failed_files)?;
    writeln!(file, "  Classes found: {}", report.stats.classes_found)?;
    writeln!(file, "  Scan time: {}ms", report.stats.scan_time_ms)?;

    if !report.failures.is_empty() {
        writeln!(file)?;
        writeln!(file, "Failures:")?;
        writeln!(file, "{}", "-".repeat(80))?;
        for failure in &report.failures {
            writeln!(file, "File: {}", failure.file_path.display())?;
            writeln!(file, "Kind: {}", failure.kind)?;
            writeln!(file, "Error: {}", failure.error_message)?;
            if let Some(line) = failure.error_line {
                writeln!(file, "Line: {}", line)?;
            }
            if let Some(column) = failure.error_column {
                writeln!(file, "Column: {}", column)?;
            }
            writeln!(file, "Parse time: {}ms", failure.parse_duration_ms)?;
            writeln!(file, "{}", "-".repeat(80))?;
        }
    }

    debug!("Summary report saved to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn report_files_are_written() {
        let mut result = ScanResult::new();
        result.files_scanned = 3;
        result.files_with_errors = 1;
        result.failures.push(FileFailure {
            file_path: "bad.cpp".into(),
            kind: crate::models::FailureKind::Syntax,
            error_message: "syntax error".into(),
            error_line: Some(4),
            error_column: Some(9),
            parse_duration_ms: 1,
        });
        result.scan_time_ms = Some(12);

        let dir = tempdir().unwrap();
        let report = ScanReport::from_result(&result);
        generate_report(dir.path(), &report).unwrap();

        let json = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
        let parsed: ScanReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.stats.failed_files, 1);

        let summary = std::fs::read_to_string(dir.path().join("summary.txt")).unwrap();
        assert!(summary.contains("Total files: 3"));
        assert!(summary.contains("bad.cpp"));
        assert!(summary.contains("Kind: syntax"));
        assert!(summary.contains("Line: 4"));
        assert!(summary.contains("Column: 9"));
    }
}
