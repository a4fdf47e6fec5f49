use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;

use parser_cpp::ConfigError;

use crate::models::{FailureKind, FileFailure, FileParser, ScanResult};
use crate::scanner::collector;
use crate::scanner::parser::CppFileParser;

/// Configuration for the config scanning process
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// File extensions to process
    pub file_extensions: Vec<String>,
    /// Maximum number of threads to use for scanning
    pub threads: usize,
    /// Maximum number of files to process (0 = unlimited)
    pub max_files: usize,
    /// Whether to descend into subdirectories
    pub recursive: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            file_extensions: collector::default_extensions(),
            threads: num_cpus::get(),
            max_files: 0,
            recursive: true,
        }
    }
}

/// Scan a directory tree of config files with configuration
pub fn scan_with_config(input_dir: &Path, config: &ScannerConfig) -> Result<ScanResult> {
    info!("Scanning for config files in {}", input_dir.display());
    debug!("Using {} threads", config.threads);

    let mut files =
        collector::collect_config_files(input_dir, &config.file_extensions, config.recursive)?;
    if config.max_files > 0 && files.len() > config.max_files {
        files.truncate(config.max_files);
    }

    if files.is_empty() {
        warn!("No config files found in {}", input_dir.display());
        return Ok(ScanResult::new());
    }
    info!("Found {} config files", files.len());

    let start_time = Instant::now();
    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    progress.set_message("Parsing config files");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()?;

    let file_results: Vec<_> = pool.install(|| {
        files
            .par_iter()
            .progress_with(progress.clone())
            .map(|path| {
                let parser = CppFileParser;
                let file_start = Instant::now();
                let outcome = parser.parse_file(path);
                (path, outcome, file_start.elapsed().as_millis() as u64)
            })
            .collect()
    });

    let mut result = ScanResult::new();
    result.files_scanned = files.len();
    for (path, outcome, duration_ms) in file_results {
        match outcome {
            Ok(classes) => {
                debug!("Parsed {} classes from {}", classes.len(), path.display());
                result.add_classes(classes);
            }
            Err(error) => {
                warn!("Failed to parse {}: {error:#}", path.display());
                result.files_with_errors += 1;
                let config_error = error.downcast_ref::<ConfigError>();
                let position = config_error.and_then(|e| e.position());
                result.failures.push(FileFailure {
                    file_path: path.clone(),
                    kind: failure_kind(config_error),
                    error_message: format!("{error:#}"),
                    error_line: position.map(|p| p.line),
                    error_column: position.map(|p| p.column),
                    parse_duration_ms: duration_ms,
                });
            }
        }
    }
    result.scan_time_ms = Some(start_time.elapsed().as_millis() as u64);

    progress.finish_with_message(format!(
        "Parsed {} files, {} classes, {} failures",
        result.files_scanned, result.classes_found, result.files_with_errors
    ));
    Ok(result)
}

/// Scan with default configuration
pub fn scan(input_dir: &Path) -> Result<ScanResult> {
    scan_with_config(input_dir, &ScannerConfig::default())
}

/// Errors that are not parser errors come from reading the file.
fn failure_kind(error: Option<&ConfigError>) -> FailureKind {
    match error {
        Some(ConfigError::Lex { .. }) => FailureKind::Lex,
        Some(ConfigError::Macro { .. }) => FailureKind::Macro,
        Some(ConfigError::Syntax { .. }) => FailureKind::Syntax,
        Some(ConfigError::Resolution { .. }) => FailureKind::Resolution,
        None => FailureKind::Io,
    }
}
