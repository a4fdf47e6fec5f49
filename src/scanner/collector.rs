use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::debug;
use walkdir::WalkDir;

/// Find all config files in a directory
pub fn collect_config_files(
    dir: &Path,
    allowed_extensions: &[String],
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(anyhow!("Input directory does not exist: {}", dir.display()));
    }
    if let Err(e) = std::fs::read_dir(dir) {
        return Err(anyhow!(
            "Input directory is not readable: {} - {}",
            dir.display(),
            e
        ));
    }

    let walker = if recursive {
        WalkDir::new(dir)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut config_files = Vec::new();
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            if allowed_extensions.contains(&ext) {
                config_files.push(path.to_path_buf());
            }
        }
    }

    config_files.sort();
    debug!("Collected {} config files from {}", config_files.len(), dir.display());
    Ok(config_files)
}

/// Default extensions handled by the config parser
pub fn default_extensions() -> Vec<String> {
    vec!["cpp".to_string(), "hpp".to_string(), "h".to_string(), "ext".to_string()]
}
