use log::debug;
use regex::Regex;
use std::fs;
use std::path::Path;

use crate::error::{DirProbeError, Result};

/// Load candidates from a wordlist file, one per line. Lines are trimmed;
/// blank lines and `#` comments are skipped. Duplicates are kept, since each
/// line is an independent probe the caller asked for.
pub fn load<P: AsRef<Path>>(path: P, exclude: &[Regex]) -> Result<Vec<String>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DirProbeError::FileNotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path)?;
    let mut candidates = Vec::new();
    let mut excluded = 0usize;

    for line in content.lines() {
        let candidate = line.trim();
        if candidate.is_empty() || candidate.starts_with('#') {
            continue;
        }
        if exclude.iter().any(|pattern| pattern.is_match(candidate)) {
            excluded += 1;
            continue;
        }
        candidates.push(candidate.to_string());
    }

    debug!(
        "loaded {} candidates from {} ({} excluded by pattern)",
        candidates.len(),
        path.display(),
        excluded
    );
    Ok(candidates)
}
