// Corpus directory scan: one folder of .mid files per composer

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Files found under the base directory, in composer then file-name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    /// Composer labels in the order they were scanned
    pub composers: Vec<String>,
    pub files: Vec<PathBuf>,
    /// Files found per composer; missing folders count as 0
    pub counts: BTreeMap<String, usize>,
}

impl ScanResult {
    pub fn total_files(&self) -> usize {
        self.files.len()
    }
}

/// Sort and de-duplicate composer labels. Every run enumerates composers in
/// this order, so label indices stay stable for downstream encoders.
pub fn sorted_labels(composers: &[String]) -> Vec<String> {
    let mut labels = composers.to_vec();
    labels.sort();
    labels.dedup();
    labels
}

/// True for paths ending in `.mid`, any case.
pub fn is_midi_path(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("mid"))
        .unwrap_or(false)
}

/// Collect `base_directory/<composer>/*.mid` for each configured composer.
///
/// Missing composer folders and non-MIDI entries are logged and skipped.
pub fn scan_corpus(base_directory: &Path, composers: &[String]) -> ScanResult {
    let labels = sorted_labels(composers);
    log::info!("Processing composers in order: {:?}", labels);

    let mut files = Vec::new();
    let mut counts = BTreeMap::new();

    for composer in &labels {
        let composer_dir = base_directory.join(composer);
        let found = scan_composer_dir(&composer_dir);
        counts.insert(composer.clone(), found.len());
        files.extend(found);
    }

    log::info!("Initial files per composer:");
    for (composer, count) in &counts {
        log::info!("  {}: {} MIDI files", composer, count);
    }
    log::info!("Total MIDI files found: {}", files.len());

    ScanResult {
        composers: labels,
        files,
        counts,
    }
}

fn scan_composer_dir(composer_dir: &Path) -> Vec<PathBuf> {
    if !composer_dir.is_dir() {
        log::warn!("Composer folder not found: {}", composer_dir.display());
        return Vec::new();
    }

    let entries = match std::fs::read_dir(composer_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Failed to read composer folder {}: {}", composer_dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => paths.push(entry.path()),
            Err(e) => log::warn!("Skipping unreadable entry in {}: {}", composer_dir.display(), e),
        }
    }
    // read_dir order is filesystem-dependent
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    paths
        .into_iter()
        .filter(|path| {
            let keep = path.is_file() && is_midi_path(path);
            if !keep {
                log::info!("Skipping invalid file or folder: {}", path.display());
            }
            keep
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_labels_dedup() {
        let labels = sorted_labels(&["mozart".to_string(), "alkan".to_string(), "mozart".to_string()]);
        assert_eq!(labels, vec!["alkan".to_string(), "mozart".to_string()]);
    }

    #[test]
    fn test_midi_extension_case_insensitive() {
        assert!(is_midi_path(Path::new("a/Op1.mid")));
        assert!(is_midi_path(Path::new("a/Op1.MID")));
        assert!(!is_midi_path(Path::new("a/Op1.midi")));
        assert!(!is_midi_path(Path::new("a/notes.txt")));
        assert!(!is_midi_path(Path::new("a/mid")));
    }

    #[test]
    fn test_missing_base_directory_yields_zero_counts() {
        let result = scan_corpus(Path::new("/nonexistent/corpus/base"), &["alkan".to_string()]);
        assert!(result.files.is_empty());
        assert_eq!(result.counts.get("alkan"), Some(&0));
    }
}
