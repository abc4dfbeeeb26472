//! Input collection for a batch.
//!
//! Expands the paths given on the command line into the list of source files:
//! files are taken as-is, directories contribute the video files directly
//! inside them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Video file extensions picked up from directories (case-insensitive).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Checks if a file has a video extension (case-insensitive).
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Expand `paths` into the ordered, duplicate-free list of files to encode.
///
/// - Explicit files are kept in the order given, whatever their extension
/// - A directory contributes its direct children with a video extension,
///   sorted by file name; subdirectories are not descended into
/// - Paths that don't exist are skipped with a warning
/// - Repeated paths keep their first position
pub fn collect_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let walker = WalkDir::new(path)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name();

            for entry in walker.into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && is_video_file(entry.path()) {
                    push_unique(&mut files, &mut seen, entry.into_path());
                }
            }
        } else if path.exists() {
            push_unique(&mut files, &mut seen, path.clone());
        } else {
            warn!(path = %path.display(), "input not found, skipping");
        }
    }

    debug!(count = files.len(), "collected inputs");
    files
}

fn push_unique(files: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>, path: PathBuf) {
    if seen.insert(path.clone()) {
        files.push(path);
    }
}
