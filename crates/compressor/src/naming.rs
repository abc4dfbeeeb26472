//! Output file naming and collision avoidance.
//!
//! Outputs land next to their source as `<stem>_<tier>_compressed.mp4`. When
//! that name is taken, a counter is inserted before the suffix
//! (`<stem>_<tier>_1_compressed.mp4`, `_2_`, ...) until a free name is found.
//! History tooling parses these names, so the format must not drift.

use crate::config::QualityTier;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Extension of every output file
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Suffix closing every output file stem
const COMPRESSED_SUFFIX: &str = "compressed";

/// Build the file name for attempt `counter` (0 = no counter).
pub fn output_file_name(stem: &str, tier: QualityTier, counter: u32) -> String {
    if counter == 0 {
        format!(
            "{}_{}_{}.{}",
            stem,
            tier.label(),
            COMPRESSED_SUFFIX,
            OUTPUT_EXTENSION
        )
    } else {
        format!(
            "{}_{}_{}_{}.{}",
            stem,
            tier.label(),
            counter,
            COMPRESSED_SUFFIX,
            OUTPUT_EXTENSION
        )
    }
}

/// Pick a destination for `source` that neither exists on disk nor is in
/// `reserved`.
///
/// The check is not atomic: another process creating the same name between
/// resolution and encode start is not detected.
pub fn resolve_output_path(
    source: &Path,
    tier: QualityTier,
    reserved: &HashSet<PathBuf>,
) -> PathBuf {
    let dir = source.parent().unwrap_or_else(|| Path::new(""));
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut counter = 0;
    loop {
        let candidate = dir.join(output_file_name(&stem, tier, counter));
        if !candidate.exists() && !reserved.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
