//! Persistence of the final equivalence map.
//!
//! The output is one pretty-printed JSON object:
//!
//! ```text
//! {
//!   "MATH 19A": [
//!     { "dept_code": "MATH", "number": "1A", "title": "Calculus I",
//!       "institution_name": "Foothill College" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use articulate_decoder::EquivalenceMap;
use articulate_shared::{ArticulateError, Result};

/// Metadata about a written output file.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OutputMeta {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Write `map` to `path` atomically (temp file, then rename).
#[instrument(skip_all, fields(path = %path.display(), courses = map.len()))]
pub fn write_equivalence_map(path: &Path, map: &EquivalenceMap) -> Result<OutputMeta> {
    let json = serde_json::to_string_pretty(map).map_err(|e| {
        ArticulateError::validation(format!("JSON serialization failed: {e}"))
    })?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        std::fs::create_dir_all(parent).map_err(|e| ArticulateError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| ArticulateError::validation(format!("{} is not a file path", path.display())))?;
    let temp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    std::fs::write(&temp, &json).map_err(|e| ArticulateError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| ArticulateError::io(path, e))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(size = json.len(), %sha256, "wrote equivalence map");
    info!(
        courses = map.len(),
        entries = map.total_entries(),
        "equivalence map written"
    );

    Ok(OutputMeta {
        path: path.to_path_buf(),
        sha256,
        size_bytes: json.len(),
    })
}

/// Read a previously written equivalence map.
pub fn read_equivalence_map(path: &Path) -> Result<EquivalenceMap> {
    let content = std::fs::read_to_string(path).map_err(|e| ArticulateError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        ArticulateError::validation(format!("invalid equivalence map {}: {e}", path.display()))
    })
}
