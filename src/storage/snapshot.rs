// Whole-file JSON snapshots, replaced atomically

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Result, TandemError};

/// Write `value` to `path` via a temp file and rename, so readers never see
/// a partial snapshot. The temp file is synced before the rename and the
/// directory after it.
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| TandemError::Persistence(format!("snapshot path has no parent: {}", path.display())))?;
    fs::create_dir_all(parent)?;

    let contents = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    write_synced(&tmp_path, contents.as_bytes())
        .map_err(|e| TandemError::Persistence(format!("write {}: {}", tmp_path.display(), e)))?;
    fs::rename(&tmp_path, path).map_err(|e| TandemError::Persistence(format!("replace {}: {}", path.display(), e)))?;
    sync_dir(parent);
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// Best effort: not every platform can open a directory for syncing
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        log::debug!("Could not sync {}: {}", dir.display(), e);
    }
}

/// Read a snapshot; `None` if it was never written
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let value = serde_json::from_str(&contents)
        .map_err(|e| TandemError::Persistence(format!("parse {}: {}", path.display(), e)))?;
    Ok(Some(value))
}
