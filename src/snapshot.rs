// Snapshot file operations

use crate::models::Snapshot;
use eyre::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Write the full store as pretty-printed JSON
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create snapshot directory")?;
    }

    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;

    let mut file = File::create(path).context("Failed to create snapshot file")?;
    file.lock_exclusive().context("Failed to acquire file lock")?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;

    info!(
        file = ?path,
        tasks = snapshot.tasks.len(),
        lists = snapshot.lists.len(),
        "Exported snapshot"
    );
    Ok(())
}

/// Read a snapshot written by `write_snapshot`
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot: Snapshot =
        serde_json::from_str(&content).with_context(|| format!("Invalid snapshot file {}", path.display()))?;

    info!(
        file = ?path,
        tasks = snapshot.tasks.len(),
        lists = snapshot.lists.len(),
        "Loaded snapshot"
    );
    Ok(snapshot)
}
