//! Working folders left behind by an earlier process.
//!
//! Job state is not persisted, so a numeric child of the work root that no
//! live job owns is an orphan. Scanning only reports them; purging is opt-in.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tokio::task;
use tracing::warn;

use crate::error::{FsOpsError, FsOpsResult};

/// List numeric child directories of `work_root`, sorted by job number.
///
/// A missing work root yields an empty list.
///
/// # Errors
///
/// Returns an error when the work root exists but cannot be read.
pub fn scan_orphans(work_root: &Path) -> FsOpsResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(work_root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(FsOpsError::io("orphans.read_root", work_root, err)),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| FsOpsError::io("orphans.read_entry", work_root, err))?;
        let Some(number) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u64>().ok())
        else {
            continue;
        };
        if entry.path().is_dir() {
            found.push((number, entry.path()));
        }
    }
    found.sort_by_key(|(number, _)| *number);
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Remove the given folders, logging and skipping any that cannot be removed.
///
/// Returns how many were removed.
pub fn purge_orphans(folders: &[PathBuf]) -> usize {
    folders
        .iter()
        .filter(|folder| match fs::remove_dir_all(folder) {
            Ok(()) => true,
            Err(err) => {
                warn!(folder = %folder.display(), error = %err, "failed to purge orphaned folder");
                false
            }
        })
        .count()
}

/// Delete a working folder on the blocking pool; a missing folder is fine.
///
/// # Errors
///
/// Returns an error when the folder exists but cannot be removed.
pub async fn remove_working_folder(path: &Path) -> FsOpsResult<()> {
    let owned = path.to_path_buf();
    task::spawn_blocking(move || match fs::remove_dir_all(&owned) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(FsOpsError::io("remove_working_folder", &owned, err)),
    })
    .await
    .map_err(|source| FsOpsError::Join {
        operation: "remove_working_folder",
        source,
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn scan_reports_numeric_directories_in_order() -> Result<()> {
        let root = TempDir::new()?;
        for name in ["10", "2", "notes", "7"] {
            fs::create_dir_all(root.path().join(name))?;
        }
        fs::write(root.path().join("3"), b"file, not folder")?;

        let orphans = scan_orphans(root.path())?;
        let names: Vec<_> = orphans
            .iter()
            .filter_map(|path| path.file_name()?.to_str().map(str::to_owned))
            .collect();
        assert_eq!(names, vec!["2", "7", "10"]);
        Ok(())
    }

    #[test]
    fn scan_of_missing_root_is_empty() -> Result<()> {
        let root = TempDir::new()?;
        assert!(scan_orphans(&root.path().join("absent"))?.is_empty());
        Ok(())
    }

    #[test]
    fn purge_removes_folders() -> Result<()> {
        let root = TempDir::new()?;
        let folder = root.path().join("4");
        fs::create_dir_all(folder.join("partial"))?;
        let missing = root.path().join("5");
        assert_eq!(purge_orphans(&[folder.clone(), missing]), 1);
        assert!(!folder.exists());
        Ok(())
    }

    #[tokio::test]
    async fn remove_working_folder_tolerates_absence() -> Result<()> {
        let root = TempDir::new()?;
        let folder = root.path().join("9");
        fs::create_dir_all(&folder)?;
        remove_working_folder(&folder).await?;
        assert!(!folder.exists());
        remove_working_folder(&folder).await?;
        Ok(())
    }
}
