//! Moves a finished payload out of the engine's working folder.
//!
//! # Design
//!
//! - A missing working folder means the payload was already moved; that is a success.
//! - Each top-level entry is renamed into the destination, falling back to
//!   copy-then-delete when the rename crosses volumes.
//! - Existing destination directories are merged entry by entry; existing files are replaced.
//! - All blocking work runs on the blocking thread pool.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::task;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

/// Outcome of a finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinalizeReport {
    /// Top-level entries moved into the destination.
    pub moved_entries: usize,
    /// The working folder was already gone.
    pub already_finalized: bool,
}

/// Moves a completed payload from a working folder into its destination.
#[async_trait]
pub trait PayloadFinalizer: Send + Sync {
    /// Move everything under `working` into `destination` and drop `working`.
    async fn finalize(&self, working: &Path, destination: &Path) -> FsOpsResult<FinalizeReport>;
}

/// Filesystem-backed [`PayloadFinalizer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFinalizer;

impl FsFinalizer {
    /// Construct the finalizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Synchronous implementation used by [`PayloadFinalizer::finalize`].
    ///
    /// # Errors
    ///
    /// Returns an error when the two folders overlap or any filesystem step fails.
    pub fn finalize_blocking(working: &Path, destination: &Path) -> FsOpsResult<FinalizeReport> {
        if !working.exists() {
            debug!(working = %working.display(), "working folder already gone");
            return Ok(FinalizeReport {
                moved_entries: 0,
                already_finalized: true,
            });
        }
        if destination.starts_with(working) {
            return Err(FsOpsError::InvalidInput {
                field: "destination_folder",
                reason: "inside_working_folder",
                value: Some(destination.display().to_string()),
            });
        }

        fs::create_dir_all(destination).map_err(|source| {
            FsOpsError::io("finalize.create_destination", destination, source)
        })?;

        let entries = fs::read_dir(working)
            .map_err(|source| FsOpsError::io("finalize.read_working", working, source))?;
        let mut moved_entries = 0;
        for entry in entries {
            let entry =
                entry.map_err(|source| FsOpsError::io("finalize.read_entry", working, source))?;
            let target = destination.join(entry.file_name());
            move_entry(&entry.path(), &target)?;
            moved_entries += 1;
        }

        remove_tree(working, "finalize.remove_working")?;
        info!(
            working = %working.display(),
            destination = %destination.display(),
            moved_entries,
            "payload finalized"
        );
        Ok(FinalizeReport {
            moved_entries,
            already_finalized: false,
        })
    }
}

#[async_trait]
impl PayloadFinalizer for FsFinalizer {
    async fn finalize(&self, working: &Path, destination: &Path) -> FsOpsResult<FinalizeReport> {
        let working = working.to_path_buf();
        let destination = destination.to_path_buf();
        task::spawn_blocking(move || Self::finalize_blocking(&working, &destination))
            .await
            .map_err(|source| FsOpsError::Join {
                operation: "finalize",
                source,
            })?
    }
}

fn move_entry(source: &Path, target: &Path) -> FsOpsResult<()> {
    let source_is_dir = source.is_dir();
    if source_is_dir && target.is_dir() {
        return merge_dir(source, target);
    }
    if target.exists() {
        replace_target(target)?;
    }
    move_tree(source, target)
}

fn merge_dir(source: &Path, target: &Path) -> FsOpsResult<()> {
    let entries =
        fs::read_dir(source).map_err(|err| FsOpsError::io("merge_dir.read", source, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| FsOpsError::io("merge_dir.read_entry", source, err))?;
        move_entry(&entry.path(), &target.join(entry.file_name()))?;
    }
    remove_tree(source, "merge_dir.cleanup")
}

fn replace_target(target: &Path) -> FsOpsResult<()> {
    let result = if target.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    };
    result.map_err(|err| FsOpsError::io("move_entry.replace_target", target, err))
}

fn move_tree(source: &Path, destination: &Path) -> FsOpsResult<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(
                source = %source.display(),
                error = %rename_err,
                "rename failed, copying instead"
            );
            copy_tree(source, destination)?;
            if source.is_dir() {
                remove_tree(source, "move_tree.cleanup")
            } else {
                fs::remove_file(source)
                    .map_err(|err| FsOpsError::io("move_tree.cleanup", source, err))
            }
        }
    }
}

fn copy_tree(source: &Path, destination: &Path) -> FsOpsResult<()> {
    if source.is_file() {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| FsOpsError::io("copy_tree.create_parent", parent, err))?;
        }
        fs::copy(source, destination)
            .map_err(|err| FsOpsError::io("copy_tree.copy_file", destination, err))?;
        return Ok(());
    }

    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|err| FsOpsError::walkdir("copy_tree.walk", source, err))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| FsOpsError::InvalidInput {
                field: "source_path",
                reason: "strip_prefix",
                value: Some(entry.path().to_string_lossy().into_owned()),
            })?;
        let target_path: PathBuf = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target_path)
                .map_err(|err| FsOpsError::io("copy_tree.create_dir", &target_path, err))?;
        } else {
            fs::copy(entry.path(), &target_path)
                .map_err(|err| FsOpsError::io("copy_tree.copy_entry", &target_path, err))?;
        }
    }
    Ok(())
}

fn remove_tree(path: &Path, operation: &'static str) -> FsOpsResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(FsOpsError::io(operation, path, err)),
    }
}
