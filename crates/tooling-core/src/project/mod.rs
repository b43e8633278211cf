//! Project directory handling
//!
//! Validation of the directory a client asks us to open, the project model
//! produced by a sync, and the on-disk sync cache that lets a repeated
//! initialization skip the sync.

mod lock;
mod model;
pub mod sync;

pub use lock::SyncLock;
pub use model::{ProjectModel, ProjectNode};

use crate::failure::FailureReason;
use std::path::Path;

/// Check that `dir` can be opened as a project.
///
/// Checks run in a fixed order: existence, then kind, then readability. The
/// first failing check decides the reason.
pub fn validate_project_directory(dir: &Path) -> Option<FailureReason> {
    if !dir.exists() {
        return Some(FailureReason::ProjectNotFound);
    }

    if !dir.is_dir() {
        return Some(FailureReason::ProjectNotDirectory);
    }

    if std::fs::read_dir(dir).is_err() {
        return Some(FailureReason::ProjectDirectoryInaccessible);
    }

    None
}
