//! Sync cache
//!
//! A successful sync leaves two artifacts under `<project>/.tooling/`: the
//! serialized project model and a metadata file fingerprinting every build
//! file that could change the model. A later initialization compares the
//! fingerprints against the tree on disk to decide whether the cached model
//! is still good.
//!
//! Everything here does blocking file IO.

use super::lock::SyncLock;
use super::model::ProjectModel;
use crate::error::ToolingResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory holding the cache artifacts, relative to the project
pub const CACHE_DIR: &str = ".tooling";
pub const MODEL_FILE: &str = "project-model.json";
pub const META_FILE: &str = "sync-meta.json";
pub const LOCK_FILE: &str = "sync.lock";

const WATCHED_EXTENSIONS: &[&str] = &[".gradle", ".gradle.kts"];
const WATCHED_NAMES: &[&str] = &[
    "gradle.properties",
    "local.properties",
    "gradle-wrapper.properties",
];
const SKIPPED_DIRS: &[&str] = &[".git", ".gradle", ".kotlin", ".cxx", CACHE_DIR, "build"];

/// Fingerprint of one watched file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub relative_path: String,
    pub canonical_path: PathBuf,
    pub size: u64,
    /// Milliseconds since the Unix epoch
    pub mtime: u64,
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFileInfo {
    pub path: PathBuf,
    pub sha256: String,
}

/// Contents of the sync metadata file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    pub watched_files: Vec<FileInfo>,
    #[serde(default)]
    pub model_file: Option<ModelFileInfo>,
}

pub fn cache_file_for_project(project_dir: &Path) -> PathBuf {
    project_dir.join(CACHE_DIR).join(MODEL_FILE)
}

pub fn sync_meta_file_for_project(project_dir: &Path) -> PathBuf {
    project_dir.join(CACHE_DIR).join(META_FILE)
}

pub fn lock_file_for_project(project_dir: &Path) -> PathBuf {
    project_dir.join(CACHE_DIR).join(LOCK_FILE)
}

/// Whether both cache artifacts exist and can be opened
pub fn are_sync_files_readable(project_dir: &Path) -> bool {
    [
        cache_file_for_project(project_dir),
        sync_meta_file_for_project(project_dir),
    ]
    .iter()
    .all(|path| path.is_file() && File::open(path).is_ok())
}

fn is_watched(file_name: &str) -> bool {
    WATCHED_NAMES.contains(&file_name)
        || WATCHED_EXTENSIONS
            .iter()
            .any(|ext| file_name.ends_with(ext) && file_name.len() > ext.len())
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn fingerprint(project_dir: &Path, path: &Path, include_checksum: bool) -> io::Result<FileInfo> {
    let metadata = std::fs::metadata(path)?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let relative = path.strip_prefix(project_dir).unwrap_or(path);
    let canonical_path = std::fs::canonicalize(path)?;
    let sha256 = if include_checksum {
        Some(sha256_file(&canonical_path)?)
    } else {
        None
    };

    Ok(FileInfo {
        relative_path: relative.to_string_lossy().replace('\\', "/"),
        canonical_path,
        size: metadata.len(),
        mtime,
        sha256,
    })
}

/// Fingerprint every watched file under `project_dir`
pub fn collect_watched_files(project_dir: &Path, include_checksum: bool) -> io::Result<Vec<FileInfo>> {
    let walker = WalkDir::new(project_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().is_dir()
                && SKIPPED_DIRS
                    .iter()
                    .any(|skip| entry.file_name().to_str() == Some(*skip)))
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        let watched = entry.file_name().to_str().map(is_watched).unwrap_or(false);
        if watched {
            files.push(fingerprint(project_dir, entry.path(), include_checksum)?);
        }
    }

    Ok(files)
}

/// Build fresh metadata for the project, fingerprinting the model file too
pub fn create_sync_meta(project_dir: &Path) -> io::Result<SyncMeta> {
    let model_path = cache_file_for_project(project_dir);
    let model_file = if model_path.is_file() {
        Some(ModelFileInfo {
            sha256: sha256_file(&model_path)?,
            path: model_path,
        })
    } else {
        None
    };

    Ok(SyncMeta {
        watched_files: collect_watched_files(project_dir, true)?,
        model_file,
    })
}

pub fn load_sync_meta(project_dir: &Path) -> ToolingResult<SyncMeta> {
    let text = std::fs::read_to_string(sync_meta_file_for_project(project_dir))?;
    Ok(serde_json::from_str(&text)?)
}

/// Whether the cached model may be out of date with the build files on disk
pub fn check_sync_needed(project_dir: &Path) -> bool {
    let stored = match load_sync_meta(project_dir) {
        Ok(meta) => meta,
        Err(e) => {
            debug!("Sync needed: no usable sync metadata ({})", e);
            return true;
        }
    };

    let current = match collect_watched_files(project_dir, false) {
        Ok(files) => files,
        Err(e) => {
            warn!("Sync needed: failed to scan build files: {}", e);
            return true;
        }
    };

    let current_paths: BTreeSet<_> = current.iter().map(|f| f.relative_path.as_str()).collect();
    let stored_paths: BTreeSet<_> = stored
        .watched_files
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect();
    if current_paths != stored_paths {
        debug!("Sync needed: set of build files changed");
        return true;
    }

    let stored_by_path: BTreeMap<_, _> = stored
        .watched_files
        .iter()
        .map(|f| (f.relative_path.as_str(), f))
        .collect();

    for file in &current {
        let Some(previous) = stored_by_path.get(file.relative_path.as_str()) else {
            continue;
        };

        if file.canonical_path != previous.canonical_path {
            debug!(
                "Sync needed: '{}' now resolves to {}",
                file.relative_path,
                file.canonical_path.display()
            );
            return true;
        }

        if file.size == previous.size && file.mtime == previous.mtime {
            continue;
        }

        let Some(expected) = previous.sha256.as_deref() else {
            debug!("Sync needed: no stored checksum for '{}'", file.relative_path);
            return true;
        };

        match sha256_file(&file.canonical_path) {
            Ok(actual) if actual.eq_ignore_ascii_case(expected) => {}
            Ok(_) => {
                debug!("Sync needed: '{}' changed", file.relative_path);
                return true;
            }
            Err(e) => {
                warn!("Sync needed: failed to hash '{}': {}", file.relative_path, e);
                return true;
            }
        }
    }

    false
}

fn write_atomically(target: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut temp = target.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    {
        let mut file = File::create(&temp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    std::fs::rename(&temp, target)
}

/// Persist a freshly synced model and its metadata.
///
/// Both writes happen under the project's sync lock. Returns the path of the
/// model cache file.
pub fn write_sync_artifacts(
    project_dir: &Path,
    model: &ProjectModel,
    lock_timeout: Duration,
) -> ToolingResult<PathBuf> {
    let _lock = SyncLock::acquire(&lock_file_for_project(project_dir), lock_timeout)?;

    let cache_file = cache_file_for_project(project_dir);
    let json = serde_json::to_vec_pretty(model)?;
    write_atomically(&cache_file, &json)?;
    debug!("Wrote project model to {}", cache_file.display());

    let meta = create_sync_meta(project_dir)?;
    let json = serde_json::to_vec_pretty(&meta)?;
    write_atomically(&sync_meta_file_for_project(project_dir), &json)?;

    Ok(cache_file)
}
