//! Locating the Gradle executable for a distribution

use crate::messages::BuildDistribution;
use std::path::{Path, PathBuf};
use tracing::warn;

#[cfg(windows)]
const WRAPPER_SCRIPT: &str = "gradlew.bat";
#[cfg(not(windows))]
const WRAPPER_SCRIPT: &str = "gradlew";

#[cfg(windows)]
const GRADLE_BINARY: &str = "gradle.bat";
#[cfg(not(windows))]
const GRADLE_BINARY: &str = "gradle";

/// Gradle user home: configured value, then `GRADLE_USER_HOME`, then `~/.gradle`
pub fn gradle_user_home(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    if let Some(path) = std::env::var_os("GRADLE_USER_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }

    dirs::home_dir()
        .map(|home| home.join(".gradle"))
        .unwrap_or_else(|| PathBuf::from(".gradle"))
}

/// Resolves distributions to executables
#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    user_home: PathBuf,
}

impl ExecutableResolver {
    pub fn new(user_home: impl Into<PathBuf>) -> Self {
        Self {
            user_home: user_home.into(),
        }
    }

    pub fn resolve(&self, project_dir: &Path, distribution: &BuildDistribution) -> PathBuf {
        match distribution {
            BuildDistribution::Wrapper => wrapper_executable(project_dir),
            BuildDistribution::Installation { path } => match installation_executable(path) {
                Some(executable) => executable,
                None => {
                    warn!(
                        "Gradle installation {} is not a directory, keeping default distribution",
                        path.display()
                    );
                    wrapper_executable(project_dir)
                }
            },
            BuildDistribution::Version { version } => {
                match version_executable(&self.user_home, version) {
                    Some(executable) => executable,
                    None => {
                        warn!(
                            "Gradle {} not found under {}, using gradle from PATH",
                            version,
                            self.user_home.display()
                        );
                        PathBuf::from(GRADLE_BINARY)
                    }
                }
            }
        }
    }
}

fn wrapper_executable(project_dir: &Path) -> PathBuf {
    let wrapper = project_dir.join(WRAPPER_SCRIPT);
    if wrapper.is_file() {
        wrapper
    } else {
        warn!(
            "No Gradle wrapper in {}, using gradle from PATH",
            project_dir.display()
        );
        PathBuf::from(GRADLE_BINARY)
    }
}

fn installation_executable(path: &Path) -> Option<PathBuf> {
    if !path.is_dir() {
        return None;
    }
    Some(path.join("bin").join(GRADLE_BINARY))
}

/// Find an unpacked wrapper distribution of `version`
fn version_executable(user_home: &Path, version: &str) -> Option<PathBuf> {
    let dists = user_home.join("wrapper").join("dists");

    for flavor in ["bin", "all"] {
        let dir = dists.join(format!("gradle-{}-{}", version, flavor));
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };

        let mut hashes: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        hashes.sort();

        let found = hashes.into_iter().find_map(|hash_dir| {
            let candidate = hash_dir
                .join(format!("gradle-{}", version))
                .join("bin")
                .join(GRADLE_BINARY);
            candidate.is_file().then_some(candidate)
        });
        if found.is_some() {
            return found;
        }
    }

    None
}
