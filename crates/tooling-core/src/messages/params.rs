//! Parameters sent by the client

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Opaque identifier correlating a build with its notifications
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(pub String);

impl BuildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random build id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BuildId {
    fn default() -> Self {
        Self::generate()
    }
}

impl From<&str> for BuildId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BuildId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the build tool is located
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BuildDistribution {
    /// The project's bundled wrapper script
    #[default]
    Wrapper,
    /// An explicit local installation
    Installation { path: PathBuf },
    /// An explicit version string
    Version { version: String },
}

impl BuildDistribution {
    pub fn is_wrapper(&self) -> bool {
        matches!(self, Self::Wrapper)
    }
}

/// Parameters of the `initialize` request
///
/// Compared by structural equality to detect a repeated, identical
/// initialization. `build_id` holds only what the client sent, so two
/// requests without one still compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub project_directory: PathBuf,
    #[serde(default)]
    pub build_distribution: BuildDistribution,
    #[serde(default)]
    pub needs_full_sync: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<BuildId>,
}

impl InitializeParams {
    pub fn new(project_directory: impl Into<PathBuf>) -> Self {
        Self {
            project_directory: project_directory.into(),
            build_distribution: BuildDistribution::Wrapper,
            needs_full_sync: false,
            build_id: None,
        }
    }

    pub fn with_distribution(mut self, distribution: BuildDistribution) -> Self {
        self.build_distribution = distribution;
        self
    }

    pub fn with_full_sync(mut self, needs_full_sync: bool) -> Self {
        self.needs_full_sync = needs_full_sync;
        self
    }

    pub fn with_build_id(mut self, build_id: impl Into<BuildId>) -> Self {
        self.build_id = Some(build_id.into());
        self
    }
}

/// Parameters of the `executeTasks` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    #[serde(default)]
    pub build_id: BuildId,
    pub task_names: Vec<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl BuildRequest {
    pub fn new<I, S>(task_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            build_id: BuildId::generate(),
            task_names: task_names.into_iter().map(Into::into).collect(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_build_id(mut self, build_id: impl Into<BuildId>) -> Self {
        self.build_id = build_id.into();
        self
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Sent to the client with `prepareBuild` before a build starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub build_id: BuildId,
    pub tasks: Vec<String>,
}

impl BuildInfo {
    pub fn new(build_id: BuildId, tasks: Vec<String>) -> Self {
        Self { build_id, tasks }
    }
}

/// Build tuning returned by the client from `prepareBuild`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClientBuildConfig {
    /// Extra build-tool arguments (`--parallel`, `--max-workers=4`, ...)
    #[serde(default)]
    pub build_args: Vec<String>,
    /// JVM arguments for the build daemon
    #[serde(default)]
    pub jvm_args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_params_wire_format() {
        let params: InitializeParams = serde_json::from_value(json!({
            "projectDirectory": "/proj",
            "buildDistribution": {"type": "installation", "path": "/opt/gradle"},
            "needsFullSync": true,
            "buildId": "b-1"
        }))
        .unwrap();

        assert_eq!(params.project_directory, PathBuf::from("/proj"));
        assert_eq!(
            params.build_distribution,
            BuildDistribution::Installation {
                path: PathBuf::from("/opt/gradle")
            }
        );
        assert!(params.needs_full_sync);
        assert_eq!(params.build_id, Some(BuildId::new("b-1")));
    }

    #[test]
    fn test_initialize_params_defaults() {
        let params: InitializeParams =
            serde_json::from_value(json!({"projectDirectory": "/proj"})).unwrap();

        assert!(params.build_distribution.is_wrapper());
        assert!(!params.needs_full_sync);
        assert_eq!(params.build_id, None);
    }

    #[test]
    fn test_identical_requests_without_build_id_are_equal() {
        let request = json!({"projectDirectory": "/proj"});
        let a: InitializeParams = serde_json::from_value(request.clone()).unwrap();
        let b: InitializeParams = serde_json::from_value(request).unwrap();

        assert_eq!(a, b);
        assert!(!serde_json::to_value(&a).unwrap().as_object().unwrap().contains_key("buildId"));
    }

    #[test]
    fn test_params_equality_is_structural() {
        let a = InitializeParams::new("/proj").with_build_id("same");
        let b = InitializeParams::new("/proj").with_build_id("same");
        assert_eq!(a, b);

        let c = b.clone().with_distribution(BuildDistribution::Version {
            version: "8.7".into(),
        });
        assert_ne!(a, c);

        let d = a.clone().with_full_sync(true);
        assert_ne!(a, d);
    }

    #[test]
    fn test_version_distribution_wire_format() {
        let value = serde_json::to_value(BuildDistribution::Version {
            version: "8.7".into(),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "version", "version": "8.7"}));
    }
}
