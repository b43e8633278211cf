//! Project structure reported by the build tool

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of a model sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectModel {
    #[serde(default)]
    pub gradle_version: Option<String>,
    pub root: ProjectNode,
}

/// One (sub)project in the build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    pub name: String,
    /// Gradle project path, `:` for the root
    pub path: String,
    pub project_dir: PathBuf,
    #[serde(default)]
    pub build_file: Option<PathBuf>,
    #[serde(default)]
    pub children: Vec<ProjectNode>,
}

impl ProjectNode {
    pub fn new(name: impl Into<String>, path: impl Into<String>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            project_dir: project_dir.into(),
            build_file: None,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: ProjectNode) -> Self {
        self.children.push(child);
        self
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a ProjectNode>) {
        out.push(self);
        for child in &self.children {
            child.visit(out);
        }
    }
}

impl ProjectModel {
    pub fn new(root: ProjectNode) -> Self {
        Self {
            gradle_version: None,
            root,
        }
    }

    /// All projects, root first, depth first
    pub fn projects(&self) -> Vec<&ProjectNode> {
        let mut out = Vec::new();
        self.root.visit(&mut out);
        out
    }

    /// Look up a project by its Gradle path
    pub fn find(&self, path: &str) -> Option<&ProjectNode> {
        self.projects().into_iter().find(|p| p.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_and_lookup() {
        let model = ProjectModel::new(
            ProjectNode::new("demo", ":", "/proj")
                .with_child(
                    ProjectNode::new("app", ":app", "/proj/app")
                        .with_child(ProjectNode::new("core", ":app:core", "/proj/app/core")),
                )
                .with_child(ProjectNode::new("lib", ":lib", "/proj/lib")),
        );

        let paths: Vec<_> = model.projects().iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec![":", ":app", ":app:core", ":lib"]);
        assert_eq!(model.find(":lib").unwrap().name, "lib");
        assert!(model.find(":missing").is_none());
    }

    #[test]
    fn test_optional_fields_default() {
        let model: ProjectModel = serde_json::from_str(
            r#"{"root":{"name":"demo","path":":","projectDir":"/proj"}}"#,
        )
        .unwrap();
        assert!(model.gradle_version.is_none());
        assert!(model.root.children.is_empty());
        assert!(model.root.build_file.is_none());
    }
}
