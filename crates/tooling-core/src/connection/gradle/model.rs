//! Project model handshake
//!
//! Gradle has no command that prints the project structure in a machine
//! readable form, so the sync runs the `help` task with an init script that
//! prints the whole project tree as one JSON line behind a marker.

use crate::error::{ToolingError, ToolingResult};
use crate::project::ProjectModel;

pub const MODEL_MARKER: &str = "@@TOOLING_MODEL@@";

pub const INIT_SCRIPT_NAME: &str = "model-init.gradle";

pub const INIT_SCRIPT: &str = r#"import groovy.json.JsonOutput

def describe(project) {
    [
        name: project.name,
        path: project.path,
        projectDir: project.projectDir.absolutePath,
        buildFile: project.buildFile.exists() ? project.buildFile.absolutePath : null,
        children: project.childProjects.values().sort { it.path }.collect { describe(it) }
    ]
}

gradle.projectsEvaluated { g ->
    def model = [gradleVersion: g.gradleVersion, root: describe(g.rootProject)]
    println "@@TOOLING_MODEL@@" + JsonOutput.toJson(model)
}
"#;

/// If `line` carries the model, return its JSON payload
pub fn model_payload(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix(MODEL_MARKER)
}

pub fn parse_model(payload: &str) -> ToolingResult<ProjectModel> {
    serde_json::from_str(payload)
        .map_err(|e| ToolingError::build(format!("Invalid project model from Gradle: {}", e)))
}
