//! What to run and how

use crate::messages::ClientBuildConfig;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A fully resolved build-tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInvocation {
    pub tasks: Vec<String>,
    pub arguments: Vec<String>,
    pub jvm_arguments: Vec<String>,
}

impl BuildInvocation {
    /// Invocation for `tasks`, with blank names dropped
    pub fn new<I, S>(tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tasks: tasks
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.trim().is_empty())
                .collect(),
            arguments: Vec::new(),
            jvm_arguments: Vec::new(),
        }
    }

    /// Merge client tuning and request arguments.
    ///
    /// Client arguments come first, then `extra_args`; repeated arguments keep
    /// their first position.
    pub fn configure_from(mut self, client: Option<&ClientBuildConfig>, extra_args: &[String]) -> Self {
        let client_args = client.map(|c| c.build_args.as_slice()).unwrap_or_default();
        self.arguments = dedup(client_args.iter().chain(extra_args));

        if let Some(client) = client {
            self.jvm_arguments = dedup(client.jvm_args.iter());
        }
        self
    }

    /// Command line arguments for the CLI, tasks last
    pub fn command_line(&self) -> Vec<String> {
        let mut args = self.arguments.clone();
        if !self.jvm_arguments.is_empty() {
            args.push(format!("-Dorg.gradle.jvmargs={}", self.jvm_arguments.join(" ")));
        }
        args.extend(self.tasks.iter().cloned());
        args
    }
}

fn dedup<'a>(args: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for arg in args {
        if !arg.trim().is_empty() && seen.insert(arg.as_str()) {
            out.push(arg.clone());
        }
    }
    out
}

/// Destination for build output lines
#[derive(Clone)]
pub struct OutputSink(Arc<dyn Fn(&str) + Send + Sync>);

impl OutputSink {
    pub fn new(f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// A sink that drops everything
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    pub fn emit(&self, line: &str) {
        (self.0)(line)
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OutputSink")
    }
}
