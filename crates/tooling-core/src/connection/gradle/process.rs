//! Running the Gradle command line client

use crate::error::{ToolingError, ToolingResult};
use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Lines kept for classifying a failed build
const DIAGNOSTIC_LINES: usize = 200;
/// How long an interrupted build may take to wind down before it is killed
const INTERRUPT_GRACE: Duration = Duration::from_secs(30);
/// How long to wait for trailing output once the process exited
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Run `executable args..` in `project_dir`, feeding every output line to
/// `on_line`.
#[instrument(skip_all, fields(executable = %executable.display()))]
pub async fn run_gradle(
    executable: &Path,
    project_dir: &Path,
    args: &[String],
    mut on_line: impl FnMut(&str),
    cancel: CancellationToken,
) -> ToolingResult<()> {
    debug!("gradle {}", args.join(" "));

    let mut child = Command::new(executable)
        .arg("--console=plain")
        .args(args)
        .current_dir(project_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            ToolingError::connection(format!(
                "Failed to start {}: {}",
                executable.display(),
                e
            ))
        })?;

    let (sender, mut lines) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, sender.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, sender));
    }

    let mut tail = VecDeque::with_capacity(DIAGNOSTIC_LINES);
    let mut record = |line: String| {
        on_line(&line);
        if tail.len() == DIAGNOSTIC_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    };

    let mut cancelled = false;
    let mut kill_deadline: Option<Instant> = None;
    let mut lines_open = true;

    let status = loop {
        tokio::select! {
            line = lines.recv(), if lines_open => match line {
                Some(line) => record(line),
                None => lines_open = false,
            },
            status = child.wait() => break status?,
            _ = cancel.cancelled(), if !cancelled => {
                cancelled = true;
                interrupt(&mut child);
                kill_deadline = Some(Instant::now() + INTERRUPT_GRACE);
            }
            _ = sleep_until(kill_deadline), if kill_deadline.is_some() => {
                warn!("Build did not stop after interrupt, killing it");
                kill_deadline = None;
                let _ = child.start_kill();
            }
        }
    };

    let _ = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while let Some(line) = lines.recv().await {
            record(line);
        }
    })
    .await;

    if cancelled {
        return Err(ToolingError::Cancelled);
    }

    if status.success() {
        return Ok(());
    }

    Err(classify_failure(status, tail.make_contiguous()))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Forward output lines until end of stream. Bytes that are not UTF-8 are
/// replaced, and the pipe is drained to the end so the build never blocks on
/// a full pipe.
async fn forward_lines<R: AsyncRead + Unpin>(reader: R, sender: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut forwarding = true;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read build output: {}", e);
                break;
            }
        }

        if !forwarding {
            continue;
        }

        let line = String::from_utf8_lossy(trim_line_end(&buf)).into_owned();
        if sender.send(line).is_err() {
            forwarding = false;
        }
    }
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    if let [rest @ .., b'\n'] = line {
        line = rest;
    }
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }
    line
}

/// Ask the build to stop the way a terminal user would
fn interrupt(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            match kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
                Ok(()) => {
                    debug!("Sent SIGINT to build process {}", pid);
                    return;
                }
                Err(nix::errno::Errno::ESRCH) => return,
                Err(e) => warn!("Failed to interrupt build process {}: {}", pid, e),
            }
        }
    }

    let _ = child.start_kill();
}

/// Map a failed Gradle run onto an error category using its exit status and
/// the last lines it printed
pub fn classify_failure(status: ExitStatus, tail: &[String]) -> ToolingError {
    let reason = tail
        .iter()
        .skip_while(|line| !line.contains("What went wrong"))
        .nth(1)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty());

    let mentions = |needle: &str| tail.iter().any(|line| line.contains(needle));

    if mentions("Unknown command-line option") || mentions("Unknown command line option") {
        let detail = tail
            .iter()
            .find(|line| line.contains("command-line option") || line.contains("command line option"))
            .cloned()
            .unwrap_or_default();
        return ToolingError::UnsupportedBuildArgument(detail.trim().to_string());
    }

    if mentions("Minimum supported Gradle version")
        || mentions("is not supported by this version of Gradle")
        || mentions("Unsupported Gradle")
    {
        return ToolingError::UnsupportedVersion(reason.unwrap_or_else(|| status.to_string()));
    }

    ToolingError::build(reason.unwrap_or_else(|| format!("Gradle exited with {}", status)))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    fn failed() -> ExitStatus {
        ExitStatus::from_raw(1 << 8)
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    #[test]
    fn test_build_failure_reason() {
        let tail = lines(
            "FAILURE: Build failed with an exception.\n\
             \n\
             * What went wrong:\n\
             Execution failed for task ':app:compileDebugKotlin'.\n",
        );

        let error = classify_failure(failed(), &tail);

        assert!(
            matches!(error, ToolingError::Build(ref m) if m.contains(":app:compileDebugKotlin"))
        );
    }

    #[test]
    fn test_unknown_option() {
        let tail = lines("Unknown command-line option '--frobnicate'.\n");
        assert!(matches!(
            classify_failure(failed(), &tail),
            ToolingError::UnsupportedBuildArgument(ref m) if m.contains("--frobnicate")
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let tail = lines(
            "* What went wrong:\n\
             Minimum supported Gradle version is 8.4. Current version is 7.6.\n",
        );
        assert!(matches!(
            classify_failure(failed(), &tail),
            ToolingError::UnsupportedVersion(_)
        ));
    }

    #[test]
    fn test_no_output() {
        assert!(matches!(classify_failure(failed(), &[]), ToolingError::Build(_)));
    }

    fn script(dir: &Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-gradle");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_streams_output_and_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo \"args: $*\"\necho oops >&2");
        let mut seen = Vec::new();

        run_gradle(
            &exe,
            dir.path(),
            &["assembleDebug".to_string()],
            |line| seen.push(line.to_string()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        seen.sort();
        assert_eq!(seen, vec!["args: --console=plain assembleDebug", "oops"]);
    }

    #[tokio::test]
    async fn test_non_utf8_output_is_replaced_and_streaming_continues() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(
            dir.path(),
            "printf 'caf\\351\\r\\n'\n\
             i=0\n\
             while [ $i -lt 6000 ]; do echo \"line $i\"; i=$((i+1)); done\n\
             exit 0",
        );
        let mut seen = Vec::new();

        run_gradle(
            &exe,
            dir.path(),
            &[],
            |line| seen.push(line.to_string()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(seen.len(), 6001);
        assert_eq!(seen[0], "caf\u{FFFD}");
        assert_eq!(seen[6000], "line 5999");
    }

    #[test]
    fn test_trim_line_end() {
        assert_eq!(trim_line_end(b"abc\r\n"), b"abc");
        assert_eq!(trim_line_end(b"abc\n"), b"abc");
        assert_eq!(trim_line_end(b"abc"), b"abc");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo '* What went wrong:'\necho 'Task not found'\nexit 1");

        let result = run_gradle(&exe, dir.path(), &[], |_| {}, CancellationToken::new()).await;

        assert!(matches!(result, Err(ToolingError::Build(ref m)) if m == "Task not found"));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_process() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "exec sleep 30");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = run_gradle(&exe, dir.path(), &[], |_| {}, cancel).await;

        assert!(matches!(result, Err(ToolingError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_executable_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_gradle(
            &dir.path().join("does-not-exist"),
            dir.path(),
            &[],
            |_| {},
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(ToolingError::Connection(_))));
    }
}
