//! Dataset Script Execution
//!
//! Runs a generated script in the session workspace and reports the
//! outcome as data. A failing script is never an error here: the failure
//! detail flows back into the context and drives the repair loop.

use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::workspace::{SessionWorkspace, SCRIPT_FILE};

/// Upper bound on the failure detail handed to the repair step.
pub const MAX_FAILURE_DETAIL_CHARS: usize = 4000;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of one script run.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    /// The script exited cleanly. Artifacts are sorted `.csv` file names.
    Succeeded { artifacts: Vec<String> },

    /// The script could not run or exited with an error.
    Failed { detail: String },
}

impl ScriptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Executes generated scripts. Must report every failure as
/// [`ScriptOutcome::Failed`] rather than panicking.
pub trait ScriptRunner: Send + Sync {
    fn run(&self, script: &str, workspace: &SessionWorkspace) -> ScriptOutcome;
}

/// Runs scripts as a child process of a local interpreter.
#[derive(Debug, Clone)]
pub struct ProcessScriptRunner {
    interpreter: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessScriptRunner {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interpreter(&self) -> &PathBuf {
        &self.interpreter
    }

    fn try_run(&self, script: &str, workspace: &SessionWorkspace) -> io::Result<ScriptOutcome> {
        let body = strip_code_fence(script);

        // Outputs of a previous attempt must not leak into this one
        workspace.reset_output_dir()?;
        fs::write(workspace.script_path(), body)?;

        let stdout = File::create(workspace.stdout_log())?;
        let stderr = File::create(workspace.stderr_log())?;

        debug!(
            "Executing {} {} in {}",
            self.interpreter.display(),
            SCRIPT_FILE,
            workspace.root().display()
        );

        let mut child = Command::new(&self.interpreter)
            .arg(SCRIPT_FILE)
            .current_dir(workspace.root())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }

            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    warn!("Script exceeded {:?}, killing it", limit);
                    if let Err(e) = child.kill() {
                        warn!("Failed to kill script process: {}", e);
                    }
                    let _ = child.wait();
                    return Ok(ScriptOutcome::Failed {
                        detail: format!(
                            "Script timed out after {} seconds and was terminated.\n{}",
                            limit.as_secs_f32(),
                            read_tail(&workspace.stderr_log())
                        ),
                    });
                }
            }

            thread::sleep(POLL_INTERVAL);
        };

        if status.success() {
            let artifacts = workspace.list_output_files("csv")?;
            info!("Script succeeded, produced {} file(s)", artifacts.len());
            Ok(ScriptOutcome::Succeeded { artifacts })
        } else {
            let detail = failure_detail(status, &read_tail(&workspace.stderr_log()));
            error!("Script failed: {}", detail.lines().last().unwrap_or_default());
            Ok(ScriptOutcome::Failed { detail })
        }
    }
}

impl ScriptRunner for ProcessScriptRunner {
    fn run(&self, script: &str, workspace: &SessionWorkspace) -> ScriptOutcome {
        match self.try_run(script, workspace) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Could not execute script: {}", e);
                ScriptOutcome::Failed {
                    detail: format!(
                        "Could not execute script with {}: {}",
                        self.interpreter.display(),
                        e
                    ),
                }
            }
        }
    }
}

fn failure_detail(status: ExitStatus, stderr_tail: &str) -> String {
    let exit = match status.code() {
        Some(code) => format!("Script exited with code {}", code),
        None => "Script was terminated by a signal".to_string(),
    };

    if stderr_tail.trim().is_empty() {
        exit
    } else {
        format!("{}\n{}", exit, stderr_tail.trim_end())
    }
}

/// Last [`MAX_FAILURE_DETAIL_CHARS`] characters of a log file.
fn read_tail(path: &PathBuf) -> String {
    let content = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => return String::new(),
    };

    let count = content.chars().count();
    if count <= MAX_FAILURE_DETAIL_CHARS {
        content
    } else {
        content.chars().skip(count - MAX_FAILURE_DETAIL_CHARS).collect()
    }
}

/// Removes a surrounding Markdown code fence, if any.
///
/// ```
/// use demoforge::execution::script::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```python\nprint(1)\n```"), "print(1)");
/// assert_eq!(strip_code_fence("print(1)"), "print(1)");
/// ```
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().skip(1).collect();
    if lines.last().map(|l| l.trim() == "```").unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::checkpoint::SessionId;
    use tempfile::tempdir;

    fn workspace(root: &std::path::Path) -> SessionWorkspace {
        SessionWorkspace::create(root, &SessionId::generate()).unwrap()
    }

    #[test]
    fn test_successful_script_reports_artifacts() {
        let temp_dir = tempdir().unwrap();
        let ws = workspace(temp_dir.path());
        let runner = ProcessScriptRunner::new("sh");

        let script = "printf 'ID,NAME\\n1,Ann\\n' > generated_csvs/CUSTOMERS.csv\n\
                      printf 'ID\\n7\\n' > generated_csvs/ORDERS.csv\n";
        let outcome = runner.run(script, &ws);

        assert_eq!(
            outcome,
            ScriptOutcome::Succeeded {
                artifacts: vec!["CUSTOMERS.csv".to_string(), "ORDERS.csv".to_string()]
            }
        );
        assert!(ws.script_path().exists());
    }

    #[test]
    fn test_failing_script_reports_stderr() {
        let temp_dir = tempdir().unwrap();
        let ws = workspace(temp_dir.path());
        let runner = ProcessScriptRunner::new("sh");

        let outcome = runner.run("echo 'KeyError: CUSTOMER_ID' >&2\nexit 1\n", &ws);

        match outcome {
            ScriptOutcome::Failed { detail } => {
                assert!(detail.contains("exited with code 1"));
                assert!(detail.contains("KeyError: CUSTOMER_ID"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_rerun_is_idempotent_and_clears_stale_files() {
        let temp_dir = tempdir().unwrap();
        let ws = workspace(temp_dir.path());
        let runner = ProcessScriptRunner::new("sh");

        runner.run("touch generated_csvs/OLD.csv\n", &ws);
        let script = "touch generated_csvs/NEW.csv\n";
        let first = runner.run(script, &ws);
        let second = runner.run(script, &ws);

        let expected = ScriptOutcome::Succeeded {
            artifacts: vec!["NEW.csv".to_string()],
        };
        assert_eq!(first, expected);
        assert_eq!(second, expected);
    }

    #[test]
    fn test_timeout_kills_script() {
        let temp_dir = tempdir().unwrap();
        let ws = workspace(temp_dir.path());
        let runner = ProcessScriptRunner::new("sh").with_timeout(Duration::from_millis(300));

        let started = Instant::now();
        let outcome = runner.run("sleep 10\n", &ws);

        assert!(started.elapsed() < Duration::from_secs(5));
        match outcome {
            ScriptOutcome::Failed { detail } => assert!(detail.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_interpreter_is_failure() {
        let temp_dir = tempdir().unwrap();
        let ws = workspace(temp_dir.path());
        let runner = ProcessScriptRunner::new("/nonexistent/python3");

        let outcome = runner.run("print(1)", &ws);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_fenced_script_runs() {
        let temp_dir = tempdir().unwrap();
        let ws = workspace(temp_dir.path());
        let runner = ProcessScriptRunner::new("sh");

        let outcome = runner.run("```sh\ntouch generated_csvs/A.csv\n```", &ws);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_failure_detail_is_capped() {
        let temp_dir = tempdir().unwrap();
        let ws = workspace(temp_dir.path());
        let runner = ProcessScriptRunner::new("sh");

        let script = "i=0\nwhile [ $i -lt 600 ]; do echo 'line of stderr noise' >&2; i=$((i+1)); done\nexit 3\n";
        match runner.run(script, &ws) {
            ScriptOutcome::Failed { detail } => {
                assert!(detail.chars().count() <= MAX_FAILURE_DETAIL_CHARS + 64);
                assert!(detail.starts_with("Script exited with code 3"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```python\nimport pandas\n```\n"), "import pandas");
        assert_eq!(strip_code_fence("```\na\nb"), "a\nb");
        assert_eq!(strip_code_fence("  plain  "), "plain");
    }
}
