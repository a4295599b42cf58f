//! Dependency population backends
//!
//! `warm` delegates the actual download to a `Populator`. The default one
//! runs the build tool with its home directory pointed at a staging dir.

use crate::error::{SmartCacheError, SmartCacheResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Max number of output lines to include in failure messages.
const ERROR_TAIL_LINES: usize = 30;

/// Fills a directory with the project's resolved dependencies
#[async_trait]
pub trait Populator: Send + Sync {
    /// Populate `target` for the project at `project_dir`
    ///
    /// `on_output` receives each line of progress output.
    async fn populate(
        &self,
        project_dir: &Path,
        target: &Path,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> SmartCacheResult<()>;

    /// Human-readable description for logs and status output
    fn describe(&self) -> String;
}

/// Runs an external command (e.g. `gradle dependencies`) to populate the cache
#[derive(Debug, Clone)]
pub struct CommandPopulator {
    program: String,
    args: Vec<String>,
    env_var: String,
    timeout: Duration,
}

impl CommandPopulator {
    /// Create from a command line (program first) and the env var that receives the target dir
    pub fn new(
        command: &[String],
        env_var: impl Into<String>,
        timeout: Duration,
    ) -> SmartCacheResult<Self> {
        let (program, args) = command.split_first().ok_or_else(|| {
            SmartCacheError::InvalidArgument("cache.warm_command must not be empty".to_string())
        })?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            env_var: env_var.into(),
            timeout,
        })
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Populator for CommandPopulator {
    async fn populate(
        &self,
        project_dir: &Path,
        target: &Path,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> SmartCacheResult<()> {
        let command_line = self.command_line();
        info!("Populating cache: {} (timeout {}s)", command_line, self.timeout.as_secs());
        debug!("{}={}", self.env_var, target.display());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(project_dir)
            .env(&self.env_var, target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SmartCacheError::command_failed(&command_line, e))?;

        let run = async {
            let output = stream_child_output(&mut child, on_output).await;
            let status = child
                .wait()
                .await
                .map_err(|e| SmartCacheError::command_failed(&command_line, e))?;
            Ok::<_, SmartCacheError>((status, output))
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => {
                let (status, output) = result?;
                if status.success() {
                    Ok(())
                } else {
                    Err(SmartCacheError::PopulateFailed(format!(
                        "{} exited with {}\n{}",
                        command_line,
                        status,
                        error_tail(&output)
                    )))
                }
            }
            Err(_) => {
                let _ = child.kill().await;
                Err(SmartCacheError::Timeout {
                    operation: command_line,
                    after: self.timeout,
                })
            }
        }
    }

    fn describe(&self) -> String {
        self.command_line()
    }
}

/// Last `ERROR_TAIL_LINES` lines of output for error diagnostics
fn error_tail(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting.
async fn stream_child_output(
    child: &mut Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> Vec<String> {
    let mut all_output = Vec::new();

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return all_output;
    };

    let mut stdout_reader = BufReader::new(stdout).lines();
    let mut stderr_reader = BufReader::new(stderr).lines();
    let mut stdout_done = false;
    let mut stderr_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = stderr_reader.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stderr_done = true,
                }
            }
            line = stdout_reader.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stdout_done = true,
                }
            }
        }
    }

    all_output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn sh(script: &str, timeout: Duration) -> CommandPopulator {
        CommandPopulator::new(
            &["sh".to_string(), "-c".to_string(), script.to_string()],
            "DEPS_HOME",
            timeout,
        )
        .unwrap()
    }

    #[test]
    fn empty_command_rejected() {
        let err = CommandPopulator::new(&[], "GRADLE_USER_HOME", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SmartCacheError::InvalidArgument(_)));
    }

    #[test]
    fn describe_joins_command_line() {
        let populator = CommandPopulator::new(
            &["gradle".to_string(), "dependencies".to_string()],
            "GRADLE_USER_HOME",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(populator.describe(), "gradle dependencies");
    }

    #[test]
    fn error_tail_keeps_last_lines() {
        let lines: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        let tail = error_tail(&lines);
        assert!(tail.starts_with("70\n"));
        assert!(tail.ends_with("99"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn populates_target_through_env_var() {
        let project = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        sh(
            "mkdir -p \"$DEPS_HOME/modules\" && echo jar > \"$DEPS_HOME/modules/a.jar\" && echo done",
            Duration::from_secs(10),
        )
        .populate(project.path(), target.path(), &move |line| {
            sink.lock().unwrap().push(line)
        })
        .await
        .unwrap();

        assert!(target.path().join("modules/a.jar").exists());
        assert_eq!(seen.lock().unwrap().as_slice(), ["done".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_populate_failure() {
        let dir = TempDir::new().unwrap();
        let err = sh("echo 'Could not resolve com.acme:lib' >&2; exit 3", Duration::from_secs(10))
            .populate(dir.path(), dir.path(), &|_| {})
            .await
            .unwrap_err();

        match err {
            SmartCacheError::PopulateFailed(msg) => assert!(msg.contains("Could not resolve")),
            other => panic!("expected PopulateFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let dir = TempDir::new().unwrap();
        let err = sh("sleep 5", Duration::from_millis(200))
            .populate(dir.path(), dir.path(), &|_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, SmartCacheError::Timeout { .. }));
    }
}
