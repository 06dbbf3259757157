//! External Evaluator Adapter
//!
//! Runs the configured external miner binary as a child process to
//! evaluate or export a program: the program text is written to a scratch
//! file, the binary is invoked with well-defined arguments, and its
//! stdout/stderr are streamed line-by-line into the log. Concurrent
//! invocations are capped by a semaphore; the protocol beyond arguments,
//! streams, and exit status is opaque.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::ToolConfig;

/// Errors produced by the adapter itself; evaluator failures are reported
/// inside `ToolResult` instead.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("evaluator timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of one evaluator invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<Vec<String>>,
}

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Handle to the external evaluator binary.
pub struct Evaluator {
    binary: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl Evaluator {
    pub fn new(config: &ToolConfig) -> Self {
        Evaluator {
            binary: config.binary.clone(),
            work_dir: config.work_dir.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        }
    }

    /// Evaluate a program to `num_terms` terms. The final stdout line
    /// carries the comma-separated term list.
    pub async fn eval(&self, code: &str, num_terms: u32) -> Result<ToolResult, ToolError> {
        let args = vec!["eval".to_string(), "-t".to_string(), num_terms.to_string()];
        let (status, stdout, stderr) = self.run(code, &args).await?;
        if !status {
            return Ok(failure(&stderr));
        }
        let terms = stdout
            .iter()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.split(',').map(|t| t.trim().to_string()).collect());
        Ok(ToolResult {
            status: "success".to_string(),
            message: "evaluated".to_string(),
            terms,
        })
    }

    /// Export a program into another representation, e.g. `pari`.
    pub async fn export(&self, code: &str, format: &str) -> Result<ToolResult, ToolError> {
        let args = vec!["export".to_string(), "-o".to_string(), format.to_string()];
        let (status, stdout, stderr) = self.run(code, &args).await?;
        if !status {
            return Ok(failure(&stderr));
        }
        Ok(ToolResult {
            status: "success".to_string(),
            message: stdout.join("\n"),
            terms: None,
        })
    }

    /// Common child-process plumbing: scratch file, bounded concurrency,
    /// line streaming, timeout.
    async fn run(
        &self,
        code: &str,
        args: &[String],
    ) -> Result<(bool, Vec<String>, Vec<String>), ToolError> {
        // The semaphore is never closed, so acquisition only fails on
        // programmer error.
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("evaluator semaphore closed");

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let scratch = self.work_dir.join(format!(
            "prog-{}-{}.asm",
            std::process::id(),
            SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&scratch, code).await?;

        let mut command = Command::new(&self.binary);
        command
            .arg(&args[0])
            .arg(&scratch)
            .args(&args[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!(binary = %self.binary.display(), args = ?args, "running evaluator");

        let result = tokio::time::timeout(self.timeout, async {
            let mut child = command.spawn()?;
            let stdout = child.stdout.take();
            let stderr = child.stderr.take();

            let stdout_task = tokio::spawn(drain_lines(stdout, "stdout"));
            let stderr_task = tokio::spawn(drain_lines(stderr, "stderr"));

            let status = child.wait().await?;
            let stdout_lines = stdout_task.await.unwrap_or_default();
            let stderr_lines = stderr_task.await.unwrap_or_default();
            Ok::<_, std::io::Error>((status.success(), stdout_lines, stderr_lines))
        })
        .await;

        let _ = tokio::fs::remove_file(&scratch).await;
        match result {
            Ok(inner) => Ok(inner?),
            Err(_) => Err(ToolError::Timeout(self.timeout)),
        }
    }
}

fn failure(stderr: &[String]) -> ToolResult {
    let message = stderr
        .iter()
        .rev()
        .find(|line| !line.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| "evaluator failed".to_string());
    ToolResult {
        status: "error".to_string(),
        message,
        terms: None,
    }
}

/// Stream one child pipe line-by-line into the log, collecting the lines.
async fn drain_lines<R>(pipe: Option<R>, label: &'static str) -> Vec<String>
where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    let mut lines = Vec::new();
    let Some(pipe) = pipe else {
        return lines;
    };
    let mut reader = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = reader.next_line().await {
        debug!(stream = label, line = %line, "evaluator output");
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(tmp: &TempDir, binary: &str) -> ToolConfig {
        ToolConfig {
            binary: PathBuf::from(binary),
            work_dir: tmp.path().join("scratch"),
            max_concurrent: 2,
            timeout_secs: 5,
            num_terms: 8,
        }
    }

    #[tokio::test]
    async fn test_eval_parses_final_stdout_line_as_terms() {
        let tmp = TempDir::new().unwrap();
        // `echo eval <path> -t 3` prints one line; its comma-split tokens
        // stand in for terms here.
        let evaluator = Evaluator::new(&config(&tmp, "echo"));
        let result = evaluator.eval("mov $0,1\n", 3).await.unwrap();
        assert_eq!(result.status, "success");
        let terms = result.terms.unwrap();
        assert!(!terms.is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_adapter_error() {
        let tmp = TempDir::new().unwrap();
        let evaluator = Evaluator::new(&config(&tmp, "/nonexistent/miner-binary"));
        assert!(matches!(
            evaluator.eval("mov $0,1\n", 3).await,
            Err(ToolError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_failing_binary_reports_error_result() {
        let tmp = TempDir::new().unwrap();
        let evaluator = Evaluator::new(&config(&tmp, "false"));
        let result = evaluator.eval("mov $0,1\n", 3).await.unwrap();
        assert_eq!(result.status, "error");
    }

    #[tokio::test]
    async fn test_scratch_file_is_removed() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp, "echo");
        let evaluator = Evaluator::new(&config);
        evaluator.eval("mov $0,1\n", 3).await.unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(&config.work_dir)
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }
}
