//! Subprocess plumbing shared by the CLI adapters.
//!
//! Commands are always built as argument vectors; nothing goes through a shell
//! on the local side.

use std::{path::PathBuf, process::Stdio};

use tokio::{io::AsyncWriteExt, process::Command};

use crate::{formatting::truncate_text, Result};

const OUTPUT_PREVIEW_MAX_CHARS: usize = 2000;

/// A concrete CLI invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CliInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CliInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Human-readable command line for logs. Env values are never included.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured result of a finished subprocess.
#[derive(Clone, Debug)]
pub struct CliOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    /// Short description of a failure, preferring stderr over stdout.
    pub fn failure_detail(&self) -> String {
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        if detail.is_empty() {
            format!("exited with {}", self.status)
        } else {
            format!(
                "exited with {}: {}",
                self.status,
                truncate_text(detail, OUTPUT_PREVIEW_MAX_CHARS)
            )
        }
    }
}

/// Run an invocation to completion, optionally feeding `stdin`.
///
/// Spawn failures (e.g. binary not found) are returned as `Error::Io` so callers
/// can tell "not installed" apart from "ran and failed".
pub async fn run(inv: &CliInvocation, stdin: Option<&str>) -> Result<CliOutput> {
    let mut cmd = Command::new(&inv.program);
    cmd.args(&inv.args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (k, v) in &inv.env {
        cmd.env(k, v);
    }

    let mut child = cmd.spawn()?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes()).await?;
            pipe.shutdown().await?;
        }
    }

    let out = child.wait_with_output().await?;
    Ok(CliOutput {
        success: out.status.success(),
        status: out.status.to_string(),
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    })
}
