//! Subprocess execution with a time budget.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// A program plus its argument vector.
///
/// Arguments are handed to the OS as-is; nothing is ever interpreted by a
/// shell.
#[derive(Debug, Clone)]
pub(crate) struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
}

/// Everything a finished subprocess printed.
#[derive(Debug, Clone)]
pub(crate) struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug)]
pub(crate) enum InvocationError {
    TimedOut(Duration),
    Io(std::io::Error),
}

impl Invocation {
    pub(crate) fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub(crate) fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub(crate) fn program(&self) -> &Path {
        &self.program
    }

    /// Printable command line for logs and error messages.
    pub(crate) fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| {
                let part = part.to_string_lossy();
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("\"{}\"", part)
                } else {
                    part.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// The child is killed when `limit` elapses or when the returned future
    /// is dropped.
    pub(crate) async fn run(&self, limit: Duration) -> Result<Captured, InvocationError> {
        tracing::debug!(command = %self.command_line(), "running subprocess");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = timeout(limit, command.output())
            .await
            .map_err(|_| InvocationError::TimedOut(limit))?
            .map_err(InvocationError::Io)?;

        Ok(Captured {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Captured {
    /// True when neither stream carried anything but whitespace.
    pub(crate) fn is_silent(&self) -> bool {
        self.stdout.trim().is_empty() && self.stderr.trim().is_empty()
    }

    /// Stdout, or stderr when stdout is empty (some tools print banners
    /// there).
    pub(crate) fn preferred_output(&self) -> &str {
        if !self.stdout.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }

    /// Both streams, stdout first.
    pub(crate) fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}
