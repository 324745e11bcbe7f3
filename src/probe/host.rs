//! Locating the bundled interpreter through the host application.

use super::command::{Invocation, InvocationError};
use crate::family::PROBE_SENTINEL;
use crate::{InterpreterFamily, InterpreterLocation, ParseError, ProvisionError, ProvisionOptions};
use std::path::Path;

/// Find the install root of the interpreter bundled with `host`.
///
/// The host is started headless with factory settings and told to print a
/// sentinel through its embedded interpreter and exit. While starting, the
/// host logs where it found its bundled interpreter; that line is sliced
/// between the family's probe label and path suffix. Only standard output is
/// searched; both streams are kept in the error for diagnosis.
///
/// # Errors
///
/// - `ProbeFormat` if the sentinel is missing (wrong or too old an
///   executable, or startup failed) or the path line is absent or malformed
/// - `Timeout` if the host does not exit within `options.process_timeout`
///
/// # Example
///
/// ```rust,no_run
/// use bundled_pydev::{locate_interpreter, ProvisionOptions};
/// use std::path::Path;
///
/// # async fn run() -> Result<(), bundled_pydev::ProvisionError> {
/// let location = locate_interpreter(Path::new("/opt/blender/blender"), &ProvisionOptions::default()).await?;
/// println!("bundled interpreter at {}", location);
/// # Ok(())
/// # }
/// ```
pub async fn locate_interpreter(
    host: &Path,
    options: &ProvisionOptions,
) -> Result<InterpreterLocation, ProvisionError> {
    let invocation = Invocation::new(host).args(options.family.probe_args());

    let captured = invocation
        .run(options.process_timeout)
        .await
        .map_err(|e| match e {
            InvocationError::TimedOut(duration) => ProvisionError::Timeout {
                operation: invocation.command_line(),
                duration,
            },
            InvocationError::Io(e) => ProvisionError::ProbeFormat {
                host: host.to_path_buf(),
                failure: ParseError::SentinelMissing(PROBE_SENTINEL.to_string()),
                output: format!("failed to launch {}: {}", host.display(), e),
            },
        })?;

    let location = parse_probe_output(&captured.stdout, options.family).map_err(|failure| {
        ProvisionError::ProbeFormat {
            host: host.to_path_buf(),
            failure,
            output: captured.combined(),
        }
    })?;

    tracing::info!(location = %location, "located bundled interpreter");
    Ok(location)
}

/// Extract the interpreter install root from the host's startup output.
///
/// The path starts right after the probe label and ends with the first
/// occurrence of the family's path suffix on that line (suffix included).
pub(crate) fn parse_probe_output(
    output: &str,
    family: InterpreterFamily,
) -> Result<InterpreterLocation, ParseError> {
    if !output.contains(PROBE_SENTINEL) {
        return Err(ParseError::SentinelMissing(PROBE_SENTINEL.to_string()));
    }

    let label = family.probe_label();
    let rest = output
        .lines()
        .find_map(|line| line.split_once(label).map(|(_, rest)| rest))
        .ok_or_else(|| ParseError::MarkerNotFound(label.to_string()))?;

    let suffix = family.probe_path_suffix();
    let end = rest.find(suffix).ok_or_else(|| ParseError::MalformedField {
        field: "interpreter path",
        value: rest.trim().to_string(),
    })? + suffix.len();

    let path = rest[..end].trim();
    if path.len() <= suffix.len() || !path.starts_with('/') {
        return Err(ParseError::MalformedField {
            field: "interpreter path",
            value: path.to_string(),
        });
    }

    Ok(InterpreterLocation::new(path))
}
