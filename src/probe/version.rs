//! Interpreter version probe.

use super::command::{Invocation, InvocationError};
use crate::{
    InterpreterBinaryName, InterpreterFamily, InterpreterLocation, InterpreterVersion, ParseError,
    ProvisionError, ProvisionOptions,
};

/// Ask the bundled interpreter for its version.
///
/// Runs `<location>/bin/<binary> <version flag>` and parses the banner. The
/// banner is read from stdout, falling back to stderr.
///
/// # Errors
///
/// - `VersionProbe` if the binary cannot be started, exits non-zero, prints
///   nothing, or prints a banner without a parseable version
/// - `Timeout` if it does not exit within `options.process_timeout`
pub async fn probe_version(
    location: &InterpreterLocation,
    binary: &InterpreterBinaryName,
    options: &ProvisionOptions,
) -> Result<InterpreterVersion, ProvisionError> {
    let family = options.family;
    let invocation = Invocation::new(binary.path_in(location)).arg(family.version_flag());
    let failed = |message: String| ProvisionError::VersionProbe {
        command: invocation.command_line(),
        message,
    };

    let captured = invocation
        .run(options.process_timeout)
        .await
        .map_err(|e| match e {
            InvocationError::TimedOut(duration) => ProvisionError::Timeout {
                operation: invocation.command_line(),
                duration,
            },
            InvocationError::Io(e) => failed(format!("could not start interpreter: {}", e)),
        })?;

    if !captured.status.success() {
        return Err(failed(format!(
            "interpreter exited with {}: {}",
            captured.status,
            captured.stderr.trim()
        )));
    }
    if captured.is_silent() {
        return Err(failed("interpreter printed no version banner".to_string()));
    }

    let version = parse_version_banner(captured.preferred_output(), family)
        .map_err(|e| failed(e.to_string()))?;

    tracing::info!(%version, "detected bundled interpreter version");
    Ok(version)
}

/// Extract the version from a banner such as `Python 3.7.4`.
///
/// The version is the whitespace-delimited token right after the family's
/// banner prefix.
pub(crate) fn parse_version_banner(
    output: &str,
    family: InterpreterFamily,
) -> Result<InterpreterVersion, ParseError> {
    let prefix = family.banner_prefix();
    let (_, rest) = output
        .split_once(prefix)
        .ok_or_else(|| ParseError::MarkerNotFound(prefix.to_string()))?;

    let token = rest.split_whitespace().next().unwrap_or_default();
    token.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PY: InterpreterFamily = InterpreterFamily::Python;

    #[test]
    fn test_parse_banner_with_newline() {
        let version = parse_version_banner("Python 3.7.4\n", PY).unwrap();
        assert_eq!(version.as_str(), "3.7.4");
    }

    #[test]
    fn test_parse_banner_two_digit_minor() {
        let version = parse_version_banner("Python 3.10.12\n", PY).unwrap();
        assert_eq!(version.as_str(), "3.10.12");
        assert_eq!(version.short_version(), "3.10");
    }

    #[test]
    fn test_parse_banner_prerelease() {
        let version = parse_version_banner("Python 3.13.0rc2", PY).unwrap();
        assert_eq!(version.as_str(), "3.13.0rc2");
    }

    #[test]
    fn test_parse_banner_without_prefix() {
        assert_eq!(
            parse_version_banner("3.7.4", PY),
            Err(ParseError::MarkerNotFound("Python ".to_string()))
        );
    }

    #[test]
    fn test_parse_banner_malformed_version() {
        assert!(matches!(
            parse_version_banner("Python unknown\n", PY),
            Err(ParseError::MalformedField { field: "version", .. })
        ));
        assert!(matches!(
            parse_version_banner("Python ", PY),
            Err(ParseError::MalformedField { .. })
        ));
    }

    #[tokio::test]
    async fn test_probe_missing_binary() {
        let loc = InterpreterLocation::new("/nonexistent/python");
        let bin = InterpreterBinaryName::new("python3.9");
        let result = probe_version(&loc, &bin, &ProvisionOptions::default()).await;
        match result {
            Err(ProvisionError::VersionProbe { command, message }) => {
                assert_eq!(command, "/nonexistent/python/bin/python3.9 -V");
                assert!(message.contains("could not start"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    fn interpreter_script(body: &str) -> (tempfile::TempDir, InterpreterLocation, InterpreterBinaryName) {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let loc = InterpreterLocation::new(dir.path());
        let bin = InterpreterBinaryName::new("python3.9");
        std::fs::create_dir_all(loc.bin_dir()).unwrap();
        let script = bin.path_in(&loc);
        std::fs::write(&script, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (dir, loc, bin)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_reads_banner_from_stderr() {
        let (_dir, loc, bin) = interpreter_script("echo 'Python 2.7.18' >&2\n");
        let version = probe_version(&loc, &bin, &ProvisionOptions::default())
            .await
            .unwrap();
        assert_eq!(version.as_str(), "2.7.18");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_silent_interpreter_fails() {
        let (_dir, loc, bin) = interpreter_script("exit 0\n");
        let result = probe_version(&loc, &bin, &ProvisionOptions::default()).await;
        match result {
            Err(ProvisionError::VersionProbe { message, .. }) => {
                assert!(message.contains("printed no version banner"), "{message}");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_nonzero_exit_fails_despite_banner() {
        let (_dir, loc, bin) = interpreter_script("echo 'Python 3.9.1'\necho 'broken' >&2\nexit 2\n");
        let result = probe_version(&loc, &bin, &ProvisionOptions::default()).await;
        match result {
            Err(ProvisionError::VersionProbe { message, .. }) => {
                assert!(message.contains("exited with"), "{message}");
                assert!(message.contains("broken"), "{message}");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
