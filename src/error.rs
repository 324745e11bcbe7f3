//! Error types for provisioning operations.
//!
//! Every stage surfaces its failure to the caller as a [`ProvisionError`]
//! carrying the command, URL or path it attempted. None of them is retried.
//! Each variant offers an actionable [`ProvisionError::fix_suggestion`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to extract a marker-delimited field from tool output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The probe sentinel never appeared in the output.
    #[error("sentinel `{0}` not found in output")]
    SentinelMissing(String),

    /// A marker delimiting the field is absent.
    #[error("marker `{0}` not found in output")]
    MarkerNotFound(String),

    /// Markers were found but the field between them is unusable.
    #[error("{field} is malformed: `{value}`")]
    MalformedField {
        /// Which field was being extracted.
        field: &'static str,
        /// The offending text.
        value: String,
    },
}

/// Step of the header unpack pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallStage {
    /// Creating the scratch directory.
    Scratch,
    /// Gunzipping the downloaded archive.
    Decompress,
    /// Extracting the release tarball into scratch space.
    Extract,
    /// Re-packing the include directory.
    Repack,
    /// Unpacking headers into the destination.
    Unpack,
}

impl InstallStage {
    /// Human-readable name of the stage.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Scratch => "scratch directory setup",
            Self::Decompress => "decompression",
            Self::Extract => "archive extraction",
            Self::Repack => "include directory repack",
            Self::Unpack => "header installation",
        }
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors that can occur while provisioning the bundled interpreter.
///
/// # Example
///
/// ```rust
/// use bundled_pydev::ProvisionError;
///
/// fn report(error: ProvisionError) {
///     eprintln!("Provisioning failed: {}", error);
///     eprintln!("To fix: {}", error.fix_suggestion());
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// The host application's output did not reveal its bundled interpreter.
    #[error("Could not locate the bundled interpreter of {host}: {failure}")]
    ProbeFormat {
        /// Host executable that was probed.
        host: PathBuf,
        /// What was wrong with the output.
        failure: ParseError,
        /// Everything the host printed, for bug reports.
        output: String,
    },

    /// No interpreter executable was found in the `bin` directory.
    #[error("No `{marker}*` interpreter found in {bin_dir}")]
    BinaryNotFound {
        /// Directory that was searched.
        bin_dir: PathBuf,
        /// Name fragment candidates must contain.
        marker: String,
    },

    /// Running the interpreter's version flag failed or printed garbage.
    #[error("Version probe `{command}` failed: {message}")]
    VersionProbe {
        /// Command line that was run.
        command: String,
        /// Description of the failure.
        message: String,
    },

    /// Downloading the release archive failed.
    #[error("Failed to download {url}: {message}")]
    Fetch {
        /// URL that was requested.
        url: String,
        /// HTTP status, when the server answered.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// Unpacking or installing the headers failed.
    #[error("Header installation failed during {stage} ({path}): {message}")]
    Install {
        /// Step that failed.
        stage: InstallStage,
        /// Path being read or written.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The package manager run failed.
    #[error("Module installation `{command}` failed: {message}")]
    ModuleInstall {
        /// Command line that was run.
        command: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
        /// Description of the failure.
        message: String,
    },

    /// The package identifier was rejected before anything ran.
    #[error("Invalid package identifier `{package}`: {reason}")]
    InvalidPackage {
        /// Identifier as supplied.
        package: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A subprocess or network operation exceeded its time budget.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// Command line or request that timed out.
        operation: String,
        /// Budget that was exceeded.
        duration: Duration,
    },
}

impl ProvisionError {
    /// Get an actionable suggestion for fixing this error.
    ///
    /// ```rust
    /// use bundled_pydev::ProvisionError;
    /// use std::time::Duration;
    ///
    /// let error = ProvisionError::Timeout {
    ///     operation: "GET https://example.invalid".to_string(),
    ///     duration: Duration::from_secs(30),
    /// };
    /// assert!(error.fix_suggestion().contains("timeout"));
    /// ```
    pub fn fix_suggestion(&self) -> String {
        match self {
            Self::ProbeFormat { host, .. } => format!(
                "Make sure {} is a supported version of the host application (Blender 2.8 or newer). \
                 If it is, please file a bug report containing the full path to the executable and \
                 the complete output printed above.",
                host.display()
            ),
            Self::BinaryNotFound { bin_dir, .. } => format!(
                "Check that {} contains the bundled interpreter; the host installation may be incomplete.",
                bin_dir.display()
            ),
            Self::VersionProbe { .. } => {
                "Run the bundled interpreter with its version flag manually and check that it starts."
                    .to_string()
            }
            Self::Fetch { status: Some(404), .. } => {
                "No source release is published for this version; check the release server or use a mirror."
                    .to_string()
            }
            Self::Fetch { .. } => {
                "Check your network connection or point the release URL at a reachable mirror."
                    .to_string()
            }
            Self::Install { stage, path, .. } => match stage {
                InstallStage::Decompress | InstallStage::Extract => {
                    "The downloaded archive looks corrupt or truncated; run the installation again."
                        .to_string()
                }
                _ => format!(
                    "Check that {} is writable and that there is free disk space.",
                    path.display()
                ),
            },
            Self::ModuleInstall { .. } => {
                "See the package manager output above; verify the package name and your network access."
                    .to_string()
            }
            Self::InvalidPackage { .. } => {
                "Use a plain package name, optionally with [extras] and an ==/~= version pin."
                    .to_string()
            }
            Self::Timeout { .. } => {
                "Try again with a longer timeout or check that the process or server is responsive."
                    .to_string()
            }
        }
    }
}
