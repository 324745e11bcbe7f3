//! Progress reporting for provisioning runs.
//!
//! The [`ProvisionProgress`] enum represents discrete stages of both
//! pipelines. Callers receive them through a callback and typically show
//! their [`Display`](std::fmt::Display) text in a status area. Progress is
//! advisory and never affects control flow.

use crate::{InterpreterBinaryName, InterpreterLocation, InterpreterVersion};
use std::fmt;
use std::path::PathBuf;

/// Progress stages during provisioning.
///
/// # Example
///
/// ```rust
/// use bundled_pydev::ProvisionProgress;
///
/// fn on_progress(progress: ProvisionProgress) {
///     println!("[{}] {}", progress.description(), progress);
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProvisionProgress {
    /// Launching the host application to find its interpreter.
    LocatingInterpreter {
        /// Host executable being probed.
        host: PathBuf,
    },

    /// The bundled interpreter was located.
    InterpreterLocated {
        /// Its install root.
        location: InterpreterLocation,
    },

    /// The interpreter executable was resolved.
    BinaryResolved {
        /// Its file name inside `bin`.
        binary: InterpreterBinaryName,
    },

    /// The interpreter reported its version.
    VersionDetected {
        /// The reported version.
        version: InterpreterVersion,
    },

    /// Downloading the release archive.
    Downloading {
        /// URL being fetched.
        url: String,
    },

    /// The release archive is on disk.
    Downloaded {
        /// Bytes received.
        bytes: u64,
    },

    /// Decompressing and extracting the archive.
    Decompressing,

    /// Writing headers into the destination.
    InstallingHeaders {
        /// Destination directory.
        destination: PathBuf,
    },

    /// Headers are installed.
    HeadersInstalled {
        /// Destination directory.
        destination: PathBuf,
    },

    /// Running the package manager.
    InstallingModule {
        /// Package identifier.
        package: String,
    },

    /// The package manager succeeded.
    ModuleInstalled {
        /// Package identifier.
        package: String,
    },
}

impl ProvisionProgress {
    /// Short name of the stage.
    ///
    /// ```rust
    /// use bundled_pydev::ProvisionProgress;
    ///
    /// assert_eq!(ProvisionProgress::Decompressing.description(), "Decompressing");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::LocatingInterpreter { .. } => "Locating interpreter",
            Self::InterpreterLocated { .. } => "Interpreter located",
            Self::BinaryResolved { .. } => "Binary resolved",
            Self::VersionDetected { .. } => "Version detected",
            Self::Downloading { .. } => "Downloading",
            Self::Downloaded { .. } => "Downloaded",
            Self::Decompressing => "Decompressing",
            Self::InstallingHeaders { .. } => "Installing headers",
            Self::HeadersInstalled { .. } => "Headers installed",
            Self::InstallingModule { .. } => "Installing module",
            Self::ModuleInstalled { .. } => "Module installed",
        }
    }

    /// Check if this stage ends a pipeline successfully.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            Self::HeadersInstalled { .. } | Self::ModuleInstalled { .. }
        )
    }
}

impl fmt::Display for ProvisionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocatingInterpreter { host } => {
                write!(f, "Locating bundled interpreter of {}", host.display())
            }
            Self::InterpreterLocated { location } => {
                write!(f, "Bundled interpreter path: {}", location)
            }
            Self::BinaryResolved { binary } => write!(f, "Bundled interpreter binary: {}", binary),
            Self::VersionDetected { version } => {
                write!(f, "Bundled interpreter version: {}", version)
            }
            Self::Downloading { url } => write!(f, "Starting download: {}", url),
            Self::Downloaded { bytes } => {
                write!(f, "Download done ({} bytes)! Now decompressing", bytes)
            }
            Self::Decompressing => f.write_str("Decompressing archive"),
            Self::InstallingHeaders { destination } => {
                write!(f, "Decompress done! Now installing into {}", destination.display())
            }
            Self::HeadersInstalled { destination } => {
                write!(f, "Headers installed in {}", destination.display())
            }
            Self::InstallingModule { package } => write!(f, "Installing module {}", package),
            Self::ModuleInstalled { package } => {
                write!(f, "External module installed: {}", package)
            }
        }
    }
}
