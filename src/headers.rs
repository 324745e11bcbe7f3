//! Header installation pipeline.
//!
//! The pipeline is a small state machine: each [`HeaderStage`] carries the
//! inputs its transition needs and [`HeaderStage::advance`] awaits exactly
//! one stage before yielding the next. A failure ends the run; nothing is
//! retried or rolled back.

use crate::probe::{locate_interpreter, probe_version, resolve_binary};
use crate::{
    fetch_archive, unpack_headers_with_progress, ArchiveHandle, InstalledHeaderSet,
    InterpreterBinaryName, InterpreterLocation, InterpreterVersion, ProvisionError,
    ProvisionOptions, ProvisionProgress,
};
use std::path::Path;

/// One state of a header installation run.
#[derive(Debug)]
pub enum HeaderStage {
    /// Probe the host for its bundled interpreter.
    Locate,
    /// Pick the interpreter executable.
    ResolveBinary {
        /// Interpreter install root.
        location: InterpreterLocation,
    },
    /// Ask the interpreter for its version.
    ProbeVersion {
        /// Interpreter install root.
        location: InterpreterLocation,
        /// Interpreter executable.
        binary: InterpreterBinaryName,
    },
    /// Download the matching source release.
    Fetch {
        /// Interpreter install root.
        location: InterpreterLocation,
        /// Interpreter version.
        version: InterpreterVersion,
    },
    /// Install the release's headers.
    Unpack {
        /// Interpreter install root.
        location: InterpreterLocation,
        /// Interpreter version.
        version: InterpreterVersion,
        /// Downloaded release archive.
        archive: ArchiveHandle,
    },
    /// Terminal success state.
    Done(InstalledHeaderSet),
}

impl HeaderStage {
    /// Short name of the state, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Locate => "locate",
            Self::ResolveBinary { .. } => "resolve-binary",
            Self::ProbeVersion { .. } => "probe-version",
            Self::Fetch { .. } => "fetch",
            Self::Unpack { .. } => "unpack",
            Self::Done(_) => "done",
        }
    }

    /// Run this state's stage and return the next state.
    ///
    /// Advancing `Done` returns it unchanged.
    pub async fn advance<F>(
        self,
        host: &Path,
        options: &ProvisionOptions,
        on_progress: &F,
    ) -> Result<Self, ProvisionError>
    where
        F: Fn(ProvisionProgress) + Send + Sync,
    {
        let next = match self {
            Self::Locate => {
                on_progress(ProvisionProgress::LocatingInterpreter {
                    host: host.to_path_buf(),
                });
                let location = locate_interpreter(host, options).await?;
                on_progress(ProvisionProgress::InterpreterLocated {
                    location: location.clone(),
                });
                Self::ResolveBinary { location }
            }
            Self::ResolveBinary { location } => {
                let binary = resolve_binary(&location, options.family).await?;
                on_progress(ProvisionProgress::BinaryResolved {
                    binary: binary.clone(),
                });
                Self::ProbeVersion { location, binary }
            }
            Self::ProbeVersion { location, binary } => {
                let version = probe_version(&location, &binary, options).await?;
                on_progress(ProvisionProgress::VersionDetected {
                    version: version.clone(),
                });
                Self::Fetch { location, version }
            }
            Self::Fetch { location, version } => {
                on_progress(ProvisionProgress::Downloading {
                    url: options
                        .family
                        .archive_url(options.release_base_url(), &version),
                });
                let archive = fetch_archive(&version, options).await?;
                on_progress(ProvisionProgress::Downloaded {
                    bytes: archive.len(),
                });
                Self::Unpack {
                    location,
                    version,
                    archive,
                }
            }
            Self::Unpack {
                location,
                version,
                archive,
            } => {
                let installed =
                    unpack_headers_with_progress(&archive, &location, &version, options, on_progress)
                        .await?;
                on_progress(ProvisionProgress::HeadersInstalled {
                    destination: installed.path.clone(),
                });
                Self::Done(installed)
            }
            done @ Self::Done(_) => done,
        };
        tracing::debug!(stage = next.name(), "header pipeline advanced");
        Ok(next)
    }
}

/// Install C headers matching the interpreter bundled with `host`.
///
/// Runs locate → resolve binary → probe version → fetch → unpack, strictly
/// in sequence, and reports each stage through `on_progress`.
///
/// # Errors
///
/// The first stage failure, as a [`ProvisionError`].
///
/// # Example
///
/// ```rust,no_run
/// use bundled_pydev::{install_headers, ProvisionOptions};
/// use std::path::Path;
///
/// #[tokio::main]
/// async fn main() {
///     let result = install_headers(
///         Path::new("/opt/blender/blender"),
///         &ProvisionOptions::default(),
///         |progress| println!("{}", progress),
///     )
///     .await;
///
///     match result {
///         Ok(headers) => println!("{} headers in {}", headers.file_count, headers.path.display()),
///         Err(e) => eprintln!("Failed: {}. Fix: {}", e, e.fix_suggestion()),
///     }
/// }
/// ```
pub async fn install_headers<F>(
    host: &Path,
    options: &ProvisionOptions,
    on_progress: F,
) -> Result<InstalledHeaderSet, ProvisionError>
where
    F: Fn(ProvisionProgress) + Send + Sync,
{
    let mut stage = HeaderStage::Locate;
    loop {
        stage = stage.advance(host, options, &on_progress).await?;
        if let HeaderStage::Done(installed) = stage {
            return Ok(installed);
        }
    }
}
