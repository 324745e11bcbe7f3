//! Provisioning options.
//!
//! This module provides the [`ProvisionOptions`] struct controlling timeouts,
//! the release server and scratch space used by both pipelines.

use crate::InterpreterFamily;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a provisioning run.
///
/// # Default Behavior
///
/// - Host and interpreter probes time out after 60 seconds (a cold host
///   start can be slow).
/// - Package manager runs time out after 5 minutes.
/// - Network operations time out after 30 seconds each; during a download
///   this bounds the wait for every chunk, not the whole transfer.
/// - Archives come from the family's official release server and scratch
///   files live in the system temp directory.
///
/// # Example
///
/// ```rust
/// use bundled_pydev::ProvisionOptions;
/// use std::time::Duration;
///
/// let opts = ProvisionOptions {
///     release_base_url: Some("https://mirror.example.org/python".to_string()),
///     network_timeout: Duration::from_secs(120),
///     ..Default::default()
/// };
/// assert_eq!(opts.release_base_url(), "https://mirror.example.org/python");
/// ```
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Interpreter family bundled by the host.
    pub family: InterpreterFamily,

    /// Timeout for the host probe and the version probe.
    ///
    /// Default: 60 seconds
    pub process_timeout: Duration,

    /// Timeout for a package manager run.
    ///
    /// Default: 300 seconds
    pub install_timeout: Duration,

    /// Timeout for each network operation.
    ///
    /// Default: 30 seconds
    pub network_timeout: Duration,

    /// Base URL overriding the family's official release server.
    pub release_base_url: Option<String>,

    /// Directory for the downloaded archive and extraction scratch space.
    ///
    /// Default: `std::env::temp_dir()`
    pub scratch_dir: Option<PathBuf>,
}

impl ProvisionOptions {
    /// Effective release base URL.
    pub fn release_base_url(&self) -> &str {
        self.release_base_url
            .as_deref()
            .unwrap_or_else(|| self.family.release_base_url())
    }

    /// Effective scratch directory.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            family: InterpreterFamily::Python,
            process_timeout: Duration::from_secs(60),
            install_timeout: Duration::from_secs(300),
            network_timeout: Duration::from_secs(30),
            release_base_url: None,
            scratch_dir: None,
        }
    }
}
