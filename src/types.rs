//! Values flowing between the provisioning stages.

use crate::ParseError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

/// Install root of the interpreter bundled inside the host application.
///
/// Re-probed on every run; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterpreterLocation(PathBuf);

impl InterpreterLocation {
    /// Wrap an install root path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// The install root.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// The `bin` directory holding the interpreter executables.
    pub fn bin_dir(&self) -> PathBuf {
        self.0.join("bin")
    }

    /// The `include` directory receiving header sets.
    pub fn include_dir(&self) -> PathBuf {
        self.0.join("include")
    }

    /// The `lib` directory holding the standard library and site-packages.
    pub fn lib_dir(&self) -> PathBuf {
        self.0.join("lib")
    }
}

impl fmt::Display for InterpreterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// File name of the interpreter executable inside `<location>/bin`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterpreterBinaryName(String);

impl InterpreterBinaryName {
    /// Wrap an executable file name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The bare file name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute path of the executable under `location`.
    pub fn path_in(&self, location: &InterpreterLocation) -> PathBuf {
        location.bin_dir().join(&self.0)
    }
}

impl fmt::Display for InterpreterBinaryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn version_regex() -> &'static Regex {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    VERSION_RE.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?([A-Za-z0-9+]*)$").expect("Invalid version regex")
    })
}

/// Version reported by the bundled interpreter's banner.
///
/// Accepts `MAJOR.MINOR` and `MAJOR.MINOR.PATCH` with an optional
/// pre-release or local suffix (`3.12.0rc1`, `3.9.1+`). The raw text is kept
/// verbatim; [`release_number`](Self::release_number) and
/// [`release_name`](Self::release_name) give the forms upstream publishes under.
///
/// # Example
///
/// ```rust
/// use bundled_pydev::InterpreterVersion;
///
/// let version: InterpreterVersion = "3.7.4".parse().unwrap();
/// assert_eq!(version.short_version(), "3.7");
/// assert_eq!(version.to_string(), "3.7.4");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterpreterVersion {
    raw: String,
    major: u64,
    minor: u64,
    patch: Option<u64>,
}

impl InterpreterVersion {
    /// Major component.
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Minor component.
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// Patch component, if the banner carried one.
    pub fn patch(&self) -> Option<u64> {
        self.patch
    }

    /// The version exactly as reported.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Truncated `MAJOR.MINOR` form.
    pub fn short_version(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// Numeric `MAJOR.MINOR[.PATCH]` part with any suffix dropped.
    ///
    /// Pre-releases are published under their final release's directory,
    /// e.g. `3.13.0rc2` lives in `3.13.0/`.
    ///
    /// ```rust
    /// use bundled_pydev::InterpreterVersion;
    ///
    /// let version: InterpreterVersion = "3.13.0rc2".parse().unwrap();
    /// assert_eq!(version.release_number(), "3.13.0");
    /// ```
    pub fn release_number(&self) -> String {
        match self.patch {
            Some(patch) => format!("{}.{}.{}", self.major, self.minor, patch),
            None => self.short_version(),
        }
    }

    /// Version as upstream names its source release: the raw text without a
    /// local `+...` build suffix (`3.9.1+` was built from `3.9.1`).
    pub fn release_name(&self) -> &str {
        self.raw.split('+').next().unwrap_or(&self.raw)
    }
}

impl FromStr for InterpreterVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseError::MalformedField {
            field: "version",
            value: s.to_string(),
        };

        let caps = version_regex().captures(s).ok_or_else(malformed)?;
        let number = |idx: usize| -> Result<Option<u64>, ParseError> {
            caps.get(idx)
                .map(|m| m.as_str().parse::<u64>().map_err(|_| malformed()))
                .transpose()
        };

        Ok(Self {
            raw: s.to_string(),
            major: number(1)?.ok_or_else(malformed)?,
            minor: number(2)?.ok_or_else(malformed)?,
            patch: number(3)?,
        })
    }
}

impl fmt::Display for InterpreterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Destination directory populated with an upstream header tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledHeaderSet {
    /// `<location>/include/<family><MAJOR><MINOR>`.
    pub path: PathBuf,

    /// Version whose headers were installed.
    pub version: InterpreterVersion,

    /// Number of regular files written.
    pub file_count: usize,
}

/// Outcome of a successful package manager run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledModule {
    /// Package identifier as passed to the package manager.
    pub package: String,

    /// Interpreter that ran the package manager.
    pub interpreter: PathBuf,

    /// Captured standard output of the package manager.
    pub output: String,
}
