//! Interpreter family descriptor.

use crate::InterpreterVersion;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Sentinel printed by the host application's embedded interpreter during
/// the location probe.
pub const PROBE_SENTINEL: &str = "###BUNDLED_PYDEV_PROBE###";

/// The language family of a bundled interpreter.
///
/// Every literal the provisioning stages depend on (binary naming, banner
/// format, release layout, destination naming) is looked up here so that no
/// stage hard-codes offsets or names.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new families in
/// future versions.
///
/// # Example
///
/// ```rust
/// use bundled_pydev::InterpreterFamily;
///
/// for family in InterpreterFamily::all() {
///     println!("{}: {}", family.display_name(), family.binary_marker());
/// }
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::EnumString,
    strum::Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum InterpreterFamily {
    /// CPython, as bundled by Blender and similar hosts.
    #[default]
    Python,
}

impl InterpreterFamily {
    /// Human-readable name of the family.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Python => "Python",
        }
    }

    /// Substring every interpreter binary of this family carries in its name.
    ///
    /// ```rust
    /// use bundled_pydev::InterpreterFamily;
    ///
    /// assert_eq!(InterpreterFamily::Python.binary_marker(), "python3");
    /// ```
    pub fn binary_marker(&self) -> &'static str {
        match self {
            Self::Python => "python3",
        }
    }

    /// Flag that makes the interpreter print its version banner.
    pub fn version_flag(&self) -> &'static str {
        match self {
            Self::Python => "-V",
        }
    }

    /// Text preceding the version number in the interpreter's banner.
    pub fn banner_prefix(&self) -> &'static str {
        match self {
            Self::Python => "Python ",
        }
    }

    /// Default base URL of the official source releases.
    pub fn release_base_url(&self) -> &'static str {
        match self {
            Self::Python => "https://www.python.org/ftp/python",
        }
    }

    /// Name of the top-level directory inside a release tarball, which is
    /// also the tarball's file stem.
    ///
    /// ```rust
    /// use bundled_pydev::{InterpreterFamily, InterpreterVersion};
    ///
    /// let version: InterpreterVersion = "3.9.1".parse().unwrap();
    /// assert_eq!(InterpreterFamily::Python.archive_stem(&version), "Python-3.9.1");
    /// ```
    pub fn archive_stem(&self, version: &InterpreterVersion) -> String {
        match self {
            Self::Python => format!("Python-{}", version.release_name()),
        }
    }

    /// Download URL of the release tarball for `version` under `base_url`.
    ///
    /// The directory is the numeric release, so pre-releases resolve to
    /// e.g. `3.13.0/Python-3.13.0rc2.tgz`.
    ///
    /// ```rust
    /// use bundled_pydev::{InterpreterFamily, InterpreterVersion};
    ///
    /// let version: InterpreterVersion = "3.7.4".parse().unwrap();
    /// let family = InterpreterFamily::Python;
    /// assert_eq!(
    ///     family.archive_url(family.release_base_url(), &version),
    ///     "https://www.python.org/ftp/python/3.7.4/Python-3.7.4.tgz"
    /// );
    /// ```
    pub fn archive_url(&self, base_url: &str, version: &InterpreterVersion) -> String {
        format!(
            "{}/{}/{}.tgz",
            base_url.trim_end_matches('/'),
            version.release_number(),
            self.archive_stem(version)
        )
    }

    /// Subdirectory of the extracted release tree holding the C headers.
    pub fn include_subdir(&self) -> &'static str {
        match self {
            Self::Python => "Include",
        }
    }

    /// Directory name under `<location>/include` receiving the headers.
    ///
    /// ```rust
    /// use bundled_pydev::{InterpreterFamily, InterpreterVersion};
    ///
    /// let version: InterpreterVersion = "3.9.1".parse().unwrap();
    /// assert_eq!(InterpreterFamily::Python.include_dir_name(&version), "python39");
    /// ```
    pub fn include_dir_name(&self, version: &InterpreterVersion) -> String {
        match self {
            Self::Python => format!("python{}{}", version.major(), version.minor()),
        }
    }

    /// Label the host application prints right before the path of its
    /// bundled interpreter.
    pub fn probe_label(&self) -> &'static str {
        match self {
            Self::Python => "found bundled python: ",
        }
    }

    /// Path fragment terminating the bundled interpreter path in the host's
    /// startup output.
    pub fn probe_path_suffix(&self) -> &'static str {
        match self {
            Self::Python => "/python",
        }
    }

    /// Arguments making the host start headless with factory settings, print
    /// the probe sentinel through its embedded interpreter and exit.
    pub fn probe_args(&self) -> Vec<String> {
        match self {
            Self::Python => vec![
                "--factory-startup".to_string(),
                "-b".to_string(),
                "--python-expr".to_string(),
                format!(
                    "import sys;print('{}');sys.stdout.flush();sys.exit()",
                    PROBE_SENTINEL
                ),
            ],
        }
    }

    /// Module name of the family's package manager.
    pub fn package_manager(&self) -> &'static str {
        match self {
            Self::Python => "pip",
        }
    }

    /// Iterator over all known families.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}
