//! # bundled-pydev
//!
//! Development provisioning for the Python interpreter bundled inside a host
//! application such as Blender.
//!
//! Host applications often ship a private interpreter without its C headers
//! or with no easy way to add packages. This crate asks the host where that
//! interpreter lives, finds its executable and version, and then either
//! installs the matching headers from the official source release or runs
//! the interpreter's own package manager.
//!
//! ## Features
//!
//! - [`install_headers`] runs the full header pipeline:
//!   locate → resolve binary → probe version → fetch → unpack
//! - [`install_module`] installs one package with the bundled `pip`
//! - The individual stages ([`locate_interpreter`], [`resolve_binary`],
//!   [`probe_version`], [`fetch_archive`], [`unpack_headers`]) are public
//!   for callers that drive the pipeline themselves
//! - [`ProvisionProgress`] events for UI feedback
//! - [`ProvisionError::fix_suggestion`] for actionable failure messages
//!
//! ## Example
//!
//! ```rust,no_run
//! use bundled_pydev::{install_headers, install_module, ProvisionOptions};
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let host = Path::new("/opt/blender/blender");
//!     let options = ProvisionOptions::default();
//!
//!     match install_headers(host, &options, |p| println!("{}", p)).await {
//!         Ok(headers) => println!("headers installed at {}", headers.path.display()),
//!         Err(e) => eprintln!("{}\n{}", e, e.fix_suggestion()),
//!     }
//!
//!     if let Err(e) = install_module(host, "numpy", &options, |p| println!("{}", p)).await {
//!         eprintln!("{}\n{}", e, e.fix_suggestion());
//!     }
//! }
//! ```

mod error;
mod family;
mod fetch;
mod headers;
mod lock;
mod module;
mod options;
mod probe;
mod progress;
mod types;
mod unpack;

pub use error::{InstallStage, ParseError, ProvisionError};
pub use family::{InterpreterFamily, PROBE_SENTINEL};
pub use fetch::{fetch_archive, ArchiveHandle};
pub use headers::{install_headers, HeaderStage};
pub use module::{install_module, run_package_manager, validate_package};
pub use options::ProvisionOptions;
pub use probe::{locate_interpreter, probe_version, resolve_binary};
pub use progress::ProvisionProgress;
pub use types::{
    InstalledHeaderSet, InstalledModule, InterpreterBinaryName, InterpreterLocation,
    InterpreterVersion,
};
pub use unpack::{header_destination, unpack_headers, unpack_headers_with_progress};
