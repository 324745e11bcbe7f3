//! Probing stages submodule.
//!
//! This module contains the stages that interrogate the host installation
//! before anything is downloaded or installed:
//!
//! - `locate_interpreter`: launch the host headless and recover the bundled
//!   interpreter's install root from its startup output
//! - `resolve_binary`: pick the interpreter executable inside `bin`
//! - `probe_version`: run the interpreter's version flag and parse the banner
//!
//! Every subprocess goes through `command::Invocation`, which applies a time
//! budget and kills the child if the caller gives up.

mod binary;
pub(crate) mod command;
mod host;
mod version;

pub use binary::resolve_binary;
pub use host::locate_interpreter;
pub use version::probe_version;
