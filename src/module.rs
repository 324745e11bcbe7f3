//! Third-party package installation into the bundled interpreter.
//!
//! This module provides [`install_module`], which locates the bundled
//! interpreter and runs its package manager for one package. The package
//! identifier is checked against an allow-list first and is always passed as
//! a single argument, never through a shell.

use crate::probe::command::{Invocation, InvocationError};
use crate::probe::{locate_interpreter, resolve_binary};
use crate::{
    InstalledModule, InterpreterBinaryName, InterpreterLocation, ProvisionError, ProvisionOptions,
    ProvisionProgress,
};
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn package_regex() -> &'static Regex {
    static PACKAGE_RE: OnceLock<Regex> = OnceLock::new();
    PACKAGE_RE.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?(?:\[[A-Za-z0-9._-]+(?:,[A-Za-z0-9._-]+)*\])?(?:(?:==|~=)[A-Za-z0-9.*+-]+)?$",
        )
        .expect("Invalid package regex")
    })
}

/// Check a package identifier before it reaches the package manager.
///
/// Accepted: a distribution name, optional `[extra,...]`, optional `==` or
/// `~=` version pin. Whitespace, quotes, path separators and shell
/// metacharacters are rejected.
///
/// # Example
///
/// ```rust
/// use bundled_pydev::validate_package;
///
/// assert!(validate_package("requests[socks]==2.31.0").is_ok());
/// assert!(validate_package("numpy; rm -rf ~").is_err());
/// ```
pub fn validate_package(package: &str) -> Result<(), ProvisionError> {
    let invalid = |reason: String| ProvisionError::InvalidPackage {
        package: package.to_string(),
        reason,
    };

    let trimmed = package.trim();
    if trimmed.is_empty() {
        return Err(invalid("package name is empty".to_string()));
    }
    if let Some(c) = trimmed
        .chars()
        .find(|c| c.is_whitespace() || ";&|`$<>()\\\"'{}!?#/".contains(*c))
    {
        return Err(invalid(format!("contains forbidden character `{}`", c)));
    }
    if !package_regex().is_match(trimmed) {
        return Err(invalid(
            "expected `name`, `name[extra]` or `name==version`".to_string(),
        ));
    }
    Ok(())
}

/// Find the package manager entrypoint shipped with the interpreter, e.g.
/// `<location>/lib/python3.7/site-packages/pip`.
///
/// When several `lib/python*` directories carry one, the lexicographically
/// first wins.
async fn bundled_entrypoint(location: &InterpreterLocation, manager: &str) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(location.lib_dir()).await.ok()?;
    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_python_lib = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with("python"));
        if !is_python_lib {
            continue;
        }
        let entrypoint = entry.path().join("site-packages").join(manager);
        if tokio::fs::metadata(&entrypoint).await.is_ok() {
            candidates.push(entrypoint);
        }
    }
    candidates.sort();
    candidates.into_iter().next()
}

/// Arguments that run the package manager for `package`.
async fn package_manager_args(
    location: &InterpreterLocation,
    manager: &str,
    package: &str,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = match bundled_entrypoint(location, manager).await {
        Some(entrypoint) => vec![entrypoint.into_os_string()],
        None => {
            tracing::debug!(
                location = %location,
                "no bundled {} entrypoint, falling back to -m {}",
                manager,
                manager
            );
            vec!["-m".into(), manager.into()]
        }
    };
    args.push("install".into());
    args.push(package.into());
    args
}

/// Run the bundled package manager for `package`.
///
/// Executes `<binary> <entrypoint> install <package>` (or
/// `<binary> -m pip install <package>` when no bundled entrypoint exists).
///
/// # Errors
///
/// - `InvalidPackage` before anything runs if the identifier is rejected
/// - `ModuleInstall` if the package manager cannot start, exits non-zero or
///   prints nothing at all
/// - `Timeout` if it runs longer than `options.install_timeout`
pub async fn run_package_manager(
    location: &InterpreterLocation,
    binary: &InterpreterBinaryName,
    package: &str,
    options: &ProvisionOptions,
) -> Result<InstalledModule, ProvisionError> {
    validate_package(package)?;
    let package = package.trim();

    let args = package_manager_args(location, options.family.package_manager(), package).await;
    let invocation = Invocation::new(binary.path_in(location)).args(args);
    let command = invocation.command_line();

    let captured = invocation
        .run(options.install_timeout)
        .await
        .map_err(|e| match e {
            InvocationError::TimedOut(duration) => ProvisionError::Timeout {
                operation: command.clone(),
                duration,
            },
            InvocationError::Io(e) => ProvisionError::ModuleInstall {
                command: command.clone(),
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                message: format!("could not start interpreter: {}", e),
            },
        })?;

    let failure = if !captured.status.success() {
        Some(format!("package manager exited with {}", captured.status))
    } else if captured.is_silent() {
        Some("package manager printed nothing".to_string())
    } else {
        None
    };
    if let Some(message) = failure {
        return Err(ProvisionError::ModuleInstall {
            command,
            exit_code: captured.status.code(),
            stdout: captured.stdout,
            stderr: captured.stderr,
            message,
        });
    }

    tracing::info!(package, "installed module into bundled interpreter");
    Ok(InstalledModule {
        package: package.to_string(),
        interpreter: invocation.program().to_path_buf(),
        output: captured.stdout,
    })
}

/// Install a third-party package into the interpreter bundled with `host`.
///
/// Validates `package`, locates the interpreter, resolves its binary and
/// runs the package manager, reporting progress through `on_progress`.
///
/// # Example
///
/// ```rust,no_run
/// use bundled_pydev::{install_module, ProvisionOptions};
/// use std::path::Path;
///
/// #[tokio::main]
/// async fn main() {
///     let result = install_module(
///         Path::new("/opt/blender/blender"),
///         "numpy",
///         &ProvisionOptions::default(),
///         |progress| println!("{}", progress),
///     )
///     .await;
///
///     if let Err(e) = result {
///         eprintln!("Failed: {}. Fix: {}", e, e.fix_suggestion());
///     }
/// }
/// ```
pub async fn install_module<F>(
    host: &Path,
    package: &str,
    options: &ProvisionOptions,
    on_progress: F,
) -> Result<InstalledModule, ProvisionError>
where
    F: Fn(ProvisionProgress) + Send + Sync,
{
    validate_package(package)?;

    on_progress(ProvisionProgress::LocatingInterpreter {
        host: host.to_path_buf(),
    });
    let location = locate_interpreter(host, options).await?;
    on_progress(ProvisionProgress::InterpreterLocated {
        location: location.clone(),
    });

    let binary = resolve_binary(&location, options.family).await?;
    on_progress(ProvisionProgress::BinaryResolved {
        binary: binary.clone(),
    });

    on_progress(ProvisionProgress::InstallingModule {
        package: package.trim().to_string(),
    });
    let installed = run_package_manager(&location, &binary, package, options).await?;
    on_progress(ProvisionProgress::ModuleInstalled {
        package: installed.package.clone(),
    });
    Ok(installed)
}
