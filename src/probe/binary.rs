//! Interpreter executable lookup inside the bundled `bin` directory.

use crate::{InterpreterBinaryName, InterpreterFamily, InterpreterLocation, ProvisionError};

/// Pick the interpreter executable inside `<location>/bin`.
///
/// Candidates are regular files (symlinks are followed) whose name contains
/// the family's binary marker. When several minor versions are installed the
/// lexicographically first name wins, e.g. `python3.7m` over `python3.9`.
///
/// # Errors
///
/// `BinaryNotFound` if the directory is missing, unreadable, or holds no
/// candidate.
pub async fn resolve_binary(
    location: &InterpreterLocation,
    family: InterpreterFamily,
) -> Result<InterpreterBinaryName, ProvisionError> {
    let bin_dir = location.bin_dir();
    let marker = family.binary_marker();
    let not_found = || ProvisionError::BinaryNotFound {
        bin_dir: bin_dir.clone(),
        marker: marker.to_string(),
    };

    let mut entries = tokio::fs::read_dir(&bin_dir).await.map_err(|e| {
        tracing::debug!(dir = %bin_dir.display(), error = %e, "cannot list bin directory");
        not_found()
    })?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|_| not_found())? {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !name.contains(marker) {
            continue;
        }
        match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_file() => candidates.push(name),
            _ => {}
        }
    }

    candidates.sort();
    tracing::debug!(?candidates, "interpreter binary candidates");

    candidates
        .into_iter()
        .next()
        .map(InterpreterBinaryName::new)
        .ok_or_else(not_found)
}
