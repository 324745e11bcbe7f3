//! Decompress, extract and re-pack the header tree of a release archive.
//!
//! The work is strictly staged, each step starting only after the previous
//! one has fully closed its output:
//!
//! 1. gunzip the downloaded `.tgz` into a plain tar in scratch space
//! 2. extract that tar into scratch space, yielding `<stem>/Include`
//! 3. pack `Include` into an in-memory tar
//! 4. replace the destination directory and unpack the in-memory tar into it
//!
//! Tar and gzip are blocking, so everything runs on tokio's blocking pool.

use crate::lock::lock_destination;
use crate::{
    ArchiveHandle, InstallStage, InstalledHeaderSet, InterpreterFamily, InterpreterLocation,
    InterpreterVersion, ProvisionError, ProvisionOptions, ProvisionProgress,
};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Install the `Include` tree of `archive` into
/// `<location>/include/<family><MAJOR><MINOR>`.
///
/// An existing destination is replaced wholesale, so repeated runs leave no
/// residue. Concurrent calls for the same destination within this process
/// are serialized, and the destination stays locked until the blocking
/// write finishes even if this future is dropped first. Scratch files are
/// removed whether or not the install succeeds; a failure after the old tree
/// was removed leaves the destination partially written.
///
/// # Errors
///
/// `Install`, naming the [`InstallStage`] that failed and the path involved.
pub async fn unpack_headers(
    archive: &ArchiveHandle,
    location: &InterpreterLocation,
    version: &InterpreterVersion,
    options: &ProvisionOptions,
) -> Result<InstalledHeaderSet, ProvisionError> {
    unpack_headers_with_progress(archive, location, version, options, |_| {}).await
}

/// [`unpack_headers`], reporting `Decompressing` and `InstallingHeaders` as
/// each step actually starts.
pub async fn unpack_headers_with_progress<F>(
    archive: &ArchiveHandle,
    location: &InterpreterLocation,
    version: &InterpreterVersion,
    options: &ProvisionOptions,
    on_progress: F,
) -> Result<InstalledHeaderSet, ProvisionError>
where
    F: Fn(ProvisionProgress) + Send + Sync,
{
    let family = options.family;
    let destination = header_destination(location, family, version);
    let guard = lock_destination(&destination).await;

    let (progress, mut steps) = mpsc::unbounded_channel();
    let job = UnpackJob {
        archive: archive.path().to_path_buf(),
        scratch_root: options.scratch_dir(),
        stem: family.archive_stem(version),
        include_subdir: family.include_subdir().to_string(),
        destination: destination.clone(),
        progress,
    };

    // Held until the blocking write returns, even if this future is dropped.
    let task = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        job.run()
    });

    // The channel closes when the job is dropped at the end of `run`.
    while let Some(step) = steps.recv().await {
        on_progress(step);
    }

    let file_count = task.await.map_err(|e| ProvisionError::Install {
        stage: InstallStage::Unpack,
        path: destination.clone(),
        message: format!("unpack task failed: {}", e),
    })??;

    tracing::info!(
        destination = %destination.display(),
        file_count,
        "installed header set"
    );

    Ok(InstalledHeaderSet {
        path: destination,
        version: version.clone(),
        file_count,
    })
}

/// Inputs of the blocking part, owned so they can cross into the pool.
struct UnpackJob {
    archive: PathBuf,
    scratch_root: PathBuf,
    stem: String,
    include_subdir: String,
    destination: PathBuf,
    progress: mpsc::UnboundedSender<ProvisionProgress>,
}

fn stage_error(stage: InstallStage, path: &Path) -> impl FnOnce(io::Error) -> ProvisionError + '_ {
    move |e| ProvisionError::Install {
        stage,
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

impl UnpackJob {
    fn run(self) -> Result<usize, ProvisionError> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", self.stem))
            .tempdir_in(&self.scratch_root)
            .map_err(stage_error(InstallStage::Scratch, &self.scratch_root))?;

        let tar_path = scratch.path().join(format!("{}.tar", self.stem));
        self.report(ProvisionProgress::Decompressing);
        self.decompress(&tar_path)?;

        let extracted = scratch.path().join("extracted");
        extract(&tar_path, &extracted)?;

        let include = extracted.join(&self.stem).join(&self.include_subdir);
        if !include.is_dir() {
            return Err(ProvisionError::Install {
                stage: InstallStage::Extract,
                path: include,
                message: format!(
                    "archive has no {}/{} directory",
                    self.stem, self.include_subdir
                ),
            });
        }

        let packed = repack(&include)?;
        self.report(ProvisionProgress::InstallingHeaders {
            destination: self.destination.clone(),
        });
        let file_count = install(packed, &self.destination)?;

        tracing::debug!(scratch = %scratch.path().display(), "removing scratch directory");
        Ok(file_count)
    }

    fn report(&self, step: ProvisionProgress) {
        // A dropped receiver means the caller stopped listening.
        let _ = self.progress.send(step);
    }

    fn decompress(&self, tar_path: &Path) -> Result<(), ProvisionError> {
        let input = File::open(&self.archive)
            .map_err(stage_error(InstallStage::Decompress, &self.archive))?;
        let output =
            File::create(tar_path).map_err(stage_error(InstallStage::Decompress, tar_path))?;

        let mut decoder = GzDecoder::new(BufReader::new(input));
        let mut writer = BufWriter::new(output);
        io::copy(&mut decoder, &mut writer)
            .and_then(|_| writer.flush())
            .map_err(stage_error(InstallStage::Decompress, &self.archive))
    }
}

fn extract(tar_path: &Path, into: &Path) -> Result<(), ProvisionError> {
    let file = File::open(tar_path).map_err(stage_error(InstallStage::Extract, tar_path))?;
    tar::Archive::new(BufReader::new(file))
        .unpack(into)
        .map_err(stage_error(InstallStage::Extract, tar_path))
}

/// Pack the contents of `dir` (not `dir` itself) into an in-memory tar.
fn repack(dir: &Path) -> Result<Vec<u8>, ProvisionError> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    builder
        .append_dir_all("", dir)
        .and_then(|_| builder.into_inner())
        .map_err(stage_error(InstallStage::Repack, dir))
}

/// Replace `destination` with the contents of `packed`, returning the number
/// of regular files written.
fn install(packed: Vec<u8>, destination: &Path) -> Result<usize, ProvisionError> {
    let unpack_err = stage_error(InstallStage::Unpack, destination);

    let result = (|| -> io::Result<usize> {
        if destination.exists() {
            fs::remove_dir_all(destination)?;
        }
        fs::create_dir_all(destination)?;

        let mut archive = tar::Archive::new(Cursor::new(packed));
        let mut files = 0;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let is_file = entry.header().entry_type().is_file();
            if entry.unpack_in(destination)? && is_file {
                files += 1;
            }
        }
        Ok(files)
    })();

    result.map_err(unpack_err)
}

/// Directory the family's headers for `version` are installed into.
pub fn header_destination(
    location: &InterpreterLocation,
    family: InterpreterFamily,
    version: &InterpreterVersion,
) -> PathBuf {
    location.include_dir().join(family.include_dir_name(version))
}
