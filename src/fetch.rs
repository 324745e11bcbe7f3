//! Release archive download.
//!
//! [`fetch_archive`] streams the source release tarball for a version into a
//! temporary file. A HEAD request goes out first purely for diagnostics; its
//! outcome is logged and otherwise ignored.

use crate::{InterpreterVersion, ProvisionError, ProvisionOptions};
use futures::StreamExt;
use reqwest::header::{HeaderName, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

/// A fully downloaded release archive.
///
/// Archives fetched by [`fetch_archive`] live in a temporary file that is
/// deleted when the handle is dropped; archives opened with
/// [`ArchiveHandle::local`] are left alone.
#[derive(Debug)]
pub struct ArchiveHandle {
    file: ArchiveFile,
    url: String,
    bytes: u64,
}

#[derive(Debug)]
enum ArchiveFile {
    Temporary(NamedTempFile),
    Local(PathBuf),
}

impl ArchiveHandle {
    /// Use an archive that is already on disk instead of downloading it.
    ///
    /// # Errors
    ///
    /// `Fetch` if the file cannot be read.
    pub fn local(path: impl Into<PathBuf>) -> Result<Self, ProvisionError> {
        let path = path.into();
        let url = format!("file://{}", path.display());
        let bytes = std::fs::metadata(&path)
            .map_err(|e| ProvisionError::Fetch {
                url: url.clone(),
                status: None,
                message: e.to_string(),
            })?
            .len();
        Ok(Self {
            file: ArchiveFile::Local(path),
            url,
            bytes,
        })
    }

    /// Path of the downloaded archive.
    pub fn path(&self) -> &Path {
        match &self.file {
            ArchiveFile::Temporary(file) => file.path(),
            ArchiveFile::Local(path) => path,
        }
    }

    /// URL the archive was downloaded from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Size of the archive in bytes.
    pub fn len(&self) -> u64 {
        self.bytes
    }

    /// True for a zero-byte download.
    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}

/// Download the source release archive for `version`.
///
/// The URL is built from the family's template under
/// `options.release_base_url()`. The body is written to a fresh temporary
/// file under `options.scratch_dir()` as chunks arrive.
///
/// # Errors
///
/// - `Fetch` (carrying the URL) for connection errors, non-2xx responses,
///   body read errors, and temp file write errors
/// - `Timeout` if connecting, receiving headers, or waiting for any single
///   chunk exceeds `options.network_timeout`
///
/// # Example
///
/// ```rust,no_run
/// use bundled_pydev::{fetch_archive, ProvisionOptions};
///
/// # async fn run() -> Result<(), bundled_pydev::ProvisionError> {
/// let version = "3.9.1".parse().unwrap();
/// let archive = fetch_archive(&version, &ProvisionOptions::default()).await?;
/// println!("{} bytes at {}", archive.len(), archive.path().display());
/// # Ok(())
/// # }
/// ```
pub async fn fetch_archive(
    version: &InterpreterVersion,
    options: &ProvisionOptions,
) -> Result<ArchiveHandle, ProvisionError> {
    let family = options.family;
    let url = family.archive_url(options.release_base_url(), version);
    let limit = options.network_timeout;

    let fetch_error = |status: Option<u16>, message: String| ProvisionError::Fetch {
        url: url.clone(),
        status,
        message,
    };
    let timed_out = |what: &str| ProvisionError::Timeout {
        operation: format!("{} {}", what, url),
        duration: limit,
    };

    let client = Client::builder()
        .connect_timeout(limit)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| fetch_error(None, format!("failed to build HTTP client: {}", e)))?;

    log_head(&client, &url, options).await;

    let response = timeout(limit, client.get(&url).send())
        .await
        .map_err(|_| timed_out("GET"))?
        .map_err(|e| fetch_error(None, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(
            Some(status.as_u16()),
            format!("server answered HTTP {}", status),
        ));
    }

    let scratch = options.scratch_dir();
    let named = tempfile::Builder::new()
        .prefix(&format!("{}-", family.archive_stem(version)))
        .suffix(".tgz")
        .tempfile_in(&scratch)
        .map_err(|e| {
            fetch_error(
                None,
                format!("cannot create temp file in {}: {}", scratch.display(), e),
            )
        })?;
    let std_file = named
        .as_file()
        .try_clone()
        .map_err(|e| fetch_error(None, format!("cannot open temp file: {}", e)))?;
    let mut file = tokio::fs::File::from_std(std_file);

    let mut bytes = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = timeout(limit, stream.next())
        .await
        .map_err(|_| timed_out("reading body of"))?
    {
        let chunk = chunk.map_err(|e| fetch_error(Some(status.as_u16()), e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| fetch_error(None, format!("writing temp file failed: {}", e)))?;
        bytes += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| fetch_error(None, format!("writing temp file failed: {}", e)))?;

    tracing::info!(%url, bytes, path = %named.path().display(), "downloaded release archive");

    Ok(ArchiveHandle {
        file: ArchiveFile::Temporary(named),
        url,
        bytes,
    })
}

/// Issue the diagnostic HEAD request.
async fn log_head(client: &Client, url: &str, options: &ProvisionOptions) {
    match timeout(options.network_timeout, client.head(url).send()).await {
        Ok(Ok(response)) => {
            let header = |name: HeaderName| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-")
                    .to_string()
            };
            tracing::debug!(
                %url,
                status = %response.status(),
                content_type = %header(CONTENT_TYPE),
                content_length = %header(CONTENT_LENGTH),
                "HEAD release archive"
            );
        }
        Ok(Err(e)) => tracing::warn!(%url, error = %e, "HEAD request failed"),
        Err(_) => tracing::warn!(%url, "HEAD request timed out"),
    }
}
