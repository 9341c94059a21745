use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use thiserror::Error;

use crate::shared::constants::{DEFAULT_SOURCE_EXTENSION, DOWNLOAD_CONNECT_TIMEOUT_SECS};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("input file {0} does not exist")]
    NotFound(PathBuf),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot create staging directory: {0}")]
    Staging(#[source] std::io::Error),
}

/// Where a job's video comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceLocation {
    Local(PathBuf),
    Remote(String),
}

impl SourceLocation {
    /// `http://` and `https://` inputs are remote, anything else is a path.
    pub fn parse(input: &str) -> Self {
        let lower = input.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceLocation::Remote(input.to_string())
        } else {
            SourceLocation::Local(PathBuf::from(input))
        }
    }
}

/// A video ready to be opened from the local filesystem.
///
/// Downloads live in a private temporary directory that is deleted when
/// this value is dropped or [`closed`](StagedSource::close). Local inputs
/// are borrowed in place and never deleted.
#[derive(Debug)]
pub struct StagedSource {
    path: PathBuf,
    staging: Option<TempDir>,
}

impl StagedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.staging.is_some()
    }

    /// Deletes the staging directory now, reporting failures.
    pub fn close(self) -> std::io::Result<()> {
        match self.staging {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

/// Resolves a [`SourceLocation`] to a local file, downloading if needed.
pub struct SourceStager {
    client: reqwest::blocking::Client,
}

impl SourceStager {
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(DOWNLOAD_CONNECT_TIMEOUT_SECS))
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| SourceError::Download {
                url: String::new(),
                source: e,
            })?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    pub fn stage(&self, location: &SourceLocation) -> Result<StagedSource, SourceError> {
        match location {
            SourceLocation::Local(path) => {
                if !path.is_file() {
                    return Err(SourceError::NotFound(path.clone()));
                }
                Ok(StagedSource {
                    path: path.clone(),
                    staging: None,
                })
            }
            SourceLocation::Remote(url) => {
                let staging = tempfile::Builder::new()
                    .prefix("framegrid-")
                    .tempdir()
                    .map_err(SourceError::Staging)?;
                let dest = staging
                    .path()
                    .join(format!("source.{}", url_extension(url)));
                self.download(url, &dest)?;
                Ok(StagedSource {
                    path: dest,
                    staging: Some(staging),
                })
            }
        }
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), SourceError> {
        let temp_path = dest.with_extension("part");
        let result = self.download_inner(url, dest, &temp_path);
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn download_inner(&self, url: &str, dest: &Path, temp_path: &Path) -> Result<(), SourceError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| SourceError::Download {
                url: url.to_string(),
                source: e,
            })?;
        if !response.status().is_success() {
            return Err(SourceError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let write_err = |source: std::io::Error| SourceError::Write {
            path: temp_path.to_path_buf(),
            source,
        };
        let mut file = fs::File::create(temp_path).map_err(write_err)?;
        let bytes = std::io::copy(&mut response, &mut file).map_err(write_err)?;
        file.flush().map_err(write_err)?;
        drop(file);

        fs::rename(temp_path, dest).map_err(|e| SourceError::Write {
            path: dest.to_path_buf(),
            source: e,
        })?;
        log::info!("Downloaded {bytes} bytes from {url}");
        Ok(())
    }
}

/// File extension from the last URL path segment, ignoring query strings.
fn url_extension(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            let segment = u.path_segments()?.next_back()?.to_string();
            let ext = Path::new(&segment).extension()?.to_str()?.to_ascii_lowercase();
            (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())).then_some(ext)
        })
        .unwrap_or_else(|| DEFAULT_SOURCE_EXTENSION.to_string())
}
