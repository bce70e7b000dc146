//! Zip packaging of session file entries inside a temporary workspace.
//!
//! Each build call owns a fresh workspace for its whole duration; the
//! workspace is removed on every exit path, normal or erroring.

use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};

use metrics::counter;
use slug::slugify;
use tempfile::TempDir;
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::domain::artifact::FileEntry;
use crate::domain::data_uri::{DataUri, DataUriError};

const DEFAULT_ARCHIVE_STEM: &str = "session-assets";

/// Errors raised while building an archive. Any of these aborts the whole
/// build; no partial archive is ever returned.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to decode archive entry `{path}`")]
    EntryDecode {
        path: String,
        #[source]
        source: DataUriError,
    },
    #[error("archive entry `{path}` escapes the workspace")]
    InvalidEntryPath { path: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("zip packaging failed: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Packaged archive bytes plus the name the artifact publishes under.
#[derive(Debug, Clone)]
pub struct BuiltArchive {
    pub bytes: Vec<u8>,
    pub archive_name: String,
}

/// Outcome of an archive build. Zero included entries yield the explicit
/// `Empty` signal, never a zero-file archive.
#[derive(Debug)]
pub enum ArchiveOutcome {
    Archive(BuiltArchive),
    Empty,
}

/// Packages a scoped subset of named file entries into a zip archive.
#[derive(Debug, Default)]
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build a zip archive from the entries whose `relative_path` starts with
    /// `directory_scope` (all entries when the scope is empty). Out-of-scope
    /// entries are silently excluded; this is documented policy, not an
    /// error.
    pub async fn build(
        &self,
        directory_scope: &str,
        entries: &[FileEntry],
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let included: Vec<&FileEntry> = entries
            .iter()
            .filter(|entry| {
                directory_scope.is_empty() || entry.relative_path.starts_with(directory_scope)
            })
            .collect();

        let excluded = entries.len() - included.len();
        if excluded > 0 {
            debug!(excluded, scope = directory_scope, "entries outside the archive scope excluded");
        }
        if included.is_empty() {
            counter!("fucina_archive_empty_total").increment(1);
            return Ok(ArchiveOutcome::Empty);
        }

        let workspace = TempDir::new()?;
        for entry in &included {
            let payload = DataUri::decode(&entry.content)
                .map_err(|source| ArchiveError::EntryDecode {
                    path: entry.relative_path.clone(),
                    source,
                })?
                .into_payload();

            let target = resolve_entry_path(workspace.path(), &entry.relative_path)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&target, payload).await?;
        }

        let bytes = pack_workspace(workspace.path(), &included).await?;
        let archive_name = archive_name_for(directory_scope);
        counter!("fucina_archive_entries_total").increment(included.len() as u64);
        debug!(
            entries = included.len(),
            size_bytes = bytes.len(),
            name = %archive_name,
            "packaged archive"
        );

        Ok(ArchiveOutcome::Archive(BuiltArchive {
            bytes,
            archive_name,
        }))
    }
}

/// Resolve an entry path inside the workspace, rejecting absolute paths and
/// parent traversal.
fn resolve_entry_path(root: &Path, relative: &str) -> Result<PathBuf, ArchiveError> {
    let path = Path::new(relative);
    if path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(ArchiveError::InvalidEntryPath {
            path: relative.to_string(),
        });
    }
    Ok(root.join(path))
}

/// Package the workspace contents into a zip container, preserving the
/// iteration order of the included entries for determinism.
async fn pack_workspace(root: &Path, included: &[&FileEntry]) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in included {
        let contents = fs::read(root.join(&entry.relative_path)).await?;
        writer.start_file(entry.relative_path.as_str(), options)?;
        writer.write_all(&contents)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn archive_name_for(directory_scope: &str) -> String {
    let mut stem = slugify(directory_scope);
    if stem.is_empty() {
        stem = DEFAULT_ARCHIVE_STEM.to_string();
    }
    format!("{stem}-{}.zip", Uuid::new_v4())
}
