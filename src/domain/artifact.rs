//! Artifact data model: file entries going into an archive and the
//! caller-facing materialization outcomes.

use serde::{Deserialize, Serialize};

/// One named file considered for archive packaging.
///
/// `content` is the entry's data-URI text; it is decoded only for entries
/// that survive directory-scope filtering. `relative_path` must be a
/// forward-slash relative path with no leading separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub relative_path: String,
    pub content: String,
}

impl FileEntry {
    pub fn new(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: content.into(),
        }
    }
}

/// A durably referenceable output object after publication. The reference is
/// owned by the asset store from here on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub directory: String,
    pub filename: String,
    pub reference: String,
    pub is_archive: bool,
    pub description: String,
}

/// Outcome of one materialize call.
///
/// The empty-archive case is a distinct variant rather than an artifact with
/// a hollow reference, so callers are forced to branch instead of silently
/// publishing a useless object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    Artifact(Artifact),
    NoFiles {
        directory: String,
        filename: String,
        description: String,
    },
}

impl Materialized {
    /// The published artifact, when one was produced.
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Artifact(artifact) => Some(artifact),
            Self::NoFiles { .. } => None,
        }
    }
}
