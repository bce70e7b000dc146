//! Ordered aggregation of the result chunks emitted while materializing one
//! artifact.
//!
//! A single producer writes chunks in emission order and finalizes exactly
//! once. Textual description deltas concatenate; structured fields are
//! last-write-wins.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("output aggregator was already finalized")]
    AlreadyFinalized,
}

/// Partial update emitted while one artifact is being materialized.
#[derive(Debug, Clone, Default)]
pub struct OutputChunk {
    pub directory: Option<String>,
    pub filename: Option<String>,
    pub reference: Option<String>,
    pub is_archive: Option<bool>,
    pub description: Option<String>,
}

/// The merged outcome of all chunks for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedOutput {
    pub directory: String,
    pub filename: String,
    pub reference: Option<String>,
    pub is_archive: bool,
    pub description: String,
}

/// Collects chunks from a single producer and exposes one finalized result.
///
/// Concurrent writers are not supported; each materialize call owns its own
/// aggregator.
#[derive(Debug, Default)]
pub struct OutputAggregator {
    chunks: Vec<OutputChunk>,
    finalized: bool,
}

impl OutputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk in emission order.
    pub fn write(&mut self, chunk: OutputChunk) -> Result<(), AggregatorError> {
        if self.finalized {
            return Err(AggregatorError::AlreadyFinalized);
        }
        self.chunks.push(chunk);
        Ok(())
    }

    /// Merge all chunks into the final output. Exactly one call per
    /// invocation; a second call fails with `AlreadyFinalized`.
    pub fn finalize(&mut self) -> Result<AggregatedOutput, AggregatorError> {
        if self.finalized {
            return Err(AggregatorError::AlreadyFinalized);
        }
        self.finalized = true;

        let mut output = AggregatedOutput::default();
        for chunk in self.chunks.drain(..) {
            if let Some(directory) = chunk.directory {
                output.directory = directory;
            }
            if let Some(filename) = chunk.filename {
                output.filename = filename;
            }
            if let Some(reference) = chunk.reference {
                output.reference = Some(reference);
            }
            if let Some(is_archive) = chunk.is_archive {
                output.is_archive = is_archive;
            }
            if let Some(description) = chunk.description {
                output.description.push_str(&description);
            }
        }
        Ok(output)
    }

    /// Returns true when no chunks have been written.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
