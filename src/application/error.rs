use thiserror::Error;

use crate::application::aggregator::AggregatorError;
use crate::infra::archive::ArchiveError;
use crate::infra::assets::{PublishError, SessionAssetError};
use crate::infra::convert::ConversionError;

/// Failures surfaced by a materialize call.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("request must set either `archive` or non-empty `content`, not both or neither")]
    InvalidRequest,
    #[error("unsupported export format: {0}")]
    UnsupportedExportFormat(String),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    SessionAssets(#[from] SessionAssetError),
    #[error(transparent)]
    Aggregator(#[from] AggregatorError),
}
