//! Materialization orchestrator: dispatches a request to the archive,
//! conversion, or direct-encode path and publishes the result.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::aggregator::{AggregatedOutput, OutputAggregator, OutputChunk};
use crate::application::error::MaterializeError;
use crate::domain::artifact::{Artifact, FileEntry, Materialized};
use crate::domain::data_uri::{DataUri, full_path};
use crate::domain::mime;
use crate::infra::archive::{ArchiveBuilder, ArchiveOutcome};
use crate::infra::assets::{AssetPublisher, SessionAssetSource};
use crate::infra::convert::{ConversionRequest, DocumentConversionClient, ExportFormat};

const ARCHIVE_CREATED_TEXT: &str = "Archive created with contents from directory";
const NO_FILES_TEXT: &str = "No files found to create an archive";

/// Unified input describing which artifact-production path to take.
#[derive(Debug, Clone, Default)]
pub struct MaterializeRequest {
    /// File contents; leave empty when archiving the session directory.
    pub content: String,
    /// Package the session's files into a zip archive instead of writing one
    /// file.
    pub archive: bool,
    /// Target directory, or the scope filter when archiving.
    pub directory: String,
    /// Target filename; a random name is generated when absent.
    pub filename: Option<String>,
    /// Explicit mime type; inferred from the filename extension when absent.
    pub mime_type: Option<String>,
    /// Export format for document conversion (`pdf`).
    pub export_as: Option<String>,
}

/// Dispatch shape chosen once at the request boundary, making illegal field
/// combinations unrepresentable past validation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MaterializePlan {
    Archive {
        directory: String,
        filename: Option<String>,
    },
    Convert {
        directory: String,
        filename: Option<String>,
        format: ExportFormat,
        html: String,
    },
    Direct {
        directory: String,
        filename: Option<String>,
        mime_type: Option<String>,
        content: String,
    },
}

impl MaterializeRequest {
    fn plan(&self) -> Result<MaterializePlan, MaterializeError> {
        let has_content = !self.content.is_empty();
        if self.archive == has_content {
            return Err(MaterializeError::InvalidRequest);
        }

        if self.archive {
            return Ok(MaterializePlan::Archive {
                directory: self.directory.clone(),
                filename: self.filename.clone(),
            });
        }

        if let Some(raw) = &self.export_as {
            let format = raw
                .parse::<ExportFormat>()
                .map_err(|_| MaterializeError::UnsupportedExportFormat(raw.clone()))?;
            return Ok(MaterializePlan::Convert {
                directory: self.directory.clone(),
                filename: self.filename.clone(),
                format,
                html: self.content.clone(),
            });
        }

        Ok(MaterializePlan::Direct {
            directory: self.directory.clone(),
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            content: self.content.clone(),
        })
    }
}

/// Turns processor-produced content into a published artifact.
///
/// Collaborators are injected and shared by the host; each materialize call
/// is otherwise independent, with its own aggregator and (for archives) its
/// own workspace.
pub struct ArtifactMaterializer {
    publisher: Arc<dyn AssetPublisher>,
    session_assets: Arc<dyn SessionAssetSource>,
    converter: DocumentConversionClient,
    archive_builder: ArchiveBuilder,
}

impl ArtifactMaterializer {
    pub fn new(
        publisher: Arc<dyn AssetPublisher>,
        session_assets: Arc<dyn SessionAssetSource>,
        converter: DocumentConversionClient,
    ) -> Self {
        Self {
            publisher,
            session_assets,
            converter,
            archive_builder: ArchiveBuilder::new(),
        }
    }

    /// Materialize one request into a published artifact or the explicit
    /// no-files outcome. Invalid requests are rejected before any side
    /// effect.
    pub async fn materialize(
        &self,
        request: &MaterializeRequest,
    ) -> Result<Materialized, MaterializeError> {
        let plan = request.plan()?;
        let mut output = OutputAggregator::new();

        match plan {
            MaterializePlan::Archive {
                directory,
                filename,
            } => {
                counter!("fucina_materialize_total", "path" => "archive").increment(1);
                self.materialize_archive(directory, filename, &mut output)
                    .await?;
            }
            MaterializePlan::Convert {
                directory,
                filename,
                format,
                html,
            } => {
                counter!("fucina_materialize_total", "path" => "convert").increment(1);
                self.materialize_converted(directory, filename, format, html, &mut output)
                    .await?;
            }
            MaterializePlan::Direct {
                directory,
                filename,
                mime_type,
                content,
            } => {
                counter!("fucina_materialize_total", "path" => "direct").increment(1);
                self.materialize_direct(directory, filename, mime_type, content, &mut output)
                    .await?;
            }
        }

        Ok(into_materialized(output.finalize()?))
    }

    async fn materialize_archive(
        &self,
        directory: String,
        filename: Option<String>,
        output: &mut OutputAggregator,
    ) -> Result<(), MaterializeError> {
        let assets = self
            .session_assets
            .list_session_assets(true, true)
            .await?;
        let entries: Vec<FileEntry> = assets
            .into_iter()
            .map(|asset| FileEntry::new(asset.name, asset.data_uri))
            .collect();
        debug!(entries = entries.len(), scope = %directory, "archiving session assets");

        match self.archive_builder.build(&directory, &entries).await? {
            ArchiveOutcome::Empty => {
                output.write(OutputChunk {
                    directory: Some(directory),
                    filename: Some(filename.unwrap_or_else(generated_name)),
                    is_archive: Some(true),
                    description: Some(NO_FILES_TEXT.to_string()),
                    ..OutputChunk::default()
                })?;
            }
            ArchiveOutcome::Archive(built) => {
                let payload = DataUri::new(
                    built.bytes,
                    "application/zip",
                    Some(built.archive_name.clone()),
                    true,
                );
                let reference = self.publisher.publish(&payload).await?;
                info!(reference = %reference, name = %built.archive_name, "archive published");

                output.write(OutputChunk {
                    directory: Some(String::new()),
                    filename: Some(built.archive_name),
                    reference: Some(reference),
                    is_archive: Some(true),
                    description: Some(ARCHIVE_CREATED_TEXT.to_string()),
                })?;
            }
        }
        Ok(())
    }

    async fn materialize_converted(
        &self,
        directory: String,
        filename: Option<String>,
        format: ExportFormat,
        html: String,
        output: &mut OutputAggregator,
    ) -> Result<(), MaterializeError> {
        let filename = filename
            .unwrap_or_else(|| format!("{}.{}", Uuid::new_v4(), format.extension()));
        let conversion = ConversionRequest {
            filename: filename.clone(),
            mime_type: format,
            html: html.clone(),
        };

        let result = self.converter.convert(&conversion).await?;
        let payload = DataUri::new(
            result.primary().to_vec(),
            format.mime_type(),
            Some(filename.clone()),
            true,
        );
        let reference = self.publisher.publish(&payload).await?;
        info!(reference = %reference, filename = %filename, "converted document published");

        output.write(OutputChunk {
            directory: Some(directory),
            filename: Some(filename),
            reference: Some(reference),
            is_archive: Some(false),
            description: Some(html),
        })?;
        Ok(())
    }

    async fn materialize_direct(
        &self,
        directory: String,
        filename: Option<String>,
        mime_type: Option<String>,
        content: String,
        output: &mut OutputAggregator,
    ) -> Result<(), MaterializeError> {
        let filename = filename.unwrap_or_else(generated_name);
        let mime_type =
            mime_type.unwrap_or_else(|| mime::infer_from_filename(&filename).to_string());

        let payload = DataUri::new(
            content.clone().into_bytes(),
            mime_type,
            Some(full_path(&directory, &filename)),
            true,
        );
        let reference = self.publisher.publish(&payload).await?;
        info!(reference = %reference, filename = %filename, "file published");

        output.write(OutputChunk {
            directory: Some(directory),
            filename: Some(filename),
            reference: Some(reference),
            is_archive: Some(false),
            description: Some(content),
        })?;
        Ok(())
    }
}

fn generated_name() -> String {
    Uuid::new_v4().to_string()
}

fn into_materialized(output: AggregatedOutput) -> Materialized {
    match output.reference {
        Some(reference) => Materialized::Artifact(Artifact {
            directory: output.directory,
            filename: output.filename,
            reference,
            is_archive: output.is_archive,
            description: output.description,
        }),
        None => Materialized::NoFiles {
            directory: output.directory,
            filename: output.filename,
            description: output.description,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{MaterializePlan, MaterializeRequest};
    use crate::application::error::MaterializeError;
    use crate::infra::convert::ExportFormat;

    #[test]
    fn both_content_and_archive_are_rejected() {
        let request = MaterializeRequest {
            content: "hello".to_string(),
            archive: true,
            ..MaterializeRequest::default()
        };
        let err = request.plan().expect_err("conflicting flags");
        assert!(matches!(err, MaterializeError::InvalidRequest));
    }

    #[test]
    fn neither_content_nor_archive_is_rejected() {
        let request = MaterializeRequest::default();
        let err = request.plan().expect_err("empty request");
        assert!(matches!(err, MaterializeError::InvalidRequest));
    }

    #[test]
    fn unknown_export_format_fails_fast() {
        let request = MaterializeRequest {
            content: "<h1>Hi</h1>".to_string(),
            export_as: Some("docx".to_string()),
            ..MaterializeRequest::default()
        };
        let err = request.plan().expect_err("unsupported format");
        assert!(matches!(
            err,
            MaterializeError::UnsupportedExportFormat(ref raw) if raw == "docx"
        ));
    }

    #[test]
    fn pdf_export_plans_a_conversion() {
        let request = MaterializeRequest {
            content: "<h1>Hi</h1>".to_string(),
            export_as: Some("pdf".to_string()),
            filename: Some("report.pdf".to_string()),
            ..MaterializeRequest::default()
        };
        let plan = request.plan().expect("plan");
        assert!(matches!(
            plan,
            MaterializePlan::Convert {
                format: ExportFormat::Pdf,
                ..
            }
        ));
    }

    #[test]
    fn archive_flag_plans_an_archive() {
        let request = MaterializeRequest {
            archive: true,
            directory: "docs".to_string(),
            ..MaterializeRequest::default()
        };
        let plan = request.plan().expect("plan");
        assert!(matches!(plan, MaterializePlan::Archive { ref directory, .. } if directory == "docs"));
    }
}
