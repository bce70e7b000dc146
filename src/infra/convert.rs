//! Streaming client for the external document rendering service.
//!
//! The protocol is send-one/half-close/receive-stream: exactly one create
//! message goes out, then responses are read until the service closes the
//! stream. The transport is an explicit seam so the client contract holds
//! over any streaming channel.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::try_stream;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut, stream::BoxStream};
use metrics::histogram;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time;
use tracing::debug;
use url::Url;

use crate::config::ConversionSettings;

/// Errors raised by the conversion client. Transport failures are surfaced
/// verbatim; no retry is attempted here.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("conversion deadline of {after:?} exceeded")]
    Timeout { after: Duration },
    #[error("conversion transport failed: {message}")]
    Transport { message: String },
    #[error("conversion response envelope invalid: {0}")]
    Envelope(String),
    #[error("conversion service returned no document payload")]
    EmptyResponse,
}

impl ConversionError {
    fn transport(err: impl fmt::Display) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// Raised when a requested export format is not one the service defines.
#[derive(Debug, Error)]
#[error("unknown export format: {0}")]
pub struct UnknownExportFormat(pub String);

/// Formats the rendering service can produce. Only PDF is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    Pdf,
}

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = UnknownExportFormat;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pdf" => Ok(Self::Pdf),
            other => Err(UnknownExportFormat(other.to_string())),
        }
    }
}

/// The single create message sent to the rendering service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub filename: String,
    pub mime_type: ExportFormat,
    pub html: String,
}

/// One rendered file inside a response message. `data` is base64 in transit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedFile {
    pub data: String,
}

/// One message of the response stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionResponse {
    #[serde(default)]
    pub files: Vec<RenderedFile>,
}

/// Ordered document blobs produced by one conversion. The first blob is the
/// canonical payload; later blobs are carried so nothing is silently
/// discarded.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    blobs: Vec<Bytes>,
}

impl ConversionResult {
    fn new(blobs: Vec<Bytes>) -> Option<Self> {
        if blobs.is_empty() {
            return None;
        }
        Some(Self { blobs })
    }

    /// The canonical payload. Non-empty by construction.
    pub fn primary(&self) -> &Bytes {
        &self.blobs[0]
    }

    pub fn blobs(&self) -> &[Bytes] {
        &self.blobs
    }
}

pub type ResponseStream = BoxStream<'static, Result<ConversionResponse, ConversionError>>;

/// Streaming channel to the rendering service: send exactly one request,
/// half-close, then read responses until the service closes the stream.
#[async_trait]
pub trait ConversionTransport: Send + Sync {
    async fn convert(&self, request: &ConversionRequest) -> Result<ResponseStream, ConversionError>;
}

/// HTTP transport: POSTs the create message as JSON and reads the response
/// body as an NDJSON stream of [`ConversionResponse`] messages.
#[derive(Debug, Clone)]
pub struct HttpConversionTransport {
    client: Client,
    endpoint: Url,
}

impl HttpConversionTransport {
    pub fn new(endpoint: Url) -> Result<Self, ConversionError> {
        let client = Client::builder()
            .user_agent(concat!("fucina/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ConversionError::transport)?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ConversionTransport for HttpConversionTransport {
    async fn convert(&self, request: &ConversionRequest) -> Result<ResponseStream, ConversionError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(ConversionError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConversionError::Transport {
                message: format!("status {status} body {body}"),
            });
        }

        Ok(ndjson_responses(response.bytes_stream()).boxed())
    }
}

fn ndjson_responses<S, E>(body: S) -> impl Stream<Item = Result<ConversionResponse, ConversionError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
{
    try_stream! {
        pin_mut!(body);
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(ConversionError::transport)?;
            buffer.extend_from_slice(&chunk);
            while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                if let Some(response) = parse_message(&line[..newline])? {
                    yield response;
                }
            }
        }
        if let Some(response) = parse_message(&buffer)? {
            yield response;
        }
    }
}

fn parse_message(line: &[u8]) -> Result<Option<ConversionResponse>, ConversionError> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(trimmed)
        .map(Some)
        .map_err(|err| ConversionError::Envelope(format!("invalid response message: {err}")))
}

/// Client for the document rendering service. Enforces the caller deadline
/// and first-blob selection; the transport channel is injected.
pub struct DocumentConversionClient {
    transport: Arc<dyn ConversionTransport>,
    timeout: Duration,
}

impl DocumentConversionClient {
    pub fn new(transport: Arc<dyn ConversionTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Build a client over the HTTP transport from resolved settings.
    pub fn from_settings(settings: &ConversionSettings) -> Result<Self, ConversionError> {
        let transport = HttpConversionTransport::new(settings.endpoint.clone())?;
        Ok(Self::new(Arc::new(transport), settings.timeout))
    }

    /// Send one conversion request and drain the response stream. Exceeding
    /// the configured deadline yields `Timeout`; an exhausted stream without
    /// a payload blob yields `EmptyResponse`.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionResult, ConversionError> {
        let started = Instant::now();
        let result = time::timeout(self.timeout, self.collect(request))
            .await
            .map_err(|_| ConversionError::Timeout {
                after: self.timeout,
            })??;

        histogram!("fucina_conversion_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        debug!(
            filename = %request.filename,
            blobs = result.blobs().len(),
            "conversion stream completed"
        );
        Ok(result)
    }

    async fn collect(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionResult, ConversionError> {
        let mut responses = self.transport.convert(request).await?;
        let mut blobs = Vec::new();
        while let Some(message) = responses.next().await {
            for file in message?.files {
                let data = STANDARD
                    .decode(file.data.as_bytes())
                    .map_err(|err| ConversionError::Envelope(format!("file data is not valid base64: {err}")))?;
                blobs.push(Bytes::from(data));
            }
        }
        ConversionResult::new(blobs).ok_or(ConversionError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use futures::StreamExt;

    use super::{
        ConversionError, ConversionRequest, ConversionResponse, ConversionTransport,
        DocumentConversionClient, ExportFormat, RenderedFile, ResponseStream, ndjson_responses,
    };

    struct ScriptedTransport {
        responses: Vec<ConversionResponse>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<ConversionResponse>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ConversionTransport for ScriptedTransport {
        async fn convert(
            &self,
            _request: &ConversionRequest,
        ) -> Result<ResponseStream, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<Result<ConversionResponse, ConversionError>> =
                self.responses.iter().cloned().map(Ok).collect();
            Ok(futures::stream::iter(items).boxed())
        }
    }

    struct StalledTransport;

    #[async_trait]
    impl ConversionTransport for StalledTransport {
        async fn convert(
            &self,
            _request: &ConversionRequest,
        ) -> Result<ResponseStream, ConversionError> {
            Ok(futures::stream::pending().boxed())
        }
    }

    fn request() -> ConversionRequest {
        ConversionRequest {
            filename: "out.pdf".to_string(),
            mime_type: ExportFormat::Pdf,
            html: "<h1>Hi</h1>".to_string(),
        }
    }

    fn rendered(data: &[u8]) -> RenderedFile {
        RenderedFile {
            data: STANDARD.encode(data),
        }
    }

    #[test]
    fn export_format_parses_pdf_only() {
        assert_eq!("pdf".parse::<ExportFormat>().expect("pdf"), ExportFormat::Pdf);
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn request_serializes_wire_format_name() {
        let encoded = serde_json::to_value(request()).expect("serialize");
        assert_eq!(encoded["mime_type"], "PDF");
    }

    #[tokio::test]
    async fn selects_first_blob_and_surfaces_the_rest() {
        let transport = ScriptedTransport::new(vec![ConversionResponse {
            files: vec![rendered(b"%PDF-1.7 primary"), rendered(b"secondary")],
        }]);
        let client =
            DocumentConversionClient::new(Arc::new(transport), Duration::from_secs(5));

        let result = client.convert(&request()).await.expect("convert");
        assert_eq!(result.primary().as_ref(), b"%PDF-1.7 primary");
        assert_eq!(result.blobs().len(), 2);
        assert_eq!(result.blobs()[1].as_ref(), b"secondary");
    }

    #[tokio::test]
    async fn empty_stream_yields_empty_response() {
        let transport = ScriptedTransport::new(vec![ConversionResponse::default()]);
        let client =
            DocumentConversionClient::new(Arc::new(transport), Duration::from_secs(5));

        let err = client.convert(&request()).await.expect_err("no payload");
        assert!(matches!(err, ConversionError::EmptyResponse));
    }

    #[tokio::test]
    async fn deadline_is_enforced() {
        let client =
            DocumentConversionClient::new(Arc::new(StalledTransport), Duration::from_millis(20));

        let err = client.convert(&request()).await.expect_err("deadline");
        assert!(matches!(err, ConversionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn ndjson_parser_splits_messages_across_chunks() {
        let first = serde_json::to_string(&ConversionResponse {
            files: vec![rendered(b"one")],
        })
        .expect("serialize");
        let second = serde_json::to_string(&ConversionResponse {
            files: vec![rendered(b"two")],
        })
        .expect("serialize");

        let payload = format!("{first}\n{second}\n");
        let (head, tail) = payload.split_at(payload.len() / 2);
        let chunks: Vec<Result<Bytes, ConversionError>> = vec![
            Ok(Bytes::copy_from_slice(head.as_bytes())),
            Ok(Bytes::copy_from_slice(tail.as_bytes())),
        ];

        let messages: Vec<_> = ndjson_responses(futures::stream::iter(chunks)).collect().await;
        assert_eq!(messages.len(), 2);
        for message in messages {
            let message = message.expect("parsed message");
            assert_eq!(message.files.len(), 1);
        }
    }

    #[tokio::test]
    async fn ndjson_parser_rejects_malformed_messages() {
        let chunks: Vec<Result<Bytes, ConversionError>> =
            vec![Ok(Bytes::from_static(b"not json\n"))];
        let messages: Vec<_> = ndjson_responses(futures::stream::iter(chunks)).collect().await;
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], Err(ConversionError::Envelope(_))));
    }
}
