//! Self-describing data-URI payloads.
//!
//! The text format is bit-exact: `data:{mime}[;name={filename}][;base64],{payload}`.
//! The `name` segment, when present, always precedes `base64`; the payload is
//! literal text unless the `base64` segment is present.

use std::fmt::Write as FmtWrite;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use thiserror::Error;

const SCHEME: &str = "data:";

/// Mime type assumed when none is declared.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Errors raised while parsing a data URI.
#[derive(Debug, Error)]
pub enum DataUriError {
    #[error("data URI is missing the `data:` scheme prefix")]
    MissingScheme,
    #[error("data URI is missing the `,` payload separator")]
    MissingSeparator,
    #[error("data URI payload is not valid base64: {0}")]
    Payload(#[from] base64::DecodeError),
}

/// A binary payload together with its mime type and optional filename.
///
/// The payload is held decoded; [`DataUri::encode`] re-applies the declared
/// transfer encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    filename: Option<String>,
    base64: bool,
    payload: Vec<u8>,
}

impl DataUri {
    /// Construct a data URI value. An empty mime type falls back to
    /// `application/octet-stream`.
    pub fn new(
        payload: Vec<u8>,
        mime_type: impl Into<String>,
        filename: Option<String>,
        base64: bool,
    ) -> Self {
        let mut mime_type = mime_type.into();
        if mime_type.is_empty() {
            mime_type = DEFAULT_MIME_TYPE.to_string();
        }
        Self {
            mime_type,
            filename,
            base64,
            payload,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn is_base64(&self) -> bool {
        self.base64
    }

    /// Raw payload bytes, already decoded from the transfer encoding.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Render the URI text form.
    pub fn encode(&self) -> String {
        let mut uri = String::with_capacity(SCHEME.len() + self.mime_type.len() + 16);
        uri.push_str(SCHEME);
        uri.push_str(&self.mime_type);
        if let Some(name) = &self.filename {
            let _ = write!(uri, ";name={name}");
        }
        if self.base64 {
            uri.push_str(";base64");
        }
        uri.push(',');
        if self.base64 {
            uri.push_str(&STANDARD.encode(&self.payload));
        } else {
            uri.push_str(&String::from_utf8_lossy(&self.payload));
        }
        uri
    }

    /// Parse the URI text form back into its parts.
    pub fn decode(uri: &str) -> Result<Self, DataUriError> {
        let rest = uri.strip_prefix(SCHEME).ok_or(DataUriError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingSeparator)?;

        let mut segments = header.split(';');
        let mime_type = segments.next().unwrap_or_default();

        let mut filename = None;
        let mut base64 = false;
        for segment in segments {
            if segment == "base64" {
                base64 = true;
            } else if let Some(name) = segment.strip_prefix("name=") {
                filename = Some(name.to_string());
            }
        }

        let payload = if base64 {
            STANDARD.decode(payload)?
        } else {
            payload.as_bytes().to_vec()
        };

        Ok(Self::new(payload, mime_type, filename, base64))
    }
}

/// Join `directory/filename`, leaving the filename untouched when the
/// directory is empty.
pub fn full_path(directory: &str, filename: &str) -> String {
    if directory.is_empty() {
        filename.to_string()
    } else {
        format!("{directory}/{filename}")
    }
}
