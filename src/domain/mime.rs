//! Extension-based mime-type inference.
//!
//! Only the listed extensions map to a concrete type; everything else is
//! `application/octet-stream`. Inference runs only when a request carries no
//! explicit mime type.

use crate::domain::data_uri::DEFAULT_MIME_TYPE;

/// Map a bare file extension to its mime type.
pub fn mime_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "txt" => "text/plain",
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "md" => "text/markdown",
        _ => DEFAULT_MIME_TYPE,
    }
}

/// Infer the mime type from a filename's extension. Filenames without an
/// extension resolve to `application/octet-stream`.
pub fn infer_from_filename(filename: &str) -> &'static str {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => mime_type_for_extension(ext),
        _ => DEFAULT_MIME_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::infer_from_filename;

    #[test]
    fn known_extensions_resolve() {
        assert_eq!(infer_from_filename("report.csv"), "text/csv");
        assert_eq!(infer_from_filename("notes.md"), "text/markdown");
        assert_eq!(infer_from_filename("index.html"), "text/html");
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        assert_eq!(
            infer_from_filename("x.unknownext"),
            "application/octet-stream"
        );
    }

    #[test]
    fn missing_extension_falls_back_to_octet_stream() {
        assert_eq!(infer_from_filename("noext"), "application/octet-stream");
        assert_eq!(infer_from_filename(".gitignore"), "application/octet-stream");
    }
}
