//! Fucina turns processor-produced content into durable, referenceable
//! artifacts: a single file, a zip archive of session assets, or a document
//! converted by an external rendering service, published through an opaque
//! asset store.
//!
//! The crate is layered the usual way: `domain` holds the data model and the
//! data-URI codec, `application` hosts the materializer orchestration and the
//! output aggregator, `infra` provides the archive builder, the conversion
//! client, and the asset-store seams, and `config` resolves typed settings.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
