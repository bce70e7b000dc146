//! Infrastructure adapters: archive packaging, document conversion, asset
//! stores, and telemetry bootstrap.

pub mod archive;
pub mod assets;
pub mod convert;
pub mod telemetry;
