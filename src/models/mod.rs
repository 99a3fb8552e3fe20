//! Data models

pub mod transaction;
pub mod stats;
pub mod artifacts;

pub use transaction::*;
pub use artifacts::ArtifactPaths;
