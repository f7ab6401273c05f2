//! Artifact persistence

pub mod model_store;

pub use model_store::{ArtifactSet, Manifest, ModelStore};
