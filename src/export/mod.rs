//! Model persistence
//!
//! A fitted pipeline is persisted together with its training metadata:
//! - Native binary format (bincode, the default)
//! - JSON format (portable, human-readable), chosen by a `.json` extension

mod serializer;

pub use serializer::{ModelMetadata, ModelStore, PersistedModel, SerializationFormat};
