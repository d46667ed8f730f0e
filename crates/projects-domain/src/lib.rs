//! Projects Domain Layer
//!
//! Core model of the projects registry: the [`Project`] record, the codec
//! that maps it onto a key-value hash, and the [`KvBackend`] trait the store
//! is written against.
//!
//! ## Key Concepts
//!
//! - **Project**: a named record describing an ML model's metadata
//! - **Key**: `"project:" + lowercase(name)`, the per-project hash
//! - **Index**: the `"projects"` set naming every known project
//!
//! ## Architecture
//!
//! - Pure logic only, no I/O
//! - Backend implementations live in `projects-store`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod project;
pub mod traits;

// Re-exports for convenience
pub use codec::{derive_key, FieldMap, INDEX_SET};
pub use project::{Project, ProjectStats};
pub use traits::{BackendError, KvBackend};
