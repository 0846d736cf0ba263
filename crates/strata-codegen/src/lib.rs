//! Strata Codegen Library
//!
//! Template catalog, rendering and layer-ordered artifact emission.

pub mod catalog;
pub mod emitter;
pub mod fs;
pub mod hash;
pub mod predicate;
pub mod render;
pub mod scaffold;

pub use catalog::{CatalogSource, CollisionPolicy, TemplateCatalog, TemplateDescriptor};
pub use emitter::{ArtifactEmitter, ArtifactOutcome, GeneratedArtifact, LayerReport};
pub use fs::{DryRunFileSystem, FileSystem, LocalFileSystem, MemoryFileSystem};
pub use hash::ContentHash;
pub use scaffold::{ScaffoldOutcome, ScaffoldReport, Scaffolder};
