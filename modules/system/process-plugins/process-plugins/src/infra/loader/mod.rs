//! Isolated, namespace-rewriting class loading.

pub mod context;
pub mod error;
pub mod rewrite;
pub mod sources;

pub use context::{DefinedType, LoadingContext};
pub use error::LoadError;
pub use rewrite::{NamespaceRewriter, RewriteError, RewriteStats};
pub use sources::{ArchiveClassSource, DirectoryClassSource};
