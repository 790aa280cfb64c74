//! Loads every class unit of a plugin and records what the namespace rewrite changed.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use process_plugins::{
    ArchiveClassSource, ClassSource, DirectoryClassSource, LoadingContext, NamespaceRewriter,
    RewriteStats,
};
use serde::Serialize;

const CLASS_SUFFIX: &str = ".class";

#[derive(Debug, Serialize)]
pub struct ClassReport {
    pub name: String,
    pub super_name: Option<String>,
    pub rewrites: RewriteStats,
}

#[derive(Debug, Serialize)]
pub struct Failure {
    pub entry: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub source: String,
    pub from: String,
    pub to: String,
    pub classes: Vec<ClassReport>,
    pub failures: Vec<Failure>,
}

impl Report {
    #[must_use]
    pub fn total_rewrites(&self) -> usize {
        self.classes.iter().map(|c| c.rewrites.total()).sum()
    }

    #[must_use]
    pub fn rewritten_classes(&self) -> usize {
        self.classes
            .iter()
            .filter(|c| c.rewrites.total() > 0)
            .count()
    }
}

/// Opens `path` as a class directory or, for anything else, a zip archive.
///
/// # Errors
///
/// Fails if `path` is not a directory and cannot be read as a zip archive.
pub fn open_source(path: &Path) -> anyhow::Result<Arc<dyn ClassSource>> {
    if path.is_dir() {
        return Ok(Arc::new(DirectoryClassSource::new(path)));
    }
    let archive = ArchiveClassSource::open(path)
        .with_context(|| format!("cannot open plugin archive {}", path.display()))?;
    Ok(Arc::new(archive))
}

#[must_use]
pub fn inspect(source: Arc<dyn ClassSource>, rewriter: Arc<NamespaceRewriter>) -> Report {
    let description = source.describe();
    let entries = source.entries();
    let from = rewriter.from_namespace().to_owned();
    let to = rewriter.to_namespace().to_owned();
    let context = LoadingContext::isolated("inspect", None, source, Some(rewriter));

    let mut classes = Vec::new();
    let mut failures = Vec::new();
    for entry in entries {
        let Some(internal) = entry.strip_suffix(CLASS_SUFFIX) else {
            tracing::trace!(entry, "Skipping non-class entry");
            continue;
        };
        match context.load_class(internal) {
            Ok(defined) => classes.push(ClassReport {
                name: defined.name().to_owned(),
                super_name: defined.super_name().map(str::to_owned),
                rewrites: defined.rewrites(),
            }),
            Err(e) => {
                tracing::warn!(entry, error = %e, "Unable to load class");
                failures.push(Failure {
                    entry,
                    error: e.to_string(),
                });
            }
        }
    }

    Report {
        source: description,
        from,
        to,
        classes,
        failures,
    }
}
