//! Engine error tags.

use std::path::PathBuf;

/// Failure modes of the reconciliation engine.
///
/// Field- and type-level failures are never surfaced here — they are
/// localized as `Unresolved` markers on the model. Only parse-level and
/// structural failures short-circuit the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{count} parse error(s) in {}", .path.display())]
    ParseFailure {
        path: PathBuf,
        count: usize,
        messages: Vec<String>,
    },

    #[error("target header has no `app` namespace")]
    MissingAppNamespace,

    #[error("type model already built")]
    AlreadyBuilt,

    #[error("type model not built")]
    NotBuilt,

    #[error("strict source-span sort saw declarations from {} and {}", .0.display(), .1.display())]
    MixedSourceFiles(PathBuf, PathBuf),

    #[error("no emission rule for {0}")]
    Emission(String),

    #[error("clang: {0}")]
    Clang(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
