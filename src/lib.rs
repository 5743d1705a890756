//! hdrmend — reconcile two IL2CPP C++ headers describing the same type
//! universe.
//!
//! The *input* header carries complete struct/enum layouts under unstable
//! mangled names; the *target* header carries the canonical naming under
//! `namespace app`, with field types lossily degraded. hdrmend parses both
//! via libclang, rewrites each target type's fields against its input
//! counterpart, resolves transitive type dependencies, and emits a new
//! target header.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads remapping_config.json next to the executable, reconciles, and
//! // writes the output header next to the target.
//! hdrmend::run(
//!     Path::new("dump.h"),
//!     Path::new("app_types.h"),
//!     Path::new("/usr/include"),
//!     None,
//! )
//! .unwrap();
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub mod config;
pub mod emit;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod model;
pub mod registry;
pub mod resolve;

pub use config::Config;
pub use error::Error;

/// The reconciliation engine: build the model once, resolve, emit.
///
/// All state is owned by one instance and mutated from one caller; there
/// are no suspension points and no shared mutable state.
pub struct Reconciler {
    cfg: Config,
    model: Option<model::TypeModel>,
}

impl Reconciler {
    pub fn new(cfg: Config) -> Self {
        Reconciler { cfg, model: None }
    }

    /// Parse both headers and build the type model. Building a second time
    /// is an error.
    pub fn build_type_model(
        &mut self,
        index: &clang::Index,
        input: &Path,
        target: &Path,
        sysroot: &Path,
    ) -> Result<(), Error> {
        if self.model.is_some() {
            return Err(Error::AlreadyBuilt);
        }
        let model = extract::build_type_model(index, &self.cfg, input, target, sysroot)?;
        self.model = Some(model);
        Ok(())
    }

    /// Rewrite every target declaration against its input counterpart.
    pub fn resolve(&mut self) -> Result<(), Error> {
        let model = self.model.as_mut().ok_or(Error::NotBuilt)?;
        resolve::reconcile(model, &self.cfg);
        Ok(())
    }

    /// Emit the reconciled header text.
    pub fn emit(&self) -> Result<String, Error> {
        let model = self.model.as_ref().ok_or(Error::NotBuilt)?;
        emit::emit_header(model, &self.cfg)
    }

    pub fn model(&self) -> Option<&model::TypeModel> {
        self.model.as_ref()
    }
}

/// Run the full pipeline against an already-loaded config and return the
/// reconciled header text without writing to disk.
pub fn generate(cfg: &Config, input: &Path, target: &Path, sysroot: &Path) -> Result<String> {
    let clang = clang::Clang::new()
        .map_err(|e| anyhow::anyhow!("failed to initialize libclang: {e}"))?;
    let index = clang::Index::new(&clang, false, false);

    let mut engine = Reconciler::new(cfg.clone());
    engine
        .build_type_model(&index, input, target, sysroot)
        .context("building type model")?;
    engine.resolve()?;
    let text = engine.emit().context("emitting header")?;
    Ok(text)
}

/// Full pipeline: load (or initialize) the config next to the executable,
/// reconcile, and write the output header.
///
/// Returns the path the header was written to.
pub fn run(
    input: &Path,
    target: &Path,
    sysroot: &Path,
    output: Option<&Path>,
) -> Result<PathBuf> {
    for path in [input, target, sysroot] {
        if !path.exists() {
            anyhow::bail!("path not found: {}", path.display());
        }
    }

    let cfg_path = config::default_path()?;
    let cfg = config::load_or_init(&cfg_path)?;
    info!(
        config = %cfg_path.display(),
        known = cfg.known_names.len(),
        suffixes = cfg.known_reserved_suffixes.len(),
        "loaded remapping config"
    );

    let text = generate(&cfg, input, target, sysroot)?;

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => default_output_path(target),
    };
    std::fs::write(&output_path, &text)
        .with_context(|| format!("writing output to {}", output_path.display()))?;

    info!(
        path = %output_path.display(),
        size = text.len(),
        "wrote reconciled header"
    );

    Ok(output_path)
}

fn default_output_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("target");
    target.with_file_name(format!("{stem}.reconciled.h"))
}
