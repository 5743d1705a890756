//! Remapping configuration (`remapping_config.json`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration, loaded once at startup and read-only thereafter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Type names always considered known: never re-resolved, emitted from
    /// the target compilation's globals when also present there. Ordered —
    /// the prefix up to [`Config::last_built_in_type_name`] is the
    /// built-in subset.
    #[serde(rename = "KnownNames")]
    pub known_names: Vec<String>,
    /// Name appearing in `KnownNames` that closes the built-in prefix.
    #[serde(rename = "LastBuiltInTypeName")]
    pub last_built_in_type_name: String,
    /// Name suffix (e.g. `__Array`) → remap-target type name (e.g.
    /// `Il2CppArray`).
    #[serde(rename = "KnownReservedSuffixes")]
    pub known_reserved_suffixes: BTreeMap<String, String>,
    /// Fully-qualified source name → replacement name, applied symmetrically
    /// in name comparison.
    #[serde(rename = "RemappedTypes")]
    pub remapped_types: BTreeMap<String, String>,
}

impl Config {
    pub fn is_known(&self, name: &str) -> bool {
        self.known_names.iter().any(|n| n == name)
    }

    /// Apply the remap table to a name.
    pub fn remap<'a>(&'a self, name: &'a str) -> &'a str {
        self.remapped_types.get(name).map(String::as_str).unwrap_or(name)
    }

    /// The reserved suffix a name ends in, with its remap target.
    pub fn reserved_suffix_of(&self, name: &str) -> Option<(&str, &str)> {
        self.known_reserved_suffixes
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix.as_str()))
            .map(|(s, t)| (s.as_str(), t.as_str()))
    }

    /// Prefix of `KnownNames` up to and including `LastBuiltInTypeName`.
    /// Empty when the closing name is not listed.
    pub fn built_in_names(&self) -> &[String] {
        match self
            .known_names
            .iter()
            .position(|n| *n == self.last_built_in_type_name)
        {
            Some(pos) => &self.known_names[..=pos],
            None => &[],
        }
    }
}

/// Default config location: next to the executable.
pub fn default_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locating executable")?;
    let dir = exe.parent().context("executable has no parent directory")?;
    Ok(dir.join("remapping_config.json"))
}

/// Load the config, writing a default (empty) one first when the file does
/// not exist yet.
pub fn load_or_init(path: &Path) -> Result<Config> {
    if !path.exists() {
        let default = Config::default();
        let text = serde_json::to_string_pretty(&default).expect("serialize default config");
        std::fs::write(path, text)
            .with_context(|| format!("writing default config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote default remapping config");
        return Ok(default);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: Config = serde_json::from_str(&content)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    Ok(config)
}
