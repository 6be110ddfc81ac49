//! Inference options.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Names that are never external inputs: loop metadata and the template's
/// self references.
pub const DEFAULT_RESERVED: &[&str] = &["loop", "_self", "_context", "_charset"];

/// Options controlling inference.
///
/// ```toml
/// # shimmyvars.toml
/// reserved = ["loop", "_self", "varargs"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferOptions {
    /// Identifiers that contribute nothing wherever they appear, including as
    /// the base of an attribute chain or as a loop's sequence.
    pub reserved: BTreeSet<String>,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            reserved: DEFAULT_RESERVED.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl InferOptions {
    pub fn with_reserved<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// Reads options from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file syntax in {}", path.display()))
    }
}
