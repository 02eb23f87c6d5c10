use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::BundleSource;

pub(crate) const DESCRIPTION: &str = "This dataset provides total population by ADM2 region across years, \
the ADM2 to ADM1 parent index and the Impact Region to ADM2 incidence matrix.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    pub sha256: String,
}

/// One stored variable: which file holds it, its dimensions and element type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub file: String,
    pub dims: Vec<String>,
    pub dtype: String,
}

impl Variable {
    pub(crate) fn new(file: &str, dims: &[&str], dtype: &str) -> Self {
        Self {
            file: file.to_string(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            dtype: dtype.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub description: String,
    pub dimensions: BTreeMap<String, usize>,
    pub variables: BTreeMap<String, Variable>,
    pub files: BTreeMap<String, FileHash>,
}

impl Manifest {
    pub(crate) fn new(
        dimensions: BTreeMap<&'static str, usize>,
        variables: BTreeMap<&'static str, Variable>,
        files: BTreeMap<String, FileHash>,
    ) -> Self {
        Self {
            version: "1".into(),
            description: DESCRIPTION.into(),
            dimensions: dimensions.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            variables: variables.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            files,
        }
    }

    /// Size of a named dimension, 0 when absent.
    pub fn dimension(&self, name: &str) -> usize {
        self.dimensions.get(name).copied().unwrap_or(0)
    }

    pub(crate) fn from_source(src: &dyn BundleSource) -> Result<Self> {
        let bytes = src.get("manifest.json")
            .context("[io::bundle] Failed to read manifest.json")?;
        serde_json::from_slice(&bytes)
            .context("[io::bundle] Failed to parse manifest.json")
    }
}
