use std::{collections::HashMap, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};

/// Read-only access to bundle files by bundle-relative path, e.g.
/// "arrays/population.f64.bin", "meta/adm2.csv", "manifest.json".
pub trait BundleSource: Send + Sync {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>>;
    fn has(&self, rel: &str) -> bool;
}

/// Write access to bundle files by bundle-relative path.
pub trait BundleSink: Send + Sync {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()>;
}

/// Bundle stored as a directory tree.
pub struct DiskBundle {
    root: PathBuf,
}

impl DiskBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    fn full(&self, rel: &str) -> PathBuf { self.root.join(rel) }
}

impl BundleSource for DiskBundle {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        let path = self.full(rel);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("[io::bundle] Failed to read {}", path.display()))?;
        Ok(Arc::from(bytes))
    }

    fn has(&self, rel: &str) -> bool { self.full(rel).exists() }
}

impl BundleSink for DiskBundle {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        let path = self.full(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)
            .with_context(|| format!("[io::bundle] Failed to write {}", path.display()))
    }
}

/// In-memory bundle, keyed by bundle-relative path.
#[derive(Default, Clone)]
pub struct MemBundle {
    pub(crate) files: HashMap<String, Arc<[u8]>>,
}

impl MemBundle {
    pub fn new() -> Self { Self::default() }

    pub fn files(&self) -> impl Iterator<Item = &str> { self.files.keys().map(String::as_str) }
}

impl BundleSource for MemBundle {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        self.files.get(rel).cloned()
            .ok_or_else(|| anyhow!("missing bundle file: {rel}"))
    }

    fn has(&self, rel: &str) -> bool { self.files.contains_key(rel) }
}

impl BundleSink for MemBundle {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        self.files.insert(rel.to_string(), Arc::from(bytes.to_vec()));
        Ok(())
    }
}
