pub mod bundle;
pub mod geojson;
pub mod link;
pub mod pipeline;
pub mod population;
pub mod stats;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// Output directory argument, defaulting to "." and rejecting stdout.
pub(crate) fn output_dir(output: Option<&Path>) -> Result<PathBuf> {
    let out = output.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    assert_not_stdout(&out)?;
    Ok(out)
}

pub(crate) fn assert_not_stdout(path: &Path) -> Result<()> {
    if path == Path::new("-") { bail!("stdout is not supported."); }
    Ok(())
}
