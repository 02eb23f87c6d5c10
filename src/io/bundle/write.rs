use std::{collections::BTreeMap, path::Path};

use anyhow::{bail, Context, Result};
use polars::df;

use crate::{
    assemble::ArrayBundle,
    io::{csr::write_incidence_bytes, csv::write_csv_bytes, fs::{ensure_dir_exists, ensure_dirs, sha256_bytes}},
};
use super::{
    files, BundleSink, DiskBundle, FileHash, Manifest, Variable,
};

fn i32_bytes(values: impl IntoIterator<Item = i32>) -> Vec<u8> {
    values.into_iter().flat_map(i32::to_le_bytes).collect()
}

fn f64_bytes(values: impl IntoIterator<Item = f64>) -> Vec<u8> {
    values.into_iter().flat_map(f64::to_le_bytes).collect()
}

fn put_hashed(
    sink: &mut dyn BundleSink,
    hashes: &mut BTreeMap<String, FileHash>,
    rel: &str,
    bytes: &[u8],
) -> Result<()> {
    sink.put(rel, bytes)?;
    hashes.insert(rel.to_string(), FileHash { sha256: sha256_bytes(bytes) });
    Ok(())
}

/// Write every array and metadata variable plus `manifest.json` into `sink`.
pub fn write_bundle_sink(bundle: &ArrayBundle, sink: &mut dyn BundleSink) -> Result<Manifest> {
    bundle.validate()?;
    let mut hashes = BTreeMap::new();

    put_hashed(sink, &mut hashes, files::YEARS, &i32_bytes(bundle.years.iter().copied()))?;
    put_hashed(sink, &mut hashes, files::POPULATION, &f64_bytes(bundle.population.iter().copied()))?;
    put_hashed(sink, &mut hashes, files::ADM2_TO_ADM1, &i32_bytes(bundle.adm2_to_adm1.iter().copied()))?;
    put_hashed(sink, &mut hashes, files::IR_TO_ADM2, &write_incidence_bytes(&bundle.ir_to_adm2)?)?;

    let adm2 = df![
        "iso" => &bundle.iso,
        "adm2_id1" => &bundle.adm2_id1,
        "adm2_id2" => &bundle.adm2_id2,
        "adm2_name" => &bundle.adm2_name,
    ]?;
    put_hashed(sink, &mut hashes, files::ADM2_META, &write_csv_bytes(&adm2)?)?;

    let adm1 = df![
        "adm1_index" => (0..bundle.adm1_count() as u32).collect::<Vec<_>>(),
        "adm1_name" => &bundle.adm1_name,
    ]?;
    put_hashed(sink, &mut hashes, files::ADM1_META, &write_csv_bytes(&adm1)?)?;

    let irs = df![
        "agglomid_id" => &bundle.ir_id,
        "region_key" => &bundle.ir_region_key,
    ]?;
    put_hashed(sink, &mut hashes, files::IR_META, &write_csv_bytes(&irs)?)?;

    let dimensions = BTreeMap::from([
        ("adm2", bundle.adm2_count()),
        ("adm1", bundle.adm1_count()),
        ("year", bundle.year_count()),
        ("agglomid", bundle.ir_count()),
    ]);
    let variables = BTreeMap::from([
        ("year", Variable::new(files::YEARS, &["year"], "i32")),
        ("population", Variable::new(files::POPULATION, &["adm2", "year"], "f64")),
        ("adm2_to_adm1", Variable::new(files::ADM2_TO_ADM1, &["adm2"], "i32")),
        ("ir_to_adm2", Variable::new(files::IR_TO_ADM2, &["agglomid", "adm2"], "u8/csr")),
        ("iso", Variable::new(files::ADM2_META, &["adm2"], "str")),
        ("adm2_id1", Variable::new(files::ADM2_META, &["adm2"], "i64")),
        ("adm2_id2", Variable::new(files::ADM2_META, &["adm2"], "i64")),
        ("adm2_name", Variable::new(files::ADM2_META, &["adm2"], "str")),
        ("adm1_name", Variable::new(files::ADM1_META, &["adm1"], "str")),
        ("agglomid_id", Variable::new(files::IR_META, &["agglomid"], "i64")),
        ("region_key", Variable::new(files::IR_META, &["agglomid"], "str")),
    ]);

    let manifest = Manifest::new(dimensions, variables, hashes);
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
    sink.put("manifest.json", &manifest_bytes)?;
    Ok(manifest)
}

/// Write the bundle directory at `path`. Files are staged in a temporary sibling
/// directory which replaces `path` only once everything has been written.
pub fn write_bundle(bundle: &ArrayBundle, path: &Path, verbose: u8) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir_exists(parent)?;
    if path.exists() && !path.is_dir() {
        bail!("[io::bundle] Path exists but is not a directory: {}", path.display());
    }

    let staging = tempfile::Builder::new()
        .prefix(".bundle-")
        .tempdir_in(parent)
        .with_context(|| format!("[io::bundle] Failed to create staging directory in {}", parent.display()))?;

    ensure_dirs(staging.path(), &["arrays", "sparse", "meta"])?;
    let mut sink = DiskBundle::new(staging.path());
    let manifest = write_bundle_sink(bundle, &mut sink)?;

    if path.exists() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("[io::bundle] Failed to replace {}", path.display()))?;
    }
    std::fs::rename(staging.path(), path)
        .with_context(|| format!("[io::bundle] Failed to move bundle into {}", path.display()))?;

    if verbose > 0 {
        eprintln!(
            "[io::bundle] wrote {} ({} files; adm2={} adm1={} year={} agglomid={})",
            path.display(),
            manifest.files.len(),
            manifest.dimension("adm2"),
            manifest.dimension("adm1"),
            manifest.dimension("year"),
            manifest.dimension("agglomid"),
        );
    }
    Ok(())
}
