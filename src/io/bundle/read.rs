use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

use crate::{
    assemble::ArrayBundle,
    io::{csr::read_incidence_bytes, csv::read_csv_bytes, fs::{require_dir_exists, sha256_bytes}},
    keys::parse_integral,
};
use super::{files, BundleSource, DiskBundle, Manifest};

fn decode<const N: usize, T>(bytes: &[u8], what: &str, from: fn([u8; N]) -> T) -> Result<Vec<T>> {
    ensure!(bytes.len() % N == 0, "[io::bundle] {what}: {} bytes is not a multiple of {N}", bytes.len());
    Ok(bytes.chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            from(buf)
        })
        .collect())
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    Ok(df.column(name)?.str()?.into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

fn integer_column(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    df.column(name)?.str()?.into_iter()
        .enumerate()
        .map(|(row, v)| v.and_then(parse_integral)
            .ok_or_else(|| anyhow!("[io::bundle] {name}: row {row} is not an integer")))
        .collect()
}

/// Fetch a file and check it against the manifest hash.
fn get_verified(src: &dyn BundleSource, manifest: &Manifest, rel: &str) -> Result<std::sync::Arc<[u8]>> {
    let bytes = src.get(rel)?;
    let expected = manifest.files.get(rel)
        .ok_or_else(|| anyhow!("[io::bundle] {rel} is not listed in manifest.json"))?;
    let actual = sha256_bytes(&bytes);
    ensure!(actual == expected.sha256, "[io::bundle] checksum mismatch for {rel}: expected {}, got {actual}", expected.sha256);
    Ok(bytes)
}

/// Read a bundle from any source, verifying every file hash and the dimensions.
pub fn read_bundle_source(src: &dyn BundleSource) -> Result<ArrayBundle> {
    let manifest = Manifest::from_source(src)?;
    let (n2, ny) = (manifest.dimension("adm2"), manifest.dimension("year"));

    let years = decode(&get_verified(src, &manifest, files::YEARS)?, "years", i32::from_le_bytes)?;
    let population = decode(&get_verified(src, &manifest, files::POPULATION)?, "population", f64::from_le_bytes)?;
    let population = Array2::from_shape_vec((n2, ny), population)
        .context("[io::bundle] population does not match the adm2 x year dimensions")?;
    let parents = decode(&get_verified(src, &manifest, files::ADM2_TO_ADM1)?, "adm2_to_adm1", i32::from_le_bytes)?;
    let ir_to_adm2 = read_incidence_bytes(&get_verified(src, &manifest, files::IR_TO_ADM2)?)?;

    let adm2 = read_csv_bytes(&get_verified(src, &manifest, files::ADM2_META)?)?;
    let adm1 = read_csv_bytes(&get_verified(src, &manifest, files::ADM1_META)?)?;
    let irs = read_csv_bytes(&get_verified(src, &manifest, files::IR_META)?)?;

    let bundle = ArrayBundle {
        years,
        population,
        adm2_to_adm1: Array1::from(parents),
        ir_to_adm2,
        iso: text_column(&adm2, "iso")?,
        adm2_id1: integer_column(&adm2, "adm2_id1")?,
        adm2_id2: integer_column(&adm2, "adm2_id2")?,
        adm2_name: text_column(&adm2, "adm2_name")?,
        adm1_name: text_column(&adm1, "adm1_name")?,
        ir_id: integer_column(&irs, "agglomid_id")?,
        ir_region_key: text_column(&irs, "region_key")?,
    };
    bundle.validate()?;
    ensure!(
        bundle.adm1_count() == manifest.dimension("adm1") && bundle.ir_count() == manifest.dimension("agglomid"),
        "[io::bundle] metadata does not match manifest dimensions",
    );
    Ok(bundle)
}

/// Read a bundle directory written by `write_bundle`.
pub fn read_bundle(path: &Path) -> Result<ArrayBundle> {
    require_dir_exists(path)?;
    read_bundle_source(&DiskBundle::new(path))
        .with_context(|| format!("[io::bundle] Failed to read bundle {}", path.display()))
}
