//! Tabular and per-country vector outputs.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use polars::{df, prelude::*};
use serde_json::{json, Map, Value};

use crate::{
    classify::{Case, Classification, ClassifiedAdm2, RelationSet},
    geom::{GeometryLookup, IrLayer},
    hierarchy::{LinkTable, RelationStats},
    io::{csv::write_csv, fs::ensure_dir_exists, geojson},
    keys::{IrId, Iso},
};

pub const LINK_FILE: &str = "ir_to_adm2_adm1.csv";
pub const STATS_FILE: &str = "ir_adm_stats.csv";
pub const MISSING_FILE: &str = "geometries/missing_geometries.csv";
pub const EXPORT_LOG: &str = "export_log.txt";
pub const PROBLEMATIC_DIR: &str = "ir_problematic";

pub fn ir_file_name(iso: &Iso) -> String { format!("{iso}_ir.geojson") }

pub fn adm2_file_name(iso: &Iso) -> String { format!("{iso}_adm2.geojson") }

pub fn problematic_file_name(iso: &Iso) -> String { format!("{iso}_ir_problematic.geojson") }

/// Write the exploded link table as `ir_to_adm2_adm1.csv` in `dir`.
pub fn write_links(links: &LinkTable, dir: &Path) -> Result<PathBuf> {
    ensure_dir_exists(dir)?;
    let path = dir.join(LINK_FILE);
    write_csv(&mut links.to_dataframe()?, &path)?;
    Ok(path)
}

/// Write the `metric,count` relationship summary as `ir_adm_stats.csv` in `dir`.
pub fn write_stats(stats: &RelationStats, dir: &Path) -> Result<PathBuf> {
    ensure_dir_exists(dir)?;
    let path = dir.join(STATS_FILE);
    write_csv(&mut stats.to_dataframe()?, &path)?;
    Ok(path)
}

/// What an export pass wrote and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub written: Vec<PathBuf>,
    /// Files left untouched because they already existed.
    pub skipped: Vec<PathBuf>,
    /// Features that could not be assigned to a country.
    pub unassigned: usize,
}

/// One `<ISO>_ir.geojson` per country, carrying each IR's source attributes.
pub fn export_ir_geojson(irs: &IrLayer, dir: &Path, verbose: u8) -> Result<ExportSummary> {
    ensure_dir_exists(dir)?;
    let mut summary = ExportSummary::default();

    let mut groups: BTreeMap<&Iso, Vec<Value>> = BTreeMap::new();
    for (feature, shape) in irs.iter() {
        match &feature.iso {
            Some(iso) => groups.entry(iso).or_default().push(geojson::feature(shape, feature.properties.clone())),
            None => summary.unassigned += 1,
        }
    }

    for (iso, features) in groups {
        let path = dir.join(ir_file_name(iso));
        let count = features.len();
        geojson::write_feature_collection(&path, features)?;
        if verbose > 0 {
            eprintln!("[export] {}: {count} IRs", path.display());
        }
        summary.written.push(path);
    }
    if summary.unassigned > 0 {
        eprintln!("[export] {} IR features without a country code were not exported", summary.unassigned);
    }
    Ok(summary)
}

fn adm2_properties(c: &ClassifiedAdm2) -> Map<String, Value> {
    let agglomid = match c.case {
        Case::NoIr => Value::Null,
        _ => json!(c.irs.iter().map(|ir| ir.0).collect::<Vec<_>>()),
    };
    let mut properties = Map::new();
    properties.insert("adm2_id".into(), json!(c.attrs.key.to_string()));
    properties.insert("agglomid".into(), agglomid);
    properties.insert("ID_1".into(), json!(c.attrs.key.adm1));
    properties.insert("NAME_1".into(), json!(c.attrs.adm1_name.as_deref()));
    properties.insert("ID_2".into(), json!(c.attrs.key.adm2));
    properties.insert("NAME_2".into(), json!(c.attrs.adm2_name.as_deref()));
    properties.insert("geom_source".into(), json!(c.case.geometry_source().label()));
    properties.insert("case_type".into(), json!(c.case.label()));
    properties
}

/// One `<ISO>_adm2.geojson` per country with the reconciled geometries.
/// Existing files are kept unless `overwrite` is set.
pub fn export_adm2_geojson(classification: &Classification, dir: &Path, overwrite: bool, verbose: u8) -> Result<ExportSummary> {
    ensure_dir_exists(dir)?;
    let mut summary = ExportSummary::default();

    for (iso, group) in classification.by_country() {
        let path = dir.join(adm2_file_name(&iso));
        if path.exists() && !overwrite {
            eprintln!("[export] Skipped {iso}: {} already exists", path.display());
            summary.skipped.push(path);
            continue;
        }
        let features = group.iter()
            .map(|c| geojson::feature(&c.geometry, adm2_properties(c)))
            .collect::<Vec<_>>();
        geojson::write_feature_collection(&path, features)?;
        if verbose > 0 {
            eprintln!("[export] {}: {} ADM2s", path.display(), group.len());
        }
        summary.written.push(path);
    }
    Ok(summary)
}

/// One `ir_problematic/<ISO>_ir_problematic.geojson` per country touched by an IR
/// that spans several ADM1 units. IRs without a polygon are written with a `null`
/// geometry and counted as unassigned.
pub fn export_problematic<L: GeometryLookup<IrId>>(
    relations: &RelationSet,
    irs: &L,
    dir: &Path,
    verbose: u8,
) -> Result<ExportSummary> {
    let dir = dir.join(PROBLEMATIC_DIR);
    ensure_dir_exists(&dir)?;
    let mut summary = ExportSummary::default();

    let mut groups: BTreeMap<&Iso, Vec<Value>> = BTreeMap::new();
    for problem in &relations.problematic {
        let shape = irs.geometry(&problem.ir);
        if shape.is_none() {
            summary.unassigned += 1;
        }
        for iso in &problem.countries {
            let mut properties = Map::new();
            properties.insert("agglomid".into(), json!(problem.ir.0));
            properties.insert("ISO".into(), json!(iso.as_str()));
            properties.insert("region-key".into(), json!(problem.region_key.as_deref()));
            properties.insert("ADM1".into(), json!(problem.adm1.iter().map(|k| k.to_string()).collect::<Vec<_>>()));
            let feature = match shape {
                Some(shape) => geojson::feature(shape, properties),
                None => geojson::null_feature(properties),
            };
            groups.entry(iso).or_default().push(feature);
        }
    }

    for (iso, features) in groups {
        let path = dir.join(problematic_file_name(iso));
        let count = features.len();
        geojson::write_feature_collection(&path, features)?;
        if verbose > 0 {
            eprintln!("[export] {}: {count} problematic IRs", path.display());
        }
        summary.written.push(path);
    }
    if summary.unassigned > 0 {
        eprintln!("[export] {} problematic IRs have no polygon (written with null geometry)", summary.unassigned);
    }
    Ok(summary)
}

/// Write every ADM2 diverted to the missing-geometry channel to
/// `geometries/missing_geometries.csv` under `dir`.
pub fn write_missing_geometries(classification: &Classification, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(MISSING_FILE);
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }
    let missing = &classification.missing;
    let mut df = df![
        "adm2_id" => missing.iter().map(|m| m.attrs.key.to_string()).collect::<Vec<_>>(),
        "ISO" => missing.iter().map(|m| m.attrs.key.iso.to_string()).collect::<Vec<_>>(),
        "ID_1" => missing.iter().map(|m| m.attrs.key.adm1).collect::<Vec<_>>(),
        "ID_2" => missing.iter().map(|m| m.attrs.key.adm2).collect::<Vec<_>>(),
        "NAME_2" => missing.iter().map(|m| m.attrs.adm2_name.as_deref()).collect::<Vec<_>>(),
        "case_type" => missing.iter().map(|m| m.case.label()).collect::<Vec<_>>(),
        "agglomid" => missing.iter()
            .map(|m| m.irs.iter().map(|ir| ir.to_string()).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>(),
        "reason" => missing.iter().map(|m| m.error.to_string()).collect::<Vec<_>>(),
    ]?;
    write_csv(&mut df, &path)?;
    Ok(path)
}

/// Write `export_log.txt`, one warning per country of `countries` that has no
/// `<ISO>_adm2.geojson` in `dir`. Returns those countries.
pub fn write_export_log(countries: &[Iso], dir: &Path) -> Result<Vec<Iso>> {
    let missing = countries.iter()
        .filter(|iso| !dir.join(adm2_file_name(iso)).exists())
        .cloned()
        .collect::<Vec<_>>();

    let log = missing.iter()
        .map(|iso| format!("[WARNING] {iso}: ADM2 GeoJSON was not generated.\n"))
        .collect::<String>();
    let path = dir.join(EXPORT_LOG);
    fs::write(&path, log)
        .with_context(|| format!("[export] Failed to write {}", path.display()))?;
    Ok(missing)
}
