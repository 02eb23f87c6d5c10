//! End-to-end run: link, summarise, assemble and export.

use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    assemble::{assemble, Assembly, DuplicatePolicy, PopulationTable},
    classify::{classify, Classification, RelationSet},
    error::LinkError,
    export,
    geom::{GadmLayer, IrLayer},
    hierarchy::{link_hierarchy, LinkTable, RelationStats},
    index::EntityRegistry,
    io::{bundle::write_bundle, csv::read_csv_text, fs::require_file_exists, population::load_population, shp},
    keys::{normalize_gadm, normalize_hierarchy, Iso},
};

/// Everything a full run needs. Loaded from JSON by `run --config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// IR hierarchy table with `is_terminal`, `gadmid` and `agglomid`.
    pub hierarchy: PathBuf,
    /// Metadata lines before the hierarchy header.
    #[serde(default)]
    pub hierarchy_skip_rows: usize,
    /// GADM attribute table keyed by `OBJECTID`.
    pub gadm_table: PathBuf,
    /// Directory holding `population_by_adm2_<year>.csv` files.
    pub population_dir: PathBuf,
    pub gadm_shapes: PathBuf,
    pub ir_shapes: PathBuf,
    pub output_dir: PathBuf,
    /// Restrict geometry and relations to these ISO codes.
    #[serde(default)]
    pub countries: Option<Vec<String>>,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Replace existing per-country ADM2 GeoJSON files.
    #[serde(default)]
    pub overwrite: bool,
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("[pipeline] Failed to open config {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("[pipeline] Failed to parse config {}", path.display()))
    }

    /// The country filter as normalized ISO codes.
    pub fn country_filter(&self) -> Result<Option<Vec<Iso>>> {
        self.countries.as_ref()
            .map(|codes| parse_countries(codes))
            .transpose()
    }

    pub fn bundle_dir(&self) -> PathBuf { self.output_dir.join("bundle") }

    pub fn geojson_dir(&self) -> PathBuf { self.output_dir.join("geojson") }
}

/// Parse ISO codes, failing on the first blank one.
pub fn parse_countries(codes: &[String]) -> Result<Vec<Iso>> {
    codes.iter()
        .map(|code| Iso::new(code).ok_or_else(|| anyhow!("[pipeline] invalid country code {code:?}")))
        .collect()
}

/// Read the hierarchy and GADM tables and build the exploded link table.
pub fn link_stage(hierarchy: &Path, skip_rows: usize, gadm_table: &Path, verbose: u8) -> Result<LinkTable> {
    require_file_exists(hierarchy)?;
    require_file_exists(gadm_table)?;

    let hierarchy = normalize_hierarchy(&read_csv_text(hierarchy, skip_rows)?)?;
    let gadm = normalize_gadm(&read_csv_text(gadm_table, 0)?)?;
    let mut links = link_hierarchy(&hierarchy.rows, &gadm.rows);

    let (hierarchy_rejected, gadm_rejected) = (hierarchy.rejected.len(), gadm.rejected.len());
    let mut rejected = hierarchy.rejected;
    rejected.extend(gadm.rejected);
    rejected.append(&mut links.rejected);
    links.rejected = rejected;

    if links.duplicate_object_ids > 0 {
        eprintln!("[link] {} duplicate GADM object ids ignored (first record kept)", links.duplicate_object_ids);
    }
    if verbose > 0 {
        eprintln!(
            "[link] {} links ({} unmatched); rejected rows: hierarchy {hierarchy_rejected}, gadm {gadm_rejected}",
            links.rows.len(), links.unmatched().count(),
        );
    }
    Ok(links)
}

/// Read a link file previously written by [`export::write_links`].
pub fn read_links(path: &Path) -> Result<LinkTable> {
    require_file_exists(path)?;
    LinkTable::from_dataframe(&read_csv_text(path, 0)?)
        .with_context(|| format!("[pipeline] Failed to read link file {}", path.display()))
}

/// Cleaned relations restricted to `countries` when given.
pub fn relation_stage(links: &LinkTable, countries: Option<&[Iso]>, verbose: u8) -> RelationSet {
    let relations = RelationSet::from_links(links);
    let relations = match countries {
        Some(countries) => relations.retain_countries(countries),
        None => relations,
    };
    if verbose > 0 {
        eprintln!(
            "[relations] {} relations, {} problematic IRs, {} unmatched links",
            relations.len(), relations.problematic.len(), relations.unmatched,
        );
    }
    relations
}

/// Outcome of population loading, indexing and array assembly.
#[derive(Debug, Clone)]
pub struct BundleStage {
    pub assembly: Assembly,
    pub population: PopulationTable,
    pub population_rejected: Vec<LinkError>,
}

/// Load population, assign indices and assemble the arrays.
pub fn bundle_stage(
    relations: &RelationSet,
    population_dir: &Path,
    policy: DuplicatePolicy,
    verbose: u8,
) -> Result<BundleStage> {
    let (records, rejected) = load_population(population_dir, verbose)?;
    let population = PopulationTable::aggregate(&records, policy)?;
    if verbose > 0 {
        eprintln!(
            "[population] {} ADM2s, {} years, {} invalid values, {} rows merged, {} rejected",
            population.adm2.len(), population.years.len(), population.invalid, population.merged, rejected.len(),
        );
    }

    let registry = EntityRegistry::build(&population.adm2, relations.irs())?;
    let assembly = assemble(&registry, &population, relations)?;
    for err in &assembly.dropped {
        eprintln!("[assemble] dropped {err}");
    }
    if verbose > 0 {
        let bundle = &assembly.bundle;
        eprintln!(
            "[assemble] adm2={} adm1={} year={} agglomid={} links={}",
            bundle.adm2_count(), bundle.adm1_count(), bundle.year_count(), bundle.ir_count(), bundle.ir_to_adm2.nnz(),
        );
    }

    Ok(BundleStage { assembly, population, population_rejected: rejected })
}

/// Polygons of both layers, filtered to `countries` when given.
#[derive(Debug, Clone)]
pub struct GeometryStage {
    pub gadm: GadmLayer,
    pub irs: IrLayer,
    pub gadm_rejected: Vec<LinkError>,
    pub ir_rejected: Vec<LinkError>,
}

pub fn geometry_stage(gadm_shapes: &Path, ir_shapes: &Path, countries: Option<&[Iso]>, verbose: u8) -> Result<GeometryStage> {
    let (gadm, gadm_rejected) = shp::read_gadm_shapes(gadm_shapes, verbose)?;
    let (irs, ir_rejected) = shp::read_ir_shapes(ir_shapes, verbose)?;
    if gadm.duplicates() > 0 {
        eprintln!("[geometry] {} GADM features repeat an ADM2 key (first polygon used)", gadm.duplicates());
    }

    let (gadm, irs) = match countries {
        Some(countries) => (gadm.retain_countries(countries), irs.retain_countries(countries)),
        None => (gadm, irs),
    };
    Ok(GeometryStage { gadm, irs, gadm_rejected, ir_rejected })
}

/// Files written by the vector export.
#[derive(Debug, Clone, Default)]
pub struct ExportStage {
    pub ir_files: usize,
    pub adm2_files: usize,
    pub adm2_skipped: usize,
    pub problematic_files: usize,
    pub countries_without_output: Vec<Iso>,
}

/// Classify ADM2s and write every per-country file, the missing-geometry list
/// and the export log. `countries` are the countries expected in the log.
pub fn export_stage(
    relations: &RelationSet,
    geometry: &GeometryStage,
    countries: &[Iso],
    output_dir: &Path,
    geojson_dir: &Path,
    overwrite: bool,
    verbose: u8,
) -> Result<(Classification, ExportStage)> {
    let classification = classify(relations, &geometry.irs, &geometry.gadm);
    if verbose > 0 {
        let [c1, c2, c3, c4] = classification.counts();
        eprintln!(
            "[classify] case 1: {c1}, case 2: {c2}, case 3: {c3}, case 4: {c4}; {} missing, {} duplicates dropped",
            classification.missing.len(), classification.duplicates_dropped,
        );
    }

    let ir = export::export_ir_geojson(&geometry.irs, geojson_dir, verbose)?;
    let adm2 = export::export_adm2_geojson(&classification, geojson_dir, overwrite, verbose)?;
    let problematic = export::export_problematic(relations, &geometry.irs, geojson_dir, verbose)?;
    export::write_missing_geometries(&classification, output_dir)?;
    let countries_without_output = export::write_export_log(countries, geojson_dir)?;
    for iso in &countries_without_output {
        eprintln!("[export] {iso}: ADM2 GeoJSON was not generated");
    }

    let stage = ExportStage {
        ir_files: ir.written.len(),
        adm2_files: adm2.written.len(),
        adm2_skipped: adm2.skipped.len(),
        problematic_files: problematic.written.len(),
        countries_without_output,
    };
    Ok((classification, stage))
}

/// Summary of every exclusion and output of a full run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub links: usize,
    pub unmatched_links: usize,
    pub rejected_rows: usize,
    pub duplicate_object_ids: usize,
    pub stats: RelationStats,
    pub problematic_irs: usize,
    pub population_rejected: usize,
    pub population_invalid: usize,
    pub population_merged: usize,
    /// adm2, adm1, year, agglomid.
    pub dimensions: [usize; 4],
    pub dropped_relations: usize,
    pub geometry_rejected: usize,
    pub case_counts: [usize; 4],
    pub missing_geometries: usize,
    pub duplicates_dropped: usize,
    pub exports: ExportStage,
    /// Every collected row-level error, counted by kind.
    pub errors_by_kind: BTreeMap<&'static str, usize>,
}

/// Count errors by [`LinkError::kind`].
pub fn count_by_kind<'a>(errors: impl IntoIterator<Item = &'a LinkError>) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for err in errors {
        *counts.entry(err.kind()).or_default() += 1;
    }
    counts
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [n2, n1, ny, ni] = self.dimensions;
        writeln!(f, "links: {} ({} unmatched, {} rejected rows, {} duplicate object ids)",
            self.links, self.unmatched_links, self.rejected_rows, self.duplicate_object_ids)?;
        writeln!(f, "irs: {}, adm2: {}, adm2 with multiple irs: {}, irs covering multiple adm2: {}",
            self.stats.total_irs, self.stats.total_adm2, self.stats.adm2_with_multiple_irs, self.stats.irs_with_multiple_adm2)?;
        writeln!(f, "problematic irs: {}", self.problematic_irs)?;
        writeln!(f, "population: {} rejected rows, {} invalid values, {} merged rows",
            self.population_rejected, self.population_invalid, self.population_merged)?;
        writeln!(f, "bundle: adm2={n2} adm1={n1} year={ny} agglomid={ni}, {} relations dropped", self.dropped_relations)?;
        let [c1, c2, c3, c4] = self.case_counts;
        writeln!(f, "cases: 1={c1} 2={c2} 3={c3} 4={c4}, {} missing geometries, {} duplicates dropped, {} features rejected",
            self.missing_geometries, self.duplicates_dropped, self.geometry_rejected)?;
        if !self.errors_by_kind.is_empty() {
            let kinds = self.errors_by_kind.iter()
                .map(|(kind, n)| format!("{kind}={n}"))
                .collect::<Vec<_>>();
            writeln!(f, "errors: {}", kinds.join(", "))?;
        }
        write!(f, "geojson: {} ir files, {} adm2 files ({} skipped), {} problematic files, {} countries without adm2 output",
            self.exports.ir_files, self.exports.adm2_files, self.exports.adm2_skipped,
            self.exports.problematic_files, self.exports.countries_without_output.len())
    }
}

/// Run every stage in order, writing all outputs under `config.output_dir`.
pub fn run_pipeline(config: &PipelineConfig, verbose: u8) -> Result<RunReport> {
    let countries = config.country_filter()?;
    let countries = countries.as_deref();
    if let Some(countries) = countries.filter(|_| verbose > 0) {
        let codes = countries.iter().map(Iso::as_str).collect::<Vec<_>>();
        eprintln!("[pipeline] restricted to {}", codes.join(", "));
    }

    let links = link_stage(&config.hierarchy, config.hierarchy_skip_rows, &config.gadm_table, verbose)?;
    export::write_links(&links, &config.output_dir)?;

    let stats = RelationStats::from_links(&links);
    export::write_stats(&stats, &config.output_dir)?;

    let relations = relation_stage(&links, countries, verbose);
    let bundle = bundle_stage(&relations, &config.population_dir, config.duplicate_policy, verbose)?;
    write_bundle(&bundle.assembly.bundle, &config.bundle_dir(), verbose)?;

    let geometry = geometry_stage(&config.gadm_shapes, &config.ir_shapes, countries, verbose)?;
    let expected = links.countries().into_iter()
        .filter(|iso| countries.is_none_or(|countries| countries.contains(iso)))
        .collect::<Vec<_>>();
    let (classification, exports) = export_stage(
        &relations,
        &geometry,
        &expected,
        &config.output_dir,
        &config.geojson_dir(),
        config.overwrite,
        verbose,
    )?;

    let errors_by_kind = count_by_kind(
        links.rejected.iter()
            .chain(&bundle.population_rejected)
            .chain(&bundle.assembly.dropped)
            .chain(&geometry.gadm_rejected)
            .chain(&geometry.ir_rejected)
            .chain(classification.missing.iter().map(|m| &m.error)),
    );

    let b = &bundle.assembly.bundle;
    Ok(RunReport {
        links: links.rows.len(),
        unmatched_links: links.unmatched().count(),
        rejected_rows: links.rejected.len(),
        duplicate_object_ids: links.duplicate_object_ids,
        stats,
        problematic_irs: relations.problematic.len(),
        population_rejected: bundle.population_rejected.len(),
        population_invalid: bundle.population.invalid,
        population_merged: bundle.population.merged,
        dimensions: [b.adm2_count(), b.adm1_count(), b.year_count(), b.ir_count()],
        dropped_relations: bundle.assembly.dropped.len(),
        geometry_rejected: geometry.gadm_rejected.len() + geometry.ir_rejected.len(),
        case_counts: classification.counts(),
        missing_geometries: classification.missing.len(),
        duplicates_dropped: classification.duplicates_dropped,
        exports,
        errors_by_kind,
    })
}
