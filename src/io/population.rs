use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use polars::{df, prelude::*};
use regex::Regex;
use walkdir::WalkDir;

use crate::{
    error::LinkError,
    keys::{normalize_population, PopulationRecord},
};
use super::csv::{read_csv_text, write_csv};

/// A per-year population file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationFile {
    pub year: i32,
    pub path: PathBuf,
}

/// File name of the population table for `year`.
pub fn population_file_name(year: i32) -> String {
    format!("population_by_adm2_{year}.csv")
}

/// Find every `population_by_adm2_*.csv` directly in `dir` (subdirectories are
/// not searched), sorted by year then path.
/// Names without a 4-digit year and empty files are skipped with a warning.
pub fn discover_population_files(dir: &Path, verbose: u8) -> Result<Vec<PopulationFile>> {
    let pattern = Regex::new(r"^population_by_adm2_.*\.csv$")?;
    let year_pattern = Regex::new(r"(\d{4})")?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("[io::population] Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() { continue }

        let name = entry.file_name().to_string_lossy();
        if !pattern.is_match(&name) { continue }

        let Some(year) = year_pattern.captures(&name).and_then(|c| c[1].parse::<i32>().ok()) else {
            eprintln!("[io::population] Skipping {}: no year in file name", entry.path().display());
            continue;
        };
        let size = entry.metadata()
            .with_context(|| format!("[io::population] Failed to stat {}", entry.path().display()))?
            .len();
        if size == 0 {
            eprintln!("[io::population] Skipping {}: file is empty", entry.path().display());
            continue;
        }
        files.push(PopulationFile { year, path: entry.path().to_path_buf() });
    }

    if files.is_empty() {
        bail!("[io::population] No population_by_adm2_<year>.csv files found in {}", dir.display());
    }
    files.sort_by(|a, b| (a.year, &a.path).cmp(&(b.year, &b.path)));

    if verbose > 0 {
        let years = files.iter().map(|f| f.year.to_string()).collect::<Vec<_>>();
        eprintln!("[io::population] {} files, years {}", files.len(), years.join(", "));
    }
    Ok(files)
}

/// Load and normalize all discovered files. The year in the file name wins over
/// any `year` column. Files with no data rows are skipped.
pub fn load_population(dir: &Path, verbose: u8) -> Result<(Vec<PopulationRecord>, Vec<LinkError>)> {
    let mut records = Vec::new();
    let mut rejected = Vec::new();
    for file in discover_population_files(dir, verbose)? {
        let df = read_csv_text(&file.path, 0)?;
        if df.height() == 0 {
            eprintln!("[io::population] Skipping {}: no rows", file.path.display());
            continue;
        }
        let normalized = normalize_population(&df, Some(file.year))
            .with_context(|| format!("[io::population] Failed to normalize {}", file.path.display()))?;
        if verbose > 0 {
            eprintln!(
                "[io::population] {}: {} rows, {} rejected",
                file.path.display(), normalized.rows.len(), normalized.rejected.len(),
            );
        }
        records.extend(normalized.rows);
        rejected.extend(normalized.rejected);
    }
    Ok((records, rejected))
}

/// Population records as a table with columns
/// `ISO, ID_1, ADM1_NAME, ID_2, ADM2_NAME, population, year`.
pub fn population_frame(records: &[PopulationRecord]) -> Result<DataFrame> {
    Ok(df![
        "ISO" => records.iter().map(|r| r.attrs.key.iso.to_string()).collect::<Vec<_>>(),
        "ID_1" => records.iter().map(|r| r.attrs.key.adm1).collect::<Vec<_>>(),
        "ADM1_NAME" => records.iter().map(|r| r.attrs.adm1_name.as_deref()).collect::<Vec<_>>(),
        "ID_2" => records.iter().map(|r| r.attrs.key.adm2).collect::<Vec<_>>(),
        "ADM2_NAME" => records.iter().map(|r| r.attrs.adm2_name.as_deref()).collect::<Vec<_>>(),
        "population" => records.iter().map(|r| r.value).collect::<Vec<_>>(),
        "year" => records.iter().map(|r| r.year).collect::<Vec<_>>(),
    ]?)
}

/// Write `population_by_adm2_<year>.csv` into `dir` and return its path.
pub fn write_population(dir: &Path, year: i32, records: &[PopulationRecord]) -> Result<PathBuf> {
    let path = dir.join(population_file_name(year));
    write_csv(&mut population_frame(records)?, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use super::*;
    use crate::keys::{Adm2Key, AdmAttrs, Iso};

    fn record(adm2: i64, year: i32, value: Option<f64>) -> PopulationRecord {
        PopulationRecord {
            attrs: AdmAttrs {
                key: Adm2Key::new(Iso::new("KEN").unwrap(), 1, adm2),
                adm1_name: Some(Arc::from("Nairobi")),
                adm2_name: None,
            },
            year,
            value,
        }
    }

    #[test]
    fn discovery_skips_yearless_empty_and_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        write_population(dir.path(), 2020, &[record(1, 2020, Some(5.0))]).unwrap();
        fs::create_dir(dir.path().join("older")).unwrap();
        write_population(&dir.path().join("older"), 2010, &[record(1, 2010, Some(3.0))]).unwrap();
        fs::write(dir.path().join("population_by_adm2_latest.csv"), "ISO\n").unwrap();
        fs::write(dir.path().join("population_by_adm2_2030.csv"), "").unwrap();
        fs::write(dir.path().join("notes.csv"), "x\n1\n").unwrap();

        let files = discover_population_files(dir.path(), 0).unwrap();
        assert_eq!(files.iter().map(|f| f.year).collect::<Vec<_>>(), vec![2020]);
        assert_eq!(files[0].path, dir.path().join("population_by_adm2_2020.csv"));
    }

    #[test]
    fn discovery_without_files_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_population_files(dir.path(), 0).is_err());
    }

    #[test]
    fn written_tables_load_back_with_file_year() {
        let dir = tempfile::tempdir().unwrap();
        write_population(dir.path(), 2015, &[record(1, 2015, Some(5.5)), record(2, 2015, None)]).unwrap();

        let (records, rejected) = load_population(dir.path(), 0).unwrap();
        assert!(rejected.is_empty());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].year, 2015);
        assert_eq!(records[0].value, Some(5.5));
        assert_eq!(records[1].value, None);
        assert_eq!(records[0].attrs.adm1_name.as_deref(), Some("Nairobi"));
        assert_eq!(records[0].attrs.adm2_name, None);
    }
}
