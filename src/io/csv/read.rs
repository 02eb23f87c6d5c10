//! CSV reading operations.

use std::{fs::File, io::Cursor, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerReader, prelude::{CsvReadOptions, CsvReader}};

/// Reads a CSV file into a DataFrame with every column as text, skipping
/// `skip_lines` raw leading lines before the header. Those lines are not parsed
/// as CSV, so quotes or commas in a free-text preamble are harmless. Key columns
/// are parsed later by the normalizer, so no type inference happens here.
pub fn read_csv_text(path: &Path, skip_lines: usize) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_skip_lines(skip_lines)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

/// Read DataFrame from CSV bytes (for bundle reading).
pub fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    let options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0));
    CsvReader::new(Cursor::new(bytes))
        .with_options(options)
        .finish()
        .context("[io::csv::read] Failed to read CSV from bytes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_with_quotes_and_commas_is_skipped_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hierarchy.csv");
        std::fs::write(
            &path,
            "# Impact regions, v1 \"draft\n# author: x, y\nregion-key,is_terminal,gadmid,agglomid\nA,True,101 102,7\n",
        ).unwrap();

        let df = read_csv_text(&path, 2).unwrap();
        assert_eq!(df.height(), 1);
        let names = df.get_column_names().iter().map(|name| name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["region-key", "is_terminal", "gadmid", "agglomid"]);
        assert_eq!(df.column("gadmid").unwrap().str().unwrap().get(0), Some("101 102"));
    }

    #[test]
    fn every_column_is_read_as_text() {
        let df = read_csv_bytes(b"OBJECTID,ID_1\n1,2.0\n").unwrap();
        assert_eq!(df.column("OBJECTID").unwrap().str().unwrap().get(0), Some("1"));
        assert_eq!(df.column("ID_1").unwrap().str().unwrap().get(0), Some("2.0"));
    }
}
