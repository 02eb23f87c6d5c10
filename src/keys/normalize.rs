use std::sync::Arc;

use ahash::AHashMap;
use anyhow::{Context, Result};
use polars::prelude::*;

use crate::error::LinkError;
use super::{
    key::{parse_integral, Adm2Key, AdmAttrs, IrId, Iso, ObjectId},
    schema::{ColumnSpec, Field, ResolvedSchema, GADM_TABLE, HIERARCHY_TABLE, POPULATION_TABLE},
};

/// Typed rows extracted from one table, plus the rows that were excluded.
#[derive(Debug, Clone)]
pub struct Normalized<T> {
    pub rows: Vec<T>,
    pub rejected: Vec<LinkError>,
}

impl<T> Normalized<T> {
    /// Build from per-row results, isolating failures.
    fn collect(results: impl IntoIterator<Item = Result<T, LinkError>>) -> Self {
        let (mut rows, mut rejected) = (Vec::new(), Vec::new());
        for result in results {
            match result {
                Ok(row) => rows.push(row),
                Err(err) => rejected.push(err),
            }
        }
        Self { rows, rejected }
    }
}

/// Row accessor over a DataFrame whose columns have been negotiated against a schema.
/// Every resolved column is cast to text once, so numeric/string/bool source types
/// all normalize through the same parsers.
pub struct TableReader {
    columns: AHashMap<Field, StringChunked>,
    height: usize,
}

impl TableReader {
    pub fn new(table: &str, df: &DataFrame, specs: &[ColumnSpec]) -> Result<Self> {
        let names = df.get_column_names().iter()
            .map(|name| name.as_str())
            .collect::<Vec<_>>();
        let schema = ResolvedSchema::negotiate(table, &names, specs)?;

        let columns = schema.resolved()
            .map(|(field, name)| {
                let text = df.column(name)?
                    .cast(&DataType::String)
                    .with_context(|| format!("[{table}] cannot read column {name:?} as text"))?;
                Ok::<_, anyhow::Error>((field, text.str()?.clone()))
            })
            .collect::<Result<AHashMap<_, _>>>()?;

        Ok(Self { columns, height: df.height() })
    }

    #[inline] pub fn height(&self) -> usize { self.height }

    /// Trimmed text value, with blanks and absent columns read as null.
    pub fn text(&self, field: Field, row: usize) -> Option<&str> {
        self.columns.get(&field)
            .and_then(|col| col.get(row))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn shared_text(&self, field: Field, row: usize) -> Option<Arc<str>> {
        self.text(field, row).map(Arc::from)
    }

    pub fn iso(&self, row: usize) -> Result<Iso, LinkError> {
        self.text(Field::Iso, row)
            .and_then(Iso::new)
            .ok_or_else(|| missing(row, Field::Iso, "null country code"))
    }

    pub fn integer(&self, field: Field, row: usize) -> Result<i64, LinkError> {
        let raw = self.text(field, row)
            .ok_or_else(|| missing(row, field, "null"))?;
        parse_integral(raw)
            .ok_or_else(|| missing(row, field, &format!("not an integer: {raw:?}")))
    }

    pub fn float(&self, field: Field, row: usize) -> Option<f64> {
        self.text(field, row).and_then(|s| s.parse::<f64>().ok())
    }

    pub fn flag(&self, field: Field, row: usize) -> bool {
        matches!(
            self.text(field, row).map(str::to_ascii_lowercase).as_deref(),
            Some("true" | "t" | "1" | "yes" | "y")
        )
    }

    pub fn adm2_key(&self, row: usize) -> Result<Adm2Key, LinkError> {
        Ok(Adm2Key::new(
            self.iso(row)?,
            self.integer(Field::Adm1Id, row)?,
            self.integer(Field::Adm2Id, row)?,
        ))
    }

    pub fn adm_attrs(&self, row: usize) -> Result<AdmAttrs, LinkError> {
        Ok(AdmAttrs {
            key: self.adm2_key(row)?,
            adm1_name: self.shared_text(Field::Adm1Name, row),
            adm2_name: self.shared_text(Field::Adm2Name, row),
        })
    }
}

fn missing(row: usize, field: Field, detail: &str) -> LinkError {
    LinkError::MissingIdentifier { row, field: field.to_str(), detail: detail.to_string() }
}

/// One row of the GADM attribute table.
#[derive(Debug, Clone, PartialEq)]
pub struct GadmRecord {
    pub object_id: ObjectId,
    pub attrs: AdmAttrs,
}

/// One row of the IR hierarchy table.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyRecord {
    pub row: usize,
    pub ir: Option<IrId>,
    pub region_key: Option<Arc<str>>,
    pub is_terminal: bool,
    pub gadm_ids: Option<String>,
}

/// One (ADM2, year) population observation. `value` is `None` when the source had no sum.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    pub attrs: AdmAttrs,
    pub year: i32,
    pub value: Option<f64>,
}

/// Normalize the GADM attribute table; rows without object id or ADM keys are rejected.
pub fn normalize_gadm(df: &DataFrame) -> Result<Normalized<GadmRecord>> {
    let reader = TableReader::new("gadm", df, GADM_TABLE)?;
    Ok(Normalized::collect((0..reader.height()).map(|row| -> Result<GadmRecord, LinkError> {
        Ok(GadmRecord {
            object_id: ObjectId(reader.integer(Field::ObjectId, row)?),
            attrs: reader.adm_attrs(row)?,
        })
    })))
}

/// Normalize the hierarchy table. IR ids are optional here: only terminal rows
/// that carry GADM ids need one, which the linker checks.
pub fn normalize_hierarchy(df: &DataFrame) -> Result<Normalized<HierarchyRecord>> {
    let reader = TableReader::new("hierarchy", df, HIERARCHY_TABLE)?;
    Ok(Normalized::collect((0..reader.height()).map(|row| -> Result<HierarchyRecord, LinkError> {
        let ir = match reader.text(Field::IrId, row) {
            None => None,
            Some(_) => Some(IrId(reader.integer(Field::IrId, row)?)),
        };
        Ok(HierarchyRecord {
            row,
            ir,
            region_key: reader.shared_text(Field::RegionKey, row),
            is_terminal: reader.flag(Field::IsTerminal, row),
            gadm_ids: reader.text(Field::GadmIds, row).map(str::to_string),
        })
    })))
}

/// Normalize a population table. When `year` is given it overrides any year column
/// (the year encoded in the file name is authoritative).
pub fn normalize_population(df: &DataFrame, year: Option<i32>) -> Result<Normalized<PopulationRecord>> {
    let reader = TableReader::new("population", df, POPULATION_TABLE)?;
    Ok(Normalized::collect((0..reader.height()).map(|row| -> Result<PopulationRecord, LinkError> {
        let year = match year {
            Some(year) => year,
            None => {
                let year = reader.integer(Field::Year, row)?;
                i32::try_from(year).map_err(|_| missing(row, Field::Year, &format!("year out of range: {year}")))?
            }
        };
        Ok(PopulationRecord {
            attrs: reader.adm_attrs(row)?,
            year,
            value: reader.float(Field::Population, row),
        })
    })))
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    #[test]
    fn gadm_rows_normalize_across_types() {
        let df = df![
            "OBJECTID" => ["101", " 102 ", "103"],
            "GID_0" => [Some(" usa"), Some("USA"), None],
            "ID_1" => [1.0, 1.0, 2.0],
            "NAME_1" => ["Alabama", "Alabama", "Alaska"],
            "ID_2" => [1i64, 2, 3],
            "NAME_2" => ["Autauga", "Baldwin", "Aleutians"],
        ].unwrap();

        let gadm = normalize_gadm(&df).unwrap();
        assert_eq!(gadm.rows.len(), 2);
        assert_eq!(gadm.rejected.len(), 1);
        assert_eq!(gadm.rows[0].object_id, ObjectId(101));
        assert_eq!(gadm.rows[1].object_id, ObjectId(102));
        assert_eq!(gadm.rows[0].attrs.key.to_string(), "USA_1_1");
        assert_eq!(gadm.rows[1].attrs.adm2_name.as_deref(), Some("Baldwin"));
        assert!(matches!(gadm.rejected[0], LinkError::MissingIdentifier { row: 2, field: "iso", .. }));
    }

    #[test]
    fn hierarchy_tolerates_missing_region_key_and_ir() {
        let df = df![
            "is_terminal" => [true, false],
            "gadmid" => [Some("101 102"), None],
            "agglomid" => [Some(7i64), None],
        ].unwrap();

        let hierarchy = normalize_hierarchy(&df).unwrap();
        assert!(hierarchy.rejected.is_empty());
        assert_eq!(hierarchy.rows[0].ir, Some(IrId(7)));
        assert!(hierarchy.rows[0].is_terminal);
        assert_eq!(hierarchy.rows[0].gadm_ids.as_deref(), Some("101 102"));
        assert_eq!(hierarchy.rows[0].region_key, None);
        assert_eq!(hierarchy.rows[1].ir, None);
        assert!(!hierarchy.rows[1].is_terminal);
    }

    #[test]
    fn population_year_from_file_overrides_column() {
        let df = df![
            "ISO" => ["USA"],
            "ID_1" => [1i64],
            "ID_2" => [2i64],
            "population" => [Some(12.5)],
            "year" => [1999i64],
        ].unwrap();

        let pop = normalize_population(&df, Some(2015)).unwrap();
        assert_eq!(pop.rows[0].year, 2015);
        assert_eq!(pop.rows[0].value, Some(12.5));

        let pop = normalize_population(&df, None).unwrap();
        assert_eq!(pop.rows[0].year, 1999);
    }
}
