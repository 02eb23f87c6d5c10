use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use serde_json::{json, Map, Value};
use shapefile::{dbase::{FieldValue, Record}, Reader, Shape};

use crate::{
    error::LinkError,
    geom::{shape_to_multipolygon, GadmLayer, IrFeature, IrLayer},
    keys::{Field, IrId, TableReader, GADM_SHAPES, IR_SHAPES},
};

/// Reads all shapes + attribute records from a given `.shp` file path.
pub fn read_shapefile(path: &Path) -> Result<Vec<(Shape, Record)>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    let mut items = Vec::with_capacity(reader.shape_count()?);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("Error reading shape+record")?;
        items.push((shape, record));
    }
    Ok(items)
}

fn field_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(s) => s.clone(),
        FieldValue::Memo(s) => Some(s.clone()),
        FieldValue::Numeric(n) => n.map(|n| n.to_string()),
        FieldValue::Float(f) => f.map(|f| f.to_string()),
        FieldValue::Double(d) => Some(d.to_string()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Logical(b) => b.map(|b| b.to_string()),
        _ => None,
    }
}

fn field_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Numeric(n) => json!(n),
        FieldValue::Float(f) => json!(f),
        FieldValue::Double(d) => json!(d),
        FieldValue::Integer(i) => json!(i),
        FieldValue::Logical(b) => json!(b),
        other => json!(field_text(other)),
    }
}

/// Attribute records as a text DataFrame, one column per dBASE field.
fn records_to_dataframe(records: &[&Record]) -> Result<DataFrame> {
    let Some(first) = records.first() else { return Ok(DataFrame::empty()) };
    let mut names = Record::clone(first).into_iter().map(|(name, _)| name).collect::<Vec<_>>();
    names.sort();

    let columns = names.iter()
        .map(|name| Column::new(
            name.as_str().into(),
            records.iter()
                .map(|record| record.get(name).and_then(field_text))
                .collect::<Vec<_>>(),
        ))
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

/// Load GADM ADM2 polygons. Features without a full ADM2 key are rejected.
pub fn read_gadm_shapes(path: &Path, verbose: u8) -> Result<(GadmLayer, Vec<LinkError>)> {
    let items = read_shapefile(path)?;
    let records = items.iter().map(|(_, record)| record).collect::<Vec<_>>();
    let reader = TableReader::new("gadm shapes", &records_to_dataframe(&records)?, GADM_SHAPES)?;

    let mut layer = GadmLayer::new();
    let mut rejected = Vec::new();
    for (row, (shape, _)) in items.into_iter().enumerate() {
        match reader.adm_attrs(row) {
            Ok(attrs) => {
                let shape = shape_to_multipolygon(shape)
                    .with_context(|| format!("Error converting shape {row} in {}", path.display()))?;
                layer.push(attrs, shape);
            }
            Err(err) => rejected.push(err),
        }
    }

    if verbose > 0 {
        eprintln!(
            "[io::shp] {}: {} ADM2 features, {} rejected, {} duplicate keys",
            path.display(), layer.len(), rejected.len(), layer.duplicates(),
        );
    }
    Ok((layer, rejected))
}

/// Load IR polygons. The IR id is read from `color` (stored as a float) or `agglomid`.
pub fn read_ir_shapes(path: &Path, verbose: u8) -> Result<(IrLayer, Vec<LinkError>)> {
    let items = read_shapefile(path)?;
    let records = items.iter().map(|(_, record)| record).collect::<Vec<_>>();
    let reader = TableReader::new("ir shapes", &records_to_dataframe(&records)?, IR_SHAPES)?;

    let mut layer = IrLayer::new();
    let mut rejected = Vec::new();
    for (row, (shape, record)) in items.into_iter().enumerate() {
        let ir = match reader.integer(Field::IrId, row) {
            Ok(ir) => IrId(ir),
            Err(err) => { rejected.push(err); continue }
        };
        let properties = record.into_iter()
            .map(|(name, value)| (name, field_json(&value)))
            .collect::<Map<_, _>>();
        let shape = shape_to_multipolygon(shape)
            .with_context(|| format!("Error converting shape {row} in {}", path.display()))?;
        layer.push(IrFeature { ir, iso: reader.iso(row).ok(), properties }, shape);
    }

    if verbose > 0 {
        eprintln!(
            "[io::shp] {}: {} IR features, {} rejected, {} duplicate ids",
            path.display(), layer.len(), rejected.len(), layer.duplicates(),
        );
    }
    Ok((layer, rejected))
}
