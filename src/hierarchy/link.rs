use std::{collections::BTreeSet, sync::Arc};

use ahash::AHashMap;
use anyhow::Result;
use polars::prelude::*;

use crate::{
    error::LinkError,
    keys::{parse_integral, AdmAttrs, Field, GadmRecord, HierarchyRecord, IrId, Iso, ObjectId, TableReader, LINK_TABLE},
};

/// One (IR, GADM object) pair. `adm` is `None` when the object id has no GADM match.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRow {
    pub ir: IrId,
    pub region_key: Option<Arc<str>>,
    pub object_id: ObjectId,
    pub adm: Option<AdmAttrs>,
}

/// Exploded IR to ADM2 links, in hierarchy order then gadmid list order.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    pub rows: Vec<LinkRow>,
    pub rejected: Vec<LinkError>,
    /// GADM attribute rows ignored because their object id was already seen.
    pub duplicate_object_ids: usize,
}

impl LinkTable {
    /// Rows whose object id did not resolve to a GADM record.
    pub fn unmatched(&self) -> impl Iterator<Item = &LinkRow> {
        self.rows.iter().filter(|row| row.adm.is_none())
    }

    /// Rows with resolved ADM attributes, paired with them.
    pub fn matched(&self) -> impl Iterator<Item = (&LinkRow, &AdmAttrs)> {
        self.rows.iter().filter_map(|row| row.adm.as_ref().map(|adm| (row, adm)))
    }

    /// Distinct countries referenced by matched rows, sorted.
    pub fn countries(&self) -> Vec<Iso> {
        self.matched()
            .map(|(_, adm)| adm.key.iso.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Render as the `ir_to_adm2_adm1` link file layout.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let adm = |f: fn(&AdmAttrs) -> Option<String>| self.rows.iter()
            .map(|row| row.adm.as_ref().and_then(f))
            .collect::<Vec<_>>();
        let adm_id = |f: fn(&AdmAttrs) -> i64| self.rows.iter()
            .map(|row| row.adm.as_ref().map(f))
            .collect::<Vec<_>>();

        Ok(DataFrame::new(vec![
            Column::new("agglomid".into(), self.rows.iter().map(|row| row.ir.0).collect::<Vec<_>>()),
            Column::new("region-key".into(), self.rows.iter()
                .map(|row| row.region_key.as_deref().map(str::to_string))
                .collect::<Vec<_>>()),
            Column::new("OBJECTID".into(), self.rows.iter().map(|row| row.object_id.0).collect::<Vec<_>>()),
            Column::new("ISO".into(), adm(|a| Some(a.key.iso.to_string()))),
            Column::new("ID_1".into(), adm_id(|a| a.key.adm1)),
            Column::new("NAME_1".into(), adm(|a| a.adm1_name.as_deref().map(str::to_string))),
            Column::new("ID_2".into(), adm_id(|a| a.key.adm2)),
            Column::new("NAME_2".into(), adm(|a| a.adm2_name.as_deref().map(str::to_string))),
        ])?)
    }

    /// Read a link file produced by [`LinkTable::to_dataframe`].
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let reader = TableReader::new("link", df, LINK_TABLE)?;
        let mut table = LinkTable::default();

        for row in 0..reader.height() {
            let parsed = (|| -> Result<LinkRow, LinkError> {
                let adm = match reader.text(Field::Iso, row) {
                    None => None,
                    Some(_) => Some(reader.adm_attrs(row)?),
                };
                Ok(LinkRow {
                    ir: IrId(reader.integer(Field::IrId, row)?),
                    region_key: reader.shared_text(Field::RegionKey, row),
                    object_id: ObjectId(reader.integer(Field::ObjectId, row)?),
                    adm,
                })
            })();
            match parsed {
                Ok(link) => table.rows.push(link),
                Err(err) => table.rejected.push(err),
            }
        }

        Ok(table)
    }
}

/// Expand every terminal hierarchy node's whitespace-separated gadmid list into
/// one row per object id and left-join the GADM attributes onto it.
///
/// Unmatched object ids are kept with `adm: None`. Duplicate object ids in the GADM
/// table keep their first record so the join never multiplies rows.
pub fn link_hierarchy(hierarchy: &[HierarchyRecord], gadm: &[GadmRecord]) -> LinkTable {
    let mut table = LinkTable::default();

    let mut by_object: AHashMap<ObjectId, &AdmAttrs> = AHashMap::with_capacity(gadm.len());
    for record in gadm {
        if by_object.contains_key(&record.object_id) {
            table.duplicate_object_ids += 1;
        } else {
            by_object.insert(record.object_id, &record.attrs);
        }
    }

    for node in hierarchy.iter().filter(|node| node.is_terminal) {
        let Some(gadm_ids) = node.gadm_ids.as_deref().filter(|s| !s.trim().is_empty()) else { continue };

        let Some(ir) = node.ir else {
            table.rejected.push(LinkError::MissingIdentifier {
                row: node.row,
                field: Field::IrId.to_str(),
                detail: "terminal node with gadmid but no agglomid".into(),
            });
            continue;
        };

        for token in gadm_ids.split_whitespace() {
            let Some(object_id) = parse_integral(token).map(ObjectId) else {
                table.rejected.push(LinkError::MissingIdentifier {
                    row: node.row,
                    field: Field::GadmIds.to_str(),
                    detail: format!("unparseable object id {token:?}"),
                });
                continue;
            };

            table.rows.push(LinkRow {
                ir,
                region_key: node.region_key.clone(),
                object_id,
                adm: by_object.get(&object_id).map(|&attrs| attrs.clone()),
            });
        }
    }

    table
}
