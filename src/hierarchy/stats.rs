use ahash::{AHashMap, AHashSet};
use anyhow::Result;
use polars::{df, prelude::*};

use crate::keys::{Adm2Key, IrId};
use super::LinkTable;

/// Summary counts of how IRs and ADM2 units relate in a link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelationStats {
    pub total_irs: usize,
    pub total_adm2: usize,
    pub adm2_with_multiple_irs: usize,
    pub irs_with_multiple_adm2: usize,
}

impl RelationStats {
    /// Count over every IR in the table and every matched ADM2.
    pub fn from_links(links: &LinkTable) -> Self {
        let mut irs_per_adm2: AHashMap<&Adm2Key, AHashSet<IrId>> = AHashMap::new();
        let mut adm2_per_ir: AHashMap<IrId, AHashSet<&Adm2Key>> = AHashMap::new();

        for (row, adm) in links.matched() {
            irs_per_adm2.entry(&adm.key).or_default().insert(row.ir);
            adm2_per_ir.entry(row.ir).or_default().insert(&adm.key);
        }

        Self {
            total_irs: links.rows.iter().map(|row| row.ir).collect::<AHashSet<_>>().len(),
            total_adm2: irs_per_adm2.len(),
            adm2_with_multiple_irs: irs_per_adm2.values().filter(|irs| irs.len() > 1).count(),
            irs_with_multiple_adm2: adm2_per_ir.values().filter(|adm2s| adm2s.len() > 1).count(),
        }
    }

    /// Render as the two-column `metric,count` summary.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        Ok(df![
            "metric" => [
                "Total IRs",
                "Total ADM2s",
                "ADM2s with multiple IRs",
                "IRs covering multiple ADM2s",
            ],
            "count" => [
                self.total_irs as u64,
                self.total_adm2 as u64,
                self.adm2_with_multiple_irs as u64,
                self.irs_with_multiple_adm2 as u64,
            ],
        ]?)
    }
}
