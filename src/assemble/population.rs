use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::{
    error::LinkError,
    keys::{Adm2Key, AdmAttrs, PopulationRecord},
};

/// What to do with several source rows for the same (ADM2, year).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Rows are parts of one ADM2 (e.g. split polygons) and are summed.
    #[default]
    Sum,
    /// Rows with different values are an error; exact repeats collapse.
    Reject,
}

/// Population per (ADM2, year) after aggregation, in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationTable {
    /// ADM2 attributes of every row, valid or not, first occurrence per key.
    pub adm2: Vec<AdmAttrs>,
    /// Distinct years, ascending.
    pub years: Vec<i32>,
    cells: Vec<(Adm2Key, i32, f64)>,
    /// Rows whose value was null, negative or NaN.
    pub invalid: usize,
    /// Rows folded into an earlier row for the same cell.
    pub merged: usize,
}

impl PopulationTable {
    pub fn aggregate(records: &[PopulationRecord], policy: DuplicatePolicy) -> Result<Self, LinkError> {
        let mut table = PopulationTable::default();
        let mut seen_adm2: AHashSet<&Adm2Key> = AHashSet::new();
        let mut cell_index: AHashMap<(&Adm2Key, i32), usize> = AHashMap::new();

        for record in records {
            let key = &record.attrs.key;
            if seen_adm2.insert(key) {
                table.adm2.push(record.attrs.clone());
            }
            if !table.years.contains(&record.year) {
                table.years.push(record.year);
            }

            let Some(value) = record.value.filter(|v| v.is_finite() && *v >= 0.0) else {
                table.invalid += 1;
                continue;
            };

            match cell_index.get(&(key, record.year)).copied() {
                None => {
                    cell_index.insert((key, record.year), table.cells.len());
                    table.cells.push((key.clone(), record.year, value));
                }
                Some(i) => {
                    let existing = table.cells[i].2;
                    match policy {
                        DuplicatePolicy::Sum => table.cells[i].2 += value,
                        DuplicatePolicy::Reject if existing != value => {
                            return Err(LinkError::DuplicateAssignment {
                                entity: key.to_string(),
                                year: record.year,
                                existing,
                                incoming: value,
                            });
                        }
                        DuplicatePolicy::Reject => {}
                    }
                    table.merged += 1;
                }
            }
        }

        table.years.sort_unstable();
        Ok(table)
    }

    /// Known (ADM2, year, value) cells in first-occurrence order.
    pub fn cells(&self) -> impl Iterator<Item = (&Adm2Key, i32, f64)> {
        self.cells.iter().map(|(key, year, value)| (key, *year, *value))
    }

    pub fn value(&self, key: &Adm2Key, year: i32) -> Option<f64> {
        self.cells.iter()
            .find(|(k, y, _)| k == key && *y == year)
            .map(|(_, _, value)| *value)
    }
}
