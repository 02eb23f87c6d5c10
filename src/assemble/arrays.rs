use ndarray::Array2;

use crate::{
    classify::Relation,
    error::LinkError,
    index::EntityRegistry,
    keys::Adm2Key,
};

/// Marks an (ADM2, year) cell with no known population. Distinct from zero.
pub const MISSING: f64 = f64::NAN;

/// Dense [ADM2 x year] population matrix, initialized to `MISSING`.
///
/// A second write to a cell with a different value is a `DuplicateAssignment`;
/// repeating the same value is accepted.
pub fn population_matrix<'a>(
    registry: &EntityRegistry,
    years: &[i32],
    cells: impl IntoIterator<Item = (&'a Adm2Key, i32, f64)>,
) -> Result<Array2<f64>, LinkError> {
    let mut matrix = Array2::from_elem((registry.adm2.len(), years.len()), MISSING);

    for (key, year, value) in cells {
        let unresolved = |detail: &str| LinkError::IndexResolution {
            ir: "-".to_string(),
            adm2: key.to_string(),
            detail: detail.to_string(),
        };
        let i = registry.adm2.get(key).ok_or_else(|| unresolved("population row for an unindexed ADM2"))?;
        let j = years.iter().position(|&y| y == year)
            .ok_or_else(|| unresolved(&format!("year {year} is not in the year axis")))?;

        let cell = &mut matrix[[i as usize, j]];
        if !cell.is_nan() && *cell != value {
            return Err(LinkError::DuplicateAssignment {
                entity: key.to_string(),
                year,
                existing: *cell,
                incoming: value,
            });
        }
        *cell = value;
    }

    Ok(matrix)
}

/// Binary [IR x ADM2] incidence, stored as sorted column lists per IR row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incidence {
    cols: usize,
    rows: Vec<Vec<u32>>,
}

impl Incidence {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { cols, rows: vec![Vec::new(); rows] }
    }

    /// Rebuild from per-row column lists, validating bounds and order.
    pub fn from_rows(cols: usize, rows: Vec<Vec<u32>>) -> Result<Self, LinkError> {
        for (i, row) in rows.iter().enumerate() {
            let sorted = row.windows(2).all(|w| w[0] < w[1]);
            let in_range = row.iter().all(|&j| (j as usize) < cols);
            if !sorted || !in_range {
                return Err(LinkError::IndexResolution {
                    ir: i.to_string(),
                    adm2: format!("{row:?}"),
                    detail: format!("row is unsorted or exceeds {cols} columns"),
                });
            }
        }
        Ok(Self { cols, rows })
    }

    /// Set relations that resolve in the registry. Unresolved relations are
    /// returned and leave the matrix untouched.
    pub fn from_relations(registry: &EntityRegistry, relations: &[Relation]) -> (Self, Vec<LinkError>) {
        let mut incidence = Self::new(registry.ir.len(), registry.adm2.len());
        let mut dropped = Vec::new();

        for relation in relations {
            match registry.resolve(relation).and_then(|(i, j)| incidence.set(i, j)) {
                Ok(()) => {}
                Err(err) => dropped.push(err),
            }
        }
        (incidence, dropped)
    }

    pub fn set(&mut self, ir: u32, adm2: u32) -> Result<(), LinkError> {
        let (rows, cols) = self.shape();
        if ir as usize >= rows || adm2 as usize >= cols {
            return Err(LinkError::IndexResolution {
                ir: ir.to_string(),
                adm2: adm2.to_string(),
                detail: format!("outside a {rows}x{cols} matrix"),
            });
        }
        let row = &mut self.rows[ir as usize];
        if let Err(pos) = row.binary_search(&adm2) {
            row.insert(pos, adm2);
        }
        Ok(())
    }

    pub fn contains(&self, ir: u32, adm2: u32) -> bool {
        self.rows.get(ir as usize).is_some_and(|row| row.binary_search(&adm2).is_ok())
    }

    #[inline] pub fn shape(&self) -> (usize, usize) { (self.rows.len(), self.cols) }

    #[inline] pub fn rows(&self) -> &[Vec<u32>] { &self.rows }

    pub fn nnz(&self) -> usize { self.rows.iter().map(Vec::len).sum() }

    /// Number of ADM2s each IR relates to.
    pub fn row_sums(&self) -> Vec<u32> {
        self.rows.iter().map(|row| row.len() as u32).collect()
    }

    pub fn dense(&self) -> Array2<u8> {
        let mut dense = Array2::zeros(self.shape());
        for (i, row) in self.rows.iter().enumerate() {
            for &j in row {
                dense[[i, j as usize]] = 1;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{AdmAttrs, IrId, Iso};

    fn registry() -> EntityRegistry {
        let attrs = (1..=3)
            .map(|adm2| AdmAttrs {
                key: Adm2Key::new(Iso::new("COL").unwrap(), 1, adm2),
                adm1_name: None,
                adm2_name: None,
            })
            .collect::<Vec<_>>();
        EntityRegistry::build(&attrs, [(IrId(1), None), (IrId(2), None)]).unwrap()
    }

    fn key(adm2: i64) -> Adm2Key {
        Adm2Key::new(Iso::new("COL").unwrap(), 1, adm2)
    }

    #[test]
    fn missing_cells_stay_distinct_from_zero() {
        let (k1, k2) = (key(1), key(2));
        let matrix = population_matrix(&registry(), &[2015, 2020], [(&k1, 2020, 0.0), (&k2, 2015, 12.0)]).unwrap();

        assert_eq!(matrix.dim(), (3, 2));
        assert_eq!(matrix[[0, 1]], 0.0);
        assert!(matrix[[0, 0]].is_nan());
        assert_eq!(matrix[[1, 0]], 12.0);
        assert!(matrix.row(2).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn conflicting_cell_writes_are_rejected() {
        let k = key(1);
        let err = population_matrix(&registry(), &[2020], [(&k, 2020, 5.0), (&k, 2020, 6.0)]).unwrap_err();
        assert!(matches!(err, LinkError::DuplicateAssignment { year: 2020, .. }));

        let ok = population_matrix(&registry(), &[2020], [(&k, 2020, 5.0), (&k, 2020, 5.0)]).unwrap();
        assert_eq!(ok[[0, 0]], 5.0);
    }

    #[test]
    fn unknown_year_or_entity_is_an_index_error() {
        let (k1, k9) = (key(1), key(9));
        assert!(matches!(
            population_matrix(&registry(), &[2020], [(&k1, 2021, 1.0)]),
            Err(LinkError::IndexResolution { .. }),
        ));
        assert!(matches!(
            population_matrix(&registry(), &[2020], [(&k9, 2020, 1.0)]),
            Err(LinkError::IndexResolution { .. }),
        ));
    }

    #[test]
    fn incidence_drops_unresolved_relations() {
        let relations = [
            Relation { ir: IrId(1), adm2: key(1) },
            Relation { ir: IrId(1), adm2: key(3) },
            Relation { ir: IrId(2), adm2: key(2) },
            Relation { ir: IrId(2), adm2: key(7) },
            Relation { ir: IrId(5), adm2: key(1) },
        ];
        let (incidence, dropped) = Incidence::from_relations(&registry(), &relations);

        assert_eq!(incidence.shape(), (2, 3));
        assert_eq!(incidence.row_sums(), vec![2, 1]);
        assert_eq!(dropped.len(), 2);
        assert!(incidence.contains(0, 2));
        assert!(!incidence.contains(1, 0));
        assert_eq!(incidence.dense().sum(), 3);
    }

    #[test]
    fn out_of_range_cells_are_refused() {
        let mut incidence = Incidence::new(2, 2);
        assert!(incidence.set(1, 1).is_ok());
        assert!(incidence.set(1, 1).is_ok());
        assert!(incidence.set(2, 0).is_err());
        assert!(incidence.set(0, 2).is_err());
        assert_eq!(incidence.nnz(), 1);

        assert!(Incidence::from_rows(2, vec![vec![1, 0]]).is_err());
        assert!(Incidence::from_rows(2, vec![vec![0, 2]]).is_err());
        assert_eq!(Incidence::from_rows(2, vec![vec![0, 1], vec![]]).unwrap().nnz(), 2);
    }
}
