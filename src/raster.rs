use anyhow::{ensure, Result};
use geo::{BoundingRect, Contains, MultiPolygon, Point};
use polars::prelude::*;
use rstar::{primitives::GeomWithData, RTree, AABB};

use crate::{
    geom::GadmLayer,
    keys::{Field, PopulationRecord, TableReader, RASTER_SAMPLES},
};

/// Per-polygon raster sum. `None` when no raster cell falls inside the polygon.
pub trait ZonalStats {
    fn zonal_sum(&self, shape: &MultiPolygon<f64>) -> Option<f64>;
}

type Cell = GeomWithData<[f64; 2], f64>;

/// A raster given as cell-centre samples. A cell counts towards a polygon
/// when its centre lies strictly inside it.
#[derive(Debug, Clone)]
pub struct GridRaster {
    cells: RTree<Cell>,
}

impl GridRaster {
    /// Build from (x, y, value) samples. Non-finite values are treated as nodata.
    pub fn new(samples: impl IntoIterator<Item = (f64, f64, f64)>) -> Self {
        let cells = samples.into_iter()
            .filter(|(x, y, v)| x.is_finite() && y.is_finite() && v.is_finite())
            .map(|(x, y, v)| Cell::new([x, y], v))
            .collect::<Vec<_>>();
        Self { cells: RTree::bulk_load(cells) }
    }

    /// Read samples from a table with `x`, `y` and `value` columns (or their synonyms).
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let reader = TableReader::new("raster", df, RASTER_SAMPLES)?;
        let samples = (0..reader.height())
            .filter_map(|row| Some((
                reader.float(Field::SampleX, row)?,
                reader.float(Field::SampleY, row)?,
                reader.float(Field::Population, row)?,
            )))
            .collect::<Vec<_>>();
        ensure!(!samples.is_empty(), "[raster] no valid samples in {} rows", df.height());
        Ok(Self::new(samples))
    }

    #[inline] pub fn len(&self) -> usize { self.cells.size() }

    #[inline] pub fn is_empty(&self) -> bool { self.cells.size() == 0 }
}

impl ZonalStats for GridRaster {
    fn zonal_sum(&self, shape: &MultiPolygon<f64>) -> Option<f64> {
        let rect = shape.bounding_rect()?;
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        self.cells.locate_in_envelope_intersecting(&envelope)
            .filter(|cell| {
                let [x, y] = *cell.geom();
                shape.contains(&Point::new(x, y))
            })
            .map(|cell| cell.data)
            .reduce(|a, b| a + b)
    }
}

/// One population record per GADM feature. Features sharing an ADM2 key each
/// produce a row; they are summed when the table is aggregated.
pub fn extract_population<Z: ZonalStats>(gadm: &GadmLayer, raster: &Z, year: i32, verbose: u8) -> Vec<PopulationRecord> {
    let records = gadm.iter()
        .map(|(attrs, shape)| PopulationRecord {
            attrs: attrs.clone(),
            year,
            value: raster.zonal_sum(shape),
        })
        .collect::<Vec<_>>();

    if verbose > 0 {
        let empty = records.iter().filter(|r| r.value.is_none()).count();
        eprintln!("[population] {year}: {} ADM2 features, {empty} without raster cells", records.len());
    }
    records
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;
    use crate::{geom::rect, keys::{Adm2Key, AdmAttrs, Iso}};

    /// Unit cells centred on the half-integers of a 4x2 grid, each worth 1.
    fn grid() -> GridRaster {
        let samples = (0..4).flat_map(|i| (0..2).map(move |j| (i as f64 + 0.5, j as f64 + 0.5, 1.0)));
        GridRaster::new(samples)
    }

    #[test]
    fn sums_cells_whose_centres_fall_inside() {
        let raster = grid();
        assert_eq!(raster.len(), 8);
        assert_eq!(raster.zonal_sum(&rect(0.0, 0.0, 2.0, 2.0)), Some(4.0));
        assert_eq!(raster.zonal_sum(&rect(0.0, 0.0, 4.0, 1.0)), Some(4.0));
        assert_eq!(raster.zonal_sum(&rect(10.0, 10.0, 11.0, 11.0)), None);
        assert_eq!(raster.zonal_sum(&MultiPolygon(vec![])), None);
    }

    #[test]
    fn split_features_produce_separate_rows() {
        let attrs = AdmAttrs {
            key: Adm2Key::new(Iso::new("CHN").unwrap(), 3, 4),
            adm1_name: None,
            adm2_name: None,
        };
        let mut gadm = GadmLayer::new();
        gadm.push(attrs.clone(), rect(0.0, 0.0, 1.0, 2.0));
        gadm.push(attrs, rect(1.0, 0.0, 3.0, 2.0));

        let records = extract_population(&gadm, &grid(), 2020, 0);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value, Some(2.0));
        assert_eq!(records[1].value, Some(4.0));
        assert!(records.iter().all(|r| r.year == 2020));
    }

    #[test]
    fn reads_samples_with_synonym_columns() {
        let df = df![
            "lon" => [0.5, 1.5, 2.5],
            "lat" => [0.5, 0.5, 0.5],
            "population" => [Some(3.0), None, Some(4.0)],
        ].unwrap();
        let raster = GridRaster::from_dataframe(&df).unwrap();
        assert_eq!(raster.len(), 2);
        assert_eq!(raster.zonal_sum(&rect(0.0, 0.0, 3.0, 1.0)), Some(7.0));
    }
}
