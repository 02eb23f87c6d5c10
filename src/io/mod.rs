//! Format-specific reading and writing.
//!
//! - `csv` - tabular inputs and outputs, read as text
//! - `shp` - GADM and IR polygon shapefiles
//! - `geojson` - FeatureCollection export
//! - `csr` - sparse incidence matrices
//! - `bundle` - the array bundle directory with its manifest
//! - `population` - per-year population tables

pub mod bundle;
pub mod csr;
pub mod csv;
pub mod fs;
pub mod geojson;
pub mod population;
pub mod shp;
