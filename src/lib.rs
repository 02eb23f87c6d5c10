#![doc = "Reconciles GADM ADM1/ADM2 regions with Impact Regions and assembles population arrays"]
pub mod assemble;
pub mod classify;
pub mod error;
pub mod export;
pub mod geom;
pub mod hierarchy;
pub mod index;
pub mod io;
pub mod keys;
pub mod pipeline;
pub mod raster;

#[doc(inline)]
pub use assemble::{assemble, ArrayBundle, Assembly, DuplicatePolicy, Incidence, PopulationTable, MISSING};

#[doc(inline)]
pub use classify::{classify, Case, Classification, GeometrySource, RelationSet};

#[doc(inline)]
pub use error::LinkError;

#[doc(inline)]
pub use hierarchy::{link_hierarchy, LinkTable, RelationStats};

#[doc(inline)]
pub use index::{EntityIndex, EntityRegistry};

#[doc(inline)]
pub use pipeline::{run_pipeline, PipelineConfig, RunReport};

#[doc(inline)]
pub use raster::{extract_population, GridRaster, ZonalStats};
