mod key;
mod normalize;
mod schema;

pub use key::{parse_integral, Adm1Key, Adm2Key, AdmAttrs, IrId, Iso, ObjectId};
pub use normalize::{
    normalize_gadm, normalize_hierarchy, normalize_population,
    GadmRecord, HierarchyRecord, Normalized, PopulationRecord, TableReader,
};
pub use schema::{ColumnSpec, Field, ResolvedSchema, GADM_SHAPES, GADM_TABLE, HIERARCHY_TABLE, IR_SHAPES, LINK_TABLE, POPULATION_TABLE, RASTER_SAMPLES};
