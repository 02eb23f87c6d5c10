mod convert;
mod store;

pub use convert::{is_empty_geometry, shape_to_multipolygon, union_all};
pub use store::{GadmLayer, GeometryLookup, GeometryStore, IrFeature, IrLayer};

#[cfg(test)]
pub(crate) use convert::rect;
