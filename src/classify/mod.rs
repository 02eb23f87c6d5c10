mod case;
mod classify;
mod relation;

pub use case::{Case, Classification, ClassifiedAdm2, GeometrySource, IrList, MissingGeometry};
pub use classify::classify;
pub use relation::{ProblematicIr, Relation, RelationSet};
