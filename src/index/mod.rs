mod entity;
mod registry;

pub use entity::EntityIndex;
pub use registry::{parent_pointers, EntityRegistry};
