mod link;
mod stats;

pub use link::{link_hierarchy, LinkRow, LinkTable};
pub use stats::RelationStats;
