mod arrays;
mod bundle;
mod population;

pub use arrays::{population_matrix, Incidence, MISSING};
pub use bundle::{assemble, ArrayBundle, Assembly};
pub use population::{DuplicatePolicy, PopulationTable};
