use std::sync::Arc;

use ndarray::{Array1, Array2};

use crate::{
    classify::RelationSet,
    error::LinkError,
    index::EntityRegistry,
    keys::Adm2Key,
};
use super::{
    arrays::{population_matrix, Incidence},
    population::PopulationTable,
};

/// The assembled array dataset. Every per-entity vector is aligned with the
/// corresponding index space of the registry it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayBundle {
    pub years: Vec<i32>,
    /// [adm2, year], `MISSING` where unknown.
    pub population: Array2<f64>,
    /// [adm2] -> adm1 index.
    pub adm2_to_adm1: Array1<i32>,
    /// [agglomid, adm2].
    pub ir_to_adm2: Incidence,

    pub iso: Vec<String>,
    pub adm2_id1: Vec<i64>,
    pub adm2_id2: Vec<i64>,
    pub adm2_name: Vec<String>,
    pub adm1_name: Vec<String>,
    pub ir_id: Vec<i64>,
    pub ir_region_key: Vec<String>,
}

impl ArrayBundle {
    #[inline] pub fn adm2_count(&self) -> usize { self.iso.len() }

    #[inline] pub fn adm1_count(&self) -> usize { self.adm1_name.len() }

    #[inline] pub fn year_count(&self) -> usize { self.years.len() }

    #[inline] pub fn ir_count(&self) -> usize { self.ir_id.len() }

    /// Check that every array agrees with the four dimensions.
    pub fn validate(&self) -> Result<(), LinkError> {
        let (n2, n1, ny, ni) = (self.adm2_count(), self.adm1_count(), self.year_count(), self.ir_count());
        let bad = |what: &str| Err(LinkError::IndexResolution {
            ir: "-".to_string(),
            adm2: "-".to_string(),
            detail: format!("{what} does not match dimensions adm2={n2} adm1={n1} year={ny} agglomid={ni}"),
        });

        if self.population.dim() != (n2, ny) { return bad("population") }
        if self.adm2_to_adm1.len() != n2 { return bad("adm2_to_adm1") }
        if self.adm2_to_adm1.iter().any(|&p| p < 0 || p as usize >= n1) { return bad("adm2_to_adm1 value") }
        if self.ir_to_adm2.shape() != (ni, n2) { return bad("ir_to_adm2") }
        if self.adm2_id1.len() != n2 || self.adm2_id2.len() != n2 || self.adm2_name.len() != n2 {
            return bad("adm2 metadata");
        }
        if self.ir_region_key.len() != ni { return bad("region_key") }
        Ok(())
    }
}

/// A bundle plus the relations that could not be placed in it.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub bundle: ArrayBundle,
    pub dropped: Vec<LinkError>,
}

/// Build all arrays from the registry, the aggregated population and the cleaned relations.
pub fn assemble(
    registry: &EntityRegistry,
    population: &PopulationTable,
    relations: &RelationSet,
) -> Result<Assembly, LinkError> {
    let matrix = population_matrix(registry, &population.years, population.cells())?;
    let (incidence, dropped) = Incidence::from_relations(registry, relations.relations());

    let text = |values: &[Option<Arc<str>>]| -> Vec<String> {
        values.iter().map(|v| v.as_deref().unwrap_or_default().to_string()).collect()
    };
    let adm2_keys = registry.adm2.keys();

    let bundle = ArrayBundle {
        years: population.years.clone(),
        population: matrix,
        adm2_to_adm1: parent_indices(adm2_keys, &registry.adm2_parent)?,
        ir_to_adm2: incidence,
        iso: adm2_keys.iter().map(|k| k.iso.to_string()).collect(),
        adm2_id1: adm2_keys.iter().map(|k| k.adm1).collect(),
        adm2_id2: adm2_keys.iter().map(|k| k.adm2).collect(),
        adm2_name: text(&registry.adm2_names),
        adm1_name: text(&registry.adm1_names),
        ir_id: registry.ir.keys().iter().map(|ir| ir.0).collect(),
        ir_region_key: text(&registry.ir_region_keys),
    };
    bundle.validate()?;

    Ok(Assembly { bundle, dropped })
}

/// Parent pointers in the stored `i32` form. An ADM1 index past `i32::MAX`
/// cannot be represented and is reported against its ADM2.
fn parent_indices(adm2: &[Adm2Key], parents: &[u32]) -> Result<Array1<i32>, LinkError> {
    adm2.iter().zip(parents)
        .map(|(key, &parent)| {
            i32::try_from(parent).map_err(|_| LinkError::OrphanEntity {
                adm2: key.to_string(),
                adm1: format!("index {parent} (beyond i32 range)"),
            })
        })
        .collect()
}
