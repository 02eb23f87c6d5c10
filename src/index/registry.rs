use std::sync::Arc;

use crate::{
    classify::Relation,
    error::LinkError,
    keys::{Adm1Key, Adm2Key, AdmAttrs, IrId},
};
use super::EntityIndex;

/// Index spaces for the three entity sets, with the metadata carried
/// alongside each index (names, region keys) and the ADM2 -> ADM1 parents.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRegistry {
    pub adm2: EntityIndex<Adm2Key>,
    pub adm1: EntityIndex<Adm1Key>,
    pub ir: EntityIndex<IrId>,
    pub adm2_parent: Vec<u32>,
    pub adm2_names: Vec<Option<Arc<str>>>,
    pub adm1_names: Vec<Option<Arc<str>>>,
    pub ir_region_keys: Vec<Option<Arc<str>>>,
}

impl EntityRegistry {
    /// Assign indices in encounter order. ADM1 units are taken from the ADM2
    /// parents; names are those of the first row carrying each key.
    pub fn build<'a>(
        adm2: impl IntoIterator<Item = &'a AdmAttrs>,
        irs: impl IntoIterator<Item = (IrId, Option<Arc<str>>)>,
    ) -> Result<Self, LinkError> {
        let mut adm2_index = EntityIndex::new();
        let mut adm1_index = EntityIndex::new();
        let (mut adm2_names, mut adm1_names) = (Vec::new(), Vec::new());

        for attrs in adm2 {
            if adm2_index.insert(attrs.key.clone()).1 {
                adm2_names.push(attrs.adm2_name.clone());
            }
            if adm1_index.insert(attrs.key.parent()).1 {
                adm1_names.push(attrs.adm1_name.clone());
            }
        }

        let mut ir_index = EntityIndex::new();
        let mut ir_region_keys = Vec::new();
        for (ir, region_key) in irs {
            if ir_index.insert(ir).1 {
                ir_region_keys.push(region_key);
            }
        }

        Self::from_parts(adm2_index, adm1_index, ir_index, adm2_names, adm1_names, ir_region_keys)
    }

    /// Assemble a registry from prebuilt indices, checking that no space is
    /// empty and that every ADM2 resolves to an ADM1.
    pub fn from_parts(
        adm2: EntityIndex<Adm2Key>,
        adm1: EntityIndex<Adm1Key>,
        ir: EntityIndex<IrId>,
        adm2_names: Vec<Option<Arc<str>>>,
        adm1_names: Vec<Option<Arc<str>>>,
        ir_region_keys: Vec<Option<Arc<str>>>,
    ) -> Result<Self, LinkError> {
        if adm2.is_empty() { return Err(LinkError::EmptyIndexSpace("adm2")) }
        if adm1.is_empty() { return Err(LinkError::EmptyIndexSpace("adm1")) }
        if ir.is_empty() { return Err(LinkError::EmptyIndexSpace("agglomid")) }

        let adm2_parent = parent_pointers(&adm2, &adm1)?;
        Ok(Self { adm2, adm1, ir, adm2_parent, adm2_names, adm1_names, ir_region_keys })
    }

    /// Resolve a relation to its (IR index, ADM2 index) cell.
    pub fn resolve(&self, relation: &Relation) -> Result<(u32, u32), LinkError> {
        let unresolved = |detail: &str| LinkError::IndexResolution {
            ir: relation.ir.to_string(),
            adm2: relation.adm2.to_string(),
            detail: detail.to_string(),
        };
        let ir = self.ir.get(&relation.ir).ok_or_else(|| unresolved("IR not indexed"))?;
        let adm2 = self.adm2.get(&relation.adm2).ok_or_else(|| unresolved("ADM2 not indexed"))?;
        Ok((ir, adm2))
    }
}

/// One ADM1 index per ADM2 index. Fails on the first ADM2 whose parent is not indexed.
pub fn parent_pointers(
    adm2: &EntityIndex<Adm2Key>,
    adm1: &EntityIndex<Adm1Key>,
) -> Result<Vec<u32>, LinkError> {
    adm2.keys().iter()
        .map(|key| {
            let parent = key.parent();
            adm1.get(&parent).ok_or_else(|| LinkError::OrphanEntity {
                adm2: key.to_string(),
                adm1: parent.to_string(),
            })
        })
        .collect()
}
