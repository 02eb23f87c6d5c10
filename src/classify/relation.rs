use std::{collections::BTreeSet, sync::Arc};

use ahash::{AHashMap, AHashSet};

use crate::{
    hierarchy::LinkTable,
    keys::{Adm1Key, Adm2Key, AdmAttrs, IrId, Iso},
};

/// A distinct (IR, ADM2) edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    pub ir: IrId,
    pub adm2: Adm2Key,
}

/// An IR whose ADM2 members fall in more than one ADM1.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblematicIr {
    pub ir: IrId,
    pub region_key: Option<Arc<str>>,
    pub countries: Vec<Iso>,
    pub adm1: Vec<Adm1Key>,
}

/// The cleaned IR to ADM2 relation set: matched links only, deduplicated,
/// with IRs spanning several ADM1 units removed and reported.
#[derive(Debug, Clone, Default)]
pub struct RelationSet {
    relations: Vec<Relation>,
    attrs: AHashMap<Adm2Key, AdmAttrs>,
    region_keys: AHashMap<IrId, Option<Arc<str>>>,
    pub problematic: Vec<ProblematicIr>,
    /// Link rows dropped because their object id had no GADM match.
    pub unmatched: usize,
}

impl RelationSet {
    pub fn from_links(links: &LinkTable) -> Self {
        let mut set = RelationSet::default();

        // ADM1 span per IR, in encounter order of IRs.
        let mut ir_order: Vec<IrId> = Vec::new();
        let mut spans: AHashMap<IrId, (BTreeSet<Adm1Key>, BTreeSet<Iso>)> = AHashMap::new();
        for (row, adm) in links.matched() {
            let span = spans.entry(row.ir).or_insert_with(|| {
                ir_order.push(row.ir);
                Default::default()
            });
            span.0.insert(adm.key.parent());
            span.1.insert(adm.key.iso.clone());
        }

        let problematic = ir_order.iter()
            .filter(|ir| spans[*ir].0.len() > 1)
            .copied()
            .collect::<AHashSet<_>>();

        let mut seen: AHashSet<Relation> = AHashSet::new();
        for row in &links.rows {
            let Some(adm) = &row.adm else {
                set.unmatched += 1;
                continue;
            };
            set.region_keys.entry(row.ir).or_insert_with(|| row.region_key.clone());
            if problematic.contains(&row.ir) { continue }

            set.attrs.entry(adm.key.clone()).or_insert_with(|| adm.clone());
            let relation = Relation { ir: row.ir, adm2: adm.key.clone() };
            if seen.insert(relation.clone()) {
                set.relations.push(relation);
            }
        }

        set.problematic = ir_order.iter()
            .filter(|ir| problematic.contains(*ir))
            .map(|ir| {
                let (adm1, countries) = &spans[ir];
                ProblematicIr {
                    ir: *ir,
                    region_key: set.region_keys.get(ir).cloned().flatten(),
                    countries: countries.iter().cloned().collect(),
                    adm1: adm1.iter().cloned().collect(),
                }
            })
            .collect();
        set.region_keys.retain(|ir, _| !problematic.contains(ir));

        set
    }

    /// Restrict relations and the problematic report to the given countries.
    pub fn retain_countries(&self, countries: &[Iso]) -> Self {
        let relations = self.relations.iter()
            .filter(|rel| countries.contains(&rel.adm2.iso))
            .cloned()
            .collect::<Vec<_>>();
        let irs = relations.iter().map(|rel| rel.ir).collect::<AHashSet<_>>();

        Self {
            attrs: self.attrs.iter()
                .filter(|(key, _)| countries.contains(&key.iso))
                .map(|(key, attrs)| (key.clone(), attrs.clone()))
                .collect(),
            region_keys: self.region_keys.iter()
                .filter(|(ir, _)| irs.contains(*ir))
                .map(|(ir, key)| (*ir, key.clone()))
                .collect(),
            problematic: self.problematic.iter()
                .filter(|p| p.countries.iter().any(|iso| countries.contains(iso)))
                .cloned()
                .collect(),
            unmatched: self.unmatched,
            relations,
        }
    }

    #[inline] pub fn relations(&self) -> &[Relation] { &self.relations }

    #[inline] pub fn len(&self) -> usize { self.relations.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.relations.is_empty() }

    /// ADM attributes as first seen in the link table.
    pub fn attrs(&self, key: &Adm2Key) -> Option<&AdmAttrs> { self.attrs.get(key) }

    /// Distinct IRs of the cleaned set with their region keys, in encounter order.
    pub fn irs(&self) -> Vec<(IrId, Option<Arc<str>>)> {
        let mut seen = AHashSet::new();
        self.relations.iter()
            .filter(|rel| seen.insert(rel.ir))
            .map(|rel| (rel.ir, self.region_keys.get(&rel.ir).cloned().flatten()))
            .collect()
    }

    pub fn is_problematic(&self, ir: IrId) -> bool {
        self.problematic.iter().any(|p| p.ir == ir)
    }
}
