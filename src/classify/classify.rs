use ahash::{AHashMap, AHashSet};
use geo::MultiPolygon;

use crate::{
    error::LinkError,
    geom::{is_empty_geometry, union_all, GadmLayer, GeometryLookup},
    keys::{Adm2Key, AdmAttrs, IrId},
};
use super::{
    case::{Case, Classification, ClassifiedAdm2, IrList, MissingGeometry},
    relation::RelationSet,
};

/// Partition ADM2 units into the four geometry cases.
///
/// Candidates are produced in the order Case 1, Case 2, Case 3, and an ADM2
/// keeps the first case whose geometry resolves; later candidates for it are
/// counted in `duplicates_dropped`. An ADM2 qualifying for both Case 2 and
/// Case 3 is only offered to Case 2. Every ADM2 of the GADM layer left
/// unplaced afterwards becomes Case 4.
pub fn classify<L>(relations: &RelationSet, irs: &L, gadm: &GadmLayer) -> Classification
where
    L: GeometryLookup<IrId>,
{
    // Adjacency in encounter order; relations are already distinct pairs.
    let mut adm2_order: Vec<&Adm2Key> = Vec::new();
    let mut irs_of: AHashMap<&Adm2Key, IrList> = AHashMap::new();
    let mut adm2_count: AHashMap<IrId, usize> = AHashMap::new();
    for rel in relations.relations() {
        irs_of.entry(&rel.adm2)
            .or_insert_with(|| { adm2_order.push(&rel.adm2); IrList::new() })
            .push(rel.ir);
        *adm2_count.entry(rel.ir).or_default() += 1;
    }

    let spans_many = |ir: &IrId| adm2_count.get(ir).is_some_and(|&n| n > 1);

    let case1 = adm2_order.iter()
        .filter(|key| irs_of[*key].len() == 1)
        .map(|&key| (Case::IrEqualsAdm2, key));
    let case2 = adm2_order.iter()
        .filter(|key| irs_of[*key].iter().any(spans_many))
        .map(|&key| (Case::IrSpansAdm2s, key))
        .collect::<Vec<_>>();
    let in_case2 = case2.iter().map(|(_, key)| *key).collect::<AHashSet<_>>();
    let case3 = adm2_order.iter()
        .filter(|key| irs_of[*key].len() > 1 && !in_case2.contains(*key))
        .map(|&key| (Case::Adm2SpansIrs, key));

    let mut out = Classification::default();
    let mut placed: AHashSet<Adm2Key> = AHashSet::new();

    for (case, key) in case1.chain(case2.iter().copied()).chain(case3) {
        if placed.contains(key) {
            out.duplicates_dropped += 1;
            continue;
        }
        let contributors = &irs_of[key];
        let attrs = relations.attrs(key).cloned().unwrap_or_else(|| bare_attrs(key));

        match resolve_geometry(case, key, contributors, irs, gadm) {
            Ok(geometry) => {
                placed.insert(key.clone());
                out.adm2.push(ClassifiedAdm2 { attrs, case, irs: contributors.clone(), geometry });
            }
            Err(error) => out.missing.push(MissingGeometry { attrs, case, irs: contributors.clone(), error }),
        }
    }

    // Case 4 fallback over the base layer; repeated GADM keys resolve to the first feature.
    let mut seen: AHashSet<&Adm2Key> = AHashSet::new();
    for attrs in gadm.attrs() {
        if !seen.insert(&attrs.key) || placed.contains(&attrs.key) { continue }
        let attrs = attrs.clone();

        match resolve_geometry(Case::NoIr, &attrs.key, &[], irs, gadm) {
            Ok(geometry) => {
                placed.insert(attrs.key.clone());
                out.adm2.push(ClassifiedAdm2 { attrs, case: Case::NoIr, irs: IrList::new(), geometry });
            }
            Err(error) => out.missing.push(MissingGeometry { attrs, case: Case::NoIr, irs: IrList::new(), error }),
        }
    }

    out
}

fn resolve_geometry<L: GeometryLookup<IrId>>(
    case: Case,
    key: &Adm2Key,
    contributors: &[IrId],
    irs: &L,
    gadm: &GadmLayer,
) -> Result<MultiPolygon<f64>, LinkError> {
    let empty = |detail: String| LinkError::EmptyGeometry { adm2: key.to_string(), detail };

    match case {
        Case::IrEqualsAdm2 => {
            let ir = contributors[0];
            irs.geometry(&ir).cloned()
                .ok_or_else(|| empty(format!("IR {ir} has no polygon")))
        }
        Case::IrSpansAdm2s | Case::NoIr => {
            gadm.geometry(key).cloned()
                .ok_or_else(|| empty("no GADM polygon".to_string()))
        }
        Case::Adm2SpansIrs => {
            let union = union_all(contributors.iter().filter_map(|ir| irs.geometry(ir)));
            if is_empty_geometry(&union) {
                let ids = contributors.iter().map(IrId::to_string).collect::<Vec<_>>();
                return Err(empty(format!("union of IRs [{}] is empty", ids.join(", "))));
            }
            Ok(union)
        }
    }
}

fn bare_attrs(key: &Adm2Key) -> AdmAttrs {
    AdmAttrs { key: key.clone(), adm1_name: None, adm2_name: None }
}

#[cfg(test)]
mod tests {
    use geo::Area;

    use super::*;
    use crate::{
        geom::{rect, GeometryStore},
        hierarchy::{LinkRow, LinkTable},
        keys::{Iso, ObjectId},
    };

    fn key(adm1: i64, adm2: i64) -> Adm2Key {
        Adm2Key::new(Iso::new("USA").unwrap(), adm1, adm2)
    }

    fn attrs(adm1: i64, adm2: i64) -> AdmAttrs {
        AdmAttrs { key: key(adm1, adm2), adm1_name: None, adm2_name: None }
    }

    fn relations(pairs: &[(i64, (i64, i64))]) -> RelationSet {
        let rows = pairs.iter()
            .map(|&(ir, (adm1, adm2))| LinkRow {
                ir: IrId(ir),
                region_key: None,
                object_id: ObjectId(adm2),
                adm: Some(attrs(adm1, adm2)),
            })
            .collect();
        RelationSet::from_links(&LinkTable { rows, ..Default::default() })
    }

    /// ADM2s 1..=6 in ADM1 1, one unit square each along the x axis.
    fn gadm() -> GadmLayer {
        let mut layer = GadmLayer::new();
        for adm2 in 1..=6 {
            let x = adm2 as f64;
            layer.push(attrs(1, adm2), rect(x, 0.0, x + 1.0, 1.0));
        }
        layer
    }

    fn ir_shapes(ids: &[i64]) -> GeometryStore<IrId> {
        let mut store = GeometryStore::new();
        for &ir in ids {
            let x = 10.0 * ir as f64;
            store.push(IrId(ir), rect(x, 0.0, x + 1.0, 1.0));
        }
        store
    }

    // IR 1 -> ADM2 1          Case 1
    // IR 2 -> ADM2 2, 3       ADM2 2 is Case 1 (and a dropped Case 2 candidate)
    // IR 3 -> ADM2 3          ADM2 3 is Case 2, never Case 3
    // IR 4, 5 -> ADM2 4       Case 3
    // ADM2 5, 6               Case 4
    fn fixture() -> RelationSet {
        relations(&[
            (1, (1, 1)),
            (2, (1, 2)),
            (2, (1, 3)),
            (3, (1, 3)),
            (4, (1, 4)),
            (5, (1, 4)),
        ])
    }

    #[test]
    fn four_cases_partition_the_gadm_layer() {
        let out = classify(&fixture(), &ir_shapes(&[1, 2, 3, 4, 5]), &gadm());

        assert_eq!(out.adm2.len(), 6);
        assert!(out.missing.is_empty());
        assert_eq!(out.counts(), [2, 1, 1, 2]);
        assert_eq!(out.duplicates_dropped, 1);

        for adm2 in 1..=6 {
            let hits = out.adm2.iter().filter(|c| c.attrs.key == key(1, adm2)).count();
            assert_eq!(hits, 1, "ADM2 {adm2} classified {hits} times");
        }

        let case = |adm2| out.get(&key(1, adm2)).unwrap().case;
        assert_eq!(case(1), Case::IrEqualsAdm2);
        assert_eq!(case(2), Case::IrEqualsAdm2);
        assert_eq!(case(3), Case::IrSpansAdm2s);
        assert_eq!(case(4), Case::Adm2SpansIrs);
        assert_eq!(case(5), Case::NoIr);
        assert_eq!(case(6), Case::NoIr);
    }

    #[test]
    fn geometry_follows_the_case() {
        let out = classify(&fixture(), &ir_shapes(&[1, 2, 3, 4, 5]), &gadm());

        assert_eq!(out.get(&key(1, 1)).unwrap().geometry, rect(10.0, 0.0, 11.0, 1.0));
        assert_eq!(out.get(&key(1, 3)).unwrap().geometry, rect(3.0, 0.0, 4.0, 1.0));
        assert_eq!(out.get(&key(1, 6)).unwrap().geometry, rect(6.0, 0.0, 7.0, 1.0));

        let union = &out.get(&key(1, 4)).unwrap().geometry;
        assert!((union.unsigned_area() - 2.0).abs() < 1e-9);
        assert_eq!(out.get(&key(1, 4)).unwrap().irs.as_slice(), &[IrId(4), IrId(5)]);
        assert!(out.get(&key(1, 5)).unwrap().irs.is_empty());
    }

    #[test]
    fn case_two_takes_priority_over_case_three() {
        let out = classify(&fixture(), &ir_shapes(&[1, 2, 3, 4, 5]), &gadm());
        let adm2 = out.get(&key(1, 3)).unwrap();
        assert_eq!(adm2.case, Case::IrSpansAdm2s);
        assert_eq!(adm2.case.geometry_source().label(), "GADM");
        assert_eq!(adm2.irs.as_slice(), &[IrId(2), IrId(3)]);
    }

    #[test]
    fn problematic_ir_is_excluded_everywhere() {
        let set = relations(&[(1, (1, 1)), (9, (1, 5)), (9, (2, 7)), (4, (1, 4))]);
        assert!(set.is_problematic(IrId(9)));

        let out = classify(&set, &ir_shapes(&[1, 4, 9]), &gadm());
        assert!(out.adm2.iter().all(|c| !c.irs.contains(&IrId(9))));
        assert_eq!(out.get(&key(1, 5)).unwrap().case, Case::NoIr);
        assert!(out.get(&key(2, 7)).is_none());
    }

    #[test]
    fn empty_union_is_reported_and_falls_back() {
        let out = classify(&fixture(), &ir_shapes(&[1, 2, 3]), &gadm());

        assert_eq!(out.missing.len(), 1);
        let missing = &out.missing[0];
        assert_eq!(missing.case, Case::Adm2SpansIrs);
        assert_eq!(missing.attrs.key, key(1, 4));
        assert!(matches!(&missing.error, LinkError::EmptyGeometry { adm2, .. } if adm2 == "USA_1_4"));

        let fallback = out.get(&key(1, 4)).unwrap();
        assert_eq!(fallback.case, Case::NoIr);
        assert_eq!(fallback.geometry, rect(4.0, 0.0, 5.0, 1.0));
    }

    #[test]
    fn missing_ir_polygon_lets_a_later_case_win() {
        // IR 2 has no polygon: ADM2 2 fails Case 1 and is picked up by Case 2.
        let out = classify(&fixture(), &ir_shapes(&[1, 3, 4, 5]), &gadm());

        assert_eq!(out.missing.len(), 1);
        assert_eq!(out.missing[0].case, Case::IrEqualsAdm2);
        assert_eq!(out.get(&key(1, 2)).unwrap().case, Case::IrSpansAdm2s);
        assert_eq!(out.duplicates_dropped, 0);
    }

    #[test]
    fn related_adm2_outside_the_layer_is_missing_not_fallback() {
        let set = relations(&[(1, (3, 30)), (1, (3, 31)), (2, (3, 31))]);
        let out = classify(&set, &ir_shapes(&[1, 2]), &GadmLayer::new());

        assert_eq!(out.adm2.len(), 1);
        assert_eq!(out.get(&key(3, 30)).unwrap().case, Case::IrEqualsAdm2);
        assert_eq!(out.missing.len(), 1);
        assert_eq!(out.missing[0].attrs.key, key(3, 31));
        assert_eq!(out.missing[0].case, Case::IrSpansAdm2s);
        assert_eq!(out.duplicates_dropped, 1);
    }
}
