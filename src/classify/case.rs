use std::collections::BTreeMap;

use geo::MultiPolygon;
use smallvec::SmallVec;

use crate::{
    error::LinkError,
    keys::{Adm2Key, AdmAttrs, IrId, Iso},
};

/// How an ADM2's output geometry relates to the IRs covering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Case {
    /// A single IR relates to this ADM2; the IR polygon is used.
    IrEqualsAdm2,
    /// An IR relating to this ADM2 also relates to others; the GADM polygon is used.
    IrSpansAdm2s,
    /// Several single-ADM2 IRs relate to this ADM2; their union is used.
    Adm2SpansIrs,
    /// No IR relates to this ADM2; the GADM polygon is used.
    NoIr,
}

impl Case {
    pub const ALL: [Case; 4] = [Case::IrEqualsAdm2, Case::IrSpansAdm2s, Case::Adm2SpansIrs, Case::NoIr];

    pub fn number(&self) -> u8 {
        match self {
            Case::IrEqualsAdm2 => 1,
            Case::IrSpansAdm2s => 2,
            Case::Adm2SpansIrs => 3,
            Case::NoIr => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Case::IrEqualsAdm2 => "Case 1: IR = ADM2",
            Case::IrSpansAdm2s => "Case 2: IR covers multiple ADM2s",
            Case::Adm2SpansIrs => "Case 3: ADM2 = multiple IRs",
            Case::NoIr => "Case 4: ADM2 with no IR assigned",
        }
    }

    pub fn geometry_source(&self) -> GeometrySource {
        match self {
            Case::IrEqualsAdm2 => GeometrySource::Ir,
            Case::IrSpansAdm2s => GeometrySource::Gadm,
            Case::Adm2SpansIrs => GeometrySource::IrUnion,
            Case::NoIr => GeometrySource::GadmFallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometrySource {
    Ir,
    Gadm,
    IrUnion,
    GadmFallback,
}

impl GeometrySource {
    pub fn label(&self) -> &'static str {
        match self {
            GeometrySource::Ir => "IR",
            GeometrySource::Gadm => "GADM",
            GeometrySource::IrUnion => "IR union",
            GeometrySource::GadmFallback => "GADM fallback",
        }
    }
}

/// IRs contributing to one ADM2; almost always a handful.
pub type IrList = SmallVec<[IrId; 4]>;

/// One ADM2 with its reconciled geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedAdm2 {
    pub attrs: AdmAttrs,
    pub case: Case,
    pub irs: IrList,
    pub geometry: MultiPolygon<f64>,
}

/// An ADM2 whose case produced no geometry. Excluded from the main output.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingGeometry {
    pub attrs: AdmAttrs,
    pub case: Case,
    pub irs: IrList,
    pub error: LinkError,
}

/// Result of partitioning ADM2s into cases.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub adm2: Vec<ClassifiedAdm2>,
    pub missing: Vec<MissingGeometry>,
    /// ADM2s that qualified for more than one case; only the first was kept.
    pub duplicates_dropped: usize,
}

impl Classification {
    pub fn get(&self, key: &Adm2Key) -> Option<&ClassifiedAdm2> {
        self.adm2.iter().find(|c| &c.attrs.key == key)
    }

    /// Number of ADM2s per case, indexed by `Case::number() - 1`.
    pub fn counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for c in &self.adm2 {
            counts[(c.case.number() - 1) as usize] += 1;
        }
        counts
    }

    /// Classified ADM2s grouped by country, in classification order within each.
    pub fn by_country(&self) -> BTreeMap<Iso, Vec<&ClassifiedAdm2>> {
        let mut groups: BTreeMap<Iso, Vec<&ClassifiedAdm2>> = BTreeMap::new();
        for c in &self.adm2 {
            groups.entry(c.attrs.key.iso.clone()).or_default().push(c);
        }
        groups
    }
}
