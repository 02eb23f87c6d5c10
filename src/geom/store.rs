use std::hash::Hash;

use ahash::AHashMap;
use geo::MultiPolygon;
use serde_json::{Map, Value};

use crate::keys::{Adm2Key, AdmAttrs, IrId, Iso};
use super::convert::is_empty_geometry;

/// Read-only geometry lookup by entity key.
pub trait GeometryLookup<K> {
    /// Polygon for `key`, or `None` if absent or empty.
    fn geometry(&self, key: &K) -> Option<&MultiPolygon<f64>>;
}

/// Keyed polygons in source order. Lookups resolve to the first feature carrying a key.
#[derive(Debug, Clone)]
pub struct GeometryStore<K> {
    entries: Vec<(K, MultiPolygon<f64>)>,
    index: AHashMap<K, usize>,
    duplicates: usize,
}

impl<K> Default for GeometryStore<K> {
    fn default() -> Self {
        Self { entries: Vec::new(), index: AHashMap::new(), duplicates: 0 }
    }
}

impl<K: Clone + Eq + Hash> GeometryStore<K> {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, key: K, shape: MultiPolygon<f64>) {
        if self.index.contains_key(&key) {
            self.duplicates += 1;
        } else {
            self.index.insert(key.clone(), self.entries.len());
        }
        self.entries.push((key, shape));
    }

    #[inline] pub fn len(&self) -> usize { self.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Number of features whose key repeats an earlier feature.
    #[inline] pub fn duplicates(&self) -> usize { self.duplicates }

    #[inline] pub fn entries(&self) -> &[(K, MultiPolygon<f64>)] { &self.entries }

    #[inline] pub fn contains(&self, key: &K) -> bool { self.index.contains_key(key) }
}

impl<K: Eq + Hash> GeometryLookup<K> for GeometryStore<K> {
    fn geometry(&self, key: &K) -> Option<&MultiPolygon<f64>> {
        self.index.get(key)
            .map(|&i| &self.entries[i].1)
            .filter(|mp| !is_empty_geometry(mp))
    }
}

/// GADM ADM2 polygons with their attributes; the base ADM2 set for classification.
#[derive(Debug, Clone, Default)]
pub struct GadmLayer {
    attrs: Vec<AdmAttrs>,
    store: GeometryStore<Adm2Key>,
}

impl GadmLayer {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, attrs: AdmAttrs, shape: MultiPolygon<f64>) {
        self.store.push(attrs.key.clone(), shape);
        self.attrs.push(attrs);
    }

    #[inline] pub fn len(&self) -> usize { self.attrs.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.attrs.is_empty() }

    #[inline] pub fn duplicates(&self) -> usize { self.store.duplicates() }

    /// Attributes of every feature, in file order (keys may repeat).
    #[inline] pub fn attrs(&self) -> &[AdmAttrs] { &self.attrs }

    /// Attributes of the first feature carrying `key`.
    pub fn attrs_of(&self, key: &Adm2Key) -> Option<&AdmAttrs> {
        self.store.index.get(key).map(|&i| &self.attrs[i])
    }

    /// Features paired with their polygons, in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&AdmAttrs, &MultiPolygon<f64>)> {
        self.attrs.iter().zip(self.store.entries().iter().map(|(_, shape)| shape))
    }

    /// Keep only features of the given countries.
    pub fn retain_countries(&self, countries: &[Iso]) -> Self {
        let mut layer = Self::new();
        for (attrs, shape) in self.iter() {
            if countries.contains(&attrs.key.iso) {
                layer.push(attrs.clone(), shape.clone());
            }
        }
        layer
    }
}

impl GeometryLookup<Adm2Key> for GadmLayer {
    fn geometry(&self, key: &Adm2Key) -> Option<&MultiPolygon<f64>> { self.store.geometry(key) }
}

/// One IR feature's identifying attributes, plus its raw record for export.
#[derive(Debug, Clone, PartialEq)]
pub struct IrFeature {
    pub ir: IrId,
    pub iso: Option<Iso>,
    pub properties: Map<String, Value>,
}

/// IR polygons with their attributes.
#[derive(Debug, Clone, Default)]
pub struct IrLayer {
    features: Vec<IrFeature>,
    store: GeometryStore<IrId>,
}

impl IrLayer {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, feature: IrFeature, shape: MultiPolygon<f64>) {
        self.store.push(feature.ir, shape);
        self.features.push(feature);
    }

    #[inline] pub fn len(&self) -> usize { self.features.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }

    #[inline] pub fn duplicates(&self) -> usize { self.store.duplicates() }

    /// Features paired with their polygons, in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&IrFeature, &MultiPolygon<f64>)> {
        self.features.iter().zip(self.store.entries().iter().map(|(_, shape)| shape))
    }

    /// Keep only features of the given countries. Features without a country are dropped.
    pub fn retain_countries(&self, countries: &[Iso]) -> Self {
        let mut layer = Self::new();
        for (feature, shape) in self.iter() {
            if feature.iso.as_ref().is_some_and(|iso| countries.contains(iso)) {
                layer.push(feature.clone(), shape.clone());
            }
        }
        layer
    }
}

impl GeometryLookup<IrId> for IrLayer {
    fn geometry(&self, key: &IrId) -> Option<&MultiPolygon<f64>> { self.store.geometry(key) }
}
