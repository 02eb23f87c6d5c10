use std::hash::Hash;

use ahash::AHashMap;

/// Dense zero-based indices over distinct keys, assigned in encounter order.
/// An index, once assigned, is never reused or changed.
#[derive(Debug, Clone)]
pub struct EntityIndex<K> {
    keys: Vec<K>,
    index: AHashMap<K, u32>,
}

impl<K> Default for EntityIndex<K> {
    fn default() -> Self {
        Self { keys: Vec::new(), index: AHashMap::new() }
    }
}

// The map is derived from `keys`, so comparing keys is enough.
impl<K: PartialEq> PartialEq for EntityIndex<K> {
    fn eq(&self, other: &Self) -> bool { self.keys == other.keys }
}

impl<K: Clone + Eq + Hash> EntityIndex<K> {
    pub fn new() -> Self { Self::default() }

    /// Index every distinct key by first occurrence.
    pub fn from_encounter(keys: impl IntoIterator<Item = K>) -> Self {
        let mut index = Self::new();
        for key in keys { index.insert(key); }
        index
    }

    /// Index of `key`, assigning the next free one if the key is new.
    /// The flag is true when the key was newly inserted.
    pub fn insert(&mut self, key: K) -> (u32, bool) {
        if let Some(&i) = self.index.get(&key) { return (i, false) }
        let i = self.keys.len() as u32;
        self.index.insert(key.clone(), i);
        self.keys.push(key);
        (i, true)
    }

    #[inline] pub fn get(&self, key: &K) -> Option<u32> { self.index.get(key).copied() }

    #[inline] pub fn key(&self, i: u32) -> Option<&K> { self.keys.get(i as usize) }

    #[inline] pub fn keys(&self) -> &[K] { &self.keys }

    #[inline] pub fn len(&self) -> usize { self.keys.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.keys.is_empty() }
}
