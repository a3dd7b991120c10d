//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! An insertion-ordered map of bplist objects.
//!
//! The map is backed by an [`IndexMap`] so that documents round-trip with
//! their key order intact. Keys may be any `Object`, although in practice
//! dictionary keys are strings.
//!
//! [`IndexMap`]: https://docs.rs/indexmap/latest/indexmap/map/struct.IndexMap.html

use indexmap::{map, IndexMap};

use std::hash::{Hash, Hasher};

use crate::object::Object;

/// Represents a bplist dictionary.
#[derive(Clone, Debug, Default)]
pub struct Dictionary {
    map: IndexMap<Object, Object>,
}

impl Dictionary {
    /// Makes a new empty `Dictionary`.
    #[inline]
    pub fn new() -> Self {
        Dictionary { map: IndexMap::new() }
    }

    /// Returns the number of entries in the dictionary.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the dictionary contains no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns a reference to the value corresponding to the string key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.map.get(&Object::from(key))
    }

    /// Returns a reference to the value corresponding to the object key.
    #[inline]
    pub fn get_object(&self, key: &Object) -> Option<&Object> {
        self.map.get(key)
    }

    /// Returns true if the dictionary contains a value for the string key.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(&Object::from(key))
    }

    /// Inserts a key-value pair into the dictionary.
    ///
    /// If the dictionary did have this key present, the value is updated in
    /// place, and the old value is returned.
    #[inline]
    pub fn insert(&mut self, key: Object, value: Object) -> Option<Object> {
        self.map.insert(key, value)
    }

    /// Gets an iterator over the entries of the dictionary in insertion order.
    #[inline]
    pub fn iter(&self) -> map::Iter<'_, Object, Object> {
        self.map.iter()
    }

    /// Gets an iterator over the keys of the dictionary in insertion order.
    #[inline]
    pub fn keys(&self) -> map::Keys<'_, Object, Object> {
        self.map.keys()
    }

    /// Gets an iterator over the values of the dictionary in insertion order.
    #[inline]
    pub fn values(&self) -> map::Values<'_, Object, Object> {
        self.map.values()
    }
}

/// Dictionaries compare entry-by-entry in iteration order, consistent with
/// the ordering guarantee of the wire format.
impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for Dictionary {}

impl Hash for Dictionary {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for (key, value) in self.iter() {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl FromIterator<(Object, Object)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (Object, Object)>>(iter: I) -> Self {
        Dictionary { map: IndexMap::from_iter(iter) }
    }
}

impl Extend<(Object, Object)> for Dictionary {
    fn extend<I: IntoIterator<Item = (Object, Object)>>(&mut self, iter: I) {
        self.map.extend(iter)
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Object, &'a Object);
    type IntoIter = map::Iter<'a, Object, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

impl IntoIterator for Dictionary {
    type Item = (Object, Object);
    type IntoIter = map::IntoIter<Object, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::Dictionary;
    use crate::object::Object;

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut dict = Dictionary::new();
        dict.insert(Object::from("zeta"), Object::from(1));
        dict.insert(Object::from("alpha"), Object::from(2));
        dict.insert(Object::from("mu"), Object::from(3));

        let keys = dict
            .keys()
            .map(|key| key.as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(keys, &["zeta", "alpha", "mu"]);
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let forward = [("a", 1i64), ("b", 2)]
            .into_iter()
            .map(|(k, v)| (Object::from(k), Object::from(v)))
            .collect::<Dictionary>();
        let reverse = [("b", 2i64), ("a", 1)]
            .into_iter()
            .map(|(k, v)| (Object::from(k), Object::from(v)))
            .collect::<Dictionary>();
        assert_ne!(forward, reverse);
        assert_eq!(forward, forward.clone());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut dict = Dictionary::new();
        dict.insert(Object::from("count"), Object::from(1));
        let previous = dict.insert(Object::from("count"), Object::from(2));
        assert_eq!(previous, Some(Object::Integer(1)));
        assert_eq!(dict.get("count"), Some(&Object::Integer(2)));
        assert_eq!(dict.len(), 1);
    }
}
