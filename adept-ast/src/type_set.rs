// Set of AST types deduplicated by structural identity.
// Enumeration follows first-insertion order, never bucket order, so
// downstream consumers (the `__types__` array) are deterministic.

use crate::hash::{type_hash, TypeHash};
use crate::identical::types_identical;
use crate::types::Type;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TypeSet {
    buckets: HashMap<TypeHash, Vec<usize>>,
    items: Vec<Type>,
}

impl TypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a type unless an identical one is already present.
    /// Returns whether the type was newly inserted.
    pub fn insert(&mut self, ty: &Type) -> bool {
        let hash = type_hash(ty);
        let bucket = self.buckets.entry(hash).or_default();

        for &index in bucket.iter() {
            if types_identical(&self.items[index], ty) {
                return false;
            }
        }

        bucket.push(self.items.len());
        self.items.push(ty.clone());
        true
    }

    pub fn contains(&self, ty: &Type) -> bool {
        let hash = type_hash(ty);

        self.buckets
            .get(&hash)
            .is_some_and(|bucket| bucket.iter().any(|&i| types_identical(&self.items[i], ty)))
    }

    /// Position of an identical type in insertion order
    pub fn index_of(&self, ty: &Type) -> Option<usize> {
        let hash = type_hash(ty);

        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|&i| types_identical(&self.items[i], ty))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduplicates_by_identity() {
        let mut set = TypeSet::new();
        assert!(set.insert(&Type::base("int")));
        assert!(!set.insert(&Type::base("int")));
        assert!(set.insert(&Type::base("int").pointer_to()));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_insertion_order_enumeration() {
        let mut set = TypeSet::new();
        set.insert(&Type::base("int"));
        set.insert(&Type::base("ubyte").pointer_to());
        set.insert(&Type::base("int"));

        let names: Vec<String> = set.iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["int", "*ubyte"]);

        assert_eq!(set.index_of(&Type::base("int")), Some(0));
        assert_eq!(set.index_of(&Type::base("ubyte").pointer_to()), Some(1));
    }

    #[test]
    fn test_missing_lookup() {
        let set = TypeSet::new();
        assert!(!set.contains(&Type::base("int")));
        assert_eq!(set.index_of(&Type::base("int")), None);
    }
}
