// Special-function cache
// Fast lookup of the lifecycle functions (__pass__, __defer__,
// __assign__) for an AST type. The "unknown vs. definitively absent"
// distinction is what saves repeated resolver work, so each slot is a
// trilean, never a plain Option.

use crate::endpoint::FuncPair;
use adept_ast::{type_hash, types_identical, Type};

pub const SF_CACHE_NUM_BUCKETS: usize = 1024;

/// Three-valued cached lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trilean {
    #[default]
    Unknown,
    Absent,
    Present(FuncPair),
}

impl Trilean {
    /// Cached result as an Option, or `None` when not yet computed
    pub fn known(&self) -> Option<Option<FuncPair>> {
        match self {
            Trilean::Unknown => None,
            Trilean::Absent => Some(None),
            Trilean::Present(pair) => Some(Some(*pair)),
        }
    }
}

#[derive(Debug)]
pub struct SfCacheEntry {
    pub ast_type: Type,
    pub pass: Trilean,
    pub defer: Trilean,
    pub assign: Trilean,
}

impl SfCacheEntry {
    fn new(ast_type: Type) -> Self {
        Self {
            ast_type,
            pass: Trilean::Unknown,
            defer: Trilean::Unknown,
            assign: Trilean::Unknown,
        }
    }
}

#[derive(Debug)]
pub struct SfCache {
    buckets: Vec<Vec<SfCacheEntry>>,
}

impl Default for SfCache {
    fn default() -> Self {
        Self {
            buckets: (0..SF_CACHE_NUM_BUCKETS).map(|_| Vec::new()).collect(),
        }
    }
}

impl SfCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_index(&self, ty: &Type) -> usize {
        (type_hash(ty) % self.buckets.len() as u64) as usize
    }

    /// Entry for an AST type, created on first access
    pub fn locate_or_insert(&mut self, ty: &Type) -> &mut SfCacheEntry {
        let bucket_index = self.bucket_index(ty);
        let bucket = &mut self.buckets[bucket_index];

        if let Some(position) = bucket
            .iter()
            .position(|entry| types_identical(&entry.ast_type, ty))
        {
            return &mut bucket[position];
        }

        bucket.push(SfCacheEntry::new(ty.clone()));
        bucket.last_mut().expect("just inserted")
    }

    /// Read-only entry lookup
    pub fn locate(&self, ty: &Type) -> Option<&SfCacheEntry> {
        self.buckets[self.bucket_index(ty)]
            .iter()
            .find(|entry| types_identical(&entry.ast_type, ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_vs_absent() {
        let mut cache = SfCache::new();
        let entry = cache.locate_or_insert(&Type::base("Thing"));

        assert_eq!(entry.defer.known(), None);

        entry.defer = Trilean::Absent;
        assert_eq!(entry.defer.known(), Some(None));

        entry.pass = Trilean::Present(FuncPair::new(3, 7));
        assert_eq!(entry.pass.known(), Some(Some(FuncPair::new(3, 7))));
    }

    #[test]
    fn test_entries_persist() {
        let mut cache = SfCache::new();
        cache.locate_or_insert(&Type::base("A")).defer = Trilean::Absent;
        cache.locate_or_insert(&Type::base("B")).defer =
            Trilean::Present(FuncPair::new(1, 2));

        assert_eq!(
            cache.locate(&Type::base("A")).map(|e| e.defer),
            Some(Trilean::Absent)
        );
        assert_eq!(
            cache.locate(&Type::base("B")).map(|e| e.defer),
            Some(Trilean::Present(FuncPair::new(1, 2)))
        );
        assert!(cache.locate(&Type::base("C")).is_none());
    }
}
