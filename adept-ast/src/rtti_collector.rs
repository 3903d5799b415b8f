// Keeps track of what AST types have been mentioned to it.
// Finalization enumerates the mentioned types in first-insertion order
// to form the `__types__` runtime array.

use crate::type_set::TypeSet;
use crate::types::Type;

#[derive(Debug, Default)]
pub struct RttiCollector {
    pub types_used: TypeSet,
}

impl RttiCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mention an AST type to the collector
    pub fn mention(&mut self, ty: &Type) {
        self.types_used.insert(ty);
    }

    /// Helper to mention a simple base type, used for built-ins
    pub fn mention_base(&mut self, name: &str) -> bool {
        self.types_used.insert(&Type::base(name))
    }

    /// Index a mentioned type was assigned, in first-insertion order
    pub fn index_of(&self, ty: &Type) -> Option<usize> {
        self.types_used.index_of(ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.types_used.iter()
    }

    pub fn len(&self) -> usize {
        self.types_used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types_used.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_ordering() {
        let mut collector = RttiCollector::new();
        collector.mention(&Type::base("int"));
        collector.mention(&Type::base("ubyte").pointer_to());
        collector.mention(&Type::base("int"));

        assert_eq!(collector.len(), 2);
        assert_eq!(collector.index_of(&Type::base("int")), Some(0));
        assert_eq!(collector.index_of(&Type::base("ubyte").pointer_to()), Some(1));
    }

    #[test]
    fn test_mention_base() {
        let mut collector = RttiCollector::new();
        assert!(collector.mention_base("bool"));
        assert!(!collector.mention_base("bool"));
    }
}
