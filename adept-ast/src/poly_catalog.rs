// Polymorphic mapping catalog
// Maps polymorphic type parameters such as `$T` to concrete types like
// `int`, and polymorphic count parameters such as `$#N` to concrete
// integers like 8

use crate::identical::types_identical;
use crate::types::Type;
use serde::{Deserialize, Serialize};

/// Single polymorphic type binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeBinding {
    pub name: String,
    pub binding: Type,
}

/// Single polymorphic count binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountBinding {
    pub name: String,
    pub binding: u64,
}

/// Catalog of polymorphic bindings for a single instantiation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolyCatalog {
    pub types: Vec<TypeBinding>,
    pub counts: Vec<CountBinding>,
}

impl PolyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, name: impl Into<String>, binding: &Type) {
        self.types.push(TypeBinding {
            name: name.into(),
            binding: binding.clone(),
        });
    }

    pub fn add_types<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
        bindings: &[Type],
    ) {
        for (name, binding) in names.into_iter().zip(bindings.iter()) {
            self.add_type(name, binding);
        }
    }

    pub fn add_count(&mut self, name: impl Into<String>, binding: u64) {
        self.counts.push(CountBinding {
            name: name.into(),
            binding,
        });
    }

    // Linear search is probably the fastest here

    pub fn find_type(&self, name: &str) -> Option<&Type> {
        self.types
            .iter()
            .find(|binding| binding.name == name)
            .map(|binding| &binding.binding)
    }

    pub fn find_count(&self, name: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|binding| binding.name == name)
            .map(|binding| binding.binding)
    }

    /// Bind `name` unless it is already bound to a conflicting type.
    /// Returns false on conflict.
    pub fn try_bind_type(&mut self, name: &str, binding: &Type) -> bool {
        match self.find_type(name) {
            Some(existing) => types_identical(existing, binding),
            None => {
                self.add_type(name, binding);
                true
            }
        }
    }

    /// Bind `name` unless it is already bound to a different count.
    /// Returns false on conflict.
    pub fn try_bind_count(&mut self, name: &str, binding: u64) -> bool {
        match self.find_count(name) {
            Some(existing) => existing == binding,
            None => {
                self.add_count(name, binding);
                true
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let mut catalog = PolyCatalog::new();
        catalog.add_type("T", &Type::base("int"));
        catalog.add_count("N", 8);

        assert!(catalog.find_type("T").is_some_and(|t| t.is_base_named("int")));
        assert_eq!(catalog.find_count("N"), Some(8));
        assert!(catalog.find_type("U").is_none());
        assert_eq!(catalog.find_count("M"), None);
    }

    #[test]
    fn test_try_bind_detects_conflicts() {
        let mut catalog = PolyCatalog::new();

        assert!(catalog.try_bind_type("T", &Type::base("int")));
        assert!(catalog.try_bind_type("T", &Type::base("int")));
        assert!(!catalog.try_bind_type("T", &Type::base("double")));

        assert!(catalog.try_bind_count("N", 4));
        assert!(!catalog.try_bind_count("N", 5));
    }
}
