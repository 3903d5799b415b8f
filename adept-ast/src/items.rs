// Remaining top-level AST items: enums, aliases, constants, globals

use crate::expr::Expr;
use crate::types::Type;
use adept_diagnostics::Source;
use serde::{Deserialize, Serialize};

pub type EnumId = usize;
pub type GlobalId = usize;

/// Enum definition: an ordered list of member kind names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,
    pub kinds: Vec<String>,
    pub source: Source,
}

impl Enum {
    pub fn new(name: impl Into<String>, kinds: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kinds,
            source: Source::NONE,
        }
    }

    pub fn kind_index(&self, kind: &str) -> Option<usize> {
        self.kinds.iter().position(|k| k == kind)
    }
}

/// Type alias, possibly generic: `alias StringList = <String> List`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub generics: Vec<String>,
    pub strong_type: Type,
    pub source: Source,
}

impl Alias {
    pub fn new(name: impl Into<String>, strong_type: Type) -> Self {
        Self {
            name: name.into(),
            generics: Vec::new(),
            strong_type,
            source: Source::NONE,
        }
    }
}

/// Named compile-time constant expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub value: Expr,
    pub source: Source,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct GlobalTraits: u8 {
        /// Declared elsewhere; no storage or initializer emitted here
        const EXTERNAL     = 1 << 0;
        const THREAD_LOCAL = 1 << 1;
        /// Compiler-created global (e.g. `__types__`)
        const SPECIAL      = 1 << 2;
    }
}

/// Global variable definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    pub initial: Option<Expr>,
    pub traits: GlobalTraits,
    pub source: Source,
}

impl Global {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            initial: None,
            traits: GlobalTraits::empty(),
            source: Source::NONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_kind_index() {
        let fruits = Enum::new("Fruit", vec!["APPLE".into(), "BANANA".into()]);
        assert_eq!(fruits.kind_index("BANANA"), Some(1));
        assert_eq!(fruits.kind_index("CHERRY"), None);
    }
}
