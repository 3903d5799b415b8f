// Composite (struct/class) model

use crate::types::Type;
use adept_diagnostics::Source;
use serde::{Deserialize, Serialize};

/// Index of a composite within the AST composite table
pub type CompositeId = usize;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct CompositeTraits: u8 {
        const PACKED = 1 << 0;
    }
}

/// One named field of a simple-struct layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }
}

/// A struct or class definition with a simple-struct layout
/// (a flat sequence of named fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    pub name: String,
    pub fields: Vec<Field>,
    pub traits: CompositeTraits,
    pub source: Source,
    /// The `extends` clause, possibly polymorphic
    pub parent: Option<Type>,
    pub is_class: bool,
    /// Generic parameter names for polymorphic composites
    pub generics: Vec<String>,
}

impl Composite {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            traits: CompositeTraits::empty(),
            source: Source::NONE,
            parent: None,
            is_class: false,
            generics: Vec::new(),
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        !self.generics.is_empty()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// The usage signature of this composite: `Name` for concrete
    /// composites, `<$A, $B> Name` for templates
    pub fn signature(&self) -> Type {
        use crate::types::TypeElem;

        if self.generics.is_empty() {
            Type::new(vec![TypeElem::Base { name: self.name.clone() }], self.source)
        } else {
            Type::new(
                vec![TypeElem::GenericBase {
                    name: self.name.clone(),
                    generics: self.generics.iter().map(Type::polymorph).collect(),
                    name_is_polymorphic: false,
                }],
                self.source,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_index() {
        let composite = Composite::new(
            "Point",
            vec![
                Field::new("x", Type::base("double")),
                Field::new("y", Type::base("double")),
            ],
        );
        assert_eq!(composite.field_index("y"), Some(1));
        assert_eq!(composite.field_index("z"), None);
    }

    #[test]
    fn test_signature() {
        let plain = Composite::new("Point", vec![]);
        assert_eq!(plain.signature().to_string(), "Point");

        let mut template = Composite::new("List", vec![]);
        template.generics = vec!["T".into()];
        assert_eq!(template.signature().to_string(), "<$T> List");
    }
}
