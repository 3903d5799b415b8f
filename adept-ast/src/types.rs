// AST type model
// A type is a sequence of elements read left-to-right, e.g.
// `*int` = [Pointer, Base("int")] and `10 float` = [FixedArray(10), Base("float")]

use crate::expr::Expr;
use adept_diagnostics::Source;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags::bitflags! {
    /// Traits carried by a function-pointer type element
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct FuncElemTraits: u8 {
        const VARARG  = 1 << 0;
        const STDCALL = 1 << 1;
    }
}

/// One element of an AST type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeElem {
    /// Concrete named type: `int`, `String`, `Fruit`
    Base { name: String },
    /// Pointer to the remainder: `*int`
    Pointer,
    /// Unbounded array view of the remainder: `[]ubyte`
    Array,
    /// Inline array of fixed length: `10 int`
    FixedArray { length: u64 },
    /// Fixed array whose length expression has not been evaluated yet.
    /// Erased to `FixedArray` before any identity-demanding path.
    VarFixedArray { length: Box<Expr> },
    /// Function pointer: `func(int, int) bool`
    Func {
        arg_types: Vec<Type>,
        return_type: Box<Type>,
        traits: FuncElemTraits,
    },
    /// Polymorphic type parameter: `$T`
    Polymorph { name: String },
    /// Polymorphic type parameter with a usage prerequisite:
    /// `$T~__number__` or `$T extends Shape`
    PolymorphPrereq {
        name: String,
        similarity: Option<String>,
        extends: Option<Box<Type>>,
    },
    /// Polymorphic count parameter: `$#N`
    Polycount { name: String },
    /// Instantiated generic composite: `<int> List`
    GenericBase {
        name: String,
        generics: Vec<Type>,
        name_is_polymorphic: bool,
    },
    /// Unsuffixed integer literal type, pending concretization
    GenericInt,
    /// Unsuffixed float literal type, pending concretization
    GenericFloat,
    /// Enum member whose owning enum is not yet known: `::KIND`
    UnknownEnum { kind_name: String },
}

/// An AST type: a non-empty element sequence plus its origin.
/// An empty element sequence represents the absence of a type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Type {
    pub elements: Vec<TypeElem>,
    pub source: Source,
}

impl Type {
    pub const NONE: Type = Type {
        elements: Vec::new(),
        source: Source::NONE,
    };

    pub fn new(elements: Vec<TypeElem>, source: Source) -> Self {
        Self { elements, source }
    }

    /// Single-element base type
    pub fn base(name: impl Into<String>) -> Self {
        Self::new(vec![TypeElem::Base { name: name.into() }], Source::NONE)
    }

    /// Polymorphic parameter type `$name`
    pub fn polymorph(name: impl Into<String>) -> Self {
        Self::new(vec![TypeElem::Polymorph { name: name.into() }], Source::NONE)
    }

    pub fn is_none(&self) -> bool {
        self.elements.is_empty()
    }

    /// Clone of this type with a `Pointer` element prepended
    pub fn pointer_to(&self) -> Type {
        let mut elements = Vec::with_capacity(self.elements.len() + 1);
        elements.push(TypeElem::Pointer);
        elements.extend(self.elements.iter().cloned());
        Type::new(elements, self.source)
    }

    /// Clone of this type with the leading `Pointer` element removed
    pub fn dereferenced(&self) -> Option<Type> {
        match self.elements.first() {
            Some(TypeElem::Pointer) => Some(Type::new(self.elements[1..].to_vec(), self.source)),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.elements.first(), Some(TypeElem::Pointer))
    }

    pub fn is_base(&self) -> bool {
        self.elements.len() == 1 && matches!(self.elements[0], TypeElem::Base { .. })
    }

    pub fn is_base_named(&self, expected: &str) -> bool {
        matches!(
            self.elements.first(),
            Some(TypeElem::Base { name }) if self.elements.len() == 1 && name == expected
        )
    }

    pub fn is_generic_base(&self) -> bool {
        self.elements.len() == 1 && matches!(self.elements[0], TypeElem::GenericBase { .. })
    }

    /// Name of the composite this type refers to, for `Base` and
    /// `GenericBase` head elements
    pub fn struct_name(&self) -> Option<&str> {
        match self.elements.first() {
            Some(TypeElem::Base { name }) if self.elements.len() == 1 => Some(name),
            Some(TypeElem::GenericBase { name, .. }) if self.elements.len() == 1 => Some(name),
            _ => None,
        }
    }

    /// Subject composite name for method lookup: either the type itself
    /// or the type it directly points to
    pub fn method_subject_name(&self) -> Option<&str> {
        if self.is_pointer() {
            match self.elements.get(1) {
                Some(TypeElem::Base { name }) if self.elements.len() == 2 => Some(name),
                Some(TypeElem::GenericBase { name, .. }) if self.elements.len() == 2 => Some(name),
                _ => None,
            }
        } else {
            self.struct_name()
        }
    }

    /// Whether any element is a polymorphic type or count parameter
    pub fn has_polymorph(&self) -> bool {
        fn elem_has_polymorph(elem: &TypeElem) -> bool {
            match elem {
                TypeElem::Polymorph { .. }
                | TypeElem::PolymorphPrereq { .. }
                | TypeElem::Polycount { .. } => true,
                TypeElem::GenericBase {
                    generics,
                    name_is_polymorphic,
                    ..
                } => *name_is_polymorphic || generics.iter().any(Type::has_polymorph),
                TypeElem::Func {
                    arg_types,
                    return_type,
                    ..
                } => arg_types.iter().any(Type::has_polymorph) || return_type.has_polymorph(),
                _ => false,
            }
        }

        self.elements.iter().any(elem_has_polymorph)
    }

    /// Whether this type still contains transient elements that must be
    /// erased before IR emission
    pub fn is_concrete(&self) -> bool {
        !self.has_polymorph()
            && !self.elements.iter().any(|elem| {
                matches!(
                    elem,
                    TypeElem::VarFixedArray { .. }
                        | TypeElem::UnknownEnum { .. }
                        | TypeElem::GenericInt
                        | TypeElem::GenericFloat
                )
            })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.elements.is_empty() {
            return write!(f, "<no type>");
        }

        for elem in &self.elements {
            write!(f, "{}", elem)?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeElem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeElem::Base { name } => write!(f, "{}", name),
            TypeElem::Pointer => write!(f, "*"),
            TypeElem::Array => write!(f, "[]"),
            TypeElem::FixedArray { length } => write!(f, "{} ", length),
            TypeElem::VarFixedArray { .. } => write!(f, "[...] "),
            TypeElem::Func {
                arg_types,
                return_type,
                traits,
            } => {
                write!(f, "func")?;
                if traits.contains(FuncElemTraits::STDCALL) {
                    write!(f, " stdcall")?;
                }
                write!(f, "(")?;
                for (i, arg_type) in arg_types.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg_type)?;
                }
                if traits.contains(FuncElemTraits::VARARG) {
                    if arg_types.is_empty() {
                        write!(f, "...")?;
                    } else {
                        write!(f, ", ...")?;
                    }
                }
                write!(f, ") {}", return_type)
            }
            TypeElem::Polymorph { name } => write!(f, "${}", name),
            TypeElem::PolymorphPrereq {
                name,
                similarity,
                extends,
            } => {
                write!(f, "${}", name)?;
                if let Some(similarity) = similarity {
                    write!(f, "~{}", similarity)?;
                }
                if let Some(extends) = extends {
                    write!(f, " extends {}", extends)?;
                }
                Ok(())
            }
            TypeElem::Polycount { name } => write!(f, "$#{} ", name),
            TypeElem::GenericBase { name, generics, .. } => {
                write!(f, "<")?;
                for (i, generic) in generics.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", generic)?;
                }
                write!(f, "> {}", name)
            }
            TypeElem::GenericInt => write!(f, "int"),
            TypeElem::GenericFloat => write!(f, "double"),
            TypeElem::UnknownEnum { kind_name } => write!(f, "::{}", kind_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_notation() {
        let ty = Type::base("int").pointer_to();
        assert_eq!(ty.to_string(), "*int");

        let fixed = Type::new(
            vec![TypeElem::FixedArray { length: 10 }, TypeElem::Base { name: "int".into() }],
            Source::NONE,
        );
        assert_eq!(fixed.to_string(), "10 int");

        let generic = Type::new(
            vec![TypeElem::GenericBase {
                name: "List".into(),
                generics: vec![Type::base("int")],
                name_is_polymorphic: false,
            }],
            Source::NONE,
        );
        assert_eq!(generic.to_string(), "<int> List");
    }

    #[test]
    fn test_func_notation() {
        let ty = Type::new(
            vec![TypeElem::Func {
                arg_types: vec![Type::base("int"), Type::base("int")],
                return_type: Box::new(Type::base("bool")),
                traits: FuncElemTraits::empty(),
            }],
            Source::NONE,
        );
        assert_eq!(ty.to_string(), "func(int, int) bool");
    }

    #[test]
    fn test_method_subject_name() {
        let this_type = Type::base("Fruit").pointer_to();
        assert_eq!(this_type.method_subject_name(), Some("Fruit"));
        assert_eq!(Type::base("Fruit").method_subject_name(), Some("Fruit"));
        assert_eq!(Type::base("Fruit").pointer_to().pointer_to().method_subject_name(), None);
    }

    #[test]
    fn test_has_polymorph_recurses() {
        let ty = Type::new(
            vec![TypeElem::GenericBase {
                name: "List".into(),
                generics: vec![Type::polymorph("T")],
                name_is_polymorphic: false,
            }],
            Source::NONE,
        );
        assert!(ty.has_polymorph());
        assert!(!Type::base("int").has_polymorph());
    }

    #[test]
    fn test_dereferenced() {
        let ty = Type::base("ubyte").pointer_to();
        assert!(ty.dereferenced().is_some_and(|inner| inner.is_base_named("ubyte")));
        assert!(Type::base("ubyte").dereferenced().is_none());
    }
}
