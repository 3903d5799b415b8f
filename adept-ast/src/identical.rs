// Structural identity for AST types
// This is the compiler's notion of "the same type"; it is stricter than
// the derived `PartialEq` in that transient elements never match

use crate::types::{Type, TypeElem};

/// Returns whether two AST types are identical
pub fn types_identical(a: &Type, b: &Type) -> bool {
    a.elements.len() == b.elements.len()
        && a.elements
            .iter()
            .zip(b.elements.iter())
            .all(|(x, y)| elems_identical(x, y))
}

/// Returns whether two lists of AST types are identical
pub fn type_lists_identical(a: &[Type], b: &[Type]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| types_identical(x, y))
}

/// Returns whether two AST type elements are identical
pub fn elems_identical(a: &TypeElem, b: &TypeElem) -> bool {
    match (a, b) {
        (TypeElem::Base { name: a_name }, TypeElem::Base { name: b_name }) => a_name == b_name,
        (TypeElem::Pointer, TypeElem::Pointer)
        | (TypeElem::Array, TypeElem::Array)
        | (TypeElem::GenericInt, TypeElem::GenericInt)
        | (TypeElem::GenericFloat, TypeElem::GenericFloat) => true,
        (TypeElem::FixedArray { length: a_len }, TypeElem::FixedArray { length: b_len }) => {
            a_len == b_len
        }
        (
            TypeElem::Func {
                arg_types: a_args,
                return_type: a_return,
                traits: a_traits,
            },
            TypeElem::Func {
                arg_types: b_args,
                return_type: b_return,
                traits: b_traits,
            },
        ) => {
            a_traits == b_traits
                && type_lists_identical(a_args, b_args)
                && types_identical(a_return, b_return)
        }
        (TypeElem::Polymorph { name: a_name }, TypeElem::Polymorph { name: b_name }) => {
            a_name == b_name
        }
        (TypeElem::Polycount { name: a_name }, TypeElem::Polycount { name: b_name }) => {
            a_name == b_name
        }
        (
            TypeElem::PolymorphPrereq {
                name: a_name,
                similarity: a_similarity,
                extends: a_extends,
            },
            TypeElem::PolymorphPrereq {
                name: b_name,
                similarity: b_similarity,
                extends: b_extends,
            },
        ) => {
            a_name == b_name
                && a_similarity == b_similarity
                && match (a_extends, b_extends) {
                    (Some(a_ext), Some(b_ext)) => types_identical(a_ext, b_ext),
                    (None, None) => true,
                    _ => false,
                }
        }
        (
            TypeElem::GenericBase {
                name: a_name,
                generics: a_generics,
                name_is_polymorphic: a_poly,
            },
            TypeElem::GenericBase {
                name: b_name,
                generics: b_generics,
                name_is_polymorphic: b_poly,
            },
        ) => a_name == b_name && a_poly == b_poly && type_lists_identical(a_generics, b_generics),
        // Transient elements are never identical across instances; they
        // must be erased before identity matters
        (TypeElem::VarFixedArray { .. }, _)
        | (_, TypeElem::VarFixedArray { .. })
        | (TypeElem::UnknownEnum { .. }, _)
        | (_, TypeElem::UnknownEnum { .. }) => false,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, ExprKind};
    use adept_diagnostics::Source;

    #[test]
    fn test_base_identity_by_name() {
        assert!(types_identical(&Type::base("int"), &Type::base("int")));
        assert!(!types_identical(&Type::base("int"), &Type::base("long")));
    }

    #[test]
    fn test_pointer_depth_matters() {
        let one = Type::base("int").pointer_to();
        let two = Type::base("int").pointer_to().pointer_to();
        assert!(!types_identical(&one, &two));
        assert!(types_identical(&one, &one.clone()));
    }

    #[test]
    fn test_source_is_ignored() {
        let mut a = Type::base("int");
        a.source = Source::new(1, 20, 3);
        let b = Type::base("int");
        assert!(types_identical(&a, &b));
    }

    #[test]
    fn test_unknown_enum_never_identical() {
        let a = Type::new(
            vec![TypeElem::UnknownEnum { kind_name: "APPLE".into() }],
            Source::NONE,
        );
        assert!(!types_identical(&a, &a.clone()));
    }

    #[test]
    fn test_var_fixed_array_never_identical() {
        let a = Type::new(
            vec![
                TypeElem::VarFixedArray {
                    length: Expr::boxed(ExprKind::GenericInt(8), Source::NONE),
                },
                TypeElem::Base { name: "int".into() },
            ],
            Source::NONE,
        );
        assert!(!types_identical(&a, &a.clone()));
    }

    #[test]
    fn test_generic_base_identity() {
        let list_of_int = Type::new(
            vec![TypeElem::GenericBase {
                name: "List".into(),
                generics: vec![Type::base("int")],
                name_is_polymorphic: false,
            }],
            Source::NONE,
        );
        let list_of_long = Type::new(
            vec![TypeElem::GenericBase {
                name: "List".into(),
                generics: vec![Type::base("long")],
                name_is_polymorphic: false,
            }],
            Source::NONE,
        );
        assert!(types_identical(&list_of_int, &list_of_int.clone()));
        assert!(!types_identical(&list_of_int, &list_of_long));
    }

    #[test]
    fn test_clone_fidelity() {
        let ty = Type::new(
            vec![
                TypeElem::Pointer,
                TypeElem::GenericBase {
                    name: "Pair".into(),
                    generics: vec![Type::base("int"), Type::base("double")],
                    name_is_polymorphic: false,
                },
            ],
            Source::NONE,
        );

        let mut cloned = ty.clone();
        assert!(types_identical(&ty, &cloned));

        cloned.elements.pop();
        assert!(!types_identical(&ty, &cloned));
        assert_eq!(ty.elements.len(), 2);
    }
}
