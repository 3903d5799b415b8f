// Hashing for AST types
// Must agree with `identical`: identical types always produce identical
// hashes. Consumers are the RTTI type set and the special-function cache;
// nothing else may depend on particular hash values.

use crate::types::{Type, TypeElem};

pub type TypeHash = u64;

/// Combine a value into a working hash with a fixed 31-multiplier
pub fn hash_combine(working: TypeHash, value: TypeHash) -> TypeHash {
    working.wrapping_mul(31).wrapping_add(value)
}

fn hash_bytes(bytes: &[u8]) -> TypeHash {
    // FNV-1a
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn hash_str(text: &str) -> TypeHash {
    hash_bytes(text.as_bytes())
}

fn elem_discriminant(elem: &TypeElem) -> u64 {
    match elem {
        TypeElem::Base { .. } => 1,
        TypeElem::Pointer => 2,
        TypeElem::Array => 3,
        TypeElem::FixedArray { .. } => 4,
        TypeElem::VarFixedArray { .. } => 5,
        TypeElem::Func { .. } => 6,
        TypeElem::Polymorph { .. } => 7,
        TypeElem::PolymorphPrereq { .. } => 8,
        TypeElem::Polycount { .. } => 9,
        TypeElem::GenericBase { .. } => 10,
        TypeElem::GenericInt => 11,
        TypeElem::GenericFloat => 12,
        TypeElem::UnknownEnum { .. } => 13,
    }
}

fn elem_hash(elem: &TypeElem) -> TypeHash {
    let id_hash = hash_bytes(&elem_discriminant(elem).to_le_bytes());

    match elem {
        TypeElem::Base { name } => hash_combine(id_hash, hash_str(name)),
        // No unique data beside the discriminant
        TypeElem::Pointer | TypeElem::Array | TypeElem::GenericInt | TypeElem::GenericFloat => {
            id_hash
        }
        TypeElem::FixedArray { length } => hash_combine(id_hash, hash_bytes(&length.to_le_bytes())),
        TypeElem::VarFixedArray { .. } => {
            // Cannot be hashed meaningfully; must be erased to FixedArray
            // before reaching any identity-demanding path
            debug_assert!(false, "attempted to hash a VarFixedArray element");
            log::warn!("cannot hash VarFixedArray element, returning faux hash");
            id_hash
        }
        TypeElem::Func {
            arg_types,
            return_type,
            traits,
        } => {
            let mut working = hash_combine(id_hash, types_hash(arg_types));
            working = hash_combine(working, type_hash(return_type));
            hash_combine(working, hash_bytes(&traits.bits().to_le_bytes()))
        }
        TypeElem::Polymorph { name } => hash_combine(id_hash, hash_str(name)),
        TypeElem::Polycount { name } => {
            let working = hash_combine(id_hash, hash_str("#"));
            hash_combine(working, hash_str(name))
        }
        TypeElem::PolymorphPrereq {
            name,
            similarity,
            extends,
        } => {
            let mut working = id_hash;
            if let Some(similarity) = similarity {
                working = hash_combine(working, hash_str(similarity));
            }
            working = hash_combine(working, hash_str(name));
            if let Some(extends) = extends {
                working = hash_combine(working, type_hash(extends));
            }
            working
        }
        TypeElem::GenericBase {
            name,
            generics,
            name_is_polymorphic,
        } => {
            let mut working =
                hash_combine(id_hash, hash_bytes(&[u8::from(*name_is_polymorphic)]));
            working = hash_combine(working, hash_str(name));
            hash_combine(working, types_hash(generics))
        }
        TypeElem::UnknownEnum { kind_name } => hash_combine(id_hash, hash_str(kind_name)),
    }
}

/// Hashes an AST type
pub fn type_hash(ty: &Type) -> TypeHash {
    let mut master_hash = 0;

    for elem in &ty.elements {
        master_hash = hash_combine(master_hash, elem_hash(elem));
    }

    master_hash
}

/// Hashes a collection of AST types
pub fn types_hash(types: &[Type]) -> TypeHash {
    let mut hash = 0;

    for ty in types {
        hash = hash_combine(hash, type_hash(ty));
    }

    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identical::types_identical;
    use crate::types::FuncElemTraits;
    use adept_diagnostics::Source;

    fn sample_types() -> Vec<Type> {
        vec![
            Type::base("int"),
            Type::base("double"),
            Type::base("int").pointer_to(),
            Type::new(
                vec![TypeElem::FixedArray { length: 10 }, TypeElem::Base { name: "int".into() }],
                Source::NONE,
            ),
            Type::new(
                vec![TypeElem::GenericBase {
                    name: "List".into(),
                    generics: vec![Type::base("ubyte")],
                    name_is_polymorphic: false,
                }],
                Source::NONE,
            ),
            Type::new(
                vec![TypeElem::Func {
                    arg_types: vec![Type::base("int")],
                    return_type: Box::new(Type::base("void")),
                    traits: FuncElemTraits::empty(),
                }],
                Source::NONE,
            ),
            Type::polymorph("T"),
        ]
    }

    #[test]
    fn test_hash_agrees_with_identity() {
        let types = sample_types();

        for a in &types {
            for b in &types {
                if types_identical(a, b) {
                    assert_eq!(type_hash(a), type_hash(b), "{} vs {}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_identical_types_share_hash() {
        for ty in sample_types() {
            assert_eq!(type_hash(&ty), type_hash(&ty.clone()));
        }
    }

    #[test]
    fn test_distinct_bases_rarely_collide() {
        assert_ne!(type_hash(&Type::base("int")), type_hash(&Type::base("long")));
    }

    #[test]
    fn test_polymorph_vs_polycount() {
        let poly = Type::polymorph("N");
        let count = Type::new(vec![TypeElem::Polycount { name: "N".into() }], Source::NONE);
        assert_ne!(type_hash(&poly), type_hash(&count));
    }

    #[test]
    fn test_pointer_ordering_matters() {
        let ptr_to_array = Type::new(
            vec![TypeElem::Pointer, TypeElem::Array, TypeElem::Base { name: "int".into() }],
            Source::NONE,
        );
        let array_of_ptr = Type::new(
            vec![TypeElem::Array, TypeElem::Pointer, TypeElem::Base { name: "int".into() }],
            Source::NONE,
        );
        assert_ne!(type_hash(&ptr_to_array), type_hash(&array_of_ptr));
    }
}
