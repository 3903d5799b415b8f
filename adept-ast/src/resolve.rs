// Polymorph substitution
// Rewrites `$T` / `$#N` elements inside types and expressions using the
// bindings of a catalog. Resolution is idempotent on concrete inputs.

use crate::expr::{Expr, ExprKind};
use crate::poly_catalog::PolyCatalog;
use crate::rtti_collector::RttiCollector;
use crate::types::{Type, TypeElem};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("unresolved polymorph '${name}'")]
    UnresolvedPolymorph { name: String },
    #[error("unresolved polymorphic count '$#{name}'")]
    UnresolvedPolycount { name: String },
    #[error("polymorphic base name '${name}' is not bound to a plain base type")]
    NonBaseBinding { name: String },
}

/// Resolve all polymorphic elements of a type through a catalog.
/// The result is mentioned to `collector` when one is supplied, so every
/// concrete type produced during instantiation is available to RTTI.
pub fn resolve_type(
    catalog: &PolyCatalog,
    mut collector: Option<&mut RttiCollector>,
    ty: &Type,
) -> Result<Type, ResolveError> {
    let mut elements = Vec::with_capacity(ty.elements.len());

    for elem in &ty.elements {
        resolve_elem(catalog, elem, &mut elements)?;
    }

    let resolved = Type::new(elements, ty.source);

    if let Some(collector) = collector.as_deref_mut() {
        if resolved.is_concrete() {
            collector.mention(&resolved);
        }
    }

    Ok(resolved)
}

fn resolve_elem(
    catalog: &PolyCatalog,
    elem: &TypeElem,
    output: &mut Vec<TypeElem>,
) -> Result<(), ResolveError> {
    match elem {
        TypeElem::Polymorph { name } | TypeElem::PolymorphPrereq { name, .. } => {
            // Prerequisites were verified when the catalog was built;
            // substitution treats both element forms the same
            let binding = catalog
                .find_type(name)
                .ok_or_else(|| ResolveError::UnresolvedPolymorph { name: name.clone() })?;

            // A binding may itself be a multi-element type (e.g. a
            // pointer), so splice rather than substitute one-for-one
            output.extend(binding.elements.iter().cloned());
            Ok(())
        }
        TypeElem::Polycount { name } => {
            let length = catalog
                .find_count(name)
                .ok_or_else(|| ResolveError::UnresolvedPolycount { name: name.clone() })?;

            output.push(TypeElem::FixedArray { length });
            Ok(())
        }
        TypeElem::GenericBase {
            name,
            generics,
            name_is_polymorphic,
        } => {
            let resolved_name = if *name_is_polymorphic {
                let binding = catalog
                    .find_type(name)
                    .ok_or_else(|| ResolveError::UnresolvedPolymorph { name: name.clone() })?;

                match binding.elements.as_slice() {
                    [TypeElem::Base { name: base_name }] => base_name.clone(),
                    _ => return Err(ResolveError::NonBaseBinding { name: name.clone() }),
                }
            } else {
                name.clone()
            };

            let resolved_generics = generics
                .iter()
                .map(|generic| resolve_type(catalog, None, generic))
                .collect::<Result<Vec<_>, _>>()?;

            output.push(TypeElem::GenericBase {
                name: resolved_name,
                generics: resolved_generics,
                name_is_polymorphic: false,
            });
            Ok(())
        }
        TypeElem::Func {
            arg_types,
            return_type,
            traits,
        } => {
            let resolved_args = arg_types
                .iter()
                .map(|arg_type| resolve_type(catalog, None, arg_type))
                .collect::<Result<Vec<_>, _>>()?;

            output.push(TypeElem::Func {
                arg_types: resolved_args,
                return_type: Box::new(resolve_type(catalog, None, return_type)?),
                traits: *traits,
            });
            Ok(())
        }
        TypeElem::VarFixedArray { length } => {
            let mut resolved_length = (**length).clone();
            resolve_expr(catalog, None, &mut resolved_length)?;

            // Erase to a concrete fixed array when the length collapsed
            // to an integer literal
            match resolved_length.kind {
                ExprKind::Usize(value) | ExprKind::Ulong(value) => {
                    output.push(TypeElem::FixedArray { length: value });
                }
                ExprKind::GenericInt(value) if value >= 0 => {
                    output.push(TypeElem::FixedArray { length: value as u64 });
                }
                _ => {
                    output.push(TypeElem::VarFixedArray {
                        length: Box::new(resolved_length),
                    });
                }
            }
            Ok(())
        }
        other => {
            output.push(other.clone());
            Ok(())
        }
    }
}

/// Resolve polymorphic elements in-place inside an expression tree,
/// covering every type-bearing expression kind
pub fn resolve_expr(
    catalog: &PolyCatalog,
    mut collector: Option<&mut RttiCollector>,
    expr: &mut Expr,
) -> Result<(), ResolveError> {
    let collector = &mut collector;

    macro_rules! recurse {
        ($sub:expr) => {
            resolve_expr(catalog, collector.as_deref_mut(), $sub)?
        };
    }
    macro_rules! recurse_all {
        ($list:expr) => {
            for sub in $list.iter_mut() {
                resolve_expr(catalog, collector.as_deref_mut(), sub)?;
            }
        };
    }
    macro_rules! retype {
        ($ty:expr) => {
            *$ty = resolve_type(catalog, collector.as_deref_mut(), $ty)?
        };
    }

    match &mut expr.kind {
        ExprKind::Polycount(name) => {
            let binding = catalog
                .find_count(name)
                .ok_or_else(|| ResolveError::UnresolvedPolycount { name: name.clone() })?;
            expr.kind = ExprKind::Usize(binding);
        }

        ExprKind::Math { lhs, rhs, .. } => {
            recurse!(lhs);
            recurse!(rhs);
        }
        ExprKind::UnaryNot(value)
        | ExprKind::UnaryBitComplement(value)
        | ExprKind::UnaryNegate(value)
        | ExprKind::AddressOf(value)
        | ExprKind::Dereference(value)
        | ExprKind::SizeofValue { value }
        | ExprKind::Delete { value }
        | ExprKind::VaStart(value)
        | ExprKind::VaEnd(value) => recurse!(value),
        ExprKind::Call { args, gives, .. } => {
            recurse_all!(args);
            if let Some(gives) = gives {
                retype!(gives);
            }
        }
        ExprKind::CallMethod {
            subject, args, gives, ..
        } => {
            recurse!(subject);
            recurse_all!(args);
            if let Some(gives) = gives {
                retype!(gives);
            }
        }
        ExprKind::CallAddress { address, args } => {
            recurse!(address);
            recurse_all!(args);
        }
        ExprKind::Member { subject, .. } => recurse!(subject),
        ExprKind::ArrayAccess { subject, index } => {
            recurse!(subject);
            recurse!(index);
        }
        ExprKind::Cast { to, from } => {
            retype!(to);
            recurse!(from);
        }
        ExprKind::Sizeof { ty }
        | ExprKind::Alignof { ty }
        | ExprKind::Typeinfo { ty }
        | ExprKind::Typenameof { ty } => retype!(ty),
        ExprKind::New { ty, amount, inputs, .. } => {
            retype!(ty);
            if let Some(amount) = amount {
                recurse!(amount);
            }
            if let Some(inputs) = inputs {
                recurse_all!(inputs);
            }
        }
        ExprKind::Ternary {
            condition,
            if_true,
            if_false,
        } => {
            recurse!(condition);
            recurse!(if_true);
            recurse!(if_false);
        }
        ExprKind::InitList(values) => recurse_all!(values),
        ExprKind::StaticArray { ty, values } | ExprKind::StaticStruct { ty, values } => {
            retype!(ty);
            recurse_all!(values);
        }
        ExprKind::VaArg { va_list, ty } => {
            recurse!(va_list);
            retype!(ty);
        }
        ExprKind::Declare { ty, value, inputs, .. } => {
            retype!(ty);
            if let Some(value) = value {
                recurse!(value);
            }
            if let Some(inputs) = inputs {
                recurse_all!(inputs);
            }
        }
        ExprKind::Assign { destination, value, .. } => {
            recurse!(destination);
            recurse!(value);
        }
        ExprKind::CompoundAssign { destination, value, .. } => {
            recurse!(destination);
            recurse!(value);
        }
        ExprKind::Return { value, last_minute } => {
            if let Some(value) = value {
                recurse!(value);
            }
            recurse_all!(last_minute);
        }
        ExprKind::If {
            condition,
            statements,
            else_statements,
            ..
        } => {
            recurse!(condition);
            recurse_all!(statements);
            if let Some(else_statements) = else_statements {
                recurse_all!(else_statements);
            }
        }
        ExprKind::While {
            condition, statements, ..
        } => {
            recurse!(condition);
            recurse_all!(statements);
        }
        ExprKind::Repeat { limit, statements, .. } => {
            recurse!(limit);
            recurse_all!(statements);
        }
        ExprKind::Each {
            it_type,
            array,
            length,
            statements,
            ..
        } => {
            retype!(it_type);
            recurse!(array);
            recurse!(length);
            recurse_all!(statements);
        }
        ExprKind::For {
            before,
            condition,
            after,
            statements,
            ..
        } => {
            recurse_all!(before);
            if let Some(condition) = condition {
                recurse!(condition);
            }
            recurse_all!(after);
            recurse_all!(statements);
        }
        ExprKind::Switch {
            value,
            cases,
            default_statements,
            ..
        } => {
            recurse!(value);
            for case in cases.iter_mut() {
                resolve_expr(catalog, collector.as_deref_mut(), &mut case.value)?;
                recurse_all!(case.statements);
            }
            if let Some(default_statements) = default_statements {
                recurse_all!(default_statements);
            }
        }
        ExprKind::Block(statements) => recurse_all!(statements),
        ExprKind::VaCopy {
            destination,
            source_list,
        } => {
            recurse!(destination);
            recurse!(source_list);
        }

        // Leaves without nested types or expressions
        ExprKind::Boolean(_)
        | ExprKind::GenericInt(_)
        | ExprKind::GenericFloat(_)
        | ExprKind::Byte(_)
        | ExprKind::Ubyte(_)
        | ExprKind::Short(_)
        | ExprKind::Ushort(_)
        | ExprKind::Int(_)
        | ExprKind::Uint(_)
        | ExprKind::Long(_)
        | ExprKind::Ulong(_)
        | ExprKind::Usize(_)
        | ExprKind::Float(_)
        | ExprKind::Double(_)
        | ExprKind::Str(_)
        | ExprKind::CStr(_)
        | ExprKind::Null
        | ExprKind::Variable(_)
        | ExprKind::EnumValue { .. }
        | ExprKind::UnknownEnumValue { .. }
        | ExprKind::NewCstring(_)
        | ExprKind::Embed(_)
        | ExprKind::Break
        | ExprKind::BreakTo { .. }
        | ExprKind::Continue
        | ExprKind::ContinueTo { .. }
        | ExprKind::Fallthrough
        | ExprKind::Asm { .. } => {}
    }

    Ok(())
}

/// Resolve a list of statements in-place
pub fn resolve_exprs(
    catalog: &PolyCatalog,
    mut collector: Option<&mut RttiCollector>,
    exprs: &mut [Expr],
) -> Result<(), ResolveError> {
    for expr in exprs {
        resolve_expr(catalog, collector.as_deref_mut(), expr)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identical::types_identical;
    use adept_diagnostics::Source;

    fn catalog_with_int_t() -> PolyCatalog {
        let mut catalog = PolyCatalog::new();
        catalog.add_type("T", &Type::base("int"));
        catalog.add_count("N", 4);
        catalog
    }

    #[test]
    fn test_substitution() {
        let catalog = catalog_with_int_t();

        let resolved = resolve_type(&catalog, None, &Type::polymorph("T")).expect("resolve");
        assert!(types_identical(&resolved, &Type::base("int")));
    }

    #[test]
    fn test_pointer_binding_splices() {
        let mut catalog = PolyCatalog::new();
        catalog.add_type("T", &Type::base("ubyte").pointer_to());

        let template = Type::new(
            vec![TypeElem::Pointer, TypeElem::Polymorph { name: "T".into() }],
            Source::NONE,
        );

        let resolved = resolve_type(&catalog, None, &template).expect("resolve");
        assert_eq!(resolved.to_string(), "**ubyte");
        assert_eq!(resolved.elements.len(), 3);
    }

    #[test]
    fn test_polycount_becomes_fixed_array() {
        let catalog = catalog_with_int_t();

        let template = Type::new(
            vec![TypeElem::Polycount { name: "N".into() }, TypeElem::Base { name: "int".into() }],
            Source::NONE,
        );

        let resolved = resolve_type(&catalog, None, &template).expect("resolve");
        assert_eq!(resolved.to_string(), "4 int");
    }

    #[test]
    fn test_unresolved_polymorph_reports_name() {
        let catalog = PolyCatalog::new();
        let error = resolve_type(&catalog, None, &Type::polymorph("Missing")).unwrap_err();
        assert_eq!(
            error,
            ResolveError::UnresolvedPolymorph { name: "Missing".into() }
        );
    }

    #[test]
    fn test_idempotent_on_concrete() {
        let catalog = catalog_with_int_t();
        let concrete = Type::new(
            vec![
                TypeElem::FixedArray { length: 2 },
                TypeElem::Pointer,
                TypeElem::Base { name: "double".into() },
            ],
            Source::NONE,
        );

        let resolved = resolve_type(&catalog, None, &concrete).expect("resolve");
        assert!(types_identical(&resolved, &concrete));
    }

    #[test]
    fn test_expr_resolution_covers_types() {
        let catalog = catalog_with_int_t();
        let mut expr = Expr::new(
            ExprKind::Sizeof { ty: Type::polymorph("T") },
            Source::NONE,
        );

        resolve_expr(&catalog, None, &mut expr).expect("resolve");

        match expr.kind {
            ExprKind::Sizeof { ty } => assert!(types_identical(&ty, &Type::base("int"))),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_polycount_expr_becomes_literal() {
        let catalog = catalog_with_int_t();
        let mut expr = Expr::new(ExprKind::Polycount("N".into()), Source::NONE);

        resolve_expr(&catalog, None, &mut expr).expect("resolve");
        assert_eq!(expr.kind, ExprKind::Usize(4));
    }

    #[test]
    fn test_collector_sees_resolved_types() {
        let catalog = catalog_with_int_t();
        let mut collector = RttiCollector::new();

        resolve_type(&catalog, Some(&mut collector), &Type::polymorph("T")).expect("resolve");
        assert!(collector.types_used.contains(&Type::base("int")));
    }
}
