// Polymorphability
// Decides whether a concrete type unifies with a polymorphic template
// under some extension of the catalog, binding parameters as it goes.

use crate::conform::ConformMode;
use crate::ctx::GenContext;
use crate::error::{fatal, not_found, GenResult};
use crate::gen_type::is_primitive_name;
use adept_ast::{
    elems_identical, resolve_type, types_identical, Composite, Func, PolyCatalog, Type, TypeElem,
};
use adept_diagnostics::Source;

/// Concretize transient literal types before binding them to a
/// polymorphic parameter: `3` binds `$T := int`, `3.0` binds
/// `$T := double`
fn concretized(ty: &Type) -> Type {
    match ty.elements.as_slice() {
        [TypeElem::GenericInt] => Type::base("int"),
        [TypeElem::GenericFloat] => Type::base("double"),
        _ => ty.clone(),
    }
}

/// Check whether `concrete` unifies with `template`, extending
/// `catalog` with any new bindings. `NotFound` is a silent mismatch;
/// `Fatal` is a surfaced error (invalid prerequisite, broken state).
pub fn type_polymorphable(
    ctx: &mut GenContext,
    template: &Type,
    concrete: &Type,
    catalog: &mut PolyCatalog,
    mode: ConformMode,
) -> GenResult<()> {
    let mut t = 0;
    let mut c = 0;

    while t < template.elements.len() {
        let template_elem = &template.elements[t];

        let Some(concrete_elem) = concrete.elements.get(c) else {
            return not_found();
        };

        match template_elem {
            TypeElem::Polymorph { name } => {
                // A trailing polymorph consumes the rest of the concrete type
                let tail = Type::new(concrete.elements[c..].to_vec(), concrete.source);
                let binding = concretized(&tail);

                if !catalog.try_bind_type(name, &binding) {
                    return not_found();
                }
                return Ok(());
            }
            TypeElem::PolymorphPrereq {
                name,
                similarity,
                extends,
            } => {
                let tail = Type::new(concrete.elements[c..].to_vec(), concrete.source);
                let binding = concretized(&tail);

                if let Some(similarity) = similarity {
                    check_similarity(ctx, similarity, &binding, template.source)?;
                }

                if let Some(extends) = extends {
                    let resolved_extends = resolve_type(catalog, None, extends)
                        .unwrap_or_else(|_| (**extends).clone());
                    check_extends(ctx, &binding, &resolved_extends)?;
                }

                if !catalog.try_bind_type(name, &binding) {
                    return not_found();
                }
                return Ok(());
            }
            TypeElem::Polycount { name } => {
                let TypeElem::FixedArray { length } = concrete_elem else {
                    return not_found();
                };

                if !catalog.try_bind_count(name, *length) {
                    return not_found();
                }
                t += 1;
                c += 1;
            }
            TypeElem::Pointer => {
                if !matches!(concrete_elem, TypeElem::Pointer) {
                    return not_found();
                }
                t += 1;
                c += 1;
            }
            TypeElem::Array => {
                if !matches!(concrete_elem, TypeElem::Array) {
                    return not_found();
                }
                t += 1;
                c += 1;
            }
            TypeElem::FixedArray { length } => {
                let TypeElem::FixedArray { length: concrete_length } = concrete_elem else {
                    return not_found();
                };
                if length != concrete_length {
                    return not_found();
                }
                t += 1;
                c += 1;
            }
            TypeElem::GenericBase {
                name,
                generics,
                name_is_polymorphic,
            } => {
                let TypeElem::GenericBase {
                    name: concrete_name,
                    generics: concrete_generics,
                    name_is_polymorphic: concrete_poly,
                } = concrete_elem
                else {
                    return not_found();
                };

                if *name_is_polymorphic || *concrete_poly {
                    ctx.panic(
                        template.source,
                        "polymorphic base names cannot be unified",
                    );
                    return fatal();
                }

                if name != concrete_name || generics.len() != concrete_generics.len() {
                    return not_found();
                }

                let concrete_generics = concrete_generics.clone();
                let generics = generics.clone();

                for (template_generic, concrete_generic) in
                    generics.iter().zip(concrete_generics.iter())
                {
                    type_polymorphable(ctx, template_generic, concrete_generic, catalog, mode)?;
                }
                t += 1;
                c += 1;
            }
            TypeElem::Func {
                arg_types,
                return_type,
                traits,
            } => {
                let TypeElem::Func {
                    arg_types: concrete_args,
                    return_type: concrete_return,
                    traits: concrete_traits,
                } = concrete_elem
                else {
                    return not_found();
                };

                if traits != concrete_traits || arg_types.len() != concrete_args.len() {
                    return not_found();
                }

                let arg_types = arg_types.clone();
                let concrete_args = concrete_args.clone();
                let return_type = (**return_type).clone();
                let concrete_return = (**concrete_return).clone();

                for (template_arg, concrete_arg) in arg_types.iter().zip(concrete_args.iter()) {
                    type_polymorphable(ctx, template_arg, concrete_arg, catalog, mode)?;
                }
                type_polymorphable(ctx, &return_type, &concrete_return, catalog, mode)?;
                t += 1;
                c += 1;
            }
            TypeElem::Base { name } => {
                // Literal widening against a concrete primitive parameter
                // is accepted only when the query allows it
                if mode == ConformMode::Loose
                    && is_primitive_name(name)
                    && matches!(
                        concrete_elem,
                        TypeElem::GenericInt | TypeElem::GenericFloat
                    )
                {
                    t += 1;
                    c += 1;
                    continue;
                }

                if matches!(concrete_elem, TypeElem::GenericInt) && name == "int" {
                    t += 1;
                    c += 1;
                    continue;
                }
                if matches!(concrete_elem, TypeElem::GenericFloat) && name == "double" {
                    t += 1;
                    c += 1;
                    continue;
                }

                if !elems_identical(template_elem, concrete_elem) {
                    return not_found();
                }
                t += 1;
                c += 1;
            }
            _ => {
                if !elems_identical(template_elem, concrete_elem) {
                    return not_found();
                }
                t += 1;
                c += 1;
            }
        }
    }

    if c == concrete.elements.len() {
        Ok(())
    } else {
        not_found()
    }
}

/// Similarity prerequisites classify the bound type structurally
fn check_similarity(
    ctx: &mut GenContext,
    similarity: &str,
    binding: &Type,
    source: Source,
) -> GenResult<()> {
    let base_name = match binding.elements.as_slice() {
        [TypeElem::Base { name }] => Some(name.as_str()),
        _ => None,
    };

    let satisfied = match similarity {
        "__primitive__" => base_name.is_some_and(is_primitive_name),
        "__number__" => base_name.is_some_and(|name| {
            matches!(
                name,
                "byte" | "ubyte" | "short" | "ushort" | "int" | "uint" | "long" | "ulong"
                    | "usize" | "float" | "double"
            )
        }),
        "__integer__" => base_name.is_some_and(|name| {
            matches!(
                name,
                "byte" | "ubyte" | "short" | "ushort" | "int" | "uint" | "long" | "ulong" | "usize"
            )
        }),
        "__float__" => base_name.is_some_and(|name| matches!(name, "float" | "double")),
        "__signed__" => {
            base_name.is_some_and(|name| matches!(name, "byte" | "short" | "int" | "long"))
        }
        "__unsigned__" => base_name.is_some_and(|name| {
            matches!(name, "ubyte" | "ushort" | "uint" | "ulong" | "usize")
        }),
        "__struct__" => binding
            .struct_name()
            .and_then(|name| ctx.ast.find_composite(name))
            .is_some_and(|composite| !composite.is_class),
        "__class__" => binding
            .struct_name()
            .and_then(|name| ctx.ast.find_composite(name))
            .is_some_and(|composite| composite.is_class),
        unknown => {
            let message = format!("unrecognized polymorph prerequisite '~{}'", unknown);
            ctx.panic(source, message);
            return fatal();
        }
    };

    if satisfied {
        Ok(())
    } else {
        not_found()
    }
}

/// `extends` prerequisites walk the class hierarchy of the bound type
fn check_extends(ctx: &mut GenContext, binding: &Type, expected_parent: &Type) -> GenResult<()> {
    if class_extends(ctx, binding, expected_parent)? {
        Ok(())
    } else {
        not_found()
    }
}

/// Whether `child` is (or transitively extends) the class `ancestor`
pub fn class_extends(ctx: &mut GenContext, child: &Type, ancestor: &Type) -> GenResult<bool> {
    let mut current = child.clone();

    loop {
        if types_identical(&current, ancestor) {
            return Ok(true);
        }

        let Some(name) = current.struct_name() else {
            return Ok(false);
        };
        let Some(composite) = ctx.ast.find_composite(name).cloned() else {
            return Ok(false);
        };

        match translate_parent_class(ctx, &composite, &current)? {
            Some(parent) => current = parent,
            None => return Ok(false),
        }
    }
}

/// Compute the concrete parent signature of a class usage by
/// substituting the usage's generics into the declared `extends` type
pub fn translate_parent_class(
    ctx: &mut GenContext,
    composite: &Composite,
    concrete_usage: &Type,
) -> GenResult<Option<Type>> {
    let Some(declared_parent) = composite.parent.clone() else {
        return Ok(None);
    };

    if !declared_parent.has_polymorph() {
        return Ok(Some(declared_parent));
    }

    let usage_generics = match concrete_usage.elements.as_slice() {
        [TypeElem::GenericBase { generics, .. }] => generics.clone(),
        _ => Vec::new(),
    };

    if usage_generics.len() != composite.generics.len() {
        let message = format!(
            "type parameter count mismatch resolving parent class of '{}'",
            composite.name
        );
        ctx.panic(composite.source, message);
        return fatal();
    }

    let mut catalog = PolyCatalog::new();
    catalog.add_types(composite.generics.iter().map(String::as_str), &usage_generics);

    match resolve_type(&catalog, None, &declared_parent) {
        Ok(parent) => Ok(Some(parent)),
        Err(error) => {
            ctx.panic(declared_parent.source, error.to_string());
            fatal()
        }
    }
}

/// Unify every call argument with a polymorphic function's parameters,
/// producing the binding catalog on success
pub fn func_args_polymorphable(
    ctx: &mut GenContext,
    func: &Func,
    arg_types: &[Type],
    gives: Option<&Type>,
    mode: ConformMode,
) -> GenResult<PolyCatalog> {
    use crate::conform::arity_compatible;

    if !arity_compatible(func, arg_types.len()) {
        return not_found();
    }

    let mut catalog = PolyCatalog::new();
    let checked = func.arity().min(arg_types.len());

    for i in 0..checked {
        type_polymorphable(ctx, &func.params[i].ty, &arg_types[i], &mut catalog, mode)?;
    }

    if let Some(gives) = gives {
        type_polymorphable(ctx, &func.return_type, gives, &mut catalog, mode)?;
    }

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use adept_ast::Ast;
    use adept_diagnostics::Diagnostics;

    fn with_ctx<R>(run: impl FnOnce(&mut GenContext) -> R) -> R {
        let config = CompilerConfig::default();
        let mut diagnostics = Diagnostics::default();
        let mut ast = Ast::new();
        let mut ctx = GenContext::new(&config, &mut diagnostics, &mut ast);
        run(&mut ctx)
    }

    #[test]
    fn test_simple_binding_round_trip() {
        with_ctx(|ctx| {
            let template = Type::polymorph("T");
            let concrete = Type::base("int").pointer_to();
            let mut catalog = PolyCatalog::new();

            type_polymorphable(ctx, &template, &concrete, &mut catalog, ConformMode::Strict)
                .expect("should unify");

            let resolved = resolve_type(&catalog, None, &template).expect("resolve");
            assert!(types_identical(&resolved, &concrete));
        });
    }

    #[test]
    fn test_pointer_template_recurses() {
        with_ctx(|ctx| {
            let template = Type::polymorph("T").pointer_to();
            let concrete = Type::base("double").pointer_to();
            let mut catalog = PolyCatalog::new();

            type_polymorphable(ctx, &template, &concrete, &mut catalog, ConformMode::Strict)
                .expect("should unify");
            assert!(catalog
                .find_type("T")
                .is_some_and(|t| t.is_base_named("double")));
        });
    }

    #[test]
    fn test_conflicting_bindings_mismatch() {
        with_ctx(|ctx| {
            let mut catalog = PolyCatalog::new();
            catalog.add_type("T", &Type::base("int"));

            let result = type_polymorphable(
                ctx,
                &Type::polymorph("T"),
                &Type::base("double"),
                &mut catalog,
                ConformMode::Strict,
            );
            assert_eq!(result, not_found());
        });
    }

    #[test]
    fn test_generic_int_concretizes_to_int() {
        with_ctx(|ctx| {
            let template = Type::polymorph("T");
            let concrete = Type::new(vec![TypeElem::GenericInt], Source::NONE);
            let mut catalog = PolyCatalog::new();

            type_polymorphable(ctx, &template, &concrete, &mut catalog, ConformMode::Strict)
                .expect("should unify");
            assert!(catalog.find_type("T").is_some_and(|t| t.is_base_named("int")));
        });
    }

    #[test]
    fn test_polycount_binds_fixed_array_length() {
        with_ctx(|ctx| {
            let template = Type::new(
                vec![
                    TypeElem::Polycount { name: "N".into() },
                    TypeElem::Base { name: "int".into() },
                ],
                Source::NONE,
            );
            let concrete = Type::new(
                vec![
                    TypeElem::FixedArray { length: 8 },
                    TypeElem::Base { name: "int".into() },
                ],
                Source::NONE,
            );

            let mut catalog = PolyCatalog::new();
            type_polymorphable(ctx, &template, &concrete, &mut catalog, ConformMode::Strict)
                .expect("should unify");
            assert_eq!(catalog.find_count("N"), Some(8));
        });
    }

    #[test]
    fn test_mismatched_base_names() {
        with_ctx(|ctx| {
            let mut catalog = PolyCatalog::new();
            let result = type_polymorphable(
                ctx,
                &Type::base("int"),
                &Type::base("double"),
                &mut catalog,
                ConformMode::Strict,
            );
            assert_eq!(result, not_found());
        });
    }

    #[test]
    fn test_number_prerequisite() {
        with_ctx(|ctx| {
            let template = Type::new(
                vec![TypeElem::PolymorphPrereq {
                    name: "T".into(),
                    similarity: Some("__number__".into()),
                    extends: None,
                }],
                Source::NONE,
            );

            let mut catalog = PolyCatalog::new();
            type_polymorphable(ctx, &template, &Type::base("int"), &mut catalog, ConformMode::Strict)
                .expect("int is a number");

            let mut catalog = PolyCatalog::new();
            let result = type_polymorphable(
                ctx,
                &template,
                &Type::base("bool"),
                &mut catalog,
                ConformMode::Strict,
            );
            assert_eq!(result, not_found());
        });
    }
}
