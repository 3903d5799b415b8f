// AST type → IR type resolution

use crate::ctx::GenContext;
use crate::error::{fatal, GenResult};
use adept_ast::{Composite, PolyCatalog, Type, TypeElem};
use adept_ir::{IrType, IrTypeId};

/// Primitive base-name table. `usize` and `ulong` share a kind, as do
/// `bool` and `successful`.
pub fn primitive_ir_type(name: &str) -> Option<IrType> {
    Some(match name {
        "bool" | "successful" => IrType::Boolean,
        "byte" => IrType::S8,
        "ubyte" => IrType::U8,
        "short" => IrType::S16,
        "ushort" => IrType::U16,
        "int" => IrType::S32,
        "uint" => IrType::U32,
        "long" => IrType::S64,
        "ulong" | "usize" => IrType::U64,
        "float" => IrType::F32,
        "double" => IrType::F64,
        "void" => IrType::Void,
        _ => return None,
    })
}

pub fn is_primitive_name(name: &str) -> bool {
    primitive_ir_type(name).is_some() || name == "ptr"
}

/// Resolve a concrete AST type to its pooled IR type.
/// Polymorphs must have been substituted away before this point.
pub fn resolve_ir_type(ctx: &mut GenContext, ty: &Type) -> GenResult<IrTypeId> {
    resolve_ir_type_at(ctx, ty, 0)
}

fn resolve_ir_type_at(ctx: &mut GenContext, ty: &Type, at: usize) -> GenResult<IrTypeId> {
    let Some(elem) = ty.elements.get(at) else {
        ctx.panic(ty.source, "cannot resolve empty type");
        return fatal();
    };

    match elem.clone() {
        TypeElem::Base { name } => {
            if name == "ptr" {
                return Ok(ctx.module.common.ptr_type);
            }

            if let Some(primitive) = primitive_ir_type(&name) {
                return Ok(ctx.module.pool.intern(primitive));
            }

            if let Some(existing) = ctx.module.type_map.find(&name) {
                return Ok(existing);
            }

            // Expand non-generic aliases
            if let Some(alias) = ctx.ast.find_alias(&name) {
                if !alias.generics.is_empty() {
                    let message =
                        format!("cannot use generic alias '{}' without type parameters", name);
                    ctx.panic(ty.source, message);
                    return fatal();
                }
                let strong_type = alias.strong_type.clone();
                return resolve_ir_type(ctx, &strong_type);
            }

            // Enums lower to their backing integer
            if ctx.ast.find_enum(&name).is_some() {
                return Ok(ctx.module.pool.intern(IrType::U64));
            }

            if let Some(composite_id) = ctx.ast.find_composite_id(&name) {
                let composite = ctx.ast.composites[composite_id].clone();

                if composite.is_polymorphic() {
                    let message = format!(
                        "cannot use polymorphic type '{}' without type parameters",
                        name
                    );
                    ctx.panic(ty.source, message);
                    return fatal();
                }

                let signature = Type::base(name.clone());
                return materialize_composite(ctx, &composite, &PolyCatalog::new(), &name, &signature);
            }

            let message = format!("undeclared type '{}'", name);
            ctx.panic(ty.source, message);
            fatal()
        }
        TypeElem::Pointer => {
            let elem_type = resolve_ir_type_at(ctx, ty, at + 1)?;
            Ok(ctx.module.pool.pointer_to(elem_type))
        }
        // Unbounded array views decay to a pointer to the element type
        TypeElem::Array => {
            let elem_type = resolve_ir_type_at(ctx, ty, at + 1)?;
            Ok(ctx.module.pool.pointer_to(elem_type))
        }
        TypeElem::FixedArray { length } => {
            let elem_type = resolve_ir_type_at(ctx, ty, at + 1)?;
            Ok(ctx.module.pool.fixed_array_of(elem_type, length))
        }
        TypeElem::Func {
            arg_types,
            return_type,
            traits,
        } => {
            let mut ir_arg_types = Vec::with_capacity(arg_types.len());
            for arg_type in &arg_types {
                ir_arg_types.push(resolve_ir_type(ctx, arg_type)?);
            }
            let ir_return_type = resolve_ir_type(ctx, &return_type)?;

            let funcptr = ctx.module.pool.intern(IrType::FuncPtr {
                arg_types: ir_arg_types,
                return_type: ir_return_type,
                is_vararg: traits.contains(adept_ast::FuncElemTraits::VARARG),
            });
            Ok(ctx.module.pool.pointer_to(funcptr))
        }
        TypeElem::GenericBase {
            name,
            generics,
            name_is_polymorphic,
        } => {
            if name_is_polymorphic {
                ctx.panic(ty.source, "unresolved polymorphic base name");
                return fatal();
            }

            let mangled = Type::new(vec![elem.clone()], ty.source).to_string();

            if let Some(existing) = ctx.module.type_map.find(&mangled) {
                return Ok(existing);
            }

            let Some(composite_id) = ctx.ast.find_composite_id(&name) else {
                let message = format!("undeclared type '{}'", name);
                ctx.panic(ty.source, message);
                return fatal();
            };
            let composite = ctx.ast.composites[composite_id].clone();

            if composite.generics.len() != generics.len() {
                let message = format!(
                    "wrong number of type parameters for '{}': got {}, expected {}",
                    name,
                    generics.len(),
                    composite.generics.len()
                );
                ctx.panic(ty.source, message);
                return fatal();
            }

            let mut catalog = PolyCatalog::new();
            catalog.add_types(composite.generics.iter().map(String::as_str), &generics);

            let signature = Type::new(vec![elem.clone()], ty.source);
            materialize_composite(ctx, &composite, &catalog, &mangled, &signature)
        }
        // Forced concretization defaults for unsuffixed literals
        TypeElem::GenericInt => Ok(ctx.module.pool.intern(IrType::S32)),
        TypeElem::GenericFloat => Ok(ctx.module.pool.intern(IrType::F64)),
        TypeElem::Polymorph { name } | TypeElem::PolymorphPrereq { name, .. } => {
            let message = format!("unresolved polymorph '${}' reached IR generation", name);
            ctx.panic(ty.source, message);
            fatal()
        }
        TypeElem::Polycount { name } => {
            let message = format!("unresolved polymorphic count '$#{}' reached IR generation", name);
            ctx.panic(ty.source, message);
            fatal()
        }
        TypeElem::VarFixedArray { .. } => {
            ctx.panic(ty.source, "fixed-array length was never evaluated");
            fatal()
        }
        TypeElem::UnknownEnum { kind_name } => {
            let message = format!("enum member '::{}' was never matched to an enum", kind_name);
            ctx.panic(ty.source, message);
            fatal()
        }
    }
}

/// Lower a composite into a pooled structure under `registered_name`.
/// Classes get an implicit leading vtable pointer field.
fn materialize_composite(
    ctx: &mut GenContext,
    composite: &Composite,
    catalog: &PolyCatalog,
    registered_name: &str,
    signature: &Type,
) -> GenResult<IrTypeId> {
    use adept_ast::CompositeTraits;

    // Reserve first so recursive references (fields pointing back at
    // this composite) resolve to the reserved id
    let structure = ctx.module.pool.reserve_structure();
    ctx.module.type_map.insert(registered_name, structure);

    if composite.is_class {
        ctx.class_signatures.push(signature.clone());
    }

    let mut fields = Vec::with_capacity(composite.fields.len() + 1);

    if composite.is_class {
        // Implicit vtable pointer occupies member index 0
        let ptr = ctx.module.common.ptr_type;
        fields.push(ctx.module.pool.pointer_to(ptr));
    }

    for field in &composite.fields {
        let field_type = if catalog.is_empty() {
            field.ty.clone()
        } else {
            let collector = ctx.module.rtti_collector.as_mut();
            match adept_ast::resolve_type(catalog, collector, &field.ty) {
                Ok(resolved) => resolved,
                Err(error) => {
                    ctx.panic(field.ty.source, error.to_string());
                    return fatal();
                }
            }
        };

        fields.push(resolve_ir_type(ctx, &field_type)?);
    }

    let is_packed = composite.traits.contains(CompositeTraits::PACKED);
    ctx.module.pool.bind_structure(structure, fields, is_packed);
    Ok(structure)
}

/// Number of implicit leading fields of a composite's IR structure
pub fn member_index_offset(composite: &Composite) -> usize {
    usize::from(composite.is_class)
}
