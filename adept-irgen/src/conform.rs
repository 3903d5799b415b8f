// Argument conformation
// Implicit conversions applied when matching call arguments (and return
// values) against expected types. STRICT is the first-pass gate: only
// literal concretization and enum member resolution. LOOSE additionally
// allows builtin primitive and pointer conversions.

use crate::builder::Builder;
use crate::error::GenResult;
use crate::gen_type::{is_primitive_name, primitive_ir_type, resolve_ir_type};
use adept_ast::{types_identical, Func, Type, TypeElem};
use adept_ir::{CastKind, IrMathOp, IrType, IrValue, Literal, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConformMode {
    Strict,
    Loose,
}

/// Try to conform `value` (of AST type `from_type`) to `to_type`,
/// emitting conversion instructions as needed. On success the value has
/// been replaced and the caller should treat its AST type as `to_type`.
/// Returns false (with nothing emitted) when conformation is impossible.
pub fn ast_types_conform(
    builder: &mut Builder,
    value: &mut IrValue,
    from_type: &Type,
    to_type: &Type,
    mode: ConformMode,
) -> GenResult<bool> {
    if types_identical(from_type, to_type) {
        return Ok(true);
    }

    // Unsuffixed literals concretize to the expected primitive
    if let Some(concretized) = conform_generic_literal(builder, value, from_type, to_type, mode)? {
        return Ok(concretized);
    }

    // Enum members with unknown owner resolve against an expected enum
    if let Some(resolved) = conform_unknown_enum(builder, value, from_type, to_type)? {
        return Ok(resolved);
    }

    if mode != ConformMode::Loose {
        return Ok(false);
    }

    // Primitive-to-primitive builtin conversions
    if let (Some(from_name), Some(to_name)) = (primitive_name(from_type), primitive_name(to_type)) {
        return conform_primitive(builder, value, from_name, to_name, to_type);
    }

    // Pointer conversions: *T <-> ptr, *T -> *U never
    let from_is_ptr = from_type.is_pointer() || from_type.is_base_named("ptr");
    let to_is_ptr = to_type.is_pointer() || to_type.is_base_named("ptr");

    if from_is_ptr && to_is_ptr {
        let generalizing = from_type.is_pointer() && to_type.is_base_named("ptr");
        let specializing = from_type.is_base_named("ptr") && to_type.is_pointer();

        if generalizing || specializing {
            let to_ir_type = resolve_ir_type(builder.ctx, to_type)?;
            *value = builder.build_cast(CastKind::Bitcast, value.clone(), to_ir_type);
            return Ok(true);
        }

        // Class upcast: a pointer to a child class conforms to a
        // pointer to any of its ancestors
        if let (Some(from_pointee), Some(to_pointee)) =
            (from_type.dereferenced(), to_type.dereferenced())
        {
            let from_is_class = from_pointee
                .struct_name()
                .and_then(|name| builder.ctx.ast.find_composite(name))
                .is_some_and(|composite| composite.is_class);

            if from_is_class
                && crate::polymorphable::class_extends(builder.ctx, &from_pointee, &to_pointee)?
            {
                let to_ir_type = resolve_ir_type(builder.ctx, to_type)?;
                *value = builder.build_cast(CastKind::Bitcast, value.clone(), to_ir_type);
                return Ok(true);
            }
        }
    }

    Ok(false)
}

fn primitive_name(ty: &Type) -> Option<&str> {
    let name = match ty.elements.as_slice() {
        [TypeElem::Base { name }] => name.as_str(),
        _ => return None,
    };
    (is_primitive_name(name) && name != "ptr" && name != "void").then_some(name)
}

/// GenericInt/GenericFloat literals take on the expected primitive type.
/// Integer literals accept integer targets in STRICT mode and float
/// targets only in LOOSE mode.
fn conform_generic_literal(
    builder: &mut Builder,
    value: &mut IrValue,
    from_type: &Type,
    to_type: &Type,
    mode: ConformMode,
) -> GenResult<Option<bool>> {
    let from_generic_int = matches!(from_type.elements.as_slice(), [TypeElem::GenericInt]);
    let from_generic_float = matches!(from_type.elements.as_slice(), [TypeElem::GenericFloat]);

    if !from_generic_int && !from_generic_float {
        return Ok(None);
    }

    let Some(to_name) = primitive_name(to_type) else {
        return Ok(None);
    };
    let Some(to_kind) = primitive_ir_type(to_name) else {
        return Ok(None);
    };

    let payload = match &value.kind {
        ValueKind::Literal(literal) => literal.clone(),
        _ => return Ok(Some(false)),
    };

    let rewritten = if from_generic_int {
        let bits = match payload.as_u64() {
            Some(bits) => bits,
            None => return Ok(Some(false)),
        };

        match (&to_kind, mode) {
            (IrType::F32, ConformMode::Loose) => Literal::F32(bits as i64 as f32),
            (IrType::F64, ConformMode::Loose) => Literal::F64(bits as i64 as f64),
            (IrType::F32 | IrType::F64, ConformMode::Strict) => return Ok(Some(false)),
            _ if to_kind.is_integer_like() => match rewrite_int_literal(bits, &to_kind) {
                Some(literal) => literal,
                None => return Ok(Some(false)),
            },
            _ => return Ok(Some(false)),
        }
    } else {
        let float = match payload.as_f64() {
            Some(float) => float,
            None => return Ok(Some(false)),
        };

        match to_kind {
            IrType::F32 => Literal::F32(float as f32),
            IrType::F64 => Literal::F64(float),
            // Float literals never silently become integers
            _ => return Ok(Some(false)),
        }
    };

    *value = builder.build_literal(rewritten);
    Ok(Some(true))
}

fn rewrite_int_literal(bits: u64, to_kind: &IrType) -> Option<Literal> {
    Some(match to_kind {
        IrType::Boolean => Literal::Bool(bits != 0),
        IrType::S8 => Literal::S8(bits as i8),
        IrType::U8 => Literal::U8(bits as u8),
        IrType::S16 => Literal::S16(bits as i16),
        IrType::U16 => Literal::U16(bits as u16),
        IrType::S32 => Literal::S32(bits as i32),
        IrType::U32 => Literal::U32(bits as u32),
        IrType::S64 => Literal::S64(bits as i64),
        IrType::U64 => Literal::U64(bits),
        _ => return None,
    })
}

/// `::KIND` values resolve once the expected type names an enum that
/// declares the member
fn conform_unknown_enum(
    builder: &mut Builder,
    value: &mut IrValue,
    from_type: &Type,
    to_type: &Type,
) -> GenResult<Option<bool>> {
    let kind_name = match from_type.elements.as_slice() {
        [TypeElem::UnknownEnum { kind_name }] => kind_name.clone(),
        _ => return Ok(None),
    };

    let Some(enum_name) = to_type.struct_name() else {
        return Ok(Some(false));
    };

    let Some(enumeration) = builder.ctx.ast.find_enum(enum_name) else {
        return Ok(Some(false));
    };

    let Some(index) = enumeration.kind_index(&kind_name) else {
        let message = format!(
            "enum '{}' has no member named '{}'",
            enum_name, kind_name
        );
        return builder.panic(from_type.source, message).map(Some);
    };

    *value = builder.build_literal(Literal::U64(index as u64));
    Ok(Some(true))
}

/// Builtin numeric conversions between primitives (LOOSE only)
fn conform_primitive(
    builder: &mut Builder,
    value: &mut IrValue,
    from_name: &str,
    to_name: &str,
    to_type: &Type,
) -> GenResult<bool> {
    let Some(from_kind) = primitive_ir_type(from_name) else {
        return Ok(false);
    };
    let Some(to_kind) = primitive_ir_type(to_name) else {
        return Ok(false);
    };

    if from_kind == to_kind {
        return Ok(true);
    }

    let to_ir_type = resolve_ir_type(builder.ctx, to_type)?;

    // int -> bool is a comparison against zero rather than a cast
    if to_kind == IrType::Boolean && from_kind.is_integer_like() {
        let zero = match rewrite_int_literal(0, &from_kind) {
            Some(literal) => builder.build_literal(literal),
            None => return Ok(false),
        };
        *value = builder.build_math(IrMathOp::NotEquals, value.clone(), zero, to_ir_type);
        return Ok(true);
    }

    let cast_kind = match (
        from_kind.is_float(),
        to_kind.is_float(),
        from_kind.bits(),
        to_kind.bits(),
    ) {
        (false, false, Some(from_bits), Some(to_bits)) => {
            if to_bits > from_bits {
                if from_kind.is_signed() {
                    CastKind::Sext
                } else {
                    CastKind::Zext
                }
            } else if to_bits < from_bits {
                CastKind::Trunc
            } else {
                CastKind::Bitcast
            }
        }
        (false, true, _, _) => {
            if from_kind.is_signed() {
                CastKind::SiToFp
            } else {
                CastKind::UiToFp
            }
        }
        (true, false, _, _) => {
            if to_kind.is_signed() {
                CastKind::FpToSi
            } else {
                CastKind::FpToUi
            }
        }
        (true, true, Some(from_bits), Some(to_bits)) => {
            if to_bits > from_bits {
                CastKind::Fext
            } else {
                CastKind::Ftrunc
            }
        }
        _ => return Ok(false),
    };

    *value = builder.build_cast(cast_kind, value.clone(), to_ir_type);
    Ok(true)
}

/// Returns whether a builtin auto conversion between two types would be
/// accepted under LOOSE conformation, without performing it
pub fn is_allowed_builtin_auto_conversion(from_type: &Type, to_type: &Type) -> bool {
    let generic_from = matches!(
        from_type.elements.as_slice(),
        [TypeElem::GenericInt] | [TypeElem::GenericFloat]
    );

    (generic_from || primitive_name(from_type).is_some()) && primitive_name(to_type).is_some()
}

/// Conform every provided argument of a call to its parameter type.
/// Arity may fall short only when the remaining parameters all carry
/// defaults; it may exceed only for vararg/variadic functions.
/// All-or-nothing: failure rolls back any emitted conversions.
pub fn func_args_conform(
    builder: &mut Builder,
    func: &Func,
    arg_values: &mut [IrValue],
    arg_types: &mut [Type],
    gives: Option<&Type>,
    mode: ConformMode,
) -> GenResult<bool> {
    use adept_ast::FuncTraits;

    if !arity_compatible(func, arg_values.len()) {
        return Ok(false);
    }

    if let Some(gives) = gives {
        if !types_identical(&func.return_type, gives) {
            return Ok(false);
        }
    }

    // Conform onto clones and commit only on success, so a failed
    // candidate leaves the argument vector untouched for the next one
    let snapshot = builder.snapshot();
    let checked = func.arity().min(arg_values.len());
    let mut new_values = arg_values.to_vec();
    let mut new_types = arg_types.to_vec();

    for i in 0..checked {
        let param_type = func.params[i].ty.clone();

        let conformed =
            ast_types_conform(builder, &mut new_values[i], &new_types[i], &param_type, mode)?;

        if !conformed {
            builder.restore(snapshot);
            return Ok(false);
        }

        new_types[i] = param_type;
    }

    arg_values.clone_from_slice(&new_values);
    arg_types.clone_from_slice(&new_types);

    // Trailing arguments beyond a vararg arity are passed through as-is
    debug_assert!(
        arg_values.len() <= func.arity()
            || func
                .traits
                .intersects(FuncTraits::VARARG | FuncTraits::VARIADIC)
    );

    Ok(true)
}

/// Rigid matching: identical types, no conversions, no default filling.
/// Arity must be exact (varargs may exceed it).
pub fn func_args_match(func: &Func, arg_types: &[Type]) -> bool {
    use adept_ast::FuncTraits;

    let arity_ok = arg_types.len() == func.arity()
        || (arg_types.len() > func.arity()
            && func.traits.intersects(FuncTraits::VARARG | FuncTraits::VARIADIC));

    if !arity_ok {
        return false;
    }

    arg_types[..func.arity()]
        .iter()
        .zip(func.params.iter())
        .all(|(arg_type, param)| types_identical(arg_type, &param.ty))
}

pub fn arity_compatible(func: &Func, provided: usize) -> bool {
    use adept_ast::FuncTraits;

    match provided.cmp(&func.arity()) {
        std::cmp::Ordering::Equal => true,
        std::cmp::Ordering::Less => func.defaults_cover(provided),
        std::cmp::Ordering::Greater => func
            .traits
            .intersects(FuncTraits::VARARG | FuncTraits::VARIADIC),
    }
}
