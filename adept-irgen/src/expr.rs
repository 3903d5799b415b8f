// Expression lowering
// Produces an IR value plus the AST type of every expression. With
// `leave_mutable` set, lvalue expressions yield a pointer to their
// storage instead of the loaded value.

use crate::builder::Builder;
use crate::conform::{ast_types_conform, ConformMode};
use crate::error::GenResult;
use crate::find::{
    check_qualifiers, find_proc_conforming, func_signature, report_undeclared, CallArgs,
    ConformQuery,
};
use crate::gen_type::{member_index_offset, resolve_ir_type};
use crate::management::{
    conform_or_error, handle_access_management, handle_math_management,
    handle_math_management_allow_other_direction, handle_pass_management, MathOperands,
};
use crate::rtti::rtti_for;
use adept_ast::{Expr, ExprKind, MathOp, PolyCatalog, Type, TypeElem};
use adept_diagnostics::Source;
use adept_ir::{IrMathOp, IrType, IrValue, Literal, ValueKind};

/// Generate IR for an expression.
/// Returns the value and its AST type. When `leave_mutable` is set and
/// the expression is an lvalue, the returned value is a pointer to the
/// expression's storage (the AST type still describes the pointee).
pub fn ir_gen_expr(
    builder: &mut Builder,
    expr: &Expr,
    leave_mutable: bool,
) -> GenResult<(IrValue, Type)> {
    let source = expr.source;

    match &expr.kind {
        // ---- literals ----
        ExprKind::Boolean(value) => {
            let literal = builder.build_literal(Literal::Bool(*value));
            Ok((literal, Type::base("bool")))
        }
        ExprKind::GenericInt(value) => {
            let literal = builder.build_literal(Literal::S64(*value));
            Ok((literal, Type::new(vec![TypeElem::GenericInt], source)))
        }
        ExprKind::GenericFloat(value) => {
            let literal = builder.build_literal(Literal::F64(*value));
            Ok((literal, Type::new(vec![TypeElem::GenericFloat], source)))
        }
        ExprKind::Byte(value) => Ok((builder.build_literal(Literal::S8(*value)), Type::base("byte"))),
        ExprKind::Ubyte(value) => {
            Ok((builder.build_literal(Literal::U8(*value)), Type::base("ubyte")))
        }
        ExprKind::Short(value) => {
            Ok((builder.build_literal(Literal::S16(*value)), Type::base("short")))
        }
        ExprKind::Ushort(value) => {
            Ok((builder.build_literal(Literal::U16(*value)), Type::base("ushort")))
        }
        ExprKind::Int(value) => Ok((builder.build_literal(Literal::S32(*value)), Type::base("int"))),
        ExprKind::Uint(value) => {
            Ok((builder.build_literal(Literal::U32(*value)), Type::base("uint")))
        }
        ExprKind::Long(value) => {
            Ok((builder.build_literal(Literal::S64(*value)), Type::base("long")))
        }
        ExprKind::Ulong(value) => {
            Ok((builder.build_literal(Literal::U64(*value)), Type::base("ulong")))
        }
        ExprKind::Usize(value) => {
            Ok((builder.build_literal(Literal::Usize(*value)), Type::base("usize")))
        }
        ExprKind::Float(value) => {
            Ok((builder.build_literal(Literal::F32(*value)), Type::base("float")))
        }
        ExprKind::Double(value) => {
            Ok((builder.build_literal(Literal::F64(*value)), Type::base("double")))
        }
        ExprKind::Str(text) => ir_gen_string_literal(builder, text, source),
        ExprKind::CStr(text) => {
            let value = builder.build_cstr_of_len(text.as_bytes().to_vec());
            Ok((value, ubyte_ptr_type(source)))
        }
        ExprKind::Null => Ok((builder.build_null_pointer(), Type::base("ptr"))),

        // ---- variables ----
        ExprKind::Variable(name) => ir_gen_variable(builder, name, leave_mutable, source),
        ExprKind::EnumValue { enum_name, kind } => {
            let Some(enumeration) = builder.ctx.ast.find_enum(enum_name) else {
                let message = format!("undeclared enum '{}'", enum_name);
                return builder.panic(source, message);
            };
            let Some(index) = enumeration.kind_index(kind) else {
                let message = format!("enum '{}' has no member named '{}'", enum_name, kind);
                return builder.panic(source, message);
            };
            let value = builder.build_literal(Literal::U64(index as u64));
            Ok((value, Type::base(enum_name.clone())))
        }
        ExprKind::UnknownEnumValue { kind } => {
            let u64_type = builder.ctx.module.pool.intern(IrType::U64);
            let value = IrValue::new(
                u64_type,
                ValueKind::UnknownEnum {
                    kind_name: kind.clone(),
                },
            );
            let ty = Type::new(vec![TypeElem::UnknownEnum { kind_name: kind.clone() }], source);
            Ok((value, ty))
        }

        // ---- operators ----
        ExprKind::Math { op, lhs, rhs } => ir_gen_math(builder, *op, lhs, rhs, source),
        ExprKind::UnaryNot(inner) => {
            let (mut value, ty) = ir_gen_expr(builder, inner, false)?;
            conform_or_error(builder, &mut value, &ty, &Type::base("bool"), source)?;
            let false_value = builder.build_literal_bool(false);
            let bool_type = builder.bool_type();
            let result = builder.build_math(IrMathOp::Equals, value, false_value, bool_type);
            Ok((result, Type::base("bool")))
        }
        ExprKind::UnaryBitComplement(inner) => {
            let (value, ty) = ir_gen_expr(builder, inner, false)?;
            let kind = builder.ctx.module.pool.get(value.ty).clone();
            let Some(all_ones) = int_literal_with_bits(&kind, u64::MAX) else {
                return builder.panic(source, "bitwise complement requires an integer value");
            };
            let ones = builder.build_literal(all_ones);
            let result_type = value.ty;
            let result = builder.build_math(IrMathOp::BitXor, value, ones, result_type);
            Ok((result, ty))
        }
        ExprKind::UnaryNegate(inner) => {
            let (value, ty) = ir_gen_expr(builder, inner, false)?;
            let kind = builder.ctx.module.pool.get(value.ty).clone();

            let (zero, op) = if kind.is_float() {
                let zero = match kind {
                    IrType::F32 => builder.build_literal(Literal::F32(0.0)),
                    _ => builder.build_literal(Literal::F64(0.0)),
                };
                (zero, IrMathOp::FSubtract)
            } else if kind.is_integer_like() {
                let Some(zero_literal) = int_literal_with_bits(&kind, 0) else {
                    return builder.panic(source, "cannot negate this value");
                };
                (builder.build_literal(zero_literal), IrMathOp::Subtract)
            } else {
                return builder.panic(source, "cannot negate this value");
            };

            let result_type = value.ty;
            let result = builder.build_math(op, zero, value, result_type);
            Ok((result, ty))
        }
        ExprKind::AddressOf(inner) => {
            if !is_mutable_expr(inner) {
                return builder.panic(source, "cannot take address of immutable value");
            }
            let (ptr, ty) = ir_gen_expr(builder, inner, true)?;
            Ok((ptr, ty.pointer_to()))
        }
        ExprKind::Dereference(inner) => {
            let (value, ty) = ir_gen_expr(builder, inner, false)?;
            let Some(pointee) = ty.dereferenced() else {
                let message = format!("cannot dereference value of non-pointer type '{}'", ty);
                return builder.panic(source, message);
            };

            if leave_mutable {
                Ok((value, pointee))
            } else {
                let loaded = builder.build_load(value, source);
                Ok((loaded, pointee))
            }
        }

        // ---- calls ----
        ExprKind::Call {
            name,
            args,
            is_tentative,
            gives,
        } => {
            let mut call_args = ir_gen_call_args(builder, args)?;
            ir_gen_call(
                builder,
                name,
                None,
                &mut call_args,
                gives.clone(),
                *is_tentative,
                source,
                true,
            )
        }
        ExprKind::CallMethod {
            subject,
            name,
            args,
            is_tentative,
            gives,
        } => ir_gen_method_call(
            builder,
            subject,
            name,
            args,
            *is_tentative,
            gives.clone(),
            source,
            true,
        ),
        ExprKind::CallAddress { address, args } => {
            ir_gen_call_address(builder, address, args, source)
        }

        // ---- access ----
        ExprKind::Member { subject, field } => {
            ir_gen_member(builder, subject, field, leave_mutable, source)
        }
        ExprKind::ArrayAccess { subject, index } => {
            ir_gen_array_access(builder, subject, index, leave_mutable, source)
        }

        // ---- type queries and casts ----
        ExprKind::Cast { to, from } => ir_gen_cast(builder, to, from, source),
        ExprKind::Sizeof { ty } => {
            let ir_type = resolve_ir_type(builder.ctx, ty)?;
            Ok((builder.build_const_sizeof(ir_type), Type::base("usize")))
        }
        ExprKind::SizeofValue { value } => {
            // Evaluate speculatively just to learn the type
            let snapshot = builder.snapshot();
            let (evaluated, _) = ir_gen_expr(builder, value, false)?;
            builder.restore(snapshot);
            Ok((builder.build_const_sizeof(evaluated.ty), Type::base("usize")))
        }
        ExprKind::Alignof { ty } => {
            let ir_type = resolve_ir_type(builder.ctx, ty)?;
            Ok((builder.build_const_alignof(ir_type), Type::base("usize")))
        }
        ExprKind::Typeinfo { ty } => {
            let descriptor = rtti_for(builder, ty, source)?;
            Ok((descriptor, Type::base("ptr")))
        }
        ExprKind::Typenameof { ty } => {
            let descriptor = rtti_for(builder, ty, source)?;
            // Name pointer is the descriptor's second field
            let u8_type = builder.ctx.module.pool.intern(IrType::U8);
            let name_type = builder.ctx.module.pool.pointer_to(u8_type);
            let name_ptr_type = builder.ctx.module.pool.pointer_to(name_type);
            let name_ptr = builder.build_member(descriptor, 1, name_ptr_type, source);
            let name = builder.build_load(name_ptr, source);
            Ok((name, ubyte_ptr_type(source)))
        }

        // ---- allocation ----
        ExprKind::New {
            ty,
            amount,
            is_undef,
            inputs,
        } => ir_gen_new(builder, ty, amount.as_deref(), *is_undef, inputs.as_deref(), source),
        ExprKind::NewCstring(text) => {
            let u8_type = builder.ctx.module.pool.intern(IrType::U8);
            let count = builder.build_literal_usize(text.len() as u64 + 1);
            let allocation = builder.build_malloc(u8_type, Some(count.clone()), false);
            let literal = builder.build_cstr_of_len(text.as_bytes().to_vec());
            builder.build_memcpy(allocation.clone(), literal, count);
            Ok((allocation, ubyte_ptr_type(source)))
        }

        // ---- conditional values ----
        ExprKind::Ternary {
            condition,
            if_true,
            if_false,
        } => ir_gen_ternary(builder, condition, if_true, if_false, source),

        // ---- aggregate literals ----
        ExprKind::InitList(values) => ir_gen_init_list(builder, values, source),
        ExprKind::StaticArray { ty, values } => ir_gen_static_data(builder, ty, values, true, source),
        ExprKind::StaticStruct { ty, values } => {
            ir_gen_static_data(builder, ty, values, false, source)
        }

        // ---- varargs ----
        ExprKind::VaArg { va_list, ty } => {
            let (list_ptr, _) = ir_gen_expr(builder, va_list, true)?;
            let result_type = resolve_ir_type(builder.ctx, ty)?;
            let value = builder.push_value(adept_ir::Instr::VaArg {
                result_type,
                va_list: list_ptr,
            });
            Ok((value, ty.clone()))
        }

        ExprKind::Embed(contents) => {
            let value = builder.build_cstr_of_len(contents.as_bytes().to_vec());
            Ok((value, ubyte_ptr_type(source)))
        }
        ExprKind::Polycount(name) => {
            let message = format!("'$#{}' cannot be used outside of a polymorphic function", name);
            builder.panic(source, message)
        }

        _ => builder.panic(source, "expected expression, found statement"),
    }
}

fn ubyte_ptr_type(source: Source) -> Type {
    Type::new(
        vec![TypeElem::Pointer, TypeElem::Base { name: "ubyte".into() }],
        source,
    )
}

/// Whether an expression designates mutable storage
pub fn is_mutable_expr(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Variable(_)
            | ExprKind::Member { .. }
            | ExprKind::ArrayAccess { .. }
            | ExprKind::Dereference(_)
    )
}

fn int_literal_with_bits(kind: &IrType, bits: u64) -> Option<Literal> {
    Some(match kind {
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

fn ir_gen_string_literal(
    builder: &mut Builder,
    text: &str,
    source: Source,
) -> GenResult<(IrValue, Type)> {
    let string_type = match builder.ctx.module.type_map.find("String") {
        Some(existing) => existing,
        None => {
            if builder.ctx.ast.find_composite("String").is_none() {
                return builder.panic(
                    source,
                    "cannot use string literal without 'String' type present",
                );
            }
            resolve_ir_type(builder.ctx, &Type::base("String"))?
        }
    };

    let array = builder.build_cstr_of_len(text.as_bytes().to_vec());
    let length = builder.build_literal_usize(text.len() as u64);
    let capacity = builder.build_literal_usize(text.len() as u64);
    let ownership = builder.build_literal_usize(0);

    let field_count = match builder.ctx.module.pool.get(string_type) {
        IrType::Structure { fields, .. } => fields.len(),
        _ => 0,
    };

    let mut values = vec![array, length, capacity, ownership];
    values.truncate(field_count.max(2));

    let value = IrValue::new(string_type, ValueKind::StructLiteral { values });
    Ok((value, Type::base("String")))
}

fn ir_gen_variable(
    builder: &mut Builder,
    name: &str,
    leave_mutable: bool,
    source: Source,
) -> GenResult<(IrValue, Type)> {
    if let Some(variable) = builder.find_variable(name).cloned() {
        use adept_ast::DeclareTraits;

        if !variable.traits.contains(DeclareTraits::STATIC) {
            builder.mark_variable_used(variable.id);
        }
        let ptr = builder.build_varptr(&variable);
        if leave_mutable {
            return Ok((ptr, variable.ast_type));
        }
        let loaded = builder.build_load(ptr, source);
        return Ok((loaded, variable.ast_type));
    }

    if let Some(global_id) = builder.ctx.module.find_global(name) {
        let global_type = builder.ctx.module.globals[global_id].ir_type;
        let ast_type = builder.ctx.module.globals[global_id].ast_type.clone();
        let ptr_type = builder.ctx.module.pool.pointer_to(global_type);
        let ptr = builder.build_gvarptr(ptr_type, global_id);
        if leave_mutable {
            return Ok((ptr, ast_type));
        }
        let loaded = builder.build_load(ptr, source);
        return Ok((loaded, ast_type));
    }

    // Named constants splice their expression in place
    if let Some(constant) = builder.ctx.ast.find_constant(name).cloned() {
        return ir_gen_expr(builder, &constant.value, false);
    }

    let suggestion = builder
        .scopes
        .nearest_variable(builder.current_scope, name)
        .map(String::from);

    let message = match suggestion {
        Some(nearest) => format!(
            "undeclared variable '{}' — did you mean '{}'?",
            name, nearest
        ),
        None => format!("undeclared variable '{}'", name),
    };
    builder.panic(source, message)
}

pub fn ir_gen_call_args(builder: &mut Builder, args: &[Expr]) -> GenResult<CallArgs> {
    let mut values = Vec::with_capacity(args.len());
    let mut types = Vec::with_capacity(args.len());

    for arg in args {
        let (value, ty) = ir_gen_expr(builder, arg, false)?;
        values.push(value);
        types.push(ty);
    }

    Ok(CallArgs::new(values, types))
}

/// Lower a method call expression
#[allow(clippy::too_many_arguments)]
fn ir_gen_method_call(
    builder: &mut Builder,
    subject: &Expr,
    name: &str,
    args: &[Expr],
    is_tentative: bool,
    gives: Option<Type>,
    source: Source,
    used: bool,
) -> GenResult<(IrValue, Type)> {
    let mut call_args = ir_gen_method_args(builder, subject, args, source)?;
    let struct_name = call_args
        .types
        .first()
        .and_then(|ty| ty.method_subject_name())
        .map(String::from);

    let Some(struct_name) = struct_name else {
        let ty = call_args.types.first().cloned().unwrap_or_default();
        let message = format!("cannot call method on value of type '{}'", ty);
        return builder.panic(source, message);
    };

    ir_gen_call(
        builder,
        name,
        Some(&struct_name),
        &mut call_args,
        gives,
        is_tentative,
        source,
        used,
    )
}

/// Lower a method call in statement position (result discarded)
pub fn ir_gen_method_call_statement(builder: &mut Builder, statement: &Expr) -> GenResult<()> {
    let ExprKind::CallMethod {
        subject,
        name,
        args,
        is_tentative,
        gives,
    } = &statement.kind
    else {
        debug_assert!(false, "expected a method call statement");
        return Ok(());
    };

    ir_gen_method_call(
        builder,
        subject,
        name,
        args,
        *is_tentative,
        gives.clone(),
        statement.source,
        false,
    )?;
    Ok(())
}

/// Generate the subject and arguments of a method call. The subject
/// becomes argument zero as a pointer to the receiver.
fn ir_gen_method_args(
    builder: &mut Builder,
    subject: &Expr,
    args: &[Expr],
    source: Source,
) -> GenResult<CallArgs> {
    let (subject_value, subject_type) = if is_mutable_expr(subject) {
        ir_gen_expr(builder, subject, true)?
    } else {
        // Immutable receivers get a temporary stack slot
        let (value, ty) = ir_gen_expr(builder, subject, false)?;
        let slot = builder.build_alloc(value.ty, None);
        builder.build_store(value, slot.clone());
        (slot, ty)
    };

    let (receiver, receiver_type) = if subject_type.is_pointer() {
        // Receiver is already a pointer to the subject composite
        let loaded = builder.build_load(subject_value, source);
        (loaded, subject_type)
    } else {
        (subject_value, subject_type.pointer_to())
    };

    let mut call_args = ir_gen_call_args(builder, args)?;
    call_args.values.insert(0, receiver);
    call_args.types.insert(0, receiver_type);
    Ok(call_args)
}

/// Resolve and emit a procedure call. `used` reflects whether the call
/// result is consumed (NO_DISCARD enforcement).
#[allow(clippy::too_many_arguments)]
pub fn ir_gen_call(
    builder: &mut Builder,
    name: &str,
    struct_name: Option<&str>,
    args: &mut CallArgs,
    gives: Option<Type>,
    is_tentative: bool,
    source: Source,
    used: bool,
) -> GenResult<(IrValue, Type)> {
    let query = match struct_name {
        Some(struct_name) => ConformQuery::method(struct_name, name, gives, source),
        None => ConformQuery::function(name, gives, source),
    };

    let Some(pair) = find_proc_conforming(builder, &query, args)? else {
        if is_tentative {
            let void = builder.void_type();
            return Ok((IrValue::new(void, ValueKind::NullPtr), Type::base("void")));
        }
        let failure = report_undeclared(builder.ctx, name, struct_name, &args.types, source);
        return Err(failure);
    };

    check_qualifiers(builder.ctx, pair.ast_func_id, used, source)?;

    // Pass management for arguments handed off by value
    let view = func_signature(builder.ctx, pair.ast_func_id);
    let param_traits: Vec<_> = view.params.iter().map(|param| param.traits).collect();
    handle_pass_management(builder, &mut args.values, &args.types, &param_traits, source)?;

    let return_type = builder.ctx.module.funcs[pair.ir_func_id].return_type;
    let result = builder.build_call(pair.ir_func_id, std::mem::take(&mut args.values), return_type);

    let ast_return = if view.return_type.is_none() {
        Type::base("void")
    } else {
        view.return_type.clone()
    };

    Ok((result, ast_return))
}

fn ir_gen_call_address(
    builder: &mut Builder,
    address: &Expr,
    args: &[Expr],
    source: Source,
) -> GenResult<(IrValue, Type)> {
    let (address_value, address_type) = ir_gen_expr(builder, address, false)?;

    let (arg_types, return_type) = match address_type.elements.as_slice() {
        [TypeElem::Func {
            arg_types,
            return_type,
            ..
        }] => (arg_types.clone(), (**return_type).clone()),
        _ => {
            let message = format!(
                "cannot call value of non-function type '{}'",
                address_type
            );
            return builder.panic(source, message);
        }
    };

    let mut call_args = ir_gen_call_args(builder, args)?;

    if call_args.len() < arg_types.len() {
        let message = format!(
            "not enough arguments: expected {}, got {}",
            arg_types.len(),
            call_args.len()
        );
        return builder.panic(source, message);
    }

    for i in 0..arg_types.len() {
        let mut value = call_args.values[i].clone();
        let from = call_args.types[i].clone();
        conform_or_error(builder, &mut value, &from, &arg_types[i], source)?;
        call_args.values[i] = value;
    }

    let ir_return_type = resolve_ir_type(builder.ctx, &return_type)?;
    let result = builder.build_call_address(address_value, call_args.values, ir_return_type, source);
    Ok((result, return_type))
}

/// Field index and catalog-resolved field type of a composite member
fn composite_field(
    builder: &mut Builder,
    subject_type: &Type,
    field: &str,
    source: Source,
) -> GenResult<(usize, Type)> {
    let Some(name) = subject_type.struct_name() else {
        let message = format!("cannot access field of non-composite type '{}'", subject_type);
        return builder.panic(source, message);
    };

    let Some(composite) = builder.ctx.ast.find_composite(name).cloned() else {
        let message = format!("undeclared type '{}'", name);
        return builder.panic(source, message);
    };

    let Some(field_index) = composite.field_index(field) else {
        let message = format!("'{}' has no field named '{}'", subject_type, field);
        return builder.panic(source, message);
    };

    let declared = composite.fields[field_index].ty.clone();

    // Generic composites resolve field types through the usage catalog
    let field_type = match subject_type.elements.as_slice() {
        [TypeElem::GenericBase { generics, .. }] => {
            let mut catalog = PolyCatalog::new();
            catalog.add_types(composite.generics.iter().map(String::as_str), generics);

            match adept_ast::resolve_type(&catalog, None, &declared) {
                Ok(resolved) => resolved,
                Err(error) => {
                    return builder.panic(source, error.to_string());
                }
            }
        }
        _ => declared,
    };

    Ok((field_index + member_index_offset(&composite), field_type))
}

fn ir_gen_member(
    builder: &mut Builder,
    subject: &Expr,
    field: &str,
    leave_mutable: bool,
    source: Source,
) -> GenResult<(IrValue, Type)> {
    let (mut subject_ptr, mut subject_type) = if is_mutable_expr(subject) {
        ir_gen_expr(builder, subject, true)?
    } else {
        let (value, ty) = ir_gen_expr(builder, subject, false)?;
        let slot = builder.build_alloc(value.ty, None);
        builder.build_store(value, slot.clone());
        (slot, ty)
    };

    // Auto-dereference pointers to composites
    if let Some(pointee) = subject_type.dereferenced() {
        if pointee.struct_name().is_some() {
            subject_ptr = builder.build_load(subject_ptr, source);
            subject_type = pointee;
        }
    }

    let (member_index, field_type) = composite_field(builder, &subject_type, field, source)?;

    let field_ir_type = resolve_ir_type(builder.ctx, &field_type)?;
    let field_ptr_type = builder.ctx.module.pool.pointer_to(field_ir_type);
    let field_ptr = builder.build_member(subject_ptr, member_index, field_ptr_type, source);

    if leave_mutable {
        Ok((field_ptr, field_type))
    } else {
        let loaded = builder.build_load(field_ptr, source);
        Ok((loaded, field_type))
    }
}

fn ir_gen_array_access(
    builder: &mut Builder,
    subject: &Expr,
    index: &Expr,
    leave_mutable: bool,
    source: Source,
) -> GenResult<(IrValue, Type)> {
    let (subject_value, subject_type) = if is_mutable_expr(subject) {
        ir_gen_expr(builder, subject, true)?
    } else {
        ir_gen_expr(builder, subject, false)?
    };
    let subject_was_mutable = is_mutable_expr(subject);

    let (mut index_value, index_type) = ir_gen_expr(builder, index, false)?;

    // Pointer or array-view subject: plain element arithmetic
    if let Some(elem_type) = subject_type.dereferenced().or_else(|| {
        matches!(subject_type.elements.first(), Some(TypeElem::Array))
            .then(|| Type::new(subject_type.elements[1..].to_vec(), subject_type.source))
    }) {
        conform_or_error(builder, &mut index_value, &index_type, &Type::base("usize"), source)?;

        let pointer = if subject_was_mutable {
            builder.build_load(subject_value, source)
        } else {
            subject_value
        };

        let elem_ptr = builder.build_array_access(pointer, index_value, source);
        return if leave_mutable {
            Ok((elem_ptr, elem_type))
        } else {
            Ok((builder.build_load(elem_ptr, source), elem_type))
        };
    }

    // Fixed arrays decay to a pointer to their first element
    if let [TypeElem::FixedArray { .. }, rest @ ..] = subject_type.elements.as_slice() {
        if !subject_was_mutable {
            return builder.panic(source, "cannot index into a temporary fixed array");
        }

        let elem_type = Type::new(rest.to_vec(), subject_type.source);
        conform_or_error(builder, &mut index_value, &index_type, &Type::base("usize"), source)?;

        let elem_ir_type = resolve_ir_type(builder.ctx, &elem_type)?;
        let elem_ptr_type = builder.ctx.module.pool.pointer_to(elem_ir_type);
        let decayed = builder.build_cast(adept_ir::CastKind::Bitcast, subject_value, elem_ptr_type);
        let elem_ptr = builder.build_array_access(decayed, index_value, source);

        return if leave_mutable {
            Ok((elem_ptr, elem_type))
        } else {
            Ok((builder.build_load(elem_ptr, source), elem_type))
        };
    }

    // Composite subject: the [] operator may be overloaded
    if subject_type.struct_name().is_some() && subject_was_mutable {
        if let Some((elem_ptr, elem_ptr_type)) = handle_access_management(
            builder,
            subject_value,
            index_value,
            &subject_type,
            &index_type,
            source,
        )? {
            let elem_type = elem_ptr_type.dereferenced().unwrap_or(elem_ptr_type);
            return if leave_mutable {
                Ok((elem_ptr, elem_type))
            } else {
                Ok((builder.build_load(elem_ptr, source), elem_type))
            };
        }
    }

    let message = format!("cannot index into value of type '{}'", subject_type);
    builder.panic(source, message)
}

fn ir_gen_cast(
    builder: &mut Builder,
    to: &Type,
    from: &Expr,
    source: Source,
) -> GenResult<(IrValue, Type)> {
    use adept_ir::CastKind;

    let (mut value, from_type) = ir_gen_expr(builder, from, false)?;

    // Anything an implicit loose conversion can do, an explicit cast can
    if ast_types_conform(builder, &mut value, &from_type, to, ConformMode::Loose)? {
        return Ok((value, to.clone()));
    }

    let to_ir_type = resolve_ir_type(builder.ctx, to)?;
    let from_kind = builder.ctx.module.pool.get(value.ty).clone();
    let to_kind = builder.ctx.module.pool.get(to_ir_type).clone();

    let from_is_ptr = from_kind.is_pointer();
    let to_is_ptr = to_kind.is_pointer();

    let result = if from_is_ptr && to_is_ptr {
        builder.build_cast(CastKind::Bitcast, value, to_ir_type)
    } else if from_is_ptr && to_kind.is_integer_like() {
        builder.build_cast(CastKind::PtrToInt, value, to_ir_type)
    } else if from_kind.is_integer_like() && to_is_ptr {
        builder.build_cast(CastKind::IntToPtr, value, to_ir_type)
    } else {
        let message = format!("cannot cast '{}' to '{}'", from_type, to);
        return builder.panic(source, message);
    };

    Ok((result, to.clone()))
}

fn ir_gen_new(
    builder: &mut Builder,
    ty: &Type,
    amount: Option<&Expr>,
    is_undef: bool,
    inputs: Option<&[Expr]>,
    source: Source,
) -> GenResult<(IrValue, Type)> {
    let elem_type = resolve_ir_type(builder.ctx, ty)?;

    let amount_value = match amount {
        Some(amount) => {
            let (mut value, amount_type) = ir_gen_expr(builder, amount, false)?;
            conform_or_error(builder, &mut value, &amount_type, &Type::base("usize"), source)?;
            Some(value)
        }
        None => None,
    };

    let allocation = builder.build_malloc(elem_type, amount_value, is_undef);

    if let Some(inputs) = inputs {
        let Some(struct_name) = ty.struct_name().map(String::from) else {
            return builder.panic(source, "constructor values require a composite type");
        };

        let mut call_args = ir_gen_call_args(builder, inputs)?;
        call_args.values.insert(0, allocation.clone());
        call_args.types.insert(0, ty.pointer_to());

        ir_gen_call(
            builder,
            "__constructor__",
            Some(&struct_name),
            &mut call_args,
            None,
            false,
            source,
            false,
        )?;
    }

    Ok((allocation, ty.pointer_to()))
}

fn ir_gen_ternary(
    builder: &mut Builder,
    condition: &Expr,
    if_true: &Expr,
    if_false: &Expr,
    source: Source,
) -> GenResult<(IrValue, Type)> {
    let (mut condition_value, condition_type) = ir_gen_expr(builder, condition, false)?;
    conform_or_error(
        builder,
        &mut condition_value,
        &condition_type,
        &Type::base("bool"),
        source,
    )?;

    let true_block = builder.build_basicblock();
    let false_block = builder.build_basicblock();
    let merge_block = builder.build_basicblock();

    builder.build_cond_break(condition_value, true_block, false_block);

    builder.use_block(true_block);
    let (true_value, true_type) = ir_gen_expr(builder, if_true, false)?;
    let true_exit = builder.current_block_id;
    builder.build_break(merge_block);

    builder.use_block(false_block);
    let (mut false_value, false_type) = ir_gen_expr(builder, if_false, false)?;
    conform_or_error(builder, &mut false_value, &false_type, &true_type, source)?;
    let false_exit = builder.current_block_id;
    builder.build_break(merge_block);

    builder.use_block(merge_block);
    let result_type = true_value.ty;
    let result = builder.build_phi2(result_type, true_value, false_value, true_exit, false_exit);
    Ok((result, true_type))
}

fn ir_gen_init_list(
    builder: &mut Builder,
    values: &[Expr],
    source: Source,
) -> GenResult<(IrValue, Type)> {
    if values.is_empty() {
        return builder.panic(source, "initializer list cannot be empty");
    }

    let mut generated = Vec::with_capacity(values.len());
    let (first_value, elem_type) = ir_gen_expr(builder, &values[0], false)?;
    generated.push(first_value);

    for value in &values[1..] {
        let (mut generated_value, value_type) = ir_gen_expr(builder, value, false)?;
        conform_or_error(builder, &mut generated_value, &value_type, &elem_type, source)?;
        generated.push(generated_value);
    }

    let elem_ir_type = generated[0].ty;
    let array_type = builder
        .ctx
        .module
        .pool
        .fixed_array_of(elem_ir_type, generated.len() as u64);

    let mut ast_type_elements = vec![TypeElem::FixedArray {
        length: generated.len() as u64,
    }];
    ast_type_elements.extend(elem_type.elements.iter().cloned());

    let value = IrValue::new(array_type, ValueKind::ArrayLiteral { values: generated });
    Ok((value, Type::new(ast_type_elements, source)))
}

/// `static T {...}` / `static T (...)` data lowers into a constant
/// anonymous global; the expression's value is a pointer to it
fn ir_gen_static_data(
    builder: &mut Builder,
    ty: &Type,
    values: &[Expr],
    is_array: bool,
    source: Source,
) -> GenResult<(IrValue, Type)> {
    let mut generated = Vec::with_capacity(values.len());

    if is_array {
        for value in values {
            let (mut generated_value, value_type) = ir_gen_expr(builder, value, false)?;
            conform_or_error(builder, &mut generated_value, &value_type, ty, source)?;
            if !generated_value.is_constant() {
                return builder.panic(value.source, "static data must be constant");
            }
            generated.push(generated_value);
        }

        let elem_ir_type = resolve_ir_type(builder.ctx, ty)?;
        let array_type = builder
            .ctx
            .module
            .pool
            .fixed_array_of(elem_ir_type, generated.len() as u64);
        let initializer = IrValue::new(array_type, ValueKind::ArrayLiteral { values: generated });
        let pointer = builder.build_anon_global(array_type, true, initializer);

        // Static arrays are addressed through their element type
        let mut decayed = pointer;
        let elem_ptr_type = builder.ctx.module.pool.pointer_to(elem_ir_type);
        decayed = builder.build_cast(adept_ir::CastKind::Bitcast, decayed, elem_ptr_type);
        return Ok((decayed, ty.pointer_to()));
    }

    for value in values {
        let (generated_value, _) = ir_gen_expr(builder, value, false)?;
        if !generated_value.is_constant() {
            return builder.panic(value.source, "static data must be constant");
        }
        generated.push(generated_value);
    }

    let struct_ir_type = resolve_ir_type(builder.ctx, ty)?;
    let initializer = IrValue::new(
        struct_ir_type,
        ValueKind::ConstStructLiteral { values: generated },
    );
    let pointer = builder.build_anon_global(struct_ir_type, true, initializer);
    Ok((pointer, ty.pointer_to()))
}

// ---- math ----

pub(crate) struct MathInstrSelection {
    pub(crate) signed: IrMathOp,
    pub(crate) unsigned: IrMathOp,
    pub(crate) float: Option<IrMathOp>,
}

pub(crate) fn select_math_instr(op: MathOp) -> Option<MathInstrSelection> {
    use IrMathOp::*;

    Some(match op {
        MathOp::Add => MathInstrSelection { signed: Add, unsigned: Add, float: Some(FAdd) },
        MathOp::Subtract => MathInstrSelection {
            signed: Subtract,
            unsigned: Subtract,
            float: Some(FSubtract),
        },
        MathOp::Multiply => MathInstrSelection {
            signed: Multiply,
            unsigned: Multiply,
            float: Some(FMultiply),
        },
        MathOp::Divide => MathInstrSelection {
            signed: SDivide,
            unsigned: UDivide,
            float: Some(FDivide),
        },
        MathOp::Modulus => MathInstrSelection {
            signed: SModulus,
            unsigned: UModulus,
            float: Some(FModulus),
        },
        MathOp::Equals => MathInstrSelection {
            signed: Equals,
            unsigned: Equals,
            float: Some(FEquals),
        },
        MathOp::NotEquals => MathInstrSelection {
            signed: NotEquals,
            unsigned: NotEquals,
            float: Some(FNotEquals),
        },
        MathOp::LessThan => MathInstrSelection {
            signed: SLessThan,
            unsigned: ULessThan,
            float: Some(FLessThan),
        },
        MathOp::GreaterThan => MathInstrSelection {
            signed: SGreaterThan,
            unsigned: UGreaterThan,
            float: Some(FGreaterThan),
        },
        MathOp::LessThanOrEqual => MathInstrSelection {
            signed: SLessThanOrEqual,
            unsigned: ULessThanOrEqual,
            float: Some(FLessThanOrEqual),
        },
        MathOp::GreaterThanOrEqual => MathInstrSelection {
            signed: SGreaterThanOrEqual,
            unsigned: UGreaterThanOrEqual,
            float: Some(FGreaterThanOrEqual),
        },
        MathOp::BitAnd => MathInstrSelection { signed: BitAnd, unsigned: BitAnd, float: None },
        MathOp::BitOr => MathInstrSelection { signed: BitOr, unsigned: BitOr, float: None },
        MathOp::BitXor => MathInstrSelection { signed: BitXor, unsigned: BitXor, float: None },
        MathOp::BitLshift => MathInstrSelection {
            signed: BitLshift,
            unsigned: BitLshift,
            float: None,
        },
        MathOp::BitRshift => MathInstrSelection {
            signed: BitRshift,
            unsigned: BitLgcRshift,
            float: None,
        },
        MathOp::BitLgcLshift => MathInstrSelection {
            signed: BitLshift,
            unsigned: BitLshift,
            float: None,
        },
        MathOp::BitLgcRshift => MathInstrSelection {
            signed: BitLgcRshift,
            unsigned: BitLgcRshift,
            float: None,
        },
        MathOp::And | MathOp::Or => return None,
    })
}

fn ir_gen_math(
    builder: &mut Builder,
    op: MathOp,
    lhs: &Expr,
    rhs: &Expr,
    source: Source,
) -> GenResult<(IrValue, Type)> {
    // Short-circuiting logical operators
    if matches!(op, MathOp::And | MathOp::Or) {
        return ir_gen_short_circuit(builder, op, lhs, rhs, source);
    }

    let (lhs_value, lhs_type) = ir_gen_expr(builder, lhs, false)?;
    let (rhs_value, rhs_type) = ir_gen_expr(builder, rhs, false)?;

    // Composite operands go through user overloads
    let lhs_is_composite = lhs_type
        .struct_name()
        .is_some_and(|name| builder.ctx.ast.find_composite(name).is_some());
    let rhs_is_composite = rhs_type
        .struct_name()
        .is_some_and(|name| builder.ctx.ast.find_composite(name).is_some());

    if lhs_is_composite || rhs_is_composite {
        let Some(overload_name) = op.overload_name() else {
            let message = format!(
                "operator '{}' is not supported between '{}' and '{}'",
                op, lhs_type, rhs_type
            );
            return builder.panic(source, message);
        };

        let operands = MathOperands {
            lhs: lhs_value,
            rhs: rhs_value,
            lhs_type: lhs_type.clone(),
            rhs_type: rhs_type.clone(),
        };

        let commutative = matches!(
            op,
            MathOp::Add | MathOp::Multiply | MathOp::Equals | MathOp::NotEquals
        );

        let found = if commutative {
            handle_math_management_allow_other_direction(builder, &operands, source, overload_name)?
        } else {
            handle_math_management(builder, &operands, source, overload_name)?
        };

        let Some((result, result_type)) = found else {
            let message = format!(
                "undefined operator '{}' between '{}' and '{}'",
                op, lhs_type, rhs_type
            );
            return builder.panic(source, message);
        };
        return Ok((result, result_type));
    }

    // Primitive math: unify operand types, preferring the left side
    let (mut lhs_value, mut rhs_value) = (lhs_value, rhs_value);
    let mut unified_type = lhs_type.clone();

    if !ast_types_conform(builder, &mut rhs_value, &rhs_type, &lhs_type, ConformMode::Loose)? {
        if ast_types_conform(builder, &mut lhs_value, &lhs_type, &rhs_type, ConformMode::Loose)? {
            unified_type = rhs_type.clone();
        } else {
            let message = format!(
                "incompatible operand types '{}' and '{}'",
                lhs_type, rhs_type
            );
            return builder.panic(source, message);
        }
    }

    let Some(selection) = select_math_instr(op) else {
        return builder.panic(source, "unsupported operator");
    };

    let operand_kind = builder.ctx.module.pool.get(lhs_value.ty).clone();
    let instr = if operand_kind.is_float() {
        match selection.float {
            Some(float_instr) => float_instr,
            None => {
                let message = format!("operator '{}' requires integer operands", op);
                return builder.panic(source, message);
            }
        }
    } else if operand_kind.is_signed() {
        selection.signed
    } else {
        selection.unsigned
    };

    let result_type = lhs_value.ty;
    let result = builder.build_math(instr, lhs_value, rhs_value, result_type);

    let result_ast_type = if op.is_comparison() {
        Type::base("bool")
    } else {
        unified_type
    };

    Ok((result, result_ast_type))
}

fn ir_gen_short_circuit(
    builder: &mut Builder,
    op: MathOp,
    lhs: &Expr,
    rhs: &Expr,
    source: Source,
) -> GenResult<(IrValue, Type)> {
    let bool_type = Type::base("bool");

    let (mut lhs_value, lhs_type) = ir_gen_expr(builder, lhs, false)?;
    conform_or_error(builder, &mut lhs_value, &lhs_type, &bool_type, source)?;
    let entry_exit = builder.current_block_id;

    let rhs_block = builder.build_basicblock();
    let merge_block = builder.build_basicblock();

    match op {
        MathOp::And => builder.build_cond_break(lhs_value.clone(), rhs_block, merge_block),
        _ => builder.build_cond_break(lhs_value.clone(), merge_block, rhs_block),
    }

    builder.use_block(rhs_block);
    let (mut rhs_value, rhs_type) = ir_gen_expr(builder, rhs, false)?;
    conform_or_error(builder, &mut rhs_value, &rhs_type, &bool_type, source)?;
    let rhs_exit = builder.current_block_id;
    builder.build_break(merge_block);

    builder.use_block(merge_block);
    let ir_bool = builder.bool_type();
    let result = builder.build_phi2(ir_bool, lhs_value, rhs_value, entry_exit, rhs_exit);
    Ok((result, bool_type))
}
