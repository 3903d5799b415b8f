// Management-call lowering
// Implements the deference, pass, assign, math-overload and
// access-overload rules on top of the special-function engine.

use crate::builder::Builder;
use crate::conform::{ast_types_conform, ConformMode};
use crate::error::{Failure, GenResult};
use crate::find::{find_proc_conforming, CallArgs, ConformQuery};
use crate::sf::{find_assign_func, find_defer_func, find_pass_func};
use adept_ast::{DeclareTraits, ParamTraits, Type};
use adept_diagnostics::Source;
use adept_ir::{IrValue, ScopeId};

pub use crate::autogen::{could_have_deference, could_have_pass};

/// Calls the `__defer__` method on a mutable value if one exists.
/// `mutable_value` must be a pointer to a value of `ast_type`.
/// Returns whether the value was utilized in deference.
pub fn handle_single_deference(
    builder: &mut Builder,
    ast_type: &Type,
    mutable_value: IrValue,
    from_source: Source,
) -> GenResult<bool> {
    if !could_have_deference(builder.ctx, ast_type) {
        return Ok(false);
    }

    let depth = builder.instantiation_depth();
    let Some(pair) = find_defer_func(builder.ctx, ast_type, depth)? else {
        return Ok(false);
    };

    let return_type = builder.ctx.module.funcs[pair.ir_func_id].return_type;
    builder.build_call(pair.ir_func_id, vec![mutable_value], return_type);
    Ok(true)
}

/// Emits deference for every variable of a scope in reverse declaration
/// order. POD and static variables are skipped (statics are deferred at
/// module deinit).
pub fn handle_deference_for_variables(builder: &mut Builder, scope: ScopeId) -> GenResult<()> {
    let variables: Vec<_> = builder.scopes.get(scope).variables.iter().rev().cloned().collect();

    for variable in variables {
        if variable
            .traits
            .intersects(DeclareTraits::POD | DeclareTraits::STATIC)
        {
            continue;
        }

        let variable_ptr = builder.build_varptr(&variable);
        handle_single_deference(builder, &variable.ast_type, variable_ptr, Source::NONE)?;
    }

    Ok(())
}

/// Calls the `__pass__` function for an argument value if one exists,
/// replacing the value with the function's result
pub fn handle_single_pass(
    builder: &mut Builder,
    ast_type: &Type,
    value: &mut IrValue,
    _from_source: Source,
) -> GenResult<bool> {
    if !could_have_pass(builder.ctx, ast_type) {
        return Ok(false);
    }

    let Some(pair) = find_pass_func(builder, value, ast_type)? else {
        return Ok(false);
    };

    let return_type = builder.ctx.module.funcs[pair.ir_func_id].return_type;
    *value = builder.build_call(pair.ir_func_id, vec![value.clone()], return_type);
    Ok(true)
}

/// Handles `__pass__` management for the arguments of a call.
/// `param_traits` may be empty when the callee has no parameter traits
/// (extra vararg positions are always passed bitwise).
pub fn handle_pass_management(
    builder: &mut Builder,
    values: &mut [IrValue],
    types: &[Type],
    param_traits: &[ParamTraits],
    from_source: Source,
) -> GenResult<()> {
    for i in 0..values.len() {
        if param_traits
            .get(i)
            .is_some_and(|traits| traits.contains(ParamTraits::POD))
        {
            continue;
        }

        let Some(ty) = types.get(i) else { continue };

        let mut value = values[i].clone();
        handle_single_pass(builder, ty, &mut value, from_source)?;
        values[i] = value;
    }

    Ok(())
}

/// Handles `__assign__` management for an assignment.
/// `destination` is a pointer to the assigned location.
/// Returns whether an `__assign__` method was utilized; the caller
/// falls back to a bitwise store otherwise.
pub fn handle_assign_management(
    builder: &mut Builder,
    value: IrValue,
    value_ast_type: &Type,
    destination: IrValue,
    destination_ast_type: &Type,
    _source_on_failure: Source,
) -> GenResult<bool> {
    if !adept_ast::types_identical(value_ast_type, destination_ast_type) {
        return Ok(false);
    }

    let depth = builder.instantiation_depth();
    let Some(pair) = find_assign_func(builder.ctx, destination_ast_type, depth)? else {
        return Ok(false);
    };

    let return_type = builder.ctx.module.funcs[pair.ir_func_id].return_type;
    builder.build_call(pair.ir_func_id, vec![destination, value], return_type);
    Ok(true)
}

/// Math operands for overload resolution
pub struct MathOperands {
    pub lhs: IrValue,
    pub rhs: IrValue,
    pub lhs_type: Type,
    pub rhs_type: Type,
}

impl MathOperands {
    fn flipped(&self) -> MathOperands {
        MathOperands {
            lhs: self.rhs.clone(),
            rhs: self.lhs.clone(),
            lhs_type: self.rhs_type.clone(),
            rhs_type: self.lhs_type.clone(),
        }
    }
}

/// Resolves a user math overload (`__add__`, `__equals__`, ...) for the
/// given operands. Returns the call result and its AST type.
pub fn handle_math_management(
    builder: &mut Builder,
    operands: &MathOperands,
    from_source: Source,
    overload_name: &str,
) -> GenResult<Option<(IrValue, Type)>> {
    let query = ConformQuery::function(overload_name, None, from_source).without_defaults();
    let mut args = CallArgs::new(
        vec![operands.lhs.clone(), operands.rhs.clone()],
        vec![operands.lhs_type.clone(), operands.rhs_type.clone()],
    );

    let Some(pair) = find_proc_conforming(builder, &query, &mut args)? else {
        return Ok(None);
    };

    let return_type = builder.ctx.module.funcs[pair.ir_func_id].return_type;
    let result = builder.build_call(pair.ir_func_id, args.values, return_type);
    let result_type = builder.ctx.ast.funcs[pair.ast_func_id].return_type.clone();
    Ok(Some((result, result_type)))
}

/// Like [`handle_math_management`], but retries with flipped operands
/// for commutative lookups
pub fn handle_math_management_allow_other_direction(
    builder: &mut Builder,
    operands: &MathOperands,
    from_source: Source,
    overload_name: &str,
) -> GenResult<Option<(IrValue, Type)>> {
    if let Some(found) = handle_math_management(builder, operands, from_source, overload_name)? {
        return Ok(Some(found));
    }

    handle_math_management(builder, &operands.flipped(), from_source, overload_name)
}

/// Resolves the `__access__` overload for the `[]` operator.
/// Returns a pointer to the selected element and its AST type.
pub fn handle_access_management(
    builder: &mut Builder,
    subject_ptr: IrValue,
    index_value: IrValue,
    subject_type: &Type,
    index_type: &Type,
    source: Source,
) -> GenResult<Option<(IrValue, Type)>> {
    let Some(struct_name) = subject_type.struct_name().map(String::from) else {
        return Ok(None);
    };

    let query =
        ConformQuery::method(&struct_name, "__access__", None, source).without_defaults();
    let mut args = CallArgs::new(
        vec![subject_ptr, index_value],
        vec![subject_type.pointer_to(), index_type.clone()],
    );

    let Some(pair) = find_proc_conforming(builder, &query, &mut args)? else {
        return Ok(None);
    };

    let return_type = builder.ctx.module.funcs[pair.ir_func_id].return_type;
    let result = builder.build_call(pair.ir_func_id, args.values, return_type);
    let result_type = builder.ctx.ast.funcs[pair.ast_func_id].return_type.clone();
    Ok(Some((result, result_type)))
}

/// Conform a value to a type, reporting a TYPE_MISMATCH diagnostic with
/// both sides pretty-printed when impossible
pub fn conform_or_error(
    builder: &mut Builder,
    value: &mut IrValue,
    from_type: &Type,
    to_type: &Type,
    source: Source,
) -> GenResult<()> {
    if ast_types_conform(builder, value, from_type, to_type, ConformMode::Loose)? {
        return Ok(());
    }

    let message = format!(
        "type mismatch: cannot convert value of type '{}' to '{}'",
        from_type, to_type
    );
    builder.ctx.panic(source, message);
    Err(Failure::Fatal)
}
