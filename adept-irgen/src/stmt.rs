// Statement lowering

use crate::builder::Builder;
use crate::error::GenResult;
use crate::expr::{ir_gen_call, ir_gen_call_args, ir_gen_expr, is_mutable_expr};
use crate::gen_type::resolve_ir_type;
use crate::management::{
    conform_or_error, handle_assign_management, handle_deference_for_variables,
    handle_single_pass,
};
use adept_ast::{DeclareTraits, Expr, ExprKind, MathOp, Type};
use adept_diagnostics::{Source, WarningKind};
use adept_ir::{IrStaticVariable, ScopeId};

/// Generate IR for a statement list.
/// Returns whether control flow is terminated at the end of the list.
pub fn ir_gen_stmts(builder: &mut Builder, statements: &[Expr]) -> GenResult<bool> {
    for statement in statements {
        if builder.current_block_is_terminated() {
            let escalated = builder.ctx.warn(
                WarningKind::UnreachableCode,
                "unreachable code",
                statement.source,
            );
            if escalated {
                return Err(crate::error::Failure::Fatal);
            }
            return Ok(true);
        }

        ir_gen_stmt(builder, statement)?;
    }

    Ok(builder.current_block_is_terminated())
}

fn ir_gen_stmt(builder: &mut Builder, statement: &Expr) -> GenResult<()> {
    let source = statement.source;

    match &statement.kind {
        ExprKind::Declare {
            name,
            ty,
            value,
            traits,
            inputs,
        } => ir_gen_declare(builder, name, ty, value.as_deref(), *traits, inputs.as_deref(), source),
        ExprKind::Assign {
            destination,
            value,
            is_pod,
        } => ir_gen_assign(builder, destination, value, *is_pod, source),
        ExprKind::CompoundAssign {
            op,
            destination,
            value,
        } => ir_gen_compound_assign(builder, *op, destination, value, source),
        ExprKind::Return { value, last_minute } => {
            ir_gen_return(builder, value.as_deref(), last_minute, source)
        }
        ExprKind::If {
            condition,
            statements,
            else_statements,
            is_unless,
        } => ir_gen_if(builder, condition, statements, else_statements.as_deref(), *is_unless, source),
        ExprKind::While {
            condition,
            statements,
            is_until,
            label,
        } => ir_gen_while(builder, condition, statements, *is_until, label.as_deref(), source),
        ExprKind::Repeat {
            limit,
            statements,
            idx_name,
            label,
            ..
        } => ir_gen_repeat(builder, limit, statements, idx_name.as_deref(), label.as_deref(), source),
        ExprKind::Each {
            it_name,
            it_type,
            array,
            length,
            statements,
            label,
            ..
        } => ir_gen_each(
            builder,
            it_name.as_deref(),
            it_type,
            array,
            length,
            statements,
            label.as_deref(),
            source,
        ),
        ExprKind::For {
            before,
            condition,
            after,
            statements,
            label,
        } => ir_gen_for(builder, before, condition.as_deref(), after, statements, label.as_deref(), source),
        ExprKind::Switch {
            value,
            cases,
            default_statements,
            is_exhaustive,
        } => ir_gen_switch(builder, value, cases, default_statements.as_deref(), *is_exhaustive, source),
        ExprKind::Break => {
            let Some(break_block) = builder.break_block_id else {
                return builder.panic(source, "nothing to break out of");
            };
            defer_scopes_above(builder, Some(builder.break_continue_scope))?;
            builder.build_break(break_block);
            Ok(())
        }
        ExprKind::Continue => {
            let Some(continue_block) = builder.continue_block_id else {
                return builder.panic(source, "nothing to continue through");
            };
            defer_scopes_above(builder, Some(builder.break_continue_scope))?;
            builder.build_break(continue_block);
            Ok(())
        }
        ExprKind::BreakTo { label } => {
            let Some(frame) = builder.get_loop_label(label).cloned() else {
                let message = format!("undeclared label '{}'", label);
                return builder.panic(source, message);
            };
            defer_scopes_above(builder, Some(frame.scope))?;
            builder.build_break(frame.break_block_id);
            Ok(())
        }
        ExprKind::ContinueTo { label } => {
            let Some(frame) = builder.get_loop_label(label).cloned() else {
                let message = format!("undeclared label '{}'", label);
                return builder.panic(source, message);
            };
            defer_scopes_above(builder, Some(frame.scope))?;
            builder.build_break(frame.continue_block_id);
            Ok(())
        }
        ExprKind::Fallthrough => {
            let Some(fallthrough_block) = builder.fallthrough_block_id else {
                return builder
                    .panic(source, "'fallthrough' can only be used inside a switch case");
            };
            defer_scopes_above(builder, Some(builder.fallthrough_scope))?;
            builder.build_break(fallthrough_block);
            Ok(())
        }
        ExprKind::Block(statements) => {
            builder.open_scope();
            let terminated = ir_gen_stmts(builder, statements)?;
            if !terminated {
                handle_deference_for_variables(builder, builder.current_scope)?;
            }
            builder.close_scope();
            Ok(())
        }
        ExprKind::Delete { value } => {
            let (pointer, pointer_type) = ir_gen_expr(builder, value, false)?;
            if !pointer_type.is_pointer() && !pointer_type.is_base_named("ptr") {
                let message = format!("cannot delete value of type '{}'", pointer_type);
                return builder.panic(source, message);
            }
            builder.build_free(pointer);
            Ok(())
        }
        ExprKind::VaStart(list) => {
            let (list_ptr, _) = ir_gen_expr(builder, list, true)?;
            builder.push(adept_ir::Instr::VaStart { value: list_ptr });
            Ok(())
        }
        ExprKind::VaEnd(list) => {
            let (list_ptr, _) = ir_gen_expr(builder, list, true)?;
            builder.push(adept_ir::Instr::VaEnd { value: list_ptr });
            Ok(())
        }
        ExprKind::VaCopy {
            destination,
            source_list,
        } => {
            let (destination_ptr, _) = ir_gen_expr(builder, destination, true)?;
            let (source_ptr, _) = ir_gen_expr(builder, source_list, true)?;
            builder.push(adept_ir::Instr::VaCopy {
                destination: destination_ptr,
                source_list: source_ptr,
            });
            Ok(())
        }
        ExprKind::Asm { assembly } => {
            builder.push(adept_ir::Instr::Asm {
                assembly: assembly.clone(),
            });
            Ok(())
        }

        // Expression statements: calls may not discard NO_DISCARD results
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
                false,
            )?;
            Ok(())
        }
        ExprKind::CallMethod { .. } => {
            crate::expr::ir_gen_method_call_statement(builder, statement)?;
            Ok(())
        }
        _ => {
            // Other value expressions evaluated for their side effects
            ir_gen_expr(builder, statement, false)?;
            Ok(())
        }
    }
}

/// Emit deference for every open scope strictly above `stop` (or all
/// scopes including the root when `stop` is `None`), without closing
/// anything. Used ahead of break/continue/return edges.
fn defer_scopes_above(builder: &mut Builder, stop: Option<ScopeId>) -> GenResult<()> {
    let mut scope = builder.current_scope;

    loop {
        if stop == Some(scope) {
            break;
        }

        handle_deference_for_variables(builder, scope)?;

        match builder.scopes.parent(scope) {
            Some(parent) => scope = parent,
            None => break,
        }
    }

    Ok(())
}

fn ir_gen_declare(
    builder: &mut Builder,
    name: &str,
    ty: &Type,
    value: Option<&Expr>,
    traits: DeclareTraits,
    inputs: Option<&[Expr]>,
    source: Source,
) -> GenResult<()> {
    if builder.scopes.variable_declared_in(builder.current_scope, name) {
        let message = format!("variable '{}' is already declared", name);
        return builder.panic(source, message);
    }

    let ir_type = resolve_ir_type(builder.ctx, ty)?;
    builder.ctx.mention_type(ty);

    if traits.contains(DeclareTraits::STATIC) {
        let initial = match value {
            Some(value) => {
                let (generated, value_type) = ir_gen_expr(builder, value, false)?;
                let mut generated = generated;
                conform_or_error(builder, &mut generated, &value_type, ty, source)?;
                if !generated.is_constant() {
                    return builder.panic(value.source, "static variable initializer must be constant");
                }
                Some(generated)
            }
            None => None,
        };

        builder.add_variable(name, ty, ir_type, traits);
        builder.ctx.module.static_variables.push(IrStaticVariable {
            ast_type: ty.clone(),
            ir_type,
            initial,
        });
        return Ok(());
    }

    let variable = builder.add_variable(name, ty, ir_type, traits);

    if let Some(inputs) = inputs {
        let Some(struct_name) = ty.struct_name().map(String::from) else {
            return builder.panic(source, "constructor values require a composite type");
        };

        let variable_ptr = builder.build_varptr(&variable);
        let mut call_args = ir_gen_call_args(builder, inputs)?;
        call_args.values.insert(0, variable_ptr);
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
        return Ok(());
    }

    match value {
        Some(value) => {
            let (mut generated, value_type) = ir_gen_expr(builder, value, false)?;
            conform_or_error(builder, &mut generated, &value_type, ty, source)?;

            if !traits.contains(DeclareTraits::POD) {
                handle_single_pass(builder, ty, &mut generated, source)?;
            }

            let variable_ptr = builder.build_varptr(&variable);
            builder.build_store(generated, variable_ptr);
        }
        None if traits.contains(DeclareTraits::UNDEF) => {}
        None => {
            let variable_ptr = builder.build_varptr(&variable);
            builder.build_zeroinit(variable_ptr);
        }
    }

    Ok(())
}

fn ir_gen_assign(
    builder: &mut Builder,
    destination: &Expr,
    value: &Expr,
    is_pod: bool,
    source: Source,
) -> GenResult<()> {
    if !is_mutable_expr(destination) {
        return builder.panic(source, "cannot assign to immutable value");
    }

    let (destination_ptr, destination_type) = ir_gen_expr(builder, destination, true)?;
    let (mut generated, value_type) = ir_gen_expr(builder, value, false)?;
    conform_or_error(builder, &mut generated, &value_type, &destination_type, source)?;

    if !is_pod {
        let managed = handle_assign_management(
            builder,
            generated.clone(),
            &destination_type,
            destination_ptr.clone(),
            &destination_type,
            source,
        )?;
        if managed {
            return Ok(());
        }

        handle_single_pass(builder, &destination_type, &mut generated, source)?;
    }

    builder.build_store(generated, destination_ptr);
    Ok(())
}

fn ir_gen_compound_assign(
    builder: &mut Builder,
    op: MathOp,
    destination: &Expr,
    value: &Expr,
    source: Source,
) -> GenResult<()> {
    use crate::expr::select_math_instr;
    use crate::management::{handle_math_management, MathOperands};

    // `x op= v` lowers as `x = x op v` with the address computed once
    if !is_mutable_expr(destination) {
        return builder.panic(source, "cannot assign to immutable value");
    }

    let (destination_ptr, destination_type) = ir_gen_expr(builder, destination, true)?;
    let current = builder.build_load(destination_ptr.clone(), source);

    let (mut rhs_value, rhs_type) = ir_gen_expr(builder, value, false)?;

    // Composite destinations may overload the underlying operator
    let destination_is_composite = destination_type
        .struct_name()
        .is_some_and(|name| builder.ctx.ast.find_composite(name).is_some());

    if destination_is_composite {
        let Some(overload_name) = op.overload_name() else {
            let message = format!("operator '{}' cannot be used in compound assignment here", op);
            return builder.panic(source, message);
        };

        let operands = MathOperands {
            lhs: current,
            rhs: rhs_value,
            lhs_type: destination_type.clone(),
            rhs_type: rhs_type.clone(),
        };

        let Some((mut result, result_type)) =
            handle_math_management(builder, &operands, source, overload_name)?
        else {
            let message = format!(
                "undefined operator '{}' between '{}' and '{}'",
                op, destination_type, rhs_type
            );
            return builder.panic(source, message);
        };

        conform_or_error(builder, &mut result, &result_type, &destination_type, source)?;
        builder.build_store(result, destination_ptr);
        return Ok(());
    }

    conform_or_error(builder, &mut rhs_value, &rhs_type, &destination_type, source)?;

    let Some(selection) = select_math_instr(op) else {
        return builder.panic(source, "unsupported operator in compound assignment");
    };

    let operand_kind = builder.ctx.module.pool.get(current.ty).clone();
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

    let result_type = current.ty;
    let result = builder.build_math(instr, current, rhs_value, result_type);
    builder.build_store(result, destination_ptr);
    Ok(())
}

fn ir_gen_return(
    builder: &mut Builder,
    value: Option<&Expr>,
    last_minute: &[Expr],
    source: Source,
) -> GenResult<()> {
    // Deferred tail statements run before the function returns
    if !last_minute.is_empty() {
        builder.open_scope();
        ir_gen_stmts(builder, last_minute)?;
        handle_deference_for_variables(builder, builder.current_scope)?;
        builder.close_scope();
    }

    let return_value = match value {
        Some(value) => {
            let expected = builder.ast_return_type.clone();
            let (mut generated, value_type) = ir_gen_expr(builder, value, false)?;
            conform_or_error(builder, &mut generated, &value_type, &expected, source)?;
            Some(generated)
        }
        None => None,
    };

    defer_scopes_above(builder, None)?;
    builder.build_ret(return_value);
    Ok(())
}

fn ir_gen_if(
    builder: &mut Builder,
    condition: &Expr,
    statements: &[Expr],
    else_statements: Option<&[Expr]>,
    is_unless: bool,
    source: Source,
) -> GenResult<()> {
    let (mut condition_value, condition_type) = ir_gen_expr(builder, condition, false)?;
    conform_or_error(
        builder,
        &mut condition_value,
        &condition_type,
        &Type::base("bool"),
        source,
    )?;

    let then_block = builder.build_basicblock();
    let else_block = else_statements.map(|_| builder.build_basicblock());
    let end_block = builder.build_basicblock();

    let on_false = else_block.unwrap_or(end_block);

    if is_unless {
        builder.build_cond_break(condition_value, on_false, then_block);
    } else {
        builder.build_cond_break(condition_value, then_block, on_false);
    }

    builder.use_block(then_block);
    builder.open_scope();
    let then_terminated = ir_gen_stmts(builder, statements)?;
    if !then_terminated {
        handle_deference_for_variables(builder, builder.current_scope)?;
        builder.build_break(end_block);
    }
    builder.close_scope();

    if let (Some(else_block), Some(else_statements)) = (else_block, else_statements) {
        builder.use_block(else_block);
        builder.open_scope();
        let else_terminated = ir_gen_stmts(builder, else_statements)?;
        if !else_terminated {
            handle_deference_for_variables(builder, builder.current_scope)?;
            builder.build_break(end_block);
        }
        builder.close_scope();
    }

    builder.use_block(end_block);
    Ok(())
}

/// Saved break/continue state around a nested loop
struct LoopState {
    break_block_id: Option<usize>,
    continue_block_id: Option<usize>,
    break_continue_scope: ScopeId,
}

fn enter_loop(builder: &mut Builder, break_block: usize, continue_block: usize) -> LoopState {
    let saved = LoopState {
        break_block_id: builder.break_block_id,
        continue_block_id: builder.continue_block_id,
        break_continue_scope: builder.break_continue_scope,
    };

    builder.break_block_id = Some(break_block);
    builder.continue_block_id = Some(continue_block);
    builder.break_continue_scope = builder.current_scope;
    saved
}

fn exit_loop(builder: &mut Builder, saved: LoopState) {
    builder.break_block_id = saved.break_block_id;
    builder.continue_block_id = saved.continue_block_id;
    builder.break_continue_scope = saved.break_continue_scope;
}

fn ir_gen_while(
    builder: &mut Builder,
    condition: &Expr,
    statements: &[Expr],
    is_until: bool,
    label: Option<&str>,
    source: Source,
) -> GenResult<()> {
    let test_block = builder.build_basicblock();
    let body_block = builder.build_basicblock();
    let end_block = builder.build_basicblock();

    builder.build_break(test_block);

    builder.use_block(test_block);
    let (mut condition_value, condition_type) = ir_gen_expr(builder, condition, false)?;
    conform_or_error(
        builder,
        &mut condition_value,
        &condition_type,
        &Type::base("bool"),
        source,
    )?;

    if is_until {
        builder.build_cond_break(condition_value, end_block, body_block);
    } else {
        builder.build_cond_break(condition_value, body_block, end_block);
    }

    builder.use_block(body_block);
    let saved = enter_loop(builder, end_block, test_block);
    builder.push_loop_label(label, end_block, test_block);
    builder.open_scope();

    let terminated = ir_gen_stmts(builder, statements)?;
    if !terminated {
        handle_deference_for_variables(builder, builder.current_scope)?;
        builder.build_break(test_block);
    }

    builder.close_scope();
    builder.pop_loop_label(label);
    exit_loop(builder, saved);

    builder.use_block(end_block);
    Ok(())
}

fn ir_gen_repeat(
    builder: &mut Builder,
    limit: &Expr,
    statements: &[Expr],
    idx_name: Option<&str>,
    label: Option<&str>,
    source: Source,
) -> GenResult<()> {
    let usize_type = Type::base("usize");
    let idx_name = idx_name.unwrap_or("idx");

    builder.open_scope();

    let usize_ir = builder.usize_type();
    let idx_var = builder.add_variable(idx_name, &usize_type, usize_ir, DeclareTraits::empty());
    builder.mark_variable_used(idx_var.id);
    let idx_ptr = builder.build_varptr(&idx_var);
    let zero = builder.build_literal_usize(0);
    builder.build_store(zero, idx_ptr);

    let (mut limit_value, limit_type) = ir_gen_expr(builder, limit, false)?;
    conform_or_error(builder, &mut limit_value, &limit_type, &usize_type, source)?;

    let test_block = builder.build_basicblock();
    let body_block = builder.build_basicblock();
    let increment_block = builder.build_basicblock();
    let end_block = builder.build_basicblock();

    builder.build_break(test_block);

    builder.use_block(test_block);
    let idx_ptr = builder.build_varptr(&idx_var);
    let idx_value = builder.build_load(idx_ptr, source);
    let bool_type = builder.bool_type();
    let in_range = builder.build_math(
        adept_ir::IrMathOp::ULessThan,
        idx_value,
        limit_value.clone(),
        bool_type,
    );
    builder.build_cond_break(in_range, body_block, end_block);

    builder.use_block(body_block);
    let saved = enter_loop(builder, end_block, increment_block);
    builder.push_loop_label(label, end_block, increment_block);
    builder.open_scope();

    let terminated = ir_gen_stmts(builder, statements)?;
    if !terminated {
        handle_deference_for_variables(builder, builder.current_scope)?;
        builder.build_break(increment_block);
    }

    builder.close_scope();
    builder.pop_loop_label(label);
    exit_loop(builder, saved);

    builder.use_block(increment_block);
    let idx_ptr = builder.build_varptr(&idx_var);
    let current = builder.build_load(idx_ptr.clone(), source);
    let one = builder.build_literal_usize(1);
    let incremented = builder.build_math(adept_ir::IrMathOp::Add, current, one, usize_ir);
    builder.build_store(incremented, idx_ptr);
    builder.build_break(test_block);

    builder.use_block(end_block);
    handle_deference_for_variables(builder, builder.current_scope)?;
    builder.close_scope();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn ir_gen_each(
    builder: &mut Builder,
    it_name: Option<&str>,
    it_type: &Type,
    array: &Expr,
    length: &Expr,
    statements: &[Expr],
    label: Option<&str>,
    source: Source,
) -> GenResult<()> {
    let usize_type = Type::base("usize");
    let it_name = it_name.unwrap_or("it");

    builder.open_scope();

    // Hidden induction variable
    let usize_ir = builder.usize_type();
    let idx_var = builder.add_variable("idx", &usize_type, usize_ir, DeclareTraits::empty());
    builder.mark_variable_used(idx_var.id);
    let idx_ptr = builder.build_varptr(&idx_var);
    let zero = builder.build_literal_usize(0);
    builder.build_store(zero, idx_ptr);

    let (array_value, array_type) = ir_gen_expr(builder, array, false)?;
    if array_type.dereferenced().is_none() {
        let message = format!("cannot iterate over value of type '{}'", array_type);
        return builder.panic(source, message);
    }

    let (mut length_value, length_type) = ir_gen_expr(builder, length, false)?;
    conform_or_error(builder, &mut length_value, &length_type, &usize_type, source)?;

    let test_block = builder.build_basicblock();
    let body_block = builder.build_basicblock();
    let increment_block = builder.build_basicblock();
    let end_block = builder.build_basicblock();

    builder.build_break(test_block);

    builder.use_block(test_block);
    let idx_ptr = builder.build_varptr(&idx_var);
    let idx_value = builder.build_load(idx_ptr, source);
    let bool_type = builder.bool_type();
    let in_range = builder.build_math(
        adept_ir::IrMathOp::ULessThan,
        idx_value.clone(),
        length_value.clone(),
        bool_type,
    );
    builder.build_cond_break(in_range, body_block, end_block);

    builder.use_block(body_block);
    let saved = enter_loop(builder, end_block, increment_block);
    builder.push_loop_label(label, end_block, increment_block);
    builder.open_scope();

    // `it` holds a copy of the current element
    let it_ir_type = resolve_ir_type(builder.ctx, it_type)?;
    let it_var = builder.add_variable(it_name, it_type, it_ir_type, DeclareTraits::empty());
    builder.mark_variable_used(it_var.id);
    let idx_ptr = builder.build_varptr(&idx_var);
    let current_idx = builder.build_load(idx_ptr, source);
    let elem_ptr = builder.build_array_access(array_value.clone(), current_idx, source);
    let elem = builder.build_load(elem_ptr, source);
    let it_ptr = builder.build_varptr(&it_var);
    builder.build_store(elem, it_ptr);

    let terminated = ir_gen_stmts(builder, statements)?;
    if !terminated {
        handle_deference_for_variables(builder, builder.current_scope)?;
        builder.build_break(increment_block);
    }

    builder.close_scope();
    builder.pop_loop_label(label);
    exit_loop(builder, saved);

    builder.use_block(increment_block);
    let idx_ptr = builder.build_varptr(&idx_var);
    let current = builder.build_load(idx_ptr.clone(), source);
    let one = builder.build_literal_usize(1);
    let incremented = builder.build_math(adept_ir::IrMathOp::Add, current, one, usize_ir);
    builder.build_store(incremented, idx_ptr);
    builder.build_break(test_block);

    builder.use_block(end_block);
    handle_deference_for_variables(builder, builder.current_scope)?;
    builder.close_scope();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn ir_gen_for(
    builder: &mut Builder,
    before: &[Expr],
    condition: Option<&Expr>,
    after: &[Expr],
    statements: &[Expr],
    label: Option<&str>,
    source: Source,
) -> GenResult<()> {
    builder.open_scope();
    ir_gen_stmts(builder, before)?;

    let test_block = builder.build_basicblock();
    let body_block = builder.build_basicblock();
    let after_block = builder.build_basicblock();
    let end_block = builder.build_basicblock();

    builder.build_break(test_block);

    builder.use_block(test_block);
    match condition {
        Some(condition) => {
            let (mut condition_value, condition_type) = ir_gen_expr(builder, condition, false)?;
            conform_or_error(
                builder,
                &mut condition_value,
                &condition_type,
                &Type::base("bool"),
                source,
            )?;
            builder.build_cond_break(condition_value, body_block, end_block);
        }
        None => builder.build_break(body_block),
    }

    builder.use_block(body_block);
    let saved = enter_loop(builder, end_block, after_block);
    builder.push_loop_label(label, end_block, after_block);
    builder.open_scope();

    let terminated = ir_gen_stmts(builder, statements)?;
    if !terminated {
        handle_deference_for_variables(builder, builder.current_scope)?;
        builder.build_break(after_block);
    }

    builder.close_scope();
    builder.pop_loop_label(label);
    exit_loop(builder, saved);

    builder.use_block(after_block);
    ir_gen_stmts(builder, after)?;
    builder.build_break(test_block);

    builder.use_block(end_block);
    handle_deference_for_variables(builder, builder.current_scope)?;
    builder.close_scope();
    Ok(())
}

fn ir_gen_switch(
    builder: &mut Builder,
    value: &Expr,
    cases: &[adept_ast::SwitchCase],
    default_statements: Option<&[Expr]>,
    is_exhaustive: bool,
    source: Source,
) -> GenResult<()> {
    let (switch_value, switch_type) = ir_gen_expr(builder, value, false)?;

    // Exhaustive switches over an enum must cover every member
    if is_exhaustive && default_statements.is_none() {
        if let Some(enumeration) = switch_type
            .struct_name()
            .and_then(|name| builder.ctx.ast.find_enum(name))
        {
            let mut covered = vec![false; enumeration.kinds.len()];

            for case in cases {
                if let ExprKind::EnumValue { kind, .. } | ExprKind::UnknownEnumValue { kind } =
                    &case.value.kind
                {
                    if let Some(index) = enumeration.kind_index(kind) {
                        covered[index] = true;
                    }
                }
            }

            if let Some(missing) = covered.iter().position(|&reached| !reached) {
                let kinds = enumeration.kinds.clone();
                let message = format!(
                    "exhaustive switch is missing case for '{}'",
                    kinds[missing]
                );
                return builder.panic(source, message);
            }
        }
    }

    let end_block = builder.build_basicblock();

    // Pre-create a body block per case so fallthrough can target the
    // next case's body
    let case_blocks: Vec<usize> = cases.iter().map(|_| builder.build_basicblock()).collect();
    let default_block = default_statements.map(|_| builder.build_basicblock());

    // Comparison chain
    for (index, case) in cases.iter().enumerate() {
        let (mut case_value, case_type) = ir_gen_expr(builder, &case.value, false)?;
        conform_or_error(builder, &mut case_value, &case_type, &switch_type, case.source)?;

        if !case_value.is_constant() {
            return builder.panic(case.source, "switch case value must be constant");
        }

        let next_test = builder.build_basicblock();
        let bool_type = builder.bool_type();
        let matches = builder.build_math(
            adept_ir::IrMathOp::Equals,
            switch_value.clone(),
            case_value,
            bool_type,
        );
        builder.build_cond_break(matches, case_blocks[index], next_test);
        builder.use_block(next_test);
    }

    builder.build_break(default_block.unwrap_or(end_block));

    // Case bodies
    let saved_fallthrough = builder.fallthrough_block_id;
    let saved_fallthrough_scope = builder.fallthrough_scope;
    let saved_break = builder.break_block_id;
    let saved_break_scope = builder.break_continue_scope;

    for (index, case) in cases.iter().enumerate() {
        builder.use_block(case_blocks[index]);
        builder.open_scope();

        builder.break_block_id = Some(end_block);
        builder.break_continue_scope = builder.current_scope;
        builder.fallthrough_block_id = case_blocks
            .get(index + 1)
            .copied()
            .or(default_block)
            .or(Some(end_block));
        builder.fallthrough_scope = builder.current_scope;

        let terminated = ir_gen_stmts(builder, &case.statements)?;
        if !terminated {
            handle_deference_for_variables(builder, builder.current_scope)?;
            builder.build_break(end_block);
        }
        builder.close_scope();
    }

    if let (Some(default_block), Some(default_statements)) = (default_block, default_statements) {
        builder.use_block(default_block);
        builder.open_scope();
        builder.break_block_id = Some(end_block);
        builder.break_continue_scope = builder.current_scope;
        builder.fallthrough_block_id = None;

        let terminated = ir_gen_stmts(builder, default_statements)?;
        if !terminated {
            handle_deference_for_variables(builder, builder.current_scope)?;
            builder.build_break(end_block);
        }
        builder.close_scope();
    }

    builder.fallthrough_block_id = saved_fallthrough;
    builder.fallthrough_scope = saved_fallthrough_scope;
    builder.break_block_id = saved_break;
    builder.break_continue_scope = saved_break_scope;

    builder.use_block(end_block);
    Ok(())
}
