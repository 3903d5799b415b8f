// Function body emission
// Pops jobs off the module's job list and generates bodies with the IR
// builder. AUTOGEN functions expand into per-field management calls;
// DISPATCHER functions load the vtable and call through their slot.

use crate::builder::Builder;
use crate::ctx::GenContext;
use crate::error::{fatal, GenResult};
use crate::gen_type::{member_index_offset, resolve_ir_type};
use crate::management::{
    handle_assign_management, handle_deference_for_variables, handle_single_deference,
    handle_single_pass,
};
use crate::stmt::ir_gen_stmts;
use adept_ast::{
    resolve_type, DeclareTraits, FuncId, FuncTraits, ParamTraits, PolyCatalog, Type, TypeElem,
};
use adept_diagnostics::Source;
use adept_ir::{IrFuncId, IrFuncTraits, IrValue, Literal, ValueKind};

/// Generate the body of one IR function
pub fn ir_gen_func_body(
    ctx: &mut GenContext,
    ast_func_id: FuncId,
    ir_func_id: IrFuncId,
) -> GenResult<()> {
    let func = ctx.ast.funcs[ast_func_id].clone();

    if func.traits.contains(FuncTraits::FOREIGN) {
        return Ok(());
    }

    let arg_ir_types = ctx.module.funcs[ir_func_id].arg_types.clone();
    let mut builder = Builder::new(ctx, ast_func_id, ir_func_id, func.return_type.clone());

    // Parameters populate the root scope
    for (index, param) in func.params.iter().enumerate() {
        let mut traits = DeclareTraits::empty();
        if param.traits.contains(ParamTraits::POD) {
            traits |= DeclareTraits::POD;
        }
        builder.add_variable(&param.name, &param.ty, arg_ir_types[index], traits);
    }

    if func.traits.contains(FuncTraits::DISPATCHER) {
        ir_gen_dispatcher_body(&mut builder, &func)?;
        builder.finish();
        return Ok(());
    }

    if func.traits.contains(FuncTraits::AUTOGEN) {
        ir_gen_autogen_body(&mut builder, &func)?;
        builder.finish();
        return Ok(());
    }

    let terminated = ir_gen_stmts(&mut builder, &func.statements)?;

    if !terminated {
        emit_epilogue(&mut builder, &func)?;
    }

    warn_unused_variables(&mut builder, func.arity())?;
    builder.finish();
    Ok(())
}

/// Warn about declared locals that were never referenced.
/// Parameters are exempt; loop induction variables are marked used by
/// the loop machinery itself.
fn warn_unused_variables(builder: &mut Builder, arity: usize) -> GenResult<()> {
    use adept_diagnostics::WarningKind;

    let mut unused: Vec<String> = Vec::new();

    for scope_id in 0..builder.scopes.len() {
        for variable in &builder.scopes.get(scope_id).variables {
            if variable.id < arity
                || variable.traits.contains(DeclareTraits::STATIC)
                || builder.used_var_ids.contains(&variable.id)
            {
                continue;
            }
            unused.push(variable.name.clone());
        }
    }

    for name in unused {
        let message = format!("variable '{}' is unused", name);
        if builder.ctx.warn(WarningKind::UnusedVariable, message, Source::NONE) {
            return Err(crate::error::Failure::Fatal);
        }
    }

    Ok(())
}

fn emit_epilogue(builder: &mut Builder, func: &adept_ast::Func) -> GenResult<()> {
    let returns_void = func.return_type.is_none() || func.return_type.is_base_named("void");

    handle_deference_for_variables(builder, builder.current_scope)?;

    if returns_void {
        builder.build_ret(None);
        return Ok(());
    }

    // Falling off the end of main yields success
    if func.traits.contains(FuncTraits::MAIN) {
        let zero = builder.build_literal(Literal::S32(0));
        builder.build_ret(Some(zero));
        return Ok(());
    }

    let message = format!(
        "must return a value of type '{}' before exiting function '{}'",
        func.return_type, func.name
    );
    builder.panic(func.source, message)
}

/// Fields of the composite behind an autogen subject type, with field
/// types resolved through the usage catalog and IR member indices
fn autogen_fields(
    ctx: &mut GenContext,
    subject_type: &Type,
    source: Source,
) -> GenResult<Vec<(Type, usize)>> {
    let Some(name) = subject_type.struct_name() else {
        ctx.panic(source, "lifecycle autogeneration requires a composite type");
        return fatal();
    };

    let Some(composite) = ctx.ast.find_composite(name).cloned() else {
        let message = format!("undeclared type '{}'", name);
        ctx.panic(source, message);
        return fatal();
    };

    let mut catalog = PolyCatalog::new();
    if let [TypeElem::GenericBase { generics, .. }] = subject_type.elements.as_slice() {
        if generics.len() != composite.generics.len() {
            ctx.panic(source, "type parameter count mismatch during autogeneration");
            return fatal();
        }
        catalog.add_types(composite.generics.iter().map(String::as_str), generics);
    }

    let offset = member_index_offset(&composite);
    let mut fields = Vec::with_capacity(composite.fields.len());

    for (index, field) in composite.fields.iter().enumerate() {
        let field_type = if catalog.is_empty() {
            field.ty.clone()
        } else {
            let collector = ctx.module.rtti_collector.as_mut();
            match resolve_type(&catalog, collector, &field.ty) {
                Ok(resolved) => resolved,
                Err(error) => {
                    ctx.panic(field.ty.source, error.to_string());
                    return fatal();
                }
            }
        };

        fields.push((field_type, index + offset));
    }

    Ok(fields)
}

/// Pointer to a field of the subject referenced by local variable 0
fn field_ptr_through_this(
    builder: &mut Builder,
    member_index: usize,
    field_type: &Type,
    source: Source,
) -> GenResult<IrValue> {
    let this_var = builder.scopes.get(adept_ir::ScopeArena::ROOT).variables[0].clone();
    let this_ptr = builder.build_varptr(&this_var);
    let this_value = builder.build_load(this_ptr, source);

    let field_ir_type = resolve_ir_type(builder.ctx, field_type)?;
    let field_ptr_type = builder.ctx.module.pool.pointer_to(field_ir_type);
    Ok(builder.build_member(this_value, member_index, field_ptr_type, source))
}

fn ir_gen_autogen_body(builder: &mut Builder, func: &adept_ast::Func) -> GenResult<()> {
    let source = func.source;

    match func.name.as_str() {
        "__defer__" => {
            let subject_type = func.params[0]
                .ty
                .dereferenced()
                .unwrap_or_else(|| func.params[0].ty.clone());
            let fields = autogen_fields(builder.ctx, &subject_type, source)?;

            // Fields are processed in declaration order
            for (field_type, member_index) in fields {
                let field_ptr = field_ptr_through_this(builder, member_index, &field_type, source)?;
                handle_single_deference(builder, &field_type, field_ptr, source)?;
            }

            builder.build_ret(None);
        }
        "__pass__" => {
            let subject_type = func.params[0].ty.clone();
            let fields = autogen_fields(builder.ctx, &subject_type, source)?;

            // Pass each field in place, then return the updated subject
            let passed_var = builder.scopes.get(adept_ir::ScopeArena::ROOT).variables[0].clone();

            for (field_type, member_index) in fields {
                let passed_ptr = builder.build_varptr(&passed_var);
                let field_ir_type = resolve_ir_type(builder.ctx, &field_type)?;
                let field_ptr_type = builder.ctx.module.pool.pointer_to(field_ir_type);
                let field_ptr =
                    builder.build_member(passed_ptr, member_index, field_ptr_type, source);

                let mut field_value = builder.build_load(field_ptr.clone(), source);
                let utilized = handle_single_pass(builder, &field_type, &mut field_value, source)?;
                if utilized {
                    builder.build_store(field_value, field_ptr);
                }
            }

            let passed_ptr = builder.build_varptr(&passed_var);
            let result = builder.build_load(passed_ptr, source);
            builder.build_ret(Some(result));
        }
        "__assign__" => {
            let subject_type = func.params[0]
                .ty
                .dereferenced()
                .unwrap_or_else(|| func.params[0].ty.clone());
            let fields = autogen_fields(builder.ctx, &subject_type, source)?;

            let other_var = builder.scopes.get(adept_ir::ScopeArena::ROOT).variables[1].clone();

            for (field_type, member_index) in fields {
                let destination_ptr =
                    field_ptr_through_this(builder, member_index, &field_type, source)?;

                let other_ptr = builder.build_varptr(&other_var);
                let field_ir_type = resolve_ir_type(builder.ctx, &field_type)?;
                let field_ptr_type = builder.ctx.module.pool.pointer_to(field_ir_type);
                let source_ptr =
                    builder.build_member(other_ptr, member_index, field_ptr_type, source);
                let source_value = builder.build_load(source_ptr, source);

                let managed = handle_assign_management(
                    builder,
                    source_value.clone(),
                    &field_type,
                    destination_ptr.clone(),
                    &field_type,
                    source,
                )?;

                if !managed {
                    builder.build_store(source_value, destination_ptr);
                }
            }

            builder.build_ret(None);
        }
        other => {
            let message = format!("cannot autogenerate unknown lifecycle function '{}'", other);
            return builder.panic(source, message);
        }
    }

    Ok(())
}

/// Dispatcher bodies load the receiver's vtable, index the method's
/// slot, and call through it with the original arguments
fn ir_gen_dispatcher_body(builder: &mut Builder, func: &adept_ast::Func) -> GenResult<()> {
    let source = func.source;
    let ir_func_id = builder.ir_func_id;

    let Some(slot) = builder
        .ctx
        .module
        .vtable_dispatch_list
        .iter()
        .find(|dispatch| dispatch.ir_func_id == ir_func_id)
        .map(|dispatch| dispatch.index)
    else {
        return builder.panic(
            source,
            "internal error: dispatcher has no assigned vtable slot",
        );
    };

    // Load every parameter for forwarding
    let param_vars: Vec<_> = builder
        .scopes
        .get(adept_ir::ScopeArena::ROOT)
        .variables
        .clone();

    let mut forwarded = Vec::with_capacity(param_vars.len());
    for variable in &param_vars {
        let ptr = builder.build_varptr(variable);
        forwarded.push(builder.build_load(ptr, source));
    }

    // Receiver's vtable pointer is the implicit first member
    let receiver = forwarded[0].clone();
    let ptr_type = builder.ptr_type();
    let vtable_ptr_type = builder.ctx.module.pool.pointer_to(ptr_type);
    let vtable_field_type = builder.ctx.module.pool.pointer_to(vtable_ptr_type);

    let vtable_field = builder.build_member(receiver, 0, vtable_field_type, source);
    let vtable = builder.build_load(vtable_field, source);

    let slot_index = builder.build_literal_usize(slot as u64);
    let entry_ptr = builder.build_array_access(vtable, slot_index, source);
    let target = builder.build_load(entry_ptr, source);

    // Optionally verify the slot was initialized
    if builder.ctx.module.funcs[ir_func_id]
        .traits
        .contains(IrFuncTraits::VALIDATE_VTABLE)
    {
        let null = IrValue::new(builder.ptr_type(), ValueKind::NullPtr);
        let bool_type = builder.bool_type();
        let valid = builder.build_math(
            adept_ir::IrMathOp::NotEquals,
            target.clone(),
            null,
            bool_type,
        );

        let ok_block = builder.build_basicblock();
        let fail_block = builder.build_basicblock();
        builder.build_cond_break(valid, ok_block, fail_block);

        builder.use_block(fail_block);
        builder.build_unreachable();

        builder.use_block(ok_block);
    }

    let return_type = builder.ctx.module.funcs[ir_func_id].return_type;
    let result = builder.build_call_address(target, forwarded, return_type, source);

    let returns_void = func.return_type.is_none() || func.return_type.is_base_named("void");
    if returns_void {
        builder.build_ret(None);
    } else {
        builder.build_ret(Some(result));
    }

    Ok(())
}
