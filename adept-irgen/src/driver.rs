// The entry pass driver
// Orders IR generation: type pre-registration, function declaration,
// virtual declaration, vtree construction, body emission to a fixed
// point, vtable emission, module init/deinit, RTTI finalization.

use crate::builder::Builder;
use crate::config::{CompilerConfig, CompilerTraits};
use crate::ctx::GenContext;
use crate::error::{fatal, GenResult};
use crate::func_gen::ir_gen_func_body;
use crate::gen_type::resolve_ir_type;
use crate::instantiate::declare_concrete_func;
use crate::management::{conform_or_error, handle_single_deference};
use crate::rtti::{declare_rtti_globals, rtti_finalize};
use crate::vtree::ir_gen_vtrees;
use adept_ast::{Ast, Func, FuncTraits, GlobalTraits, Type};
use adept_diagnostics::Diagnostics;
use adept_ir::{
    FuncEndpoint, IrFuncTraits, IrGlobal, IrModule, IrType, IrValue, ValueKind, VtableInit,
};

/// Produce an IR module from a fully parsed AST, or report compile
/// errors into the diagnostics sink
pub fn ir_gen(
    config: &CompilerConfig,
    ast: &mut Ast,
    diagnostics: &mut Diagnostics,
) -> Result<IrModule, CompileError> {
    if config.traits.contains(CompilerTraits::FUSSY) {
        diagnostics.warnings.fussy = true;
    }
    if config.traits.contains(CompilerTraits::NO_WARN) {
        diagnostics.warnings.silent = true;
    }

    let mut ctx = GenContext::new(config, diagnostics, ast);

    let result = run_passes(&mut ctx);
    let module = ctx.module;

    match result {
        Ok(()) if !diagnostics.has_errors() => Ok(module),
        _ => Err(CompileError {
            error_count: diagnostics.error_count().max(1),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("compilation failed with {error_count} error(s)")]
pub struct CompileError {
    pub error_count: usize,
}

fn run_passes(ctx: &mut GenContext) -> GenResult<()> {
    // 1. Type pre-registration
    pre_register_types(ctx)?;
    declare_globals(ctx)?;
    if ctx.config.rtti_enabled() {
        declare_rtti_globals(ctx);
    }

    // 2. Function declaration
    declare_functions(ctx)?;

    // 3. Virtual declaration pass
    declare_dispatchers(ctx)?;

    // 4. Vtree construction
    ir_gen_vtrees(ctx)?;

    // 5. Body emission to a fixed point
    drain_job_list(ctx)?;

    // 6. Vtable emission (re-running the vtree pass first to cover
    //    class signatures instantiated during body emission)
    ir_gen_vtrees(ctx)?;
    emit_vtables(ctx)?;

    // 7. RTTI finalization
    let finalized_relocations = ctx.module.rtti_relocations.len();
    rtti_finalize(ctx)?;

    // 8. Static initializers and global cleanup
    emit_module_init(ctx)?;
    emit_module_deinit(ctx)?;
    drain_job_list(ctx)?;

    // Module init/deinit may not introduce new runtime type queries
    // after the `__types__` array has been frozen
    if ctx.module.rtti_relocations.len() > finalized_relocations {
        let relocation = ctx.module.rtti_relocations[finalized_relocations].clone();
        ctx.panic(
            relocation.source_on_failure,
            "typeinfo cannot be used in global initializers",
        );
        return fatal();
    }

    debug_assert_eq!(ctx.module.job_list.outstanding(), 0);
    Ok(())
}

fn pre_register_types(ctx: &mut GenContext) -> GenResult<()> {
    let names: Vec<String> = ctx
        .ast
        .composites
        .iter()
        .filter(|composite| !composite.is_polymorphic())
        .map(|composite| composite.name.clone())
        .collect();

    for name in names {
        resolve_ir_type(ctx, &Type::base(name))?;
    }

    Ok(())
}

fn declare_globals(ctx: &mut GenContext) -> GenResult<()> {
    for index in 0..ctx.ast.globals.len() {
        let global = ctx.ast.globals[index].clone();
        let ir_type = resolve_ir_type(ctx, &global.ty)?;

        ctx.module.globals.push(IrGlobal {
            name: global.name,
            ast_type: global.ty,
            ir_type,
            traits: global.traits,
            initial: None,
        });
    }

    Ok(())
}

fn declare_functions(ctx: &mut GenContext) -> GenResult<()> {
    for ast_func_id in 0..ctx.ast.funcs.len() {
        let func = &ctx.ast.funcs[ast_func_id];
        let name = func.name.clone();
        let subject = func.subject_name().map(String::from);

        if func.is_polymorphic() {
            // Polymorphic functions get an endpoint with no IR function;
            // instantiation fills one in per catalog
            let endpoint = FuncEndpoint::polymorphic(ast_func_id);
            ctx.module.create_func_mapping(&name, endpoint, false);

            if let Some(subject) = subject {
                ctx.module.create_method_mapping(&subject, &name, endpoint);
            }
            continue;
        }

        declare_concrete_func(ctx, ast_func_id)?;
    }

    Ok(())
}

fn declare_dispatchers(ctx: &mut GenContext) -> GenResult<()> {
    for ast_func_id in 0..ctx.ast.funcs.len() {
        let func = &ctx.ast.funcs[ast_func_id];

        if !func.traits.contains(FuncTraits::VIRTUAL)
            || func.traits.contains(FuncTraits::POLYMORPHIC)
        {
            continue;
        }

        if func.virtual_dispatcher.is_some() {
            continue;
        }

        let mut dispatcher = Func::new(
            func.name.clone(),
            func.params.clone(),
            func.return_type.clone(),
        );
        dispatcher.traits =
            (func.traits - FuncTraits::VIRTUAL - FuncTraits::OVERRIDE) | FuncTraits::DISPATCHER;
        dispatcher.source = func.source;
        dispatcher.virtual_origin = Some(ast_func_id);

        let dispatcher_id = ctx.ast.add_func(dispatcher);
        ctx.ast.funcs[ast_func_id].virtual_dispatcher = Some(dispatcher_id);

        let dispatcher_ir_id = declare_concrete_func(ctx, dispatcher_id)?;

        if ctx.config.null_checks() {
            ctx.module.funcs[dispatcher_ir_id].traits |= IrFuncTraits::VALIDATE_VTABLE;
        }
    }

    Ok(())
}

/// Drain the job list to exhaustion. Body generation may push new
/// concrete endpoints (instantiation, autogen); memoization guarantees
/// a fixed point.
fn drain_job_list(ctx: &mut GenContext) -> GenResult<()> {
    while let Some(job) = ctx.module.job_list.pop_next() {
        let Some(ir_func_id) = job.ir_func_id else {
            debug_assert!(false, "polymorphic endpoint queued for body emission");
            continue;
        };

        if ctx.module.funcs[ir_func_id].has_body() {
            continue;
        }

        ir_gen_func_body(ctx, job.ast_func_id, ir_func_id)?;
    }

    Ok(())
}

/// Materialize each vtree node's table as a constant array of function
/// addresses typed as a (length, pointer-to-array) object
fn emit_vtables(ctx: &mut GenContext) -> GenResult<()> {
    let vtable_object_type = {
        const VTABLE_TYPE_NAME: &str = "__VTable__";

        match ctx.module.type_map.find(VTABLE_TYPE_NAME) {
            Some(existing) => existing,
            None => {
                let u64_type = ctx.module.pool.intern(IrType::U64);
                let ptr_type = ctx.module.common.ptr_type;
                let entries_type = ctx.module.pool.pointer_to(ptr_type);
                let structure = ctx.module.pool.reserve_structure();
                ctx.module
                    .pool
                    .bind_structure(structure, vec![u64_type, entries_type], false);
                ctx.module.type_map.insert(VTABLE_TYPE_NAME, structure);
                structure
            }
        }
    };

    for node in 0..ctx.vtrees.len() {
        if ctx.vtrees.vtrees[node].finalized_table.is_some() {
            continue;
        }

        let table = ctx.vtrees.vtrees[node].table.clone();
        let signature = ctx.vtrees.vtrees[node].signature.clone();

        let ptr_type = ctx.module.common.ptr_type;
        let entries: Vec<IrValue> = table
            .iter()
            .map(|endpoint| match endpoint.ir_func_id {
                Some(ir_func_id) => IrValue::new(ptr_type, ValueKind::FuncAddr { ir_func_id }),
                // Unfilled slots mark abstract classes
                None => IrValue::new(ptr_type, ValueKind::NullPtr),
            })
            .collect();

        let array_type = ctx
            .module
            .pool
            .fixed_array_of(ptr_type, entries.len() as u64);
        let array_global_id = ctx.module.add_anon_global(adept_ir::IrAnonGlobal {
            ir_type: array_type,
            is_constant: true,
            initializer: Some(IrValue::new(
                array_type,
                ValueKind::ArrayLiteral { values: entries },
            )),
        });

        let usize_type = ctx.module.common.usize_type;
        let entries_ptr_type = ctx.module.pool.pointer_to(ptr_type);
        let finalized = IrValue::new(
            vtable_object_type,
            ValueKind::ConstStructLiteral {
                values: vec![
                    IrValue::literal(usize_type, adept_ir::Literal::Usize(table.len() as u64)),
                    IrValue::new(
                        entries_ptr_type,
                        ValueKind::ConstAnonGlobal {
                            anon_global_id: array_global_id,
                        },
                    ),
                ],
            },
        );

        ctx.vtrees.vtrees[node].finalized_table = Some(finalized.clone());
        ctx.module.vtable_init_list.push(VtableInit {
            signature,
            table: finalized,
        });
    }

    Ok(())
}

/// Synthetic AST function shell for the module init/deinit builders
fn declare_implicit_func(ctx: &mut GenContext, name: &str) -> GenResult<(usize, usize)> {
    let mut func = Func::new(name, vec![], Type::base("void"));
    func.traits = FuncTraits::IMPLICIT;

    let ast_func_id = ctx.ast.add_func(func);
    let ir_func_id = declare_concrete_func(ctx, ast_func_id)?;
    // Module lifecycle functions keep their exported names
    ctx.module.funcs[ir_func_id].name = name.into();
    Ok((ast_func_id, ir_func_id))
}

/// Emit the module-init function: store initial values into global
/// variables (vtable arrays are constant and need no runtime setup)
fn emit_module_init(ctx: &mut GenContext) -> GenResult<()> {
    let (ast_func_id, ir_func_id) = declare_implicit_func(ctx, "__adept_module_init__")?;
    ctx.module.init_func_id = Some(ir_func_id);

    let initialized: Vec<(usize, adept_ast::Expr, Type)> = ctx
        .ast
        .globals
        .iter()
        .enumerate()
        .filter(|(_, global)| !global.traits.contains(GlobalTraits::EXTERNAL))
        .filter_map(|(index, global)| {
            global
                .initial
                .clone()
                .map(|initial| (index, initial, global.ty.clone()))
        })
        .collect();

    let mut builder = Builder::new(ctx, ast_func_id, ir_func_id, Type::base("void"));

    for (ast_global_index, initial, global_type) in initialized {
        let name = builder.ctx.ast.globals[ast_global_index].name.clone();
        let Some(global_id) = builder.ctx.module.find_global(&name) else {
            continue;
        };

        let (mut value, value_type) = crate::expr::ir_gen_expr(&mut builder, &initial, false)?;
        conform_or_error(&mut builder, &mut value, &value_type, &global_type, initial.source)?;

        let ir_type = builder.ctx.module.globals[global_id].ir_type;
        let ptr_type = builder.ctx.module.pool.pointer_to(ir_type);
        let destination = builder.build_gvarptr(ptr_type, global_id);
        builder.build_store(value, destination);
    }

    builder.build_ret(None);
    builder.finish();
    Ok(())
}

/// Emit the module-deinit function: `__defer__` on globals in reverse
/// declaration order, then static variable teardown
fn emit_module_deinit(ctx: &mut GenContext) -> GenResult<()> {
    let (ast_func_id, ir_func_id) = declare_implicit_func(ctx, "__adept_module_deinit__")?;
    ctx.module.deinit_func_id = Some(ir_func_id);

    let mut builder = Builder::new(ctx, ast_func_id, ir_func_id, Type::base("void"));

    let globals: Vec<(usize, Type)> = builder
        .ctx
        .module
        .globals
        .iter()
        .enumerate()
        .filter(|(_, global)| {
            !global
                .traits
                .intersects(GlobalTraits::EXTERNAL | GlobalTraits::SPECIAL)
        })
        .map(|(index, global)| (index, global.ast_type.clone()))
        .collect();

    for (global_id, ast_type) in globals.into_iter().rev() {
        let ir_type = builder.ctx.module.globals[global_id].ir_type;
        let ptr_type = builder.ctx.module.pool.pointer_to(ir_type);
        let global_ptr = builder.build_gvarptr(ptr_type, global_id);
        handle_single_deference(&mut builder, &ast_type, global_ptr, adept_diagnostics::Source::NONE)?;
    }

    builder.push(adept_ir::Instr::DeinitSvars);
    builder.build_ret(None);
    builder.finish();
    Ok(())
}
