// Procedure resolution
// Overload lookup driven by a query: rigid (concrete types, no implicit
// conversions) or conforming (implicit conversions, modifiable argument
// values, default filling). Conforming queries run a STRICT sweep first
// and fall back to LOOSE; a strict match wins regardless of definition
// order. Autogeneration of lifecycle functions is the last resort.

use crate::autogen;
use crate::builder::Builder;
use crate::conform::{ast_types_conform, func_args_conform, func_args_match, ConformMode};
use crate::ctx::GenContext;
use crate::error::{fatal, Failure, GenResult};
use crate::expr::ir_gen_expr;
use crate::instantiate::instantiate_poly_func;
use crate::polymorphable::{func_args_polymorphable, type_polymorphable};
use adept_ast::{Func, FuncId, FuncTraits, PolyCatalog, Type};
use adept_diagnostics::{nearest_name, Source};
use adept_ir::{FuncEndpoint, FuncKey, FuncPair, IrValue, MethodKey};

/// Virtual and override entries never resolve directly; dispatchers
/// stand in for them
pub const NORMAL_FORBIDDEN_TRAITS: FuncTraits = FuncTraits::VIRTUAL.union(FuncTraits::OVERRIDE);

/// Argument vector of a call being resolved; conforming queries may
/// rewrite values and append defaulted arguments
#[derive(Debug, Default)]
pub struct CallArgs {
    pub values: Vec<IrValue>,
    pub types: Vec<Type>,
}

impl CallArgs {
    pub fn new(values: Vec<IrValue>, types: Vec<Type>) -> Self {
        debug_assert_eq!(values.len(), types.len());
        Self { values, types }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Signature-only clone of an AST function (statements omitted)
pub fn func_signature(ctx: &GenContext, ast_func_id: FuncId) -> Func {
    let func = &ctx.ast.funcs[ast_func_id];
    Func {
        name: func.name.clone(),
        params: func.params.clone(),
        return_type: func.return_type.clone(),
        traits: func.traits,
        statements: Vec::new(),
        variadic: func.variadic.clone(),
        source: func.source,
        origin: func.origin,
        instantiation_depth: func.instantiation_depth,
        virtual_dispatcher: func.virtual_dispatcher,
        virtual_origin: func.virtual_origin,
    }
}

/// Trait filtering applied to every candidate endpoint
fn traits_admit(
    traits: FuncTraits,
    mask: FuncTraits,
    matching: FuncTraits,
    forbid: FuncTraits,
) -> bool {
    (traits & mask) == matching && (traits & forbid).is_empty()
}

// ---- conforming queries ----

pub struct ConformQuery<'q> {
    pub proc_name: &'q str,
    pub struct_name: Option<&'q str>,
    pub gives: Option<Type>,
    pub allow_defaults: bool,
    pub forbid_traits: FuncTraits,
    pub from_source: Source,
}

impl<'q> ConformQuery<'q> {
    pub fn function(proc_name: &'q str, gives: Option<Type>, from_source: Source) -> Self {
        Self {
            proc_name,
            struct_name: None,
            gives,
            allow_defaults: true,
            forbid_traits: NORMAL_FORBIDDEN_TRAITS,
            from_source,
        }
    }

    pub fn method(
        struct_name: &'q str,
        proc_name: &'q str,
        gives: Option<Type>,
        from_source: Source,
    ) -> Self {
        Self {
            proc_name,
            struct_name: Some(struct_name),
            gives,
            allow_defaults: true,
            forbid_traits: NORMAL_FORBIDDEN_TRAITS,
            from_source,
        }
    }

    pub fn without_defaults(mut self) -> Self {
        self.allow_defaults = false;
        self
    }

    pub fn forbidding(mut self, forbid_traits: FuncTraits) -> Self {
        self.forbid_traits = forbid_traits;
        self
    }
}

/// Resolve a conforming query. `Ok(None)` means no candidate matched
/// and nothing was reported; the caller owns the diagnostic.
pub fn find_proc_conforming(
    builder: &mut Builder,
    query: &ConformQuery,
    args: &mut CallArgs,
) -> GenResult<Option<FuncPair>> {
    // A strict match anywhere beats any loose match; this two-pass
    // structure is the only reason strictness exists as a mode
    match find_proc_sweep(builder, query, args, ConformMode::Strict)? {
        Some(pair) => Ok(Some(pair)),
        None => find_proc_sweep(builder, query, args, ConformMode::Loose),
    }
}

fn candidate_endpoints(
    ctx: &GenContext,
    proc_name: &str,
    struct_name: Option<&str>,
) -> Vec<FuncEndpoint> {
    let mut endpoints = Vec::new();

    // The method map first; methods on unconventional subject types
    // only appear in the full function map
    if let Some(struct_name) = struct_name {
        if let Some(list) = ctx
            .module
            .method_map
            .find(&MethodKey::new(struct_name, proc_name))
        {
            endpoints.extend_from_slice(list);
        }
    }

    if let Some(list) = ctx.module.func_map.find(&FuncKey::new(proc_name)) {
        for endpoint in list {
            if !endpoints.contains(endpoint) {
                endpoints.push(*endpoint);
            }
        }
    }

    endpoints
}

fn find_proc_sweep(
    builder: &mut Builder,
    query: &ConformQuery,
    args: &mut CallArgs,
    mode: ConformMode,
) -> GenResult<Option<FuncPair>> {
    let endpoints = candidate_endpoints(builder.ctx, query.proc_name, query.struct_name);

    for endpoint in endpoints {
        match find_proc_sweep_partial(builder, query, args, mode, endpoint) {
            Ok(pair) => return Ok(Some(pair)),
            Err(Failure::NotFound) => continue,
            Err(Failure::Fatal) => return Err(Failure::Fatal),
        }
    }

    // Last resort: synthesize a lifecycle function
    let depth = builder.instantiation_depth();
    autogen::try_autogen_to_fill_query(
        builder.ctx,
        query.proc_name,
        query.struct_name,
        &args.types,
        depth,
        query.from_source,
    )
}

fn find_proc_sweep_partial(
    builder: &mut Builder,
    query: &ConformQuery,
    args: &mut CallArgs,
    mode: ConformMode,
    endpoint: FuncEndpoint,
) -> GenResult<FuncPair> {
    let view = func_signature(builder.ctx, endpoint.ast_func_id);

    if !traits_admit(
        view.traits,
        FuncTraits::empty(),
        FuncTraits::empty(),
        query.forbid_traits,
    ) {
        return Err(Failure::NotFound);
    }

    if query.struct_name.is_some() && !view.is_method() {
        return Err(Failure::NotFound);
    }

    if view.is_polymorphic() {
        let mut catalog = func_args_polymorphable(
            builder.ctx,
            &view,
            &args.types,
            query.gives.as_ref(),
            mode,
        )?;

        check_not_disallowed(builder.ctx, &view, query.from_source)?;

        fill_in_default_arguments(builder, &view, args, Some(&mut catalog))?;

        // Concretize argument values against the catalog-resolved
        // parameter types (literal rewriting, implicit conversions),
        // committing only if every position conforms
        let snapshot = builder.snapshot();
        let mut new_values = args.values.clone();
        let mut new_types = args.types.clone();

        for i in 0..view.arity().min(args.len()) {
            let resolved_param = match adept_ast::resolve_type(&catalog, None, &view.params[i].ty) {
                Ok(resolved) => resolved,
                Err(error) => {
                    builder.ctx.panic(view.params[i].ty.source, error.to_string());
                    return fatal();
                }
            };

            if !ast_types_conform(builder, &mut new_values[i], &new_types[i], &resolved_param, mode)? {
                builder.restore(snapshot);
                return Err(Failure::NotFound);
            }
            new_types[i] = resolved_param;
        }

        args.values = new_values;
        args.types = new_types;

        let depth = builder.instantiation_depth();
        let pair = instantiate_poly_func(
            builder.ctx,
            query.from_source,
            endpoint.ast_func_id,
            &catalog,
            depth,
        )?;
        return Ok(pair);
    }

    // Non-polymorphic candidate
    let conformed = func_args_conform(
        builder,
        &view,
        &mut args.values,
        &mut args.types,
        query.gives.as_ref(),
        mode,
    )?;

    if !conformed {
        return Err(Failure::NotFound);
    }

    check_not_disallowed(builder.ctx, &view, query.from_source)?;
    fill_in_default_arguments(builder, &view, args, None)?;

    let Some(ir_func_id) = endpoint.ir_func_id else {
        debug_assert!(false, "non-polymorphic endpoint without IR function");
        return Err(Failure::NotFound);
    };

    Ok(FuncPair::new(endpoint.ast_func_id, ir_func_id))
}

fn check_not_disallowed(ctx: &mut GenContext, view: &Func, source: Source) -> GenResult<()> {
    if view.traits.contains(FuncTraits::DISALLOW) {
        let message = format!("Cannot call disallowed '{}'", view.head());
        ctx.panic(source, message);
        return fatal();
    }
    Ok(())
}

/// Evaluate and append default expressions for the missing trailing
/// arguments. Defaults are generated lazily under the caller's builder
/// because they may depend on the instantiation catalog.
fn fill_in_default_arguments(
    builder: &mut Builder,
    view: &Func,
    args: &mut CallArgs,
    mut catalog: Option<&mut PolyCatalog>,
) -> GenResult<()> {
    if args.len() >= view.arity() {
        return Ok(());
    }

    for i in args.len()..view.arity() {
        let param = &view.params[i];

        let Some(default_expr) = param.default_value.clone() else {
            // Candidates that cannot be completed from defaults are
            // rejected during arity checking; reaching here is a bug
            let message = format!("failed to fill in default value for argument {}", i);
            builder.ctx.panic(view.source, message);
            return fatal();
        };

        let (mut value, value_type) = ir_gen_expr(builder, &default_expr, false)?;

        if let Some(catalog) = catalog.as_deref_mut() {
            if param.ty.has_polymorph() {
                match type_polymorphable(
                    builder.ctx,
                    &param.ty,
                    &value_type,
                    catalog,
                    ConformMode::Loose,
                ) {
                    Ok(()) => {
                        args.values.push(value);
                        args.types.push(value_type);
                        continue;
                    }
                    Err(Failure::Fatal) => return fatal(),
                    Err(Failure::NotFound) => {
                        let message = format!(
                            "Received value of type '{}' for default argument which expects type '{}'",
                            value_type, param.ty
                        );
                        builder.ctx.panic(param.ty.source, message);
                        return fatal();
                    }
                }
            }
        }

        let conformed =
            ast_types_conform(builder, &mut value, &value_type, &param.ty, ConformMode::Loose)?;

        if !conformed {
            let message = format!(
                "Received value of type '{}' for default argument which expects type '{}'",
                value_type, param.ty
            );
            builder.ctx.panic(param.ty.source, message);
            return fatal();
        }

        args.values.push(value);
        args.types.push(param.ty.clone());
    }

    Ok(())
}

// ---- rigid queries ----

/// Resolve a rigid query: concrete argument types, no conversions, no
/// default filling. Used by the vtree override search and SF discovery.
pub fn find_proc_rigid(
    ctx: &mut GenContext,
    proc_name: &str,
    struct_name: Option<&str>,
    arg_types: &[Type],
    traits_mask: FuncTraits,
    traits_match: FuncTraits,
    forbid_traits: FuncTraits,
    instantiation_depth: usize,
    from_source: Source,
) -> GenResult<Option<FuncPair>> {
    let endpoints = candidate_endpoints(ctx, proc_name, struct_name);

    for endpoint in endpoints {
        let view = func_signature(ctx, endpoint.ast_func_id);

        if !traits_admit(view.traits, traits_mask, traits_match, forbid_traits) {
            continue;
        }

        if struct_name.is_some() && !view.is_method() {
            continue;
        }

        if view.is_polymorphic() {
            let catalog = match func_args_polymorphable(
                ctx,
                &view,
                arg_types,
                None,
                ConformMode::Strict,
            ) {
                Ok(catalog) => catalog,
                Err(Failure::NotFound) => continue,
                Err(Failure::Fatal) => return Err(Failure::Fatal),
            };

            let pair = instantiate_poly_func(
                ctx,
                from_source,
                endpoint.ast_func_id,
                &catalog,
                instantiation_depth,
            )?;
            return Ok(Some(pair));
        }

        if func_args_match(&view, arg_types) {
            let Some(ir_func_id) = endpoint.ir_func_id else {
                continue;
            };
            return Ok(Some(FuncPair::new(endpoint.ast_func_id, ir_func_id)));
        }
    }

    autogen::try_autogen_to_fill_query(
        ctx,
        proc_name,
        struct_name,
        arg_types,
        instantiation_depth,
        from_source,
    )
}

/// First endpoint registered under a name, optionally restricted to
/// non-polymorphic ones. Also reports whether the name is unique.
pub fn find_func_named(
    ctx: &GenContext,
    name: &str,
    allow_polymorphic: bool,
) -> Option<(FuncEndpoint, bool)> {
    let list = ctx.module.func_map.find(&FuncKey::new(name))?;

    let endpoint = if allow_polymorphic {
        *list.first()?
    } else {
        *list.iter().find(|endpoint| {
            !ctx.ast.funcs[endpoint.ast_func_id]
                .traits
                .contains(FuncTraits::POLYMORPHIC)
        })?
    };

    Some((endpoint, list.len() == 1))
}

// ---- diagnostics ----

/// Report an undeclared function/method, listing candidate signatures
/// when the name exists with other parameter types and suggesting the
/// nearest name otherwise
pub fn report_undeclared(
    ctx: &mut GenContext,
    proc_name: &str,
    struct_name: Option<&str>,
    arg_types: &[Type],
    source: Source,
) -> Failure {
    let rendered_args: Vec<String> = arg_types.iter().map(Type::to_string).collect();

    let what = match struct_name {
        Some(struct_name) => format!("method '{}.{}'", struct_name, proc_name),
        None => format!("function '{}'", proc_name),
    };

    let candidates = candidate_endpoints(ctx, proc_name, struct_name);

    if candidates.is_empty() {
        let corpus: Vec<&str> = ctx.ast.func_names().collect();
        let message = match nearest_name(proc_name, corpus) {
            Some(suggestion) => format!(
                "undeclared {} — did you mean '{}'?",
                what, suggestion
            ),
            None => format!("undeclared {}", what),
        };
        return ctx.panic(source, message);
    }

    let message = format!(
        "no matching {} for argument types ({})",
        what,
        rendered_args.join(", ")
    );

    let mut diagnostic = adept_diagnostics::Diagnostic::error(message, source);
    for endpoint in candidates.iter().take(8) {
        diagnostic = diagnostic.with_note(format!(
            "candidate: {}",
            ctx.ast.funcs[endpoint.ast_func_id].head()
        ));
    }
    ctx.diagnostics.emit(diagnostic);
    Failure::Fatal
}

/// Enforce user qualifiers at the point a call is accepted
pub fn check_qualifiers(
    ctx: &mut GenContext,
    ast_func_id: FuncId,
    value_used: bool,
    source: Source,
) -> GenResult<()> {
    let traits = ctx.ast.funcs[ast_func_id].traits;

    if traits.contains(FuncTraits::NO_DISCARD) && !value_used {
        let name = ctx.ast.funcs[ast_func_id].name.clone();
        let message = format!("Not allowed to discard value returned from '{}'", name);
        ctx.panic(source, message);
        return fatal();
    }

    Ok(())
}
