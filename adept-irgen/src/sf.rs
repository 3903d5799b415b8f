// Special-function discovery
// Find-or-autogenerate the lifecycle function of a type, caching the
// outcome (including definitive absence) in the module's SF cache.

use crate::builder::Builder;
use crate::ctx::GenContext;
use crate::error::GenResult;
use crate::find::{find_proc_rigid, ConformQuery, find_proc_conforming, CallArgs};
use adept_ast::{FuncTraits, Type};
use adept_diagnostics::Source;
use adept_ir::{FuncPair, IrValue, Trilean};

/// Finds the correct `__pass__` function for a type, conforming the
/// argument value in the process
pub fn find_pass_func(
    builder: &mut Builder,
    value: &mut IrValue,
    arg_type: &Type,
) -> GenResult<Option<FuncPair>> {
    if let Some(cached) = builder
        .ctx
        .module
        .sf_cache
        .locate(arg_type)
        .and_then(|entry| entry.pass.known())
    {
        return Ok(cached);
    }

    let query = ConformQuery::function("__pass__", None, Source::NONE).without_defaults();
    let mut args = CallArgs::new(vec![value.clone()], vec![arg_type.clone()]);

    let result = find_proc_conforming(builder, &query, &mut args)?;

    if result.is_some() {
        *value = args.values.remove(0);
    }

    let entry = builder.ctx.module.sf_cache.locate_or_insert(arg_type);
    entry.pass = match result {
        Some(pair) => Trilean::Present(pair),
        None => Trilean::Absent,
    };

    Ok(result)
}

/// Finds the correct `__defer__` method for a type
pub fn find_defer_func(
    ctx: &mut GenContext,
    arg_type: &Type,
    instantiation_depth: usize,
) -> GenResult<Option<FuncPair>> {
    if let Some(cached) = ctx
        .module
        .sf_cache
        .locate(arg_type)
        .and_then(|entry| entry.defer.known())
    {
        return Ok(cached);
    }

    let subject_ptr = arg_type.pointer_to();
    let struct_name = arg_type.struct_name().map(String::from);

    let result = match struct_name {
        Some(struct_name) => find_proc_rigid(
            ctx,
            "__defer__",
            Some(&struct_name),
            std::slice::from_ref(&subject_ptr),
            FuncTraits::empty(),
            FuncTraits::empty(),
            FuncTraits::VIRTUAL | FuncTraits::OVERRIDE,
            instantiation_depth,
            Source::NONE,
        )?,
        None => None,
    };

    let entry = ctx.module.sf_cache.locate_or_insert(arg_type);
    entry.defer = match result {
        Some(pair) => Trilean::Present(pair),
        None => Trilean::Absent,
    };

    Ok(result)
}

/// Finds the correct `__assign__` method for a type
pub fn find_assign_func(
    ctx: &mut GenContext,
    arg_type: &Type,
    instantiation_depth: usize,
) -> GenResult<Option<FuncPair>> {
    if let Some(cached) = ctx
        .module
        .sf_cache
        .locate(arg_type)
        .and_then(|entry| entry.assign.known())
    {
        return Ok(cached);
    }

    let struct_name = arg_type.struct_name().map(String::from);

    let result = match struct_name {
        Some(struct_name) => {
            let arg_types = [arg_type.pointer_to(), arg_type.clone()];
            find_proc_rigid(
                ctx,
                "__assign__",
                Some(&struct_name),
                &arg_types,
                FuncTraits::empty(),
                FuncTraits::empty(),
                FuncTraits::VIRTUAL | FuncTraits::OVERRIDE,
                instantiation_depth,
                Source::NONE,
            )?
        }
        None => None,
    };

    let entry = ctx.module.sf_cache.locate_or_insert(arg_type);
    entry.assign = match result {
        Some(pair) => Trilean::Present(pair),
        None => Trilean::Absent,
    };

    Ok(result)
}
