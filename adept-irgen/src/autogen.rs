// Autogeneration of lifecycle functions
// When no user-written __pass__/__defer__/__assign__ exists for a type,
// the resolver may synthesize one for simple-struct composites. The
// synthesized AST function carries the AUTOGEN trait and an empty body;
// body emission expands it into per-field management calls.

use crate::ctx::GenContext;
use crate::error::GenResult;
use crate::instantiate::declare_concrete_func;
use adept_ast::{Func, FuncTraits, Param, ParamTraits, Type, TypeElem};
use adept_diagnostics::Source;
use adept_ir::FuncPair;

/// Whether a type could have `__defer__` methods that need calling
pub fn could_have_deference(ctx: &GenContext, ty: &Type) -> bool {
    could_have_management(ctx, ty, 0)
}

/// Whether a type could have `__pass__` functions that need calling
pub fn could_have_pass(ctx: &GenContext, ty: &Type) -> bool {
    could_have_management(ctx, ty, 0)
}

fn could_have_management(ctx: &GenContext, ty: &Type, depth: usize) -> bool {
    if depth > 32 {
        return false;
    }

    match ty.elements.as_slice() {
        [TypeElem::Base { name }] => ctx.ast.find_composite(name).is_some(),
        [TypeElem::GenericBase { name, .. }] => ctx.ast.find_composite(name).is_some(),
        [TypeElem::FixedArray { .. }, rest @ ..] => {
            let elem_type = Type::new(rest.to_vec(), ty.source);
            could_have_management(ctx, &elem_type, depth + 1)
        }
        _ => false,
    }
}

/// Subject composite behind a value type, for autogen eligibility
fn autogen_subject(ctx: &GenContext, ty: &Type) -> Option<String> {
    let name = ty.struct_name()?;
    let composite = ctx.ast.find_composite(name)?;

    // Polymorphic subjects arrive as concrete usages (`<int> List`),
    // never raw templates
    if composite.is_polymorphic() && !ty.is_generic_base() {
        return None;
    }

    Some(name.to_string())
}

/// Dispatch table for the autogen fallback of the procedure resolver
pub fn try_autogen_to_fill_query(
    ctx: &mut GenContext,
    proc_name: &str,
    struct_name: Option<&str>,
    arg_types: &[Type],
    instantiation_depth: usize,
    from_source: Source,
) -> GenResult<Option<FuncPair>> {
    match proc_name {
        "__defer__" => attempt_autogen_defer(ctx, arg_types, instantiation_depth, from_source),
        "__assign__" => attempt_autogen_assign(ctx, arg_types, instantiation_depth, from_source),
        "__pass__" if struct_name.is_none() => {
            attempt_autogen_pass(ctx, arg_types, instantiation_depth, from_source)
        }
        _ => Ok(None),
    }
}

/// Attempts to auto-generate a `__defer__` management method.
/// Does NOT check for existing suitable `__defer__` methods.
pub fn attempt_autogen_defer(
    ctx: &mut GenContext,
    arg_types: &[Type],
    instantiation_depth: usize,
    from_source: Source,
) -> GenResult<Option<FuncPair>> {
    let [subject_ptr] = arg_types else {
        return Ok(None);
    };
    let Some(subject_type) = subject_ptr.dereferenced() else {
        return Ok(None);
    };
    if autogen_subject(ctx, &subject_type).is_none() {
        return Ok(None);
    }

    let mut func = Func::new(
        "__defer__",
        vec![Param::new("this", subject_type.pointer_to())],
        Type::base("void"),
    );
    func.traits = FuncTraits::AUTOGEN | FuncTraits::DEFER;
    func.source = from_source;
    func.instantiation_depth = instantiation_depth;

    register_autogen(ctx, func)
}

/// Attempts to auto-generate a `__pass__` management function.
/// Declines when no field could require passing, so callers fall back
/// to a bitwise pass.
pub fn attempt_autogen_pass(
    ctx: &mut GenContext,
    arg_types: &[Type],
    instantiation_depth: usize,
    from_source: Source,
) -> GenResult<Option<FuncPair>> {
    let [subject_type] = arg_types else {
        return Ok(None);
    };
    let Some(subject_name) = autogen_subject(ctx, subject_type) else {
        return Ok(None);
    };

    let fields_could_pass = ctx
        .ast
        .find_composite(&subject_name)
        .is_some_and(|composite| {
            composite
                .fields
                .iter()
                .any(|field| could_have_management(ctx, &field.ty, 1))
        });

    if !fields_could_pass {
        return Ok(None);
    }

    let mut passed = Param::new("passed", subject_type.clone());
    // POD on the parameter prevents the pass function from recursively
    // passing its own argument
    passed.traits = ParamTraits::POD;

    let mut func = Func::new("__pass__", vec![passed], subject_type.clone());
    func.traits = FuncTraits::AUTOGEN | FuncTraits::PASS;
    func.source = from_source;
    func.instantiation_depth = instantiation_depth;

    register_autogen(ctx, func)
}

/// Attempts to auto-generate an `__assign__` management method
pub fn attempt_autogen_assign(
    ctx: &mut GenContext,
    arg_types: &[Type],
    instantiation_depth: usize,
    from_source: Source,
) -> GenResult<Option<FuncPair>> {
    let [subject_ptr, other_type] = arg_types else {
        return Ok(None);
    };
    let Some(subject_type) = subject_ptr.dereferenced() else {
        return Ok(None);
    };
    if autogen_subject(ctx, &subject_type).is_none() {
        return Ok(None);
    }
    if !adept_ast::types_identical(&subject_type, other_type) {
        return Ok(None);
    }

    let mut other = Param::new("other", subject_type.clone());
    other.traits = ParamTraits::ASSIGN_POD;

    let mut func = Func::new(
        "__assign__",
        vec![
            Param::new("this", subject_type.pointer_to()),
            other,
        ],
        Type::base("void"),
    );
    func.traits = FuncTraits::AUTOGEN;
    func.source = from_source;
    func.instantiation_depth = instantiation_depth;

    register_autogen(ctx, func)
}

fn register_autogen(ctx: &mut GenContext, func: Func) -> GenResult<Option<FuncPair>> {
    let ast_func_id = ctx.ast.add_func(func);
    let ir_func_id = declare_concrete_func(ctx, ast_func_id)?;
    Ok(Some(FuncPair::new(ast_func_id, ir_func_id)))
}
