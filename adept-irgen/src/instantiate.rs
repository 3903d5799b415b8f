// Polymorph instantiation
// Produces a concrete AST function plus IR skeleton from a template and
// a binding catalog. Memoized on (origin, catalog contents) so repeated
// calls with the same substitutions share one concrete function.

use crate::ctx::GenContext;
use crate::error::{fatal, GenResult};
use crate::gen_type::resolve_ir_type;
use adept_ast::{resolve_exprs, resolve_type, FuncId, FuncTraits, PolyCatalog, Type};
use adept_diagnostics::Source;
use adept_ir::{FuncEndpoint, FuncPair, IrFunc, IrFuncTraits};

/// Hard bound on recursive instantiation
pub const MAX_INSTANTIATION_DEPTH: usize = 64;

/// Stable memoization key for a catalog: bindings sorted by name so the
/// order parameters were unified in does not matter
fn catalog_key(catalog: &PolyCatalog) -> String {
    let mut parts: Vec<String> = catalog
        .types
        .iter()
        .map(|binding| format!("${}={}", binding.name, binding.binding))
        .chain(
            catalog
                .counts
                .iter()
                .map(|binding| format!("$#{}={}", binding.name, binding.binding)),
        )
        .collect();
    parts.sort();
    parts.join(";")
}

/// Linkage name for a generated concrete function
pub fn mangle_name(name: &str, ir_func_id: usize) -> String {
    format!("adept_{}_{}", name, ir_func_id)
}

/// Instantiate a polymorphic function with the given catalog.
/// Returns the concrete endpoint, reusing a memoized one when the same
/// (origin, catalog) was instantiated before.
pub fn instantiate_poly_func(
    ctx: &mut GenContext,
    instantiation_source: Source,
    ast_poly_func_id: FuncId,
    catalog: &PolyCatalog,
    instantiation_depth: usize,
) -> GenResult<FuncPair> {
    let memo_key = (ast_poly_func_id, catalog_key(catalog));

    if let Some(&existing) = ctx.poly_memo.get(&memo_key) {
        return Ok(existing);
    }

    if instantiation_depth >= MAX_INSTANTIATION_DEPTH {
        let template_head = ctx.ast.funcs[ast_poly_func_id].head();
        let message = format!(
            "maximum instantiation depth of {} exceeded while instantiating '{}'",
            MAX_INSTANTIATION_DEPTH, template_head
        );
        ctx.panic(instantiation_source, message);
        return fatal();
    }

    // Clone the template, then rewrite every type-bearing position
    // through the catalog
    let mut concrete = ctx.ast.funcs[ast_poly_func_id].clone();

    let collector = ctx.module.rtti_collector.as_mut();
    let resolved = (|| -> Result<(), adept_ast::ResolveError> {
        let mut collector = collector;

        for param in concrete.params.iter_mut() {
            param.ty = resolve_type(catalog, collector.as_deref_mut(), &param.ty)?;

            if let Some(default_value) = param.default_value.as_mut() {
                adept_ast::resolve_expr(catalog, collector.as_deref_mut(), default_value)?;
            }
        }

        if !concrete.return_type.is_none() {
            concrete.return_type =
                resolve_type(catalog, collector.as_deref_mut(), &concrete.return_type)?;
        }

        resolve_exprs(catalog, collector.as_deref_mut(), &mut concrete.statements)
    })();

    if let Err(error) = resolved {
        let template_head = ctx.ast.funcs[ast_poly_func_id].head();
        let message = format!(
            "could not instantiate '{}': {}",
            template_head, error
        );
        ctx.panic(instantiation_source, message);
        return fatal();
    }

    concrete.traits.remove(FuncTraits::POLYMORPHIC);
    concrete.origin = Some(ast_poly_func_id);
    concrete.instantiation_depth = instantiation_depth + 1;

    // Append to the AST function table (old ids stay valid)
    let concrete_ast_func_id = ctx.ast.add_func(concrete);

    // Allocate the matching IR skeleton
    let ir_func_id = declare_concrete_func(ctx, concrete_ast_func_id)?;

    let pair = FuncPair::new(concrete_ast_func_id, ir_func_id);
    ctx.poly_memo.insert(memo_key, pair);
    Ok(pair)
}

/// Allocate an IR function for a concrete AST function, insert its
/// endpoint into the procedure map, and queue its body for emission
pub fn declare_concrete_func(ctx: &mut GenContext, ast_func_id: FuncId) -> GenResult<usize> {
    let func = ctx.ast.funcs[ast_func_id].clone();
    debug_assert!(!func.is_polymorphic());

    let mut arg_types = Vec::with_capacity(func.arity());
    for param in &func.params {
        arg_types.push(resolve_ir_type(ctx, &param.ty)?);
    }

    let return_type = if func.return_type.is_none() {
        ctx.module.common.void_type
    } else {
        resolve_ir_type(ctx, &func.return_type)?
    };

    let mut traits = IrFuncTraits::empty();
    if func.traits.contains(FuncTraits::FOREIGN) {
        traits |= IrFuncTraits::IS_FOREIGN;
    }
    if func.traits.contains(FuncTraits::MAIN) {
        traits |= IrFuncTraits::IS_MAIN;
    }
    if func.traits.contains(FuncTraits::STDCALL) {
        traits |= IrFuncTraits::STDCALL;
    }
    if func.traits.contains(FuncTraits::VARARG) {
        traits |= IrFuncTraits::VARARG;
    }

    let ir_func_id = ctx.module.funcs.len();

    let name = if func
        .traits
        .intersects(FuncTraits::FOREIGN | FuncTraits::MAIN)
    {
        func.name.clone()
    } else {
        mangle_name(&func.name, ir_func_id)
    };

    ctx.module
        .add_func(IrFunc::new(name, ast_func_id, arg_types, return_type, traits));

    let endpoint = FuncEndpoint::concrete(ast_func_id, ir_func_id);
    let needs_body = !func.traits.contains(FuncTraits::FOREIGN);

    ctx.module
        .create_func_mapping(&func.name, endpoint, needs_body);

    if let Some(subject_name) = func.subject_name() {
        let subject_name = subject_name.to_string();
        ctx.module
            .create_method_mapping(&subject_name, &func.name, endpoint);
    }

    Ok(ir_func_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_key_is_order_independent() {
        let mut forward = PolyCatalog::new();
        forward.add_type("A", &Type::base("int"));
        forward.add_type("B", &Type::base("double"));

        let mut backward = PolyCatalog::new();
        backward.add_type("B", &Type::base("double"));
        backward.add_type("A", &Type::base("int"));

        assert_eq!(catalog_key(&forward), catalog_key(&backward));
    }

    #[test]
    fn test_catalog_key_distinguishes_bindings() {
        let mut a = PolyCatalog::new();
        a.add_type("T", &Type::base("int"));

        let mut b = PolyCatalog::new();
        b.add_type("T", &Type::base("double"));

        assert_ne!(catalog_key(&a), catalog_key(&b));

        let mut c = PolyCatalog::new();
        c.add_count("T", 3);
        assert_ne!(catalog_key(&a), catalog_key(&c));
    }
}
