// Virtual-dispatch trees
// One node per distinct class usage signature. Nodes link child classes
// under their parents, accumulate declared virtuals, and compute the
// dispatch table by override resolution. Finalized tables become
// constant anonymous globals during vtable emission.

use crate::conform::func_args_match;
use crate::ctx::GenContext;
use crate::error::{fatal, GenResult};
use adept_ast::{types_identical, FuncTraits, Type};
use adept_ir::{FuncEndpoint, IrValue, VtableDispatch};

/// Tree node used to generate virtual dispatch tables
#[derive(Debug)]
pub struct Vtree {
    pub signature: Type,
    pub parent: Option<usize>,
    /// Endpoints declared virtual on this class, in declaration order
    pub virtuals: Vec<FuncEndpoint>,
    /// Computed dispatch table after override resolution
    pub table: Vec<FuncEndpoint>,
    pub children: Vec<usize>,
    pub finalized_table: Option<IrValue>,
    /// Set once this node's table has been computed
    pub table_ready: bool,
}

#[derive(Debug, Default)]
pub struct VtreeList {
    pub vtrees: Vec<Vtree>,
}

impl VtreeList {
    /// Finds the vtree with the given signature
    pub fn find(&self, signature: &Type) -> Option<usize> {
        self.vtrees
            .iter()
            .position(|vtree| types_identical(&vtree.signature, signature))
    }

    /// Finds the vtree with the given signature, creating it if none
    /// exists. Always returns a node with a matching signature.
    pub fn find_or_append(&mut self, signature: &Type) -> usize {
        if let Some(index) = self.find(signature) {
            return index;
        }

        self.vtrees.push(Vtree {
            signature: signature.clone(),
            parent: None,
            virtuals: Vec::new(),
            table: Vec::new(),
            children: Vec::new(),
            finalized_table: None,
            table_ready: false,
        });
        self.vtrees.len() - 1
    }

    pub fn len(&self) -> usize {
        self.vtrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vtrees.is_empty()
    }
}

/// Create vtree nodes for every known class signature, link children
/// under parents, collect declared virtuals, and resolve overrides.
/// Idempotent over already-processed nodes, so it runs again after body
/// emission to cover class signatures instantiated along the way.
pub fn ir_gen_vtrees(ctx: &mut GenContext) -> GenResult<()> {
    create_nodes_for_known_classes(ctx);
    link_up_nodes(ctx, 0)?;
    collect_virtuals(ctx)?;

    // Top-down so parent tables exist before children inherit them
    let roots: Vec<usize> = (0..ctx.vtrees.len())
        .filter(|&i| ctx.vtrees.vtrees[i].parent.is_none())
        .collect();

    for root in roots {
        compute_tables(ctx, root, 32)?;
    }

    Ok(())
}

fn create_nodes_for_known_classes(ctx: &mut GenContext) {
    let signatures: Vec<Type> = ctx
        .ast
        .composites
        .iter()
        .filter(|composite| composite.is_class && !composite.is_polymorphic())
        .map(|composite| composite.signature())
        .chain(ctx.class_signatures.iter().cloned())
        .collect();

    for signature in signatures {
        ctx.vtrees.find_or_append(&signature);
    }
}

/// Fills in parent links, appending missing parent nodes as needed
fn link_up_nodes(ctx: &mut GenContext, starting_index: usize) -> GenResult<()> {
    let mut index = starting_index;

    while index < ctx.vtrees.len() {
        if ctx.vtrees.vtrees[index].parent.is_none() {
            let signature = ctx.vtrees.vtrees[index].signature.clone();

            let composite = signature
                .struct_name()
                .and_then(|name| ctx.ast.find_composite(name))
                .cloned();

            let Some(composite) = composite else {
                let message = format!("cannot find class for type '{}'", signature);
                ctx.panic(signature.source, message);
                return fatal();
            };

            if let Some(parent_signature) =
                crate::polymorphable::translate_parent_class(ctx, &composite, &signature)?
            {
                let parent_exists = parent_signature
                    .struct_name()
                    .and_then(|name| ctx.ast.find_composite(name))
                    .is_some_and(|parent| parent.is_class);

                if !parent_exists {
                    let message = format!(
                        "cannot find parent class '{}' for type '{}'",
                        parent_signature, signature
                    );
                    ctx.panic(signature.source, message);
                    return fatal();
                }

                let parent_index = ctx.vtrees.find_or_append(&parent_signature);
                ctx.vtrees.vtrees[index].parent = Some(parent_index);
                if !ctx.vtrees.vtrees[parent_index].children.contains(&index) {
                    ctx.vtrees.vtrees[parent_index].children.push(index);
                }
            }
        }

        index += 1;
    }

    Ok(())
}

/// Appends each class's virtual methods to its node
fn collect_virtuals(ctx: &mut GenContext) -> GenResult<()> {
    for ast_func_id in 0..ctx.ast.funcs.len() {
        let func = &ctx.ast.funcs[ast_func_id];

        if !func.traits.contains(FuncTraits::VIRTUAL) {
            continue;
        }

        if func.traits.contains(FuncTraits::POLYMORPHIC) {
            let source = func.source;
            ctx.panic(
                source,
                "virtual methods on polymorphic classes are not supported",
            );
            return fatal();
        }

        let Some(subject_name) = func.subject_name().map(String::from) else {
            let source = func.source;
            ctx.panic(source, "virtual functions must be methods");
            return fatal();
        };

        let signature = Type::base(subject_name);
        let Some(node) = ctx.vtrees.find(&signature) else {
            let source = ctx.ast.funcs[ast_func_id].source;
            let message = format!("virtual method declared on non-class type '{}'", signature);
            ctx.panic(source, message);
            return fatal();
        };

        let ir_func_id = find_ir_func_of(ctx, ast_func_id);
        let endpoint = match ir_func_id {
            Some(ir_func_id) => FuncEndpoint::concrete(ast_func_id, ir_func_id),
            None => FuncEndpoint::polymorphic(ast_func_id),
        };

        if !ctx.vtrees.vtrees[node]
            .virtuals
            .iter()
            .any(|existing| existing.ast_func_id == ast_func_id)
        {
            ctx.vtrees.vtrees[node].virtuals.push(endpoint);
        }
    }

    Ok(())
}

fn find_ir_func_of(ctx: &GenContext, ast_func_id: usize) -> Option<usize> {
    ctx.module
        .funcs
        .iter()
        .position(|func| func.ast_func_id == ast_func_id)
}

/// Computes the dispatch table of `node` (parent table with overrides
/// applied, then own virtuals appended), then recurses into children
fn compute_tables(ctx: &mut GenContext, node: usize, depth_left: usize) -> GenResult<()> {
    if depth_left == 0 {
        let source = ctx.vtrees.vtrees[node].signature.source;
        ctx.panic(source, "class hierarchy is too deep");
        return fatal();
    }

    if !ctx.vtrees.vtrees[node].table_ready {
        let inherited: Vec<FuncEndpoint> = match ctx.vtrees.vtrees[node].parent {
            Some(parent) => ctx.vtrees.vtrees[parent].table.clone(),
            None => Vec::new(),
        };

        let mut table = Vec::with_capacity(inherited.len());

        for slot in inherited {
            match search_for_single_override(ctx, node, slot.ast_func_id)? {
                Some(override_endpoint) => table.push(override_endpoint),
                None => table.push(slot),
            }
        }

        // Newly introduced virtuals extend the table; their dispatchers
        // read the slot index recorded here
        let own_virtuals = ctx.vtrees.vtrees[node].virtuals.clone();
        for endpoint in own_virtuals {
            let slot_index = table.len();
            table.push(endpoint);

            if let Some(dispatcher_ast_id) = ctx.ast.funcs[endpoint.ast_func_id].virtual_dispatcher
            {
                if let Some(dispatcher_ir_id) = find_ir_func_of(ctx, dispatcher_ast_id) {
                    let record = VtableDispatch {
                        ir_func_id: dispatcher_ir_id,
                        index: slot_index,
                    };
                    if !ctx.module.vtable_dispatch_list.contains(&record) {
                        ctx.module.vtable_dispatch_list.push(record);
                    }
                }
            }
        }

        ctx.vtrees.vtrees[node].table = table;
        ctx.vtrees.vtrees[node].table_ready = true;
    }

    let children = ctx.vtrees.vtrees[node].children.clone();
    for child in children {
        compute_tables(ctx, child, depth_left - 1)?;
    }

    Ok(())
}

/// Searches for a method of `node`'s class that overrides the virtual
/// `virtual_ast_func_id`. Returns the override endpoint when exactly
/// one signature-compatible OVERRIDE method exists; a second override
/// of the same slot is a compile error.
fn search_for_single_override(
    ctx: &mut GenContext,
    node: usize,
    virtual_ast_func_id: usize,
) -> GenResult<Option<FuncEndpoint>> {
    let signature = ctx.vtrees.vtrees[node].signature.clone();
    let virtual_func = crate::find::func_signature(ctx, virtual_ast_func_id);

    // Expected parameter types with the subject pointer rewritten to
    // the child class
    let mut expected_types: Vec<Type> =
        virtual_func.params.iter().map(|param| param.ty.clone()).collect();
    if let Some(subject) = expected_types.first_mut() {
        *subject = signature.pointer_to();
    }

    let mut matches: Vec<FuncEndpoint> = Vec::new();

    for ast_func_id in 0..ctx.ast.funcs.len() {
        let candidate = &ctx.ast.funcs[ast_func_id];

        if !candidate.traits.contains(FuncTraits::OVERRIDE)
            || candidate.name != virtual_func.name
        {
            continue;
        }

        let candidate_subject = candidate
            .params
            .first()
            .and_then(|param| param.ty.method_subject_name());
        if candidate_subject != signature.struct_name() {
            continue;
        }

        let view = crate::find::func_signature(ctx, ast_func_id);
        if !func_args_match(&view, &expected_types) {
            continue;
        }

        let endpoint = match find_ir_func_of(ctx, ast_func_id) {
            Some(ir_func_id) => FuncEndpoint::concrete(ast_func_id, ir_func_id),
            None => continue,
        };
        matches.push(endpoint);
    }

    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0])),
        _ => {
            let second = matches[1].ast_func_id;
            let source = ctx.ast.funcs[second].source;
            let message = format!(
                "multiple methods override '{}' for class '{}'",
                virtual_func.name, signature
            );
            ctx.panic(source, message);
            fatal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_or_append_by_signature() {
        let mut list = VtreeList::default();
        let a = list.find_or_append(&Type::base("Animal"));
        let b = list.find_or_append(&Type::base("Dog"));
        let again = list.find_or_append(&Type::base("Animal"));

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(list.len(), 2);
    }
}
