// The IR builder
// Per-function construction state: basic blocks, the current-block
// cursor, the bridge scope tree, the loop/label stack, and speculative
// emission snapshots.

use crate::ctx::GenContext;
use crate::error::{fatal, GenResult};
use adept_ast::{DeclareTraits, FuncId as AstFuncId, Type};
use adept_diagnostics::Source;
use adept_ir::{
    BasicBlock, BridgeVar, IrFuncId, IrTypeId, RttiRelocation, ScopeArena, ScopeId,
};
use std::collections::HashSet;

/// Loop/label stack frame for labeled break/continue
#[derive(Debug, Clone)]
pub struct LoopLabel {
    pub label: String,
    pub break_block_id: usize,
    pub continue_block_id: usize,
    pub scope: ScopeId,
}

/// Snapshot used to roll back speculative forward generation
#[derive(Debug, Clone, Copy)]
pub struct InstrsSnapshot {
    current_block_id: usize,
    current_block_instructions_length: usize,
    basicblocks_length: usize,
    funcs_length: usize,
    job_list_length: usize,
}

pub struct Builder<'a, 'ctx> {
    pub ctx: &'a mut GenContext<'ctx>,
    pub ast_func_id: AstFuncId,
    pub ir_func_id: IrFuncId,
    pub basicblocks: Vec<BasicBlock>,
    pub current_block_id: usize,
    pub break_block_id: Option<usize>,
    pub continue_block_id: Option<usize>,
    pub fallthrough_block_id: Option<usize>,
    pub break_continue_scope: ScopeId,
    pub fallthrough_scope: ScopeId,
    pub block_stack: Vec<LoopLabel>,
    pub scopes: ScopeArena,
    pub current_scope: ScopeId,
    pub next_var_id: usize,
    /// Local variable ids that were read or written by name
    pub used_var_ids: HashSet<usize>,
    /// Return type of the function being generated, in both worlds
    pub ast_return_type: Type,
    pub ir_return_type: IrTypeId,
}

impl<'a, 'ctx> Builder<'a, 'ctx> {
    pub fn new(
        ctx: &'a mut GenContext<'ctx>,
        ast_func_id: AstFuncId,
        ir_func_id: IrFuncId,
        ast_return_type: Type,
    ) -> Self {
        let ir_return_type = ctx.module.funcs[ir_func_id].return_type;

        let mut builder = Self {
            ctx,
            ast_func_id,
            ir_func_id,
            basicblocks: Vec::new(),
            current_block_id: 0,
            break_block_id: None,
            continue_block_id: None,
            fallthrough_block_id: None,
            break_continue_scope: ScopeArena::ROOT,
            fallthrough_scope: ScopeArena::ROOT,
            block_stack: Vec::new(),
            scopes: ScopeArena::new(),
            current_scope: ScopeArena::ROOT,
            next_var_id: 0,
            used_var_ids: HashSet::new(),
            ast_return_type,
            ir_return_type,
        };

        let entry = builder.build_basicblock();
        builder.use_block(entry);
        builder
    }

    // ---- basic blocks ----

    /// Builds a new basic block in the current function
    pub fn build_basicblock(&mut self) -> usize {
        self.basicblocks.push(BasicBlock::new());
        self.basicblocks.len() - 1
    }

    /// Changes the current basic block that new instructions go into
    pub fn use_block(&mut self, basicblock_id: usize) {
        self.current_block_id = basicblock_id;
    }

    pub fn current_block(&mut self) -> &mut BasicBlock {
        &mut self.basicblocks[self.current_block_id]
    }

    pub fn current_block_is_terminated(&self) -> bool {
        self.basicblocks[self.current_block_id].is_terminated()
    }

    // ---- scopes ----

    pub fn open_scope(&mut self) {
        self.current_scope = self.scopes.open(self.current_scope, self.next_var_id);
    }

    /// Pops back to the parent scope. Deference for the scope's
    /// variables must have been emitted by the caller beforehand.
    pub fn close_scope(&mut self) {
        if let Some(parent) = self.scopes.parent(self.current_scope) {
            self.current_scope = parent;
        }
    }

    /// Adds a variable to the current bridge scope, assigning it the
    /// next id in the appropriate id space
    pub fn add_variable(
        &mut self,
        name: &str,
        ast_type: &Type,
        ir_type: IrTypeId,
        traits: DeclareTraits,
    ) -> BridgeVar {
        let id = if traits.contains(DeclareTraits::STATIC) {
            self.ctx.module.static_variables.len()
        } else {
            let id = self.next_var_id;
            self.next_var_id += 1;
            id
        };

        let variable = BridgeVar {
            name: name.into(),
            ast_type: ast_type.clone(),
            ir_type,
            traits,
            id,
        };

        self.scopes.push_variable(self.current_scope, variable.clone());
        variable
    }

    pub fn find_variable(&self, name: &str) -> Option<&BridgeVar> {
        self.scopes.find_variable(self.current_scope, name)
    }

    /// Record that a variable was referenced by name
    pub fn mark_variable_used(&mut self, var_id: usize) {
        self.used_var_ids.insert(var_id);
    }

    // ---- loop labels ----

    pub fn push_loop_label(
        &mut self,
        label: Option<&str>,
        break_block_id: usize,
        continue_block_id: usize,
    ) {
        if let Some(label) = label {
            self.block_stack.push(LoopLabel {
                label: label.into(),
                break_block_id,
                continue_block_id,
                scope: self.current_scope,
            });
        }
    }

    pub fn pop_loop_label(&mut self, label: Option<&str>) {
        if label.is_some() {
            self.block_stack.pop();
        }
    }

    pub fn get_loop_label(&self, label: &str) -> Option<&LoopLabel> {
        self.block_stack.iter().rev().find(|frame| frame.label == label)
    }

    // ---- RTTI ----

    /// Marks an RTTI slot to be filled in during finalization.
    /// Does not add any instructions.
    pub fn add_rtti_relocation(&mut self, human_notation: String, slot: usize, source: Source) {
        self.ctx.module.rtti_relocations.push(RttiRelocation {
            human_notation,
            slot,
            source_on_failure: source,
        });
    }

    // ---- common types ----

    pub fn usize_type(&self) -> IrTypeId {
        self.ctx.module.common.usize_type
    }

    pub fn bool_type(&self) -> IrTypeId {
        self.ctx.module.common.bool_type
    }

    pub fn ptr_type(&self) -> IrTypeId {
        self.ctx.module.common.ptr_type
    }

    pub fn void_type(&self) -> IrTypeId {
        self.ctx.module.common.void_type
    }

    /// Source position for runtime-check diagnostics, captured only
    /// when the relevant checks are enabled
    pub fn failure_point(&self, source: Source) -> Option<Source> {
        self.ctx.config.null_checks().then_some(source)
    }

    // ---- snapshots ----

    pub fn snapshot(&self) -> InstrsSnapshot {
        InstrsSnapshot {
            current_block_id: self.current_block_id,
            current_block_instructions_length: self.basicblocks[self.current_block_id].len(),
            basicblocks_length: self.basicblocks.len(),
            funcs_length: self.ctx.module.funcs.len(),
            job_list_length: self.ctx.module.job_list.len(),
        }
    }

    pub fn restore(&mut self, snapshot: InstrsSnapshot) {
        self.basicblocks.truncate(snapshot.basicblocks_length);
        self.current_block_id = snapshot.current_block_id;
        self.basicblocks[self.current_block_id]
            .instructions
            .truncate(snapshot.current_block_instructions_length);
        self.ctx.module.funcs.truncate(snapshot.funcs_length);
        self.ctx.module.job_list.truncate(snapshot.job_list_length);
    }

    // ---- completion ----

    /// Move generated blocks and scope tree into the IR function
    pub fn finish(self) {
        let func = &mut self.ctx.module.funcs[self.ir_func_id];
        func.basicblocks = self.basicblocks;
        func.variable_count = self.next_var_id;
        func.scope = Some(self.scopes);
    }

    /// Instantiation depth of the function currently being generated
    pub fn instantiation_depth(&self) -> usize {
        self.ctx.ast.funcs[self.ast_func_id].instantiation_depth
    }

    /// Report a compile error at `source` and return the fatal arm
    pub fn panic<T>(&mut self, source: Source, message: impl Into<String>) -> GenResult<T> {
        self.ctx.panic(source, message);
        fatal()
    }
}
