// Shared state for one IR generation run

use crate::config::CompilerConfig;
use crate::error::Failure;
use crate::vtree::VtreeList;
use adept_ast::{Ast, FuncId};
use adept_diagnostics::{Diagnostics, Source, WarningKind};
use adept_ir::{FuncPair, IrModule};
use std::collections::HashMap;

/// Everything the middle end threads through its passes: the input AST
/// (mutated only by instantiation appends), the output module, the
/// diagnostics sink, and cross-pass caches.
pub struct GenContext<'a> {
    pub config: &'a CompilerConfig,
    pub diagnostics: &'a mut Diagnostics,
    pub ast: &'a mut Ast,
    pub module: IrModule,
    /// Memoized polymorph instantiations keyed on (origin, catalog contents)
    pub poly_memo: HashMap<(FuncId, String), FuncPair>,
    pub vtrees: VtreeList,
    /// Class usage signatures materialized so far, so vtree passes can
    /// cover generic instantiations discovered during body emission
    pub class_signatures: Vec<adept_ast::Type>,
}

impl<'a> GenContext<'a> {
    pub fn new(
        config: &'a CompilerConfig,
        diagnostics: &'a mut Diagnostics,
        ast: &'a mut Ast,
    ) -> Self {
        Self {
            config,
            diagnostics,
            ast,
            module: IrModule::new(config.rtti_enabled()),
            poly_memo: HashMap::new(),
            vtrees: VtreeList::default(),
            class_signatures: Vec::new(),
        }
    }

    /// Report a compile error and hand back the fatal arm to propagate
    pub fn panic(&mut self, source: Source, message: impl Into<String>) -> Failure {
        self.diagnostics.error(message, source);
        Failure::Fatal
    }

    /// Emit a suppressible warning; true means it escalated under FUSSY
    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>, source: Source) -> bool {
        self.diagnostics.warn(kind, message, source)
    }

    /// Mention a concrete type to the RTTI collector when enabled
    pub fn mention_type(&mut self, ty: &adept_ast::Type) {
        if let Some(collector) = self.module.rtti_collector.as_mut() {
            if ty.is_concrete() {
                collector.mention(ty);
            }
        }
    }
}
