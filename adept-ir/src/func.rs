// IR functions

use crate::bridge::ScopeArena;
use crate::instr::BasicBlock;
use crate::types::IrTypeId;
use adept_ast::FuncId;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IrFuncTraits: u8 {
        const IS_FOREIGN      = 1 << 0;
        const IS_MAIN         = 1 << 1;
        const STDCALL         = 1 << 2;
        const VARARG          = 1 << 3;
        /// Dispatchers verify the vtable slot is non-null before calling
        const VALIDATE_VTABLE = 1 << 4;
    }
}

/// IR function: a signature plus, once its body job has run, the basic
/// blocks that implement it
#[derive(Debug)]
pub struct IrFunc {
    /// Exported/linkage name
    pub name: String,
    pub ast_func_id: FuncId,
    pub traits: IrFuncTraits,
    pub arg_types: Vec<IrTypeId>,
    pub return_type: IrTypeId,
    pub basicblocks: Vec<BasicBlock>,
    /// Number of bridge variables (parameters included)
    pub variable_count: usize,
    /// Scope tree populated during body generation
    pub scope: Option<ScopeArena>,
}

impl IrFunc {
    pub fn new(
        name: impl Into<String>,
        ast_func_id: FuncId,
        arg_types: Vec<IrTypeId>,
        return_type: IrTypeId,
        traits: IrFuncTraits,
    ) -> Self {
        Self {
            name: name.into(),
            ast_func_id,
            traits,
            arg_types,
            return_type,
            basicblocks: Vec::new(),
            variable_count: 0,
            scope: None,
        }
    }

    /// Whether a body has been generated (foreign functions never get one)
    pub fn has_body(&self) -> bool {
        !self.basicblocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_functions_have_no_body() {
        let func = IrFunc::new(
            "printf",
            0,
            vec![IrTypeId(0)],
            IrTypeId(1),
            IrFuncTraits::IS_FOREIGN | IrFuncTraits::VARARG,
        );
        assert!(!func.has_body());
        assert!(func.traits.contains(IrFuncTraits::IS_FOREIGN));
    }
}
