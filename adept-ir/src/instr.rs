// IR instructions and basic blocks

use crate::types::IrTypeId;
use crate::value::{CastKind, IrValue};
use adept_diagnostics::Source;

/// Math and comparison instruction selectors.
/// Signed/unsigned/float selection happens when the instruction is
/// built, not in the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrMathOp {
    Add,
    FAdd,
    Subtract,
    FSubtract,
    Multiply,
    FMultiply,
    SDivide,
    UDivide,
    FDivide,
    SModulus,
    UModulus,
    FModulus,
    Equals,
    FEquals,
    NotEquals,
    FNotEquals,
    SLessThan,
    ULessThan,
    FLessThan,
    SGreaterThan,
    UGreaterThan,
    FGreaterThan,
    SLessThanOrEqual,
    ULessThanOrEqual,
    FLessThanOrEqual,
    SGreaterThanOrEqual,
    UGreaterThanOrEqual,
    FGreaterThanOrEqual,
    BitAnd,
    BitOr,
    BitXor,
    BitLshift,
    BitRshift,
    BitLgcRshift,
}

impl IrMathOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            IrMathOp::Equals
                | IrMathOp::FEquals
                | IrMathOp::NotEquals
                | IrMathOp::FNotEquals
                | IrMathOp::SLessThan
                | IrMathOp::ULessThan
                | IrMathOp::FLessThan
                | IrMathOp::SGreaterThan
                | IrMathOp::UGreaterThan
                | IrMathOp::FGreaterThan
                | IrMathOp::SLessThanOrEqual
                | IrMathOp::ULessThanOrEqual
                | IrMathOp::FLessThanOrEqual
                | IrMathOp::SGreaterThanOrEqual
                | IrMathOp::UGreaterThanOrEqual
                | IrMathOp::FGreaterThanOrEqual
        )
    }
}

/// Source position captured so the backend can report runtime-check
/// failures (null checks, vtable validation). The driver maps the byte
/// offset back to a line/column pair using the object table.
pub type FailurePoint = Option<Source>;

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Address of a local variable by bridge id
    Varptr { result_type: IrTypeId, var_id: usize },
    /// Address of a global variable
    GlobalVarptr { result_type: IrTypeId, global_id: usize },
    /// Address of a static variable
    StaticVarptr { result_type: IrTypeId, static_id: usize },
    Malloc {
        result_type: IrTypeId,
        elem_type: IrTypeId,
        amount: Option<IrValue>,
        is_undef: bool,
    },
    Free { value: IrValue },
    Zeroinit { destination: IrValue },
    Memcpy {
        destination: IrValue,
        value: IrValue,
        num_bytes: IrValue,
    },
    Load {
        result_type: IrTypeId,
        value: IrValue,
        failure_point: FailurePoint,
    },
    Store {
        value: IrValue,
        destination: IrValue,
    },
    Call {
        result_type: IrTypeId,
        ir_func_id: usize,
        args: Vec<IrValue>,
    },
    CallAddress {
        result_type: IrTypeId,
        address: IrValue,
        args: Vec<IrValue>,
        failure_point: FailurePoint,
    },
    /// Unconditional branch
    Break { block_id: usize },
    CondBreak {
        value: IrValue,
        true_block_id: usize,
        false_block_id: usize,
    },
    Math {
        op: IrMathOp,
        result_type: IrTypeId,
        a: IrValue,
        b: IrValue,
    },
    ArrayAccess {
        result_type: IrTypeId,
        value: IrValue,
        index: IrValue,
        failure_point: FailurePoint,
    },
    /// Address of a structure member
    Member {
        result_type: IrTypeId,
        value: IrValue,
        member_index: usize,
        failure_point: FailurePoint,
    },
    Ret { value: Option<IrValue> },
    /// Stack allocation
    Alloc {
        result_type: IrTypeId,
        amount: Option<IrValue>,
    },
    StackSave { result_type: IrTypeId },
    StackRestore { value: IrValue },
    Phi2 {
        result_type: IrTypeId,
        a: IrValue,
        b: IrValue,
        block_id_a: usize,
        block_id_b: usize,
    },
    VaStart { value: IrValue },
    VaEnd { value: IrValue },
    VaArg {
        result_type: IrTypeId,
        va_list: IrValue,
    },
    VaCopy {
        destination: IrValue,
        source_list: IrValue,
    },
    Asm { assembly: String },
    /// Deinitialize static variables (module deinit epilogue)
    DeinitSvars,
    Unreachable,
    Cast {
        kind: CastKind,
        result_type: IrTypeId,
        value: IrValue,
    },
}

impl Instr {
    /// Pooled type of this instruction's result, for instructions that
    /// produce one
    pub fn result_type(&self) -> Option<IrTypeId> {
        match self {
            Instr::Varptr { result_type, .. }
            | Instr::GlobalVarptr { result_type, .. }
            | Instr::StaticVarptr { result_type, .. }
            | Instr::Malloc { result_type, .. }
            | Instr::Load { result_type, .. }
            | Instr::Call { result_type, .. }
            | Instr::CallAddress { result_type, .. }
            | Instr::Math { result_type, .. }
            | Instr::ArrayAccess { result_type, .. }
            | Instr::Member { result_type, .. }
            | Instr::Alloc { result_type, .. }
            | Instr::VaArg { result_type, .. }
            | Instr::StackSave { result_type }
            | Instr::Phi2 { result_type, .. }
            | Instr::Cast { result_type, .. } => Some(*result_type),
            _ => None,
        }
    }

    /// Whether this instruction transfers control
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Break { .. } | Instr::CondBreak { .. } | Instr::Ret { .. } | Instr::Unreachable
        )
    }
}

/// Ordered sequence of instructions ending in a control transfer or
/// falling through. Block indices are stable within a function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicBlock {
    pub instructions: Vec<Instr>,
}

impl BasicBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.instructions.last().is_some_and(Instr::is_terminator)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminators() {
        assert!(Instr::Ret { value: None }.is_terminator());
        assert!(Instr::Break { block_id: 2 }.is_terminator());
        assert!(!Instr::DeinitSvars.is_terminator());
    }

    #[test]
    fn test_block_termination() {
        let mut block = BasicBlock::new();
        assert!(!block.is_terminated());

        block.instructions.push(Instr::Unreachable);
        assert!(block.is_terminated());
    }
}
