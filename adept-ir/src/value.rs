// IR values
// Every value knows its pooled type. Values are small owned trees;
// instruction results are referenced by (block, instruction) position.

use crate::types::IrTypeId;

/// Literal payloads, one per scalar IR type
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    S8(i8),
    U8(u8),
    S16(i16),
    U16(u16),
    S32(i32),
    U32(u32),
    S64(i64),
    U64(u64),
    Usize(u64),
    F32(f32),
    F64(f64),
}

impl Literal {
    /// Integer payload widened to u64 bit storage, when integral
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Literal::Bool(v) => Some(u64::from(v)),
            Literal::S8(v) => Some(v as u64),
            Literal::U8(v) => Some(u64::from(v)),
            Literal::S16(v) => Some(v as u64),
            Literal::U16(v) => Some(u64::from(v)),
            Literal::S32(v) => Some(v as u64),
            Literal::U32(v) => Some(u64::from(v)),
            Literal::S64(v) => Some(v as u64),
            Literal::U64(v) | Literal::Usize(v) => Some(v),
            Literal::F32(_) | Literal::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Literal::F32(v) => Some(f64::from(v)),
            Literal::F64(v) => Some(v),
            _ => None,
        }
    }
}

/// The compile-time cast family, folded as pure numeric operations on
/// literal payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Bitcast,
    Zext,
    Sext,
    Fext,
    Trunc,
    Ftrunc,
    IntToPtr,
    PtrToInt,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    Reinterpret,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Literal(Literal),
    NullPtr,
    /// Null constant of a specific pointer type
    NullPtrOfType,
    ArrayLiteral { values: Vec<IrValue> },
    StructLiteral { values: Vec<IrValue> },
    ConstStructLiteral { values: Vec<IrValue> },
    /// Runtime struct construction from member values
    StructConstruction { values: Vec<IrValue> },
    OffsetOf { ty: IrTypeId, field_index: usize },
    ConstSizeof { ty: IrTypeId },
    ConstAlignof { ty: IrTypeId },
    ConstAdd { lhs: Box<IrValue>, rhs: Box<IrValue> },
    FuncAddr { ir_func_id: usize },
    /// Address of a function only known by exported name
    FuncAddrByName { name: String },
    CStrOfLen { value: Vec<u8>, length: usize },
    /// Transient enum member value pending owner resolution
    UnknownEnum { kind_name: String },
    AnonGlobal { anon_global_id: usize },
    ConstAnonGlobal { anon_global_id: usize },
    /// Output of the instruction at (block, instruction)
    Result { block_id: usize, instruction_id: usize },
    /// Deferred-patch usize slot; RTTI finalization writes the chosen
    /// `__types__` index into `IrModule::rtti_slots[slot]`
    RttiSlot { slot: usize },
    ConstCast { kind: CastKind, value: Box<IrValue> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrValue {
    pub ty: IrTypeId,
    pub kind: ValueKind,
}

impl IrValue {
    pub fn new(ty: IrTypeId, kind: ValueKind) -> Self {
        Self { ty, kind }
    }

    pub fn literal(ty: IrTypeId, literal: Literal) -> Self {
        Self::new(ty, ValueKind::Literal(literal))
    }

    pub fn result(ty: IrTypeId, block_id: usize, instruction_id: usize) -> Self {
        Self::new(
            ty,
            ValueKind::Result {
                block_id,
                instruction_id,
            },
        )
    }

    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ValueKind::Literal(_)
            | ValueKind::NullPtr
            | ValueKind::NullPtrOfType
            | ValueKind::OffsetOf { .. }
            | ValueKind::ConstSizeof { .. }
            | ValueKind::ConstAlignof { .. }
            | ValueKind::FuncAddr { .. }
            | ValueKind::FuncAddrByName { .. }
            | ValueKind::CStrOfLen { .. }
            | ValueKind::ConstAnonGlobal { .. }
            | ValueKind::RttiSlot { .. } => true,
            ValueKind::ConstAdd { lhs, rhs } => lhs.is_constant() && rhs.is_constant(),
            ValueKind::ConstCast { value, .. } => value.is_constant(),
            ValueKind::ArrayLiteral { values } | ValueKind::ConstStructLiteral { values } => {
                values.iter().all(IrValue::is_constant)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_payload_views() {
        assert_eq!(Literal::S32(-1).as_u64(), Some(u64::MAX));
        assert_eq!(Literal::U8(200).as_u64(), Some(200));
        assert_eq!(Literal::F32(1.5).as_f64(), Some(1.5));
        assert_eq!(Literal::F64(2.0).as_u64(), None);
    }

    #[test]
    fn test_constness() {
        let ty = IrTypeId(0);
        let literal = IrValue::literal(ty, Literal::S32(7));
        assert!(literal.is_constant());

        let result = IrValue::result(ty, 0, 0);
        assert!(!result.is_constant());

        let sum = IrValue::new(
            ty,
            ValueKind::ConstAdd {
                lhs: Box::new(literal),
                rhs: Box::new(result),
            },
        );
        assert!(!sum.is_constant());
    }
}
