// Instruction-building helpers
// Construction operations append to the builder's current block and
// return IR values referring to the emitted instruction's result.

use crate::builder::Builder;
use adept_diagnostics::Source;
use adept_ir::{
    CastKind, Instr, IrMathOp, IrType, IrTypeId, IrValue, Literal, ValueKind,
};

impl Builder<'_, '_> {
    /// Append an instruction, returning the value of its result when it
    /// produces one
    pub fn push(&mut self, instr: Instr) -> Option<IrValue> {
        let result_type = instr.result_type();
        let block_id = self.current_block_id;
        let block = self.current_block();
        block.instructions.push(instr);
        let instruction_id = block.instructions.len() - 1;

        result_type.map(|ty| IrValue::result(ty, block_id, instruction_id))
    }

    /// Append an instruction that is known to produce a result
    pub fn push_value(&mut self, instr: Instr) -> IrValue {
        self.push(instr).unwrap_or_else(|| {
            debug_assert!(false, "instruction without result pushed via push_value");
            IrValue::new(self.void_type(), ValueKind::NullPtr)
        })
    }

    // ---- literals ----

    fn literal_ir_type(&mut self, literal: &Literal) -> IrTypeId {
        let kind = match literal {
            Literal::Bool(_) => IrType::Boolean,
            Literal::S8(_) => IrType::S8,
            Literal::U8(_) => IrType::U8,
            Literal::S16(_) => IrType::S16,
            Literal::U16(_) => IrType::U16,
            Literal::S32(_) => IrType::S32,
            Literal::U32(_) => IrType::U32,
            Literal::S64(_) => IrType::S64,
            Literal::U64(_) | Literal::Usize(_) => IrType::U64,
            Literal::F32(_) => IrType::F32,
            Literal::F64(_) => IrType::F64,
        };
        self.ctx.module.pool.intern(kind)
    }

    pub fn build_literal(&mut self, literal: Literal) -> IrValue {
        let ty = self.literal_ir_type(&literal);
        IrValue::literal(ty, literal)
    }

    pub fn build_literal_usize(&mut self, value: u64) -> IrValue {
        IrValue::literal(self.usize_type(), Literal::Usize(value))
    }

    pub fn build_literal_bool(&mut self, value: bool) -> IrValue {
        IrValue::literal(self.bool_type(), Literal::Bool(value))
    }

    pub fn build_null_pointer(&mut self) -> IrValue {
        IrValue::new(self.ptr_type(), ValueKind::NullPtr)
    }

    pub fn build_null_pointer_of_type(&mut self, ty: IrTypeId) -> IrValue {
        IrValue::new(ty, ValueKind::NullPtrOfType)
    }

    pub fn build_func_addr(&mut self, ty: IrTypeId, ir_func_id: usize) -> IrValue {
        IrValue::new(ty, ValueKind::FuncAddr { ir_func_id })
    }

    pub fn build_cstr_of_len(&mut self, bytes: Vec<u8>) -> IrValue {
        let u8_type = self.ctx.module.pool.intern(IrType::U8);
        let ty = self.ctx.module.pool.pointer_to(u8_type);
        let length = bytes.len();
        IrValue::new(
            ty,
            ValueKind::CStrOfLen {
                value: bytes,
                length,
            },
        )
    }

    pub fn build_const_sizeof(&mut self, ty: IrTypeId) -> IrValue {
        IrValue::new(self.usize_type(), ValueKind::ConstSizeof { ty })
    }

    pub fn build_const_alignof(&mut self, ty: IrTypeId) -> IrValue {
        IrValue::new(self.usize_type(), ValueKind::ConstAlignof { ty })
    }

    // ---- memory ----

    pub fn build_lvarptr(&mut self, ptr_type: IrTypeId, var_id: usize) -> IrValue {
        self.push_value(Instr::Varptr {
            result_type: ptr_type,
            var_id,
        })
    }

    pub fn build_gvarptr(&mut self, ptr_type: IrTypeId, global_id: usize) -> IrValue {
        self.push_value(Instr::GlobalVarptr {
            result_type: ptr_type,
            global_id,
        })
    }

    pub fn build_svarptr(&mut self, ptr_type: IrTypeId, static_id: usize) -> IrValue {
        self.push_value(Instr::StaticVarptr {
            result_type: ptr_type,
            static_id,
        })
    }

    /// Address of a bridge variable, dispatching on its storage space
    pub fn build_varptr(&mut self, variable: &adept_ir::BridgeVar) -> IrValue {
        use adept_ast::DeclareTraits;

        let ptr_type = self.ctx.module.pool.pointer_to(variable.ir_type);

        if variable.traits.contains(DeclareTraits::STATIC) {
            self.build_svarptr(ptr_type, variable.id)
        } else {
            self.build_lvarptr(ptr_type, variable.id)
        }
    }

    pub fn build_load(&mut self, value: IrValue, source: Source) -> IrValue {
        let result_type = self
            .ctx
            .module
            .pool
            .pointee(value.ty)
            .unwrap_or_else(|| {
                debug_assert!(false, "load from non-pointer value");
                self.ptr_type()
            });

        let failure_point = self.failure_point(source);
        self.push_value(Instr::Load {
            result_type,
            value,
            failure_point,
        })
    }

    pub fn build_store(&mut self, value: IrValue, destination: IrValue) {
        self.push(Instr::Store { value, destination });
    }

    pub fn build_malloc(
        &mut self,
        elem_type: IrTypeId,
        amount: Option<IrValue>,
        is_undef: bool,
    ) -> IrValue {
        let result_type = self.ctx.module.pool.pointer_to(elem_type);
        self.push_value(Instr::Malloc {
            result_type,
            elem_type,
            amount,
            is_undef,
        })
    }

    pub fn build_free(&mut self, value: IrValue) {
        self.push(Instr::Free { value });
    }

    pub fn build_zeroinit(&mut self, destination: IrValue) {
        self.push(Instr::Zeroinit { destination });
    }

    pub fn build_memcpy(&mut self, destination: IrValue, value: IrValue, num_bytes: IrValue) {
        self.push(Instr::Memcpy {
            destination,
            value,
            num_bytes,
        });
    }

    pub fn build_alloc(&mut self, ty: IrTypeId, amount: Option<IrValue>) -> IrValue {
        let result_type = self.ctx.module.pool.pointer_to(ty);
        self.push_value(Instr::Alloc {
            result_type,
            amount,
        })
    }

    // ---- control flow ----

    pub fn build_break(&mut self, block_id: usize) {
        self.push(Instr::Break { block_id });
    }

    pub fn build_cond_break(&mut self, value: IrValue, true_block_id: usize, false_block_id: usize) {
        self.push(Instr::CondBreak {
            value,
            true_block_id,
            false_block_id,
        });
    }

    pub fn build_ret(&mut self, value: Option<IrValue>) {
        self.push(Instr::Ret { value });
    }

    pub fn build_unreachable(&mut self) {
        self.push(Instr::Unreachable);
    }

    pub fn build_phi2(
        &mut self,
        result_type: IrTypeId,
        a: IrValue,
        b: IrValue,
        block_id_a: usize,
        block_id_b: usize,
    ) -> IrValue {
        self.push_value(Instr::Phi2 {
            result_type,
            a,
            b,
            block_id_a,
            block_id_b,
        })
    }

    // ---- calls ----

    pub fn build_call(
        &mut self,
        ir_func_id: usize,
        args: Vec<IrValue>,
        result_type: IrTypeId,
    ) -> IrValue {
        self.push_value(Instr::Call {
            result_type,
            ir_func_id,
            args,
        })
    }

    pub fn build_call_address(
        &mut self,
        address: IrValue,
        args: Vec<IrValue>,
        result_type: IrTypeId,
        source: Source,
    ) -> IrValue {
        let failure_point = self.failure_point(source);
        self.push_value(Instr::CallAddress {
            result_type,
            address,
            args,
            failure_point,
        })
    }

    // ---- aggregate access ----

    pub fn build_member(
        &mut self,
        value: IrValue,
        member_index: usize,
        result_ptr_type: IrTypeId,
        source: Source,
    ) -> IrValue {
        let failure_point = self.failure_point(source);
        self.push_value(Instr::Member {
            result_type: result_ptr_type,
            value,
            member_index,
            failure_point,
        })
    }

    pub fn build_array_access(
        &mut self,
        value: IrValue,
        index: IrValue,
        source: Source,
    ) -> IrValue {
        let failure_point = self.failure_point(source);
        self.push_value(Instr::ArrayAccess {
            result_type: value.ty,
            value,
            index,
            failure_point,
        })
    }

    // ---- math ----

    pub fn build_math(
        &mut self,
        op: IrMathOp,
        a: IrValue,
        b: IrValue,
        result_type: IrTypeId,
    ) -> IrValue {
        let result_type = if op.is_comparison() {
            self.bool_type()
        } else {
            result_type
        };
        self.push_value(Instr::Math {
            op,
            result_type,
            a,
            b,
        })
    }

    // ---- casts ----

    /// Build a cast, folding constant literal payloads in place
    pub fn build_cast(&mut self, kind: CastKind, value: IrValue, result_type: IrTypeId) -> IrValue {
        if let ValueKind::Literal(literal) = &value.kind {
            let to = self.ctx.module.pool.get(result_type).clone();
            if let Some(folded) = fold_const_cast(kind, literal, &to) {
                return IrValue::literal(result_type, folded);
            }
        }

        if value.is_constant() {
            return IrValue::new(
                result_type,
                ValueKind::ConstCast {
                    kind,
                    value: Box::new(value),
                },
            );
        }

        self.push_value(Instr::Cast {
            kind,
            result_type,
            value,
        })
    }

    // ---- module-scoped data ----

    /// Lower a constant value into an addressable anonymous global,
    /// returning a pointer to it
    pub fn build_anon_global(&mut self, ir_type: IrTypeId, is_constant: bool, initializer: IrValue) -> IrValue {
        let anon_global_id = self.ctx.module.add_anon_global(adept_ir::IrAnonGlobal {
            ir_type,
            is_constant,
            initializer: Some(initializer),
        });

        let ptr_type = self.ctx.module.pool.pointer_to(ir_type);

        if is_constant {
            IrValue::new(ptr_type, ValueKind::ConstAnonGlobal { anon_global_id })
        } else {
            IrValue::new(ptr_type, ValueKind::AnonGlobal { anon_global_id })
        }
    }
}

/// Pure numeric folding of the compile-time cast family over literal
/// payloads. No semantics beyond the payload conversion are applied.
pub fn fold_const_cast(kind: CastKind, literal: &Literal, to: &IrType) -> Option<Literal> {
    fn int_literal(to: &IrType, bits_value: u64) -> Option<Literal> {
        Some(match to {
            IrType::Boolean => Literal::Bool(bits_value != 0),
            IrType::S8 => Literal::S8(bits_value as i8),
            IrType::U8 => Literal::U8(bits_value as u8),
            IrType::S16 => Literal::S16(bits_value as i16),
            IrType::U16 => Literal::U16(bits_value as u16),
            IrType::S32 => Literal::S32(bits_value as i32),
            IrType::U32 => Literal::U32(bits_value as u32),
            IrType::S64 => Literal::S64(bits_value as i64),
            IrType::U64 => Literal::U64(bits_value),
            _ => return None,
        })
    }

    fn float_literal(to: &IrType, value: f64) -> Option<Literal> {
        Some(match to {
            IrType::F32 => Literal::F32(value as f32),
            IrType::F64 => Literal::F64(value),
            _ => return None,
        })
    }

    /// Sign-extend an integer payload through its i64 reading
    fn signed_reading(literal: &Literal) -> Option<i64> {
        Some(match *literal {
            Literal::Bool(v) => i64::from(v),
            Literal::S8(v) => i64::from(v),
            Literal::U8(v) => i64::from(v),
            Literal::S16(v) => i64::from(v),
            Literal::U16(v) => i64::from(v),
            Literal::S32(v) => i64::from(v),
            Literal::U32(v) => i64::from(v),
            Literal::S64(v) => v,
            Literal::U64(v) | Literal::Usize(v) => v as i64,
            _ => return None,
        })
    }

    match kind {
        CastKind::Bitcast | CastKind::Reinterpret | CastKind::Trunc | CastKind::Zext => {
            int_literal(to, literal.as_u64()?)
        }
        CastKind::Sext => int_literal(to, signed_reading(literal)? as u64),
        CastKind::Fext | CastKind::Ftrunc => float_literal(to, literal.as_f64()?),
        CastKind::FpToUi => int_literal(to, literal.as_f64()? as u64),
        CastKind::FpToSi => int_literal(to, literal.as_f64()? as i64 as u64),
        CastKind::UiToFp => float_literal(to, literal.as_u64()? as f64),
        CastKind::SiToFp => float_literal(to, signed_reading(literal)? as f64),
        // Pointer/integer boundary casts are never folded
        CastKind::IntToPtr | CastKind::PtrToInt => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_zext() {
        let folded = fold_const_cast(CastKind::Zext, &Literal::U8(200), &IrType::S32);
        assert_eq!(folded, Some(Literal::S32(200)));
    }

    #[test]
    fn test_fold_sext_preserves_sign() {
        let folded = fold_const_cast(CastKind::Sext, &Literal::S8(-1), &IrType::S64);
        assert_eq!(folded, Some(Literal::S64(-1)));
    }

    #[test]
    fn test_fold_trunc() {
        let folded = fold_const_cast(CastKind::Trunc, &Literal::U64(0x1_0000_0001), &IrType::U32);
        assert_eq!(folded, Some(Literal::U32(1)));
    }

    #[test]
    fn test_fold_int_float_boundary() {
        assert_eq!(
            fold_const_cast(CastKind::SiToFp, &Literal::S32(-3), &IrType::F64),
            Some(Literal::F64(-3.0))
        );
        assert_eq!(
            fold_const_cast(CastKind::FpToSi, &Literal::F64(-2.75), &IrType::S32),
            Some(Literal::S32(-2))
        );
    }

    #[test]
    fn test_pointer_casts_never_fold() {
        assert_eq!(
            fold_const_cast(CastKind::IntToPtr, &Literal::U64(16), &IrType::U64),
            None
        );
    }
}
