// Runtime type information
// `typeinfo T` mentions T to the collector and reads a descriptor out
// of the `__types__` global through a deferred-patch index slot.
// Finalization enumerates the collector in first-insertion order,
// materializes the descriptor array, and patches every slot.

use crate::builder::Builder;
use crate::ctx::GenContext;
use crate::error::{fatal, GenResult};
use crate::gen_type::resolve_ir_type;
use adept_ast::{GlobalTraits, Type, TypeElem};
use adept_diagnostics::Source;
use adept_ir::{
    IrGlobal, IrType, IrTypeId, IrValue, Literal, ValueKind,
};
use std::collections::HashMap;

pub const TYPES_GLOBAL_NAME: &str = "__types__";
pub const TYPES_LENGTH_GLOBAL_NAME: &str = "__types_length__";

/// Descriptor kind codes, fixed per target; the backend must not
/// reorder the descriptor layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum RttiKind {
    Unknown = 0,
    Bool = 1,
    Byte = 2,
    Ubyte = 3,
    Short = 4,
    Ushort = 5,
    Int = 6,
    Uint = 7,
    Long = 8,
    Ulong = 9,
    Float = 10,
    Double = 11,
    Pointer = 12,
    FixedArray = 13,
    FuncPtr = 14,
    Structure = 15,
    Enum = 16,
    Void = 17,
}

/// Shape of one `__types__` entry: (kind, name, size, alignment)
pub fn descriptor_type(ctx: &mut GenContext) -> IrTypeId {
    const DESCRIPTOR_TYPE_NAME: &str = "__AnyType__";

    if let Some(existing) = ctx.module.type_map.find(DESCRIPTOR_TYPE_NAME) {
        return existing;
    }

    let u64_type = ctx.module.pool.intern(IrType::U64);
    let u8_type = ctx.module.pool.intern(IrType::U8);
    let name_type = ctx.module.pool.pointer_to(u8_type);

    let structure = ctx.module.pool.reserve_structure();
    ctx.module
        .pool
        .bind_structure(structure, vec![u64_type, name_type, u64_type, u64_type], false);
    ctx.module.type_map.insert(DESCRIPTOR_TYPE_NAME, structure);
    structure
}

/// Create the `__types__` / `__types_length__` globals; called once by
/// the pass driver when RTTI is enabled
pub fn declare_rtti_globals(ctx: &mut GenContext) {
    if ctx.module.find_global(TYPES_GLOBAL_NAME).is_some() {
        return;
    }

    let descriptor = descriptor_type(ctx);
    let descriptor_ptr = ctx.module.pool.pointer_to(descriptor);
    let array_type = ctx.module.pool.pointer_to(descriptor_ptr);

    ctx.module.globals.push(IrGlobal {
        name: TYPES_GLOBAL_NAME.into(),
        ast_type: Type::base("ptr").pointer_to(),
        ir_type: array_type,
        traits: GlobalTraits::SPECIAL,
        initial: None,
    });

    let usize_type = ctx.module.common.usize_type;
    ctx.module.globals.push(IrGlobal {
        name: TYPES_LENGTH_GLOBAL_NAME.into(),
        ast_type: Type::base("usize"),
        ir_type: usize_type,
        traits: GlobalTraits::SPECIAL,
        initial: Some(IrValue::literal(usize_type, Literal::Usize(0))),
    });
}

/// Materializes `typeinfo T` as `__types__[slot]`, where `slot` is a
/// placeholder patched during finalization. Returns a pointer to the
/// runtime type descriptor.
pub fn rtti_for(builder: &mut Builder, ast_type: &Type, source: Source) -> GenResult<IrValue> {
    if builder.ctx.module.rtti_collector.is_none() {
        return builder.panic(source, "runtime type information is disabled (--no-typeinfo)");
    }

    builder.ctx.mention_type(ast_type);

    let Some(types_global) = builder.ctx.module.find_global(TYPES_GLOBAL_NAME) else {
        return builder.panic(source, "the '__types__' array is not available");
    };

    // Placeholder index, filled in later
    let slot = builder.ctx.module.add_rtti_slot();
    let placeholder = IrValue::new(builder.usize_type(), ValueKind::RttiSlot { slot });
    builder.add_rtti_relocation(ast_type.to_string(), slot, source);

    let array_type = builder.ctx.module.globals[types_global].ir_type;
    let global_ptr_type = builder.ctx.module.pool.pointer_to(array_type);
    let array_ptr = builder.build_gvarptr(global_ptr_type, types_global);
    let rtti_array = builder.build_load(array_ptr, Source::NONE);

    let elem_ptr = builder.build_array_access(rtti_array, placeholder, Source::NONE);
    Ok(builder.build_load(elem_ptr, Source::NONE))
}

fn classify(ctx: &GenContext, ty: &Type) -> RttiKind {
    match ty.elements.as_slice() {
        [TypeElem::Pointer, ..] | [TypeElem::Array, ..] => RttiKind::Pointer,
        [TypeElem::FixedArray { .. }, ..] => RttiKind::FixedArray,
        [TypeElem::Func { .. }] => RttiKind::FuncPtr,
        [TypeElem::GenericBase { .. }] => RttiKind::Structure,
        [TypeElem::Base { name }] => match name.as_str() {
            "bool" | "successful" => RttiKind::Bool,
            "byte" => RttiKind::Byte,
            "ubyte" => RttiKind::Ubyte,
            "short" => RttiKind::Short,
            "ushort" => RttiKind::Ushort,
            "int" => RttiKind::Int,
            "uint" => RttiKind::Uint,
            "long" => RttiKind::Long,
            "ulong" | "usize" => RttiKind::Ulong,
            "float" => RttiKind::Float,
            "double" => RttiKind::Double,
            "void" => RttiKind::Void,
            "ptr" => RttiKind::Pointer,
            _ => {
                if ctx.ast.find_enum(name).is_some() {
                    RttiKind::Enum
                } else if ctx.ast.find_composite(name).is_some() {
                    RttiKind::Structure
                } else {
                    RttiKind::Unknown
                }
            }
        },
        _ => RttiKind::Unknown,
    }
}

/// RTTI finalization: enumerate the collector's set into the
/// `__types__` array and patch every relocation's placeholder slot
pub fn rtti_finalize(ctx: &mut GenContext) -> GenResult<()> {
    let Some(collector) = ctx.module.rtti_collector.take() else {
        debug_assert!(ctx.module.rtti_relocations.is_empty());
        return Ok(());
    };

    let descriptor = descriptor_type(ctx);
    let descriptor_ptr = ctx.module.pool.pointer_to(descriptor);
    let usize_type = ctx.module.common.usize_type;
    let u64_type = ctx.module.pool.intern(IrType::U64);
    let u8_type = ctx.module.pool.intern(IrType::U8);
    let name_type = ctx.module.pool.pointer_to(u8_type);

    let mentioned: Vec<Type> = collector.iter().cloned().collect();
    let mut name_to_index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<IrValue> = Vec::with_capacity(mentioned.len());

    for (index, ty) in mentioned.iter().enumerate() {
        let human_notation = ty.to_string();

        let kind = classify(ctx, ty) as u64;
        let notation_bytes = human_notation.as_bytes().to_vec();
        let notation_len = notation_bytes.len();

        // Size and alignment come from the IR type; types that cannot
        // be materialized report zero
        let (size, alignment) = match resolve_ir_type(ctx, ty) {
            Ok(ir_type) => (
                IrValue::new(usize_type, ValueKind::ConstSizeof { ty: ir_type }),
                IrValue::new(usize_type, ValueKind::ConstAlignof { ty: ir_type }),
            ),
            Err(_) => (
                IrValue::literal(usize_type, Literal::Usize(0)),
                IrValue::literal(usize_type, Literal::Usize(0)),
            ),
        };

        let descriptor_value = IrValue::new(
            descriptor,
            ValueKind::ConstStructLiteral {
                values: vec![
                    IrValue::literal(u64_type, Literal::U64(kind)),
                    IrValue::new(
                        name_type,
                        ValueKind::CStrOfLen {
                            value: notation_bytes,
                            length: notation_len,
                        },
                    ),
                    size,
                    alignment,
                ],
            },
        );

        let anon_global_id = ctx.module.add_anon_global(adept_ir::IrAnonGlobal {
            ir_type: descriptor,
            is_constant: true,
            initializer: Some(descriptor_value),
        });

        entries.push(IrValue::new(
            descriptor_ptr,
            ValueKind::ConstAnonGlobal { anon_global_id },
        ));

        name_to_index.insert(human_notation, index);
    }

    // Materialize the array itself and point `__types__` at it
    let array_ir_type = ctx.module.pool.fixed_array_of(descriptor_ptr, entries.len() as u64);
    let count = entries.len() as u64;
    let array_global_id = ctx.module.add_anon_global(adept_ir::IrAnonGlobal {
        ir_type: array_ir_type,
        is_constant: true,
        initializer: Some(IrValue::new(
            array_ir_type,
            ValueKind::ArrayLiteral { values: entries },
        )),
    });

    if let Some(types_global) = ctx.module.find_global(TYPES_GLOBAL_NAME) {
        let value_type = ctx.module.globals[types_global].ir_type;
        ctx.module.globals[types_global].initial = Some(IrValue::new(
            value_type,
            ValueKind::ConstAnonGlobal {
                anon_global_id: array_global_id,
            },
        ));
    }

    if let Some(length_global) = ctx.module.find_global(TYPES_LENGTH_GLOBAL_NAME) {
        ctx.module.globals[length_global].initial =
            Some(IrValue::literal(usize_type, Literal::Usize(count)));
    }

    // Patch every pending relocation
    let relocations = std::mem::take(&mut ctx.module.rtti_relocations);

    for relocation in &relocations {
        let Some(&index) = name_to_index.get(&relocation.human_notation) else {
            log::error!(
                "rtti_finalize() - failed to find info for type '{}', which should exist",
                relocation.human_notation
            );
            ctx.panic(
                relocation.source_on_failure,
                format!(
                    "internal error: no runtime type information for '{}'",
                    relocation.human_notation
                ),
            );
            return fatal();
        };

        ctx.module.rtti_slots[relocation.slot] = index as u64;
    }

    ctx.module.rtti_relocations = relocations;
    ctx.module.rtti_collector = Some(collector);
    Ok(())
}
