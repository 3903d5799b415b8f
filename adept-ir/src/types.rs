// IR types and the per-module type pool
// Structural kinds are interned so id equality stands in for the C
// pool's pointer identity. Structures are nominal: each composite gets
// one reserved slot whose fields are bound late, which keeps recursive
// types (a struct holding a pointer to itself) representable.

use std::collections::HashMap;
use std::fmt;

/// Handle to a type inside a module's [`TypePool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IrTypeId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    F32,
    F64,
    Boolean,
    Void,
    Pointer { elem: IrTypeId },
    Structure { fields: Vec<IrTypeId>, is_packed: bool },
    FixedArray { elem: IrTypeId, length: u64 },
    FuncPtr {
        arg_types: Vec<IrTypeId>,
        return_type: IrTypeId,
        is_vararg: bool,
    },
    /// Transient; must be erased before hand-off to the backend
    UnknownEnum { kind_name: String },
}

impl IrType {
    pub fn is_integer_like(&self) -> bool {
        matches!(
            self,
            IrType::S8
                | IrType::U8
                | IrType::S16
                | IrType::U16
                | IrType::S32
                | IrType::U32
                | IrType::S64
                | IrType::U64
                | IrType::Boolean
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, IrType::S8 | IrType::S16 | IrType::S32 | IrType::S64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IrType::F32 | IrType::F64)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Pointer { .. })
    }

    /// Width in bits for scalar kinds
    pub fn bits(&self) -> Option<u32> {
        match self {
            IrType::Boolean => Some(1),
            IrType::S8 | IrType::U8 => Some(8),
            IrType::S16 | IrType::U16 => Some(16),
            IrType::S32 | IrType::U32 | IrType::F32 => Some(32),
            IrType::S64 | IrType::U64 | IrType::F64 | IrType::Pointer { .. } => Some(64),
            _ => None,
        }
    }
}

/// Arena of IR types belonging to one module
#[derive(Debug, Default)]
pub struct TypePool {
    types: Vec<IrType>,
    interned: HashMap<IrType, IrTypeId>,
}

impl TypePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a structural type, returning the existing id when an
    /// equal type is already pooled
    pub fn intern(&mut self, ty: IrType) -> IrTypeId {
        debug_assert!(
            !matches!(ty, IrType::Structure { .. }),
            "structures are nominal; use reserve_structure"
        );

        if let Some(&id) = self.interned.get(&ty) {
            return id;
        }

        let id = IrTypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.interned.insert(ty, id);
        id
    }

    /// Reserve a nominal structure slot whose fields are bound later
    /// (pre-registration pass), so pointers to it can be created first
    pub fn reserve_structure(&mut self) -> IrTypeId {
        let id = IrTypeId(self.types.len() as u32);
        self.types.push(IrType::Structure {
            fields: Vec::new(),
            is_packed: false,
        });
        id
    }

    /// Bind the field list of a reserved structure
    pub fn bind_structure(&mut self, id: IrTypeId, fields: Vec<IrTypeId>, is_packed: bool) {
        debug_assert!(matches!(self.get(id), IrType::Structure { .. }));
        self.types[id.0 as usize] = IrType::Structure { fields, is_packed };
    }

    pub fn get(&self, id: IrTypeId) -> &IrType {
        &self.types[id.0 as usize]
    }

    pub fn pointer_to(&mut self, elem: IrTypeId) -> IrTypeId {
        self.intern(IrType::Pointer { elem })
    }

    /// Element type behind a pointer id, when it is one
    pub fn pointee(&self, id: IrTypeId) -> Option<IrTypeId> {
        match self.get(id) {
            IrType::Pointer { elem } => Some(*elem),
            _ => None,
        }
    }

    pub fn fixed_array_of(&mut self, elem: IrTypeId, length: u64) -> IrTypeId {
        self.intern(IrType::FixedArray { elem, length })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn display(&self, id: IrTypeId) -> IrTypeDisplay {
        IrTypeDisplay { pool: self, id }
    }
}

/// Pretty-printer for pooled types, mainly for logs and tests
pub struct IrTypeDisplay<'a> {
    pool: &'a TypePool,
    id: IrTypeId,
}

impl fmt::Display for IrTypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.pool.get(self.id) {
            IrType::S8 => write!(f, "s8"),
            IrType::U8 => write!(f, "u8"),
            IrType::S16 => write!(f, "s16"),
            IrType::U16 => write!(f, "u16"),
            IrType::S32 => write!(f, "s32"),
            IrType::U32 => write!(f, "u32"),
            IrType::S64 => write!(f, "s64"),
            IrType::U64 => write!(f, "u64"),
            IrType::F32 => write!(f, "f32"),
            IrType::F64 => write!(f, "f64"),
            IrType::Boolean => write!(f, "bool"),
            IrType::Void => write!(f, "void"),
            IrType::Pointer { elem } => write!(f, "*{}", self.pool.display(*elem)),
            IrType::Structure { fields, is_packed } => {
                write!(f, "{}{{", if *is_packed { "packed " } else { "" })?;
                for (i, field) in fields.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.pool.display(*field))?;
                }
                write!(f, "}}")
            }
            IrType::FixedArray { elem, length } => {
                write!(f, "[{} x {}]", length, self.pool.display(*elem))
            }
            IrType::FuncPtr {
                arg_types,
                return_type,
                is_vararg,
            } => {
                write!(f, "func(")?;
                for (i, arg) in arg_types.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.pool.display(*arg))?;
                }
                if *is_vararg {
                    write!(f, ", ...")?;
                }
                write!(f, ") {}", self.pool.display(*return_type))
            }
            IrType::UnknownEnum { kind_name } => write!(f, "::{}", kind_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_shares_ids() {
        let mut pool = TypePool::new();
        let a = pool.intern(IrType::S32);
        let b = pool.intern(IrType::S32);
        assert_eq!(a, b);

        let ptr_a = pool.pointer_to(a);
        let ptr_b = pool.pointer_to(b);
        assert_eq!(ptr_a, ptr_b);
        assert_ne!(a, ptr_a);
    }

    #[test]
    fn test_recursive_structure() {
        let mut pool = TypePool::new();
        let node = pool.reserve_structure();
        let node_ptr = pool.pointer_to(node);
        let payload = pool.intern(IrType::S64);
        pool.bind_structure(node, vec![payload, node_ptr], false);

        match pool.get(node) {
            IrType::Structure { fields, .. } => assert_eq!(fields, &vec![payload, node_ptr]),
            _ => unreachable!(),
        }
        assert_eq!(pool.pointee(node_ptr), Some(node));
    }

    #[test]
    fn test_structures_are_nominal() {
        let mut pool = TypePool::new();
        let a = pool.reserve_structure();
        let b = pool.reserve_structure();
        assert_ne!(a, b);
    }

    #[test]
    fn test_display() {
        let mut pool = TypePool::new();
        let s32 = pool.intern(IrType::S32);
        let arr = pool.fixed_array_of(s32, 4);
        let ptr = pool.pointer_to(arr);
        assert_eq!(pool.display(ptr).to_string(), "*[4 x s32]");
    }
}
