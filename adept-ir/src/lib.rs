// Typed intermediate representation consumed by backends.
// Everything is arena/id-indexed: types live in a per-module pool,
// functions and globals are referenced by index, and values reference
// instruction results by position.

pub mod bridge;
pub mod endpoint;
pub mod func;
pub mod instr;
pub mod module;
pub mod proc_map;
pub mod sf_cache;
pub mod type_map;
pub mod types;
pub mod value;

pub use bridge::{BridgeScope, BridgeVar, ScopeArena, ScopeId};
pub use endpoint::{endpoint_list_insert, FuncEndpoint, FuncPair, IrFuncId};
pub use func::{IrFunc, IrFuncTraits};
pub use instr::{BasicBlock, FailurePoint, Instr, IrMathOp};
pub use module::{
    IrAnonGlobal, IrGlobal, IrModule, IrStaticVariable, JobList, RttiRelocation, SharedCommon,
    VtableDispatch, VtableInit,
};
pub use proc_map::{FuncKey, MethodKey, ProcMap};
pub use sf_cache::{SfCache, SfCacheEntry, Trilean};
pub use type_map::TypeMap;
pub use types::{IrType, IrTypeId, TypePool};
pub use value::{CastKind, IrValue, Literal, ValueKind};
