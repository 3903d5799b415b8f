// The intermediate representation module: everything the middle end
// produces for one compilation object, handed to the backend opaquely

use crate::endpoint::{FuncEndpoint, IrFuncId};
use crate::func::IrFunc;
use crate::proc_map::{FuncKey, MethodKey, ProcMap};
use crate::sf_cache::SfCache;
use crate::type_map::TypeMap;
use crate::types::{IrType, IrTypeId, TypePool};
use crate::value::IrValue;
use adept_ast::{GlobalTraits, RttiCollector, Type};
use adept_diagnostics::Source;

/// Commonly used IR types, computed once per module
#[derive(Debug, Clone, Copy)]
pub struct SharedCommon {
    pub void_type: IrTypeId,
    pub bool_type: IrTypeId,
    pub s8_type: IrTypeId,
    pub usize_type: IrTypeId,
    pub usize_ptr_type: IrTypeId,
    /// Untyped data pointer (`*s8`)
    pub ptr_type: IrTypeId,
}

impl SharedCommon {
    fn compute(pool: &mut TypePool) -> Self {
        let void_type = pool.intern(IrType::Void);
        let bool_type = pool.intern(IrType::Boolean);
        let s8_type = pool.intern(IrType::S8);
        let usize_type = pool.intern(IrType::U64);
        let usize_ptr_type = pool.pointer_to(usize_type);
        let ptr_type = pool.pointer_to(s8_type);

        Self {
            void_type,
            bool_type,
            s8_type,
            usize_type,
            usize_ptr_type,
            ptr_type,
        }
    }
}

/// Module-scoped named global variable slot
#[derive(Debug)]
pub struct IrGlobal {
    pub name: String,
    pub ast_type: Type,
    pub ir_type: IrTypeId,
    pub traits: GlobalTraits,
    /// Deferred initializer, stored by the module-init function
    pub initial: Option<IrValue>,
}

/// Anonymous module-scoped global for addressable constants
#[derive(Debug)]
pub struct IrAnonGlobal {
    pub ir_type: IrTypeId,
    /// Constant globals may be placed in read-only memory
    pub is_constant: bool,
    pub initializer: Option<IrValue>,
}

/// Static variable slot (separate id space from globals)
#[derive(Debug)]
pub struct IrStaticVariable {
    pub ast_type: Type,
    pub ir_type: IrTypeId,
    pub initial: Option<IrValue>,
}

/// Deferred patch: write the `__types__` index of the type named by
/// `human_notation` into `IrModule::rtti_slots[slot]`
#[derive(Debug, Clone, PartialEq)]
pub struct RttiRelocation {
    pub human_notation: String,
    pub slot: usize,
    pub source_on_failure: Source,
}

/// Links a class signature to its finalized dispatch table so instance
/// construction can store the vtable pointer
#[derive(Debug)]
pub struct VtableInit {
    pub signature: Type,
    pub table: IrValue,
}

/// Record of one generated dispatcher and the table slot it reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtableDispatch {
    pub ir_func_id: IrFuncId,
    pub index: usize,
}

/// Queue of functions whose bodies still need generating.
/// Drained to exhaustion by the pass driver; generation may push more.
#[derive(Debug, Default)]
pub struct JobList {
    jobs: Vec<FuncEndpoint>,
    next: usize,
}

impl JobList {
    pub fn push(&mut self, endpoint: FuncEndpoint) {
        self.jobs.push(endpoint);
    }

    pub fn pop_next(&mut self) -> Option<FuncEndpoint> {
        let job = self.jobs.get(self.next).copied()?;
        self.next += 1;
        Some(job)
    }

    /// Number of jobs ever queued (for snapshots)
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of jobs not yet processed
    pub fn outstanding(&self) -> usize {
        self.jobs.len() - self.next
    }

    /// Drop jobs queued after a snapshot point
    pub fn truncate(&mut self, length: usize) {
        debug_assert!(length >= self.next);
        self.jobs.truncate(length);
    }
}

/// An intermediate representation module
#[derive(Debug)]
pub struct IrModule {
    pub pool: TypePool,
    pub common: SharedCommon,
    pub type_map: TypeMap,
    pub funcs: Vec<IrFunc>,
    pub func_map: ProcMap<FuncKey>,
    pub method_map: ProcMap<MethodKey>,
    pub globals: Vec<IrGlobal>,
    pub anon_globals: Vec<IrAnonGlobal>,
    pub static_variables: Vec<IrStaticVariable>,
    pub sf_cache: SfCache,
    /// Absent when the compiler runs with NO_TYPEINFO
    pub rtti_collector: Option<RttiCollector>,
    pub rtti_relocations: Vec<RttiRelocation>,
    /// Slot table patched during RTTI finalization
    pub rtti_slots: Vec<u64>,
    pub job_list: JobList,
    pub vtable_init_list: Vec<VtableInit>,
    pub vtable_dispatch_list: Vec<VtableDispatch>,
    pub init_func_id: Option<IrFuncId>,
    pub deinit_func_id: Option<IrFuncId>,
}

impl IrModule {
    pub fn new(enable_rtti: bool) -> Self {
        let mut pool = TypePool::new();
        let common = SharedCommon::compute(&mut pool);

        Self {
            pool,
            common,
            type_map: TypeMap::new(),
            funcs: Vec::new(),
            func_map: ProcMap::new(),
            method_map: ProcMap::new(),
            globals: Vec::new(),
            anon_globals: Vec::new(),
            static_variables: Vec::new(),
            sf_cache: SfCache::new(),
            rtti_collector: enable_rtti.then(RttiCollector::new),
            rtti_relocations: Vec::new(),
            rtti_slots: Vec::new(),
            job_list: JobList::default(),
            vtable_init_list: Vec::new(),
            vtable_dispatch_list: Vec::new(),
            init_func_id: None,
            deinit_func_id: None,
        }
    }

    pub fn add_func(&mut self, func: IrFunc) -> IrFuncId {
        self.funcs.push(func);
        self.funcs.len() - 1
    }

    /// Creates a new function mapping, optionally queueing the body job
    pub fn create_func_mapping(
        &mut self,
        function_name: &str,
        endpoint: FuncEndpoint,
        add_to_job_list: bool,
    ) {
        self.func_map.insert(FuncKey::new(function_name), endpoint);

        if add_to_job_list {
            self.job_list.push(endpoint);
        }
    }

    /// Creates a new method mapping
    pub fn create_method_mapping(
        &mut self,
        struct_name: &str,
        method_name: &str,
        endpoint: FuncEndpoint,
    ) {
        self.method_map
            .insert(MethodKey::new(struct_name, method_name), endpoint);
    }

    pub fn add_anon_global(&mut self, anon_global: IrAnonGlobal) -> usize {
        self.anon_globals.push(anon_global);
        self.anon_globals.len() - 1
    }

    /// Allocate a deferred-patch RTTI slot, initialized to zero
    pub fn add_rtti_slot(&mut self) -> usize {
        self.rtti_slots.push(0);
        self.rtti_slots.len() - 1
    }

    pub fn find_global(&self, name: &str) -> Option<usize> {
        self.globals.iter().position(|global| global.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_list_drains_in_order() {
        let mut jobs = JobList::default();
        jobs.push(FuncEndpoint::concrete(0, 0));
        jobs.push(FuncEndpoint::concrete(1, 1));

        assert_eq!(jobs.pop_next().map(|j| j.ast_func_id), Some(0));

        // Work discovered mid-drain lands at the back
        jobs.push(FuncEndpoint::concrete(2, 2));
        assert_eq!(jobs.pop_next().map(|j| j.ast_func_id), Some(1));
        assert_eq!(jobs.pop_next().map(|j| j.ast_func_id), Some(2));
        assert_eq!(jobs.pop_next(), None);
        assert_eq!(jobs.outstanding(), 0);
    }

    #[test]
    fn test_module_mappings() {
        let mut module = IrModule::new(true);
        module.create_func_mapping("main", FuncEndpoint::concrete(0, 0), true);
        module.create_method_mapping("Shape", "area", FuncEndpoint::concrete(1, 1));

        assert!(module.func_map.find(&FuncKey::new("main")).is_some());
        assert!(module
            .method_map
            .find(&MethodKey::new("Shape", "area"))
            .is_some());
        assert_eq!(module.job_list.outstanding(), 1);
    }

    #[test]
    fn test_rtti_slots() {
        let mut module = IrModule::new(true);
        let slot = module.add_rtti_slot();
        assert_eq!(module.rtti_slots[slot], 0);

        module.rtti_slots[slot] = 5;
        assert_eq!(module.rtti_slots[slot], 5);
    }
}
