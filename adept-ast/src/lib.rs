// Abstract syntax tree for the Adept compiler core.
// The parser produces an `Ast`; the middle end consumes it and appends
// new entries only through polymorph instantiation.

pub mod composite;
pub mod expr;
pub mod func;
pub mod hash;
pub mod identical;
pub mod items;
pub mod poly_catalog;
pub mod resolve;
pub mod rtti_collector;
pub mod type_set;
pub mod types;

pub use composite::{Composite, CompositeId, CompositeTraits, Field};
pub use expr::{DeclareTraits, Expr, ExprKind, MathOp, SwitchCase};
pub use func::{Func, FuncId, FuncTraits, Param, ParamFlow, ParamTraits, VariadicInfo};
pub use hash::{type_hash, types_hash, TypeHash};
pub use identical::{elems_identical, type_lists_identical, types_identical};
pub use items::{Alias, Constant, Enum, EnumId, Global, GlobalId, GlobalTraits};
pub use poly_catalog::PolyCatalog;
pub use resolve::{resolve_expr, resolve_exprs, resolve_type, ResolveError};
pub use rtti_collector::RttiCollector;
pub use type_set::TypeSet;
pub use types::{FuncElemTraits, Type, TypeElem};

use serde::{Deserialize, Serialize};

/// Root of a parsed compilation object.
///
/// Item ids are plain indices into the owning vectors; the middle end
/// may append (never remove or reorder), so ids handed out earlier stay
/// valid across instantiation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    pub funcs: Vec<Func>,
    pub composites: Vec<Composite>,
    pub aliases: Vec<Alias>,
    pub enums: Vec<Enum>,
    pub globals: Vec<Global>,
    pub constants: Vec<Constant>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_func(&mut self, func: Func) -> FuncId {
        self.funcs.push(func);
        self.funcs.len() - 1
    }

    pub fn add_composite(&mut self, composite: Composite) -> CompositeId {
        self.composites.push(composite);
        self.composites.len() - 1
    }

    pub fn add_global(&mut self, global: Global) -> GlobalId {
        self.globals.push(global);
        self.globals.len() - 1
    }

    pub fn find_composite(&self, name: &str) -> Option<&Composite> {
        self.composites.iter().find(|composite| composite.name == name)
    }

    pub fn find_composite_id(&self, name: &str) -> Option<CompositeId> {
        self.composites.iter().position(|composite| composite.name == name)
    }

    /// Find the composite a type's head element refers to
    pub fn find_composite_of(&self, ty: &Type) -> Option<&Composite> {
        self.find_composite(ty.struct_name()?)
    }

    pub fn find_alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.iter().find(|alias| alias.name == name)
    }

    pub fn find_enum(&self, name: &str) -> Option<&Enum> {
        self.enums.iter().find(|enumeration| enumeration.name == name)
    }

    /// Find the enum that declares a member kind, for resolving
    /// `UnknownEnum` placeholders
    pub fn find_enum_with_kind(&self, kind_name: &str) -> Option<&Enum> {
        self.enums
            .iter()
            .find(|enumeration| enumeration.kind_index(kind_name).is_some())
    }

    pub fn find_constant(&self, name: &str) -> Option<&Constant> {
        self.constants.iter().find(|constant| constant.name == name)
    }

    pub fn find_global(&self, name: &str) -> Option<GlobalId> {
        self.globals.iter().position(|global| global.name == name)
    }

    /// All function names, for "did you mean?" suggestion corpora
    pub fn func_names(&self) -> impl Iterator<Item = &str> {
        self.funcs.iter().map(|func| func.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable_across_append() {
        let mut ast = Ast::new();
        let first = ast.add_func(Func::new("first", vec![], Type::NONE));
        let second = ast.add_func(Func::new("second", vec![], Type::NONE));

        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(ast.funcs[first].name, "first");
    }

    #[test]
    fn test_find_enum_with_kind() {
        let mut ast = Ast::new();
        ast.enums.push(Enum::new("Fruit", vec!["APPLE".into(), "BANANA".into()]));
        ast.enums.push(Enum::new("Color", vec!["RED".into()]));

        assert_eq!(ast.find_enum_with_kind("RED").map(|e| e.name.as_str()), Some("Color"));
        assert!(ast.find_enum_with_kind("CYAN").is_none());
    }

    #[test]
    fn test_find_composite_of() {
        let mut ast = Ast::new();
        ast.add_composite(Composite::new("Point", vec![]));

        assert!(ast.find_composite_of(&Type::base("Point")).is_some());
        assert!(ast.find_composite_of(&Type::base("Missing")).is_none());
        assert!(ast.find_composite_of(&Type::base("Point").pointer_to()).is_none());
    }
}
