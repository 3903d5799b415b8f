// AST function model

use crate::expr::Expr;
use crate::types::Type;
use adept_diagnostics::Source;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a function within the AST function table
pub type FuncId = usize;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct FuncTraits: u32 {
        const MAIN        = 1 << 0;
        const FOREIGN     = 1 << 1;
        const STDCALL     = 1 << 2;
        /// C-style varargs
        const VARARG      = 1 << 3;
        /// Adept-style variadic arguments
        const VARIADIC    = 1 << 4;
        /// A `__defer__` lifecycle method
        const DEFER       = 1 << 5;
        /// A `__pass__` lifecycle function
        const PASS        = 1 << 6;
        /// Synthesized by the autogen engine
        const AUTOGEN     = 1 << 7;
        const POLYMORPHIC = 1 << 8;
        const VIRTUAL     = 1 << 9;
        const OVERRIDE    = 1 << 10;
        /// A generated virtual dispatcher
        const DISPATCHER  = 1 << 11;
        /// Return value must not be discarded
        const NO_DISCARD  = 1 << 12;
        /// May never be called
        const DISALLOW    = 1 << 13;
        const IMPLICIT    = 1 << 14;
    }
}

bitflags::bitflags! {
    /// Per-parameter type traits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ParamTraits: u8 {
        /// Skip `__pass__` management for this argument
        const POD        = 1 << 0;
        /// Skip `__assign__` management for this argument
        const ASSIGN_POD = 1 << 1;
    }
}

/// Direction of data flow for a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParamFlow {
    #[default]
    In,
    Out,
    InOut,
}

/// One function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub source: Source,
    pub flow: ParamFlow,
    pub traits: ParamTraits,
    pub default_value: Option<Expr>,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            source: Source::NONE,
            flow: ParamFlow::In,
            traits: ParamTraits::empty(),
            default_value: None,
        }
    }

    pub fn with_default(mut self, default_value: Expr) -> Self {
        self.default_value = Some(default_value);
        self
    }
}

/// Info about an Adept-style variadic tail: `func print(values ...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariadicInfo {
    pub name: String,
    pub source: Source,
}

/// AST function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Func {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Type,
    pub traits: FuncTraits,
    pub statements: Vec<Expr>,
    pub variadic: Option<VariadicInfo>,
    pub source: Source,
    /// For concrete functions created by polymorph instantiation, the
    /// template they came from
    pub origin: Option<FuncId>,
    /// How many instantiations deep this function was created
    /// (0 for hand-written functions); guards infinite recursion
    pub instantiation_depth: usize,
    /// For VIRTUAL methods, the generated dispatcher
    pub virtual_dispatcher: Option<FuncId>,
    /// For DISPATCHER methods, the virtual default they dispatch for
    pub virtual_origin: Option<FuncId>,
}

impl Func {
    pub fn new(name: impl Into<String>, params: Vec<Param>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            traits: FuncTraits::empty(),
            statements: Vec::new(),
            variadic: None,
            source: Source::NONE,
            origin: None,
            instantiation_depth: 0,
            virtual_dispatcher: None,
            virtual_origin: None,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_polymorphic(&self) -> bool {
        self.traits.contains(FuncTraits::POLYMORPHIC)
    }

    /// A method takes a `this` pointer to a composite as first parameter
    pub fn is_method(&self) -> bool {
        self.params.first().is_some_and(|param| {
            param.name == "this" && param.ty.is_pointer() && param.ty.method_subject_name().is_some()
        })
    }

    /// Name of the composite this method belongs to
    pub fn subject_name(&self) -> Option<&str> {
        if !self.is_method() {
            return None;
        }
        self.params.first().and_then(|param| param.ty.method_subject_name())
    }

    /// Whether all parameters at and beyond `provided` have defaults,
    /// so a call with `provided` arguments can be completed
    pub fn defaults_cover(&self, provided: usize) -> bool {
        self.params[provided..]
            .iter()
            .all(|param| param.default_value.is_some())
    }

    /// Render the head of this function for diagnostics,
    /// e.g. `sum(a int, b int) int`
    pub fn head(&self) -> String {
        format!("{}", FuncHead(self))
    }
}

struct FuncHead<'a>(&'a Func);

impl fmt::Display for FuncHead<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let func = self.0;
        write!(f, "{}(", func.name)?;

        for (i, param) in func.params.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", param.name, param.ty)?;
        }

        if func.traits.contains(FuncTraits::VARARG) {
            if func.params.is_empty() {
                write!(f, "...")?;
            } else {
                write!(f, ", ...")?;
            }
        }

        write!(f, ")")?;

        if !func.return_type.is_none() && !func.return_type.is_base_named("void") {
            write!(f, " {}", func.return_type)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_detection() {
        let method = Func::new(
            "area",
            vec![Param::new("this", Type::base("Shape").pointer_to())],
            Type::base("double"),
        );
        assert!(method.is_method());
        assert_eq!(method.subject_name(), Some("Shape"));

        let function = Func::new("area", vec![Param::new("shape", Type::base("Shape"))], Type::base("double"));
        assert!(!function.is_method());
    }

    #[test]
    fn test_defaults_cover() {
        use crate::expr::ExprKind;

        let func = Func::new(
            "greet",
            vec![
                Param::new("name", Type::base("String")),
                Param::new("punctuation", Type::base("String"))
                    .with_default(Expr::new(ExprKind::Str("!".into()), Source::NONE)),
            ],
            Type::NONE,
        );

        assert!(func.defaults_cover(1));
        assert!(func.defaults_cover(2));
        assert!(!func.defaults_cover(0));
    }

    #[test]
    fn test_head_rendering() {
        let mut func = Func::new(
            "sum",
            vec![
                Param::new("a", Type::base("int")),
                Param::new("b", Type::base("int")),
            ],
            Type::base("int"),
        );
        assert_eq!(func.head(), "sum(a int, b int) int");

        func.traits |= FuncTraits::VARARG;
        func.return_type = Type::base("void");
        assert_eq!(func.head(), "sum(a int, b int, ...)");
    }
}
