// AST expression model
// Statements and expressions share one discriminated union; the parser
// produces statement lists of `Expr` and the IR generator tells the two
// apart by kind

use crate::types::Type;
use adept_diagnostics::Source;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary math and logic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    BitLshift,
    BitRshift,
    BitLgcLshift,
    BitLgcRshift,
}

impl MathOp {
    /// Name of the user-overloadable management function for this
    /// operator, if overloading is supported for it
    pub fn overload_name(self) -> Option<&'static str> {
        match self {
            MathOp::Add => Some("__add__"),
            MathOp::Subtract => Some("__subtract__"),
            MathOp::Multiply => Some("__multiply__"),
            MathOp::Divide => Some("__divide__"),
            MathOp::Modulus => Some("__modulus__"),
            MathOp::Equals => Some("__equals__"),
            MathOp::NotEquals => Some("__not_equals__"),
            MathOp::LessThan => Some("__less_than__"),
            MathOp::GreaterThan => Some("__greater_than__"),
            MathOp::LessThanOrEqual => Some("__less_than_or_equal__"),
            MathOp::GreaterThanOrEqual => Some("__greater_than_or_equal__"),
            _ => None,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            MathOp::Equals
                | MathOp::NotEquals
                | MathOp::LessThan
                | MathOp::GreaterThan
                | MathOp::LessThanOrEqual
                | MathOp::GreaterThanOrEqual
        )
    }
}

impl fmt::Display for MathOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            MathOp::Add => "+",
            MathOp::Subtract => "-",
            MathOp::Multiply => "*",
            MathOp::Divide => "/",
            MathOp::Modulus => "%",
            MathOp::Equals => "==",
            MathOp::NotEquals => "!=",
            MathOp::LessThan => "<",
            MathOp::GreaterThan => ">",
            MathOp::LessThanOrEqual => "<=",
            MathOp::GreaterThanOrEqual => ">=",
            MathOp::And => "&&",
            MathOp::Or => "||",
            MathOp::BitAnd => "&",
            MathOp::BitOr => "|",
            MathOp::BitXor => "^",
            MathOp::BitLshift => "<<",
            MathOp::BitRshift => ">>",
            MathOp::BitLgcLshift => "<<<",
            MathOp::BitLgcRshift => ">>>",
        };
        write!(f, "{}", symbol)
    }
}

bitflags::bitflags! {
    /// Traits on a variable declaration
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct DeclareTraits: u8 {
        /// Plain-old-data: skip `__assign__`/`__pass__` management
        const POD    = 1 << 0;
        /// Module-lifetime storage
        const STATIC = 1 << 1;
        const CONST  = 1 << 2;
        /// Leave uninitialized (`= undef`)
        const UNDEF  = 1 << 3;
    }
}

/// A `case` within a `switch` statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: Expr,
    pub statements: Vec<Expr>,
    pub source: Source,
}

/// AST expression/statement node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub source: Source,
}

impl Expr {
    pub fn new(kind: ExprKind, source: Source) -> Self {
        Self { kind, source }
    }

    pub fn boxed(kind: ExprKind, source: Source) -> Box<Self> {
        Box::new(Self::new(kind, source))
    }

    /// Whether this node is a statement-position construct
    pub fn is_statement(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Declare { .. }
                | ExprKind::Assign { .. }
                | ExprKind::CompoundAssign { .. }
                | ExprKind::Return { .. }
                | ExprKind::If { .. }
                | ExprKind::While { .. }
                | ExprKind::Repeat { .. }
                | ExprKind::Each { .. }
                | ExprKind::For { .. }
                | ExprKind::Switch { .. }
                | ExprKind::Break
                | ExprKind::BreakTo { .. }
                | ExprKind::Continue
                | ExprKind::ContinueTo { .. }
                | ExprKind::Fallthrough
                | ExprKind::Block { .. }
                | ExprKind::Delete { .. }
                | ExprKind::VaStart { .. }
                | ExprKind::VaEnd { .. }
                | ExprKind::VaCopy { .. }
                | ExprKind::Asm { .. }
        )
    }
}

/// Every expression and statement kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    // ---- literals ----
    Boolean(bool),
    /// Unsuffixed integer literal, type `GenericInt` until conformed
    GenericInt(i64),
    /// Unsuffixed float literal, type `GenericFloat` until conformed
    GenericFloat(f64),
    Byte(i8),
    Ubyte(u8),
    Short(i16),
    Ushort(u16),
    Int(i32),
    Uint(u32),
    Long(i64),
    Ulong(u64),
    Usize(u64),
    Float(f32),
    Double(f64),
    /// `String` structure literal
    Str(String),
    /// `*ubyte` null-terminated literal
    CStr(String),
    Null,

    // ---- values ----
    Variable(String),
    /// Enum member with known owning enum: `Fruit::APPLE`
    EnumValue { enum_name: String, kind: String },
    /// Enum member pending owner resolution: `::APPLE`
    UnknownEnumValue { kind: String },
    Math {
        op: MathOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    UnaryNot(Box<Expr>),
    UnaryBitComplement(Box<Expr>),
    UnaryNegate(Box<Expr>),
    AddressOf(Box<Expr>),
    Dereference(Box<Expr>),
    Call {
        name: String,
        args: Vec<Expr>,
        /// Tentative calls silently vanish when no candidate exists
        is_tentative: bool,
        /// Required return type constraint (`returning` clause)
        gives: Option<Type>,
    },
    CallMethod {
        subject: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        is_tentative: bool,
        gives: Option<Type>,
    },
    CallAddress {
        address: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        subject: Box<Expr>,
        field: String,
    },
    ArrayAccess {
        subject: Box<Expr>,
        index: Box<Expr>,
    },
    Cast {
        to: Type,
        from: Box<Expr>,
    },
    Sizeof { ty: Type },
    SizeofValue { value: Box<Expr> },
    Alignof { ty: Type },
    /// Runtime type descriptor lookup through `__types__`
    Typeinfo { ty: Type },
    /// Runtime type name lookup through `__types__`
    Typenameof { ty: Type },
    New {
        ty: Type,
        amount: Option<Box<Expr>>,
        is_undef: bool,
        inputs: Option<Vec<Expr>>,
    },
    NewCstring(String),
    Ternary {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// Untyped initializer list `{a, b, c}`
    InitList(Vec<Expr>),
    /// `static T { ... }` array data
    StaticArray { ty: Type, values: Vec<Expr> },
    /// `static T ( ... )` struct data
    StaticStruct { ty: Type, values: Vec<Expr> },
    VaArg {
        va_list: Box<Expr>,
        ty: Type,
    },
    /// File contents embedded as a `String` literal
    Embed(String),
    /// `$#N` used in expression position inside a template
    Polycount(String),

    // ---- statements ----
    Declare {
        name: String,
        ty: Type,
        value: Option<Box<Expr>>,
        traits: DeclareTraits,
        inputs: Option<Vec<Expr>>,
    },
    Assign {
        destination: Box<Expr>,
        value: Box<Expr>,
        is_pod: bool,
    },
    CompoundAssign {
        op: MathOp,
        destination: Box<Expr>,
        value: Box<Expr>,
    },
    Return {
        value: Option<Box<Expr>>,
        /// Deferred statements re-emitted before returning
        last_minute: Vec<Expr>,
    },
    If {
        condition: Box<Expr>,
        statements: Vec<Expr>,
        else_statements: Option<Vec<Expr>>,
        /// `unless` inverts the condition
        is_unless: bool,
    },
    While {
        condition: Box<Expr>,
        statements: Vec<Expr>,
        /// `until` inverts the condition
        is_until: bool,
        label: Option<String>,
    },
    Repeat {
        limit: Box<Expr>,
        statements: Vec<Expr>,
        is_static: bool,
        /// Name of the induction variable, `idx` by default
        idx_name: Option<String>,
        label: Option<String>,
    },
    Each {
        it_name: Option<String>,
        it_type: Type,
        array: Box<Expr>,
        length: Box<Expr>,
        is_static: bool,
        statements: Vec<Expr>,
        label: Option<String>,
    },
    For {
        before: Vec<Expr>,
        condition: Option<Box<Expr>>,
        after: Vec<Expr>,
        statements: Vec<Expr>,
        label: Option<String>,
    },
    Switch {
        value: Box<Expr>,
        cases: Vec<SwitchCase>,
        default_statements: Option<Vec<Expr>>,
        is_exhaustive: bool,
    },
    Break,
    BreakTo { label: String },
    Continue,
    ContinueTo { label: String },
    Fallthrough,
    /// Conditionless scope block
    Block(Vec<Expr>),
    Delete { value: Box<Expr> },
    VaStart(Box<Expr>),
    VaEnd(Box<Expr>),
    VaCopy {
        destination: Box<Expr>,
        source_list: Box<Expr>,
    },
    Asm { assembly: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_is_deep() {
        let original = Expr::new(
            ExprKind::Math {
                op: MathOp::Add,
                lhs: Expr::boxed(ExprKind::GenericInt(1), Source::NONE),
                rhs: Expr::boxed(ExprKind::GenericInt(2), Source::NONE),
            },
            Source::NONE,
        );

        let mut cloned = original.clone();
        assert_eq!(original, cloned);

        if let ExprKind::Math { lhs, .. } = &mut cloned.kind {
            lhs.kind = ExprKind::GenericInt(99);
        }
        assert_ne!(original, cloned);
    }

    #[test]
    fn test_statement_classification() {
        let statement = Expr::new(ExprKind::Break, Source::NONE);
        assert!(statement.is_statement());

        let value = Expr::new(ExprKind::GenericInt(0), Source::NONE);
        assert!(!value.is_statement());
    }

    #[test]
    fn test_overload_names() {
        assert_eq!(MathOp::Add.overload_name(), Some("__add__"));
        assert_eq!(MathOp::Equals.overload_name(), Some("__equals__"));
        assert_eq!(MathOp::And.overload_name(), None);
    }

    #[test]
    fn test_serialization_round_trip() {
        let expr = Expr::new(
            ExprKind::Call {
                name: "compute".into(),
                args: vec![Expr::new(ExprKind::GenericInt(3), Source::NONE)],
                is_tentative: false,
                gives: None,
            },
            Source::new(0, 14, 7),
        );

        let json = serde_json::to_string(&expr).expect("serialize");
        let back: Expr = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(expr, back);
    }
}
