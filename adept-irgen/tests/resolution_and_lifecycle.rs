// Resolver behaviors (defaults, tentative calls, operator overloads)
// and module-level lifecycle emission

use adept_ast::{
    Ast, Composite, Enum, Expr, ExprKind, Field, Func, FuncTraits, Global, MathOp, Param,
    SwitchCase, Type,
};
use adept_diagnostics::{Diagnostics, Source};
use adept_ir::{Instr, IrModule};
use adept_irgen::{ir_gen, CompilerConfig};

fn expr(kind: ExprKind) -> Expr {
    Expr::new(kind, Source::NONE)
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        name: name.into(),
        args,
        is_tentative: false,
        gives: None,
    })
}

fn declare(name: &str, ty: Type) -> Expr {
    expr(ExprKind::Declare {
        name: name.into(),
        ty,
        value: None,
        traits: Default::default(),
        inputs: None,
    })
}

fn main_func(statements: Vec<Expr>) -> Func {
    let mut func = Func::new("main", vec![], Type::base("void"));
    func.traits |= FuncTraits::MAIN;
    func.statements = statements;
    func
}

fn compile(ast: &mut Ast) -> IrModule {
    let config = CompilerConfig::default();
    let mut diagnostics = Diagnostics::default();
    ir_gen(&config, ast, &mut diagnostics)
        .unwrap_or_else(|error| panic!("{}: {:#?}", error, diagnostics.diagnostics()))
}

fn compile_expecting_error(ast: &mut Ast) -> Diagnostics {
    let config = CompilerConfig::default();
    let mut diagnostics = Diagnostics::default();
    let result = ir_gen(&config, ast, &mut diagnostics);
    assert!(result.is_err(), "expected compilation to fail");
    diagnostics
}

fn ir_func_id_of(module: &IrModule, ast_func_id: usize) -> usize {
    module
        .funcs
        .iter()
        .position(|func| func.ast_func_id == ast_func_id)
        .expect("IR function exists")
}

fn instructions_of(module: &IrModule, ir_func_id: usize) -> Vec<&Instr> {
    module.funcs[ir_func_id]
        .basicblocks
        .iter()
        .flat_map(|block| block.instructions.iter())
        .collect()
}

#[test]
fn test_default_arguments_fill_lazily() {
    let mut ast = Ast::new();

    let greet = ast.add_func(Func::new(
        "greet",
        vec![
            Param::new("a", Type::base("int")),
            Param::new("b", Type::base("int")).with_default(expr(ExprKind::GenericInt(5))),
        ],
        Type::base("void"),
    ));

    let main = ast.add_func(main_func(vec![call("greet", vec![expr(ExprKind::GenericInt(1))])]));

    let module = compile(&mut ast);

    let greet_ir = ir_func_id_of(&module, greet);
    let main_ir = ir_func_id_of(&module, main);

    let calls: Vec<&Instr> = instructions_of(&module, main_ir)
        .into_iter()
        .filter(|instr| matches!(instr, Instr::Call { .. }))
        .collect();

    match calls.as_slice() {
        [Instr::Call { ir_func_id, args, .. }] => {
            assert_eq!(*ir_func_id, greet_ir);
            assert_eq!(args.len(), 2, "missing argument filled from its default");
        }
        other => panic!("expected exactly one call, found {:?}", other),
    }
}

#[test]
fn test_tentative_call_vanishes_without_candidate() {
    let mut ast = Ast::new();

    let main = ast.add_func(main_func(vec![expr(ExprKind::Call {
        name: "not_defined_anywhere".into(),
        args: vec![],
        is_tentative: true,
        gives: None,
    })]));

    let module = compile(&mut ast);

    let main_ir = ir_func_id_of(&module, main);
    let has_calls = instructions_of(&module, main_ir)
        .iter()
        .any(|instr| matches!(instr, Instr::Call { .. }));
    assert!(!has_calls, "tentative calls without a candidate are no-ops");
}

#[test]
fn test_undeclared_function_suggestion() {
    let mut ast = Ast::new();

    ast.add_func(Func::new("process", vec![], Type::base("void")));
    ast.add_func(main_func(vec![call("proces", vec![])]));

    let diagnostics = compile_expecting_error(&mut ast);
    assert!(diagnostics
        .diagnostics()
        .iter()
        .any(|diagnostic| diagnostic.message.contains("did you mean 'process'")));
}

#[test]
fn test_math_overload_on_composites() {
    let mut ast = Ast::new();

    ast.add_composite(Composite::new(
        "Vec2",
        vec![
            Field::new("x", Type::base("double")),
            Field::new("y", Type::base("double")),
        ],
    ));

    let mut add = Func::new(
        "__add__",
        vec![
            Param::new("a", Type::base("Vec2")),
            Param::new("b", Type::base("Vec2")),
        ],
        Type::base("Vec2"),
    );
    add.statements = vec![expr(ExprKind::Return {
        value: Some(Expr::boxed(ExprKind::Variable("a".into()), Source::NONE)),
        last_minute: vec![],
    })];
    let add_id = ast.add_func(add);

    let main = ast.add_func(main_func(vec![
        declare("va", Type::base("Vec2")),
        declare("vb", Type::base("Vec2")),
        expr(ExprKind::Math {
            op: MathOp::Add,
            lhs: Expr::boxed(ExprKind::Variable("va".into()), Source::NONE),
            rhs: Expr::boxed(ExprKind::Variable("vb".into()), Source::NONE),
        }),
    ]));

    let module = compile(&mut ast);

    let add_ir = ir_func_id_of(&module, add_id);
    let main_ir = ir_func_id_of(&module, main);

    let called = instructions_of(&module, main_ir)
        .iter()
        .any(|instr| matches!(instr, Instr::Call { ir_func_id, .. } if *ir_func_id == add_ir));
    assert!(called, "composite addition goes through __add__");
}

#[test]
fn test_exhaustive_switch_requires_all_members() {
    let mut ast = Ast::new();

    ast.enums.push(Enum::new("Fruit", vec!["APPLE".into(), "BANANA".into()]));

    ast.add_func(main_func(vec![
        declare("f", Type::base("Fruit")),
        expr(ExprKind::Switch {
            value: Expr::boxed(ExprKind::Variable("f".into()), Source::NONE),
            cases: vec![SwitchCase {
                value: expr(ExprKind::EnumValue {
                    enum_name: "Fruit".into(),
                    kind: "APPLE".into(),
                }),
                statements: vec![],
                source: Source::NONE,
            }],
            default_statements: None,
            is_exhaustive: true,
        }),
    ]));

    let diagnostics = compile_expecting_error(&mut ast);
    assert!(diagnostics
        .diagnostics()
        .iter()
        .any(|diagnostic| diagnostic.message.contains("missing case for 'BANANA'")));
}

#[test]
fn test_module_init_and_deinit_emission() {
    let mut ast = Ast::new();

    ast.add_composite(Composite::new(
        "Res",
        vec![Field::new("handle", Type::base("int"))],
    ));

    let res_defer = ast.add_func(Func::new(
        "__defer__",
        vec![Param::new("this", Type::base("Res").pointer_to())],
        Type::base("void"),
    ));

    ast.add_global(Global::new("resource", Type::base("Res")));

    let mut counter = Global::new("counter", Type::base("int"));
    counter.initial = Some(expr(ExprKind::GenericInt(7)));
    ast.add_global(counter);

    ast.add_func(main_func(vec![]));

    let module = compile(&mut ast);

    // The init function stores the counter's initial value
    let init_ir = module.init_func_id.expect("module init emitted");
    let init_stores = instructions_of(&module, init_ir)
        .iter()
        .any(|instr| matches!(instr, Instr::Store { .. }));
    assert!(init_stores, "global initializer stored during module init");

    // The deinit function defers the global resource and then
    // deinitializes statics
    let deinit_ir = module.deinit_func_id.expect("module deinit emitted");
    let defer_ir = ir_func_id_of(&module, res_defer);

    let deinit_instrs = instructions_of(&module, deinit_ir);
    let defers_resource = deinit_instrs
        .iter()
        .any(|instr| matches!(instr, Instr::Call { ir_func_id, .. } if *ir_func_id == defer_ir));
    assert!(defers_resource, "__defer__ invoked on globals at deinit");

    let deinits_svars = deinit_instrs
        .iter()
        .any(|instr| matches!(instr, Instr::DeinitSvars));
    assert!(deinits_svars);
}
