// End-to-end middle-end scenarios driven over hand-built ASTs

use adept_ast::{
    Ast, Composite, Expr, ExprKind, Field, Func, FuncTraits, Param, Type,
};
use adept_diagnostics::{Diagnostics, Source};
use adept_ir::{Instr, IrModule, Trilean, ValueKind};
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

fn void_func(name: &str, params: Vec<Param>) -> Func {
    Func::new(name, params, Type::base("void"))
}

fn main_func(statements: Vec<Expr>) -> Func {
    let mut func = void_func("main", vec![]);
    func.traits |= FuncTraits::MAIN;
    func.statements = statements;
    func
}

fn compile(ast: &mut Ast) -> (IrModule, Diagnostics) {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = CompilerConfig::default();
    let mut diagnostics = Diagnostics::default();
    let module = ir_gen(&config, ast, &mut diagnostics)
        .unwrap_or_else(|error| panic!("{}: {:#?}", error, diagnostics.diagnostics()));
    (module, diagnostics)
}

fn ir_func_id_of(module: &IrModule, ast_func_id: usize) -> usize {
    module
        .funcs
        .iter()
        .position(|func| func.ast_func_id == ast_func_id)
        .expect("IR function exists for AST function")
}

fn calls_of(module: &IrModule, ir_func_id: usize) -> Vec<usize> {
    module.funcs[ir_func_id]
        .basicblocks
        .iter()
        .flat_map(|block| block.instructions.iter())
        .filter_map(|instr| match instr {
            Instr::Call { ir_func_id, .. } => Some(*ir_func_id),
            _ => None,
        })
        .collect()
}

// Scenario: overload with implicit widening (the two-pass gate).
// The unsuffixed literal must pick f(int) in the strict pass; the loose
// pass (which would admit f(double) too) is never consulted.
#[test]
fn test_overload_with_implicit_widening() {
    let mut ast = Ast::new();
    let f_int = ast.add_func(void_func("f", vec![Param::new("x", Type::base("int"))]));
    let _f_double = ast.add_func(void_func("f", vec![Param::new("x", Type::base("double"))]));
    let main = ast.add_func(main_func(vec![call("f", vec![expr(ExprKind::GenericInt(3))])]));

    let (module, _) = compile(&mut ast);

    let main_calls = calls_of(&module, ir_func_id_of(&module, main));
    assert_eq!(main_calls, vec![ir_func_id_of(&module, f_int)]);
}

// Scenario: polymorph memoization. Two instantiation requests with the
// same catalog share one concrete function.
#[test]
fn test_polymorph_memoization() {
    let mut ast = Ast::new();

    let mut id_template = Func::new(
        "id",
        vec![Param::new("x", Type::polymorph("T"))],
        Type::polymorph("T"),
    );
    id_template.traits |= FuncTraits::POLYMORPHIC;
    id_template.statements = vec![expr(ExprKind::Return {
        value: Some(Expr::boxed(ExprKind::Variable("x".into()), Source::NONE)),
        last_minute: vec![],
    })];
    let template = ast.add_func(id_template);

    let main = ast.add_func(main_func(vec![
        call("id", vec![expr(ExprKind::GenericInt(3))]),
        call("id", vec![expr(ExprKind::GenericInt(3))]),
        call("id", vec![expr(ExprKind::GenericFloat(3.0))]),
    ]));

    let (module, _) = compile(&mut ast);

    let concretes: Vec<usize> = ast
        .funcs
        .iter()
        .enumerate()
        .filter(|(_, func)| func.origin == Some(template))
        .map(|(id, _)| id)
        .collect();
    assert_eq!(concretes.len(), 2, "exactly two distinct instantiations");

    let main_calls = calls_of(&module, ir_func_id_of(&module, main));
    assert_eq!(main_calls.len(), 3);
    assert_eq!(main_calls[0], main_calls[1], "id(3) calls share one endpoint");
    assert_ne!(main_calls[0], main_calls[2], "id(3.0) uses its own instantiation");
}

// Scenario: autogenerated __defer__ chain. Outer's synthesized defer
// calls Inner's user defer on fields a and b in declaration order, and
// the SF cache records both lookups as present.
#[test]
fn test_autogen_defer_chain() {
    let mut ast = Ast::new();

    ast.add_composite(Composite::new(
        "Handle",
        vec![Field::new("value", Type::base("int"))],
    ));
    ast.add_composite(Composite::new(
        "Inner",
        vec![Field::new("x", Type::base("Handle").pointer_to())],
    ));
    ast.add_composite(Composite::new(
        "Outer",
        vec![
            Field::new("a", Type::base("Inner")),
            Field::new("b", Type::base("Inner")),
        ],
    ));

    let inner_defer = ast.add_func(void_func(
        "__defer__",
        vec![Param::new("this", Type::base("Inner").pointer_to())],
    ));

    let _main = ast.add_func(main_func(vec![declare("o", Type::base("Outer"))]));

    let (module, _) = compile(&mut ast);

    // The SF cache reports deference for both composites
    let inner_entry = module
        .sf_cache
        .locate(&Type::base("Inner"))
        .expect("Inner cached");
    assert!(matches!(inner_entry.defer, Trilean::Present(_)));

    let outer_entry = module
        .sf_cache
        .locate(&Type::base("Outer"))
        .expect("Outer cached");
    let Trilean::Present(outer_pair) = outer_entry.defer else {
        panic!("expected an autogenerated __defer__ for Outer");
    };

    let outer_func = &ast.funcs[outer_pair.ast_func_id];
    assert!(outer_func.traits.contains(FuncTraits::AUTOGEN));
    assert_eq!(outer_func.name, "__defer__");

    // The autogenerated body calls Inner.__defer__ once per field, in
    // declaration order
    let inner_defer_ir = ir_func_id_of(&module, inner_defer);
    let body_calls = calls_of(&module, outer_pair.ir_func_id);
    assert_eq!(body_calls, vec![inner_defer_ir, inner_defer_ir]);

    let member_indices: Vec<usize> = module.funcs[outer_pair.ir_func_id]
        .basicblocks
        .iter()
        .flat_map(|block| block.instructions.iter())
        .filter_map(|instr| match instr {
            Instr::Member { member_index, .. } => Some(*member_index),
            _ => None,
        })
        .collect();
    assert_eq!(member_indices, vec![0, 1], "fields deferred in order");
}

// Scenario: vtable override. Dog's dispatch slot for speak points at
// Dog.speak, and the dispatched call goes through the dispatcher.
#[test]
fn test_vtable_override() {
    let mut ast = Ast::new();

    let mut animal = Composite::new("Animal", vec![]);
    animal.is_class = true;
    ast.add_composite(animal);

    let mut dog = Composite::new("Dog", vec![]);
    dog.is_class = true;
    dog.parent = Some(Type::base("Animal"));
    ast.add_composite(dog);

    let mut speak_virtual = void_func(
        "speak",
        vec![Param::new("this", Type::base("Animal").pointer_to())],
    );
    speak_virtual.traits |= FuncTraits::VIRTUAL;
    let _virtual_id = ast.add_func(speak_virtual);

    let mut speak_override = void_func(
        "speak",
        vec![Param::new("this", Type::base("Dog").pointer_to())],
    );
    speak_override.traits |= FuncTraits::OVERRIDE;
    let override_id = ast.add_func(speak_override);

    let main = ast.add_func(main_func(vec![
        declare("d", Type::base("Dog")),
        expr(ExprKind::CallMethod {
            subject: Expr::boxed(ExprKind::Variable("d".into()), Source::NONE),
            name: "speak".into(),
            args: vec![],
            is_tentative: false,
            gives: None,
        }),
    ]));

    let (module, _) = compile(&mut ast);

    // Dog's finalized table has one slot pointing at Dog.speak
    let dog_table = module
        .vtable_init_list
        .iter()
        .find(|init| adept_ast::types_identical(&init.signature, &Type::base("Dog")))
        .expect("Dog vtable emitted");

    let ValueKind::ConstStructLiteral { values } = &dog_table.table.kind else {
        panic!("finalized table must be a (length, entries) object");
    };
    let ValueKind::ConstAnonGlobal { anon_global_id } = &values[1].kind else {
        panic!("table entries live in a constant anonymous global");
    };

    let entries = module.anon_globals[*anon_global_id]
        .initializer
        .as_ref()
        .expect("entries initializer");
    let ValueKind::ArrayLiteral { values: slots } = &entries.kind else {
        panic!("entries are an array literal");
    };

    assert_eq!(slots.len(), 1);
    let override_ir = ir_func_id_of(&module, override_id);
    assert_eq!(
        slots[0].kind,
        ValueKind::FuncAddr { ir_func_id: override_ir }
    );

    // The call in main goes through the generated dispatcher, which
    // reads slot 0
    let dispatcher_id = ast.funcs[_virtual_id]
        .virtual_dispatcher
        .expect("virtual got a dispatcher");
    let dispatcher_ir = ir_func_id_of(&module, dispatcher_id);

    let main_calls = calls_of(&module, ir_func_id_of(&module, main));
    assert_eq!(main_calls, vec![dispatcher_ir]);

    assert!(module
        .vtable_dispatch_list
        .iter()
        .any(|dispatch| dispatch.ir_func_id == dispatcher_ir && dispatch.index == 0));
}

// Scenario: RTTI ordering. Two distinct types mentioned, indices stable
// in first-insertion order, all three uses resolve consistently.
#[test]
fn test_rtti_ordering() {
    let mut ast = Ast::new();

    let _main = ast.add_func(main_func(vec![
        expr(ExprKind::Typeinfo { ty: Type::base("int") }),
        expr(ExprKind::Typeinfo {
            ty: Type::base("ubyte").pointer_to(),
        }),
        expr(ExprKind::Typeinfo { ty: Type::base("int") }),
    ]));

    let (module, _) = compile(&mut ast);

    let collector = module.rtti_collector.as_ref().expect("rtti enabled");
    assert_eq!(collector.len(), 2);
    assert_eq!(collector.index_of(&Type::base("int")), Some(0));
    assert_eq!(collector.index_of(&Type::base("ubyte").pointer_to()), Some(1));

    assert_eq!(module.rtti_slots, vec![0, 1, 0]);

    // Every relocation's slot holds the index its key was assigned
    assert_eq!(module.rtti_relocations.len(), 3);
    for relocation in &module.rtti_relocations {
        let expected = match relocation.human_notation.as_str() {
            "int" => 0,
            "*ubyte" => 1,
            other => panic!("unexpected relocation key '{}'", other),
        };
        assert_eq!(module.rtti_slots[relocation.slot], expected);
    }
}

// Scenario: no-discard enforcement. Discarding the result of a
// NO_DISCARD function is a compile error.
#[test]
fn test_no_discard_enforcement() {
    let mut ast = Ast::new();

    let mut compute = Func::new("compute", vec![], Type::base("int"));
    compute.traits |= FuncTraits::NO_DISCARD;
    compute.statements = vec![expr(ExprKind::Return {
        value: Some(Expr::boxed(ExprKind::GenericInt(42), Source::NONE)),
        last_minute: vec![],
    })];
    ast.add_func(compute);

    ast.add_func(main_func(vec![call("compute", vec![])]));

    let config = CompilerConfig::default();
    let mut diagnostics = Diagnostics::default();
    let result = ir_gen(&config, &mut ast, &mut diagnostics);

    assert!(result.is_err(), "module compilation must fail");
    assert!(diagnostics.diagnostics().iter().any(|diagnostic| {
        diagnostic
            .message
            .contains("Not allowed to discard value returned from 'compute'")
    }));
}

// Invariant: after pass driver completion the job list is exhausted and
// every IR function has a body or is foreign.
#[test]
fn test_job_list_exhaustion() {
    let mut ast = Ast::new();

    let mut printf = Func::new(
        "printf",
        vec![Param::new("format", Type::base("ubyte").pointer_to())],
        Type::base("int"),
    );
    printf.traits |= FuncTraits::FOREIGN | FuncTraits::VARARG;
    ast.add_func(printf);

    ast.add_func(main_func(vec![call(
        "printf",
        vec![expr(ExprKind::CStr("hi\n".into()))],
    )]));

    let (module, _) = compile(&mut ast);

    assert_eq!(module.job_list.outstanding(), 0);
    for func in &module.funcs {
        assert!(
            func.has_body() || func.traits.contains(adept_ir::IrFuncTraits::IS_FOREIGN),
            "function '{}' has neither body nor foreign trait",
            func.name
        );
    }
}

// Invariant: resolver determinism. The same module state and query
// resolve to the same endpoints every time.
#[test]
fn test_resolver_determinism() {
    fn build() -> (Ast, usize) {
        let mut ast = Ast::new();
        ast.add_func(void_func("g", vec![Param::new("x", Type::base("int"))]));
        ast.add_func(void_func("g", vec![Param::new("x", Type::base("long"))]));
        ast.add_func(void_func("g", vec![Param::new("x", Type::base("double"))]));
        let main = ast.add_func(main_func(vec![
            call("g", vec![expr(ExprKind::GenericInt(1))]),
            call("g", vec![expr(ExprKind::GenericFloat(1.5))]),
        ]));
        (ast, main)
    }

    let (mut first_ast, first_main) = build();
    let (first_module, _) = compile(&mut first_ast);
    let first = calls_of(&first_module, ir_func_id_of(&first_module, first_main));

    let (mut second_ast, second_main) = build();
    let (second_module, _) = compile(&mut second_ast);
    let second = calls_of(&second_module, ir_func_id_of(&second_module, second_main));

    assert_eq!(first, second);
}
