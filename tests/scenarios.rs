//! End-to-end checker verdicts for small programs: declarations, range
//! errors, default init synthesis, interface conformance, generic
//! where-clauses and optional matching.

use angel::analysis::Analyzer;
use angel::ast::*;
use angel::context::Context;
use angel::errors::Error;

fn analyze(source: &str) -> Result<Ast, Error> {
    let ast = angel::parse_and_clarify(source, true)?;
    let hash = angel::utils::get_hash(source);
    let mut analyzer = Analyzer::new(Context::new(source, hash, true));
    analyzer.analyze_ast(ast)
}

#[test]
fn test_let_literal_gets_the_smallest_type() {
    let analyzed = analyze("let x = 5").unwrap();
    let Node::Decl(decl) = &analyzed[0] else {
        panic!("expected a declaration");
    };
    assert_eq!(decl.type_, Some(Type::Builtin(BuiltinType::I8)));
}

#[test]
fn test_out_of_range_annotation_is_a_type_error() {
    let error = analyze("let x: U8 = 300").unwrap_err();
    let Error::TypeError { message, .. } = error else {
        panic!("expected a type error");
    };
    assert_eq!(message, "300 is not in range [0; 255]");
}

#[test]
fn test_default_init_synthesis() {
    let analyzed = analyze("struct Point:\n    x: I32\n    y: I32\n").unwrap();
    let Node::StructDeclaration(declaration) = &analyzed[0] else {
        panic!("expected a struct declaration");
    };
    assert_eq!(declaration.init_declarations.len(), 1);
    let init = &declaration.init_declarations[0];
    let argument_names: Vec<&str> = init
        .arguments
        .iter()
        .map(|argument| argument.name.unmangled_or_member())
        .collect();
    assert_eq!(argument_names, vec!["x", "y"]);
    assert_eq!(init.arguments[0].type_, Type::Builtin(BuiltinType::I32));
    // The body assigns each public field from its argument.
    assert_eq!(init.body.len(), 2);
    for (node, field) in init.body.iter().zip(["x", "y"]) {
        let Node::Assignment { left, right, .. } = node else {
            panic!("expected an assignment");
        };
        let Expression::Field(assigned) = left else {
            panic!("expected a self field");
        };
        assert!(matches!(
            assigned.base,
            Expression::SpecialName(SpecialName::SelfName)
        ));
        assert_eq!(assigned.field.unmangled_or_member(), field);
        let Expression::Name(value) = right else {
            panic!("expected the argument name");
        };
        assert_eq!(value.unmangled_or_member(), field);
    }
}

#[test]
fn test_private_field_without_default_and_no_init() {
    let error = analyze("struct Conn:\n    _socket: I64\n").unwrap_err();
    assert!(matches!(
        error,
        Error::PrivateFieldsNotInitializedAndNoInit { .. }
    ));
}

#[test]
fn test_missing_interface_member() {
    let source = "interface I:\n    f: I32\n    fun g(a: I8) -> Bool\n\nstruct S is I:\n    f: I32\n";
    let error = analyze(source).unwrap_err();
    let Error::MissingInterfaceMember {
        subject,
        missing_member,
        ..
    } = error
    else {
        panic!("expected a missing interface member error");
    };
    assert_eq!(subject.unmangled_or_member(), "S");
    assert_eq!(missing_member.unmangled_or_member(), "g");
}

#[test]
fn test_satisfied_interface_implementation() {
    let source = "interface I:\n    f: I32\n    fun g(a: I8) -> Bool\n\n\
                  struct S is I:\n    f: I32\n    fun g(a: I8) -> Bool:\n        return True\n";
    analyze(source).unwrap();
}

#[test]
fn test_inherited_interface_members_are_required() {
    // S implements J, which inherits I's field; leaving it out names the
    // origin interface in the provenance slot.
    let source = "interface I:\n    f: I32\n\ninterface J is I:\n    g: I64\n\n\
                  struct S is J:\n    g: I64\n";
    let error = analyze(source).unwrap_err();
    let Error::MissingInterfaceMember {
        missing_member,
        inherited_from,
        ..
    } = error
    else {
        panic!("expected a missing interface member error");
    };
    assert_eq!(missing_member.unmangled_or_member(), "f");
    let Some(origin) = inherited_from else {
        panic!("expected inheritance provenance");
    };
    assert_eq!(origin.name().unwrap().unmangled_or_member(), "I");
}

#[test]
fn test_where_clause_accepts_subtractable_integers() {
    let source = "fun max<T>(a: T, b: T) -> T where T is Subtractable:\n    return a\n\n\
                  let m = max(1, 2)\n";
    let analyzed = analyze(source).unwrap();
    let Node::Decl(decl) = &analyzed[1] else {
        panic!("expected a declaration");
    };
    assert_eq!(decl.type_, Some(Type::Builtin(BuiltinType::I8)));
}

#[test]
fn test_where_clause_rejects_strings() {
    let source = "fun max<T>(a: T, b: T) -> T where T is Subtractable:\n    return a\n\n\
                  let m = max(\"a\", \"b\")\n";
    let error = analyze(source).unwrap_err();
    assert!(matches!(error, Error::UnsatisfiedWhereClause { .. }));
}

#[test]
fn test_constant_single_assignment() {
    // A constant declared without a value accepts exactly one write.
    analyze("let x: I8\nx = 5\n").unwrap();
    let error = analyze("let x: I8\nx = 5\nx = 6\n").unwrap_err();
    assert!(matches!(error, Error::ConstantReassignment { .. }));
    // A constant declared with a value accepts none.
    let error = analyze("let x = 1\nx = 2\n").unwrap_err();
    assert!(matches!(error, Error::ConstantReassignment { .. }));
    // Variables accept any number of unifiable writes.
    analyze("var y = 1\ny = 2\ny = 3\n").unwrap();
}

#[test]
fn test_optional_declaration_and_if_let_types() {
    let source = "let opt: I8? = Optional.Some(1)\nif let v = opt:\n    print(v)\n";
    let analyzed = analyze(source).unwrap();
    let Node::Decl(decl) = &analyzed[0] else {
        panic!("expected a declaration");
    };
    assert_eq!(
        decl.type_,
        Some(Type::Optional(Box::new(Type::Builtin(BuiltinType::I8))))
    );
    let Node::If { condition, .. } = &analyzed[1] else {
        panic!("expected an if statement");
    };
    let Expression::Decl(bound) = condition else {
        panic!("expected a let condition");
    };
    // Inside the branch the bound name has the inner type.
    assert_eq!(bound.type_, Some(Type::Builtin(BuiltinType::I8)));
}

#[test]
fn test_for_loop_over_iterables() {
    analyze("for c in \"abc\":\n    print(c)\n").unwrap();
    analyze("let v = [1, 2, 3]\nfor n in v:\n    print(n)\n").unwrap();
    let error = analyze("for n in 5:\n    print(n)\n").unwrap_err();
    assert!(matches!(error, Error::TypeError { .. }));
}

#[test]
fn test_compound_assignment_rewrite() {
    let analyzed = analyze("var x = 1\nx += 2\n").unwrap();
    let Node::Assignment {
        operator, right, ..
    } = &analyzed[1]
    else {
        panic!("expected an assignment");
    };
    assert_eq!(*operator, Operator::Assign);
    let Expression::BinaryExpression(binary) = right else {
        panic!("expected the rewritten binary expression");
    };
    assert_eq!(binary.operator, Operator::Add);
}

#[test]
fn test_division_by_zero_is_caught_during_estimation() {
    let error = analyze("let x = 1 / 0").unwrap_err();
    assert_eq!(error, Error::DivByZero);
}

#[test]
fn test_wrong_arguments_lists_the_candidates() {
    let source = "struct Point:\n    x: I32\n    y: I32\n\nlet p = Point(1, 2, 3)\n";
    let error = analyze(source).unwrap_err();
    let Error::WrongArguments {
        expected,
        got_arguments,
        ..
    } = error
    else {
        panic!("expected a wrong arguments error");
    };
    assert!(expected.contains("I32"));
    assert_eq!(got_arguments.len(), 3);
}

#[test]
fn test_noncallable_call() {
    let error = analyze("let x = 1\nlet y = x()\n").unwrap_err();
    assert!(matches!(error, Error::NoncallableCall { .. }));
}

#[test]
fn test_undefined_name() {
    let error = analyze("let x = ghost").unwrap_err();
    let Error::NameError { name, .. } = error else {
        panic!("expected a name error");
    };
    assert_eq!(name.unmangled_or_member(), "ghost");
}

#[test]
fn test_reanalysis_is_idempotent() {
    let source = "struct Point:\n    x: I32\n    y: I32\n\n\
                  fun shift(p: Point, d: I32) -> Point:\n    return Point(p.x + d, p.y + d)\n\n\
                  let p = shift(Point(1, 2), 3)\n";
    let first = analyze(source).unwrap();
    let hash = angel::utils::get_hash(source);
    let mut analyzer = Analyzer::new(Context::new(source, hash, true));
    let second = analyzer.analyze_ast(first.clone()).unwrap();
    assert_eq!(first, second);
}
