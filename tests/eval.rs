//! REPL-style evaluation: statements run against a persistent
//! environment with captured output and scripted input.

use angel::analysis::Analyzer;
use angel::context::Context;
use angel::errors::Error;
use angel::repl_eval;

fn eval(lines: &[&str]) -> Result<Vec<String>, Error> {
    eval_with_input(lines, &[])
}

fn eval_with_input(lines: &[&str], input: &[&str]) -> Result<Vec<String>, Error> {
    let mut analyzer = Analyzer::new(Context::default()).repl_mode();
    let output = analyzer.capture_output();
    analyzer.script_input(input.iter().map(|line| line.to_string()));
    repl_eval(&lines.join("\n"), &mut analyzer)?;
    let collected = output.borrow().clone();
    Ok(collected)
}

#[test]
fn test_integer_literal() {
    assert_eq!(eval(&["print(123)"]).unwrap(), vec!["123"]);
}

#[test]
fn test_string_literal() {
    assert_eq!(
        eval(&["print(\"Hello, world!\")"]).unwrap(),
        vec!["Hello, world!"]
    );
}

#[test]
fn test_bool_literals() {
    assert_eq!(eval(&["print(True)"]).unwrap(), vec!["True"]);
    assert_eq!(eval(&["print(False)"]).unwrap(), vec!["False"]);
    assert_eq!(eval(&["print(2 == 2)"]).unwrap(), vec!["True"]);
}

#[test]
fn test_arithmetic_narrows_and_widens() {
    assert_eq!(eval(&["print(2 + 3)"]).unwrap(), vec!["5"]);
    assert_eq!(eval(&["print(100 * 100)"]).unwrap(), vec!["10000"]);
    // Integer division truncates toward zero.
    assert_eq!(eval(&["print(7 / 2)"]).unwrap(), vec!["3"]);
    assert_eq!(eval(&["print(0 - 7 / 2)"]).unwrap(), vec!["-3"]);
}

#[test]
fn test_names_keep_their_values() {
    let output = eval(&["let a = \"lol\"", "print(a)"]).unwrap();
    assert_eq!(output, vec!["lol"]);
}

#[test]
fn test_read_uses_scripted_input() {
    let output = eval_with_input(
        &["let name = read(\"? \")", "print(name)"],
        &["angel"],
    )
    .unwrap();
    assert_eq!(output, vec!["angel"]);
}

#[test]
fn test_function_call_evaluates_the_body() {
    let output = eval(&[
        "fun add(a: I8, b: I8) -> I8:",
        "    return a + b",
        "print(add(1, 2))",
    ])
    .unwrap();
    assert_eq!(output, vec!["3"]);
}

#[test]
fn test_recursive_function() {
    let output = eval(&[
        "fun fib(n: I64) -> I64:",
        "    if n < 2:",
        "        return n",
        "    return fib(n - 1) + fib(n - 2)",
        "print(fib(10))",
    ])
    .unwrap();
    assert_eq!(output, vec!["55"]);
}

#[test]
fn test_while_loop_with_reassignment() {
    let output = eval(&[
        "var i = 0",
        "while i < 3:",
        "    i = i + 1",
        "print(i)",
    ])
    .unwrap();
    assert_eq!(output, vec!["3"]);
}

#[test]
fn test_while_loop_break() {
    let output = eval(&[
        "var i = 0",
        "while True:",
        "    i = i + 1",
        "    if i == 2:",
        "        break",
        "print(i)",
    ])
    .unwrap();
    assert_eq!(output, vec!["2"]);
}

#[test]
fn test_for_loop_over_vector_and_string() {
    let output = eval(&["for n in [1, 2, 3]:", "    print(n)"]).unwrap();
    assert_eq!(output, vec!["1", "2", "3"]);
    let output = eval(&["for c in \"ab\":", "    print(c)"]).unwrap();
    assert_eq!(output, vec!["a", "b"]);
}

#[test]
fn test_struct_construction_and_field_access() {
    let output = eval(&[
        "struct Point:",
        "    x: I32",
        "    y: I32",
        "let p = Point(1, 2)",
        "print(p.x)",
        "print(p.y)",
    ])
    .unwrap();
    assert_eq!(output, vec!["1", "2"]);
}

#[test]
fn test_method_call_on_instance() {
    let output = eval(&[
        "struct Counter:",
        "    value: I64",
        "    fun next() -> I64:",
        "        return self.value + 1",
        "let c = Counter(41)",
        "print(c.next())",
    ])
    .unwrap();
    assert_eq!(output, vec!["42"]);
}

#[test]
fn test_special_method_dispatch() {
    let output = eval(&[
        "struct V2:",
        "    x: I32",
        "    y: I32",
        "    fun __add__(other: V2) -> V2:",
        "        return V2(self.x + other.x, self.y + other.y)",
        "let a = V2(1, 2)",
        "let b = V2(3, 4)",
        "let c = a + b",
        "print(c.x)",
        "print(c.y)",
    ])
    .unwrap();
    assert_eq!(output, vec!["4", "6"]);
}

#[test]
fn test_string_builtin_fields() {
    let output = eval(&["print(\"a,b,c\".length)"]).unwrap();
    assert_eq!(output, vec!["5"]);
    let output = eval(&["let parts = \"a,b\".split(',')", "print(parts.length)"]).unwrap();
    assert_eq!(output, vec!["2"]);
}

#[test]
fn test_vector_append_mutates_the_binding() {
    let output = eval(&[
        "var v = [1]",
        "v.append(2)",
        "v.append(3)",
        "print(v.length)",
        "print(v[2])",
    ])
    .unwrap();
    assert_eq!(output, vec!["3", "3"]);
}

#[test]
fn test_dict_literal_and_subscript() {
    let output = eval(&[
        "let ages = [\"ada\": 36, \"alan\": 41]",
        "print(ages[\"alan\"])",
        "print(ages.length)",
    ])
    .unwrap();
    assert_eq!(output, vec!["41", "2"]);
}

#[test]
fn test_if_let_unwraps_the_optional() {
    let output = eval(&[
        "let opt: I8? = Optional.Some(1)",
        "if let v = opt:",
        "    print(v)",
    ])
    .unwrap();
    assert_eq!(output, vec!["1"]);
}

#[test]
fn test_if_let_skips_none() {
    let output = eval(&[
        "let opt: I8? = Optional.None",
        "if let v = opt:",
        "    print(v)",
        "else:",
        "    print(\"empty\")",
    ])
    .unwrap();
    assert_eq!(output, vec!["empty"]);
}

#[test]
fn test_while_let_rereads_the_optional() {
    let output = eval(&[
        "fun step(n: I64) -> I64?:",
        "    if n < 3:",
        "        return Optional.Some(n + 1)",
        "    return Optional.None",
        "var state = 0",
        "var opt = step(state)",
        "while let v = opt:",
        "    state = v",
        "    opt = step(state)",
        "print(state)",
    ])
    .unwrap();
    assert_eq!(output, vec!["3"]);
}

#[test]
fn test_algebraic_constructor_and_method() {
    let output = eval(&[
        "algebraic Shape:",
        "    struct Circle:",
        "        radius: I64",
        "    struct Square:",
        "        side: I64",
        "let c = Shape.Circle(3)",
        "print(c.radius)",
    ])
    .unwrap();
    assert_eq!(output, vec!["3"]);
}

#[test]
fn test_cast_to_string() {
    let output = eval(&["print(5 as String + \"!\")"]).unwrap();
    assert_eq!(output, vec!["5!"]);
}

#[test]
fn test_ref_value_follows_the_referent() {
    let output = eval(&["var x = 1", "let r = ref x", "print(r.value)"]).unwrap();
    assert_eq!(output, vec!["1"]);
}

#[test]
fn test_environment_persists_across_inputs() {
    let mut analyzer = Analyzer::new(Context::default()).repl_mode();
    let output = analyzer.capture_output();
    repl_eval("let a = 2", &mut analyzer).unwrap();
    repl_eval("print(a * a)", &mut analyzer).unwrap();
    assert_eq!(*output.borrow(), vec!["4"]);
}

#[test]
fn test_errors_carry_the_offending_line() {
    let mut analyzer = Analyzer::new(Context::default()).repl_mode();
    let error = repl_eval("let x = ghost", &mut analyzer).unwrap_err();
    let rendered = error.to_string();
    assert!(rendered.contains("Name Error"));
    assert!(rendered.contains("let x = ghost"));
}
