//! Whole-pipeline translation tests: Angel source in, C++ text out.

use angel::compile_string;
use angel::errors::Error;

#[test]
fn test_hello_world() {
    let cpp = compile_string("print(\"Hello, world!\")", true).unwrap();
    assert!(cpp.contains("int main()"));
    assert!(cpp.contains("__print(std::string(\"Hello, world!\"))"));
    assert!(cpp.contains("#include <iostream>"));
    assert!(cpp.contains("return 0;"));
}

#[test]
fn test_declarations_use_fast_integer_types() {
    let cpp = compile_string("let x = 5\nvar big = 100000\n", true).unwrap();
    assert!(cpp.contains("std::int_fast8_t"));
    assert!(cpp.contains("std::int_fast32_t"));
    assert!(cpp.contains("#include <cstdint>"));
}

#[test]
fn test_mangled_names_carry_the_unit_hash() {
    let source = "let value = 1";
    let hash = angel::utils::get_hash(source);
    let cpp = compile_string(source, true).unwrap();
    assert!(cpp.contains(&format!("angel_{hash}_value")));
    // REPL sessions keep user-visible names stable.
    let unmangled = compile_string(source, false).unwrap();
    assert!(unmangled.contains(" value = 1"));
}

#[test]
fn test_struct_translation() {
    let source = "struct Point:\n    x: I32\n    y: I32\n\nlet p = Point(1, 2)\nprint(p.x)\n";
    let cpp = compile_string(source, true).unwrap();
    assert!(cpp.contains("struct"));
    // The synthesized constructor assigns both fields.
    assert!(cpp.contains("this->"));
    assert!(cpp.contains("__print"));
}

#[test]
fn test_special_methods_become_operators() {
    let source = "struct V2:\n    x: I32\n    fun __add__(other: V2) -> V2:\n        return V2(self.x + other.x)\n    fun __eq__(other: V2) -> Bool:\n        return self.x == other.x\n    fun as() -> String:\n        return \"v2\"\n";
    let cpp = compile_string(source, true).unwrap();
    assert!(cpp.contains("operator+"));
    assert!(cpp.contains("operator=="));
    assert!(cpp.contains("operator std::string()"));
}

#[test]
fn test_optionals_and_if_let() {
    let source = "let opt: I8? = Optional.Some(1)\nif let v = opt:\n    print(v)\n";
    let cpp = compile_string(source, true).unwrap();
    assert!(cpp.contains("std::optional<std::int_fast8_t>"));
    assert!(cpp.contains("has_value()"));
    assert!(cpp.contains(".value()"));
}

#[test]
fn test_optional_none_is_nullopt() {
    let cpp = compile_string("let opt: I8? = Optional.None", true).unwrap();
    assert!(cpp.contains("std::nullopt"));
}

#[test]
fn test_vectors_and_loops() {
    let source = "var v = [1, 2, 3]\nfor n in v:\n    print(n)\nv.append(4)\n";
    let cpp = compile_string(source, true).unwrap();
    assert!(cpp.contains("std::vector"));
    assert!(cpp.contains("for (const auto&"));
    assert!(cpp.contains("push_back"));
}

#[test]
fn test_string_split_uses_the_helper() {
    let source = "let parts = \"a,b\".split(',')\n";
    let cpp = compile_string(source, true).unwrap();
    assert!(cpp.contains("__string_split_char"));
    assert!(cpp.contains("std::vector<std::string> __string_split_char"));
}

#[test]
fn test_read_emits_the_helper() {
    let cpp = compile_string("let name = read(\"? \")", true).unwrap();
    assert!(cpp.contains("std::string __read(const std::string& prompt)"));
}

#[test]
fn test_functions_and_generics() {
    let source = "fun twice(n: I64) -> I64:\n    return n + n\n\nfun same<T>(a: T) -> T:\n    return a\n\nprint(twice(21))\n";
    let cpp = compile_string(source, true).unwrap();
    assert!(cpp.contains("std::int_fast64_t"));
    assert!(cpp.contains("template <typename"));
}

#[test]
fn test_algebraic_types_become_variants() {
    let source = "algebraic Shape:\n    struct Circle:\n        radius: I64\n    struct Square:\n        side: I64\n\nlet c = Shape.Circle(3)\nprint(c.radius)\n";
    let cpp = compile_string(source, true).unwrap();
    assert!(cpp.contains("std::variant<"));
    assert!(cpp.contains("_a_"));
    assert!(cpp.contains("#include <variant>"));
}

#[test]
fn test_while_and_compound_assignment() {
    let source = "var i = 0\nwhile i < 3:\n    i += 1\nprint(i)\n";
    let cpp = compile_string(source, true).unwrap();
    assert!(cpp.contains("while ("));
    // Compound assignment was rewritten before emission.
    assert!(cpp.contains("= (") || cpp.contains("= i") || cpp.contains("+ 1"));
}

#[test]
fn test_errors_abort_with_the_source_excerpt() {
    let error = compile_string("let x: U8 = 300", true).unwrap_err();
    let rendered = error.to_string();
    assert!(rendered.starts_with("Type Error:"));
    assert!(rendered.contains("let x: U8 = 300"));
    assert!(rendered.contains("possible types:"));
}

#[test]
fn test_syntax_errors_come_from_the_parser() {
    let error = compile_string("struct :", true).unwrap_err();
    assert!(matches!(error, Error::SyntaxError { .. }));
}

#[test]
fn test_interfaces_emit_nothing_but_still_check() {
    let source = "interface HasX:\n    x: I32\n\nstruct P is HasX:\n    x: I32\n\nlet p = P(1)\n";
    let cpp = compile_string(source, true).unwrap();
    assert!(!cpp.contains("HasX"));
    let bad = "interface HasX:\n    x: I32\n\nstruct P is HasX:\n    y: I32\n";
    assert!(matches!(
        compile_string(bad, true),
        Err(Error::MissingInterfaceMember { .. })
    ));
}

#[test]
fn test_extension_methods_merge_into_the_struct() {
    let source = "struct P:\n    x: I32\n\nextension P:\n    fun doubled() -> I32:\n        return self.x * 2\n\nlet p = P(2)\nprint(p.doubled())\n";
    let cpp = compile_string(source, true).unwrap();
    assert!(cpp.contains("doubled"));
    // The method body landed inside the struct definition.
    let struct_start = cpp.find("struct").unwrap();
    let method_position = cpp.find("doubled").unwrap();
    assert!(method_position > struct_start);
}
