//! Angel compiler library: parse -> clarify -> analyze -> translate.
//!
//! The pipeline is a pure AST-to-AST transformer wrapped by two thin
//! drivers: file compilation (translate a whole unit to C++) and the REPL
//! (analyze and estimate one input at a time against a persistent
//! environment).

pub mod analysis;
pub mod ast;
pub mod clarification;
pub mod constants;
pub mod context;
pub mod emitter;
pub mod environment;
pub mod errors;
pub mod estimation;
pub mod parser;
pub mod repl;
pub mod typechecking;
pub mod utils;

use log::info;

use crate::analysis::Analyzer;
use crate::ast::Ast;
use crate::clarification::Clarifier;
use crate::context::Context;
use crate::errors::Result;
use crate::estimation::value::Value;
use crate::parser::Parser;

/// Parse and clarify a compilation unit, mangling names unless the caller
/// is a REPL session.
pub fn parse_and_clarify(source: &str, mangle_names: bool) -> Result<Ast> {
    let hash = utils::get_hash(source);
    let context = Context::new(source, hash, mangle_names);
    let ast = Parser::new().parse(source)?;
    Ok(Clarifier::new(&context).clarify_ast(ast))
}

/// Translate Angel source into C++ and return the generated text.
pub fn compile_string(source: &str, mangle_names: bool) -> Result<String> {
    let hash = utils::get_hash(source);
    let context = Context::new(source, hash, mangle_names);
    let ast = Parser::new().parse(source)?;
    info!("parsed {} top-level nodes", ast.len());
    let clarified = Clarifier::new(&context).clarify_ast(ast);
    let mut analyzer = Analyzer::new(context);
    let analyzed = analyzer.analyze_ast(clarified)?;
    info!("analysis finished, emitting");
    emitter::generate_cpp(&analyzed)
}

/// Evaluate one REPL input against the analyzer's persistent environment
/// and return the estimated value, if the input produced one.
pub fn repl_eval(source: &str, analyzer: &mut Analyzer) -> Result<Option<Value>> {
    let context = Context::new(source, "", false);
    let ast = Parser::new().parse(source)?;
    let clarified = Clarifier::new(&context).clarify_ast(ast);
    analyzer.context = context;
    let analyzed = analyzer.analyze_ast(clarified)?;
    analyzer.estimate_ast(&analyzed)
}
