//! Source-level AST: the closed algebra of types, expressions and
//! statements that the parser produces, the clarifier rewrites and the
//! analyzer annotates in place for the emitter.

mod expressions;
mod statements;
mod types;

pub use self::expressions::*;
pub use self::statements::*;
pub use self::types::*;
