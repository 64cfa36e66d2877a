//! Per-compilation-unit context: the source lines for diagnostics, the
//! unit hash feeding name mangling, and the session-wide flag that
//! disables mangling in REPL mode.

#[derive(Clone, Debug)]
pub struct Context {
    pub lines: Vec<String>,
    pub main_hash: String,
    pub mangle_names: bool,
}

impl Context {
    pub fn new(source: &str, main_hash: impl Into<String>, mangle_names: bool) -> Context {
        Context {
            lines: source.lines().map(str::to_owned).collect(),
            main_hash: main_hash.into(),
            mangle_names,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context {
            lines: vec![],
            main_hash: String::new(),
            mangle_names: false,
        }
    }
}
