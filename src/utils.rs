use md5::{Digest, Md5};

use crate::ast::Name;
use crate::context::Context;

/// First 6 hex digits of the MD5 of the whole compilation unit. Mangled
/// names are a pure function of this hash and the original spelling.
pub fn get_hash(source: &str) -> String {
    let mut md5 = Md5::new();
    md5.update(source.as_bytes());
    let digest = md5.finalize();
    let mut hex = String::with_capacity(6);
    for byte in digest.iter().take(3) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// `name` -> `angel_<hash>_<name>`, remembering the unmangled spelling.
/// Disabled session-wide in REPL mode so user-visible names stay stable.
pub fn mangle(name: Name, context: &Context) -> Name {
    assert!(name.module.is_none(), "module system is not supported");
    if context.mangle_names {
        Name::mangled(
            format!("angel_{}_{}", context.main_hash, name.member),
            name.member,
        )
    } else {
        name
    }
}

/// Mangling rule for member names inside declarations; same function of
/// `(hash, name)` as `mangle`.
pub fn submangle(name: Name, context: &Context) -> Name {
    mangle(name, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_first_six_md5_hex_digits() {
        // md5("abc") = 900150983cd24fb0d6963f7d28e17f72
        assert_eq!(get_hash("abc"), "900150");
        assert_eq!(get_hash(""), "d41d8c");
    }

    #[test]
    fn test_mangle_roundtrip() {
        let context = Context::new("let x = 1", "abc123", true);
        let mangled = mangle(Name::new("x"), &context);
        assert_eq!(mangled.member, "angel_abc123_x");
        assert_eq!(mangled.unmangled.as_deref(), Some("x"));
    }

    #[test]
    fn test_mangle_disabled_in_repl() {
        let context = Context::new("let x = 1", "", false);
        let name = mangle(Name::new("x"), &context);
        assert_eq!(name.member, "x");
        assert!(name.unmangled.is_none());
    }
}
