//! Immutable builtin catalogue, built once per thread at first use. The
//! compiler is single-threaded (one session owns one environment), so the
//! catalogue lives in a thread-local `Lazy`.

use indexmap::IndexMap;
use once_cell::unsync::Lazy;

use crate::ast::{Argument, BuiltinType, Interface, Name, SpecialMethod, Type};
use crate::environment::entries::{FunctionEntry, InterfaceEntry};

pub const SELF_NAME: &str = "self";

/// Line number used for compiler-introduced nodes.
pub const SPEC_LINE: usize = 0;

fn interface_method(name: &str, arguments: Vec<Argument>, return_type: Type) -> FunctionEntry {
    FunctionEntry {
        line: 0,
        name: Name::new(name),
        parameters: vec![],
        arguments,
        return_type,
        body: vec![],
        where_clauses: vec![],
        saved_environment: vec![],
    }
}

fn interface_entry(
    builtin: BuiltinType,
    parents: Vec<Interface>,
    methods: Vec<(&str, FunctionEntry)>,
    inherited_methods: Vec<(&str, BuiltinType, FunctionEntry)>,
) -> InterfaceEntry {
    InterfaceEntry {
        line: 0,
        name: Interface::Builtin(builtin),
        parameters: vec![],
        implemented_interfaces: parents,
        fields: IndexMap::new(),
        methods: methods
            .into_iter()
            .map(|(name, entry)| (name.to_owned(), entry))
            .collect(),
        inherited_fields: IndexMap::new(),
        inherited_methods: inherited_methods
            .into_iter()
            .map(|(name, from, entry)| (name.to_owned(), (Interface::Builtin(from), entry)))
            .collect(),
    }
}

fn self_binary_method(method: SpecialMethod, return_type: BuiltinType) -> FunctionEntry {
    interface_method(
        method.as_str(),
        vec![Argument::new("other", Type::Builtin(BuiltinType::SelfType))],
        Type::Builtin(return_type),
    )
}

fn build_builtin_interfaces() -> IndexMap<BuiltinType, InterfaceEntry> {
    let mut catalogue = IndexMap::new();

    catalogue.insert(
        BuiltinType::ConvertibleToString,
        interface_entry(
            BuiltinType::ConvertibleToString,
            vec![],
            vec![(
                SpecialMethod::As.as_str(),
                interface_method(
                    SpecialMethod::As.as_str(),
                    vec![],
                    Type::Builtin(BuiltinType::String),
                ),
            )],
            vec![],
        ),
    );

    catalogue.insert(
        BuiltinType::Object,
        interface_entry(BuiltinType::Object, vec![], vec![], vec![]),
    );

    let arithmetic = [
        (BuiltinType::Addable, SpecialMethod::Add),
        (BuiltinType::Subtractable, SpecialMethod::Sub),
        (BuiltinType::Multipliable, SpecialMethod::Mul),
        (BuiltinType::Divisible, SpecialMethod::Div),
    ];
    for (builtin, method) in arithmetic {
        catalogue.insert(
            builtin,
            interface_entry(
                builtin,
                vec![],
                vec![(
                    method.as_str(),
                    self_binary_method(method, BuiltinType::SelfType),
                )],
                vec![],
            ),
        );
    }

    catalogue.insert(
        BuiltinType::ArithmeticObject,
        interface_entry(
            BuiltinType::ArithmeticObject,
            arithmetic
                .iter()
                .map(|(builtin, _)| Interface::Builtin(*builtin))
                .collect(),
            vec![],
            arithmetic
                .iter()
                .map(|(builtin, method)| {
                    (
                        method.as_str(),
                        *builtin,
                        self_binary_method(*method, BuiltinType::SelfType),
                    )
                })
                .collect(),
        ),
    );

    catalogue.insert(
        BuiltinType::Eq,
        interface_entry(
            BuiltinType::Eq,
            vec![],
            vec![(
                SpecialMethod::Eq.as_str(),
                self_binary_method(SpecialMethod::Eq, BuiltinType::Bool),
            )],
            vec![],
        ),
    );

    catalogue.insert(
        BuiltinType::Iterable,
        interface_entry(BuiltinType::Iterable, vec![], vec![], vec![]),
    );

    for builtin in [
        BuiltinType::ConvertibleToI8,
        BuiltinType::ConvertibleToI16,
        BuiltinType::ConvertibleToI32,
        BuiltinType::ConvertibleToI64,
        BuiltinType::ConvertibleToU8,
        BuiltinType::ConvertibleToU16,
        BuiltinType::ConvertibleToU32,
        BuiltinType::ConvertibleToU64,
    ] {
        catalogue.insert(builtin, interface_entry(builtin, vec![], vec![], vec![]));
    }

    catalogue
}

thread_local! {
    static BUILTIN_INTERFACES: Lazy<IndexMap<BuiltinType, InterfaceEntry>> =
        Lazy::new(build_builtin_interfaces);
}

/// Entry for a builtin interface, or `None` for builtins that are not
/// interfaces.
pub fn builtin_interface_entry(builtin: BuiltinType) -> Option<InterfaceEntry> {
    BUILTIN_INTERFACES.with(|catalogue| catalogue.get(&builtin).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_object_inherits_operator_methods() {
        let entry = builtin_interface_entry(BuiltinType::ArithmeticObject).unwrap();
        for method in ["__add__", "__sub__", "__mul__", "__div__"] {
            assert!(entry.inherited_methods.contains_key(method), "{method}");
        }
    }

    #[test]
    fn test_non_interface_builtins_have_no_entry() {
        assert!(builtin_interface_entry(BuiltinType::I8).is_none());
        assert!(builtin_interface_entry(BuiltinType::Void).is_none());
    }
}
