//! Semantic type representation used by the clarifier, the type checker and
//! the emitter. The variant set is closed: every dispatcher over types is an
//! exhaustive `match`, so adding a variant is a compile-time visible change.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::expressions::Expression;
use super::statements::Argument;
use crate::environment::SavedSpace;

/// A user-written identifier, possibly mangled. Equality ignores the
/// remembered unmangled spelling: two names are the same if module and
/// member agree.
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
pub struct Name {
    pub member: std::string::String,
    pub module: Option<std::string::String>,
    pub unmangled: Option<std::string::String>,
}

impl Name {
    pub fn new(member: impl Into<std::string::String>) -> Name {
        Name {
            member: member.into(),
            module: None,
            unmangled: None,
        }
    }

    pub fn mangled(member: impl Into<std::string::String>, unmangled: impl Into<std::string::String>) -> Name {
        Name {
            member: member.into(),
            module: None,
            unmangled: Some(unmangled.into()),
        }
    }

    /// The spelling the user wrote, preferred for diagnostics.
    pub fn unmangled_or_member(&self) -> &str {
        self.unmangled.as_deref().unwrap_or(&self.member)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.member == other.member && self.module == other.module
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.unmangled_or_member() == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.unmangled_or_member() == *other
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}#{}", module, self.unmangled_or_member()),
            None => f.write_str(self.unmangled_or_member()),
        }
    }
}

/// Builtin types and the fixed set of builtin interfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinType {
    I8,
    I16,
    I32,
    I64,
    Int,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Char,
    Bool,
    Void,
    SelfType,
    Object,
    ConvertibleToString,
    ConvertibleToI8,
    ConvertibleToI16,
    ConvertibleToI32,
    ConvertibleToI64,
    ConvertibleToU8,
    ConvertibleToU16,
    ConvertibleToU32,
    ConvertibleToU64,
    Addable,
    Subtractable,
    Multipliable,
    Divisible,
    ArithmeticObject,
    Eq,
    Iterable,
    /// Mentioned only in expressions (`Optional.Some`, `Optional.None`).
    Optional,
}

use BuiltinType::*;

impl BuiltinType {
    pub fn as_str(self) -> &'static str {
        match self {
            I8 => "I8",
            I16 => "I16",
            I32 => "I32",
            I64 => "I64",
            Int => "Int",
            U8 => "U8",
            U16 => "U16",
            U32 => "U32",
            U64 => "U64",
            F32 => "F32",
            F64 => "F64",
            String => "String",
            Char => "Char",
            Bool => "Bool",
            Void => "Void",
            SelfType => "Self",
            Object => "Object",
            ConvertibleToString => "ConvertibleToString",
            ConvertibleToI8 => "ConvertibleToI8",
            ConvertibleToI16 => "ConvertibleToI16",
            ConvertibleToI32 => "ConvertibleToI32",
            ConvertibleToI64 => "ConvertibleToI64",
            ConvertibleToU8 => "ConvertibleToU8",
            ConvertibleToU16 => "ConvertibleToU16",
            ConvertibleToU32 => "ConvertibleToU32",
            ConvertibleToU64 => "ConvertibleToU64",
            Addable => "Addable",
            Subtractable => "Subtractable",
            Multipliable => "Multipliable",
            Divisible => "Divisible",
            ArithmeticObject => "ArithmeticObject",
            Eq => "Eq",
            Iterable => "Iterable",
            Optional => "Optional",
        }
    }

    pub fn from_lexeme(lexeme: &str) -> Option<BuiltinType> {
        const ALL: &[BuiltinType] = &[
            I8,
            I16,
            I32,
            I64,
            Int,
            U8,
            U16,
            U32,
            U64,
            F32,
            F64,
            String,
            Char,
            Bool,
            Void,
            SelfType,
            Object,
            ConvertibleToString,
            ConvertibleToI8,
            ConvertibleToI16,
            ConvertibleToI32,
            ConvertibleToI64,
            ConvertibleToU8,
            ConvertibleToU16,
            ConvertibleToU32,
            ConvertibleToU64,
            Addable,
            Subtractable,
            Multipliable,
            Divisible,
            ArithmeticObject,
            Eq,
            Iterable,
            Optional,
        ];
        ALL.iter().copied().find(|b| b.as_str() == lexeme)
    }

    pub fn is_interface(self) -> bool {
        matches!(
            self,
            Object
                | ConvertibleToString
                | ConvertibleToI8
                | ConvertibleToI16
                | ConvertibleToI32
                | ConvertibleToI64
                | ConvertibleToU8
                | ConvertibleToU16
                | ConvertibleToU32
                | ConvertibleToU64
                | Addable
                | Subtractable
                | Multipliable
                | Divisible
                | ArithmeticObject
                | Eq
                | Iterable
        )
    }

    pub fn is_finite_int_type(self) -> bool {
        matches!(self, I8 | I16 | I32 | I64 | U8 | U16 | U32 | U64)
    }

    pub fn is_finite_float_type(self) -> bool {
        matches!(self, F32 | F64)
    }

    pub fn is_finite(self) -> bool {
        self.is_finite_int_type() || self.is_finite_float_type()
    }

    /// The interface a cast target requires its operand to implement.
    pub fn as_convertible_interface(self) -> Option<BuiltinType> {
        match self {
            String => Some(ConvertibleToString),
            I8 => Some(ConvertibleToI8),
            I16 => Some(ConvertibleToI16),
            I32 => Some(ConvertibleToI32),
            I64 => Some(ConvertibleToI64),
            U8 => Some(ConvertibleToU8),
            U16 => Some(ConvertibleToU16),
            U32 => Some(ConvertibleToU32),
            U64 => Some(ConvertibleToU64),
            _ => None,
        }
    }

    /// Value range rendered for range-violation diagnostics.
    pub fn get_range(self) -> &'static str {
        match self {
            I8 => "[-128; 127]",
            I16 => "[-32768; 32767]",
            I32 => "[-2147483648; 2147483647]",
            I64 => "[-9223372036854775808; 9223372036854775807]",
            U8 => "[0; 255]",
            U16 => "[0; 65535]",
            U32 => "[0; 4294967295]",
            U64 => "[0; 18446744073709551615]",
            F32 => {
                "[-3.402823700000000000000000000E+38; -1.17549400000000000000000000E-38] U \
                 {0} U [1.17549400000000000000000000E-38; 3.402823700000000000000000000E+38]"
            }
            F64 => {
                "[-1.79769313486231570000000000E+308; -2.22507385850720140000000000E-308] U \
                 {0} U [2.22507385850720140000000000E-308; 1.79769313486231570000000000E+308]"
            }
            _ => panic!("range is only defined for finite builtin types"),
        }
    }

    /// Hard-coded supertype rows of the builtin subtype lattice. Every type
    /// lists itself first; interface rows end at `Object`.
    pub fn get_builtin_supertypes(self) -> &'static [BuiltinType] {
        match self {
            I8 => &[
                I8,
                I16,
                I32,
                I64,
                ConvertibleToString,
                ConvertibleToI8,
                ConvertibleToI16,
                ConvertibleToI32,
                ConvertibleToI64,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
                Eq,
            ],
            I16 => &[
                I16,
                I32,
                I64,
                ConvertibleToString,
                ConvertibleToI16,
                ConvertibleToI32,
                ConvertibleToI64,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
                Eq,
            ],
            I32 => &[
                I32,
                I64,
                ConvertibleToString,
                ConvertibleToI32,
                ConvertibleToI64,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
                Eq,
            ],
            I64 => &[
                I64,
                ConvertibleToString,
                ConvertibleToI64,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
                Eq,
            ],
            Int => &[
                Int,
                ConvertibleToString,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
            ],
            U8 => &[
                U8,
                U16,
                U32,
                U64,
                ConvertibleToString,
                ConvertibleToI16,
                ConvertibleToI32,
                ConvertibleToI64,
                ConvertibleToU8,
                ConvertibleToU16,
                ConvertibleToU32,
                ConvertibleToU64,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
                Eq,
            ],
            U16 => &[
                U16,
                U32,
                U64,
                ConvertibleToString,
                ConvertibleToI32,
                ConvertibleToI64,
                ConvertibleToU16,
                ConvertibleToU32,
                ConvertibleToU64,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
                Eq,
            ],
            U32 => &[
                U32,
                U64,
                ConvertibleToString,
                ConvertibleToI64,
                ConvertibleToU32,
                ConvertibleToU64,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
                Eq,
            ],
            U64 => &[
                U64,
                ConvertibleToString,
                ConvertibleToU64,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
                Eq,
            ],
            F32 => &[
                F32,
                F64,
                ConvertibleToString,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
                Eq,
            ],
            F64 => &[
                F64,
                ConvertibleToString,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                ArithmeticObject,
                Object,
                Eq,
            ],
            String => &[String, ConvertibleToString, Addable, Object, Eq],
            Bool => &[Bool, ConvertibleToString, Object, Eq],
            Char => &[Char, ConvertibleToString, Object, Eq],
            Void => &[Void],
            SelfType => &[SelfType],
            Object => &[Object],
            ConvertibleToString => &[ConvertibleToString, Object],
            ConvertibleToI8 => &[ConvertibleToI8, Object],
            ConvertibleToI16 => &[ConvertibleToI16, Object],
            ConvertibleToI32 => &[ConvertibleToI32, Object],
            ConvertibleToI64 => &[ConvertibleToI64, Object],
            ConvertibleToU8 => &[ConvertibleToU8, Object],
            ConvertibleToU16 => &[ConvertibleToU16, Object],
            ConvertibleToU32 => &[ConvertibleToU32, Object],
            ConvertibleToU64 => &[ConvertibleToU64, Object],
            Addable => &[Addable, Object],
            Subtractable => &[Subtractable, Object],
            Multipliable => &[Multipliable, Object],
            Divisible => &[Divisible, Object],
            ArithmeticObject => &[
                ArithmeticObject,
                Addable,
                Subtractable,
                Multipliable,
                Divisible,
                Object,
            ],
            Eq => &[Eq, Object],
            Iterable => &[Iterable, Object],
            Optional => &[Optional],
        }
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unification variable allocated by the type checker; `id` indexes the
/// checker's slot table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateType {
    pub id: usize,
}

/// Base of a generic application: either a user type or the builtin
/// `Iterable` interface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GenericTypeBase {
    Name(Name),
    Builtin(BuiltinType),
}

impl fmt::Display for GenericTypeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericTypeBase::Name(name) => name.fmt(f),
            GenericTypeBase::Builtin(builtin) => builtin.fmt(f),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericType {
    pub base: GenericTypeBase,
    pub parameters: Vec<Type>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructType {
    pub name: Name,
    pub parameters: Vec<Type>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlgebraicType {
    pub base: Name,
    pub parameters: Vec<Type>,
    /// Selected constructor, if the expression has narrowed to one.
    pub constructor: Option<Name>,
    /// Constructor name -> constructor struct name, for all constructors.
    pub constructor_types: indexmap::IndexMap<std::string::String, Name>,
}

/// Signature of a function, method or init, including the captured
/// environment snapshot used to sandbox call checking and estimation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionType {
    pub parameters: Vec<Name>,
    pub arguments: Vec<Argument>,
    pub return_type: Type,
    pub where_clauses: Vec<Expression>,
    #[serde(skip)]
    pub saved_environment: SavedSpace,
    pub is_algebraic_method: bool,
}

impl PartialEq for FunctionType {
    fn eq(&self, other: &Self) -> bool {
        // The environment snapshot is identity data, not type structure.
        self.parameters == other.parameters
            && self.arguments == other.arguments
            && self.return_type == other.return_type
            && self.where_clauses == other.where_clauses
            && self.is_algebraic_method == other.is_algebraic_method
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Builtin(BuiltinType),
    Name(Name),
    Vector(Box<Type>),
    Dict(Box<Type>, Box<Type>),
    Optional(Box<Type>),
    Ref(Box<Type>),
    Template(TemplateType),
    Function(Box<FunctionType>),
    Struct(StructType),
    Generic(GenericType),
    Algebraic(Box<AlgebraicType>),
}

impl Type {
    pub fn name(name: impl Into<std::string::String>) -> Type {
        Type::Name(Name::new(name))
    }
}

impl From<BuiltinType> for Type {
    fn from(builtin: BuiltinType) -> Type {
        Type::Builtin(builtin)
    }
}

impl From<Name> for Type {
    fn from(name: Name) -> Type {
        Type::Name(name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Builtin(builtin) => builtin.fmt(f),
            Type::Name(name) => name.fmt(f),
            Type::Vector(subtype) => write!(f, "[{subtype}]"),
            Type::Dict(key, value) => write!(f, "[{key}: {value}]"),
            Type::Optional(inner) => write!(f, "{inner}?"),
            Type::Ref(value) => write!(f, "ref {value}"),
            Type::Template(template) => write!(f, "T<{}>", template.id),
            Type::Function(function) => {
                let arguments = function
                    .arguments
                    .iter()
                    .map(|arg| arg.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "({arguments}) -> {}", function.return_type)
            }
            Type::Struct(struct_type) => {
                let parameters = struct_type
                    .parameters
                    .iter()
                    .map(|param| param.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "StructType({}, parameters=[{parameters}])", struct_type.name)
            }
            Type::Generic(generic) => {
                let parameters = generic
                    .parameters
                    .iter()
                    .map(|param| param.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{}<{parameters}>", generic.base)
            }
            Type::Algebraic(algebraic) => {
                if let Some(constructor) = &algebraic.constructor {
                    return write!(f, "{}.{constructor}", algebraic.base);
                }
                if algebraic.parameters.is_empty() {
                    algebraic.base.fmt(f)
                } else {
                    let parameters = algebraic
                        .parameters
                        .iter()
                        .map(|param| param.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, "{}({parameters})", algebraic.base)
                }
            }
        }
    }
}

/// An interface position: builtin interface, user interface name, or a
/// generic interface application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Interface {
    Name(Name),
    Builtin(BuiltinType),
    Generic(GenericType),
}

impl Interface {
    /// The name this interface resolves through, if it is a user interface.
    pub fn name(&self) -> Option<&Name> {
        match self {
            Interface::Name(name) => Some(name),
            Interface::Generic(generic) => match &generic.base {
                GenericTypeBase::Name(name) => Some(name),
                GenericTypeBase::Builtin(_) => None,
            },
            Interface::Builtin(_) => None,
        }
    }

    pub fn as_type(&self) -> Type {
        match self {
            Interface::Name(name) => Type::Name(name.clone()),
            Interface::Builtin(builtin) => Type::Builtin(*builtin),
            Interface::Generic(generic) => Type::Generic(generic.clone()),
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_type().fmt(f)
    }
}

pub type Interfaces = Vec<Interface>;
pub type Parameters = Vec<Name>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_is_reflexive() {
        for builtin in [I8, U8, Int, F32, String, Char, Bool, Void, Eq, Iterable] {
            assert!(
                builtin.get_builtin_supertypes().contains(&builtin),
                "{builtin} is missing from its own supertype row"
            );
        }
    }

    #[test]
    fn test_integer_chains() {
        assert!(I8.get_builtin_supertypes().contains(&I64));
        assert!(!I64.get_builtin_supertypes().contains(&I8));
        assert!(U8.get_builtin_supertypes().contains(&U64));
        assert!(!U8.get_builtin_supertypes().contains(&I8));
    }

    #[test]
    fn test_arithmetic_interfaces() {
        assert!(I8.get_builtin_supertypes().contains(&Subtractable));
        assert!(String.get_builtin_supertypes().contains(&Addable));
        assert!(!String.get_builtin_supertypes().contains(&Subtractable));
    }

    #[test]
    fn test_name_equality_ignores_mangling() {
        let plain = Name::new("angel_abc123_point");
        let mangled = Name::mangled("angel_abc123_point", "point");
        assert_eq!(plain, mangled);
        assert_eq!(mangled.to_string(), "point");
    }
}
