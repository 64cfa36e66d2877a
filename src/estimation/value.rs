//! Values produced by compile-time estimation. The set is closed; a
//! statement with no value estimates to nothing rather than to a variant.

use std::fmt;

use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::ast::{
    Arguments, Ast, BuiltinType, Expression, Name, OptionalTypeConstructor, Parameters, Type,
};
use crate::environment::SavedSpace;

/// How a function value runs when called: a user body estimated in its
/// saved environment, or one of the closed set of builtin behaviors.
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionSpec {
    Body(Ast),
    Print,
    Read,
    VectorToString,
    StringSplit,
    VectorAppend,
    VectorPop,
}

/// A function or method value.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Name,
    pub parameters: Parameters,
    pub arguments: Arguments,
    pub return_type: Type,
    pub where_clauses: Vec<Expression>,
    pub specification: FunctionSpec,
    pub saved_environment: SavedSpace,
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        // Environment snapshots are identity data; two function values are
        // the same if their signatures and bodies agree.
        self.name == other.name
            && self.arguments == other.arguments
            && self.return_type == other.return_type
            && self.specification == other.specification
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Void,
    String(String),
    Char(char),
    Int(BigInt, BuiltinType),
    Float(f64, BuiltinType),
    Bool(bool),
    Vector {
        elements: Vec<Value>,
        element_type: Type,
    },
    Dict {
        keys: Vec<Value>,
        values: Vec<Value>,
        key_type: Type,
        value_type: Type,
    },
    Instance {
        type_: Name,
        fields: IndexMap<String, Value>,
    },
    Struct(Name),
    Algebraic(Name),
    AlgebraicConstructor {
        name: Name,
        constructor: Name,
    },
    AlgebraicConstructorInstance {
        name: Name,
        constructor: Name,
        fields: IndexMap<String, Value>,
    },
    OptionalConstructor(OptionalTypeConstructor),
    OptionalSomeCall(Box<Value>),
    Ref {
        value: Box<Value>,
        initial_expression: Expression,
    },
    Function(Box<Function>),
    /// A value whose runtime identity is unknown but whose type is.
    Dynamic(Type),
    Break,
}

impl Value {
    pub fn instance(type_: Name) -> Value {
        Value::Instance {
            type_,
            fields: IndexMap::new(),
        }
    }

    pub fn int(value: impl Into<BigInt>, type_: BuiltinType) -> Value {
        Value::Int(value.into(), type_)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("Void"),
            Value::String(value) => write!(f, "\"{value}\""),
            Value::Char(value) => write!(f, "'{value}'"),
            Value::Int(value, _) => value.fmt(f),
            Value::Float(value, _) => value.fmt(f),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Vector { elements, .. } => {
                let elements = elements
                    .iter()
                    .map(|element| element.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{elements}]")
            }
            Value::Dict { keys, values, .. } => {
                let pairs = keys
                    .iter()
                    .zip(values.iter())
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{pairs}]")
            }
            Value::Instance { type_, fields } => {
                let fields = fields
                    .iter()
                    .map(|(name, value)| format!("{name}: {value}"))
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "{type_}({fields})")
            }
            Value::Struct(name) => write!(f, "Struct({name})"),
            Value::Algebraic(name) => write!(f, "Algebraic({name})"),
            Value::AlgebraicConstructor { name, constructor } => {
                write!(f, "AlgebraicConstructor({name}, constructor={constructor})")
            }
            Value::AlgebraicConstructorInstance {
                name,
                constructor,
                fields,
            } => {
                let fields = fields
                    .iter()
                    .map(|(field, value)| format!("{field}: {value}"))
                    .collect::<Vec<_>>()
                    .join(",");
                write!(
                    f,
                    "AlgebraicConstructor({name}, constructor={constructor})({fields})"
                )
            }
            Value::OptionalConstructor(constructor) => {
                write!(f, "Optional.{}", constructor.as_str())
            }
            Value::OptionalSomeCall(inner) => write!(f, "Optional.Some({inner})"),
            Value::Ref {
                value,
                initial_expression,
            } => write!(f, "Ref({value}, initial={initial_expression})"),
            Value::Function(function) => {
                let arguments = function
                    .arguments
                    .iter()
                    .map(|argument| argument.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Function(({arguments}) -> {})", function.return_type)
            }
            Value::Dynamic(type_) => write!(f, "DynamicValue({type_})"),
            Value::Break => f.write_str("Break"),
        }
    }
}
