//! Expression nodes. Like the type algebra, the variant set is closed and
//! every consumer dispatches with an exhaustive `match`.
//!
//! Several variants carry `Option` annotation slots (`type_annotation`,
//! `base_type`, ...) that start out `None` in parser output and are filled
//! in place by the type checker; the emitter relies on them being present
//! on every expression whose type influences emission.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::statements::{Decl, FunctionCall, MethodCall};
use super::types::{Name, Type};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Not,
    And,
    Or,
    Is,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Not => "not",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Is => "is",
            Operator::LtEq => "<=",
            Operator::GtEq => ">=",
            Operator::EqEq => "==",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Assign => "=",
            Operator::AddAssign => "+=",
            Operator::SubAssign => "-=",
            Operator::MulAssign => "*=",
            Operator::DivAssign => "/=",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
        }
    }

    pub fn higher_order_boolean_operators() -> &'static [Operator] {
        &[Operator::And, Operator::Or, Operator::Is]
    }

    pub fn comparison_operators() -> &'static [Operator] {
        &[
            Operator::LtEq,
            Operator::GtEq,
            Operator::EqEq,
            Operator::NotEq,
            Operator::Lt,
            Operator::Gt,
        ]
    }

    pub fn assignment_operators() -> &'static [Operator] {
        &[
            Operator::AddAssign,
            Operator::SubAssign,
            Operator::MulAssign,
            Operator::DivAssign,
            Operator::Assign,
        ]
    }

    pub fn is_comparison(self) -> bool {
        Operator::comparison_operators().contains(&self)
    }

    /// `+=` -> `+` and friends, for the compound-assignment rewrite.
    pub fn to_arithmetic_operator(self) -> Operator {
        match self {
            Operator::AddAssign => Operator::Add,
            Operator::SubAssign => Operator::Sub,
            Operator::MulAssign => Operator::Mul,
            Operator::DivAssign => Operator::Div,
            other => other,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method names the emitter lowers to target-language operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialMethod {
    As,
    Eq,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
}

impl SpecialMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecialMethod::As => "as",
            SpecialMethod::Eq => "__eq__",
            SpecialMethod::Lt => "__lt__",
            SpecialMethod::Gt => "__gt__",
            SpecialMethod::Add => "__add__",
            SpecialMethod::Sub => "__sub__",
            SpecialMethod::Mul => "__mul__",
            SpecialMethod::Div => "__div__",
        }
    }

    pub fn from_lexeme(lexeme: &str) -> Option<SpecialMethod> {
        const ALL: &[SpecialMethod] = &[
            SpecialMethod::As,
            SpecialMethod::Eq,
            SpecialMethod::Lt,
            SpecialMethod::Gt,
            SpecialMethod::Add,
            SpecialMethod::Sub,
            SpecialMethod::Mul,
            SpecialMethod::Div,
        ];
        ALL.iter().copied().find(|m| m.as_str() == lexeme)
    }

    pub fn from_operator(operator: Operator) -> Option<SpecialMethod> {
        match operator {
            Operator::EqEq => Some(SpecialMethod::Eq),
            Operator::Lt => Some(SpecialMethod::Lt),
            Operator::Gt => Some(SpecialMethod::Gt),
            Operator::Add => Some(SpecialMethod::Add),
            Operator::Sub => Some(SpecialMethod::Sub),
            Operator::Mul => Some(SpecialMethod::Mul),
            Operator::Div => Some(SpecialMethod::Div),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltinFunc {
    Print,
    Read,
}

impl BuiltinFunc {
    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinFunc::Print => "print",
            BuiltinFunc::Read => "read",
        }
    }

    pub fn from_lexeme(lexeme: &str) -> Option<BuiltinFunc> {
        match lexeme {
            "print" => Some(BuiltinFunc::Print),
            "read" => Some(BuiltinFunc::Read),
            _ => None,
        }
    }
}

/// Helpers the translator introduces itself; never written by users.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrivateBuiltinFunc {
    VectorToString,
}

impl PrivateBuiltinFunc {
    pub fn as_str(self) -> &'static str {
        match self {
            PrivateBuiltinFunc::VectorToString => "__vector_to_string",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialName {
    SelfName,
}

impl SpecialName {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecialName::SelfName => "self",
        }
    }

    pub fn from_lexeme(lexeme: &str) -> Option<SpecialName> {
        match lexeme {
            "self" => Some(SpecialName::SelfName),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolLiteral {
    True,
    False,
}

impl BoolLiteral {
    pub fn as_str(self) -> &'static str {
        match self {
            BoolLiteral::True => "True",
            BoolLiteral::False => "False",
        }
    }

    pub fn from_lexeme(lexeme: &str) -> Option<BoolLiteral> {
        match lexeme {
            "True" => Some(BoolLiteral::True),
            "False" => Some(BoolLiteral::False),
            _ => None,
        }
    }
}

/// `Optional.Some` / `Optional.None` in expression position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionalTypeConstructor {
    Some,
    None,
}

impl OptionalTypeConstructor {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionalTypeConstructor::Some => "Some",
            OptionalTypeConstructor::None => "None",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub left: Expression,
    pub operator: Operator,
    pub right: Expression,
    pub type_annotation: Option<Type>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub line: usize,
    pub base: Expression,
    pub field: Name,
    pub base_type: Option<Type>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscript {
    pub line: usize,
    pub base: Expression,
    pub index: Expression,
    pub base_type: Option<Type>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    pub value: Expression,
    pub to_type: Type,
    /// Set by the checker: true iff the operand's type was builtin, so the
    /// emitter uses a built-in conversion instead of the user-defined one.
    pub is_builtin: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Name(Name),
    SpecialName(SpecialName),
    BuiltinFunc(BuiltinFunc),
    PrivateBuiltinFunc(PrivateBuiltinFunc),
    SpecialMethod(SpecialMethod),
    BuiltinType(crate::ast::BuiltinType),
    IntegerLiteral {
        value: String,
        type_annotation: Option<Type>,
    },
    DecimalLiteral {
        value: String,
    },
    StringLiteral {
        value: String,
    },
    CharLiteral {
        value: char,
    },
    BoolLiteral(BoolLiteral),
    VectorLiteral {
        elements: Vec<Expression>,
        type_annotation: Option<Type>,
    },
    DictLiteral {
        keys: Vec<Expression>,
        values: Vec<Expression>,
        annotation: Option<Type>,
    },
    BinaryExpression(Box<BinaryExpression>),
    Cast(Box<Cast>),
    NamedArgument {
        name: Name,
        value: Box<Expression>,
    },
    Field(Box<Field>),
    Subscript(Box<Subscript>),
    Ref {
        value: Box<Expression>,
        value_type: Option<Type>,
    },
    Parentheses {
        value: Box<Expression>,
    },
    FunctionCall(Box<FunctionCall>),
    MethodCall(Box<MethodCall>),
    /// A `let` binding used as an `if`/`while` condition.
    Decl(Box<Decl>),
    OptionalTypeConstructor(OptionalTypeConstructor),
    OptionalSomeCall {
        value: Box<Expression>,
    },
    OptionalSomeValue {
        value: Box<Expression>,
    },
}

impl Expression {
    pub fn integer(value: impl Into<String>) -> Expression {
        Expression::IntegerLiteral {
            value: value.into(),
            type_annotation: None,
        }
    }

    pub fn binary(left: Expression, operator: Operator, right: Expression) -> Expression {
        Expression::BinaryExpression(Box::new(BinaryExpression {
            left,
            operator,
            right,
            type_annotation: None,
        }))
    }

    pub fn field(line: usize, base: Expression, field: Name) -> Expression {
        Expression::Field(Box::new(Field {
            line,
            base,
            field,
            base_type: None,
        }))
    }

    pub fn name(member: impl Into<String>) -> Expression {
        Expression::Name(Name::new(member))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Name(name) => name.fmt(f),
            Expression::SpecialName(special) => f.write_str(special.as_str()),
            Expression::BuiltinFunc(func) => f.write_str(func.as_str()),
            Expression::PrivateBuiltinFunc(func) => f.write_str(func.as_str()),
            Expression::SpecialMethod(method) => f.write_str(method.as_str()),
            Expression::BuiltinType(builtin) => f.write_str(builtin.as_str()),
            Expression::IntegerLiteral { value, .. } => f.write_str(value),
            Expression::DecimalLiteral { value } => f.write_str(value),
            Expression::StringLiteral { value } => write!(f, "\"{value}\""),
            Expression::CharLiteral { value } => write!(f, "'{value}'"),
            Expression::BoolLiteral(literal) => f.write_str(literal.as_str()),
            Expression::VectorLiteral { elements, .. } => {
                let elements = elements
                    .iter()
                    .map(|element| element.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{elements}]")
            }
            Expression::DictLiteral { keys, values, .. } => {
                let pairs = keys
                    .iter()
                    .zip(values.iter())
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{pairs}]")
            }
            Expression::BinaryExpression(binary) => {
                write!(f, "{} {} {}", binary.left, binary.operator, binary.right)
            }
            Expression::Cast(cast) => write!(f, "({})({})", cast.to_type, cast.value),
            Expression::NamedArgument { name, value } => write!(f, "{name} = {value}"),
            Expression::Field(field) => write!(f, "{}.{}", field.base, field.field),
            Expression::Subscript(subscript) => {
                write!(f, "{}[{}]", subscript.base, subscript.index)
            }
            Expression::Ref { value, .. } => write!(f, "ref {value}"),
            Expression::Parentheses { value } => write!(f, "({value})"),
            Expression::FunctionCall(call) => {
                let arguments = call
                    .arguments
                    .iter()
                    .map(|argument| argument.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{}({arguments})", call.function_path)
            }
            Expression::MethodCall(call) => {
                let arguments = call
                    .arguments
                    .iter()
                    .map(|argument| argument.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{}.{}({arguments})", call.instance_path, call.method)
            }
            Expression::Decl(decl) => decl.fmt(f),
            Expression::OptionalTypeConstructor(constructor) => {
                write!(f, "Optional.{}", constructor.as_str())
            }
            Expression::OptionalSomeCall { value } => write!(f, "Optional.Some({value})"),
            Expression::OptionalSomeValue { value } => write!(f, "{value}!"),
        }
    }
}
