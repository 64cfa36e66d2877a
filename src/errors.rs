//! Compiler diagnostics. Errors propagate eagerly: the first failure
//! aborts the compilation of the current unit, so every variant carries
//! enough context to pretty-print a complete multi-line diagnostic around
//! a source excerpt.

use std::fmt;

use crate::ast::{Arguments, Expression, Interface, Name, Type};

/// The offending source line with its 1-indexed line number (and column,
/// when known).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Code {
    pub string: String,
    pub line: usize,
    pub column: Option<usize>,
}

impl Code {
    pub fn new(string: impl Into<String>, line: usize) -> Code {
        Code {
            string: string.into(),
            line,
            column: None,
        }
    }

    pub fn with_column(string: impl Into<String>, line: usize, column: usize) -> Code {
        Code {
            string: string.into(),
            line,
            column: Some(column),
        }
    }

}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => {
                let spaces = " ".repeat(format!("{}: ", self.line).len() + column - 1);
                write!(f, "{}: {}\n{spaces}^", self.line, self.string)
            }
            None => write!(f, "{}: {}", self.line, self.string),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    NotImplemented {
        message: String,
    },
    DivByZero,
    MissingInterfaceMember {
        subject: Name,
        interface: Interface,
        code: Code,
        missing_member: Name,
        inherited_from: Option<Interface>,
    },
    InterfaceFieldError {
        subject: Name,
        interface: Interface,
        code: Code,
        field: Name,
        subject_field_type: Type,
        interface_field_type: Type,
        inherited_from: Option<Interface>,
    },
    InterfaceMethodError {
        subject: Name,
        interface: Interface,
        code: Code,
        method: Name,
        subject_method_arguments: Arguments,
        subject_method_return_type: Type,
        interface_method_arguments: Arguments,
        interface_method_return_type: Type,
        inherited_from: Option<Interface>,
    },
    PrivateFieldsNotInitializedAndNoInit {
        field: Name,
        code: Code,
    },
    FieldError {
        instance: Expression,
        instance_type: Type,
        field_name: String,
        code: Code,
    },
    ConstructorError {
        algebraic: Type,
        constructor: String,
        code: Code,
    },
    SubscriptError {
        instance: Expression,
        instance_type: Type,
        index: Expression,
        code: Code,
    },
    TypeError {
        message: String,
        code: Code,
        possible_types: Vec<Type>,
    },
    UnsatisfiedWhereClause {
        clause: Expression,
        code: Code,
    },
    WrongArguments {
        expected: String,
        code: Code,
        got_arguments: Vec<Expression>,
    },
    NoncallableCall {
        noncallable: Expression,
        code: Code,
    },
    SyntaxError {
        message: String,
        code: Code,
    },
    NameError {
        name: Name,
        code: Code,
    },
    ConstantReassignment {
        cannot_reassign: Expression,
        reassignment_code: Code,
        definition_code: Code,
    },
}

impl Error {
    pub fn is_type_error(&self) -> bool {
        matches!(self, Error::TypeError { .. })
    }
}

fn inheritance_suffix(inherited_from: &Option<Interface>) -> String {
    match inherited_from {
        Some(interface) => format!(" (which inherits from '{interface}')"),
        None => String::new(),
    }
}

fn join_arguments(arguments: &Arguments) -> String {
    arguments
        .iter()
        .map(|argument| argument.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotImplemented { message } => {
                if message.is_empty() {
                    f.write_str("Not implemented")
                } else {
                    f.write_str(message)
                }
            }
            Error::DivByZero => f.write_str("Division by zero is not allowed"),
            Error::MissingInterfaceMember {
                subject,
                interface,
                code,
                missing_member,
                inherited_from,
            } => {
                let inheritance = inheritance_suffix(inherited_from);
                write!(
                    f,
                    "Interface Implementation Error: '{subject}' implements '{interface}'{inheritance}\n\
                     \x20                               however, member '{missing_member}' is missing\n\n{code}"
                )
            }
            Error::InterfaceFieldError {
                subject,
                interface,
                code,
                field,
                subject_field_type,
                interface_field_type,
                inherited_from,
            } => {
                let inheritance = inheritance_suffix(inherited_from);
                write!(
                    f,
                    "Interface Implementation Error: '{subject}' implements '{interface}'{inheritance}\n\
                     \x20                               however, '{field}' has type '{subject_field_type}'\n\
                     \x20                               and expected type is '{interface_field_type}'\n\n{code}"
                )
            }
            Error::InterfaceMethodError {
                subject,
                interface,
                code,
                method,
                subject_method_arguments,
                subject_method_return_type,
                interface_method_arguments,
                interface_method_return_type,
                inherited_from,
            } => {
                let inheritance = inheritance_suffix(inherited_from);
                let subject_arguments = join_arguments(subject_method_arguments);
                let interface_arguments = join_arguments(interface_method_arguments);
                write!(
                    f,
                    "Interface Implementation Error: '{subject}' implements '{interface}'{inheritance}\n\
                     \x20                               however, it implemented \
                     {method}({subject_arguments}) -> {subject_method_return_type}\n\
                     \x20                               and expected implementation is \
                     {method}({interface_arguments}) -> {interface_method_return_type}\n\n{code}"
                )
            }
            Error::PrivateFieldsNotInitializedAndNoInit { field, code } => write!(
                f,
                "Initialization Error: all private fields must be initialized to generate default init\n\
                 \x20                     however, field '{field}' does not have default value\n\n{code}"
            ),
            Error::FieldError {
                instance,
                instance_type,
                field_name,
                code,
            } => write!(
                f,
                "Field Error: '{instance}' of type '{instance_type}' does not have '{field_name}' field\n\n{code}"
            ),
            Error::ConstructorError {
                algebraic,
                constructor,
                code,
            } => write!(
                f,
                "Constructor Error: type '{algebraic}' does not have '{constructor}' constructor\n\n{code}"
            ),
            Error::SubscriptError {
                instance,
                instance_type,
                index,
                code,
            } => write!(
                f,
                "Subscript Error: '{instance}' of type '{instance_type}' cannot be subscribed by '{index}'\n\n{code}"
            ),
            Error::TypeError {
                message,
                code,
                possible_types,
            } => {
                let possible_types = possible_types
                    .iter()
                    .map(|type_| type_.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "Type Error: {message}\n\n{code}\n\npossible types: {possible_types}"
                )
            }
            Error::UnsatisfiedWhereClause { clause, code } => {
                write!(f, "Unsatisfied Clause Error: unsatisfied {clause}\n\n{code}")
            }
            Error::WrongArguments {
                expected,
                code,
                got_arguments,
            } => {
                let arguments = got_arguments
                    .iter()
                    .map(|argument| argument.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "Arguments Error: got '({arguments})', expected '{expected}' in\n\n{code}"
                )
            }
            Error::NoncallableCall { noncallable, code } => write!(
                f,
                "Noncallable Call Error: noncallable '{noncallable}' was called in\n\n{code}"
            ),
            Error::SyntaxError { message, code } => {
                write!(f, "Syntax Error: {message}\n\n{code}")
            }
            Error::NameError { name, code } => write!(
                f,
                "Name Error: '{name}' is not defined but used in\n\n{code}"
            ),
            Error::ConstantReassignment {
                cannot_reassign,
                reassignment_code,
                definition_code,
            } => write!(
                f,
                "Immutability Error: cannot reassign value of '{cannot_reassign}' in\n\n\
                 {reassignment_code}\n\nIt was defined immutable in\n\n{definition_code}"
            ),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

pub fn not_implemented(message: impl Into<String>) -> Error {
    Error::NotImplemented {
        message: message.into(),
    }
}
