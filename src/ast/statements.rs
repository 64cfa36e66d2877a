//! Statement and declaration nodes, plus the small shared pieces
//! (arguments, field/method groupings) that declarations are built from.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::expressions::Expression;
use super::types::{Interfaces, Name, Parameters, Type};

pub const INDENTATION: &str = "    ";

/// Source position tracked by the parser. Lines and columns are 1-indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Position {
    pub fn next_line(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    pub fn next_column(&mut self) {
        self.column += 1;
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(line: {}, column: {})", self.line, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclType {
    Constant,
    Variable,
}

/// `let`/`var` declaration. At least one of `type_` and `value` is present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decl {
    pub line: usize,
    pub decl_type: DeclType,
    pub name: Name,
    pub type_: Option<Type>,
    pub value: Option<Expression>,
}

impl Decl {
    pub fn is_constant(&self) -> bool {
        self.decl_type == DeclType::Constant
    }

    pub fn is_variable(&self) -> bool {
        self.decl_type == DeclType::Variable
    }
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_variable() { "var" } else { "let" };
        match (&self.type_, &self.value) {
            (Some(type_), Some(value)) => {
                write!(f, "{keyword} {}: {type_} = {value}", self.name)
            }
            (None, Some(value)) => write!(f, "{keyword} {} = {value}", self.name),
            (Some(type_), None) => write!(f, "{keyword} {}: {type_}", self.name),
            (None, None) => write!(f, "{keyword} {}", self.name),
        }
    }
}

/// Declared formal argument: name, type, optional default expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: Name,
    pub type_: Type,
    pub value: Option<Expression>,
}

impl Argument {
    pub fn new(name: impl Into<String>, type_: Type) -> Argument {
        Argument {
            name: Name::new(name),
            type_,
            value: None,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}: {} = {value}", self.name, self.type_),
            None => write!(f, "{}: {}", self.name, self.type_),
        }
    }
}

pub type Arguments = Vec<Argument>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub line: usize,
    pub function_path: Expression,
    pub arguments: Vec<Expression>,
    /// Concrete type parameters when the callee resolved to a generic
    /// struct construction; consumed by the emitter.
    pub instance_call_parameters: Option<Vec<Type>>,
}

impl FunctionCall {
    pub fn new(line: usize, function_path: Expression, arguments: Vec<Expression>) -> FunctionCall {
        FunctionCall {
            line,
            function_path,
            arguments,
            instance_call_parameters: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub line: usize,
    pub instance_path: Expression,
    pub method: Name,
    pub arguments: Vec<Expression>,
    pub instance_type: Option<Type>,
    pub is_algebraic_method: bool,
}

impl MethodCall {
    pub fn new(
        line: usize,
        instance_path: Expression,
        method: Name,
        arguments: Vec<Expression>,
    ) -> MethodCall {
        MethodCall {
            line,
            instance_path,
            method,
            arguments,
            instance_type: None,
            is_algebraic_method: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub line: usize,
    pub name: Name,
    pub parameters: Parameters,
    pub arguments: Arguments,
    pub return_type: Type,
    pub where_clause: Option<Expression>,
    pub body: Ast,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodDeclaration {
    pub line: usize,
    pub name: Name,
    pub parameters: Parameters,
    pub arguments: Arguments,
    pub return_type: Type,
    pub body: Ast,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub line: usize,
    pub name: Name,
    pub type_: Type,
    pub value: Option<Expression>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitDeclaration {
    pub line: usize,
    pub arguments: Arguments,
    pub body: Ast,
}

/// Struct fields partitioned by the leading-underscore naming rule.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredFields {
    pub private: Vec<FieldDeclaration>,
    pub public: Vec<FieldDeclaration>,
}

impl DeclaredFields {
    pub fn all(&self) -> impl Iterator<Item = &FieldDeclaration> {
        self.private.iter().chain(self.public.iter())
    }
}

/// Struct methods partitioned into private (`_`), special (`__`/`as`) and
/// public buckets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredMethods {
    pub private: Vec<MethodDeclaration>,
    pub public: Vec<MethodDeclaration>,
    pub special: Vec<MethodDeclaration>,
}

impl DeclaredMethods {
    pub fn all(&self) -> impl Iterator<Item = &MethodDeclaration> {
        self.private
            .iter()
            .chain(self.public.iter())
            .chain(self.special.iter())
    }

    pub fn merge(&mut self, other: DeclaredMethods) {
        self.private.extend(other.private);
        self.public.extend(other.public);
        self.special.extend(other.special);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructDeclaration {
    pub line: usize,
    pub name: Name,
    pub parameters: Parameters,
    pub interfaces: Interfaces,
    pub fields: DeclaredFields,
    pub init_declarations: Vec<InitDeclaration>,
    pub methods: DeclaredMethods,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlgebraicDeclaration {
    pub line: usize,
    pub name: Name,
    pub parameters: Parameters,
    pub constructors: Vec<StructDeclaration>,
    pub methods: DeclaredMethods,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDeclaration {
    pub line: usize,
    pub name: Name,
    pub parameters: Parameters,
    pub implemented_interfaces: Interfaces,
    pub fields: Vec<FieldDeclaration>,
    pub methods: Vec<MethodDeclaration>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDeclaration {
    pub line: usize,
    pub name: Name,
    pub parameters: Parameters,
    pub interfaces: Interfaces,
    pub where_clause: Option<Expression>,
    pub methods: DeclaredMethods,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Decl(Decl),
    Assignment {
        line: usize,
        left: Expression,
        operator: super::expressions::Operator,
        right: Expression,
    },
    If {
        line: usize,
        condition: Expression,
        body: Ast,
        elifs: Vec<(Expression, Ast)>,
        else_body: Ast,
    },
    While {
        line: usize,
        condition: Expression,
        body: Ast,
    },
    For {
        line: usize,
        element: Name,
        container: Expression,
        body: Ast,
        container_type: Option<Type>,
    },
    Break {
        line: usize,
    },
    Return {
        line: usize,
        value: Expression,
    },
    /// `init(...)` delegation inside an init body.
    InitCall {
        line: usize,
        arguments: Vec<Expression>,
    },
    FunctionCall(FunctionCall),
    MethodCall(MethodCall),
    FunctionDeclaration(FunctionDeclaration),
    StructDeclaration(StructDeclaration),
    AlgebraicDeclaration(AlgebraicDeclaration),
    InterfaceDeclaration(InterfaceDeclaration),
    ExtensionDeclaration(ExtensionDeclaration),
    FieldDeclaration(FieldDeclaration),
    MethodDeclaration(MethodDeclaration),
    InitDeclaration(InitDeclaration),
}

impl Node {
    pub fn line(&self) -> usize {
        match self {
            Node::Decl(decl) => decl.line,
            Node::Assignment { line, .. }
            | Node::If { line, .. }
            | Node::While { line, .. }
            | Node::For { line, .. }
            | Node::Break { line }
            | Node::Return { line, .. }
            | Node::InitCall { line, .. } => *line,
            Node::FunctionCall(call) => call.line,
            Node::MethodCall(call) => call.line,
            Node::FunctionDeclaration(declaration) => declaration.line,
            Node::StructDeclaration(declaration) => declaration.line,
            Node::AlgebraicDeclaration(declaration) => declaration.line,
            Node::InterfaceDeclaration(declaration) => declaration.line,
            Node::ExtensionDeclaration(declaration) => declaration.line,
            Node::FieldDeclaration(declaration) => declaration.line,
            Node::MethodDeclaration(declaration) => declaration.line,
            Node::InitDeclaration(declaration) => declaration.line,
        }
    }
}

pub type Ast = Vec<Node>;
