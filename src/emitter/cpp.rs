//! Target-language AST: a small algebra of C++ types, expressions,
//! statements and declarations, each rendering itself to text.

use std::fmt;

pub const INDENTATION: &str = "    ";

#[derive(Clone, Debug, PartialEq)]
pub enum CppType {
    Void,
    Bool,
    Char,
    Float,
    Double,
    Auto,
    StdString,
    IntFast8,
    IntFast16,
    IntFast32,
    IntFast64,
    UIntFast8,
    UIntFast16,
    UIntFast32,
    UIntFast64,
    Vector(Box<CppType>),
    Map(Box<CppType>, Box<CppType>),
    Optional(Box<CppType>),
    Pointer(Box<CppType>),
    Name(String),
    Template(String, Vec<CppType>),
    Variant(Vec<CppType>),
}

impl fmt::Display for CppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CppType::Void => f.write_str("void"),
            CppType::Bool => f.write_str("bool"),
            CppType::Char => f.write_str("char"),
            CppType::Float => f.write_str("float"),
            CppType::Double => f.write_str("double"),
            CppType::Auto => f.write_str("auto"),
            CppType::StdString => f.write_str("std::string"),
            CppType::IntFast8 => f.write_str("std::int_fast8_t"),
            CppType::IntFast16 => f.write_str("std::int_fast16_t"),
            CppType::IntFast32 => f.write_str("std::int_fast32_t"),
            CppType::IntFast64 => f.write_str("std::int_fast64_t"),
            CppType::UIntFast8 => f.write_str("std::uint_fast8_t"),
            CppType::UIntFast16 => f.write_str("std::uint_fast16_t"),
            CppType::UIntFast32 => f.write_str("std::uint_fast32_t"),
            CppType::UIntFast64 => f.write_str("std::uint_fast64_t"),
            CppType::Vector(element) => write!(f, "std::vector<{element}>"),
            CppType::Map(key, value) => write!(f, "std::map<{key}, {value}>"),
            CppType::Optional(inner) => write!(f, "std::optional<{inner}>"),
            CppType::Pointer(inner) => write!(f, "{inner}*"),
            CppType::Name(name) => f.write_str(name),
            CppType::Template(name, parameters) => {
                let parameters = parameters
                    .iter()
                    .map(|parameter| parameter.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{name}<{parameters}>")
            }
            CppType::Variant(alternatives) => {
                let alternatives = alternatives
                    .iter()
                    .map(|alternative| alternative.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "std::variant<{alternatives}>")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CppExpression {
    IntegerLiteral(String),
    FloatLiteral(String),
    StringLiteral(String),
    CharLiteral(char),
    BoolLiteral(bool),
    Id(String),
    This,
    Nullopt,
    BinOp(Box<CppExpression>, &'static str, Box<CppExpression>),
    Call(Box<CppExpression>, Vec<CppExpression>),
    MethodCall(Box<CppExpression>, String, Vec<CppExpression>),
    Field(Box<CppExpression>, String),
    Arrow(Box<CppExpression>, String),
    Subscript(Box<CppExpression>, Box<CppExpression>),
    CCast(CppType, Box<CppExpression>),
    FunctionalCast(CppType, Box<CppExpression>),
    Ternary(Box<CppExpression>, Box<CppExpression>, Box<CppExpression>),
    AddrOf(Box<CppExpression>),
    Deref(Box<CppExpression>),
    InitList(Option<CppType>, Vec<CppExpression>),
    PairList(Option<CppType>, Vec<(CppExpression, CppExpression)>),
    Parenthesized(Box<CppExpression>),
}

fn escape_cpp_string(value: &str) -> String {
    let mut escaped = String::new();
    for character in value.chars() {
        match character {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl fmt::Display for CppExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CppExpression::IntegerLiteral(value) | CppExpression::FloatLiteral(value) => {
                f.write_str(value)
            }
            CppExpression::StringLiteral(value) => {
                write!(f, "std::string(\"{}\")", escape_cpp_string(value))
            }
            CppExpression::CharLiteral(value) => match value {
                '\'' => f.write_str("'\\''"),
                '\\' => f.write_str("'\\\\'"),
                '\n' => f.write_str("'\\n'"),
                '\t' => f.write_str("'\\t'"),
                other => write!(f, "'{other}'"),
            },
            CppExpression::BoolLiteral(true) => f.write_str("true"),
            CppExpression::BoolLiteral(false) => f.write_str("false"),
            CppExpression::Id(name) => f.write_str(name),
            CppExpression::This => f.write_str("this"),
            CppExpression::Nullopt => f.write_str("std::nullopt"),
            CppExpression::BinOp(left, operator, right) => {
                write!(f, "{left} {operator} {right}")
            }
            CppExpression::Call(path, arguments) => {
                let arguments = arguments
                    .iter()
                    .map(|argument| argument.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{path}({arguments})")
            }
            CppExpression::MethodCall(base, name, arguments) => {
                let arguments = arguments
                    .iter()
                    .map(|argument| argument.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{base}.{name}({arguments})")
            }
            CppExpression::Field(base, name) => write!(f, "{base}.{name}"),
            CppExpression::Arrow(base, name) => write!(f, "{base}->{name}"),
            CppExpression::Subscript(base, index) => write!(f, "{base}[{index}]"),
            CppExpression::CCast(type_, value) => write!(f, "({type_})({value})"),
            CppExpression::FunctionalCast(type_, value) => write!(f, "{type_}({value})"),
            CppExpression::Ternary(condition, then, otherwise) => {
                write!(f, "({condition} ? {then} : {otherwise})")
            }
            CppExpression::AddrOf(value) => write!(f, "&{value}"),
            CppExpression::Deref(value) => write!(f, "(*{value})"),
            CppExpression::InitList(type_, elements) => {
                let elements = elements
                    .iter()
                    .map(|element| element.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                match type_ {
                    Some(type_) => write!(f, "{type_}{{{elements}}}"),
                    None => write!(f, "{{{elements}}}"),
                }
            }
            CppExpression::PairList(type_, pairs) => {
                let pairs = pairs
                    .iter()
                    .map(|(key, value)| format!("{{{key}, {value}}}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                match type_ {
                    Some(type_) => write!(f, "{type_}{{{pairs}}}"),
                    None => write!(f, "{{{pairs}}}"),
                }
            }
            CppExpression::Parenthesized(value) => write!(f, "({value})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CppStatement {
    VarDecl {
        type_: CppType,
        name: String,
        value: Option<CppExpression>,
    },
    Expression(CppExpression),
    Assign {
        left: CppExpression,
        right: CppExpression,
    },
    If {
        condition: CppExpression,
        body: Vec<CppStatement>,
        elifs: Vec<(CppExpression, Vec<CppStatement>)>,
        else_body: Vec<CppStatement>,
    },
    While {
        condition: CppExpression,
        body: Vec<CppStatement>,
    },
    ForRange {
        name: String,
        container: CppExpression,
        body: Vec<CppStatement>,
    },
    Break,
    Return(Option<CppExpression>),
}

fn render_body(body: &[CppStatement], indentation_level: usize) -> String {
    body.iter()
        .map(|statement| statement.to_code(indentation_level))
        .collect::<Vec<_>>()
        .join("\n")
}

impl CppStatement {
    pub fn to_code(&self, indentation_level: usize) -> String {
        let indent = INDENTATION.repeat(indentation_level);
        match self {
            CppStatement::VarDecl { type_, name, value } => match value {
                Some(value) => format!("{indent}{type_} {name} = {value};"),
                None => format!("{indent}{type_} {name};"),
            },
            CppStatement::Expression(expression) => format!("{indent}{expression};"),
            CppStatement::Assign { left, right } => format!("{indent}{left} = {right};"),
            CppStatement::If {
                condition,
                body,
                elifs,
                else_body,
            } => {
                let mut code = format!(
                    "{indent}if ({condition}) {{\n{}\n{indent}}}",
                    render_body(body, indentation_level + 1)
                );
                for (elif_condition, elif_body) in elifs {
                    code.push_str(&format!(
                        " else if ({elif_condition}) {{\n{}\n{indent}}}",
                        render_body(elif_body, indentation_level + 1)
                    ));
                }
                if !else_body.is_empty() {
                    code.push_str(&format!(
                        " else {{\n{}\n{indent}}}",
                        render_body(else_body, indentation_level + 1)
                    ));
                }
                code
            }
            CppStatement::While { condition, body } => format!(
                "{indent}while ({condition}) {{\n{}\n{indent}}}",
                render_body(body, indentation_level + 1)
            ),
            CppStatement::ForRange {
                name,
                container,
                body,
            } => format!(
                "{indent}for (const auto& {name} : {container}) {{\n{}\n{indent}}}",
                render_body(body, indentation_level + 1)
            ),
            CppStatement::Break => format!("{indent}break;"),
            CppStatement::Return(value) => match value {
                Some(value) => format!("{indent}return {value};"),
                None => format!("{indent}return;"),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CppArgument {
    pub type_: CppType,
    pub name: String,
    pub default: Option<CppExpression>,
}

impl fmt::Display for CppArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default {
            Some(default) => write!(f, "{} {} = {default}", self.type_, self.name),
            None => write!(f, "{} {}", self.type_, self.name),
        }
    }
}

fn render_template_prefix(template_parameters: &[String], indent: &str) -> String {
    if template_parameters.is_empty() {
        return String::new();
    }
    let parameters = template_parameters
        .iter()
        .map(|parameter| format!("typename {parameter}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{indent}template <{parameters}>\n")
}

fn render_arguments(arguments: &[CppArgument]) -> String {
    arguments
        .iter()
        .map(|argument| argument.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone, Debug, PartialEq)]
pub struct CppConstructor {
    pub arguments: Vec<CppArgument>,
    pub body: Vec<CppStatement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CppMethod {
    pub return_type: CppType,
    /// Either a plain method name, an `operator==`-style spelling, or a
    /// conversion (`operator std::string`) with no return type spelled.
    pub name: String,
    pub is_conversion: bool,
    pub arguments: Vec<CppArgument>,
    pub body: Vec<CppStatement>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CppDeclaration {
    Function {
        return_type: CppType,
        name: String,
        template_parameters: Vec<String>,
        arguments: Vec<CppArgument>,
        body: Vec<CppStatement>,
    },
    Struct {
        name: String,
        template_parameters: Vec<String>,
        public_fields: Vec<CppArgument>,
        private_fields: Vec<CppArgument>,
        constructors: Vec<CppConstructor>,
        public_methods: Vec<CppMethod>,
        private_methods: Vec<CppMethod>,
    },
    VariantAlias {
        name: String,
        alternatives: Vec<CppType>,
    },
    /// Pre-rendered support code (I/O helpers and friends).
    Verbatim(String),
}

impl CppDeclaration {
    pub fn to_code(&self) -> String {
        match self {
            CppDeclaration::Function {
                return_type,
                name,
                template_parameters,
                arguments,
                body,
            } => {
                let template = render_template_prefix(template_parameters, "");
                format!(
                    "{template}{return_type} {name}({}) {{\n{}\n}}",
                    render_arguments(arguments),
                    render_body(body, 1)
                )
            }
            CppDeclaration::Struct {
                name,
                template_parameters,
                public_fields,
                private_fields,
                constructors,
                public_methods,
                private_methods,
            } => {
                let template = render_template_prefix(template_parameters, "");
                let mut sections = vec![];
                let mut public_section = vec![];
                for field in public_fields {
                    public_section.push(format!("{INDENTATION}{field};"));
                }
                for constructor in constructors {
                    public_section.push(format!(
                        "{INDENTATION}{name}({}) {{\n{}\n{INDENTATION}}}",
                        render_arguments(&constructor.arguments),
                        render_body(&constructor.body, 2)
                    ));
                }
                for method in public_methods {
                    public_section.push(render_method(method));
                }
                if !public_section.is_empty() {
                    sections.push(format!("public:\n{}", public_section.join("\n")));
                }
                let mut private_section = vec![];
                for field in private_fields {
                    private_section.push(format!("{INDENTATION}{field};"));
                }
                for method in private_methods {
                    private_section.push(render_method(method));
                }
                if !private_section.is_empty() {
                    sections.push(format!("private:\n{}", private_section.join("\n")));
                }
                format!("{template}struct {name} {{\n{}\n}};", sections.join("\n"))
            }
            CppDeclaration::VariantAlias { name, alternatives } => {
                let alternatives = alternatives
                    .iter()
                    .map(|alternative| alternative.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("using {name} = std::variant<{alternatives}>;")
            }
            CppDeclaration::Verbatim(code) => code.clone(),
        }
    }
}

fn render_method(method: &CppMethod) -> String {
    if method.is_conversion {
        return format!(
            "{INDENTATION}operator {}() const {{\n{}\n{INDENTATION}}}",
            method.return_type,
            render_body(&method.body, 2)
        );
    }
    format!(
        "{INDENTATION}{} {}({}) {{\n{}\n{INDENTATION}}}",
        method.return_type,
        method.name,
        render_arguments(&method.arguments),
        render_body(&method.body, 2)
    )
}
