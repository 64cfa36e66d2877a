//! Code emission: maps the checked, annotation-carrying AST onto the C++
//! node algebra and renders a single translation unit. Top-level
//! statements accumulate into `main`; declarations become functions,
//! structs with constructors and operator overloads, and `std::variant`
//! families for algebraic types. I/O and string helpers are emitted on
//! demand into a preamble.
//!
//! The translator trusts the checker's contract: every expression whose
//! type influences emission carries its annotation (`type_annotation`,
//! `base_type`, `instance_type`, `instance_call_parameters`,
//! `is_builtin`).

pub mod cpp;

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::ast::*;
use crate::errors::{not_implemented, Result};

use self::cpp::*;

fn algebraic_constructor_name(algebraic: &Name, constructor: &Name) -> String {
    format!("{}_a_{}", algebraic.member, constructor.member)
}

fn algebraic_method_name(algebraic: &Name, method: &Name) -> String {
    format!("{}_m_{}", algebraic.member, method.member)
}

fn special_method_operator(name: &str) -> Option<&'static str> {
    match name {
        "__add__" => Some("operator+"),
        "__sub__" => Some("operator-"),
        "__mul__" => Some("operator*"),
        "__div__" => Some("operator/"),
        "__eq__" => Some("operator=="),
        "__lt__" => Some("operator<"),
        "__gt__" => Some("operator>"),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Helper {
    ToString,
    Print,
    Read,
    StringSplitChar,
    VectorPop,
}

impl Helper {
    fn code(self) -> &'static str {
        match self {
            Helper::ToString => concat!(
                "std::string __to_string(bool value) {\n",
                "    return value ? \"True\" : \"False\";\n",
                "}\n",
                "std::string __to_string(const std::string& value) { return value; }\n",
                "std::string __to_string(char value) { return std::string(1, value); }\n",
                "template <typename T>\n",
                "std::string __to_string(const T& value) {\n",
                "    std::ostringstream out;\n",
                "    out << value;\n",
                "    return out.str();\n",
                "}\n",
                "template <typename T>\n",
                "std::string __to_string(const std::vector<T>& value) {\n",
                "    std::ostringstream out;\n",
                "    out << '[';\n",
                "    for (std::size_t i = 0; i < value.size(); ++i) {\n",
                "        if (i) out << \", \";\n",
                "        out << __to_string(value[i]);\n",
                "    }\n",
                "    out << ']';\n",
                "    return out.str();\n",
                "}"
            ),
            Helper::Print => concat!(
                "template <typename T>\n",
                "void __print(const T& value) {\n",
                "    std::cout << __to_string(value) << std::endl;\n",
                "}"
            ),
            Helper::Read => concat!(
                "std::string __read(const std::string& prompt) {\n",
                "    std::cout << prompt;\n",
                "    std::string result;\n",
                "    std::getline(std::cin, result);\n",
                "    return result;\n",
                "}"
            ),
            Helper::StringSplitChar => concat!(
                "std::vector<std::string> __string_split_char(const std::string& value, char by) {\n",
                "    std::vector<std::string> result;\n",
                "    std::string current;\n",
                "    for (char c : value) {\n",
                "        if (c == by) {\n",
                "            result.push_back(current);\n",
                "            current.clear();\n",
                "        } else {\n",
                "            current.push_back(c);\n",
                "        }\n",
                "    }\n",
                "    result.push_back(current);\n",
                "    return result;\n",
                "}"
            ),
            Helper::VectorPop => concat!(
                "template <typename T>\n",
                "T __vector_pop(std::vector<T>& value) {\n",
                "    T result = value.back();\n",
                "    value.pop_back();\n",
                "    return result;\n",
                "}"
            ),
        }
    }

    fn includes(self) -> &'static [&'static str] {
        match self {
            Helper::ToString => &["sstream", "string", "vector"],
            Helper::Print => &["iostream"],
            Helper::Read => &["iostream", "string"],
            Helper::StringSplitChar => &["string", "vector"],
            Helper::VectorPop => &["vector"],
        }
    }
}

#[derive(Default)]
pub struct Translator {
    includes: BTreeSet<&'static str>,
    helpers: BTreeSet<Helper>,
    top: Vec<CppDeclaration>,
    main_body: Vec<CppStatement>,
    /// Extension methods waiting to be merged into their struct.
    extensions: HashMap<String, Vec<MethodDeclaration>>,
    /// Whether `self` currently refers to a free-function parameter
    /// (algebraic shared methods) instead of `this`.
    self_is_parameter: bool,
}

impl Translator {
    pub fn new() -> Translator {
        Translator::default()
    }

    pub fn translate(mut self, ast: &[Node]) -> Result<String> {
        // Extensions merge into the struct they extend before emission.
        for node in ast {
            if let Node::ExtensionDeclaration(extension) = node {
                self.extensions
                    .entry(extension.name.member.clone())
                    .or_default()
                    .extend(extension.methods.all().cloned());
            }
        }
        for node in ast {
            self.translate_top_node(node)?;
        }
        debug!(
            "translated {} declarations and {} main statements",
            self.top.len(),
            self.main_body.len()
        );
        Ok(self.render())
    }

    fn render(self) -> String {
        let mut output = String::new();
        let mut includes = self.includes;
        for helper in &self.helpers {
            includes.extend(helper.includes());
        }
        for include in &includes {
            output.push_str(&format!("#include <{include}>\n"));
        }
        if !includes.is_empty() {
            output.push('\n');
        }
        let mut helpers = self.helpers;
        if helpers.contains(&Helper::Print) {
            helpers.insert(Helper::ToString);
        }
        for helper in &helpers {
            output.push_str(helper.code());
            output.push_str("\n\n");
        }
        for declaration in &self.top {
            output.push_str(&declaration.to_code());
            output.push_str("\n\n");
        }
        output.push_str("int main() {\n");
        for statement in &self.main_body {
            output.push_str(&statement.to_code(1));
            output.push('\n');
        }
        output.push_str("    return 0;\n}\n");
        output
    }

    fn translate_top_node(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::FunctionDeclaration(declaration) => {
                let function = self.translate_function_declaration(declaration)?;
                self.top.push(function);
                Ok(())
            }
            Node::StructDeclaration(declaration) => {
                let declaration = self.translate_struct_declaration(declaration, None)?;
                self.top.push(declaration);
                Ok(())
            }
            Node::AlgebraicDeclaration(declaration) => {
                self.translate_algebraic_declaration(declaration)
            }
            // Interfaces are static contracts; extensions were merged.
            Node::InterfaceDeclaration(_) | Node::ExtensionDeclaration(_) => Ok(()),
            _ => {
                let statements = self.translate_statement(node)?;
                self.main_body.extend(statements);
                Ok(())
            }
        }
    }

    pub(crate) fn translate_type(&mut self, type_: &Type) -> Result<CppType> {
        match type_ {
            Type::Builtin(builtin) => self.translate_builtin_type(*builtin),
            Type::Name(name) => Ok(CppType::Name(name.member.clone())),
            Type::Vector(element) => {
                self.includes.insert("vector");
                Ok(CppType::Vector(Box::new(self.translate_type(element)?)))
            }
            Type::Dict(key, value) => {
                self.includes.insert("map");
                Ok(CppType::Map(
                    Box::new(self.translate_type(key)?),
                    Box::new(self.translate_type(value)?),
                ))
            }
            Type::Optional(inner) => {
                self.includes.insert("optional");
                Ok(CppType::Optional(Box::new(self.translate_type(inner)?)))
            }
            Type::Ref(value) => Ok(CppType::Pointer(Box::new(self.translate_type(value)?))),
            Type::Generic(generic) => {
                let base = match &generic.base {
                    GenericTypeBase::Name(name) => name.member.clone(),
                    GenericTypeBase::Builtin(builtin) => {
                        return Err(not_implemented(format!(
                            "'{builtin}' has no target representation"
                        )))
                    }
                };
                let parameters = generic
                    .parameters
                    .iter()
                    .map(|parameter| self.translate_type(parameter))
                    .collect::<Result<Vec<_>>>()?;
                Ok(CppType::Template(base, parameters))
            }
            Type::Algebraic(algebraic) => match &algebraic.constructor {
                Some(constructor) => Ok(CppType::Name(algebraic_constructor_name(
                    &algebraic.base,
                    constructor,
                ))),
                None => Ok(CppType::Name(algebraic.base.member.clone())),
            },
            Type::Template(_) | Type::Struct(_) | Type::Function(_) => Err(not_implemented(
                format!("'{type_}' has no target representation"),
            )),
        }
    }

    fn translate_builtin_type(&mut self, builtin: BuiltinType) -> Result<CppType> {
        let translated = match builtin {
            BuiltinType::I8 => CppType::IntFast8,
            BuiltinType::I16 => CppType::IntFast16,
            BuiltinType::I32 => CppType::IntFast32,
            BuiltinType::I64 => CppType::IntFast64,
            BuiltinType::U8 => CppType::UIntFast8,
            BuiltinType::U16 => CppType::UIntFast16,
            BuiltinType::U32 => CppType::UIntFast32,
            BuiltinType::U64 => CppType::UIntFast64,
            BuiltinType::F32 => CppType::Float,
            BuiltinType::F64 => CppType::Double,
            BuiltinType::String => {
                self.includes.insert("string");
                CppType::StdString
            }
            BuiltinType::Char => CppType::Char,
            BuiltinType::Bool => CppType::Bool,
            BuiltinType::Void => CppType::Void,
            other => {
                return Err(not_implemented(format!(
                    "'{other}' has no target representation"
                )))
            }
        };
        if matches!(
            translated,
            CppType::IntFast8
                | CppType::IntFast16
                | CppType::IntFast32
                | CppType::IntFast64
                | CppType::UIntFast8
                | CppType::UIntFast16
                | CppType::UIntFast32
                | CppType::UIntFast64
        ) {
            self.includes.insert("cstdint");
        }
        Ok(translated)
    }

    fn self_expression(&self) -> CppExpression {
        if self.self_is_parameter {
            CppExpression::Id("self_".to_owned())
        } else {
            CppExpression::Deref(Box::new(CppExpression::This))
        }
    }

    pub(crate) fn translate_expression(
        &mut self,
        expression: &Expression,
    ) -> Result<CppExpression> {
        match expression {
            Expression::Name(name) => Ok(CppExpression::Id(name.member.clone())),
            Expression::SpecialName(SpecialName::SelfName) => Ok(self.self_expression()),
            Expression::IntegerLiteral { value, .. } => {
                Ok(CppExpression::IntegerLiteral(value.clone()))
            }
            Expression::DecimalLiteral { value } => Ok(CppExpression::FloatLiteral(value.clone())),
            Expression::StringLiteral { value } => {
                self.includes.insert("string");
                Ok(CppExpression::StringLiteral(value.clone()))
            }
            Expression::CharLiteral { value } => Ok(CppExpression::CharLiteral(*value)),
            Expression::BoolLiteral(literal) => {
                Ok(CppExpression::BoolLiteral(*literal == BoolLiteral::True))
            }
            Expression::VectorLiteral {
                elements,
                type_annotation,
            } => {
                let type_ = match type_annotation {
                    Some(annotation) => Some(self.translate_type(annotation)?),
                    None => None,
                };
                let elements = elements
                    .iter()
                    .map(|element| self.translate_expression(element))
                    .collect::<Result<Vec<_>>>()?;
                Ok(CppExpression::InitList(type_, elements))
            }
            Expression::DictLiteral {
                keys,
                values,
                annotation,
            } => {
                let type_ = match annotation {
                    Some(annotation) => Some(self.translate_type(annotation)?),
                    None => None,
                };
                let mut pairs = vec![];
                for (key, value) in keys.iter().zip(values.iter()) {
                    pairs.push((
                        self.translate_expression(key)?,
                        self.translate_expression(value)?,
                    ));
                }
                Ok(CppExpression::PairList(type_, pairs))
            }
            Expression::BinaryExpression(binary) => self.translate_binary_expression(binary),
            Expression::Cast(cast) => self.translate_cast(cast),
            Expression::NamedArgument { value, .. } => self.translate_expression(value),
            Expression::Field(field) => self.translate_field(field),
            Expression::Subscript(subscript) => {
                let base = self.translate_expression(&subscript.base)?;
                let index = self.translate_expression(&subscript.index)?;
                Ok(CppExpression::Subscript(Box::new(base), Box::new(index)))
            }
            Expression::Ref { value, .. } => {
                let inner = self.translate_expression(value)?;
                Ok(CppExpression::AddrOf(Box::new(inner)))
            }
            Expression::Parentheses { value } => Ok(CppExpression::Parenthesized(Box::new(
                self.translate_expression(value)?,
            ))),
            Expression::FunctionCall(call) => self.translate_function_call(call),
            Expression::MethodCall(call) => self.translate_method_call(call),
            Expression::OptionalTypeConstructor(OptionalTypeConstructor::None) => {
                self.includes.insert("optional");
                Ok(CppExpression::Nullopt)
            }
            Expression::OptionalSomeCall { value } => self.translate_expression(value),
            Expression::OptionalSomeValue { value } => {
                let base = self.translate_expression(value)?;
                Ok(CppExpression::MethodCall(
                    Box::new(CppExpression::Parenthesized(Box::new(base))),
                    "value".to_owned(),
                    vec![],
                ))
            }
            other => Err(not_implemented(format!("cannot translate '{other}'"))),
        }
    }

    fn translate_binary_expression(&mut self, binary: &BinaryExpression) -> Result<CppExpression> {
        let operator = match binary.operator {
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::EqEq => "==",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::LtEq => "<=",
            Operator::GtEq => ">=",
            other => {
                return Err(not_implemented(format!(
                    "operator '{other}' has no target representation"
                )))
            }
        };
        let left = self.parenthesize_operand(&binary.left)?;
        let right = self.parenthesize_operand(&binary.right)?;
        Ok(CppExpression::BinOp(Box::new(left), operator, Box::new(right)))
    }

    /// The checker already re-associated the tree; parenthesizing nested
    /// operands keeps the target's precedence out of the picture.
    fn parenthesize_operand(&mut self, operand: &Expression) -> Result<CppExpression> {
        let translated = self.translate_expression(operand)?;
        if matches!(operand, Expression::BinaryExpression(_)) {
            Ok(CppExpression::Parenthesized(Box::new(translated)))
        } else {
            Ok(translated)
        }
    }

    fn translate_cast(&mut self, cast: &Cast) -> Result<CppExpression> {
        let value = self.translate_expression(&cast.value)?;
        match (&cast.to_type, cast.is_builtin) {
            (Type::Builtin(BuiltinType::String), true) => {
                self.helpers.insert(Helper::ToString);
                Ok(CppExpression::Call(
                    Box::new(CppExpression::Id("__to_string".to_owned())),
                    vec![value],
                ))
            }
            (Type::Builtin(BuiltinType::String), false) => {
                self.includes.insert("string");
                Ok(CppExpression::FunctionalCast(
                    CppType::StdString,
                    Box::new(value),
                ))
            }
            (Type::Builtin(_), true) => {
                let type_ = self.translate_type(&cast.to_type)?;
                Ok(CppExpression::CCast(type_, Box::new(value)))
            }
            // A cast between identical named types routes through the
            // user-defined conversion; identity in the target language.
            (Type::Name(_), _) => Ok(value),
            (other, _) => Err(not_implemented(format!("cannot translate cast to '{other}'"))),
        }
    }

    fn translate_field(&mut self, field: &Field) -> Result<CppExpression> {
        if let Expression::SpecialName(SpecialName::SelfName) = field.base {
            return Ok(if self.self_is_parameter {
                CppExpression::Field(
                    Box::new(CppExpression::Id("self_".to_owned())),
                    field.field.member.clone(),
                )
            } else {
                CppExpression::Arrow(
                    Box::new(CppExpression::This),
                    field.field.member.clone(),
                )
            });
        }
        let base = self.translate_expression(&field.base)?;
        let member = field.field.unmangled_or_member();
        match field.base_type.as_ref() {
            Some(Type::Builtin(BuiltinType::String)) | Some(Type::Vector(_))
            | Some(Type::Dict(..))
                if member == "length" =>
            {
                Ok(CppExpression::MethodCall(
                    Box::new(base),
                    "size".to_owned(),
                    vec![],
                ))
            }
            Some(Type::Ref(_)) if member == "value" => {
                Ok(CppExpression::Deref(Box::new(base)))
            }
            _ => Ok(CppExpression::Field(
                Box::new(base),
                field.field.member.clone(),
            )),
        }
    }

    fn translate_function_call(&mut self, call: &FunctionCall) -> Result<CppExpression> {
        if let Expression::BuiltinFunc(func) = &call.function_path {
            let arguments = call
                .arguments
                .iter()
                .map(|argument| self.translate_expression(argument))
                .collect::<Result<Vec<_>>>()?;
            return Ok(match func {
                BuiltinFunc::Print => {
                    self.helpers.insert(Helper::Print);
                    self.helpers.insert(Helper::ToString);
                    CppExpression::Call(
                        Box::new(CppExpression::Id("__print".to_owned())),
                        arguments,
                    )
                }
                BuiltinFunc::Read => {
                    self.helpers.insert(Helper::Read);
                    CppExpression::Call(
                        Box::new(CppExpression::Id("__read".to_owned())),
                        arguments,
                    )
                }
            });
        }
        let mut path = self.translate_expression(&call.function_path)?;
        if let Some(parameters) = &call.instance_call_parameters {
            // Generic struct construction instantiates explicitly.
            let parameters = parameters
                .iter()
                .map(|parameter| self.translate_type(parameter))
                .collect::<Result<Vec<_>>>()?;
            if let CppExpression::Id(name) = path {
                path = CppExpression::Id(CppType::Template(name, parameters).to_string());
            }
        }
        let arguments = call
            .arguments
            .iter()
            .map(|argument| self.translate_expression(argument))
            .collect::<Result<Vec<_>>>()?;
        Ok(CppExpression::Call(Box::new(path), arguments))
    }

    fn translate_method_call(&mut self, call: &MethodCall) -> Result<CppExpression> {
        let base = self.translate_expression(&call.instance_path)?;
        let arguments = call
            .arguments
            .iter()
            .map(|argument| self.translate_expression(argument))
            .collect::<Result<Vec<_>>>()?;
        let member = call.method.unmangled_or_member();
        match call.instance_type.as_ref() {
            Some(Type::Builtin(BuiltinType::String)) => match member {
                "split" => {
                    self.helpers.insert(Helper::StringSplitChar);
                    let mut all = vec![base];
                    all.extend(arguments);
                    Ok(CppExpression::Call(
                        Box::new(CppExpression::Id("__string_split_char".to_owned())),
                        all,
                    ))
                }
                _ => Err(not_implemented(format!(
                    "cannot translate String.{member}"
                ))),
            },
            Some(Type::Vector(_)) => match member {
                "append" => Ok(CppExpression::MethodCall(
                    Box::new(base),
                    "push_back".to_owned(),
                    arguments,
                )),
                "pop" => {
                    self.helpers.insert(Helper::VectorPop);
                    Ok(CppExpression::Call(
                        Box::new(CppExpression::Id("__vector_pop".to_owned())),
                        vec![base],
                    ))
                }
                _ => Err(not_implemented(format!(
                    "cannot translate Vector.{member}"
                ))),
            },
            Some(Type::Algebraic(algebraic)) => {
                if call.is_algebraic_method {
                    let mut all = vec![base];
                    all.extend(arguments);
                    return Ok(CppExpression::Call(
                        Box::new(CppExpression::Id(algebraic_method_name(
                            &algebraic.base,
                            &call.method,
                        ))),
                        all,
                    ));
                }
                if algebraic.constructor_types.contains_key(&call.method.member)
                    || algebraic.constructor.is_none()
                {
                    // Constructor selection: `Base.Ctor(args)`.
                    return Ok(CppExpression::Call(
                        Box::new(CppExpression::Id(algebraic_constructor_name(
                            &algebraic.base,
                            &call.method,
                        ))),
                        arguments,
                    ));
                }
                Ok(CppExpression::MethodCall(
                    Box::new(base),
                    call.method.member.clone(),
                    arguments,
                ))
            }
            Some(Type::Name(_)) | Some(Type::Generic(_)) => Ok(CppExpression::MethodCall(
                Box::new(base),
                call.method.member.clone(),
                arguments,
            )),
            other => Err(not_implemented(format!(
                "cannot translate a method call on '{}'",
                other.map(|t| t.to_string()).unwrap_or_default()
            ))),
        }
    }

    fn translate_body(&mut self, body: &[Node]) -> Result<Vec<CppStatement>> {
        let mut statements = vec![];
        for node in body {
            statements.extend(self.translate_statement(node)?);
        }
        Ok(statements)
    }

    pub(crate) fn translate_statement(&mut self, node: &Node) -> Result<Vec<CppStatement>> {
        match node {
            Node::Decl(decl) => {
                let type_ = decl
                    .type_
                    .as_ref()
                    .ok_or_else(|| not_implemented("declaration without resolved type"))?;
                let type_ = self.translate_type(type_)?;
                let value = match &decl.value {
                    Some(value) => Some(self.translate_expression(value)?),
                    None => None,
                };
                Ok(vec![CppStatement::VarDecl {
                    type_,
                    name: decl.name.member.clone(),
                    value,
                }])
            }
            Node::Assignment { left, right, .. } => Ok(vec![CppStatement::Assign {
                left: self.translate_expression(left)?,
                right: self.translate_expression(right)?,
            }]),
            Node::If {
                condition,
                body,
                elifs,
                else_body,
                ..
            } => Ok(vec![self.translate_if(condition, body, elifs, else_body)?]),
            Node::While {
                condition, body, ..
            } => {
                let (condition, prologue) = self.translate_condition(condition)?;
                let mut body_statements = prologue;
                body_statements.extend(self.translate_body(body)?);
                Ok(vec![CppStatement::While {
                    condition,
                    body: body_statements,
                }])
            }
            Node::For {
                element,
                container,
                body,
                ..
            } => {
                let container = self.translate_expression(container)?;
                Ok(vec![CppStatement::ForRange {
                    name: element.member.clone(),
                    container,
                    body: self.translate_body(body)?,
                }])
            }
            Node::Break { .. } => Ok(vec![CppStatement::Break]),
            Node::Return { value, .. } => Ok(vec![CppStatement::Return(Some(
                self.translate_expression(value)?,
            ))]),
            Node::InitCall { arguments, .. } => {
                // Delegation re-runs another overload and replaces `*this`.
                self.includes.insert("type_traits");
                let arguments = arguments
                    .iter()
                    .map(|argument| self.translate_expression(argument))
                    .collect::<Result<Vec<_>>>()?;
                Ok(vec![CppStatement::Assign {
                    left: CppExpression::Deref(Box::new(CppExpression::This)),
                    right: CppExpression::Call(
                        Box::new(CppExpression::Id(
                            "std::decay_t<decltype(*this)>".to_owned(),
                        )),
                        arguments,
                    ),
                }])
            }
            Node::FunctionCall(call) => Ok(vec![CppStatement::Expression(
                self.translate_function_call(call)?,
            )]),
            Node::MethodCall(call) => Ok(vec![CppStatement::Expression(
                self.translate_method_call(call)?,
            )]),
            other => Err(not_implemented(format!(
                "declaration at line {} cannot appear in a body",
                other.line()
            ))),
        }
    }

    /// An `if let`/`while let` condition becomes a `has_value` test; the
    /// body gains a binding prologue unwrapping the optional.
    fn translate_condition(
        &mut self,
        condition: &Expression,
    ) -> Result<(CppExpression, Vec<CppStatement>)> {
        match condition {
            Expression::Decl(decl) => {
                let value = decl
                    .value
                    .as_ref()
                    .ok_or_else(|| not_implemented("let-condition without value"))?;
                let optional = self.translate_expression(value)?;
                let wrapped = CppExpression::Parenthesized(Box::new(optional));
                let condition = CppExpression::MethodCall(
                    Box::new(wrapped.clone()),
                    "has_value".to_owned(),
                    vec![],
                );
                let prologue = vec![CppStatement::VarDecl {
                    type_: CppType::Auto,
                    name: decl.name.member.clone(),
                    value: Some(CppExpression::MethodCall(
                        Box::new(wrapped),
                        "value".to_owned(),
                        vec![],
                    )),
                }];
                Ok((condition, prologue))
            }
            condition => Ok((self.translate_expression(condition)?, vec![])),
        }
    }

    fn translate_if(
        &mut self,
        condition: &Expression,
        body: &[Node],
        elifs: &[(Expression, Ast)],
        else_body: &[Node],
    ) -> Result<CppStatement> {
        let (condition, prologue) = self.translate_condition(condition)?;
        let mut body_statements = prologue;
        body_statements.extend(self.translate_body(body)?);
        let else_statements = match elifs.split_first() {
            // A let-binding in an elif needs its own scope, so the chain
            // nests instead of using `else if`.
            Some(((elif_condition, elif_body), rest)) => {
                vec![self.translate_if(elif_condition, elif_body, rest, else_body)?]
            }
            None => self.translate_body(else_body)?,
        };
        Ok(CppStatement::If {
            condition,
            body: body_statements,
            elifs: vec![],
            else_body: else_statements,
        })
    }

    fn translate_arguments(&mut self, arguments: &Arguments) -> Result<Vec<CppArgument>> {
        arguments
            .iter()
            .map(|argument| {
                Ok(CppArgument {
                    type_: self.translate_type(&argument.type_)?,
                    name: argument.name.member.clone(),
                    default: match &argument.value {
                        Some(value) => Some(self.translate_expression(value)?),
                        None => None,
                    },
                })
            })
            .collect()
    }

    fn translate_function_declaration(
        &mut self,
        declaration: &FunctionDeclaration,
    ) -> Result<CppDeclaration> {
        let return_type = self.translate_type(&declaration.return_type)?;
        let arguments = self.translate_arguments(&declaration.arguments)?;
        let body = self.translate_body(&declaration.body)?;
        Ok(CppDeclaration::Function {
            return_type,
            name: declaration.name.member.clone(),
            template_parameters: declaration
                .parameters
                .iter()
                .map(|parameter| parameter.member.clone())
                .collect(),
            arguments,
            body,
        })
    }

    fn translate_method(&mut self, method: &MethodDeclaration) -> Result<CppMethod> {
        let unmangled = method.name.unmangled_or_member();
        let return_type = self.translate_type(&method.return_type)?;
        let arguments = self.translate_arguments(&method.arguments)?;
        let body = self.translate_body(&method.body)?;
        if unmangled == "as" {
            return Ok(CppMethod {
                return_type,
                name: String::new(),
                is_conversion: true,
                arguments,
                body,
            });
        }
        let name = match special_method_operator(unmangled) {
            Some(operator) => operator.to_owned(),
            None => method.name.member.clone(),
        };
        Ok(CppMethod {
            return_type,
            name,
            is_conversion: false,
            arguments,
            body,
        })
    }

    fn translate_struct_declaration(
        &mut self,
        declaration: &StructDeclaration,
        rename: Option<String>,
    ) -> Result<CppDeclaration> {
        let name = rename.unwrap_or_else(|| declaration.name.member.clone());
        let public_fields = declaration
            .fields
            .public
            .iter()
            .map(|field| {
                Ok(CppArgument {
                    type_: self.translate_type(&field.type_)?,
                    name: field.name.member.clone(),
                    default: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let private_fields = declaration
            .fields
            .private
            .iter()
            .map(|field| {
                Ok(CppArgument {
                    type_: self.translate_type(&field.type_)?,
                    name: field.name.member.clone(),
                    default: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut constructors = vec![];
        for init in &declaration.init_declarations {
            let arguments = self.translate_arguments(&init.arguments)?;
            let body = self.translate_body(&init.body)?;
            constructors.push(CppConstructor { arguments, body });
        }
        let mut public_methods = vec![];
        for method in declaration
            .methods
            .public
            .iter()
            .chain(declaration.methods.special.iter())
        {
            public_methods.push(self.translate_method(method)?);
        }
        let mut private_methods = vec![];
        for method in &declaration.methods.private {
            private_methods.push(self.translate_method(method)?);
        }
        if let Some(extension_methods) = self.extensions.remove(&declaration.name.member) {
            for method in extension_methods {
                public_methods.push(self.translate_method(&method)?);
            }
        }
        Ok(CppDeclaration::Struct {
            name,
            template_parameters: declaration
                .parameters
                .iter()
                .map(|parameter| parameter.member.clone())
                .collect(),
            public_fields,
            private_fields,
            constructors,
            public_methods,
            private_methods,
        })
    }

    fn translate_algebraic_declaration(
        &mut self,
        declaration: &AlgebraicDeclaration,
    ) -> Result<()> {
        self.includes.insert("variant");
        let mut alternatives = vec![];
        for constructor in &declaration.constructors {
            let constructor_name =
                algebraic_constructor_name(&declaration.name, &constructor.name);
            alternatives.push(CppType::Name(constructor_name.clone()));
            let translated =
                self.translate_struct_declaration(constructor, Some(constructor_name))?;
            self.top.push(translated);
        }
        self.top.push(CppDeclaration::VariantAlias {
            name: declaration.name.member.clone(),
            alternatives,
        });
        // Shared methods become free template functions taking any
        // constructor as the receiver.
        for method in declaration.methods.all() {
            let previous = std::mem::replace(&mut self.self_is_parameter, true);
            let translated = (|| -> Result<CppDeclaration> {
                let return_type = self.translate_type(&method.return_type)?;
                let mut arguments = vec![CppArgument {
                    type_: CppType::Name("_Self&".to_owned()),
                    name: "self_".to_owned(),
                    default: None,
                }];
                arguments.extend(self.translate_arguments(&method.arguments)?);
                let body = self.translate_body(&method.body)?;
                Ok(CppDeclaration::Function {
                    return_type,
                    name: algebraic_method_name(&declaration.name, &method.name),
                    template_parameters: vec!["_Self".to_owned()],
                    arguments,
                    body,
                })
            })();
            self.self_is_parameter = previous;
            self.top.push(translated?);
        }
        Ok(())
    }
}

/// Render a checked AST into a complete C++ translation unit.
pub fn generate_cpp(ast: &[Node]) -> Result<String> {
    Translator::new().translate(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_type_mapping() {
        let mut translator = Translator::new();
        assert_eq!(
            translator
                .translate_type(&Type::Builtin(BuiltinType::I8))
                .unwrap()
                .to_string(),
            "std::int_fast8_t"
        );
        assert_eq!(
            translator
                .translate_type(&Type::Vector(Box::new(Type::Builtin(BuiltinType::String))))
                .unwrap()
                .to_string(),
            "std::vector<std::string>"
        );
        assert_eq!(
            translator
                .translate_type(&Type::Optional(Box::new(Type::Builtin(BuiltinType::U64))))
                .unwrap()
                .to_string(),
            "std::optional<std::uint_fast64_t>"
        );
        assert!(translator.includes.contains("cstdint"));
        assert!(translator.includes.contains("optional"));
    }

    #[test]
    fn test_unbounded_int_has_no_representation() {
        let mut translator = Translator::new();
        assert!(translator
            .translate_type(&Type::Builtin(BuiltinType::Int))
            .is_err());
    }
}
