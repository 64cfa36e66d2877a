//! Clarification: a single pre-order rewrite of the raw parser AST that
//! turns bare identifiers into their builtin meanings and mangles the
//! rest. Runs before any name or type checking; unknown identifiers pass
//! through untouched and are reported later by the analyzer.

use crate::ast::*;
use crate::constants::SPEC_LINE;
use crate::context::Context;
use crate::utils::{mangle, submangle};

pub struct Clarifier<'a> {
    context: &'a Context,
}

impl<'a> Clarifier<'a> {
    pub fn new(context: &'a Context) -> Clarifier<'a> {
        Clarifier { context }
    }

    pub fn clarify_ast(&self, ast: Ast) -> Ast {
        ast.into_iter().map(|node| self.clarify_node(node)).collect()
    }

    /// Builtin categories are tried in a fixed order; the first match wins
    /// and remaining names are mangled.
    fn clarify_name_expression(&self, name: Name) -> Expression {
        if let Some(builtin) = BuiltinType::from_lexeme(&name.member) {
            return Expression::BuiltinType(builtin);
        }
        if let Some(func) = BuiltinFunc::from_lexeme(&name.member) {
            return Expression::BuiltinFunc(func);
        }
        if let Some(literal) = BoolLiteral::from_lexeme(&name.member) {
            return Expression::BoolLiteral(literal);
        }
        if let Some(special) = SpecialName::from_lexeme(&name.member) {
            return Expression::SpecialName(special);
        }
        if let Some(method) = SpecialMethod::from_lexeme(&name.member) {
            return Expression::SpecialMethod(method);
        }
        Expression::Name(mangle(name, self.context))
    }

    fn clarify_name(&self, name: Name) -> Name {
        mangle(name, self.context)
    }

    pub fn clarify_type(&self, type_: Type) -> Type {
        match type_ {
            Type::Name(name) => match BuiltinType::from_lexeme(&name.member) {
                Some(builtin) => Type::Builtin(builtin),
                None => Type::Name(self.clarify_name(name)),
            },
            Type::Vector(subtype) => Type::Vector(Box::new(self.clarify_type(*subtype))),
            Type::Dict(key, value) => Type::Dict(
                Box::new(self.clarify_type(*key)),
                Box::new(self.clarify_type(*value)),
            ),
            Type::Optional(inner) => Type::Optional(Box::new(self.clarify_type(*inner))),
            Type::Ref(value) => Type::Ref(Box::new(self.clarify_type(*value))),
            Type::Generic(generic) => {
                let base = match generic.base {
                    GenericTypeBase::Name(name) => match BuiltinType::from_lexeme(&name.member) {
                        Some(builtin) => GenericTypeBase::Builtin(builtin),
                        None => GenericTypeBase::Name(self.clarify_name(name)),
                    },
                    base @ GenericTypeBase::Builtin(_) => base,
                };
                Type::Generic(GenericType {
                    base,
                    parameters: generic
                        .parameters
                        .into_iter()
                        .map(|parameter| self.clarify_type(parameter))
                        .collect(),
                })
            }
            other @ (Type::Builtin(_)
            | Type::Template(_)
            | Type::Function(_)
            | Type::Struct(_)
            | Type::Algebraic(_)) => other,
        }
    }

    fn clarify_interface(&self, interface: Interface) -> Interface {
        match self.clarify_type(interface.as_type()) {
            Type::Name(name) => Interface::Name(name),
            Type::Builtin(builtin) => Interface::Builtin(builtin),
            Type::Generic(generic) => Interface::Generic(generic),
            other => unreachable!("'{other}' cannot appear in interface position"),
        }
    }

    fn clarify_argument(&self, argument: Argument) -> Argument {
        Argument {
            name: self.clarify_name(argument.name),
            type_: self.clarify_type(argument.type_),
            value: argument.value.map(|value| self.clarify_expression(value)),
        }
    }

    fn clarify_arguments(&self, arguments: Arguments) -> Arguments {
        arguments
            .into_iter()
            .map(|argument| self.clarify_argument(argument))
            .collect()
    }

    fn clarify_parameters(&self, parameters: Parameters) -> Parameters {
        parameters
            .into_iter()
            .map(|parameter| self.clarify_name(parameter))
            .collect()
    }

    pub fn clarify_expression(&self, expression: Expression) -> Expression {
        match expression {
            Expression::Name(name) => self.clarify_name_expression(name),
            Expression::Field(field) => {
                let base = self.clarify_expression(field.base);
                if let Expression::BuiltinType(BuiltinType::Optional) = base {
                    match field.field.member.as_str() {
                        "Some" => {
                            return Expression::OptionalTypeConstructor(
                                OptionalTypeConstructor::Some,
                            )
                        }
                        "None" => {
                            return Expression::OptionalTypeConstructor(
                                OptionalTypeConstructor::None,
                            )
                        }
                        _ => {}
                    }
                }
                Expression::Field(Box::new(Field {
                    line: field.line,
                    base,
                    field: submangle(field.field, self.context),
                    base_type: field.base_type,
                }))
            }
            Expression::FunctionCall(call) => {
                let function_path = self.clarify_expression(call.function_path);
                let arguments = call
                    .arguments
                    .into_iter()
                    .map(|argument| self.clarify_expression(argument))
                    .collect::<Vec<_>>();
                match function_path {
                    Expression::OptionalTypeConstructor(OptionalTypeConstructor::Some) => {
                        let mut arguments = arguments;
                        assert!(arguments.len() == 1, "Optional.Some takes one argument");
                        Expression::OptionalSomeCall {
                            value: Box::new(arguments.remove(0)),
                        }
                    }
                    Expression::Field(field) => {
                        Expression::MethodCall(Box::new(MethodCall::new(
                            call.line,
                            field.base,
                            field.field,
                            arguments,
                        )))
                    }
                    function_path => Expression::FunctionCall(Box::new(FunctionCall {
                        line: call.line,
                        function_path,
                        arguments,
                        instance_call_parameters: call.instance_call_parameters,
                    })),
                }
            }
            Expression::BinaryExpression(binary) => Expression::BinaryExpression(Box::new(
                BinaryExpression {
                    left: self.clarify_expression(binary.left),
                    operator: binary.operator,
                    right: self.clarify_expression(binary.right),
                    type_annotation: binary.type_annotation,
                },
            )),
            Expression::Subscript(subscript) => Expression::Subscript(Box::new(Subscript {
                line: subscript.line,
                base: self.clarify_expression(subscript.base),
                index: self.clarify_expression(subscript.index),
                base_type: subscript.base_type,
            })),
            Expression::Cast(cast) => Expression::Cast(Box::new(Cast {
                value: self.clarify_expression(cast.value),
                to_type: self.clarify_type(cast.to_type),
                is_builtin: cast.is_builtin,
            })),
            Expression::NamedArgument { name, value } => Expression::NamedArgument {
                name: self.clarify_name(name),
                value: Box::new(self.clarify_expression(*value)),
            },
            Expression::Ref { value, value_type } => Expression::Ref {
                value: Box::new(self.clarify_expression(*value)),
                value_type,
            },
            Expression::Parentheses { value } => Expression::Parentheses {
                value: Box::new(self.clarify_expression(*value)),
            },
            Expression::VectorLiteral {
                elements,
                type_annotation,
            } => Expression::VectorLiteral {
                elements: elements
                    .into_iter()
                    .map(|element| self.clarify_expression(element))
                    .collect(),
                type_annotation,
            },
            Expression::DictLiteral {
                keys,
                values,
                annotation,
            } => Expression::DictLiteral {
                keys: keys
                    .into_iter()
                    .map(|key| self.clarify_expression(key))
                    .collect(),
                values: values
                    .into_iter()
                    .map(|value| self.clarify_expression(value))
                    .collect(),
                annotation,
            },
            Expression::MethodCall(call) => Expression::MethodCall(Box::new(MethodCall {
                line: call.line,
                instance_path: self.clarify_expression(call.instance_path),
                method: submangle(call.method, self.context),
                arguments: call
                    .arguments
                    .into_iter()
                    .map(|argument| self.clarify_expression(argument))
                    .collect(),
                instance_type: call.instance_type,
                is_algebraic_method: call.is_algebraic_method,
            })),
            Expression::Decl(decl) => Expression::Decl(Box::new(self.clarify_decl(*decl))),
            Expression::OptionalSomeCall { value } => Expression::OptionalSomeCall {
                value: Box::new(self.clarify_expression(*value)),
            },
            Expression::OptionalSomeValue { value } => Expression::OptionalSomeValue {
                value: Box::new(self.clarify_expression(*value)),
            },
            other @ (Expression::SpecialName(_)
            | Expression::BuiltinFunc(_)
            | Expression::PrivateBuiltinFunc(_)
            | Expression::SpecialMethod(_)
            | Expression::BuiltinType(_)
            | Expression::IntegerLiteral { .. }
            | Expression::DecimalLiteral { .. }
            | Expression::StringLiteral { .. }
            | Expression::CharLiteral { .. }
            | Expression::BoolLiteral(_)
            | Expression::OptionalTypeConstructor(_)) => other,
        }
    }

    fn clarify_decl(&self, decl: Decl) -> Decl {
        Decl {
            line: decl.line,
            decl_type: decl.decl_type,
            name: self.clarify_name(decl.name),
            type_: decl.type_.map(|type_| self.clarify_type(type_)),
            value: decl.value.map(|value| self.clarify_expression(value)),
        }
    }

    fn clarify_field_declaration(&self, declaration: FieldDeclaration) -> FieldDeclaration {
        FieldDeclaration {
            line: declaration.line,
            name: submangle(declaration.name, self.context),
            type_: self.clarify_type(declaration.type_),
            value: declaration
                .value
                .map(|value| self.clarify_expression(value)),
        }
    }

    fn clarify_method_declaration(&self, declaration: MethodDeclaration) -> MethodDeclaration {
        MethodDeclaration {
            line: declaration.line,
            name: submangle(declaration.name, self.context),
            parameters: self.clarify_parameters(declaration.parameters),
            arguments: self.clarify_arguments(declaration.arguments),
            return_type: self.clarify_type(declaration.return_type),
            body: self.clarify_ast(declaration.body),
        }
    }

    fn clarify_declared_fields(&self, fields: DeclaredFields) -> DeclaredFields {
        DeclaredFields {
            private: fields
                .private
                .into_iter()
                .map(|field| self.clarify_field_declaration(field))
                .collect(),
            public: fields
                .public
                .into_iter()
                .map(|field| self.clarify_field_declaration(field))
                .collect(),
        }
    }

    fn clarify_declared_methods(&self, methods: DeclaredMethods) -> DeclaredMethods {
        DeclaredMethods {
            private: methods
                .private
                .into_iter()
                .map(|method| self.clarify_method_declaration(method))
                .collect(),
            public: methods
                .public
                .into_iter()
                .map(|method| self.clarify_method_declaration(method))
                .collect(),
            special: methods
                .special
                .into_iter()
                .map(|method| self.clarify_method_declaration(method))
                .collect(),
        }
    }

    fn clarify_init_declaration(&self, declaration: InitDeclaration) -> InitDeclaration {
        InitDeclaration {
            line: declaration.line,
            arguments: self.clarify_arguments(declaration.arguments),
            body: self.clarify_ast(declaration.body),
        }
    }

    fn clarify_struct_declaration(
        &self,
        declaration: StructDeclaration,
        submangle_name: bool,
    ) -> StructDeclaration {
        let name = if submangle_name {
            submangle(declaration.name, self.context)
        } else {
            self.clarify_name(declaration.name)
        };
        StructDeclaration {
            line: declaration.line,
            name,
            parameters: self.clarify_parameters(declaration.parameters),
            interfaces: declaration
                .interfaces
                .into_iter()
                .map(|interface| self.clarify_interface(interface))
                .collect(),
            fields: self.clarify_declared_fields(declaration.fields),
            init_declarations: declaration
                .init_declarations
                .into_iter()
                .map(|init| self.clarify_init_declaration(init))
                .collect(),
            methods: self.clarify_declared_methods(declaration.methods),
        }
    }

    pub fn clarify_node(&self, node: Node) -> Node {
        match node {
            Node::Decl(decl) => Node::Decl(self.clarify_decl(decl)),
            Node::Assignment {
                line,
                left,
                operator,
                right,
            } => Node::Assignment {
                line,
                left: self.clarify_expression(left),
                operator,
                right: self.clarify_expression(right),
            },
            Node::If {
                line,
                condition,
                body,
                elifs,
                else_body,
            } => Node::If {
                line,
                condition: self.clarify_expression(condition),
                body: self.clarify_ast(body),
                elifs: elifs
                    .into_iter()
                    .map(|(condition, body)| {
                        (self.clarify_expression(condition), self.clarify_ast(body))
                    })
                    .collect(),
                else_body: self.clarify_ast(else_body),
            },
            Node::While {
                line,
                condition,
                body,
            } => Node::While {
                line,
                condition: self.clarify_expression(condition),
                body: self.clarify_ast(body),
            },
            Node::For {
                line,
                element,
                container,
                body,
                container_type,
            } => Node::For {
                line,
                element: self.clarify_name(element),
                container: self.clarify_expression(container),
                body: self.clarify_ast(body),
                container_type,
            },
            Node::Break { line } => Node::Break { line },
            Node::Return { line, value } => Node::Return {
                line,
                value: self.clarify_expression(value),
            },
            Node::InitCall { line, arguments } => Node::InitCall {
                line,
                arguments: arguments
                    .into_iter()
                    .map(|argument| self.clarify_expression(argument))
                    .collect(),
            },
            Node::FunctionCall(call) => {
                match self.clarify_expression(Expression::FunctionCall(Box::new(call))) {
                    Expression::FunctionCall(call) => Node::FunctionCall(*call),
                    Expression::MethodCall(call) => Node::MethodCall(*call),
                    Expression::OptionalSomeCall { value } => Node::FunctionCall(FunctionCall::new(
                        SPEC_LINE,
                        Expression::OptionalTypeConstructor(OptionalTypeConstructor::Some),
                        vec![*value],
                    )),
                    other => unreachable!("function call clarified into '{other}'"),
                }
            }
            Node::MethodCall(call) => {
                match self.clarify_expression(Expression::MethodCall(Box::new(call))) {
                    Expression::MethodCall(call) => Node::MethodCall(*call),
                    other => unreachable!("method call clarified into '{other}'"),
                }
            }
            Node::FunctionDeclaration(declaration) => {
                Node::FunctionDeclaration(FunctionDeclaration {
                    line: declaration.line,
                    name: self.clarify_name(declaration.name),
                    parameters: self.clarify_parameters(declaration.parameters),
                    arguments: self.clarify_arguments(declaration.arguments),
                    return_type: self.clarify_type(declaration.return_type),
                    where_clause: declaration
                        .where_clause
                        .map(|clause| self.clarify_expression(clause)),
                    body: self.clarify_ast(declaration.body),
                })
            }
            Node::StructDeclaration(declaration) => {
                Node::StructDeclaration(self.clarify_struct_declaration(declaration, false))
            }
            Node::AlgebraicDeclaration(declaration) => {
                Node::AlgebraicDeclaration(AlgebraicDeclaration {
                    line: declaration.line,
                    name: self.clarify_name(declaration.name),
                    parameters: self.clarify_parameters(declaration.parameters),
                    constructors: declaration
                        .constructors
                        .into_iter()
                        .map(|constructor| self.clarify_struct_declaration(constructor, true))
                        .collect(),
                    methods: self.clarify_declared_methods(declaration.methods),
                })
            }
            Node::InterfaceDeclaration(declaration) => {
                Node::InterfaceDeclaration(InterfaceDeclaration {
                    line: declaration.line,
                    name: self.clarify_name(declaration.name),
                    parameters: self.clarify_parameters(declaration.parameters),
                    implemented_interfaces: declaration
                        .implemented_interfaces
                        .into_iter()
                        .map(|interface| self.clarify_interface(interface))
                        .collect(),
                    fields: declaration
                        .fields
                        .into_iter()
                        .map(|field| self.clarify_field_declaration(field))
                        .collect(),
                    methods: declaration
                        .methods
                        .into_iter()
                        .map(|method| self.clarify_method_declaration(method))
                        .collect(),
                })
            }
            Node::ExtensionDeclaration(declaration) => {
                Node::ExtensionDeclaration(ExtensionDeclaration {
                    line: declaration.line,
                    name: self.clarify_name(declaration.name),
                    parameters: self.clarify_parameters(declaration.parameters),
                    interfaces: declaration
                        .interfaces
                        .into_iter()
                        .map(|interface| self.clarify_interface(interface))
                        .collect(),
                    where_clause: declaration
                        .where_clause
                        .map(|clause| self.clarify_expression(clause)),
                    methods: self.clarify_declared_methods(declaration.methods),
                })
            }
            Node::FieldDeclaration(declaration) => {
                Node::FieldDeclaration(self.clarify_field_declaration(declaration))
            }
            Node::MethodDeclaration(declaration) => {
                Node::MethodDeclaration(self.clarify_method_declaration(declaration))
            }
            Node::InitDeclaration(declaration) => {
                Node::InitDeclaration(self.clarify_init_declaration(declaration))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clarify(context: &Context, expression: Expression) -> Expression {
        Clarifier::new(context).clarify_expression(expression)
    }

    #[test]
    fn test_builtin_categories_win_over_mangling() {
        let context = Context::new("", "abc123", true);
        assert_eq!(
            clarify(&context, Expression::name("I8")),
            Expression::BuiltinType(BuiltinType::I8)
        );
        assert_eq!(
            clarify(&context, Expression::name("print")),
            Expression::BuiltinFunc(BuiltinFunc::Print)
        );
        assert_eq!(
            clarify(&context, Expression::name("True")),
            Expression::BoolLiteral(BoolLiteral::True)
        );
        assert_eq!(
            clarify(&context, Expression::name("self")),
            Expression::SpecialName(SpecialName::SelfName)
        );
    }

    #[test]
    fn test_user_names_are_mangled() {
        let context = Context::new("", "abc123", true);
        let Expression::Name(name) = clarify(&context, Expression::name("x")) else {
            panic!("expected a name");
        };
        assert_eq!(name.member, "angel_abc123_x");
        assert_eq!(name.unmangled.as_deref(), Some("x"));
    }

    #[test]
    fn test_optional_field_becomes_type_constructor() {
        let context = Context::new("", "", false);
        let field = Expression::field(1, Expression::name("Optional"), Name::new("Some"));
        assert_eq!(
            clarify(&context, field),
            Expression::OptionalTypeConstructor(OptionalTypeConstructor::Some)
        );
    }

    #[test]
    fn test_some_call_and_method_call_rewrites() {
        let context = Context::new("", "", false);
        let some_call = Expression::FunctionCall(Box::new(FunctionCall::new(
            1,
            Expression::field(1, Expression::name("Optional"), Name::new("Some")),
            vec![Expression::integer("1")],
        )));
        assert_eq!(
            clarify(&context, some_call),
            Expression::OptionalSomeCall {
                value: Box::new(Expression::integer("1")),
            }
        );

        let method_call = Expression::FunctionCall(Box::new(FunctionCall::new(
            1,
            Expression::field(1, Expression::name("point"), Name::new("scaled")),
            vec![],
        )));
        let Expression::MethodCall(call) = clarify(&context, method_call) else {
            panic!("expected a method call");
        };
        assert_eq!(call.method, Name::new("scaled"));
    }
}
