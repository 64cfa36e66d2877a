//! Analysis driver. One `Analyzer` owns the compilation session state:
//! the environment, the current diagnostic excerpt, the template-variable
//! slot table and the evaluation mode. The type-checking role lives in
//! `typechecking.rs` and the estimation role in `estimation`, both as
//! further `impl` blocks on this struct; the two are mutually recursive
//! (the checker evaluates `where`-clauses through the estimator, the
//! estimator re-infers literal types through the checker), so they share
//! one owner instead of holding back-references.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::debug;

use crate::ast::*;
use crate::constants::SPEC_LINE;
use crate::context::Context;
use crate::environment::entries::Entry;
use crate::environment::Environment;
use crate::errors::{not_implemented, Code, Error, Result};
use crate::estimation::value::Value;
use crate::typechecking::Mapping;

/// Whether builtin I/O runs for real (`Repl`) or is stubbed out with
/// dynamic values (`Compile`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalMode {
    Compile,
    Repl,
}

pub struct Analyzer {
    pub env: Environment,
    pub context: Context,
    pub(crate) code: Code,
    pub(crate) function_return_types: Vec<Type>,
    /// Template-variable slots; a slot flips `None -> Some` at most once.
    pub(crate) template_types: Vec<Option<Type>>,
    pub(crate) repl_tmp_count: usize,
    pub(crate) mode: EvalMode,
    /// Captured REPL output; `None` writes to stdout.
    pub(crate) output: Option<Rc<RefCell<Vec<String>>>>,
    /// Scripted REPL input; `None` reads from stdin.
    pub(crate) input: Option<Rc<RefCell<VecDeque<String>>>>,
}

impl Analyzer {
    pub fn new(context: Context) -> Analyzer {
        Analyzer::with_env(context, Environment::new())
    }

    pub fn with_env(context: Context, env: Environment) -> Analyzer {
        Analyzer {
            env,
            context,
            code: Code::default(),
            function_return_types: vec![],
            template_types: vec![],
            repl_tmp_count: 0,
            mode: EvalMode::Compile,
            output: None,
            input: None,
        }
    }

    pub fn repl_mode(mut self) -> Analyzer {
        self.mode = EvalMode::Repl;
        self
    }

    pub fn capture_output(&mut self) -> Rc<RefCell<Vec<String>>> {
        let buffer = Rc::new(RefCell::new(vec![]));
        self.output = Some(buffer.clone());
        buffer
    }

    pub fn script_input(&mut self, lines: impl IntoIterator<Item = String>) {
        self.input = Some(Rc::new(RefCell::new(lines.into_iter().collect())));
    }

    pub(crate) fn get_code(&self, line: usize) -> Code {
        if line == 0 || line > self.context.lines.len() {
            return Code::new("", line);
        }
        Code::new(self.context.lines[line - 1].clone(), line)
    }

    fn set_line(&mut self, line: usize) {
        if line != SPEC_LINE {
            self.code = self.get_code(line);
            self.env.update_code(self.code.clone());
        }
    }

    /// Analysis-time estimation always runs with the compile-mode I/O
    /// stubs; only the REPL's estimation pass performs real I/O.
    pub fn analyze_ast(&mut self, ast: Ast) -> Result<Ast> {
        let saved_mode = self.mode;
        self.mode = EvalMode::Compile;
        let result = ast
            .into_iter()
            .map(|node| self.analyze_node(node))
            .collect();
        self.mode = saved_mode;
        result
    }

    pub fn analyze_node(&mut self, node: Node) -> Result<Node> {
        self.set_line(node.line());
        match node {
            Node::Decl(decl) => Ok(Node::Decl(self.analyze_decl(decl)?)),
            Node::Assignment {
                line,
                left,
                operator,
                right,
            } => self.analyze_assignment(line, left, operator, right),
            Node::If {
                line,
                condition,
                body,
                elifs,
                else_body,
            } => self.analyze_if(line, condition, body, elifs, else_body),
            Node::While {
                line,
                condition,
                body,
            } => self.analyze_while(line, condition, body),
            Node::For {
                line,
                element,
                container,
                body,
                ..
            } => self.analyze_for(line, element, container, body),
            Node::Break { line } => Ok(Node::Break { line }),
            Node::Return { line, value } => self.analyze_return(line, value),
            Node::InitCall { line, arguments } => self.analyze_init_call(line, arguments),
            Node::FunctionCall(call) => {
                let mut expression = Expression::FunctionCall(Box::new(call));
                self.infer_type(&mut expression, None, &mut Mapping::new())?;
                let Expression::FunctionCall(call) = expression else {
                    unreachable!();
                };
                Ok(Node::FunctionCall(*call))
            }
            Node::MethodCall(call) => {
                let mut expression = Expression::MethodCall(Box::new(call));
                self.infer_type(&mut expression, None, &mut Mapping::new())?;
                let Expression::MethodCall(call) = expression else {
                    unreachable!();
                };
                Ok(Node::MethodCall(*call))
            }
            Node::FunctionDeclaration(declaration) => {
                self.analyze_function_declaration(declaration)
            }
            Node::StructDeclaration(declaration) => Ok(Node::StructDeclaration(
                self.analyze_struct_declaration(declaration)?,
            )),
            Node::AlgebraicDeclaration(declaration) => {
                self.analyze_algebraic_declaration(declaration)
            }
            Node::InterfaceDeclaration(declaration) => {
                self.analyze_interface_declaration(declaration)
            }
            Node::ExtensionDeclaration(declaration) => {
                self.analyze_extension_declaration(declaration)
            }
            Node::FieldDeclaration(declaration) => self.analyze_field_declaration(declaration),
            Node::MethodDeclaration(declaration) => self.analyze_method_declaration(declaration),
            Node::InitDeclaration(declaration) => self.analyze_init_declaration(declaration),
        }
    }

    fn analyze_decl(&mut self, mut decl: Decl) -> Result<Decl> {
        let resolved_type = match &mut decl.value {
            Some(value) => {
                let annotation = decl.type_.clone();
                let type_ =
                    self.infer_type(value, annotation.as_ref(), &mut Mapping::new())?;
                decl.type_ = Some(type_.clone());
                type_
            }
            None => {
                let annotation = decl
                    .type_
                    .clone()
                    .expect("the parser rejects declarations without type and value");
                let type_ = self.check_type(&annotation)?;
                decl.type_ = Some(type_.clone());
                type_
            }
        };
        debug!("declared '{}': {resolved_type}", decl.name);
        let estimated = match decl.value.clone() {
            Some(value) => Some(self.estimate_or_dynamic(&value, &resolved_type)?),
            None => None,
        };
        self.env.add_declaration(&decl, estimated);
        Ok(decl)
    }

    /// Estimate a value for the environment, degrading to a dynamic value
    /// when the expression has no static estimate. Semantic failures
    /// (division by zero, unsatisfied clauses) still abort.
    fn estimate_or_dynamic(&mut self, value: &Expression, type_: &Type) -> Result<Value> {
        match self.estimate_expression(value) {
            Ok(estimated) => Ok(estimated),
            Err(Error::NotImplemented { .. }) => Ok(Value::Dynamic(type_.clone())),
            Err(error) => Err(error),
        }
    }

    fn analyze_assignment(
        &mut self,
        line: usize,
        mut left: Expression,
        operator: Operator,
        right: Expression,
    ) -> Result<Node> {
        // `l op= r` is sugar for `l = l op r`.
        let mut right = if operator == Operator::Assign {
            right
        } else {
            Expression::binary(left.clone(), operator.to_arithmetic_operator(), right)
        };
        let left_type = self.infer_type(&mut left, None, &mut Mapping::new())?;
        let right_type = self.infer_type(&mut right, Some(&left_type), &mut Mapping::new())?;
        self.check_reassignment(&left)?;
        self.change_type(&left, right_type.clone());
        let estimated = self.estimate_or_dynamic(&right.clone(), &right_type)?;
        self.store_assigned_value(&left, estimated);
        Ok(Node::Assignment {
            line,
            left,
            operator: Operator::Assign,
            right,
        })
    }

    /// Keep the estimated environment in sync with an assignment. Targets
    /// whose base is only dynamically known have nothing to update.
    fn store_assigned_value(&mut self, left: &Expression, estimated: Value) {
        match left {
            Expression::Name(name) => {
                self.env.with_entry_mut(&name.member, |entry| {
                    if let Entry::Decl(decl_entry) = entry {
                        decl_entry.estimated_value = estimated;
                    }
                });
            }
            Expression::Field(field) => {
                let member = field.field.member.clone();
                let _ = self.with_lvalue_mut(&field.base, &mut |base| match base {
                    Value::Instance { fields, .. }
                    | Value::AlgebraicConstructorInstance { fields, .. } => {
                        fields.insert(member.clone(), estimated.clone());
                        true
                    }
                    Value::Ref { value, .. } => {
                        *value = Box::new(estimated.clone());
                        true
                    }
                    _ => false,
                });
            }
            _ => {}
        }
    }

    /// Constants are writable exactly once; variables always; anything
    /// else never.
    fn check_reassignment(&mut self, left: &Expression) -> Result<()> {
        match left {
            Expression::Name(name) => {
                let entry = self.env.get(name)?;
                match entry {
                    Entry::Decl(decl_entry) if decl_entry.is_variable() => Ok(()),
                    Entry::Decl(decl_entry) if !decl_entry.has_value => {
                        self.env.with_entry_mut(&name.member, |entry| {
                            if let Entry::Decl(decl_entry) = entry {
                                decl_entry.has_value = true;
                            }
                        });
                        Ok(())
                    }
                    Entry::Decl(decl_entry) => Err(Error::ConstantReassignment {
                        cannot_reassign: left.clone(),
                        reassignment_code: self.code.clone(),
                        definition_code: self.get_code(decl_entry.line),
                    }),
                    other_entry => Err(Error::ConstantReassignment {
                        cannot_reassign: left.clone(),
                        reassignment_code: self.code.clone(),
                        definition_code: self.get_code(match other_entry {
                            Entry::Function(entry) => entry.line,
                            Entry::Struct(entry) => entry.line,
                            _ => 0,
                        }),
                    }),
                }
            }
            // Field and subscript targets are checked through their base's
            // mutability when estimation stores the value.
            Expression::Field(_) | Expression::Subscript(_) => Ok(()),
            other => Err(Error::ConstantReassignment {
                cannot_reassign: other.clone(),
                reassignment_code: self.code.clone(),
                definition_code: self.code.clone(),
            }),
        }
    }

    fn change_type(&mut self, left: &Expression, type_: Type) {
        if let Expression::Name(name) = left {
            self.env.with_entry_mut(&name.member, |entry| {
                if let Entry::Decl(decl_entry) = entry {
                    decl_entry.type_ = type_;
                }
            });
        }
    }

    fn analyze_if_let_condition(&mut self, mut decl: Decl) -> Result<(Decl, Value)> {
        let value = decl
            .value
            .clone()
            .expect("the parser rejects let-conditions without value");
        let mut value_expression = value;
        let optional_type =
            self.infer_type(&mut value_expression, None, &mut Mapping::new())?;
        decl.value = Some(value_expression.clone());
        let Type::Optional(inner_type) = optional_type else {
            return Err(Error::TypeError {
                message: format!("'{optional_type}' is not an optional type"),
                code: self.code.clone(),
                possible_types: vec![optional_type],
            });
        };
        decl.type_ = Some((*inner_type).clone());
        let estimated = match self.estimate_or_dynamic(&value_expression, &inner_type)? {
            Value::OptionalSomeCall(inner) => *inner,
            _ => Value::Dynamic((*inner_type).clone()),
        };
        Ok((decl, estimated))
    }

    fn analyze_conditional_branch(
        &mut self,
        condition: Expression,
        body: Ast,
    ) -> Result<(Expression, Ast)> {
        match condition {
            Expression::Decl(decl) => {
                let (decl, estimated) = self.analyze_if_let_condition(*decl)?;
                self.env.inc_nesting(None);
                self.env.add_declaration(&decl, Some(estimated));
                let body = self.analyze_ast(body)?;
                self.env.dec_nesting(false);
                Ok((Expression::Decl(Box::new(decl)), body))
            }
            mut condition => {
                self.infer_type(
                    &mut condition,
                    Some(&Type::Builtin(BuiltinType::Bool)),
                    &mut Mapping::new(),
                )?;
                self.env.inc_nesting(None);
                let body = self.analyze_ast(body)?;
                self.env.dec_nesting(false);
                Ok((condition, body))
            }
        }
    }

    fn analyze_if(
        &mut self,
        line: usize,
        condition: Expression,
        body: Ast,
        elifs: Vec<(Expression, Ast)>,
        else_body: Ast,
    ) -> Result<Node> {
        let (condition, body) = self.analyze_conditional_branch(condition, body)?;
        let mut analyzed_elifs = vec![];
        for (elif_condition, elif_body) in elifs {
            analyzed_elifs.push(self.analyze_conditional_branch(elif_condition, elif_body)?);
        }
        self.env.inc_nesting(None);
        let else_body = self.analyze_ast(else_body)?;
        self.env.dec_nesting(false);
        Ok(Node::If {
            line,
            condition,
            body,
            elifs: analyzed_elifs,
            else_body,
        })
    }

    fn analyze_while(&mut self, line: usize, condition: Expression, body: Ast) -> Result<Node> {
        let (condition, body) = self.analyze_conditional_branch(condition, body)?;
        Ok(Node::While {
            line,
            condition,
            body,
        })
    }

    fn analyze_for(
        &mut self,
        line: usize,
        element: Name,
        mut container: Expression,
        body: Ast,
    ) -> Result<Node> {
        let element_type = self.create_template_type();
        let iterable_type = Type::Generic(GenericType {
            base: GenericTypeBase::Builtin(BuiltinType::Iterable),
            parameters: vec![element_type.clone()],
        });
        let container_type = self.infer_type(&mut container, None, &mut Mapping::new())?;
        self.unify_types(&container_type, Some(&iterable_type), &mut Mapping::new())?;
        self.env.inc_nesting(None);
        let resolved_element_type = self.replace_template_types(&element_type);
        let element_decl = Decl {
            line,
            decl_type: DeclType::Variable,
            name: element.clone(),
            type_: Some(resolved_element_type),
            value: None,
        };
        self.env.add_declaration(&element_decl, None);
        let body = self.analyze_ast(body)?;
        self.env.dec_nesting(false);
        Ok(Node::For {
            line,
            element,
            container,
            body,
            container_type: Some(container_type),
        })
    }

    fn analyze_return(&mut self, line: usize, mut value: Expression) -> Result<Node> {
        let Some(return_type) = self.function_return_types.last().cloned() else {
            return Err(Error::SyntaxError {
                message: "return outside of a function".to_owned(),
                code: self.code.clone(),
            });
        };
        self.infer_type(&mut value, Some(&return_type), &mut Mapping::new())?;
        Ok(Node::Return { line, value })
    }

    fn analyze_init_call(&mut self, line: usize, arguments: Vec<Expression>) -> Result<Node> {
        let mut analyzed = vec![];
        for mut argument in arguments {
            self.infer_type(&mut argument, None, &mut Mapping::new())?;
            analyzed.push(argument);
        }
        Ok(Node::InitCall {
            line,
            arguments: analyzed,
        })
    }

    fn check_declared_arguments(&mut self, arguments: Arguments) -> Result<Arguments> {
        let mut checked = vec![];
        for mut argument in arguments {
            let type_ = match &mut argument.value {
                Some(value) => {
                    let annotation = argument.type_.clone();
                    self.infer_type(value, Some(&annotation), &mut Mapping::new())?
                }
                None => self.check_type(&argument.type_)?,
            };
            argument.type_ = type_;
            checked.push(argument);
        }
        Ok(checked)
    }

    fn analyze_function_declaration(&mut self, declaration: FunctionDeclaration) -> Result<Node> {
        let FunctionDeclaration {
            line,
            name,
            parameters,
            arguments,
            return_type,
            where_clause,
            body,
        } = declaration;

        // The parameters (with their where-clause obligations) must be
        // visible while the argument and return types are checked.
        self.env.inc_nesting(None);
        if let Some(clause) = &where_clause {
            self.env.add_where_clause(clause.clone());
        }
        let signature = (|| -> Result<(Arguments, Type)> {
            self.env.add_parameters(line, &parameters)?;
            let arguments = self.check_declared_arguments(arguments)?;
            let return_type = self.check_type(&return_type)?;
            Ok((arguments, return_type))
        })();
        if where_clause.is_some() {
            self.env.remove_where_clause();
        }
        self.env.dec_nesting(false);
        let (arguments, return_type) = signature?;

        self.env.add_function(
            line,
            &name,
            &parameters,
            &arguments,
            &return_type,
            where_clause.as_ref(),
        );

        self.env.inc_nesting(None);
        if let Some(clause) = &where_clause {
            self.env.add_where_clause(clause.clone());
        }
        let body = (|| -> Result<Ast> {
            self.env.add_parameters(line, &parameters)?;
            self.env.add_arguments(line, &arguments);
            self.function_return_types.push(return_type.clone());
            let body = self.analyze_ast(body);
            self.function_return_types.pop();
            body
        })();
        if where_clause.is_some() {
            self.env.remove_where_clause();
        }
        self.env.dec_nesting(false);
        let body = body?;
        self.env.update_function_body(&name, body.clone());
        Ok(Node::FunctionDeclaration(FunctionDeclaration {
            line,
            name,
            parameters,
            arguments,
            return_type,
            where_clause,
            body,
        }))
    }

    fn analyze_method_declaration(&mut self, declaration: MethodDeclaration) -> Result<Node> {
        let MethodDeclaration {
            line,
            name,
            parameters,
            arguments,
            return_type,
            body,
        } = declaration;
        self.env.inc_nesting(None);
        let signature = (|| -> Result<(Arguments, Type)> {
            self.env.add_parameters(line, &parameters)?;
            let arguments = self.check_declared_arguments(arguments)?;
            let return_type = self.check_type(&return_type)?;
            Ok((arguments, return_type))
        })();
        self.env.dec_nesting(false);
        let (arguments, return_type) = signature?;

        self.env.add_method(line, &name, &arguments, &return_type);
        self.env.inc_nesting(None);
        self.env.add_parameters(line, &parameters)?;
        self.env.add_self(line, false);
        self.env.add_arguments(line, &arguments);
        self.function_return_types.push(return_type.clone());
        let body = self.analyze_ast(body);
        self.function_return_types.pop();
        self.env.dec_nesting(false);
        let body = body?;
        self.env.update_method_body(&name, body.clone());
        Ok(Node::MethodDeclaration(MethodDeclaration {
            line,
            name,
            parameters,
            arguments,
            return_type,
            body,
        }))
    }

    fn analyze_init_declaration(&mut self, declaration: InitDeclaration) -> Result<Node> {
        let InitDeclaration {
            line,
            arguments,
            body,
        } = declaration;
        let arguments = self.check_declared_arguments(arguments)?;
        self.env.add_init_declaration(line, &arguments);
        self.env.inc_nesting(None);
        self.env.add_self(line, true);
        self.env.add_arguments(line, &arguments);
        let body = self.analyze_ast(body);
        self.env.dec_nesting(false);
        let body = body?;
        self.env.update_init_declaration_body(&arguments, body.clone());
        Ok(Node::InitDeclaration(InitDeclaration {
            line,
            arguments,
            body,
        }))
    }

    fn analyze_field_declaration(&mut self, declaration: FieldDeclaration) -> Result<Node> {
        let FieldDeclaration {
            line,
            name,
            type_,
            value,
        } = declaration;
        let (type_, value) = match value {
            Some(mut value) => {
                let inferred = self.infer_type(&mut value, Some(&type_), &mut Mapping::new())?;
                (inferred, Some(value))
            }
            None => (self.check_type(&type_)?, None),
        };
        self.env.add_field(line, &name, &type_);
        Ok(Node::FieldDeclaration(FieldDeclaration {
            line,
            name,
            type_,
            value,
        }))
    }

    /// Synthesize the default init when the programmer wrote none:
    /// arguments are the public fields in declaration order, the body
    /// assigns every public field from its argument and every private
    /// field from its default.
    fn generate_default_init(
        &mut self,
        private_fields: &[FieldDeclaration],
        public_fields: &[FieldDeclaration],
        init_declarations: Vec<InitDeclaration>,
    ) -> Result<Vec<InitDeclaration>> {
        if !init_declarations.is_empty() {
            return Ok(init_declarations);
        }
        let mut arguments = vec![];
        let mut body: Ast = vec![];
        for field in public_fields {
            arguments.push(Argument {
                name: field.name.clone(),
                type_: field.type_.clone(),
                value: field.value.clone(),
            });
            body.push(Node::Assignment {
                line: SPEC_LINE,
                left: Expression::field(
                    SPEC_LINE,
                    Expression::SpecialName(SpecialName::SelfName),
                    field.name.clone(),
                ),
                operator: Operator::Assign,
                right: Expression::Name(field.name.clone()),
            });
        }
        for field in private_fields {
            let Some(value) = &field.value else {
                return Err(Error::PrivateFieldsNotInitializedAndNoInit {
                    field: field.name.clone(),
                    code: self.get_code(field.line),
                });
            };
            body.push(Node::Assignment {
                line: SPEC_LINE,
                left: Expression::field(
                    SPEC_LINE,
                    Expression::SpecialName(SpecialName::SelfName),
                    field.name.clone(),
                ),
                operator: Operator::Assign,
                right: value.clone(),
            });
        }
        Ok(vec![InitDeclaration {
            line: SPEC_LINE,
            arguments,
            body,
        }])
    }

    fn analyze_struct_declaration(
        &mut self,
        declaration: StructDeclaration,
    ) -> Result<StructDeclaration> {
        let StructDeclaration {
            line,
            name,
            parameters,
            interfaces,
            fields,
            init_declarations,
            methods,
        } = declaration;
        self.env.add_struct(line, &name, &parameters, &interfaces);
        self.env.inc_nesting(Some(name.clone()));
        self.env.add_parameters(line, &parameters)?;
        let result = self.analyze_struct_body(
            line,
            &name,
            &parameters,
            &interfaces,
            fields,
            init_declarations,
            methods,
        );
        self.env.dec_nesting(true);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn analyze_struct_body(
        &mut self,
        line: usize,
        name: &Name,
        parameters: &Parameters,
        interfaces: &Interfaces,
        fields: DeclaredFields,
        init_declarations: Vec<InitDeclaration>,
        methods: DeclaredMethods,
    ) -> Result<StructDeclaration> {
        let private_fields = self.analyze_field_declarations(fields.private)?;
        let public_fields = self.analyze_field_declarations(fields.public)?;
        let init_declarations =
            self.generate_default_init(&private_fields, &public_fields, init_declarations)?;
        let mut analyzed_inits = vec![];
        for init in init_declarations {
            let Node::InitDeclaration(init) = self.analyze_init_declaration(init)? else {
                unreachable!();
            };
            analyzed_inits.push(init);
        }
        let private_methods = self.analyze_method_declarations(methods.private)?;
        let public_methods = self.analyze_method_declarations(methods.public)?;
        let special_methods = self.analyze_method_declarations(methods.special)?;
        self.check_interface_implementations(interfaces, name)?;
        Ok(StructDeclaration {
            line,
            name: name.clone(),
            parameters: parameters.clone(),
            interfaces: interfaces.clone(),
            fields: DeclaredFields {
                private: private_fields,
                public: public_fields,
            },
            init_declarations: analyzed_inits,
            methods: DeclaredMethods {
                private: private_methods,
                public: public_methods,
                special: special_methods,
            },
        })
    }

    fn analyze_field_declarations(
        &mut self,
        fields: Vec<FieldDeclaration>,
    ) -> Result<Vec<FieldDeclaration>> {
        let mut analyzed = vec![];
        for field in fields {
            let Node::FieldDeclaration(field) = self.analyze_field_declaration(field)? else {
                unreachable!();
            };
            analyzed.push(field);
        }
        Ok(analyzed)
    }

    fn analyze_method_declarations(
        &mut self,
        methods: Vec<MethodDeclaration>,
    ) -> Result<Vec<MethodDeclaration>> {
        let mut analyzed = vec![];
        for method in methods {
            let Node::MethodDeclaration(method) = self.analyze_method_declaration(method)? else {
                unreachable!();
            };
            analyzed.push(method);
        }
        Ok(analyzed)
    }

    fn analyze_algebraic_declaration(
        &mut self,
        declaration: AlgebraicDeclaration,
    ) -> Result<Node> {
        let AlgebraicDeclaration {
            line,
            name,
            parameters,
            constructors,
            methods,
        } = declaration;
        self.env.add_algebraic(line, &name, &parameters);
        self.env.inc_nesting(Some(name.clone()));
        let result = (|| -> Result<Node> {
            self.env.add_parameters(line, &parameters)?;
            let mut analyzed_constructors = vec![];
            for constructor in constructors {
                analyzed_constructors.push(self.analyze_struct_declaration(constructor)?);
            }
            let private = self.analyze_method_declarations(methods.private)?;
            let public = self.analyze_method_declarations(methods.public)?;
            let special = self.analyze_method_declarations(methods.special)?;
            Ok(Node::AlgebraicDeclaration(AlgebraicDeclaration {
                line,
                name: name.clone(),
                parameters: parameters.clone(),
                constructors: analyzed_constructors,
                methods: DeclaredMethods {
                    private,
                    public,
                    special,
                },
            }))
        })();
        self.env.dec_nesting(true);
        result
    }

    fn analyze_interface_declaration(
        &mut self,
        declaration: InterfaceDeclaration,
    ) -> Result<Node> {
        let InterfaceDeclaration {
            line,
            name,
            parameters,
            implemented_interfaces,
            fields,
            methods,
        } = declaration;
        self.env
            .add_interface(line, &name, &parameters, &implemented_interfaces)?;
        self.env.inc_nesting(Some(name.clone()));
        let result = (|| -> Result<Node> {
            self.env.add_parameters(line, &parameters)?;
            let mut analyzed_fields = vec![];
            for field in fields {
                let Node::FieldDeclaration(field) = self.analyze_field_declaration(field)? else {
                    unreachable!();
                };
                analyzed_fields.push(field);
            }
            let mut analyzed_methods = vec![];
            for method in methods {
                let Node::MethodDeclaration(method) = self.analyze_method_declaration(method)?
                else {
                    unreachable!();
                };
                analyzed_methods.push(method);
            }
            Ok(Node::InterfaceDeclaration(InterfaceDeclaration {
                line,
                name: name.clone(),
                parameters: parameters.clone(),
                implemented_interfaces: implemented_interfaces.clone(),
                fields: analyzed_fields,
                methods: analyzed_methods,
            }))
        })();
        self.env.dec_nesting(true);
        result
    }

    /// Extension methods land on the extended struct's entry through the
    /// same parent-stack mechanics as inline methods.
    fn analyze_extension_declaration(
        &mut self,
        declaration: ExtensionDeclaration,
    ) -> Result<Node> {
        let ExtensionDeclaration {
            line,
            name,
            parameters,
            interfaces,
            where_clause,
            methods,
        } = declaration;
        let pushed_clause = where_clause.is_some();
        if let Some(clause) = &where_clause {
            self.env.add_where_clause(clause.clone());
        }
        self.env.inc_nesting(Some(name.clone()));
        let result = (|| -> Result<Node> {
            self.env.add_parameters(line, &parameters)?;
            let private = self.analyze_method_declarations(methods.private)?;
            let public = self.analyze_method_declarations(methods.public)?;
            let special = self.analyze_method_declarations(methods.special)?;
            Ok(Node::ExtensionDeclaration(ExtensionDeclaration {
                line,
                name: name.clone(),
                parameters: parameters.clone(),
                interfaces: interfaces.clone(),
                where_clause: where_clause.clone(),
                methods: DeclaredMethods {
                    private,
                    public,
                    special,
                },
            }))
        })();
        self.env.dec_nesting(true);
        if pushed_clause {
            self.env.remove_where_clause();
        }
        result
    }

    /// Verify that a struct supplies every field and method of each
    /// declared interface, inherited members included.
    fn check_interface_implementations(
        &mut self,
        interfaces: &Interfaces,
        name: &Name,
    ) -> Result<()> {
        let entry = if self.env.parents.len() > 1 {
            let base = self.env.parents[self.env.parents.len() - 2].clone();
            self.env.get_algebraic(&AlgebraicType {
                base,
                parameters: vec![],
                constructor: Some(name.clone()),
                constructor_types: Default::default(),
            })?
        } else {
            self.env.get(name)?
        };
        let Entry::Struct(struct_entry) = entry else {
            return Err(not_implemented(format!(
                "interface conformance is only checked for structs, got {}",
                entry.kind()
            )));
        };
        for interface in interfaces {
            let interface_entry = self.env.get_interface_entry(interface)?;
            self.check_struct_interface_implementation(&struct_entry, &interface_entry, interface)?;
        }
        Ok(())
    }

    fn check_struct_interface_implementation(
        &mut self,
        struct_entry: &crate::environment::entries::StructEntry,
        interface_entry: &crate::environment::entries::InterfaceEntry,
        interface: &Interface,
    ) -> Result<()> {
        let own_fields = interface_entry
            .fields
            .iter()
            .map(|(field_name, field_entry)| (field_name, field_entry, None));
        let inherited_fields = interface_entry
            .inherited_fields
            .iter()
            .map(|(field_name, (origin, field_entry))| (field_name, field_entry, Some(origin)));
        for (field_name, field_entry, inherited_from) in own_fields.chain(inherited_fields) {
            let mangled = crate::utils::mangle(Name::new(field_name.clone()), &self.context);
            let found = struct_entry
                .fields
                .get(field_name)
                .or_else(|| struct_entry.fields.get(&mangled.member));
            let Some(found) = found else {
                return Err(Error::MissingInterfaceMember {
                    subject: struct_entry.name.clone(),
                    interface: interface.clone(),
                    code: self.get_code(struct_entry.line),
                    missing_member: field_entry.name.clone(),
                    inherited_from: inherited_from.cloned(),
                });
            };
            if found.type_ != field_entry.type_ {
                return Err(Error::InterfaceFieldError {
                    subject: struct_entry.name.clone(),
                    interface: interface.clone(),
                    code: self.get_code(found.line),
                    field: field_entry.name.clone(),
                    subject_field_type: found.type_.clone(),
                    interface_field_type: field_entry.type_.clone(),
                    inherited_from: inherited_from.cloned(),
                });
            }
        }

        let own_methods = interface_entry
            .methods
            .iter()
            .map(|(method_name, method_entry)| (method_name, method_entry, None));
        let inherited_methods = interface_entry
            .inherited_methods
            .iter()
            .map(|(method_name, (origin, method_entry))| {
                (method_name, method_entry, Some(origin))
            });
        for (method_name, method_entry, inherited_from) in own_methods.chain(inherited_methods) {
            let mangled = crate::utils::mangle(Name::new(method_name.clone()), &self.context);
            let found = struct_entry
                .methods
                .get(method_name)
                .or_else(|| struct_entry.methods.get(&mangled.member));
            let Some(found) = found else {
                return Err(Error::MissingInterfaceMember {
                    subject: struct_entry.name.clone(),
                    interface: interface.clone(),
                    code: self.get_code(struct_entry.line),
                    missing_member: method_entry.name.clone(),
                    inherited_from: inherited_from.cloned(),
                });
            };
            self.match_method_implementation(
                interface,
                &struct_entry.name,
                method_entry,
                found,
                inherited_from.cloned(),
            )?;
        }
        Ok(())
    }

    fn match_method_implementation(
        &mut self,
        interface: &Interface,
        subject: &Name,
        interface_method: &crate::environment::entries::FunctionEntry,
        subject_method: &crate::environment::entries::FunctionEntry,
        inherited_from: Option<Interface>,
    ) -> Result<()> {
        let error = Error::InterfaceMethodError {
            subject: subject.clone(),
            interface: interface.clone(),
            code: self.get_code(subject_method.line),
            method: interface_method.name.clone(),
            subject_method_arguments: subject_method.arguments.clone(),
            subject_method_return_type: subject_method.return_type.clone(),
            interface_method_arguments: interface_method.arguments.clone(),
            interface_method_return_type: interface_method.return_type.clone(),
            inherited_from,
        };
        if self
            .unify_types(
                &subject_method.return_type,
                Some(&interface_method.return_type),
                &mut Mapping::new(),
            )
            .is_err()
        {
            return Err(error);
        }
        if interface_method.arguments.len() != subject_method.arguments.len() {
            return Err(error);
        }
        for (interface_argument, subject_argument) in interface_method
            .arguments
            .iter()
            .zip(subject_method.arguments.iter())
        {
            if self
                .unify_types(
                    &subject_argument.type_,
                    Some(&interface_argument.type_),
                    &mut Mapping::new(),
                )
                .is_err()
            {
                return Err(error);
            }
        }
        Ok(())
    }
}
