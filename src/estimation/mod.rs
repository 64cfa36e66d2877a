//! Compile-time estimation: a partial evaluator over the analyzed AST.
//! The type checker calls into it to evaluate `where`-clauses; the REPL
//! drives whole statements through it with real I/O. In compile mode the
//! I/O builtins are stubbed (`print` estimates to `Void`, `read` to a
//! dynamic string), and any value the evaluator cannot know statically is
//! a `DynamicValue` carrying its type.

pub mod value;

use num_bigint::BigInt;
use num_traits::Zero;

use crate::analysis::{Analyzer, EvalMode};
use crate::ast::*;
use crate::constants::{SELF_NAME, SPEC_LINE};
use crate::environment::entries::{Entry, InitEntry, StructEntry};
use crate::environment::Environment;
use crate::errors::{not_implemented, Error, Result};
use crate::typechecking::{apply_mapping, Mapping};

use self::value::{Function, FunctionSpec, Value};

impl Analyzer {
    /// Infer the type of an expression without touching its annotations;
    /// the estimator's view of the checker.
    pub(crate) fn infer_expr_type(
        &mut self,
        expression: &Expression,
        supertype: Option<&Type>,
    ) -> Result<Type> {
        let mut scratch = expression.clone();
        self.infer_type(&mut scratch, supertype, &mut Mapping::new())
    }

    pub fn estimate_ast(&mut self, ast: &[Node]) -> Result<Option<Value>> {
        let mut result = None;
        for node in ast {
            result = self.estimate_node(node)?;
            if let Some(value) = &result {
                if !value.is_void() {
                    return Ok(result);
                }
            }
        }
        Ok(result)
    }

    pub fn estimate_node(&mut self, node: &Node) -> Result<Option<Value>> {
        match node {
            Node::Decl(decl) => {
                self.estimate_decl(decl)?;
                Ok(None)
            }
            Node::Assignment { left, right, .. } => {
                self.estimate_assignment(left, right)?;
                Ok(None)
            }
            Node::If {
                condition,
                body,
                elifs,
                else_body,
                ..
            } => self.estimate_if(condition, body, elifs, else_body),
            Node::While {
                condition, body, ..
            } => self.estimate_while(condition, body),
            Node::For {
                element,
                container,
                body,
                ..
            } => self.estimate_for(element, container, body),
            Node::Break { .. } => Ok(Some(Value::Break)),
            Node::Return { value, .. } => Ok(Some(self.estimate_expression(value)?)),
            Node::InitCall { .. } => Ok(None),
            Node::FunctionCall(call) => self.estimate_function_call(call),
            Node::MethodCall(call) => self.estimate_method_call(call),
            Node::FunctionDeclaration(declaration) => {
                self.env.add_function(
                    declaration.line,
                    &declaration.name,
                    &declaration.parameters,
                    &declaration.arguments,
                    &declaration.return_type,
                    declaration.where_clause.as_ref(),
                );
                self.env
                    .update_function_body(&declaration.name, declaration.body.clone());
                Ok(None)
            }
            Node::MethodDeclaration(declaration) => {
                self.env.add_method(
                    declaration.line,
                    &declaration.name,
                    &declaration.arguments,
                    &declaration.return_type,
                );
                self.env
                    .update_method_body(&declaration.name, declaration.body.clone());
                Ok(None)
            }
            Node::InitDeclaration(declaration) => {
                self.env
                    .add_init_declaration(declaration.line, &declaration.arguments);
                self.env
                    .update_init_declaration_body(&declaration.arguments, declaration.body.clone());
                Ok(None)
            }
            Node::FieldDeclaration(declaration) => {
                self.env
                    .add_field(declaration.line, &declaration.name, &declaration.type_);
                Ok(None)
            }
            Node::StructDeclaration(declaration) => {
                self.estimate_struct_declaration(declaration)?;
                Ok(None)
            }
            Node::AlgebraicDeclaration(declaration) => {
                self.env
                    .add_algebraic(declaration.line, &declaration.name, &declaration.parameters);
                self.env.inc_nesting(Some(declaration.name.clone()));
                let result = (|| -> Result<()> {
                    for constructor in &declaration.constructors {
                        self.estimate_struct_declaration(constructor)?;
                    }
                    for method in declaration.methods.all() {
                        self.estimate_node(&Node::MethodDeclaration(method.clone()))?;
                    }
                    Ok(())
                })();
                self.env.dec_nesting(true);
                result?;
                Ok(None)
            }
            Node::InterfaceDeclaration(declaration) => {
                self.env.add_interface(
                    declaration.line,
                    &declaration.name,
                    &declaration.parameters,
                    &declaration.implemented_interfaces,
                )?;
                self.env.inc_nesting(Some(declaration.name.clone()));
                let result = (|| -> Result<()> {
                    for field in &declaration.fields {
                        self.estimate_node(&Node::FieldDeclaration(field.clone()))?;
                    }
                    for method in &declaration.methods {
                        self.estimate_node(&Node::MethodDeclaration(method.clone()))?;
                    }
                    Ok(())
                })();
                self.env.dec_nesting(true);
                result?;
                Ok(None)
            }
            Node::ExtensionDeclaration(declaration) => {
                self.env.inc_nesting(Some(declaration.name.clone()));
                let result = (|| -> Result<()> {
                    for method in declaration.methods.all() {
                        self.estimate_node(&Node::MethodDeclaration(method.clone()))?;
                    }
                    Ok(())
                })();
                self.env.dec_nesting(true);
                result?;
                Ok(None)
            }
        }
    }

    fn estimate_decl(&mut self, decl: &Decl) -> Result<()> {
        let estimated = match &decl.value {
            Some(value) => Some(self.estimate_expression(value)?),
            None => None,
        };
        self.env.add_declaration(decl, estimated);
        Ok(())
    }

    fn estimate_struct_declaration(&mut self, declaration: &StructDeclaration) -> Result<()> {
        self.env.add_struct(
            declaration.line,
            &declaration.name,
            &declaration.parameters,
            &declaration.interfaces,
        );
        self.env.inc_nesting(Some(declaration.name.clone()));
        let result = (|| -> Result<()> {
            for field in declaration.fields.all() {
                self.estimate_node(&Node::FieldDeclaration(field.clone()))?;
            }
            for init in &declaration.init_declarations {
                self.estimate_node(&Node::InitDeclaration(init.clone()))?;
            }
            for method in declaration.methods.all() {
                self.estimate_node(&Node::MethodDeclaration(method.clone()))?;
            }
            Ok(())
        })();
        self.env.dec_nesting(true);
        result
    }

    fn estimate_assignment(&mut self, left: &Expression, right: &Expression) -> Result<()> {
        match left {
            Expression::Name(name) => {
                let estimated = self.estimate_expression(right)?;
                self.env.with_entry_mut(&name.member, |entry| {
                    if let Entry::Decl(decl_entry) = entry {
                        decl_entry.estimated_value = estimated;
                        decl_entry.has_value = true;
                    }
                });
                Ok(())
            }
            Expression::Field(field) => {
                let estimated = self.estimate_expression(right)?;
                let member = field.field.member.clone();
                let initial = right.clone();
                let changed = self.with_lvalue_mut(&field.base, &mut |base| match base {
                    Value::Instance { fields, .. }
                    | Value::AlgebraicConstructorInstance { fields, .. } => {
                        fields.insert(member.clone(), estimated.clone());
                        true
                    }
                    Value::Ref {
                        value,
                        initial_expression,
                    } => {
                        *value = Box::new(estimated.clone());
                        *initial_expression = initial.clone();
                        true
                    }
                    _ => false,
                })?;
                if changed {
                    Ok(())
                } else {
                    Err(not_implemented(format!(
                        "cannot estimate field assignment to '{left}'"
                    )))
                }
            }
            Expression::Subscript(subscript) => {
                let estimated = self.estimate_expression(right)?;
                let index = self.estimate_expression(&subscript.index)?;
                let changed = self.with_lvalue_mut(&subscript.base, &mut |base| {
                    assign_subscript(base, &index, &estimated)
                })?;
                if changed {
                    Ok(())
                } else {
                    Err(not_implemented(format!(
                        "cannot estimate subscript assignment to '{left}'"
                    )))
                }
            }
            other => Err(not_implemented(format!("cannot reassign '{other}'"))),
        }
    }

    /// Navigate an lvalue chain down to a mutable estimated value. Returns
    /// whether the callback reported a successful mutation.
    pub(crate) fn with_lvalue_mut(
        &self,
        expression: &Expression,
        f: &mut dyn FnMut(&mut Value) -> bool,
    ) -> Result<bool> {
        match expression {
            Expression::Name(name) => Ok(self
                .env
                .with_entry_mut(&name.member, |entry| match entry {
                    Entry::Decl(decl_entry) => f(&mut decl_entry.estimated_value),
                    _ => false,
                })
                .unwrap_or(false)),
            Expression::SpecialName(special) => Ok(self
                .env
                .with_entry_mut(special.as_str(), |entry| match entry {
                    Entry::Decl(decl_entry) => f(&mut decl_entry.estimated_value),
                    _ => false,
                })
                .unwrap_or(false)),
            Expression::Field(field) => {
                let member = field.field.member.clone();
                self.with_lvalue_mut(&field.base, &mut |base| match base {
                    Value::Instance { fields, .. }
                    | Value::AlgebraicConstructorInstance { fields, .. } => fields
                        .get_mut(&member)
                        .map(|nested| f(nested))
                        .unwrap_or(false),
                    Value::Ref { value, .. } if member == "value" => f(value),
                    _ => false,
                })
            }
            Expression::Parentheses { value } => self.with_lvalue_mut(value, f),
            _ => Ok(false),
        }
    }

    pub fn estimate_expression(&mut self, expression: &Expression) -> Result<Value> {
        match expression {
            Expression::Name(name) => self.estimate_name(name),
            Expression::SpecialName(special) => self.estimate_name(&Name::new(special.as_str())),
            Expression::Field(field) => self.estimate_field(field),
            Expression::Subscript(subscript) => self.estimate_subscript(subscript),
            Expression::BinaryExpression(binary) => self.estimate_binary_expression(binary),
            Expression::Cast(cast) => self.estimate_cast(cast),
            Expression::Ref { value, .. } => {
                let current = self.estimate_expression(value)?;
                Ok(Value::Ref {
                    value: Box::new(current),
                    initial_expression: (**value).clone(),
                })
            }
            Expression::Parentheses { value } => self.estimate_expression(value),
            Expression::FunctionCall(call) => {
                let result = self.estimate_function_call(call)?;
                Ok(result.unwrap_or(Value::Void))
            }
            Expression::MethodCall(call) => {
                let result = self.estimate_method_call(call)?;
                Ok(result.unwrap_or(Value::Void))
            }
            Expression::BuiltinFunc(func) => Ok(Value::Function(Box::new(
                self.builtin_function_value(*func),
            ))),
            Expression::PrivateBuiltinFunc(func) => match func {
                PrivateBuiltinFunc::VectorToString => Ok(Value::Function(Box::new(Function {
                    name: Name::new(func.as_str()),
                    parameters: vec![],
                    arguments: vec![Argument::new(
                        "value",
                        Type::Vector(Box::new(Type::Builtin(
                            BuiltinType::ConvertibleToString,
                        ))),
                    )],
                    return_type: Type::Builtin(BuiltinType::String),
                    where_clauses: vec![],
                    specification: FunctionSpec::VectorToString,
                    saved_environment: vec![],
                }))),
            },
            Expression::Decl(decl) => {
                self.estimate_decl(decl)?;
                Ok(Value::Void)
            }
            Expression::NamedArgument { value, .. } => self.estimate_expression(value),
            Expression::OptionalSomeCall { value } => Ok(Value::OptionalSomeCall(Box::new(
                self.estimate_expression(value)?,
            ))),
            Expression::OptionalSomeValue { value } => {
                match self.estimate_expression(value)? {
                    Value::OptionalSomeCall(inner) => Ok(*inner),
                    Value::Dynamic(Type::Optional(inner)) => Ok(Value::Dynamic(*inner)),
                    other => Err(not_implemented(format!(
                        "cannot unwrap '{other}' as an optional"
                    ))),
                }
            }
            Expression::OptionalTypeConstructor(constructor) => {
                Ok(Value::OptionalConstructor(*constructor))
            }
            Expression::IntegerLiteral { value, .. } => {
                let type_ = self.infer_expr_type(expression, None)?;
                let Type::Builtin(builtin) = type_ else {
                    return Err(not_implemented("integer literal with non-builtin type"));
                };
                let parsed: BigInt = value
                    .parse()
                    .map_err(|_| not_implemented("bad integer literal"))?;
                Ok(Value::Int(parsed, builtin))
            }
            Expression::DecimalLiteral { value } => {
                let type_ = self.infer_expr_type(expression, None)?;
                let Type::Builtin(builtin) = type_ else {
                    return Err(not_implemented("decimal literal with non-builtin type"));
                };
                let parsed: f64 = value
                    .parse()
                    .map_err(|_| not_implemented("bad decimal literal"))?;
                Ok(Value::Float(parsed, builtin))
            }
            Expression::StringLiteral { value } => Ok(Value::String(value.clone())),
            Expression::CharLiteral { value } => Ok(Value::Char(*value)),
            Expression::BoolLiteral(literal) => {
                Ok(Value::Bool(*literal == BoolLiteral::True))
            }
            Expression::VectorLiteral { .. } => {
                let vector_type = self.infer_expr_type(expression, None)?;
                let Type::Vector(element_type) = vector_type else {
                    return Err(not_implemented("vector literal with non-vector type"));
                };
                let Expression::VectorLiteral { elements, .. } = expression else {
                    unreachable!();
                };
                let mut estimated = vec![];
                for element in elements {
                    estimated.push(self.estimate_expression(element)?);
                }
                Ok(Value::Vector {
                    elements: estimated,
                    element_type: *element_type,
                })
            }
            Expression::DictLiteral { keys, values, .. } => {
                let dict_type = self.infer_expr_type(expression, None)?;
                let Type::Dict(key_type, value_type) = dict_type else {
                    return Err(not_implemented("dict literal with non-dict type"));
                };
                let mut estimated_keys = vec![];
                let mut estimated_values = vec![];
                for (key, dict_value) in keys.iter().zip(values.iter()) {
                    estimated_keys.push(self.estimate_expression(key)?);
                    estimated_values.push(self.estimate_expression(dict_value)?);
                }
                Ok(Value::Dict {
                    keys: estimated_keys,
                    values: estimated_values,
                    key_type: *key_type,
                    value_type: *value_type,
                })
            }
            Expression::BuiltinType(builtin) => Err(not_implemented(format!(
                "'{builtin}' cannot be estimated as a value"
            ))),
            Expression::SpecialMethod(method) => Err(not_implemented(format!(
                "'{}' cannot be estimated as a value",
                method.as_str()
            ))),
        }
    }

    fn estimate_name(&mut self, name: &Name) -> Result<Value> {
        assert!(name.module.is_none(), "module system is not supported");
        let entry = self.env.get(name)?;
        match entry {
            Entry::Decl(decl_entry) => Ok(decl_entry.estimated_value),
            Entry::Function(function_entry) => {
                Ok(Value::Function(Box::new(function_entry.to_estimated_function())))
            }
            Entry::Struct(struct_entry) => Ok(Value::Struct(struct_entry.name)),
            Entry::Algebraic(algebraic_entry) => Ok(Value::Algebraic(algebraic_entry.name)),
            other => Err(not_implemented(format!(
                "cannot estimate a {} entry",
                other.kind()
            ))),
        }
    }

    fn estimate_field(&mut self, field: &Field) -> Result<Value> {
        let base = self.estimate_expression(&field.base)?;
        let member = field.field.unmangled_or_member();
        match base {
            Value::String(string) => match member {
                "length" => Ok(Value::int(string.chars().count(), BuiltinType::U64)),
                "split" => Ok(Value::Function(Box::new(Function {
                    name: Name::new("split"),
                    parameters: vec![],
                    arguments: vec![Argument::new("by", Type::Builtin(BuiltinType::Char))],
                    return_type: Type::Vector(Box::new(Type::Builtin(BuiltinType::String))),
                    where_clauses: vec![],
                    specification: FunctionSpec::StringSplit,
                    saved_environment: vec![],
                }))),
                _ => Err(self.estimation_field_error(field, "String")),
            },
            Value::Vector {
                elements,
                element_type,
            } => match member {
                "length" => Ok(Value::int(elements.len(), BuiltinType::U64)),
                "append" => Ok(Value::Function(Box::new(Function {
                    name: Name::new("append"),
                    parameters: vec![],
                    arguments: vec![Argument::new("element", element_type.clone())],
                    return_type: Type::Builtin(BuiltinType::Void),
                    where_clauses: vec![],
                    specification: FunctionSpec::VectorAppend,
                    saved_environment: vec![],
                }))),
                "pop" => Ok(Value::Function(Box::new(Function {
                    name: Name::new("pop"),
                    parameters: vec![],
                    arguments: vec![],
                    return_type: element_type.clone(),
                    where_clauses: vec![],
                    specification: FunctionSpec::VectorPop,
                    saved_environment: vec![],
                }))),
                _ => Err(self.estimation_field_error(field, "Vector")),
            },
            Value::Dict { keys, .. } => match member {
                "length" => Ok(Value::int(keys.len(), BuiltinType::U64)),
                _ => Err(self.estimation_field_error(field, "Dict")),
            },
            Value::Instance { type_, fields } => {
                if let Some(found) = fields.get(&field.field.member) {
                    return Ok(found.clone());
                }
                let Entry::Struct(struct_entry) = self.env.get(&type_)? else {
                    return Err(not_implemented(format!("'{type_}' is not a struct")));
                };
                let mangled =
                    crate::utils::submangle(field.field.clone(), &self.context).member;
                let method_entry = struct_entry
                    .methods
                    .get(&mangled)
                    .or_else(|| struct_entry.methods.get(&field.field.member))
                    .ok_or_else(|| self.estimation_field_error(field, "instance"))?;
                Ok(Value::Function(Box::new(method_entry.to_estimated_function())))
            }
            Value::Algebraic(name) => {
                let Entry::Algebraic(algebraic_entry) = self.env.get(&name)? else {
                    return Err(not_implemented(format!("'{name}' is not algebraic")));
                };
                if !algebraic_entry.constructors.contains_key(&field.field.member) {
                    return Err(Error::ConstructorError {
                        algebraic: Type::Name(name),
                        constructor: field.field.member.clone(),
                        code: self.code.clone(),
                    });
                }
                Ok(Value::AlgebraicConstructor {
                    name,
                    constructor: field.field.clone(),
                })
            }
            Value::AlgebraicConstructorInstance {
                name,
                constructor,
                fields,
            } => {
                if let Some(found) = fields.get(&field.field.member) {
                    return Ok(found.clone());
                }
                let constructor_entry = self.env.get_algebraic(&AlgebraicType {
                    base: name.clone(),
                    parameters: vec![],
                    constructor: Some(constructor),
                    constructor_types: Default::default(),
                })?;
                let Entry::Struct(constructor_entry) = constructor_entry else {
                    unreachable!();
                };
                if let Some(method_entry) = constructor_entry.methods.get(&field.field.member) {
                    return Ok(Value::Function(Box::new(method_entry.to_estimated_function())));
                }
                let Entry::Algebraic(algebraic_entry) = self.env.get(&name)? else {
                    unreachable!();
                };
                let method_entry = algebraic_entry
                    .methods
                    .get(&field.field.member)
                    .ok_or_else(|| self.estimation_field_error(field, "constructor instance"))?;
                Ok(Value::Function(Box::new(method_entry.to_estimated_function())))
            }
            Value::Ref { value, .. } => {
                if member == "value" {
                    Ok(*value)
                } else {
                    Err(self.estimation_field_error(field, "reference"))
                }
            }
            Value::Dynamic(_) => {
                let field_type =
                    self.infer_expr_type(&Expression::Field(Box::new(field.clone())), None)?;
                Ok(Value::Dynamic(field_type))
            }
            other => Err(not_implemented(format!(
                "cannot estimate field access on '{other}'"
            ))),
        }
    }

    fn estimation_field_error(&self, field: &Field, kind: &str) -> Error {
        Error::FieldError {
            instance: field.base.clone(),
            instance_type: field
                .base_type
                .clone()
                .unwrap_or(Type::Builtin(BuiltinType::Void)),
            field_name: format!("{} ({kind})", field.field.unmangled_or_member()),
            code: self.code.clone(),
        }
    }

    fn estimate_subscript(&mut self, subscript: &Subscript) -> Result<Value> {
        let base = self.estimate_expression(&subscript.base)?;
        let index = self.estimate_expression(&subscript.index)?;
        match (base, index) {
            (Value::String(string), Value::Int(index, _)) => {
                let index = bigint_to_usize(&index)?;
                string
                    .chars()
                    .nth(index)
                    .map(Value::Char)
                    .ok_or_else(|| not_implemented("string index out of range"))
            }
            (Value::Vector { elements, .. }, Value::Int(index, _)) => {
                let index = bigint_to_usize(&index)?;
                elements
                    .get(index)
                    .cloned()
                    .ok_or_else(|| not_implemented("vector index out of range"))
            }
            (Value::Dict { keys, values, .. }, index) => keys
                .iter()
                .position(|key| *key == index)
                .map(|position| values[position].clone())
                .ok_or_else(|| not_implemented("missing dict key")),
            (Value::Dynamic(_), _) | (_, Value::Dynamic(_)) => {
                let subscript_type = self.infer_expr_type(
                    &Expression::Subscript(Box::new(subscript.clone())),
                    None,
                )?;
                Ok(Value::Dynamic(subscript_type))
            }
            (base, _) => Err(not_implemented(format!(
                "cannot estimate subscript on '{base}'"
            ))),
        }
    }

    fn estimate_binary_expression(&mut self, binary: &BinaryExpression) -> Result<Value> {
        if binary.operator == Operator::Is {
            return self.estimate_is(&binary.left, &binary.right);
        }
        let left = self.estimate_expression(&binary.left)?;
        let right = self.estimate_expression(&binary.right)?;
        match binary.operator {
            Operator::NotEq => {
                let result =
                    self.estimate_binary_operation(Operator::EqEq, binary, left, right)?;
                negate(result)
            }
            Operator::LtEq => {
                let result = self.estimate_binary_operation(Operator::Gt, binary, left, right)?;
                negate(result)
            }
            Operator::GtEq => {
                let result = self.estimate_binary_operation(Operator::Lt, binary, left, right)?;
                negate(result)
            }
            operator => self.estimate_binary_operation(operator, binary, left, right),
        }
    }

    /// `is` consults the subtype lattice for builtins and the recorded
    /// interface lists for named types; `Object` on the right is always
    /// true.
    fn estimate_is(&mut self, left: &Expression, right: &Expression) -> Result<Value> {
        if let Expression::BuiltinType(left_builtin) = left {
            let Expression::BuiltinType(right_builtin) = right else {
                return Ok(Value::Bool(false));
            };
            return Ok(Value::Bool(
                left_builtin
                    .get_builtin_supertypes()
                    .contains(right_builtin),
            ));
        }
        if matches!(right, Expression::BuiltinType(BuiltinType::Object)) {
            return Ok(Value::Bool(true));
        }
        let Expression::Name(left_name) = left else {
            return Err(not_implemented(format!("cannot estimate '{left} is ...'")));
        };
        let interface = match right {
            Expression::Name(name) => Interface::Name(name.clone()),
            Expression::BuiltinType(builtin) => Interface::Builtin(*builtin),
            _ => return Ok(Value::Bool(false)),
        };
        match self.env.get(left_name)? {
            Entry::Struct(struct_entry) => {
                Ok(Value::Bool(struct_entry.implements_interface(&interface)))
            }
            Entry::Parameter(parameter_entry) => {
                Ok(Value::Bool(parameter_entry.implements_interface(&interface)))
            }
            other => Err(not_implemented(format!(
                "cannot estimate 'is' on a {} entry",
                other.kind()
            ))),
        }
    }

    fn estimate_binary_operation(
        &mut self,
        operator: Operator,
        binary: &BinaryExpression,
        left: Value,
        right: Value,
    ) -> Result<Value> {
        use Operator::*;
        // Arithmetic with an unknown operand stays unknown; comparisons on
        // an unknown operand produce an unknown boolean.
        match (&left, &right) {
            (Value::Dynamic(type_), _) | (_, Value::Dynamic(type_)) => {
                if operator == Div {
                    if let Value::Int(divisor, _) = &right {
                        if divisor.is_zero() {
                            return Err(Error::DivByZero);
                        }
                    }
                }
                return Ok(match operator {
                    Add | Sub | Mul | Div => Value::Dynamic(type_.clone()),
                    _ => Value::Dynamic(Type::Builtin(BuiltinType::Bool)),
                });
            }
            _ => {}
        }
        match (operator, left, right) {
            (And, Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(x && y)),
            (Or, Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(x || y)),

            (Add, Value::Int(x, _), Value::Int(y, _)) => self.int_result(x + y),
            (Sub, Value::Int(x, _), Value::Int(y, _)) => self.int_result(x - y),
            (Mul, Value::Int(x, _), Value::Int(y, _)) => self.int_result(x * y),
            (Div, Value::Int(x, _), Value::Int(y, _)) => {
                if y.is_zero() {
                    return Err(Error::DivByZero);
                }
                // Integer division truncates toward zero.
                self.int_result(x / y)
            }
            (Add, Value::Float(x, type_), Value::Float(y, _)) => Ok(Value::Float(x + y, type_)),
            (Sub, Value::Float(x, type_), Value::Float(y, _)) => Ok(Value::Float(x - y, type_)),
            (Mul, Value::Float(x, type_), Value::Float(y, _)) => Ok(Value::Float(x * y, type_)),
            (Div, Value::Float(x, type_), Value::Float(y, _)) => {
                if y == 0.0 {
                    return Err(Error::DivByZero);
                }
                Ok(Value::Float(x / y, type_))
            }
            (Add, Value::String(x), Value::String(y)) => Ok(Value::String(x + &y)),
            (Add, Value::Vector { elements, element_type }, Value::Vector { elements: other, element_type: other_type }) => {
                let element_type = if elements.is_empty() {
                    other_type
                } else {
                    element_type
                };
                let mut elements = elements;
                elements.extend(other);
                Ok(Value::Vector {
                    elements,
                    element_type,
                })
            }
            (
                Add | Sub | Mul | Div,
                x @ Value::Instance { .. },
                Value::Instance { .. },
            ) => {
                let method = SpecialMethod::from_operator(operator)
                    .expect("arithmetic operators have special methods");
                let Value::Instance { type_, .. } = &x else {
                    unreachable!();
                };
                let instance_type = Type::Name(type_.clone());
                self.dispatch_special_method(
                    method,
                    &binary.left,
                    instance_type,
                    std::slice::from_ref(&binary.right),
                )
            }

            (EqEq, Value::Int(x, _), Value::Int(y, _)) => Ok(Value::Bool(x == y)),
            (EqEq, Value::Float(x, _), Value::Float(y, _)) => Ok(Value::Bool(x == y)),
            (EqEq, Value::String(x), Value::String(y)) => Ok(Value::Bool(x == y)),
            (EqEq, Value::Char(x), Value::Char(y)) => Ok(Value::Bool(x == y)),
            (EqEq, Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(x == y)),
            (EqEq, Value::OptionalConstructor(x), Value::OptionalConstructor(y)) => {
                Ok(Value::Bool(x == y))
            }
            (EqEq, Value::OptionalSomeCall(_), Value::OptionalConstructor(_))
            | (EqEq, Value::OptionalConstructor(_), Value::OptionalSomeCall(_)) => {
                Ok(Value::Bool(false))
            }
            (EqEq, Value::OptionalSomeCall(x), Value::OptionalSomeCall(y)) => {
                Ok(Value::Bool(x == y))
            }
            (EqEq, x @ Value::Instance { .. }, Value::Instance { .. }) => {
                let Value::Instance { type_, .. } = &x else {
                    unreachable!();
                };
                let instance_type = Type::Name(type_.clone());
                self.dispatch_special_method(
                    SpecialMethod::Eq,
                    &binary.left,
                    instance_type,
                    std::slice::from_ref(&binary.right),
                )
            }

            (Lt, Value::Int(x, _), Value::Int(y, _)) => Ok(Value::Bool(x < y)),
            (Gt, Value::Int(x, _), Value::Int(y, _)) => Ok(Value::Bool(x > y)),
            (Lt, Value::Float(x, _), Value::Float(y, _)) => Ok(Value::Bool(x < y)),
            (Gt, Value::Float(x, _), Value::Float(y, _)) => Ok(Value::Bool(x > y)),

            (operator, left, right) => Err(not_implemented(format!(
                "cannot estimate '{left} {operator} {right}'"
            ))),
        }
    }

    fn int_result(&mut self, value: BigInt) -> Result<Value> {
        let inferred = self.infer_expr_type(&Expression::integer(value.to_string()), None)?;
        let Type::Builtin(builtin) = inferred else {
            return Err(not_implemented("integer arithmetic produced a non-builtin"));
        };
        Ok(Value::Int(value, builtin))
    }

    /// Dispatch `__add__`-style methods on a user instance.
    fn dispatch_special_method(
        &mut self,
        method: SpecialMethod,
        instance: &Expression,
        instance_type: Type,
        arguments: &[Expression],
    ) -> Result<Value> {
        let Type::Name(type_name) = &instance_type else {
            return Err(not_implemented("special method on a non-named type"));
        };
        let Entry::Struct(struct_entry) = self.env.get(type_name)? else {
            return Err(not_implemented(format!("'{type_name}' is not a struct")));
        };
        let mangled =
            crate::utils::submangle(Name::new(method.as_str()), &self.context).member;
        let method_entry = struct_entry
            .methods
            .get(&mangled)
            .or_else(|| struct_entry.methods.get(method.as_str()))
            .ok_or_else(|| Error::FieldError {
                instance: instance.clone(),
                instance_type: instance_type.clone(),
                field_name: method.as_str().to_owned(),
                code: self.code.clone(),
            })?
            .clone();
        let function = method_entry.to_estimated_function();
        let result = self.perform_function_call(
            &function,
            arguments,
            Some((instance_type, instance.clone())),
        )?;
        Ok(result.unwrap_or(Value::Void))
    }

    fn estimate_cast(&mut self, cast: &Cast) -> Result<Value> {
        let value = self.estimate_expression(&cast.value)?;
        if let Value::Dynamic(_) = value {
            return Ok(Value::Dynamic(cast.to_type.clone()));
        }
        if let (Type::Name(to_name), Value::Instance { type_, .. }) = (&cast.to_type, &value) {
            // Casting an instance to its own type is the identity; the
            // user-defined conversion only matters for emission.
            if to_name == type_ {
                return Ok(value);
            }
        }
        let Type::Builtin(to_type) = &cast.to_type else {
            return Err(not_implemented(format!("cannot estimate cast to '{}'", cast.to_type)));
        };
        let to_type = *to_type;
        if to_type == BuiltinType::String {
            return Ok(match value {
                Value::Instance { type_, .. } => {
                    let instance_type = Type::Name(type_);
                    self.dispatch_special_method(
                        SpecialMethod::As,
                        &cast.value,
                        instance_type,
                        &[],
                    )?
                }
                Value::String(string) => Value::String(string),
                Value::Char(character) => Value::String(character.to_string()),
                Value::Bool(_) | Value::Dict { .. } | Value::Vector { .. } => {
                    Value::String(value.to_string())
                }
                Value::Int(int, _) => Value::String(int.to_string()),
                Value::Float(float, _) => Value::String(float.to_string()),
                other => {
                    return Err(not_implemented(format!(
                        "cannot estimate cast of '{other}' to String"
                    )))
                }
            });
        }
        match value {
            Value::Int(int, _) => Ok(Value::Int(int, to_type)),
            Value::Float(float, _) if to_type.is_finite_float_type() => {
                Ok(Value::Float(float, to_type))
            }
            Value::Float(float, _) => Ok(Value::Int(BigInt::from(float.trunc() as i64), to_type)),
            other => Err(not_implemented(format!(
                "cannot estimate cast of '{other}' to {to_type}"
            ))),
        }
    }

    fn builtin_function_value(&self, func: BuiltinFunc) -> Function {
        match func {
            BuiltinFunc::Print => Function {
                name: Name::new(func.as_str()),
                parameters: vec![],
                arguments: vec![Argument::new(
                    "value",
                    Type::Builtin(BuiltinType::ConvertibleToString),
                )],
                return_type: Type::Builtin(BuiltinType::Void),
                where_clauses: vec![],
                specification: FunctionSpec::Print,
                saved_environment: vec![],
            },
            BuiltinFunc::Read => Function {
                name: Name::new(func.as_str()),
                parameters: vec![],
                arguments: vec![Argument::new("prompt", Type::Builtin(BuiltinType::String))],
                return_type: Type::Builtin(BuiltinType::String),
                where_clauses: vec![],
                specification: FunctionSpec::Read,
                saved_environment: vec![],
            },
        }
    }

    pub(crate) fn estimate_function_call(&mut self, call: &FunctionCall) -> Result<Option<Value>> {
        let function = self.estimate_expression(&call.function_path)?;
        match function {
            Value::Struct(name) => {
                Ok(Some(self.match_init_declaration_values(&name, None, &call.arguments)?))
            }
            Value::Function(function) => {
                if function.name == "print" {
                    let argument = call.arguments.first().ok_or_else(|| {
                        not_implemented("print takes exactly one argument")
                    })?;
                    let argument_type = self.infer_expr_type(argument, None)?;
                    let cast = Expression::Cast(Box::new(Cast {
                        value: argument.clone(),
                        to_type: Type::Builtin(BuiltinType::String),
                        is_builtin: matches!(argument_type, Type::Builtin(_)),
                    }));
                    return self.perform_function_call(&function, &[cast], None);
                }
                self.perform_function_call(&function, &call.arguments, None)
            }
            Value::Dynamic(_) => {
                let call_type = self.infer_expr_type(
                    &Expression::FunctionCall(Box::new(call.clone())),
                    None,
                )?;
                Ok(Some(Value::Dynamic(call_type)))
            }
            other => {
                log::debug!("noncallable value: {other}");
                Err(Error::NoncallableCall {
                    noncallable: call.function_path.clone(),
                    code: self.code.clone(),
                })
            }
        }
    }

    pub(crate) fn estimate_method_call(&mut self, call: &MethodCall) -> Result<Option<Value>> {
        let base = self.estimate_expression(&call.instance_path)?;
        let member = call.method.unmangled_or_member().to_owned();
        match base {
            Value::String(string) => match member.as_str() {
                "split" => {
                    let by = self.estimate_expression(&call.arguments[0])?;
                    let Value::Char(by) = by else {
                        return Err(not_implemented("split delimiter must be a char"));
                    };
                    Ok(Some(split_string(&string, by)))
                }
                "length" => Ok(Some(Value::int(string.chars().count(), BuiltinType::U64))),
                _ => Err(not_implemented(format!("cannot estimate String.{member}"))),
            },
            Value::Vector {
                mut elements,
                element_type,
            } => match member.as_str() {
                "length" => Ok(Some(Value::int(elements.len(), BuiltinType::U64))),
                "append" => {
                    let element = self.estimate_expression(&call.arguments[0])?;
                    self.with_lvalue_mut(&call.instance_path, &mut |value| {
                        if let Value::Vector { elements, .. } = value {
                            elements.push(element.clone());
                            true
                        } else {
                            false
                        }
                    })?;
                    Ok(Some(Value::Void))
                }
                "pop" => {
                    let mut popped = None;
                    let mutated = self.with_lvalue_mut(&call.instance_path, &mut |value| {
                        if let Value::Vector { elements, .. } = value {
                            popped = elements.pop();
                            popped.is_some()
                        } else {
                            false
                        }
                    })?;
                    if mutated {
                        Ok(popped)
                    } else {
                        // Receiver is a temporary; pop from the copy.
                        elements
                            .pop()
                            .map(Some)
                            .ok_or_else(|| not_implemented("pop from an empty vector"))
                    }
                }
                _ => {
                    let _ = element_type;
                    Err(not_implemented(format!("cannot estimate Vector.{member}")))
                }
            },
            Value::Dict { keys, .. } => match member.as_str() {
                "length" => Ok(Some(Value::int(keys.len(), BuiltinType::U64))),
                _ => Err(not_implemented(format!("cannot estimate Dict.{member}"))),
            },
            Value::Dynamic(_) => {
                let call_type = self.infer_expr_type(
                    &Expression::MethodCall(Box::new(call.clone())),
                    None,
                )?;
                Ok(Some(Value::Dynamic(call_type)))
            }
            _ => {
                let method = self.estimate_field(&Field {
                    line: call.line,
                    base: call.instance_path.clone(),
                    field: call.method.clone(),
                    base_type: None,
                })?;
                match method {
                    Value::Function(function) => {
                        let instance_type = match &call.instance_type {
                            Some(instance_type) => instance_type.clone(),
                            None => self.infer_expr_type(&call.instance_path, None)?,
                        };
                        self.perform_function_call(
                            &function,
                            &call.arguments,
                            Some((instance_type, call.instance_path.clone())),
                        )
                    }
                    Value::AlgebraicConstructor { name, constructor } => Ok(Some(
                        self.match_init_declaration_values(
                            &constructor,
                            Some(&name),
                            &call.arguments,
                        )?,
                    )),
                    other => Err(not_implemented(format!(
                        "cannot estimate a method call through '{other}'"
                    ))),
                }
            }
        }
    }

    /// Run a function value: estimate the arguments, rebuild the callee's
    /// environment from its snapshot, bind `self` and the arguments, then
    /// estimate the body.
    pub(crate) fn perform_function_call(
        &mut self,
        function: &Function,
        arguments: &[Expression],
        self_argument: Option<(Type, Expression)>,
    ) -> Result<Option<Value>> {
        let mut estimated_arguments = vec![];
        for argument in arguments {
            estimated_arguments.push(self.estimate_expression(argument)?);
        }

        match &function.specification {
            FunctionSpec::Print => {
                let value = estimated_arguments
                    .first()
                    .cloned()
                    .unwrap_or(Value::Void);
                if self.mode == EvalMode::Repl {
                    self.write_output(&value);
                }
                Ok(Some(Value::Void))
            }
            FunctionSpec::Read => match self.mode {
                EvalMode::Compile => {
                    Ok(Some(Value::Dynamic(Type::Builtin(BuiltinType::String))))
                }
                EvalMode::Repl => {
                    let prompt = match estimated_arguments.first() {
                        Some(Value::String(prompt)) => prompt.clone(),
                        _ => String::new(),
                    };
                    Ok(Some(Value::String(self.read_input(&prompt))))
                }
            },
            FunctionSpec::VectorToString => {
                let Some(Value::Vector { elements, .. }) = estimated_arguments.first() else {
                    return Err(not_implemented("__vector_to_string takes a vector"));
                };
                Ok(Some(Value::String(render_vector(elements))))
            }
            FunctionSpec::StringSplit => {
                let Some((Type::Builtin(BuiltinType::String), self_expression)) = self_argument
                else {
                    return Err(not_implemented("split outside of a string receiver"));
                };
                let Value::String(string) = self.estimate_expression(&self_expression)? else {
                    return Err(not_implemented("split receiver must be a string"));
                };
                let Some(Value::Char(by)) = estimated_arguments.first() else {
                    return Err(not_implemented("split delimiter must be a char"));
                };
                Ok(Some(split_string(&string, *by)))
            }
            // Bound container methods called through a temporary receiver
            // have nothing to mutate.
            FunctionSpec::VectorAppend => Ok(Some(Value::Void)),
            FunctionSpec::VectorPop => Err(not_implemented("pop from an unbound vector")),
            FunctionSpec::Body(body) => {
                let estimated_self = match &self_argument {
                    Some((_, self_expression)) => {
                        Some(self.estimate_expression(self_expression)?)
                    }
                    None => None,
                };
                let backup = std::mem::replace(
                    &mut self.env,
                    Environment::from_space(function.saved_environment.clone()),
                );
                self.env.update_code(self.code.clone());
                // The snapshot's frames are shared with the caller's
                // environment; the call's bindings get their own frame.
                self.env.inc_nesting(None);
                let result = (|| -> Result<Option<Value>> {
                    if let Some((self_type, self_expression)) = &self_argument {
                        let decl = Decl {
                            line: SPEC_LINE,
                            decl_type: DeclType::Variable,
                            name: Name::new(SELF_NAME),
                            type_: Some(self_type.clone()),
                            value: Some(self_expression.clone()),
                        };
                        self.env.add_declaration(&decl, estimated_self.clone());
                    }
                    for (declared, estimated) in function
                        .arguments
                        .iter()
                        .zip(estimated_arguments.iter())
                    {
                        let decl = Decl {
                            line: SPEC_LINE,
                            decl_type: DeclType::Constant,
                            name: declared.name.clone(),
                            type_: Some(declared.type_.clone()),
                            value: declared.value.clone(),
                        };
                        self.env.add_declaration(&decl, Some(estimated.clone()));
                    }
                    self.estimate_ast(body)
                })();
                self.env = backup;
                result
            }
        }
    }

    /// Construct a struct (or algebraic constructor) instance: pick the
    /// first init-declaration whose formals accept the actual arguments,
    /// bind `self` and run the chosen body.
    fn match_init_declaration_values(
        &mut self,
        struct_name: &Name,
        algebraic: Option<&Name>,
        arguments: &[Expression],
    ) -> Result<Value> {
        let struct_entry: StructEntry = match algebraic {
            Some(base) => {
                let entry = self.env.get_algebraic(&AlgebraicType {
                    base: base.clone(),
                    parameters: vec![],
                    constructor: Some(struct_name.clone()),
                    constructor_types: Default::default(),
                })?;
                let Entry::Struct(entry) = entry else {
                    unreachable!();
                };
                entry
            }
            None => {
                let Entry::Struct(entry) = self.env.get(struct_name)? else {
                    return Err(not_implemented(format!("'{struct_name}' is not a struct")));
                };
                entry
            }
        };
        let init_declarations: Vec<InitEntry> =
            struct_entry.init_declarations.values().cloned().collect();

        let mut estimated_arguments = vec![];
        for argument in arguments {
            estimated_arguments.push(self.estimate_expression(argument)?);
        }

        let mut expected_major: Vec<Vec<Type>> = vec![];
        for init_entry in &init_declarations {
            let mut struct_mapping = Mapping::new();
            for parameter in &struct_entry.parameters {
                let template = self.create_template_type();
                struct_mapping.insert(parameter.member.clone(), template);
            }
            let mut matched = true;
            let count = init_entry.arguments.len().max(arguments.len());
            for index in 0..count {
                let Some(declared) = init_entry.arguments.get(index) else {
                    matched = false;
                    break;
                };
                let declared_type = apply_mapping(&declared.type_, &struct_mapping);
                let value = arguments
                    .get(index)
                    .cloned()
                    .or_else(|| declared.value.clone());
                let Some(value) = value else {
                    matched = false;
                    break;
                };
                match self.infer_expr_type(&value, Some(&declared_type)) {
                    Ok(_) => {}
                    Err(error) if error.is_type_error() => {
                        matched = false;
                        break;
                    }
                    Err(error) => return Err(error),
                }
            }
            if !matched {
                expected_major.push(
                    init_entry
                        .arguments
                        .iter()
                        .map(|argument| argument.type_.clone())
                        .collect(),
                );
                continue;
            }

            self.env.inc_nesting(None);
            let result = (|| -> Result<Value> {
                let self_decl = Decl {
                    line: SPEC_LINE,
                    decl_type: DeclType::Variable,
                    name: Name::new(SELF_NAME),
                    type_: Some(Type::Name(struct_name.clone())),
                    value: None,
                };
                self.env
                    .add_declaration(&self_decl, Some(Value::instance(struct_name.clone())));
                for (index, declared) in init_entry.arguments.iter().enumerate() {
                    let (value, estimated) = match arguments.get(index) {
                        Some(value) => (value.clone(), estimated_arguments[index].clone()),
                        None => {
                            let default = declared
                                .value
                                .clone()
                                .expect("matching verified the default exists");
                            let estimated = self.estimate_expression(&default)?;
                            (default, estimated)
                        }
                    };
                    let decl = Decl {
                        line: SPEC_LINE,
                        decl_type: DeclType::Constant,
                        name: declared.name.clone(),
                        type_: Some(declared.type_.clone()),
                        value: Some(value),
                    };
                    self.env.add_declaration(&decl, Some(estimated));
                }
                // `init(...)` delegation: a single init-call body forwards
                // to another overload.
                if init_entry.body.len() == 1 {
                    if let Node::InitCall { arguments, .. } = &init_entry.body[0] {
                        let arguments = arguments.clone();
                        return self.match_init_declaration_values(
                            struct_name,
                            algebraic,
                            &arguments,
                        );
                    }
                }
                self.estimate_ast(&init_entry.body)?;
                let Some(Entry::Decl(self_entry)) = self.env.get_opt(SELF_NAME) else {
                    return Err(not_implemented("'self' vanished inside init"));
                };
                Ok(self_entry.estimated_value)
            })();
            self.env.dec_nesting(false);
            let instance = result?;
            return Ok(match algebraic {
                Some(base) => match instance {
                    Value::Instance { fields, .. } => Value::AlgebraicConstructorInstance {
                        name: base.clone(),
                        constructor: struct_name.clone(),
                        fields,
                    },
                    other => other,
                },
                None => instance,
            });
        }
        let expected = expected_major
            .iter()
            .map(|types| {
                let inner = types
                    .iter()
                    .map(|type_| type_.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({inner})")
            })
            .collect::<Vec<_>>()
            .join(" or ");
        Err(Error::WrongArguments {
            expected,
            code: self.code.clone(),
            got_arguments: arguments.to_vec(),
        })
    }

    /// `if let x = opt:` desugars to a comparison against `Optional.None`
    /// on a fresh temporary, with the body binding `x` to the unwrapped
    /// value. For `while`, the caller appends an assignment that re-reads
    /// the optional before the next iteration.
    fn desugar_if_let(
        &mut self,
        condition: &Expression,
        body: &[Node],
    ) -> Result<(Expression, Vec<Node>, Option<Node>)> {
        let Expression::Decl(decl) = condition else {
            return Ok((condition.clone(), body.to_vec(), None));
        };
        if !decl.is_constant() {
            return Ok((condition.clone(), body.to_vec(), None));
        }
        let value = decl
            .value
            .clone()
            .expect("let-conditions always carry a value");
        let tmp = self.create_repl_tmp(&value)?;
        let mut desugared_body = vec![Node::Decl(Decl {
            line: decl.line,
            decl_type: DeclType::Variable,
            name: decl.name.clone(),
            type_: decl.type_.clone(),
            value: Some(Expression::OptionalSomeValue {
                value: Box::new(Expression::Name(tmp.clone())),
            }),
        })];
        desugared_body.extend(body.to_vec());
        let assignment = Node::Assignment {
            line: decl.line,
            left: Expression::Name(tmp.clone()),
            operator: Operator::Assign,
            right: value,
        };
        let condition = Expression::binary(
            Expression::Name(tmp),
            Operator::NotEq,
            Expression::OptionalTypeConstructor(OptionalTypeConstructor::None),
        );
        Ok((condition, desugared_body, Some(assignment)))
    }

    fn create_repl_tmp(&mut self, value: &Expression) -> Result<Name> {
        let name = Name::new(format!("__repl_tmp{}", self.repl_tmp_count));
        self.repl_tmp_count += 1;
        let type_ = self.infer_expr_type(value, None)?;
        let estimated = self.estimate_expression(value)?;
        let decl = Decl {
            line: SPEC_LINE,
            decl_type: DeclType::Variable,
            name: name.clone(),
            type_: Some(type_),
            value: Some(value.clone()),
        };
        self.env.add_declaration(&decl, Some(estimated));
        Ok(name)
    }

    fn estimate_condition(&mut self, condition: &Expression) -> Result<bool> {
        match self.estimate_expression(condition)? {
            Value::Bool(value) => Ok(value),
            other => Err(not_implemented(format!(
                "cannot use '{other}' as a condition"
            ))),
        }
    }

    fn estimate_if(
        &mut self,
        condition: &Expression,
        body: &[Node],
        elifs: &[(Expression, Vec<Node>)],
        else_body: &[Node],
    ) -> Result<Option<Value>> {
        let (condition, body, _) = self.desugar_if_let(condition, body)?;
        if self.estimate_condition(&condition)? {
            return self.estimate_ast(&body);
        }
        for (elif_condition, elif_body) in elifs {
            let (elif_condition, elif_body, _) = self.desugar_if_let(elif_condition, elif_body)?;
            if self.estimate_condition(&elif_condition)? {
                return self.estimate_ast(&elif_body);
            }
        }
        self.estimate_ast(else_body)
    }

    fn estimate_while(&mut self, condition: &Expression, body: &[Node]) -> Result<Option<Value>> {
        let (condition, mut body, assignment) = self.desugar_if_let(condition, body)?;
        if let Some(assignment) = assignment {
            body.push(assignment);
        }
        while self.estimate_condition(&condition)? {
            let result = self.estimate_ast(&body)?;
            match result {
                Some(Value::Break) => break,
                Some(value) if !value.is_void() => return Ok(Some(value)),
                _ => {}
            }
        }
        Ok(None)
    }

    fn estimate_for(
        &mut self,
        element: &Name,
        container: &Expression,
        body: &[Node],
    ) -> Result<Option<Value>> {
        let container_value = self.estimate_expression(container)?;
        let (elements, element_type) = match container_value {
            Value::Vector {
                elements,
                element_type,
            } => (elements, element_type),
            Value::String(string) => (
                string.chars().map(Value::Char).collect(),
                Type::Builtin(BuiltinType::Char),
            ),
            other => {
                return Err(not_implemented(format!(
                    "cannot iterate over '{other}'"
                )))
            }
        };
        self.env.inc_nesting(None);
        let result = (|| -> Result<Option<Value>> {
            for value in elements {
                let decl = Decl {
                    line: SPEC_LINE,
                    decl_type: DeclType::Constant,
                    name: element.clone(),
                    type_: Some(element_type.clone()),
                    value: None,
                };
                self.env.add_declaration(&decl, Some(value));
                let result = self.estimate_ast(body)?;
                match result {
                    Some(Value::Break) => break,
                    Some(result) if !result.is_void() => return Ok(Some(result)),
                    _ => {}
                }
            }
            Ok(None)
        })();
        self.env.dec_nesting(false);
        result
    }

    fn write_output(&mut self, value: &Value) {
        let rendered = match value {
            Value::String(string) => string.clone(),
            Value::Char(character) => character.to_string(),
            other => other.to_string(),
        };
        match &self.output {
            Some(buffer) => buffer.borrow_mut().push(rendered),
            None => println!("{rendered}"),
        }
    }

    fn read_input(&mut self, prompt: &str) -> String {
        if let Some(input) = &self.input {
            return input.borrow_mut().pop_front().unwrap_or_default();
        }
        use std::io::Write;
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        line.trim_end_matches('\n').to_owned()
    }
}

fn negate(value: Value) -> Result<Value> {
    match value {
        Value::Bool(value) => Ok(Value::Bool(!value)),
        Value::Dynamic(type_) => Ok(Value::Dynamic(type_)),
        other => Err(not_implemented(format!("cannot negate '{other}'"))),
    }
}

fn split_string(string: &str, by: char) -> Value {
    Value::Vector {
        elements: string
            .split(by)
            .map(|part| Value::String(part.to_owned()))
            .collect(),
        element_type: Type::Builtin(BuiltinType::String),
    }
}

fn render_vector(elements: &[Value]) -> String {
    let rendered = elements
        .iter()
        .map(|element| element.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{rendered}]")
}

fn bigint_to_usize(value: &BigInt) -> Result<usize> {
    use num_traits::ToPrimitive;
    value
        .to_usize()
        .ok_or_else(|| not_implemented("index does not fit in usize"))
}

fn assign_subscript(base: &mut Value, index: &Value, new_value: &Value) -> bool {
    match base {
        Value::String(string) => {
            let (Value::Int(index, _), Value::Char(character)) = (index, new_value) else {
                return false;
            };
            use num_traits::ToPrimitive;
            let Some(index) = index.to_usize() else {
                return false;
            };
            let mut characters: Vec<char> = string.chars().collect();
            if index >= characters.len() {
                return false;
            }
            characters[index] = *character;
            *string = characters.into_iter().collect();
            true
        }
        Value::Vector { elements, .. } => {
            let Value::Int(index, _) = index else {
                return false;
            };
            use num_traits::ToPrimitive;
            let Some(index) = index.to_usize() else {
                return false;
            };
            if index >= elements.len() {
                return false;
            }
            elements[index] = new_value.clone();
            true
        }
        Value::Dict { keys, values, .. } => {
            match keys.iter().position(|key| key == index) {
                Some(position) => values[position] = new_value.clone(),
                None => {
                    keys.push(index.clone());
                    values.push(new_value.clone());
                }
            }
            true
        }
        _ => false,
    }
}
