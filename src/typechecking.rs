//! Type checking and inference. `infer_type` and `unify_types` are total
//! over the closed type algebra: every ordered (subtype, supertype) pair
//! is an arm of one exhaustive match, so the completeness the original
//! dispatch tables needed a self-test for is enforced by the compiler.
//!
//! Unification is asymmetric. `unify(sub, sup)` asks whether `sub` can be
//! used where `sup` is expected and returns the type the use site gets;
//! builtin pairs consult the hard-coded supertype rows, template variables
//! fill their slot at most once, and named types route through the
//! parameter mapping accumulated during the surrounding call check.

use std::collections::HashMap;

use num_bigint::BigInt;
use num_traits::Zero;

use crate::analysis::Analyzer;
use crate::ast::*;
use crate::constants::{builtin_interface_entry, SPEC_LINE};
use crate::environment::entries::{Entry, InitEntry, ParameterEntry};
use crate::environment::Environment;
use crate::errors::{not_implemented, Error, Result};
use crate::estimation::value::Value;

pub type Mapping = HashMap<String, Type>;

/// Substitute parameter names for their mapped types, recursively.
pub fn apply_mapping(type_: &Type, mapping: &Mapping) -> Type {
    match type_ {
        Type::Name(name) => mapping
            .get(&name.member)
            .cloned()
            .unwrap_or_else(|| type_.clone()),
        Type::Builtin(_) | Type::Template(_) => type_.clone(),
        Type::Function(function) => Type::Function(Box::new(FunctionType {
            parameters: function.parameters.clone(),
            arguments: function
                .arguments
                .iter()
                .map(|argument| Argument {
                    name: argument.name.clone(),
                    type_: apply_mapping(&argument.type_, mapping),
                    value: argument.value.clone(),
                })
                .collect(),
            return_type: apply_mapping(&function.return_type, mapping),
            where_clauses: function.where_clauses.clone(),
            saved_environment: function.saved_environment.clone(),
            is_algebraic_method: function.is_algebraic_method,
        })),
        Type::Struct(struct_type) => Type::Struct(StructType {
            name: struct_type.name.clone(),
            parameters: struct_type
                .parameters
                .iter()
                .map(|parameter| apply_mapping(parameter, mapping))
                .collect(),
        }),
        Type::Algebraic(algebraic) => Type::Algebraic(Box::new(AlgebraicType {
            base: algebraic.base.clone(),
            parameters: algebraic
                .parameters
                .iter()
                .map(|parameter| apply_mapping(parameter, mapping))
                .collect(),
            constructor: algebraic.constructor.clone(),
            constructor_types: algebraic.constructor_types.clone(),
        })),
        Type::Generic(generic) => Type::Generic(GenericType {
            base: generic.base.clone(),
            parameters: generic
                .parameters
                .iter()
                .map(|parameter| apply_mapping(parameter, mapping))
                .collect(),
        }),
        Type::Dict(key, value) => Type::Dict(
            Box::new(apply_mapping(key, mapping)),
            Box::new(apply_mapping(value, mapping)),
        ),
        Type::Vector(subtype) => Type::Vector(Box::new(apply_mapping(subtype, mapping))),
        Type::Optional(inner) => Type::Optional(Box::new(apply_mapping(inner, mapping))),
        Type::Ref(value) => Type::Ref(Box::new(apply_mapping(value, mapping))),
    }
}

/// Substitute parameter names inside a `where`-clause expression before
/// handing it to the estimator.
pub fn apply_mapping_expression(expression: &Expression, mapping: &Mapping) -> Expression {
    match expression {
        Expression::Name(name) => match mapping.get(&name.member) {
            Some(Type::Builtin(builtin)) => Expression::BuiltinType(*builtin),
            Some(Type::Name(mapped)) => Expression::Name(mapped.clone()),
            _ => expression.clone(),
        },
        Expression::BinaryExpression(binary) => Expression::BinaryExpression(Box::new(
            BinaryExpression {
                left: apply_mapping_expression(&binary.left, mapping),
                operator: binary.operator,
                right: apply_mapping_expression(&binary.right, mapping),
                type_annotation: binary.type_annotation.clone(),
            },
        )),
        _ => expression.clone(),
    }
}

pub fn is_user_defined_type(type_: &Type) -> bool {
    match type_ {
        Type::Name(_) => true,
        Type::Generic(generic) => matches!(generic.base, GenericTypeBase::Name(_)),
        _ => false,
    }
}

fn build_instance_type(struct_type: &StructType) -> Type {
    if struct_type.parameters.is_empty() {
        Type::Name(struct_type.name.clone())
    } else {
        Type::Generic(GenericType {
            base: GenericTypeBase::Name(struct_type.name.clone()),
            parameters: struct_type.parameters.clone(),
        })
    }
}

/// Candidate types of an integer literal: the smallest-first interleaved
/// signed/unsigned order, with unbounded `Int` as the final fallback.
pub fn get_possible_int_types_based_on_value(value: &BigInt) -> Vec<Type> {
    let mut possible = vec![];
    let widths: [(BuiltinType, i128, i128, BuiltinType, u128); 4] = [
        (BuiltinType::I8, i8::MIN as i128, i8::MAX as i128, BuiltinType::U8, u8::MAX as u128),
        (
            BuiltinType::I16,
            i16::MIN as i128,
            i16::MAX as i128,
            BuiltinType::U16,
            u16::MAX as u128,
        ),
        (
            BuiltinType::I32,
            i32::MIN as i128,
            i32::MAX as i128,
            BuiltinType::U32,
            u32::MAX as u128,
        ),
        (
            BuiltinType::I64,
            i64::MIN as i128,
            i64::MAX as i128,
            BuiltinType::U64,
            u64::MAX as u128,
        ),
    ];
    for (signed, signed_min, signed_max, unsigned, unsigned_max) in widths {
        if *value >= BigInt::from(signed_min) && *value <= BigInt::from(signed_max) {
            possible.push(Type::Builtin(signed));
        }
        if *value >= BigInt::zero() && *value <= BigInt::from(unsigned_max) {
            possible.push(Type::Builtin(unsigned));
        }
    }
    possible.push(Type::Builtin(BuiltinType::Int));
    possible
}

pub fn get_possible_float_types_based_on_value(value: &str) -> Vec<Type> {
    let Ok(decimal) = value.parse::<f64>() else {
        return vec![];
    };
    let magnitude = decimal.abs();
    if decimal == 0.0 || (magnitude >= f32::MIN_POSITIVE as f64 && magnitude <= f32::MAX as f64) {
        vec![Type::Builtin(BuiltinType::F32), Type::Builtin(BuiltinType::F64)]
    } else if decimal.is_finite() {
        vec![Type::Builtin(BuiltinType::F64)]
    } else {
        vec![]
    }
}

/// The special method a comparison operator dispatches through; negated
/// comparisons reuse the method of their complement.
fn comparison_method(operator: Operator) -> SpecialMethod {
    match operator {
        Operator::EqEq | Operator::NotEq => SpecialMethod::Eq,
        Operator::Lt | Operator::GtEq => SpecialMethod::Lt,
        Operator::Gt | Operator::LtEq => SpecialMethod::Gt,
        _ => unreachable!("'{operator}' is not a comparison"),
    }
}

impl Analyzer {
    pub fn create_template_type(&mut self) -> Type {
        self.template_types.push(None);
        Type::Template(TemplateType {
            id: self.template_types.len() - 1,
        })
    }

    /// Resolve template variables to whatever currently fills their slot.
    pub fn replace_template_types(&self, from_type: &Type) -> Type {
        match from_type {
            Type::Template(template) => self.template_types[template.id]
                .clone()
                .unwrap_or_else(|| from_type.clone()),
            Type::Name(_) | Type::Builtin(_) => from_type.clone(),
            Type::Function(function) => Type::Function(Box::new(FunctionType {
                parameters: function.parameters.clone(),
                arguments: function
                    .arguments
                    .iter()
                    .map(|argument| Argument {
                        name: argument.name.clone(),
                        type_: self.replace_template_types(&argument.type_),
                        value: argument.value.clone(),
                    })
                    .collect(),
                return_type: self.replace_template_types(&function.return_type),
                where_clauses: function.where_clauses.clone(),
                saved_environment: function.saved_environment.clone(),
                is_algebraic_method: function.is_algebraic_method,
            })),
            Type::Dict(key, value) => Type::Dict(
                Box::new(self.replace_template_types(key)),
                Box::new(self.replace_template_types(value)),
            ),
            Type::Vector(subtype) => Type::Vector(Box::new(self.replace_template_types(subtype))),
            Type::Optional(inner) => Type::Optional(Box::new(self.replace_template_types(inner))),
            Type::Struct(struct_type) => Type::Struct(StructType {
                name: struct_type.name.clone(),
                parameters: struct_type
                    .parameters
                    .iter()
                    .map(|parameter| self.replace_template_types(parameter))
                    .collect(),
            }),
            Type::Algebraic(algebraic) => Type::Algebraic(Box::new(AlgebraicType {
                base: algebraic.base.clone(),
                parameters: algebraic
                    .parameters
                    .iter()
                    .map(|parameter| self.replace_template_types(parameter))
                    .collect(),
                constructor: algebraic.constructor.clone(),
                constructor_types: algebraic.constructor_types.clone(),
            })),
            Type::Generic(generic) => Type::Generic(GenericType {
                base: generic.base.clone(),
                parameters: generic
                    .parameters
                    .iter()
                    .map(|parameter| self.replace_template_types(parameter))
                    .collect(),
            }),
            Type::Ref(value) => Type::Ref(Box::new(self.replace_template_types(value))),
        }
    }

    fn basic_type_error(&self, subtype: &Type, supertype: &Type) -> Error {
        Error::TypeError {
            message: format!("{supertype} is not a supertype of {subtype}"),
            code: self.code.clone(),
            possible_types: vec![subtype.clone()],
        }
    }

    /// Trivial self-unification, used to validate a written annotation.
    pub fn check_type(&mut self, type_: &Type) -> Result<Type> {
        self.unify_types(&type_.clone(), Some(type_), &mut Mapping::new())
    }

    pub fn unify_types(
        &mut self,
        subtype: &Type,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let subtype = apply_mapping(subtype, mapping);
        let Some(supertype) = supertype else {
            if let Type::Name(name) = &subtype {
                return self.build_specific_name_type(name);
            }
            return Ok(self.replace_template_types(&subtype));
        };
        let supertype = apply_mapping(supertype, mapping);
        let result = self.unify_pair(&subtype, &supertype, mapping)?;
        Ok(self.replace_template_types(&result))
    }

    /// Algebraic data types used without a constructor need their
    /// constructor table attached so later `.Ctor` accesses can resolve.
    fn build_specific_name_type(&mut self, name: &Name) -> Result<Type> {
        let entry = self.env.get(name)?;
        if let Entry::Algebraic(algebraic_entry) = entry {
            let constructor_types = algebraic_entry
                .constructors
                .iter()
                .map(|(constructor_name, constructor_entry)| {
                    (constructor_name.clone(), constructor_entry.name.clone())
                })
                .collect();
            return Ok(Type::Algebraic(Box::new(AlgebraicType {
                base: name.clone(),
                parameters: vec![],
                constructor: None,
                constructor_types,
            })));
        }
        Ok(Type::Name(name.clone()))
    }

    fn unify_pair(
        &mut self,
        subtype: &Type,
        supertype: &Type,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        match (subtype, supertype) {
            // Template variables absorb whatever they meet; a filled slot
            // delegates to its content instead of being overwritten.
            (Type::Template(sub), Type::Template(sup)) => {
                let real = self.template_types[sub.id]
                    .clone()
                    .or_else(|| self.template_types[sup.id].clone());
                self.template_types[sub.id] = real.clone();
                self.template_types[sup.id] = real.clone();
                Ok(real.unwrap_or_else(|| subtype.clone()))
            }
            (_, Type::Template(sup)) => match self.template_types[sup.id].clone() {
                None => {
                    self.template_types[sup.id] = Some(subtype.clone());
                    Ok(subtype.clone())
                }
                Some(filled) => self.unify_types(subtype, Some(&filled), mapping),
            },
            (Type::Template(sub), _) => match self.template_types[sub.id].clone() {
                None => {
                    self.template_types[sub.id] = Some(supertype.clone());
                    Ok(supertype.clone())
                }
                Some(filled) => self.unify_types(&filled, Some(supertype), mapping),
            },

            (Type::Builtin(sub), Type::Builtin(sup)) => {
                if sub.get_builtin_supertypes().contains(sup) {
                    Ok(supertype.clone())
                } else {
                    Err(self.basic_type_error(subtype, supertype))
                }
            }
            (Type::Builtin(sub), Type::Generic(sup)) => {
                // `String` iterates over `Char`.
                if matches!(sup.base, GenericTypeBase::Builtin(BuiltinType::Iterable))
                    && *sub == BuiltinType::String
                {
                    let element = self.unify_types(
                        &Type::Builtin(BuiltinType::Char),
                        Some(&sup.parameters[0]),
                        mapping,
                    )?;
                    return Ok(Type::Generic(GenericType {
                        base: GenericTypeBase::Builtin(BuiltinType::Iterable),
                        parameters: vec![element],
                    }));
                }
                Err(self.basic_type_error(subtype, supertype))
            }
            (Type::Vector(sub_element), Type::Generic(sup)) => {
                if !matches!(sup.base, GenericTypeBase::Builtin(BuiltinType::Iterable)) {
                    return Err(self.basic_type_error(subtype, supertype));
                }
                let element = self.unify_types(sub_element, Some(&sup.parameters[0]), mapping)?;
                Ok(Type::Generic(GenericType {
                    base: GenericTypeBase::Builtin(BuiltinType::Iterable),
                    parameters: vec![element],
                }))
            }

            // Containers convert to string, and to nothing else builtin.
            (Type::Vector(_) | Type::Dict(..) | Type::Optional(_), Type::Builtin(sup)) => {
                if *sup == BuiltinType::ConvertibleToString {
                    Ok(supertype.clone())
                } else {
                    Err(self.basic_type_error(subtype, supertype))
                }
            }
            (Type::Ref(_), Type::Builtin(sup)) => {
                if *sup == BuiltinType::Object {
                    Ok(supertype.clone())
                } else {
                    Err(self.basic_type_error(subtype, supertype))
                }
            }
            (Type::Generic(sub), Type::Builtin(sup)) => match sup {
                BuiltinType::SelfType => {
                    let parent = self
                        .env
                        .parents
                        .last()
                        .cloned()
                        .ok_or_else(|| not_implemented("Self outside of a type declaration"))?;
                    let base = match &sub.base {
                        GenericTypeBase::Name(name) => Type::Name(name.clone()),
                        GenericTypeBase::Builtin(builtin) => Type::Builtin(*builtin),
                    };
                    match self.unify_types(&base, Some(&Type::Name(parent)), mapping) {
                        Ok(_) => Ok(subtype.clone()),
                        Err(error) if error.is_type_error() => {
                            Err(self.basic_type_error(subtype, supertype))
                        }
                        Err(error) => Err(error),
                    }
                }
                BuiltinType::Object => Ok(supertype.clone()),
                _ => Err(self.basic_type_error(subtype, supertype)),
            },
            (Type::Name(sub), Type::Builtin(sup)) => {
                self.unify_name_with_builtin_type(sub, *sup, subtype, supertype, mapping)
            }
            (Type::Struct(_) | Type::Function(_) | Type::Algebraic(_), Type::Builtin(_)) => {
                Err(self.basic_type_error(subtype, supertype))
            }

            (Type::Vector(sub_element), Type::Vector(sup_element)) => {
                match self.unify_types(sub_element, Some(sup_element), mapping) {
                    Ok(element) => Ok(Type::Vector(Box::new(element))),
                    Err(_) => Err(self.basic_type_error(subtype, supertype)),
                }
            }
            (Type::Dict(sub_key, sub_value), Type::Dict(sup_key, sup_value)) => {
                let unified = self
                    .unify_types(sub_key, Some(sup_key), mapping)
                    .and_then(|key| {
                        let value = self.unify_types(sub_value, Some(sup_value), mapping)?;
                        Ok(Type::Dict(Box::new(key), Box::new(value)))
                    });
                unified.map_err(|_| self.basic_type_error(subtype, supertype))
            }
            (Type::Optional(sub_inner), Type::Optional(sup_inner)) => {
                match self.unify_types(sub_inner, Some(sup_inner), mapping) {
                    Ok(inner) => Ok(Type::Optional(Box::new(inner))),
                    Err(_) => Err(self.basic_type_error(subtype, supertype)),
                }
            }
            (Type::Ref(sub_value), Type::Ref(sup_value)) => {
                match self.unify_types(sub_value, Some(sup_value), mapping) {
                    Ok(value) => Ok(Type::Ref(Box::new(value))),
                    Err(_) => Err(self.basic_type_error(subtype, supertype)),
                }
            }
            (Type::Function(sub), Type::Function(sup)) => {
                if sub.arguments.len() != sup.arguments.len() {
                    return Err(self.basic_type_error(subtype, supertype));
                }
                let mut arguments = vec![];
                for (sub_argument, sup_argument) in sub.arguments.iter().zip(sup.arguments.iter()) {
                    let argument_type = self
                        .unify_types(&sub_argument.type_, Some(&sup_argument.type_), mapping)
                        .map_err(|_| self.basic_type_error(subtype, supertype))?;
                    arguments.push(Argument {
                        name: sub_argument.name.clone(),
                        type_: argument_type,
                        value: sub_argument.value.clone(),
                    });
                }
                let return_type = self
                    .unify_types(&sub.return_type, Some(&sup.return_type), mapping)
                    .map_err(|_| self.basic_type_error(subtype, supertype))?;
                Ok(Type::Function(Box::new(FunctionType {
                    parameters: sub.parameters.clone(),
                    arguments,
                    return_type,
                    where_clauses: sub.where_clauses.clone(),
                    saved_environment: sub.saved_environment.clone(),
                    is_algebraic_method: sub.is_algebraic_method,
                })))
            }
            (Type::Name(sub), Type::Name(sup)) => {
                let sub_entry = self.entry_possible_param(sub);
                let sup_entry = self.entry_possible_param(sup);
                let sup_is_param = matches!(sup_entry, Entry::Parameter(_));
                let sub_is_param = matches!(sub_entry, Entry::Parameter(_));
                if sup_is_param && !sub_is_param {
                    if let Some(found) = mapping.get(&sup.member).cloned() {
                        return self.unify_types(subtype, Some(&found), mapping);
                    }
                    mapping.insert(sup.member.clone(), subtype.clone());
                    return Ok(subtype.clone());
                }
                if sub.module == sup.module && sub.member == sup.member {
                    Ok(supertype.clone())
                } else {
                    Err(self.basic_type_error(subtype, supertype))
                }
            }
            (Type::Struct(sub), Type::Struct(sup)) => {
                let name =
                    self.unify_types(&Type::Name(sub.name.clone()), Some(&Type::Name(sup.name.clone())), mapping)?;
                let Type::Name(name) = name else {
                    return Err(self.basic_type_error(subtype, supertype));
                };
                let mut parameters = vec![];
                for (sub_parameter, sup_parameter) in
                    sub.parameters.iter().zip(sup.parameters.iter())
                {
                    let parameter = self
                        .unify_types(sub_parameter, Some(sup_parameter), mapping)
                        .map_err(|_| self.basic_type_error(subtype, supertype))?;
                    parameters.push(parameter);
                }
                Ok(Type::Struct(StructType { name, parameters }))
            }
            (Type::Generic(sub), Type::Generic(sup)) => {
                let base = match (&sub.base, &sup.base) {
                    (GenericTypeBase::Name(sub_name), GenericTypeBase::Name(sup_name)) => {
                        let unified = self.unify_types(
                            &Type::Name(sub_name.clone()),
                            Some(&Type::Name(sup_name.clone())),
                            mapping,
                        )?;
                        match unified {
                            Type::Name(name) => GenericTypeBase::Name(name),
                            _ => return Err(self.basic_type_error(subtype, supertype)),
                        }
                    }
                    (GenericTypeBase::Builtin(sub_builtin), GenericTypeBase::Builtin(sup_builtin))
                        if sub_builtin == sup_builtin =>
                    {
                        GenericTypeBase::Builtin(*sub_builtin)
                    }
                    _ => return Err(self.basic_type_error(subtype, supertype)),
                };
                let mut parameters = vec![];
                for (sub_parameter, sup_parameter) in
                    sub.parameters.iter().zip(sup.parameters.iter())
                {
                    let parameter = self
                        .unify_types(sub_parameter, Some(sup_parameter), mapping)
                        .map_err(|_| self.basic_type_error(subtype, supertype))?;
                    parameters.push(parameter);
                }
                Ok(Type::Generic(GenericType { base, parameters }))
            }
            (Type::Algebraic(sub), Type::Algebraic(sup)) => {
                let base = self
                    .unify_types(
                        &Type::Name(sub.base.clone()),
                        Some(&Type::Name(sup.base.clone())),
                        mapping,
                    )
                    .map_err(|_| self.basic_type_error(subtype, supertype))?;
                let Type::Name(base) = base else {
                    return Err(self.basic_type_error(subtype, supertype));
                };
                let mut parameters = vec![];
                for (sub_parameter, sup_parameter) in
                    sub.parameters.iter().zip(sup.parameters.iter())
                {
                    let parameter = self
                        .unify_types(sub_parameter, Some(sup_parameter), mapping)
                        .map_err(|_| self.basic_type_error(subtype, supertype))?;
                    parameters.push(parameter);
                }
                Ok(Type::Algebraic(Box::new(AlgebraicType {
                    base,
                    parameters,
                    constructor: sub.constructor.clone(),
                    constructor_types: sup.constructor_types.clone(),
                })))
            }
            (Type::Algebraic(sub), Type::Name(sup)) => {
                if sub.base == *sup {
                    return Ok(subtype.clone());
                }
                self.unify_type_with_name(subtype, sup, mapping)
            }
            // A bare name in supertype position may be a generic parameter
            // to bind.
            (
                Type::Builtin(_)
                | Type::Vector(_)
                | Type::Dict(..)
                | Type::Optional(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Generic(_)
                | Type::Ref(_),
                Type::Name(sup),
            ) => self.unify_type_with_name(subtype, sup, mapping),

            _ => Err(self.basic_type_error(subtype, supertype)),
        }
    }

    /// Names with no entry are treated as unbound parameters so that
    /// signature-level unification can run outside any call context.
    fn entry_possible_param(&self, name: &Name) -> Entry {
        self.env.get_opt(&name.member).unwrap_or_else(|| {
            Entry::Parameter(ParameterEntry {
                line: 0,
                name: name.clone(),
                implemented_interfaces: vec![],
                fields: Default::default(),
                methods: Default::default(),
            })
        })
    }

    fn unify_type_with_name(
        &mut self,
        subtype: &Type,
        supertype_name: &Name,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        if let Entry::Parameter(_) = self.entry_possible_param(supertype_name) {
            if let Some(found) = mapping.get(&supertype_name.member).cloned() {
                return self.unify_types(subtype, Some(&found), mapping);
            }
            mapping.insert(supertype_name.member.clone(), subtype.clone());
            return Ok(subtype.clone());
        }
        Err(self.basic_type_error(subtype, &Type::Name(supertype_name.clone())))
    }

    fn unify_name_with_builtin_type(
        &mut self,
        sub: &Name,
        sup: BuiltinType,
        subtype: &Type,
        supertype: &Type,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        if sup == BuiltinType::SelfType {
            let parent = self
                .env
                .parents
                .last()
                .cloned()
                .ok_or_else(|| not_implemented("Self outside of a type declaration"))?;
            return self.unify_types(subtype, Some(&Type::Name(parent)), mapping);
        }
        if !sup.is_interface() {
            return Err(self.basic_type_error(subtype, supertype));
        }
        let implemented = match self.env.get(sub)? {
            Entry::Struct(struct_entry) => struct_entry.implemented_interfaces,
            Entry::Parameter(parameter_entry) => parameter_entry.implemented_interfaces,
            _ => return Err(self.basic_type_error(subtype, supertype)),
        };
        if self.is_operator(&implemented, sup) {
            Ok(supertype.clone())
        } else {
            Err(self.basic_type_error(subtype, supertype))
        }
    }

    /// Whether any implemented interface is, or transitively inherits,
    /// the target builtin interface.
    fn is_operator(&self, implemented: &Interfaces, target: BuiltinType) -> bool {
        for interface in implemented {
            match interface {
                Interface::Builtin(builtin) => {
                    if *builtin == target {
                        return true;
                    }
                    if let Some(entry) = builtin_interface_entry(*builtin) {
                        if self.is_operator(&entry.implemented_interfaces, target) {
                            return true;
                        }
                    }
                }
                Interface::Name(name) => {
                    if let Some(Entry::Interface(entry)) = self.env.get_opt(&name.member) {
                        if self.is_operator(&entry.implemented_interfaces, target) {
                            return true;
                        }
                    }
                }
                Interface::Generic(_) => {}
            }
        }
        false
    }

    /// First subtype in the list that unifies wins.
    pub fn unify_list_types(
        &mut self,
        subtypes: &[Type],
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let mut failure: Option<Error> = None;
        for subtype in subtypes {
            match self.unify_types(subtype, supertype, mapping) {
                Ok(result) => return Ok(result),
                Err(error) if error.is_type_error() => failure = Some(error),
                Err(error) => return Err(error),
            }
        }
        let message = match failure {
            Some(Error::TypeError { message, .. }) => message,
            _ => "no subtypes to unify".to_owned(),
        };
        Err(Error::TypeError {
            message,
            code: self.code.clone(),
            possible_types: subtypes.to_vec(),
        })
    }

    pub fn infer_type(
        &mut self,
        value: &mut Expression,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        match value {
            Expression::Name(name) => {
                let name = name.clone();
                self.infer_type_from_name(&name, supertype, mapping)
            }
            Expression::SpecialName(special) => {
                let name = Name::new(special.as_str());
                self.infer_type_from_name(&name, supertype, mapping)
            }
            Expression::BuiltinFunc(func) => {
                let function_type = builtin_func_type(*func);
                self.unify_types(&function_type, supertype, mapping)
            }
            Expression::PrivateBuiltinFunc(func) => {
                let function_type = private_builtin_func_type(*func);
                self.unify_types(&function_type, supertype, mapping)
            }
            Expression::SpecialMethod(method) => Err(not_implemented(format!(
                "cannot infer type of bare special method '{}'",
                method.as_str()
            ))),
            Expression::BuiltinType(builtin) => Err(not_implemented(format!(
                "'{builtin}' cannot be used as a value"
            ))),
            Expression::IntegerLiteral {
                value: literal,
                type_annotation,
            } => {
                let literal = literal.clone();
                let result = self.infer_type_from_integer_literal(&literal, supertype, mapping)?;
                *type_annotation = Some(result.clone());
                Ok(result)
            }
            Expression::DecimalLiteral { value: literal } => {
                let literal = literal.clone();
                self.infer_type_from_decimal_literal(&literal, supertype, mapping)
            }
            Expression::StringLiteral { .. } => {
                self.unify_types(&Type::Builtin(BuiltinType::String), supertype, mapping)
            }
            Expression::CharLiteral { .. } => {
                self.unify_types(&Type::Builtin(BuiltinType::Char), supertype, mapping)
            }
            Expression::BoolLiteral(_) => {
                self.unify_types(&Type::Builtin(BuiltinType::Bool), supertype, mapping)
            }
            Expression::VectorLiteral { .. } => {
                self.infer_type_from_vector_literal(value, supertype, mapping)
            }
            Expression::DictLiteral { .. } => {
                self.infer_type_from_dict_literal(value, supertype, mapping)
            }
            Expression::BinaryExpression(_) => {
                self.infer_type_from_binary_expression(value, supertype, mapping)
            }
            Expression::Cast(_) => self.infer_type_from_cast(value, supertype, mapping),
            Expression::NamedArgument { value, .. } => {
                self.infer_type(&mut **value, supertype, mapping)
            }
            Expression::Field(_) => self.infer_type_from_field_expression(value, supertype, mapping),
            Expression::Subscript(_) => self.infer_type_from_subscript(value, supertype, mapping),
            Expression::Ref { value, value_type } => {
                let inner = self.infer_type(&mut **value, None, mapping)?;
                *value_type = Some(inner.clone());
                self.unify_types(&Type::Ref(Box::new(inner)), supertype, mapping)
            }
            Expression::Parentheses { value } => {
                self.infer_type(&mut **value, supertype, mapping)
            }
            Expression::FunctionCall(_) => {
                self.infer_type_from_function_call(value, supertype, mapping)
            }
            Expression::MethodCall(_) => self.infer_type_from_method_call(value, supertype, mapping),
            Expression::Decl(decl) => {
                let Some(decl_value) = decl.value.as_mut() else {
                    return Err(not_implemented("let-condition without a value"));
                };
                self.infer_type(decl_value, supertype, mapping)
            }
            Expression::OptionalTypeConstructor(_) => {
                let inner = self.create_template_type();
                self.unify_types(&Type::Optional(Box::new(inner)), supertype, mapping)
            }
            Expression::OptionalSomeCall { value } => {
                let inner = self.infer_type(&mut **value, None, mapping)?;
                self.unify_types(&Type::Optional(Box::new(inner)), supertype, mapping)
            }
            Expression::OptionalSomeValue { value } => {
                // Generated by the compiler during desugaring, so the inner
                // expression is already known to be optional.
                let optional = self.infer_type(&mut **value, None, mapping)?;
                match optional {
                    Type::Optional(inner) => Ok(*inner),
                    other => Err(not_implemented(format!(
                        "'{other}' is not an optional type"
                    ))),
                }
            }
        }
    }

    fn infer_type_from_name(
        &mut self,
        name: &Name,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let entry = self.env.get(name)?;
        match entry {
            Entry::Decl(decl_entry) => {
                self.unify_types(&decl_entry.type_, supertype, mapping)
            }
            Entry::Function(function_entry) => self.unify_types(
                &Type::Function(Box::new(function_entry.to_function_type())),
                supertype,
                mapping,
            ),
            Entry::Struct(struct_entry) => {
                let parameters = struct_entry
                    .parameters
                    .iter()
                    .map(|_| self.create_template_type())
                    .collect();
                self.unify_types(
                    &Type::Struct(StructType {
                        name: struct_entry.name.clone(),
                        parameters,
                    }),
                    supertype,
                    mapping,
                )
            }
            Entry::Algebraic(algebraic_entry) => {
                let parameters = algebraic_entry
                    .parameters
                    .iter()
                    .map(|_| self.create_template_type())
                    .collect();
                let constructor_types = algebraic_entry
                    .constructors
                    .iter()
                    .map(|(constructor_name, constructor_entry)| {
                        (constructor_name.clone(), constructor_entry.name.clone())
                    })
                    .collect();
                self.unify_types(
                    &Type::Algebraic(Box::new(AlgebraicType {
                        base: algebraic_entry.name.clone(),
                        parameters,
                        constructor: None,
                        constructor_types,
                    })),
                    supertype,
                    mapping,
                )
            }
            other => Err(not_implemented(format!(
                "cannot infer a type from a {} entry",
                other.kind()
            ))),
        }
    }

    fn infer_type_from_integer_literal(
        &mut self,
        literal: &str,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let value: BigInt = literal
            .parse()
            .unwrap_or_else(|_| panic!("the parser produced a bad integer literal '{literal}'"));
        let possible_types = get_possible_int_types_based_on_value(&value);
        match self.unify_list_types(&possible_types, supertype, mapping) {
            Ok(result) => Ok(result),
            Err(error) if error.is_type_error() => {
                let message = match supertype {
                    None if value > BigInt::zero() => format!("{literal} is too big"),
                    None => format!("{literal} is too small"),
                    Some(Type::Builtin(builtin)) if builtin.is_finite_int_type() => {
                        format!("{literal} is not in range {}", builtin.get_range())
                    }
                    Some(supertype) => {
                        format!("'{supertype}' is not a possible type for {literal}")
                    }
                };
                Err(Error::TypeError {
                    message,
                    code: self.code.clone(),
                    possible_types,
                })
            }
            Err(error) => Err(error),
        }
    }

    fn infer_type_from_decimal_literal(
        &mut self,
        literal: &str,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let possible_types = get_possible_float_types_based_on_value(literal);
        match self.unify_list_types(&possible_types, supertype, mapping) {
            Ok(result) => Ok(result),
            Err(error) if error.is_type_error() => {
                let message = match supertype {
                    None => format!("{literal} is out of the float range"),
                    Some(Type::Builtin(builtin)) if builtin.is_finite_float_type() => {
                        format!("{literal} is not in range {}", builtin.get_range())
                    }
                    Some(supertype) => {
                        format!("'{supertype}' is not a possible type for {literal}")
                    }
                };
                Err(Error::TypeError {
                    message,
                    code: self.code.clone(),
                    possible_types,
                })
            }
            Err(error) => Err(error),
        }
    }

    fn infer_type_from_vector_literal(
        &mut self,
        value: &mut Expression,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let Expression::VectorLiteral { elements, .. } = value else {
            unreachable!();
        };
        let mut elements = std::mem::take(elements);
        let mut element_type = self.create_template_type();
        for element in &mut elements {
            let current = self.infer_type(element, None, mapping)?;
            // Order matters for subtyping; retry symmetrically before
            // giving up on the element.
            element_type = match self.unify_types(&element_type, Some(&current), mapping) {
                Ok(unified) => unified,
                Err(error) if error.is_type_error() => {
                    self.unify_types(&current, Some(&element_type), mapping)?
                }
                Err(error) => return Err(error),
            };
        }
        let subtype = Type::Vector(Box::new(element_type));
        let Expression::VectorLiteral {
            elements: element_slot,
            type_annotation,
        } = value
        else {
            unreachable!();
        };
        *element_slot = elements;
        *type_annotation = Some(subtype.clone());
        self.unify_types(&subtype, supertype, mapping)
    }

    fn infer_type_from_dict_literal(
        &mut self,
        value: &mut Expression,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let Expression::DictLiteral { keys, values, .. } = value else {
            unreachable!();
        };
        let mut keys = std::mem::take(keys);
        let mut values = std::mem::take(values);
        let mut key_type = self.create_template_type();
        let mut value_type = self.create_template_type();
        for (key, dict_value) in keys.iter_mut().zip(values.iter_mut()) {
            let current_key = self.infer_type(key, None, mapping)?;
            key_type = match self.unify_types(&key_type, Some(&current_key), mapping) {
                Ok(unified) => unified,
                Err(error) if error.is_type_error() => {
                    self.unify_types(&current_key, Some(&key_type), mapping)?
                }
                Err(error) => return Err(error),
            };
            let current_value = self.infer_type(dict_value, None, mapping)?;
            value_type = match self.unify_types(&value_type, Some(&current_value), mapping) {
                Ok(unified) => unified,
                Err(error) if error.is_type_error() => {
                    self.unify_types(&current_value, Some(&value_type), mapping)?
                }
                Err(error) => return Err(error),
            };
        }
        let dict_type = Type::Dict(Box::new(key_type), Box::new(value_type));
        let Expression::DictLiteral {
            keys: key_slot,
            values: value_slot,
            annotation,
        } = value
        else {
            unreachable!();
        };
        *key_slot = keys;
        *value_slot = values;
        *annotation = Some(dict_type.clone());
        self.unify_types(&dict_type, supertype, mapping)
    }

    fn infer_type_from_binary_expression(
        &mut self,
        value: &mut Expression,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let Expression::BinaryExpression(binary) = value else {
            unreachable!();
        };
        if binary.operator == Operator::Is {
            let result =
                self.unify_types(&Type::Builtin(BuiltinType::Bool), supertype, mapping)?;
            binary.type_annotation = Some(result.clone());
            return Ok(result);
        }
        let left_type = self.infer_type(&mut binary.left, None, mapping)?;
        if binary.operator.is_comparison() {
            if is_user_defined_type(&left_type) {
                self.check_user_comparison(binary, &left_type, mapping)?;
            } else {
                self.infer_type(&mut binary.right, Some(&left_type), mapping)?;
            }
            let result =
                self.unify_types(&Type::Builtin(BuiltinType::Bool), supertype, mapping)?;
            binary.type_annotation = Some(result.clone());
            return Ok(result);
        }
        let right_type = self.infer_type(&mut binary.right, Some(&left_type), mapping)?;
        let result = self.unify_types(&right_type, supertype, mapping)?;
        binary.type_annotation = Some(result.clone());
        Ok(result)
    }

    /// Comparisons on user types dispatch through the corresponding
    /// special method, whose own `where`-clauses must hold.
    fn check_user_comparison(
        &mut self,
        binary: &mut BinaryExpression,
        left_type: &Type,
        mapping: &mut Mapping,
    ) -> Result<()> {
        let method = comparison_method(binary.operator);
        let mangled =
            crate::utils::submangle(Name::new(method.as_str()), &self.context).member;
        let entry = self.env.get_type(left_type)?;
        let methods = match &entry {
            Entry::Struct(struct_entry) => &struct_entry.methods,
            Entry::Parameter(parameter_entry) => &parameter_entry.methods,
            other => {
                return Err(not_implemented(format!(
                    "comparison on a {} entry",
                    other.kind()
                )))
            }
        };
        let method_entry = methods
            .get(&mangled)
            .or_else(|| methods.get(method.as_str()))
            .cloned();
        let Some(method_entry) = method_entry else {
            return Err(Error::FieldError {
                instance: binary.left.clone(),
                instance_type: left_type.clone(),
                field_name: mangled,
                code: self.code.clone(),
            });
        };
        if let Type::Generic(generic) = left_type {
            let mut struct_mapping = self.basic_struct_mapping_generic(generic)?;
            self.satisfy_where_clauses(&method_entry.where_clauses, &mut struct_mapping)?;
        } else {
            self.satisfy_where_clauses(&method_entry.where_clauses, mapping)?;
        }
        self.infer_type(&mut binary.right, None, mapping)?;
        Ok(())
    }

    fn infer_type_from_function_call(
        &mut self,
        value: &mut Expression,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let Expression::FunctionCall(call) = value else {
            unreachable!();
        };
        let function_type = self.infer_type(&mut call.function_path, None, &mut Mapping::new())?;
        match function_type {
            Type::Struct(struct_type) => {
                let Some(Entry::Struct(struct_entry)) =
                    self.env.get_opt(&struct_type.name.member)
                else {
                    return Err(Error::NameError {
                        name: struct_type.name.clone(),
                        code: self.code.clone(),
                    });
                };
                let init_declarations: Vec<InitEntry> =
                    struct_entry.init_declarations.values().cloned().collect();
                let result = self.match_init_declaration(
                    &struct_type,
                    &init_declarations,
                    &mut call.arguments,
                    supertype,
                    mapping,
                )?;
                if let Type::Generic(generic) = &result {
                    call.instance_call_parameters = Some(generic.parameters.clone());
                }
                Ok(result)
            }
            Type::Function(function_type) => {
                self.match_with_function_type(&function_type, &mut call.arguments, supertype, mapping)
            }
            _ => Err(Error::NoncallableCall {
                noncallable: call.function_path.clone(),
                code: self.code.clone(),
            }),
        }
    }

    /// First init-declaration whose formals accept the actual arguments
    /// wins; candidates are tried in source order.
    fn match_init_declaration(
        &mut self,
        struct_type: &StructType,
        init_declarations: &[InitEntry],
        arguments: &mut [Expression],
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let struct_mapping = self.basic_struct_mapping(&struct_type.name, &struct_type.parameters)?;
        let mut expected_major: Vec<Vec<Type>> = vec![];
        for init_entry in init_declarations {
            let mut matched = true;
            let count = init_entry.arguments.len().max(arguments.len());
            for index in 0..count {
                let Some(declared) = init_entry.arguments.get(index) else {
                    matched = false;
                    break;
                };
                let declared_type = apply_mapping(&declared.type_, &struct_mapping);
                let outcome = if let Some(actual) = arguments.get_mut(index) {
                    self.infer_type(actual, Some(&declared_type), mapping)
                } else if let Some(default) = &declared.value {
                    let mut default = default.clone();
                    self.infer_type(&mut default, Some(&declared_type), mapping)
                } else {
                    matched = false;
                    break;
                };
                match outcome {
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
            let instance_type = apply_mapping(&build_instance_type(struct_type), mapping);
            return self.unify_types(&instance_type, supertype, mapping);
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

    /// Check a call against a function type: bind fresh template types for
    /// the parameters, unify the arguments, then evaluate every
    /// `where`-clause in a sandboxed environment seeded from the callee's
    /// captured snapshot.
    pub(crate) fn match_with_function_type(
        &mut self,
        function_type: &FunctionType,
        arguments: &mut Vec<Expression>,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        for parameter in &function_type.parameters {
            let template = self.create_template_type();
            mapping.insert(parameter.member.clone(), template);
        }
        if function_type.arguments.len() != arguments.len() {
            let expected = function_type
                .arguments
                .iter()
                .map(|argument| argument.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::WrongArguments {
                expected: format!("({expected})"),
                code: self.code.clone(),
                got_arguments: arguments.clone(),
            });
        }
        for (declared, actual) in function_type.arguments.iter().zip(arguments.iter_mut()) {
            self.infer_type(actual, Some(&declared.type_), mapping)?;
        }

        // Arguments without a static estimate enter the sandbox as dynamic
        // values of their declared type.
        let mut estimated_arguments = vec![];
        for (declared, argument) in function_type.arguments.iter().zip(arguments.iter()) {
            let estimated = match self.estimate_expression(argument) {
                Ok(estimated) => estimated,
                Err(Error::NotImplemented { .. }) => {
                    Value::Dynamic(apply_mapping(&declared.type_, mapping))
                }
                Err(error) => return Err(error),
            };
            estimated_arguments.push(estimated);
        }

        let backup = std::mem::replace(
            &mut self.env,
            Environment::from_space(function_type.saved_environment.clone()),
        );
        self.env.update_code(self.code.clone());
        let sandbox_result = self.check_where_clauses_in_sandbox(
            function_type,
            arguments,
            estimated_arguments,
            mapping,
        );
        self.env = backup;
        sandbox_result?;
        self.unify_types(&function_type.return_type, supertype, mapping)
    }

    fn check_where_clauses_in_sandbox(
        &mut self,
        function_type: &FunctionType,
        arguments: &[Expression],
        estimated_arguments: Vec<Value>,
        mapping: &mut Mapping,
    ) -> Result<()> {
        // The snapshot's frames are shared with the live environment;
        // bindings for this check go into a fresh frame on top.
        self.env.inc_nesting(None);
        self.env.add_parameters(SPEC_LINE, &function_type.parameters)?;
        for ((declared, expression), estimated) in function_type
            .arguments
            .iter()
            .zip(arguments.iter())
            .zip(estimated_arguments)
        {
            let decl = Decl {
                line: SPEC_LINE,
                decl_type: DeclType::Constant,
                name: declared.name.clone(),
                type_: Some(declared.type_.clone()),
                value: Some(expression.clone()),
            };
            self.env.add_declaration(&decl, Some(estimated));
        }
        let mut replaced = Mapping::new();
        for (key, mapped) in mapping.iter() {
            replaced.insert(key.clone(), self.replace_template_types(mapped));
        }
        *mapping = replaced;
        for clause in &function_type.where_clauses {
            let applied = apply_mapping_expression(clause, mapping);
            let estimated_clause = self.estimate_expression(&applied)?;
            if !matches!(estimated_clause, Value::Bool(true)) {
                return Err(Error::UnsatisfiedWhereClause {
                    clause: applied,
                    code: self.code.clone(),
                });
            }
        }
        Ok(())
    }

    /// Map a struct's declared parameter names to the type arguments it
    /// was used with; `struct A<B, C>` seen as `A(I8, I64)` yields
    /// `{B: I8, C: I64}`.
    fn basic_struct_mapping(&mut self, name: &Name, parameters: &[Type]) -> Result<Mapping> {
        if parameters.is_empty() {
            return Ok(Mapping::new());
        }
        let Entry::Struct(entry) = self.env.get(name)? else {
            return Ok(Mapping::new());
        };
        let mut mapping = Mapping::new();
        for (declared, actual) in entry.parameters.iter().zip(parameters.iter()) {
            mapping.insert(declared.member.clone(), actual.clone());
        }
        Ok(mapping)
    }

    fn basic_struct_mapping_generic(&mut self, generic: &GenericType) -> Result<Mapping> {
        match &generic.base {
            GenericTypeBase::Name(name) => self.basic_struct_mapping(name, &generic.parameters),
            GenericTypeBase::Builtin(_) => Ok(Mapping::new()),
        }
    }

    fn infer_type_from_method_call(
        &mut self,
        value: &mut Expression,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let Expression::MethodCall(call) = value else {
            unreachable!();
        };
        let mut method_field = Field {
            line: call.line,
            base: call.instance_path.clone(),
            field: call.method.clone(),
            base_type: None,
        };
        let method_type = self.infer_type_from_field(&mut method_field, None, mapping)?;
        match method_type {
            Type::Function(function_type) => {
                let instance_type =
                    self.infer_type(&mut call.instance_path, None, &mut Mapping::new())?;
                call.instance_type = Some(instance_type);
                call.is_algebraic_method = function_type.is_algebraic_method;
                self.match_with_function_type(&function_type, &mut call.arguments, supertype, mapping)
            }
            Type::Algebraic(algebraic) if algebraic.constructor.is_some() => {
                let instance_type =
                    self.infer_type(&mut call.instance_path, None, &mut Mapping::new())?;
                call.instance_type = Some(instance_type);
                self.unify_types(&Type::Algebraic(algebraic), supertype, mapping)
            }
            other => Err(not_implemented(format!(
                "cannot infer a type from a method call of type {other}"
            ))),
        }
    }

    fn infer_type_from_field_expression(
        &mut self,
        value: &mut Expression,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let Expression::Field(field) = value else {
            unreachable!();
        };
        self.infer_type_from_field(field, supertype, mapping)
    }

    pub(crate) fn infer_type_from_field(
        &mut self,
        field: &mut Field,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let base_type = self.infer_type(&mut field.base, None, &mut Mapping::new())?;
        field.base_type = Some(base_type.clone());
        let field_name = field.field.unmangled_or_member().to_owned();
        let code = self.code.clone();
        let base_expression = field.base.clone();
        let field_error = {
            let base_type = base_type.clone();
            let field_name = field_name.clone();
            move || Error::FieldError {
                instance: base_expression,
                instance_type: base_type,
                field_name,
                code,
            }
        };
        match &base_type {
            Type::Builtin(BuiltinType::String) => match field_name.as_str() {
                "split" => {
                    let split_type = Type::Function(Box::new(FunctionType {
                        parameters: vec![],
                        arguments: vec![Argument::new("by", Type::Builtin(BuiltinType::Char))],
                        return_type: Type::Vector(Box::new(Type::Builtin(BuiltinType::String))),
                        where_clauses: vec![],
                        saved_environment: vec![],
                        is_algebraic_method: false,
                    }));
                    self.unify_types(&split_type, supertype, mapping)
                }
                "length" => {
                    self.unify_types(&Type::Builtin(BuiltinType::U64), supertype, mapping)
                }
                _ => Err(field_error()),
            },
            Type::Vector(subtype) => match field_name.as_str() {
                "append" => {
                    let append_type = Type::Function(Box::new(FunctionType {
                        parameters: vec![],
                        arguments: vec![Argument::new("element", (**subtype).clone())],
                        return_type: (**subtype).clone(),
                        where_clauses: vec![],
                        saved_environment: vec![],
                        is_algebraic_method: false,
                    }));
                    self.unify_types(&append_type, supertype, mapping)
                }
                "pop" => {
                    let pop_type = Type::Function(Box::new(FunctionType {
                        parameters: vec![],
                        arguments: vec![],
                        return_type: (**subtype).clone(),
                        where_clauses: vec![],
                        saved_environment: vec![],
                        is_algebraic_method: false,
                    }));
                    self.unify_types(&pop_type, supertype, mapping)
                }
                "length" => {
                    self.unify_types(&Type::Builtin(BuiltinType::U64), supertype, mapping)
                }
                _ => Err(field_error()),
            },
            Type::Dict(..) => match field_name.as_str() {
                "length" => {
                    self.unify_types(&Type::Builtin(BuiltinType::U64), supertype, mapping)
                }
                _ => Err(field_error()),
            },
            Type::Ref(value_type) => {
                if field_name == "value" {
                    self.unify_types(value_type, supertype, mapping)
                } else {
                    Err(field_error())
                }
            }
            Type::Name(name) => {
                let name = name.clone();
                self.infer_field_of_name_type(&name, field, supertype, mapping)
            }
            Type::Generic(generic) => {
                let generic = generic.clone();
                let mut struct_mapping = self.basic_struct_mapping_generic(&generic)?;
                struct_mapping.extend(mapping.clone());
                match &generic.base {
                    GenericTypeBase::Name(name) => {
                        let name = name.clone();
                        self.infer_field_of_name_type(&name, field, supertype, &mut struct_mapping)
                    }
                    GenericTypeBase::Builtin(_) => Err(field_error()),
                }
            }
            Type::Algebraic(algebraic) => {
                let algebraic = (**algebraic).clone();
                self.infer_field_of_algebraic_type(&algebraic, field, supertype, mapping)
            }
            Type::Builtin(_)
            | Type::Function(_)
            | Type::Template(_)
            | Type::Optional(_)
            | Type::Struct(_) => Err(field_error()),
        }
    }

    fn infer_field_of_name_type(
        &mut self,
        base_name: &Name,
        field: &mut Field,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let field_error = |checker: &Self, base_type: Type| Error::FieldError {
            instance: field.base.clone(),
            instance_type: base_type,
            field_name: field.field.member.clone(),
            code: checker.code.clone(),
        };
        let entry = self
            .env
            .get_opt(&base_name.member)
            .ok_or_else(|| Error::NameError {
                name: base_name.clone(),
                code: self.code.clone(),
            })?;
        match entry {
            Entry::Struct(struct_entry) => {
                if let Some(field_entry) = struct_entry.fields.get(&field.field.member) {
                    let field_type = field_entry.type_.clone();
                    return self.unify_types(&field_type, supertype, mapping);
                }
                if let Some(method_entry) = struct_entry.methods.get(&field.field.member) {
                    let method_type = Type::Function(Box::new(method_entry.to_function_type()));
                    return self.unify_types(&method_type, supertype, mapping);
                }
                Err(field_error(self, Type::Name(base_name.clone())))
            }
            Entry::Parameter(parameter_entry) => {
                if let Some(field_entry) = parameter_entry.fields.get(&field.field.member) {
                    let field_type = field_entry.type_.clone();
                    return self.unify_types(&field_type, supertype, mapping);
                }
                let method = parameter_entry
                    .fields
                    .get(field.field.unmangled_or_member())
                    .map(|field_entry| field_entry.type_.clone())
                    .or_else(|| {
                        parameter_entry
                            .methods
                            .get(&field.field.member)
                            .or_else(|| {
                                parameter_entry.methods.get(field.field.unmangled_or_member())
                            })
                            .map(|method_entry| {
                                Type::Function(Box::new(method_entry.to_function_type()))
                            })
                    });
                match method {
                    Some(member_type) => self.unify_types(&member_type, supertype, mapping),
                    None => Err(field_error(self, Type::Name(base_name.clone()))),
                }
            }
            _ => Err(field_error(self, Type::Name(base_name.clone()))),
        }
    }

    fn infer_field_of_algebraic_type(
        &mut self,
        base_type: &AlgebraicType,
        field: &mut Field,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let entry = self.env.get_algebraic(base_type)?;
        match entry {
            Entry::Algebraic(algebraic_entry) => {
                // No constructor selected yet: `.Ctor` selects one.
                if !algebraic_entry.constructors.contains_key(&field.field.member) {
                    return Err(Error::ConstructorError {
                        algebraic: Type::Algebraic(Box::new(base_type.clone())),
                        constructor: field.field.member.clone(),
                        code: self.code.clone(),
                    });
                }
                let selected = Type::Algebraic(Box::new(AlgebraicType {
                    base: base_type.base.clone(),
                    parameters: base_type.parameters.clone(),
                    constructor: Some(field.field.clone()),
                    constructor_types: base_type.constructor_types.clone(),
                }));
                self.unify_types(&selected, supertype, mapping)
            }
            Entry::Struct(constructor_entry) => {
                if let Some(field_entry) = constructor_entry.fields.get(&field.field.member) {
                    let field_type = field_entry.type_.clone();
                    return self.unify_types(&field_type, supertype, mapping);
                }
                // Methods resolve on the constructor first, then on the
                // algebraic type itself.
                if let Some(method_entry) = constructor_entry.methods.get(&field.field.member) {
                    let method_type = Type::Function(Box::new(method_entry.to_function_type()));
                    return self.unify_types(&method_type, supertype, mapping);
                }
                let Entry::Algebraic(algebraic_entry) = self.env.get(&base_type.base)? else {
                    return Err(not_implemented("algebraic base vanished"));
                };
                let Some(method_entry) = algebraic_entry.methods.get(&field.field.member) else {
                    return Err(Error::FieldError {
                        instance: field.base.clone(),
                        instance_type: Type::Algebraic(Box::new(base_type.clone())),
                        field_name: field.field.member.clone(),
                        code: self.code.clone(),
                    });
                };
                let mut method_type = method_entry.to_function_type();
                method_type.is_algebraic_method = true;
                self.unify_types(&Type::Function(Box::new(method_type)), supertype, mapping)
            }
            _ => unreachable!("get_algebraic returns algebraic or struct entries"),
        }
    }

    fn infer_type_from_subscript(
        &mut self,
        value: &mut Expression,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let Expression::Subscript(subscript) = value else {
            unreachable!();
        };
        let base_type = self.infer_type(&mut subscript.base, None, &mut Mapping::new())?;
        subscript.base_type = Some(base_type.clone());
        match &base_type {
            Type::Builtin(BuiltinType::String) => {
                self.infer_type(
                    &mut subscript.index,
                    Some(&Type::Builtin(BuiltinType::U64)),
                    &mut Mapping::new(),
                )?;
                self.unify_types(&Type::Builtin(BuiltinType::Char), supertype, mapping)
            }
            Type::Vector(subtype) => {
                let subtype = (**subtype).clone();
                self.infer_type(
                    &mut subscript.index,
                    Some(&Type::Builtin(BuiltinType::U64)),
                    &mut Mapping::new(),
                )?;
                self.unify_types(&subtype, supertype, mapping)
            }
            Type::Dict(key_type, value_type) => {
                let key_type = (**key_type).clone();
                let value_type = (**value_type).clone();
                self.infer_type(&mut subscript.index, Some(&key_type), &mut Mapping::new())?;
                self.unify_types(&value_type, supertype, mapping)
            }
            _ => Err(Error::SubscriptError {
                instance: subscript.base.clone(),
                instance_type: base_type,
                index: subscript.index.clone(),
                code: self.code.clone(),
            }),
        }
    }

    fn infer_type_from_cast(
        &mut self,
        value: &mut Expression,
        supertype: Option<&Type>,
        mapping: &mut Mapping,
    ) -> Result<Type> {
        let Expression::Cast(cast) = value else {
            unreachable!();
        };
        let value_type = self.infer_type(&mut cast.value, None, mapping)?;
        match &cast.to_type {
            Type::Builtin(builtin) => {
                let Some(convertible) = builtin.as_convertible_interface() else {
                    return Err(Error::TypeError {
                        message: format!("cannot cast to '{builtin}'"),
                        code: self.code.clone(),
                        possible_types: vec![value_type],
                    });
                };
                self.unify_types(&value_type, Some(&Type::Builtin(convertible)), mapping)?;
                cast.is_builtin = matches!(value_type, Type::Builtin(_));
                let to_type = cast.to_type.clone();
                self.unify_types(&to_type, supertype, mapping)
            }
            Type::Name(_) if matches!(value_type, Type::Name(_)) => {
                // Only a cast between the same named type is supported; it
                // routes through the user-defined conversion.
                let to_type = cast.to_type.clone();
                self.unify_types(&value_type, Some(&to_type), mapping)?;
                cast.is_builtin = false;
                self.unify_types(&to_type, supertype, mapping)
            }
            other => Err(not_implemented(format!("cast to '{other}'"))),
        }
    }

    pub(crate) fn eval_is(
        &mut self,
        subtype: &Type,
        supertype: &Type,
        mapping: &mut Mapping,
    ) -> Result<bool> {
        match self.unify_types(subtype, Some(supertype), mapping) {
            Ok(_) => Ok(true),
            Err(error) if error.is_type_error() => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn eval_where_clause(&mut self, clause: &Expression, mapping: &mut Mapping) -> Result<bool> {
        let Expression::BinaryExpression(binary) = clause else {
            return Err(not_implemented(format!("cannot evaluate clause '{clause}'")));
        };
        match binary.operator {
            Operator::Is => {
                let left = expression_as_type(&binary.left)
                    .ok_or_else(|| not_implemented("clause operand is not a type"))?;
                let right = expression_as_type(&binary.right)
                    .ok_or_else(|| not_implemented("clause operand is not a type"))?;
                let left = apply_mapping(&left, mapping);
                let right = apply_mapping(&right, mapping);
                self.eval_is(&left, &right, mapping)
            }
            Operator::And => {
                let left = self.eval_where_clause(&binary.left, mapping)?;
                let right = self.eval_where_clause(&binary.right, mapping)?;
                Ok(left && right)
            }
            _ => Err(not_implemented(format!(
                "cannot evaluate clause operator '{}'",
                binary.operator
            ))),
        }
    }

    pub(crate) fn satisfy_where_clauses(
        &mut self,
        where_clauses: &[Expression],
        mapping: &mut Mapping,
    ) -> Result<()> {
        for condition in where_clauses {
            if !self.eval_where_clause(condition, mapping)? {
                return Err(Error::UnsatisfiedWhereClause {
                    clause: condition.clone(),
                    code: self.code.clone(),
                });
            }
        }
        Ok(())
    }
}

fn expression_as_type(expression: &Expression) -> Option<Type> {
    match expression {
        Expression::Name(name) => Some(Type::Name(name.clone())),
        Expression::BuiltinType(builtin) => Some(Type::Builtin(*builtin)),
        _ => None,
    }
}

fn builtin_func_type(func: BuiltinFunc) -> Type {
    match func {
        BuiltinFunc::Print => Type::Function(Box::new(FunctionType {
            parameters: vec![],
            arguments: vec![Argument::new(
                "value",
                Type::Builtin(BuiltinType::ConvertibleToString),
            )],
            return_type: Type::Builtin(BuiltinType::Void),
            where_clauses: vec![],
            saved_environment: vec![],
            is_algebraic_method: false,
        })),
        BuiltinFunc::Read => Type::Function(Box::new(FunctionType {
            parameters: vec![],
            arguments: vec![Argument::new("prompt", Type::Builtin(BuiltinType::String))],
            return_type: Type::Builtin(BuiltinType::String),
            where_clauses: vec![],
            saved_environment: vec![],
            is_algebraic_method: false,
        })),
    }
}

fn private_builtin_func_type(func: PrivateBuiltinFunc) -> Type {
    match func {
        PrivateBuiltinFunc::VectorToString => Type::Function(Box::new(FunctionType {
            parameters: vec![],
            arguments: vec![Argument::new(
                "value",
                Type::Vector(Box::new(Type::Builtin(BuiltinType::Object))),
            )],
            return_type: Type::Builtin(BuiltinType::String),
            where_clauses: vec![],
            saved_environment: vec![],
            is_algebraic_method: false,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn analyzer() -> Analyzer {
        Analyzer::new(Context::new("", "", false))
    }

    fn unify(sub: BuiltinType, sup: BuiltinType) -> Result<Type> {
        analyzer().unify_types(
            &Type::Builtin(sub),
            Some(&Type::Builtin(sup)),
            &mut Mapping::new(),
        )
    }

    #[test]
    fn test_builtin_unification_follows_the_lattice() {
        assert_eq!(unify(BuiltinType::I8, BuiltinType::I64).unwrap(), Type::Builtin(BuiltinType::I64));
        assert_eq!(
            unify(BuiltinType::U8, BuiltinType::ConvertibleToString).unwrap(),
            Type::Builtin(BuiltinType::ConvertibleToString)
        );
        assert!(unify(BuiltinType::I64, BuiltinType::I8).is_err());
        assert!(unify(BuiltinType::String, BuiltinType::Subtractable).is_err());
    }

    #[test]
    fn test_integer_literal_picks_the_smallest_type() {
        let mut checker = analyzer();
        let mut literal = Expression::integer("5");
        let inferred = checker
            .infer_type(&mut literal, None, &mut Mapping::new())
            .unwrap();
        assert_eq!(inferred, Type::Builtin(BuiltinType::I8));

        let mut negative = Expression::integer("-3");
        assert_eq!(
            checker
                .infer_type(&mut negative, None, &mut Mapping::new())
                .unwrap(),
            Type::Builtin(BuiltinType::I8)
        );

        let mut medium = Expression::integer("300");
        assert_eq!(
            checker
                .infer_type(&mut medium, None, &mut Mapping::new())
                .unwrap(),
            Type::Builtin(BuiltinType::I16)
        );

        let mut huge = Expression::integer("18446744073709551615");
        assert_eq!(
            checker
                .infer_type(&mut huge, None, &mut Mapping::new())
                .unwrap(),
            Type::Builtin(BuiltinType::U64)
        );
    }

    #[test]
    fn test_integer_literal_against_each_possible_supertype() {
        for supertype in [
            BuiltinType::I8,
            BuiltinType::U8,
            BuiltinType::I16,
            BuiltinType::U16,
            BuiltinType::I32,
            BuiltinType::U32,
            BuiltinType::I64,
            BuiltinType::U64,
            BuiltinType::Int,
        ] {
            let mut checker = analyzer();
            let mut literal = Expression::integer("5");
            let inferred = checker
                .infer_type(&mut literal, Some(&Type::Builtin(supertype)), &mut Mapping::new())
                .unwrap();
            assert_eq!(inferred, Type::Builtin(supertype));
        }
    }

    #[test]
    fn test_out_of_range_literal_reports_the_range() {
        let mut checker = analyzer();
        let mut literal = Expression::integer("300");
        let error = checker
            .infer_type(
                &mut literal,
                Some(&Type::Builtin(BuiltinType::U8)),
                &mut Mapping::new(),
            )
            .unwrap_err();
        let Error::TypeError { message, .. } = error else {
            panic!("expected a type error");
        };
        assert_eq!(message, "300 is not in range [0; 255]");
    }

    #[test]
    fn test_template_slots_fill_once() {
        let mut checker = analyzer();
        let template = checker.create_template_type();
        let filled = checker
            .unify_types(
                &Type::Builtin(BuiltinType::I8),
                Some(&template),
                &mut Mapping::new(),
            )
            .unwrap();
        assert_eq!(filled, Type::Builtin(BuiltinType::I8));
        // A second unification narrows through the filled slot instead of
        // overwriting it.
        let widened = checker
            .unify_types(
                &Type::Builtin(BuiltinType::I8),
                Some(&template),
                &mut Mapping::new(),
            )
            .unwrap();
        assert_eq!(widened, Type::Builtin(BuiltinType::I8));
        assert!(checker
            .unify_types(
                &Type::Builtin(BuiltinType::String),
                Some(&template),
                &mut Mapping::new(),
            )
            .is_err());
    }

    #[test]
    fn test_string_unifies_with_iterable_of_char() {
        let mut checker = analyzer();
        let element = checker.create_template_type();
        let iterable = Type::Generic(GenericType {
            base: GenericTypeBase::Builtin(BuiltinType::Iterable),
            parameters: vec![element.clone()],
        });
        checker
            .unify_types(
                &Type::Builtin(BuiltinType::String),
                Some(&iterable),
                &mut Mapping::new(),
            )
            .unwrap();
        assert_eq!(
            checker.replace_template_types(&element),
            Type::Builtin(BuiltinType::Char)
        );
    }

    #[test]
    fn test_vector_unifies_with_iterable_of_its_element() {
        let mut checker = analyzer();
        let element = checker.create_template_type();
        let iterable = Type::Generic(GenericType {
            base: GenericTypeBase::Builtin(BuiltinType::Iterable),
            parameters: vec![element.clone()],
        });
        let vector = Type::Vector(Box::new(Type::Builtin(BuiltinType::I32)));
        checker
            .unify_types(&vector, Some(&iterable), &mut Mapping::new())
            .unwrap();
        assert_eq!(
            checker.replace_template_types(&element),
            Type::Builtin(BuiltinType::I32)
        );
    }

    #[test]
    fn test_float_literal_candidates() {
        assert_eq!(
            get_possible_float_types_based_on_value("1.5"),
            vec![Type::Builtin(BuiltinType::F32), Type::Builtin(BuiltinType::F64)]
        );
        assert_eq!(
            get_possible_float_types_based_on_value("1e39"),
            vec![Type::Builtin(BuiltinType::F64)]
        );
    }
}
