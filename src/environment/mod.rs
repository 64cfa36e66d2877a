//! Nested symbol table. A scope is a stack of frames; frames are shared
//! (`Rc<RefCell<...>>`) so that an environment snapshot captured at a
//! function declaration keeps seeing entries added to the same frames
//! later, which is what makes recursion and forward references inside one
//! frame work. A separate parent stack tracks the type declaration being
//! analyzed so that field/method/init additions land on the right entry,
//! including algebraic constructor nesting.

pub mod entries;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{
    AlgebraicType, Arguments, Ast, BinaryExpression, Decl, DeclType, Expression, GenericTypeBase,
    Interface, Interfaces, Name, Operator, Parameters, Type,
};
use crate::constants::builtin_interface_entry;
use crate::errors::{not_implemented, Code, Error, Result};
use crate::estimation::value::Value;

use self::entries::{
    AlgebraicEntry, DeclEntry, Entry, FunctionEntry, InitEntry, InterfaceEntry, ParameterEntry,
    StructEntry,
};

pub type Frame = IndexMap<String, Entry>;
pub type SavedSpace = Vec<Rc<RefCell<Frame>>>;

/// Key under which an init overload is stored: its rendered argument list.
pub fn init_key(arguments: &Arguments) -> String {
    arguments
        .iter()
        .map(|argument| argument.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Mutable handle to the entry a parent stack currently targets.
pub enum ParentEntryMut<'a> {
    Struct(&'a mut StructEntry),
    Algebraic(&'a mut AlgebraicEntry),
    Interface(&'a mut InterfaceEntry),
}

#[derive(Clone, Debug)]
pub struct Environment {
    space: SavedSpace,
    pub parents: Vec<Name>,
    where_clauses: Vec<Expression>,
    pub code: Code,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            space: vec![Rc::new(RefCell::new(Frame::new()))],
            parents: vec![],
            where_clauses: vec![],
            code: Code::default(),
        }
    }

    /// Build an environment over a saved frame stack; the frames stay
    /// shared with whoever captured them.
    pub fn from_space(space: SavedSpace) -> Environment {
        if space.is_empty() {
            return Environment::new();
        }
        Environment {
            space,
            parents: vec![],
            where_clauses: vec![],
            code: Code::default(),
        }
    }

    pub fn snapshot(&self) -> SavedSpace {
        self.space.clone()
    }

    pub fn nesting_level(&self) -> usize {
        self.space.len() - 1
    }

    pub fn update_code(&mut self, code: Code) {
        self.code = code;
    }

    /// Get entry by raw member name. Returns a clone; `None` if absent.
    pub fn get_opt(&self, key: &str) -> Option<Entry> {
        for frame in self.space.iter().rev() {
            if let Some(entry) = frame.borrow().get(key) {
                return Some(entry.clone());
            }
        }
        None
    }

    /// Get entry of a name, raising `NameError` if it is not defined.
    pub fn get(&self, name: &Name) -> Result<Entry> {
        assert!(name.module.is_none(), "module system is not supported");
        self.get_opt(&name.member).ok_or_else(|| Error::NameError {
            name: name.clone(),
            code: self.code.clone(),
        })
    }

    /// Uniform type-entry lookup for builtins, generics and names.
    pub fn get_type(&self, key: &Type) -> Result<Entry> {
        match key {
            Type::Generic(generic) => match &generic.base {
                GenericTypeBase::Name(name) => self.get(name),
                GenericTypeBase::Builtin(builtin) => builtin_interface_entry(*builtin)
                    .map(Entry::Interface)
                    .ok_or_else(|| not_implemented(format!("{builtin} is not an interface"))),
            },
            Type::Name(name) => self.get(name),
            Type::Builtin(builtin) => builtin_interface_entry(*builtin)
                .map(Entry::Interface)
                .ok_or_else(|| not_implemented(format!("{builtin} is not an interface"))),
            other => Err(not_implemented(format!("cannot look up type {other}"))),
        }
    }

    pub fn get_interface_entry(&self, interface: &Interface) -> Result<InterfaceEntry> {
        let entry = self.get_type(&interface.as_type())?;
        match entry {
            Entry::Interface(interface_entry) => Ok(interface_entry),
            other => Err(not_implemented(format!(
                "'{interface}' names a {}, not an interface",
                other.kind()
            ))),
        }
    }

    /// Entry of an algebraic data type, or of its selected constructor.
    pub fn get_algebraic(&self, algebraic: &AlgebraicType) -> Result<Entry> {
        let entry = self.get(&algebraic.base)?;
        let Entry::Algebraic(algebraic_entry) = entry else {
            return Err(not_implemented(format!(
                "'{}' is not an algebraic type",
                algebraic.base
            )));
        };
        match &algebraic.constructor {
            None => Ok(Entry::Algebraic(algebraic_entry)),
            Some(constructor) => algebraic_entry
                .constructors
                .get(&constructor.member)
                .cloned()
                .map(Entry::Struct)
                .ok_or_else(|| Error::ConstructorError {
                    algebraic: Type::Algebraic(Box::new(algebraic.clone())),
                    constructor: constructor.member.clone(),
                    code: self.code.clone(),
                }),
        }
    }

    fn insert(&mut self, key: String, entry: Entry) {
        self.space
            .last()
            .expect("environment always has a frame")
            .borrow_mut()
            .insert(key, entry);
    }

    /// Run `f` on the entry for `key`, innermost binding first.
    pub fn with_entry_mut<R>(&self, key: &str, f: impl FnOnce(&mut Entry) -> R) -> Option<R> {
        for frame in self.space.iter().rev() {
            let mut frame = frame.borrow_mut();
            if let Some(entry) = frame.get_mut(key) {
                return Some(f(entry));
            }
        }
        None
    }

    pub fn add_declaration(&mut self, decl: &Decl, estimated_value: Option<Value>) {
        let type_ = decl
            .type_
            .clone()
            .expect("declarations are typed before registration");
        let estimated_value =
            estimated_value.unwrap_or_else(|| Value::Dynamic(type_.clone()));
        self.insert(
            decl.name.member.clone(),
            Entry::Decl(DeclEntry {
                line: decl.line,
                decl_type: decl.decl_type,
                name: decl.name.clone(),
                type_,
                value: decl.value.clone(),
                estimated_value,
                has_value: decl.value.is_some(),
            }),
        );
    }

    /// Bind formal arguments as constants carrying dynamic values.
    pub fn add_arguments(&mut self, line: usize, arguments: &Arguments) {
        for argument in arguments {
            self.insert(
                argument.name.member.clone(),
                Entry::Decl(DeclEntry {
                    line,
                    decl_type: DeclType::Constant,
                    name: argument.name.clone(),
                    type_: argument.type_.clone(),
                    value: None,
                    estimated_value: Value::Dynamic(argument.type_.clone()),
                    has_value: false,
                }),
            );
        }
    }

    pub fn add_function(
        &mut self,
        line: usize,
        name: &Name,
        parameters: &Parameters,
        arguments: &Arguments,
        return_type: &Type,
        where_clause: Option<&Expression>,
    ) {
        let mut where_clauses = self.where_clauses.clone();
        where_clauses.extend(where_clause.cloned());
        let saved_environment = self.snapshot();
        self.insert(
            name.member.clone(),
            Entry::Function(FunctionEntry {
                line,
                name: name.clone(),
                parameters: parameters.clone(),
                arguments: arguments.clone(),
                return_type: return_type.clone(),
                body: vec![],
                where_clauses,
                saved_environment,
            }),
        );
    }

    fn with_parent_entry_mut<R>(&self, f: impl FnOnce(ParentEntryMut<'_>) -> R) -> R {
        assert!(!self.parents.is_empty(), "no enclosing type declaration");
        let first = &self.parents[0].member;
        for frame in self.space.iter().rev() {
            let mut frame = frame.borrow_mut();
            let Some(entry) = frame.get_mut(first) else {
                continue;
            };
            if self.parents.len() == 1 {
                let handle = match entry {
                    Entry::Struct(struct_entry) => ParentEntryMut::Struct(struct_entry),
                    Entry::Algebraic(algebraic_entry) => {
                        ParentEntryMut::Algebraic(algebraic_entry)
                    }
                    Entry::Interface(interface_entry) => {
                        ParentEntryMut::Interface(interface_entry)
                    }
                    other => panic!("'{first}' names a {}, not a type", other.kind()),
                };
                return f(handle);
            }
            // Deeper nesting is algebraic-constructor nesting only.
            assert!(self.parents.len() == 2, "unsupported struct nesting");
            let Entry::Algebraic(algebraic_entry) = entry else {
                panic!("'{first}' does not support nested type declarations");
            };
            let constructor = &self.parents[1].member;
            let constructor_entry = algebraic_entry
                .constructors
                .get_mut(constructor)
                .unwrap_or_else(|| panic!("unknown constructor '{constructor}'"));
            return f(ParentEntryMut::Struct(constructor_entry));
        }
        panic!("parent type '{first}' is not in the environment");
    }

    pub fn add_method(
        &mut self,
        line: usize,
        name: &Name,
        arguments: &Arguments,
        return_type: &Type,
    ) {
        let entry = FunctionEntry {
            line,
            name: name.clone(),
            parameters: vec![],
            arguments: arguments.clone(),
            return_type: return_type.clone(),
            body: vec![],
            where_clauses: self.where_clauses.clone(),
            saved_environment: self.snapshot(),
        };
        self.with_parent_entry_mut(|parent| match parent {
            ParentEntryMut::Struct(struct_entry) => {
                struct_entry.methods.insert(name.member.clone(), entry);
            }
            ParentEntryMut::Algebraic(algebraic_entry) => {
                algebraic_entry.methods.insert(name.member.clone(), entry);
            }
            ParentEntryMut::Interface(interface_entry) => {
                interface_entry.methods.insert(name.member.clone(), entry);
            }
        });
    }

    pub fn add_field(&mut self, line: usize, name: &Name, type_: &Type) {
        let entry = DeclEntry {
            line,
            decl_type: DeclType::Variable,
            name: name.clone(),
            type_: type_.clone(),
            value: None,
            estimated_value: Value::Dynamic(type_.clone()),
            has_value: false,
        };
        self.with_parent_entry_mut(|parent| match parent {
            ParentEntryMut::Struct(struct_entry) => {
                struct_entry.fields.insert(name.member.clone(), entry);
            }
            ParentEntryMut::Interface(interface_entry) => {
                interface_entry.fields.insert(name.member.clone(), entry);
            }
            ParentEntryMut::Algebraic(_) => {
                panic!("algebraic types have no direct fields")
            }
        });
    }

    /// Bind `self` for the enclosing type declaration; a variable inside
    /// `init`, a constant inside regular methods.
    pub fn add_self(&mut self, line: usize, is_variable: bool) {
        let type_ = self.build_parent_struct_type();
        let decl = Decl {
            line,
            decl_type: if is_variable {
                DeclType::Variable
            } else {
                DeclType::Constant
            },
            name: Name::new(crate::constants::SELF_NAME),
            type_: Some(type_),
            value: None,
        };
        self.add_declaration(&decl, None);
    }

    fn build_parent_struct_type(&self) -> Type {
        assert!(!self.parents.is_empty());
        let mut type_ = Type::Name(self.parents[self.parents.len() - 1].clone());
        for parent in self.parents[..self.parents.len() - 1].iter().rev() {
            let Type::Name(constructor) = type_ else {
                unreachable!("only algebraic constructor nesting is supported");
            };
            type_ = Type::Algebraic(Box::new(AlgebraicType {
                base: parent.clone(),
                parameters: vec![],
                constructor: Some(constructor),
                constructor_types: IndexMap::new(),
            }));
        }
        type_
    }

    pub fn add_init_declaration(&mut self, line: usize, arguments: &Arguments) {
        let entry = InitEntry {
            line,
            arguments: arguments.clone(),
            body: vec![],
        };
        self.with_parent_entry_mut(|parent| match parent {
            ParentEntryMut::Struct(struct_entry) => {
                struct_entry.init_declarations.insert(init_key(arguments), entry);
            }
            _ => panic!("init declarations belong to structs"),
        });
    }

    pub fn add_struct(
        &mut self,
        line: usize,
        name: &Name,
        parameters: &Parameters,
        interfaces: &Interfaces,
    ) {
        if !self.parents.is_empty() {
            self.add_algebraic_constructor(line, name, parameters);
            return;
        }
        self.insert(
            name.member.clone(),
            Entry::Struct(StructEntry {
                line,
                name: name.clone(),
                parameters: parameters.clone(),
                implemented_interfaces: interfaces.clone(),
                fields: IndexMap::new(),
                init_declarations: IndexMap::new(),
                methods: IndexMap::new(),
            }),
        );
    }

    pub fn add_algebraic_constructor(&mut self, line: usize, name: &Name, parameters: &Parameters) {
        let entry = StructEntry {
            line,
            name: name.clone(),
            parameters: parameters.clone(),
            implemented_interfaces: vec![],
            fields: IndexMap::new(),
            init_declarations: IndexMap::new(),
            methods: IndexMap::new(),
        };
        let last = self
            .parents
            .last()
            .expect("constructors appear inside algebraic declarations")
            .member
            .clone();
        let inserted = self.with_entry_mut(&last, |parent| match parent {
            Entry::Algebraic(algebraic_entry) => {
                algebraic_entry.constructors.insert(name.member.clone(), entry);
            }
            other => panic!("'{last}' names a {}, not an algebraic type", other.kind()),
        });
        assert!(inserted.is_some(), "algebraic parent '{last}' is missing");
    }

    pub fn add_algebraic(&mut self, line: usize, name: &Name, parameters: &Parameters) {
        self.insert(
            name.member.clone(),
            Entry::Algebraic(AlgebraicEntry {
                line,
                name: name.clone(),
                parameters: parameters.clone(),
                constructors: IndexMap::new(),
                methods: IndexMap::new(),
            }),
        );
    }

    /// Register an interface, computing the transitive closure of inherited
    /// members up front. The computation is a union over parents in
    /// declaration order; recomputing it is idempotent.
    pub fn add_interface(
        &mut self,
        line: usize,
        name: &Name,
        parameters: &Parameters,
        parent_interfaces: &Interfaces,
    ) -> Result<()> {
        let mut inherited_fields: IndexMap<String, (Interface, DeclEntry)> = IndexMap::new();
        let mut inherited_methods: IndexMap<String, (Interface, FunctionEntry)> = IndexMap::new();
        for interface in parent_interfaces {
            let interface_entry = self.get_interface_entry(interface)?;
            for (field_name, field_entry) in &interface_entry.fields {
                inherited_fields.insert(
                    field_name.clone(),
                    (interface.clone(), field_entry.clone()),
                );
            }
            inherited_fields.extend(interface_entry.inherited_fields.clone());
            for (method_name, method_entry) in &interface_entry.methods {
                inherited_methods.insert(
                    method_name.clone(),
                    (interface.clone(), method_entry.clone()),
                );
            }
            inherited_methods.extend(interface_entry.inherited_methods.clone());
        }
        self.insert(
            name.member.clone(),
            Entry::Interface(InterfaceEntry {
                line,
                name: Interface::Name(name.clone()),
                parameters: parameters.clone(),
                implemented_interfaces: parent_interfaces.clone(),
                fields: IndexMap::new(),
                methods: IndexMap::new(),
                inherited_fields,
                inherited_methods,
            }),
        );
        Ok(())
    }

    /// Register generic type parameters, deriving their obligations from
    /// every `where`-clause currently in scope.
    pub fn add_parameters(&mut self, line: usize, parameters: &Parameters) -> Result<()> {
        for parameter in parameters {
            let (interfaces, fields, methods) =
                self.required_data_from_where_clauses(parameter)?;
            self.insert(
                parameter.member.clone(),
                Entry::Parameter(ParameterEntry {
                    line,
                    name: parameter.clone(),
                    implemented_interfaces: interfaces,
                    fields,
                    methods,
                }),
            );
        }
        Ok(())
    }

    pub fn update_function_body(&mut self, name: &Name, body: Ast) {
        let updated = self.with_entry_mut(&name.member, |entry| match entry {
            Entry::Function(function_entry) => function_entry.body = body,
            other => panic!("'{name}' names a {}, not a function", other.kind()),
        });
        assert!(updated.is_some(), "function '{name}' is missing");
    }

    pub fn update_method_body(&mut self, name: &Name, body: Ast) {
        self.with_parent_entry_mut(|parent| {
            let methods = match parent {
                ParentEntryMut::Struct(struct_entry) => &mut struct_entry.methods,
                ParentEntryMut::Algebraic(algebraic_entry) => &mut algebraic_entry.methods,
                ParentEntryMut::Interface(interface_entry) => &mut interface_entry.methods,
            };
            methods
                .get_mut(&name.member)
                .unwrap_or_else(|| panic!("method '{name}' is missing"))
                .body = body;
        });
    }

    pub fn update_init_declaration_body(&mut self, arguments: &Arguments, body: Ast) {
        let key = init_key(arguments);
        self.with_parent_entry_mut(|parent| match parent {
            ParentEntryMut::Struct(struct_entry) => {
                struct_entry
                    .init_declarations
                    .get_mut(&key)
                    .unwrap_or_else(|| panic!("init '{key}' is missing"))
                    .body = body;
            }
            _ => panic!("init declarations belong to structs"),
        });
    }

    pub fn inc_nesting(&mut self, parent: Option<Name>) {
        self.space.push(Rc::new(RefCell::new(Frame::new())));
        if let Some(parent) = parent {
            self.parents.push(parent);
        }
    }

    pub fn dec_nesting(&mut self, parent: bool) {
        self.space.pop();
        assert!(!self.space.is_empty(), "popped the global frame");
        if parent {
            self.parents.pop();
        }
    }

    pub fn add_where_clause(&mut self, where_clause: Expression) {
        self.where_clauses.push(where_clause);
    }

    pub fn remove_where_clause(&mut self) {
        self.where_clauses.pop();
    }

    /// Interfaces, fields and methods a type parameter must supply, from a
    /// single clause. Conjunctions distribute; any other operator, or a
    /// left-hand side other than `name`, contributes nothing.
    fn required_data_from_clause(
        &self,
        name: &Name,
        condition: &Expression,
    ) -> Result<(
        Interfaces,
        IndexMap<String, DeclEntry>,
        IndexMap<String, FunctionEntry>,
    )> {
        let mut interfaces = Interfaces::new();
        let mut fields = IndexMap::new();
        let mut methods = IndexMap::new();
        let Expression::BinaryExpression(condition) = condition else {
            return Ok((interfaces, fields, methods));
        };
        let BinaryExpression {
            left,
            operator,
            right,
            ..
        } = condition.as_ref();
        match operator {
            Operator::Is => {
                let matches_name = matches!(left, Expression::Name(left_name) if left_name == name);
                if !matches_name {
                    return Ok((interfaces, fields, methods));
                }
                let interface = match right {
                    Expression::Name(interface_name) => Interface::Name(interface_name.clone()),
                    Expression::BuiltinType(builtin) => Interface::Builtin(*builtin),
                    _ => return Ok((interfaces, fields, methods)),
                };
                let interface_entry = self.get_interface_entry(&interface)?;
                for (key, field_entry) in &interface_entry.fields {
                    fields.insert(key.clone(), field_entry.clone());
                }
                for (key, (_, field_entry)) in &interface_entry.inherited_fields {
                    fields.insert(key.clone(), field_entry.clone());
                }
                for (key, method_entry) in &interface_entry.methods {
                    methods.insert(key.clone(), method_entry.clone());
                }
                for (key, (_, method_entry)) in &interface_entry.inherited_methods {
                    methods.insert(key.clone(), method_entry.clone());
                }
                interfaces.push(interface);
            }
            Operator::And => {
                let (sub_interfaces, sub_fields, sub_methods) =
                    self.required_data_from_clause(name, left)?;
                interfaces.extend(sub_interfaces);
                fields.extend(sub_fields);
                methods.extend(sub_methods);
                let (sub_interfaces, sub_fields, sub_methods) =
                    self.required_data_from_clause(name, right)?;
                interfaces.extend(sub_interfaces);
                fields.extend(sub_fields);
                methods.extend(sub_methods);
            }
            _ => {}
        }
        Ok((interfaces, fields, methods))
    }

    pub fn required_data_from_where_clauses(
        &self,
        name: &Name,
    ) -> Result<(
        Interfaces,
        IndexMap<String, DeclEntry>,
        IndexMap<String, FunctionEntry>,
    )> {
        let mut interfaces = Interfaces::new();
        let mut fields = IndexMap::new();
        let mut methods = IndexMap::new();
        for clause in self.where_clauses.clone() {
            let (sub_interfaces, sub_fields, sub_methods) =
                self.required_data_from_clause(name, &clause)?;
            interfaces.extend(sub_interfaces);
            fields.extend(sub_fields);
            methods.extend(sub_methods);
        }
        Ok((interfaces, fields, methods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BuiltinType;

    fn decl(name: &str, type_: Type) -> Decl {
        Decl {
            line: 1,
            decl_type: DeclType::Constant,
            name: Name::new(name),
            type_: Some(type_),
            value: None,
        }
    }

    #[test]
    fn test_lookup_walks_outward() {
        let mut env = Environment::new();
        env.add_declaration(&decl("a", Type::Builtin(BuiltinType::I8)), None);
        env.inc_nesting(None);
        env.add_declaration(&decl("b", Type::Builtin(BuiltinType::Bool)), None);
        assert!(env.get_opt("a").is_some());
        assert!(env.get_opt("b").is_some());
        env.dec_nesting(false);
        assert!(env.get_opt("b").is_none());
        assert!(env.get_opt("a").is_some());
    }

    #[test]
    fn test_snapshot_shares_frames() {
        let mut env = Environment::new();
        let snapshot = env.snapshot();
        env.add_declaration(&decl("late", Type::Builtin(BuiltinType::I8)), None);
        let restored = Environment::from_space(snapshot);
        // The entry added after the snapshot is visible through it.
        assert!(restored.get_opt("late").is_some());
    }

    #[test]
    fn test_missing_name_is_a_name_error() {
        let env = Environment::new();
        let error = env.get(&Name::new("ghost")).unwrap_err();
        assert!(matches!(error, Error::NameError { .. }));
    }

    #[test]
    fn test_algebraic_constructor_nesting() {
        let mut env = Environment::new();
        env.add_algebraic(1, &Name::new("Shape"), &vec![]);
        env.inc_nesting(Some(Name::new("Shape")));
        env.add_struct(2, &Name::new("Circle"), &vec![], &vec![]);
        env.inc_nesting(Some(Name::new("Circle")));
        env.add_field(3, &Name::new("radius"), &Type::Builtin(BuiltinType::I32));
        env.dec_nesting(true);
        env.dec_nesting(true);

        let Some(Entry::Algebraic(algebraic)) = env.get_opt("Shape") else {
            panic!("expected an algebraic entry");
        };
        let circle = algebraic.constructors.get("Circle").expect("constructor");
        assert!(circle.fields.contains_key("radius"));
    }
}
