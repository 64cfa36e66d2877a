//! Entry variants stored in environment frames. Entries for types keep
//! their member tables in insertion order: overload resolution and default
//! constructor synthesis are first-match-wins over source order.

use indexmap::IndexMap;

use crate::ast::{
    Arguments, Ast, DeclType, Expression, FunctionType, Interface, Interfaces, Name, Parameters,
    Type,
};
use crate::environment::SavedSpace;
use crate::estimation::value::{Function, FunctionSpec, Value};

#[derive(Clone, Debug, PartialEq)]
pub struct DeclEntry {
    pub line: usize,
    pub decl_type: DeclType,
    pub name: Name,
    pub type_: Type,
    pub value: Option<Expression>,
    pub estimated_value: Value,
    /// Constants flip this exactly once; a second flip is an error.
    pub has_value: bool,
}

impl DeclEntry {
    pub fn is_constant(&self) -> bool {
        self.decl_type == DeclType::Constant
    }

    pub fn is_variable(&self) -> bool {
        self.decl_type == DeclType::Variable
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionEntry {
    pub line: usize,
    pub name: Name,
    pub parameters: Parameters,
    pub arguments: Arguments,
    pub return_type: Type,
    pub body: Ast,
    pub where_clauses: Vec<Expression>,
    pub saved_environment: SavedSpace,
}

impl FunctionEntry {
    pub fn to_function_type(&self) -> FunctionType {
        FunctionType {
            parameters: self.parameters.clone(),
            arguments: self.arguments.clone(),
            return_type: self.return_type.clone(),
            where_clauses: self.where_clauses.clone(),
            saved_environment: self.saved_environment.clone(),
            is_algebraic_method: false,
        }
    }

    pub fn to_estimated_function(&self) -> Function {
        Function {
            name: self.name.clone(),
            parameters: self.parameters.clone(),
            arguments: self.arguments.clone(),
            return_type: self.return_type.clone(),
            where_clauses: self.where_clauses.clone(),
            specification: FunctionSpec::Body(self.body.clone()),
            saved_environment: self.saved_environment.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InitEntry {
    pub line: usize,
    pub arguments: Arguments,
    pub body: Ast,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructEntry {
    pub line: usize,
    pub name: Name,
    pub parameters: Parameters,
    pub implemented_interfaces: Interfaces,
    pub fields: IndexMap<String, DeclEntry>,
    pub init_declarations: IndexMap<String, InitEntry>,
    pub methods: IndexMap<String, FunctionEntry>,
}

impl StructEntry {
    pub fn implements_interface(&self, interface: &Interface) -> bool {
        self.implemented_interfaces.contains(interface)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AlgebraicEntry {
    pub line: usize,
    pub name: Name,
    pub parameters: Parameters,
    pub constructors: IndexMap<String, StructEntry>,
    pub methods: IndexMap<String, FunctionEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceEntry {
    pub line: usize,
    pub name: Interface,
    pub parameters: Parameters,
    /// Direct parents as written in the declaration.
    pub implemented_interfaces: Interfaces,
    pub fields: IndexMap<String, DeclEntry>,
    pub methods: IndexMap<String, FunctionEntry>,
    /// Transitive closure over parents, each member tagged with the
    /// interface it came from for error provenance.
    pub inherited_fields: IndexMap<String, (Interface, DeclEntry)>,
    pub inherited_methods: IndexMap<String, (Interface, FunctionEntry)>,
}

/// A generic type parameter together with the obligations derived from the
/// `where`-clauses in scope at its declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterEntry {
    pub line: usize,
    pub name: Name,
    pub implemented_interfaces: Interfaces,
    pub fields: IndexMap<String, DeclEntry>,
    pub methods: IndexMap<String, FunctionEntry>,
}

impl ParameterEntry {
    pub fn implements_interface(&self, interface: &Interface) -> bool {
        self.implemented_interfaces.contains(interface)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Decl(DeclEntry),
    Function(FunctionEntry),
    Init(InitEntry),
    Struct(StructEntry),
    Algebraic(AlgebraicEntry),
    Interface(InterfaceEntry),
    Parameter(ParameterEntry),
}

impl Entry {
    pub fn kind(&self) -> &'static str {
        match self {
            Entry::Decl(_) => "declaration",
            Entry::Function(_) => "function",
            Entry::Init(_) => "init",
            Entry::Struct(_) => "struct",
            Entry::Algebraic(_) => "algebraic",
            Entry::Interface(_) => "interface",
            Entry::Parameter(_) => "parameter",
        }
    }
}
