//! Backtracking recursive-descent parser over the raw source text.
//! Blocks are indentation-based (four spaces per level) and the set of
//! statement parsers grows lexically: loop bodies accept `break`,
//! function bodies accept `return`, struct bodies accept field, init and
//! method declarations, init bodies accept `init(...)` delegation.
//!
//! Binary expressions are parsed right-leaning and re-associated by
//! operator priority afterwards, rotating subtrees so that every
//! operator's children bind strictly tighter.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::*;
use crate::errors::{Code, Error, Result};

static IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^_?_?[a-zA-Z][a-zA-Z0-9]*(?:__)?").unwrap());
static INTEGER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+").unwrap());

fn operator_priority(operator: Operator) -> u8 {
    match operator {
        Operator::Add | Operator::Sub => 1,
        Operator::Mul | Operator::Div => 2,
        Operator::EqEq
        | Operator::NotEq
        | Operator::LtEq
        | Operator::GtEq
        | Operator::Lt
        | Operator::Gt => 3,
        Operator::And | Operator::Or => 2,
        Operator::Is => 4,
        _ => 0,
    }
}

/// Re-associate `left op right` so that association follows operator
/// priority, rotating the already-built subtrees where needed.
pub fn build_binary_expression(
    left: Expression,
    operator: Operator,
    right: Expression,
) -> Expression {
    let priority = operator_priority(operator);
    match (left, right) {
        (Expression::BinaryExpression(left), Expression::BinaryExpression(right)) => {
            let left_priority = operator_priority(left.operator);
            let right_priority = operator_priority(right.operator);
            if left_priority >= priority && right_priority > priority {
                // (a * b) + (c * d)
                Expression::binary(
                    Expression::BinaryExpression(left),
                    operator,
                    Expression::BinaryExpression(right),
                )
            } else if left_priority >= priority && priority >= right_priority {
                // ((a + b) + c) + d
                Expression::binary(
                    Expression::binary(
                        Expression::BinaryExpression(left),
                        operator,
                        right.left,
                    ),
                    right.operator,
                    right.right,
                )
            } else if left_priority < priority && right_priority == priority {
                // a + ((b * c) * d)
                Expression::binary(
                    left.left,
                    left.operator,
                    Expression::binary(
                        Expression::binary(left.right, operator, right.left),
                        right.operator,
                        right.right,
                    ),
                )
            } else if left_priority < priority && priority < right_priority {
                // a + (b * (c ** d))
                Expression::binary(
                    left.left,
                    left.operator,
                    Expression::binary(left.right, operator, Expression::BinaryExpression(right)),
                )
            } else {
                // (a + (b * c)) + d
                Expression::binary(
                    Expression::binary(
                        left.left,
                        left.operator,
                        Expression::binary(left.right, operator, right.left),
                    ),
                    right.operator,
                    right.right,
                )
            }
        }
        (Expression::BinaryExpression(left), right) => {
            let left_priority = operator_priority(left.operator);
            if left_priority < priority {
                // a + (b * c)
                Expression::binary(
                    left.left,
                    left.operator,
                    Expression::binary(left.right, operator, right),
                )
            } else {
                // (a + b) + c
                Expression::binary(Expression::BinaryExpression(left), operator, right)
            }
        }
        (left, Expression::BinaryExpression(right)) => {
            let right_priority = operator_priority(right.operator);
            if priority < right_priority {
                // a + (b * c)
                Expression::binary(left, operator, Expression::BinaryExpression(right))
            } else {
                // (a + b) + c
                Expression::binary(
                    Expression::binary(left, operator, right.left),
                    right.operator,
                    right.right,
                )
            }
        }
        (left, right) => Expression::binary(left, operator, right),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StatementParser {
    InitCall,
    Return,
    Break,
    InitDeclaration,
    FunctionDeclaration,
    FieldDeclaration,
    StructDeclaration,
    ConstantDeclaration,
    VariableDeclaration,
    While,
    For,
    If,
    Assignment,
    FunctionCall,
}

const BASE_BODY_PARSERS: &[StatementParser] = &[
    StatementParser::ConstantDeclaration,
    StatementParser::VariableDeclaration,
    StatementParser::While,
    StatementParser::For,
    StatementParser::If,
    StatementParser::Assignment,
    StatementParser::FunctionCall,
];

enum Trailer {
    Tuple(usize, Vec<Expression>),
    Field(usize, Name),
    Subscript(usize, Expression),
    Cast(usize, Type),
    NamedArgument(usize, Expression),
}

enum TypeTrailer {
    Optional,
    Generic(Vec<Type>),
}

#[derive(Clone, Copy)]
struct State {
    idx: usize,
    position: Position,
}

pub struct Parser {
    code: String,
    code_lines: Vec<String>,
    idx: usize,
    indentation_level: usize,
    position: Position,
    additional_statement_parsers: Vec<StatementParser>,
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

impl Parser {
    pub fn new() -> Parser {
        Parser {
            code: String::new(),
            code_lines: vec![],
            idx: 0,
            indentation_level: 0,
            position: Position::default(),
            additional_statement_parsers: vec![],
        }
    }

    pub fn parse(&mut self, string: &str) -> Result<Ast> {
        self.code = string.to_owned();
        self.code_lines = string.split('\n').map(str::to_owned).collect();
        self.idx = 0;
        self.indentation_level = 0;
        self.position = Position::default();
        self.additional_statement_parsers = vec![];

        let mut result = vec![];
        self.spaces();
        while let Some(node) = self.parse_node()? {
            result.push(node);
            self.spaces();
        }
        if !self.is_eof() {
            return Err(self.error("expected a statement"));
        }
        Ok(result)
    }

    fn rest(&self) -> &str {
        &self.code[self.idx..]
    }

    fn is_eof(&self) -> bool {
        self.rest().is_empty()
    }

    fn backup_state(&self) -> State {
        State {
            idx: self.idx,
            position: self.position,
        }
    }

    fn restore_state(&mut self, state: State) {
        self.idx = state.idx;
        self.position = state.position;
    }

    fn get_code(&self) -> Code {
        let line = self
            .code_lines
            .get(self.position.line - 1)
            .cloned()
            .unwrap_or_default();
        Code::with_column(line, self.position.line, self.position.column)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::SyntaxError {
            message: message.into(),
            code: self.get_code(),
        }
    }

    fn expected(&self, what: &str) -> Error {
        self.error(format!("expected {what}"))
    }

    fn advance(&mut self, text: &str) {
        for character in text.chars() {
            self.idx += character.len_utf8();
            if character == '\n' {
                self.position.next_line();
            } else {
                self.position.next_column();
            }
        }
    }

    /// Consume `string` exactly if the input starts with it.
    fn parse_raw(&mut self, string: &str) -> bool {
        if self.rest().starts_with(string) {
            self.advance(string);
            true
        } else {
            false
        }
    }

    /// Like `parse_raw`, but only when the keyword is followed by a space
    /// so that identifiers sharing the prefix stay intact.
    fn parse_keyword(&mut self, keyword: &str) -> bool {
        let state = self.backup_state();
        if !self.parse_raw(keyword) {
            return false;
        }
        if !self.next_char_isspace() {
            self.restore_state(state);
            return false;
        }
        true
    }

    fn next_char_isspace(&self) -> bool {
        self.rest().chars().next().is_some_and(|c| c.is_whitespace())
    }

    fn next_nonspace_char_is(&self, expected: char) -> bool {
        self.rest()
            .chars()
            .find(|c| !c.is_whitespace())
            .is_some_and(|c| c == expected)
    }

    /// Skip whitespace and `//` line comments.
    fn spaces(&mut self) {
        loop {
            let rest = self.rest();
            let mut chars = rest.chars();
            match chars.next() {
                Some(c) if c.is_whitespace() => {
                    let mut consumed = String::new();
                    consumed.push(c);
                    self.advance(&consumed);
                }
                Some('/') if chars.next() == Some('/') => {
                    let comment: String =
                        rest.chars().take_while(|c| *c != '\n').collect();
                    self.advance(&comment);
                }
                _ => break,
            }
        }
    }

    fn parse_identifier(&mut self) -> Option<String> {
        let matched = IDENTIFIER_REGEX.find(self.rest())?.as_str().to_owned();
        self.advance(&matched);
        Some(matched)
    }

    fn parse_name(&mut self) -> Result<Option<Name>> {
        let Some(identifier) = self.parse_identifier() else {
            return Ok(None);
        };
        if self.parse_raw("#") {
            let Some(member) = self.parse_identifier() else {
                return Err(self.expected("identifier"));
            };
            return Ok(Some(Name {
                member,
                module: Some(identifier),
                unmangled: None,
            }));
        }
        Ok(Some(Name::new(identifier)))
    }

    // ----- types -----

    pub fn parse_type(&mut self) -> Result<Option<Type>> {
        let Some(mut inner) = self.parse_type_atom_with_prefixes()? else {
            return Ok(None);
        };
        while let Some(trailer) = self.parse_type_trailer()? {
            inner = match trailer {
                TypeTrailer::Optional => Type::Optional(Box::new(inner)),
                TypeTrailer::Generic(parameters) => {
                    let Type::Name(name) = inner else {
                        return Err(self.error("only named types take type parameters"));
                    };
                    Type::Generic(GenericType {
                        base: GenericTypeBase::Name(name),
                        parameters,
                    })
                }
            };
        }
        Ok(Some(inner))
    }

    fn parse_type_trailer(&mut self) -> Result<Option<TypeTrailer>> {
        if self.parse_raw("?") {
            return Ok(Some(TypeTrailer::Optional));
        }
        let parameters = self.parse_container("<", ">", ",", Parser::parse_type)?;
        match parameters {
            Some(parameters) if !parameters.is_empty() => {
                Ok(Some(TypeTrailer::Generic(parameters)))
            }
            _ => Ok(None),
        }
    }

    fn parse_type_atom_with_prefixes(&mut self) -> Result<Option<Type>> {
        if self.parse_raw("ref ") {
            self.spaces();
            let Some(value_type) = self.parse_type()? else {
                return Err(self.expected("type"));
            };
            return Ok(Some(Type::Ref(Box::new(value_type))));
        }
        self.parse_type_atom()
    }

    fn parse_type_atom(&mut self) -> Result<Option<Type>> {
        if let Some(container) = self.parse_vector_or_dict_type()? {
            return Ok(Some(container));
        }
        Ok(self.parse_name()?.map(Type::Name))
    }

    fn parse_vector_or_dict_type(&mut self) -> Result<Option<Type>> {
        if !self.parse_raw("[") {
            return Ok(None);
        }
        let Some(subtype) = self.parse_type()? else {
            return Err(self.expected("type"));
        };
        if self.parse_raw(":") {
            self.spaces();
            let Some(value_type) = self.parse_type()? else {
                return Err(self.expected("type"));
            };
            if !self.parse_raw("]") {
                return Err(self.expected("']'"));
            }
            return Ok(Some(Type::Dict(Box::new(subtype), Box::new(value_type))));
        }
        if !self.parse_raw("]") {
            return Err(self.expected("']'"));
        }
        Ok(Some(Type::Vector(Box::new(subtype))))
    }

    // ----- expressions -----

    pub fn parse_expression(&mut self) -> Result<Option<Expression>> {
        self.parse_boolean_expression()
    }

    fn parse_binary_level(
        &mut self,
        left_parser: fn(&mut Parser) -> Result<Option<Expression>>,
        operators: &[Operator],
        alphabetic: bool,
        right_parser: fn(&mut Parser) -> Result<Option<Expression>>,
    ) -> Result<Option<Expression>> {
        let Some(left) = left_parser(self)? else {
            return Ok(None);
        };
        let state = self.backup_state();
        self.spaces();
        let mut parsed_operator = None;
        for operator in operators {
            let matched = if alphabetic {
                self.parse_keyword(operator.as_str())
            } else {
                self.parse_raw(operator.as_str())
            };
            if matched {
                parsed_operator = Some(*operator);
                break;
            }
        }
        let Some(operator) = parsed_operator else {
            self.restore_state(state);
            return Ok(Some(left));
        };
        self.spaces();
        let Some(right) = right_parser(self)? else {
            return Err(self.expected("expression"));
        };
        Ok(Some(build_binary_expression(left, operator, right)))
    }

    fn parse_boolean_expression(&mut self) -> Result<Option<Expression>> {
        self.parse_binary_level(
            Parser::parse_expression_comparison,
            Operator::higher_order_boolean_operators(),
            true,
            Parser::parse_boolean_expression,
        )
    }

    fn parse_expression_comparison(&mut self) -> Result<Option<Expression>> {
        self.parse_binary_level(
            Parser::parse_expression_subexpression,
            Operator::comparison_operators(),
            false,
            Parser::parse_expression_comparison,
        )
    }

    fn parse_expression_subexpression(&mut self) -> Result<Option<Expression>> {
        self.parse_binary_level(
            Parser::parse_expression_term,
            &[Operator::Sub, Operator::Add],
            false,
            Parser::parse_expression_subexpression,
        )
    }

    fn parse_expression_term(&mut self) -> Result<Option<Expression>> {
        self.parse_binary_level(
            Parser::parse_expression_atom_with_trailers,
            &[Operator::Mul, Operator::Div],
            false,
            Parser::parse_expression_term,
        )
    }

    fn parse_expression_atom_with_trailers(&mut self) -> Result<Option<Expression>> {
        let Some(mut atom) = self.parse_expression_atom_with_prefixes()? else {
            return Ok(None);
        };
        while let Some(trailer) = self.parse_trailer()? {
            atom = match trailer {
                Trailer::Tuple(line, arguments) => {
                    Expression::FunctionCall(Box::new(FunctionCall::new(line, atom, arguments)))
                }
                Trailer::Field(line, field) => Expression::field(line, atom, field),
                Trailer::Subscript(line, index) => Expression::Subscript(Box::new(Subscript {
                    line,
                    base: atom,
                    index,
                    base_type: None,
                })),
                Trailer::Cast(_, to_type) => Expression::Cast(Box::new(Cast {
                    value: atom,
                    to_type,
                    is_builtin: true,
                })),
                Trailer::NamedArgument(_, value) => {
                    let Expression::Name(name) = atom else {
                        return Err(self.error("only names can be named arguments"));
                    };
                    Expression::NamedArgument {
                        name,
                        value: Box::new(value),
                    }
                }
            };
        }
        Ok(Some(atom))
    }

    fn parse_expression_atom_with_prefixes(&mut self) -> Result<Option<Expression>> {
        if self.parse_raw("ref ") {
            self.spaces();
            // `ref 1 + 2` reads as `(ref 1) + 2`.
            let Some(value) = self.parse_expression_atom_with_trailers()? else {
                return Err(self.expected("expression"));
            };
            return Ok(Some(Expression::Ref {
                value: Box::new(value),
                value_type: None,
            }));
        }
        if self.parse_raw("(") {
            self.spaces();
            let Some(inner) = self.parse_expression()? else {
                return Err(self.expected("expression"));
            };
            if !self.parse_raw(")") {
                return Err(self.expected("')'"));
            }
            return Ok(Some(Expression::Parentheses {
                value: Box::new(inner),
            }));
        }
        self.parse_expression_atom()
    }

    fn parse_expression_atom(&mut self) -> Result<Option<Expression>> {
        if let Some(number) = self.parse_number_literal()? {
            return Ok(Some(number));
        }
        if let Some(container) = self.parse_vector_or_dict_literal()? {
            return Ok(Some(container));
        }
        if let Some(character) = self.parse_char_literal()? {
            return Ok(Some(character));
        }
        if let Some(string) = self.parse_string_literal()? {
            return Ok(Some(string));
        }
        Ok(self.parse_name()?.map(Expression::Name))
    }

    fn parse_trailer(&mut self) -> Result<Option<Trailer>> {
        let line = self.position.line;
        let state = self.backup_state();
        if let Some(arguments) = self.parse_container("(", ")", ",", Parser::parse_expression)? {
            return Ok(Some(Trailer::Tuple(line, arguments)));
        }
        if self.parse_raw(".") {
            let Some(field) = self.parse_identifier() else {
                return Err(self.expected("identifier"));
            };
            return Ok(Some(Trailer::Field(line, Name::new(field))));
        }
        if self.parse_raw("[") {
            let Some(index) = self.parse_expression()? else {
                return Err(self.expected("expression"));
            };
            if !self.parse_raw("]") {
                return Err(self.expected("']'"));
            }
            return Ok(Some(Trailer::Subscript(line, index)));
        }
        self.spaces();
        if self.parse_keyword("as") {
            self.spaces();
            let Some(to_type) = self.parse_type()? else {
                return Err(self.expected("type"));
            };
            return Ok(Some(Trailer::Cast(line, to_type)));
        }
        if self.parse_raw("=") && self.next_char_isspace() {
            self.spaces();
            let Some(value) = self.parse_expression()? else {
                return Err(self.expected("expression"));
            };
            return Ok(Some(Trailer::NamedArgument(line, value)));
        }
        self.restore_state(state);
        Ok(None)
    }

    fn parse_number_literal(&mut self) -> Result<Option<Expression>> {
        let Some(integer) = self.parse_integer_literal(true) else {
            return Ok(None);
        };
        if !self.parse_raw(".") {
            return Ok(Some(Expression::IntegerLiteral {
                value: integer,
                type_annotation: None,
            }));
        }
        let Some(fractional) = self.parse_integer_literal(false) else {
            return Err(self.expected("fractional part"));
        };
        Ok(Some(Expression::DecimalLiteral {
            value: format!("{integer}.{fractional}"),
        }))
    }

    fn parse_integer_literal(&mut self, unary_operators: bool) -> Option<String> {
        let state = self.backup_state();
        let mut minuses = String::new();
        while unary_operators && self.parse_raw("-") {
            minuses.push('-');
        }
        let Some(matched) = INTEGER_REGEX.find(self.rest()) else {
            self.restore_state(state);
            return None;
        };
        let digits = matched.as_str().to_owned();
        self.advance(&digits);
        Some(format!("{minuses}{digits}"))
    }

    fn parse_char_literal(&mut self) -> Result<Option<Expression>> {
        if !self.parse_raw("'") {
            return Ok(None);
        }
        let mut collected = String::new();
        loop {
            let Some(character) = self.rest().chars().next() else {
                return Err(self.error("expected exactly one character"));
            };
            self.advance(&character.to_string());
            if character == '\'' {
                break;
            }
            if character == '\\' {
                collected.push(character);
                if let Some(escaped) = self.rest().chars().next() {
                    collected.push(escaped);
                    self.advance(&escaped.to_string());
                }
                continue;
            }
            collected.push(character);
        }
        let unescaped = unescape::unescape(&collected)
            .ok_or_else(|| self.error("bad escape sequence"))?;
        let mut characters = unescaped.chars();
        let (Some(character), None) = (characters.next(), characters.next()) else {
            return Err(self.error("expected exactly one character"));
        };
        Ok(Some(Expression::CharLiteral { value: character }))
    }

    fn parse_string_literal(&mut self) -> Result<Option<Expression>> {
        if !self.parse_raw("\"") {
            return Ok(None);
        }
        let mut collected = String::new();
        loop {
            let Some(character) = self.rest().chars().next() else {
                return Err(self.error("expected '\"'"));
            };
            self.advance(&character.to_string());
            if character == '"' {
                break;
            }
            if character == '\\' {
                collected.push(character);
                if let Some(escaped) = self.rest().chars().next() {
                    collected.push(escaped);
                    self.advance(&escaped.to_string());
                }
                continue;
            }
            collected.push(character);
        }
        let unescaped = unescape::unescape(&collected)
            .ok_or_else(|| self.error("bad escape sequence"))?;
        Ok(Some(Expression::StringLiteral { value: unescaped }))
    }

    fn parse_vector_or_dict_literal(&mut self) -> Result<Option<Expression>> {
        if self.parse_raw("[:]") {
            return Ok(Some(Expression::DictLiteral {
                keys: vec![],
                values: vec![],
                annotation: None,
            }));
        }
        #[allow(clippy::type_complexity)]
        let elements: Option<Vec<(Expression, Option<Expression>)>> =
            self.parse_container("[", "]", ",", |parser| {
                let Some(key) = parser.parse_expression()? else {
                    return Ok(None);
                };
                if parser.parse_raw(":") {
                    parser.spaces();
                    let Some(value) = parser.parse_expression()? else {
                        return Err(parser.expected("expression"));
                    };
                    return Ok(Some((key, Some(value))));
                }
                Ok(Some((key, None)))
            })?;
        let Some(elements) = elements else {
            return Ok(None);
        };
        let is_dict = elements.first().map(|(_, value)| value.is_some());
        match is_dict {
            None => Ok(Some(Expression::VectorLiteral {
                elements: vec![],
                type_annotation: None,
            })),
            Some(true) => {
                let mut keys = vec![];
                let mut values = vec![];
                for (key, value) in elements {
                    let Some(value) = value else {
                        return Err(self.error("unknown container"));
                    };
                    keys.push(key);
                    values.push(value);
                }
                Ok(Some(Expression::DictLiteral {
                    keys,
                    values,
                    annotation: None,
                }))
            }
            Some(false) => {
                let mut plain = vec![];
                for (key, value) in elements {
                    if value.is_some() {
                        return Err(self.error("unknown container"));
                    }
                    plain.push(key);
                }
                Ok(Some(Expression::VectorLiteral {
                    elements: plain,
                    type_annotation: None,
                }))
            }
        }
    }

    // ----- shared small pieces -----

    fn parse_elements<T>(
        &mut self,
        separator: &str,
        parser: impl Fn(&mut Parser) -> Result<Option<T>>,
        ending_chars: &str,
        raise_error: bool,
    ) -> Result<Vec<T>> {
        let mut result = vec![];
        while let Some(element) = parser(self)? {
            result.push(element);
            if !self.parse_raw(separator)
                && !ending_chars.chars().any(|c| self.next_nonspace_char_is(c))
            {
                if raise_error {
                    return Err(self.error(format!(
                        "expected '{separator}' or any char in '{ending_chars}'"
                    )));
                }
                return Ok(result);
            }
            self.spaces();
        }
        Ok(result)
    }

    fn parse_container<T>(
        &mut self,
        open: &str,
        close: &str,
        separator: &str,
        parser: impl Fn(&mut Parser) -> Result<Option<T>>,
    ) -> Result<Option<Vec<T>>> {
        if !self.parse_raw(open) {
            return Ok(None);
        }
        let result = self.parse_elements(separator, parser, close, true)?;
        if !self.parse_raw(close) {
            return Err(self.expected(&format!("'{close}'")));
        }
        Ok(Some(result))
    }

    fn parse_argument(&mut self) -> Result<Option<Argument>> {
        let Some(name) = self.parse_name()? else {
            return Ok(None);
        };
        if !self.parse_raw(":") {
            return Err(self.expected("name"));
        }
        self.spaces();
        let Some(type_) = self.parse_type()? else {
            return Err(self.expected("type"));
        };
        let state = self.backup_state();
        self.spaces();
        if self.parse_raw("= ") {
            self.spaces();
            let Some(value) = self.parse_expression()? else {
                return Err(self.expected("expression"));
            };
            return Ok(Some(Argument {
                name,
                type_,
                value: Some(value),
            }));
        }
        self.restore_state(state);
        Ok(Some(Argument {
            name,
            type_,
            value: None,
        }))
    }

    // ----- statements -----

    fn parse_node(&mut self) -> Result<Option<Node>> {
        const NODE_PARSERS: &[StatementParser] = &[
            StatementParser::ConstantDeclaration,
            StatementParser::VariableDeclaration,
            StatementParser::FunctionDeclaration,
            StatementParser::StructDeclaration,
            StatementParser::While,
            StatementParser::For,
            StatementParser::If,
            StatementParser::Assignment,
            StatementParser::FunctionCall,
        ];
        for parser in NODE_PARSERS {
            if let Some(node) = self.dispatch_statement(*parser)? {
                return Ok(Some(node));
            }
        }
        if let Some(node) = self.parse_algebraic_declaration()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_interface_declaration()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_extension_declaration()? {
            return Ok(Some(node));
        }
        Ok(None)
    }

    fn dispatch_statement(&mut self, parser: StatementParser) -> Result<Option<Node>> {
        match parser {
            StatementParser::InitCall => self.parse_init_call(),
            StatementParser::Return => self.parse_return_statement(),
            StatementParser::Break => self.parse_break(),
            StatementParser::InitDeclaration => self.parse_init_declaration(),
            StatementParser::FunctionDeclaration => self.parse_function_declaration(),
            StatementParser::FieldDeclaration => self.parse_field_declaration(),
            StatementParser::StructDeclaration => self.parse_struct_declaration(),
            StatementParser::ConstantDeclaration => {
                Ok(self.parse_constant_declaration()?.map(Node::Decl))
            }
            StatementParser::VariableDeclaration => {
                Ok(self.parse_variable_declaration()?.map(Node::Decl))
            }
            StatementParser::While => self.parse_while_statement(),
            StatementParser::For => self.parse_for_statement(),
            StatementParser::If => self.parse_if_statement(),
            StatementParser::Assignment => self.parse_assignment(),
            StatementParser::FunctionCall => self.parse_function_call(),
        }
    }

    fn parse_body(&mut self) -> Result<Ast> {
        let parsers: Vec<StatementParser> = self
            .additional_statement_parsers
            .iter()
            .copied()
            .chain(BASE_BODY_PARSERS.iter().copied())
            .collect();
        self.indentation_level += 1;
        let mut result = vec![];
        loop {
            let state = self.backup_state();
            if !self.parse_indentation() {
                self.restore_state(state);
                break;
            }
            let mut parsed = None;
            for parser in &parsers {
                if let Some(node) = self.dispatch_statement(*parser)? {
                    parsed = Some(node);
                    break;
                }
            }
            let Some(node) = parsed else {
                self.restore_state(state);
                break;
            };
            result.push(node);
        }
        self.indentation_level -= 1;
        Ok(result)
    }

    fn parse_indentation(&mut self) -> bool {
        let mut consumed = String::new();
        for character in self.rest().chars() {
            if character == '\n' || character.is_whitespace() {
                consumed.push(character);
            } else {
                break;
            }
        }
        self.advance(&consumed);
        let expected = INDENTATION.repeat(self.indentation_level);
        consumed.ends_with(&expected)
    }

    fn parse_constant_declaration(&mut self) -> Result<Option<Decl>> {
        let line = self.position.line;
        if !self.parse_keyword("let") {
            return Ok(None);
        }
        let (name, type_, value) = self.parse_constant_and_variable_common()?;
        Ok(Some(Decl {
            line,
            decl_type: DeclType::Constant,
            name,
            type_,
            value,
        }))
    }

    fn parse_variable_declaration(&mut self) -> Result<Option<Decl>> {
        let line = self.position.line;
        if !self.parse_keyword("var") {
            return Ok(None);
        }
        let (name, type_, value) = self.parse_constant_and_variable_common()?;
        Ok(Some(Decl {
            line,
            decl_type: DeclType::Variable,
            name,
            type_,
            value,
        }))
    }

    fn parse_constant_and_variable_common(
        &mut self,
    ) -> Result<(Name, Option<Type>, Option<Expression>)> {
        self.spaces();
        let Some(name) = self.parse_name()? else {
            return Err(self.expected("name"));
        };
        if self.parse_raw(":") {
            self.spaces();
            let Some(type_) = self.parse_type()? else {
                return Err(self.expected("type"));
            };
            let state = self.backup_state();
            self.spaces();
            if self.parse_raw("=") {
                self.spaces();
                let Some(value) = self.parse_expression()? else {
                    return Err(self.expected("expression"));
                };
                return Ok((name, Some(type_), Some(value)));
            }
            self.restore_state(state);
            return Ok((name, Some(type_), None));
        }
        self.spaces();
        if !self.parse_raw("=") {
            return Err(self.error("expected '=' (or ':' but without spaces)"));
        }
        self.spaces();
        let Some(value) = self.parse_expression()? else {
            return Err(self.expected("expression"));
        };
        Ok((name, None, Some(value)))
    }

    fn parse_function_call(&mut self) -> Result<Option<Node>> {
        let state = self.backup_state();
        let Some(call) = self.parse_expression()? else {
            return Ok(None);
        };
        match call {
            Expression::FunctionCall(call) => Ok(Some(Node::FunctionCall(*call))),
            _ => {
                self.restore_state(state);
                Ok(None)
            }
        }
    }

    fn parse_assignment(&mut self) -> Result<Option<Node>> {
        let state = self.backup_state();
        let line = self.position.line;
        let Some(left) = self.parse_assignment_left()? else {
            return Ok(None);
        };
        self.spaces();
        let Some(operator) = self.parse_assignment_operator() else {
            self.restore_state(state);
            return Ok(None);
        };
        self.spaces();
        let Some(right) = self.parse_expression()? else {
            return Err(self.expected("expression"));
        };
        Ok(Some(Node::Assignment {
            line,
            left,
            operator,
            right,
        }))
    }

    /// Assignment targets take only field and subscript trailers; the
    /// `=` itself belongs to the assignment operator.
    fn parse_assignment_left(&mut self) -> Result<Option<Expression>> {
        let state = self.backup_state();
        let Some(name) = self.parse_name()? else {
            return Ok(None);
        };
        let mut atom = Expression::Name(name);
        loop {
            if self.parse_raw(".") {
                let line = self.position.line;
                let Some(field) = self.parse_identifier() else {
                    self.restore_state(state);
                    return Ok(None);
                };
                atom = Expression::field(line, atom, Name::new(field));
                continue;
            }
            if self.parse_raw("[") {
                let line = self.position.line;
                let Some(index) = self.parse_expression()? else {
                    return Err(self.expected("expression"));
                };
                if !self.parse_raw("]") {
                    return Err(self.expected("']'"));
                }
                atom = Expression::Subscript(Box::new(Subscript {
                    line,
                    base: atom,
                    index,
                    base_type: None,
                }));
                continue;
            }
            break;
        }
        Ok(Some(atom))
    }

    fn parse_assignment_operator(&mut self) -> Option<Operator> {
        for operator in Operator::assignment_operators() {
            let state = self.backup_state();
            if self.parse_raw(operator.as_str()) {
                // A bare `=` must not eat the first half of `==`.
                if *operator == Operator::Assign && self.rest().starts_with('=') {
                    self.restore_state(state);
                    return None;
                }
                return Some(*operator);
            }
        }
        None
    }

    fn parse_if_condition(&mut self) -> Result<Expression> {
        if let Some(decl) = self.parse_constant_declaration()? {
            return Ok(Expression::Decl(Box::new(decl)));
        }
        match self.parse_expression()? {
            Some(condition) => Ok(condition),
            None => Err(self.expected("expression or 'let'")),
        }
    }

    fn parse_conditional_common(&mut self) -> Result<(Expression, Ast)> {
        self.spaces();
        let condition = self.parse_if_condition()?;
        if !self.parse_raw(":") {
            return Err(self.expected("':'"));
        }
        let body = self.parse_body()?;
        if body.is_empty() {
            return Err(self.expected("statement"));
        }
        Ok((condition, body))
    }

    fn parse_if_statement(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("if ") {
            return Ok(None);
        }
        let (condition, body) = self.parse_conditional_common()?;
        let mut elifs = vec![];
        let mut state = self.backup_state();
        self.spaces();
        while self.parse_raw("elif ") {
            elifs.push(self.parse_conditional_common()?);
            state = self.backup_state();
            self.spaces();
        }
        let mut else_body = vec![];
        if self.parse_raw("else:") {
            else_body = self.parse_body()?;
            if else_body.is_empty() {
                return Err(self.expected("statement"));
            }
        } else {
            self.restore_state(state);
        }
        Ok(Some(Node::If {
            line,
            condition,
            body,
            elifs,
            else_body,
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("while ") {
            return Ok(None);
        }
        self.spaces();
        let condition = self.parse_if_condition()?;
        let body = self.parse_loop_body()?;
        Ok(Some(Node::While {
            line,
            condition,
            body,
        }))
    }

    fn parse_loop_body(&mut self) -> Result<Ast> {
        if !self.parse_raw(":") {
            return Err(self.expected("':'"));
        }
        self.additional_statement_parsers.push(StatementParser::Break);
        let body = self.parse_body();
        self.additional_statement_parsers.pop();
        let body = body?;
        if body.is_empty() {
            return Err(self.expected("statement"));
        }
        Ok(body)
    }

    fn parse_for_statement(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("for ") {
            return Ok(None);
        }
        self.spaces();
        let Some(element) = self.parse_name()? else {
            return Err(self.expected("name"));
        };
        self.spaces();
        if !self.parse_raw("in ") {
            return Err(self.expected("'in'"));
        }
        self.spaces();
        let Some(container) = self.parse_expression()? else {
            return Err(self.expected("expression"));
        };
        let body = self.parse_loop_body()?;
        Ok(Some(Node::For {
            line,
            element,
            container,
            body,
            container_type: None,
        }))
    }

    fn parse_break(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("break") {
            return Ok(None);
        }
        Ok(Some(Node::Break { line }))
    }

    fn parse_return_statement(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("return ") {
            return Ok(None);
        }
        self.spaces();
        let Some(value) = self.parse_expression()? else {
            return Err(self.expected("expression"));
        };
        Ok(Some(Node::Return { line, value }))
    }

    fn parse_init_call(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        let state = self.backup_state();
        if !self.parse_raw("init") {
            return Ok(None);
        }
        let Some(arguments) = self.parse_container("(", ")", ",", Parser::parse_expression)?
        else {
            self.restore_state(state);
            return Ok(None);
        };
        Ok(Some(Node::InitCall { line, arguments }))
    }

    fn parse_init_declaration(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("init") {
            return Ok(None);
        }
        let arguments = self
            .parse_container("(", ")", ",", Parser::parse_argument)?
            .unwrap_or_default();
        if !self.parse_raw(":") {
            return Err(self.expected("':'"));
        }
        self.additional_statement_parsers
            .insert(0, StatementParser::InitCall);
        let body = self.parse_body();
        self.additional_statement_parsers.remove(0);
        let body = body?;
        if body.is_empty() {
            return Err(self.expected("statement"));
        }
        Ok(Some(Node::InitDeclaration(InitDeclaration {
            line,
            arguments,
            body,
        })))
    }

    fn parse_where_clause(&mut self) -> Result<Option<Expression>> {
        let state = self.backup_state();
        self.spaces();
        if !self.parse_raw("where ") {
            self.restore_state(state);
            return Ok(None);
        }
        self.spaces();
        match self.parse_expression()? {
            Some(condition) => Ok(Some(condition)),
            None => Err(self.expected("condition after 'where'")),
        }
    }

    fn parse_function_declaration(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("fun ") {
            return Ok(None);
        }
        self.spaces();
        let Some(name) = self.parse_name()? else {
            return Err(self.expected("name"));
        };
        let parameters = self
            .parse_container("<", ">", ",", Parser::parse_name)?
            .unwrap_or_default();
        let arguments = self
            .parse_container("(", ")", ",", Parser::parse_argument)?
            .unwrap_or_default();
        self.spaces();
        let return_type = if self.parse_raw("->") {
            self.spaces();
            match self.parse_type()? {
                Some(return_type) => return_type,
                None => return Err(self.expected("type")),
            }
        } else {
            Type::Builtin(BuiltinType::Void)
        };
        let where_clause = self.parse_where_clause()?;
        if !self.parse_raw(":") {
            return Ok(Some(Node::FunctionDeclaration(FunctionDeclaration {
                line,
                name,
                parameters,
                arguments,
                return_type,
                where_clause,
                body: vec![],
            })));
        }
        self.additional_statement_parsers.push(StatementParser::Return);
        let body = self.parse_body();
        self.additional_statement_parsers.pop();
        let body = body?;
        if body.is_empty() {
            return Err(self.expected("statement"));
        }
        Ok(Some(Node::FunctionDeclaration(FunctionDeclaration {
            line,
            name,
            parameters,
            arguments,
            return_type,
            where_clause,
            body,
        })))
    }

    fn parse_field_declaration(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        let state = self.backup_state();
        let Some(name) = self.parse_name()? else {
            return Ok(None);
        };
        if !self.parse_raw(":") {
            self.restore_state(state);
            return Ok(None);
        }
        self.spaces();
        let Some(type_) = self.parse_type()? else {
            return Err(self.expected("type"));
        };
        let new_state = self.backup_state();
        self.spaces();
        if !self.parse_raw("=") {
            self.restore_state(new_state);
            return Ok(Some(Node::FieldDeclaration(FieldDeclaration {
                line,
                name,
                type_,
                value: None,
            })));
        }
        self.spaces();
        let Some(value) = self.parse_expression()? else {
            return Err(self.expected("expression"));
        };
        Ok(Some(Node::FieldDeclaration(FieldDeclaration {
            line,
            name,
            type_,
            value: Some(value),
        })))
    }

    fn parse_implemented_interfaces(&mut self) -> Result<Interfaces> {
        let state = self.backup_state();
        self.spaces();
        if !self.parse_raw("is ") {
            self.restore_state(state);
            return Ok(vec![]);
        }
        self.spaces();
        let interfaces = self.parse_elements(
            ",",
            |parser| {
                let Some(raw) = parser.parse_type()? else {
                    return Ok(None);
                };
                match raw {
                    Type::Name(name) => Ok(Some(Interface::Name(name))),
                    Type::Generic(generic) => Ok(Some(Interface::Generic(generic))),
                    _ => Err(parser.error("expected an interface")),
                }
            },
            ":",
            false,
        )?;
        Ok(interfaces)
    }

    fn parse_struct_common(&mut self) -> Result<(Name, Parameters, Interfaces)> {
        self.spaces();
        let Some(name) = self.parse_name()? else {
            return Err(self.expected("name"));
        };
        let parameters = self
            .parse_container("<", ">", ",", Parser::parse_name)?
            .unwrap_or_default();
        let interfaces = self.parse_implemented_interfaces()?;
        Ok((name, parameters, interfaces))
    }

    fn parse_struct_declaration(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("struct ") {
            return Ok(None);
        }
        let (name, parameters, interfaces) = self.parse_struct_common()?;
        if !self.parse_raw(":") {
            return Ok(Some(Node::StructDeclaration(self.make_struct_declaration(
                line,
                name,
                parameters,
                interfaces,
                vec![],
            )?)));
        }
        self.additional_statement_parsers
            .push(StatementParser::InitDeclaration);
        self.additional_statement_parsers
            .push(StatementParser::FunctionDeclaration);
        self.additional_statement_parsers
            .push(StatementParser::FieldDeclaration);
        let body = self.parse_body();
        self.additional_statement_parsers.pop();
        self.additional_statement_parsers.pop();
        self.additional_statement_parsers.pop();
        let body = body?;
        if body.is_empty() {
            return Err(self.expected("statement"));
        }
        Ok(Some(Node::StructDeclaration(self.make_struct_declaration(
            line, name, parameters, interfaces, body,
        )?)))
    }

    /// Leading `__` (or `as`) makes a method special, a single leading `_`
    /// makes a member private; the same rule partitions fields.
    fn decide_method_scope(
        &self,
        declaration: FunctionDeclaration,
        methods: &mut DeclaredMethods,
    ) {
        let method = MethodDeclaration {
            line: declaration.line,
            name: declaration.name,
            parameters: declaration.parameters,
            arguments: declaration.arguments,
            return_type: declaration.return_type,
            body: declaration.body,
        };
        if method.name.member.starts_with("__") || method.name.member == "as" {
            methods.special.push(method);
        } else if method.name.member.starts_with('_') {
            methods.private.push(method);
        } else {
            methods.public.push(method);
        }
    }

    fn make_struct_declaration(
        &self,
        line: usize,
        name: Name,
        parameters: Parameters,
        interfaces: Interfaces,
        body: Ast,
    ) -> Result<StructDeclaration> {
        let mut fields = DeclaredFields::default();
        let mut methods = DeclaredMethods::default();
        let mut init_declarations = vec![];
        for node in body {
            match node {
                Node::FieldDeclaration(field) => {
                    if field.name.member.starts_with('_') {
                        fields.private.push(field);
                    } else {
                        fields.public.push(field);
                    }
                }
                Node::FunctionDeclaration(declaration) => {
                    self.decide_method_scope(declaration, &mut methods);
                }
                Node::InitDeclaration(init) => init_declarations.push(init),
                _ => return Err(self.error("expected method, field or init declaration")),
            }
        }
        Ok(StructDeclaration {
            line,
            name,
            parameters,
            interfaces,
            fields,
            init_declarations,
            methods,
        })
    }

    fn parse_algebraic_declaration(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("algebraic ") {
            return Ok(None);
        }
        self.spaces();
        let Some(name) = self.parse_name()? else {
            return Err(self.expected("name"));
        };
        if !self.parse_raw(":") {
            return Ok(Some(Node::AlgebraicDeclaration(AlgebraicDeclaration {
                line,
                name,
                parameters: vec![],
                constructors: vec![],
                methods: DeclaredMethods::default(),
            })));
        }
        self.additional_statement_parsers
            .push(StatementParser::StructDeclaration);
        self.additional_statement_parsers
            .push(StatementParser::FunctionDeclaration);
        let body = self.parse_body();
        self.additional_statement_parsers.pop();
        self.additional_statement_parsers.pop();
        let body = body?;
        if body.is_empty() {
            return Err(self.expected("statement"));
        }
        let mut constructors = vec![];
        let mut methods = DeclaredMethods::default();
        for node in body {
            match node {
                Node::StructDeclaration(constructor) => constructors.push(constructor),
                Node::FunctionDeclaration(declaration) => {
                    self.decide_method_scope(declaration, &mut methods);
                }
                _ => return Err(self.error("expected method or constructor declaration")),
            }
        }
        Ok(Some(Node::AlgebraicDeclaration(AlgebraicDeclaration {
            line,
            name,
            parameters: vec![],
            constructors,
            methods,
        })))
    }

    fn parse_interface_declaration(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("interface ") {
            return Ok(None);
        }
        self.spaces();
        let Some(name) = self.parse_name()? else {
            return Err(self.expected("name"));
        };
        let implemented_interfaces = self.parse_implemented_interfaces()?;
        if !self.parse_raw(":") {
            return Ok(Some(Node::InterfaceDeclaration(InterfaceDeclaration {
                line,
                name,
                parameters: vec![],
                implemented_interfaces,
                fields: vec![],
                methods: vec![],
            })));
        }
        self.additional_statement_parsers
            .push(StatementParser::FieldDeclaration);
        self.additional_statement_parsers
            .push(StatementParser::FunctionDeclaration);
        let body = self.parse_body();
        self.additional_statement_parsers.pop();
        self.additional_statement_parsers.pop();
        let body = body?;
        if body.is_empty() {
            return Err(self.expected("statement"));
        }
        let mut fields = vec![];
        let mut methods = vec![];
        for node in body {
            match node {
                Node::FieldDeclaration(field) => fields.push(field),
                Node::FunctionDeclaration(declaration) => methods.push(MethodDeclaration {
                    line: declaration.line,
                    name: declaration.name,
                    parameters: declaration.parameters,
                    arguments: declaration.arguments,
                    return_type: declaration.return_type,
                    body: declaration.body,
                }),
                _ => return Err(self.error("expected method or field declaration")),
            }
        }
        Ok(Some(Node::InterfaceDeclaration(InterfaceDeclaration {
            line,
            name,
            parameters: vec![],
            implemented_interfaces,
            fields,
            methods,
        })))
    }

    fn parse_extension_declaration(&mut self) -> Result<Option<Node>> {
        let line = self.position.line;
        if !self.parse_raw("extension ") {
            return Ok(None);
        }
        let (name, parameters, interfaces) = self.parse_struct_common()?;
        let where_clause = self.parse_where_clause()?;
        if !self.parse_raw(":") {
            return Ok(Some(Node::ExtensionDeclaration(ExtensionDeclaration {
                line,
                name,
                parameters,
                interfaces,
                where_clause,
                methods: DeclaredMethods::default(),
            })));
        }
        self.additional_statement_parsers
            .push(StatementParser::FunctionDeclaration);
        let body = self.parse_body();
        self.additional_statement_parsers.pop();
        let body = body?;
        if body.is_empty() {
            return Err(self.expected("statement"));
        }
        let mut methods = DeclaredMethods::default();
        for node in body {
            match node {
                Node::FunctionDeclaration(declaration) => {
                    self.decide_method_scope(declaration, &mut methods);
                }
                _ => return Err(self.error("expected method declaration")),
            }
        }
        Ok(Some(Node::ExtensionDeclaration(ExtensionDeclaration {
            line,
            name,
            parameters,
            interfaces,
            where_clause,
            methods,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(member: &str) -> Expression {
        Expression::name(member)
    }

    fn binary(left: Expression, operator: Operator, right: Expression) -> Expression {
        Expression::binary(left, operator, right)
    }

    #[test]
    fn test_build_binary_expression_simple() {
        let input = binary(name("a"), Operator::Add, name("b"));
        assert_eq!(
            build_binary_expression(name("a"), Operator::Add, name("b")),
            input
        );
    }

    #[test]
    fn test_build_binary_expression_nested_same_op() {
        // a + (b + c) re-associates to (a + b) + c.
        let left_leaning = binary(
            binary(name("a"), Operator::Add, name("b")),
            Operator::Add,
            name("c"),
        );
        assert_eq!(
            build_binary_expression(
                name("a"),
                Operator::Add,
                binary(name("b"), Operator::Add, name("c")),
            ),
            left_leaning
        );

        // (a + b) + (c + d) flattens fully to the left.
        let expected = binary(
            binary(
                binary(name("a"), Operator::Add, name("b")),
                Operator::Add,
                name("c"),
            ),
            Operator::Add,
            name("d"),
        );
        assert_eq!(
            build_binary_expression(
                binary(name("a"), Operator::Add, name("b")),
                Operator::Add,
                binary(name("c"), Operator::Add, name("d")),
            ),
            expected
        );
    }

    #[test]
    fn test_build_binary_expression_nested_diff_op() {
        // a * (b + c) re-associates to (a * b) + c.
        let expected = binary(
            binary(name("a"), Operator::Mul, name("b")),
            Operator::Add,
            name("c"),
        );
        assert_eq!(
            build_binary_expression(
                name("a"),
                Operator::Mul,
                binary(name("b"), Operator::Add, name("c")),
            ),
            expected
        );

        // (a * b) + (c * d) stays as it is.
        let stable = build_binary_expression(
            binary(name("a"), Operator::Mul, name("b")),
            Operator::Add,
            binary(name("c"), Operator::Mul, name("d")),
        );
        assert_eq!(
            stable,
            binary(
                binary(name("a"), Operator::Mul, name("b")),
                Operator::Add,
                binary(name("c"), Operator::Mul, name("d")),
            )
        );

        // (a + b) * (c * d) rotates the plus out.
        let rotated = build_binary_expression(
            binary(name("a"), Operator::Add, name("b")),
            Operator::Mul,
            binary(name("c"), Operator::Mul, name("d")),
        );
        assert_eq!(
            rotated,
            binary(
                name("a"),
                Operator::Add,
                binary(
                    binary(name("b"), Operator::Mul, name("c")),
                    Operator::Mul,
                    name("d"),
                ),
            )
        );
    }

    #[test]
    fn test_parse_declarations() {
        let mut parser = Parser::new();
        let ast = parser.parse("let x = 5\nvar name: String = \"angel\"").unwrap();
        assert_eq!(ast.len(), 2);
        let Node::Decl(decl) = &ast[0] else {
            panic!("expected a declaration");
        };
        assert!(decl.is_constant());
        assert_eq!(decl.name, Name::new("x"));
        assert!(decl.type_.is_none());
        let Node::Decl(decl) = &ast[1] else {
            panic!("expected a declaration");
        };
        assert!(decl.is_variable());
        assert_eq!(decl.type_, Some(Type::name("String")));
    }

    #[test]
    fn test_parse_if_let() {
        let mut parser = Parser::new();
        let ast = parser
            .parse("if let v = opt:\n    print(v)\n")
            .unwrap();
        let Node::If { condition, .. } = &ast[0] else {
            panic!("expected an if statement");
        };
        assert!(matches!(condition, Expression::Decl(_)));
    }

    #[test]
    fn test_parse_struct_with_partitioned_members() {
        let source = "struct Point:\n    x: I32\n    _tag: String = \"p\"\n    fun scaled(k: I32) -> Point:\n        return Point(self.x * k)\n    fun __eq__(other: Point) -> Bool:\n        return self.x == other.x\n";
        let mut parser = Parser::new();
        let ast = parser.parse(source).unwrap();
        let Node::StructDeclaration(declaration) = &ast[0] else {
            panic!("expected a struct declaration");
        };
        assert_eq!(declaration.fields.public.len(), 1);
        assert_eq!(declaration.fields.private.len(), 1);
        assert_eq!(declaration.methods.public.len(), 1);
        assert_eq!(declaration.methods.special.len(), 1);
    }

    #[test]
    fn test_parse_generic_function_with_where_clause() {
        let source = "fun max<T>(a: T, b: T) -> T where T is Subtractable:\n    return a\n";
        let mut parser = Parser::new();
        let ast = parser.parse(source).unwrap();
        let Node::FunctionDeclaration(declaration) = &ast[0] else {
            panic!("expected a function declaration");
        };
        assert_eq!(declaration.parameters, vec![Name::new("T")]);
        assert!(declaration.where_clause.is_some());
    }

    #[test]
    fn test_parse_method_call_and_cast() {
        let mut parser = Parser::new();
        let ast = parser.parse("let s = point.scaled(2) as String").unwrap();
        let Node::Decl(decl) = &ast[0] else {
            panic!("expected a declaration");
        };
        let Some(Expression::Cast(cast)) = &decl.value else {
            panic!("expected a cast");
        };
        assert!(matches!(cast.value, Expression::FunctionCall(_)));
    }

    #[test]
    fn test_parse_optional_some() {
        let mut parser = Parser::new();
        let ast = parser.parse("let opt: I8? = Optional.Some(1)").unwrap();
        let Node::Decl(decl) = &ast[0] else {
            panic!("expected a declaration");
        };
        assert_eq!(
            decl.type_,
            Some(Type::Optional(Box::new(Type::name("I8"))))
        );
    }

    #[test]
    fn test_parser_reports_syntax_errors() {
        let mut parser = Parser::new();
        let error = parser.parse("let = 5").unwrap_err();
        assert!(matches!(error, Error::SyntaxError { .. }));
    }
}
