//! Expression nodes.

use std::fmt;

use crate::ast::stmt::BlockStatement;

/// Expression variants.
///
/// Operators are carried as their source strings; mapping them to opcodes is
/// the compiler's job and an unknown operator is a compile error there.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(String),
    IntegerLiteral(i64),
    StringLiteral(String),
    Boolean(bool),
    /// `(<op><right>)`
    Prefix {
        operator: String,
        right: Box<Expression>,
    },
    /// `(<left> <op> <right>)`
    Infix {
        left: Box<Expression>,
        operator: String,
        right: Box<Expression>,
    },
    /// `if <cond> <cons> [else <alt>]` — an expression, not a statement.
    If {
        condition: Box<Expression>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    },
    /// A function literal. `name` is filled in when the literal is the value
    /// of a `let` binding, which lets the compiler resolve recursive calls.
    FuncLiteral {
        name: Option<String>,
        parameters: Vec<String>,
        body: BlockStatement,
    },
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },
    ArrayLiteral(Vec<Expression>),
    /// Pairs in source order; the compiler sorts keys before emission.
    HashMapLiteral(Vec<(Expression, Expression)>),
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
}

impl Expression {
    pub fn token_literal(&self) -> String {
        match self {
            Expression::Identifier(name) => name.clone(),
            Expression::IntegerLiteral(value) => value.to_string(),
            Expression::StringLiteral(value) => value.clone(),
            Expression::Boolean(value) => value.to_string(),
            Expression::Prefix { operator, .. } => operator.clone(),
            Expression::Infix { operator, .. } => operator.clone(),
            Expression::If { .. } => "if".to_string(),
            Expression::FuncLiteral { .. } => "fn".to_string(),
            Expression::Call { .. } => "(".to_string(),
            Expression::ArrayLiteral(_) => "[".to_string(),
            Expression::HashMapLiteral(_) => "{".to_string(),
            Expression::Index { .. } => "[".to_string(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::IntegerLiteral(value) => write!(f, "{}", value),
            Expression::StringLiteral(value) => write!(f, "{}", value),
            Expression::Boolean(value) => write!(f, "{}", value),
            Expression::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            Expression::Infix {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {} {}", condition, consequence)?;
                if let Some(alternative) = alternative {
                    write!(f, "else {}", alternative)?;
                }
                Ok(())
            }
            Expression::FuncLiteral {
                name,
                parameters,
                body,
            } => {
                write!(f, "fn")?;
                if let Some(name) = name {
                    write!(f, " {}", name)?;
                }
                write!(f, "({}) {}", parameters.join(", "), body)
            }
            Expression::Call {
                function,
                arguments,
            } => {
                let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", function, args.join(", "))
            }
            Expression::ArrayLiteral(elements) => {
                let elements: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", elements.join(", "))
            }
            Expression::HashMapLiteral(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|(key, value)| format!("{}:{}", key, value))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Expression::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}
