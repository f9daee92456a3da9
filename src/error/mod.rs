//! Error types for all phases of the qrk toolchain.

use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexerError {
    #[error("no closing string symbol was found")]
    UnterminatedString,

    #[error("could not parse {0:?} as integer")]
    InvalidInteger(String),
}

/// Parser errors. The parser accumulates these instead of stopping at the
/// first one; `ParseErrors` carries the whole batch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParserError {
    #[error("expected next token to be {expected}, got {found} instead")]
    UnexpectedToken { expected: String, found: String },

    #[error("no prefix parse function for {0} found")]
    NoPrefixParseFn(String),

    #[error("{0}")]
    Lexer(#[from] LexerError),
}

impl ParserError {
    pub fn unexpected_token(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// The full batch of errors produced by one parse.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{}", fmt_parse_errors(.0))]
pub struct ParseErrors(pub Vec<ParserError>);

fn fmt_parse_errors(errors: &[ParserError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bytecode compilation errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),

    #[error("unknown prefix operator {0}")]
    UnknownPrefixOperator(String),

    #[error("unknown infix operator {0}")]
    UnknownInfixOperator(String),

    #[error("cannot assign to {0}")]
    CannotAssign(String),
}

/// Errors raised by the virtual machine. Guest-level failures produced by
/// built-ins travel as `Value::Error` instead and never take this path.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("exceeded maximum call frames")]
    FrameOverflow,

    #[error("opcode {0} undefined")]
    UndefinedOpcode(u8),

    #[error("stdlib function {0} undefined")]
    UndefinedStdlibFunction(u8),

    #[error("unsupported type for binary operation: {0} {1}")]
    UnsupportedBinaryTypes(&'static str, &'static str),

    #[error("unknown string operator {0}")]
    UnknownStringOperator(&'static str),

    #[error("unsupported type for minus operator: {0}")]
    UnsupportedNegation(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("unusable as hashmap key: {0}")]
    UnusableHashKey(&'static str),

    #[error("index operator not supported: {0}")]
    IndexNotSupported(&'static str),

    #[error("calling a non-function: {0}")]
    CallingNonFunction(&'static str),

    #[error("wrong number of arguments, expected={expected}, got={got}")]
    WrongNumberOfArguments { expected: usize, got: usize },
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum QrkError {
    #[error("{0}")]
    Lexer(#[from] LexerError),

    #[error("{0}")]
    Parse(#[from] ParseErrors),

    #[error("compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("vm error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("cannot run file '{0}': expected a .qrk file")]
    UnsupportedFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
