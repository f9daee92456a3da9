//! Pratt parser for qrk.

use crate::ast::{BlockStatement, Expression, Program, Statement};
use crate::error::{ParseErrors, ParserError};
use crate::lexer::Token;

/// Operator binding strength, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

fn token_precedence(token: &Token) -> Precedence {
    match token {
        Token::Eq | Token::NotEq | Token::And | Token::Or => Precedence::Equals,
        Token::Less | Token::Greater => Precedence::LessGreater,
        Token::Plus | Token::Minus => Precedence::Sum,
        Token::Slash | Token::Star => Precedence::Product,
        Token::LParen => Precedence::Call,
        Token::LBracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

/// Source string of an infix operator token, if the token is one.
fn infix_operator(token: &Token) -> Option<&'static str> {
    match token {
        Token::Plus => Some("+"),
        Token::Minus => Some("-"),
        Token::Star => Some("*"),
        Token::Slash => Some("/"),
        Token::Less => Some("<"),
        Token::Greater => Some(">"),
        Token::Eq => Some("=="),
        Token::NotEq => Some("!="),
        Token::And => Some("&&"),
        Token::Or => Some("||"),
        _ => None,
    }
}

/// The parser consumes a token stream and produces a `Program`.
///
/// Errors do not abort the parse; they accumulate and are returned together
/// so a REPL user sees every problem in a line at once.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    errors: Vec<ParserError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Result<Program, ParseErrors> {
        let mut program = Program::default();

        while !self.curr_token_is(&Token::Eof) {
            if let Some(statement) = self.parse_statement() {
                program.statements.push(statement);
            }
            self.next_token();
        }

        if self.errors.is_empty() {
            Ok(program)
        } else {
            Err(ParseErrors(self.errors))
        }
    }

    fn curr_token(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn peek_token(&self) -> &Token {
        self.tokens.get(self.position + 1).unwrap_or(&Token::Eof)
    }

    fn next_token(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn curr_token_is(&self, token: &Token) -> bool {
        self.curr_token() == token
    }

    fn peek_token_is(&self, token: &Token) -> bool {
        self.peek_token() == token
    }

    fn expect_peek(&mut self, expected: Token) -> bool {
        if self.peek_token_is(&expected) {
            self.next_token();
            true
        } else {
            self.errors.push(ParserError::unexpected_token(
                expected.to_string(),
                self.peek_token().to_string(),
            ));
            false
        }
    }

    fn peek_precedence(&self) -> Precedence {
        token_precedence(self.peek_token())
    }

    fn curr_precedence(&self) -> Precedence {
        token_precedence(self.curr_token())
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.curr_token() {
            Token::Let => self.parse_let_statement(),
            Token::Return => self.parse_return_statement(),
            Token::Ident(_) if self.peek_token_is(&Token::Assign) => self.parse_assign_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Option<Statement> {
        let name = match self.peek_token() {
            Token::Ident(name) => name.clone(),
            other => {
                self.errors.push(ParserError::unexpected_token(
                    "identifier",
                    other.to_string(),
                ));
                return None;
            }
        };
        self.next_token();

        if !self.expect_peek(Token::Assign) {
            return None;
        }

        self.next_token();
        let mut value = self.parse_expression(Precedence::Lowest)?;

        // Propagate the binding name into a bare function literal so the
        // compiler can resolve recursive calls to it.
        if let Expression::FuncLiteral {
            name: literal_name, ..
        } = &mut value
        {
            if literal_name.is_none() {
                *literal_name = Some(name.clone());
            }
        }

        while self.peek_token_is(&Token::Semicolon) {
            self.next_token();
        }

        Some(Statement::Let { name, value })
    }

    fn parse_assign_statement(&mut self) -> Option<Statement> {
        let name = match self.curr_token() {
            Token::Ident(name) => name.clone(),
            _ => return None,
        };

        // consume the identifier and the `=`
        self.next_token();
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;

        while self.peek_token_is(&Token::Semicolon) {
            self.next_token();
        }

        Some(Statement::Assign { name, value })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;

        while self.peek_token_is(&Token::Semicolon) {
            self.next_token();
        }

        Some(Statement::Return { value })
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let value = self.parse_expression(Precedence::Lowest)?;

        if self.peek_token_is(&Token::Semicolon) {
            self.next_token();
        }

        Some(Statement::Expression { value })
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while !self.peek_token_is(&Token::Semicolon) && precedence < self.peek_precedence() {
            left = if infix_operator(self.peek_token()).is_some() {
                self.next_token();
                self.parse_infix_expression(left)?
            } else if self.peek_token_is(&Token::LParen) {
                self.next_token();
                self.parse_call_expression(left)?
            } else if self.peek_token_is(&Token::LBracket) {
                self.next_token();
                self.parse_index_expression(left)?
            } else {
                return Some(left);
            };
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.curr_token().clone() {
            Token::Ident(name) => Some(Expression::Identifier(name)),
            Token::Int(value) => Some(Expression::IntegerLiteral(value)),
            Token::Str(value) => Some(Expression::StringLiteral(value)),
            Token::True => Some(Expression::Boolean(true)),
            Token::False => Some(Expression::Boolean(false)),
            Token::Bang => self.parse_prefix_expression("!"),
            Token::Minus => self.parse_prefix_expression("-"),
            Token::LParen => self.parse_grouped_expression(),
            Token::If => self.parse_if_expression(),
            Token::Function => self.parse_function_literal(),
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_hashmap_literal(),
            other => {
                self.errors
                    .push(ParserError::NoPrefixParseFn(other.to_string()));
                None
            }
        }
    }

    fn parse_prefix_expression(&mut self, operator: &str) -> Option<Expression> {
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;

        Some(Expression::Prefix {
            operator: operator.to_string(),
            right: Box::new(right),
        })
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let operator = match infix_operator(self.curr_token()) {
            Some(op) => op.to_string(),
            None => return None,
        };

        let precedence = self.curr_precedence();
        self.next_token();
        let right = self.parse_expression(precedence)?;

        Some(Expression::Infix {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();

        let expression = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(Token::RParen) {
            return None;
        }

        Some(expression)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        self.next_token();

        let condition = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(Token::LBrace) {
            return None;
        }

        let consequence = self.parse_block_statement();

        let alternative = if self.peek_token_is(&Token::Else) {
            self.next_token();

            if !self.expect_peek(Token::LBrace) {
                return None;
            }

            Some(self.parse_block_statement())
        } else {
            None
        };

        Some(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_block_statement(&mut self) -> BlockStatement {
        let mut block = BlockStatement::default();

        self.next_token();

        while !self.curr_token_is(&Token::RBrace) && !self.curr_token_is(&Token::Eof) {
            if let Some(statement) = self.parse_statement() {
                block.statements.push(statement);
            }
            self.next_token();
        }

        block
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        if !self.expect_peek(Token::LParen) {
            return None;
        }

        let parameters = self.parse_function_parameters()?;

        if !self.expect_peek(Token::LBrace) {
            return None;
        }

        let body = self.parse_block_statement();

        Some(Expression::FuncLiteral {
            name: None,
            parameters,
            body,
        })
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<String>> {
        let mut parameters = Vec::new();

        if self.peek_token_is(&Token::RParen) {
            self.next_token();
            return Some(parameters);
        }

        self.next_token();
        parameters.push(self.parse_parameter_name()?);

        while self.peek_token_is(&Token::Comma) {
            self.next_token();
            self.next_token();
            parameters.push(self.parse_parameter_name()?);
        }

        if !self.expect_peek(Token::RParen) {
            return None;
        }

        Some(parameters)
    }

    fn parse_parameter_name(&mut self) -> Option<String> {
        match self.curr_token() {
            Token::Ident(name) => Some(name.clone()),
            other => {
                self.errors.push(ParserError::unexpected_token(
                    "identifier",
                    other.to_string(),
                ));
                None
            }
        }
    }

    fn parse_call_expression(&mut self, function: Expression) -> Option<Expression> {
        let arguments = self.parse_expression_list(Token::RParen)?;

        Some(Expression::Call {
            function: Box::new(function),
            arguments,
        })
    }

    fn parse_expression_list(&mut self, end: Token) -> Option<Vec<Expression>> {
        let mut expressions = Vec::new();

        if self.peek_token_is(&end) {
            self.next_token();
            return Some(expressions);
        }

        self.next_token();
        expressions.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_token_is(&Token::Comma) {
            self.next_token();
            self.next_token();
            expressions.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }

        Some(expressions)
    }

    fn parse_array_literal(&mut self) -> Option<Expression> {
        let elements = self.parse_expression_list(Token::RBracket)?;

        Some(Expression::ArrayLiteral(elements))
    }

    fn parse_hashmap_literal(&mut self) -> Option<Expression> {
        let mut pairs = Vec::new();

        while !self.peek_token_is(&Token::RBrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;

            if !self.expect_peek(Token::Colon) {
                return None;
            }

            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;

            pairs.push((key, value));

            if !self.peek_token_is(&Token::RBrace) && !self.expect_peek(Token::Comma) {
                return None;
            }
        }

        if !self.expect_peek(Token::RBrace) {
            return None;
        }

        Some(Expression::HashMapLiteral(pairs))
    }

    fn parse_index_expression(&mut self, left: Expression) -> Option<Expression> {
        self.next_token();

        let index = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(Token::RBracket) {
            return None;
        }

        Some(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;

    fn parse_source(source: &str) -> Program {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        Parser::new(tokens)
            .parse()
            .unwrap_or_else(|errors| panic!("parser errors:\n{}", errors))
    }

    fn parse_single_expression(source: &str) -> Expression {
        let program = parse_source(source);
        assert_eq!(program.statements.len(), 1, "program: {}", program);
        match &program.statements[0] {
            Statement::Expression { value } => value.clone(),
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_let_statements() {
        let tests = [
            ("let x = 5;", "x", "5"),
            ("let y = true;", "y", "true"),
            ("let foobar = y;", "foobar", "y"),
        ];

        for (source, want_name, want_value) in tests {
            let program = parse_source(source);
            assert_eq!(program.statements.len(), 1);
            match &program.statements[0] {
                Statement::Let { name, value } => {
                    assert_eq!(name, want_name);
                    assert_eq!(value.to_string(), want_value);
                }
                other => panic!("expected let statement, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_assign_statement() {
        let program = parse_source("counter = counter + 1;");
        match &program.statements[0] {
            Statement::Assign { name, value } => {
                assert_eq!(name, "counter");
                assert_eq!(value.to_string(), "(counter + 1)");
            }
            other => panic!("expected assign statement, got {:?}", other),
        }
    }

    #[test]
    fn test_return_statements() {
        let program = parse_source("return 5; return x;");
        assert_eq!(program.statements.len(), 2);
        for statement in &program.statements {
            assert!(matches!(statement, Statement::Return { .. }));
        }
    }

    #[test]
    fn test_prefix_expressions() {
        let tests = [("!5;", "(!5)"), ("-15;", "(-15)"), ("!true;", "(!true)")];

        for (source, want) in tests {
            assert_eq!(parse_single_expression(source).to_string(), want);
        }
    }

    #[test]
    fn test_operator_precedence() {
        let tests = [
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b - c", "((a + b) - c)"),
            ("a * b * c", "((a * b) * c)"),
            ("a + b / c", "(a + (b / c))"),
            ("3 + 4; -5 * 5", "(3 + 4)((-5) * 5)"),
            ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
            ("3 + 4 * 5 == 3 * 1 + 4 * 5", "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))"),
            ("true", "true"),
            ("3 > 5 == false", "((3 > 5) == false)"),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("-(5 + 5)", "(-(5 + 5))"),
            ("!(true == true)", "(!(true == true))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            ("a && b || c", "((a && b) || c)"),
            ("a > b && c > d", "((a > b) && (c > d))"),
            (
                "add(a * b[2], b[1], 2 * [1, 2][1])",
                "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))",
            ),
        ];

        for (source, want) in tests {
            let program = parse_source(source);
            assert_eq!(program.to_string(), want.to_string(), "source: {}", source);
        }
    }

    #[test]
    fn test_if_expression() {
        let expression = parse_single_expression("if x < y { x }");
        match expression {
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                assert_eq!(condition.to_string(), "(x < y)");
                assert_eq!(consequence.to_string(), "x");
                assert!(alternative.is_none());
            }
            other => panic!("expected if expression, got {:?}", other),
        }
    }

    #[test]
    fn test_if_else_expression() {
        let expression = parse_single_expression("if (x < y) { x } else { y }");
        match expression {
            Expression::If { alternative, .. } => {
                assert_eq!(alternative.unwrap().to_string(), "y");
            }
            other => panic!("expected if expression, got {:?}", other),
        }
    }

    #[test]
    fn test_function_literal() {
        let expression = parse_single_expression("fn(x, y) { x + y; }");
        match expression {
            Expression::FuncLiteral {
                name,
                parameters,
                body,
            } => {
                assert_eq!(name, None);
                assert_eq!(parameters, vec!["x".to_string(), "y".to_string()]);
                assert_eq!(body.to_string(), "(x + y)");
            }
            other => panic!("expected function literal, got {:?}", other),
        }
    }

    #[test]
    fn test_function_parameter_lists() {
        let tests: [(&str, &[&str]); 3] = [
            ("fn() {};", &[]),
            ("fn(x) {};", &["x"]),
            ("fn(x, y, z) {};", &["x", "y", "z"]),
        ];

        for (source, want) in tests {
            match parse_single_expression(source) {
                Expression::FuncLiteral { parameters, .. } => {
                    assert_eq!(parameters, want);
                }
                other => panic!("expected function literal, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_let_names_function_literal() {
        let program = parse_source("let double = fn(x) { x * 2 };");
        match &program.statements[0] {
            Statement::Let { value, .. } => match value {
                Expression::FuncLiteral { name, .. } => {
                    assert_eq!(name.as_deref(), Some("double"));
                }
                other => panic!("expected function literal, got {:?}", other),
            },
            other => panic!("expected let statement, got {:?}", other),
        }
    }

    #[test]
    fn test_call_expression() {
        let expression = parse_single_expression("add(1, 2 * 3, 4 + 5);");
        match expression {
            Expression::Call {
                function,
                arguments,
            } => {
                assert_eq!(function.to_string(), "add");
                assert_eq!(arguments.len(), 3);
                assert_eq!(arguments[1].to_string(), "(2 * 3)");
            }
            other => panic!("expected call expression, got {:?}", other),
        }
    }

    #[test]
    fn test_string_literal() {
        let expression = parse_single_expression("\"hello world\";");
        assert_eq!(expression, Expression::StringLiteral("hello world".to_string()));
    }

    #[test]
    fn test_array_literal() {
        let expression = parse_single_expression("[1, 2 * 2, 3 + 3]");
        match expression {
            Expression::ArrayLiteral(elements) => {
                assert_eq!(elements.len(), 3);
                assert_eq!(elements[1].to_string(), "(2 * 2)");
            }
            other => panic!("expected array literal, got {:?}", other),
        }
    }

    #[test]
    fn test_index_expression() {
        let expression = parse_single_expression("myArray[1 + 1]");
        match expression {
            Expression::Index { left, index } => {
                assert_eq!(left.to_string(), "myArray");
                assert_eq!(index.to_string(), "(1 + 1)");
            }
            other => panic!("expected index expression, got {:?}", other),
        }
    }

    #[test]
    fn test_hashmap_literal() {
        let expression = parse_single_expression("{\"one\": 1, \"two\": 2, \"three\": 3}");
        match expression {
            Expression::HashMapLiteral(pairs) => {
                assert_eq!(pairs.len(), 3);
                assert_eq!(pairs[0].0.to_string(), "one");
                assert_eq!(pairs[2].1.to_string(), "3");
            }
            other => panic!("expected hashmap literal, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_hashmap_literal() {
        let expression = parse_single_expression("{}");
        assert_eq!(expression, Expression::HashMapLiteral(Vec::new()));
    }

    #[test]
    fn test_hashmap_with_expression_values() {
        let expression = parse_single_expression("{1: 0 + 1, 2: 10 - 8}");
        match expression {
            Expression::HashMapLiteral(pairs) => {
                assert_eq!(pairs[0].1.to_string(), "(0 + 1)");
                assert_eq!(pairs[1].1.to_string(), "(10 - 8)");
            }
            other => panic!("expected hashmap literal, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors_accumulate() {
        let tokens = Scanner::new("let = 5; let y 10;").scan_tokens().unwrap();
        let errors = Parser::new(tokens).parse().unwrap_err();
        assert!(!errors.0.is_empty());
    }

    #[test]
    fn test_no_prefix_parse_error() {
        let tokens = Scanner::new("+ 5;").scan_tokens().unwrap();
        let errors = Parser::new(tokens).parse().unwrap_err();
        assert!(errors
            .0
            .iter()
            .any(|e| matches!(e, ParserError::NoPrefixParseFn(_))));
    }
}
