//! Tree-walking evaluator: the direct back end over the AST.
//!
//! Failures here are guest values — `Value::Error` short-circuits whatever
//! expression contains it — and `return` unwinds through `ReturnWrapper`.
//! Semantics deliberately track the bytecode VM: same truthiness, same
//! identity-based equality, same built-in registry.

pub mod environment;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{BlockStatement, Expression, Program, Statement};
use crate::interpreter::environment::Environment;
use crate::stdlib;
use crate::value::{FunctionObject, HashPair, Value};

/// The interpreter holds the global environment so bindings persist across
/// successive programs, which is what the REPL needs.
pub struct Interpreter {
    env: Rc<RefCell<Environment>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    /// Evaluate a program and produce its terminal value.
    pub fn eval_program(&mut self, program: &Program) -> Value {
        let mut result = Value::Null;
        let env = self.env.clone();

        for statement in &program.statements {
            result = self.eval_statement(statement, &env);

            match result {
                Value::ReturnWrapper(value) => return *value,
                Value::Error(_) => return result,
                _ => {}
            }
        }

        result
    }

    fn eval_statement(&mut self, statement: &Statement, env: &Rc<RefCell<Environment>>) -> Value {
        match statement {
            Statement::Expression { value } => self.eval_expression(value, env),

            Statement::Let { name, value } => {
                let value = self.eval_expression(value, env);
                if value.is_error() {
                    return value;
                }
                env.borrow_mut().put(name, value);
                Value::Null
            }

            Statement::Assign { name, value } => {
                let value = self.eval_expression(value, env);
                if value.is_error() {
                    return value;
                }
                if !env.borrow_mut().assign(name, value) {
                    return new_error(format!("identifier not found: {}", name));
                }
                Value::Null
            }

            Statement::Return { value } => {
                let value = self.eval_expression(value, env);
                if value.is_error() {
                    return value;
                }
                Value::ReturnWrapper(Box::new(value))
            }
        }
    }

    fn eval_block(&mut self, block: &BlockStatement, env: &Rc<RefCell<Environment>>) -> Value {
        let mut result = Value::Null;

        for statement in &block.statements {
            result = self.eval_statement(statement, env);

            // Return wrappers and errors unwind through enclosing blocks
            // untouched; only the function-call boundary unwraps them.
            if matches!(result, Value::ReturnWrapper(_) | Value::Error(_)) {
                return result;
            }
        }

        result
    }

    fn eval_expression(&mut self, expression: &Expression, env: &Rc<RefCell<Environment>>) -> Value {
        match expression {
            Expression::IntegerLiteral(value) => Value::Integer(*value),
            Expression::StringLiteral(value) => Value::Str(Rc::new(value.clone())),
            Expression::Boolean(value) => Value::Boolean(*value),

            Expression::Identifier(name) => self.eval_identifier(name, env),

            Expression::Prefix { operator, right } => {
                let right = self.eval_expression(right, env);
                if right.is_error() {
                    return right;
                }
                eval_prefix_expression(operator, right)
            }

            Expression::Infix {
                left,
                operator,
                right,
            } => {
                let left = self.eval_expression(left, env);
                if left.is_error() {
                    return left;
                }
                let right = self.eval_expression(right, env);
                if right.is_error() {
                    return right;
                }
                eval_infix_expression(operator, left, right)
            }

            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                let condition = self.eval_expression(condition, env);
                if condition.is_error() {
                    return condition;
                }

                if condition.is_truthy() {
                    self.eval_block(consequence, env)
                } else if let Some(alternative) = alternative {
                    self.eval_block(alternative, env)
                } else {
                    Value::Null
                }
            }

            Expression::FuncLiteral {
                parameters, body, ..
            } => Value::Function(Rc::new(FunctionObject {
                parameters: parameters.clone(),
                body: body.clone(),
                env: env.clone(),
            })),

            Expression::Call {
                function,
                arguments,
            } => {
                let function = self.eval_expression(function, env);
                if function.is_error() {
                    return function;
                }

                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    let arg = self.eval_expression(argument, env);
                    if arg.is_error() {
                        return arg;
                    }
                    args.push(arg);
                }

                self.apply_function(function, args)
            }

            Expression::ArrayLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    let value = self.eval_expression(element, env);
                    if value.is_error() {
                        return value;
                    }
                    values.push(value);
                }
                Value::Array(Rc::new(values))
            }

            Expression::HashMapLiteral(pairs) => {
                let mut map = IndexMap::with_capacity(pairs.len());

                for (key_expr, value_expr) in pairs {
                    let key = self.eval_expression(key_expr, env);
                    if key.is_error() {
                        return key;
                    }
                    let value = self.eval_expression(value_expr, env);
                    if value.is_error() {
                        return value;
                    }

                    let Some(hash_key) = key.hash_key() else {
                        return new_error(format!(
                            "unusable as hashmap key: {}",
                            key.type_name()
                        ));
                    };

                    map.insert(hash_key, HashPair { key, value });
                }

                Value::HashMap(Rc::new(map))
            }

            Expression::Index { left, index } => {
                let left = self.eval_expression(left, env);
                if left.is_error() {
                    return left;
                }
                let index = self.eval_expression(index, env);
                if index.is_error() {
                    return index;
                }
                eval_index_expression(left, index)
            }
        }
    }

    fn eval_identifier(&self, name: &str, env: &Rc<RefCell<Environment>>) -> Value {
        if let Some(value) = env.borrow().get(name) {
            return value;
        }
        if let Some(builtin) = stdlib::BUILTINS_BY_NAME.get(name).copied() {
            return Value::Builtin(builtin);
        }
        new_error(format!("identifier not found: {}", name))
    }

    fn apply_function(&mut self, function: Value, args: Vec<Value>) -> Value {
        match function {
            Value::Function(func) => {
                if func.parameters.len() != args.len() {
                    return new_error(format!(
                        "wrong number of arguments, expected={}, got={}",
                        func.parameters.len(),
                        args.len()
                    ));
                }

                let call_env = Environment::new_enclosed(func.env.clone());
                for (parameter, arg) in func.parameters.iter().zip(args) {
                    call_env.borrow_mut().put(parameter, arg);
                }

                let result = self.eval_block(&func.body, &call_env);
                match result {
                    Value::ReturnWrapper(value) => *value,
                    other => other,
                }
            }

            Value::Builtin(builtin) => {
                let arity_ok = if builtin.variadic {
                    args.len() >= builtin.params_count
                } else {
                    args.len() == builtin.params_count
                };
                if !arity_ok {
                    return new_error(format!(
                        "wrong number of arguments, expected={}, got={}",
                        builtin.params_count,
                        args.len()
                    ));
                }

                (builtin.func)(&args)
            }

            other => new_error(format!("not a function: {}", other.type_name())),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn new_error(message: String) -> Value {
    Value::Error(message)
}

fn eval_prefix_expression(operator: &str, right: Value) -> Value {
    match operator {
        "!" => Value::Boolean(!right.is_truthy()),
        "-" => match right {
            Value::Integer(value) => Value::Integer(value.wrapping_neg()),
            other => new_error(format!("unknown operator: -{}", other.type_name())),
        },
        _ => new_error(format!("unknown operator: {}{}", operator, right.type_name())),
    }
}

fn eval_infix_expression(operator: &str, left: Value, right: Value) -> Value {
    if left.type_name() != right.type_name() {
        return new_error(format!(
            "type mismatch: {} {} {}",
            left.type_name(),
            operator,
            right.type_name()
        ));
    }

    if let (Value::Integer(left), Value::Integer(right)) = (&left, &right) {
        return eval_integer_infix_expression(operator, *left, *right);
    }

    if let (Value::Str(left_str), Value::Str(right_str)) = (&left, &right) {
        if operator == "+" {
            let mut result = String::with_capacity(left_str.len() + right_str.len());
            result.push_str(left_str);
            result.push_str(right_str);
            return Value::Str(Rc::new(result));
        }
    }

    if let (Value::Boolean(left), Value::Boolean(right)) = (&left, &right) {
        match operator {
            "&&" => return Value::Boolean(*left && *right),
            "||" => return Value::Boolean(*left || *right),
            _ => {}
        }
    }

    match operator {
        "==" => Value::Boolean(left.same_object(&right)),
        "!=" => Value::Boolean(!left.same_object(&right)),
        _ => new_error(format!(
            "unknown operator: {} {} {}",
            left.type_name(),
            operator,
            right.type_name()
        )),
    }
}

fn eval_integer_infix_expression(operator: &str, left: i64, right: i64) -> Value {
    match operator {
        "+" => Value::Integer(left.wrapping_add(right)),
        "-" => Value::Integer(left.wrapping_sub(right)),
        "*" => Value::Integer(left.wrapping_mul(right)),
        "/" => {
            if right == 0 {
                new_error("division by zero".to_string())
            } else {
                Value::Integer(left.wrapping_div(right))
            }
        }
        "<" => Value::Boolean(left < right),
        ">" => Value::Boolean(left > right),
        "==" => Value::Boolean(left == right),
        "!=" => Value::Boolean(left != right),
        _ => new_error(format!("unknown operator: INTEGER {} INTEGER", operator)),
    }
}

fn eval_index_expression(left: Value, index: Value) -> Value {
    match (&left, &index) {
        (Value::Array(elements), Value::Integer(position)) => {
            if *position < 0 || *position as usize >= elements.len() {
                Value::Null
            } else {
                elements[*position as usize].clone()
            }
        }
        (Value::HashMap(pairs), key) => {
            let Some(hash_key) = key.hash_key() else {
                return new_error(format!("unusable as hashmap key: {}", key.type_name()));
            };
            match pairs.get(&hash_key) {
                Some(pair) => pair.value.clone(),
                None => Value::Null,
            }
        }
        _ => new_error(format!(
            "index operator not supported: {}",
            left.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;
    use crate::parser::Parser;

    fn eval_source(source: &str) -> Value {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let program = Parser::new(tokens)
            .parse()
            .unwrap_or_else(|e| panic!("parser errors:\n{}", e));
        Interpreter::new().eval_program(&program)
    }

    fn expect_int(source: &str, want: i64) {
        assert_eq!(eval_source(source), Value::Integer(want), "source: {}", source);
    }

    fn expect_bool(source: &str, want: bool) {
        assert_eq!(eval_source(source), Value::Boolean(want), "source: {}", source);
    }

    fn expect_error(source: &str, want: &str) {
        assert_eq!(
            eval_source(source),
            Value::Error(want.to_string()),
            "source: {}",
            source
        );
    }

    #[test]
    fn test_eval_integer_expressions() {
        expect_int("5", 5);
        expect_int("10", 10);
        expect_int("-5", -5);
        expect_int("-10", -10);
        expect_int("5 + 5 + 5 + 5 - 10", 10);
        expect_int("2 * 2 * 2 * 2 * 2", 32);
        expect_int("-50 + 100 + -50", 0);
        expect_int("50 / 2 * 2 + 10 - 5", 55);
        expect_int("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50);
    }

    #[test]
    fn test_eval_boolean_expressions() {
        expect_bool("true", true);
        expect_bool("false", false);
        expect_bool("1 < 2", true);
        expect_bool("1 > 2", false);
        expect_bool("1 == 1", true);
        expect_bool("1 != 2", true);
        expect_bool("true == true", true);
        expect_bool("false != true", true);
        expect_bool("(1 < 2) == true", true);
        expect_bool("true && false", false);
        expect_bool("true || false", true);
    }

    #[test]
    fn test_bang_operator() {
        expect_bool("!true", false);
        expect_bool("!false", true);
        expect_bool("!5", false);
        expect_bool("!!true", true);
        expect_bool("!(if (false) { 5 })", true);
    }

    #[test]
    fn test_if_else_expressions() {
        expect_int("if (true) { 10 }", 10);
        expect_int("if (1) { 10 }", 10);
        expect_int("if (1 < 2) { 10 }", 10);
        expect_int("if (1 > 2) { 10 } else { 20 }", 20);
        expect_int("if (1 < 2) { 10 } else { 20 }", 10);
        assert_eq!(eval_source("if (false) { 10 }"), Value::Null);
        assert_eq!(eval_source("if (1 > 2) { 10 }"), Value::Null);
    }

    #[test]
    fn test_return_statements() {
        expect_int("return 10;", 10);
        expect_int("return 10; 9;", 10);
        expect_int("return 2 * 5; 9;", 10);
        expect_int("9; return 2 * 5; 9;", 10);
        expect_int(
            "if (10 > 1) { if (10 > 1) { return 10; } return 1; }",
            10,
        );
    }

    #[test]
    fn test_error_handling() {
        expect_error("5 + true;", "type mismatch: INTEGER + BOOLEAN");
        expect_error("5 + true; 5;", "type mismatch: INTEGER + BOOLEAN");
        expect_error("-true", "unknown operator: -BOOLEAN");
        expect_error("true + false;", "unknown operator: BOOLEAN + BOOLEAN");
        expect_error("5; true + false; 5", "unknown operator: BOOLEAN + BOOLEAN");
        expect_error(
            "if (10 > 1) { true + false; }",
            "unknown operator: BOOLEAN + BOOLEAN",
        );
        expect_error("foobar", "identifier not found: foobar");
        expect_error("\"Hello\" - \"World\"", "unknown operator: STRING - STRING");
        expect_error("5 / 0", "division by zero");
        expect_error("5(1)", "not a function: INTEGER");
        expect_error("{[]: 1}", "unusable as hashmap key: ARRAY");
        expect_error("true[0]", "index operator not supported: BOOLEAN");
    }

    #[test]
    fn test_let_statements() {
        expect_int("let a = 5; a;", 5);
        expect_int("let a = 5 * 5; a;", 25);
        expect_int("let a = 5; let b = a; b;", 5);
        expect_int("let a = 5; let b = a; let c = a + b + 5; c;", 15);
    }

    #[test]
    fn test_assign_statements() {
        expect_int("let a = 5; a = 6; a;", 6);
        expect_error("b = 1;", "identifier not found: b");
    }

    #[test]
    fn test_function_application() {
        expect_int("let identity = fn(x) { x; }; identity(5);", 5);
        expect_int("let identity = fn(x) { return x; }; identity(5);", 5);
        expect_int("let double = fn(x) { x * 2; }; double(5);", 10);
        expect_int("let add = fn(x, y) { x + y; }; add(5, 5);", 10);
        expect_int("let add = fn(x, y) { x + y; }; add(5 + 5, add(5, 5));", 20);
        expect_int("fn(x) { x; }(5)", 5);
    }

    #[test]
    fn test_function_arity_is_checked() {
        expect_error(
            "let add = fn(x, y) { x + y; }; add(1);",
            "wrong number of arguments, expected=2, got=1",
        );
    }

    #[test]
    fn test_closures() {
        expect_int(
            "let newAdder = fn(x) { fn(y) { x + y }; };
             let addTwo = newAdder(2);
             addTwo(2);",
            4,
        );
    }

    #[test]
    fn test_recursion() {
        expect_int(
            "let fib = fn(n) { if (n < 2) { n } else { fib(n - 1) + fib(n - 2) } };
             fib(10);",
            55,
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            eval_source("\"Hello\" + \" \" + \"World!\""),
            Value::Str(Rc::new("Hello World!".to_string()))
        );
    }

    #[test]
    fn test_string_equality_is_identity() {
        expect_bool("\"foo\" == \"foo\"", false);
        expect_bool("let s = \"foo\"; s == s", true);
    }

    #[test]
    fn test_builtin_functions() {
        expect_int("len(\"\")", 0);
        expect_int("len(\"four\")", 4);
        expect_int("len(\"hello world\")", 11);
        expect_int("len([1, 2, 3])", 3);
        expect_error(
            "len(1)",
            "argument to `len` is not supported, got INTEGER",
        );
        expect_error(
            "len(\"one\", \"two\")",
            "wrong number of arguments, expected=1, got=2",
        );
    }

    #[test]
    fn test_array_literals_and_indexing() {
        expect_int("[1, 2 * 2, 3 + 3][1]", 4);
        expect_int("let i = 0; [1][i];", 1);
        expect_int("let myArray = [1, 2, 3]; myArray[2];", 3);
        expect_int(
            "let myArray = [1, 2, 3]; myArray[0] + myArray[1] + myArray[2];",
            6,
        );
        assert_eq!(eval_source("[1, 2, 3][3]"), Value::Null);
        assert_eq!(eval_source("[1, 2, 3][-1]"), Value::Null);
    }

    #[test]
    fn test_hashmap_literals_and_indexing() {
        expect_int("{\"one\": 1, \"two\": 2}[\"two\"]", 2);
        expect_int("{1: 1, 2: 2}[1]", 1);
        expect_int("{true: 5}[true]", 5);
        expect_int("let key = \"foo\"; {\"foo\": 5}[key]", 5);
        assert_eq!(eval_source("{1: 1}[2]"), Value::Null);
        assert_eq!(eval_source("{}[\"anything\"]"), Value::Null);
    }

    #[test]
    fn test_interpreter_state_persists() {
        let mut interpreter = Interpreter::new();

        let tokens = Scanner::new("let x = 41;").scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        interpreter.eval_program(&program);

        let tokens = Scanner::new("x + 1").scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        assert_eq!(interpreter.eval_program(&program), Value::Integer(42));
    }
}
