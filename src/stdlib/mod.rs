//! Host functions callable from qrk code.
//!
//! `BUILTINS` is ordered: the compiler registers each entry's position as its
//! stdlib index at startup, and `OpGetStdlib` operands point into this slice.
//! New built-ins are appended, never reordered.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::value::{BuiltinFunction, Value};

pub static BUILTINS: &[BuiltinFunction] = &[
    BuiltinFunction {
        name: "len",
        params_count: 1,
        variadic: false,
        func: len_builtin,
    },
    BuiltinFunction {
        name: "print",
        params_count: 1,
        variadic: true,
        func: print_builtin,
    },
];

lazy_static! {
    /// Name lookup for the tree-walking interpreter, which resolves built-ins
    /// by identifier instead of by index.
    pub static ref BUILTINS_BY_NAME: HashMap<&'static str, &'static BuiltinFunction> =
        BUILTINS.iter().map(|builtin| (builtin.name, builtin)).collect();
}

fn new_error(message: String) -> Value {
    Value::Error(message)
}

fn len_builtin(args: &[Value]) -> Value {
    if args.len() != 1 {
        return new_error(format!(
            "wrong number of arguments passed to len func, got={}, supported=1",
            args.len()
        ));
    }

    match &args[0] {
        Value::Str(value) => Value::Integer(value.len() as i64),
        Value::Array(elements) => Value::Integer(elements.len() as i64),
        other => new_error(format!(
            "argument to `len` is not supported, got {}",
            other.type_name()
        )),
    }
}

fn print_builtin(args: &[Value]) -> Value {
    for arg in args {
        println!("{}", arg);
    }
    Value::Null
}
