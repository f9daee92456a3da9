//! Runtime values shared by the compiler constant pool, the virtual machine
//! and the tree-walking interpreter.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::BlockStatement;
use crate::interpreter::environment::Environment;

pub const INTEGER_OBJ: &str = "INTEGER";
pub const BOOLEAN_OBJ: &str = "BOOLEAN";
pub const STRING_OBJ: &str = "STRING";
pub const NULL_OBJ: &str = "NULL";
pub const ARRAY_OBJ: &str = "ARRAY";
pub const HASH_MAP_OBJ: &str = "HASH_MAP";
pub const FUNC_OBJ: &str = "FUNCTION";
pub const COMPILED_FUNC_OBJ: &str = "COMPILED_FUNCTION";
pub const BUILT_IN_OBJ: &str = "BUILT_IN";
pub const RETURN_OBJ: &str = "RETURN";
pub const ERROR_OBJ: &str = "ERROR";

/// A guest value.
///
/// Heap-backed variants share their payload through `Rc`, so cloning a value
/// is cheap and two clones of the same allocation remain identical objects —
/// which is what the equality opcodes compare for everything but integers.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Str(Rc<String>),
    Null,
    Array(Rc<Vec<Value>>),
    HashMap(Rc<IndexMap<HashKey, HashPair>>),
    CompiledFunction(Rc<CompiledFunction>),
    Function(Rc<FunctionObject>),
    Builtin(&'static BuiltinFunction),
    /// Wraps the value of a `return` while it unwinds the tree-walker.
    ReturnWrapper(Box<Value>),
    /// A guest-level error; evaluation short-circuits when one appears.
    Error(String),
}

/// Hash key for guest hash maps: a type tag plus a 64-bit payload.
///
/// Strings hash with FNV-1a 64; the exact constants are part of the key
/// contract, so equal contents always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub kind: &'static str,
    pub value: i64,
}

/// A key/value entry. The original key object is kept alongside the value so
/// hash maps can reproduce their keys when inspected.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

/// A function compiled to bytecode. Immutable once emitted.
#[derive(Debug, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub params_count: usize,
    pub locals_count: usize,
}

/// A function value as the tree-walking interpreter sees it: the literal's
/// parameters and body plus the environment it closed over.
#[derive(Debug)]
pub struct FunctionObject {
    pub parameters: Vec<String>,
    pub body: BlockStatement,
    pub env: Rc<RefCell<Environment>>,
}

/// A host function callable from guest code.
pub struct BuiltinFunction {
    pub name: &'static str,
    pub params_count: usize,
    /// Variadic builtins accept `params_count` arguments or more.
    pub variadic: bool,
    pub func: fn(&[Value]) -> Value,
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("params_count", &self.params_count)
            .field("variadic", &self.variadic)
            .finish()
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => INTEGER_OBJ,
            Value::Boolean(_) => BOOLEAN_OBJ,
            Value::Str(_) => STRING_OBJ,
            Value::Null => NULL_OBJ,
            Value::Array(_) => ARRAY_OBJ,
            Value::HashMap(_) => HASH_MAP_OBJ,
            Value::CompiledFunction(_) => COMPILED_FUNC_OBJ,
            Value::Function(_) => FUNC_OBJ,
            Value::Builtin(_) => BUILT_IN_OBJ,
            Value::ReturnWrapper(_) => RETURN_OBJ,
            Value::Error(_) => ERROR_OBJ,
        }
    }

    /// Everything is truthy except `false` and `null`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(value) => *value,
            Value::Null => false,
            _ => true,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// The hash key of a hashable value, or `None` for unhashable types.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(value) => Some(HashKey {
                kind: INTEGER_OBJ,
                value: *value,
            }),
            Value::Boolean(value) => Some(HashKey {
                kind: BOOLEAN_OBJ,
                value: i64::from(*value),
            }),
            Value::Str(value) => Some(HashKey {
                kind: STRING_OBJ,
                value: fnv1a_64(value.as_bytes()) as i64,
            }),
            _ => None,
        }
    }

    /// Object identity. Integers are excluded on purpose: the equality
    /// opcodes compare them by value and everything else by identity, and
    /// the singleton variants (booleans, null) are identical whenever their
    /// payloads are.
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::HashMap(a), Value::HashMap(b)) => Rc::ptr_eq(a, b),
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

/// Content equality, used by tests and by constant-pool comparisons.
/// Function values compare by identity; there is no structural equality for
/// code objects beyond their instruction bytes.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::HashMap(a), Value::HashMap(b)) => {
                a.len() == b.len() && a.iter().all(|(k, p)| b.get(k) == Some(p))
            }
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            (Value::ReturnWrapper(a), Value::ReturnWrapper(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{}", value),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{}", value),
            Value::Null => write!(f, "null"),
            Value::Array(elements) => {
                let elements: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", elements.join(", "))
            }
            Value::HashMap(pairs) => {
                let pairs: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Value::CompiledFunction(func) => {
                write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func))
            }
            Value::Function(func) => {
                write!(f, "fn({}) {{\n{}\n}}", func.parameters.join(", "), func.body)
            }
            Value::Builtin(builtin) => write!(f, "builtin function {}", builtin.name),
            Value::ReturnWrapper(value) => write!(f, "{}", value),
            Value::Error(message) => write!(f, "ERROR:{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_hash_keys() {
        let hello1 = Value::Str(Rc::new("Hello World".to_string()));
        let hello2 = Value::Str(Rc::new("Hello World".to_string()));
        let diff1 = Value::Str(Rc::new("My name is johnny".to_string()));
        let diff2 = Value::Str(Rc::new("My name is johnny".to_string()));

        assert_eq!(hello1.hash_key(), hello2.hash_key());
        assert_eq!(diff1.hash_key(), diff2.hash_key());
        assert_ne!(hello1.hash_key(), diff1.hash_key());
    }

    #[test]
    fn test_boolean_and_integer_hash_keys() {
        assert_eq!(
            Value::Boolean(true).hash_key(),
            Some(HashKey {
                kind: BOOLEAN_OBJ,
                value: 1
            })
        );
        assert_eq!(
            Value::Integer(42).hash_key(),
            Some(HashKey {
                kind: INTEGER_OBJ,
                value: 42
            })
        );
    }

    #[test]
    fn test_unhashable_values() {
        assert_eq!(Value::Null.hash_key(), None);
        assert_eq!(Value::Array(Rc::new(Vec::new())).hash_key(), None);
    }

    #[test]
    fn test_fnv1a_matches_reference_vectors() {
        // Standard FNV-1a 64 test vectors.
        assert_eq!(fnv1a_64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a_64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn test_identity_vs_content_equality() {
        let a = Value::Str(Rc::new("foo".to_string()));
        let b = Value::Str(Rc::new("foo".to_string()));
        let c = a.clone();

        assert_eq!(a, b); // same content
        assert!(!a.same_object(&b)); // different allocations
        assert!(a.same_object(&c)); // shared allocation

        assert!(Value::Boolean(true).same_object(&Value::Boolean(true)));
        assert!(Value::Null.same_object(&Value::Null));
        assert!(!Value::Integer(1).same_object(&Value::Integer(1)));
    }

    #[test]
    fn test_inspect_strings() {
        let array = Value::Array(Rc::new(vec![
            Value::Integer(1),
            Value::Str(Rc::new("two".to_string())),
            Value::Boolean(false),
        ]));
        assert_eq!(array.to_string(), "[1, two, false]");

        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(
            Value::Error("something went wrong".to_string()).to_string(),
            "ERROR:something went wrong"
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::Str(Rc::new(String::new())).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Null.is_truthy());
    }
}
