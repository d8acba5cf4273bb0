use std::rc::Rc;

use crate::value::{NativeFunction, RuntimeError, Value};

/// The natives every program sees as globals.
pub fn builtins() -> Vec<NativeFunction> {
    vec![
        NativeFunction::new("len", 1, builtin_len),
        NativeFunction::new("push", 2, builtin_push),
        NativeFunction::new("pop", 1, builtin_pop),
        NativeFunction::new("keys", 1, builtin_keys),
        NativeFunction::new("remove", 2, builtin_remove),
        NativeFunction::new("to_string", 1, builtin_to_string),
    ]
}

pub(crate) fn expect_number(value: &Value, context: &str) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(number) => Ok(*number),
        other => Err(RuntimeError::type_error(format!(
            "Expected number in {context}, got {}.",
            other.type_name()
        ))),
    }
}

pub(crate) fn expect_string(value: &Value, context: &str) -> Result<Rc<str>, RuntimeError> {
    match value {
        Value::String(string) => Ok(string.clone()),
        other => Err(RuntimeError::type_error(format!(
            "Expected string in {context}, got {}.",
            other.type_name()
        ))),
    }
}

fn builtin_len(args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::List(items) => Ok(Value::Number(items.borrow().len() as f64)),
        Value::Map(entries) => Ok(Value::Number(entries.borrow().len() as f64)),
        Value::String(string) => Ok(Value::Number(string.chars().count() as f64)),
        _ => Err(RuntimeError::native(
            "Object has no length (only list, map, string).",
        )),
    }
}

/// Appends in place and returns the pushed value.
fn builtin_push(args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::List(items) => {
            items.borrow_mut().push(args[1].clone());
            Ok(args[1].clone())
        }
        _ => Err(RuntimeError::native("Expected list for push.")),
    }
}

fn builtin_pop(args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::List(items) => Ok(items.borrow_mut().pop().unwrap_or(Value::Nil)),
        _ => Err(RuntimeError::native("Expected list for pop.")),
    }
}

fn builtin_keys(args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Map(entries) => Ok(Value::list(
            entries
                .borrow()
                .keys()
                .map(|key| Value::String(key.clone()))
                .collect(),
        )),
        _ => Err(RuntimeError::native("Expected map for keys.")),
    }
}

fn builtin_remove(args: Vec<Value>) -> Result<Value, RuntimeError> {
    match (&args[0], &args[1]) {
        (Value::Map(entries), Value::String(key)) => {
            Ok(entries.borrow_mut().remove(key).unwrap_or(Value::Nil))
        }
        (Value::Map(_), _) => Err(RuntimeError::type_error("Map keys must be strings.")),
        _ => Err(RuntimeError::native("Expected map for remove.")),
    }
}

fn builtin_to_string(args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::string(args[0].to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let native = builtins()
            .into_iter()
            .find(|native| native.name.as_ref() == name)
            .unwrap();
        native.call(args)
    }

    #[test]
    fn test_len() {
        let mut entries = BTreeMap::new();
        entries.insert(Rc::from("a"), Value::Nil);
        let tests = vec![
            (Value::string("héllo"), Ok(Value::Number(5.0))),
            (
                Value::list(vec![Value::Nil, Value::Nil]),
                Ok(Value::Number(2.0)),
            ),
            (Value::map(entries), Ok(Value::Number(1.0))),
            (
                Value::Number(1.0),
                Err(RuntimeError::native(
                    "Object has no length (only list, map, string).",
                )),
            ),
        ];

        for (input, expected) in tests {
            assert_eq!(call("len", vec![input]), expected);
        }
    }

    #[test]
    fn test_push_and_pop_mutate_in_place() {
        let list = Value::list(vec![Value::Number(1.0)]);

        assert_eq!(
            call("push", vec![list.clone(), Value::Number(2.0)]),
            Ok(Value::Number(2.0))
        );
        assert_eq!(list.to_string(), "[1, 2]");
        assert_eq!(call("pop", vec![list.clone()]), Ok(Value::Number(2.0)));
        assert_eq!(call("pop", vec![list.clone()]), Ok(Value::Number(1.0)));
        assert_eq!(call("pop", vec![list.clone()]), Ok(Value::Nil));
    }

    #[test]
    fn test_keys_and_remove() {
        let mut entries = BTreeMap::new();
        entries.insert(Rc::from("b"), Value::Number(2.0));
        entries.insert(Rc::from("a"), Value::Number(1.0));
        let map = Value::map(entries);

        assert_eq!(call("keys", vec![map.clone()]).unwrap().to_string(), "[a, b]");
        assert_eq!(
            call("remove", vec![map.clone(), Value::string("a")]),
            Ok(Value::Number(1.0))
        );
        assert_eq!(
            call("remove", vec![map.clone(), Value::string("a")]),
            Ok(Value::Nil)
        );
        assert_eq!(map.to_string(), "{b: 2}");
    }

    #[test]
    fn test_to_string() {
        assert_eq!(
            call("to_string", vec![Value::Number(2.5)]),
            Ok(Value::string("2.5"))
        );
    }
}
