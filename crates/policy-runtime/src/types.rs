//! Structural type algebra for builtin signatures.
//!
//! Types are plain values: primitives, unions (`any`), arrays with an
//! optional static prefix and a dynamic tail, sets, and objects with static
//! keys and an optional dynamically-keyed property. [`Type::contains`] is the
//! acceptance check the compiler uses to validate builtin operands.

use std::fmt;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A type in the signature algebra.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Null,
    Boolean,
    Number,
    String,
    /// Union of the member types. An empty union accepts any value.
    Any(Vec<Type>),
    Array(ArrayType),
    Set(Box<Type>),
    Object(ObjectType),
    Function(Function),
}

/// Array type: positional types for a static prefix followed by a dynamic
/// element type for the remaining positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayType {
    pub static_: Vec<Type>,
    pub dynamic: Option<Box<Type>>,
}

/// Object type: known keys plus an optional dynamically-keyed property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectType {
    pub static_: Vec<(Value, Type)>,
    pub dynamic: Option<Box<(Type, Type)>>,
}

/// Function declaration: ordered argument types and a result type.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    args: Vec<Type>,
    result: Box<Type>,
}

impl Type {
    /// The unconstrained type.
    pub fn any() -> Self {
        Type::Any(Vec::new())
    }

    /// A union of the given types.
    pub fn any_of(types: Vec<Type>) -> Self {
        Type::Any(types)
    }

    /// An array whose elements are all of type `elem`.
    pub fn array_of(elem: Type) -> Self {
        Type::Array(ArrayType {
            static_: Vec::new(),
            dynamic: Some(Box::new(elem)),
        })
    }

    /// A fixed-length array with the given positional types.
    pub fn tuple(types: Vec<Type>) -> Self {
        Type::Array(ArrayType {
            static_: types,
            dynamic: None,
        })
    }

    pub fn set_of(elem: Type) -> Self {
        Type::Set(Box::new(elem))
    }

    /// An object keyed dynamically by `key` with values of type `value`.
    pub fn object_of(key: Type, value: Type) -> Self {
        Type::Object(ObjectType {
            static_: Vec::new(),
            dynamic: Some(Box::new((key, value))),
        })
    }

    /// The marker used in the JSON encoding and in usage strings.
    pub fn type_name(&self) -> &'static str {
        match self {
            Type::Null => "null",
            Type::Boolean => "boolean",
            Type::Number => "number",
            Type::String => "string",
            Type::Any(_) => "any",
            Type::Array(_) => "array",
            Type::Set(_) => "set",
            Type::Object(_) => "object",
            Type::Function(_) => "function",
        }
    }

    /// Returns true if every value of type `other` is acceptable where
    /// `self` is expected.
    pub fn contains(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Function(a), Type::Function(b)) => a == b,
            (_, Type::Function(_)) | (Type::Function(_), _) => false,
            (Type::Any(members), _) if members.is_empty() => true,
            (Type::Any(members), Type::Any(others)) => {
                !others.is_empty()
                    && others
                        .iter()
                        .all(|o| members.iter().any(|m| m.contains(o)))
            }
            (Type::Any(members), _) => members.iter().any(|m| m.contains(other)),
            (_, Type::Any(others)) => {
                !others.is_empty() && others.iter().all(|o| self.contains(o))
            }
            (Type::Null, Type::Null)
            | (Type::Boolean, Type::Boolean)
            | (Type::Number, Type::Number)
            | (Type::String, Type::String) => true,
            (Type::Array(a), Type::Array(b)) => a.contains(b),
            (Type::Set(a), Type::Set(b)) => a.contains(b),
            (Type::Object(a), Type::Object(b)) => a.contains(b),
            _ => false,
        }
    }
}

impl ArrayType {
    /// Type of the element at position `i`, if the array can have one.
    pub fn elem(&self, i: usize) -> Option<&Type> {
        self.static_
            .get(i)
            .or_else(|| self.dynamic.as_deref())
    }

    fn contains(&self, other: &ArrayType) -> bool {
        for (i, t) in other.static_.iter().enumerate() {
            match self.elem(i) {
                Some(e) if e.contains(t) => {}
                _ => return false,
            }
        }
        if other.static_.len() < self.static_.len() {
            // Positions `self` requires that `other` may not have.
            return false;
        }
        match other.dynamic.as_deref() {
            None => true,
            Some(d) => self.dynamic.as_deref().is_some_and(|e| e.contains(d)),
        }
    }
}

impl ObjectType {
    fn static_value(&self, key: &Value) -> Option<&Type> {
        self.static_
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, t)| t)
    }

    fn contains(&self, other: &ObjectType) -> bool {
        for (key, _) in &self.static_ {
            if other.static_value(key).is_none() {
                return false;
            }
        }
        for (key, value) in &other.static_ {
            let accepted = match self.static_value(key) {
                Some(t) => t.contains(value),
                None => match self.dynamic.as_deref() {
                    Some((kt, vt)) => kt.contains(&value_type(key)) && vt.contains(value),
                    None => false,
                },
            };
            if !accepted {
                return false;
            }
        }
        match (other.dynamic.as_deref(), self.dynamic.as_deref()) {
            (None, _) => true,
            (Some((ok, ov)), Some((sk, sv))) => sk.contains(ok) && sv.contains(ov),
            (Some(_), None) => false,
        }
    }
}

impl Function {
    pub fn new(args: Vec<Type>, result: Type) -> Self {
        Self {
            args,
            result: Box::new(result),
        }
    }

    pub fn args(&self) -> &[Type] {
        &self.args
    }

    pub fn result(&self) -> &Type {
        &self.result
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// Type of a ground JSON value.
pub fn value_type(value: &Value) -> Type {
    match value {
        Value::Null => Type::Null,
        Value::Bool(_) => Type::Boolean,
        Value::Number(_) => Type::Number,
        Value::String(_) => Type::String,
        Value::Array(items) => Type::tuple(items.iter().map(value_type).collect()),
        Value::Object(map) => Type::Object(ObjectType {
            static_: map
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), value_type(v)))
                .collect(),
            dynamic: None,
        }),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, types: &[Type]) -> fmt::Result {
    for (i, t) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", t)?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Null | Type::Boolean | Type::Number | Type::String => {
                f.write_str(self.type_name())
            }
            Type::Any(members) if members.is_empty() => f.write_str("any"),
            Type::Any(members) => {
                f.write_str("any<")?;
                write_list(f, members)?;
                f.write_str(">")
            }
            Type::Array(array) => {
                f.write_str("array")?;
                if !array.static_.is_empty() {
                    f.write_str("<")?;
                    write_list(f, &array.static_)?;
                    f.write_str(">")?;
                }
                if let Some(dynamic) = &array.dynamic {
                    write!(f, "[{}]", dynamic)?;
                }
                Ok(())
            }
            Type::Set(elem) => write!(f, "set[{}]", elem),
            Type::Object(object) => {
                f.write_str("object")?;
                if !object.static_.is_empty() {
                    f.write_str("<")?;
                    for (i, (k, t)) in object.static_.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}: {}", k, t)?;
                    }
                    f.write_str(">")?;
                }
                if let Some(dynamic) = &object.dynamic {
                    write!(f, "[{}: {}]", dynamic.0, dynamic.1)?;
                }
                Ok(())
            }
            Type::Function(func) => write!(f, "{}", func),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        write_list(f, &self.args)?;
        write!(f, ") => {}", self.result)
    }
}

/// `{"key": ..., "value": ...}` as used by object properties.
struct Property<'a, K: Serialize>(&'a K, &'a Type);

impl<K: Serialize> Serialize for Property<'_, K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Property", 2)?;
        s.serialize_field("key", self.0)?;
        s.serialize_field("value", self.1)?;
        s.end()
    }
}

// Keys are emitted in alphabetical order so the encoding is byte-stable.
impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Type::Null | Type::Boolean | Type::Number | Type::String => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", self.type_name())?;
                map.end()
            }
            Type::Any(members) => {
                let mut map = serializer.serialize_map(None)?;
                if !members.is_empty() {
                    map.serialize_entry("of", members)?;
                }
                map.serialize_entry("type", "any")?;
                map.end()
            }
            Type::Array(array) => {
                let mut map = serializer.serialize_map(None)?;
                if let Some(dynamic) = &array.dynamic {
                    map.serialize_entry("dynamic", dynamic)?;
                }
                if !array.static_.is_empty() {
                    map.serialize_entry("static", &array.static_)?;
                }
                map.serialize_entry("type", "array")?;
                map.end()
            }
            Type::Set(elem) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("of", elem)?;
                map.serialize_entry("type", "set")?;
                map.end()
            }
            Type::Object(object) => {
                let mut map = serializer.serialize_map(None)?;
                if let Some(dynamic) = &object.dynamic {
                    map.serialize_entry("dynamic", &Property(&dynamic.0, &dynamic.1))?;
                }
                if !object.static_.is_empty() {
                    let props: Vec<Property<'_, Value>> =
                        object.static_.iter().map(|(k, t)| Property(k, t)).collect();
                    map.serialize_entry("static", &props)?;
                }
                map.serialize_entry("type", "object")?;
                map.end()
            }
            Type::Function(func) => func.serialize(serializer),
        }
    }
}

impl Serialize for Function {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if !self.args.is_empty() {
            map.serialize_entry("args", &self.args)?;
        }
        map.serialize_entry("result", &self.result)?;
        map.serialize_entry("type", "function")?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_any_contains_everything_but_functions() {
        let any = Type::any();
        assert!(any.contains(&Type::Number));
        assert!(any.contains(&Type::set_of(Type::String)));
        assert!(!any.contains(&Type::Function(Function::new(vec![], Type::Boolean))));
    }

    #[test]
    fn test_union_contains_member() {
        let collection = Type::any_of(vec![
            Type::array_of(Type::any()),
            Type::set_of(Type::any()),
            Type::String,
        ]);
        assert!(collection.contains(&Type::String));
        assert!(collection.contains(&Type::tuple(vec![Type::Number, Type::Null])));
        assert!(!collection.contains(&Type::Number));
        assert!(collection.contains(&Type::any_of(vec![Type::String, Type::set_of(Type::Number)])));
        assert!(!collection.contains(&Type::any_of(vec![Type::String, Type::Boolean])));
    }

    #[test]
    fn test_primitive_does_not_contain_unconstrained_any() {
        assert!(!Type::Number.contains(&Type::any()));
        assert!(Type::Number.contains(&Type::any_of(vec![Type::Number])));
    }

    #[test]
    fn test_array_containment() {
        let numbers = Type::array_of(Type::Number);
        assert!(numbers.contains(&Type::tuple(vec![Type::Number, Type::Number])));
        assert!(numbers.contains(&Type::tuple(vec![])));
        assert!(!numbers.contains(&Type::tuple(vec![Type::String])));

        let date = Type::tuple(vec![Type::Number, Type::String]);
        assert!(date.contains(&Type::tuple(vec![Type::Number, Type::String])));
        assert!(!date.contains(&Type::tuple(vec![Type::Number])));
        assert!(!date.contains(&Type::array_of(Type::Number)));
    }

    #[test]
    fn test_object_containment() {
        let dynamic = Type::object_of(Type::String, Type::any());
        assert!(dynamic.contains(&value_type(&json!({"a": 1, "b": [true]}))));
        assert!(!Type::object_of(Type::String, Type::String).contains(&value_type(&json!({"a": 1}))));
        assert!(!dynamic.contains(&Type::String));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Type::any_of(vec![Type::Number, Type::set_of(Type::any())]).to_string(),
            "any<number, set[any]>"
        );
        assert_eq!(Type::object_of(Type::String, Type::any()).to_string(), "object[string: any]");
        assert_eq!(
            Function::new(vec![Type::String, Type::String], Type::Boolean).to_string(),
            "(string, string) => boolean"
        );
        assert_eq!(Type::tuple(vec![Type::Number, Type::String]).to_string(), "array<number, string>");
    }

    #[test]
    fn test_json_encoding() {
        let decl = Function::new(
            vec![Type::any_of(vec![Type::Number, Type::set_of(Type::any())])],
            Type::object_of(Type::String, Type::array_of(Type::String)),
        );
        assert_eq!(
            serde_json::to_string(&decl).unwrap(),
            r#"{"args":[{"of":[{"type":"number"},{"of":{"type":"any"},"type":"set"}],"type":"any"}],"result":{"dynamic":{"key":{"type":"string"},"value":{"dynamic":{"type":"string"},"type":"array"}},"type":"object"},"type":"function"}"#
        );
    }

    #[test]
    fn test_nullary_function_omits_args() {
        let decl = Function::new(vec![], Type::Number);
        assert_eq!(
            serde_json::to_string(&decl).unwrap(),
            r#"{"result":{"type":"number"},"type":"function"}"#
        );
    }
}
