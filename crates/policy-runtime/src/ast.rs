//! Terms and expressions built from builtin calls.

use std::fmt;

use serde_json::{Number, Value};

use crate::types::{value_type, Type};

/// A term in a compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Var(String),
    Ref(Ref),
    /// Function call: the head reference followed by the operands.
    Call(Vec<Term>),
    Array(Vec<Term>),
    Object(Vec<(Term, Term)>),
}

/// A path reference: a variable head followed by key components.
#[derive(Debug, Clone, PartialEq)]
pub struct Ref(pub Vec<Term>);

/// A statement-level expression: the operator reference followed by operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub terms: Vec<Term>,
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Term::String(s.into())
    }

    /// Lowers a JSON operand.
    ///
    /// Strings beginning with `$` name variables (`$x`) or references into
    /// a variable (`$input.user.name`). Everything else is a literal.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Term::Null,
            Value::Bool(b) => Term::Boolean(*b),
            Value::Number(n) => Term::Number(n.clone()),
            Value::String(s) => match s.strip_prefix('$') {
                Some(path) if !path.is_empty() => {
                    let mut parts = path.split('.');
                    let head = parts.next().unwrap_or_default();
                    let rest: Vec<Term> = parts.map(Term::string).collect();
                    if rest.is_empty() {
                        Term::var(head)
                    } else {
                        let mut terms = vec![Term::var(head)];
                        terms.extend(rest);
                        Term::Ref(Ref(terms))
                    }
                }
                _ => Term::String(s.clone()),
            },
            Value::Array(items) => Term::Array(items.iter().map(Term::from_json).collect()),
            Value::Object(map) => Term::Object(
                map.iter()
                    .map(|(k, v)| (Term::string(k.as_str()), Term::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts a ground term back to JSON. Returns `None` for variables,
    /// references, calls and objects with non-string keys.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Term::Null => Some(Value::Null),
            Term::Boolean(b) => Some(Value::Bool(*b)),
            Term::Number(n) => Some(Value::Number(n.clone())),
            Term::String(s) => Some(Value::String(s.clone())),
            Term::Array(items) => items.iter().map(Term::to_json).collect::<Option<Vec<_>>>().map(Value::Array),
            Term::Object(pairs) => {
                let mut map = serde_json::Map::new();
                for (k, v) in pairs {
                    match k {
                        Term::String(key) => {
                            map.insert(key.clone(), v.to_json()?);
                        }
                        _ => return None,
                    }
                }
                Some(Value::Object(map))
            }
            Term::Var(_) | Term::Ref(_) | Term::Call(_) => None,
        }
    }

    /// The type of a ground term; `None` when the value is only known at
    /// evaluation time.
    pub fn static_type(&self) -> Option<Type> {
        self.to_json().map(|v| value_type(&v))
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }
}

impl Ref {
    /// Head variable of the reference.
    pub fn head(&self) -> Option<&str> {
        match self.0.first() {
            Some(Term::Var(name)) => Some(name),
            _ => None,
        }
    }

    /// Joins a variable head and string components with dots, the inverse
    /// of how builtin names are decomposed. `None` for any other shape.
    pub fn dotted_name(&self) -> Option<String> {
        let mut name = self.head()?.to_string();
        for part in &self.0[1..] {
            match part {
                Term::String(s) => {
                    name.push('.');
                    name.push_str(s);
                }
                _ => return None,
            }
        }
        Some(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Expr {
    /// The operator reference, if the expression is a call.
    pub fn operator(&self) -> Option<&Ref> {
        match self.terms.first() {
            Some(Term::Ref(r)) => Some(r),
            _ => None,
        }
    }

    pub fn operands(&self) -> &[Term] {
        self.terms.get(1..).unwrap_or_default()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_terms(f: &mut fmt::Formatter<'_>, terms: &[Term]) -> fmt::Result {
    for (i, t) in terms.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", t)?;
    }
    Ok(())
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Null => f.write_str("null"),
            Term::Boolean(b) => write!(f, "{}", b),
            Term::Number(n) => write!(f, "{}", n),
            Term::String(s) => write!(f, "{:?}", s),
            Term::Var(name) => f.write_str(name),
            Term::Ref(r) => write!(f, "{}", r),
            Term::Call(terms) => match terms.split_first() {
                Some((head, operands)) => {
                    write!(f, "{}(", head)?;
                    write_terms(f, operands)?;
                    f.write_str(")")
                }
                None => f.write_str("<empty call>"),
            },
            Term::Array(items) => {
                f.write_str("[")?;
                write_terms(f, items)?;
                f.write_str("]")
            }
            Term::Object(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            match part {
                Term::Var(name) if i == 0 => f.write_str(name)?,
                Term::String(s) if i > 0 && is_identifier(s) => write!(f, ".{}", s)?,
                other => write!(f, "[{}]", other)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.terms.split_first() {
            Some((head, operands)) => {
                write!(f, "{}(", head)?;
                write_terms(f, operands)?;
                f.write_str(")")
            }
            None => Ok(()),
        }
    }
}
