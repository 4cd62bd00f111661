//! Bindings de steps.
//!
//! Un binding conecta un nombre declarado por el handler con el namespace de
//! artifacts:
//! - `Ref("raw")` referencia un artifact existente (o, en outputs, el nombre
//!   bajo el cual se publica el resultado).
//! - `Const(v)` es un literal; en documentos se escribe `{const: v}`.
//! - `List` y `Map` componen bindings recursivamente.
//! - `Literal` cubre booleanos, números y null, que pasan tal cual.

pub mod resolve;

use indexmap::IndexMap;
use serde_json::{json, Value};

pub use resolve::{materialize_outputs, resolve_binding, Namespace};

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Ref(String),
    Const(Value),
    List(Vec<Binding>),
    Map(IndexMap<String, Binding>),
    Literal(Value),
}

impl Binding {
    pub fn reference(name: impl Into<String>) -> Self {
        Binding::Ref(name.into())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Binding::Const(value.into())
    }

    pub fn list<I, B>(items: I) -> Self
        where I: IntoIterator<Item = B>,
              B: Into<Binding>
    {
        Binding::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, B>(items: I) -> Self
        where I: IntoIterator<Item = (K, B)>,
              K: Into<String>,
              B: Into<Binding>
    {
        Binding::Map(items.into_iter().map(|(k, b)| (k.into(), b.into())).collect())
    }

    /// Interpreta un valor de documento. Un mapping con la única clave
    /// `const` es un literal.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Binding::Ref(s.clone()),
            Value::Object(obj) if obj.len() == 1 && obj.contains_key("const") => {
                Binding::Const(obj.get("const").cloned().unwrap_or(Value::Null))
            }
            Value::Object(obj) => Binding::Map(obj.iter().map(|(k, v)| (k.clone(), Binding::from_json(v))).collect()),
            Value::Array(items) => Binding::List(items.iter().map(Binding::from_json).collect()),
            other => Binding::Literal(other.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Binding::Ref(name) => Value::String(name.clone()),
            Binding::Const(v) => json!({ "const": v }),
            Binding::List(items) => Value::Array(items.iter().map(Binding::to_json).collect()),
            Binding::Map(items) => Value::Object(items.iter().map(|(k, b)| (k.clone(), b.to_json())).collect()),
            Binding::Literal(v) => v.clone(),
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Binding::Const(_))
    }

    /// Referencias contenidas, en orden de aparición.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Binding::Ref(name) => out.push(name.as_str()),
            Binding::List(items) => items.iter().for_each(|b| b.collect_references(out)),
            Binding::Map(items) => items.values().for_each(|b| b.collect_references(out)),
            Binding::Const(_) | Binding::Literal(_) => {}
        }
    }

    /// Forma válida para un output: referencia, lista de referencias o
    /// mapping de referencias.
    pub fn is_output_shape(&self) -> bool {
        match self {
            Binding::Ref(_) => true,
            Binding::List(items) => items.iter().all(|b| matches!(b, Binding::Ref(_))),
            Binding::Map(items) => items.values().all(|b| matches!(b, Binding::Ref(_))),
            Binding::Const(_) | Binding::Literal(_) => false,
        }
    }
}

impl From<&str> for Binding {
    fn from(name: &str) -> Self {
        Binding::Ref(name.to_string())
    }
}

impl From<String> for Binding {
    fn from(name: String) -> Self {
        Binding::Ref(name)
    }
}
