//! Field descriptors for method configurations.
//!
//! Built-in configurations get their [`Schema`] from the `#[Method]` attribute (static,
//! generated at compile time). Methods declared in the panel config file are described by a
//! TOML table and go through [`extract_toml`] at startup.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Str,
}

impl ScalarKind {
    pub fn zero(self) -> FieldValue {
        match self {
            ScalarKind::Bool => FieldValue::Bool(false),
            ScalarKind::Int => FieldValue::Int(0),
            ScalarKind::Float => FieldValue::Float(0.0),
            ScalarKind::Str => FieldValue::Str(String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Str,
    Enum,
    Sequence {
        elem: ScalarKind,
        arity: Option<usize>,
    },
    /// A declared type no widget understands; shown as text.
    Other(String),
}

impl FieldKind {
    pub fn label(&self) -> String {
        match self {
            FieldKind::Bool => "bool".into(),
            FieldKind::Int => "int".into(),
            FieldKind::Float => "float".into(),
            FieldKind::Str => "str".into(),
            FieldKind::Enum => "enum".into(),
            FieldKind::Sequence { elem, arity } => {
                let elem = match elem {
                    ScalarKind::Bool => "bool",
                    ScalarKind::Int => "int",
                    ScalarKind::Float => "float",
                    ScalarKind::Str => "str",
                };
                match arity {
                    Some(n) => format!("[{elem}; {n}]"),
                    None => format!("[{elem}]"),
                }
            }
            FieldKind::Other(t) => t.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<FieldValue>),
    /// Nothing entered; never forwarded to a command.
    Unset,
}

impl FieldValue {
    /// True for the unset sentinel and for empty text.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Unset => true,
            FieldValue::Str(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.is_empty() || items.iter().any(FieldValue::is_blank),
            _ => false,
        }
    }

    /// Command-line token form. Lists join their elements with spaces (display only;
    /// argv serialization emits list elements as separate tokens).
    pub fn to_arg(&self) -> String {
        match self {
            FieldValue::Bool(true) => "True".into(),
            FieldValue::Bool(false) => "False".into(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => format_float(*f),
            FieldValue::Str(s) => s.trim().to_string(),
            FieldValue::List(items) => items
                .iter()
                .map(FieldValue::to_arg)
                .collect::<Vec<_>>()
                .join(" "),
            FieldValue::Unset => String::new(),
        }
    }

    /// Reads a value coming from a browser widget. Anything that does not fit the field's
    /// kind becomes [`FieldValue::Unset`] and is dropped later by the collector.
    pub fn from_json(kind: &FieldKind, raw: &serde_json::Value) -> FieldValue {
        match kind {
            FieldKind::Bool => scalar_from_json(ScalarKind::Bool, raw),
            FieldKind::Int => scalar_from_json(ScalarKind::Int, raw),
            FieldKind::Float => scalar_from_json(ScalarKind::Float, raw),
            FieldKind::Sequence { elem, .. } => scalar_from_json(*elem, raw),
            FieldKind::Str | FieldKind::Enum | FieldKind::Other(_) => match raw {
                serde_json::Value::String(s) => FieldValue::Str(s.clone()),
                serde_json::Value::Number(n) => FieldValue::Str(n.to_string()),
                serde_json::Value::Bool(b) => FieldValue::Str(b.to_string()),
                _ => FieldValue::Unset,
            },
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_arg())
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn scalar_from_json(kind: ScalarKind, raw: &serde_json::Value) -> FieldValue {
    use serde_json::Value;
    match (kind, raw) {
        (_, Value::Null) => FieldValue::Unset,
        (ScalarKind::Bool, Value::Bool(b)) => FieldValue::Bool(*b),
        (ScalarKind::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => FieldValue::Bool(true),
            "false" => FieldValue::Bool(false),
            _ => FieldValue::Unset,
        },
        (ScalarKind::Int, Value::Number(n)) => match n.as_i64() {
            Some(i) => FieldValue::Int(i),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| FieldValue::Int(f as i64))
                .unwrap_or(FieldValue::Unset),
        },
        (ScalarKind::Int, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Int)
            .unwrap_or(FieldValue::Unset),
        (ScalarKind::Float, Value::Number(n)) => n
            .as_f64()
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::Unset),
        (ScalarKind::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::Unset),
        (ScalarKind::Str, Value::String(s)) => FieldValue::Str(s.clone()),
        (ScalarKind::Str, Value::Number(n)) => FieldValue::Str(n.to_string()),
        _ => FieldValue::Unset,
    }
}

/// Conversion used by generated schemas to read declared defaults.
pub trait AsFieldValue {
    fn as_field_value(&self) -> Option<FieldValue>;
}

impl AsFieldValue for bool {
    fn as_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Bool(*self))
    }
}

macro_rules! int_field_value {
    ($($t:ty),*) => {
        $(
            impl AsFieldValue for $t {
                fn as_field_value(&self) -> Option<FieldValue> {
                    i64::try_from(*self).ok().map(FieldValue::Int)
                }
            }
        )*
    };
}

int_field_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl AsFieldValue for f32 {
    fn as_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Float(f64::from(*self)))
    }
}

impl AsFieldValue for f64 {
    fn as_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Float(*self))
    }
}

impl AsFieldValue for String {
    fn as_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Str(self.clone()))
    }
}

impl AsFieldValue for PathBuf {
    fn as_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Str(self.display().to_string()))
    }
}

impl<T: AsFieldValue> AsFieldValue for Option<T> {
    fn as_field_value(&self) -> Option<FieldValue> {
        self.as_ref().and_then(AsFieldValue::as_field_value)
    }
}

impl<T: AsFieldValue, const N: usize> AsFieldValue for [T; N] {
    fn as_field_value(&self) -> Option<FieldValue> {
        let items = self
            .iter()
            .map(|v| v.as_field_value().unwrap_or(FieldValue::Unset))
            .collect();
        Some(FieldValue::List(items))
    }
}

impl<T: AsFieldValue> AsFieldValue for Vec<T> {
    fn as_field_value(&self) -> Option<FieldValue> {
        let items = self
            .iter()
            .map(|v| v.as_field_value().unwrap_or(FieldValue::Unset))
            .collect();
        Some(FieldValue::List(items))
    }
}

/// String form of a default whose type has no dedicated widget.
pub fn debug_default<T: fmt::Debug>(v: &T) -> Option<FieldValue> {
    let s = format!("{v:?}");
    if s == "None" {
        return None;
    }
    let s = s
        .strip_prefix("Some(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(&s);
    Some(FieldValue::Str(s.trim_matches('"').to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub allowed_values: Option<Vec<FieldValue>>,
    pub default_value: Option<FieldValue>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub help: String,
}

impl FieldDescriptor {
    /// A field of any non-enum kind. Passing [`FieldKind::Enum`] here would break the
    /// enum/allowed-values pairing, so it is downgraded to `Str`; use [`Self::choice`].
    pub fn new(name: &str, kind: FieldKind, default_value: Option<FieldValue>) -> Self {
        let kind = if kind == FieldKind::Enum {
            FieldKind::Str
        } else {
            kind
        };
        Self {
            name: name.to_string(),
            kind,
            allowed_values: None,
            default_value,
            help: String::new(),
        }
    }

    /// A field restricted to a closed, ordered set of literal values. An empty set
    /// describes a plain string field.
    pub fn choice(name: &str, allowed: Vec<FieldValue>, default_value: Option<FieldValue>) -> Self {
        if allowed.is_empty() {
            return Self::new(name, FieldKind::Str, default_value);
        }
        Self {
            name: name.to_string(),
            kind: FieldKind::Enum,
            allowed_values: Some(allowed),
            default_value,
            help: String::new(),
        }
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }

    pub fn allows(&self, value: &FieldValue) -> bool {
        match &self.allowed_values {
            None => true,
            Some(allowed) => {
                let wanted = value.to_arg();
                allowed.iter().any(|a| a.to_arg() == wanted)
            }
        }
    }
}

/// Every static configuration registered with `#[Method]`.
pub trait ConfigSchema: Default {
    const ID: &'static str;
    const SUBCOMMAND: &'static str;
    const DESCRIPTION: &'static str;

    fn schema() -> Schema;
}

/// Ordered field descriptors of one method's configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    owner: String,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn new(owner: &str, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            owner: owner.to_string(),
            fields,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Describes a method declared in the panel config file.
///
/// Each key of the table is a field. Plain values give kind and default
/// (`near_plane = 0.05`); arrays become sequences with the array's length as arity; a
/// sub-table `{ choices = [...], default = ... }` becomes an enum, and
/// `{ kind = "int" }` declares a field without a default.
pub fn extract_toml(name: &str, value: &toml::Value) -> Result<Schema> {
    let Some(table) = value.as_table() else {
        return Err(Error::schema(format!(
            "schema for '{name}' must be a table of fields, got {}",
            value.type_str()
        )));
    };

    let mut fields = Vec::new();
    for (key, v) in table {
        fields.push(extract_toml_field(name, key, v)?);
    }
    Ok(Schema::new(name, fields))
}

fn extract_toml_field(owner: &str, key: &str, v: &toml::Value) -> Result<FieldDescriptor> {
    use toml::Value;
    let field = match v {
        Value::Boolean(b) => FieldDescriptor::new(key, FieldKind::Bool, Some(FieldValue::Bool(*b))),
        Value::Integer(i) => FieldDescriptor::new(key, FieldKind::Int, Some(FieldValue::Int(*i))),
        Value::Float(f) => FieldDescriptor::new(key, FieldKind::Float, Some(FieldValue::Float(*f))),
        Value::String(s) => {
            FieldDescriptor::new(key, FieldKind::Str, Some(FieldValue::Str(s.clone())))
        }
        Value::Array(items) => {
            let mut elem = None;
            let mut values = Vec::new();
            for item in items {
                let (k, fv) = toml_scalar(item).ok_or_else(|| {
                    Error::schema(format!(
                        "'{owner}.{key}': sequence elements must be bool, int, float or string"
                    ))
                })?;
                match elem {
                    None => elem = Some(k),
                    Some(prev) if prev != k => {
                        return Err(Error::schema(format!(
                            "'{owner}.{key}': sequence elements must share one type"
                        )));
                    }
                    Some(_) => {}
                }
                values.push(fv);
            }
            FieldDescriptor::new(
                key,
                FieldKind::Sequence {
                    elem: elem.unwrap_or(ScalarKind::Str),
                    arity: Some(values.len()),
                },
                Some(FieldValue::List(values)),
            )
        }
        Value::Table(t) => {
            let default_value = t.get("default").and_then(toml_scalar).map(|(_, v)| v);
            if let Some(choices) = t.get("choices") {
                let Some(items) = choices.as_array() else {
                    return Err(Error::schema(format!(
                        "'{owner}.{key}.choices' must be an array"
                    )));
                };
                let mut allowed = Vec::new();
                for item in items {
                    let (_, fv) = toml_scalar(item).ok_or_else(|| {
                        Error::schema(format!("'{owner}.{key}.choices' must hold literals"))
                    })?;
                    allowed.push(fv);
                }
                if allowed.is_empty() {
                    return Err(Error::schema(format!(
                        "'{owner}.{key}.choices' must not be empty"
                    )));
                }
                FieldDescriptor::choice(key, allowed, default_value)
            } else {
                let kind = match t.get("kind").and_then(toml::Value::as_str) {
                    Some("bool") => FieldKind::Bool,
                    Some("int") => FieldKind::Int,
                    Some("float") => FieldKind::Float,
                    Some("str") | None => FieldKind::Str,
                    Some(other) => FieldKind::Other(other.to_string()),
                };
                FieldDescriptor::new(key, kind, default_value)
            }
            .with_help(t.get("help").and_then(toml::Value::as_str).unwrap_or(""))
        }
        Value::Datetime(d) => FieldDescriptor::new(
            key,
            FieldKind::Other("datetime".into()),
            Some(FieldValue::Str(d.to_string())),
        ),
    };
    Ok(field)
}

fn toml_scalar(v: &toml::Value) -> Option<(ScalarKind, FieldValue)> {
    match v {
        toml::Value::Boolean(b) => Some((ScalarKind::Bool, FieldValue::Bool(*b))),
        toml::Value::Integer(i) => Some((ScalarKind::Int, FieldValue::Int(*i))),
        toml::Value::Float(f) => Some((ScalarKind::Float, FieldValue::Float(*f))),
        toml::Value::String(s) => Some((ScalarKind::Str, FieldValue::Str(s.clone()))),
        _ => None,
    }
}
