//! Attribute type system
//!
//! Coerces raw attribute values into the kind an attribute declares:
//!
//! | kind    | accepts                                                   |
//! |---------|-----------------------------------------------------------|
//! | boolean | `true`, `false`, the token `"on"`                         |
//! | integer | integers, floats without a fractional part, numeric text  |
//! | string  | any scalar, rendered as text                              |
//! | enum    | a label of the enum, or an ordinal within range           |

use serde::{Serialize, Serializer};

use crate::error::{Result, SchemaError};
use crate::value::{EnumValue, Value};

/// Boolean coercion.
///
/// Only `"on"` is accepted as a textual spelling; every other string,
/// including `"yes"`, `"off"` and `"no"`, is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanType;

impl BooleanType {
    pub fn validate(&self, raw: &Value) -> Result<bool> {
        coerce_bool(raw).map_err(|reason| SchemaError::invalid("boolean", raw, reason))
    }
}

fn coerce_bool(raw: &Value) -> std::result::Result<bool, String> {
    match raw {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "on" => Ok(true),
        _ => Err("expected true, false or 'on'".to_string()),
    }
}

/// Integer coercion
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerType;

impl IntegerType {
    pub fn validate(&self, raw: &Value) -> Result<i64> {
        coerce_integer(raw).map_err(|reason| SchemaError::invalid("integer", raw, reason))
    }
}

fn coerce_integer(raw: &Value) -> std::result::Result<i64, String> {
    match raw {
        Value::Integer(i) => Ok(*i),
        Value::Float(x) => {
            if x.is_finite() && x.fract() == 0.0 && *x >= i64::MIN as f64 && *x <= i64::MAX as f64 {
                Ok(*x as i64)
            } else {
                Err("float loses precision as an integer".to_string())
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("not an integer: {}", e)),
        _ => Err("expected an integer".to_string()),
    }
}

/// String coercion
#[derive(Debug, Clone, Copy, Default)]
pub struct StringType;

impl StringType {
    pub fn validate(&self, raw: &Value) -> Result<String> {
        coerce_string(raw).map_err(|reason| SchemaError::invalid("string", raw, reason))
    }
}

fn coerce_string(raw: &Value) -> std::result::Result<String, String> {
    match raw {
        Value::Null => Err("expected a string".to_string()),
        other => Ok(other.to_string()),
    }
}

/// An ordered set of labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    labels: Vec<String>,
}

impl EnumType {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn validate(&self, raw: &Value) -> Result<EnumValue> {
        self.coerce(raw)
            .map_err(|reason| SchemaError::invalid(format!("enum {:?}", self.labels), raw, reason))
    }

    fn coerce(&self, raw: &Value) -> std::result::Result<EnumValue, String> {
        match raw {
            Value::Integer(i) => usize::try_from(*i)
                .ok()
                .and_then(|ordinal| self.labels.get(ordinal).map(|l| EnumValue::new(l.clone(), ordinal)))
                .ok_or_else(|| format!("ordinal out of range 0..{}", self.labels.len())),
            Value::String(label) => self.lookup(label),
            Value::Enum(e) => self.lookup(&e.label),
            _ => Err("expected a label or ordinal".to_string()),
        }
    }

    fn lookup(&self, label: &str) -> std::result::Result<EnumValue, String> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|ordinal| EnumValue::new(label, ordinal))
            .ok_or_else(|| format!("not one of {:?}", self.labels))
    }
}

/// The value kind an attribute declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    Boolean,
    Integer,
    String,
    Enum(EnumType),
}

impl AttributeKind {
    /// Resolve a scalar kind by its declared name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(AttributeKind::Boolean),
            "integer" => Some(AttributeKind::Integer),
            "string" => Some(AttributeKind::String),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::Boolean => "boolean",
            AttributeKind::Integer => "integer",
            AttributeKind::String => "string",
            AttributeKind::Enum(_) => "enum",
        }
    }

    fn coerce(&self, raw: &Value) -> std::result::Result<Value, String> {
        match self {
            AttributeKind::Boolean => coerce_bool(raw).map(Value::Bool),
            AttributeKind::Integer => coerce_integer(raw).map(Value::Integer),
            AttributeKind::String => coerce_string(raw).map(Value::String),
            AttributeKind::Enum(e) => e.coerce(raw).map(Value::Enum),
        }
    }
}

impl Serialize for AttributeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AttributeKind::Enum(e) => e.labels.serialize(serializer),
            other => serializer.serialize_str(other.name()),
        }
    }
}

/// Optional parts of an attribute declaration
#[derive(Debug, Clone, Default)]
pub struct AttributeOptions {
    pub default: Option<Value>,
    /// Fixed value; mutually exclusive with `default`
    pub value: Option<Value>,
    pub required: bool,
    pub unique: bool,
    pub deprecated: bool,
    pub description: Option<String>,
}

/// One named attribute of an entity type
#[derive(Debug, Clone, Serialize)]
pub struct AttributeType {
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub required: bool,
    pub unique: bool,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AttributeType {
    /// Declare an attribute. Defaults and fixed values are coerced to the
    /// declared kind up front; declaring both is rejected.
    pub fn new(name: impl Into<String>, kind: AttributeKind, options: AttributeOptions) -> Result<Self> {
        let name = name.into();
        if options.default.is_some() && options.value.is_some() {
            return Err(SchemaError::InvalidDeclaration {
                name,
                reason: "has both a default and a fixed value".to_string(),
            });
        }

        let declared = |v: Option<Value>, what: &str| -> Result<Option<Value>> {
            v.map(|raw| {
                kind.coerce(&raw).map_err(|reason| SchemaError::InvalidDeclaration {
                    name: name.clone(),
                    reason: format!("{} {}: {}", what, raw, reason),
                })
            })
            .transpose()
        };
        let default = declared(options.default, "default")?;
        let value = declared(options.value, "fixed value")?;

        Ok(Self {
            name,
            kind,
            default,
            value,
            required: options.required,
            unique: options.unique,
            deprecated: options.deprecated,
            description: options.description,
        })
    }

    /// Declare an attribute with no default, fixed value or flags
    pub fn plain(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            value: None,
            required: false,
            unique: false,
            deprecated: false,
            description: None,
        }
    }

    /// Coerce a raw value to this attribute's kind.
    ///
    /// An attribute with a fixed value only accepts that value as written:
    /// `3` does not satisfy a fixed `"3"`. Enum labels are the exception,
    /// since raw input names them as text.
    pub fn validate(&self, raw: &Value) -> Result<Value> {
        if let Some(fixed) = &self.value {
            if !is_exactly(raw, fixed) {
                return Err(SchemaError::invalid(
                    self.name.clone(),
                    raw,
                    format!("attribute has fixed value '{}'", fixed),
                ));
            }
        }
        self.kind
            .coerce(raw)
            .map_err(|reason| SchemaError::invalid(self.name.clone(), raw, reason))
    }

    /// Value to use when the attribute is absent from an instance.
    ///
    /// `Ok(None)` means the attribute is optional and simply left out.
    pub fn missing_value(&self) -> Result<Option<Value>> {
        if let Some(default) = &self.default {
            return Ok(Some(default.clone()));
        }
        if let Some(fixed) = &self.value {
            return Ok(Some(fixed.clone()));
        }
        if self.required {
            return Err(SchemaError::MissingRequired {
                entity: String::new(),
                attribute: self.name.clone(),
            });
        }
        Ok(None)
    }
}

fn is_exactly(raw: &Value, fixed: &Value) -> bool {
    match (raw, fixed) {
        (Value::String(label), Value::Enum(e)) => *label == e.label,
        _ => raw == fixed,
    }
}
