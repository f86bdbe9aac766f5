//! Entity types and validated entities

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::error::{closest_match, Result, SchemaError};
use crate::types::AttributeType;
use crate::value::{AttributeMap, Value};

/// Attributes every entity understands whether or not its type declares them
pub const STRUCTURAL_ATTRIBUTES: [&str; 3] = ["name", "identity", "type"];

/// One configurable kind of entity, e.g. `listener`
#[derive(Debug, Clone, Serialize)]
pub struct EntityType {
    #[serde(skip)]
    pub name: String,
    /// `<schema prefix>.<name>`
    #[serde(skip)]
    pub long_name: String,
    pub attributes: IndexMap<String, AttributeType>,
    pub deprecated: bool,
    pub singleton: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    initialized: bool,
}

impl EntityType {
    pub fn new(name: impl Into<String>, prefix: &str, attributes: Vec<AttributeType>) -> Self {
        let name = name.into();
        let long_name = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        Self {
            name,
            long_name,
            attributes: attributes.into_iter().map(|a| (a.name.clone(), a)).collect(),
            deprecated: false,
            singleton: false,
            description: None,
            initialized: false,
        }
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// Check the declarations hang together. Must run before `validate`.
    pub fn init(&mut self) -> Result<()> {
        for (key, attr) in &self.attributes {
            if *key != attr.name {
                return Err(self.bad_declaration(format!(
                    "attribute declared as '{}' is named '{}'",
                    key, attr.name
                )));
            }
            if attr.default.is_some() && attr.value.is_some() {
                return Err(self.bad_declaration(format!(
                    "attribute '{}' has both a default and a fixed value",
                    key
                )));
            }
            for declared in attr.default.iter().chain(attr.value.iter()) {
                attr.validate(declared).map_err(|e| self.bad_declaration(e.to_string()))?;
            }
        }
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True if `name` matches either the short or the qualified type name
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.long_name == name
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeType> {
        self.attributes.get(name)
    }

    /// Whether `name` may appear on an instance of this type
    pub fn accepts(&self, name: &str) -> bool {
        self.attributes.contains_key(name) || STRUCTURAL_ATTRIBUTES.contains(&name)
    }

    /// Validate a raw attribute map into a normalised one.
    ///
    /// Declared attributes come out coerced, absent ones filled from their
    /// default or fixed value. The result always carries the qualified
    /// `type`.
    pub fn validate(&self, raw: &AttributeMap) -> Result<AttributeMap> {
        if !self.initialized {
            return Err(self.bad_declaration("entity type used before init".to_string()));
        }

        for key in raw.keys() {
            if !self.accepts(key) {
                return Err(self.unknown_attribute(key));
            }
        }

        if let Some(declared) = raw.get("type") {
            let matches = declared.as_str().map(|t| self.is_named(t)).unwrap_or(false);
            if !matches {
                return Err(SchemaError::invalid(
                    format!("'type' of '{}'", self.name),
                    declared,
                    "does not name this entity type",
                ));
            }
        }

        if self.deprecated {
            warn!(entity = %self.name, "Entity type '{}' is deprecated", self.name);
        }

        let mut validated = AttributeMap::new();
        let type_value = Value::String(self.long_name.clone());
        for (name, attr) in &self.attributes {
            let supplied = if name == "type" { Some(&type_value) } else { raw.get(name) };
            let value = match supplied {
                Some(raw_value) => {
                    if attr.deprecated {
                        warn!(
                            entity = %self.name,
                            attribute = %name,
                            "Attribute '{}' of '{}' is deprecated",
                            name,
                            self.name
                        );
                    }
                    Some(attr.validate(raw_value).map_err(|e| e.in_entity(&self.name))?)
                }
                None => attr.missing_value().map_err(|e| e.in_entity(&self.name))?,
            };
            if let Some(value) = value {
                validated.insert(name.clone(), value);
            }
        }

        // Structural attributes the type does not declare pass through as text
        for key in ["name", "identity"] {
            if self.attributes.contains_key(key) {
                continue;
            }
            if let Some(value) = raw.get(key) {
                let text = value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                validated.insert(key.to_string(), Value::String(text));
            }
        }

        validated.insert("type".to_string(), type_value);
        Ok(validated)
    }

    fn unknown_attribute(&self, attribute: &str) -> SchemaError {
        let mut candidates: Vec<&str> = self.attributes.keys().map(String::as_str).collect();
        candidates.extend(STRUCTURAL_ATTRIBUTES.iter().map(|s| *s));
        SchemaError::UnknownAttribute {
            entity: self.name.clone(),
            attribute: attribute.to_string(),
            suggestion: closest_match(attribute, candidates),
        }
    }

    fn bad_declaration(&self, reason: String) -> SchemaError {
        SchemaError::InvalidDeclaration {
            name: self.name.clone(),
            reason,
        }
    }
}

/// A validated instance of an entity type.
///
/// Only attributes its type declares (plus `name` and `identity`) can be
/// written, and every write is validated.
#[derive(Debug, Clone)]
pub struct Entity {
    entity_type: Arc<EntityType>,
    attributes: AttributeMap,
}

impl Entity {
    pub(crate) fn new(entity_type: Arc<EntityType>, attributes: AttributeMap) -> Self {
        Self {
            entity_type,
            attributes,
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Qualified type name
    pub fn type_name(&self) -> &str {
        &self.entity_type.long_name
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn into_attributes(self) -> AttributeMap {
        self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    pub fn identity(&self) -> Option<&str> {
        self.get("identity").and_then(Value::as_str)
    }

    /// Set an attribute, rejecting names the type does not declare
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if name == "type" {
            return Err(SchemaError::invalid(
                format!("'type' of '{}'", self.entity_type.name),
                &value,
                "the entity type cannot be changed",
            ));
        }
        if !self.entity_type.accepts(name) {
            return Err(self.entity_type.unknown_attribute(name));
        }
        let value = match self.entity_type.attribute(name) {
            Some(attr) => attr.validate(&value).map_err(|e| e.in_entity(&self.entity_type.name))?,
            None => Value::String(value.to_string()),
        };
        self.attributes.insert(name.to_string(), value);
        Ok(())
    }
}

impl std::ops::Index<&str> for Entity {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        &self.attributes[name]
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.attributes.serialize(serializer)
    }
}
