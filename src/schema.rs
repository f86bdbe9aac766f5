//! Schema: the full set of entity types for one configuration domain
//!
//! A schema is built from a static JSON declaration:
//!
//! ```json
//! {
//!   "prefix": "org.example",
//!   "entityTypes": {
//!     "listener": {
//!       "attributes": {
//!         "name": {"type": "string", "required": true, "unique": true},
//!         "host": {"type": "string", "default": "0.0.0.0"},
//!         "role": {"type": ["normal", "inter-router"], "default": "normal"}
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{Entity, EntityType};
use crate::error::{closest_match, Result, SchemaError};
use crate::section::Section;
use crate::types::{AttributeKind, AttributeOptions, AttributeType, EnumType};
use crate::value::{AttributeMap, Value};

/// Declared kind of an attribute: a scalar name or a list of enum labels
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KindDecl {
    Named(String),
    Labels(Vec<String>),
}

/// Declaration of one attribute
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeDecl {
    #[serde(rename = "type")]
    pub kind: KindDecl,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Declaration of one entity type
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityTypeDecl {
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub singleton: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeDecl>,
}

/// The schema source document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSource {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub entity_types: IndexMap<String, EntityTypeDecl>,
}

/// Registry of entity types, keyed by qualified name
#[derive(Debug, Clone, Default)]
pub struct Schema {
    prefix: String,
    description: Option<String>,
    entity_types: IndexMap<String, Arc<EntityType>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SchemaDump<'a> {
    prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    entity_types: IndexMap<&'a str, &'a EntityType>,
}

impl Schema {
    /// An empty schema
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            description: None,
            entity_types: IndexMap::new(),
        }
    }

    /// Build a schema from its declaration
    pub fn from_source(source: SchemaSource) -> Result<Self> {
        let mut schema = Self::new(source.prefix);
        schema.description = source.description;

        for (name, decl) in source.entity_types {
            let mut attributes = Vec::with_capacity(decl.attributes.len());
            for (attr_name, attr) in decl.attributes {
                let kind = match attr.kind {
                    KindDecl::Labels(labels) => AttributeKind::Enum(EnumType::new(labels)),
                    KindDecl::Named(kind_name) => AttributeKind::from_name(&kind_name).ok_or_else(|| {
                        SchemaError::InvalidDeclaration {
                            name: format!("{}.{}", name, attr_name),
                            reason: format!("unknown attribute type '{}'", kind_name),
                        }
                    })?,
                };
                let options = AttributeOptions {
                    default: attr.default,
                    value: attr.value,
                    required: attr.required,
                    unique: attr.unique,
                    deprecated: attr.deprecated,
                    description: attr.description,
                };
                let attribute = AttributeType::new(attr_name.clone(), kind, options).map_err(|e| {
                    SchemaError::InvalidDeclaration {
                        name: format!("{}.{}", name, attr_name),
                        reason: e.to_string(),
                    }
                })?;
                attributes.push(attribute);
            }

            let mut entity_type = EntityType::new(name, &schema.prefix, attributes)
                .deprecated(decl.deprecated)
                .singleton(decl.singleton);
            entity_type.description = decl.description;
            schema.add_entity_type(entity_type)?;
        }

        debug!(prefix = %schema.prefix, entity_types = schema.entity_types.len(), "Schema built");
        Ok(schema)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let source: SchemaSource = serde_json::from_str(json)?;
        Self::from_source(source)
    }

    pub fn from_json_value(json: serde_json::Value) -> Result<Self> {
        let source: SchemaSource = serde_json::from_value(json)?;
        Self::from_source(source)
    }

    /// Load a schema declaration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Register an entity type, running its one-time init
    pub fn add_entity_type(&mut self, mut entity_type: EntityType) -> Result<()> {
        entity_type.init()?;
        if self.entity_types.contains_key(&entity_type.long_name) {
            return Err(SchemaError::InvalidDeclaration {
                name: entity_type.name.clone(),
                reason: "entity type declared twice".to_string(),
            });
        }
        self.entity_types
            .insert(entity_type.long_name.clone(), Arc::new(entity_type));
        Ok(())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Qualify a type name with the schema prefix
    pub fn long_name(&self, name: &str) -> String {
        if self.prefix.is_empty() || name.starts_with(&format!("{}.", self.prefix)) {
            name.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }

    /// Strip the schema prefix from a type name
    pub fn short_name<'a>(&self, name: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            return name;
        }
        name.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(name)
    }

    /// Look up an entity type by short or qualified name
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_type_arc(name).map(|e| e.as_ref())
    }

    fn entity_type_arc(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.entity_types
            .get(name)
            .or_else(|| self.entity_types.get(&self.long_name(name)))
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.values().map(|e| e.as_ref())
    }

    /// Validate one raw attribute map, which names its own `type`
    pub fn entity(&self, raw: &AttributeMap) -> Result<Entity> {
        let type_name = match raw.get("type") {
            Some(value) => value.as_str().ok_or_else(|| {
                SchemaError::invalid("'type'", value, "entity type must be a string")
            })?,
            None => {
                return Err(SchemaError::MissingRequired {
                    entity: "entity".to_string(),
                    attribute: "type".to_string(),
                })
            }
        };

        let entity_type = self
            .entity_type_arc(type_name)
            .ok_or_else(|| self.unknown_entity_type(type_name))?;
        let attributes = entity_type.validate(raw)?;
        Ok(Entity::new(Arc::clone(entity_type), attributes))
    }

    /// Validate a whole model.
    ///
    /// Every instance is validated first, then uniqueness and singleton
    /// constraints are checked in input order. The first failure aborts
    /// the whole call; on success the entities come back in input order.
    pub fn validate_all(&self, model: &[AttributeMap]) -> Result<Vec<Entity>> {
        let entities = model
            .iter()
            .map(|raw| self.entity(raw))
            .collect::<Result<Vec<_>>>()?;

        check_model_constraints(&entities)?;
        debug!(entities = entities.len(), "Model validated");
        Ok(entities)
    }

    /// Validate parsed sections as a model.
    ///
    /// A section may repeat its own type as a `type` attribute, short or
    /// qualified; naming any other type is an error.
    pub fn validate_sections(&self, sections: &[Section]) -> Result<Vec<Entity>> {
        for section in sections {
            let Some(declared) = section.get("type") else {
                continue;
            };
            let same = declared
                .as_str()
                .map(|t| self.long_name(t) == self.long_name(&section.type_name))
                .unwrap_or(false);
            if !same {
                return Err(SchemaError::invalid(
                    format!("'type' of section '{}'", section.type_name),
                    declared,
                    "conflicts with the section type",
                ));
            }
        }
        let model: Vec<AttributeMap> = sections.iter().map(Section::to_raw).collect();
        self.validate_all(&model)
    }

    /// Serialise the declarations back to JSON
    pub fn dump(&self) -> Result<serde_json::Value> {
        let dump = SchemaDump {
            prefix: &self.prefix,
            description: self.description.as_deref(),
            entity_types: self
                .entity_types
                .values()
                .map(|e| (e.name.as_str(), e.as_ref()))
                .collect(),
        };
        Ok(serde_json::to_value(dump)?)
    }

    fn unknown_entity_type(&self, name: &str) -> SchemaError {
        let candidates: Vec<&str> = self.entity_types.values().map(|e| e.name.as_str()).collect();
        SchemaError::UnknownEntityType {
            name: name.to_string(),
            suggestion: closest_match(self.short_name(name), candidates),
        }
    }
}

/// Uniqueness and singleton checks across a validated model, in order
fn check_model_constraints(entities: &[Entity]) -> Result<()> {
    let mut instances: HashMap<&str, usize> = HashMap::new();
    let mut seen: HashMap<(&str, &str), HashSet<String>> = HashMap::new();

    for entity in entities {
        let entity_type = entity.entity_type();

        let count = instances.entry(entity_type.long_name.as_str()).or_insert(0);
        *count += 1;
        if entity_type.singleton && *count > 1 {
            return Err(SchemaError::DuplicateSingleton {
                entity: entity_type.name.clone(),
                count: *count,
            });
        }

        for (attr_name, attr) in &entity_type.attributes {
            if !attr.unique {
                continue;
            }
            let Some(value) = entity.get(attr_name) else {
                continue;
            };
            let values = seen
                .entry((entity_type.long_name.as_str(), attr_name.as_str()))
                .or_default();
            if !values.insert(value.unique_key()) {
                return Err(SchemaError::DuplicateUnique {
                    entity: entity_type.name.clone(),
                    attribute: attr_name.clone(),
                    value: value.to_string(),
                });
            }
        }
    }

    Ok(())
}
