//! Error types for the configuration schema engine

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Coarse classification of a failure, stable enough to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    InvalidValue,
    MissingRequired,
    UnknownAttribute,
    UnknownEntityType,
    DuplicateUnique,
    DuplicateSingleton,
    InvalidDeclaration,
    /// Structural failure reading configuration text
    Syntax,
    /// I/O, JSON or settings failure outside validation proper
    Environment,
}

/// Schema engine errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid value '{value}' for {target}: {reason}")]
    InvalidValue {
        target: String,
        value: String,
        reason: String,
    },

    #[error("Missing required attribute '{attribute}' of '{entity}'")]
    MissingRequired { entity: String, attribute: String },

    #[error("Unknown attribute '{attribute}' for entity '{entity}'{}", suggestion_suffix(.suggestion))]
    UnknownAttribute {
        entity: String,
        attribute: String,
        suggestion: Option<String>,
    },

    #[error("Unknown entity type '{name}'{}", suggestion_suffix(.suggestion))]
    UnknownEntityType {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Duplicate value '{value}' for unique attribute '{attribute}' of '{entity}'")]
    DuplicateUnique {
        entity: String,
        attribute: String,
        value: String,
    },

    #[error("Found {count} instances of singleton entity '{entity}'")]
    DuplicateSingleton { entity: String, count: usize },

    #[error("Invalid declaration of '{name}': {reason}")]
    InvalidDeclaration { name: String, reason: String },

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Section '{section}' references unknown {profile_type} '{profile}'")]
    UnknownProfile {
        section: String,
        profile_type: String,
        profile: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config_crate::ConfigError),
}

impl SchemaError {
    /// Classify this error
    pub fn kind(&self) -> ValidationKind {
        match self {
            SchemaError::InvalidValue { .. } => ValidationKind::InvalidValue,
            SchemaError::MissingRequired { .. } => ValidationKind::MissingRequired,
            SchemaError::UnknownAttribute { .. } => ValidationKind::UnknownAttribute,
            SchemaError::UnknownEntityType { .. } => ValidationKind::UnknownEntityType,
            SchemaError::DuplicateUnique { .. } => ValidationKind::DuplicateUnique,
            SchemaError::DuplicateSingleton { .. } => ValidationKind::DuplicateSingleton,
            SchemaError::InvalidDeclaration { .. } => ValidationKind::InvalidDeclaration,
            SchemaError::Parse { .. } | SchemaError::UnknownProfile { .. } => ValidationKind::Syntax,
            SchemaError::Io(_) | SchemaError::Json(_) | SchemaError::Settings(_) => {
                ValidationKind::Environment
            }
        }
    }

    /// Build an invalid-value error
    pub(crate) fn invalid(target: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> Self {
        SchemaError::InvalidValue {
            target: target.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Prefix the target of value-level errors with the owning entity name.
    pub(crate) fn in_entity(self, entity: &str) -> Self {
        match self {
            SchemaError::InvalidValue { target, value, reason } => SchemaError::InvalidValue {
                target: format!("'{}' of '{}'", target, entity),
                value,
                reason,
            },
            SchemaError::MissingRequired { attribute, .. } => SchemaError::MissingRequired {
                entity: entity.to_string(),
                attribute,
            },
            other => other,
        }
    }
}

/// Best fuzzy match for a mistyped name among the known ones
pub(crate) fn closest_match<'a, I>(query: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    use fuzzy_matcher::skim::SkimMatcherV2;
    use fuzzy_matcher::FuzzyMatcher;

    let matcher = SkimMatcherV2::default();
    candidates
        .into_iter()
        .filter_map(|c| matcher.fuzzy_match(c, query).map(|score| (score, c)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, c)| c.to_string())
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_in_message() {
        let err = SchemaError::UnknownEntityType {
            name: "listner".to_string(),
            suggestion: Some("listener".to_string()),
        };
        assert_eq!(err.kind(), ValidationKind::UnknownEntityType);
        assert!(err.to_string().contains("did you mean 'listener'"));
    }

    #[test]
    fn test_closest_match() {
        let names = ["listener", "connector", "router"];
        assert_eq!(closest_match("listner", names), Some("listener".to_string()));
        assert_eq!(closest_match("zzz", names), None);
    }

    #[test]
    fn test_in_entity_names_owner() {
        let err = SchemaError::invalid("port", "x", "not an integer").in_entity("listener");
        assert!(err.to_string().contains("'port' of 'listener'"));
    }
}
