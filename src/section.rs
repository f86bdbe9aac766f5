//! Sections: the shared data model of parser, rewriter and validator

use serde::{Deserialize, Serialize};

use crate::value::{AttributeMap, Value};

/// One `(type-name, attributes)` pair of a configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub type_name: String,
    pub attributes: AttributeMap,
}

impl Section {
    pub fn new(type_name: impl Into<String>, attributes: AttributeMap) -> Self {
        Self {
            type_name: type_name.into(),
            attributes,
        }
    }

    /// Build a section from literal pairs
    pub fn with<I, K, V>(type_name: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new(
            type_name,
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        )
    }

    pub fn is(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Text of an attribute, if it is set to a string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Remove an attribute, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.shift_remove(name)
    }

    /// Attribute map carrying this section's type, as the schema expects it.
    /// The section type always wins over a `type` attribute.
    pub fn to_raw(&self) -> AttributeMap {
        let mut raw = self.attributes.clone();
        raw.insert("type".to_string(), Value::String(self.type_name.clone()));
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_raw_adds_type() {
        let section = Section::with("listener", [("port", Value::Integer(5672))]);
        let raw = section.to_raw();
        assert_eq!(raw.get("type"), Some(&Value::from("listener")));
        assert_eq!(raw.get("port"), Some(&Value::Integer(5672)));
        assert!(!section.contains("type"));
    }

    #[test]
    fn test_to_raw_section_type_wins() {
        let section = Section::with("listener", [("type", "connector"), ("port", "5672")]);
        let raw = section.to_raw();
        assert_eq!(raw.get("type"), Some(&Value::from("listener")));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut section = Section::with("router", [("a", "1"), ("b", "2"), ("c", "3")]);
        section.remove("b");
        let keys: Vec<_> = section.attributes.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }
}
