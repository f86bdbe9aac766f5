//! Configuration text parser
//!
//! Reads the router's brace-delimited configuration format:
//!
//! ```text
//! # Line comment
//! router {
//!     mode: standalone            # End of line comment
//! }
//! ssl-profile {
//!     name: test-profile
//!     password: secret
//! }
//! listener {
//!     sasl-mechanisms: ANONYMOUS
//!     ssl-profile: test-profile
//! }
//! ```
//!
//! Loading runs three passes over the section list:
//! 1. **parse**: text to ordered sections, keys normalised to camelCase
//! 2. **expand**: profile references inlined into the referring section
//! 3. **default ids**: `name`/`identity` filled in where missing

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::config::ParserConfig;
use crate::error::{Result, SchemaError};
use crate::section::Section;
use crate::value::{AttributeMap, Value};

/// Attribute whose value may contain `#`
const PATTERN_KEY: &str = "pattern";

/// Parser for configuration text
pub struct ConfigParser {
    begin: Regex,
    attribute: Regex,
    profile_type: String,
    profile_reference: String,
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self::new(&ParserConfig::default())
    }
}

impl ConfigParser {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            begin: Regex::new(r"^([\w-]+)[ \t]*\{[ \t]*$").unwrap(),
            attribute: Regex::new(r"^([\w-]+)[ \t]*:[ \t]*(.*)$").unwrap(),
            profile_type: camel_case(&config.profile_type),
            profile_reference: camel_case(&config.profile_reference),
        }
    }

    /// Turn configuration lines into an ordered section list
    pub fn parse<I, S>(&self, lines: I) -> Result<Vec<Section>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sections = Vec::new();
        let mut open: Option<(Section, usize)> = None;
        let mut last_line = 0;

        for (index, raw_line) in lines.into_iter().enumerate() {
            let line_no = index + 1;
            last_line = line_no;
            let line = self.strip_comment(raw_line.as_ref());
            if line.is_empty() {
                continue;
            }

            if let Some(caps) = self.begin.captures(line) {
                if let Some((current, start)) = &open {
                    return Err(parse_error(
                        line_no,
                        format!(
                            "section '{}' opened before '{}' (line {}) was closed",
                            &caps[1], current.type_name, start
                        ),
                    ));
                }
                let type_name = camel_case(&caps[1]);
                open = Some((Section::new(type_name, AttributeMap::new()), line_no));
            } else if line == "}" {
                match open.take() {
                    Some((section, _)) => sections.push(section),
                    None => return Err(parse_error(line_no, "'}' without an open section")),
                }
            } else if let Some(caps) = self.attribute.captures(line) {
                let Some((section, _)) = open.as_mut() else {
                    return Err(parse_error(
                        line_no,
                        format!("attribute '{}' outside of a section", &caps[1]),
                    ));
                };
                let key = camel_case(&caps[1]);
                section.set(key, scalar(caps[2].trim()));
            } else {
                return Err(parse_error(line_no, format!("unrecognised line '{}'", line)));
            }
        }

        if let Some((section, start)) = open {
            return Err(parse_error(
                last_line.max(start),
                format!("section '{}' opened at line {} is never closed", section.type_name, start),
            ));
        }

        debug!(sections = sections.len(), "Parsed configuration text");
        Ok(sections)
    }

    fn strip_comment<'a>(&self, line: &'a str) -> &'a str {
        let line = line.trim();
        if line.starts_with('#') {
            return "";
        }
        let is_pattern = line
            .split(':')
            .next()
            .map(|key| key.trim().eq_ignore_ascii_case(PATTERN_KEY))
            .unwrap_or(false);
        if is_pattern {
            return line;
        }
        match line.find('#') {
            Some(pos) => line[..pos].trim(),
            None => line,
        }
    }

    /// Inline referenced profiles into the sections naming them and drop
    /// the standalone profile sections.
    pub fn expand(&self, sections: Vec<Section>) -> Result<Vec<Section>> {
        let (profiles, mut sections): (Vec<Section>, Vec<Section>) = sections
            .into_iter()
            .partition(|s| s.type_name == self.profile_type);

        let by_name: HashMap<String, &Section> = profiles
            .iter()
            .filter_map(|p| p.get("name").map(|name| (name.to_string(), p)))
            .collect();

        for section in &mut sections {
            let Some(reference) = section.remove(&self.profile_reference) else {
                continue;
            };
            let profile_name = reference.to_string();
            let profile = by_name.get(&profile_name).ok_or_else(|| SchemaError::UnknownProfile {
                section: section.type_name.clone(),
                profile_type: self.profile_type.clone(),
                profile: profile_name.clone(),
            })?;
            for (key, value) in &profile.attributes {
                if matches!(key.as_str(), "name" | "identity" | "type") || section.contains(key) {
                    continue;
                }
                section.set(key.clone(), value.clone());
            }
            debug!(section = %section.type_name, profile = %profile_name, "Expanded profile reference");
        }

        Ok(sections)
    }

    /// Fill in `name` and `identity` where missing.
    ///
    /// A section without a name takes its identity, or else
    /// `<type>/<n>` where `n` counts earlier sections of the same type.
    /// An identity defaults to the name. Explicit values are left alone.
    pub fn default_ids(sections: Vec<Section>) -> Vec<Section> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        sections
            .into_iter()
            .map(|mut section| {
                let ordinal = counts.entry(section.type_name.clone()).or_insert(0);
                if !section.contains("name") {
                    let name = match section.get("identity") {
                        Some(identity) => identity.clone(),
                        None => Value::String(format!("{}/{}", section.type_name, ordinal)),
                    };
                    section.set("name", name);
                }
                if !section.contains("identity") {
                    if let Some(name) = section.get("name").cloned() {
                        section.set("identity", name);
                    }
                }
                *ordinal += 1;
                section
            })
            .collect()
    }

    /// Parse, expand and assign default ids
    pub fn load<I, S>(&self, lines: I) -> Result<ConfigDocument>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sections = self.parse(lines)?;
        let sections = self.expand(sections)?;
        Ok(ConfigDocument {
            sections: Self::default_ids(sections),
        })
    }
}

/// A loaded configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    sections: Vec<Section>,
}

impl ConfigDocument {
    /// Load configuration text with the default parser settings
    pub fn load(text: &str) -> Result<Self> {
        ConfigParser::default().load(text.lines())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn into_sections(self) -> Vec<Section> {
        self.sections
    }

    /// Sections of one type, in document order. The iterator can be
    /// cloned to walk the same sections again.
    pub fn by_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Section> + Clone + 'a {
        self.sections.iter().filter(move |s| s.type_name == type_name)
    }
}

impl From<Vec<Section>> for ConfigDocument {
    fn from(sections: Vec<Section>) -> Self {
        Self { sections }
    }
}

/// Dash-separated spelling to camelCase; camelCase passes unchanged
pub fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(&next) if c == '-' && (next.is_alphanumeric() || next == '_') => {
                out.extend(next.to_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Attribute text as a value. Only the bare words `true` and `false` are
/// inferred; everything else stays text exactly as written, so numeric
/// spellings like `0123` survive to string attributes. Integer attributes
/// parse the text themselves.
fn scalar(text: &str) -> Value {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return Value::String(text[1..text.len() - 1].to_string());
        }
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> SchemaError {
    SchemaError::Parse {
        line,
        message: message.into(),
    }
}
