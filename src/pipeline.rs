//! Configuration pipeline: text in, validated entities out
//!
//! ```text
//! text ──parse──▶ sections ──expand──▶ ──default ids──▶ ──deprecation──▶ ──default ids──▶ validate_all ──▶ entities
//! ```

use tracing::{debug, info};

use crate::config::Settings;
use crate::deprecation::DeprecationHandler;
use crate::entity::Entity;
use crate::error::Result;
use crate::parser::ConfigParser;
use crate::schema::Schema;
use crate::section::Section;
use crate::sink::{LogSink, TracingSink};

/// Runs configuration text through parsing, rewriting and validation
pub struct Pipeline<S: LogSink = TracingSink> {
    schema: Schema,
    settings: Settings,
    parser: ConfigParser,
    sink: S,
}

impl Pipeline<TracingSink> {
    pub fn new(schema: Schema, settings: Settings) -> Self {
        Self::with_sink(schema, settings, TracingSink)
    }
}

impl<S: LogSink> Pipeline<S> {
    /// Pipeline reporting rewrites to `sink`
    pub fn with_sink(schema: Schema, settings: Settings, sink: S) -> Self {
        let parser = ConfigParser::new(&settings.parser);
        Self {
            schema,
            settings,
            parser,
            sink,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Parsed and rewritten sections, before validation
    pub fn sections(&self, text: &str) -> Result<Vec<Section>> {
        let document = self.parser.load(text.lines())?;
        let sections = document.into_sections();

        if !self.settings.deprecation.enabled {
            debug!("Deprecation rewrites disabled");
            return Ok(sections);
        }

        let sections = DeprecationHandler::new(sections, &self.sink)
            .fix_fanout_lookup(self.settings.deprecation.fix_fanout_lookup)
            .process();
        // Sections synthesised by rewrites have no ids yet; explicit ones are kept
        Ok(ConfigParser::default_ids(sections))
    }

    /// Parse, rewrite and validate configuration text
    pub fn run(&self, text: &str) -> Result<Vec<Entity>> {
        let sections = self.sections(text)?;
        let entities = self.schema.validate_sections(&sections)?;
        info!(entities = entities.len(), "Configuration validated");
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationKind;
    use crate::sink::RecordingSink;
    use crate::value::Value;

    const SCHEMA: &str = r#"{
        "prefix": "router.config",
        "entityTypes": {
            "router": {
                "singleton": true,
                "attributes": {
                    "id": {"type": "string"},
                    "mode": {"type": ["standalone", "interior", "edge"], "default": "standalone"},
                    "workerThreads": {"type": "integer", "default": 4}
                }
            },
            "listener": {
                "attributes": {
                    "host": {"type": "string", "default": ""},
                    "port": {"type": "integer", "required": true, "unique": true}
                }
            },
            "address": {
                "attributes": {
                    "prefix": {"type": "string"},
                    "distribution": {"type": ["multicast", "closest", "balanced"], "default": "balanced"}
                }
            }
        }
    }"#;

    fn pipeline(settings: Settings) -> Pipeline<RecordingSink> {
        Pipeline::with_sink(Schema::from_json(SCHEMA).unwrap(), settings, RecordingSink::new())
    }

    #[test]
    fn test_run_modern_config() {
        let text = "router {\n mode: interior\n id: R1\n}\nlistener {\n port: 5672\n}\n";
        let entities = pipeline(Settings::default()).run(text).unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0]["mode"].as_str(), Some("interior"));
        assert_eq!(entities[0]["workerThreads"], Value::Integer(4));
        assert_eq!(entities[0].type_name(), "router.config.router");
        assert_eq!(entities[1].name(), Some("listener/0"));
        assert_eq!(entities[1]["host"], Value::from(""));
    }

    #[test]
    fn test_run_rewrites_legacy_config() {
        let text = "container {\n worker-threads: 8\n}\nrouter {\n router-id: R1\n}\nfixed-address {\n prefix: /queue\n}\n";
        let pipeline = pipeline(Settings::default());
        let entities = pipeline.run(text).unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0]["id"], Value::from("R1"));
        assert_eq!(entities[0]["workerThreads"], Value::Integer(8));
        assert_eq!(entities[1]["prefix"], Value::from("/queue"));
        assert_eq!(entities[1]["distribution"].as_str(), Some("closest"));
        assert_eq!(entities[1].name(), Some("router.config.address/0"));
        assert_eq!(entities[1].identity(), Some("router.config.address/0"));
        assert_eq!(entities[0].name(), Some("router/0"));
        assert_eq!(pipeline.sink.warnings().len(), 3);
    }

    #[test]
    fn test_disabled_deprecation_leaves_sections() {
        let mut settings = Settings::default();
        settings.deprecation.enabled = false;
        let pipeline = pipeline(settings);

        let sections = pipeline.sections("container {\n worker-threads: 8\n}\n").unwrap();
        assert!(sections[0].is("container"));
        assert!(pipeline.sink.warnings().is_empty());

        let err = pipeline.run("container {\n worker-threads: 8\n}\n").unwrap_err();
        assert_eq!(err.kind(), ValidationKind::UnknownEntityType);
    }

    #[test]
    fn test_run_reports_constraint_violation() {
        let text = "listener {\n port: 1\n}\nlistener {\n port: 1\n}\n";
        let err = pipeline(Settings::default()).run(text).unwrap_err();
        assert_eq!(err.kind(), ValidationKind::DuplicateUnique);
    }

    #[test]
    fn test_run_reports_syntax_error() {
        let err = pipeline(Settings::default()).run("router {\n").unwrap_err();
        assert_eq!(err.kind(), ValidationKind::Syntax);
    }
}
