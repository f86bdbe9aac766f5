//! Router Configuration Schema
//!
//! Schema-driven validation of router configuration files. A schema
//! declares entity types and their typed attributes; configuration text is
//! parsed into sections, legacy constructs are rewritten to their current
//! form, and the result is validated into entities.
//!
//! ## Features
//!
//! - **Typed attributes**: boolean, integer, string and enumerated values
//!   with defaults, fixed values, required and unique flags
//! - **Model constraints**: singleton entity types and unique attributes
//!   checked across the whole configuration
//! - **Legacy rewrites**: deprecated entities and attributes are migrated
//!   with a warning instead of rejected
//! - **Profiles**: `sslProfile` sections inlined into the sections that
//!   reference them
//!
//! ## Architecture
//!
//! ```text
//! config text
//!   │
//!   ├── parser        sections, profiles expanded, default ids
//!   ├── deprecation   legacy entities and attributes rewritten
//!   └── schema        entity types validate each section, then the model
//!         └── entity ── types ── value
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use router_schema::{Pipeline, Schema, Settings};
//!
//! let schema = Schema::load("qdrouterd.json")?;
//! let pipeline = Pipeline::new(schema, Settings::load()?);
//! for entity in pipeline.run("router {\n mode: standalone\n}\n")? {
//!     println!("{} {:?}", entity.type_name(), entity.name());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod deprecation;
pub mod entity;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod section;
pub mod sink;
pub mod types;
pub mod value;

pub use config::Settings;
pub use deprecation::{DeprecatedEntity, DeprecationHandler};
pub use entity::{Entity, EntityType};
pub use error::{Result, SchemaError, ValidationKind};
pub use parser::{ConfigDocument, ConfigParser};
pub use pipeline::Pipeline;
pub use schema::{Schema, SchemaSource};
pub use section::Section;
pub use sink::{LogSink, RecordingSink, Severity, TracingSink};
pub use types::{AttributeKind, AttributeOptions, AttributeType, EnumType};
pub use value::{AttributeMap, EnumValue, Value};
