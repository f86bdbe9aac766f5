//! End-to-end tests: configuration files through parsing, rewrites and
//! validation against the router schema.

use router_schema::{
    ConfigDocument, Entity, Pipeline, RecordingSink, Schema, Settings, ValidationKind, Value,
};

fn schema() -> Schema {
    Schema::from_json(include_str!("fixtures/qdrouterd.json")).unwrap()
}

fn pipeline(settings: Settings) -> Pipeline<RecordingSink> {
    Pipeline::with_sink(schema(), settings, RecordingSink::new())
}

fn of_type<'a>(entities: &'a [Entity], short_name: &str) -> Vec<&'a Entity> {
    let long_name = format!("router.config.{}", short_name);
    entities.iter().filter(|e| e.type_name() == long_name).collect()
}

// =============================================================================
// Current configuration format
// =============================================================================

#[test]
fn test_modern_config_validates() {
    let pipeline = pipeline(Settings::default());
    let entities = pipeline.run(include_str!("fixtures/modern.conf")).unwrap();

    assert_eq!(entities.len(), 8);

    let router = of_type(&entities, "router")[0];
    assert_eq!(router["id"], Value::from("Router.A"));
    assert_eq!(router["mode"].as_str(), Some("interior"));
    assert_eq!(router["workerThreads"], Value::Integer(8));
    assert_eq!(router["saslConfigName"], Value::from("qdrouterd"));
    assert_eq!(router.name(), Some("router/0"));

    let listeners = of_type(&entities, "listener");
    assert_eq!(listeners.len(), 3);
    assert_eq!(listeners[0].name(), Some("amqp-public"));
    assert_eq!(listeners[0]["port"], Value::from("5672"));
    assert_eq!(listeners[0]["authenticatePeer"], Value::Bool(false));
    assert_eq!(listeners[1].name(), Some("listener/1"));
    assert_eq!(listeners[1]["requireEncryption"], Value::Bool(true));
    assert_eq!(listeners[1]["certFile"], Value::from("/etc/pki/router.pem"));
    assert_eq!(listeners[1]["password"], Value::from("s3cret phrase"));
    assert_eq!(listeners[2]["role"].as_str(), Some("inter-router"));

    let address = of_type(&entities, "address")[0];
    assert_eq!(address["pattern"], Value::from("queue.#.events"));

    // Nothing in the file is deprecated, and a router is present
    assert!(pipeline.sink().warnings().is_empty());
}

#[test]
fn test_profiles_do_not_become_entities() {
    let entities = pipeline(Settings::default())
        .run(include_str!("fixtures/modern.conf"))
        .unwrap();
    assert!(entities.iter().all(|e| !e.type_name().ends_with("sslProfile")));
}

#[test]
fn test_document_lookup_by_type() {
    let doc = ConfigDocument::load(include_str!("fixtures/modern.conf")).unwrap();
    let names: Vec<_> = doc.by_type("listener").filter_map(|s| s.get_str("name")).collect();
    assert_eq!(names, vec!["amqp-public", "listener/1", "listener/2"]);
    assert_eq!(doc.by_type("sslProfile").count(), 0);
}

// =============================================================================
// Legacy configuration format
// =============================================================================

#[test]
fn test_legacy_config_is_rewritten() {
    let pipeline = pipeline(Settings::default());
    let entities = pipeline.run(include_str!("fixtures/legacy.conf")).unwrap();

    let types: Vec<_> = entities
        .iter()
        .map(|e| pipeline.schema().short_name(e.type_name()))
        .collect();
    assert_eq!(
        types,
        vec!["router", "listener", "connector", "address", "address", "address", "linkRoute", "linkRoute"]
    );

    let router = entities[0].attributes();
    assert_eq!(router["id"], Value::from("Router.Legacy"));
    assert_eq!(router["workerThreads"], Value::Integer(2));
    assert_eq!(router["saslConfigPath"], Value::from("/etc/sasl2"));

    let listener = &entities[1];
    assert_eq!(listener["host"], Value::from("0.0.0.0"));
    assert_eq!(listener["authenticatePeer"], Value::Bool(true));

    assert_eq!(entities[2]["host"], Value::from("broker.example.com"));

    let distributions: Vec<_> = of_type(&entities, "address")
        .iter()
        .map(|a| a["distribution"].to_string())
        .collect();
    assert_eq!(distributions, vec!["closest", "balanced", "closest"]);

    let address_names: Vec<_> = of_type(&entities, "address").iter().filter_map(|a| a.name()).collect();
    assert_eq!(
        address_names,
        vec!["router.config.address/0", "router.config.address/1", "router.config.address/2"]
    );

    let routes = of_type(&entities, "linkRoute");
    assert_eq!(routes[0]["dir"].as_str(), Some("in"));
    assert_eq!(routes[1]["dir"].as_str(), Some("out"));
    assert_eq!(routes[1]["connection"], Value::from("broker"));
    assert_eq!(routes[1]["prefix"], Value::from("broker."));
}

#[test]
fn test_legacy_config_warns_per_rewrite() {
    let pipeline = pipeline(Settings::default());
    pipeline.run(include_str!("fixtures/legacy.conf")).unwrap();

    let warnings = pipeline.sink().warnings();
    assert_eq!(warnings.len(), 10);
    assert!(warnings.contains(
        &"'container' configuration is deprecated, switch to using 'router' instead.".to_string()
    ));
    assert!(warnings.contains(&"'routerId' attribute of 'router' is deprecated. Use 'id' instead".to_string()));
    assert_eq!(
        warnings
            .iter()
            .filter(|w| w.starts_with("'fixedAddress' configuration is deprecated"))
            .count(),
        3
    );
}

#[test]
fn test_fixed_fanout_lookup_yields_multicast() {
    let mut settings = Settings::default();
    settings.deprecation.fix_fanout_lookup = true;
    let entities = pipeline(settings)
        .run(include_str!("fixtures/legacy.conf"))
        .unwrap();

    let distributions: Vec<_> = of_type(&entities, "address")
        .iter()
        .map(|a| a["distribution"].to_string())
        .collect();
    assert_eq!(distributions, vec!["closest", "balanced", "multicast"]);
}

#[test]
fn test_legacy_config_rejected_without_rewrites() {
    let mut settings = Settings::default();
    settings.deprecation.enabled = false;
    let err = pipeline(settings)
        .run(include_str!("fixtures/legacy.conf"))
        .unwrap_err();
    assert_eq!(err.kind(), ValidationKind::UnknownEntityType);
}

// =============================================================================
// Values reach entities as written
// =============================================================================

#[test]
fn test_numeric_looking_strings_kept_verbatim() {
    let text = "listener {\n name: 007\n port: 05672\n password: 0123\n}\n";
    let entities = pipeline(Settings::default()).run(text).unwrap();

    assert_eq!(entities[0].name(), Some("007"));
    assert_eq!(entities[0]["port"], Value::from("05672"));
    assert_eq!(entities[0]["password"], Value::from("0123"));
}

#[test]
fn test_numeric_text_coerced_for_integer_attributes() {
    let text = "connector {\n port: 5672\n cost: 007\n}\nrouter {\n worker-threads: +4\n}\n";
    let entities = pipeline(Settings::default()).run(text).unwrap();

    assert_eq!(entities[0]["port"], Value::from("5672"));
    assert_eq!(entities[0]["cost"], Value::Integer(7));
    assert_eq!(entities[1]["workerThreads"], Value::Integer(4));
}

#[test]
fn test_boolean_words_on_string_and_boolean_attributes() {
    let text = "listener {\n port: 1\n sasl-mechanisms: true\n authenticate-peer: on\n}\n\
                listener {\n port: 2\n sasl-mechanisms: on\n authenticate-peer: true\n}\n";
    let entities = pipeline(Settings::default()).run(text).unwrap();

    assert_eq!(entities[0]["saslMechanisms"], Value::from("true"));
    assert_eq!(entities[0]["authenticatePeer"], Value::Bool(true));
    assert_eq!(entities[1]["saslMechanisms"], Value::from("on"));
    assert_eq!(entities[1]["authenticatePeer"], Value::Bool(true));
}

#[test]
fn test_boolean_attribute_rejects_other_words() {
    let text = "listener {\n port: 1\n authenticate-peer: yes\n}\n";
    let err = pipeline(Settings::default()).run(text).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::InvalidValue);
}

#[test]
fn test_quoted_values_reach_string_attributes() {
    let text = "listener {\n port: \"0005\"\n cert-file: '/etc/my certs/r.pem'\n sasl-mechanisms: \"false\"\n}\n";
    let entities = pipeline(Settings::default()).run(text).unwrap();
    assert_eq!(entities[0]["port"], Value::from("0005"));
    assert_eq!(entities[0]["certFile"], Value::from("/etc/my certs/r.pem"));
    assert_eq!(entities[0]["saslMechanisms"], Value::from("false"));
}

#[test]
fn test_type_attribute_cannot_retype_section() {
    let text = "router {\n mode: edge\n}\nlistener {\n type: connector\n port: 5672\n}\n";
    let err = pipeline(Settings::default()).run(text).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::InvalidValue);
    assert!(err.to_string().contains("listener"));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_duplicate_listener_port_rejected() {
    let text = "listener {\n port: 5672\n}\nlistener {\n port: 5672\n}\n";
    let err = pipeline(Settings::default()).run(text).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::DuplicateUnique);
}

#[test]
fn test_second_router_rejected() {
    let text = "router {\n mode: edge\n}\nrouter {\n mode: edge\n}\n";
    let err = pipeline(Settings::default()).run(text).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::DuplicateSingleton);
}

#[test]
fn test_misspelled_attribute_suggests_fix() {
    let text = "router {\n mode: interior\n}\nconnector {\n port: 5672\n rol: normal\n}\n";
    let err = pipeline(Settings::default()).run(text).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::UnknownAttribute);
    assert!(err.to_string().contains("role"));
}

#[test]
fn test_missing_required_attribute() {
    let err = pipeline(Settings::default())
        .run("connector {\n host: example.com\n}\n")
        .unwrap_err();
    assert_eq!(err.kind(), ValidationKind::MissingRequired);
    assert!(err.to_string().contains("port"));
}

#[test]
fn test_bad_enum_value() {
    let err = pipeline(Settings::default())
        .run("router {\n mode: chaotic\n}\n")
        .unwrap_err();
    assert_eq!(err.kind(), ValidationKind::InvalidValue);
}

// =============================================================================
// Schema loading
// =============================================================================

#[test]
fn test_schema_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.json");
    std::fs::write(&path, include_str!("fixtures/qdrouterd.json")).unwrap();

    let schema = Schema::load(&path).unwrap();
    assert_eq!(schema.prefix(), "router.config");
    assert!(schema.entity_type("listener").is_some());
    assert!(schema.entity_type("router.config.autoLink").is_some());
    assert!(schema.entity_type("router").unwrap().singleton);
}

#[test]
fn test_schema_dump_lists_entity_types() {
    let dump = schema().dump().unwrap();
    let types = dump["entityTypes"].as_object().unwrap();
    assert_eq!(types.len(), 7);
    assert_eq!(dump["prefix"], "router.config");
    assert_eq!(types["listener"]["attributes"]["role"]["default"], "normal");
}
