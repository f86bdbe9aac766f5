//! Deprecation rewrites
//!
//! Rewrites a freshly parsed section list so that configurations written
//! against obsolete entity and attribute names keep working:
//!
//! - `container` is merged into `router`
//! - `waypoint` is dropped
//! - `fixedAddress` becomes `router.config.address`
//! - `linkRoutePattern` becomes one or two `router.config.linkRoute`
//! - renamed attributes of `router`, `listener` and `connector` are moved
//!   to their current names
//!
//! Every rewrite is reported to the log sink as a warning. Rewrites never
//! fail; whatever comes out goes on to schema validation.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{closest_match, Result, SchemaError};
use crate::section::Section;
use crate::sink::{LogSink, Severity, TracingSink};
use crate::value::{AttributeMap, Value};

pub const ADDRESS_TYPE: &str = "router.config.address";
pub const LINK_ROUTE_TYPE: &str = "router.config.linkRoute";

/// Container attributes carried over to the router
const CONTAINER_ATTRIBUTES: [&str; 4] = ["workerThreads", "debugDump", "saslConfigPath", "saslConfigName"];

/// Key the fanout of a `fixedAddress` has historically been read from.
/// It never matches a real attribute, so the multicast branch is dead
/// unless `fix_fanout_lookup` is set.
const LEGACY_FANOUT_KEY: &str = "faddr_attrs";
const FANOUT_KEY: &str = "fanout";

/// Obsolete entity kinds, in the order their rewrites run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeprecatedEntity {
    Container,
    Waypoint,
    FixedAddress,
    LinkRoutePattern,
}

impl DeprecatedEntity {
    pub const ALL: [DeprecatedEntity; 4] = [
        DeprecatedEntity::Container,
        DeprecatedEntity::Waypoint,
        DeprecatedEntity::FixedAddress,
        DeprecatedEntity::LinkRoutePattern,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            DeprecatedEntity::Container => "container",
            DeprecatedEntity::Waypoint => "waypoint",
            DeprecatedEntity::FixedAddress => "fixedAddress",
            DeprecatedEntity::LinkRoutePattern => "linkRoutePattern",
        }
    }

    fn handler<S: LogSink>(self) -> fn(&mut DeprecationHandler<S>) {
        match self {
            DeprecatedEntity::Container => DeprecationHandler::handle_container,
            DeprecatedEntity::Waypoint => DeprecationHandler::handle_waypoint,
            DeprecatedEntity::FixedAddress => DeprecationHandler::handle_fixed_address,
            DeprecatedEntity::LinkRoutePattern => DeprecationHandler::handle_link_route_pattern,
        }
    }
}

impl fmt::Display for DeprecatedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl FromStr for DeprecatedEntity {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        DeprecatedEntity::ALL
            .into_iter()
            .find(|e| e.type_name() == s)
            .ok_or_else(|| SchemaError::UnknownEntityType {
                name: s.to_string(),
                suggestion: closest_match(s, DeprecatedEntity::ALL.map(|e| e.type_name())),
            })
    }
}

/// What becomes of a deprecated attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeRewrite {
    /// Moved to a new name, value unchanged
    Rename(&'static str),
    /// No longer used by the router; kept under its own name
    Retired,
}

/// Deprecated attributes per entity kind
pub const DEPRECATED_ATTRIBUTES: &[(&str, &[(&str, AttributeRewrite)])] = &[
    (
        "router",
        &[
            ("routerId", AttributeRewrite::Rename("id")),
            ("mobileAddrMaxAge", AttributeRewrite::Retired),
        ],
    ),
    (
        "listener",
        &[
            ("addr", AttributeRewrite::Rename("host")),
            ("allowNoSasl", AttributeRewrite::Rename("authenticatePeer")),
            ("requirePeerAuth", AttributeRewrite::Rename("authenticatePeer")),
            ("allowUnsecured", AttributeRewrite::Rename("requireEncryption")),
        ],
    ),
    ("connector", &[("addr", AttributeRewrite::Rename("host"))]),
];

fn attribute_rewrites(type_name: &str) -> Option<&'static [(&'static str, AttributeRewrite)]> {
    DEPRECATED_ATTRIBUTES
        .iter()
        .find(|(name, _)| *name == type_name)
        .map(|(_, rewrites)| *rewrites)
}

/// Rewrites deprecated entities and attributes in a section list
pub struct DeprecationHandler<S: LogSink = TracingSink> {
    sections: Vec<Section>,
    sink: S,
    entities: Vec<DeprecatedEntity>,
    fix_fanout_lookup: bool,
}

impl DeprecationHandler<TracingSink> {
    /// Handler reporting through `tracing`
    pub fn with_tracing(sections: Vec<Section>) -> Self {
        Self::new(sections, TracingSink)
    }
}

impl<S: LogSink> DeprecationHandler<S> {
    pub fn new(sections: Vec<Section>, sink: S) -> Self {
        Self {
            sections,
            sink,
            entities: DeprecatedEntity::ALL.to_vec(),
            fix_fanout_lookup: false,
        }
    }

    /// Restrict entity rewrites to the named kinds. Unknown kinds are
    /// rejected here rather than when the rewrites run.
    pub fn with_entity_kinds<I, K>(mut self, kinds: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let requested = kinds
            .into_iter()
            .map(|k| k.as_ref().parse::<DeprecatedEntity>())
            .collect::<Result<HashSet<_>>>()?;
        // Run order stays fixed regardless of how the kinds were listed
        self.entities = DeprecatedEntity::ALL
            .into_iter()
            .filter(|e| requested.contains(e))
            .collect();
        Ok(self)
    }

    /// Read a `fixedAddress` fanout from `fanout` instead of the historical
    /// `faddr_attrs` key. This changes behavior: `fanout: multiple` starts
    /// producing `multicast` addresses.
    pub fn fix_fanout_lookup(mut self, fix: bool) -> Self {
        self.fix_fanout_lookup = fix;
        self
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Run entity rewrites, then attribute rewrites, and hand back the
    /// sections. Attribute rewrites run last so that sections synthesised
    /// by entity rewrites get their attributes renamed too.
    pub fn process(mut self) -> Vec<Section> {
        self.replace_dep_entities();
        self.replace_dep_attributes();
        debug!(sections = self.sections.len(), "Deprecation rewrites complete");
        self.sections
    }

    pub fn replace_dep_entities(&mut self) {
        let entities = self.entities.clone();
        for entity in entities {
            (entity.handler::<S>())(self);
        }
    }

    pub fn replace_dep_attributes(&mut self) {
        for section in &mut self.sections {
            let Some(rewrites) = attribute_rewrites(&section.type_name) else {
                continue;
            };
            let present: Vec<(String, AttributeRewrite)> = section
                .attributes
                .keys()
                .filter_map(|key| {
                    rewrites
                        .iter()
                        .find(|(old, _)| *old == key.as_str())
                        .map(|(_, rewrite)| (key.clone(), *rewrite))
                })
                .collect();

            for (key, rewrite) in present {
                match rewrite {
                    AttributeRewrite::Retired => {
                        self.sink.log(
                            Severity::Warning,
                            &format!(
                                "'{}' attribute of '{}' is deprecated and is no longer used in the router",
                                key, section.type_name
                            ),
                        );
                    }
                    AttributeRewrite::Rename(replacement) => {
                        self.sink.log(
                            Severity::Warning,
                            &format!(
                                "'{}' attribute of '{}' is deprecated. Use '{}' instead",
                                key, section.type_name, replacement
                            ),
                        );
                        rename_in_place(section, &key, replacement);
                    }
                }
            }
        }
    }

    fn warn(&self, message: &str) {
        self.sink.log(Severity::Warning, message);
    }

    fn handle_container(&mut self) {
        let Some(router) = self.sections.iter().rposition(|s| s.is("router")) else {
            self.warn("No 'router' configuration defined");
            return;
        };
        if self.sections[router].attributes.is_empty() {
            self.warn("No 'router' configuration defined");
        }

        let containers: Vec<usize> = positions(&self.sections, DeprecatedEntity::Container.type_name());
        for &index in &containers {
            self.warn("'container' configuration is deprecated, switch to using 'router' instead.");
            let container = self.sections[index].attributes.clone();
            let target = &mut self.sections[router];
            for attr in CONTAINER_ATTRIBUTES {
                copy_if_unset(attr, &container, &mut target.attributes);
            }
        }
        self.apply(&containers, Vec::new());
    }

    fn handle_waypoint(&mut self) {
        let waypoints = positions(&self.sections, DeprecatedEntity::Waypoint.type_name());
        for _ in &waypoints {
            self.warn("'waypoint' configuration is not supported, switch to using 'autoLink' instead");
        }
        self.apply(&waypoints, Vec::new());
    }

    fn handle_fixed_address(&mut self) {
        let fanout_key = if self.fix_fanout_lookup { FANOUT_KEY } else { LEGACY_FANOUT_KEY };
        let fixed = positions(&self.sections, DeprecatedEntity::FixedAddress.type_name());

        let mut addresses = Vec::with_capacity(fixed.len());
        for &index in &fixed {
            self.warn("'fixedAddress' configuration is deprecated, switch to using 'address' instead");
            let source = &self.sections[index];
            let mut address = Section::new(ADDRESS_TYPE, Default::default());
            copy_if_unset("prefix", &source.attributes, &mut address.attributes);

            let fanout = source.get_str(fanout_key);
            let bias = source
                .get("bias")
                .filter(|b| !b.is_blank())
                .and_then(Value::as_str)
                .unwrap_or("closest");
            let distribution = if fanout == Some("multiple") {
                "multicast"
            } else if bias == "closest" {
                "closest"
            } else {
                "balanced"
            };
            address.set("distribution", distribution);
            addresses.push(address);
        }
        self.apply(&fixed, addresses);
    }

    fn handle_link_route_pattern(&mut self) {
        let patterns = positions(&self.sections, DeprecatedEntity::LinkRoutePattern.type_name());

        let mut link_routes = Vec::with_capacity(patterns.len() * 2);
        for &index in &patterns {
            self.warn("'linkRoutePattern' configuration is deprecated, switch to using 'linkRoute' instead");
            let source = &self.sections[index];
            let base = |dir: Option<&str>| {
                let mut route = Section::new(LINK_ROUTE_TYPE, Default::default());
                copy_if_unset("prefix", &source.attributes, &mut route.attributes);
                if let Some(connector) = source.get("connector").filter(|c| !c.is_blank()) {
                    route.set("connection", connector.clone());
                }
                if let Some(dir) = dir {
                    route.set("dir", dir);
                }
                route
            };

            match source.get("dir").map(|d| d.as_str()) {
                Some(Some(dir @ ("in" | "out"))) => link_routes.push(base(Some(dir))),
                None | Some(Some("both")) => {
                    link_routes.push(base(Some("in")));
                    link_routes.push(base(Some("out")));
                }
                Some(_) => link_routes.push(base(None)),
            }
        }
        self.apply(&patterns, link_routes);
    }

    /// Drop the sections at `remove` and append `append`, keeping the
    /// relative order of the survivors.
    fn apply(&mut self, remove: &[usize], append: Vec<Section>) {
        if !remove.is_empty() {
            let remove: HashSet<usize> = remove.iter().copied().collect();
            let mut index = 0;
            self.sections.retain(|_| {
                let keep = !remove.contains(&index);
                index += 1;
                keep
            });
        }
        self.sections.extend(append);
    }
}

fn positions(sections: &[Section], type_name: &str) -> Vec<usize> {
    sections
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is(type_name))
        .map(|(i, _)| i)
        .collect()
}

/// Copy `attr` from `source` unless `target` already has a value for it.
/// Blank source values are not copied.
fn copy_if_unset(attr: &str, source: &AttributeMap, target: &mut AttributeMap) {
    let Some(value) = source.get(attr).filter(|v| !v.is_blank()) else {
        return;
    };
    let unset = target.get(attr).map(Value::is_blank).unwrap_or(true);
    if unset {
        target.insert(attr.to_string(), value.clone());
    }
}

/// Rename `old` to `new`, keeping its position. If `new` is already
/// present its value is overwritten where it stands.
fn rename_in_place(section: &mut Section, old: &str, new: &str) {
    let Some(index) = section.attributes.get_index_of(old) else {
        return;
    };
    let Some(value) = section.attributes.shift_remove(old) else {
        return;
    };
    if let Some(existing) = section.attributes.get_mut(new) {
        *existing = value;
    } else {
        section.attributes.shift_insert(index, new.to_string(), value);
    }
}
