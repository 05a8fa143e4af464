//! Feature-control manifest model.
//!
//! A manifest is kept as an immutable JSON tree; typed views are taken
//! from it on demand:
//!
//! ```json
//! { "featureControl": { "features": [
//!     { "name": "ARU", "enable": true, "effectiveImmediate": false,
//!       "featureInstance": "ARU:E_29",
//!       "configData": { "tr181.Device.X.Enable": "true" } }
//! ] } }
//! ```

use crate::error::{ParseError, ProtocolResult};
use crate::keys::TR181_PREFIX;
use serde_json::Value;
use std::collections::BTreeMap;

const FEATURE_CONTROL: &str = "featureControl";
const FEATURES: &str = "features";
const NAME: &str = "name";
const ENABLE: &str = "enable";
const EFFECTIVE_IMMEDIATE: &str = "effectiveImmediate";
const FEATURE_INSTANCE: &str = "featureInstance";
const CONFIG_DATA: &str = "configData";

/// Interprets a bool-ish JSON value.
///
/// JSON booleans are taken as-is. Strings are true when they equal
/// `"true"` (any case) or `"1"`. The number `1` is true, other numbers
/// false. Anything else is not a boolean.
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(s.eq_ignore_ascii_case("true") || s == "1"),
        Value::Number(n) => Some(n.as_i64() == Some(1)),
        _ => None,
    }
}

/// One entry of the manifest's feature list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    /// Feature name.
    pub name: String,
    /// Instance label reported in the enabled-feature list.
    pub feature_instance: Option<String>,
    /// Whether the feature is enabled.
    pub enable: bool,
    /// Whether the feature takes effect without a reboot.
    pub effective_immediate: bool,
}

impl Feature {
    /// Reads a feature from its JSON node.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidField`] if `name`, `enable` or
    /// `effectiveImmediate` is missing or malformed.
    pub fn from_node(node: &Value) -> ProtocolResult<Self> {
        let name = node
            .get(NAME)
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or(ParseError::InvalidField {
                feature: None,
                field: NAME,
            })?
            .to_string();

        let field = |key: &'static str| {
            node.get(key)
                .and_then(parse_bool)
                .ok_or_else(|| ParseError::InvalidField {
                    feature: Some(name.clone()),
                    field: key,
                })
        };
        let enable = field(ENABLE)?;
        let effective_immediate = field(EFFECTIVE_IMMEDIATE)?;

        let feature_instance = node
            .get(FEATURE_INSTANCE)
            .and_then(Value::as_str)
            .filter(|i| !i.is_empty())
            .map(str::to_string);

        Ok(Self {
            name,
            feature_instance,
            enable,
            effective_immediate,
        })
    }

    /// Entry for the aggregate enabled-feature list, if the feature has an instance.
    pub fn list_entry(&self) -> Option<String> {
        self.feature_instance
            .as_ref()
            .map(|instance| format!("{instance}=true,"))
    }

    /// Shell export lines describing this feature.
    pub fn export_lines(&self) -> [String; 2] {
        [
            format!("export RFC_ENABLE_{}={}", self.name, self.enable),
            format!(
                "export RFC_{}_effectiveImmediate={}",
                self.name, self.effective_immediate
            ),
        ]
    }
}

/// Flattened `configData` overrides with deterministic iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideMap {
    entries: BTreeMap<String, String>,
}

impl OverrideMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an override, normalizing the key.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(normalize_key(key), value.into());
    }

    /// Looks up a normalized key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of overrides.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no overrides.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates overrides in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for OverrideMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut map = OverrideMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

fn normalize_key(key: &str) -> String {
    key.replace(TR181_PREFIX, "")
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    features: Vec<Value>,
}

impl Manifest {
    /// Parses a response body.
    ///
    /// # Errors
    ///
    /// Fails if the body is not JSON or lacks `featureControl.features`.
    pub fn parse(body: &[u8]) -> ProtocolResult<Self> {
        let root: Value =
            serde_json::from_slice(body).map_err(|e| ParseError::Json(e.to_string()))?;
        Self::from_value(root)
    }

    /// Builds a manifest from an already parsed tree.
    ///
    /// # Errors
    ///
    /// Fails if the tree lacks `featureControl.features`.
    pub fn from_value(root: Value) -> ProtocolResult<Self> {
        let control = root
            .get(FEATURE_CONTROL)
            .ok_or(ParseError::MissingFeatureControl)?;
        let features = control
            .get(FEATURES)
            .and_then(Value::as_array)
            .ok_or(ParseError::MissingFeatures)?;
        Ok(Self {
            features: features.clone(),
        })
    }

    /// Raw feature nodes.
    pub fn nodes(&self) -> &[Value] {
        &self.features
    }

    /// Number of feature nodes.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if the feature list is empty.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Typed view of every feature node, in manifest order.
    pub fn features(&self) -> impl Iterator<Item = ProtocolResult<Feature>> + '_ {
        self.features.iter().enumerate().map(|(idx, node)| {
            if node.is_object() {
                Feature::from_node(node)
            } else {
                Err(ParseError::NotAnObject(idx))
            }
        })
    }

    /// Flattens every `configData` block into one override map.
    ///
    /// Features without `configData` contribute nothing. Later features
    /// win on duplicate keys. Non-scalar values are ignored.
    pub fn overrides(&self) -> OverrideMap {
        let mut map = OverrideMap::new();
        for node in &self.features {
            let Some(data) = node.get(CONFIG_DATA).and_then(Value::as_object) else {
                continue;
            };
            for (key, value) in data {
                if let Some(v) = render_scalar(value) {
                    map.insert(key, v);
                }
            }
        }
        map
    }
}
