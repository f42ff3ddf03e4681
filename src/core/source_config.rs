//! Typed view of the source-configuration document.

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::{debug, warn};

/// The resolved configuration of a source.
///
/// Built once per resolution and shared as `Arc<SourceConfig>`; never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Source identifier.
    pub id: String,
    /// Human-readable source name.
    #[serde(default)]
    pub name: String,
    /// Whether the source is enabled on the control plane.
    #[serde(default)]
    pub enabled: bool,
    /// Destinations connected to the source. Entries that fail to parse are dropped.
    #[serde(default, deserialize_with = "lenient_destinations")]
    pub destinations: Vec<Destination>,
}

/// A downstream endpoint events can be routed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Destination identifier.
    pub id: String,
    /// Human-readable destination name.
    #[serde(default)]
    pub name: String,
    /// Whether the destination is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// The destination type.
    #[serde(
        default,
        rename = "destinationDefinition",
        skip_serializing_if = "Option::is_none"
    )]
    pub definition: Option<DestinationDefinition>,
    /// Transformation to apply before delivery, as sent by the server.
    ///
    /// Non-string values are read as `None`. Use [`Destination::transformation`]
    /// for the validated id.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub transformation_id: Option<String>,
}

/// Type information of a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationDefinition {
    /// Machine name of the destination type, e.g. `"AMPLITUDE"`.
    #[serde(default)]
    pub name: String,
    /// Display name of the destination type.
    #[serde(default)]
    pub display_name: String,
}

/// Envelope the control plane wraps the source in.
#[derive(Deserialize)]
struct SourceConfigDocument {
    source: SourceConfig,
}

impl SourceConfig {
    /// Parse a control-plane response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not JSON or has no usable `source` object.
    /// Malformed destination entries do not cause an error.
    pub fn from_document(raw: &str) -> Result<Self> {
        let document: SourceConfigDocument = serde_json::from_str(raw)?;
        Ok(document.source)
    }

    /// Look up a destination by id.
    pub fn destination(&self, id: &str) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.id == id)
    }

    /// Destinations that are enabled.
    pub fn enabled_destinations(&self) -> impl Iterator<Item = &Destination> {
        self.destinations.iter().filter(|d| d.enabled)
    }
}

impl Destination {
    /// Machine name of the destination type, if the server sent one.
    pub fn destination_type(&self) -> Option<&str> {
        self.definition.as_ref().map(|d| d.name.as_str())
    }

    /// The transformation id, if it is present and well-formed.
    pub fn transformation(&self) -> Option<&str> {
        self.transformation_id
            .as_deref()
            .filter(|id| is_valid_transformation_id(id))
    }
}

fn is_valid_transformation_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_destinations<'de, D>(deserializer: D) -> std::result::Result<Vec<Destination>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Destination>(entry) {
            Ok(destination) => Some(destination),
            Err(e) => {
                warn!(index, error = %e, "dropping malformed destination entry");
                None
            }
        })
        .collect())
}

/// Destination id → transformation id, derived from a [`SourceConfig`].
///
/// Ordered, so two derivations of the same config compare and serialize
/// identically. A missing key means no transformation is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DestinationToTransformationMapping(BTreeMap<String, String>);

impl DestinationToTransformationMapping {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the mapping from a configuration.
    ///
    /// Destinations without a well-formed transformation id are skipped. When a
    /// destination id repeats, the first entry carrying a transformation wins.
    pub fn from_config(config: &SourceConfig) -> Self {
        let mut map = BTreeMap::new();
        for destination in &config.destinations {
            let Some(transformation) = destination.transformation() else {
                if let Some(raw) = destination.transformation_id.as_deref().filter(|s| !s.is_empty()) {
                    warn!(
                        destination = %destination.id,
                        transformation = raw,
                        "ignoring malformed transformation id"
                    );
                }
                continue;
            };
            match map.entry(destination.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(transformation.to_string());
                }
                Entry::Occupied(_) => {
                    debug!(destination = %destination.id, "duplicate destination id, keeping first");
                }
            }
        }
        Self(map)
    }

    /// Transformation configured for `destination_id`.
    pub fn get(&self, destination_id: &str) -> Option<&str> {
        self.0.get(destination_id).map(String::as_str)
    }

    /// Number of mapped destinations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no destination has a transformation.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(destination_id, transformation_id)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl From<DestinationToTransformationMapping> for BTreeMap<String, String> {
    fn from(mapping: DestinationToTransformationMapping) -> Self {
        mapping.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn document(destinations: serde_json::Value) -> String {
        json!({
            "isHosted": true,
            "source": {
                "id": "src-1",
                "name": "ios-app",
                "enabled": true,
                "writeKey": "ignored",
                "destinations": destinations
            }
        })
        .to_string()
    }

    #[test]
    fn test_parse_document() {
        let raw = document(json!([
            {
                "id": "A",
                "name": "Amplitude",
                "enabled": true,
                "destinationDefinition": {"name": "AM", "displayName": "Amplitude"},
                "transformationId": "T1",
                "config": {"apiKey": "x"}
            }
        ]));

        let config = SourceConfig::from_document(&raw).unwrap();
        assert_eq!(config.id, "src-1");
        assert_eq!(config.name, "ios-app");
        assert!(config.enabled);
        assert_eq!(config.destinations.len(), 1);

        let destination = config.destination("A").unwrap();
        assert_eq!(destination.destination_type(), Some("AM"));
        assert_eq!(destination.transformation(), Some("T1"));
    }

    #[test]
    fn test_missing_source_is_error() {
        assert!(SourceConfig::from_document(r#"{"destinations": []}"#).is_err());
        assert!(SourceConfig::from_document("not json").is_err());
    }

    #[test]
    fn test_mapping_skips_empty_transformation() {
        let raw = document(json!([
            {"id": "A", "transformationId": "T1"},
            {"id": "B", "transformationId": ""}
        ]));
        let config = SourceConfig::from_document(&raw).unwrap();
        let mapping = DestinationToTransformationMapping::from_config(&config);

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("A"), Some("T1"));
        assert_eq!(mapping.get("B"), None);
    }

    #[test]
    fn test_malformed_entries_do_not_fail_document() {
        let raw = document(json!([
            {"id": "A", "transformationId": 42},
            {"name": "no id"},
            "garbage",
            {"id": "C", "transformationId": "has space"},
            {"id": "D", "transformationId": "T4", "enabled": false}
        ]));
        let config = SourceConfig::from_document(&raw).unwrap();

        assert_eq!(config.destinations.len(), 3);
        assert_eq!(config.destination("A").unwrap().transformation_id, None);
        assert_eq!(config.enabled_destinations().count(), 0);

        let mapping = DestinationToTransformationMapping::from_config(&config);
        assert_eq!(
            mapping.iter().collect::<Vec<_>>(),
            vec![("D", "T4")]
        );
    }

    #[test]
    fn test_null_destinations() {
        let raw = json!({"source": {"id": "s", "destinations": null}}).to_string();
        let config = SourceConfig::from_document(&raw).unwrap();
        assert!(config.destinations.is_empty());
        assert!(DestinationToTransformationMapping::from_config(&config).is_empty());
    }

    #[test]
    fn test_duplicate_destination_first_wins() {
        let raw = document(json!([
            {"id": "A", "transformationId": ""},
            {"id": "A", "transformationId": "T1"},
            {"id": "A", "transformationId": "T2"}
        ]));
        let config = SourceConfig::from_document(&raw).unwrap();
        let mapping = DestinationToTransformationMapping::from_config(&config);
        assert_eq!(mapping.get("A"), Some("T1"));
    }

    #[test]
    fn test_serialize_roundtrip_is_stable() {
        let raw = document(json!([
            {"id": "A", "enabled": true, "transformationId": "T1",
             "destinationDefinition": {"name": "AM", "displayName": "Amplitude"}},
            {"id": "B"}
        ]));
        let config = SourceConfig::from_document(&raw).unwrap();
        let serialized = serde_json::to_string(&config).unwrap();
        let reparsed: SourceConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }

    proptest! {
        #[test]
        fn prop_mapping_only_holds_valid_ids(
            entries in proptest::collection::vec(("[A-E]", "[a-z0-9 ]{0,4}"), 0..12)
        ) {
            let destinations: Vec<_> = entries
                .iter()
                .map(|(id, t)| json!({"id": id, "transformationId": t}))
                .collect();
            let config = SourceConfig::from_document(&document(json!(destinations))).unwrap();
            let mapping = DestinationToTransformationMapping::from_config(&config);

            for (id, transformation) in mapping.iter() {
                prop_assert!(is_valid_transformation_id(transformation));
                let first_valid = entries
                    .iter()
                    .find(|(d, t)| d == id && is_valid_transformation_id(t))
                    .map(|(_, t)| t.as_str());
                prop_assert_eq!(Some(transformation), first_valid);
            }
            prop_assert_eq!(mapping, DestinationToTransformationMapping::from_config(&config));
        }
    }
}
