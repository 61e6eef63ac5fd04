//! Wire shapes for the reconciliation contract.
//!
//! Queries travel as a map keyed by correlation id (`{"q0": {"query": ...}}`)
//! and results come back keyed the same way (`{"q0": {"result": [...]}}`).
//! Conversions to and from the core model live here so the model itself
//! stays serde-free.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{
    Candidate, EntityId, PropertyConstraint, PropertyValue, Query, TypeRef,
};
use crate::resolver::RawCandidate;

/// A batch of queries keyed by correlation id.
pub type WireBatch = BTreeMap<String, WireQuery>;

/// A batch of results keyed by correlation id.
pub type WireResults = BTreeMap<String, WireResult>;

/// One reconciliation query as it appears on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireQuery {
    pub query: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_strict: Option<bool>,

    /// Preferred display languages, most preferred first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lang: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<WireProperty>,
}

impl WireQuery {
    pub fn from_query(query: &Query) -> Self {
        Self {
            query: query.text.clone(),
            entity_type: query.entity_type.clone(),
            limit: query.limit,
            type_strict: query.type_strict,
            lang: query.languages.clone(),
            properties: query
                .properties
                .iter()
                .map(WireProperty::from_constraint)
                .collect(),
        }
    }

    pub fn into_query(self) -> Query {
        Query {
            text: self.query,
            entity_type: self.entity_type,
            limit: self.limit,
            type_strict: self.type_strict,
            languages: self.lang,
            properties: self
                .properties
                .into_iter()
                .map(WireProperty::into_constraint)
                .collect(),
        }
    }
}

/// One property constraint: a property id plus a literal or entity value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireProperty {
    pub pid: String,
    pub v: WirePropertyValue,
}

impl WireProperty {
    pub fn from_constraint(constraint: &PropertyConstraint) -> Self {
        let v = match &constraint.value {
            PropertyValue::Literal(text) => WirePropertyValue::Literal(text.clone()),
            PropertyValue::Entity(id) => WirePropertyValue::Entity(WireEntityRef {
                id: id.as_str().to_string(),
            }),
        };
        Self {
            pid: constraint.pid.clone(),
            v,
        }
    }

    pub fn into_constraint(self) -> PropertyConstraint {
        let value = match self.v {
            WirePropertyValue::Literal(text) => PropertyValue::Literal(text),
            WirePropertyValue::Entity(entity) => PropertyValue::Entity(EntityId::new(entity.id)),
        };
        PropertyConstraint {
            pid: self.pid,
            value,
        }
    }
}

/// Property value: a bare JSON string, or an object carrying an entity id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum WirePropertyValue {
    Entity(WireEntityRef),
    Literal(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireEntityRef {
    pub id: String,
}

/// Type tag as exchanged on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireType {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl WireType {
    pub fn into_type_ref(self) -> TypeRef {
        TypeRef::new(self.id, self.name)
    }
}

/// One scored candidate as it appears on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireCandidate {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<WireType>,

    pub score: f64,

    #[serde(rename = "match", default)]
    pub matching: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,

    /// Primary this candidate was folded under, when the producing service
    /// already ran same-as aggregation.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl WireCandidate {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id.as_str().to_string(),
            name: candidate.name.clone(),
            types: candidate
                .types
                .iter()
                .map(|entity_type| WireType {
                    id: entity_type.id().to_string(),
                    name: entity_type.name().map(str::to_string),
                })
                .collect(),
            score: candidate.score,
            matching: candidate.matching,
            description: candidate.description.clone(),
            dataset: candidate.dataset.clone(),
            reference: candidate
                .reference
                .as_ref()
                .map(|id| id.as_str().to_string()),
        }
    }

    pub fn into_raw(self) -> RawCandidate {
        RawCandidate {
            id: EntityId::new(self.id),
            name: self.name,
            types: self
                .types
                .into_iter()
                .map(WireType::into_type_ref)
                .collect(),
            score: self.score,
            matching: self.matching,
            description: self.description,
            dataset: self.dataset,
            reference: self.reference.map(EntityId::new),
        }
    }
}

/// Result envelope for one query id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct WireResult {
    pub result: Vec<WireCandidate>,
}

impl WireResult {
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        Self {
            result: candidates.iter().map(WireCandidate::from_candidate).collect(),
        }
    }
}

/// Service discovery document published by a reconciliation service.
///
/// Every field is optional on intake so partial manifests from older or
/// minimal services still parse.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ManifestDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        rename = "identifierSpace",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub identifier_space: Option<String>,

    #[serde(
        rename = "schemaSpace",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_space: Option<String>,

    #[serde(
        rename = "defaultTypes",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub default_types: Vec<WireType>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,

    /// Auxiliary enrichment endpoints, each independently optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<ManifestServices>,

    /// Opaque view/preview blocks carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<serde_json::Value>,
}

/// URLs of the auxiliary label/description/type services, relative to the
/// manifest's base URL unless absolute.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ManifestServices {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_serializes_minimal_shape() {
        let wire = WireQuery::from_query(&Query::new("Berlin"));
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value, json!({"query": "Berlin"}));
    }

    #[test]
    fn test_query_round_trips_through_the_wire() {
        let query = Query::new("Berlin")
            .with_type("City")
            .with_limit(5)
            .with_type_strict(true)
            .with_languages(["de", "en"])
            .with_property(PropertyConstraint::literal("P17", "Germany"))
            .with_property(PropertyConstraint::entity("P17", "wd:Q183"));

        let encoded = serde_json::to_string(&WireQuery::from_query(&query)).unwrap();
        let decoded: WireQuery = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.into_query(), query);
    }

    #[test]
    fn test_property_values_distinguish_literal_from_entity() {
        let value = json!({"pid": "P17", "v": {"id": "wd:Q183"}});
        let wire: WireProperty = serde_json::from_value(value).unwrap();
        assert_eq!(
            wire.v,
            WirePropertyValue::Entity(WireEntityRef {
                id: "wd:Q183".to_string()
            })
        );

        let value = json!({"pid": "P17", "v": "Germany"});
        let wire: WireProperty = serde_json::from_value(value).unwrap();
        assert_eq!(wire.v, WirePropertyValue::Literal("Germany".to_string()));
    }

    #[test]
    fn test_candidate_uses_protocol_field_names() {
        let mut candidate = Candidate::named("wd:Q64", "Berlin", 0.9);
        candidate.matching = true;
        candidate.reference = Some(EntityId::new("wd:Q1"));

        let value = serde_json::to_value(WireCandidate::from_candidate(&candidate)).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "wd:Q64",
                "name": "Berlin",
                "score": 0.9,
                "match": true,
                "ref": "wd:Q1",
            })
        );
    }

    #[test]
    fn test_candidate_decodes_into_raw_candidate() {
        let value = json!({
            "id": "wd:Q64",
            "name": "Berlin",
            "type": [{"id": "wd:Q515", "name": "city"}, {"id": "wd:Q5119"}],
            "score": 0.87,
            "match": false,
            "description": "capital of Germany",
        });

        let raw = serde_json::from_value::<WireCandidate>(value)
            .unwrap()
            .into_raw();
        assert_eq!(raw.id.as_str(), "wd:Q64");
        assert_eq!(raw.types.len(), 2);
        assert_eq!(raw.types[0].name.as_deref(), Some("city"));
        assert_eq!(raw.types[1].name, None);
        assert_eq!(raw.description.as_deref(), Some("capital of Germany"));
        assert!(!raw.matching);
    }

    #[test]
    fn test_candidate_tolerates_missing_match_flag() {
        let value = json!({"id": "wd:Q64", "score": 0.5});
        let wire: WireCandidate = serde_json::from_value(value).unwrap();
        assert!(!wire.matching);
        assert!(wire.types.is_empty());
    }

    #[test]
    fn test_result_map_round_trip() {
        let mut results = WireResults::new();
        results.insert(
            "q0".to_string(),
            WireResult::from_candidates(&[Candidate::new("wd:Q64", 0.9)]),
        );
        results.insert("q1".to_string(), WireResult::default());

        let encoded = serde_json::to_string(&results).unwrap();
        let decoded: WireResults = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded["q0"].result.len(), 1);
        assert!(decoded["q1"].result.is_empty());
    }

    #[test]
    fn test_manifest_parses_partial_documents() {
        let value = json!({
            "name": "places",
            "identifierSpace": "https://example.org/id/",
        });
        let manifest: ManifestDoc = serde_json::from_value(value).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("places"));
        assert_eq!(manifest.schema_space, None);
        assert!(manifest.default_types.is_empty());
        assert_eq!(manifest.services, None);
    }

    #[test]
    fn test_manifest_reads_service_block() {
        let value = json!({
            "name": "places",
            "identifierSpace": "https://example.org/id/",
            "schemaSpace": "https://example.org/schema/",
            "defaultTypes": [{"id": "City", "name": "City"}],
            "versions": ["0.2"],
            "services": {
                "labels": "labels",
                "types": "https://types.example.org/lookup",
            },
        });
        let manifest: ManifestDoc = serde_json::from_value(value).unwrap();

        let services = manifest.services.expect("services block");
        assert_eq!(services.labels.as_deref(), Some("labels"));
        assert_eq!(services.descriptions, None);
        assert_eq!(
            services.types.as_deref(),
            Some("https://types.example.org/lookup")
        );
        assert_eq!(manifest.default_types[0].id, "City");
    }
}
