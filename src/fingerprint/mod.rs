//! Deterministic query fingerprints used as cache keys.
//!
//! Two queries that differ only in ignorable whitespace or in property order
//! hash to the same fingerprint; any semantic difference (text, type, limit,
//! strictness, language order, property values) produces a different one.
//! Fields are length-prefixed and tagged so concatenation ambiguity cannot
//! cause collisions.

use blake3::Hasher;

use crate::model::{PropertyValue, Query};

/// 256-bit content fingerprint of a reconciliation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

/// Field tags for the framed hash input.
const TAG_TEXT: u8 = 0x01;
const TAG_TYPE: u8 = 0x02;
const TAG_LIMIT: u8 = 0x03;
const TAG_STRICT: u8 = 0x04;
const TAG_LANGUAGES: u8 = 0x05;
const TAG_PROPERTIES: u8 = 0x06;

impl Fingerprint {
    /// Computes the fingerprint of a query.
    pub fn of(query: &Query) -> Self {
        let mut hasher = Hasher::new();

        write_bytes(&mut hasher, TAG_TEXT, normalize_text(&query.text).as_bytes());
        write_optional(&mut hasher, TAG_TYPE, query.entity_type.as_deref());
        write_optional_u64(&mut hasher, TAG_LIMIT, query.limit.map(|l| l as u64));
        write_optional_bool(&mut hasher, TAG_STRICT, query.type_strict);

        hasher.update(&[TAG_LANGUAGES]);
        write_len(&mut hasher, query.languages.len());
        for tag in &query.languages {
            let normalized = tag.trim().to_ascii_lowercase();
            write_len(&mut hasher, normalized.len());
            hasher.update(normalized.as_bytes());
        }

        // Property order is not significant: hash a sorted view.
        let mut properties: Vec<(String, u8, String)> = query
            .properties
            .iter()
            .map(|property| {
                let (kind, value) = match &property.value {
                    PropertyValue::Literal(text) => (0u8, normalize_text(text)),
                    PropertyValue::Entity(id) => (1u8, id.as_str().to_string()),
                };
                (property.pid.trim().to_string(), kind, value)
            })
            .collect();
        properties.sort();

        hasher.update(&[TAG_PROPERTIES]);
        write_len(&mut hasher, properties.len());
        for (pid, kind, value) in &properties {
            write_len(&mut hasher, pid.len());
            hasher.update(pid.as_bytes());
            hasher.update(&[*kind]);
            write_len(&mut hasher, value.len());
            hasher.update(value.as_bytes());
        }

        Self(*hasher.finalize().as_bytes())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, convenient for logs.
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(64);
        for byte in &self.0 {
            hex.push_str(&format!("{byte:02x}"));
        }
        hex
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Trims and collapses internal whitespace runs to single spaces.
///
/// Case is preserved: backends may be case-sensitive.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn write_bytes(hasher: &mut Hasher, tag: u8, bytes: &[u8]) {
    hasher.update(&[tag]);
    write_len(hasher, bytes.len());
    hasher.update(bytes);
}

fn write_optional(hasher: &mut Hasher, tag: u8, value: Option<&str>) {
    hasher.update(&[tag]);
    match value {
        Some(text) => {
            hasher.update(&[1]);
            write_len(hasher, text.len());
            hasher.update(text.as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn write_optional_u64(hasher: &mut Hasher, tag: u8, value: Option<u64>) {
    hasher.update(&[tag]);
    match value {
        Some(number) => {
            hasher.update(&[1]);
            hasher.update(&number.to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn write_optional_bool(hasher: &mut Hasher, tag: u8, value: Option<bool>) {
    hasher.update(&[tag]);
    match value {
        Some(flag) => hasher.update(&[1, u8::from(flag)]),
        None => hasher.update(&[0]),
    };
}

fn write_len(hasher: &mut Hasher, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyConstraint;

    #[test]
    fn test_same_query_same_fingerprint() {
        let a = Query::new("Berlin").with_type("City").with_limit(5);
        let b = Query::new("Berlin").with_type("City").with_limit(5);

        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_whitespace_runs_do_not_change_fingerprint() {
        let a = Query::new("  Berlin   Mitte ");
        let b = Query::new("Berlin Mitte");

        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_case_changes_fingerprint() {
        let a = Query::new("berlin");
        let b = Query::new("Berlin");

        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_property_order_is_not_significant() {
        let a = Query::new("Berlin")
            .with_property(PropertyConstraint::literal("P17", "Germany"))
            .with_property(PropertyConstraint::entity("P36", "Q64"));
        let b = Query::new("Berlin")
            .with_property(PropertyConstraint::entity("P36", "Q64"))
            .with_property(PropertyConstraint::literal("P17", "Germany"));

        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_literal_and_entity_values_differ() {
        let a = Query::new("Berlin").with_property(PropertyConstraint::literal("P36", "Q64"));
        let b = Query::new("Berlin").with_property(PropertyConstraint::entity("P36", "Q64"));

        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_each_field_contributes() {
        let base = Query::new("Berlin");

        let variants = [
            base.clone().with_type("City"),
            base.clone().with_limit(3),
            base.clone().with_type_strict(true),
            base.clone().with_languages(["de"]),
            base.clone()
                .with_property(PropertyConstraint::literal("P17", "Germany")),
        ];

        let reference = Fingerprint::of(&base);
        for variant in &variants {
            assert_ne!(reference, Fingerprint::of(variant));
        }
    }

    #[test]
    fn test_language_order_is_significant() {
        let a = Query::new("Berlin").with_languages(["de", "en"]);
        let b = Query::new("Berlin").with_languages(["en", "de"]);

        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_absent_type_differs_from_empty_type() {
        let a = Query::new("Berlin");
        let b = Query::new("Berlin").with_type("");

        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_hex_form_is_stable_and_64_chars() {
        let fingerprint = Fingerprint::of(&Query::new("Berlin"));

        let hex = fingerprint.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex, format!("{fingerprint}"));
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
