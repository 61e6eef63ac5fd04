//! Preferred-language negotiation for display names and descriptions.

/// Fallback language when neither the query, the resolver, nor the system
/// configuration names one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Ordered, deduplicated list of preferred languages for one resolution.
///
/// Built once per request by merging the query's languages, the resolver's
/// default, and the system-wide configuration, in that precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePreference {
    languages: Vec<String>,
}

impl LanguagePreference {
    /// Builds a preference list from already-ordered tags.
    ///
    /// Tags are trimmed and lowercased; empties and duplicates are dropped.
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut merged = Vec::new();
        for tag in languages {
            push_unique(&mut merged, tag.as_ref());
        }
        Self { languages: merged }
    }

    /// Merges query, resolver, and system preferences in precedence order.
    pub fn negotiate(query: &[String], resolver_default: Option<&str>, system: &[String]) -> Self {
        let mut merged = Vec::new();
        for tag in query {
            push_unique(&mut merged, tag);
        }
        if let Some(tag) = resolver_default {
            push_unique(&mut merged, tag);
        }
        for tag in system {
            push_unique(&mut merged, tag);
        }
        Self { languages: merged }
    }

    /// Most preferred language, falling back to [`DEFAULT_LANGUAGE`].
    pub fn primary(&self) -> &str {
        self.languages
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    #[inline]
    pub fn as_slice(&self) -> &[String] {
        &self.languages
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Whether `tag` (in any case) is in the preference list.
    pub fn accepts(&self, tag: &str) -> bool {
        let normalized = tag.trim().to_ascii_lowercase();
        self.languages.iter().any(|known| *known == normalized)
    }
}

impl Default for LanguagePreference {
    fn default() -> Self {
        Self {
            languages: vec![DEFAULT_LANGUAGE.to_string()],
        }
    }
}

fn push_unique(merged: &mut Vec<String>, tag: &str) {
    let normalized = tag.trim().to_ascii_lowercase();
    if normalized.is_empty() || merged.iter().any(|known| *known == normalized) {
        return;
    }
    merged.push(normalized);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_precedence_order() {
        let query = vec!["de".to_string(), "fr".to_string()];
        let system = vec!["en".to_string()];
        let preference = LanguagePreference::negotiate(&query, Some("nl"), &system);

        assert_eq!(preference.as_slice(), &["de", "fr", "nl", "en"]);
        assert_eq!(preference.primary(), "de");
    }

    #[test]
    fn test_negotiate_deduplicates_case_insensitively() {
        let query = vec!["EN".to_string(), " en ".to_string(), "de".to_string()];
        let preference = LanguagePreference::negotiate(&query, Some("en"), &[]);

        assert_eq!(preference.as_slice(), &["en", "de"]);
    }

    #[test]
    fn test_empty_preference_falls_back_to_default() {
        let preference = LanguagePreference::negotiate(&[], None, &[]);

        assert!(preference.is_empty());
        assert_eq!(preference.primary(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_accepts_ignores_case_and_whitespace() {
        let preference = LanguagePreference::new(["de", "en"]);

        assert!(preference.accepts("DE"));
        assert!(preference.accepts(" en"));
        assert!(!preference.accepts("fr"));
    }

    #[test]
    fn test_default_is_english() {
        let preference = LanguagePreference::default();

        assert_eq!(preference.as_slice(), &[DEFAULT_LANGUAGE]);
    }
}
