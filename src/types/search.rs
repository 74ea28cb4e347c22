//! Search types: language filters parsed from the inbound query and the pages
//! returned by the repository search.

use serde::{Deserialize, Serialize};

use super::RepositorySummary;

const LANGUAGE_QUALIFIER: &str = "language:";

/// One requested source-language value used to scope a repository search.
///
/// Always trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Language(String);

impl Language {
    /// Returns `None` for blank input.
    pub fn new<T: AsRef<str>>(language: T) -> Option<Self> {
        let trimmed = language.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The search qualifier sent upstream, e.g. `language:Rust`
    pub fn search_qualifier(&self) -> String {
        format!("{}{}", LANGUAGE_QUALIFIER, self.0)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The set of languages requested by one inbound query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LanguageQuery(Vec<Language>);

impl LanguageQuery {
    /// Parses a query value such as `language:Go language:Rust`.
    ///
    /// The value is split on the `language:` qualifier and every fragment is trimmed, so
    /// `language:Go+language:Rust` (after form decoding) and a bare `Go` both work. Blank
    /// fragments are skipped and repeated languages are kept once, in first-seen order.
    pub fn parse(query: &str) -> Self {
        let mut languages: Vec<Language> = Vec::new();
        for fragment in query.split(LANGUAGE_QUALIFIER) {
            if let Some(language) = Language::new(fragment) {
                if !languages.contains(&language) {
                    languages.push(language);
                }
            }
        }
        Self(languages)
    }

    pub fn from_languages(languages: Vec<Language>) -> Self {
        let mut deduped: Vec<Language> = Vec::with_capacity(languages.len());
        for language in languages {
            if !deduped.contains(&language) {
                deduped.push(language);
            }
        }
        Self(deduped)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn languages(&self) -> &[Language] {
        &self.0
    }

    pub fn into_languages(self) -> Vec<Language> {
        self.0
    }
}

/// One page of repository search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// Total number of matches reported by the search, across all pages
    pub total_count: u64,
    pub items: Vec<RepositorySummary>,
}
