use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const SEARCHED_DOCUMENTS: u64 = 2895;
pub const SOURCE: &str = "Epstein Document Archive";
pub const LAST_UPDATED: &str = "2026-01-15";
pub const MIN_QUERY_CHARS: usize = 2;
pub const MAX_QUERY_CHARS: usize = 100;

/// Lower-cased names the registry reports as found.
pub const KNOWN_NAMES: [&str; 8] = [
    "bill clinton",
    "donald trump",
    "prince andrew",
    "alan dershowitz",
    "leslie wexner",
    "ghislaine maxwell",
    "virginia giuffre",
    "jean luc brunel",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("name must be at least {MIN_QUERY_CHARS} characters long")]
    TooShort,
    #[error("name must be at most {MAX_QUERY_CHARS} characters long")]
    TooLong,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMatch {
    pub document: String,
    pub excerpt: String,
    pub page: u32,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub query: String,
    pub found: bool,
    pub matches: Vec<DocumentMatch>,
    pub searched_documents: u64,
    pub source: &'static str,
}

impl SearchOutcome {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub document_count: u64,
    pub source: &'static str,
    pub last_updated: &'static str,
}

pub fn stats() -> RegistryStats {
    RegistryStats {
        document_count: SEARCHED_DOCUMENTS,
        source: SOURCE,
        last_updated: LAST_UPDATED,
    }
}

/// True when the normalized name contains, or is contained in, a known name.
pub fn is_known(name: &str) -> bool {
    let normalized = name.trim().to_lowercase();
    !normalized.is_empty()
        && KNOWN_NAMES
            .iter()
            .any(|known| normalized.contains(known) || known.contains(normalized.as_str()))
}

pub fn search(name: &str) -> Result<SearchOutcome, SearchError> {
    let query = name.trim();
    let chars = query.chars().count();
    if chars < MIN_QUERY_CHARS {
        return Err(SearchError::TooShort);
    }
    if chars > MAX_QUERY_CHARS {
        return Err(SearchError::TooLong);
    }

    let matches = if is_known(query) {
        vec![derive_match(query)]
    } else {
        Vec::new()
    };
    Ok(SearchOutcome {
        query: query.to_string(),
        found: !matches.is_empty(),
        matches,
        searched_documents: SEARCHED_DOCUMENTS,
        source: SOURCE,
    })
}

// Document, page and score are taken from fixed slices of the query digest.
fn derive_match(query: &str) -> DocumentMatch {
    let digest = Sha256::digest(query.to_lowercase().as_bytes());
    let word = |at: usize| u32::from_be_bytes([digest[at], digest[at + 1], digest[at + 2], digest[at + 3]]);
    let fraction = f64::from(u16::from_be_bytes([digest[8], digest[9]])) / f64::from(u16::MAX);
    DocumentMatch {
        document: format!("document_{}.pdf", word(0) % 1000),
        excerpt: format!("...{query} wurde in Verbindung mit..."),
        page: word(4) % 50 + 1,
        score: 0.85 + fraction * 0.15,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_are_not_found() {
        let outcome = search("  Jane Doe ").unwrap();
        assert_eq!(outcome.query, "Jane Doe");
        assert!(!outcome.found);
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.searched_documents, 2895);
    }

    #[test]
    fn known_names_match_by_containment_either_way() {
        assert!(is_known("Prince Andrew"));
        assert!(is_known("His Royal Highness Prince Andrew, Duke of York"));
        assert!(is_known("maxwell"));
        assert!(!is_known("Max Mustermann"));
        assert!(!is_known("   "));
    }

    #[test]
    fn matches_are_deterministic_and_in_range() {
        let first = search("Bill Clinton").unwrap();
        let second = search("bill clinton").unwrap();
        assert!(first.found);
        assert_eq!(first.matches[0].document, second.matches[0].document);
        let hit = &first.matches[0];
        assert!(hit.document.starts_with("document_") && hit.document.ends_with(".pdf"));
        assert!((1..=50).contains(&hit.page));
        assert!((0.85..=1.0).contains(&hit.score));
        assert_eq!(hit.excerpt, "...Bill Clinton wurde in Verbindung mit...");
    }

    #[test]
    fn query_length_is_bounded() {
        assert_eq!(search(" x "), Err(SearchError::TooShort));
        assert_eq!(search(&"a".repeat(101)), Err(SearchError::TooLong));
        assert!(search(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let json = search("Jane Doe").unwrap().to_json();
        assert_eq!(json["searchedDocuments"], 2895);
        assert_eq!(json["source"], SOURCE);
        assert_eq!(json["found"], false);
        let stats = serde_json::to_value(stats()).unwrap();
        assert_eq!(stats["lastUpdated"], LAST_UPDATED);
    }
}
