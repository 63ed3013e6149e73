//! Ontology term link resolution.
//!
//! Term codes such as `CL:0000084` are normalized to `CL_0000084` and
//! dispatched by substring match against an ordered prefix table. The
//! first matching entry wins, so the table order is part of the contract:
//! `CVCL_...` codes contain `CL` and therefore resolve through the CL
//! entry, exactly as deployed links always have.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered prefix dispatch table: (substring, URL prefix).
const ONTOLOGY_LINKS: &[(&str, &str)] = &[
    ("CL", "https://www.ebi.ac.uk/ols/ontologies/cl/terms?short_form="),
    ("UBERON", "https://www.ebi.ac.uk/ols/ontologies/uberon/terms?short_form="),
    ("DOID", "https://www.ebi.ac.uk/ols/ontologies/doid/terms?short_form="),
    ("EFO", "https://www.ebi.ac.uk/ols/ontologies/efo/terms?short_form="),
    ("CVCL", "https://web.expasy.org/cellosaurus/"),
];

/// Replace the prefix separator with an underscore.
pub fn normalize_code(code: &str) -> String {
    code.replace(':', "_")
}

/// Resolve a term code to its reference URL, or an empty string.
pub fn resolve_link(code: &str) -> String {
    let normalized = normalize_code(code);
    ONTOLOGY_LINKS
        .iter()
        .find(|(prefix, _)| normalized.contains(prefix))
        .map(|(_, base)| format!("{}{}", base, normalized))
        .unwrap_or_default()
}

/// Code → link mapping that keeps the input order of the codes.
///
/// Serializes as a JSON object. A repeated code keeps its first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OntologyLinks {
    entries: Vec<(String, String)>,
}

impl OntologyLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every code in order.
    pub fn resolve_all<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut links = Self::new();
        for code in codes {
            links.insert(code.as_ref());
        }
        links
    }

    /// Resolve and append one code; no-op if already present.
    pub fn insert(&mut self, code: &str) {
        if self.get(code).is_none() {
            self.entries.push((code.to_string(), resolve_link(code)));
        }
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, link)| link.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, l)| (c.as_str(), l.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for OntologyLinks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (code, link) in &self.entries {
            map.serialize_entry(code, link)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cl_code_resolves() {
        let link = resolve_link("CL:0000001");
        assert!(link.contains("/cl/terms"));
        assert!(link.ends_with("CL_0000001"));
        assert!(link.starts_with("https://www.ebi.ac.uk/ols/"));
    }

    #[test]
    fn test_unknown_prefix_resolves_empty() {
        assert_eq!(resolve_link("XX:1"), "");
        assert_eq!(resolve_link(""), "");
    }

    #[test]
    fn test_each_table_entry() {
        let cases = [
            ("UBERON:0000178", "/uberon/terms?short_form=UBERON_0000178"),
            ("DOID:1612", "/doid/terms?short_form=DOID_1612"),
            ("EFO:0000311", "/efo/terms?short_form=EFO_0000311"),
        ];
        for (code, expected) in cases {
            assert!(resolve_link(code).contains(expected), "{}", code);
        }
    }

    #[test]
    fn test_first_match_wins_for_overlapping_prefixes() {
        // CVCL contains CL, and CL is checked first
        let link = resolve_link("CVCL:0030");
        assert!(link.contains("/cl/terms?short_form=CVCL_0030"));
        assert!(!link.contains("cellosaurus"));
    }

    #[test]
    fn test_links_preserve_order_and_dedupe() {
        let links = OntologyLinks::resolve_all(["UBERON:1", "CL:2", "UBERON:1", "XX:3"]);
        let codes: Vec<&str> = links.iter().map(|(c, _)| c).collect();
        assert_eq!(codes, vec!["UBERON:1", "CL:2", "XX:3"]);
        assert_eq!(links.get("XX:3"), Some(""));
    }

    #[test]
    fn test_links_serialize_as_ordered_object() {
        let links = OntologyLinks::resolve_all(["UBERON:1", "CL:2"]);
        let json = serde_json::to_string(&links).unwrap();
        let uberon = json.find("UBERON:1").unwrap();
        let cl = json.find("\"CL:2\"").unwrap();
        assert!(uberon < cl);
    }
}
