//! Plate grammar matching
//!
//! A plate is a two-letter region code, a two-digit district code, one or two
//! series letters and a three- or four-digit serial. The four-digit form is
//! always tried before the three-digit one.

use regex::Regex;
use std::collections::HashSet;

/// Grammar patterns in priority order
const PLATE_PATTERNS: [&str; 2] = [
    r"([A-Z]{2})([0-9]{2})([A-Z]{1,2})([0-9]{4})",
    r"([A-Z]{2})([0-9]{2})([A-Z]{1,2})([0-9]{3})",
];

/// Matcher for the plate grammar with a region-code whitelist
#[derive(Debug, Clone)]
pub struct PlateGrammar {
    /// Unanchored patterns, searched anywhere in the text
    patterns: Vec<Regex>,
    /// The same patterns anchored at the start of the text
    prefix_patterns: Vec<Regex>,
    /// Exact-match patterns used for validation
    exact_patterns: Vec<Regex>,
    region_codes: HashSet<String>,
}

impl PlateGrammar {
    /// Build a grammar accepting the given region codes
    pub fn new<I, S>(region_codes: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compile = |prefix: &str, suffix: &str| -> Result<Vec<Regex>, regex::Error> {
            PLATE_PATTERNS
                .iter()
                .map(|p| Regex::new(&format!("{prefix}{p}{suffix}")))
                .collect()
        };

        Ok(Self {
            patterns: compile("", "")?,
            prefix_patterns: compile("^", "")?,
            exact_patterns: compile("^", "$")?,
            region_codes: region_codes
                .into_iter()
                .map(|c| c.as_ref().trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .collect(),
        })
    }

    /// Whether `code` is a whitelisted region code
    pub fn is_region_code(&self, code: &str) -> bool {
        self.region_codes.contains(code)
    }

    /// Number of whitelisted region codes
    pub fn region_code_count(&self) -> usize {
        self.region_codes.len()
    }

    /// Find the first plate-shaped span with a whitelisted region code.
    ///
    /// Patterns are tried in priority order; within a pattern, non-overlapping
    /// matches are scanned left to right.
    pub fn find(&self, text: &str) -> Option<String> {
        self.patterns
            .iter()
            .flat_map(|pattern| pattern.captures_iter(text))
            .find(|caps| self.is_region_code(&caps[1]))
            .map(|caps| caps[0].to_string())
    }

    /// Match a plate at the very start of `text`
    pub fn match_prefix(&self, text: &str) -> Option<String> {
        self.prefix_patterns
            .iter()
            .filter_map(|pattern| pattern.captures(text))
            .find(|caps| self.is_region_code(&caps[1]))
            .map(|caps| caps[0].to_string())
    }

    /// Whether `plate` is exactly a valid plate string
    pub fn is_valid(&self, plate: &str) -> bool {
        self.exact_patterns
            .iter()
            .filter_map(|pattern| pattern.captures(plate))
            .any(|caps| self.is_region_code(&caps[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> PlateGrammar {
        PlateGrammar::new(["KA", "RJ", "MH", "DL"]).unwrap()
    }

    #[test]
    fn test_region_codes_are_normalized() {
        let g = PlateGrammar::new([" ka ", "", "Rj"]).unwrap();
        assert_eq!(g.region_code_count(), 2);
        assert!(g.is_region_code("KA"));
        assert!(g.is_region_code("RJ"));
    }

    #[test]
    fn test_find_four_digit_serial() {
        assert_eq!(grammar().find("KA01AB1234"), Some("KA01AB1234".to_string()));
        assert_eq!(grammar().find("XXKA01A1234YY"), Some("KA01A1234".to_string()));
    }

    #[test]
    fn test_find_three_digit_serial() {
        assert_eq!(grammar().find("DL3CAB123"), None);
        assert_eq!(grammar().find("DL03CA123"), Some("DL03CA123".to_string()));
    }

    #[test]
    fn test_find_rejects_unknown_region() {
        assert_eq!(grammar().find("ZZ01AB1234"), None);
    }

    #[test]
    fn test_find_skips_invalid_prefix_to_later_match() {
        // First match has a bad region code, the second is valid
        assert_eq!(
            grammar().find("ZZ01AB1234MH12CD5678"),
            Some("MH12CD5678".to_string())
        );
    }

    #[test]
    fn test_four_digit_pattern_has_priority() {
        // The 3-digit form appears first in the text but the 4-digit form wins
        assert_eq!(
            grammar().find("KA01AB123XMH12CD5678"),
            Some("MH12CD5678".to_string())
        );
    }

    #[test]
    fn test_match_prefix_is_anchored() {
        assert_eq!(grammar().match_prefix("RJ11CV0002"), Some("RJ11CV0002".to_string()));
        assert_eq!(grammar().match_prefix("XRJ11CV0002"), None);
        assert_eq!(grammar().match_prefix("RJ11CV000"), Some("RJ11CV000".to_string()));
    }

    #[test]
    fn test_is_valid() {
        let g = grammar();
        assert!(g.is_valid("KA01AB1234"));
        assert!(g.is_valid("KA01A123"));
        assert!(!g.is_valid("KA01AB12345"));
        assert!(!g.is_valid("QQ01AB1234"));
        assert!(!g.is_valid(""));
    }
}
