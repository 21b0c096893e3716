//! Raw recognizer text to validated plate string

use tracing::debug;

use super::correction::{correct_all, correct_prefix};
use super::grammar::PlateGrammar;
use crate::config::GrammarConfig;

/// Minimum cleaned length before speculative correction is attempted
const SPECULATIVE_MIN_LEN: usize = 8;
/// Characters considered by speculative correction
const SPECULATIVE_MAX_LEN: usize = 10;

/// Cleans raw recognizer output and extracts a grammar-valid plate
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    grammar: PlateGrammar,
    /// Non-plate tokens, longest first
    noise_tokens: Vec<String>,
}

impl TextNormalizer {
    /// Create a normalizer from a grammar and a list of non-plate tokens
    pub fn new<I, S>(grammar: PlateGrammar, noise_tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut noise_tokens: Vec<String> = noise_tokens
            .into_iter()
            .map(|t| strip_to_alphanumeric(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        // Longer tokens go first so "MARUTISUZUKI" is not split by "MARUTI"
        noise_tokens.sort_by(|a, b| b.len().cmp(&a.len()));
        noise_tokens.dedup();

        Self {
            grammar,
            noise_tokens,
        }
    }

    /// Build a normalizer from the grammar section of the engine config
    pub fn from_config(config: &GrammarConfig) -> Result<Self, regex::Error> {
        let grammar = PlateGrammar::new(&config.region_codes)?;
        Ok(Self::new(grammar, &config.noise_tokens))
    }

    /// The grammar used for matching
    pub fn grammar(&self) -> &PlateGrammar {
        &self.grammar
    }

    /// Uppercase, keep `[A-Z0-9]`, and remove every non-plate token
    pub fn clean(&self, raw: &str) -> String {
        let mut text = strip_to_alphanumeric(raw);
        for token in &self.noise_tokens {
            if text.contains(token.as_str()) {
                text = text.replace(token.as_str(), "");
            }
        }
        text
    }

    /// Normalize raw text into a validated plate, if one can be recovered
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let cleaned = self.clean(raw);

        if let Some(span) = self.grammar.find(&cleaned) {
            let plate = correct_all(&span);
            debug!("Normalized {:?} -> {}", raw, plate);
            return Some(plate);
        }

        if cleaned.len() >= SPECULATIVE_MIN_LEN {
            let corrected = correct_prefix(&cleaned, SPECULATIVE_MAX_LEN);
            if let Some(plate) = self.grammar.match_prefix(&corrected) {
                debug!("Normalized {:?} -> {} after speculative correction", raw, plate);
                return Some(plate);
            }
        }

        None
    }
}

/// Uppercase and drop everything outside ASCII letters and digits
fn strip_to_alphanumeric(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::from_config(&GrammarConfig::default()).unwrap()
    }

    #[test]
    fn test_brand_token_removed() {
        assert_eq!(
            normalizer().normalize("MARUTI RJ11CV0002"),
            Some("RJ11CV0002".to_string())
        );
    }

    #[test]
    fn test_valid_plate_passes_through() {
        assert_eq!(
            normalizer().normalize("RJ11AB1234"),
            Some("RJ11AB1234".to_string())
        );
    }

    #[test]
    fn test_lowercase_l_in_digit_slot() {
        assert_eq!(
            normalizer().normalize("KA0lAB1234"),
            Some("KA01AB1234".to_string())
        );
    }

    #[test]
    fn test_punctuation_and_case_stripped() {
        assert_eq!(
            normalizer().normalize("ka-01 ab.1234"),
            Some("KA01AB1234".to_string())
        );
    }

    #[test]
    fn test_longer_tokens_removed_first() {
        let n = normalizer();
        assert_eq!(n.clean("MARUTISUZUKIKA01AB1234"), "KA01AB1234");
        assert_eq!(n.clean("INDIA"), "");
    }

    #[test]
    fn test_speculative_correction_requires_region_code() {
        // Corrects to "QQ01AB1234" which has no valid region code
        assert_eq!(normalizer().normalize("QQ0LAB1234"), None);
    }

    #[test]
    fn test_short_garbage_is_rejected() {
        assert_eq!(normalizer().normalize(""), None);
        assert_eq!(normalizer().normalize("HELLO"), None);
        assert_eq!(normalizer().normalize("!!!"), None);
    }

    #[test]
    fn test_custom_noise_tokens() {
        let grammar = PlateGrammar::new(["KA"]).unwrap();
        let n = TextNormalizer::new(grammar, ["parking", "gate-2"]);
        assert_eq!(n.clean("Parking GATE2 KA01AB1234"), "KA01AB1234");
    }

    #[test]
    fn test_normalize_is_idempotent_on_output() {
        let n = normalizer();
        let plate = n.normalize("MH 12 DE 1433").unwrap();
        assert_eq!(n.normalize(&plate), Some(plate.clone()));
    }

    #[test]
    fn test_single_letter_series_corrected_by_position() {
        let n = normalizer();
        // Index 5 is a series slot even when the series has one letter, so a
        // leading serial `1` reads as `I` and the plate becomes two-letter series
        let plate = n.normalize("KA01A1234").unwrap();
        assert_eq!(plate, "KA01AI234");
        assert!(n.grammar().is_valid(&plate));

        // Serial digits without a letter look-alike survive
        assert_eq!(n.normalize("KA01A7234"), Some("KA01A7234".to_string()));
    }
}
