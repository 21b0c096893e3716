//! Positional character correction
//!
//! Recognizers routinely confuse glyph pairs such as `0`/`O`, `1`/`I` and
//! `8`/`B`. Every plate position belongs to a slot that expects either a letter
//! or a digit, so a confusable glyph in the wrong class is swapped for its
//! look-alike from the expected class.

/// Digit look-alikes for letters in the region-code slot
const REGION_DIGIT_TO_LETTER: &[(char, char)] = &[
    ('0', 'O'),
    ('1', 'I'),
    ('2', 'Z'),
    ('3', 'E'),
    ('4', 'A'),
    ('5', 'S'),
    ('6', 'G'),
    ('8', 'B'),
    ('9', 'P'),
];

/// Digit look-alikes for letters in the series slot (no `4` or `9`)
const SERIES_DIGIT_TO_LETTER: &[(char, char)] = &[
    ('0', 'O'),
    ('1', 'I'),
    ('2', 'Z'),
    ('3', 'E'),
    ('5', 'S'),
    ('6', 'G'),
    ('8', 'B'),
];

/// Letter look-alikes for digits in the district and serial slots
const LETTER_TO_DIGIT: &[(char, char)] = &[
    ('O', '0'),
    ('Q', '0'),
    ('D', '0'),
    ('I', '1'),
    ('L', '1'),
    ('Z', '2'),
    ('S', '5'),
    ('G', '6'),
    ('B', '8'),
];

/// Character class expected at a plate position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClass {
    /// Positions 0-1: two-letter region code
    RegionCode,
    /// Positions 2-3: two-digit district code
    District,
    /// Positions 4-5: one or two series letters (loosely letter-preferring)
    Series,
    /// Positions 6 and beyond: serial number digits
    Serial,
}

impl SlotClass {
    /// Slot class for a character index within a plate string
    pub fn for_index(index: usize) -> Self {
        match index {
            0 | 1 => SlotClass::RegionCode,
            2 | 3 => SlotClass::District,
            4 | 5 => SlotClass::Series,
            _ => SlotClass::Serial,
        }
    }

    /// Substitution table applied in this slot
    pub fn table(self) -> &'static [(char, char)] {
        match self {
            SlotClass::RegionCode => REGION_DIGIT_TO_LETTER,
            SlotClass::Series => SERIES_DIGIT_TO_LETTER,
            SlotClass::District | SlotClass::Serial => LETTER_TO_DIGIT,
        }
    }

    /// Whether the slot expects letters
    pub fn expects_letter(self) -> bool {
        matches!(self, SlotClass::RegionCode | SlotClass::Series)
    }
}

/// Correct a single character given its index in the plate string.
///
/// Characters already in the expected class, and characters with no
/// look-alike, pass through unchanged (uppercased).
pub fn correct_char(c: char, index: usize) -> char {
    let c = c.to_ascii_uppercase();
    SlotClass::for_index(index)
        .table()
        .iter()
        .find(|(from, _)| *from == c)
        .map(|&(_, to)| to)
        .unwrap_or(c)
}

/// Correct every character of `text` by its position.
///
/// Slots follow the index alone, so index 5 is treated as a series letter even
/// in a plate with a one-letter series.
pub fn correct_all(text: &str) -> String {
    text.chars()
        .enumerate()
        .map(|(i, c)| correct_char(c, i))
        .collect()
}

/// Correct at most the first `limit` characters, dropping the rest
pub fn correct_prefix(text: &str, limit: usize) -> String {
    text.chars()
        .take(limit)
        .enumerate()
        .map(|(i, c)| correct_char(c, i))
        .collect()
}
