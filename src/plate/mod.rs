//! Plate text layer
//!
//! Turns noisy recognizer output into validated plate strings:
//! - `correction`: per-slot confusable-character tables
//! - `grammar`: plate pattern matching and region-code whitelist
//! - `normalize`: cleaning, noise-token removal and the full normalization flow

pub mod correction;
pub mod grammar;
pub mod normalize;

pub use correction::{correct_char, SlotClass};
pub use grammar::PlateGrammar;
pub use normalize::TextNormalizer;

/// Region codes accepted by default (Indian state and union territory codes)
pub const DEFAULT_REGION_CODES: &[&str] = &[
    "AN", "AP", "AR", "AS", "BR", "CH", "CG", "DD", "DL", "DN", "GA", "GJ", "HP", "HR", "JH",
    "JK", "KA", "KL", "LA", "LD", "MH", "ML", "MN", "MP", "MZ", "NL", "OD", "OR", "PB", "PY",
    "RJ", "SK", "TN", "TR", "TS", "UK", "UP", "WB",
];

/// Tokens commonly read off vehicles that are never part of a plate:
/// manufacturer and model badges plus country markings
pub const DEFAULT_NOISE_TOKENS: &[&str] = &[
    "MARUTI", "MARUTISUZUKI", "SUZUKI", "HYUNDAI", "HONDA", "TATA", "MAHINDRA", "FORD",
    "TOYOTA", "KIA", "MG", "NISSAN", "RENAULT", "VOLKSWAGEN", "SKODA", "FIAT", "CHEVROLET",
    "DATSUN", "JEEP", "CIAZ", "SWIFT", "BALENO", "DZIRE", "CRETA", "VENUE", "CITY", "JAZZ",
    "AMAZE", "NEXON", "HARRIER", "SAFARI", "PUNCH", "ALTROZ", "SELTOS", "SONET", "HECTOR",
    "ASTOR", "INNOVA", "FORTUNER", "IND", "INDIA", "BHARAT", "BH", "SERIES",
];
