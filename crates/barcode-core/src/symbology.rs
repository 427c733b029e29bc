//! # Symbology Rules
//!
//! Normalization and pluggable format validation per [`BarcodeType`].
//!
//! ## Candidate Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  raw cell: " 501-2345 678900 "                                          │
//! │       │                                                                 │
//! │       ▼  normalize_code()   (always)                                    │
//! │  "5012345678900"                                                        │
//! │       │                                                                 │
//! │       ▼  FormatRule::check() (only when validate_format is on)          │
//! │  EAN-13: 13 digits + GS1 mod-10 check digit ✓                           │
//! │       │                                                                 │
//! │       ▼  numeric_value()                                                │
//! │  Some(5012345678900) → compared against the legacy threshold            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rules are trait objects so callers can replace the default rule for a
//! symbology (e.g. a retailer-specific GS1-128 layout) without touching
//! the importer.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::BarcodeType;
use crate::GS1_128_MAX_LEN;

// =============================================================================
// Normalization
// =============================================================================

/// Normalizes a raw code.
///
/// Drops whitespace, hyphens, quotes and the `(` `)` application-identifier
/// brackets, uppercases letters, and strips a trailing `.0` left behind by
/// spreadsheet numeric cells. Returns `None` if nothing significant remains.
///
/// ## Example
/// ```rust
/// use barcode_core::symbology::normalize_code;
///
/// assert_eq!(normalize_code(" 501-2345 678900 ").as_deref(), Some("5012345678900"));
/// assert_eq!(normalize_code("(01)09501101530003").as_deref(), Some("0109501101530003"));
/// assert_eq!(normalize_code("   "), None);
/// ```
pub fn normalize_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = match trimmed.strip_suffix(".0") {
        Some(head) if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) => head,
        _ => trimmed,
    };

    let code: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '\'' | '"' | '(' | ')'))
        .flat_map(char::to_uppercase)
        .collect();

    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// Numeric interpretation of a normalized code.
///
/// Returns `None` for codes that are not all digits or do not fit in `u128`.
/// Leading zeros are not significant (`"000123"` → `123`).
pub fn numeric_value(code: &str) -> Option<u128> {
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    code.parse::<u128>().ok()
}

// =============================================================================
// GS1 Check Digit
// =============================================================================

/// Computes the GS1 mod-10 check digit for `payload` (all digits, check digit excluded).
///
/// Weights alternate 3,1,3,… starting from the rightmost payload digit.
pub fn gs1_check_digit(payload: &str) -> Option<u8> {
    let mut sum: u32 = 0;
    for (i, b) in payload.bytes().rev().enumerate() {
        if !b.is_ascii_digit() {
            return None;
        }
        let digit = (b - b'0') as u32;
        sum += if i % 2 == 0 { digit * 3 } else { digit };
    }
    Some(((10 - (sum % 10)) % 10) as u8)
}

/// Returns true if the last digit of `code` is its GS1 check digit.
pub fn has_valid_gs1_check_digit(code: &str) -> bool {
    if !code.is_ascii() {
        return false;
    }
    let Some((payload, check)) = code.len().checked_sub(1).map(|n| code.split_at(n)) else {
        return false;
    };
    match (gs1_check_digit(payload), check.bytes().next()) {
        (Some(expected), Some(actual)) if actual.is_ascii_digit() => expected == actual - b'0',
        _ => false,
    }
}

// =============================================================================
// Format Rules
// =============================================================================

/// Structural check for one symbology.
///
/// `check` receives an already normalized code and returns a human-readable
/// reason on failure.
pub trait FormatRule: Send + Sync {
    fn check(&self, code: &str) -> Result<(), String>;
}

/// Fixed-length numeric GTIN with a GS1 mod-10 check digit (EAN-8/13, UPC-A, ITF-14).
#[derive(Debug, Clone, Copy)]
pub struct GtinRule {
    pub length: usize,
}

impl FormatRule for GtinRule {
    fn check(&self, code: &str) -> Result<(), String> {
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err("must contain only digits".to_string());
        }
        if code.len() != self.length {
            return Err(format!(
                "must be {} digits, got {}",
                self.length,
                code.len()
            ));
        }
        if !has_valid_gs1_check_digit(code) {
            return Err("check digit mismatch".to_string());
        }
        Ok(())
    }
}

/// GS1-128 human-readable data: printable ASCII up to the symbol capacity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gs1128Rule;

impl FormatRule for Gs1128Rule {
    fn check(&self, code: &str) -> Result<(), String> {
        if code.len() > GS1_128_MAX_LEN {
            return Err(format!(
                "must be at most {} characters, got {}",
                GS1_128_MAX_LEN,
                code.len()
            ));
        }
        if let Some(bad) = code.chars().find(|c| !('!'..='~').contains(c)) {
            return Err(format!("contains unsupported character {:?}", bad));
        }
        Ok(())
    }
}

/// Returns the built-in rule for a symbology.
pub fn default_rule(barcode_type: BarcodeType) -> Arc<dyn FormatRule> {
    match barcode_type {
        BarcodeType::Ean13 => Arc::new(GtinRule { length: 13 }),
        BarcodeType::Ean8 => Arc::new(GtinRule { length: 8 }),
        BarcodeType::UpcA => Arc::new(GtinRule { length: 12 }),
        BarcodeType::Itf14 => Arc::new(GtinRule { length: 14 }),
        BarcodeType::Gs1128 => Arc::new(Gs1128Rule),
    }
}

/// Rule registry used by the importer.
///
/// Starts with the built-in rule for every symbology; `with_rule` replaces one.
#[derive(Clone)]
pub struct FormatRules {
    rules: HashMap<BarcodeType, Arc<dyn FormatRule>>,
}

impl FormatRules {
    /// Registry with the built-in rules.
    pub fn standard() -> Self {
        FormatRules {
            rules: BarcodeType::ALL
                .into_iter()
                .map(|t| (t, default_rule(t)))
                .collect(),
        }
    }

    /// Replaces the rule for one symbology.
    pub fn with_rule(mut self, barcode_type: BarcodeType, rule: Arc<dyn FormatRule>) -> Self {
        self.rules.insert(barcode_type, rule);
        self
    }

    /// Checks `code` against the rule for `barcode_type`.
    pub fn check(&self, barcode_type: BarcodeType, code: &str) -> Result<(), String> {
        match self.rules.get(&barcode_type) {
            Some(rule) => rule.check(code),
            None => default_rule(barcode_type).check(code),
        }
    }
}

impl Default for FormatRules {
    fn default() -> Self {
        FormatRules::standard()
    }
}

impl std::fmt::Debug for FormatRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRules")
            .field("types", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("5012345678900").as_deref(), Some("5012345678900"));
        assert_eq!(normalize_code("'5012345678900").as_deref(), Some("5012345678900"));
        assert_eq!(normalize_code("5012345678900.0").as_deref(), Some("5012345678900"));
        assert_eq!(normalize_code("abc-123").as_deref(), Some("ABC123"));
        assert_eq!(normalize_code(""), None);
        assert_eq!(normalize_code(" - "), None);
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value("40000"), Some(40000));
        assert_eq!(numeric_value("0040000"), Some(40000));
        assert_eq!(numeric_value("12A"), None);
        assert_eq!(numeric_value(""), None);
        assert_eq!(numeric_value(&"9".repeat(60)), None);
    }

    #[test]
    fn test_gs1_check_digit() {
        // 501234567890 → 0
        assert_eq!(gs1_check_digit("501234567890"), Some(0));
        // 400638133393 → 1 (EAN-13 4006381333931)
        assert_eq!(gs1_check_digit("400638133393"), Some(1));
        // UPC-A 03600029145 → 2
        assert_eq!(gs1_check_digit("03600029145"), Some(2));
        assert_eq!(gs1_check_digit("12a"), None);
    }

    #[test]
    fn test_gtin_rules() {
        let rules = FormatRules::standard();
        assert!(rules.check(BarcodeType::Ean13, "5012345678900").is_ok());
        assert!(rules.check(BarcodeType::Ean13, "4006381333931").is_ok());
        assert!(rules.check(BarcodeType::Ean13, "4006381333932").is_err());
        assert!(rules.check(BarcodeType::Ean13, "400638133393").is_err());
        assert!(rules.check(BarcodeType::UpcA, "036000291452").is_ok());
        assert!(rules.check(BarcodeType::Ean8, "96385074").is_ok());
        assert!(rules.check(BarcodeType::Itf14, "15012345678907").is_ok());
        assert!(rules.check(BarcodeType::Ean13, "50123456789AB").is_err());
    }

    #[test]
    fn test_gs1_128_rule() {
        let rules = FormatRules::standard();
        assert!(rules.check(BarcodeType::Gs1128, "0109501101530003").is_ok());
        assert!(rules.check(BarcodeType::Gs1128, &"1".repeat(49)).is_err());
        assert!(rules.check(BarcodeType::Gs1128, "AB\u{e9}").is_err());
    }

    #[test]
    fn test_custom_rule_replaces_default() {
        struct AnyDigits;
        impl FormatRule for AnyDigits {
            fn check(&self, code: &str) -> Result<(), String> {
                if code.bytes().all(|b| b.is_ascii_digit()) {
                    Ok(())
                } else {
                    Err("digits only".to_string())
                }
            }
        }

        let rules = FormatRules::standard().with_rule(BarcodeType::Ean13, Arc::new(AnyDigits));
        assert!(rules.check(BarcodeType::Ean13, "42").is_ok());
        assert!(rules.check(BarcodeType::Ean8, "42").is_err());
    }
}
