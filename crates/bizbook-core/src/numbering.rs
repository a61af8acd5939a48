//! # Invoice Numbering
//!
//! Generates human-readable invoice numbers from the numbers already in use.
//!
//! ## Algorithm
//! ```text
//!   existing: INV-001, INV-003, DRAFT-9, INV-2026-004
//!                │         │        │          │
//!                ▼         ▼        ✗          ✗   (prefix / digits mismatch)
//!              1         3
//!                └────┬────┘
//!                     ▼
//!        max(3, settings.last_invoice_number) + 1 = 4
//!                     ▼
//!                 "INV-004"
//! ```
//!
//! The next number is always derived from the current maximum, so deleting
//! invoices out of order never produces a collision. The stored
//! `last_invoice_number` only acts as a floor.

use chrono::{DateTime, Datelike, Utc};

use crate::types::{BusinessSettings, NumberingMode};

/// Parses the trailing run of ASCII digits.
///
/// ## Example
/// ```rust
/// use bizbook_core::numbering::trailing_number;
///
/// assert_eq!(trailing_number("INV-042"), Some(42));
/// assert_eq!(trailing_number("INV-2026-007"), Some(7));
/// assert_eq!(trailing_number("DRAFT"), None);
/// ```
pub fn trailing_number(value: &str) -> Option<u64> {
    let digits_start = value
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    value[digits_start..].parse().ok()
}

/// Prefix in effect at `now`. Yearly numbering appends `YYYY-`.
pub fn effective_prefix(settings: &BusinessSettings, now: DateTime<Utc>) -> String {
    match settings.numbering_mode {
        NumberingMode::Sequential => settings.invoice_prefix.clone(),
        NumberingMode::Yearly => format!("{}{}-", settings.invoice_prefix, now.year()),
    }
}

/// Highest numeric suffix among `existing` numbers that carry `prefix`
/// followed by digits only. Unparsable entries are ignored.
pub fn max_suffix<'a>(existing: impl IntoIterator<Item = &'a str>, prefix: &str) -> Option<u64> {
    existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(prefix))
        .filter(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
}

/// Generates the next invoice number.
///
/// ## Example
/// ```rust
/// use bizbook_core::numbering::next_invoice_number;
/// use bizbook_core::types::BusinessSettings;
/// use chrono::Utc;
///
/// let settings = BusinessSettings::default();
/// let next = next_invoice_number(["INV-001", "INV-003"], &settings, Utc::now());
/// assert_eq!(next, "INV-004");
/// ```
pub fn next_invoice_number<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    settings: &BusinessSettings,
    now: DateTime<Utc>,
) -> String {
    let prefix = effective_prefix(settings, now);
    let current = max_suffix(existing, &prefix).unwrap_or(0);

    // The stored counter is a floor only for the never-resetting mode.
    let floor = match settings.numbering_mode {
        NumberingMode::Sequential => settings.last_invoice_number,
        NumberingMode::Yearly => 0,
    };

    let next = current.max(floor).saturating_add(1);
    format!(
        "{prefix}{next:0width$}",
        width = settings.invoice_number_width
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at_2026() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("INV-001"), Some(1));
        assert_eq!(trailing_number("123"), Some(123));
        assert_eq!(trailing_number("INV-"), None);
        assert_eq!(trailing_number(""), None);
    }

    #[test]
    fn test_gap_is_ignored() {
        let settings = BusinessSettings::default();
        let next = next_invoice_number(["INV-001", "INV-003"], &settings, at_2026());
        assert_eq!(next, "INV-004");
    }

    #[test]
    fn test_first_number() {
        let settings = BusinessSettings::default();
        let next = next_invoice_number(std::iter::empty(), &settings, at_2026());
        assert_eq!(next, "INV-001");
    }

    #[test]
    fn test_foreign_prefixes_and_garbage_ignored() {
        let settings = BusinessSettings::default();
        let next = next_invoice_number(
            ["INV-002", "BILL-900", "INV-abc", "INV-", "INV-12x"],
            &settings,
            at_2026(),
        );
        assert_eq!(next, "INV-003");
    }

    #[test]
    fn test_stored_counter_is_floor() {
        let settings = BusinessSettings {
            last_invoice_number: 41,
            ..BusinessSettings::default()
        };
        assert_eq!(
            next_invoice_number(["INV-007"], &settings, at_2026()),
            "INV-042"
        );
        assert_eq!(
            next_invoice_number(["INV-100"], &settings, at_2026()),
            "INV-101"
        );
    }

    #[test]
    fn test_width_grows_past_padding() {
        let settings = BusinessSettings::default();
        assert_eq!(
            next_invoice_number(["INV-999"], &settings, at_2026()),
            "INV-1000"
        );
    }

    #[test]
    fn test_yearly_mode_restarts() {
        let settings = BusinessSettings {
            numbering_mode: NumberingMode::Yearly,
            last_invoice_number: 500,
            ..BusinessSettings::default()
        };
        let next = next_invoice_number(
            ["INV-2025-017", "INV-2026-002"],
            &settings,
            at_2026(),
        );
        assert_eq!(next, "INV-2026-003");
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, ..ProptestConfig::default() })]

        #[test]
        fn prop_generated_numbers_are_unique_and_increasing(
            seed in prop::collection::vec(1u64..5_000u64, 0..10),
            n in 1usize..40,
        ) {
            let settings = BusinessSettings::default();
            let mut numbers: Vec<String> =
                seed.iter().map(|s| format!("INV-{s:03}")).collect();
            let mut last_suffix = seed.iter().copied().max().unwrap_or(0);

            for _ in 0..n {
                let next = next_invoice_number(
                    numbers.iter().map(String::as_str),
                    &settings,
                    at_2026(),
                );
                prop_assert!(!numbers.contains(&next));
                let suffix = trailing_number(&next).unwrap();
                prop_assert!(suffix > last_suffix);
                last_suffix = suffix;
                numbers.push(next);
            }
        }
    }
}
