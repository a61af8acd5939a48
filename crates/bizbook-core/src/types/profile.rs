//! Business profile and the settings consumed by numbering and formatting.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// How invoice numbers restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NumberingMode {
    /// `INV-001`, `INV-002`, ... forever.
    #[default]
    Sequential,
    /// `INV-2026-001`, restarting every calendar year.
    Yearly,
}

/// Read-only settings supplied by the configuration collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BusinessSettings {
    /// ISO currency code used when formatting report figures.
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,

    /// Zero-padding width of the numeric suffix.
    #[serde(default = "default_invoice_number_width")]
    pub invoice_number_width: usize,

    #[serde(default)]
    pub numbering_mode: NumberingMode,

    /// Floor for generated numbers; the next number is never below this + 1.
    #[serde(default)]
    pub last_invoice_number: u64,

    #[serde(default = "default_tax_rate_bps")]
    pub default_tax_rate_bps: u32,

    #[serde(default = "default_due_days")]
    pub default_due_days: u32,
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_invoice_prefix() -> String {
    "INV-".to_string()
}

fn default_invoice_number_width() -> usize {
    3
}

fn default_tax_rate_bps() -> u32 {
    1000
}

fn default_due_days() -> u32 {
    15
}

impl Default for BusinessSettings {
    fn default() -> Self {
        BusinessSettings {
            currency: default_currency(),
            invoice_prefix: default_invoice_prefix(),
            invoice_number_width: default_invoice_number_width(),
            numbering_mode: NumberingMode::default(),
            last_invoice_number: 0,
            default_tax_rate_bps: default_tax_rate_bps(),
            default_due_days: default_due_days(),
        }
    }
}

/// The business the store is keeping books for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BusinessProfile {
    #[serde(default = "default_company_name")]
    pub company_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub settings: BusinessSettings,
}

fn default_company_name() -> String {
    "My Business".to_string()
}

impl Default for BusinessProfile {
    fn default() -> Self {
        BusinessProfile {
            company_name: default_company_name(),
            address: None,
            phone: None,
            email: None,
            gst_number: None,
            settings: BusinessSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let s = BusinessSettings::default();
        assert_eq!(s.currency, "INR");
        assert_eq!(s.invoice_prefix, "INV-");
        assert_eq!(s.invoice_number_width, 3);
        assert_eq!(s.default_tax_rate_bps, 1000);
        assert_eq!(s.numbering_mode, NumberingMode::Sequential);
    }

    #[test]
    fn test_partial_settings_json_fills_defaults() {
        let s: BusinessSettings = serde_json::from_str(r#"{"invoice_prefix":"BILL/"}"#).unwrap();
        assert_eq!(s.invoice_prefix, "BILL/");
        assert_eq!(s.default_due_days, 15);
    }
}
