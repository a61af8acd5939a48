//! Customers and vendors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{clean_optional_text, merge, merge_optional_text, Scope};
use crate::money::Money;

// =============================================================================
// Customer
// =============================================================================

/// Customer classification tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTier {
    #[default]
    Regular,
    Premium,
    Wholesale,
}

/// A customer invoices are issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    /// Tax-registration (GST) number.
    pub gst_number: Option<String>,
    /// Zero means no limit.
    pub credit_limit_cents: i64,
    /// Derived: sum of balances on the customer's issued invoices.
    pub outstanding_balance_cents: i64,
    pub tier: CustomerTier,
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn outstanding_balance(&self) -> Money {
        Money::from_cents(self.outstanding_balance_cents)
    }

    /// True when a credit limit is set and the outstanding balance exceeds it.
    pub fn is_over_credit_limit(&self) -> bool {
        self.credit_limit_cents > 0 && self.outstanding_balance_cents > self.credit_limit_cents
    }

    pub fn apply_patch(&mut self, patch: &CustomerPatch) {
        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.trim().to_string();
        }
        merge_optional_text(&mut self.email, &patch.email);
        if let Some(address) = &patch.address {
            self.address = address.trim().to_string();
        }
        merge_optional_text(&mut self.gst_number, &patch.gst_number);
        merge(&mut self.credit_limit_cents, &patch.credit_limit_cents);
        merge(&mut self.tier, &patch.tier);
        merge(&mut self.loyalty_points, &patch.loyalty_points);
    }
}

/// Fields for `add_customer`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub credit_limit_cents: i64,
    #[serde(default)]
    pub tier: CustomerTier,
    #[serde(default)]
    pub loyalty_points: i64,
}

impl NewCustomer {
    pub fn into_customer(self, id: String, owner: &Scope, now: DateTime<Utc>) -> Customer {
        Customer {
            id,
            owner_id: owner.as_str().to_string(),
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: clean_optional_text(self.email),
            address: self.address.trim().to_string(),
            gst_number: clean_optional_text(self.gst_number),
            credit_limit_cents: self.credit_limit_cents,
            outstanding_balance_cents: 0,
            tier: self.tier,
            loyalty_points: self.loyalty_points,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for `update_customer`. The outstanding balance is derived
/// and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gst_number: Option<String>,
    pub credit_limit_cents: Option<i64>,
    pub tier: Option<CustomerTier>,
    pub loyalty_points: Option<i64>,
}

// =============================================================================
// Vendor
// =============================================================================

/// A supplier that expenses can be attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Vendor {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gst_number: Option<String>,
    /// Net payment terms in days.
    pub payment_terms_days: u32,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Vendor {
    pub fn apply_patch(&mut self, patch: &VendorPatch) {
        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        merge_optional_text(&mut self.contact_person, &patch.contact_person);
        if let Some(phone) = &patch.phone {
            self.phone = phone.trim().to_string();
        }
        merge_optional_text(&mut self.email, &patch.email);
        merge_optional_text(&mut self.address, &patch.address);
        merge_optional_text(&mut self.gst_number, &patch.gst_number);
        merge(&mut self.payment_terms_days, &patch.payment_terms_days);
    }
}

/// Fields for `add_vendor`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewVendor {
    pub name: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub payment_terms_days: u32,
}

impl NewVendor {
    pub fn into_vendor(self, id: String, owner: &Scope, now: DateTime<Utc>) -> Vendor {
        Vendor {
            id,
            owner_id: owner.as_str().to_string(),
            name: self.name.trim().to_string(),
            contact_person: clean_optional_text(self.contact_person),
            phone: self.phone.trim().to_string(),
            email: clean_optional_text(self.email),
            address: clean_optional_text(self.address),
            gst_number: clean_optional_text(self.gst_number),
            payment_terms_days: self.payment_terms_days,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for `update_vendor`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct VendorPatch {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gst_number: Option<String>,
    pub payment_terms_days: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_limit_zero_means_unlimited() {
        let mut c = NewCustomer {
            name: "Mike Chen".into(),
            phone: "+1122334455".into(),
            ..Default::default()
        }
        .into_customer("c-1".into(), &Scope::new("o"), Utc::now());

        c.outstanding_balance_cents = 1_000_000;
        assert!(!c.is_over_credit_limit());

        c.credit_limit_cents = 50_000;
        assert!(c.is_over_credit_limit());
    }

    #[test]
    fn test_customer_patch_clears_email() {
        let mut c = NewCustomer {
            name: "Sarah Johnson".into(),
            phone: "+1987654321".into(),
            email: Some("sarah.j@email.com".into()),
            ..Default::default()
        }
        .into_customer("c-2".into(), &Scope::new("o"), Utc::now());

        c.apply_patch(&CustomerPatch {
            email: Some(String::new()),
            tier: Some(CustomerTier::Premium),
            ..Default::default()
        });
        assert_eq!(c.email, None);
        assert_eq!(c.tier, CustomerTier::Premium);
    }
}
