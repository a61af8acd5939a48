//! Business expenses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{clean_optional_text, merge, merge_optional_text, PaymentMethod, Scope};
use crate::money::Money;

/// Money spent by the business, optionally attributed to a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub owner_id: String,
    pub category: String,
    pub description: String,
    pub amount_cents: i64,
    pub vendor_id: Option<String>,
    pub payment_method: PaymentMethod,
    /// When the expense was incurred; analytics windows filter on this.
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    pub fn apply_patch(&mut self, patch: &ExpensePatch) {
        if let Some(category) = &patch.category {
            self.category = category.trim().to_string();
        }
        if let Some(description) = &patch.description {
            self.description = description.trim().to_string();
        }
        merge(&mut self.amount_cents, &patch.amount_cents);
        merge_optional_text(&mut self.vendor_id, &patch.vendor_id);
        merge(&mut self.payment_method, &patch.payment_method);
        merge(&mut self.date, &patch.date);
    }
}

/// Fields for `add_expense`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewExpense {
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// Defaults to creation time.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub date: Option<DateTime<Utc>>,
}

impl NewExpense {
    pub fn into_expense(self, id: String, owner: &Scope, now: DateTime<Utc>) -> Expense {
        Expense {
            id,
            owner_id: owner.as_str().to_string(),
            category: self.category.trim().to_string(),
            description: self.description.trim().to_string(),
            amount_cents: self.amount_cents,
            vendor_id: clean_optional_text(self.vendor_id),
            payment_method: self.payment_method,
            date: self.date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for `update_expense`. An empty `vendor_id` detaches the vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct ExpensePatch {
    pub category: Option<String>,
    pub description: Option<String>,
    pub amount_cents: Option<i64>,
    pub vendor_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    #[ts(as = "Option<String>")]
    pub date: Option<DateTime<Utc>>,
}
