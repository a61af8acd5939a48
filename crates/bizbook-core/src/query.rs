//! Search and filter helpers over entity slices.
//!
//! Matching is a case-insensitive substring test. An empty query matches
//! everything. Results keep collection order.

use chrono::{DateTime, Utc};

use crate::types::{Customer, Invoice, Product, Vendor};

fn contains(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn contains_opt(haystack: &Option<String>, needle_lower: &str) -> bool {
    haystack
        .as_deref()
        .is_some_and(|h| contains(h, needle_lower))
}

/// Products by name, SKU, barcode or category.
pub fn search_products<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
    let q = query.trim().to_lowercase();
    products
        .iter()
        .filter(|p| {
            contains(&p.name, &q)
                || contains(&p.sku, &q)
                || contains(&p.category, &q)
                || contains_opt(&p.barcode, &q)
        })
        .collect()
}

/// Customers by name, phone, email or GST number.
pub fn search_customers<'a>(customers: &'a [Customer], query: &str) -> Vec<&'a Customer> {
    let q = query.trim().to_lowercase();
    customers
        .iter()
        .filter(|c| {
            contains(&c.name, &q)
                || contains(&c.phone, &q)
                || contains_opt(&c.email, &q)
                || contains_opt(&c.gst_number, &q)
        })
        .collect()
}

/// Vendors by name, contact person, phone, email or GST number.
pub fn search_vendors<'a>(vendors: &'a [Vendor], query: &str) -> Vec<&'a Vendor> {
    let q = query.trim().to_lowercase();
    vendors
        .iter()
        .filter(|v| {
            contains(&v.name, &q)
                || contains(&v.phone, &q)
                || contains_opt(&v.contact_person, &q)
                || contains_opt(&v.email, &q)
                || contains_opt(&v.gst_number, &q)
        })
        .collect()
}

/// Invoices by number or the customer-name snapshot.
pub fn search_invoices<'a>(invoices: &'a [Invoice], query: &str) -> Vec<&'a Invoice> {
    let q = query.trim().to_lowercase();
    invoices
        .iter()
        .filter(|i| contains(&i.invoice_number, &q) || contains(&i.customer_name, &q))
        .collect()
}

pub fn low_stock(products: &[Product]) -> Vec<&Product> {
    products.iter().filter(|p| p.is_low_stock()).collect()
}

/// Not cancelled and not fully paid.
pub fn pending(invoices: &[Invoice]) -> Vec<&Invoice> {
    invoices.iter().filter(|i| i.is_pending()).collect()
}

/// Pending or partially paid with `due_date` strictly before `now`.
pub fn overdue_at(invoices: &[Invoice], now: DateTime<Utc>) -> Vec<&Invoice> {
    invoices.iter().filter(|i| i.is_overdue_at(now)).collect()
}

pub fn over_credit_limit(customers: &[Customer]) -> Vec<&Customer> {
    customers
        .iter()
        .filter(|c| c.is_over_credit_limit())
        .collect()
}
