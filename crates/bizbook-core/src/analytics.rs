//! # Analytics
//!
//! Stateless folds over [`BusinessData`] producing the dashboard and report
//! figures.
//!
//! ## Evaluation Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BusinessData (current collections)                                     │
//! │        │                                                                │
//! │        ├──► total_sales / total_expenses / profit   (windowed)          │
//! │        ├──► top_products / top_customers            (ranked, stable)    │
//! │        ├──► sales_by_month / inventory_by_category  (grouped)           │
//! │        ├──► stock_summary / invoice_status_counts   (counted)           │
//! │        └──► dashboard_summary / customer_statement  (bundled)           │
//! │                                                                         │
//! │  Every call re-enumerates the collections. Nothing is cached.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Windows are half-open: `start <= t < end`. Empty collections produce
//! zeros and empty lists, never errors.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{BusinessData, Invoice, InvoiceKind, InvoiceStatus};

// =============================================================================
// Windows
// =============================================================================

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateWindow {
    #[ts(as = "String")]
    pub start: DateTime<Utc>,
    #[ts(as = "String")]
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        DateWindow { start, end }
    }

    #[inline]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

fn in_window(window: Option<&DateWindow>, at: DateTime<Utc>) -> bool {
    window.map_or(true, |w| w.contains(at))
}

/// Dashboard range selector, always ending at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Since midnight UTC.
    Today,
    /// The last 7 days.
    Week,
    /// The last calendar month.
    #[default]
    Month,
    /// The last 12 months.
    Year,
}

impl TimeRange {
    pub fn window(&self, now: DateTime<Utc>) -> DateWindow {
        let start = match self {
            TimeRange::Today => now.date_naive().and_time(NaiveTime::MIN).and_utc(),
            TimeRange::Week => now - Duration::days(7),
            TimeRange::Month => now.checked_sub_months(Months::new(1)).unwrap_or(now),
            TimeRange::Year => now.checked_sub_months(Months::new(12)).unwrap_or(now),
        };
        DateWindow::new(start, now)
    }
}

// =============================================================================
// Report Rows
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub quantity_sold: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TopCustomer {
    pub customer_id: String,
    pub name: String,
    pub paid_invoices: usize,
    pub total_paid: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlySales {
    pub year: i32,
    pub month: u32,
    pub invoices: usize,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryStock {
    pub category: String,
    pub products: usize,
    pub quantity: i64,
    pub value: Money,
}

/// Partition of the catalogue by stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockSummary {
    /// `quantity > low_stock_threshold`.
    pub in_stock: usize,
    /// Low but not empty.
    pub low_stock: usize,
    pub out_of_stock: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceStatusCounts {
    pub draft: usize,
    pub sent: usize,
    pub paid: usize,
    pub cancelled: usize,
}

/// The dashboard KPIs for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardSummary {
    pub window: DateWindow,
    pub total_sales: Money,
    pub total_expenses: Money,
    pub profit: Money,
    pub profit_margin_bps: i64,
    pub inventory_value: Money,
    pub outstanding: Money,
    pub low_stock_products: usize,
    pub pending_invoices: usize,
    pub overdue_invoices: usize,
    pub products: usize,
    pub customers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StatementEntryKind {
    Sale,
    Return,
    Payment,
}

/// One line of a customer statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatementEntry {
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub kind: StatementEntryKind,
    /// Invoice number the entry belongs to.
    pub reference: String,
    pub debit: Money,
    pub credit: Money,
    /// Running balance after this entry.
    pub balance: Money,
}

// =============================================================================
// Sales, Expenses, Profit
// =============================================================================

fn paid_sales<'a>(
    data: &'a BusinessData,
    window: Option<&'a DateWindow>,
) -> impl Iterator<Item = &'a Invoice> + 'a {
    data.invoices
        .iter()
        .filter(move |i| i.is_sale() && i.is_paid() && in_window(window, i.created_at))
}

/// Σ total of paid sale invoices created in the window.
pub fn total_sales(data: &BusinessData, window: Option<&DateWindow>) -> Money {
    paid_sales(data, window).map(Invoice::total).sum()
}

/// Σ amount of expenses dated in the window.
pub fn total_expenses(data: &BusinessData, window: Option<&DateWindow>) -> Money {
    data.expenses
        .iter()
        .filter(|e| in_window(window, e.date))
        .map(|e| e.amount())
        .sum()
}

/// Sales minus expenses. May be negative.
pub fn profit(data: &BusinessData, window: Option<&DateWindow>) -> Money {
    total_sales(data, window) - total_expenses(data, window)
}

/// Profit as basis points of sales; 0 when there were no sales.
pub fn profit_margin_bps(data: &BusinessData, window: Option<&DateWindow>) -> i64 {
    Money::ratio_bps(profit(data, window), total_sales(data, window))
}

/// Mean total of paid sale invoices, truncated to the cent.
pub fn average_invoice_value(data: &BusinessData, window: Option<&DateWindow>) -> Money {
    let (count, total) = paid_sales(data, window)
        .fold((0i64, Money::zero()), |(n, sum), i| (n + 1, sum + i.total()));
    if count == 0 {
        Money::zero()
    } else {
        Money::from_cents(total.cents() / count)
    }
}

/// Paid sales grouped by calendar month of creation, oldest first.
pub fn sales_by_month(data: &BusinessData, window: Option<&DateWindow>) -> Vec<MonthlySales> {
    let mut months: BTreeMap<(i32, u32), (usize, Money)> = BTreeMap::new();
    for invoice in paid_sales(data, window) {
        let key = (invoice.created_at.year(), invoice.created_at.month());
        let entry = months.entry(key).or_insert((0, Money::zero()));
        entry.0 += 1;
        entry.1 += invoice.total();
    }
    months
        .into_iter()
        .map(|((year, month), (invoices, total))| MonthlySales {
            year,
            month,
            invoices,
            total,
        })
        .collect()
}

// =============================================================================
// Rankings
// =============================================================================

/// Products ranked by quantity across all non-cancelled sale invoice lines.
///
/// Ties keep catalogue order. Products that never sold are left out.
pub fn top_products(data: &BusinessData, n: usize) -> Vec<TopProduct> {
    let mut sold: HashMap<&str, (i64, Money)> = HashMap::new();
    for invoice in data
        .invoices
        .iter()
        .filter(|i| i.is_sale() && !i.is_cancelled())
    {
        for item in &invoice.items {
            let entry = sold.entry(item.product_id.as_str()).or_insert((0, Money::zero()));
            entry.0 += item.quantity;
            entry.1 += item.line_total();
        }
    }

    let mut ranked: Vec<TopProduct> = data
        .products
        .iter()
        .filter_map(|p| {
            let (quantity_sold, revenue) = sold.get(p.id.as_str()).copied()?;
            (quantity_sold > 0).then(|| TopProduct {
                product_id: p.id.clone(),
                name: p.name.clone(),
                sku: p.sku.clone(),
                quantity_sold,
                revenue,
            })
        })
        .collect();

    // sort_by is stable, so equal quantities keep catalogue order.
    ranked.sort_by(|a, b| b.quantity_sold.cmp(&a.quantity_sold));
    ranked.truncate(n);
    ranked
}

/// Customers ranked by Σ total of their paid sale invoices.
///
/// Ties keep customer-list order. Customers with nothing paid are left out.
pub fn top_customers(data: &BusinessData, n: usize) -> Vec<TopCustomer> {
    let mut paid: HashMap<&str, (usize, Money)> = HashMap::new();
    for invoice in paid_sales(data, None) {
        let entry = paid
            .entry(invoice.customer_id.as_str())
            .or_insert((0, Money::zero()));
        entry.0 += 1;
        entry.1 += invoice.total();
    }

    let mut ranked: Vec<TopCustomer> = data
        .customers
        .iter()
        .filter_map(|c| {
            let (paid_invoices, total_paid) = paid.get(c.id.as_str()).copied()?;
            total_paid.is_positive().then(|| TopCustomer {
                customer_id: c.id.clone(),
                name: c.name.clone(),
                paid_invoices,
                total_paid,
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.total_paid.cmp(&a.total_paid));
    ranked.truncate(n);
    ranked
}

/// Customers with more than one non-cancelled sale invoice.
pub fn repeat_customer_count(data: &BusinessData) -> usize {
    let mut per_customer: HashMap<&str, usize> = HashMap::new();
    for invoice in data
        .invoices
        .iter()
        .filter(|i| i.is_sale() && !i.is_cancelled())
    {
        *per_customer.entry(invoice.customer_id.as_str()).or_default() += 1;
    }
    per_customer.values().filter(|&&count| count > 1).count()
}

// =============================================================================
// Inventory
// =============================================================================

/// Σ price × quantity over the catalogue.
pub fn inventory_value(data: &BusinessData) -> Money {
    data.products.iter().map(|p| p.stock_value()).sum()
}

/// Catalogue grouped by category, in order of first appearance.
pub fn inventory_by_category(data: &BusinessData) -> Vec<CategoryStock> {
    let mut rows: Vec<CategoryStock> = Vec::new();
    for product in &data.products {
        let row = match rows.iter_mut().position(|r| r.category == product.category) {
            Some(index) => &mut rows[index],
            None => {
                rows.push(CategoryStock {
                    category: product.category.clone(),
                    products: 0,
                    quantity: 0,
                    value: Money::zero(),
                });
                let last = rows.len() - 1;
                &mut rows[last]
            }
        };
        row.products += 1;
        row.quantity += product.quantity;
        row.value += product.stock_value();
    }
    rows
}

pub fn stock_summary(data: &BusinessData) -> StockSummary {
    data.products
        .iter()
        .fold(StockSummary::default(), |mut summary, p| {
            if p.is_out_of_stock() {
                summary.out_of_stock += 1;
            } else if p.is_low_stock() {
                summary.low_stock += 1;
            } else {
                summary.in_stock += 1;
            }
            summary
        })
}

// =============================================================================
// Invoices & Customers
// =============================================================================

/// Σ balance of pending (unpaid, not cancelled) sale invoices.
pub fn outstanding_total(data: &BusinessData) -> Money {
    data.invoices
        .iter()
        .filter(|i| i.is_sale() && i.is_pending())
        .map(Invoice::balance)
        .sum()
}

pub fn invoice_status_counts(data: &BusinessData) -> InvoiceStatusCounts {
    data.invoices
        .iter()
        .fold(InvoiceStatusCounts::default(), |mut counts, i| {
            match i.status {
                InvoiceStatus::Draft => counts.draft += 1,
                InvoiceStatus::Sent => counts.sent += 1,
                InvoiceStatus::Paid => counts.paid += 1,
                InvoiceStatus::Cancelled => counts.cancelled += 1,
            }
            counts
        })
}

/// Bundles the dashboard KPIs for `window`, with overdue evaluated at `now`.
pub fn dashboard_summary(
    data: &BusinessData,
    window: DateWindow,
    now: DateTime<Utc>,
) -> DashboardSummary {
    let total_sales = total_sales(data, Some(&window));
    let total_expenses = total_expenses(data, Some(&window));
    let profit = total_sales - total_expenses;

    DashboardSummary {
        window,
        total_sales,
        total_expenses,
        profit,
        profit_margin_bps: Money::ratio_bps(profit, total_sales),
        inventory_value: inventory_value(data),
        outstanding: outstanding_total(data),
        low_stock_products: data.products.iter().filter(|p| p.is_low_stock()).count(),
        pending_invoices: data.invoices.iter().filter(|i| i.is_pending()).count(),
        overdue_invoices: data
            .invoices
            .iter()
            .filter(|i| i.is_overdue_at(now))
            .count(),
        products: data.products.len(),
        customers: data.customers.len(),
    }
}

/// Chronological ledger of a customer's issued invoices and completed
/// payments with a running balance.
///
/// Sales debit, returns and payments credit. Entries on the same instant
/// keep invoice-then-payment collection order.
pub fn customer_statement(data: &BusinessData, customer_id: &str) -> Vec<StatementEntry> {
    let invoices: Vec<&Invoice> = data
        .invoices
        .iter()
        .filter(|i| i.customer_id == customer_id && i.is_issued())
        .collect();

    let mut entries: Vec<StatementEntry> = Vec::new();
    for invoice in &invoices {
        let (kind, debit, credit) = match invoice.kind {
            InvoiceKind::Sale => (StatementEntryKind::Sale, invoice.total(), Money::zero()),
            InvoiceKind::Return => (StatementEntryKind::Return, Money::zero(), invoice.total()),
        };
        entries.push(StatementEntry {
            date: invoice.created_at,
            kind,
            reference: invoice.invoice_number.clone(),
            debit,
            credit,
            balance: Money::zero(),
        });
    }
    for payment in data.payments.iter().filter(|p| p.is_completed()) {
        if let Some(invoice) = invoices.iter().find(|i| i.id == payment.invoice_id) {
            entries.push(StatementEntry {
                date: payment.created_at,
                kind: StatementEntryKind::Payment,
                reference: invoice.invoice_number.clone(),
                debit: Money::zero(),
                credit: payment.amount(),
                balance: Money::zero(),
            });
        }
    }

    entries.sort_by_key(|e| e.date);
    let mut balance = Money::zero();
    for entry in &mut entries {
        balance += entry.debit;
        balance -= entry.credit;
        entry.balance = balance;
    }
    entries
}

// =============================================================================
// Unit Tests
// =============================================================================
