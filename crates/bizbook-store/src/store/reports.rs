//! Analytics over the live collections.
//!
//! Every call re-folds the full collections under the read lock; nothing is
//! cached between calls.

use chrono::{DateTime, Utc};

use bizbook_core::analytics::{
    self, CategoryStock, DashboardSummary, DateWindow, InvoiceStatusCounts, MonthlySales,
    StockSummary, TimeRange, TopCustomer, TopProduct,
};
use bizbook_core::Money;

use super::BusinessStore;

impl BusinessStore {
    /// Σ total of paid sale invoices created in the window (all time when
    /// `None`).
    pub fn total_sales(&self, window: Option<DateWindow>) -> Money {
        self.with_data(|data| analytics::total_sales(data, window.as_ref()))
    }

    pub fn total_expenses(&self, window: Option<DateWindow>) -> Money {
        self.with_data(|data| analytics::total_expenses(data, window.as_ref()))
    }

    /// Sales minus expenses. May be negative.
    pub fn profit(&self, window: Option<DateWindow>) -> Money {
        self.with_data(|data| analytics::profit(data, window.as_ref()))
    }

    pub fn profit_margin_bps(&self, window: Option<DateWindow>) -> i64 {
        self.with_data(|data| analytics::profit_margin_bps(data, window.as_ref()))
    }

    pub fn average_invoice_value(&self, window: Option<DateWindow>) -> Money {
        self.with_data(|data| analytics::average_invoice_value(data, window.as_ref()))
    }

    pub fn sales_by_month(&self, window: Option<DateWindow>) -> Vec<MonthlySales> {
        self.with_data(|data| analytics::sales_by_month(data, window.as_ref()))
    }

    /// Products ranked by quantity sold, ties in catalogue order.
    pub fn top_products(&self, n: usize) -> Vec<TopProduct> {
        self.with_data(|data| analytics::top_products(data, n))
    }

    /// Customers ranked by paid revenue, ties in insertion order.
    pub fn top_customers(&self, n: usize) -> Vec<TopCustomer> {
        self.with_data(|data| analytics::top_customers(data, n))
    }

    pub fn repeat_customer_count(&self) -> usize {
        self.with_data(analytics::repeat_customer_count)
    }

    pub fn inventory_value(&self) -> Money {
        self.with_data(analytics::inventory_value)
    }

    pub fn inventory_by_category(&self) -> Vec<CategoryStock> {
        self.with_data(analytics::inventory_by_category)
    }

    pub fn stock_summary(&self) -> StockSummary {
        self.with_data(analytics::stock_summary)
    }

    pub fn outstanding_total(&self) -> Money {
        self.with_data(analytics::outstanding_total)
    }

    pub fn invoice_status_counts(&self) -> InvoiceStatusCounts {
        self.with_data(analytics::invoice_status_counts)
    }

    /// Dashboard KPIs for `range` ending now.
    pub fn dashboard(&self, range: TimeRange) -> DashboardSummary {
        let now = Utc::now();
        self.dashboard_for(range.window(now), now)
    }

    pub fn dashboard_for(&self, window: DateWindow, now: DateTime<Utc>) -> DashboardSummary {
        self.with_data(|data| analytics::dashboard_summary(data, window, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests_support::ready_store;
    use bizbook_core::{
        InvoiceStatus, NewCustomer, NewExpense, NewInvoice, NewInvoiceItem, NewPayment, NewProduct,
    };
    use chrono::Duration;

    #[tokio::test]
    async fn test_reports_follow_mutations() {
        let store = ready_store().await;
        let customer = store
            .add_customer(NewCustomer {
                name: "Sarah Johnson".into(),
                phone: "+1987654321".into(),
                ..Default::default()
            })
            .unwrap();
        let chair = store
            .add_product(NewProduct {
                name: "Office Chair".into(),
                sku: "OC001".into(),
                price_cents: 14999,
                quantity: 8,
                category: "Furniture".into(),
                low_stock_threshold: 5,
                ..Default::default()
            })
            .unwrap();
        let invoice = store
            .add_invoice(NewInvoice {
                customer_id: customer.id.clone(),
                items: vec![NewInvoiceItem::new(&chair.id, 1)],
                status: InvoiceStatus::Sent,
                ..Default::default()
            })
            .unwrap();
        store
            .add_expense(NewExpense {
                category: "Utilities".into(),
                amount_cents: 4000,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.total_sales(None), Money::zero());
        assert_eq!(store.outstanding_total().cents(), 16499);

        store
            .add_payment(NewPayment::completed(&invoice.id, invoice.total_cents))
            .unwrap();

        assert_eq!(store.total_sales(None).cents(), 16499);
        assert_eq!(store.profit(None).cents(), 12499);
        assert_eq!(store.top_customers(5)[0].customer_id, customer.id);
        assert_eq!(store.top_products(5)[0].quantity_sold, 1);
        assert_eq!(store.inventory_value().cents(), 14999 * 8);
        assert_eq!(store.invoice_status_counts().paid, 1);

        let dashboard = store.dashboard(TimeRange::Month);
        assert_eq!(dashboard.total_sales.cents(), 16499);
        assert_eq!(dashboard.total_expenses.cents(), 4000);
        assert_eq!(dashboard.outstanding, Money::zero());

        let past = DateWindow::new(
            Utc::now() - Duration::days(60),
            Utc::now() - Duration::days(30),
        );
        assert_eq!(store.total_sales(Some(past)), Money::zero());
    }
}
