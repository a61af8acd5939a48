//! # Sample Data
//!
//! A small demo business loaded into an empty store when
//! `store.seed_on_empty` is set.
//!
//! ```text
//! 5 products    WH001 CM001 OC001 SC001 WB001   (CM001, WB001 low on stock)
//! 3 customers   John Smith, Sarah Johnson, Mike Chen
//! 2 invoices    #1 John   24747  sent, overdue
//!               #2 Sarah  16499  paid in full
//! 1 payment     against #2
//! ```
//!
//! Derived fields are computed with the same core functions the store uses,
//! so the seeded collections satisfy every invariant a mutation would.

use chrono::{DateTime, Duration, Utc};

use bizbook_core::inventory::opening_movement;
use bizbook_core::invoice::{apply_payments, build_item, customer_outstanding, recompute_totals};
use bizbook_core::numbering::next_invoice_number;
use bizbook_core::{
    new_id, BusinessData, BusinessSettings, Customer, Invoice, InvoiceKind, InvoiceStatus,
    NewCustomer, NewInvoiceItem, NewProduct, Payment, PaymentMethod, PaymentStatus, Product,
    Scope, TransactionStatus,
};

fn product(
    name: &str,
    sku: &str,
    price_cents: i64,
    quantity: i64,
    threshold: i64,
    category: &str,
) -> NewProduct {
    NewProduct {
        name: name.into(),
        sku: sku.into(),
        price_cents,
        quantity,
        category: category.into(),
        low_stock_threshold: threshold,
        ..Default::default()
    }
}

fn customer(name: &str, phone: &str, email: &str, address: &str, gst: Option<&str>) -> NewCustomer {
    NewCustomer {
        name: name.into(),
        phone: phone.into(),
        email: Some(email.into()),
        address: address.into(),
        gst_number: gst.map(Into::into),
        ..Default::default()
    }
}

struct SampleInvoice<'a> {
    customer: &'a Customer,
    lines: Vec<(&'a Product, i64)>,
    created_at: DateTime<Utc>,
    due_date: DateTime<Utc>,
}

fn build_invoice(
    sample: SampleInvoice<'_>,
    number: String,
    scope: &Scope,
    settings: &BusinessSettings,
) -> Invoice {
    let items = sample
        .lines
        .iter()
        .map(|(product, quantity)| build_item(product, &NewInvoiceItem::new(&product.id, *quantity)))
        .collect();

    let mut invoice = Invoice {
        id: new_id(),
        owner_id: scope.as_str().to_string(),
        invoice_number: number,
        kind: InvoiceKind::Sale,
        customer_id: sample.customer.id.clone(),
        customer_name: sample.customer.name.clone(),
        items,
        tax_rate_bps: settings.default_tax_rate_bps,
        discount_cents: 0,
        subtotal_cents: 0,
        tax_cents: 0,
        total_cents: 0,
        paid_amount_cents: 0,
        balance_amount_cents: 0,
        payment_status: PaymentStatus::Pending,
        status: InvoiceStatus::Sent,
        due_date: sample.due_date,
        notes: None,
        created_at: sample.created_at,
        updated_at: sample.created_at,
    };
    recompute_totals(&mut invoice);
    invoice
}

/// Builds the sample business for `scope` as of `now`.
pub fn sample_data(scope: &Scope, settings: &BusinessSettings, now: DateTime<Utc>) -> BusinessData {
    let products: Vec<Product> = [
        NewProduct {
            barcode: Some("1234567890123".into()),
            ..product("Wireless Headphones", "WH001", 9999, 25, 10, "Electronics")
        },
        product("Coffee Mug", "CM001", 1299, 5, 10, "Home & Kitchen"),
        product("Office Chair", "OC001", 14999, 8, 5, "Furniture"),
        product("Smartphone Case", "SC001", 2499, 50, 15, "Electronics"),
        product("Water Bottle", "WB001", 1999, 3, 10, "Sports"),
    ]
    .into_iter()
    .map(|input| input.into_product(new_id(), scope, now))
    .collect();

    let mut customers: Vec<Customer> = [
        customer(
            "John Smith",
            "+1234567890",
            "john.smith@email.com",
            "123 Main St, City, State 12345",
            Some("GST123456789"),
        ),
        customer(
            "Sarah Johnson",
            "+1987654321",
            "sarah.j@email.com",
            "456 Oak Ave, City, State 12345",
            None,
        ),
        customer(
            "Mike Chen",
            "+1122334455",
            "mike.chen@email.com",
            "789 Pine Rd, City, State 12345",
            Some("GST987654321"),
        ),
    ]
    .into_iter()
    .map(|input| input.into_customer(new_id(), scope, now))
    .collect();

    let samples = vec![
        SampleInvoice {
            customer: &customers[0],
            lines: vec![(&products[0], 2), (&products[3], 1)],
            created_at: now - Duration::days(20),
            due_date: now - Duration::days(5),
        },
        SampleInvoice {
            customer: &customers[1],
            lines: vec![(&products[2], 1)],
            created_at: now - Duration::days(10),
            due_date: now + Duration::days(5),
        },
    ];

    let mut invoices: Vec<Invoice> = Vec::with_capacity(samples.len());
    for sample in samples {
        let number = next_invoice_number(
            invoices.iter().map(|i| i.invoice_number.as_str()),
            settings,
            sample.created_at,
        );
        invoices.push(build_invoice(sample, number, scope, settings));
    }

    let paid_at = now - Duration::days(8);
    let payments = vec![Payment {
        id: new_id(),
        owner_id: scope.as_str().to_string(),
        invoice_id: invoices[1].id.clone(),
        amount_cents: invoices[1].total_cents,
        method: PaymentMethod::BankTransfer,
        status: TransactionStatus::Completed,
        reference: None,
        created_at: paid_at,
        updated_at: paid_at,
    }];
    for invoice in &mut invoices {
        apply_payments(invoice, &payments);
    }

    for customer in &mut customers {
        customer.outstanding_balance_cents = customer_outstanding(&customer.id, &invoices).cents();
    }

    let stock_movements = products
        .iter()
        .filter_map(|p| opening_movement(p, new_id(), scope, now))
        .collect();

    BusinessData {
        products,
        customers,
        vendors: Vec::new(),
        invoices,
        payments,
        expenses: Vec::new(),
        stock_movements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizbook_core::query::overdue_at;
    use bizbook_core::validation::{validate_customer, validate_product};

    fn seeded() -> (BusinessData, DateTime<Utc>) {
        let now = Utc::now();
        let data = sample_data(&Scope::new("shop"), &BusinessSettings::default(), now);
        (data, now)
    }

    #[test]
    fn test_sample_counts_and_validity() {
        let (data, _) = seeded();
        let counts = data.counts();
        assert_eq!(
            (counts.products, counts.customers, counts.invoices, counts.payments),
            (5, 3, 2, 1)
        );
        assert_eq!(counts.stock_movements, 5);
        assert!(data.products.iter().all(|p| validate_product(p).is_ok()));
        assert!(data.customers.iter().all(|c| validate_customer(c).is_ok()));
        assert!(data.products.iter().all(|p| p.owner_id == "shop"));
    }

    #[test]
    fn test_sample_invoices() {
        let (data, now) = seeded();
        let first = &data.invoices[0];
        assert_eq!(first.invoice_number, "INV-001");
        assert_eq!(first.subtotal_cents, 22497);
        assert_eq!(first.tax_cents, 2250);
        assert_eq!(first.total_cents, 24747);
        assert_eq!(first.status, InvoiceStatus::Sent);

        let second = &data.invoices[1];
        assert_eq!(second.invoice_number, "INV-002");
        assert_eq!(second.total_cents, 16499);
        assert_eq!(second.status, InvoiceStatus::Paid);
        assert_eq!(second.balance_amount_cents, 0);

        let overdue = overdue_at(&data.invoices, now);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, first.id);
    }

    #[test]
    fn test_sample_outstanding_and_low_stock() {
        let (data, _) = seeded();
        let john = &data.customers[0];
        assert_eq!(john.outstanding_balance_cents, 24747);
        assert_eq!(data.customers[1].outstanding_balance_cents, 0);

        let low: Vec<&str> = data
            .products
            .iter()
            .filter(|p| p.is_low_stock())
            .map(|p| p.sku.as_str())
            .collect();
        assert_eq!(low, vec!["CM001", "WB001"]);
    }
}
