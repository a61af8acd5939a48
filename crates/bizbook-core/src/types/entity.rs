//! Entity envelope types shared by the store, the Persistence Port and storage.
//!
//! ```text
//! Business Store ──EntityChange::Upsert/Delete──► Persistence Port ──► storage
//!       ▲                                                │
//!       └──────────RemoteChange::Insert/Update/Delete────┘ (change feed)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use super::{Customer, Expense, Invoice, Payment, Product, StockMovement, Vendor};
use crate::error::ValidationError;

// =============================================================================
// Entity Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Customer,
    Vendor,
    Invoice,
    Payment,
    Expense,
    StockMovement,
}

impl EntityKind {
    /// Every kind, in load order (referenced kinds before referencing ones).
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Product,
        EntityKind::Customer,
        EntityKind::Vendor,
        EntityKind::Invoice,
        EntityKind::Payment,
        EntityKind::Expense,
        EntityKind::StockMovement,
    ];

    /// Storage and log name (`"stock_movement"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Customer => "customer",
            EntityKind::Vendor => "vendor",
            EntityKind::Invoice => "invoice",
            EntityKind::Payment => "payment",
            EntityKind::Expense => "expense",
            EntityKind::StockMovement => "stock_movement",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "entity_type".to_string(),
                reason: format!("unknown entity type '{}'", s),
            })
    }
}

// =============================================================================
// Entity
// =============================================================================

/// Any one of the seven business entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Entity {
    Product(Product),
    Customer(Customer),
    Vendor(Vendor),
    Invoice(Invoice),
    Payment(Payment),
    Expense(Expense),
    StockMovement(StockMovement),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Product(_) => EntityKind::Product,
            Entity::Customer(_) => EntityKind::Customer,
            Entity::Vendor(_) => EntityKind::Vendor,
            Entity::Invoice(_) => EntityKind::Invoice,
            Entity::Payment(_) => EntityKind::Payment,
            Entity::Expense(_) => EntityKind::Expense,
            Entity::StockMovement(_) => EntityKind::StockMovement,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Product(e) => &e.id,
            Entity::Customer(e) => &e.id,
            Entity::Vendor(e) => &e.id,
            Entity::Invoice(e) => &e.id,
            Entity::Payment(e) => &e.id,
            Entity::Expense(e) => &e.id,
            Entity::StockMovement(e) => &e.id,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            Entity::Product(e) => &e.owner_id,
            Entity::Customer(e) => &e.owner_id,
            Entity::Vendor(e) => &e.owner_id,
            Entity::Invoice(e) => &e.owner_id,
            Entity::Payment(e) => &e.owner_id,
            Entity::Expense(e) => &e.owner_id,
            Entity::StockMovement(e) => &e.owner_id,
        }
    }

    /// Last modification time. Stock movements are immutable, so theirs is
    /// the creation time.
    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Entity::Product(e) => e.updated_at,
            Entity::Customer(e) => e.updated_at,
            Entity::Vendor(e) => e.updated_at,
            Entity::Invoice(e) => e.updated_at,
            Entity::Payment(e) => e.updated_at,
            Entity::Expense(e) => e.updated_at,
            Entity::StockMovement(e) => e.created_at,
        }
    }

    /// Serializes only the inner document (no kind tag).
    pub fn to_document(&self) -> serde_json::Result<String> {
        match self {
            Entity::Product(e) => serde_json::to_string(e),
            Entity::Customer(e) => serde_json::to_string(e),
            Entity::Vendor(e) => serde_json::to_string(e),
            Entity::Invoice(e) => serde_json::to_string(e),
            Entity::Payment(e) => serde_json::to_string(e),
            Entity::Expense(e) => serde_json::to_string(e),
            Entity::StockMovement(e) => serde_json::to_string(e),
        }
    }

    /// Inverse of [`Entity::to_document`].
    pub fn from_document(kind: EntityKind, document: &str) -> serde_json::Result<Self> {
        Ok(match kind {
            EntityKind::Product => Entity::Product(serde_json::from_str(document)?),
            EntityKind::Customer => Entity::Customer(serde_json::from_str(document)?),
            EntityKind::Vendor => Entity::Vendor(serde_json::from_str(document)?),
            EntityKind::Invoice => Entity::Invoice(serde_json::from_str(document)?),
            EntityKind::Payment => Entity::Payment(serde_json::from_str(document)?),
            EntityKind::Expense => Entity::Expense(serde_json::from_str(document)?),
            EntityKind::StockMovement => Entity::StockMovement(serde_json::from_str(document)?),
        })
    }
}

// =============================================================================
// Changes
// =============================================================================

/// A write the store hands to the Persistence Port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EntityChange {
    Upsert { entity: Entity },
    Delete { kind: EntityKind, id: String },
}

impl EntityChange {
    pub fn upsert(entity: Entity) -> Self {
        EntityChange::Upsert { entity }
    }

    pub fn delete(kind: EntityKind, id: impl Into<String>) -> Self {
        EntityChange::Delete {
            kind,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityChange::Upsert { entity } => entity.kind(),
            EntityChange::Delete { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityChange::Upsert { entity } => entity.id(),
            EntityChange::Delete { id, .. } => id,
        }
    }
}

/// A row-level notification from the Persistence Port's change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteChange {
    Insert { entity: Entity },
    Update { entity: Entity },
    Delete { kind: EntityKind, id: String },
}

impl RemoteChange {
    pub fn kind(&self) -> EntityKind {
        match self {
            RemoteChange::Insert { entity } | RemoteChange::Update { entity } => entity.kind(),
            RemoteChange::Delete { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RemoteChange::Insert { entity } | RemoteChange::Update { entity } => entity.id(),
            RemoteChange::Delete { id, .. } => id,
        }
    }
}

// =============================================================================
// Business Data
// =============================================================================

trait Identified {
    fn ident(&self) -> &str;
}

macro_rules! impl_identified {
    ($($ty:ty),*) => {
        $(impl Identified for $ty {
            fn ident(&self) -> &str {
                &self.id
            }
        })*
    };
}

impl_identified!(Product, Customer, Vendor, Invoice, Payment, Expense, StockMovement);

/// Replaces in place (keeping insertion order) or appends. Returns true when
/// an existing entry was replaced.
fn upsert_by_id<T: Identified>(items: &mut Vec<T>, item: T) -> bool {
    match items.iter_mut().find(|existing| existing.ident() == item.ident()) {
        Some(slot) => {
            *slot = item;
            true
        }
        None => {
            items.push(item);
            false
        }
    }
}

fn remove_by_id<T: Identified>(items: &mut Vec<T>, id: &str) -> bool {
    let before = items.len();
    items.retain(|existing| existing.ident() != id);
    items.len() != before
}

/// The seven collections, each in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessData {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub vendors: Vec<Vendor>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub stock_movements: Vec<StockMovement>,
}

impl BusinessData {
    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            products: self.products.len(),
            customers: self.customers.len(),
            vendors: self.vendors.len(),
            invoices: self.invoices.len(),
            payments: self.payments.len(),
            expenses: self.expenses.len(),
            stock_movements: self.stock_movements.len(),
        }
    }

    /// Upsert by id. Returns true when an existing entity was replaced.
    pub fn upsert(&mut self, entity: Entity) -> bool {
        match entity {
            Entity::Product(e) => upsert_by_id(&mut self.products, e),
            Entity::Customer(e) => upsert_by_id(&mut self.customers, e),
            Entity::Vendor(e) => upsert_by_id(&mut self.vendors, e),
            Entity::Invoice(e) => upsert_by_id(&mut self.invoices, e),
            Entity::Payment(e) => upsert_by_id(&mut self.payments, e),
            Entity::Expense(e) => upsert_by_id(&mut self.expenses, e),
            Entity::StockMovement(e) => upsert_by_id(&mut self.stock_movements, e),
        }
    }

    /// Remove by id. Returns true when something was removed.
    pub fn remove(&mut self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Product => remove_by_id(&mut self.products, id),
            EntityKind::Customer => remove_by_id(&mut self.customers, id),
            EntityKind::Vendor => remove_by_id(&mut self.vendors, id),
            EntityKind::Invoice => remove_by_id(&mut self.invoices, id),
            EntityKind::Payment => remove_by_id(&mut self.payments, id),
            EntityKind::Expense => remove_by_id(&mut self.expenses, id),
            EntityKind::StockMovement => remove_by_id(&mut self.stock_movements, id),
        }
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Product => self.products.iter().any(|e| e.id == id),
            EntityKind::Customer => self.customers.iter().any(|e| e.id == id),
            EntityKind::Vendor => self.vendors.iter().any(|e| e.id == id),
            EntityKind::Invoice => self.invoices.iter().any(|e| e.id == id),
            EntityKind::Payment => self.payments.iter().any(|e| e.id == id),
            EntityKind::Expense => self.expenses.iter().any(|e| e.id == id),
            EntityKind::StockMovement => self.stock_movements.iter().any(|e| e.id == id),
        }
    }

    /// A copy of the entity stored under `kind`/`id`.
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<Entity> {
        match kind {
            EntityKind::Product => self.product(id).cloned().map(Entity::Product),
            EntityKind::Customer => self.customer(id).cloned().map(Entity::Customer),
            EntityKind::Vendor => self.vendor(id).cloned().map(Entity::Vendor),
            EntityKind::Invoice => self.invoice(id).cloned().map(Entity::Invoice),
            EntityKind::Payment => self.payment(id).cloned().map(Entity::Payment),
            EntityKind::Expense => self.expense(id).cloned().map(Entity::Expense),
            EntityKind::StockMovement => self
                .stock_movements
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .map(Entity::StockMovement),
        }
    }

    /// Every entity as an envelope, kinds in [`EntityKind::ALL`] order.
    pub fn into_entities(self) -> Vec<Entity> {
        let mut out = Vec::with_capacity(self.counts().total());
        out.extend(self.products.into_iter().map(Entity::Product));
        out.extend(self.customers.into_iter().map(Entity::Customer));
        out.extend(self.vendors.into_iter().map(Entity::Vendor));
        out.extend(self.invoices.into_iter().map(Entity::Invoice));
        out.extend(self.payments.into_iter().map(Entity::Payment));
        out.extend(self.expenses.into_iter().map(Entity::Expense));
        out.extend(self.stock_movements.into_iter().map(Entity::StockMovement));
        out
    }

    /// Builds collections from envelopes; later duplicates replace earlier ones.
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut data = BusinessData::default();
        for entity in entities {
            data.upsert(entity);
        }
        data
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn customer(&self, id: &str) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == id)
    }

    pub fn vendor(&self, id: &str) -> Option<&Vendor> {
        self.vendors.iter().find(|v| v.id == id)
    }

    pub fn invoice(&self, id: &str) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.id == id)
    }

    pub fn payment(&self, id: &str) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == id)
    }

    pub fn expense(&self, id: &str) -> Option<&Expense> {
        self.expenses.iter().find(|e| e.id == id)
    }
}

/// Collection sizes, reported on load and by the seed binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EntityCounts {
    pub products: usize,
    pub customers: usize,
    pub vendors: usize,
    pub invoices: usize,
    pub payments: usize,
    pub expenses: usize,
    pub stock_movements: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.products
            + self.customers
            + self.vendors
            + self.invoices
            + self.payments
            + self.expenses
            + self.stock_movements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewCustomer, Scope};

    fn customer(id: &str, name: &str) -> Customer {
        NewCustomer {
            name: name.into(),
            phone: "+1234567890".into(),
            ..Default::default()
        }
        .into_customer(id.into(), &Scope::new("o"), Utc::now())
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("widget".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut data = BusinessData::default();
        assert!(!data.upsert(Entity::Customer(customer("a", "A"))));
        assert!(!data.upsert(Entity::Customer(customer("b", "B"))));
        assert!(data.upsert(Entity::Customer(customer("a", "A2"))));

        let names: Vec<_> = data.customers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["A2", "B"]);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut data = BusinessData::default();
        data.upsert(Entity::Customer(customer("a", "A")));
        assert!(!data.remove(EntityKind::Customer, "zzz"));
        assert!(data.remove(EntityKind::Customer, "a"));
        assert!(data.is_empty());
    }

    #[test]
    fn test_document_round_trip_keeps_kind() {
        let entity = Entity::Customer(customer("a", "A"));
        let doc = entity.to_document().unwrap();
        assert!(!doc.contains("\"kind\""));
        let back = Entity::from_document(EntityKind::Customer, &doc).unwrap();
        assert_eq!(back, entity);
    }
}
