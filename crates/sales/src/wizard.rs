//! Price list selection wizard.
//!
//! Lists every price-list rule that could price an order line, lets the user
//! pick one, and turns the pick into a line-level price list override.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use multipricelist_core::{DomainError, DomainResult, TenantId, typed_id};
use multipricelist_products::{
    AppliedOn, PricelistId, PricelistItem, PricelistItemId, PricingCatalog, Product, ProductId,
    UomId, evaluate,
};

use crate::order::{ApplyLinePricelist, SalesOrder, SalesOrderCommand, SalesOrderId};

/// Shown when no rule anywhere applies to the line's product.
pub const NO_PRICELIST_CONFIGURED: &str = "No price list is configured for this product!";

typed_id!(
    /// Wizard (transient record) identifier.
    WizardId
);

/// One selectable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricelistCandidate {
    pub pricelist_id: PricelistId,
    pub item_id: PricelistItemId,
    pub product_id: ProductId,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub uom_id: Option<UomId>,
}

/// Transient selection state for one order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricelistWizard {
    id: WizardId,
    tenant_id: TenantId,
    order_id: SalesOrderId,
    line_no: u32,
    candidates: Vec<PricelistCandidate>,
}

impl PricelistWizard {
    pub fn id(&self) -> WizardId {
        self.id
    }

    pub fn order_id(&self) -> SalesOrderId {
        self.order_id
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn candidates(&self) -> &[PricelistCandidate] {
        &self.candidates
    }

    /// Modal form presenting this wizard.
    pub fn action(&self) -> WindowAction {
        WindowAction {
            name: "Select Pricelist".to_string(),
            res_model: "pricelist.product".to_string(),
            res_id: self.id,
            view_mode: "form".to_string(),
            target: ActionTarget::New,
        }
    }

    /// Command writing candidate `index` into the line override.
    pub fn select(&self, index: usize, occurred_at: DateTime<Utc>) -> DomainResult<ApplyLinePricelist> {
        let candidate = self
            .candidates
            .get(index)
            .ok_or_else(|| DomainError::validation("Please select one of the proposed price lists."))?;

        Ok(ApplyLinePricelist {
            tenant_id: self.tenant_id,
            order_id: self.order_id,
            line_no: self.line_no,
            pricelist_id: candidate.pricelist_id,
            unit_price: candidate.unit_price,
            occurred_at,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTarget {
    Current,
    New,
}

/// Window action descriptor handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowAction {
    pub name: String,
    pub res_model: String,
    pub res_id: WizardId,
    pub view_mode: String,
    pub target: ActionTarget,
}

/// Template, category or global rules: candidate set scoped above the variant.
fn covers_beyond_variant(applied_on: &AppliedOn, product: &Product) -> bool {
    match applied_on {
        AppliedOn::Global => true,
        AppliedOn::Category(_) | AppliedOn::Template(_) => applied_on.covers(product),
        AppliedOn::Variant(_) => false,
    }
}

fn covers_variant(applied_on: &AppliedOn, product: &Product) -> bool {
    matches!(applied_on, AppliedOn::Variant(id) if *id == product.id_typed())
}

/// Every rule, across all price lists, usable for `product` at `quantity` on
/// `today`. Template/category/global rules come first, then variant rules;
/// each rule appears once.
pub fn matching_rules<C>(
    product: &Product,
    quantity: Decimal,
    today: NaiveDate,
    catalog: &C,
) -> Vec<PricelistItem>
where
    C: PricingCatalog + ?Sized,
{
    let pricelists = catalog.pricelists();
    let eligible = |item: &&PricelistItem| item.accepts_quantity(quantity) && item.is_valid_on(today);

    let broad = pricelists
        .iter()
        .flat_map(|pricelist| pricelist.ordered_items())
        .filter(eligible)
        .filter(|item| covers_beyond_variant(&item.applied_on, product));
    let variant = pricelists
        .iter()
        .flat_map(|pricelist| pricelist.ordered_items())
        .filter(eligible)
        .filter(|item| covers_variant(&item.applied_on, product));

    let mut rules: Vec<PricelistItem> = Vec::new();
    for item in broad.chain(variant) {
        if !rules.iter().any(|known| known.id == item.id) {
            rules.push(item.clone());
        }
    }
    rules
}

/// Build the selection wizard for line `line_no`.
///
/// Fails with [`NO_PRICELIST_CONFIGURED`] when no rule applies.
pub fn apply_pricelist<C>(
    order: &SalesOrder,
    line_no: u32,
    catalog: &C,
    today: NaiveDate,
) -> DomainResult<PricelistWizard>
where
    C: PricingCatalog + ?Sized,
{
    let tenant_id = order.tenant_id().ok_or_else(DomainError::not_found)?;
    let line = order.line(line_no).ok_or_else(DomainError::not_found)?;
    let Some(product_id) = line.product_id else {
        return Err(DomainError::validation(NO_PRICELIST_CONFIGURED));
    };
    let product = catalog.product(&product_id).ok_or_else(DomainError::not_found)?;

    let rules = matching_rules(&product, line.quantity, today, catalog);
    if rules.is_empty() {
        tracing::info!(order_id = %order.id_typed(), line_no, %product_id, "no applicable price list rule");
        return Err(DomainError::validation(NO_PRICELIST_CONFIGURED));
    }

    let candidates = rules
        .iter()
        .map(|item| PricelistCandidate {
            pricelist_id: item.pricelist_id,
            item_id: item.id,
            product_id,
            unit_price: evaluate(item, &product, catalog),
            unit_cost: product.standard_price(),
            uom_id: product.uom_id(),
        })
        .collect::<Vec<_>>();

    tracing::info!(
        order_id = %order.id_typed(),
        line_no,
        candidates = candidates.len(),
        "price list wizard opened"
    );

    Ok(PricelistWizard {
        id: WizardId::generate(),
        tenant_id,
        order_id: order.id_typed(),
        line_no,
        candidates,
    })
}

/// Open wizards, keyed by id. A wizard lives until committed or discarded.
#[derive(Debug, Default)]
pub struct WizardRegistry {
    wizards: HashMap<WizardId, PricelistWizard>,
}

impl WizardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a wizard; nothing is registered on failure.
    pub fn open<C>(
        &mut self,
        order: &SalesOrder,
        line_no: u32,
        catalog: &C,
        today: NaiveDate,
    ) -> DomainResult<WindowAction>
    where
        C: PricingCatalog + ?Sized,
    {
        let wizard = apply_pricelist(order, line_no, catalog, today)?;
        let action = wizard.action();
        self.wizards.insert(wizard.id(), wizard);
        Ok(action)
    }

    pub fn get(&self, id: &WizardId) -> Option<&PricelistWizard> {
        self.wizards.get(id)
    }

    pub fn len(&self) -> usize {
        self.wizards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wizards.is_empty()
    }

    /// Turn the user's pick into an order command and drop the wizard.
    ///
    /// An invalid pick leaves the wizard open.
    pub fn commit(
        &mut self,
        id: &WizardId,
        index: usize,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<SalesOrderCommand> {
        let wizard = self.wizards.get(id).ok_or_else(DomainError::not_found)?;
        let command = wizard.select(index, occurred_at)?;
        self.wizards.remove(id);

        tracing::info!(
            order_id = %command.order_id,
            line_no = command.line_no,
            pricelist_id = %command.pricelist_id,
            "price list selected for line"
        );
        Ok(SalesOrderCommand::ApplyLinePricelist(command))
    }

    /// Close a wizard without applying anything.
    pub fn discard(&mut self, id: &WizardId) -> bool {
        self.wizards.remove(id).is_some()
    }
}
