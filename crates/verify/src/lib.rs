//! End-to-end acceptance run of the price refresh flow.
//!
//! Product "Orange" (list price 10) is priced by two price lists, "Public
//! Pricelist" (fixed 59) and "OPD" (fixed 99). An order created on the public
//! list must price its line at 59; after switching the order to OPD and
//! refreshing, the line must cost 99 and carry no line-level price list.

use anyhow::Context;
use chrono::Utc;
use rust_decimal::Decimal;

use multipricelist_core::{Aggregate, TenantId};
use multipricelist_products::{
    AddPricelistItem, AppliedOn, CategoryId, ComputePrice, CreatePricelist, CreateProduct,
    InMemoryCatalog, Pricelist, PricelistCommand, PricelistId, PricelistItemId, Product,
    ProductCommand, ProductId, ProductTemplateId, UomId, ValidityWindow,
};
use multipricelist_sales::{
    ChangePricelist, CreateSalesOrder, SalesOrder, SalesOrderCommand, SalesOrderId, add_line,
    refresh_prices,
};

pub const EXPECTED_INITIAL_PRICE: Decimal = Decimal::from_parts(59, 0, 0, false, 0);
pub const EXPECTED_REFRESHED_PRICE: Decimal = Decimal::from_parts(99, 0, 0, false, 0);

/// What the run observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub initial_price: Decimal,
    pub refreshed_price: Decimal,
    pub applied_pricelist_id: Option<PricelistId>,
}

/// One pass/fail line of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub passed: bool,
    pub description: String,
}

impl Outcome {
    pub fn checks(&self) -> Vec<Check> {
        vec![
            Check {
                passed: self.initial_price == EXPECTED_INITIAL_PRICE,
                description: format!(
                    "initial price (Public Pricelist) is {} (expected {EXPECTED_INITIAL_PRICE})",
                    self.initial_price
                ),
            },
            Check {
                passed: self.refreshed_price == EXPECTED_REFRESHED_PRICE,
                description: format!(
                    "refreshed price (OPD) is {} (expected {EXPECTED_REFRESHED_PRICE})",
                    self.refreshed_price
                ),
            },
            Check {
                passed: self.applied_pricelist_id.is_none(),
                description: "line specific price list was cleared".to_string(),
            },
        ]
    }

    pub fn passed(&self) -> bool {
        self.checks().iter().all(|check| check.passed)
    }
}

fn fixed_price_list(
    tenant_id: TenantId,
    name: &str,
    template_id: ProductTemplateId,
    fixed_price: Decimal,
) -> anyhow::Result<Pricelist> {
    let pricelist_id = PricelistId::generate();
    let mut pricelist = Pricelist::empty(pricelist_id);
    pricelist.execute(&PricelistCommand::CreatePricelist(CreatePricelist {
        tenant_id,
        pricelist_id,
        name: name.to_string(),
        currency: "USD".to_string(),
        occurred_at: Utc::now(),
    }))?;
    pricelist.execute(&PricelistCommand::AddPricelistItem(AddPricelistItem {
        tenant_id,
        pricelist_id,
        item_id: PricelistItemId::generate(),
        applied_on: AppliedOn::Template(template_id),
        min_quantity: Decimal::ZERO,
        validity: ValidityWindow::always(),
        compute: ComputePrice::Fixed { fixed_price },
        occurred_at: Utc::now(),
    }))?;
    Ok(pricelist)
}

/// Run the scenario against a fresh in-memory catalog.
pub fn run() -> anyhow::Result<Outcome> {
    let tenant_id = TenantId::new();
    let catalog = InMemoryCatalog::new();

    let product_id = ProductId::generate();
    let template_id = ProductTemplateId::generate();
    let mut product = Product::empty(product_id);
    product
        .execute(&ProductCommand::CreateProduct(CreateProduct {
            tenant_id,
            product_id,
            template_id,
            category_id: Some(CategoryId::generate()),
            uom_id: UomId::generate(),
            name: "Orange".to_string(),
            list_price: Decimal::TEN,
            standard_price: Decimal::ZERO,
            occurred_at: Utc::now(),
        }))
        .context("creating product")?;
    catalog.upsert_product(product);
    tracing::info!(%product_id, "product 'Orange' created");

    let public = fixed_price_list(tenant_id, "Public Pricelist", template_id, EXPECTED_INITIAL_PRICE)
        .context("creating public price list")?;
    let opd = fixed_price_list(tenant_id, "OPD", template_id, EXPECTED_REFRESHED_PRICE)
        .context("creating OPD price list")?;
    let (public_id, opd_id) = (public.id_typed(), opd.id_typed());
    catalog.upsert_pricelist(public);
    catalog.upsert_pricelist(opd);
    tracing::info!(%public_id, %opd_id, "price lists created");

    let order_id = SalesOrderId::generate();
    let mut order = SalesOrder::empty(order_id);
    order
        .execute(&SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
            tenant_id,
            order_id,
            pricelist_id: Some(public_id),
            currency: "USD".to_string(),
            date_order: Utc::now(),
            occurred_at: Utc::now(),
        }))
        .context("creating sales order")?;

    let events = add_line(&order, product_id, Decimal::ONE, &catalog, Utc::now())
        .context("adding order line")?;
    order.apply_all(&events);
    let line_no = order.lines()[0].line_no;
    let initial_price = order.lines()[0].unit_price;
    tracing::info!(%initial_price, "initial price (public)");

    order
        .execute(&SalesOrderCommand::ChangePricelist(ChangePricelist {
            tenant_id,
            order_id,
            pricelist_id: Some(opd_id),
            occurred_at: Utc::now(),
        }))
        .context("switching to OPD")?;

    let events = refresh_prices(&order, &catalog, Utc::now()).context("refreshing prices")?;
    order.apply_all(&events);

    let line = order
        .line(line_no)
        .context("order line disappeared after refresh")?;
    tracing::info!(refreshed_price = %line.unit_price, "price after refresh (OPD)");

    Ok(Outcome {
        initial_price,
        refreshed_price: line.unit_price,
        applied_pricelist_id: line.applied_pricelist_id,
    })
}
