//! Line price resolution and the re-pricing actions built on it.
//!
//! A line is priced from its own price list when one was applied, otherwise from
//! the order's global price list. Lines with invoiced quantity keep their price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use multipricelist_core::{Aggregate, DomainError, DomainResult, TenantId};
use multipricelist_products::{PricelistId, PricingCatalog, ProductId, evaluate};

use crate::order::{
    AddLine, ChangeLineQuantity, ClearLinePricelists, LinePrice, OrderLine, SalesOrder,
    SalesOrderCommand, SalesOrderEvent, UpdateLinePrices,
};

/// Price list that prices `line`: the line override, else the order's.
pub fn effective_pricelist(order: &SalesOrder, line: &OrderLine) -> Option<PricelistId> {
    line.applied_pricelist_id.or(order.pricelist_id())
}

/// Unit price for `line` given the current order and catalog state.
pub fn resolve_price<C>(order: &SalesOrder, line: &OrderLine, catalog: &C) -> Decimal
where
    C: PricingCatalog + ?Sized,
{
    if line.is_invoiced() {
        return line.unit_price;
    }
    let (Some(product_id), Some(_)) = (line.product_id, line.uom_id) else {
        return Decimal::ZERO;
    };
    let Some(pricelist_id) = effective_pricelist(order, line) else {
        return Decimal::ZERO;
    };
    let Some(product) = catalog.product(&product_id) else {
        tracing::warn!(%product_id, line_no = line.line_no, "product not found, price left at zero");
        return Decimal::ZERO;
    };

    tracing::debug!(
        line_no = line.line_no,
        %product_id,
        applied_pricelist_id = ?line.applied_pricelist_id,
        order_pricelist_id = ?order.pricelist_id(),
        %pricelist_id,
        "resolving line price"
    );

    let Some(pricelist) = catalog.pricelist(&pricelist_id) else {
        tracing::warn!(%pricelist_id, "price list not found, using list price");
        return product.list_price();
    };

    let quantity = if line.quantity.is_zero() {
        Decimal::ONE
    } else {
        line.quantity
    };
    let date = order.date_order().date_naive();

    match pricelist.product_rule(&product, quantity, date) {
        Some(item) => evaluate(item, &product, catalog),
        None => {
            tracing::debug!(%pricelist_id, %product_id, "no rule found, using list price");
            product.list_price()
        }
    }
}

fn require_tenant(order: &SalesOrder) -> DomainResult<TenantId> {
    order.tenant_id().ok_or_else(DomainError::not_found)
}

/// Add a priced line for `product_id` in the product's unit of measure.
pub fn add_line<C>(
    order: &SalesOrder,
    product_id: ProductId,
    quantity: Decimal,
    catalog: &C,
    occurred_at: DateTime<Utc>,
) -> DomainResult<Vec<SalesOrderEvent>>
where
    C: PricingCatalog + ?Sized,
{
    let tenant_id = require_tenant(order)?;
    let product = catalog.product(&product_id).ok_or_else(DomainError::not_found)?;

    let draft = OrderLine {
        line_no: order.next_line_no(),
        product_id: Some(product_id),
        uom_id: product.uom_id(),
        quantity,
        qty_invoiced: Decimal::ZERO,
        unit_price: Decimal::ZERO,
        applied_pricelist_id: None,
    };
    let unit_price = resolve_price(order, &draft, catalog);

    order.handle(&SalesOrderCommand::AddLine(AddLine {
        tenant_id,
        order_id: order.id_typed(),
        product_id: draft.product_id,
        uom_id: draft.uom_id,
        quantity,
        unit_price,
        occurred_at,
    }))
}

/// Change a line's quantity and re-price it.
pub fn change_line_quantity<C>(
    order: &SalesOrder,
    line_no: u32,
    quantity: Decimal,
    catalog: &C,
    occurred_at: DateTime<Utc>,
) -> DomainResult<Vec<SalesOrderEvent>>
where
    C: PricingCatalog + ?Sized,
{
    let tenant_id = require_tenant(order)?;
    let line = order.line(line_no).ok_or_else(DomainError::not_found)?;

    let changed = OrderLine {
        quantity,
        ..line.clone()
    };
    let unit_price = resolve_price(order, &changed, catalog);

    order.handle(&SalesOrderCommand::ChangeLineQuantity(ChangeLineQuantity {
        tenant_id,
        order_id: order.id_typed(),
        line_no,
        quantity,
        unit_price,
        occurred_at,
    }))
}

/// Clear every line override, then re-price every line from the global list.
///
/// The returned events are ordered (clear first, then prices) and must be
/// applied together. Only draft and sent orders can be refreshed; other states
/// fail with [`DomainError::InvariantViolation`].
pub fn refresh_prices<C>(
    order: &SalesOrder,
    catalog: &C,
    occurred_at: DateTime<Utc>,
) -> DomainResult<Vec<SalesOrderEvent>>
where
    C: PricingCatalog + ?Sized,
{
    let tenant_id = require_tenant(order)?;
    let order_id = order.id_typed();

    tracing::info!(%order_id, lines = order.lines().len(), "refreshing prices");

    let mut staged = order.clone();
    let mut events = staged.execute(&SalesOrderCommand::ClearLinePricelists(ClearLinePricelists {
        tenant_id,
        order_id,
        occurred_at,
    }))?;

    let prices = staged
        .lines()
        .iter()
        .map(|line| LinePrice {
            line_no: line.line_no,
            unit_price: resolve_price(&staged, line, catalog),
        })
        .collect();
    events.extend(staged.handle(&SalesOrderCommand::UpdateLinePrices(UpdateLinePrices {
        tenant_id,
        order_id,
        prices,
        occurred_at,
    }))?);

    tracing::info!(%order_id, pricelist_id = ?order.pricelist_id(), "prices refreshed");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{
        ApplyLinePricelist, ChangePricelist, CreateSalesOrder, RecordInvoicedQuantity,
        SalesOrderId,
    };
    use chrono::TimeZone;
    use multipricelist_products::{
        AddPricelistItem, AppliedOn, CategoryId, ComputePrice, CreatePricelist, CreateProduct,
        Formula, InMemoryCatalog, PriceBase, Pricelist, PricelistCommand, PricelistItemId, Product,
        ProductCommand, ProductTemplateId, UomId, ValidityWindow,
    };
    use rust_decimal_macros::dec;

    struct World {
        tenant_id: TenantId,
        catalog: InMemoryCatalog,
        product: Product,
    }

    fn world(list_price: Decimal) -> World {
        let tenant_id = TenantId::new();
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        product
            .execute(&ProductCommand::CreateProduct(CreateProduct {
                tenant_id,
                product_id,
                template_id: ProductTemplateId::generate(),
                category_id: Some(CategoryId::generate()),
                uom_id: UomId::generate(),
                name: "Orange".to_string(),
                list_price,
                standard_price: dec!(3),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        let catalog = InMemoryCatalog::new();
        catalog.upsert_product(product.clone());
        World {
            tenant_id,
            catalog,
            product,
        }
    }

    fn fixed_list(w: &World, min_quantity: Decimal, fixed_price: Decimal) -> PricelistId {
        rule_list(w, min_quantity, ComputePrice::Fixed { fixed_price })
    }

    fn rule_list(w: &World, min_quantity: Decimal, compute: ComputePrice) -> PricelistId {
        let pricelist_id = PricelistId::generate();
        let mut pricelist = Pricelist::empty(pricelist_id);
        pricelist
            .execute(&PricelistCommand::CreatePricelist(CreatePricelist {
                tenant_id: w.tenant_id,
                pricelist_id,
                name: "List".to_string(),
                currency: "USD".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        pricelist
            .execute(&PricelistCommand::AddPricelistItem(AddPricelistItem {
                tenant_id: w.tenant_id,
                pricelist_id,
                item_id: PricelistItemId::generate(),
                applied_on: AppliedOn::Template(w.product.template_id().unwrap()),
                min_quantity,
                validity: ValidityWindow::always(),
                compute,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        w.catalog.upsert_pricelist(pricelist);
        pricelist_id
    }

    fn order_on(w: &World, pricelist_id: Option<PricelistId>) -> SalesOrder {
        let order_id = SalesOrderId::generate();
        let mut order = SalesOrder::empty(order_id);
        order
            .execute(&SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
                tenant_id: w.tenant_id,
                order_id,
                pricelist_id,
                currency: "USD".to_string(),
                date_order: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order
    }

    fn with_line(w: &World, mut order: SalesOrder, quantity: Decimal) -> SalesOrder {
        let events = add_line(&order, w.product.id_typed(), quantity, &w.catalog, Utc::now()).unwrap();
        order.apply_all(&events);
        order
    }

    #[test]
    fn line_is_priced_from_order_pricelist() {
        let w = world(dec!(10));
        let list = fixed_list(&w, dec!(0), dec!(59));
        let order = with_line(&w, order_on(&w, Some(list)), dec!(1));

        assert_eq!(order.lines()[0].unit_price, dec!(59));
    }

    #[test]
    fn line_override_takes_precedence() {
        let w = world(dec!(10));
        let global = fixed_list(&w, dec!(0), dec!(59));
        let special = fixed_list(&w, dec!(0), dec!(99));
        let mut order = with_line(&w, order_on(&w, Some(global)), dec!(1));
        order
            .execute(&SalesOrderCommand::ApplyLinePricelist(ApplyLinePricelist {
                tenant_id: w.tenant_id,
                order_id: order.id_typed(),
                line_no: 1,
                pricelist_id: special,
                unit_price: dec!(99),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        let line = &order.lines()[0];
        assert_eq!(effective_pricelist(&order, line), Some(special));
        assert_eq!(resolve_price(&order, line, &w.catalog), dec!(99));
    }

    #[test]
    fn no_pricelist_at_all_prices_zero() {
        let w = world(dec!(10));
        let order = with_line(&w, order_on(&w, None), dec!(1));

        assert_eq!(order.lines()[0].unit_price, dec!(0));
    }

    #[test]
    fn line_without_product_or_uom_prices_zero() {
        let w = world(dec!(10));
        let list = fixed_list(&w, dec!(0), dec!(59));
        let order = order_on(&w, Some(list));
        let line = OrderLine {
            line_no: 1,
            product_id: Some(w.product.id_typed()),
            uom_id: None,
            quantity: dec!(1),
            qty_invoiced: dec!(0),
            unit_price: dec!(0),
            applied_pricelist_id: None,
        };

        assert_eq!(resolve_price(&order, &line, &w.catalog), dec!(0));
    }

    #[test]
    fn no_matching_rule_falls_back_to_list_price() {
        let w = world(dec!(10));
        let bulk_only = fixed_list(&w, dec!(100), dec!(5));
        let order = with_line(&w, order_on(&w, Some(bulk_only)), dec!(1));

        assert_eq!(order.lines()[0].unit_price, dec!(10));
    }

    #[test]
    fn unknown_pricelist_falls_back_to_list_price() {
        let w = world(dec!(10));
        let order = with_line(&w, order_on(&w, Some(PricelistId::generate())), dec!(1));

        assert_eq!(order.lines()[0].unit_price, dec!(10));
    }

    #[test]
    fn zero_quantity_matches_rules_as_one() {
        let w = world(dec!(10));
        let list = fixed_list(&w, dec!(1), dec!(59));
        let order = with_line(&w, order_on(&w, Some(list)), dec!(0));

        assert_eq!(order.lines()[0].unit_price, dec!(59));
    }

    #[test]
    fn quantity_change_reprices_line() {
        let w = world(dec!(10));
        let list = fixed_list(&w, dec!(10), dec!(7));
        let mut order = with_line(&w, order_on(&w, Some(list)), dec!(1));
        assert_eq!(order.lines()[0].unit_price, dec!(10));

        let events = change_line_quantity(&order, 1, dec!(12), &w.catalog, Utc::now()).unwrap();
        order.apply_all(&events);

        assert_eq!(order.lines()[0].quantity, dec!(12));
        assert_eq!(order.lines()[0].unit_price, dec!(7));
    }

    #[test]
    fn refresh_clears_overrides_before_repricing() {
        let w = world(dec!(10));
        let global = fixed_list(&w, dec!(0), dec!(59));
        let special = fixed_list(&w, dec!(0), dec!(99));
        let mut order = with_line(&w, order_on(&w, Some(global)), dec!(1));
        order
            .execute(&SalesOrderCommand::ApplyLinePricelist(ApplyLinePricelist {
                tenant_id: w.tenant_id,
                order_id: order.id_typed(),
                line_no: 1,
                pricelist_id: special,
                unit_price: dec!(99),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        let events = refresh_prices(&order, &w.catalog, Utc::now()).unwrap();
        assert!(matches!(events[0], SalesOrderEvent::LinePricelistsCleared(_)));
        assert!(matches!(events[1], SalesOrderEvent::LinePricesUpdated(_)));

        order.apply_all(&events);
        assert_eq!(order.lines()[0].applied_pricelist_id, None);
        assert_eq!(order.lines()[0].unit_price, dec!(59));
    }

    #[test]
    fn steep_percentage_rule_prices_below_zero() {
        let w = world(dec!(10));
        let list = rule_list(&w, dec!(0), ComputePrice::Percentage { percent_price: dec!(150) });
        let mut order = with_line(&w, order_on(&w, Some(list)), dec!(1));
        assert_eq!(order.lines()[0].unit_price, dec!(-5));

        let events = change_line_quantity(&order, 1, dec!(3), &w.catalog, Utc::now()).unwrap();
        order.apply_all(&events);
        assert_eq!(order.lines()[0].unit_price, dec!(-5));

        let events = refresh_prices(&order, &w.catalog, Utc::now()).unwrap();
        order.apply_all(&events);
        assert_eq!(order.lines()[0].unit_price, dec!(-5));
    }

    #[test]
    fn refresh_onto_negative_formula_price_succeeds() {
        let w = world(dec!(10));
        let global = rule_list(
            &w,
            dec!(0),
            ComputePrice::Formula(
                Formula::new(PriceBase::ListPrice)
                    .with_discount(dec!(200))
                    .with_margins(dec!(-15), dec!(0)),
            ),
        );
        let special = fixed_list(&w, dec!(0), dec!(99));
        let mut order = with_line(&w, order_on(&w, Some(global)), dec!(1));
        order
            .execute(&SalesOrderCommand::ApplyLinePricelist(ApplyLinePricelist {
                tenant_id: w.tenant_id,
                order_id: order.id_typed(),
                line_no: 1,
                pricelist_id: special,
                unit_price: dec!(99),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        let events = refresh_prices(&order, &w.catalog, Utc::now()).unwrap();
        order.apply_all(&events);

        assert_eq!(order.lines()[0].applied_pricelist_id, None);
        assert_eq!(order.lines()[0].unit_price, dec!(-5));
    }

    #[test]
    fn refresh_does_not_mutate_input_order() {
        let w = world(dec!(10));
        let list = fixed_list(&w, dec!(0), dec!(59));
        let order = with_line(&w, order_on(&w, Some(list)), dec!(1));
        let before = order.clone();

        refresh_prices(&order, &w.catalog, Utc::now()).unwrap();

        assert_eq!(order, before);
    }

    #[test]
    fn refresh_rejects_confirmed_order() {
        let w = world(dec!(10));
        let list = fixed_list(&w, dec!(0), dec!(59));
        let mut order = with_line(&w, order_on(&w, Some(list)), dec!(1));
        order
            .execute(&SalesOrderCommand::ConfirmOrder(crate::order::ConfirmOrder {
                tenant_id: w.tenant_id,
                order_id: order.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        let err = refresh_prices(&order, &w.catalog, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn add_line_for_unknown_product_is_not_found() {
        let w = world(dec!(10));
        let order = order_on(&w, None);

        let err = add_line(&order, ProductId::generate(), dec!(1), &w.catalog, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 200,
                ..ProptestConfig::default()
            })]

            /// Property: any percentage rule prices and refreshes without error.
            #[test]
            fn percentage_rules_never_abort_pricing(
                list_cents in 0i64..1_000_000,
                percent_bp in -10_000i64..50_000,
            ) {
                let w = world(Decimal::new(list_cents, 2));
                let list = rule_list(
                    &w,
                    dec!(0),
                    ComputePrice::Percentage { percent_price: Decimal::new(percent_bp, 2) },
                );
                let mut order = with_line(&w, order_on(&w, Some(list)), dec!(1));
                let priced = order.lines()[0].unit_price;
                prop_assert_eq!(resolve_price(&order, &order.lines()[0], &w.catalog), priced);

                let events = refresh_prices(&order, &w.catalog, Utc::now());
                prop_assert!(events.is_ok());
                order.apply_all(&events.unwrap());
                prop_assert_eq!(order.lines()[0].unit_price, priced);
            }

            /// Property: once invoiced, a line's price survives any re-pricing.
            #[test]
            fn invoiced_line_price_is_frozen(
                first_price in 1i64..10_000,
                second_price in 1i64..10_000,
                invoiced in 1i64..100,
                new_quantity in 0i64..1_000,
            ) {
                let w = world(dec!(10));
                let first = fixed_list(&w, dec!(0), Decimal::new(first_price, 2));
                let second = fixed_list(&w, dec!(0), Decimal::new(second_price, 2));
                let mut order = with_line(&w, order_on(&w, Some(first)), dec!(1));
                let original = order.lines()[0].unit_price;
                let tenant_id = w.tenant_id;
                let order_id = order.id_typed();

                order.execute(&SalesOrderCommand::RecordInvoicedQuantity(RecordInvoicedQuantity {
                    tenant_id,
                    order_id,
                    line_no: 1,
                    qty_invoiced: Decimal::new(invoiced, 1),
                    occurred_at: Utc::now(),
                })).unwrap();
                order.execute(&SalesOrderCommand::ChangePricelist(ChangePricelist {
                    tenant_id,
                    order_id,
                    pricelist_id: Some(second),
                    occurred_at: Utc::now(),
                })).unwrap();

                let events = change_line_quantity(
                    &order, 1, Decimal::new(new_quantity, 0), &w.catalog, Utc::now(),
                ).unwrap();
                order.apply_all(&events);
                prop_assert_eq!(order.lines()[0].unit_price, original);

                let events = refresh_prices(&order, &w.catalog, Utc::now()).unwrap();
                order.apply_all(&events);
                prop_assert_eq!(order.lines()[0].unit_price, original);
                prop_assert_eq!(resolve_price(&order, &order.lines()[0], &w.catalog), original);
            }
        }
    }
}
