//! Unit price of a single price-list rule.
//!
//! | rule              | price                                              |
//! |-------------------|----------------------------------------------------|
//! | fixed             | `fixed_price`                                      |
//! | percentage (≠ 0)  | `list_price * (1 - percent/100)`                   |
//! | formula           | `base * (1 - discount/100) + surcharge`, clamped   |
//! | anything else     | `list_price`                                       |
//!
//! The margin clamp is anchored to the product's list price for every formula
//! base, including cost price and referenced price lists.

use rust_decimal::Decimal;

use crate::catalog::PricingCatalog;
use crate::pricelist::{ComputePrice, Formula, PriceBase, PricelistId, PricelistItem};
use crate::product::Product;

/// Compute the unit price `item` yields for `product`.
///
/// Never fails: a missing or empty referenced price list, or a reference cycle,
/// degrades to the product's list price.
pub fn evaluate<C>(item: &PricelistItem, product: &Product, catalog: &C) -> Decimal
where
    C: PricingCatalog + ?Sized,
{
    let mut visited = vec![item.pricelist_id];
    let price = evaluate_in(item, product, catalog, &mut visited);
    tracing::debug!(
        item_id = %item.id,
        pricelist_id = %item.pricelist_id,
        product_id = %product.id_typed(),
        %price,
        "evaluated price list rule"
    );
    price
}

fn evaluate_in<C>(
    item: &PricelistItem,
    product: &Product,
    catalog: &C,
    visited: &mut Vec<PricelistId>,
) -> Decimal
where
    C: PricingCatalog + ?Sized,
{
    let list_price = product.list_price();
    match item.compute {
        ComputePrice::Fixed { fixed_price } => fixed_price,
        ComputePrice::Percentage { percent_price } if !percent_price.is_zero() => {
            discounted(list_price, percent_price).unwrap_or_else(|| {
                tracing::warn!(
                    item_id = %item.id,
                    %percent_price,
                    "percentage price overflowed, using list price"
                );
                list_price
            })
        }
        ComputePrice::Percentage { .. } => list_price,
        ComputePrice::Formula(formula) => {
            let base = match formula.base {
                PriceBase::ListPrice => list_price,
                PriceBase::StandardPrice => product.standard_price(),
                PriceBase::Pricelist(base_id) => {
                    referenced_price(base_id, product, catalog, visited)
                }
            };
            apply_formula(&formula, base, list_price)
        }
    }
}

/// Price from the first rule of the referenced list.
fn referenced_price<C>(
    base_id: Option<PricelistId>,
    product: &Product,
    catalog: &C,
    visited: &mut Vec<PricelistId>,
) -> Decimal
where
    C: PricingCatalog + ?Sized,
{
    let Some(base_id) = base_id else {
        return product.list_price();
    };
    if visited.contains(&base_id) {
        tracing::warn!(pricelist_id = %base_id, "price list reference cycle, using list price");
        return product.list_price();
    }
    let Some(base) = catalog.pricelist(&base_id) else {
        tracing::warn!(pricelist_id = %base_id, "referenced price list not found, using list price");
        return product.list_price();
    };

    visited.push(base_id);
    let price = match base.first_item() {
        Some(item) => evaluate_in(item, product, catalog, visited),
        None => product.list_price(),
    };
    visited.pop();
    price
}

/// `value * (1 - percent/100)`, `None` on overflow.
fn discounted(value: Decimal, percent: Decimal) -> Option<Decimal> {
    let factor = Decimal::ONE.checked_sub(percent.checked_div(Decimal::ONE_HUNDRED)?)?;
    value.checked_mul(factor)
}

/// `base * (1 - discount/100) + surcharge`, then the margin clamp.
///
/// Falls back to `list_price` when the raw price overflows.
pub fn apply_formula(formula: &Formula, base: Decimal, list_price: Decimal) -> Decimal {
    let Some(price) =
        discounted(base, formula.discount).and_then(|price| price.checked_add(formula.surcharge))
    else {
        tracing::warn!(%base, "formula price overflowed, using list price");
        return list_price;
    };
    clamp_to_margins(formula, price, list_price)
}

/// Bound `price` to `[min_margin + list_price, max_margin + list_price]` when
/// either margin is set.
pub fn clamp_to_margins(formula: &Formula, price: Decimal, list_price: Decimal) -> Decimal {
    if !formula.has_margins() {
        return price;
    }
    let floor = formula.min_margin.saturating_add(list_price);
    let ceiling = formula.max_margin.saturating_add(list_price);
    if price < floor {
        floor
    } else if price > ceiling {
        ceiling
    } else {
        price
    }
}
