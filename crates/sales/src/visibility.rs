use crate::order::SalesOrder;
use crate::settings::PricelistSettings;

/// Whether the per-line price list controls are shown for lines of `order`.
///
/// Presentation only; pricing ignores it.
pub fn is_override_visible(order: &SalesOrder, settings: &PricelistSettings) -> bool {
    settings.multi_pricelist_enabled && order.is_modifiable()
}
