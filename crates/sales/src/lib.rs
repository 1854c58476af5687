//! Sales orders with per-line price lists.
//!
//! This crate contains business rules for sales orders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage): the order
//! aggregate, line price resolution, the bulk price refresh, the price list
//! selection wizard and the visibility gate for line-level price lists.

pub mod order;
pub mod pricing;
pub mod settings;
pub mod visibility;
pub mod wizard;

pub use order::{
    AddLine, ApplyLinePricelist, CancelOrder, ChangeLineQuantity, ChangePricelist,
    ClearLinePricelists, ConfirmOrder, CreateSalesOrder, InvoicedQuantityRecorded, LineAdded,
    LinePrice, LinePricelistApplied, LinePricelistsCleared, LinePricesUpdated,
    LineQuantityChanged, LockOrder, MarkSent, OrderLine, OrderStatusChanged, PricelistChanged,
    RecordInvoicedQuantity, SalesOrder, SalesOrderCommand, SalesOrderCreated, SalesOrderEvent,
    SalesOrderId, SalesOrderStatus, UpdateLinePrices,
};
pub use pricing::{
    add_line, change_line_quantity, effective_pricelist, refresh_prices, resolve_price,
};
pub use settings::PricelistSettings;
pub use visibility::is_override_visible;
pub use wizard::{
    ActionTarget, NO_PRICELIST_CONFIGURED, PricelistCandidate, PricelistWizard, WindowAction,
    WizardId, WizardRegistry, apply_pricelist, matching_rules,
};
