use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use multipricelist_core::{Aggregate, AggregateRoot, DomainError, Entity, TenantId, typed_id};
use multipricelist_events::Event;
use multipricelist_products::{PricelistId, ProductId, UomId};

typed_id!(
    /// Sales order identifier (tenant-scoped via `tenant_id` fields in events/commands).
    SalesOrderId
);

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderStatus {
    Draft,
    Sent,
    Confirmed,
    Done,
    Cancelled,
}

/// Order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: Option<ProductId>,
    pub uom_id: Option<UomId>,
    pub quantity: Decimal,
    pub qty_invoiced: Decimal,
    pub unit_price: Decimal,
    /// Line-level price list; takes precedence over the order's price list.
    pub applied_pricelist_id: Option<PricelistId>,
}

impl OrderLine {
    /// Once anything is invoiced the unit price is frozen.
    pub fn is_invoiced(&self) -> bool {
        self.qty_invoiced > Decimal::ZERO
    }
}

impl Entity for OrderLine {
    type Id = u32;

    fn id(&self) -> &Self::Id {
        &self.line_no
    }
}

/// New unit price for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePrice {
    pub line_no: u32,
    pub unit_price: Decimal,
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrder {
    id: SalesOrderId,
    tenant_id: Option<TenantId>,
    status: SalesOrderStatus,
    pricelist_id: Option<PricelistId>,
    currency: String,
    date_order: DateTime<Utc>,
    lines: Vec<OrderLine>,
    version: u64,
    created: bool,
}

impl SalesOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SalesOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            status: SalesOrderStatus::Draft,
            pricelist_id: None,
            currency: String::new(),
            date_order: DateTime::<Utc>::default(),
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    /// Global price list.
    pub fn pricelist_id(&self) -> Option<PricelistId> {
        self.pricelist_id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn date_order(&self) -> DateTime<Utc> {
        self.date_order
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&OrderLine> {
        self.lines.iter().find(|line| line.line_no == line_no)
    }

    pub fn next_line_no(&self) -> u32 {
        self.lines.iter().map(|line| line.line_no).max().unwrap_or(0) + 1
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Quotations (draft or sent) can still be edited.
    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, SalesOrderStatus::Draft | SalesOrderStatus::Sent)
    }
}

impl AggregateRoot for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSalesOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub pricelist_id: Option<PricelistId>,
    pub currency: String,
    pub date_order: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub product_id: Option<ProductId>,
    pub uom_id: Option<UomId>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeLineQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLineQuantity {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangePricelist (the order's global price list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePricelist {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub pricelist_id: Option<PricelistId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyLinePricelist (wizard selection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyLinePricelist {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub pricelist_id: PricelistId,
    pub unit_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClearLinePricelists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearLinePricelists {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateLinePrices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLinePrices {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub prices: Vec<LinePrice>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordInvoicedQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInvoicedQuantity {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub qty_invoiced: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSent {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LockOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    CreateSalesOrder(CreateSalesOrder),
    AddLine(AddLine),
    ChangeLineQuantity(ChangeLineQuantity),
    ChangePricelist(ChangePricelist),
    ApplyLinePricelist(ApplyLinePricelist),
    ClearLinePricelists(ClearLinePricelists),
    UpdateLinePrices(UpdateLinePrices),
    RecordInvoicedQuantity(RecordInvoicedQuantity),
    MarkSent(MarkSent),
    ConfirmOrder(ConfirmOrder),
    LockOrder(LockOrder),
    CancelOrder(CancelOrder),
}

/// Event: SalesOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub pricelist_id: Option<PricelistId>,
    pub currency: String,
    pub date_order: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line: OrderLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineQuantityChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQuantityChanged {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PricelistChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricelistChanged {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub pricelist_id: Option<PricelistId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinePricelistApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricelistApplied {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub pricelist_id: PricelistId,
    pub unit_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinePricelistsCleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricelistsCleared {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_nos: Vec<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinePricesUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricesUpdated {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub prices: Vec<LinePrice>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicedQuantityRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicedQuantityRecorded {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub qty_invoiced: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub status: SalesOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    SalesOrderCreated(SalesOrderCreated),
    LineAdded(LineAdded),
    LineQuantityChanged(LineQuantityChanged),
    PricelistChanged(PricelistChanged),
    LinePricelistApplied(LinePricelistApplied),
    LinePricelistsCleared(LinePricelistsCleared),
    LinePricesUpdated(LinePricesUpdated),
    InvoicedQuantityRecorded(InvoicedQuantityRecorded),
    OrderStatusChanged(OrderStatusChanged),
}

impl Event for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::SalesOrderCreated(_) => "sales.order.created",
            SalesOrderEvent::LineAdded(_) => "sales.order.line_added",
            SalesOrderEvent::LineQuantityChanged(_) => "sales.order.line_quantity_changed",
            SalesOrderEvent::PricelistChanged(_) => "sales.order.pricelist_changed",
            SalesOrderEvent::LinePricelistApplied(_) => "sales.order.line_pricelist_applied",
            SalesOrderEvent::LinePricelistsCleared(_) => "sales.order.line_pricelists_cleared",
            SalesOrderEvent::LinePricesUpdated(_) => "sales.order.line_prices_updated",
            SalesOrderEvent::InvoicedQuantityRecorded(_) => "sales.order.invoiced_quantity_recorded",
            SalesOrderEvent::OrderStatusChanged(_) => "sales.order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.occurred_at,
            SalesOrderEvent::LineAdded(e) => e.occurred_at,
            SalesOrderEvent::LineQuantityChanged(e) => e.occurred_at,
            SalesOrderEvent::PricelistChanged(e) => e.occurred_at,
            SalesOrderEvent::LinePricelistApplied(e) => e.occurred_at,
            SalesOrderEvent::LinePricelistsCleared(e) => e.occurred_at,
            SalesOrderEvent::LinePricesUpdated(e) => e.occurred_at,
            SalesOrderEvent::InvoicedQuantityRecorded(e) => e.occurred_at,
            SalesOrderEvent::OrderStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::SalesOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.status = SalesOrderStatus::Draft;
                self.pricelist_id = e.pricelist_id;
                self.currency = e.currency.clone();
                self.date_order = e.date_order;
                self.lines.clear();
                self.created = true;
            }
            SalesOrderEvent::LineAdded(e) => {
                self.lines.push(e.line.clone());
            }
            SalesOrderEvent::LineQuantityChanged(e) => {
                if let Some(line) = self.line_mut(e.line_no) {
                    line.quantity = e.quantity;
                    line.unit_price = e.unit_price;
                }
            }
            SalesOrderEvent::PricelistChanged(e) => {
                self.pricelist_id = e.pricelist_id;
            }
            SalesOrderEvent::LinePricelistApplied(e) => {
                if let Some(line) = self.line_mut(e.line_no) {
                    line.applied_pricelist_id = Some(e.pricelist_id);
                    line.unit_price = e.unit_price;
                }
            }
            SalesOrderEvent::LinePricelistsCleared(e) => {
                for line in self
                    .lines
                    .iter_mut()
                    .filter(|line| e.line_nos.contains(&line.line_no))
                {
                    line.applied_pricelist_id = None;
                }
            }
            SalesOrderEvent::LinePricesUpdated(e) => {
                for price in &e.prices {
                    if let Some(line) = self.line_mut(price.line_no) {
                        line.unit_price = price.unit_price;
                    }
                }
            }
            SalesOrderEvent::InvoicedQuantityRecorded(e) => {
                if let Some(line) = self.line_mut(e.line_no) {
                    line.qty_invoiced = e.qty_invoiced;
                }
            }
            SalesOrderEvent::OrderStatusChanged(e) => {
                self.status = e.status;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::CreateSalesOrder(cmd) => self.handle_create(cmd),
            SalesOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            SalesOrderCommand::ChangeLineQuantity(cmd) => self.handle_change_line_quantity(cmd),
            SalesOrderCommand::ChangePricelist(cmd) => self.handle_change_pricelist(cmd),
            SalesOrderCommand::ApplyLinePricelist(cmd) => self.handle_apply_line_pricelist(cmd),
            SalesOrderCommand::ClearLinePricelists(cmd) => self.handle_clear_line_pricelists(cmd),
            SalesOrderCommand::UpdateLinePrices(cmd) => self.handle_update_line_prices(cmd),
            SalesOrderCommand::RecordInvoicedQuantity(cmd) => self.handle_record_invoiced(cmd),
            SalesOrderCommand::MarkSent(cmd) => self.handle_transition(
                cmd.tenant_id,
                cmd.order_id,
                cmd.occurred_at,
                SalesOrderStatus::Sent,
            ),
            SalesOrderCommand::ConfirmOrder(cmd) => self.handle_transition(
                cmd.tenant_id,
                cmd.order_id,
                cmd.occurred_at,
                SalesOrderStatus::Confirmed,
            ),
            SalesOrderCommand::LockOrder(cmd) => self.handle_transition(
                cmd.tenant_id,
                cmd.order_id,
                cmd.occurred_at,
                SalesOrderStatus::Done,
            ),
            SalesOrderCommand::CancelOrder(cmd) => self.handle_transition(
                cmd.tenant_id,
                cmd.order_id,
                cmd.occurred_at,
                SalesOrderStatus::Cancelled,
            ),
        }
    }
}

impl SalesOrder {
    fn line_mut(&mut self, line_no: u32) -> Option<&mut OrderLine> {
        self.lines.iter_mut().find(|line| line.line_no == line_no)
    }

    fn ensure_existing(&self, tenant_id: TenantId, order_id: SalesOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_modifiable(&self, tenant_id: TenantId, order_id: SalesOrderId) -> Result<(), DomainError> {
        self.ensure_existing(tenant_id, order_id)?;
        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "cannot modify order once it is confirmed, done or cancelled",
            ));
        }
        Ok(())
    }

    fn existing_line(&self, line_no: u32) -> Result<&OrderLine, DomainError> {
        self.line(line_no).ok_or_else(DomainError::not_found)
    }

    fn handle_create(&self, cmd: &CreateSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sales order already exists"));
        }
        let currency = cmd.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation("currency must be a 3-letter ISO code"));
        }

        Ok(vec![SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            pricelist_id: cmd.pricelist_id,
            currency,
            date_order: cmd.date_order,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_modifiable(cmd.tenant_id, cmd.order_id)?;

        if cmd.quantity < Decimal::ZERO {
            return Err(DomainError::validation("quantity cannot be negative"));
        }

        Ok(vec![SalesOrderEvent::LineAdded(LineAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line: OrderLine {
                line_no: self.next_line_no(),
                product_id: cmd.product_id,
                uom_id: cmd.uom_id,
                quantity: cmd.quantity,
                qty_invoiced: Decimal::ZERO,
                unit_price: cmd.unit_price,
                applied_pricelist_id: None,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_line_quantity(
        &self,
        cmd: &ChangeLineQuantity,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_modifiable(cmd.tenant_id, cmd.order_id)?;
        let line = self.existing_line(cmd.line_no)?;

        if cmd.quantity < Decimal::ZERO {
            return Err(DomainError::validation("quantity cannot be negative"));
        }

        let unit_price = if line.is_invoiced() {
            line.unit_price
        } else {
            cmd.unit_price
        };

        Ok(vec![SalesOrderEvent::LineQuantityChanged(LineQuantityChanged {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            quantity: cmd.quantity,
            unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_pricelist(
        &self,
        cmd: &ChangePricelist,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_modifiable(cmd.tenant_id, cmd.order_id)?;

        Ok(vec![SalesOrderEvent::PricelistChanged(PricelistChanged {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            pricelist_id: cmd.pricelist_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_line_pricelist(
        &self,
        cmd: &ApplyLinePricelist,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_modifiable(cmd.tenant_id, cmd.order_id)?;
        let line = self.existing_line(cmd.line_no)?;

        let unit_price = if line.is_invoiced() {
            line.unit_price
        } else {
            cmd.unit_price
        };

        Ok(vec![SalesOrderEvent::LinePricelistApplied(LinePricelistApplied {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            pricelist_id: cmd.pricelist_id,
            unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_clear_line_pricelists(
        &self,
        cmd: &ClearLinePricelists,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_modifiable(cmd.tenant_id, cmd.order_id)?;

        // Every line, invoiced or not.
        Ok(vec![SalesOrderEvent::LinePricelistsCleared(LinePricelistsCleared {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_nos: self.lines.iter().map(|line| line.line_no).collect(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_line_prices(
        &self,
        cmd: &UpdateLinePrices,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_modifiable(cmd.tenant_id, cmd.order_id)?;

        let mut prices = Vec::with_capacity(cmd.prices.len());
        for price in &cmd.prices {
            let line = self.existing_line(price.line_no)?;
            if !line.is_invoiced() {
                prices.push(*price);
            }
        }

        Ok(vec![SalesOrderEvent::LinePricesUpdated(LinePricesUpdated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            prices,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_invoiced(
        &self,
        cmd: &RecordInvoicedQuantity,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;
        self.existing_line(cmd.line_no)?;

        if self.status == SalesOrderStatus::Cancelled {
            return Err(DomainError::invariant("cannot invoice a cancelled order"));
        }
        if cmd.qty_invoiced < Decimal::ZERO {
            return Err(DomainError::validation("qty_invoiced cannot be negative"));
        }

        Ok(vec![SalesOrderEvent::InvoicedQuantityRecorded(InvoicedQuantityRecorded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            qty_invoiced: cmd.qty_invoiced,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transition(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
        occurred_at: DateTime<Utc>,
        to: SalesOrderStatus,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_existing(tenant_id, order_id)?;

        use SalesOrderStatus::*;
        let allowed = match to {
            Sent => self.status == Draft,
            Confirmed => self.is_modifiable(),
            Done => self.status == Confirmed,
            Cancelled => !matches!(self.status, Done | Cancelled),
            Draft => false,
        };
        if !allowed {
            return Err(DomainError::invariant(format!(
                "cannot move order from {:?} to {:?}",
                self.status, to
            )));
        }
        if to == Confirmed && self.lines.is_empty() {
            return Err(DomainError::validation("cannot confirm order without lines"));
        }

        Ok(vec![SalesOrderEvent::OrderStatusChanged(OrderStatusChanged {
            tenant_id,
            order_id,
            status: to,
            occurred_at,
        })])
    }
}
