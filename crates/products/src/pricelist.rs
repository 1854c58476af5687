use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use multipricelist_core::{
    Aggregate, AggregateRoot, DomainError, Entity, TenantId, ValueObject, typed_id,
};
use multipricelist_events::Event;

use crate::product::{CategoryId, Product, ProductId, ProductTemplateId};

typed_id!(
    /// Price list identifier.
    PricelistId
);

typed_id!(
    /// Price-list rule identifier.
    PricelistItemId
);

/// What a rule is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "applied_on", content = "target", rename_all = "snake_case")]
pub enum AppliedOn {
    Global,
    Category(CategoryId),
    Template(ProductTemplateId),
    Variant(ProductId),
}

impl AppliedOn {
    /// Lower is more specific; rules are tried most specific first.
    fn specificity(&self) -> u8 {
        match self {
            AppliedOn::Variant(_) => 0,
            AppliedOn::Template(_) => 1,
            AppliedOn::Category(_) => 2,
            AppliedOn::Global => 3,
        }
    }

    /// Whether the scope covers `product`.
    pub fn covers(&self, product: &Product) -> bool {
        match self {
            AppliedOn::Global => true,
            AppliedOn::Category(category_id) => product.category_id() == Some(*category_id),
            AppliedOn::Template(template_id) => product.template_id() == Some(*template_id),
            AppliedOn::Variant(product_id) => product.id_typed() == *product_id,
        }
    }
}

/// Inclusive date window; an unset bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ValueObject for ValidityWindow {}

impl ValidityWindow {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| start <= date) && self.end.is_none_or(|end| date <= end)
    }

    fn is_well_formed(&self) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }
}

/// Value a formula rule starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBase {
    ListPrice,
    StandardPrice,
    /// Another price list's first rule. `None` behaves like a missing list.
    Pricelist(Option<PricelistId>),
}

/// Linear formula: `base * (1 - discount/100) + surcharge`, clamped by margins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    pub base: PriceBase,
    /// Percentage.
    pub discount: Decimal,
    pub surcharge: Decimal,
    pub min_margin: Decimal,
    pub max_margin: Decimal,
}

impl ValueObject for Formula {}

impl Formula {
    pub fn new(base: PriceBase) -> Self {
        Self {
            base,
            discount: Decimal::ZERO,
            surcharge: Decimal::ZERO,
            min_margin: Decimal::ZERO,
            max_margin: Decimal::ZERO,
        }
    }

    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_surcharge(mut self, surcharge: Decimal) -> Self {
        self.surcharge = surcharge;
        self
    }

    pub fn with_margins(mut self, min_margin: Decimal, max_margin: Decimal) -> Self {
        self.min_margin = min_margin;
        self.max_margin = max_margin;
        self
    }

    pub fn has_margins(&self) -> bool {
        !self.min_margin.is_zero() || !self.max_margin.is_zero()
    }
}

/// How a rule computes its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "compute_price", rename_all = "snake_case")]
pub enum ComputePrice {
    Fixed { fixed_price: Decimal },
    Percentage { percent_price: Decimal },
    Formula(Formula),
}

impl ValueObject for ComputePrice {}

/// One rule of a price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricelistItem {
    pub id: PricelistItemId,
    pub pricelist_id: PricelistId,
    /// Insertion order inside the owning list, starting at 1.
    pub sequence: u32,
    pub applied_on: AppliedOn,
    pub min_quantity: Decimal,
    pub validity: ValidityWindow,
    pub compute: ComputePrice,
}

impl Entity for PricelistItem {
    type Id = PricelistItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl PricelistItem {
    pub fn accepts_quantity(&self, quantity: Decimal) -> bool {
        self.min_quantity <= quantity
    }

    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.validity.contains(date)
    }

    /// Scope, quantity floor and validity window all match.
    pub fn is_applicable(&self, product: &Product, quantity: Decimal, date: NaiveDate) -> bool {
        self.applied_on.covers(product) && self.accepts_quantity(quantity) && self.is_valid_on(date)
    }
}

/// Aggregate root: Pricelist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pricelist {
    id: PricelistId,
    tenant_id: Option<TenantId>,
    name: String,
    currency: String,
    items: Vec<PricelistItem>,
    version: u64,
    created: bool,
}

impl Pricelist {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PricelistId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            currency: String::new(),
            items: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PricelistId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Rules in insertion order.
    pub fn items(&self) -> &[PricelistItem] {
        &self.items
    }

    /// Rules in evaluation order: most specific scope first, then the highest
    /// quantity floor, then the most recently added.
    pub fn ordered_items(&self) -> Vec<&PricelistItem> {
        let mut items: Vec<&PricelistItem> = self.items.iter().collect();
        items.sort_by(|a, b| {
            a.applied_on
                .specificity()
                .cmp(&b.applied_on.specificity())
                .then_with(|| b.min_quantity.cmp(&a.min_quantity))
                .then_with(|| b.sequence.cmp(&a.sequence))
        });
        items
    }

    /// First rule in evaluation order, regardless of applicability.
    pub fn first_item(&self) -> Option<&PricelistItem> {
        self.ordered_items().into_iter().next()
    }

    /// Best-matching rule for `product` at `quantity` on `date`.
    pub fn product_rule(
        &self,
        product: &Product,
        quantity: Decimal,
        date: NaiveDate,
    ) -> Option<&PricelistItem> {
        self.ordered_items()
            .into_iter()
            .find(|item| item.is_applicable(product, quantity, date))
    }
}

impl AggregateRoot for Pricelist {
    type Id = PricelistId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePricelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePricelist {
    pub tenant_id: TenantId,
    pub pricelist_id: PricelistId,
    pub name: String,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddPricelistItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPricelistItem {
    pub tenant_id: TenantId,
    pub pricelist_id: PricelistId,
    pub item_id: PricelistItemId,
    pub applied_on: AppliedOn,
    pub min_quantity: Decimal,
    pub validity: ValidityWindow,
    pub compute: ComputePrice,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricelistCommand {
    CreatePricelist(CreatePricelist),
    AddPricelistItem(AddPricelistItem),
}

/// Event: PricelistCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricelistCreated {
    pub tenant_id: TenantId,
    pub pricelist_id: PricelistId,
    pub name: String,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PricelistItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricelistItemAdded {
    pub tenant_id: TenantId,
    pub item: PricelistItem,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricelistEvent {
    PricelistCreated(PricelistCreated),
    PricelistItemAdded(PricelistItemAdded),
}

impl Event for PricelistEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PricelistEvent::PricelistCreated(_) => "products.pricelist.created",
            PricelistEvent::PricelistItemAdded(_) => "products.pricelist.item_added",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PricelistEvent::PricelistCreated(e) => e.occurred_at,
            PricelistEvent::PricelistItemAdded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Pricelist {
    type Command = PricelistCommand;
    type Event = PricelistEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PricelistEvent::PricelistCreated(e) => {
                self.id = e.pricelist_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.currency = e.currency.clone();
                self.items.clear();
                self.created = true;
            }
            PricelistEvent::PricelistItemAdded(e) => {
                self.items.push(e.item.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PricelistCommand::CreatePricelist(cmd) => self.handle_create(cmd),
            PricelistCommand::AddPricelistItem(cmd) => self.handle_add_item(cmd),
        }
    }
}

impl Pricelist {
    fn handle_create(&self, cmd: &CreatePricelist) -> Result<Vec<PricelistEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("price list already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let currency = cmd.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation("currency must be a 3-letter ISO code"));
        }

        Ok(vec![PricelistEvent::PricelistCreated(PricelistCreated {
            tenant_id: cmd.tenant_id,
            pricelist_id: cmd.pricelist_id,
            name: cmd.name.trim().to_string(),
            currency,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddPricelistItem) -> Result<Vec<PricelistEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != cmd.pricelist_id {
            return Err(DomainError::invariant("pricelist_id mismatch"));
        }
        if self.items.iter().any(|item| item.id == cmd.item_id) {
            return Err(DomainError::conflict("price list rule already exists"));
        }
        if cmd.min_quantity < Decimal::ZERO {
            return Err(DomainError::validation("min_quantity cannot be negative"));
        }
        if !cmd.validity.is_well_formed() {
            return Err(DomainError::validation("the start date must not be after the end date"));
        }
        if let ComputePrice::Formula(Formula {
            base: PriceBase::Pricelist(Some(base_id)),
            ..
        }) = cmd.compute
        {
            if base_id == self.id {
                return Err(DomainError::validation("a price list cannot be based on itself"));
            }
        }

        let item = PricelistItem {
            id: cmd.item_id,
            pricelist_id: cmd.pricelist_id,
            sequence: self.items.len() as u32 + 1,
            applied_on: cmd.applied_on,
            min_quantity: cmd.min_quantity,
            validity: cmd.validity,
            compute: cmd.compute,
        };

        Ok(vec![PricelistEvent::PricelistItemAdded(PricelistItemAdded {
            tenant_id: cmd.tenant_id,
            item,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{CreateProduct, ProductCommand, UomId};
    use rust_decimal_macros::dec;

    struct Fixture {
        tenant_id: TenantId,
        product: Product,
        pricelist: Pricelist,
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixture() -> Fixture {
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
                list_price: dec!(10),
                standard_price: dec!(4),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        let pricelist_id = PricelistId::generate();
        let mut pricelist = Pricelist::empty(pricelist_id);
        pricelist
            .execute(&PricelistCommand::CreatePricelist(CreatePricelist {
                tenant_id,
                pricelist_id,
                name: "Public Pricelist".to_string(),
                currency: "usd".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        Fixture {
            tenant_id,
            product,
            pricelist,
        }
    }

    fn add_item(
        fx: &mut Fixture,
        applied_on: AppliedOn,
        min_quantity: Decimal,
        validity: ValidityWindow,
        fixed_price: Decimal,
    ) -> PricelistItemId {
        let item_id = PricelistItemId::generate();
        fx.pricelist
            .execute(&PricelistCommand::AddPricelistItem(AddPricelistItem {
                tenant_id: fx.tenant_id,
                pricelist_id: fx.pricelist.id_typed(),
                item_id,
                applied_on,
                min_quantity,
                validity,
                compute: ComputePrice::Fixed { fixed_price },
                occurred_at: Utc::now(),
            }))
            .unwrap();
        item_id
    }

    #[test]
    fn create_normalizes_currency() {
        let fx = fixture();
        assert_eq!(fx.pricelist.currency(), "USD");
        assert_eq!(fx.pricelist.name(), "Public Pricelist");
    }

    #[test]
    fn create_rejects_bad_currency() {
        let pricelist_id = PricelistId::generate();
        let err = Pricelist::empty(pricelist_id)
            .handle(&PricelistCommand::CreatePricelist(CreatePricelist {
                tenant_id: TenantId::new(),
                pricelist_id,
                name: "OPD".to_string(),
                currency: "dollars".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn more_specific_scope_wins() {
        let mut fx = fixture();
        let template_id = fx.product.template_id().unwrap();
        let product_id = fx.product.id_typed();
        add_item(&mut fx, AppliedOn::Global, dec!(0), ValidityWindow::always(), dec!(1));
        let variant = add_item(
            &mut fx,
            AppliedOn::Variant(product_id),
            dec!(0),
            ValidityWindow::always(),
            dec!(3),
        );
        add_item(
            &mut fx,
            AppliedOn::Template(template_id),
            dec!(0),
            ValidityWindow::always(),
            dec!(2),
        );

        let rule = fx
            .pricelist
            .product_rule(&fx.product, dec!(1), date(2026, 1, 1))
            .unwrap();
        assert_eq!(rule.id, variant);
    }

    #[test]
    fn higher_quantity_floor_wins_when_reached() {
        let mut fx = fixture();
        let template_id = fx.product.template_id().unwrap();
        let small = add_item(
            &mut fx,
            AppliedOn::Template(template_id),
            dec!(1),
            ValidityWindow::always(),
            dec!(9),
        );
        let bulk = add_item(
            &mut fx,
            AppliedOn::Template(template_id),
            dec!(10),
            ValidityWindow::always(),
            dec!(7),
        );

        let today = date(2026, 1, 1);
        assert_eq!(fx.pricelist.product_rule(&fx.product, dec!(12), today).unwrap().id, bulk);
        assert_eq!(fx.pricelist.product_rule(&fx.product, dec!(3), today).unwrap().id, small);
        assert!(fx.pricelist.product_rule(&fx.product, dec!(0.5), today).is_none());
    }

    #[test]
    fn latest_rule_wins_among_equals() {
        let mut fx = fixture();
        add_item(&mut fx, AppliedOn::Global, dec!(0), ValidityWindow::always(), dec!(1));
        let latest = add_item(&mut fx, AppliedOn::Global, dec!(0), ValidityWindow::always(), dec!(2));

        assert_eq!(fx.pricelist.first_item().unwrap().id, latest);
    }

    #[test]
    fn validity_window_bounds_are_inclusive_and_optional() {
        let window = ValidityWindow::between(Some(date(2026, 1, 1)), Some(date(2026, 1, 31)));
        assert!(window.contains(date(2026, 1, 1)));
        assert!(window.contains(date(2026, 1, 31)));
        assert!(!window.contains(date(2025, 12, 31)));
        assert!(!window.contains(date(2026, 2, 1)));

        let open_end = ValidityWindow::between(Some(date(2026, 1, 1)), None);
        assert!(open_end.contains(date(2099, 1, 1)));
        assert!(ValidityWindow::always().contains(date(1970, 1, 1)));
    }

    #[test]
    fn expired_rule_is_skipped() {
        let mut fx = fixture();
        add_item(
            &mut fx,
            AppliedOn::Global,
            dec!(0),
            ValidityWindow::between(None, Some(date(2025, 12, 31))),
            dec!(1),
        );

        assert!(fx.pricelist.product_rule(&fx.product, dec!(1), date(2026, 1, 1)).is_none());
    }

    #[test]
    fn category_scope_requires_matching_category() {
        let fx = fixture();
        assert!(AppliedOn::Category(fx.product.category_id().unwrap()).covers(&fx.product));
        assert!(!AppliedOn::Category(CategoryId::generate()).covers(&fx.product));
    }

    #[test]
    fn add_item_rejects_self_reference() {
        let fx = fixture();
        let err = fx
            .pricelist
            .handle(&PricelistCommand::AddPricelistItem(AddPricelistItem {
                tenant_id: fx.tenant_id,
                pricelist_id: fx.pricelist.id_typed(),
                item_id: PricelistItemId::generate(),
                applied_on: AppliedOn::Global,
                min_quantity: dec!(0),
                validity: ValidityWindow::always(),
                compute: ComputePrice::Formula(Formula::new(PriceBase::Pricelist(Some(
                    fx.pricelist.id_typed(),
                )))),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::validation("a price list cannot be based on itself"));
    }

    #[test]
    fn add_item_rejects_inverted_window() {
        let fx = fixture();
        let err = fx
            .pricelist
            .handle(&PricelistCommand::AddPricelistItem(AddPricelistItem {
                tenant_id: fx.tenant_id,
                pricelist_id: fx.pricelist.id_typed(),
                item_id: PricelistItemId::generate(),
                applied_on: AppliedOn::Global,
                min_quantity: dec!(0),
                validity: ValidityWindow::between(Some(date(2026, 2, 1)), Some(date(2026, 1, 1))),
                compute: ComputePrice::Fixed { fixed_price: dec!(1) },
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn items_get_increasing_sequence() {
        let mut fx = fixture();
        add_item(&mut fx, AppliedOn::Global, dec!(0), ValidityWindow::always(), dec!(1));
        add_item(&mut fx, AppliedOn::Global, dec!(0), ValidityWindow::always(), dec!(2));

        let sequences: Vec<u32> = fx.pricelist.items().iter().map(|i| i.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(fx.pricelist.version(), 3);
    }
}
