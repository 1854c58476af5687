use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use multipricelist_core::{Aggregate, AggregateRoot, DomainError, TenantId, typed_id};
use multipricelist_events::Event;

typed_id!(
    /// Product variant identifier.
    ProductId
);

typed_id!(
    /// Product template identifier (groups the variants of one product).
    ProductTemplateId
);

typed_id!(
    /// Product category identifier.
    CategoryId
);

typed_id!(
    /// Unit of measure identifier.
    UomId
);

/// Aggregate root: Product (a sellable variant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    template_id: Option<ProductTemplateId>,
    category_id: Option<CategoryId>,
    uom_id: Option<UomId>,
    name: String,
    list_price: Decimal,
    standard_price: Decimal,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            template_id: None,
            category_id: None,
            uom_id: None,
            name: String::new(),
            list_price: Decimal::ZERO,
            standard_price: Decimal::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn template_id(&self) -> Option<ProductTemplateId> {
        self.template_id
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn uom_id(&self) -> Option<UomId> {
        self.uom_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sale price before any price-list rule.
    pub fn list_price(&self) -> Decimal {
        self.list_price
    }

    /// Cost price.
    pub fn standard_price(&self) -> Decimal {
        self.standard_price
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub template_id: ProductTemplateId,
    pub category_id: Option<CategoryId>,
    pub uom_id: UomId,
    pub name: String,
    pub list_price: Decimal,
    pub standard_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeListPrice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeListPrice {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub list_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStandardPrice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStandardPrice {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub standard_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    ChangeListPrice(ChangeListPrice),
    ChangeStandardPrice(ChangeStandardPrice),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub template_id: ProductTemplateId,
    pub category_id: Option<CategoryId>,
    pub uom_id: UomId,
    pub name: String,
    pub list_price: Decimal,
    pub standard_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListPriceChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPriceChanged {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub list_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StandardPriceChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardPriceChanged {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub standard_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ListPriceChanged(ListPriceChanged),
    StandardPriceChanged(StandardPriceChanged),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::ListPriceChanged(_) => "products.product.list_price_changed",
            ProductEvent::StandardPriceChanged(_) => "products.product.standard_price_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ListPriceChanged(e) => e.occurred_at,
            ProductEvent::StandardPriceChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.template_id = Some(e.template_id);
                self.category_id = e.category_id;
                self.uom_id = Some(e.uom_id);
                self.name = e.name.clone();
                self.list_price = e.list_price;
                self.standard_price = e.standard_price;
                self.created = true;
            }
            ProductEvent::ListPriceChanged(e) => {
                self.list_price = e.list_price;
            }
            ProductEvent::StandardPriceChanged(e) => {
                self.standard_price = e.standard_price;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::ChangeListPrice(cmd) => self.handle_change_list_price(cmd),
            ProductCommand::ChangeStandardPrice(cmd) => self.handle_change_standard_price(cmd),
        }
    }
}

impl Product {
    fn ensure_existing(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        ensure_not_negative(cmd.list_price, "list_price")?;
        ensure_not_negative(cmd.standard_price, "standard_price")?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            template_id: cmd.template_id,
            category_id: cmd.category_id,
            uom_id: cmd.uom_id,
            name: cmd.name.trim().to_string(),
            list_price: cmd.list_price,
            standard_price: cmd.standard_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_list_price(
        &self,
        cmd: &ChangeListPrice,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_id)?;
        ensure_not_negative(cmd.list_price, "list_price")?;

        Ok(vec![ProductEvent::ListPriceChanged(ListPriceChanged {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            list_price: cmd.list_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_standard_price(
        &self,
        cmd: &ChangeStandardPrice,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_id)?;
        ensure_not_negative(cmd.standard_price, "standard_price")?;

        Ok(vec![ProductEvent::StandardPriceChanged(StandardPriceChanged {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            standard_price: cmd.standard_price,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn ensure_not_negative(value: Decimal, field: &str) -> Result<(), DomainError> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}
