//! Products & price lists domain module (event-sourced).
//!
//! This crate contains the catalog side of pricing: products, price lists and
//! their rules, the rule evaluator, and the catalog read seam. Pure domain
//! logic (no IO, no HTTP, no storage).

pub mod catalog;
pub mod evaluate;
pub mod pricelist;
pub mod product;

pub use catalog::{InMemoryCatalog, PricingCatalog};
pub use evaluate::{apply_formula, clamp_to_margins, evaluate};
pub use pricelist::{
    AddPricelistItem, AppliedOn, ComputePrice, CreatePricelist, Formula, PriceBase, Pricelist,
    PricelistCommand, PricelistCreated, PricelistEvent, PricelistId, PricelistItem,
    PricelistItemAdded, PricelistItemId, ValidityWindow,
};
pub use product::{
    CategoryId, ChangeListPrice, ChangeStandardPrice, CreateProduct, ListPriceChanged, Product,
    ProductCommand, ProductCreated, ProductEvent, ProductId, ProductTemplateId,
    StandardPriceChanged, UomId,
};
