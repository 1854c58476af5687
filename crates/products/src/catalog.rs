//! Read access to products and price lists for the pricing policies.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::pricelist::{Pricelist, PricelistId};
use crate::product::{Product, ProductId};

/// Catalog seam used by price resolution, rule evaluation and the wizard.
///
/// One catalog serves one tenant.
pub trait PricingCatalog: Send + Sync {
    fn product(&self, id: &ProductId) -> Option<Product>;
    fn pricelist(&self, id: &PricelistId) -> Option<Pricelist>;
    /// Every price list, ordered by identifier (creation order).
    fn pricelists(&self) -> Vec<Pricelist>;
}

impl<S> PricingCatalog for Arc<S>
where
    S: PricingCatalog + ?Sized,
{
    fn product(&self, id: &ProductId) -> Option<Product> {
        (**self).product(id)
    }

    fn pricelist(&self, id: &PricelistId) -> Option<Pricelist> {
        (**self).pricelist(id)
    }

    fn pricelists(&self) -> Vec<Pricelist> {
        (**self).pricelists()
    }
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<BTreeMap<ProductId, Product>>,
    pricelists: RwLock<BTreeMap<PricelistId, Pricelist>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_product(&self, product: Product) {
        if let Ok(mut map) = self.products.write() {
            map.insert(product.id_typed(), product);
        }
    }

    pub fn upsert_pricelist(&self, pricelist: Pricelist) {
        if let Ok(mut map) = self.pricelists.write() {
            map.insert(pricelist.id_typed(), pricelist);
        }
    }
}

impl PricingCatalog for InMemoryCatalog {
    fn product(&self, id: &ProductId) -> Option<Product> {
        let map = self.products.read().ok()?;
        map.get(id).cloned()
    }

    fn pricelist(&self, id: &PricelistId) -> Option<Pricelist> {
        let map = self.pricelists.read().ok()?;
        map.get(id).cloned()
    }

    fn pricelists(&self) -> Vec<Pricelist> {
        match self.pricelists.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }
}
