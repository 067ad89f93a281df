/// Lookup index construction: stock entries joined against the catalog
use crate::protocol::{LookupIndex, lookup_key};
use crate::stock_data::{CatalogProduct, StockData};
use std::collections::HashMap;

/// Where a SKU lives in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRef {
    pub product_slug: String,
    pub color_code: Option<String>,
}

/// SKU → catalog position, built once per context
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    by_sku: HashMap<String, CatalogRef>,
}

impl CatalogIndex {
    pub fn from_products(products: &[CatalogProduct]) -> Self {
        let by_sku = products
            .iter()
            .flat_map(|product| {
                product.variants.iter().map(move |variant| {
                    (
                        variant.sku.clone(),
                        CatalogRef {
                            product_slug: product.slug.clone(),
                            color_code: variant.color_code.clone().filter(|code| !code.is_empty()),
                        },
                    )
                })
            })
            .collect();

        CatalogIndex { by_sku }
    }

    pub fn resolve(&self, sku: &str) -> Option<&CatalogRef> {
        self.by_sku.get(sku)
    }

    pub fn len(&self) -> usize {
        self.by_sku.len()
    }
}

/// Build the lookup index the storefront overlay matches against
///
/// Keys per entry with a positive quantity:
/// - `{productSlug}::{colorCode}` when the catalog knows the variant's color code
///   (storefront structured data exposes color codes, not our SKUs)
/// - `{productSlug}::{sku}` always, as a fallback
///
/// Entries that collide on a key have their quantities summed. Brand follows
/// entry order: the last entry written to a key wins.
pub fn build_lookup_index(stock: &StockData, catalog: &CatalogIndex) -> LookupIndex {
    stock
        .entries
        .iter()
        .filter(|entry| entry.quantity > 0)
        .fold(LookupIndex::new(), |mut lookup, entry| {
            let color_code = catalog
                .resolve(&entry.variant_sku)
                .and_then(|found| found.color_code.as_deref());

            if let Some(code) = color_code {
                lookup.upsert(lookup_key(&entry.product_slug, code), entry.quantity, &entry.brand);
            }

            lookup.upsert(
                lookup_key(&entry.product_slug, &entry.variant_sku),
                entry.quantity,
                &entry.brand,
            );
            lookup
        })
}
