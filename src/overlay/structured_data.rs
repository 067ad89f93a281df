/// JSON-LD product data embedded in storefront product pages
use crate::variant_name::parse_color_from_variant_name;
use serde_json::Value;
use std::collections::HashSet;

/// A storefront variant as the product page describes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInfo {
    pub color_code: Option<String>,
    pub sku: String,
    pub image_url: String,
}

/// `image` is either a URL or a list of URLs
fn variant_image(variant: &Value) -> String {
    match variant.get("image") {
        Some(Value::String(url)) => url.clone(),
        Some(Value::Array(urls)) => urls
            .iter()
            .find_map(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn text_field<'a>(variant: &'a Value, field: &str) -> &'a str {
    variant.get(field).and_then(Value::as_str).unwrap_or_default()
}

/// Variants of the first `ProductGroup` block, deduplicated by (color code, image).
///
/// Blocks that are not valid JSON or describe something else are skipped;
/// a page without a product group yields no variants.
pub fn parse_product_group<'a, I>(blocks: I) -> Vec<VariantInfo>
where
    I: IntoIterator<Item = &'a str>,
{
    for block in blocks {
        let Ok(data) = serde_json::from_str::<Value>(block) else {
            continue;
        };

        let is_group = data.get("@type").and_then(Value::as_str) == Some("ProductGroup");
        let Some(variants) = data.get("hasVariant").and_then(Value::as_array) else {
            continue;
        };
        if !is_group {
            continue;
        }

        let mut seen = HashSet::new();
        return variants
            .iter()
            .filter_map(|variant| {
                let color_code = parse_color_from_variant_name(text_field(variant, "name")).color_code;
                let image_url = variant_image(variant);

                seen.insert((color_code.clone(), image_url.clone()))
                    .then(|| VariantInfo {
                        color_code,
                        sku: text_field(variant, "sku").to_string(),
                        image_url,
                    })
            })
            .collect();
    }

    Vec::new()
}
