/// Badge matching: pure planning over scanned page data, then minimal DOM writes
use super::page::{BadgeOrigin, ListingCard, Page, Swatch};
use super::structured_data::VariantInfo;
use crate::protocol::LookupIndex;
use crate::variant_name::{normalize_image_url, parse_color_from_variant_name, product_slug_from_path};
use std::collections::HashMap;

/// A badge the current lookup says should be shown on `image`
#[derive(Debug, Clone, PartialEq)]
pub struct Placement<N> {
    pub image: N,
    pub quantity: u32,
}

/// Owned quantity for a variant: color code key first, SKU key as fallback
pub fn find_quantity(lookup: &LookupIndex, product_slug: &str, variant: &VariantInfo) -> Option<u32> {
    variant
        .color_code
        .as_deref()
        .and_then(|code| lookup.owned(product_slug, code))
        .or_else(|| lookup.owned(product_slug, &variant.sku))
}

/// Product page: swatch images matched to structured-data variants by image URL
pub fn plan_product_badges<N: Clone>(
    lookup: &LookupIndex,
    product_slug: &str,
    variants: &[VariantInfo],
    swatches: &[Swatch<N>],
) -> Vec<Placement<N>> {
    let by_image: HashMap<String, &VariantInfo> = variants
        .iter()
        .filter(|variant| !variant.image_url.is_empty())
        .map(|variant| (normalize_image_url(&variant.image_url), variant))
        .collect();

    swatches
        .iter()
        .filter_map(|swatch| {
            let variant = by_image.get(&normalize_image_url(&swatch.src))?;
            let quantity = find_quantity(lookup, product_slug, variant)?;
            Some(Placement {
                image: swatch.image.clone(),
                quantity,
            })
        })
        .collect()
}

/// Listing page: product cards matched by link slug and the color code in their description
pub fn plan_listing_badges<N: Clone>(lookup: &LookupIndex, cards: &[ListingCard<N>]) -> Vec<Placement<N>> {
    cards
        .iter()
        .filter_map(|card| {
            let slug = product_slug_from_path(&card.href)?;
            let description = card.description.as_deref()?.trim();
            let code = parse_color_from_variant_name(description).color_code?;
            let quantity = lookup.owned(&slug, &code)?;
            Some(Placement {
                image: card.image.clone()?,
                quantity,
            })
        })
        .collect()
}

/// Resolve placements to anchors, first placement per anchor wins
fn anchored<P: Page>(page: &P, placements: Vec<Placement<P::Node>>) -> Vec<(P::Node, u32)> {
    let mut out: Vec<(P::Node, u32)> = Vec::new();
    for placement in placements {
        let Some(anchor) = page.badge_anchor(&placement.image) else {
            continue;
        };
        if !out.iter().any(|(seen, _)| *seen == anchor) {
            out.push((anchor, placement.quantity));
        }
    }
    out
}

/// Make the page's product badges equal the plan.
///
/// Badges whose anchor or quantity is no longer planned are removed, missing
/// ones are added, and anything already correct is left alone, so a pass over
/// an unchanged page writes nothing. Returns the number of badges inserted.
pub fn reconcile_product_badges<P: Page>(page: &P, placements: Vec<Placement<P::Node>>) -> usize {
    let desired = anchored(page, placements);

    for anchor in page.badged_anchors(BadgeOrigin::Product) {
        let current = page.badge_in(&anchor).map(|badge| badge.quantity);
        let wanted = desired.iter().find(|(a, _)| *a == anchor).map(|(_, q)| *q);
        if current != wanted {
            page.remove_badge(&anchor);
        }
    }

    insert_missing(page, desired, BadgeOrigin::Product)
}

/// Listing badges are only ever added
pub fn add_listing_badges<P: Page>(page: &P, placements: Vec<Placement<P::Node>>) -> usize {
    insert_missing(page, anchored(page, placements), BadgeOrigin::Listing)
}

fn insert_missing<P: Page>(page: &P, desired: Vec<(P::Node, u32)>, origin: BadgeOrigin) -> usize {
    let mut inserted = 0;
    for (anchor, quantity) in desired {
        // never two badges under one anchor
        if page.badge_in(&anchor).is_none() {
            page.insert_badge(&anchor, quantity, origin);
            inserted += 1;
        }
    }
    inserted
}
