//! Storefront overlay: shows "you own N" badges on store pages.
//!
//! One `StoreOverlay` lives per page view. It moves through
//! `Uninitialized → LoadingLookup → Matching → Idle` and re-enters
//! `Matching` on DOM mutations, STOCK_UPDATED and client-side navigation.

pub mod dom;
pub mod matching;
pub mod navigation;
pub mod page;
pub mod structured_data;

use crate::error::{ExtensionError, Result};
use crate::protocol::{ExtensionMessage, LookupIndex};
use crate::tracker_sync::RuntimeTransport;
use crate::variant_name::product_slug_from_path;
use matching::{add_listing_badges, plan_listing_badges, plan_product_badges, reconcile_product_badges};
use page::Page;
use structured_data::{VariantInfo, parse_product_group};

const TARGET: &str = "ft-overlay";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    Uninitialized,
    LoadingLookup,
    Matching,
    Idle,
}

/// Badges inserted by one matching pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub product: usize,
    pub listing: usize,
}

pub struct StoreOverlay<P: Page> {
    page: P,
    phase: OverlayPhase,
    lookup: LookupIndex,
    product_slug: Option<String>,
    variants: Vec<VariantInfo>,
}

impl<P: Page> StoreOverlay<P> {
    pub fn new(page: P) -> Self {
        StoreOverlay {
            page,
            phase: OverlayPhase::Uninitialized,
            lookup: LookupIndex::new(),
            product_slug: None,
            variants: Vec::new(),
        }
    }

    pub fn phase(&self) -> OverlayPhase {
        self.phase
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn product_slug(&self) -> Option<&str> {
        self.product_slug.as_deref()
    }

    /// Read the page identity and wait for the lookup
    pub fn begin(&mut self, path: &str) {
        self.set_product_context(product_slug_from_path(path));
        self.phase = OverlayPhase::LoadingLookup;
    }

    /// A lookup refresh (STOCK_UPDATED) is in flight
    pub fn lookup_requested(&mut self) {
        if self.phase != OverlayPhase::Uninitialized {
            self.phase = OverlayPhase::LoadingLookup;
        }
    }

    /// Install the fetched lookup, or keep the current one if fetching failed
    pub fn lookup_loaded(&mut self, result: Result<LookupIndex>) -> MatchReport {
        match result {
            Ok(lookup) => {
                log::debug!(target: TARGET, "Lookup has {} keys", lookup.len());
                self.lookup = lookup;
            }
            Err(e) => log::warn!(target: TARGET, "Could not load lookup: {}", e),
        }
        self.run_matching()
    }

    /// DOM changed; ignored until the first lookup has arrived
    pub fn on_mutation(&mut self) -> MatchReport {
        if self.phase != OverlayPhase::Idle {
            return MatchReport::default();
        }
        self.run_matching()
    }

    /// Client-side route change, called after the settle delay
    pub fn on_navigation(&mut self, path: &str) -> MatchReport {
        match product_slug_from_path(path) {
            Some(slug) if self.product_slug.as_deref() == Some(slug.as_str()) => {}
            other => self.set_product_context(other),
        }

        self.page.clear_badges();
        if self.phase == OverlayPhase::Idle {
            self.run_matching()
        } else {
            MatchReport::default()
        }
    }

    fn set_product_context(&mut self, slug: Option<String>) {
        self.variants = match slug {
            Some(_) => self.parse_variants(),
            None => Vec::new(),
        };
        self.product_slug = slug;
    }

    fn parse_variants(&self) -> Vec<VariantInfo> {
        let blocks = self.page.structured_data();
        parse_product_group(blocks.iter().map(String::as_str))
    }

    /// Both strategies against the current DOM
    pub fn run_matching(&mut self) -> MatchReport {
        self.phase = OverlayPhase::Matching;

        let mut report = MatchReport::default();

        if let Some(slug) = self.product_slug.clone() {
            // structured data can render after the first read
            if self.variants.is_empty() {
                self.variants = self.parse_variants();
            }
            if !self.variants.is_empty() {
                let plan = plan_product_badges(&self.lookup, &slug, &self.variants, &self.page.swatches());
                report.product = reconcile_product_badges(&self.page, plan);
            }
        }

        let plan = plan_listing_badges(&self.lookup, &self.page.listing_cards());
        report.listing = add_listing_badges(&self.page, plan);

        if report != MatchReport::default() {
            log::debug!(target: TARGET, "Inserted badges: {:?}", report);
        }

        self.phase = OverlayPhase::Idle;
        report
    }
}

/// Ask the background worker for the current lookup
pub async fn request_lookup<T: RuntimeTransport>(transport: &T) -> Result<LookupIndex> {
    let response = transport.send(&ExtensionMessage::GetLookup).await?;
    if response.is_null() {
        return Err(ExtensionError::Transport("background worker could not read the lookup".to_string()));
    }
    match serde_json::from_value(response)? {
        ExtensionMessage::LookupResult { lookup } => Ok(lookup),
        other => Err(ExtensionError::Transport(format!("unexpected reply {:?}", other))),
    }
}
