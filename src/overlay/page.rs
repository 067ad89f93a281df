//! The slice of a storefront page the matcher reads and writes

/// Which matching strategy put a badge on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeOrigin {
    Product,
    Listing,
}

impl BadgeOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeOrigin::Product => "product",
            BadgeOrigin::Listing => "listing",
        }
    }

    pub fn parse(value: &str) -> Option<BadgeOrigin> {
        match value {
            "product" => Some(BadgeOrigin::Product),
            "listing" => Some(BadgeOrigin::Listing),
            _ => None,
        }
    }
}

/// A badge already present under an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub quantity: u32,
    pub origin: Option<BadgeOrigin>,
}

/// A color swatch image on a product page
#[derive(Debug, Clone, PartialEq)]
pub struct Swatch<N> {
    pub image: N,
    pub src: String,
}

/// A product card on a listing page
#[derive(Debug, Clone, PartialEq)]
pub struct ListingCard<N> {
    pub href: String,
    pub description: Option<String>,
    pub image: Option<N>,
}

/// DOM access for the matcher.
///
/// Scans return plain data so matching stays a pure function; the badge
/// methods are the only writes.
pub trait Page {
    type Node: Clone + PartialEq;

    /// Text of every `application/ld+json` script block
    fn structured_data(&self) -> Vec<String>;

    fn swatches(&self) -> Vec<Swatch<Self::Node>>;

    fn listing_cards(&self) -> Vec<ListingCard<Self::Node>>;

    /// Element a badge for this image is attached to
    fn badge_anchor(&self, image: &Self::Node) -> Option<Self::Node>;

    fn badge_in(&self, anchor: &Self::Node) -> Option<Badge>;

    fn badged_anchors(&self, origin: BadgeOrigin) -> Vec<Self::Node>;

    /// Append a badge, making the anchor a positioning context first
    fn insert_badge(&self, anchor: &Self::Node, quantity: u32, origin: BadgeOrigin);

    fn remove_badge(&self, anchor: &Self::Node);

    fn clear_badges(&self);
}
