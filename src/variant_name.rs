/// Storefront text and URL parsing shared by the matcher
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static COLOR_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*\(([0-9]{4,5})\)$").expect("valid color code pattern"));

static PRODUCT_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/products/([^/?#]+)").expect("valid product slug pattern"));

/// Color name and optional manufacturer code parsed from a variant name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedColor {
    pub color_name: String,
    pub color_code: Option<String>,
}

/// Parse the color out of a storefront variant name
///
/// Algorithm:
/// 1. Keep only the text before the first " / " (drops spool type and weight)
/// 2. Strip a leading "<product line> - " prefix if present
/// 3. Match a trailing parenthesized 4-5 digit code
///    → ("Jade White", Some("10100"))
/// 4. Otherwise the whole remainder is the color name, with no code
///
/// Examples:
/// - "PLA Basic - Jade White (10100) / Refill / 1kg" → Jade White, 10100
/// - "PLA Silk - Candy Green (13506) / Filament with spool / 1 kg" → Candy Green, 13506
/// - "PLA Basic - Onyx Black" → Onyx Black, no code
pub fn parse_color_from_variant_name(name: &str) -> ParsedColor {
    let first_segment = name.split(" / ").next().unwrap_or_default().trim();

    let color_part = match first_segment.find(" - ") {
        Some(idx) => first_segment[idx + 3..].trim(),
        None => first_segment,
    };

    match COLOR_CODE_RE.captures(color_part) {
        Some(caps) => ParsedColor {
            color_name: caps[1].trim().to_string(),
            color_code: Some(caps[2].to_string()),
        },
        None => ParsedColor {
            color_name: color_part.to_string(),
            color_code: None,
        },
    }
}

/// Product slug from a path or href such as `/en/products/pla-basic-filament?id=1`
pub fn product_slug_from_path(path: &str) -> Option<String> {
    PRODUCT_SLUG_RE
        .captures(path)
        .map(|caps| caps[1].to_string())
}

/// Scheme + host + path of an image URL, so CDN size params don't break matching
pub fn normalize_image_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => format!("{}{}", url.origin().ascii_serialization(), url.path()),
        Err(_) => raw.to_string(),
    }
}
