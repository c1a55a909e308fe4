//! Color assignment
//!
//! Buildings get a palette color from the semantic category their name
//! suggests; blocks get a hue derived from a stable hash of the record.

use crate::model::Record;

/// Linear RGB, each channel in [0, 1]
pub type Color = [f32; 3];

/// Saturation and lightness shared by every block color
const BLOCK_SATURATION: f32 = 0.65;
const BLOCK_LIGHTNESS: f32 = 0.55;

const DEFAULT_COLOR: Color = [0.55, 0.58, 0.65];

/// Semantic category inferred from an entity name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Identity,
    Content,
    Commerce,
    Telemetry,
    Other,
}

/// Keywords checked in order; the first category with a match wins
const KEYWORDS: [(Category, &[&str]); 4] = [
    (
        Category::Identity,
        &["user", "account", "profile", "member", "role", "auth", "person", "people"],
    ),
    (
        Category::Content,
        &["post", "article", "comment", "page", "media", "document", "message", "content", "blog"],
    ),
    (
        Category::Commerce,
        &["order", "product", "payment", "invoice", "cart", "customer", "price", "sale", "shop"],
    ),
    (
        Category::Telemetry,
        &["log", "event", "metric", "analytic", "trace", "audit", "session", "telemetry"],
    ),
];

impl Category {
    pub fn of(entity_name: &str) -> Self {
        let name = entity_name.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| name.contains(w)))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Other)
    }

    pub fn color(self) -> Color {
        match self {
            Category::Identity => [0.29, 0.56, 0.89],
            Category::Content => [0.49, 0.83, 0.45],
            Category::Commerce => [0.96, 0.65, 0.14],
            Category::Telemetry => [0.74, 0.42, 0.86],
            Category::Other => DEFAULT_COLOR,
        }
    }
}

/// Building color for an entity name; never fails
pub fn base_color(entity_name: &str) -> Color {
    Category::of(entity_name).color()
}

/// Block color for a record, stable across calls and process restarts
pub fn block_color(record: &Record) -> Color {
    let bytes = serde_json::to_vec(record).unwrap_or_default();
    let hue = (fnv1a(&bytes) % 360) as f32;
    hsl_to_rgb(hue, BLOCK_SATURATION, BLOCK_LIGHTNESS)
}

/// 32-bit FNV-1a
fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5u32, |hash, &b| {
        (hash ^ b as u32).wrapping_mul(0x0100_0193)
    })
}

/// HSL to RGB, hue in degrees [0, 360)
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Color {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [r + m, g + m, b + m]
}

/// Move a color toward white by `amount` in [0, 1]
pub fn brighten(color: Color, amount: f32) -> Color {
    let t = amount.clamp(0.0, 1.0);
    color.map(|c| c + (1.0 - c) * t)
}

/// 8-bit channels for rendering
pub fn to_rgb8(color: Color) -> [u8; 3] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_categories() {
        assert_eq!(Category::of("users"), Category::Identity);
        assert_eq!(Category::of("BlogPosts"), Category::Content);
        assert_eq!(Category::of("order_items"), Category::Commerce);
        assert_eq!(Category::of("event_log"), Category::Telemetry);
        assert_eq!(Category::of("widgets"), Category::Other);
        assert_eq!(Category::of(""), Category::Other);
    }

    #[test]
    fn test_unknown_name_gets_default() {
        assert_eq!(base_color("zzz"), DEFAULT_COLOR);
        assert_ne!(base_color("users"), DEFAULT_COLOR);
    }

    #[test]
    fn test_block_color_is_pure() {
        let a = record(json!({"id": 1, "title": "hello", "tags": ["x", "y"]}));
        let b = a.clone();
        assert_eq!(block_color(&a), block_color(&a));
        assert_eq!(block_color(&a), block_color(&b));
    }

    #[test]
    fn test_block_color_stable_value() {
        // FNV-1a of `{}` is fixed, so the color never drifts between runs
        let empty = Record::new();
        assert_eq!(fnv1a(b"{}"), 0x5465_b825);
        assert_eq!(block_color(&empty), hsl_to_rgb(61.0, BLOCK_SATURATION, BLOCK_LIGHTNESS));
    }

    #[test]
    fn test_block_colors_in_range() {
        for i in 0..200 {
            let c = block_color(&record(json!({ "id": i })));
            assert!(c.iter().all(|&ch| (0.0..=1.0).contains(&ch)));
        }
    }

    #[test]
    fn test_hsl_primaries() {
        let red = hsl_to_rgb(0.0, 1.0, 0.5);
        let green = hsl_to_rgb(120.0, 1.0, 0.5);
        let blue = hsl_to_rgb(240.0, 1.0, 0.5);
        for (got, want) in [(red, [1.0, 0.0, 0.0]), (green, [0.0, 1.0, 0.0]), (blue, [0.0, 0.0, 1.0])] {
            for i in 0..3 {
                assert!((got[i] - want[i]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_brighten() {
        assert_eq!(brighten([0.0, 0.5, 1.0], 0.0), [0.0, 0.5, 1.0]);
        assert_eq!(brighten([0.0, 0.5, 1.0], 1.0), [1.0, 1.0, 1.0]);
        assert_eq!(to_rgb8([1.0, 0.0, 2.0]), [255, 0, 255]);
    }
}
