use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Colors used when a brand carries no valid palette entries.
///
/// Order follows the positional convention of the renderer: background,
/// primary text, accent.
pub const DEFAULT_PALETTE: [(&str, &str); 3] = [
    ("background", "#F7F4EF"),
    ("text", "#1B1B1F"),
    ("accent", "#E4572E"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub name: String,
    pub hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Every palette shape brands have been stored with.
///
/// Deserialization is untagged so any stored JSON lands in one of these
/// variants; anything else ends up in `Other` and normalizes to nothing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawPalette {
    Hexes(Vec<String>),
    Entries(Vec<Value>),
    RoleMap(IndexMap<String, Value>),
    Other(Value),
}

impl Default for RawPalette {
    fn default() -> Self {
        Self::Other(Value::Null)
    }
}

impl RawPalette {
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(Self::Other(value))
    }

    /// Canonical, input-ordered palette. Invalid entries are dropped, never
    /// reported.
    pub fn normalize(&self) -> Vec<PaletteColor> {
        let mut out = Vec::new();
        match self {
            Self::Hexes(items) => {
                for raw in items {
                    if let Some(hex) = clean_hex(raw) {
                        let name = fallback_name(out.len());
                        out.push(PaletteColor {
                            name,
                            hex,
                            role: None,
                        });
                    }
                }
            }
            Self::Entries(items) => {
                for item in items {
                    if let Some(color) = color_from_entry(item, out.len()) {
                        out.push(color);
                    }
                }
            }
            Self::RoleMap(map) => {
                for (role, raw) in map {
                    let Some(hex) = raw.as_str().and_then(clean_hex) else {
                        continue;
                    };
                    out.push(PaletteColor {
                        name: role.clone(),
                        hex,
                        role: Some(role.clone()),
                    });
                }
            }
            Self::Other(_) => {}
        }
        out
    }
}

pub fn normalize_palette(value: &Value) -> Vec<PaletteColor> {
    RawPalette::from_value(value.clone()).normalize()
}

pub fn default_palette() -> Vec<PaletteColor> {
    DEFAULT_PALETTE
        .iter()
        .map(|(role, hex)| PaletteColor {
            name: (*role).to_string(),
            hex: (*hex).to_string(),
            role: Some((*role).to_string()),
        })
        .collect()
}

/// `#` followed by 3 to 8 hex digits.
pub fn is_valid_hex(raw: &str) -> bool {
    let Some(digits) = raw.strip_prefix('#') else {
        return false;
    };
    (3..=8).contains(&digits.len()) && digits.chars().all(|ch| ch.is_ascii_hexdigit())
}

fn clean_hex(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    is_valid_hex(trimmed).then(|| trimmed.to_string())
}

fn color_from_entry(item: &Value, position: usize) -> Option<PaletteColor> {
    match item {
        Value::String(raw) => clean_hex(raw).map(|hex| PaletteColor {
            name: fallback_name(position),
            hex,
            role: None,
        }),
        Value::Object(obj) => {
            let hex = obj.get("hex").and_then(Value::as_str).and_then(clean_hex)?;
            let role = obj
                .get("role")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            let name = obj
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .or_else(|| role.clone())
                .unwrap_or_else(|| fallback_name(position));
            Some(PaletteColor { name, hex, role })
        }
        _ => None,
    }
}

fn fallback_name(position: usize) -> String {
    format!("color-{}", position + 1)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{is_valid_hex, normalize_palette, PaletteColor, RawPalette};

    #[test]
    fn hex_validation_accepts_three_to_eight_digits() {
        assert!(is_valid_hex("#fff"));
        assert!(is_valid_hex("#A1B2C3"));
        assert!(is_valid_hex("#11223344"));
        assert!(!is_valid_hex("fff"));
        assert!(!is_valid_hex("#ff"));
        assert!(!is_valid_hex("#123456789"));
        assert!(!is_valid_hex("#12345g"));
    }

    #[test]
    fn string_array_keeps_order_and_drops_invalid() {
        let palette = normalize_palette(&json!(["#111111", "blue", "#222", 7, "#333333"]));
        let hexes: Vec<&str> = palette.iter().map(|color| color.hex.as_str()).collect();
        assert_eq!(hexes, vec!["#111111", "#222", "#333333"]);
    }

    #[test]
    fn object_entries_use_name_then_role_then_position() {
        let palette = normalize_palette(&json!([
            {"hex": "#000000", "name": "Ink"},
            {"hex": "#FFFFFF", "role": "background"},
            {"hex": "#ABCDEF"},
            {"name": "missing hex"},
            {"hex": "nope", "name": "broken"}
        ]));
        assert_eq!(
            palette,
            vec![
                PaletteColor {
                    name: "Ink".to_string(),
                    hex: "#000000".to_string(),
                    role: None
                },
                PaletteColor {
                    name: "background".to_string(),
                    hex: "#FFFFFF".to_string(),
                    role: Some("background".to_string())
                },
                PaletteColor {
                    name: "color-3".to_string(),
                    hex: "#ABCDEF".to_string(),
                    role: None
                },
            ]
        );
    }

    #[test]
    fn role_map_preserves_insertion_order() {
        let palette = normalize_palette(&json!({
            "primary": "#102030",
            "secondary": 12,
            "accent": "#ff0000"
        }));
        let roles: Vec<Option<&str>> = palette.iter().map(|color| color.role.as_deref()).collect();
        assert_eq!(roles, vec![Some("primary"), Some("accent")]);
    }

    #[test]
    fn normalizing_canonical_palette_is_identity() -> anyhow::Result<()> {
        let first = normalize_palette(&json!(["#111", {"hex": "#222222", "role": "accent"}]));
        let canonical = serde_json::to_value(&first)?;
        let second = normalize_palette(&canonical);
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn unsupported_shapes_normalize_to_empty() {
        assert!(normalize_palette(&json!(null)).is_empty());
        assert!(normalize_palette(&json!("#ffffff")).is_empty());
        assert!(RawPalette::default().normalize().is_empty());
    }
}
