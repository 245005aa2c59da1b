use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Parses `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(raw: &str) -> Option<Self> {
        let digits = raw.trim().strip_prefix('#')?;
        let expanded: String = match digits.len() {
            3 | 4 => digits.chars().flat_map(|ch| [ch, ch]).collect(),
            6 | 8 => digits.to_string(),
            _ => return None,
        };
        let bytes = hex::decode(expanded).ok()?;
        Some(Self {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
            a: bytes.get(3).copied().unwrap_or(0xFF),
        })
    }

    pub fn to_hex(self) -> String {
        if self.a == 0xFF {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// Relative luminance in 0..=255, used to pick readable text colors.
    pub fn luma(self) -> u32 {
        (self.r as u32 * 299 + self.g as u32 * 587 + self.b as u32 * 114) / 1000
    }

    pub fn readable_on(background: Color) -> Color {
        if background.luma() > 140 {
            Color::rgb(0x11, 0x11, 0x11)
        } else {
            Color::WHITE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontRole {
    Heading,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFit {
    Cover,
    Contain,
}

/// One drawable layer; later nodes paint over earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderNode {
    Rect {
        rect: Rect,
        fill: Color,
        radius: u32,
    },
    /// Pre-wrapped text; line `n` sits at `origin.y + n * line_height`.
    Text {
        x: i32,
        y: i32,
        width: u32,
        size: u32,
        line_height: u32,
        color: Color,
        font: FontRole,
        align: TextAlign,
        lines: Vec<String>,
    },
    /// Quadratic curve from `start` to `end`; with `fill` the area under the
    /// curve down to the canvas bottom is filled.
    Curve {
        start: (i32, i32),
        control: (i32, i32),
        end: (i32, i32),
        stroke: Color,
        thickness: u32,
        fill: Option<Color>,
    },
    Image {
        rect: Rect,
        url: String,
        fit: ImageFit,
    },
}

/// Output of a layout: a flat, ordered list of nodes on a fixed canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderTree {
    pub template: String,
    pub width: u32,
    pub height: u32,
    pub background: Color,
    pub heading_font: String,
    pub body_font: String,
    pub nodes: Vec<RenderNode>,
}

impl RenderTree {
    pub fn new(template: impl Into<String>, width: u32, height: u32, background: Color) -> Self {
        Self {
            template: template.into(),
            width,
            height,
            background,
            heading_font: String::new(),
            body_font: String::new(),
            nodes: Vec::new(),
        }
    }

    pub fn push(&mut self, node: RenderNode) {
        self.nodes.push(node);
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().flat_map(|node| match node {
            RenderNode::Text { lines, .. } => lines.iter().map(String::as_str).collect::<Vec<_>>(),
            _ => Vec::new(),
        })
    }

    pub fn image_urls(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            RenderNode::Image { url, .. } => Some(url.as_str()),
            _ => None,
        })
    }

    /// Stable content hash; identical inputs always produce the same value.
    pub fn fingerprint(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&encoded))
    }
}
