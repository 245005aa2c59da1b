//! Built-in template layouts.
//!
//! Geometry is authored against a 1080px-wide canvas and scaled with integer
//! math, so every canvas size gets the same proportions and identical inputs
//! always produce identical trees.

use trendcast_contracts::brand::BrandTokens;
use trendcast_contracts::content::Slide;
use trendcast_contracts::templates::ids;

use super::tree::{Color, FontRole, ImageFit, Rect, RenderNode, RenderTree, TextAlign};

pub const FALLBACK_BACKGROUND: &str = "#FFFFFF";
pub const FALLBACK_TEXT: &str = "#1A1A2E";
pub const FALLBACK_ACCENT: &str = "#E94560";
pub const FALLBACK_CARD: &str = "#F4F4F6";

const DESIGN_WIDTH: u64 = 1080;
/// Average advance of one glyph as a share of the font size, in percent.
const GLYPH_WIDTH_PERCENT: u32 = 55;

/// Positional palette roles: 0 background, 1 text, 2 accent, 3 card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutColors {
    pub background: Color,
    pub text: Color,
    pub accent: Color,
    pub card: Color,
}

impl LayoutColors {
    pub fn from_tokens(tokens: &BrandTokens) -> Self {
        let palette = tokens.effective_palette();
        let pick = |index: usize, fallback: &str| {
            palette
                .get(index)
                .and_then(|entry| Color::from_hex(&entry.hex))
                .or_else(|| Color::from_hex(fallback))
                .unwrap_or(Color::WHITE)
        };
        Self {
            background: pick(0, FALLBACK_BACKGROUND),
            text: pick(1, FALLBACK_TEXT),
            accent: pick(2, FALLBACK_ACCENT),
            card: pick(3, FALLBACK_CARD),
        }
    }
}

pub struct LayoutContext<'a> {
    pub slide: &'a Slide,
    pub tokens: &'a BrandTokens,
    pub colors: LayoutColors,
    pub width: u32,
    pub height: u32,
}

impl LayoutContext<'_> {
    /// Scales a length from the 1080px design grid.
    pub fn px(&self, value: u32) -> u32 {
        (value as u64 * self.width as u64 / DESIGN_WIDTH) as u32
    }

    fn frac_h(&self, percent: u32) -> i32 {
        (self.height as u64 * percent as u64 / 100) as i32
    }

    fn tree(&self, template: &str, background: Color) -> RenderTree {
        RenderTree::new(template, self.width, self.height, background)
    }

    fn full_rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    fn slide_image(&self, tree: &mut RenderTree) -> bool {
        match self.slide.image_url.as_deref() {
            Some(url) => {
                tree.push(RenderNode::Image {
                    rect: self.full_rect(),
                    url: url.to_string(),
                    fit: ImageFit::Cover,
                });
                true
            }
            None => false,
        }
    }

    fn logo(&self, tree: &mut RenderTree, rect: Rect) {
        if let Some(url) = self.tokens.logo_url.as_deref() {
            tree.push(RenderNode::Image {
                rect,
                url: url.to_string(),
                fit: ImageFit::Contain,
            });
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    size: u32,
    line_height: u32,
    color: Color,
    font: FontRole,
    align: TextAlign,
    max_lines: usize,
}

/// Pushes a wrapped text block and returns its bottom edge.
fn text_block(tree: &mut RenderTree, x: i32, y: i32, width: u32, style: TextStyle, text: &str) -> i32 {
    let lines = wrap_text(text, width, style.size, style.max_lines);
    if lines.is_empty() {
        return y;
    }
    let bottom = y + (lines.len() as u32 * style.line_height) as i32;
    tree.push(RenderNode::Text {
        x,
        y,
        width,
        size: style.size,
        line_height: style.line_height,
        color: style.color,
        font: style.font,
        align: style.align,
        lines,
    });
    bottom
}

pub fn estimated_text_width(text: &str, size: u32) -> u32 {
    text.chars().count() as u32 * size * GLYPH_WIDTH_PERCENT / 100
}

/// Greedy word wrap against the estimated glyph width. Overlong words are
/// split; the last kept line gets an ellipsis when text is dropped.
pub fn wrap_text(text: &str, width: u32, size: u32, max_lines: usize) -> Vec<String> {
    let per_char = (size * GLYPH_WIDTH_PERCENT / 100).max(1);
    let max_chars = (width / per_char).max(1) as usize;
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: String = word.to_string();
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(max_chars).collect();
            word = word.chars().skip(max_chars).collect();
            lines.push(head);
        }
        let candidate_len = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if candidate_len > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if max_lines > 0 && lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let keep = max_chars.saturating_sub(1);
            if last.chars().count() > keep {
                *last = last.chars().take(keep).collect::<String>().trim_end().to_string();
            }
            last.push('…');
        }
    }
    lines
}

fn heading(size: u32, line_height: u32, color: Color, align: TextAlign, max_lines: usize) -> TextStyle {
    TextStyle {
        size,
        line_height,
        color,
        font: FontRole::Heading,
        align,
        max_lines,
    }
}

fn body(size: u32, line_height: u32, color: Color, align: TextAlign, max_lines: usize) -> TextStyle {
    TextStyle {
        font: FontRole::Body,
        ..heading(size, line_height, color, align, max_lines)
    }
}

/// Large headline, curved accent divider and optional logo.
pub fn cover_curve(ctx: &LayoutContext<'_>) -> RenderTree {
    let colors = ctx.colors;
    let mut tree = ctx.tree(ids::COVER_CURVE, colors.background);
    if ctx.slide_image(&mut tree) {
        tree.push(RenderNode::Rect {
            rect: Rect::new(0, 0, ctx.width, ctx.frac_h(64) as u32),
            fill: colors.background.with_alpha(0xB3),
            radius: 0,
        });
    }

    let margin = ctx.px(80);
    let inner = ctx.width.saturating_sub(margin * 2);
    let top = ctx.frac_h(12).max(ctx.px(120) as i32);
    let after_headline = text_block(
        &mut tree,
        margin as i32,
        top,
        inner,
        heading(ctx.px(84), ctx.px(96), colors.text, TextAlign::Left, 4),
        &ctx.slide.headline,
    );
    text_block(
        &mut tree,
        margin as i32,
        after_headline + ctx.px(32) as i32,
        inner,
        body(ctx.px(36), ctx.px(50), colors.text, TextAlign::Left, 3),
        &ctx.slide.body,
    );

    let curve_y = ctx.frac_h(70);
    tree.push(RenderNode::Curve {
        start: (0, curve_y),
        control: (ctx.width as i32 / 2, ctx.frac_h(58)),
        end: (ctx.width as i32, curve_y),
        stroke: colors.accent,
        thickness: ctx.px(6).max(1),
        fill: Some(colors.accent),
    });

    let logo = ctx.px(160);
    ctx.logo(
        &mut tree,
        Rect::new(
            (ctx.width - margin - logo) as i32,
            ctx.height as i32 - (margin + logo) as i32,
            logo,
            logo,
        ),
    );
    tree
}

struct Card {
    rect: Rect,
    padding: u32,
}

fn card(ctx: &LayoutContext<'_>, tree: &mut RenderTree) -> Card {
    let margin = ctx.px(72);
    let top = ctx.frac_h(16);
    let rect = Rect::new(
        margin as i32,
        top,
        ctx.width.saturating_sub(margin * 2),
        (ctx.frac_h(84) - top) as u32,
    );
    tree.push(RenderNode::Rect {
        rect,
        fill: ctx.colors.card,
        radius: ctx.px(32),
    });
    let padding = ctx.px(64);
    tree.push(RenderNode::Rect {
        rect: Rect::new(
            rect.x + padding as i32,
            rect.y + padding as i32,
            ctx.px(120),
            ctx.px(12).max(1),
        ),
        fill: ctx.colors.accent,
        radius: ctx.px(6),
    });
    Card { rect, padding }
}

/// Centered card with accent bar, headline and body.
pub fn text_card(ctx: &LayoutContext<'_>) -> RenderTree {
    let colors = ctx.colors;
    let mut tree = ctx.tree(ids::TEXT_CARD, colors.background);
    ctx.slide_image(&mut tree);
    let card = card(ctx, &mut tree);
    let x = card.rect.x + card.padding as i32;
    let inner = card.rect.width.saturating_sub(card.padding * 2);
    let after_headline = text_block(
        &mut tree,
        x,
        card.rect.y + (card.padding + ctx.px(52)) as i32,
        inner,
        heading(ctx.px(60), ctx.px(72), colors.text, TextAlign::Left, 4),
        &ctx.slide.headline,
    );
    text_block(
        &mut tree,
        x,
        after_headline + ctx.px(36) as i32,
        inner,
        body(ctx.px(34), ctx.px(48), colors.text, TextAlign::Left, 8),
        &ctx.slide.body,
    );
    tree
}

/// Card with one bullet per line group. Falls back to body sentences when
/// the slide has no bullets.
pub fn bullet_card(ctx: &LayoutContext<'_>) -> RenderTree {
    let colors = ctx.colors;
    let mut tree = ctx.tree(ids::BULLET_CARD, colors.background);
    ctx.slide_image(&mut tree);
    let card = card(ctx, &mut tree);
    let x = card.rect.x + card.padding as i32;
    let inner = card.rect.width.saturating_sub(card.padding * 2);
    let mut y = text_block(
        &mut tree,
        x,
        card.rect.y + (card.padding + ctx.px(52)) as i32,
        inner,
        heading(ctx.px(56), ctx.px(68), colors.text, TextAlign::Left, 3),
        &ctx.slide.headline,
    );

    let items: Vec<String> = if ctx.slide.bullets.is_empty() {
        ctx.slide
            .body
            .split(['.', '\n'])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        ctx.slide.bullets.clone()
    };
    let dot = ctx.px(14).max(2);
    for item in items.iter().take(6) {
        y += ctx.px(32) as i32;
        tree.push(RenderNode::Rect {
            rect: Rect::new(x, y + ctx.px(16) as i32, dot, dot),
            fill: colors.accent,
            radius: dot / 2,
        });
        let indent = ctx.px(40);
        y = text_block(
            &mut tree,
            x + indent as i32,
            y,
            inner.saturating_sub(indent),
            body(ctx.px(34), ctx.px(46), colors.text, TextAlign::Left, 3),
            item,
        );
    }
    tree
}

/// Oversized accent quote mark over a centered statement.
pub fn quote_card(ctx: &LayoutContext<'_>) -> RenderTree {
    let colors = ctx.colors;
    let mut tree = ctx.tree(ids::QUOTE_CARD, colors.background);
    ctx.slide_image(&mut tree);
    let margin = ctx.px(96);
    let inner = ctx.width.saturating_sub(margin * 2);
    let top = ctx.frac_h(18);
    tree.push(RenderNode::Text {
        x: margin as i32,
        y: top,
        width: inner,
        size: ctx.px(220),
        line_height: ctx.px(220),
        color: colors.accent,
        font: FontRole::Heading,
        align: TextAlign::Left,
        lines: vec!["\u{201C}".to_string()],
    });
    let after_quote = text_block(
        &mut tree,
        margin as i32,
        top + ctx.px(200) as i32,
        inner,
        heading(ctx.px(64), ctx.px(80), colors.text, TextAlign::Center, 5),
        &ctx.slide.headline,
    );
    text_block(
        &mut tree,
        margin as i32,
        after_quote + ctx.px(48) as i32,
        inner,
        body(ctx.px(32), ctx.px(44), colors.accent, TextAlign::Center, 4),
        &ctx.slide.body,
    );
    tree
}

/// Accent-filled closing slide with centered takeaway and logo.
pub fn closing_card(ctx: &LayoutContext<'_>) -> RenderTree {
    let colors = ctx.colors;
    let mut tree = ctx.tree(ids::CLOSING_CARD, colors.accent);
    let ink = Color::readable_on(colors.accent);
    if ctx.slide_image(&mut tree) {
        tree.push(RenderNode::Rect {
            rect: ctx.full_rect(),
            fill: colors.accent.with_alpha(0xCC),
            radius: 0,
        });
    }
    let margin = ctx.px(96);
    let inner = ctx.width.saturating_sub(margin * 2);
    let after_headline = text_block(
        &mut tree,
        margin as i32,
        ctx.frac_h(30),
        inner,
        heading(ctx.px(72), ctx.px(86), ink, TextAlign::Center, 4),
        &ctx.slide.headline,
    );
    text_block(
        &mut tree,
        margin as i32,
        after_headline + ctx.px(40) as i32,
        inner,
        body(ctx.px(36), ctx.px(50), ink, TextAlign::Center, 5),
        &ctx.slide.body,
    );
    let logo = ctx.px(180);
    ctx.logo(
        &mut tree,
        Rect::new(
            (ctx.width / 2 - logo / 2) as i32,
            ctx.height as i32 - (ctx.px(96) + logo) as i32,
            logo,
            logo,
        ),
    );
    tree
}

/// Headline, supporting line and an accent button.
pub fn cta_card(ctx: &LayoutContext<'_>) -> RenderTree {
    let colors = ctx.colors;
    let mut tree = ctx.tree(ids::CTA_CARD, colors.background);
    ctx.slide_image(&mut tree);
    let margin = ctx.px(96);
    let inner = ctx.width.saturating_sub(margin * 2);
    let after_headline = text_block(
        &mut tree,
        margin as i32,
        ctx.frac_h(24),
        inner,
        heading(ctx.px(72), ctx.px(86), colors.text, TextAlign::Center, 4),
        &ctx.slide.headline,
    );
    let after_body = text_block(
        &mut tree,
        margin as i32,
        after_headline + ctx.px(40) as i32,
        inner,
        body(ctx.px(36), ctx.px(50), colors.text, TextAlign::Center, 4),
        &ctx.slide.body,
    );

    let label = ctx
        .slide
        .bullets
        .first()
        .map(String::as_str)
        .unwrap_or("Learn more");
    let button_width = ctx.px(520);
    let button = Rect::new(
        (ctx.width / 2 - button_width / 2) as i32,
        after_body + ctx.px(72) as i32,
        button_width,
        ctx.px(112),
    );
    tree.push(RenderNode::Rect {
        rect: button,
        fill: colors.accent,
        radius: ctx.px(56),
    });
    let label_size = ctx.px(38);
    text_block(
        &mut tree,
        button.x + ctx.px(24) as i32,
        button.y + ((button.height.saturating_sub(label_size)) / 2) as i32,
        button.width.saturating_sub(ctx.px(48)),
        heading(label_size, label_size, Color::readable_on(colors.accent), TextAlign::Center, 1),
        label,
    );
    tree
}

/// Free-mode layout: full-bleed image with text on a bottom scrim.
pub fn generic(ctx: &LayoutContext<'_>) -> RenderTree {
    let colors = ctx.colors;
    let mut tree = ctx.tree(ids::GENERIC, colors.background);
    let has_image = ctx.slide_image(&mut tree);
    let scrim_top = ctx.frac_h(60);
    let ink = if has_image {
        tree.push(RenderNode::Rect {
            rect: Rect::new(0, scrim_top, ctx.width, ctx.height - scrim_top as u32),
            fill: Color::BLACK.with_alpha(0x99),
            radius: 0,
        });
        Color::WHITE
    } else {
        colors.text
    };
    let margin = ctx.px(72);
    let inner = ctx.width.saturating_sub(margin * 2);
    let after_headline = text_block(
        &mut tree,
        margin as i32,
        scrim_top + ctx.px(56) as i32,
        inner,
        heading(ctx.px(64), ctx.px(76), ink, TextAlign::Left, 3),
        &ctx.slide.headline,
    );
    text_block(
        &mut tree,
        margin as i32,
        after_headline + ctx.px(24) as i32,
        inner,
        body(ctx.px(32), ctx.px(44), ink, TextAlign::Left, 3),
        &ctx.slide.body,
    );
    tree
}
