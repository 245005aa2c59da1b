//! SVG serialization of a render tree, for previews that need no font or
//! image decoding on the server.

use std::fmt::Write;

use super::tree::{Color, FontRole, ImageFit, RenderNode, RenderTree, TextAlign};

pub fn to_svg(tree: &RenderTree) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = tree.width,
        h = tree.height
    );
    let _ = write!(
        out,
        r#"<rect x="0" y="0" width="{}" height="{}" {}/>"#,
        tree.width,
        tree.height,
        fill_attrs(tree.background)
    );

    for node in &tree.nodes {
        match node {
            RenderNode::Rect { rect, fill, radius } => {
                let _ = write!(
                    out,
                    r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{radius}" {}/>"#,
                    rect.x,
                    rect.y,
                    rect.width,
                    rect.height,
                    fill_attrs(*fill)
                );
            }
            RenderNode::Text {
                x,
                y,
                width,
                size,
                line_height,
                color,
                font,
                align,
                lines,
            } => {
                let family = match font {
                    FontRole::Heading => &tree.heading_font,
                    FontRole::Body => &tree.body_font,
                };
                let (anchor, left) = match align {
                    TextAlign::Left => ("start", *x),
                    TextAlign::Center => ("middle", *x + (*width / 2) as i32),
                };
                let weight = if *font == FontRole::Heading { "700" } else { "400" };
                let _ = write!(
                    out,
                    r#"<text font-family="{}" font-size="{size}" font-weight="{weight}" text-anchor="{anchor}" dominant-baseline="hanging" {}>"#,
                    escape(family),
                    fill_attrs(*color)
                );
                for (index, line) in lines.iter().enumerate() {
                    let top = *y + (index as u32 * line_height) as i32;
                    let _ = write!(out, r#"<tspan x="{left}" y="{top}">{}</tspan>"#, escape(line));
                }
                out.push_str("</text>");
            }
            RenderNode::Curve {
                start,
                control,
                end,
                stroke,
                thickness,
                fill,
            } => {
                let curve = format!(
                    "M {} {} Q {} {} {} {}",
                    start.0, start.1, control.0, control.1, end.0, end.1
                );
                if let Some(fill) = fill {
                    let _ = write!(
                        out,
                        r#"<path d="{curve} L {} {h} L {} {h} Z" {}/>"#,
                        end.0,
                        start.0,
                        fill_attrs(*fill),
                        h = tree.height
                    );
                }
                let _ = write!(
                    out,
                    r#"<path d="{curve}" fill="none" stroke="{}" stroke-opacity="{}" stroke-width="{thickness}"/>"#,
                    stroke.with_alpha(0xFF).to_hex(),
                    opacity(*stroke)
                );
            }
            RenderNode::Image { rect, url, fit } => {
                let aspect = match fit {
                    ImageFit::Cover => "xMidYMid slice",
                    ImageFit::Contain => "xMidYMid meet",
                };
                let _ = write!(
                    out,
                    r#"<image href="{}" x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="{aspect}"/>"#,
                    escape(url),
                    rect.x,
                    rect.y,
                    rect.width,
                    rect.height
                );
            }
        }
    }
    out.push_str("</svg>");
    out
}

fn fill_attrs(color: Color) -> String {
    if color.a == 0xFF {
        format!(r#"fill="{}""#, color.to_hex())
    } else {
        format!(
            r#"fill="{}" fill-opacity="{}""#,
            color.with_alpha(0xFF).to_hex(),
            opacity(color)
        )
    }
}

fn opacity(color: Color) -> String {
    format!("{:.3}", color.a as f32 / 255.0)
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use trendcast_contracts::brand::BrandTokens;
    use trendcast_contracts::content::{Slide, SlideRole};
    use trendcast_contracts::templates::ids;

    use super::to_svg;
    use crate::render::render_slide;

    #[test]
    fn svg_carries_escaped_text_and_fonts() {
        let slide = Slide::text(SlideRole::Cover, "Rates & <risks>", "Body");
        let tree = render_slide(&slide, &BrandTokens::unbranded(), ids::COVER_CURVE, (1080, 1350));
        let svg = to_svg(&tree);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Rates &amp; &lt;risks&gt;"));
        assert!(svg.contains(r#"font-family="Inter""#));
        assert!(svg.contains(" Q 540 "));
    }
}
