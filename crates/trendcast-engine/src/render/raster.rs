//! Rasterizes a [`RenderTree`] into an RGBA canvas.
//!
//! Shapes go through imageproc on a blending canvas; text is drawn glyph by
//! glyph with rusttype. Without a font, text lines render as solid bars of
//! their estimated width so layouts stay inspectable.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_cubic_bezier_curve_mut, draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut,
    Blend,
};
use imageproc::point::Point;
use imageproc::rect::Rect as PixelRect;
use rusttype::{point, Font, Scale};

use super::layouts::estimated_text_width;
use super::tree::{Color, ImageFit, Rect, RenderNode, RenderTree, TextAlign};
use crate::error::{PipelineError, PipelineResult};

const CURVE_SAMPLES: u32 = 48;

/// Resolves image URLs referenced by a tree. Missing images are skipped.
pub trait ImageSource: Send + Sync {
    fn image(&self, url: &str) -> Option<RgbaImage>;
}

pub struct NoImages;

impl ImageSource for NoImages {
    fn image(&self, _url: &str) -> Option<RgbaImage> {
        None
    }
}

#[derive(Default)]
pub struct MemoryImageSource {
    images: HashMap<String, RgbaImage>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, image: RgbaImage) {
        self.images.insert(url.into(), image);
    }
}

impl ImageSource for MemoryImageSource {
    fn image(&self, url: &str) -> Option<RgbaImage> {
        self.images.get(url).cloned()
    }
}

/// Loads `http(s)://` URLs over HTTP and everything else from disk
/// (`file://` prefixes are stripped). Results, including misses, are cached
/// per URL for the lifetime of the source.
pub struct FetchingImageSource {
    client: reqwest::blocking::Client,
    cache: Mutex<HashMap<String, Option<RgbaImage>>>,
}

impl FetchingImageSource {
    pub fn new(timeout: Duration) -> PipelineResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PipelineError::Configuration(format!("image client: {err}")))?;
        Ok(Self {
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn fetch(&self, url: &str) -> Option<RgbaImage> {
        let bytes = if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .client
                .get(url)
                .send()
                .and_then(|response| response.error_for_status())
                .map_err(|err| tracing::warn!(url, error = %err, "image fetch failed"))
                .ok()?;
            response
                .bytes()
                .map_err(|err| tracing::warn!(url, error = %err, "image body unreadable"))
                .ok()?
                .to_vec()
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            std::fs::read(path)
                .map_err(|err| tracing::warn!(url, error = %err, "image read failed"))
                .ok()?
        };
        image::load_from_memory(&bytes)
            .map_err(|err| tracing::warn!(url, error = %err, "image decode failed"))
            .ok()
            .map(|decoded| decoded.to_rgba8())
    }
}

impl ImageSource for FetchingImageSource {
    fn image(&self, url: &str) -> Option<RgbaImage> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(url) {
                return hit.clone();
            }
        }
        let fetched = self.fetch(url);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url.to_string(), fetched.clone());
        }
        fetched
    }
}

pub fn load_font(path: &Path) -> PipelineResult<Font<'static>> {
    let bytes = std::fs::read(path)
        .map_err(|err| PipelineError::Render(format!("read font {}: {err}", path.display())))?;
    Font::try_from_vec(bytes)
        .ok_or_else(|| PipelineError::Render(format!("invalid font file: {}", path.display())))
}

pub struct Rasterizer<'a> {
    font: Option<&'a Font<'static>>,
    images: &'a dyn ImageSource,
}

impl<'a> Rasterizer<'a> {
    pub fn new(images: &'a dyn ImageSource) -> Self {
        Self { font: None, images }
    }

    pub fn with_font(mut self, font: Option<&'a Font<'static>>) -> Self {
        self.font = font;
        self
    }

    pub fn rasterize(&self, tree: &RenderTree) -> RgbaImage {
        let mut canvas = Blend(RgbaImage::from_pixel(
            tree.width.max(1),
            tree.height.max(1),
            rgba(tree.background),
        ));
        for node in &tree.nodes {
            match node {
                RenderNode::Rect { rect, fill, radius } => {
                    draw_rect(&mut canvas, *rect, *fill, *radius);
                }
                RenderNode::Text {
                    x,
                    y,
                    width,
                    size,
                    line_height,
                    color,
                    align,
                    lines,
                    ..
                } => {
                    for (index, line) in lines.iter().enumerate() {
                        let top = *y + (index as u32 * line_height) as i32;
                        let line_width = self.measure(line, *size);
                        let left = match align {
                            TextAlign::Left => *x,
                            TextAlign::Center => *x + (width.saturating_sub(line_width) / 2) as i32,
                        };
                        match self.font {
                            Some(font) => draw_line(&mut canvas.0, font, *size, left, top, *color, line),
                            None => {
                                let bar = (size * 6 / 10).max(1);
                                let offset = (line_height.saturating_sub(bar) / 2) as i32;
                                draw_rect(
                                    &mut canvas,
                                    Rect::new(left, top + offset, line_width.min(*width), bar),
                                    *color,
                                    0,
                                );
                            }
                        }
                    }
                }
                RenderNode::Curve {
                    start,
                    control,
                    end,
                    stroke,
                    thickness,
                    fill,
                } => {
                    if let Some(fill) = fill {
                        fill_under_curve(&mut canvas, *start, *control, *end, *fill, tree.height);
                    }
                    stroke_curve(&mut canvas, *start, *control, *end, *stroke, *thickness);
                }
                RenderNode::Image { rect, url, fit } => match self.images.image(url) {
                    Some(source) => draw_image(&mut canvas.0, &source, *rect, *fit),
                    None => tracing::debug!(url = %url, "image unavailable; skipped"),
                },
            }
        }
        canvas.0
    }

    fn measure(&self, text: &str, size: u32) -> u32 {
        match self.font {
            Some(font) => text_width(font, size as f32, text).ceil() as u32,
            None => estimated_text_width(text, size),
        }
    }
}

pub fn encode_png(image: &RgbaImage) -> PipelineResult<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| PipelineError::Render(format!("png encode: {err}")))?;
    Ok(bytes)
}

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, color.a])
}

fn fill_rect(canvas: &mut Blend<RgbaImage>, x: i32, y: i32, width: u32, height: u32, color: Rgba<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    draw_filled_rect_mut(canvas, PixelRect::at(x, y).of_size(width, height), color);
}

/// Rounded corners are only drawn for opaque fills; translucent fills would
/// double-blend where the corner circles overlap the body.
fn draw_rect(canvas: &mut Blend<RgbaImage>, rect: Rect, fill: Color, radius: u32) {
    if fill.a == 0 {
        return;
    }
    let color = rgba(fill);
    let radius = radius.min(rect.width / 2).min(rect.height / 2);
    if radius == 0 || fill.a < 0xFF {
        fill_rect(canvas, rect.x, rect.y, rect.width, rect.height, color);
        return;
    }
    let r = radius as i32;
    fill_rect(canvas, rect.x + r, rect.y, rect.width - 2 * radius, rect.height, color);
    fill_rect(canvas, rect.x, rect.y + r, rect.width, rect.height - 2 * radius, color);
    for (cx, cy) in [
        (rect.x + r, rect.y + r),
        (rect.right() - r - 1, rect.y + r),
        (rect.x + r, rect.bottom() - r - 1),
        (rect.right() - r - 1, rect.bottom() - r - 1),
    ] {
        draw_filled_circle_mut(canvas, (cx, cy), r, color);
    }
}

fn quadratic(start: (i32, i32), control: (i32, i32), end: (i32, i32), t: f32) -> (f32, f32) {
    let inv = 1.0 - t;
    let x = inv * inv * start.0 as f32 + 2.0 * inv * t * control.0 as f32 + t * t * end.0 as f32;
    let y = inv * inv * start.1 as f32 + 2.0 * inv * t * control.1 as f32 + t * t * end.1 as f32;
    (x, y)
}

fn fill_under_curve(
    canvas: &mut Blend<RgbaImage>,
    start: (i32, i32),
    control: (i32, i32),
    end: (i32, i32),
    fill: Color,
    height: u32,
) {
    let bottom = height as i32;
    if fill.a == 0 || (start.1 >= bottom && end.1 >= bottom) {
        return;
    }
    let mut points: Vec<Point<i32>> = Vec::new();
    for step in 0..=CURVE_SAMPLES {
        let (x, y) = quadratic(start, control, end, step as f32 / CURVE_SAMPLES as f32);
        let next = Point::new(x.round() as i32, y.round() as i32);
        if points.last() != Some(&next) {
            points.push(next);
        }
    }
    for corner in [Point::new(end.0, bottom), Point::new(start.0, bottom)] {
        if points.last() != Some(&corner) {
            points.push(corner);
        }
    }
    if points.len() >= 3 && points.first() != points.last() {
        draw_polygon_mut(canvas, &points, rgba(fill));
    }
}

fn stroke_curve(
    canvas: &mut Blend<RgbaImage>,
    start: (i32, i32),
    control: (i32, i32),
    end: (i32, i32),
    stroke: Color,
    thickness: u32,
) {
    if stroke.a == 0 || thickness == 0 {
        return;
    }
    let lift = |from: (i32, i32)| {
        (
            from.0 as f32 + 2.0 / 3.0 * (control.0 - from.0) as f32,
            from.1 as f32 + 2.0 / 3.0 * (control.1 - from.1) as f32,
        )
    };
    let (control_a, control_b) = (lift(start), lift(end));
    let half = thickness as f32 / 2.0;
    for band in 0..thickness {
        let dy = band as f32 - half;
        draw_cubic_bezier_curve_mut(
            canvas,
            (start.0 as f32, start.1 as f32 + dy),
            (end.0 as f32, end.1 as f32 + dy),
            (control_a.0, control_a.1 + dy),
            (control_b.0, control_b.1 + dy),
            rgba(stroke),
        );
    }
}

fn draw_image(canvas: &mut RgbaImage, source: &RgbaImage, rect: Rect, fit: ImageFit) {
    if rect.width == 0 || rect.height == 0 || source.width() == 0 || source.height() == 0 {
        return;
    }
    let dynamic = DynamicImage::ImageRgba8(source.clone());
    let (scaled, x, y) = match fit {
        ImageFit::Cover => (
            dynamic
                .resize_to_fill(rect.width, rect.height, FilterType::Triangle)
                .to_rgba8(),
            rect.x,
            rect.y,
        ),
        ImageFit::Contain => {
            let scaled = dynamic
                .resize(rect.width, rect.height, FilterType::Triangle)
                .to_rgba8();
            let x = rect.x + (rect.width.saturating_sub(scaled.width()) / 2) as i32;
            let y = rect.y + (rect.height.saturating_sub(scaled.height()) / 2) as i32;
            (scaled, x, y)
        }
    };
    imageops::overlay(canvas, &scaled, x as i64, y as i64);
}

fn text_width(font: &Font<'static>, px: f32, text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    font.layout(text, scale, point(0.0, v_metrics.ascent))
        .filter_map(|glyph| glyph.pixel_bounding_box())
        .map(|bb| bb.max.x as f32)
        .fold(0.0, f32::max)
}

fn draw_line(canvas: &mut RgbaImage, font: &Font<'static>, size: u32, x: i32, y: i32, color: Color, text: &str) {
    let scale = Scale::uniform(size as f32);
    let v_metrics = font.v_metrics(scale);
    let origin = point(x as f32, y as f32 + v_metrics.ascent);
    let opacity = color.a as f32 / 255.0;
    for glyph in font.layout(text, scale, origin) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let px = gx as i32 + bb.min.x;
            let py = gy as i32 + bb.min.y;
            if px < 0 || py < 0 || px as u32 >= canvas.width() || py as u32 >= canvas.height() {
                return;
            }
            let alpha = coverage * opacity;
            if alpha <= 0.0 {
                return;
            }
            let dst = canvas.get_pixel_mut(px as u32, py as u32);
            let inv = 1.0 - alpha;
            dst.0[0] = (color.r as f32 * alpha + dst.0[0] as f32 * inv) as u8;
            dst.0[1] = (color.g as f32 * alpha + dst.0[1] as f32 * inv) as u8;
            dst.0[2] = (color.b as f32 * alpha + dst.0[2] as f32 * inv) as u8;
            dst.0[3] = 255;
        });
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use trendcast_contracts::brand::BrandTokens;
    use trendcast_contracts::content::{Slide, SlideRole};
    use trendcast_contracts::templates::ids;

    use super::{encode_png, MemoryImageSource, NoImages, Rasterizer};
    use crate::render::layouts::LayoutColors;
    use crate::render::render_slide;
    use crate::render::tree::{Color, ImageFit, Rect, RenderNode, RenderTree};

    fn px(color: Color) -> Rgba<u8> {
        Rgba([color.r, color.g, color.b, color.a])
    }

    #[test]
    fn cover_paints_background_and_accent_curve() {
        let tokens = BrandTokens::unbranded();
        let colors = LayoutColors::from_tokens(&tokens);
        let slide = Slide::text(SlideRole::Cover, "Rates fall again", "Body");
        let tree = render_slide(&slide, &tokens, ids::COVER_CURVE, (1080, 1350));
        let image = Rasterizer::new(&NoImages).rasterize(&tree);

        assert_eq!(image.dimensions(), (1080, 1350));
        assert_eq!(*image.get_pixel(5, 5), px(colors.background));
        assert_eq!(*image.get_pixel(540, 1300), px(colors.accent));
    }

    #[test]
    fn rasterizing_is_deterministic() -> anyhow::Result<()> {
        let tokens = BrandTokens::unbranded();
        let slide = Slide::text(SlideRole::Context, "Why now", "Inflation cooled for a third month.");
        let tree = render_slide(&slide, &tokens, ids::TEXT_CARD, (1080, 1350));
        let first = encode_png(&Rasterizer::new(&NoImages).rasterize(&tree))?;
        let second = encode_png(&Rasterizer::new(&NoImages).rasterize(&tree))?;
        assert_eq!(first, second);
        assert_eq!(image::load_from_memory(&first)?.width(), 1080);
        Ok(())
    }

    #[test]
    fn images_are_fitted_into_their_rect() {
        let mut source = MemoryImageSource::new();
        source.insert("mem://red", RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255])));
        let mut tree = RenderTree::new("test", 100, 100, Color::WHITE);
        tree.push(RenderNode::Image {
            rect: Rect::new(10, 10, 50, 50),
            url: "mem://red".to_string(),
            fit: ImageFit::Cover,
        });
        tree.push(RenderNode::Image {
            rect: Rect::new(0, 0, 10, 10),
            url: "mem://missing".to_string(),
            fit: ImageFit::Contain,
        });
        let image = Rasterizer::new(&source).rasterize(&tree);
        assert_eq!(*image.get_pixel(30, 30), Rgba([255, 0, 0, 255]));
        assert_eq!(*image.get_pixel(5, 5), Rgba([255, 255, 255, 255]));
        assert_eq!(*image.get_pixel(70, 70), Rgba([255, 255, 255, 255]));
    }
}
