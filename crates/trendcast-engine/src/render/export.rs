//! PNG and ZIP export of generated content.

use std::io::{Cursor, Write};

use rusttype::Font;
use trendcast_contracts::brand::BrandTokens;
use trendcast_contracts::content::GeneratedContent;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use super::raster::{encode_png, ImageSource, Rasterizer};
use super::tree::RenderTree;
use super::{template_for_slide, TemplateRegistry};
use crate::error::{PipelineError, PipelineResult};

pub const CAPTION_FILE: &str = "caption.txt";

pub fn slide_file_name(index: usize) -> String {
    format!("slide-{:02}.png", index + 1)
}

/// Caption followed by a blank line and the hashtags, when there are any.
pub fn caption_text(content: &GeneratedContent) -> String {
    let mut text = content.caption.trim().to_string();
    if !content.hashtags.is_empty() {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&content.hashtags.join(" "));
    }
    text.push('\n');
    text
}

pub struct Exporter<'a> {
    registry: TemplateRegistry,
    font: Option<&'a Font<'static>>,
    images: &'a dyn ImageSource,
}

impl<'a> Exporter<'a> {
    pub fn new(images: &'a dyn ImageSource) -> Self {
        Self {
            registry: TemplateRegistry::builtin(),
            font: None,
            images,
        }
    }

    pub fn with_font(mut self, font: Option<&'a Font<'static>>) -> Self {
        self.font = font;
        self
    }

    pub fn with_registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Renders with the brand snapshot frozen on the content, never the
    /// brand's current tokens.
    pub fn tree(&self, content: &GeneratedContent, index: usize) -> PipelineResult<RenderTree> {
        let slide = content
            .slides
            .get(index)
            .ok_or_else(|| PipelineError::not_found("slide", index))?;
        let tokens = content
            .brand_snapshot
            .clone()
            .unwrap_or_else(BrandTokens::unbranded);
        let template = template_for_slide(slide, content.visual_mode);
        Ok(self
            .registry
            .render(slide, &tokens, &template, content.content_type.dimensions()))
    }

    pub fn slide_png(&self, content: &GeneratedContent, index: usize) -> PipelineResult<Vec<u8>> {
        let tree = self.tree(content, index)?;
        let image = Rasterizer::new(self.images)
            .with_font(self.font)
            .rasterize(&tree);
        encode_png(&image)
    }

    /// `slide-01.png`, `slide-02.png`, ... followed by `caption.txt`.
    pub fn content_zip(&self, content: &GeneratedContent) -> PipelineResult<Vec<u8>> {
        if content.slides.is_empty() {
            return Err(PipelineError::Render(format!(
                "content {} has no slides to export",
                content.id
            )));
        }
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options = FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(0o644);

            for index in 0..content.slides.len() {
                let png = self.slide_png(content, index)?;
                let name = slide_file_name(index);
                zip.start_file(name.as_str(), options)
                    .map_err(|err| zip_error(&name, err))?;
                zip.write_all(&png)
                    .map_err(|err| PipelineError::Render(format!("write {name}: {err}")))?;
            }
            zip.start_file(CAPTION_FILE, options)
                .map_err(|err| zip_error(CAPTION_FILE, err))?;
            zip.write_all(caption_text(content).as_bytes())
                .map_err(|err| PipelineError::Render(format!("write {CAPTION_FILE}: {err}")))?;
            zip.finish()
                .map_err(|err| PipelineError::Render(format!("finalize zip: {err}")))?;
        }
        tracing::info!(
            content_id = %content.id,
            slides = content.slides.len(),
            bytes = buffer.len(),
            "content exported"
        );
        Ok(buffer)
    }
}

fn zip_error(name: &str, err: zip::result::ZipError) -> PipelineError {
    PipelineError::Render(format!("add {name} to zip: {err}"))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use trendcast_contracts::content::{
        ContentFormat, GeneratedContent, Slide, SlideRole, VisualMode,
    };

    use super::{caption_text, Exporter};
    use crate::error::PipelineError;
    use crate::render::raster::NoImages;

    fn carousel() -> GeneratedContent {
        let mut content = GeneratedContent::draft(ContentFormat::Carousel, VisualMode::BrandStrict);
        content.caption = "Rates are moving.".to_string();
        content.hashtags = vec!["#rates".to_string(), "#macro".to_string()];
        content.slides = vec![
            Slide::text(SlideRole::Cover, "Rates fall", "Again"),
            Slide::text(SlideRole::Context, "Why", "Inflation cooled"),
            Slide::text(SlideRole::Insight, "So what", "Cheaper credit"),
            Slide::text(SlideRole::Bullets, "Watch", "Housing"),
            Slide::text(SlideRole::Closing, "Takeaway", "Stay nimble"),
        ];
        content
    }

    #[test]
    fn story_slides_export_at_story_size() -> anyhow::Result<()> {
        let mut content = GeneratedContent::draft(ContentFormat::Story, VisualMode::Free);
        content.slides = vec![Slide::text(SlideRole::Cover, "Rates fall", "Again")];
        let png = Exporter::new(&NoImages).slide_png(&content, 0)?;
        let decoded = image::load_from_memory(&png)?;
        assert_eq!((decoded.width(), decoded.height()), (1080, 1920));
        assert!(matches!(
            Exporter::new(&NoImages).slide_png(&content, 3),
            Err(PipelineError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn zip_holds_ordered_slides_and_caption() -> anyhow::Result<()> {
        let content = carousel();
        let bytes = Exporter::new(&NoImages).content_zip(&content)?;
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(
            sorted,
            vec![
                "caption.txt",
                "slide-01.png",
                "slide-02.png",
                "slide-03.png",
                "slide-04.png",
                "slide-05.png"
            ]
        );

        let mut caption = String::new();
        archive.by_name("caption.txt")?.read_to_string(&mut caption)?;
        assert_eq!(caption, "Rates are moving.\n\n#rates #macro\n");
        assert_eq!(caption_text(&content), caption);

        let mut first = Vec::new();
        archive.by_name("slide-01.png")?.read_to_end(&mut first)?;
        assert_eq!(image::load_from_memory(&first)?.height(), 1350);
        Ok(())
    }
}
