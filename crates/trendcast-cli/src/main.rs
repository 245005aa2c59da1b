use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use trendcast_contracts::content::{ContentFormat, ContentStatus, SlideEdit, VisualMode};
use trendcast_contracts::events::EventLog;
use trendcast_contracts::templates::TemplateSet;
use trendcast_contracts::trends::StyleConfig;
use trendcast_engine::render::export::{caption_text, slide_file_name, CAPTION_FILE};
use trendcast_engine::render::raster::{load_font, FetchingImageSource};
use trendcast_engine::render::svg::to_svg;
use trendcast_engine::{
    content_response, slide_image_response, EngineConfig, Exporter, GenerateContentRequest,
    ImageOptions, JsonFileStore, Pipeline, PipelineResponse, TemplateRegistry,
};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "trendcast", version, about = "Turn trends into branded social slides")]
struct Cli {
    /// JSON snapshot holding brands, trends, templates and content.
    #[arg(long, global = true, default_value = "trendcast-store.json")]
    store: PathBuf,
    /// Append pipeline events to this `events.jsonl`.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Use the offline collaborators instead of OpenRouter.
    #[arg(long, global = true)]
    dryrun: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate copy and slide structure for a trend.
    Generate(GenerateArgs),
    /// Generate the image for one slide.
    SlideImage(SlideImageArgs),
    /// Generate images for every slide of a content item.
    Images(ImagesArgs),
    /// Render one slide to SVG or PNG.
    Render(RenderArgs),
    /// Export every slide plus the caption as a ZIP.
    Export(ExportArgs),
    /// Move content through its lifecycle.
    Status(StatusArgs),
    /// Edit the text of one slide.
    Edit(EditArgs),
    #[command(subcommand)]
    Templates(TemplatesCommand),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    trend: Uuid,
    #[arg(long, default_value = "carousel")]
    format: ContentFormat,
    #[arg(long, default_value = "free")]
    mode: VisualMode,
    #[arg(long)]
    brand: Option<Uuid>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    gallery: Option<Uuid>,
    #[arg(long)]
    tone: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    text_model: Option<String>,
}

#[derive(Debug, Args)]
struct ImageModelArgs {
    #[arg(long)]
    gallery: Option<Uuid>,
    #[arg(long)]
    image_model: Option<String>,
}

impl ImageModelArgs {
    fn options(&self) -> ImageOptions {
        ImageOptions {
            style_gallery_id: self.gallery,
            image_model: self.image_model.clone(),
        }
    }
}

#[derive(Debug, Args)]
struct SlideImageArgs {
    #[arg(long)]
    content: Uuid,
    #[arg(long)]
    slide: usize,
    /// Generate a text-free background instead of a full slide image.
    #[arg(long)]
    background: bool,
    #[command(flatten)]
    model: ImageModelArgs,
}

#[derive(Debug, Args)]
struct ImagesArgs {
    #[arg(long)]
    content: Uuid,
    #[command(flatten)]
    model: ImageModelArgs,
}

#[derive(Debug, Args)]
struct RenderArgs {
    #[arg(long)]
    content: Uuid,
    #[arg(long, default_value_t = 0)]
    slide: usize,
    /// Output path; `.svg` writes SVG, anything else PNG.
    #[arg(long)]
    out: PathBuf,
    /// TrueType font used for PNG text.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(long)]
    content: Uuid,
    /// ZIP path, or a directory when `--pngs` is set.
    #[arg(long)]
    out: PathBuf,
    /// Write loose slide PNGs and caption instead of a ZIP.
    #[arg(long)]
    pngs: bool,
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[arg(long)]
    content: Uuid,
    #[arg(long)]
    to: ContentStatus,
    /// RFC 3339 timestamp, required when scheduling.
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[derive(Debug, Args)]
struct EditArgs {
    #[arg(long)]
    content: Uuid,
    #[arg(long)]
    slide: usize,
    #[arg(long)]
    headline: Option<String>,
    #[arg(long)]
    body: Option<String>,
    /// Repeat for each bullet.
    #[arg(long = "bullet")]
    bullets: Vec<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Subcommand)]
enum TemplatesCommand {
    /// List the built-in layout ids.
    List,
    /// Activate a role → template set for a brand.
    Activate(ActivateArgs),
}

#[derive(Debug, Args)]
struct ActivateArgs {
    #[arg(long)]
    brand: Uuid,
    #[arg(long)]
    category: Option<String>,
    /// `role=template`, repeatable.
    #[arg(long = "role", value_parser = parse_role_pair)]
    roles: Vec<(String, String)>,
}

fn parse_role_pair(raw: &str) -> Result<(String, String), String> {
    let (role, template) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected role=template, got '{raw}'"))?;
    let (role, template) = (role.trim(), template.trim());
    if role.is_empty() || template.is_empty() {
        return Err(format!("expected role=template, got '{raw}'"));
    }
    Ok((role.to_ascii_lowercase(), template.to_string()))
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("trendcast error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Command::Templates(TemplatesCommand::List) = cli.command {
        let registry = TemplateRegistry::builtin();
        let ids: Vec<&str> = registry.ids().collect();
        print_json(&json!({ "templates": ids }))?;
        return Ok(0);
    }

    let pipeline = open_pipeline(&cli)?;
    match cli.command {
        Command::Generate(args) => {
            let mut style = StyleConfig::default();
            if let Some(tone) = args.tone {
                style.tone = tone;
            }
            if let Some(language) = args.language {
                style.language = language;
            }
            let request = GenerateContentRequest {
                trend_id: args.trend,
                style,
                content_type: args.format,
                visual_mode: args.mode,
                brand_id: args.brand,
                category: args.category,
                style_gallery_id: args.gallery,
                text_model: args.text_model,
            };
            respond(content_response(&pipeline.generate_content(&request)))
        }
        Command::SlideImage(args) => {
            let options = args.model.options();
            let result = if args.background {
                pipeline.generate_background_image(args.content, args.slide, &options)
            } else {
                pipeline.generate_slide_image(args.content, args.slide, &options)
            };
            respond(slide_image_response(&result))
        }
        Command::Images(args) => match pipeline.generate_all_images(args.content, &args.model.options()) {
            Ok(report) => {
                print_json(&json!({
                    "success": report.summary.all_succeeded(),
                    "summary": report.summary,
                    "slides": report.slides,
                }))?;
                Ok(if report.summary.all_succeeded() { 0 } else { 2 })
            }
            Err(err) => respond(PipelineResponse::from_error(&err)),
        },
        Command::Render(args) => {
            let content = pipeline.content(args.content)?;
            let images = FetchingImageSource::new(pipeline.config().request_timeout)?;
            let font = args.font.as_deref().map(load_font).transpose()?;
            let exporter = Exporter::new(&images).with_font(font.as_ref());
            let is_svg = args
                .out
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
            if is_svg {
                let tree = exporter.tree(&content, args.slide)?;
                write_file(&args.out, to_svg(&tree).as_bytes())?;
            } else {
                write_file(&args.out, &exporter.slide_png(&content, args.slide)?)?;
            }
            print_json(&json!({ "success": true, "path": args.out }))?;
            Ok(0)
        }
        Command::Export(args) => {
            let content = pipeline.content(args.content)?;
            let images = FetchingImageSource::new(pipeline.config().request_timeout)?;
            let font = args.font.as_deref().map(load_font).transpose()?;
            let exporter = Exporter::new(&images).with_font(font.as_ref());
            if args.pngs {
                fs::create_dir_all(&args.out)
                    .with_context(|| format!("failed to create {}", args.out.display()))?;
                for index in 0..content.slides.len() {
                    let png = exporter.slide_png(&content, index)?;
                    write_file(&args.out.join(slide_file_name(index)), &png)?;
                }
                write_file(&args.out.join(CAPTION_FILE), caption_text(&content).as_bytes())?;
            } else {
                write_file(&args.out, &exporter.content_zip(&content)?)?;
            }
            print_json(&json!({
                "success": true,
                "path": args.out,
                "slides": content.slides.len(),
            }))?;
            Ok(0)
        }
        Command::Status(args) => {
            let result = pipeline.set_status(args.content, args.to, args.at);
            respond(content_response(&result))
        }
        Command::Edit(args) => {
            let edit = SlideEdit {
                headline: args.headline,
                body: args.body,
                bullets: (!args.bullets.is_empty()).then_some(args.bullets),
                speaker_notes: args.notes,
            };
            if edit == SlideEdit::default() {
                bail!("nothing to edit: pass --headline, --body, --bullet or --notes");
            }
            respond(content_response(&pipeline.edit_slide(args.content, args.slide, edit)))
        }
        Command::Templates(TemplatesCommand::Activate(args)) => {
            if args.roles.is_empty() {
                bail!("at least one --role role=template is required");
            }
            let registry = TemplateRegistry::builtin();
            let mut set = TemplateSet::new(args.brand, args.category);
            for (role, template) in &args.roles {
                if !registry.contains(template) {
                    tracing::warn!(role = %role, template = %template, "template is not built in; rendering falls back to text_card");
                }
                set = set.with_role(role, template);
            }
            let stored = pipeline.activate_template_set(set)?;
            print_json(&json!({ "success": true, "templateSet": stored }))?;
            Ok(0)
        }
        Command::Templates(TemplatesCommand::List) => Ok(0),
    }
}

fn open_pipeline(cli: &Cli) -> Result<Pipeline> {
    let mut config = EngineConfig::from_env();
    if cli.dryrun {
        config.batch_delay = Duration::ZERO;
    }
    let store = JsonFileStore::new(&cli.store);
    let mut pipeline = Pipeline::from_config(config, Box::new(store), cli.dryrun)
        .context("failed to set up the pipeline")?;
    if let Some(path) = cli.events.as_ref() {
        let request_id = format!("cli-{}", Uuid::new_v4());
        pipeline = pipeline.with_events(EventLog::new(path, request_id));
    }
    Ok(pipeline)
}

fn respond(response: PipelineResponse) -> Result<i32> {
    print_json(&response.body)?;
    Ok(if response.is_success() { 0 } else { 2 })
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
