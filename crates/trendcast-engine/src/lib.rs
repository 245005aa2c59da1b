//! Trend-to-slide generation pipeline.

pub mod config;
pub mod copy;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod references;
pub mod render;
pub mod retry;
pub mod storage;
pub mod store;
pub mod synth;
pub mod templates;

pub use config::{EngineConfig, StorageConfig};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    content_response, slide_image_response, BatchReport, GenerateContentRequest, ImageKind,
    ImageOptions, Pipeline, PipelineResponse, SlideImageResult, SlideImageState,
    SlideImageStatus,
};
pub use render::export::Exporter;
pub use render::{render_slide, RenderTree, TemplateRegistry};
pub use retry::RetryPolicy;
pub use store::{DataStore, JsonFileStore, MemoryStore, StoreSnapshot};
