mod registry;
mod selectors;

pub use registry::{ModelCapability, ModelRegistry, ModelSpec, DRYRUN_GATEWAY};
pub use selectors::{ModelSelection, ModelSelector};
