pub mod brand;
pub mod content;
pub mod events;
pub mod models;
pub mod references;
pub mod runs;
pub mod templates;
pub mod trends;
