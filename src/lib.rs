pub mod config;
pub mod edit;
pub mod error;
pub mod images;
pub mod interactive;
pub mod media;
pub mod pipeline;
pub mod project;
pub mod render;
pub mod timeline;
pub mod transcribe;
pub mod transcript;

pub use config::Config;
pub use error::{AutocutError, Result};
pub use pipeline::{
    compile_edit_graph, print_summary, run_pipeline, OverlayMode, PipelineOptions, Step,
};
