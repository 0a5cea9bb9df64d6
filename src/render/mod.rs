//! Graph execution: turning an [`EditGraph`] into an encoded video.
//!
//! Graph construction never touches a renderer; everything renderer-shaped
//! lives behind the [`Renderer`] trait so the compiler stays testable on
//! machines with nothing installed.

pub mod melt;
pub mod mlt;

pub use melt::MeltRenderer;
pub use mlt::MltDocument;

use crate::error::Result;
use crate::timeline::graph::EditGraph;
use std::path::{Path, PathBuf};

/// Narrow rendering interface. A failed render surfaces as
/// [`crate::error::AutocutError::RenderFailed`], the only error kind the
/// calling layer is expected to retry, and at most once.
pub trait Renderer {
    fn render(&self, graph: &EditGraph, output: &Path) -> Result<PathBuf>;
}
