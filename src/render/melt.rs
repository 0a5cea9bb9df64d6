//! Rendering through the MLT `melt` command-line tool.

use std::io::{Read, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{AutocutError, Result};
use crate::media::VideoProperties;
use crate::render::mlt::MltDocument;
use crate::render::Renderer;
use crate::timeline::graph::EditGraph;

/// Check if melt is installed and accessible.
pub fn check_melt() -> Result<()> {
    let output = Command::new("melt").arg("-version").output().map_err(|e| {
        AutocutError::RenderFailed(format!(
            "melt not found. Install the MLT framework and ensure melt is in your PATH. Error: {e}"
        ))
    })?;

    // melt historically exits non-zero for -version on some builds; the
    // binary being spawnable is the signal that matters.
    debug!("melt is available ({})", output.status);
    Ok(())
}

/// Renders edit graphs by writing an MLT document to a temp file and
/// running `melt` on it. The encode is a blocking child process; a shared
/// flag cancels it between poll intervals.
pub struct MeltRenderer {
    properties: VideoProperties,
    cancelled: Arc<AtomicBool>,
}

impl MeltRenderer {
    pub fn new(properties: VideoProperties) -> Self {
        Self {
            properties,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag (typically wired to Ctrl-C).
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    fn run_melt(&self, document_path: &Path, output: &Path) -> Result<()> {
        let mut child = Command::new("melt")
            .arg(document_path)
            .arg("-consumer")
            .arg(format!("avformat:{}", output.display()))
            .args(["vcodec=libx264", "acodec=aac", "crf=18", "preset=medium"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AutocutError::RenderFailed(format!("Failed to spawn melt: {e}")))?;

        let status = loop {
            if self.cancelled.load(Ordering::Relaxed) {
                warn!("Render cancelled, stopping melt");
                let _ = child.kill();
                let _ = child.wait();
                return Err(AutocutError::RenderFailed("render cancelled".to_string()));
            }

            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => std::thread::sleep(Duration::from_millis(100)),
                Err(e) => {
                    return Err(AutocutError::RenderFailed(format!(
                        "Failed to wait for melt: {e}"
                    )))
                }
            }
        };

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(AutocutError::RenderFailed(format!(
                "melt exited with {status}: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl Renderer for MeltRenderer {
    fn render(&self, graph: &EditGraph, output: &Path) -> Result<PathBuf> {
        check_melt()?;

        let xml = MltDocument::new(graph, &self.properties).to_xml();

        let mut document = tempfile::Builder::new()
            .suffix(".mlt")
            .tempfile()
            .map_err(AutocutError::Io)?;
        document.write_all(xml.as_bytes()).map_err(AutocutError::Io)?;
        document.flush().map_err(AutocutError::Io)?;

        info!(
            "Rendering {} clips / {} overlay tracks to {}",
            graph.clips.len(),
            graph.overlay_tracks.len(),
            output.display()
        );
        debug!("MLT document at {:?}", document.path());

        self.run_melt(document.path(), output)?;

        if !output.exists() {
            return Err(AutocutError::RenderFailed(
                "melt reported success but produced no output file".to_string(),
            ));
        }

        info!("Render complete: {}", output.display());
        Ok(output.to_path_buf())
    }
}
