//! Bounded-parallel image generation.
//!
//! Each planned image succeeds or fails on its own; one bad prompt must not
//! sink the batch. The orchestrator reports per-image outcomes so the
//! pipeline can drop exactly the placements whose files never appeared.

use crate::error::Result;
use crate::images::PlannedImage;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// A service that can turn a prompt into an image file.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, prompt: &str, output: &Path) -> Result<()>;
}

/// Result of one planned image.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub file_name: String,
    pub path: PathBuf,
    pub error: Option<String>,
}

impl GenerationOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Statistics from one generation run.
#[derive(Debug, Clone)]
pub struct GenerationStats {
    pub requested: usize,
    pub generated: usize,
    pub skipped_existing: usize,
    pub failed: usize,
}

/// Runs image generation with a fixed concurrency cap.
pub struct GenerationOrchestrator {
    generator: Arc<dyn ImageGenerator>,
    concurrency: usize,
    show_progress: bool,
}

impl GenerationOrchestrator {
    pub fn new(generator: Box<dyn ImageGenerator>, concurrency: usize) -> Self {
        Self {
            generator: Arc::from(generator),
            concurrency: concurrency.max(1),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Generate every planned image that is not already on disk.
    ///
    /// Already-present files are skipped (generation is resumable); failures
    /// are collected, not propagated, so a partial batch still renders.
    pub async fn generate_missing(
        &self,
        images: &[PlannedImage],
        images_dir: &Path,
    ) -> Result<(Vec<GenerationOutcome>, GenerationStats)> {
        tokio::fs::create_dir_all(images_dir).await?;

        let mut outcomes = Vec::with_capacity(images.len());
        let mut pending: Vec<(usize, PlannedImage)> = Vec::new();
        let mut skipped = 0usize;

        for (i, image) in images.iter().enumerate() {
            let path = images_dir.join(&image.file_name);
            if path.exists() {
                debug!("Image already exists, skipping: {}", path.display());
                skipped += 1;
                outcomes.push(GenerationOutcome {
                    file_name: image.file_name.clone(),
                    path,
                    error: None,
                });
            } else {
                pending.push((i, image.clone()));
            }
        }

        if pending.is_empty() {
            let stats = GenerationStats {
                requested: images.len(),
                generated: 0,
                skipped_existing: skipped,
                failed: 0,
            };
            return Ok((outcomes, stats));
        }

        info!(
            "Generating {} image(s) with {} (concurrency: {})",
            pending.len(),
            self.generator.name(),
            self.concurrency
        );
        let start = Instant::now();

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(pending.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} images ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut futures = FuturesUnordered::new();

        for (index, image) in pending {
            let sem = semaphore.clone();
            let generator = self.generator.clone();
            let pb = progress_bar.clone();
            let path = images_dir.join(&image.file_name);

            futures.push(async move {
                let _permit = sem.acquire().await.expect("Semaphore closed");

                let result = generator.generate(&image.prompt, &path).await;

                if let Some(ref pb) = pb {
                    pb.inc(1);
                }

                let error = match result {
                    Ok(()) => None,
                    Err(e) => {
                        warn!("Image '{}' failed: {}", image.file_name, e);
                        Some(e.to_string())
                    }
                };

                (
                    index,
                    GenerationOutcome {
                        file_name: image.file_name,
                        path,
                        error,
                    },
                )
            });
        }

        let mut generated_outcomes: Vec<(usize, GenerationOutcome)> = Vec::new();
        while let Some(result) = futures.next().await {
            generated_outcomes.push(result);
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Image generation complete");
        }

        // Keep plan order regardless of completion order.
        generated_outcomes.sort_by_key(|(index, _)| *index);
        let failed = generated_outcomes
            .iter()
            .filter(|(_, o)| !o.succeeded())
            .count();
        let generated = generated_outcomes.len() - failed;
        outcomes.extend(generated_outcomes.into_iter().map(|(_, o)| o));

        info!(
            "Generated {} image(s), {} failed, in {:.1}s",
            generated,
            failed,
            start.elapsed().as_secs_f64()
        );

        let stats = GenerationStats {
            requested: images.len(),
            generated,
            skipped_existing: skipped,
            failed,
        };
        Ok((outcomes, stats))
    }
}
