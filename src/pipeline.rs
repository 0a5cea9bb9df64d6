//! Pipeline orchestration: numbered, individually runnable stages from raw
//! video to rendered cut. Stage artifacts are skipped when already on disk,
//! so any step can be rerun (or its file hand-edited) without redoing the
//! rest.

use crate::config::{ApiUse, Config};
use crate::edit::{select_kept_ids, EditDecision, SuggestionClient};
use crate::error::{AutocutError, Result};
use crate::images::{GenerationOrchestrator, ImagePlan, OpenRouterImageClient};
use crate::media::{self, SilenceConfig};
use crate::project::Project;
use crate::render::{MeltRenderer, Renderer};
use crate::timeline::graph::{EditGraph, GraphBuilder};
use crate::timeline::overlay::{resolve_overlays, ImagePlacement};
use crate::timeline::{compile_timeline, AdjustedSegment};
use crate::transcribe::{ElevenLabsClient, SpeechToText};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Pipeline steps, numbered like the stage files they produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    PrepareMedia,
    Transcribe,
    SuggestEdits,
    TrimSilence,
    GenerateImages,
    RenderCut,
    RenderOverlaid,
}

impl Step {
    pub fn all() -> Vec<Step> {
        vec![
            Step::PrepareMedia,
            Step::Transcribe,
            Step::SuggestEdits,
            Step::TrimSilence,
            Step::GenerateImages,
            Step::RenderCut,
            Step::RenderOverlaid,
        ]
    }

    pub fn number(&self) -> usize {
        match self {
            Step::PrepareMedia => 1,
            Step::Transcribe => 2,
            Step::SuggestEdits => 3,
            Step::TrimSilence => 4,
            Step::GenerateImages => 5,
            Step::RenderCut => 6,
            Step::RenderOverlaid => 7,
        }
    }

    pub fn from_number(n: usize) -> Option<Step> {
        Step::all().into_iter().find(|s| s.number() == n)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Step::PrepareMedia => "Prepare media (proxy + audio)",
            Step::Transcribe => "Transcribe audio",
            Step::SuggestEdits => "Suggest edits",
            Step::TrimSilence => "Trim silence",
            Step::GenerateImages => "Generate overlay images",
            Step::RenderCut => "Render cut",
            Step::RenderOverlaid => "Render cut with overlays",
        }
    }
}

/// How the overlay render is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayMode {
    /// One combined graph: cut and composite in a single render.
    #[default]
    SinglePass,
    /// Composite onto the already-rendered cut from step 6.
    TwoStep,
}

impl std::fmt::Display for OverlayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayMode::SinglePass => write!(f, "single-pass"),
            OverlayMode::TwoStep => write!(f, "two-step"),
        }
    }
}

impl std::str::FromStr for OverlayMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single-pass" | "singlepass" | "single" => Ok(OverlayMode::SinglePass),
            "two-step" | "twostep" | "two" => Ok(OverlayMode::TwoStep),
            _ => Err(format!(
                "Unknown overlay mode: {s}. Use 'single-pass' or 'two-step'"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub steps: Vec<Step>,
    pub overlay_mode: OverlayMode,
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            steps: Step::all(),
            overlay_mode: OverlayMode::default(),
            show_progress: true,
        }
    }
}

/// Timing of the steps that actually ran.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub steps_run: Vec<(Step, Duration)>,
    pub total_time: Duration,
}

/// Pure compile entry: ordered adjusted segments + decision + placements
/// in, edit graph out. No I/O, no clock; identical inputs give an
/// identical graph, so the result of a failed render can always be rebuilt
/// and retried safely.
pub fn compile_edit_graph(
    segments: &[AdjustedSegment],
    decision: &EditDecision,
    placements: &[ImagePlacement],
    builder: &GraphBuilder,
) -> Result<EditGraph> {
    let order: Vec<_> = segments.iter().map(|s| s.sentence_id).collect();
    let kept = select_kept_ids(&order, decision)?;

    let by_id: HashMap<_, _> = segments
        .iter()
        .map(|s| (s.sentence_id, s.clone()))
        .collect();
    let index = compile_timeline(&kept, &by_id)?;
    let windows = resolve_overlays(placements, &index)?;

    builder.build(&index, &windows)
}

/// Run the selected steps in order. The cancellation flag is checked
/// between stages and inside the render loop.
pub async fn run_pipeline(
    project: &Project,
    config: &Config,
    options: &PipelineOptions,
    cancelled: Arc<AtomicBool>,
) -> Result<PipelineReport> {
    let start = Instant::now();
    let mut report = PipelineReport::default();

    let mut steps = options.steps.clone();
    steps.sort_by_key(|s| s.number());
    steps.dedup();

    for step in steps {
        if cancelled.load(Ordering::Relaxed) {
            return Err(AutocutError::Media("pipeline cancelled".to_string()));
        }

        info!("Step {}: {}", step.number(), step.label());
        let step_start = Instant::now();

        match step {
            Step::PrepareMedia => prepare_media(project).await?,
            Step::Transcribe => transcribe(project, config).await?,
            Step::SuggestEdits => suggest_edits(project, config).await?,
            Step::TrimSilence => trim_silence(project)?,
            Step::GenerateImages => generate_images(project, config, options).await?,
            Step::RenderCut => render_cut(project, options, cancelled.clone())?,
            Step::RenderOverlaid => render_overlaid(project, config, options, cancelled.clone())?,
        }

        report.steps_run.push((step, step_start.elapsed()));
    }

    report.total_time = start.elapsed();
    Ok(report)
}

async fn prepare_media(project: &Project) -> Result<()> {
    let input = project.input_video()?;
    project.ensure_dir()?;

    let proxy = project.proxy_path();
    if proxy.exists() {
        info!("Proxy already exists, skipping: {}", proxy.display());
    } else {
        media::generate_proxy(&input, &proxy).await?;
    }

    let audio = project.audio_path();
    if audio.exists() {
        info!("Audio already exists, skipping: {}", audio.display());
    } else {
        media::extract_audio(&input, &audio).await?;
    }

    Ok(())
}

async fn transcribe(project: &Project, config: &Config) -> Result<()> {
    if project.transcript_path().exists() {
        info!("Transcript already exists, skipping");
        return Ok(());
    }

    config.validate(ApiUse::Transcription)?;
    let api_key = config.elevenlabs_api_key.clone().ok_or_else(|| {
        AutocutError::Config("ELEVENLABS_API_KEY not set".to_string())
    })?;

    let audio = project.audio_path();
    if !audio.exists() {
        return Err(AutocutError::FileNotFound(format!(
            "{} (run step 1 first)",
            audio.display()
        )));
    }

    let client = ElevenLabsClient::new(api_key);
    let transcript = client.transcribe(&audio).await?;
    info!(
        "Transcribed {} sentences ({} words)",
        transcript.sentences.len(),
        transcript.word_count()
    );

    let path = project.save_transcript(&transcript)?;
    info!("Transcript saved to {}", path.display());
    Ok(())
}

async fn suggest_edits(project: &Project, config: &Config) -> Result<()> {
    config.validate(ApiUse::Suggestions)?;
    let api_key = config.openrouter_api_key.clone().ok_or_else(|| {
        AutocutError::Config("OPENROUTER_API_KEY not set".to_string())
    })?;

    let transcript = project.load_transcript()?;
    if transcript.sentences.is_empty() {
        return Err(AutocutError::Media(
            "transcript has no sentences to edit".to_string(),
        ));
    }

    let client = SuggestionClient::new(api_key).with_model(config.suggestion_model.clone());
    let suggestion = client.suggest(&transcript.sentences).await?;

    info!("Suggestion: {}", suggestion.thoughts);
    info!(
        "Model proposes removing {} of {} sentences",
        suggestion.sentences_to_remove.len(),
        transcript.sentences.len()
    );

    let decision =
        EditDecision::from_removals(&transcript.sentences, &suggestion.sentences_to_remove);
    let path = project.save_decision(&decision)?;
    info!(
        "Decision saved to {} - review and flip entries before rendering",
        path.display()
    );
    Ok(())
}

fn trim_silence(project: &Project) -> Result<()> {
    if project.adjusted_path().exists() {
        info!("Adjusted segments already exist, skipping");
        info!("Delete {} to re-trim", project.adjusted_path().display());
        return Ok(());
    }

    let transcript = project.load_transcript()?;
    let audio = project.audio_path();
    let audio = audio.exists().then_some(audio.as_path());

    let segments =
        media::trim_sentences(&transcript.sentences, audio, SilenceConfig::default())?;

    let trimmed: f64 = segments
        .iter()
        .map(|s| (s.original_end - s.original_start) - s.duration())
        .sum();
    info!(
        "Trimmed {:.1}s of boundary silence across {} sentences",
        trimmed,
        segments.len()
    );

    let path = project.save_adjusted(&segments)?;
    info!("Adjusted segments saved to {}", path.display());
    Ok(())
}

async fn generate_images(
    project: &Project,
    config: &Config,
    options: &PipelineOptions,
) -> Result<()> {
    if !project.image_plan_path().exists() {
        info!("No image plan found, skipping image generation");
        return Ok(());
    }

    let plan = project.load_image_plan()?;
    plan.validate()?;
    if plan.images.is_empty() {
        info!("Image plan is empty, nothing to generate");
        return Ok(());
    }

    config.validate(ApiUse::Images)?;
    let api_key = config.openrouter_api_key.clone().ok_or_else(|| {
        AutocutError::Config("OPENROUTER_API_KEY not set".to_string())
    })?;

    let client = OpenRouterImageClient::new(api_key).with_model(config.image_model.clone());
    let orchestrator = GenerationOrchestrator::new(Box::new(client), config.concurrency)
        .with_progress(options.show_progress);

    let (_, stats) = orchestrator
        .generate_missing(&plan.images, &project.images_dir())
        .await?;
    info!(
        "Images: {} generated, {} already present, {} failed",
        stats.generated, stats.skipped_existing, stats.failed
    );
    if stats.failed > 0 {
        warn!(
            "{} image(s) failed to generate; their overlays will be omitted from the render",
            stats.failed
        );
    }

    Ok(())
}

fn render_cut(
    project: &Project,
    options: &PipelineOptions,
    cancelled: Arc<AtomicBool>,
) -> Result<()> {
    let output = project.cut_path();
    if output.exists() {
        info!("Cut already exists, skipping: {}", output.display());
        return Ok(());
    }

    let input = project.input_video()?;
    let segments = project.load_adjusted()?;
    let decision = project.load_decision()?;

    let builder = GraphBuilder::cut_only(&input);
    let graph = compile_edit_graph(&segments, &decision, &[], &builder)?;
    info!(
        "Compiled {} clips, {:.1}s total",
        graph.clips.len(),
        graph.duration
    );

    let properties = media::probe_video(&input)?;
    let renderer = MeltRenderer::new(properties).with_cancel_flag(cancelled);

    let spinner = options.show_progress.then(|| stage_spinner("Rendering cut..."));
    let result = render_with_retry(&renderer, &graph, &output);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    result
}

fn render_overlaid(
    project: &Project,
    config: &Config,
    options: &PipelineOptions,
    cancelled: Arc<AtomicBool>,
) -> Result<()> {
    let output = project.overlaid_path();
    if output.exists() {
        info!("Overlaid render already exists, skipping: {}", output.display());
        return Ok(());
    }

    let segments = project.load_adjusted()?;
    let decision = project.load_decision()?;
    let plan = project.load_image_plan()?;
    plan.validate()?;

    let placements = materialized_placements(&plan, project, config);
    if placements.is_empty() {
        return Err(AutocutError::Media(
            "no overlay images available; generate images first or use the cut-only render"
                .to_string(),
        ));
    }

    let (builder, source) = match options.overlay_mode {
        OverlayMode::SinglePass => {
            let input = project.input_video()?;
            (GraphBuilder::single_pass(&input), input)
        }
        OverlayMode::TwoStep => {
            let cut = project.cut_path();
            if !cut.exists() {
                return Err(AutocutError::FileNotFound(format!(
                    "{} (run step 6 first for a two-step render)",
                    cut.display()
                )));
            }
            (GraphBuilder::overlay_on_cut(&cut), cut)
        }
    };

    let graph = compile_edit_graph(&segments, &decision, &placements, &builder)?;
    info!(
        "Compiled {} clips and {} overlay window(s) on {} track(s)",
        graph.clips.len(),
        graph.overlays.len(),
        graph.overlay_tracks.len()
    );

    let properties = media::probe_video(&source)?;
    let renderer = MeltRenderer::new(properties).with_cancel_flag(cancelled);

    let spinner = options
        .show_progress
        .then(|| stage_spinner("Rendering with overlays..."));
    let result = render_with_retry(&renderer, &graph, &output);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    result
}

/// Resolve the plan into placements, dropping (with a warning) any whose
/// image never materialized. The overlay is omitted as a reported
/// condition; timestamps of everything else are unaffected.
fn materialized_placements(
    plan: &ImagePlan,
    project: &Project,
    config: &Config,
) -> Vec<ImagePlacement> {
    let images_dir = project.images_dir();
    let present: Vec<_> = plan
        .images
        .iter()
        .filter(|image| {
            let path = images_dir.join(&image.file_name);
            if path.exists() {
                true
            } else {
                warn!(
                    "Overlay '{}' omitted: image was never generated",
                    image.file_name
                );
                false
            }
        })
        .cloned()
        .collect();

    ImagePlan { images: present }.to_placements(&images_dir, config.safe_zone)
}

/// Rendering is the one retry-eligible failure: the graph is deterministic,
/// so a second run with unchanged inputs is always safe. One retry, then
/// give up.
fn render_with_retry(renderer: &dyn Renderer, graph: &EditGraph, output: &Path) -> Result<()> {
    match renderer.render(graph, output) {
        Err(AutocutError::RenderFailed(message)) => {
            warn!("Render failed ({message}), retrying once");
            renderer.render(graph, output).map(|_| ())
        }
        other => other.map(|_| ()),
    }
}

/// Spinner helper shared by long-running stages.
fn stage_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print a summary of the pipeline run.
pub fn print_summary(project: &Project, report: &PipelineReport) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Pipeline complete: {}", project.name());
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    for (step, duration) in &report.steps_run {
        println!(
            "  {}. {:<32} {:>8.2}s",
            step.number(),
            step.label(),
            duration.as_secs_f64()
        );
    }
    println!();
    println!("  Total: {:.2}s", report.total_time.as_secs_f64());
    println!("═══════════════════════════════════════════════════════════════");
}
