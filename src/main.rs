use anyhow::{Context, Result};
use autocut::config::Config;
use autocut::interactive::run_interactive_wizard;
use autocut::pipeline::{print_summary, run_pipeline, OverlayMode, PipelineOptions, Step};
use autocut::project::Project;
use clap::Parser;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "autocut")]
#[command(version, about = "Sentence-level video editing with silence trimming and image overlays")]
#[command(
    long_about = "Cut long-form video by keeping or removing transcribed sentences, trimming \
silence at the boundaries, and overlaying images timed to sentences. Rendering runs through \
the MLT melt tool."
)]
struct Cli {
    /// Project name under the assets folder, or a path to the input video.
    /// Omit to run the interactive wizard.
    project: Option<String>,

    /// Steps to run as comma-separated numbers (e.g. "1,2,3"), or "all"
    #[arg(short, long)]
    steps: Option<String>,

    /// Overlay render mode: single-pass, two-step
    #[arg(long, default_value = "single-pass")]
    overlay_mode: String,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn parse_steps(raw: &str) -> Result<Vec<Step>> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(Step::all());
    }

    let mut steps = Vec::new();
    for part in raw.split(',') {
        let number: usize = part
            .trim()
            .parse()
            .with_context(|| format!("Invalid step '{}'", part.trim()))?;
        let step = Step::from_number(number)
            .with_context(|| format!("No step numbered {number}; valid steps are 1-7"))?;
        steps.push(step);
    }

    if steps.is_empty() {
        anyhow::bail!("No steps given");
    }
    Ok(steps)
}

fn resolve_project(raw: &str, config: &Config) -> Result<Project> {
    let path = Path::new(raw);
    if path.is_file() {
        return Ok(Project::from_video_path(path)?);
    }
    Ok(Project::new(&config.assets_dir, raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Config::load().context("Failed to load configuration")?;

    let (project, options) = match &cli.project {
        Some(raw) => {
            let project = resolve_project(raw, &config)?;
            let steps = match &cli.steps {
                Some(raw) => parse_steps(raw)?,
                None => Step::all(),
            };
            let overlay_mode: OverlayMode = cli
                .overlay_mode
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;

            (
                project,
                PipelineOptions {
                    steps,
                    overlay_mode,
                    show_progress: !cli.no_progress,
                },
            )
        }
        None => {
            let result = run_interactive_wizard(&config)?;
            (result.project, result.options)
        }
    };

    // Verify the input is there before any stage runs.
    let input = project.input_video()?;
    info!("Project: {}", project.name());
    info!("Input:   {}", input.display());
    info!(
        "Steps:   {}",
        options
            .steps
            .iter()
            .map(|s| s.number().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Ctrl-C flips the flag; stages and the renderer poll it.
    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nCancelling...");
            cancelled.store(true, Ordering::Relaxed);
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let report = run_pipeline(&project, &config, &options, cancelled).await?;
    print_summary(&project, &report);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps_numbers() {
        let steps = parse_steps("1,2,4").unwrap();
        assert_eq!(
            steps,
            vec![Step::PrepareMedia, Step::Transcribe, Step::TrimSilence]
        );
    }

    #[test]
    fn test_parse_steps_all() {
        assert_eq!(parse_steps("all").unwrap(), Step::all());
        assert_eq!(parse_steps("ALL").unwrap(), Step::all());
    }

    #[test]
    fn test_parse_steps_rejects_garbage() {
        assert!(parse_steps("0").is_err());
        assert!(parse_steps("8").is_err());
        assert!(parse_steps("one").is_err());
        assert!(parse_steps("").is_err());
    }
}
