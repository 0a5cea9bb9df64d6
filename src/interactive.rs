use crate::config::Config;
use crate::pipeline::{OverlayMode, PipelineOptions, Step};
use crate::project::Project;
use console::style;
use dialoguer::{Confirm, Input, MultiSelect, Select};

pub struct InteractiveResult {
    pub project: Project,
    pub options: PipelineOptions,
}

pub fn run_interactive_wizard(config: &Config) -> anyhow::Result<InteractiveResult> {
    print_header();

    // Step 1: pick the project
    let project = select_project(config)?;

    // Step 2: pick the pipeline steps
    let steps = select_steps()?;

    // Step 3: overlay mode, if the overlay render is among them
    let overlay_mode = if steps.contains(&Step::RenderOverlaid) {
        select_overlay_mode()?
    } else {
        OverlayMode::default()
    };

    print_plan(&project, &steps, overlay_mode);

    if !Confirm::new()
        .with_prompt("Proceed with these steps?")
        .default(true)
        .interact()?
    {
        anyhow::bail!("Cancelled by user");
    }

    println!();

    project.save_as_last().ok();

    Ok(InteractiveResult {
        project,
        options: PipelineOptions {
            steps,
            overlay_mode,
            show_progress: true,
        },
    })
}

fn print_header() {
    println!();
    println!(
        "{}",
        style("╔═══════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║          autocut - sentence-level video cuts      ║").cyan()
    );
    println!(
        "{}",
        style("╚═══════════════════════════════════════════════════╝").cyan()
    );
    println!();
}

fn select_project(config: &Config) -> anyhow::Result<Project> {
    let last = Project::last_project(&config.assets_dir);

    loop {
        let prompt = match &last {
            Some(name) => format!("Project name (default: {name})"),
            None => "Project name (folder under assets/ holding the video)".to_string(),
        };

        let name: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(last.is_some())
            .interact_text()?;

        let name = if name.trim().is_empty() {
            match &last {
                Some(name) => name.clone(),
                None => continue,
            }
        } else {
            name.trim().to_string()
        };

        let project = Project::new(&config.assets_dir, name);
        match project.input_video() {
            Ok(video) => {
                println!(
                    "{} Found: {}",
                    style("✓").green(),
                    video.display()
                );
                return Ok(project);
            }
            Err(e) => {
                println!("{} {e}", style("!").yellow());
                if !Confirm::new()
                    .with_prompt("Try another name?")
                    .default(true)
                    .interact()?
                {
                    anyhow::bail!("No input video selected");
                }
            }
        }
    }
}

fn select_steps() -> anyhow::Result<Vec<Step>> {
    let all = Step::all();
    let labels: Vec<String> = all
        .iter()
        .map(|s| format!("{}. {}", s.number(), s.label()))
        .collect();
    let defaults = vec![true; all.len()];

    let chosen = MultiSelect::new()
        .with_prompt("Select pipeline steps (space to toggle, enter to confirm)")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;

    if chosen.is_empty() {
        anyhow::bail!("No steps selected");
    }

    Ok(chosen.into_iter().map(|i| all[i]).collect())
}

fn select_overlay_mode() -> anyhow::Result<OverlayMode> {
    let selection = Select::new()
        .with_prompt("Overlay render mode")
        .items(&[
            "single-pass (cut and composite in one render)",
            "two-step (composite onto the rendered cut)",
        ])
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => OverlayMode::SinglePass,
        _ => OverlayMode::TwoStep,
    })
}

fn print_plan(project: &Project, steps: &[Step], overlay_mode: OverlayMode) {
    println!();
    println!("  Project: {}", style(project.name()).bold());
    println!(
        "  Steps:   {}",
        steps
            .iter()
            .map(|s| s.number().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if steps.contains(&Step::RenderOverlaid) {
        println!("  Overlay: {overlay_mode}");
    }
    println!();
}
