//! `forge build`: run one build in-process and render its progress.
//!
//! Subscribes to the event bus before starting so no event is missed, drives
//! an indicatif bar from `Progress` events, cancels on Ctrl+C, and prints a
//! summary (or the final status as JSON).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use ideaforge_core::agents::normalize_path;
use ideaforge_core::event::bus::recv_for;
use ideaforge_types::build::{AggregateBuildResult, BuildRequest, BuildStage, BuildStatus};
use ideaforge_types::error::BuildError;
use ideaforge_types::event::BuildEvent;
use ideaforge_types::provenance::Provenance;

use super::BuildArgs;
use crate::state::AppState;

/// Run a build to completion.
///
/// Exits with an error when the build fails; a cancelled build is not an
/// error.
pub async fn run_build(state: &AppState, args: BuildArgs, json: bool, quiet: bool) -> Result<()> {
    let mut request = BuildRequest::new(args.idea, args.target_market, args.tier);
    if let Some(country) = args.country {
        request = request.with_country(country);
    }

    let mut events = state.builds.subscribe();
    let handle = state.builds.start_build(request).await?;
    let build_id = handle.id();

    let bar = if json || quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:32.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        bar
    };
    bar.set_message("Queued");

    let mut cancelling = false;
    loop {
        tokio::select! {
            event = recv_for(&mut events, build_id) => {
                let Some(event) = event else { break };
                let terminal = event.is_terminal();
                render_event(&bar, &event);
                if terminal {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c(), if !cancelling => {
                cancelling = true;
                bar.set_message("Cancelling...");
                match state.builds.cancel_build(&handle).await {
                    Ok(()) | Err(BuildError::AlreadyFinished(_)) => {}
                    Err(e) => return Err(e).context("failed to cancel build"),
                }
            }
        }
    }
    bar.finish_and_clear();

    let status = state.builds.get_status(&handle).await?;

    if let (Some(dir), Some(result)) = (args.out.as_deref(), status.result.as_deref()) {
        let written = write_result(dir, result).await?;
        if !json && !quiet {
            println!(
                "  {} Wrote result.json and {} file(s) to {}",
                style("✓").green(),
                written,
                style(dir.display()).cyan()
            );
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else if !quiet {
        print_summary(&status);
    }

    match status.stage {
        BuildStage::Failed => {
            let cause = status
                .error
                .map(|f| f.to_string())
                .unwrap_or_else(|| "unknown failure".to_string());
            bail!("build {build_id} failed: {cause}")
        }
        _ => Ok(()),
    }
}

fn render_event(bar: &ProgressBar, event: &BuildEvent) {
    match event {
        BuildEvent::Progress {
            percent_complete,
            message,
            ..
        } => {
            bar.set_position(u64::from(*percent_complete));
            bar.set_message(message.clone());
        }
        BuildEvent::AttemptFailed {
            agent,
            attempt,
            max_attempts,
            error,
            ..
        } => {
            tracing::debug!(agent = %agent, attempt, max_attempts, error = %error, "attempt failed");
            bar.println(format!(
                "  {} {agent}: attempt {attempt}/{max_attempts} failed",
                style("↻").dim()
            ));
        }
        BuildEvent::FallbackUsed { agent, .. } => {
            bar.println(format!(
                "  {} {agent}: using generic fallback content",
                style("⚠").yellow()
            ));
        }
        BuildEvent::Completed { .. } => bar.set_position(100),
        BuildEvent::Failed { .. } | BuildEvent::Cancelled { .. } => {}
    }
}

/// One row of the summary table: section name, provenance, attempts.
pub(crate) fn section_rows(result: &AggregateBuildResult) -> Vec<(&'static str, Provenance, u32)> {
    let research = &result.research;
    let mut rows = vec![("research.market", research.market.provenance, research.market.attempts)];
    if let Some(c) = &research.competitors {
        rows.push(("research.competitors", c.provenance, c.attempts));
    }
    if let Some(r) = &research.reviews {
        rows.push(("research.reviews", r.provenance, r.attempts));
    }
    rows.extend([
        (
            "research.starving_market",
            research.starving_market.provenance,
            research.starving_market.attempts,
        ),
        (
            "research.uniqueness",
            research.uniqueness.provenance,
            research.uniqueness.attempts,
        ),
        (
            "strategy.pricing",
            result.strategy.pricing.provenance,
            result.strategy.pricing.attempts,
        ),
        (
            "artifacts.database",
            result.artifacts.database.provenance,
            result.artifacts.database.attempts,
        ),
        (
            "artifacts.backend",
            result.artifacts.backend.provenance,
            result.artifacts.backend.attempts,
        ),
        (
            "artifacts.frontend",
            result.artifacts.frontend.provenance,
            result.artifacts.frontend.attempts,
        ),
        (
            "quality.report",
            result.quality.report.provenance,
            result.quality.report.attempts,
        ),
    ]);
    rows
}

fn print_summary(status: &BuildStatus) {
    println!();
    match status.stage {
        BuildStage::Done => {}
        BuildStage::Failed => {
            let cause = status.error.as_ref().map(|f| f.to_string()).unwrap_or_default();
            println!("  {} Build failed: {cause}", style("✗").red().bold());
            println!();
            return;
        }
        BuildStage::Cancelled => {
            let phase = status
                .cancelled_in
                .map(|p| p.to_string())
                .unwrap_or_else(|| "queue".to_string());
            println!("  {} Build cancelled during {phase}", style("■").yellow().bold());
            println!();
            return;
        }
        other => {
            println!("  Build is still {other} ({}%)", status.percent_complete);
            return;
        }
    }

    let Some(result) = status.result.as_deref() else {
        return;
    };

    let ready = if result.quality.deployment_ready {
        style("deployment ready").green().bold()
    } else {
        style("needs work").yellow().bold()
    };
    println!(
        "  {} Build {} finished: quality {}/100, {ready}",
        style("✓").green().bold(),
        style(status.build_id).dim(),
        result.quality.overall_score,
    );
    println!(
        "  Market: {}   Starving market: {}   Uniqueness: {}",
        style(&result.research.market.market_size).cyan(),
        result.research.starving_market.score,
        result.research.uniqueness.score,
    );
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Section").fg(Color::White),
        Cell::new("Source").fg(Color::White),
        Cell::new("Attempts").fg(Color::White),
    ]);
    for (section, provenance, attempts) in section_rows(result) {
        let source = match provenance {
            Provenance::Generated => Cell::new("generated").fg(Color::Green),
            Provenance::Fallback => Cell::new("FALLBACK").fg(Color::Yellow),
        };
        table.add_row(vec![Cell::new(section), source, Cell::new(attempts)]);
    }
    println!("{table}");

    for skipped in &result.research.skipped {
        println!(
            "  {} skipped {}: {}",
            style("-").dim(),
            skipped.agent,
            style(&skipped.reason).dim()
        );
    }

    let timings: Vec<String> = result
        .provenance
        .phase_timings
        .iter()
        .map(|t| format!("{} {}ms", t.phase, t.elapsed_ms))
        .collect();
    println!("  {}", style(timings.join("  ·  ")).dim());
    println!(
        "  {} file(s) generated, {} audited",
        result.artifacts.all_files().len(),
        result.quality.files_audited
    );
    println!();
}

/// Write `result.json` plus every generated file under `dir`.
///
/// Returns the number of generated files written. Paths that would escape
/// `dir` are skipped.
pub(crate) async fn write_result(dir: &Path, result: &AggregateBuildResult) -> Result<usize> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let json = serde_json::to_string_pretty(result)?;
    tokio::fs::write(dir.join("result.json"), json)
        .await
        .with_context(|| format!("failed to write {}", dir.join("result.json").display()))?;

    let mut written = 0;
    for file in result.artifacts.all_files() {
        let Some(relative) = normalize_path(&file.path) else {
            tracing::warn!(path = %file.path, "skipping generated file with unsafe path");
            continue;
        };
        let path: PathBuf = dir.join("files").join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &file.content)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        written += 1;
    }
    Ok(written)
}
