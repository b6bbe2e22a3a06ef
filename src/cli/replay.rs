use std::path::PathBuf;
use std::sync::Arc;

use action_locator::ResolutionOrchestrator;
use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::context::CliContext;
use super::output::emit;
use super::snapshot::{load_tree, read_json, write_json};
use crate::replay::{
    DiagnosticArtifact, FailureMode, MemoryDiagnosticSink, PlaybackReport, PlaybackRunner,
    Recording, StepStatus, TracingDispatcher,
};

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Element tree snapshot (JSON)
    #[arg(long, value_name = "FILE")]
    pub tree: PathBuf,

    /// Recording (JSON list of named steps with locators)
    #[arg(long, value_name = "FILE")]
    pub recording: PathBuf,

    /// Keep going after a failed step
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Write the recording with healed selectors to this file
    #[arg(long, value_name = "FILE")]
    pub save_healed: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    report: PlaybackReport,
    diagnostics: Vec<DiagnosticArtifact>,
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext) -> Result<()> {
    let tree = load_tree(&args.tree).await?;
    let mut recording: Recording = read_json(&args.recording).await?;

    let mut policy = ctx.config().playback.clone();
    if args.continue_on_failure {
        policy.on_failure = FailureMode::Continue;
    }
    if args.save_healed.is_some() {
        policy.persist_heals = true;
    }

    let orchestrator = Arc::new(ResolutionOrchestrator::new(tree, &ctx.config().locator));
    let sink = Arc::new(MemoryDiagnosticSink::new());
    let runner = PlaybackRunner::new(orchestrator, Arc::new(TracingDispatcher), policy)
        .with_diagnostics(sink.clone());
    let report = runner.run(&mut recording).await?;

    if let Some(path) = &args.save_healed {
        write_json(path, &recording).await?;
        info!("Saved healed recording to {}", path.display());
    }

    let success = report.is_success();
    let output = ReplayOutput {
        report,
        diagnostics: sink.artifacts(),
    };
    emit(ctx.output(), &output, print_human)?;
    if !success {
        bail!("replay of '{}' did not complete", output.report.recording);
    }
    Ok(())
}

fn print_human(output: &ReplayOutput) {
    let report = &output.report;
    println!("Recording: {}", report.recording);
    for outcome in &report.outcomes {
        let status = match outcome.status {
            StepStatus::Passed => "PASS",
            StepStatus::Healed => "HEAL",
            StepStatus::Failed => "FAIL",
            StepStatus::TimedOut => "TIME",
            StepStatus::Skipped => "SKIP",
        };
        print!("  [{}] {}", status, outcome.name);
        if let Some(selector) = &outcome.selector {
            print!(" -> {} ({:.2})", selector, outcome.confidence);
        }
        if let Some(message) = &outcome.message {
            print!(": {}", message);
        }
        println!();
    }
    println!(
        "{} healed, {} diagnostics{}",
        report.healed_steps,
        output.diagnostics.len(),
        if report.aborted { ", aborted" } else { "" }
    );
}
