use std::path::PathBuf;

use action_locator::{ElementLocator, ResolutionOrchestrator, ResolutionResult};
use anyhow::Result;
use clap::Args;
use tracing::info;

use super::context::CliContext;
use super::output::emit;
use super::snapshot::{load_tree, read_json, write_json};

#[derive(Args, Clone, Debug)]
pub struct ResolveArgs {
    /// Element tree snapshot (JSON)
    #[arg(long, value_name = "FILE")]
    pub tree: PathBuf,

    /// Locator produced by `capture`
    #[arg(long, value_name = "FILE")]
    pub locator: PathBuf,

    /// Healing rounds before giving up
    #[arg(long)]
    pub retries: Option<u32>,

    /// Write a healed primary selector back to the locator file
    #[arg(long)]
    pub commit: bool,
}

pub async fn cmd_resolve(args: ResolveArgs, ctx: &CliContext) -> Result<()> {
    let tree = load_tree(&args.tree).await?;
    let mut locator: ElementLocator = read_json(&args.locator).await?;

    let mut config = ctx.config().locator.clone();
    if let Some(retries) = args.retries {
        config.resolver.max_retries = retries;
    }
    let orchestrator = ResolutionOrchestrator::new(tree, &config);

    let result = if args.commit {
        let before = locator.primary_selector.clone();
        let result = orchestrator.resolve_locator(&mut locator).await?;
        if locator.primary_selector != before {
            write_json(&args.locator, &locator).await?;
            info!(
                "Committed '{}' as primary in {}",
                locator.primary_selector,
                args.locator.display()
            );
        }
        result
    } else {
        let options = orchestrator
            .default_options()
            .with_alternatives(locator.alternative_selectors.clone());
        orchestrator
            .resolve(&locator.primary_selector, &locator.fingerprint, &options)
            .await?
    };

    emit(ctx.output(), &result, print_human)
}

fn print_human(result: &ResolutionResult) {
    match result.element {
        Some(element) => println!(
            "{} via {} -> {} (confidence {:.2})",
            element, result.strategy, result.selector, result.confidence
        ),
        None => println!("unresolved: {}", result.selector),
    }
    println!(
        "  attempts: {}  healed: {}  fallback: {}  {} ms",
        result.metadata.attempts,
        result.metadata.healing_applied,
        result.metadata.fallback_used,
        result.metadata.time_taken_ms
    );
}
