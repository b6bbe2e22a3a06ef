use std::path::PathBuf;

use action_locator::{CandidateGenerator, SelectorCandidate};
use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::context::CliContext;
use super::output::emit;
use super::snapshot::{find_target, load_tree};

#[derive(Args, Clone, Debug)]
pub struct GenerateArgs {
    /// Element tree snapshot (JSON)
    #[arg(long, value_name = "FILE")]
    pub tree: PathBuf,

    /// Selector picking the element to generate for
    #[arg(long)]
    pub target: String,

    /// Override the configured number of alternates
    #[arg(long)]
    pub max_alternatives: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct GenerateReport {
    pub target: String,
    pub chosen: SelectorCandidate,
    pub alternatives: Vec<SelectorCandidate>,
    pub candidates: Vec<SelectorCandidate>,
}

pub async fn cmd_generate(args: GenerateArgs, ctx: &CliContext) -> Result<()> {
    let tree = load_tree(&args.tree).await?;
    let element = find_target(&tree, &args.target).await?;

    let options = ctx.config().locator.selector.clone();
    let max = args.max_alternatives.unwrap_or(options.max_alternatives);
    let generator = CandidateGenerator::new(options);

    let chosen = generator.generate_selector(tree.as_ref(), element).await?;
    let alternatives = generator
        .generate_alternative_selectors(tree.as_ref(), element, max + 1)
        .await?
        .into_iter()
        .filter(|c| c.selector != chosen.selector)
        .take(max)
        .collect();
    let mut candidates = generator.candidates(tree.as_ref(), element).await?;
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let report = GenerateReport {
        target: args.target,
        chosen,
        alternatives,
        candidates,
    };
    emit(ctx.output(), &report, print_human)
}

fn print_human(report: &GenerateReport) {
    println!("Selector: {}", report.chosen.selector);
    println!(
        "  type: {}  score: {:.2}  unique: {}  stable: {}",
        report.chosen.selector_type,
        report.chosen.score,
        report.chosen.unique,
        report.chosen.stable
    );
    if !report.alternatives.is_empty() {
        println!("Alternatives:");
        for alt in &report.alternatives {
            println!("  {:<12} {}", alt.selector_type.name(), alt.selector);
        }
    }
    println!("Candidates:");
    for candidate in &report.candidates {
        println!(
            "  {:>6.2} {:<12} {:<3} {}",
            candidate.score,
            candidate.selector_type.name(),
            candidate.match_count,
            candidate.selector
        );
    }
}
