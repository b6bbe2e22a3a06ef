use std::path::PathBuf;

use action_locator::StabilityEvaluator;
use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::context::CliContext;
use super::output::emit;
use super::snapshot::{find_target, load_tree};

#[derive(Args, Clone, Debug)]
pub struct StabilityArgs {
    /// Element tree snapshot (JSON)
    #[arg(long, value_name = "FILE")]
    pub tree: PathBuf,

    /// Selector picking the element the score refers to
    #[arg(long)]
    pub target: String,

    /// Selector to score
    #[arg(long)]
    pub selector: String,
}

#[derive(Debug, Serialize)]
struct StabilityReport {
    selector: String,
    element: String,
    score: f64,
}

pub async fn cmd_stability(args: StabilityArgs, ctx: &CliContext) -> Result<()> {
    let tree = load_tree(&args.tree).await?;
    let element = find_target(&tree, &args.target).await?;
    let score = StabilityEvaluator::new()
        .evaluate(tree.as_ref(), &args.selector, element)
        .await;

    let report = StabilityReport {
        selector: args.selector,
        element: element.to_string(),
        score,
    };
    emit(ctx.output(), &report, |r| {
        println!("{:.2}  {}", r.score, r.selector)
    })
}
