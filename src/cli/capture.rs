use std::path::PathBuf;

use action_locator::CandidateGenerator;
use anyhow::Result;
use clap::Args;
use tracing::info;

use super::context::CliContext;
use super::output::emit;
use super::snapshot::{find_target, load_tree, write_json};

#[derive(Args, Clone, Debug)]
pub struct CaptureArgs {
    /// Element tree snapshot (JSON)
    #[arg(long, value_name = "FILE")]
    pub tree: PathBuf,

    /// Selector picking the element to capture
    #[arg(long)]
    pub target: String,

    /// Write the locator to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

pub async fn cmd_capture(args: CaptureArgs, ctx: &CliContext) -> Result<()> {
    let tree = load_tree(&args.tree).await?;
    let element = find_target(&tree, &args.target).await?;
    let generator = CandidateGenerator::new(ctx.config().locator.selector.clone());
    let locator = generator.build_locator(tree.as_ref(), element).await?;

    if let Some(path) = &args.out {
        write_json(path, &locator).await?;
        info!("Wrote locator for '{}' to {}", args.target, path.display());
        println!("{}", path.display());
        return Ok(());
    }
    emit(ctx.output(), &locator, |l| {
        println!("Primary: {}", l.primary_selector);
        for alt in &l.alternative_selectors {
            println!("  alt: {}", alt);
        }
        println!(
            "Fingerprint: <{}> {} ancestors",
            l.fingerprint.tag_name,
            l.fingerprint.ancestor_path.len()
        );
    })
}
