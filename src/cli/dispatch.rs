use anyhow::Result;

use super::capture::cmd_capture;
use super::env::CliArgs;
use super::generate::cmd_generate;
use super::replay::cmd_replay;
use super::resolve::cmd_resolve;
use super::stability::cmd_stability;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Generate(args) => cmd_generate(args, ctx).await,
        Commands::Stability(args) => cmd_stability(args, ctx).await,
        Commands::Capture(args) => cmd_capture(args, ctx).await,
        Commands::Resolve(args) => cmd_resolve(args, ctx).await,
        Commands::Replay(args) => cmd_replay(args, ctx).await,
    }
}
