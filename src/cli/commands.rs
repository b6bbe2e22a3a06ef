use clap::Subcommand;

use super::capture::CaptureArgs;
use super::generate::GenerateArgs;
use super::replay::ReplayArgs;
use super::resolve::ResolveArgs;
use super::stability::StabilityArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Generate ranked selector candidates for an element of a snapshot
    Generate(GenerateArgs),

    /// Score how durable a selector is for an element
    Stability(StabilityArgs),

    /// Capture a locator (selector, alternates, fingerprint) for an element
    Capture(CaptureArgs),

    /// Resolve a captured locator against a snapshot, healing if needed
    Resolve(ResolveArgs),

    /// Replay a recording against a snapshot
    Replay(ReplayArgs),
}
