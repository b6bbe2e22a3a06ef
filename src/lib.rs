//! Locator CLI library
//!
//! Application config, the playback runner and the `locator` command line
//! built on the `action-locator` crate.

pub mod cli;
pub mod config;
pub mod errors;
pub mod replay;

pub use config::{load_app_config, AppConfig};
pub use errors::PlaybackError;
pub use replay::{
    FailureMode, PlaybackPolicy, PlaybackReport, PlaybackRunner, PlaybackStep, Recording,
    StepDispatcher, StepOutcome, StepStatus,
};
