pub mod app;
pub mod capture;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod generate;
pub mod output;
pub mod replay;
pub mod resolve;
pub mod runtime;
pub mod snapshot;
pub mod stability;
