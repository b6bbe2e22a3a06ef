//! Element tree port for the locator.
//!
//! Defines the [`ElementTree`] trait every backend implements and ships
//! [`MemoryTree`], an in-memory document with its own CSS/XPath engine.

pub mod api;
pub mod errors;
pub mod memory;
pub mod selector;

pub use api::ElementTree;
pub use errors::TreeError;
pub use memory::{MemoryElement, MemoryTree};
pub use selector::{normalize_text, ParsedSelector};
