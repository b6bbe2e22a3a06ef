use std::collections::BTreeMap;

use async_trait::async_trait;
use locator_core_types::{BoundingBox, ElementHandle};

use crate::errors::TreeError;

/// Query port over a live element tree.
///
/// This is the only backend-dependent surface of the locator: a browser
/// adapter, a recorded snapshot or the in-memory [`crate::MemoryTree`] can all
/// sit behind it.
#[async_trait]
pub trait ElementTree: Send + Sync {
    /// Every element matching `selector`, in document order.
    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>, TreeError>;

    /// First element matching `selector`.
    async fn find(&self, selector: &str) -> Result<Option<ElementHandle>, TreeError> {
        Ok(self.find_all(selector).await?.into_iter().next())
    }

    /// Lower-case tag name.
    async fn tag_name(&self, element: ElementHandle) -> Result<String, TreeError>;

    async fn attributes(
        &self,
        element: ElementHandle,
    ) -> Result<BTreeMap<String, String>, TreeError>;

    /// Concatenated text of the element and its descendants.
    async fn text(&self, element: ElementHandle) -> Result<String, TreeError>;

    async fn bounding_box(&self, element: ElementHandle) -> Result<BoundingBox, TreeError>;

    /// Topmost visible element containing the point.
    async fn element_at_point(&self, x: f64, y: f64)
        -> Result<Option<ElementHandle>, TreeError>;

    async fn parent(&self, element: ElementHandle) -> Result<Option<ElementHandle>, TreeError>;

    /// Element children in document order.
    async fn children(&self, element: ElementHandle) -> Result<Vec<ElementHandle>, TreeError>;
}
