use element_tree::{ElementTree, MemoryElement, MemoryTree, TreeError};
use locator_core_types::BoundingBox;

fn page() -> MemoryTree {
    MemoryTree::from_root(
        MemoryElement::new("html").child(
            MemoryElement::new("body")
                .rect(0.0, 0.0, 1280.0, 800.0)
                .child(
                    MemoryElement::new("div")
                        .class("toolbar")
                        .rect(0.0, 0.0, 1280.0, 60.0)
                        .child(
                            MemoryElement::new("button")
                                .attr("data-testid", "save")
                                .text("Save")
                                .rect(10.0, 10.0, 80.0, 30.0),
                        )
                        .child(
                            MemoryElement::new("button")
                                .attr("aria-label", "Close dialog")
                                .text("x")
                                .rect(100.0, 10.0, 30.0, 30.0),
                        ),
                )
                .child(MemoryElement::new("div").id("content")),
        ),
    )
}

#[tokio::test]
async fn attribute_operators_match() {
    let tree = page();
    assert_eq!(tree.find_all("[data-testid=\"save\"]").await.unwrap().len(), 1);
    assert_eq!(tree.find_all("[aria-label^=\"Close\"]").await.unwrap().len(), 1);
    assert_eq!(tree.find_all("[aria-label*=dialog]").await.unwrap().len(), 1);
    assert_eq!(tree.find_all("[aria-label$=\"DIALOG\" i]").await.unwrap().len(), 1);
    assert_eq!(tree.find_all("div.toolbar button, #content").await.unwrap().len(), 3);
}

#[tokio::test]
async fn element_at_point_prefers_innermost() {
    let tree = page();
    let hit = tree.element_at_point(20.0, 20.0).await.unwrap().unwrap();
    assert_eq!(tree.tag_name(hit).await.unwrap(), "button");
    let outside = tree.element_at_point(5000.0, 5000.0).await.unwrap();
    assert!(outside.is_none());
}

#[tokio::test]
async fn mutations_are_visible_to_queries() {
    let tree = page();
    let content = tree.find("#content").await.unwrap().unwrap();
    let added = tree
        .append(content, MemoryElement::new("a").attr("href", "/next").text("Next"))
        .unwrap();
    assert_eq!(tree.find("a:has-text(\"next\")").await.unwrap(), Some(added));
    assert_eq!(tree.parent(added).await.unwrap(), Some(content));

    tree.set_attribute(added, "data-testid", "next-link").unwrap();
    tree.set_rect(added, BoundingBox::new(1.0, 2.0, 3.0, 4.0)).unwrap();
    assert_eq!(tree.find("[data-testid=\"next-link\"]").await.unwrap(), Some(added));
    assert_eq!(
        tree.bounding_box(added).await.unwrap(),
        BoundingBox::new(1.0, 2.0, 3.0, 4.0)
    );

    tree.remove(content).unwrap();
    assert!(matches!(tree.children(added).await, Err(TreeError::Detached(_))));
}

#[tokio::test]
async fn invalid_selectors_are_reported() {
    let tree = page();
    let err = tree.find_all("div[").await.unwrap_err();
    assert!(err.is_invalid_selector());
    let err = tree.find_all("//div[").await.unwrap_err();
    assert!(err.is_invalid_selector());
}

#[test]
fn snapshot_json_loads() {
    let json = r#"{
        "tag": "html",
        "children": [
            {"tag": "body", "children": [
                {"tag": "input", "attributes": {"name": "q"},
                 "rect": {"x": 0.0, "y": 0.0, "width": 100.0, "height": 20.0}}
            ]}
        ]
    }"#;
    let tree = MemoryTree::from_json_str(json).unwrap();
    assert_eq!(tree.len(), 3);
    assert!(MemoryTree::from_json_str("{").is_err());
}
