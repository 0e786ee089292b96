mod common;

use deckmark::layouts::{Frame, PlaceholderKind};
use deckmark::{describe_template, discover_layouts, DeckError, PptxTemplate};
use tempfile::TempDir;

#[test]
fn test_discovers_layouts_in_master_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("template.pptx");
    common::write_template(&path);

    let template = PptxTemplate::open(&path).expect("Failed to open template");
    let registry = discover_layouts(&template).expect("Failed to discover layouts");

    let names: Vec<&str> = registry.layouts().iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Title", "Text", "Picture", "Blank"]);

    let blank = registry.lookup("Blank").unwrap();
    assert!(blank.placeholders.is_empty(), "footer is not fillable");

    let text = registry.lookup("Text").unwrap();
    assert_eq!(text.handle.part, "ppt/slideLayouts/slideLayout2.xml");
    assert_eq!(text.placeholders.len(), 2, "slide number is excluded");
    let body = &text.placeholders[1];
    assert_eq!(body.kind, PlaceholderKind::Body);
    assert_eq!(body.ph_type, None);
    assert_eq!(body.index, 1);
}

#[test]
fn test_geometry_is_inherited_from_master() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("template.pptx");
    common::write_template(&path);

    let template = PptxTemplate::open(&path).unwrap();
    let registry = discover_layouts(&template).unwrap();
    let title = registry.lookup("Title").unwrap();

    let kinds: Vec<PlaceholderKind> = title.placeholders.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![PlaceholderKind::Title, PlaceholderKind::Body]);
    assert_eq!(
        title.placeholders[0].frame,
        Some(Frame { x: 838200, y: 365125, cx: 10515600, cy: 1325563 })
    );
    assert_eq!(title.placeholders[1].ph_type.as_deref(), Some("subTitle"));
    assert_eq!(
        title.placeholders[1].frame,
        Some(Frame { x: 838200, y: 1825625, cx: 10515600, cy: 4351338 })
    );

    let picture = registry.lookup("Picture").unwrap();
    let pics: Vec<u32> = picture
        .placeholders_of(PlaceholderKind::Picture)
        .map(|p| p.index)
        .collect();
    assert_eq!(pics, vec![1, 2]);
}

#[test]
fn test_describe_template_lists_placeholders() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("template.pptx");
    common::write_template(&path);

    let listing = describe_template(&path).expect("Failed to describe template");
    assert!(listing.contains("4 layouts"));
    assert!(listing.contains("Picture (ppt/slideLayouts/slideLayout3.xml)"));
    assert!(listing.contains("Picture [pic] idx=2 'Picture Placeholder 3' at (7.00in, 2.00in) size 5.00in x 3.00in"));
    assert!(listing.contains("Blank (ppt/slideLayouts/slideLayout4.xml)"));
    assert!(!listing.contains("Footer Placeholder 1"));
}

#[test]
fn test_missing_template_is_reported() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let result = PptxTemplate::open(&temp_dir.path().join("nope.pptx"));
    assert!(matches!(result, Err(DeckError::PathNotFoundError(_))));
}

#[test]
fn test_non_zip_template_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("broken.pptx");
    std::fs::write(&path, "not a zip").unwrap();
    assert!(matches!(PptxTemplate::open(&path), Err(DeckError::PptxError(_))));
}
