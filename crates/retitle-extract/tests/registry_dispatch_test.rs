//! End-to-end dispatch through the default registry.
//!
//! Formats that need no external tools are always exercised. Converter-backed
//! formats only check the failure path, which never reaches the tool.

use std::sync::Arc;

use retitle_core::{ExtractionError, ExtractionStrategy, Format};
use retitle_extract::ExtractionRegistry;
use retitle_inference::mock::MockVisionBackend;

async fn extract(registry: &ExtractionRegistry, filename: &str, data: &[u8]) -> Result<String, ExtractionError> {
    let format = Format::from_extension(filename.rsplit('.').next().unwrap_or(""));
    registry
        .extract_format(format, data, filename, &serde_json::json!({}))
        .await
        .map(|r| r.text)
}

#[tokio::test]
async fn test_text_formats_without_external_tools() {
    let registry = ExtractionRegistry::with_defaults(None);

    let md = extract(&registry, "notes.md", b"# Sprint review\n\n- shipped search").await.unwrap();
    assert!(md.contains("Sprint review"));

    let html = extract(
        &registry,
        "page.html",
        b"<html><head><title>Release notes</title></head><body><p>v2 is out</p></body></html>",
    )
    .await
    .unwrap();
    assert!(html.starts_with("Release notes"));
    assert!(html.contains("v2 is out"));

    let csv = extract(&registry, "budget.csv", b"item,cost\nrent,1200\n").await.unwrap();
    assert_eq!(csv, "item | cost\nrent | 1200");

    let eml = extract(
        &registry,
        "mail.eml",
        b"Subject: Lunch order\r\nFrom: bob@example.com\r\n\r\nTwo sandwiches please.\r\n",
    )
    .await
    .unwrap();
    assert_eq!(eml, "Lunch order\n\nTwo sandwiches please.");
}

#[tokio::test]
async fn test_failure_kinds_by_format() {
    let registry = ExtractionRegistry::with_defaults(None);

    assert_eq!(
        extract(&registry, "empty.txt", b"   ").await.unwrap_err(),
        ExtractionError::EmptyContent
    );
    assert!(matches!(
        extract(&registry, "broken.docx", b"not a zip").await.unwrap_err(),
        ExtractionError::ConversionFailed(_)
    ));
    assert!(matches!(
        extract(&registry, "broken.pdf", b"GIF89a").await.unwrap_err(),
        ExtractionError::ConversionFailed(_)
    ));
    assert!(matches!(
        extract(&registry, "broken.xlsx", b"PK\x03\x04garbage").await.unwrap_err(),
        ExtractionError::ConversionFailed(_)
    ));
    assert!(matches!(
        extract(&registry, "junk.msg", &[0u8; 64]).await.unwrap_err(),
        ExtractionError::DecodeFailure(_)
    ));
}

#[tokio::test]
async fn test_image_description_uses_configured_vision_backend() {
    let vision = MockVisionBackend::new().with_fixed_response("Whiteboard sketch of a floor plan");
    let registry = ExtractionRegistry::with_defaults(Some(Arc::new(vision.clone())));

    let text = extract(&registry, "IMG_2041.heic", b"\0\0\0\x18ftypheic\0\0\0\0").await.unwrap();
    assert_eq!(text, "Whiteboard sketch of a floor plan");
    assert_eq!(vision.call_count(), 1);
}

#[tokio::test]
async fn test_health_check_reports_every_strategy() {
    let registry = ExtractionRegistry::with_defaults(None);
    let health = registry.health_check_all().await;
    assert_eq!(health.len(), 7);
    for strategy in ["text_native", "markup", "spreadsheet", "email", "image"] {
        let strategy: ExtractionStrategy = strategy.parse().unwrap();
        assert!(health[&strategy], "{} should always be healthy", strategy);
    }
}
