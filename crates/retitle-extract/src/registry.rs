//! Extraction adapter registry for dispatching files to their strategy.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use retitle_core::{ExtractionAdapter, ExtractionError, ExtractionResult, ExtractionStrategy, Format};
use retitle_inference::VisionBackend;

use crate::adapters::{
    EmailAdapter, ImageAdapter, MarkupAdapter, OfficeConvertAdapter, PdfTextAdapter,
    SpreadsheetAdapter, TextNativeAdapter,
};

/// Registry mapping extraction strategies to their adapter implementations.
pub struct ExtractionRegistry {
    adapters: HashMap<ExtractionStrategy, Arc<dyn ExtractionAdapter>>,
}

impl ExtractionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with one adapter for every strategy. The image adapter
    /// consults `vision` before falling back to metadata.
    pub fn with_defaults(vision: Option<Arc<dyn VisionBackend>>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OfficeConvertAdapter));
        registry.register(Arc::new(SpreadsheetAdapter));
        registry.register(Arc::new(EmailAdapter));
        registry.register(Arc::new(MarkupAdapter));
        registry.register(Arc::new(PdfTextAdapter));
        registry.register(Arc::new(TextNativeAdapter));
        registry.register(Arc::new(match vision {
            Some(vision) => ImageAdapter::with_vision(vision),
            None => ImageAdapter::new(),
        }));
        registry
    }

    /// Register an adapter. Replaces any existing adapter for the same strategy.
    pub fn register(&mut self, adapter: Arc<dyn ExtractionAdapter>) {
        self.adapters.insert(adapter.strategy(), adapter);
    }

    /// Extract content using the adapter registered for the given strategy.
    ///
    /// A result whose text is blank is reported as `EmptyContent`, whatever
    /// the adapter returned.
    #[instrument(skip(self, data, config), fields(subsystem = "extract", component = "registry", op = "extract", strategy = %strategy, bytes = data.len()))]
    pub async fn extract(
        &self,
        strategy: ExtractionStrategy,
        data: &[u8],
        filename: &str,
        config: &JsonValue,
    ) -> Result<ExtractionResult, ExtractionError> {
        let adapter = self.adapters.get(&strategy).ok_or_else(|| {
            ExtractionError::ConversionFailed(format!(
                "No extraction adapter registered for strategy: {}",
                strategy
            ))
        })?;
        let result = adapter.extract(data, filename, config).await?;
        if result.text.trim().is_empty() {
            return Err(ExtractionError::EmptyContent);
        }
        debug!(
            adapter = adapter.name(),
            chars = result.text.chars().count(),
            is_description = result.is_description,
            "Extraction complete"
        );
        Ok(result)
    }

    /// Extract content for a format family via its static strategy.
    pub async fn extract_format(
        &self,
        format: Format,
        data: &[u8],
        filename: &str,
        config: &JsonValue,
    ) -> Result<ExtractionResult, ExtractionError> {
        let strategy = format.strategy().ok_or_else(|| {
            ExtractionError::ConversionFailed(format!("unsupported format for '{}'", filename))
        })?;
        self.extract(strategy, data, filename, config).await
    }

    /// List all strategies that have registered adapters.
    pub fn available_strategies(&self) -> Vec<ExtractionStrategy> {
        self.adapters.keys().copied().collect()
    }

    /// Check if an adapter is registered for the given strategy.
    pub fn has_adapter(&self, strategy: ExtractionStrategy) -> bool {
        self.adapters.contains_key(&strategy)
    }

    /// Run health checks on all registered adapters.
    pub async fn health_check_all(&self) -> HashMap<ExtractionStrategy, bool> {
        let mut results = HashMap::new();
        for (strategy, adapter) in &self.adapters {
            let healthy = adapter.health_check().await.unwrap_or(false);
            results.insert(*strategy, healthy);
        }
        results
    }
}

impl Default for ExtractionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Adapter that "succeeds" with whitespace.
    struct BlankAdapter;

    #[async_trait]
    impl ExtractionAdapter for BlankAdapter {
        fn strategy(&self) -> ExtractionStrategy {
            ExtractionStrategy::Markup
        }

        async fn extract(
            &self,
            _data: &[u8],
            _filename: &str,
            _config: &JsonValue,
        ) -> Result<ExtractionResult, ExtractionError> {
            Ok(ExtractionResult::text(" \n\t ", serde_json::json!({})))
        }

        async fn health_check(&self) -> retitle_core::Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "blank"
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = ExtractionRegistry::new();
        assert!(registry.available_strategies().is_empty());
        assert!(!registry.has_adapter(ExtractionStrategy::TextNative));
    }

    #[test]
    fn test_defaults_cover_every_strategy() {
        let registry = ExtractionRegistry::with_defaults(None);
        for ext in retitle_core::SUPPORTED_EXTENSIONS {
            let strategy = Format::from_extension(ext).strategy().unwrap();
            assert!(registry.has_adapter(strategy), "no adapter for .{}", ext);
        }
        assert_eq!(registry.available_strategies().len(), 7);
    }

    #[tokio::test]
    async fn test_registry_extract_missing_adapter() {
        let registry = ExtractionRegistry::new();
        let err = registry
            .extract(ExtractionStrategy::PdfText, b"data", "test.pdf", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ConversionFailed(_)));
    }

    #[tokio::test]
    async fn test_registry_extract_with_adapter() {
        let mut registry = ExtractionRegistry::new();
        registry.register(Arc::new(TextNativeAdapter));

        let extraction = registry
            .extract_format(Format::PlainText, b"hello world", "test.txt", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(extraction.text, "hello world");
    }

    #[tokio::test]
    async fn test_blank_adapter_output_becomes_empty_content() {
        let mut registry = ExtractionRegistry::new();
        registry.register(Arc::new(BlankAdapter));
        let err = registry
            .extract(ExtractionStrategy::Markup, b"<p></p>", "x.html", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, ExtractionError::EmptyContent);
    }

    #[tokio::test]
    async fn test_unsupported_format_is_conversion_failed() {
        let registry = ExtractionRegistry::with_defaults(None);
        let err = registry
            .extract_format(Format::Unsupported, b"PK", "a.zip", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ConversionFailed(_)));
    }

    #[tokio::test]
    async fn test_registry_health_check_all() {
        let mut registry = ExtractionRegistry::new();
        registry.register(Arc::new(TextNativeAdapter));

        let results = registry.health_check_all().await;
        assert_eq!(results.len(), 1);
        assert!(results[&ExtractionStrategy::TextNative]);
    }
}
