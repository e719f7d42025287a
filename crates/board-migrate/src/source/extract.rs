//! Bounded-memory document extraction for one board.

use tokio::sync::mpsc;
use tracing::debug;

use crate::core::traits::SourceStore;
use crate::error::Result;

use super::types::LegacyDocument;

/// Streams one module's live documents, oldest first.
///
/// Soft-deleted rows are dropped here and only counted, so callers see
/// exactly the documents that become posts.
pub struct DocumentExtractor {
    rx: mpsc::Receiver<Result<LegacyDocument>>,
    total: i64,
    delivered: u64,
    skipped_deleted: u64,
}

impl DocumentExtractor {
    /// Run the count pre-query, then open the stream.
    pub async fn open(
        source: &dyn SourceStore,
        prefix: &str,
        module_srl: i64,
        buffer: usize,
    ) -> Result<Self> {
        let total = source.count_documents(prefix, module_srl).await?;
        debug!(
            "Opening document stream for module_srl={} ({} rows, buffer {})",
            module_srl, total, buffer
        );
        let rx = source.stream_documents(prefix, module_srl, buffer.max(1));
        Ok(Self {
            rx,
            total,
            delivered: 0,
            skipped_deleted: 0,
        })
    }

    /// Row count reported by the pre-query, deleted rows included.
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Next non-deleted document, `None` when the stream is exhausted.
    pub async fn next_live(&mut self) -> Result<Option<LegacyDocument>> {
        while let Some(item) = self.rx.recv().await {
            let doc = item?;
            if doc.is_deleted() {
                self.skipped_deleted += 1;
                debug!("Skipping deleted document {}", doc.label());
                continue;
            }
            self.delivered += 1;
            return Ok(Some(doc));
        }
        Ok(None)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn skipped_deleted(&self) -> u64 {
        self.skipped_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{doc, FakeSource};

    #[tokio::test]
    async fn test_deleted_rows_are_skipped_and_counted() {
        let source = FakeSource::new("xe_").with_board(
            7,
            "free",
            vec![
                doc(1, "first", "PUBLIC"),
                doc(2, "gone", "DELETED"),
                doc(3, "second", "SECRET"),
                doc(4, "gone too", "deleted"),
            ],
        );

        let mut extractor = DocumentExtractor::open(&source, "xe_", 7, 2).await.unwrap();
        assert_eq!(extractor.total(), 4);

        let mut titles = Vec::new();
        while let Some(d) = extractor.next_live().await.unwrap() {
            titles.push(d.title.unwrap_or_default());
        }

        assert_eq!(titles, vec!["first", "second"]);
        assert_eq!(extractor.delivered(), 2);
        assert_eq!(extractor.skipped_deleted(), 2);
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let source = FakeSource::new("xe_")
            .with_board(7, "free", vec![doc(1, "first", "PUBLIC")])
            .failing_stream();

        let mut extractor = DocumentExtractor::open(&source, "xe_", 7, 4).await.unwrap();
        assert!(extractor.next_live().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_board() {
        let source = FakeSource::new("xe_").with_board(9, "empty", vec![]);
        let mut extractor = DocumentExtractor::open(&source, "xe_", 9, 0).await.unwrap();
        assert_eq!(extractor.total(), 0);
        assert!(extractor.next_live().await.unwrap().is_none());
    }
}
