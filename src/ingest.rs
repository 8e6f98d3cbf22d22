//! The ingest/dedup gate between an incoming video submission and the
//! catalog.

use crate::catalog::{NewVideo, VideoCatalog, VideoRecord};
use crate::normalize::normalize;

/// Outcome of an ingest attempt. A duplicate is normal control flow, not a
/// fault; whether the submitter hears about it is the caller's policy call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored(VideoRecord),
    Duplicate,
}

/// Normalizes the submitted caption and stores the video unless an existing
/// record already covers it.
///
/// Two concurrent ingests of the same content can both pass the duplicate
/// lookup before either insert commits; the catalog only guarantees
/// per-record atomic writes, so that race window is accepted.
pub async fn ingest(
    catalog: &VideoCatalog,
    submission: NewVideo,
) -> sqlx::Result<IngestOutcome> {
    let caption = normalize(&submission.caption);
    if catalog
        .find_duplicate(&caption, submission.size_bytes, &submission.file_unique_id)
        .await?
        .is_some()
    {
        return Ok(IngestOutcome::Duplicate);
    }
    let record = catalog.insert(NewVideo { caption, ..submission }).await?;
    Ok(IngestOutcome::Stored(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_catalog() -> VideoCatalog {
        VideoCatalog::connect("sqlite::memory:").await.expect("in-memory catalog")
    }

    fn submission(caption: &str, size_bytes: i64, unique: &str) -> NewVideo {
        NewVideo {
            file_id: format!("file-{unique}"),
            file_unique_id: unique.to_string(),
            caption: caption.to_string(),
            size_bytes,
        }
    }

    #[tokio::test]
    async fn same_caption_and_size_is_a_duplicate() {
        let catalog = memory_catalog().await;
        let first = ingest(&catalog, submission("Escape Room", 100, "u1")).await.expect("ingest");
        assert!(matches!(first, IngestOutcome::Stored(_)));

        let second = ingest(&catalog, submission("Escape Room", 100, "u2")).await.expect("ingest");
        assert_eq!(second, IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn same_caption_with_different_size_is_stored_twice() {
        let catalog = memory_catalog().await;
        let first = ingest(&catalog, submission("Escape Room", 100, "u1")).await.expect("ingest");
        let second = ingest(&catalog, submission("Escape Room", 200, "u2")).await.expect("ingest");
        assert!(matches!(first, IngestOutcome::Stored(_)));
        assert!(matches!(second, IngestOutcome::Stored(_)));
    }

    #[tokio::test]
    async fn same_transport_file_is_a_duplicate_regardless_of_caption() {
        let catalog = memory_catalog().await;
        ingest(&catalog, submission("Escape Room", 100, "u1")).await.expect("ingest");
        let renamed = ingest(&catalog, submission("Renamed Upload", 999, "u1")).await.expect("ingest");
        assert_eq!(renamed, IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn captions_are_normalized_before_the_dedup_check() {
        let catalog = memory_catalog().await;
        ingest(&catalog, submission("The.Great.Escape (1963)", 100, "u1"))
            .await
            .expect("ingest");
        // Different raw spelling, identical normalized form and size.
        let outcome = ingest(&catalog, submission("The Great Escape 1963!!", 100, "u2"))
            .await
            .expect("ingest");
        assert_eq!(outcome, IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn stored_records_carry_the_normalized_caption() {
        let catalog = memory_catalog().await;
        let outcome = ingest(&catalog, submission("Escape.Room https://spam.example", 7, "u1"))
            .await
            .expect("ingest");
        match outcome {
            IngestOutcome::Stored(record) => assert_eq!(record.caption, "Escape Room"),
            IngestOutcome::Duplicate => panic!("expected a stored record"),
        }
    }
}
