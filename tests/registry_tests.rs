use axum::body::Bytes;
use chunkbay::models::ChunkMeta;
use chunkbay::registry::{ChunkProbe, UploadRegistry};
use chunkbay::transfer::ChunkOutcome;
use std::sync::Arc;
use uuid::Uuid;

fn meta(identifier: &str, filename: &str, chunk_size: u64, total_chunks: u64, total_size: u64) -> ChunkMeta {
    ChunkMeta {
        identifier: identifier.to_string(),
        filename: filename.to_string(),
        chunk_size,
        total_chunks,
        total_size,
    }
}

#[tokio::test]
async fn test_get_or_create_reuses_existing_entry() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = UploadRegistry::new(temp_dir.path().to_path_buf());

    assert!(registry.is_empty());
    let first = registry.get_or_create(&meta("t1", "a.bin", 400, 3, 1000)).await.unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(first.identifier(), "t1");

    let second = registry.get_or_create(&meta("t1", "a.bin", 400, 3, 1000)).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_mismatched_totals_on_existing_entry_are_ignored() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = UploadRegistry::new(temp_dir.path().to_path_buf());

    let original = registry.get_or_create(&meta("t1", "a.bin", 400, 3, 1000)).await.unwrap();

    // a later request declaring different geometry resolves to the original
    let looked_up = registry.get_or_create(&meta("t1", "other.bin", 999, 77, 5)).await.unwrap();
    assert!(Arc::ptr_eq(&original, &looked_up));
    assert_eq!(looked_up.total_chunks(), 3);
    assert_eq!(looked_up.total_size(), 1000);
    assert_eq!(looked_up.chunk_size(), 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_creation_race_produces_single_transfer() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(UploadRegistry::new(temp_dir.path().to_path_buf()));
    let identifier = Uuid::new_v4().to_string();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let registry = Arc::clone(&registry);
        let meta = meta(&identifier, "raced.bin", 400, 3, 1000);
        handles.push(tokio::spawn(async move {
            registry.get_or_create(&meta).await.unwrap()
        }));
    }

    let mut transfers = Vec::new();
    for handle in handles {
        transfers.push(handle.await.unwrap());
    }

    // every caller observed the same instance
    for transfer in &transfers {
        assert!(Arc::ptr_eq(&transfers[0], transfer));
    }
    assert_eq!(registry.len(), 1);

    // the temp file was created and preallocated exactly once
    let tmp_path = temp_dir.path().join("raced.bin.tmp");
    assert_eq!(std::fs::metadata(&tmp_path).unwrap().len(), 1000);
}

#[tokio::test]
async fn test_probe_transitions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = UploadRegistry::new(temp_dir.path().to_path_buf());

    // unknown identifier
    assert_eq!(registry.probe("nope", 1), ChunkProbe::Absent);

    let transfer = registry.get_or_create(&meta("t1", "a.bin", 4, 2, 8)).await.unwrap();
    assert_eq!(registry.probe("t1", 1), ChunkProbe::Pending);
    assert_eq!(registry.probe("t1", 2), ChunkProbe::Pending);

    transfer.write_chunk(1, Bytes::from_static(b"aaaa"), 4).await.unwrap();
    assert_eq!(registry.probe("t1", 1), ChunkProbe::Present);
    assert_eq!(registry.probe("t1", 2), ChunkProbe::Pending);

    // probing never creates entries
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.probe("still-nope", 1), ChunkProbe::Absent);
}

#[tokio::test]
async fn test_full_transfer_through_registry() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = UploadRegistry::new(temp_dir.path().to_path_buf());
    let m = meta("abc", "assembled.bin", 400, 3, 1000);

    // chunks arrive out of order, each resolving the transfer on its own
    let transfer = registry.get_or_create(&m).await.unwrap();
    transfer.write_chunk(2, Bytes::from(vec![b'B'; 400]), 400).await.unwrap();

    let transfer = registry.get_or_create(&m).await.unwrap();
    transfer.write_chunk(1, Bytes::from(vec![b'A'; 400]), 400).await.unwrap();

    let transfer = registry.get_or_create(&m).await.unwrap();
    let outcome = transfer.write_chunk(3, Bytes::from(vec![b'C'; 200]), 200).await.unwrap();
    assert_eq!(outcome, ChunkOutcome::Completed);

    let content = std::fs::read(temp_dir.path().join("assembled.bin")).unwrap();
    assert_eq!(&content[..400], vec![b'A'; 400].as_slice());
    assert_eq!(&content[400..800], vec![b'B'; 400].as_slice());
    assert_eq!(&content[800..], vec![b'C'; 200].as_slice());

    // the registry keeps the terminal entry; probes now answer Present
    assert_eq!(registry.probe("abc", 3), ChunkProbe::Present);
}
