use super::*;
use crate::capture::{ArtifactId, ContainerFormat, VideoArtifact};
use crate::detection::HitKind;
use crate::error::StoreError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

fn create_test_artifact(id: ArtifactId, offset_secs: i64) -> VideoArtifact {
    VideoArtifact::from_clip(
        id,
        base_time() + Duration::seconds(offset_secs),
        ContainerFormat::WebM,
        &chrono_tz::UTC,
        Some(HitKind::FullBody),
        vec![id as u8; 16],
    )
}

async fn fill(store: &dyn ArtifactStore, count: u64) {
    for i in 0..count {
        store
            .append(create_test_artifact(i + 1, i as i64))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_memory_store_lists_newest_first() {
    let store = MemoryArtifactStore::new();
    store.append(create_test_artifact(2, 10)).await.unwrap();
    store.append(create_test_artifact(1, 0)).await.unwrap();
    store.append(create_test_artifact(3, 20)).await.unwrap();

    let ids: Vec<ArtifactId> = store.list().await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
}

#[tokio::test]
async fn test_memory_store_get_remove_clear() {
    let store = MemoryArtifactStore::new();
    fill(&store, 3).await;

    let artifact = store.get(2).await.unwrap();
    assert_eq!(artifact.payload.read().await.unwrap(), vec![2u8; 16]);

    assert!(matches!(store.get(42).await, Err(StoreError::NotFound { .. })));
    assert!(matches!(
        store.append(create_test_artifact(2, 99)).await,
        Err(StoreError::Duplicate { .. })
    ));

    store.remove(2).await.unwrap();
    assert!(matches!(store.remove(2).await, Err(StoreError::NotFound { .. })));
    assert_eq!(store.len().await, 2);

    assert_eq!(store.clear().await.unwrap(), 2);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_eleventh_artifact_evicts_only_the_oldest() {
    let store = MemoryArtifactStore::new();
    fill(&store, 10).await;
    let before: Vec<_> = store.list().await.unwrap();

    store.append(create_test_artifact(11, 10)).await.unwrap();
    let result = enforce_retention(&store, 10).await;

    assert_eq!(result.removed, vec![1]);
    assert!(result.errors.is_empty());

    let after = store.list().await.unwrap();
    assert_eq!(after.len(), 10);
    assert_eq!(after[0].id, 11);
    // The other ten are untouched
    assert_eq!(&after[1..], &before[..9]);
}

#[tokio::test]
async fn test_retention_within_cap_is_noop() {
    let store = MemoryArtifactStore::new();
    fill(&store, 4).await;

    let result = enforce_retention(&store, 10).await;
    assert_eq!(result.artifacts_removed(), 0);
    assert_eq!(store.len().await, 4);
}

#[tokio::test]
async fn test_retention_removes_many_oldest_first() {
    let store = MemoryArtifactStore::new();
    fill(&store, 7).await;

    let result = enforce_retention(&store, 3).await;
    assert_eq!(result.removed, vec![1, 2, 3, 4]);
    assert_eq!(result.bytes_freed, 64);

    let ids: Vec<ArtifactId> = store.list().await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![7, 6, 5]);
}

#[tokio::test]
async fn test_file_store_persists_payload_and_sidecar() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileArtifactStore::open(temp_dir.path()).await.unwrap();

    let metadata = store.append(create_test_artifact(5, 0)).await.unwrap();
    assert_eq!(metadata.filename, "hit-2024-05-01T09-00-00-000.webm");

    assert!(temp_dir.path().join(&metadata.filename).exists());
    assert!(temp_dir
        .path()
        .join(format!("{}.json", metadata.filename))
        .exists());

    let artifact = store.get(5).await.unwrap();
    assert_eq!(artifact.payload.read().await.unwrap(), vec![5u8; 16]);
}

#[tokio::test]
async fn test_file_store_rescans_existing_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = FileArtifactStore::open(temp_dir.path()).await.unwrap();
        fill(&store, 3).await;
    }

    // An orphan sidecar and an unrelated file are ignored
    std::fs::write(temp_dir.path().join("broken.webm.json"), "{not json").unwrap();
    std::fs::write(temp_dir.path().join("notes.txt"), "hello").unwrap();

    let reopened = FileArtifactStore::open(temp_dir.path()).await.unwrap();
    let ids: Vec<ArtifactId> = reopened.list().await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
    assert_eq!(reopened.last_id().await, Some(3));
    assert_eq!(
        reopened.get(1).await.unwrap().metadata.hit_kind,
        Some(HitKind::FullBody)
    );
}

#[tokio::test]
async fn test_file_store_remove_and_clear_delete_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileArtifactStore::open(temp_dir.path()).await.unwrap();
    fill(&store, 3).await;

    let removed = store.remove(1).await.unwrap();
    assert!(!temp_dir.path().join(&removed.filename).exists());
    assert!(matches!(store.get(1).await, Err(StoreError::NotFound { .. })));

    assert_eq!(store.clear().await.unwrap(), 2);
    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_file_store_retention_evicts_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileArtifactStore::open(temp_dir.path()).await.unwrap();
    fill(&store, 11).await;

    let result = enforce_retention(&store, 10).await;
    assert_eq!(result.removed, vec![1]);

    // Ten payloads plus ten sidecars remain
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 20);
}
