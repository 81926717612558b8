//! Unit tests for the durable submission queue.

#[cfg(test)]
mod queue_store_tests {
    use std::collections::HashSet;

    use tempfile::TempDir;

    use crate::queue::{generate_local_id, PendingSubmission, QueueStore};

    // ── Helpers ──────────────────────────────────────────────────────────

    fn open_store(dir: &TempDir) -> QueueStore {
        QueueStore::new(dir.path().join("StoryAppDB.sqlite"))
    }

    fn make_record(description: &str) -> PendingSubmission {
        PendingSubmission::new(
            description,
            "image/jpeg",
            &[0xFF, 0xD8, 0xFF, 0xE0],
            Some(-6.2),
            Some(106.8),
        )
    }

    // ── Tests ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_enqueue_assigns_id_and_resets_sync_state() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let mut record = make_record("Sunset at the beach");
        record.sync_state = true;
        let saved = store.enqueue(record).await.unwrap();

        assert!(saved.id.starts_with("temp-"));
        assert!(!saved.sync_state);

        let all = store.list_all().await.unwrap();
        assert_eq!(all, vec![saved]);
    }

    #[tokio::test]
    async fn test_enqueue_keeps_existing_id() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let mut record = make_record("Keep my id");
        record.id = "temp-1-abcdefg".to_string();
        let saved = store.enqueue(record).await.unwrap();

        assert_eq!(saved.id, "temp-1-abcdefg");
    }

    #[tokio::test]
    async fn test_enqueue_duplicate_id_fails() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let mut record = make_record("First");
        record.id = "temp-1-dupdupd".to_string();
        store.enqueue(record.clone()).await.unwrap();

        assert!(store.enqueue(record).await.is_err());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_payload_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let saved = open_store(&dir)
            .enqueue(make_record("Persisted"))
            .await
            .unwrap();

        // A fresh handle on the same file sees the record and its photo bytes.
        let reopened = open_store(&dir);
        let all = reopened.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, saved.id);
        assert_eq!(all[0].lat, Some(-6.2));

        let photo = all[0].decode_photo().unwrap();
        assert_eq!(photo.mime, "image/jpeg");
        assert_eq!(photo.bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[tokio::test]
    async fn test_missing_coordinates_round_trip_as_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let record = PendingSubmission::new("No location", "image/png", &[1, 2, 3], None, None);
        store.enqueue(record).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all[0].lat, None);
        assert_eq!(all[0].lon, None);
    }

    #[tokio::test]
    async fn test_remove_deletes_only_target() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let a = store.enqueue(make_record("a")).await.unwrap();
        let b = store.enqueue(make_record("b")).await.unwrap();

        store.remove(&a.id).await.unwrap();

        let ids: Vec<String> = store.list_all().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b.id]);
    }

    #[tokio::test]
    async fn test_remove_absent_id_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.enqueue(make_record("stay")).await.unwrap();

        store.remove("temp-0-missing").await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.is_empty().await.unwrap());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique_and_well_formed() {
        let ids: HashSet<String> = (0..200).map(|_| generate_local_id()).collect();
        assert_eq!(ids.len(), 200);

        for id in &ids {
            let parts: Vec<&str> = id.splitn(3, '-').collect();
            assert_eq!(parts[0], "temp");
            assert!(parts[1].parse::<u128>().is_ok());
            assert_eq!(parts[2].len(), 7);
            assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_excerpt_and_file_name() {
        let mut record = make_record("A very long description that goes on and on");
        record.id = "temp-5-abc1234".to_string();
        assert_eq!(record.excerpt(), "A very long description that g");
        assert_eq!(record.upload_file_name(), "offline_temp-5-abc1234.jpg");
    }
}
