// Database tests

use glitch::db::{Database, TranscriptRepository};
use tempfile::TempDir;

fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(db_path).unwrap();
    (db, temp_dir)
}

#[tokio::test]
async fn test_database_initialization() {
    let (db, temp) = create_test_db();
    assert!(temp.path().join("test.db").exists());
    assert!(db.health_check().await.unwrap());
}

#[tokio::test]
async fn test_append_transcript_entry() {
    let (db, _temp) = create_test_db();
    let repo = TranscriptRepository::new(db);

    let entry = repo.append("Glitch", "hello", "hi there").await.unwrap();

    assert!(!entry.id.is_empty());
    assert_eq!(entry.bot_name, "Glitch");
    assert_eq!(repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_recent_is_newest_first_and_limited() {
    let (db, _temp) = create_test_db();
    let repo = TranscriptRepository::new(db);

    for i in 0..5 {
        repo.append("Glitch", &format!("q{}", i), &format!("a{}", i))
            .await
            .unwrap();
    }

    let recent = repo.recent(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].user_input, "q4");
    assert_eq!(recent[1].user_input, "q3");
}

#[tokio::test]
async fn test_entries_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested/dir/test.db");

    {
        let repo = TranscriptRepository::new(Database::new(&db_path).unwrap());
        repo.append("Glitch", "persist me", "ok").await.unwrap();
    }

    let repo = TranscriptRepository::new(Database::new(&db_path).unwrap());
    let entries = repo.recent(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reply, "ok");
}
