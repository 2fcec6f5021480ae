use std::sync::Arc;

use super::*;
use tempfile::TempDir;

fn executor(backend: Arc<FakeBackend>, dest: &Path) -> TaskExecutor {
    TaskExecutor::new(
        backend,
        BucketRoot::parse("s3://bucket/products/").unwrap(),
        dest.to_path_buf(),
    )
}

#[tokio::test]
async fn test_successful_copy_counts_files() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Arc::new(FakeBackend::new());
    let outcome = executor(backend.clone(), temp_dir.path()).execute(id("SKU001")).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(outcome.files_transferred, 1);
    assert_eq!(outcome.bytes_transferred, FAKE_FILE_BYTES.len() as u64);
    assert!(outcome.error.is_none());
    assert!(temp_dir.path().join("SKU001").join("data.bin").exists());
    assert_eq!(backend.calls(), vec!["s3://bucket/products/SKU001/".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_skip_existing_does_not_copy() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let nested = temp_dir.path().join("SKU001").join("images");
    std::fs::create_dir_all(&nested)?;
    std::fs::write(nested.join("a.jpg"), b"jpg")?;

    let backend = Arc::new(FakeBackend::new());
    let outcome = executor(backend.clone(), temp_dir.path())
        .skip_existing(true)
        .execute(id("SKU001"))
        .await;

    assert_eq!(outcome.status, TaskStatus::Skipped);
    assert_eq!(outcome.files_transferred, 0);
    assert!(backend.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_skip_existing_copies_into_folder_without_files() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    std::fs::create_dir_all(temp_dir.path().join("SKU001").join("empty"))?;

    let backend = Arc::new(FakeBackend::new());
    let outcome = executor(backend.clone(), temp_dir.path())
        .skip_existing(true)
        .execute(id("SKU001"))
        .await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(backend.calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_existing_files_are_recopied_without_skip() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let dest = temp_dir.path().join("SKU001");
    std::fs::create_dir_all(&dest)?;
    std::fs::write(dest.join("old.txt"), b"old")?;

    let backend = Arc::new(FakeBackend::new());
    let outcome = executor(backend.clone(), temp_dir.path()).execute(id("SKU001")).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    // approximation: files already present are counted too
    assert_eq!(outcome.files_transferred, 2);
    assert_eq!(outcome.bytes_transferred, 3 + FAKE_FILE_BYTES.len() as u64);
    Ok(())
}

#[tokio::test]
async fn test_tool_failure_becomes_error_outcome() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Arc::new(FakeBackend::new().failing(&["BAD"]));
    let executor = executor(backend, temp_dir.path());

    let bad = executor.execute(id("BAD")).await;
    let good = executor.execute(id("GOOD")).await;

    assert_eq!(bad.status, TaskStatus::Error);
    let message = bad.error.unwrap();
    assert!(message.contains("NoSuchKey"), "{}", message);
    assert_eq!(good.status, TaskStatus::Success);
    Ok(())
}

#[tokio::test]
async fn test_unwritable_destination_becomes_error_outcome() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let not_a_dir = temp_dir.path().join("file");
    std::fs::write(&not_a_dir, b"x")?;

    let backend = Arc::new(FakeBackend::new());
    let outcome = executor(backend.clone(), &not_a_dir).execute(id("SKU001")).await;

    assert_eq!(outcome.status, TaskStatus::Error);
    assert!(outcome.error.unwrap().contains("failed to create"));
    assert!(backend.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_dry_run_has_no_side_effects() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Arc::new(FakeBackend::new());
    let outcome = executor(backend.clone(), temp_dir.path())
        .dry_run(true)
        .execute(id("SKU001"))
        .await;

    assert_eq!(outcome.status, TaskStatus::Planned);
    assert!(!temp_dir.path().join("SKU001").exists());
    assert!(backend.calls().is_empty());
    Ok(())
}

#[test]
fn test_dir_stats_and_has_any_file() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path().join("tree");
    assert!(!has_any_file(&root)?);

    std::fs::create_dir_all(root.join("a/b"))?;
    assert!(!has_any_file(&root)?);

    std::fs::write(root.join("a/b/one.txt"), b"12345")?;
    std::fs::write(root.join("two.txt"), b"12")?;
    assert!(has_any_file(&root)?);
    assert_eq!(dir_stats(&root)?, DirStats { files: 2, bytes: 7 });
    Ok(())
}
