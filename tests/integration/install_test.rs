//! Package installation and rejection paths.

use std::time::Duration;

use dock_plugin::InstanceState;

use crate::helpers::{NOTES, SLOW, TestApp, manifest};

#[tokio::test(flavor = "multi_thread")]
async fn test_same_version_is_rejected() {
    let app = TestApp::new().await;
    let package = app.package("notes.zip", &manifest(NOTES, "1.0.0", "Notes"), &[]);
    assert!(app.manager().install(&package).await.success);

    let outcome = app.manager().install(&package).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("already installed"), "{}", outcome.message);
    assert_eq!(app.manager().records().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_manifest_is_rejected() {
    let app = TestApp::new().await;
    let package = app.package("bad.zip", &manifest("Bad Name", "1.0.0", "Notes"), &[]);

    let outcome = app.manager().install(&package).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("name"), "{}", outcome.message);
    assert!(outcome.plugin_name.is_none());
    assert!(app.manager().records().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_package_without_manifest_is_rejected() {
    let app = TestApp::new().await;
    let path = app.root.path().join("empty.zip");
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    writer
        .start_file("readme.txt", zip::write::SimpleFileOptions::default())
        .unwrap();
    std::io::Write::write_all(&mut writer, b"no manifest here").unwrap();
    writer.finish().unwrap();

    let outcome = app.manager().install(&path).await;
    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Invalid plugin package"), "{}", outcome.message);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_not_a_zip_is_rejected() {
    let app = TestApp::new().await;
    let path = app.root.path().join("garbage.zip");
    std::fs::write(&path, b"definitely not a zip").unwrap();

    let outcome = app.manager().install(&path).await;
    assert!(!outcome.success);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_initialization_rolls_back() {
    let app = TestApp::new().await;
    let package = app.package(
        "broken.zip",
        &manifest("com.acme.broken", "1.0.0", "Broken"),
        &[],
    );

    let outcome = app.manager().install(&package).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("broken on purpose"), "{}", outcome.message);
    assert!(!app.plugin_dir("com.acme.broken").exists());
    assert!(app.manager().records().await.unwrap().is_empty());
    assert!(app.manager().list_plugins().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_entry_class_is_rejected() {
    let app = TestApp::new().await;
    let package = app.package(
        "ghost.zip",
        &manifest("com.acme.ghost", "1.0.0", "Ghost"),
        &[],
    );

    let outcome = app.manager().install(&package).await;
    assert!(!outcome.success);
    assert!(!app.plugin_dir("com.acme.ghost").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_dependency_blocks_install() {
    let app = TestApp::new().await;
    let mut reader = manifest("com.acme.reader", "1.0.0", "Reader");
    reader["dependencies"] = serde_json::json!({ "com.acme.core": "^1.0.0" });
    let package = app.package("reader.zip", &reader, &[]);

    let outcome = app.manager().install(&package).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("com.acme.core"), "{}", outcome.message);
    assert!(!app.plugin_dir("com.acme.reader").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_installs_of_one_plugin() {
    let app = TestApp::new().await;
    let first = app.package("a.zip", &manifest(NOTES, "1.0.0", "Notes"), &[]);
    let second = app.package("b.zip", &manifest(NOTES, "1.0.0", "Notes"), &[]);

    let (a, b) = tokio::join!(app.manager().install(&first), app.manager().install(&second));
    assert!(a.success != b.success, "a: {}, b: {}", a.message, b.message);
    assert_eq!(app.manager().records().await.unwrap().len(), 1);
    assert_eq!(app.info(NOTES).await.state, InstanceState::Enabled);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_staging_is_cleaned_up() {
    let app = TestApp::new().await;
    let package = app.package("notes.zip", &manifest(NOTES, "1.0.0", "Notes"), &[]);
    assert!(app.manager().install(&package).await.success);

    let leftovers: Vec<_> = std::fs::read_dir(app.manager().config().staging_root())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name() != "updates")
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancelled_install_leaves_nothing_behind() {
    let mut app = TestApp::new().await;
    let package = app.package("slow.zip", &manifest(SLOW, "1.0.0", "Slow"), &[]);

    let manager = app.context.manager.clone();
    let task = tokio::spawn(async move { manager.install(&package).await });
    tokio::time::sleep(Duration::from_millis(300)).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert!(app.manager().records().await.unwrap().is_empty());
    assert!(!app.plugin_dir(SLOW).exists());

    // Let the abandoned load finish before restarting.
    tokio::time::sleep(Duration::from_millis(800)).await;
    app.restart().await;
    assert!(app.manager().records().await.unwrap().is_empty());
    assert!(app.manager().list_plugins().await.unwrap().is_empty());
    assert!(!app.plugin_dir(SLOW).exists());
}
