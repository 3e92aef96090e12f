//! Discovery of plugin folders and dependency-ordered loading.

use dock_core::error::ErrorKind;
use dock_plugin::InstanceState;

use crate::helpers::{CORE, READER, TestApp, manifest};

fn reader_manifest(range: &str) -> serde_json::Value {
    let mut reader = manifest(READER, "1.0.0", "Reader");
    reader["dependencies"] = serde_json::json!({ CORE: range });
    reader
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dependency_loads_first_and_is_readable() {
    let app = TestApp::new().await;
    app.place_folder(&reader_manifest("^1.0.0"));
    app.place_folder(&manifest(CORE, "1.2.0", "Core"));

    let loaded = app.manager().load_discovered().await.unwrap();
    assert_eq!(loaded, 2);

    let stores = &app.context.stores;
    assert_eq!(stores.data.get(READER, "core_seen").await.unwrap().as_deref(), Some("1"));
    assert_eq!(
        stores.data.get(READER, "undeclared").await.unwrap().as_deref(),
        Some(ErrorKind::InvalidOperation.to_string().as_str())
    );

    // Folders found on disk get records.
    let names: Vec<String> = app
        .manager()
        .records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.plugin_name)
        .collect();
    assert!(names.contains(&CORE.to_string()));
    assert!(names.contains(&READER.to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_dependency_is_listed_as_failed() {
    let app = TestApp::new().await;
    app.place_folder(&reader_manifest("^1.0.0"));

    assert_eq!(app.manager().load_discovered().await.unwrap(), 0);
    let info = app.info(READER).await;
    assert_eq!(info.state, InstanceState::Unloaded);
    let message = info.error_message.unwrap();
    assert!(message.contains(CORE), "{message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_version_mismatch_is_listed_as_failed() {
    let app = TestApp::new().await;
    app.place_folder(&reader_manifest("^2.0.0"));
    app.place_folder(&manifest(CORE, "1.2.0", "Core"));

    assert_eq!(app.manager().load_discovered().await.unwrap(), 1);
    assert_eq!(app.info(CORE).await.state, InstanceState::Enabled);
    assert!(app.info(READER).await.error_message.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dependent_of_broken_plugin_is_skipped() {
    let app = TestApp::new().await;
    let mut core = manifest(CORE, "1.0.0", "Broken");
    core["displayName"] = serde_json::json!("Core");
    app.place_folder(&core);
    app.place_folder(&reader_manifest("*"));

    assert_eq!(app.manager().load_discovered().await.unwrap(), 0);
    let message = app.info(CORE).await.error_message.unwrap();
    assert!(message.contains("broken on purpose"), "{message}");
    let message = app.info(READER).await.error_message.unwrap();
    assert!(message.contains(CORE), "{message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_folders_are_skipped() {
    let app = TestApp::new().await;
    let bad = app.plugin_dir("not-a-plugin");
    std::fs::create_dir_all(&bad).unwrap();
    std::fs::write(bad.join("plugin.json"), b"{ not json").unwrap();
    std::fs::create_dir_all(app.plugin_dir("empty")).unwrap();
    app.place_folder(&manifest(CORE, "1.0.0", "Core"));

    let found = app.manager().discover().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].manifest.name, CORE);
}
