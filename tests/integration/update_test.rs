//! Staged updates: request, cancel, apply on restart.

use dock_plugin::InstanceState;

use crate::helpers::{NOTES, TestApp, manifest};

async fn installed_notes() -> TestApp {
    let app = TestApp::new().await;
    let package = app.package("notes-1.0.0.zip", &manifest(NOTES, "1.0.0", "Notes"), &[]);
    assert!(app.manager().install(&package).await.success);
    app
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_applied_on_restart_preserves_data() {
    let mut app = installed_notes().await;
    let data_dir = app.plugin_dir(NOTES).join("Data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("user.txt"), b"keep me").unwrap();
    app.context.stores.data.set(NOTES, "note:0", "hello").await.unwrap();

    let package = app.package(
        "notes-1.1.0.zip",
        &manifest(NOTES, "1.1.0", "Notes"),
        &[("CHANGELOG.md", b"1.1.0")],
    );
    let outcome = app.manager().install(&package).await;
    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome.message.contains("restart"), "{}", outcome.message);

    // The running version is untouched until restart.
    let info = app.info(NOTES).await;
    assert_eq!(info.version, "1.0.0");
    assert!(info.pending_update);
    assert_eq!(info.pending_version.as_deref(), Some("1.1.0"));
    assert_eq!(info.state, InstanceState::Enabled);
    assert!(!app.plugin_dir(NOTES).join("CHANGELOG.md").exists());

    app.restart().await;

    let record = app.manager().records().await.unwrap().remove(0);
    assert_eq!(record.version, "1.1.0");
    assert!(!record.pending_update);
    assert!(record.pending_version.is_none());

    let dir = app.plugin_dir(NOTES);
    assert!(dir.join("CHANGELOG.md").is_file());
    assert_eq!(std::fs::read(dir.join("Data").join("user.txt")).unwrap(), b"keep me");
    assert_eq!(
        app.context.stores.data.get(NOTES, "note:0").await.unwrap().as_deref(),
        Some("hello")
    );

    let info = app.info(NOTES).await;
    assert_eq!(info.version, "1.1.0");
    assert_eq!(info.state, InstanceState::Enabled);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_update_discards_staged_files() {
    let mut app = installed_notes().await;
    let package = app.package("notes-2.0.0.zip", &manifest(NOTES, "2.0.0", "Notes"), &[]);
    assert!(app.manager().request_update(&package).await.success);

    let outcome = app.manager().cancel_update(NOTES).await;
    assert!(outcome.success, "{}", outcome.message);
    assert!(!app.manager().cancel_update(NOTES).await.success);

    let staged = app.manager().config().staging_root().join("updates").join(NOTES);
    assert!(!staged.exists());

    app.restart().await;
    let record = app.manager().records().await.unwrap().remove(0);
    assert_eq!(record.version, "1.0.0");
    assert!(!record.pending_update);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_restaging_replaces_pending_version() {
    let mut app = installed_notes().await;
    let first = app.package("notes-1.1.0.zip", &manifest(NOTES, "1.1.0", "Notes"), &[]);
    let second = app.package("notes-1.2.0.zip", &manifest(NOTES, "1.2.0", "Notes"), &[]);
    assert!(app.manager().install(&first).await.success);
    assert!(app.manager().install(&second).await.success);
    assert_eq!(app.info(NOTES).await.pending_version.as_deref(), Some("1.2.0"));

    app.restart().await;
    assert_eq!(app.info(NOTES).await.version, "1.2.0");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_update_requires_installed_plugin() {
    let app = TestApp::new().await;
    let package = app.package("notes.zip", &manifest(NOTES, "1.0.0", "Notes"), &[]);

    let outcome = app.manager().request_update(&package).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("not installed"), "{}", outcome.message);
    assert!(!app.plugin_dir(NOTES).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_staged_folder_cancels_update() {
    let mut app = installed_notes().await;
    let package = app.package("notes-1.1.0.zip", &manifest(NOTES, "1.1.0", "Notes"), &[]);
    assert!(app.manager().install(&package).await.success);

    let staged = app.manager().config().staging_root().join("updates").join(NOTES);
    std::fs::remove_dir_all(&staged).unwrap();

    app.restart().await;
    let record = app.manager().records().await.unwrap().remove(0);
    assert_eq!(record.version, "1.0.0");
    assert!(!record.pending_update);
    assert_eq!(app.info(NOTES).await.state, InstanceState::Enabled);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_blocked_while_uninstall_pending() {
    let app = installed_notes().await;
    assert!(app.manager().request_uninstall(NOTES).await.success);

    let package = app.package("notes-1.1.0.zip", &manifest(NOTES, "1.1.0", "Notes"), &[]);
    let outcome = app.manager().install(&package).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("pending uninstall"), "{}", outcome.message);
}
