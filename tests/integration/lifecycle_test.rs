//! End-to-end lifecycle: install, enable, disable, uninstall, purge.

use dock_plugin::InstanceState;
use dock_service::navigation::tab_id;

use crate::helpers::{NOTES, STUBBORN, TestApp, manifest};

#[tokio::test(flavor = "multi_thread")]
async fn test_install_enable_disable_uninstall_purge() {
    let mut app = TestApp::new().await;
    let package = app.package("notes.zip", &manifest(NOTES, "1.0.0", "Notes"), &[]);

    let outcome = app.manager().install(&package).await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.plugin_name.as_deref(), Some(NOTES));

    let info = app.info(NOTES).await;
    assert_eq!(info.state, InstanceState::Enabled);
    assert_eq!(info.version, "1.0.0");
    assert!(info.error_message.is_none());

    let stores = app.context.stores.clone();
    assert_eq!(stores.data.get(NOTES, "enable_count").await.unwrap().as_deref(), Some("1"));
    assert_eq!(stores.settings.get(NOTES, "theme").await.unwrap().as_deref(), Some("light"));
    assert_eq!(stores.images.list_keys(NOTES).await.unwrap(), vec!["logo".to_string()]);
    let tabs = stores.navigation.list().await.unwrap();
    assert!(tabs.iter().any(|t| t.id == tab_id(NOTES, "NotesTab")));

    app.manager().disable(NOTES).await.unwrap();
    assert_eq!(app.info(NOTES).await.state, InstanceState::Disabled);
    assert_eq!(stores.data.get(NOTES, "state").await.unwrap().as_deref(), Some("disabled"));

    app.manager().enable(NOTES).await.unwrap();
    assert_eq!(app.info(NOTES).await.state, InstanceState::Enabled);
    assert_eq!(stores.data.get(NOTES, "enable_count").await.unwrap().as_deref(), Some("2"));

    let outcome = app.manager().request_uninstall(NOTES).await;
    assert!(outcome.success, "{}", outcome.message);
    let info = app.info(NOTES).await;
    assert_eq!(info.state, InstanceState::Disabled);
    assert!(info.pending_delete);
    // Nothing is removed until the next start.
    assert!(app.plugin_dir(NOTES).is_dir());
    assert!(!stores.data.list_keys(NOTES).await.unwrap().is_empty());

    let err = app.manager().enable(NOTES).await.unwrap_err();
    assert_eq!(err.kind, dock_core::error::ErrorKind::InvalidOperation);

    app.restart().await;

    let stores = app.context.stores.clone();
    assert!(app.manager().records().await.unwrap().is_empty());
    assert!(app.manager().list_plugins().await.unwrap().is_empty());
    assert!(!app.plugin_dir(NOTES).exists());
    assert!(stores.data.list_keys(NOTES).await.unwrap().is_empty());
    assert!(stores.settings.list_keys(NOTES).await.unwrap().is_empty());
    assert!(stores.images.list_keys(NOTES).await.unwrap().is_empty());
    assert!(stores.navigation.list().await.unwrap().iter().all(|t| t.owner() != NOTES));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_uninstall_keeps_plugin_disabled() {
    let mut app = TestApp::new().await;
    let package = app.package("notes.zip", &manifest(NOTES, "1.0.0", "Notes"), &[]);
    assert!(app.manager().install(&package).await.success);

    assert!(app.manager().request_uninstall(NOTES).await.success);
    assert!(!app.manager().request_uninstall(NOTES).await.success);

    let outcome = app.manager().cancel_uninstall(NOTES).await;
    assert!(outcome.success, "{}", outcome.message);
    assert!(!app.manager().cancel_uninstall(NOTES).await.success);

    let info = app.info(NOTES).await;
    assert!(!info.pending_delete);
    assert_eq!(info.state, InstanceState::Disabled);

    app.restart().await;
    assert!(app.plugin_dir(NOTES).is_dir());
    let record = app.manager().records().await.unwrap().remove(0);
    assert_eq!(record.plugin_name, NOTES);
    assert!(!record.pending_delete);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_enabled_state_survives_restart() {
    let mut app = TestApp::new().await;
    let package = app.package("notes.zip", &manifest(NOTES, "1.0.0", "Notes"), &[]);
    assert!(app.manager().install(&package).await.success);
    app.manager().disable(NOTES).await.unwrap();

    app.restart().await;
    assert_eq!(app.info(NOTES).await.state, InstanceState::Initialized);

    app.manager().enable(NOTES).await.unwrap();
    app.restart().await;
    let stores = &app.context.stores;
    assert_eq!(app.info(NOTES).await.state, InstanceState::Enabled);
    assert_eq!(stores.data.get(NOTES, "all_loaded").await.unwrap().as_deref(), Some("true"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failing_enable_hook_still_enables() {
    let mut app = TestApp::new().await;
    let package = app.package("stubborn.zip", &manifest(STUBBORN, "1.0.0", "Stubborn"), &[]);

    let outcome = app.manager().install(&package).await;
    assert!(outcome.success, "{}", outcome.message);
    let info = app.info(STUBBORN).await;
    assert_eq!(info.state, InstanceState::Enabled);
    assert!(info.error_message.as_deref().unwrap().contains("refuses to start"));
    assert!(app.record(STUBBORN).await.is_enabled);

    app.manager().disable(STUBBORN).await.unwrap();
    assert_eq!(app.info(STUBBORN).await.state, InstanceState::Disabled);
    assert!(!app.record(STUBBORN).await.is_enabled);

    app.manager().enable(STUBBORN).await.unwrap();
    assert_eq!(app.info(STUBBORN).await.state, InstanceState::Enabled);
    assert!(app.record(STUBBORN).await.is_enabled);

    app.restart().await;
    assert_eq!(app.info(STUBBORN).await.state, InstanceState::Enabled);
    assert!(app.record(STUBBORN).await.is_enabled);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_plugin_operations() {
    let app = TestApp::new().await;
    let err = app.manager().enable("com.acme.missing").await.unwrap_err();
    assert_eq!(err.kind, dock_core::error::ErrorKind::NotFound);
    assert!(!app.manager().request_uninstall("com.acme.missing").await.success);
    assert!(!app.manager().cancel_update("com.acme.missing").await.success);
}
