//! Tool invocation and statistics.

use std::collections::HashMap;

use dock_core::traits::{ToolError, ToolParams};
use dock_plugin::ToolOutcome;

use crate::helpers::{NOTES, TestApp, manifest};

fn params(pairs: &[(&str, &str)]) -> ToolParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<HashMap<_, _>>()
}

async fn app_with_notes() -> TestApp {
    let app = TestApp::new().await;
    let package = app.package("notes.zip", &manifest(NOTES, "1.0.0", "Notes"), &[]);
    assert!(app.manager().install(&package).await.success);
    app
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tools_run_and_are_counted() {
    let app = app_with_notes().await;
    let manager = app.manager();

    for text in ["first", "second"] {
        let outcome = manager
            .invoke_tool(NOTES, "add_note", params(&[("text", text)]))
            .await;
        assert!(outcome.is_success(), "{outcome:?}");
    }
    match manager.invoke_tool(NOTES, "count_notes", ToolParams::new()).await {
        ToolOutcome::Success { output, .. } => assert_eq!(output, "2"),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let stats = app.context.stores.tools.get(NOTES, "add_note").await.unwrap().unwrap();
    assert_eq!(stats.call_count, 2);
    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.failure_count, 0);
    assert!(stats.average_duration_ms >= 0.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tool_failures() {
    let app = app_with_notes().await;
    let manager = app.manager();

    let outcome = manager.invoke_tool(NOTES, "add_note", ToolParams::new()).await;
    assert!(matches!(
        outcome,
        ToolOutcome::Error { error: ToolError::InvalidParameter { ref name, .. } } if name == "text"
    ));

    let outcome = manager.invoke_tool(NOTES, "nope", ToolParams::new()).await;
    assert!(matches!(outcome, ToolOutcome::Error { error: ToolError::UnknownTool { .. } }));
    assert!(app.context.stores.tools.get(NOTES, "nope").await.unwrap().is_none());

    let outcome = manager.invoke_tool(NOTES, "crash", ToolParams::new()).await;
    assert!(matches!(outcome, ToolOutcome::Error { error: ToolError::Panicked { .. } }));
    let stats = app.context.stores.tools.get(NOTES, "crash").await.unwrap().unwrap();
    assert_eq!(stats.failure_count, 1);

    // A panicking tool does not take the plugin down.
    assert!(manager
        .invoke_tool(NOTES, "count_notes", ToolParams::new())
        .await
        .is_success());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disabled_plugin_offers_no_tools() {
    let app = app_with_notes().await;
    let manager = app.manager();
    assert_eq!(manager.available_tools().await.unwrap().len(), 3);

    manager.disable(NOTES).await.unwrap();
    assert!(manager.available_tools().await.unwrap().is_empty());
    let outcome = manager.invoke_tool(NOTES, "count_notes", ToolParams::new()).await;
    assert!(matches!(outcome, ToolOutcome::Error { error: ToolError::Unavailable { .. } }));

    let outcome = manager.invoke_tool("com.acme.missing", "x", ToolParams::new()).await;
    assert!(matches!(outcome, ToolOutcome::Error { error: ToolError::Unavailable { .. } }));
}
