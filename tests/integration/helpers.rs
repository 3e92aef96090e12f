//! Shared test helpers for integration tests.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use dock_core::config::AppConfig;
use dock_core::traits::{
    Capability, DockPlugin, PluginHost, SettingsUiDescriptor, TabContribution, ToolDescriptor,
    ToolError, ToolParameter, ToolParams,
};
use dock_database::DatabasePool;
use dock_database::migration::run_migrations;
use dock_entity::plugin::PluginRecord;
use dock_plugin::registry::PluginInfo;
use dock_plugin::{DockContext, PluginManager, StaticPluginLoader};

pub const NOTES: &str = "com.acme.notes";
pub const CORE: &str = "com.acme.core";
pub const READER: &str = "com.acme.reader";
pub const STUBBORN: &str = "com.acme.stubborn";
pub const SLOW: &str = "com.acme.slow";

/// Test application context
pub struct TestApp {
    /// Scratch directory holding plugins, staging and packages
    pub root: TempDir,
    /// Shared database, survives restarts
    pub db: DatabasePool,
    /// Current context
    pub context: DockContext,
}

impl TestApp {
    /// Create a new test application and run startup
    pub async fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let db = DatabasePool::in_memory().await.unwrap();
        run_migrations(db.pool()).await.unwrap();

        let context = Self::build_context(root.path(), db.clone());
        context.manager.startup().await.unwrap();
        Self { root, db, context }
    }

    fn build_context(root: &Path, db: DatabasePool) -> DockContext {
        let mut config = AppConfig::default();
        config.plugins.directory = root.join("plugins").to_string_lossy().into_owned();
        config.plugins.staging_directory = root.join("staging").to_string_lossy().into_owned();
        config.plugins.max_package_bytes = 1024 * 1024;
        DockContext::new(config, db, Arc::new(test_loader()))
    }

    /// Simulate an application restart over the same database and folders
    pub async fn restart(&mut self) {
        self.context.manager.shutdown().await;
        self.context = Self::build_context(self.root.path(), self.db.clone());
        self.context.manager.startup().await.unwrap();
    }

    /// The plugin manager
    pub fn manager(&self) -> &PluginManager {
        &self.context.manager
    }

    /// Folder of an installed plugin
    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.context.manager.plugin_dir(name)
    }

    /// Build a package zip from a manifest, the library and extra files
    pub fn package(&self, file_name: &str, manifest: &Value, extra: &[(&str, &[u8])]) -> PathBuf {
        let path = self.root.path().join(file_name);
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        writer.start_file("plugin.json", options).unwrap();
        writer
            .write_all(serde_json::to_string_pretty(manifest).unwrap().as_bytes())
            .unwrap();
        if let Some(main) = manifest["main"].as_str() {
            writer.start_file(main, options).unwrap();
            writer.write_all(b"\x7fELF").unwrap();
        }
        for (name, data) in extra {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    /// Place a plugin folder directly into the plugin root
    pub fn place_folder(&self, manifest: &Value) {
        let name = manifest["name"].as_str().unwrap();
        let dir = self.plugin_dir(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("plugin.json"),
            serde_json::to_string_pretty(manifest).unwrap(),
        )
        .unwrap();
        if let Some(main) = manifest["main"].as_str() {
            std::fs::write(dir.join(main), b"\x7fELF").unwrap();
        }
    }

    /// Snapshot of one plugin
    pub async fn info(&self, name: &str) -> PluginInfo {
        self.manager()
            .list_plugins()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.unique_name == name)
            .unwrap_or_else(|| panic!("plugin {name} not listed"))
    }

    /// Persisted record of one plugin
    pub async fn record(&self, name: &str) -> PluginRecord {
        self.manager()
            .records()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.plugin_name == name)
            .unwrap_or_else(|| panic!("plugin {name} has no record"))
    }
}

/// Library file name for the current platform
pub fn library(stem: &str) -> String {
    format!("{stem}.{}", std::env::consts::DLL_EXTENSION)
}

/// A manifest for one of the test plugins
pub fn manifest(name: &str, version: &str, entry_class: &str) -> Value {
    json!({
        "name": name,
        "displayName": entry_class,
        "version": version,
        "description": "integration test plugin",
        "author": "Dock Team",
        "main": library(entry_class),
        "entryClass": entry_class,
    })
}

/// Loader with every test plugin registered
pub fn test_loader() -> StaticPluginLoader {
    StaticPluginLoader::new()
        .with("Notes", || Box::new(NotesPlugin::default()))
        .with("Core", || Box::new(CorePlugin::default()))
        .with("Reader", || Box::new(ReaderPlugin::default()))
        .with("Broken", || Box::new(BrokenPlugin))
        .with("Stubborn", || Box::new(StubbornPlugin))
        .with("Slow", || Box::new(SlowPlugin::new()))
}

/// Notes plugin: one tab, a settings page and three tools
#[derive(Default)]
pub struct NotesPlugin {
    host: Option<Arc<dyn PluginHost>>,
}

impl NotesPlugin {
    fn host(&self) -> anyhow::Result<&Arc<dyn PluginHost>> {
        self.host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("not initialized"))
    }
}

impl DockPlugin for NotesPlugin {
    fn capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::Tabs(vec![TabContribution {
                tab_class: "NotesTab".to_string(),
                display_name: "Notes".to_string(),
                icon: "note".to_string(),
            }]),
            Capability::SettingsUi(SettingsUiDescriptor {
                title: "Notes".to_string(),
                description: None,
            }),
            Capability::Tools(vec![
                ToolDescriptor {
                    name: "add_note".to_string(),
                    description: "Store a note".to_string(),
                    parameters: vec![ToolParameter {
                        name: "text".to_string(),
                        description: "Note text".to_string(),
                        required: true,
                    }],
                },
                ToolDescriptor {
                    name: "count_notes".to_string(),
                    description: "Count stored notes".to_string(),
                    parameters: Vec::new(),
                },
                ToolDescriptor {
                    name: "crash".to_string(),
                    description: "Always panics".to_string(),
                    parameters: Vec::new(),
                },
            ]),
        ]
    }

    fn initialize(&mut self, host: Arc<dyn PluginHost>) -> anyhow::Result<()> {
        if host.get_setting("theme")?.is_none() {
            host.set_setting("theme", "light", Some("Colour theme"))?;
        }
        host.save_image("logo", b"\x89PNG")?;
        self.host = Some(host);
        Ok(())
    }

    fn on_all_plugins_loaded(&mut self) -> anyhow::Result<()> {
        self.host()?.set_value("all_loaded", "true")?;
        Ok(())
    }

    fn on_enable(&mut self) -> anyhow::Result<()> {
        let host = self.host()?;
        let count: u32 = host
            .get_value("enable_count")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        host.set_value("enable_count", &(count + 1).to_string())?;
        Ok(())
    }

    fn on_disable(&mut self) -> anyhow::Result<()> {
        self.host()?.set_value("state", "disabled")?;
        Ok(())
    }

    fn invoke_tool(&mut self, tool: &str, params: &ToolParams) -> Result<String, ToolError> {
        let host = self.host().map_err(|e| ToolError::Failed {
            message: e.to_string(),
        })?;
        let failed = |e: dock_core::AppError| ToolError::Failed {
            message: e.to_string(),
        };
        match tool {
            "add_note" => {
                let text = params.get("text").cloned().unwrap_or_default();
                let n = host.value_keys().map_err(failed)?.len();
                host.set_value(&format!("note:{n}"), &text).map_err(failed)?;
                Ok(format!("note:{n}"))
            }
            "count_notes" => {
                let keys = host.value_keys().map_err(failed)?;
                Ok(keys.iter().filter(|k| k.starts_with("note:")).count().to_string())
            }
            "crash" => panic!("notes crashed"),
            other => Err(ToolError::UnknownTool {
                tool: other.to_string(),
            }),
        }
    }
}

/// Dependency target: publishes a value other plugins read
#[derive(Default)]
pub struct CorePlugin {
    host: Option<Arc<dyn PluginHost>>,
}

impl DockPlugin for CorePlugin {
    fn initialize(&mut self, host: Arc<dyn PluginHost>) -> anyhow::Result<()> {
        self.host = Some(host);
        Ok(())
    }

    fn on_init(&mut self) -> anyhow::Result<()> {
        if let Some(host) = &self.host {
            host.set_value("core_ready", "1")?;
        }
        Ok(())
    }
}

/// Depends on core; records what it could read through the host
#[derive(Default)]
pub struct ReaderPlugin {
    host: Option<Arc<dyn PluginHost>>,
}

impl DockPlugin for ReaderPlugin {
    fn initialize(&mut self, host: Arc<dyn PluginHost>) -> anyhow::Result<()> {
        self.host = Some(host);
        Ok(())
    }

    fn on_init(&mut self) -> anyhow::Result<()> {
        let Some(host) = &self.host else {
            anyhow::bail!("not initialized");
        };
        let seen = host.dependency_value(CORE, "core_ready")?.unwrap_or_default();
        host.set_value("core_seen", &seen)?;

        let undeclared = match host.dependency_value(NOTES, "enable_count") {
            Ok(_) => "allowed".to_string(),
            Err(e) => e.kind.to_string(),
        };
        host.set_value("undeclared", &undeclared)?;
        Ok(())
    }
}

/// Fails during initialization
pub struct BrokenPlugin;

impl DockPlugin for BrokenPlugin {
    fn initialize(&mut self, _host: Arc<dyn PluginHost>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_init(&mut self) -> anyhow::Result<()> {
        anyhow::bail!("broken on purpose")
    }
}

/// Fails every enable
pub struct StubbornPlugin;

impl DockPlugin for StubbornPlugin {
    fn initialize(&mut self, _host: Arc<dyn PluginHost>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_enable(&mut self) -> anyhow::Result<()> {
        anyhow::bail!("refuses to start")
    }
}

/// Takes a while to construct
pub struct SlowPlugin;

impl SlowPlugin {
    pub fn new() -> Self {
        std::thread::sleep(Duration::from_millis(800));
        Self
    }
}

impl DockPlugin for SlowPlugin {
    fn initialize(&mut self, _host: Arc<dyn PluginHost>) -> anyhow::Result<()> {
        Ok(())
    }
}
