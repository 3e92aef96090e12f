//! Plugin manager: lifecycle management for all plugins.
//!
//! Install, update and uninstall are two-phase: the request only touches
//! flags and staged files, and [`PluginManager::startup`] applies them
//! before any plugin is loaded. Transitions on one plugin are serialised
//! by a per-name lock.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use dock_core::config::PluginConfig;
use dock_core::error::AppError;
use dock_core::result::AppResult;
use dock_core::traits::{ToolDescriptor, ToolError, ToolParams};
use dock_database::repositories::PluginRecordRepository;
use dock_entity::plugin::{CreatePluginRecord, PluginRecord};
use dock_service::navigation::tab_id;
use dock_service::{PluginStores, PurgeReport};

use crate::api::DockPluginHost;
use crate::dependency;
use crate::instance::{PluginInstance, with_instance};
use crate::loader::PluginLoader;
use crate::manifest::{MANIFEST_FILE_NAME, PluginManifest};
use crate::outcome::{InstallOutcome, OperationOutcome, ToolOutcome};
use crate::package::{
    DirGuard, PackageLimits, StagingDir, copy_dir, extract_package_async, remove_dir_if_exists,
    replace_preserving_data,
};
use crate::registry::{PluginInfo, PluginRegistry};

/// Sub-directory of the staging root holding staged updates.
const UPDATES_DIR: &str = "updates";

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Holds a per-name lock. Dropping it releases the lock and removes the
/// map entry once no other caller holds or waits on it.
struct NameLock<'a> {
    locks: &'a LockMap,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> NameLock<'a> {
    fn new(locks: &'a LockMap, name: &str, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            locks,
            name: name.to_string(),
            guard: Some(guard),
        }
    }
}

impl Drop for NameLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.name, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// A plugin folder found on disk with a valid manifest.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    /// Parsed, validated manifest.
    pub manifest: PluginManifest,
    /// Plugin folder.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstallMode {
    Any,
    UpdateOnly,
}

/// Manages the full lifecycle of plugins: discover, load, enable, disable,
/// install, update, uninstall and unload.
pub struct PluginManager {
    config: PluginConfig,
    records: PluginRecordRepository,
    stores: PluginStores,
    loader: Arc<dyn PluginLoader>,
    registry: PluginRegistry,
    locks: LockMap,
}

impl PluginManager {
    /// Creates a new plugin manager.
    pub fn new(
        config: PluginConfig,
        pool: SqlitePool,
        stores: PluginStores,
        loader: Arc<dyn PluginLoader>,
    ) -> Self {
        Self {
            config,
            records: PluginRecordRepository::new(pool),
            stores,
            loader,
            registry: PluginRegistry::new(),
            locks: DashMap::new(),
        }
    }

    /// Plugin runtime configuration.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Loaded instances.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Persistent stores.
    pub fn stores(&self) -> &PluginStores {
        &self.stores
    }

    /// Folder of an installed plugin.
    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.config.plugin_root().join(name)
    }

    fn staged_update_dir(&self, name: &str) -> PathBuf {
        self.config.staging_root().join(UPDATES_DIR).join(name)
    }

    /// Wait for the per-name lock.
    async fn lock_name(&self, name: &str) -> NameLock<'_> {
        let mutex = self.locks.entry(name.to_string()).or_default().clone();
        let guard = mutex.lock_owned().await;
        NameLock::new(&self.locks, name, guard)
    }

    /// Take the per-name lock, or `None` if an operation holds it.
    fn try_lock_name(&self, name: &str) -> Option<NameLock<'_>> {
        let mutex = self.locks.entry(name.to_string()).or_default().clone();
        let guard = mutex.try_lock_owned().ok()?;
        Some(NameLock::new(&self.locks, name, guard))
    }

    // ── Startup / shutdown ───────────────────────────────────────────

    /// Apply staged updates, purge plugins marked for removal, then
    /// discover and load everything else.
    pub async fn startup(&self) -> AppResult<()> {
        let plugin_root = self.config.plugin_root();
        let staging_root = self.config.staging_root();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(plugin_root)?;
            std::fs::create_dir_all(staging_root.join(UPDATES_DIR))
        })
        .await
        .map_err(|e| AppError::internal(format!("Startup task failed: {e}")))??;

        let updated = self.process_pending_updates().await?;
        let purged = self.process_pending_deletes().await?;

        let loaded = if self.config.auto_load {
            self.load_discovered().await?
        } else {
            0
        };

        info!(updated, purged, loaded, "Plugin runtime started");
        Ok(())
    }

    /// Dispose every loaded instance.
    pub async fn shutdown(&self) {
        for (name, instance) in self.registry.drain().await {
            match with_instance(instance, |i| i.dispose()).await {
                Ok(failures) => {
                    for failure in failures {
                        warn!(plugin = %name, error = %failure, "Plugin hook failed during shutdown");
                    }
                }
                Err(e) => error!(plugin = %name, error = %e, "Error unloading plugin"),
            }
        }
        info!("All plugins unloaded");
    }

    // ── Discovery / loading ──────────────────────────────────────────

    /// Scan the plugin root for folders with a valid manifest. Invalid
    /// manifests and duplicate names are logged and skipped.
    pub async fn discover(&self) -> AppResult<Vec<DiscoveredPlugin>> {
        let root = self.config.plugin_root();
        tokio::task::spawn_blocking(move || discover_in(&root))
            .await
            .map_err(|e| AppError::internal(format!("Discovery task failed: {e}")))?
    }

    /// Discover plugins not yet loaded, resolve their dependencies and load
    /// them in dependency order. Returns how many loaded successfully.
    pub async fn load_discovered(&self) -> AppResult<usize> {
        let records: HashMap<String, PluginRecord> = self
            .records
            .find_all()
            .await?
            .into_iter()
            .map(|r| (r.plugin_name.clone(), r))
            .collect();

        let mut dirs = HashMap::new();
        let mut batch = Vec::new();
        for found in self.discover().await? {
            if self.registry.contains(&found.manifest.name).await {
                continue;
            }
            if records
                .get(&found.manifest.name)
                .is_some_and(|r| r.pending_delete)
            {
                debug!(plugin = %found.manifest.name, "Skipping plugin pending removal");
                continue;
            }
            dirs.insert(found.manifest.name.clone(), found.dir);
            batch.push(found.manifest);
        }

        let installed = self.installed_versions(&records).await;
        let resolution = dependency::resolve(&batch, &installed);
        let mut manifests: HashMap<String, PluginManifest> =
            batch.into_iter().map(|m| (m.name.clone(), m)).collect();

        for (name, err) in &resolution.failures {
            error!(plugin = %name, error = %err, "Plugin dependencies not satisfied");
            if let (Some(manifest), Some(dir)) = (manifests.remove(name), dirs.get(name)) {
                self.registry
                    .insert(PluginInstance::failed(manifest, dir, err.to_string()))
                    .await;
            }
        }

        let mut loaded = Vec::new();
        let mut failed: HashSet<String> = resolution.failures.keys().cloned().collect();
        for name in &resolution.order {
            let (Some(manifest), Some(dir)) = (manifests.remove(name), dirs.get(name)) else {
                continue;
            };

            if let Some(dependency) = manifest.dependencies.keys().find(|d| failed.contains(*d)) {
                let message = format!("Dependency '{dependency}' failed to load");
                error!(plugin = %name, dependency = %dependency, "Skipping plugin");
                self.registry
                    .insert(PluginInstance::failed(manifest, dir, message))
                    .await;
                failed.insert(name.clone());
                continue;
            }

            let enabled = match records.get(name) {
                Some(record) => record.is_enabled,
                None => {
                    self.records.create(&create_record(&manifest, true)).await?;
                    info!(plugin = %name, "Registered plugin found on disk");
                    true
                }
            };

            if self.load_instance(manifest, dir.clone(), enabled).await? {
                loaded.push(name.clone());
            } else {
                failed.insert(name.clone());
            }
        }

        for name in &loaded {
            if let Some(instance) = self.registry.get(name).await {
                if let Err(e) = with_instance(instance, |i| i.on_all_plugins_loaded()).await? {
                    warn!(plugin = %name, error = %e, "on_all_plugins_loaded failed");
                }
            }
        }

        Ok(loaded.len())
    }

    /// Load, initialize and optionally enable one plugin, then register
    /// it. Failures are recorded on the registered instance. Returns
    /// whether initialization succeeded.
    async fn load_instance(
        &self,
        manifest: PluginManifest,
        dir: PathBuf,
        enable: bool,
    ) -> AppResult<bool> {
        let instance = self.prepare_instance(manifest, dir, enable).await?;
        self.register_instance(instance).await
    }

    /// Load, initialize and optionally enable one plugin on the blocking
    /// pool without registering it. A failed load or initialization yields
    /// an inert instance carrying the error message.
    async fn prepare_instance(
        &self,
        manifest: PluginManifest,
        dir: PathBuf,
        enable: bool,
    ) -> AppResult<PluginInstance> {
        let host = Arc::new(DockPluginHost::new(
            &manifest,
            dir.clone(),
            self.stores.clone(),
            Handle::current(),
        ));
        let loader = self.loader.clone();

        tokio::task::spawn_blocking(move || {
            let mut instance = match PluginInstance::load(manifest.clone(), &dir, loader.as_ref()) {
                Ok(instance) => instance,
                Err(e) => {
                    error!(plugin = %manifest.name, error = %e, "Failed to load plugin");
                    return PluginInstance::failed(manifest, &dir, e.to_string());
                }
            };
            if instance.initialize(host).is_err() {
                // Keep the failure message, drop the half-initialized object.
                let message = instance.error_message.clone();
                instance.dispose();
                instance.error_message = message;
                return instance;
            }
            if enable {
                if let Err(e) = instance.enable() {
                    warn!(plugin = %instance.unique_name, error = %e, "Plugin enable hook failed");
                }
            }
            instance
        })
        .await
        .map_err(|e| AppError::internal(format!("Plugin load task failed: {e}")))
    }

    /// Register an instance and create its navigation tabs. Returns whether
    /// the instance is initialized.
    async fn register_instance(&self, instance: PluginInstance) -> AppResult<bool> {
        let name = instance.unique_name.clone();
        let initialized = instance.is_initialized();
        if initialized {
            let tabs: Vec<String> = instance.tabs().map(|t| tab_id(&name, &t.tab_class)).collect();
            for id in tabs {
                if let Err(e) = self.stores.navigation.get_or_create(&id).await {
                    warn!(plugin = %name, tab = %id, error = %e, "Failed to register navigation tab");
                }
            }
        }

        if let Some(previous) = self.registry.insert(instance).await {
            with_instance(previous, |i| i.dispose()).await?;
        }
        Ok(initialized)
    }

    async fn unload_instance(&self, name: &str) -> AppResult<()> {
        if let Some(instance) = self.registry.remove(name).await {
            for failure in with_instance(instance, |i| i.dispose()).await? {
                warn!(plugin = %name, error = %failure, "Plugin hook failed during unload");
            }
        }
        Ok(())
    }

    async fn installed_versions(
        &self,
        records: &HashMap<String, PluginRecord>,
    ) -> HashMap<String, String> {
        let mut versions = HashMap::new();
        for (name, _) in self.registry.all().await {
            if let Some(record) = records.get(&name) {
                versions.insert(name, record.version.clone());
            }
        }
        versions
    }

    // ── Enable / disable ─────────────────────────────────────────────

    /// Enable a plugin, reloading it from disk if it is not loaded. Hook
    /// failures are logged and kept on the instance; the plugin ends up
    /// enabled either way.
    pub async fn enable(&self, name: &str) -> AppResult<()> {
        let _lock = self.lock_name(name).await;

        let record = self.require_record(name).await?;
        if record.pending_delete {
            return Err(AppError::invalid_operation(format!(
                "Plugin '{name}' is pending uninstall"
            )));
        }
        self.records.set_enabled(name, true).await?;

        let loaded = match self.registry.get(name).await {
            Some(instance) => with_instance(instance.clone(), |i| i.is_loaded().then_some(()))
                .await?
                .map(|_| instance),
            None => None,
        };

        match loaded {
            Some(instance) => {
                if let Err(e) = with_instance(instance, |i| i.enable()).await? {
                    warn!(plugin = %name, error = %e, "Plugin enable hook failed");
                }
                Ok(())
            }
            None => {
                let dir = self.plugin_dir(name);
                let manifest_path = dir.join(MANIFEST_FILE_NAME);
                let manifest = tokio::task::spawn_blocking(move || {
                    let manifest = PluginManifest::from_file(&manifest_path)?;
                    manifest.validate()?;
                    Ok::<_, crate::error::ManifestError>(manifest)
                })
                .await
                .map_err(|e| AppError::internal(format!("Manifest task failed: {e}")))??;

                if self.load_instance(manifest, dir, true).await? {
                    Ok(())
                } else {
                    let message = match self.registry.get(name).await {
                        Some(instance) => with_instance(instance, |i| i.error_message.clone())
                            .await?
                            .unwrap_or_default(),
                        None => String::new(),
                    };
                    Err(AppError::plugin(format!(
                        "Plugin '{name}' failed to load: {message}"
                    )))
                }
            }
        }
    }

    /// Disable a plugin. Hook failures are logged; the plugin ends up
    /// disabled either way.
    pub async fn disable(&self, name: &str) -> AppResult<()> {
        let _lock = self.lock_name(name).await;

        self.require_record(name).await?;
        self.records.set_enabled(name, false).await?;
        self.disable_instance(name).await
    }

    async fn disable_instance(&self, name: &str) -> AppResult<()> {
        if let Some(instance) = self.registry.get(name).await {
            if let Err(e) = with_instance(instance, |i| i.disable()).await? {
                warn!(plugin = %name, error = %e, "Plugin disable hook failed");
            }
        }
        Ok(())
    }

    async fn require_record(&self, name: &str) -> AppResult<PluginRecord> {
        self.records
            .find_by_name(name)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Plugin '{name}' is not installed")))
    }

    // ── Install / update ─────────────────────────────────────────────

    /// Install a plugin package. A new plugin is loaded and enabled right
    /// away; a different version of an installed plugin is staged as a
    /// pending update applied at next startup.
    pub async fn install(&self, archive: &Path) -> InstallOutcome {
        self.install_package(archive, InstallMode::Any).await
    }

    /// Stage an update from a package. Fails unless the plugin is
    /// installed with a different version.
    pub async fn request_update(&self, archive: &Path) -> InstallOutcome {
        self.install_package(archive, InstallMode::UpdateOnly).await
    }

    async fn install_package(&self, archive: &Path, mode: InstallMode) -> InstallOutcome {
        let staging = match StagingDir::create(&self.config.staging_root(), "install") {
            Ok(staging) => staging,
            Err(e) => {
                error!(error = %e, "Failed to create staging directory");
                return InstallOutcome::fail(None, format!("Cannot prepare installation: {e}"));
            }
        };

        let limits = PackageLimits::from(&self.config);
        if let Err(e) =
            extract_package_async(archive.to_path_buf(), staging.path().to_path_buf(), limits)
                .await
        {
            warn!(archive = %archive.display(), error = %e, "Rejected plugin package");
            return InstallOutcome::fail(None, format!("Invalid plugin package: {e}"));
        }

        let manifest = match PluginManifest::from_file(&staging.path().join(MANIFEST_FILE_NAME))
            .and_then(|m| m.validate().map(|()| m))
        {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(archive = %archive.display(), error = %e, "Rejected plugin manifest");
                return InstallOutcome::fail(None, format!("Invalid plugin manifest: {e}"));
            }
        };
        let name = manifest.name.clone();

        let Some(_lock) = self.try_lock_name(&name) else {
            return InstallOutcome::fail(
                Some(&name),
                format!("An operation on '{name}' is already in progress"),
            );
        };

        let existing = match self.records.find_by_name(&name).await {
            Ok(existing) => existing,
            Err(e) => return InstallOutcome::fail(Some(&name), e.to_string()),
        };

        let outcome = match (existing, mode) {
            (Some(record), _) if record.version == manifest.version => InstallOutcome::fail(
                Some(&name),
                format!("Plugin '{name}' version {} is already installed", record.version),
            ),
            (Some(record), _) if record.pending_delete => InstallOutcome::fail(
                Some(&name),
                format!("Plugin '{name}' is pending uninstall; restart first"),
            ),
            (Some(record), _) => self.stage_update(&record, &manifest, staging.path()).await,
            (None, InstallMode::UpdateOnly) => InstallOutcome::fail(
                Some(&name),
                format!("Plugin '{name}' is not installed"),
            ),
            (None, InstallMode::Any) => self.install_new(manifest, staging.path()).await,
        };

        if outcome.success {
            info!(plugin = %name, message = %outcome.message, "Plugin package accepted");
        } else {
            warn!(plugin = %name, message = %outcome.message, "Plugin package rejected");
        }
        outcome
    }

    async fn stage_update(
        &self,
        record: &PluginRecord,
        manifest: &PluginManifest,
        extracted: &Path,
    ) -> InstallOutcome {
        let name = record.plugin_name.as_str();
        let staged = self.staged_update_dir(name);
        let source = extracted.to_path_buf();
        let target = staged.clone();
        let copied = tokio::task::spawn_blocking(move || {
            remove_dir_if_exists(&target)?;
            copy_dir(&source, &target)
        })
        .await;

        let failure = match copied {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = failure {
            return InstallOutcome::fail(Some(name), format!("Failed to stage update: {reason}"));
        }

        if let Err(e) = self
            .records
            .set_pending_update(name, Some(&manifest.version))
            .await
        {
            let _ = remove_dir_if_exists(&staged);
            return InstallOutcome::fail(Some(name), e.to_string());
        }

        InstallOutcome::ok(
            name,
            format!(
                "Update of '{}' from {} to {} staged; restart to apply",
                manifest.effective_display_name(),
                record.version,
                manifest.version
            ),
        )
    }

    async fn install_new(&self, manifest: PluginManifest, extracted: &Path) -> InstallOutcome {
        let name = manifest.name.clone();
        if self.registry.contains(&name).await {
            return InstallOutcome::fail(Some(&name), format!("Plugin '{name}' is already loaded"));
        }

        let installed = match self.records.find_all().await {
            Ok(records) => records
                .into_iter()
                .filter(|r| !r.pending_delete)
                .map(|r| (r.plugin_name, r.version))
                .collect::<HashMap<_, _>>(),
            Err(e) => return InstallOutcome::fail(Some(&name), e.to_string()),
        };
        let resolution = dependency::resolve(std::slice::from_ref(&manifest), &installed);
        if let Some(err) = resolution.failures.get(&name) {
            return InstallOutcome::fail(Some(&name), err.to_string());
        }

        // Removes the copied folder unless the install completes, including
        // when this future is dropped part way.
        let target = self.plugin_dir(&name);
        let folder = DirGuard::new(target.clone());
        let source = extracted.to_path_buf();
        let dest = target.clone();
        let copied = tokio::task::spawn_blocking(move || {
            remove_dir_if_exists(&dest)?;
            copy_dir(&source, &dest)
        })
        .await;
        if !matches!(copied, Ok(Ok(()))) {
            return InstallOutcome::fail(Some(&name), "Failed to copy plugin files");
        }

        let record = create_record(&manifest, true);
        let display = manifest.effective_display_name().to_string();
        let version = manifest.version.clone();

        let instance = match self.prepare_instance(manifest, target, true).await {
            Ok(instance) => instance,
            Err(e) => {
                return InstallOutcome::fail(Some(&name), format!("Failed to load plugin: {e}"));
            }
        };
        if !instance.is_initialized() {
            let reason = instance
                .error_message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            return InstallOutcome::fail(Some(&name), format!("Failed to load plugin: {reason}"));
        }

        // The record and the folder are committed together on a detached
        // task so a dropped install cannot keep one without the other.
        let records = self.records.clone();
        let committed = tokio::spawn(async move {
            let created = records.create(&record).await;
            if created.is_ok() {
                folder.keep();
            }
            created
        })
        .await
        .map_err(|e| AppError::internal(format!("Install task failed: {e}")))
        .and_then(|created| created);
        if let Err(e) = committed {
            let mut instance = instance;
            let _ = tokio::task::spawn_blocking(move || instance.dispose()).await;
            return InstallOutcome::fail(Some(&name), e.to_string());
        }

        if let Err(e) = self.register_instance(instance).await {
            warn!(plugin = %name, error = %e, "Failed to dispose replaced instance");
        }

        InstallOutcome::ok(&name, format!("Plugin '{display}' {version} installed"))
    }

    /// Discard a staged update.
    pub async fn cancel_update(&self, name: &str) -> OperationOutcome {
        let _lock = self.lock_name(name).await;

        match self.records.find_by_name(name).await {
            Ok(Some(record)) if record.pending_update => {}
            Ok(Some(_)) => return OperationOutcome::fail(format!("Plugin '{name}' has no pending update")),
            Ok(None) => return OperationOutcome::fail(format!("Plugin '{name}' is not installed")),
            Err(e) => return OperationOutcome::fail(e.to_string()),
        }

        let staged = self.staged_update_dir(name);
        if let Err(e) = tokio::task::spawn_blocking(move || remove_dir_if_exists(&staged))
            .await
            .map_err(|e| AppError::internal(e.to_string()))
            .and_then(|r| r.map_err(AppError::from))
        {
            warn!(plugin = %name, error = %e, "Failed to remove staged update");
        }
        if let Err(e) = self.records.set_pending_update(name, None).await {
            return OperationOutcome::fail(e.to_string());
        }
        info!(plugin = %name, "Pending update cancelled");
        OperationOutcome::ok(format!("Pending update of '{name}' cancelled"))
    }

    /// Replace each plugin folder that has a staged update, keeping its
    /// `Data/` folder. A missing staged folder cancels the update; other
    /// failures leave the flags set for the next start.
    pub async fn process_pending_updates(&self) -> AppResult<usize> {
        let mut applied = 0;
        for record in self.records.find_pending_update().await? {
            let name = record.plugin_name.clone();
            let _lock = self.lock_name(&name).await;

            match self.apply_update(&record).await {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(e) => error!(plugin = %name, error = %e, "Failed to apply pending update"),
            }
        }
        Ok(applied)
    }

    async fn apply_update(&self, record: &PluginRecord) -> AppResult<bool> {
        let name = record.plugin_name.as_str();
        let staged = self.staged_update_dir(name);

        if !staged.join(MANIFEST_FILE_NAME).is_file() {
            warn!(plugin = %name, "Staged update missing, cancelling");
            self.records.set_pending_update(name, None).await?;
            return Ok(false);
        }

        let manifest = PluginManifest::from_file(&staged.join(MANIFEST_FILE_NAME))?;
        manifest.validate()?;
        if manifest.name != name {
            return Err(AppError::validation(format!(
                "Staged update for '{name}' contains plugin '{}'",
                manifest.name
            )));
        }

        self.unload_instance(name).await?;

        let target = self.plugin_dir(name);
        let source = staged.clone();
        tokio::task::spawn_blocking(move || replace_preserving_data(&target, &source))
            .await
            .map_err(|e| AppError::internal(format!("Update task failed: {e}")))??;

        self.records
            .complete_update(
                name,
                &manifest.version,
                manifest.effective_display_name(),
                manifest.description.as_deref(),
                manifest.author.as_deref(),
            )
            .await?;

        if let Err(e) = remove_dir_if_exists(&staged) {
            warn!(plugin = %name, error = %e, "Failed to remove applied update");
        }
        info!(
            plugin = %name,
            from = %record.version,
            to = %manifest.version,
            "Pending update applied"
        );
        Ok(true)
    }

    // ── Uninstall ────────────────────────────────────────────────────

    /// Disable a plugin and mark it for removal at next startup.
    pub async fn request_uninstall(&self, name: &str) -> OperationOutcome {
        let _lock = self.lock_name(name).await;

        match self.records.find_by_name(name).await {
            Ok(Some(record)) if record.pending_delete => {
                return OperationOutcome::fail(format!("Plugin '{name}' is already pending uninstall"));
            }
            Ok(Some(_)) => {}
            Ok(None) => return OperationOutcome::fail(format!("Plugin '{name}' is not installed")),
            Err(e) => return OperationOutcome::fail(e.to_string()),
        }

        if let Err(e) = self.disable_instance(name).await {
            warn!(plugin = %name, error = %e, "Failed to disable plugin before uninstall");
        }
        if let Err(e) = self.records.set_pending_delete(name, true).await {
            return OperationOutcome::fail(e.to_string());
        }
        info!(plugin = %name, "Plugin marked for uninstall");
        OperationOutcome::ok(format!("Plugin '{name}' will be removed on next restart"))
    }

    /// Clear a pending uninstall. The plugin stays disabled.
    pub async fn cancel_uninstall(&self, name: &str) -> OperationOutcome {
        let _lock = self.lock_name(name).await;

        match self.records.find_by_name(name).await {
            Ok(Some(record)) if record.pending_delete => {}
            Ok(Some(_)) => {
                return OperationOutcome::fail(format!("Plugin '{name}' is not pending uninstall"));
            }
            Ok(None) => return OperationOutcome::fail(format!("Plugin '{name}' is not installed")),
            Err(e) => return OperationOutcome::fail(e.to_string()),
        }

        if let Err(e) = self.records.set_pending_delete(name, false).await {
            return OperationOutcome::fail(e.to_string());
        }
        info!(plugin = %name, "Pending uninstall cancelled");
        OperationOutcome::ok(format!("Uninstall of '{name}' cancelled"))
    }

    /// Purge every plugin marked for removal. One failure does not stop
    /// the others; the failed plugin keeps its flag.
    pub async fn process_pending_deletes(&self) -> AppResult<usize> {
        let mut purged = 0;
        for record in self.records.find_pending_delete().await? {
            let name = record.plugin_name.clone();
            let _lock = self.lock_name(&name).await;

            match self.purge_plugin(&name).await {
                Ok(report) => {
                    purged += 1;
                    info!(plugin = %name, ?report, "Plugin uninstalled");
                }
                Err(e) => error!(plugin = %name, error = %e, "Failed to uninstall plugin"),
            }
        }
        Ok(purged)
    }

    async fn purge_plugin(&self, name: &str) -> AppResult<PurgeReport> {
        self.unload_instance(name).await?;
        let report = self.stores.purge(name).await?;

        let plugin_dir = self.plugin_dir(name);
        let staged = self.staged_update_dir(name);
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            remove_dir_if_exists(&plugin_dir)?;
            remove_dir_if_exists(&staged)
        })
        .await
        .map_err(|e| AppError::internal(format!("Uninstall task failed: {e}")))??;

        self.records.delete(name).await?;
        Ok(report)
    }

    // ── Tools / listing ──────────────────────────────────────────────

    /// Call a tool on an enabled plugin and record statistics.
    pub async fn invoke_tool(&self, plugin: &str, tool: &str, params: ToolParams) -> ToolOutcome {
        let Some(instance) = self.registry.get(plugin).await else {
            return ToolOutcome::Error {
                error: ToolError::Unavailable {
                    reason: format!("plugin '{plugin}' is not loaded"),
                },
            };
        };

        let started = Instant::now();
        let tool_name = tool.to_string();
        let result = with_instance(instance, move |i| i.invoke_tool(&tool_name, &params))
            .await
            .unwrap_or_else(|e| Err(ToolError::Failed { message: e.to_string() }));
        let elapsed = started.elapsed();

        let counted = !matches!(
            result,
            Err(ToolError::UnknownTool { .. } | ToolError::Unavailable { .. })
        );
        if counted {
            if let Err(e) = self
                .stores
                .tools
                .record(plugin, tool, result.is_ok(), elapsed)
                .await
            {
                warn!(plugin = %plugin, tool = %tool, error = %e, "Failed to record tool statistics");
            }
        }

        match result {
            Ok(output) => {
                debug!(plugin = %plugin, tool = %tool, ?elapsed, "Tool invoked");
                ToolOutcome::Success {
                    output,
                    duration_ms: elapsed.as_secs_f64() * 1000.0,
                }
            }
            Err(error) => {
                warn!(plugin = %plugin, tool = %tool, error = %error, "Tool invocation failed");
                ToolOutcome::Error { error }
            }
        }
    }

    /// Tools offered by enabled plugins, keyed by plugin name.
    pub async fn available_tools(&self) -> AppResult<Vec<(String, ToolDescriptor)>> {
        let mut tools = Vec::new();
        for (name, instance) in self.registry.all().await {
            let offered = with_instance(instance, |i| {
                if i.is_enabled() {
                    i.tools().cloned().collect()
                } else {
                    Vec::new()
                }
            })
            .await?;
            tools.extend(offered.into_iter().map(|t| (name.clone(), t)));
        }
        Ok(tools)
    }

    /// Snapshot of every registered plugin, with record flags.
    pub async fn list_plugins(&self) -> AppResult<Vec<PluginInfo>> {
        let records: HashMap<String, PluginRecord> = self
            .records
            .find_all()
            .await?
            .into_iter()
            .map(|r| (r.plugin_name.clone(), r))
            .collect();

        let mut infos = Vec::new();
        for (name, instance) in self.registry.all().await {
            let record = records.get(&name).cloned();
            infos.push(with_instance(instance, move |i| PluginInfo::new(i, record.as_ref())).await?);
        }
        Ok(infos)
    }

    /// Installed plugin records.
    pub async fn records(&self) -> AppResult<Vec<PluginRecord>> {
        self.records.find_all().await
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

fn create_record(manifest: &PluginManifest, is_enabled: bool) -> CreatePluginRecord {
    CreatePluginRecord {
        plugin_name: manifest.name.clone(),
        display_name: manifest.effective_display_name().to_string(),
        version: manifest.version.clone(),
        description: manifest.description.clone(),
        author: manifest.author.clone(),
        is_enabled,
    }
}

fn discover_in(root: &Path) -> AppResult<Vec<DiscoveredPlugin>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.join(MANIFEST_FILE_NAME).is_file())
        .collect();
    dirs.sort();

    let mut seen = BTreeSet::new();
    let mut found = Vec::new();
    for dir in dirs {
        let manifest = match PluginManifest::from_file(&dir.join(MANIFEST_FILE_NAME))
            .and_then(|m| m.validate().map(|()| m))
        {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Skipping plugin with invalid manifest");
                continue;
            }
        };
        if !seen.insert(manifest.name.clone()) {
            warn!(plugin = %manifest.name, path = %dir.display(), "Skipping duplicate plugin");
            continue;
        }
        found.push(DiscoveredPlugin { manifest, dir });
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_name_lock_entry_removed_when_released() {
        let locks = LockMap::new();
        let mutex = locks.entry("com.test.a".to_string()).or_default().clone();
        let first = NameLock::new(&locks, "com.test.a", mutex.lock_owned().await);

        let waiting = locks.entry("com.test.a".to_string()).or_default().clone();
        assert!(waiting.clone().try_lock_owned().is_err());
        drop(first);
        assert!(locks.contains_key("com.test.a"));

        let second = NameLock::new(&locks, "com.test.a", waiting.lock_owned().await);
        drop(second);
        assert!(locks.is_empty());
    }
}
