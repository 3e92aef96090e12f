//! Plugin package handling: zip extraction into staging and folder
//! replacement that keeps a plugin's `Data/` directory.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;
use zip::ZipArchive;

use dock_core::config::PluginConfig;

use crate::error::PackageError;
use crate::manifest::MANIFEST_FILE_NAME;

/// Name of the per-plugin data folder kept across updates.
pub const DATA_DIR_NAME: &str = "Data";

/// Copy buffer size (64 KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Size and entry limits applied while extracting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageLimits {
    /// Maximum total uncompressed bytes.
    pub max_bytes: u64,
    /// Maximum archive entries.
    pub max_entries: usize,
}

impl From<&PluginConfig> for PackageLimits {
    fn from(config: &PluginConfig) -> Self {
        Self {
            max_bytes: config.max_package_bytes,
            max_entries: config.max_package_entries,
        }
    }
}

/// A scratch directory removed on drop.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create a unique directory under `root`.
    pub fn create(root: &Path, prefix: &str) -> std::io::Result<Self> {
        let path = root.join(format!("{prefix}__{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// The directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove staging directory");
            }
        }
    }
}

/// Removes a directory tree on drop unless [`keep`](Self::keep) is called.
#[derive(Debug)]
pub struct DirGuard {
    path: Option<PathBuf>,
}

impl DirGuard {
    /// Guard `path`.
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Keep the directory.
    pub fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = remove_dir_if_exists(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove directory");
            }
        }
    }
}

/// Extract `archive` into `dest`, which must exist. Entries escaping
/// `dest` are skipped. Fails if the package has no manifest at its root.
pub fn extract_package(
    archive: &Path,
    dest: &Path,
    limits: PackageLimits,
) -> Result<(), PackageError> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;

    if zip.len() > limits.max_entries {
        return Err(PackageError::TooManyEntries {
            count: zip.len(),
            limit: limits.max_entries,
        });
    }

    let mut total_size = 0u64;
    let mut buffer = vec![0u8; BUFFER_SIZE];

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;

        let enclosed_name = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                warn!(entry = %entry.name(), "Skipping package entry outside the archive root");
                continue;
            }
        };
        let out_path = dest.join(&enclosed_name);

        total_size = charge_size(total_size, entry.size(), limits)?;

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Declared sizes can lie; count what is actually written.
        let mut written = 0u64;
        let mut outfile = File::create(&out_path)?;
        loop {
            let n = entry.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            written += n as u64;
            if total_size.saturating_sub(entry.size()).saturating_add(written) > limits.max_bytes {
                return Err(PackageError::TooLarge {
                    limit: limits.max_bytes,
                });
            }
            outfile.write_all(&buffer[..n])?;
        }
    }

    if !dest.join(MANIFEST_FILE_NAME).is_file() {
        return Err(PackageError::MissingManifest);
    }

    debug!(archive = %archive.display(), bytes = total_size, "Package extracted");
    Ok(())
}

/// Add a declared entry size to the running total. Header sizes come from
/// the archive, so the sum saturates and fails against the byte limit.
fn charge_size(total: u64, size: u64, limits: PackageLimits) -> Result<u64, PackageError> {
    let total = total.saturating_add(size);
    if total > limits.max_bytes {
        return Err(PackageError::TooLarge {
            limit: limits.max_bytes,
        });
    }
    Ok(total)
}

/// [`extract_package`] on the blocking pool.
pub async fn extract_package_async(
    archive: PathBuf,
    dest: PathBuf,
    limits: PackageLimits,
) -> Result<(), PackageError> {
    tokio::task::spawn_blocking(move || extract_package(&archive, &dest, limits)).await?
}

/// Recursively copy `src` into `dst`, creating `dst`.
pub fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Replace the contents of `target` with `staged`, keeping the existing
/// `Data/` folder of `target` (any `Data/` shipped in `staged` is dropped).
pub fn replace_preserving_data(target: &Path, staged: &Path) -> std::io::Result<()> {
    let data_dir = target.join(DATA_DIR_NAME);
    let mut parked = target.as_os_str().to_owned();
    parked.push(format!(".data-{}", Uuid::new_v4().simple()));
    let parked = PathBuf::from(parked);
    let has_data = data_dir.is_dir();

    if has_data {
        fs::rename(&data_dir, &parked)?;
    }

    let result = (|| {
        if target.exists() {
            fs::remove_dir_all(target)?;
        }
        copy_dir(staged, target)
    })();

    if has_data {
        fs::create_dir_all(target)?;
        let shipped = target.join(DATA_DIR_NAME);
        if shipped.exists() {
            fs::remove_dir_all(&shipped)?;
        }
        fs::rename(&parked, &shipped)?;
    }
    result
}

/// Remove a directory tree, treating "not found" as success.
pub fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod test_zip {
    use std::io::Write;
    use std::path::Path;

    use zip::write::SimpleFileOptions;

    /// Write a zip with the given `(name, contents)` entries.
    pub fn write(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
}
