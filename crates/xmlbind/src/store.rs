//! Durable XML files.
//!
//! [`XmlFileStore::save`] renders into a sibling temporary and renames it over
//! the target, so a failed save never leaves a partial file behind.
//! [`XmlFileStore::load`] parses a private copy of the file and checks the
//! file's modification time before and after. When a concurrent writer
//! touched the file in between, the attempt is thrown away and retried.
//!
//! The store takes no locks. Callers that need stronger guarantees against
//! concurrent writers must serialize access to a path themselves.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::access::AccessorCache;
use crate::config::StoreConfig;
use crate::error::{Result, XmlBindError};
use crate::meta::XmlObject;
use crate::xml::utils::{UTF8_BOM, strip_bom};
use crate::xml::{from_xml_reader, to_xml_writer};

/// Source of last-modified stamps for the load stability check.
pub trait ModificationClock: Send + Sync {
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;
}

/// Reads stamps from file metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsModificationClock;

impl ModificationClock for FsModificationClock {
    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }
}

/// Saves and loads [`XmlObject`]s as standalone XML documents.
pub struct XmlFileStore {
    config: StoreConfig,
    accessors: Arc<AccessorCache>,
    clock: Arc<dyn ModificationClock>,
}

impl XmlFileStore {
    /// Creates a store, rejecting invalid configuration.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| XmlBindError::Config(errors.join("; ")))?;
        let accessors = AccessorCache::shared(config.access_mode);
        Ok(Self {
            config,
            accessors,
            clock: Arc::new(FsModificationClock),
        })
    }

    /// Creates a store configured from `XMLBIND_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(StoreConfig::from_env())
    }

    pub fn with_accessors(mut self, accessors: Arc<AccessorCache>) -> Self {
        self.accessors = accessors;
        self
    }

    pub fn with_modification_clock(mut self, clock: Arc<dyn ModificationClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn accessors(&self) -> &Arc<AccessorCache> {
        &self.accessors
    }

    /// Writes `value` to `path`.
    ///
    /// The existing file at `path` is only replaced once the new document has
    /// been rendered completely.
    pub fn save<T: XmlObject>(&self, value: &T, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = sibling(path, &self.config.write_suffix);

        if let Err(err) = self.write_document(value, &tmp) {
            remove_best_effort(&tmp);
            return Err(err);
        }

        if let Err(err) = fs::remove_file(path) {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to remove existing file {} before replacing it: {}",
                    path.display(),
                    err
                );
            }
        }

        if let Err(err) = fs::rename(&tmp, path) {
            remove_best_effort(&tmp);
            return Err(err.into());
        }

        tracing::debug!("Saved {}", path.display());
        Ok(())
    }

    fn write_document<T: XmlObject>(&self, value: &T, tmp: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(tmp)?);
        out.write_all(UTF8_BOM)?;
        let mut out = to_xml_writer(value, out, &self.accessors, &self.config)?;
        out.flush()?;

        let file = out.into_inner().map_err(|e| e.into_error())?;
        if self.config.sync_on_save {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Reads a `T` from `path`.
    ///
    /// Fails with [`XmlBindError::NotFound`] when the file does not exist and
    /// with [`XmlBindError::StabilityFailure`] when it changed during every
    /// attempt. Parse and I/O faults are returned at once without retrying.
    pub fn load<T: XmlObject>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        let attempts = self.config.max_read_attempts.max(1);

        for attempt in 1..=attempts {
            if !path.exists() {
                return Err(XmlBindError::NotFound(path.to_path_buf()));
            }

            let before = self.modified(path)?;
            let value = self.read_copy(path)?;
            let after = self.modified(path)?;
            if before == after {
                return Ok(value);
            }

            tracing::debug!(
                "{} changed while it was being read (attempt {} of {})",
                path.display(),
                attempt,
                attempts
            );
            if attempt < attempts {
                std::thread::sleep(self.config.retry_delay());
            }
        }

        Err(XmlBindError::StabilityFailure {
            path: path.to_path_buf(),
            attempts,
        })
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        self.clock
            .modified(path)
            .map_err(|err| not_found_or_io(err, path))
    }

    /// Parses a private copy so the original can be replaced mid-read.
    fn read_copy<T: XmlObject>(&self, path: &Path) -> Result<T> {
        let tmp = sibling(path, &self.config.read_suffix);
        let result = fs::copy(path, &tmp)
            .map_err(|err| not_found_or_io(err, path))
            .and_then(|_| {
                let bytes = fs::read(&tmp)?;
                from_xml_reader(strip_bom(&bytes), &self.accessors, &self.config)
            });
        remove_best_effort(&tmp);
        result
    }
}

impl fmt::Debug for XmlFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlFileStore")
            .field("config", &self.config)
            .field("accessors", &self.accessors)
            .finish_non_exhaustive()
    }
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_best_effort(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove temporary file {}: {}", path.display(), err);
        }
    }
}

fn not_found_or_io(err: io::Error, path: &Path) -> XmlBindError {
    if err.kind() == io::ErrorKind::NotFound {
        XmlBindError::NotFound(path.to_path_buf())
    } else {
        XmlBindError::Io(err)
    }
}

/// Saves `value` to `path` with a store configured from the environment.
pub fn save<T: XmlObject>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    XmlFileStore::from_env()?.save(value, path)
}

/// Loads a `T` from `path` with a store configured from the environment.
pub fn load<T: XmlObject>(path: impl AsRef<Path>) -> Result<T> {
    XmlFileStore::from_env()?.load(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_appends_suffix() {
        assert_eq!(
            sibling(Path::new("/data/users.xml"), ".w.tmp"),
            PathBuf::from("/data/users.xml.w.tmp")
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = StoreConfig {
            max_read_attempts: 0,
            ..Default::default()
        };
        let err = XmlFileStore::new(config).unwrap_err();
        assert!(matches!(err, XmlBindError::Config(msg) if msg.contains("read attempts")));
    }

    #[test]
    fn test_not_found_mapping() {
        let path = Path::new("missing.xml");
        let err = not_found_or_io(io::Error::from(io::ErrorKind::NotFound), path);
        assert!(matches!(err, XmlBindError::NotFound(p) if p == path));

        let err = not_found_or_io(io::Error::from(io::ErrorKind::PermissionDenied), path);
        assert!(matches!(err, XmlBindError::Io(_)));
    }
}
