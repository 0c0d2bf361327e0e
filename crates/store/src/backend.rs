use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use logdock_core::error::{LogdockError, Result};
use logdock_core::model::log::LogRecord;

use crate::schema::{LogFile, LogFileRef};

/// Where the full collection lives between restarts.
///
/// `save` receives the whole collection every time and must not return
/// until it is durable.
pub trait Backend: Send + Sync {
    fn describe(&self) -> String;

    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<Vec<LogRecord>>>;

    fn save(&self, records: &[LogRecord]) -> Result<()>;

    fn size_bytes(&self) -> u64 {
        0
    }
}

/// A single pretty-printed JSON document, replaced atomically on save.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| LogdockError::Io(format!("failed to create data dir: {e}")))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "logs.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Backend for JsonFileBackend {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Option<Vec<LogRecord>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&self.path)
            .map_err(|e| LogdockError::Io(format!("failed reading {}: {e}", self.describe())))?;
        let parsed: LogFile = serde_json::from_slice(&raw).map_err(|e| {
            LogdockError::Corrupt(format!("{}: {e}", self.describe()))
        })?;
        Ok(Some(parsed.logs))
    }

    fn save(&self, records: &[LogRecord]) -> Result<()> {
        let payload = serde_json::to_vec_pretty(&LogFileRef { logs: records })
            .map_err(|e| LogdockError::Encode(e.to_string()))?;

        let tmp = self.tmp_path();
        let mut file = File::create(&tmp)
            .map_err(|e| LogdockError::Io(format!("failed creating {}: {e}", tmp.display())))?;
        file.write_all(&payload)
            .and_then(|_| file.sync_all())
            .map_err(|e| LogdockError::Io(format!("failed writing {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            LogdockError::Io(format!("failed replacing {}: {e}", self.describe()))
        })?;
        sync_parent_dir(&self.path)
    }

    fn size_bytes(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

/// Persists the directory entry written by `rename`.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| LogdockError::Io(format!("failed syncing {}: {e}", parent.display())))
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// Keeps the last saved collection in memory; nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    saved: Mutex<Option<Vec<LogRecord>>>,
}

impl Backend for MemoryBackend {
    fn describe(&self) -> String {
        ":memory:".to_string()
    }

    fn load(&self) -> Result<Option<Vec<LogRecord>>> {
        let saved = self
            .saved
            .lock()
            .map_err(|_| LogdockError::Internal("memory backend lock poisoned".to_string()))?;
        Ok(saved.clone())
    }

    fn save(&self, records: &[LogRecord]) -> Result<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| LogdockError::Internal("memory backend lock poisoned".to_string()))?;
        *saved = Some(records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_file_round_trips_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs.json");
        let backend = JsonFileBackend::new(&path).unwrap();
        assert!(backend.load().unwrap().is_none());

        let records = testkit::sample_records();
        backend.save(&records).unwrap();

        let loaded = backend.load().unwrap().unwrap();
        assert_eq!(loaded, records);
        assert!(!backend.tmp_path().exists());
        assert!(backend.size_bytes() > 0);
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.json");
        fs::write(&path, "{not json").unwrap();
        let backend = JsonFileBackend::new(&path).unwrap();
        assert!(matches!(backend.load(), Err(LogdockError::Corrupt(_))));
    }

    #[cfg(unix)]
    #[test]
    fn save_syncs_the_containing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.json");
        assert!(sync_parent_dir(&path).is_ok());

        let gone = dir.path().join("removed/logs.json");
        assert!(matches!(sync_parent_dir(&gone), Err(LogdockError::Io(_))));

        let backend = JsonFileBackend::new(&path).unwrap();
        backend.save(&testkit::sample_records()).unwrap();
        let entries = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect::<Vec<_>>();
        assert_eq!(entries, vec![std::ffi::OsString::from("logs.json")]);
    }
}
