use std::fs;
use std::path::{Path, PathBuf};

use crate::connection::{Connection, ConnectionSettings};
use crate::errors::{BridgeError, Result};

fn wrap_io(path: &Path, source: std::io::Error) -> BridgeError {
    BridgeError::IoError {
        path: path.display().to_string(),
        source,
    }
}

/// Writes directly to a local filesystem directory tree.
pub struct LocalConnection {
    root: PathBuf,
}

impl LocalConnection {
    #[must_use]
    pub fn new() -> Self {
        Self { root: PathBuf::new() }
    }

    fn resolve(&self, path: &str, is_relative: bool) -> PathBuf {
        if is_relative {
            self.root.join(path)
        } else {
            PathBuf::from(path)
        }
    }
}

impl Default for LocalConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for LocalConnection {
    fn initialize(&mut self, settings: &ConnectionSettings) -> Result<bool> {
        self.root = PathBuf::from(&settings.working_dir);
        fs::create_dir_all(&self.root).map_err(|e| wrap_io(&self.root, e))?;
        Ok(true)
    }

    fn shutdown(&mut self) {}

    fn max_session_nr(&self) -> Result<i64> {
        let mut max = -1i64;
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(_) => return Ok(-1),
        };
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(suffix) = name.strip_prefix("Session_") {
                    if let Ok(n) = suffix.parse::<i64>() {
                        max = max.max(n);
                    }
                }
            }
        }
        Ok(max)
    }

    fn create_folder(&mut self, path: &str, is_relative: bool, may_exist: bool) -> Result<bool> {
        let full = self.resolve(path, is_relative);
        if full.exists() {
            return Ok(may_exist);
        }
        fs::create_dir_all(&full).map_err(|e| wrap_io(&full, e))?;
        Ok(true)
    }

    fn remove_folder(&mut self, path: &str, is_relative: bool) -> Result<bool> {
        let full = self.resolve(path, is_relative);
        if !full.exists() {
            return Ok(true);
        }
        fs::remove_dir_all(&full).map_err(|e| wrap_io(&full, e))?;
        Ok(true)
    }

    fn write_file(&mut self, bytes: &[u8], path: &str, is_relative: bool, _binary: bool) -> Result<bool> {
        let full = self.resolve(path, is_relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| wrap_io(parent, e))?;
        }
        fs::write(&full, bytes).map_err(|e| wrap_io(&full, e))?;
        Ok(true)
    }

    fn remove_file(&mut self, path: &str, is_relative: bool) -> Result<bool> {
        let full = self.resolve(path, is_relative);
        if !full.exists() {
            return Ok(true);
        }
        fs::remove_file(&full).map_err(|e| wrap_io(&full, e))?;
        Ok(true)
    }

    fn process_updates(&mut self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_numbering_picks_max_plus_one() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Session_0")).unwrap();
        std::fs::create_dir(dir.path().join("Session_3")).unwrap();
        std::fs::create_dir(dir.path().join("Session_1")).unwrap();

        let mut conn = LocalConnection::new();
        conn.initialize(&ConnectionSettings {
            host: None,
            working_dir: dir.path().to_string_lossy().into_owned(),
        })
        .unwrap();

        assert_eq!(conn.max_session_nr().unwrap(), 3);
    }

    #[test]
    fn write_then_read_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = LocalConnection::new();
        conn.initialize(&ConnectionSettings {
            host: None,
            working_dir: dir.path().to_string_lossy().into_owned(),
        })
        .unwrap();
        conn.write_file(b"hello", "a/b.txt", true, true).unwrap();
        let contents = std::fs::read(dir.path().join("a/b.txt")).unwrap();
        assert_eq!(contents, b"hello");
    }
}
