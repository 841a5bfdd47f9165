use rustc_hash::FxHashMap;

use crate::connection::{Connection, ConnectionSettings};
use crate::errors::Result;

/// In-memory connection recording every write for assertions in this
/// crate's own integration tests, without touching the filesystem.
#[derive(Default)]
pub struct TestConnection {
    pub files: FxHashMap<String, Vec<u8>>,
    pub folders: Vec<String>,
}

impl TestConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Connection for TestConnection {
    fn initialize(&mut self, _settings: &ConnectionSettings) -> Result<bool> {
        Ok(true)
    }

    fn shutdown(&mut self) {}

    fn max_session_nr(&self) -> Result<i64> {
        let mut max = -1i64;
        for folder in &self.folders {
            if let Some(suffix) = folder.rsplit('/').next().and_then(|s| s.strip_prefix("Session_")) {
                if let Ok(n) = suffix.parse::<i64>() {
                    max = max.max(n);
                }
            }
        }
        Ok(max)
    }

    fn create_folder(&mut self, path: &str, _is_relative: bool, _may_exist: bool) -> Result<bool> {
        self.folders.push(path.to_string());
        Ok(true)
    }

    fn remove_folder(&mut self, path: &str, _is_relative: bool) -> Result<bool> {
        self.folders.retain(|p| p != path);
        self.files.retain(|k, _| !k.starts_with(path));
        Ok(true)
    }

    fn write_file(&mut self, bytes: &[u8], path: &str, _is_relative: bool, _binary: bool) -> Result<bool> {
        self.files.insert(path.to_string(), bytes.to_vec());
        Ok(true)
    }

    fn remove_file(&mut self, path: &str, _is_relative: bool) -> Result<bool> {
        self.files.remove(path);
        Ok(true)
    }

    fn process_updates(&mut self) -> Result<bool> {
        Ok(true)
    }
}
