use crate::connection::{Connection, ConnectionSettings};
use crate::errors::Result;

/// Discards every byte. Used for dry runs, batch profiling, and tests
/// that only care about the writer's in-memory state.
#[derive(Default)]
pub struct VoidConnection;

impl VoidConnection {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Connection for VoidConnection {
    fn initialize(&mut self, _settings: &ConnectionSettings) -> Result<bool> {
        Ok(true)
    }

    fn shutdown(&mut self) {}

    fn max_session_nr(&self) -> Result<i64> {
        Ok(-1)
    }

    fn create_folder(&mut self, _path: &str, _is_relative: bool, _may_exist: bool) -> Result<bool> {
        Ok(true)
    }

    fn remove_folder(&mut self, _path: &str, _is_relative: bool) -> Result<bool> {
        Ok(true)
    }

    fn write_file(&mut self, _bytes: &[u8], _path: &str, _is_relative: bool, _binary: bool) -> Result<bool> {
        Ok(true)
    }

    fn remove_file(&mut self, _path: &str, _is_relative: bool) -> Result<bool> {
        Ok(true)
    }

    fn process_updates(&mut self) -> Result<bool> {
        Ok(true)
    }
}
